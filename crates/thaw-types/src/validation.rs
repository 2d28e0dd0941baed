/// Longest accepted channel name, in characters.
pub const MAX_CHANNEL_NAME_LEN: usize = 50;

/// Stored message content is cut to this many characters.
pub const MAX_CONTENT_LEN: usize = 512;

/// Trim a requested channel name and check it against the accepted pattern
/// (letters, digits, underscore and space; 1..=50 characters).
pub fn normalize_channel_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_CHANNEL_NAME_LEN {
        return None;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
    {
        return None;
    }
    Some(name.to_string())
}

/// User names start with a letter, followed by at least one letter, digit or underscore.
pub fn is_valid_username(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Trim, escape angle brackets, then truncate to [`MAX_CONTENT_LEN`] characters.
pub fn sanitize_content(raw: &str) -> String {
    let escaped = raw.trim().replace('<', "&lt;").replace('>', "&gt;");
    match escaped.char_indices().nth(MAX_CONTENT_LEN) {
        Some((cut, _)) => escaped[..cut].to_string(),
        None => escaped,
    }
}
