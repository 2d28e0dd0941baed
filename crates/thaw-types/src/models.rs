use serde::{Deserialize, Serialize};

/// A registered identity. Equality covers both the name and the stored hash,
/// so a stale session carrying an old hash never compares equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
}

impl User {
    pub fn new(name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// Anything that can be connected to a live channel.
/// Only humans exist today; new kinds get their own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user")]
pub enum Participant {
    Human(User),
}

impl Participant {
    pub fn user(&self) -> &User {
        match self {
            Self::Human(user) => user,
        }
    }

    pub fn name(&self) -> &str {
        &self.user().name
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human(_))
    }
}

impl From<User> for Participant {
    fn from(user: User) -> Self {
        Self::Human(user)
    }
}

/// One immutable entry of a channel's message log, author already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub author: User,
    /// Caller-supplied, milliseconds since the epoch. Always positive.
    pub timestamp: i64,
    pub content: String,
}

/// A catalog entry: channel name plus its resolved creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub name: String,
    pub creator: User,
}

/// Result of an access-list mutation. Refusals are reported, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessChange {
    /// The requested change was written.
    Applied,
    /// Nothing to do: the grant already existed, or the row was already gone.
    Unchanged,
    /// The requester does not hold control authority over the channel.
    Denied,
}
