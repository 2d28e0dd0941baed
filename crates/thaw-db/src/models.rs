//! Database row types: these map directly to SQLite rows.
//! Conversion into thaw-types models resolves the user references.

use thaw_types::models::{ChannelEntry, Message, User};

use crate::{DbError, Result};

pub struct ChannelRow {
    pub name: String,
    pub creator: String,
    /// `None` when the creator has no credential row.
    pub creator_hash: Option<String>,
}

impl ChannelRow {
    pub fn resolve(self) -> Result<ChannelEntry> {
        let hash = self
            .creator_hash
            .ok_or_else(|| DbError::UnknownUser(self.creator.clone()))?;
        Ok(ChannelEntry {
            name: self.name,
            creator: User::new(self.creator, hash),
        })
    }
}

pub struct MessageRow {
    pub timestamp: i64,
    pub content: String,
    pub author: String,
    pub author_hash: Option<String>,
}

impl MessageRow {
    pub fn resolve(self, channel: &str) -> Result<Message> {
        let hash = self
            .author_hash
            .ok_or_else(|| DbError::UnknownUser(self.author.clone()))?;
        Ok(Message {
            channel: channel.to_string(),
            author: User::new(self.author, hash),
            timestamp: self.timestamp,
            content: self.content,
        })
    }
}
