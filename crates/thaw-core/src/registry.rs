use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::{Channel, CoreError, Result};

/// Process-lifetime index of live channels. Keys fold ASCII case only, the
/// same folding SQLite applies to `NOCASE` columns and table names.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels
            .get(&name.to_ascii_lowercase())
            .map(|c| Arc::clone(c.value()))
    }

    /// Insert a channel. A live channel with the same name is never replaced.
    pub fn add(&self, channel: Channel) -> Result<Arc<Channel>> {
        match self.channels.entry(channel.name().to_ascii_lowercase()) {
            Entry::Occupied(_) => Err(CoreError::ChannelAlreadyExists(channel.name().to_string())),
            Entry::Vacant(slot) => Ok(Arc::clone(slot.insert(Arc::new(channel)).value())),
        }
    }

    /// Remove `channel` if it is still the registered instance for its name.
    pub fn remove(&self, channel: &Arc<Channel>) -> bool {
        self.channels
            .remove_if(&channel.name().to_ascii_lowercase(), |_, live| Arc::ptr_eq(live, channel))
            .is_some()
    }

    pub fn all(&self) -> Vec<Arc<Channel>> {
        self.channels.iter().map(|c| Arc::clone(c.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
