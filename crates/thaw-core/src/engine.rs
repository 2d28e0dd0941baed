use std::sync::{Arc, Mutex, PoisonError};

use thaw_db::Database;
use thaw_types::models::{AccessChange, ChannelEntry, Message, Participant, User};
use thaw_types::validation::sanitize_content;
use tracing::{debug, error, info, warn};

use crate::{Channel, ChannelRegistry, CoreError, Result};

/// Coordinates the credential directory, catalog, access list and message
/// logs with the in-memory registry of live channels.
pub struct AccessEngine {
    db: Arc<Database>,
    registry: ChannelRegistry,
    /// Serializes channel creation and deletion across the database and the
    /// registry.
    lifecycle: Mutex<()>,
}

impl AccessEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            registry: ChannelRegistry::new(),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Materialize every catalog entry as a live channel. Returns how many
    /// channels were added.
    pub fn load(&self) -> Result<usize> {
        let mut added = 0;
        for entry in self.db.list_channels()? {
            if self.registry.lookup(&entry.name).is_none() {
                self.registry.add(Channel::new(entry.name, &entry.creator))?;
                added += 1;
            }
        }
        info!(channels = added, "Channel registry loaded");
        Ok(added)
    }

    // -- Credentials --

    pub fn register(&self, name: &str, password_hash: &str) -> Result<User> {
        self.db.create_user(name, password_hash)?;
        info!(user = %name, "User registered");
        Ok(User::new(name, password_hash))
    }

    pub fn find_user(&self, name: &str) -> Result<Option<User>> {
        Ok(self.db.get_user(name)?)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.db.list_users()?)
    }

    // -- Channel lifecycle --

    pub fn lookup(&self, name: &str) -> Option<Arc<Channel>> {
        self.registry.lookup(name)
    }

    /// Like [`lookup`](Self::lookup), but a missing channel is an error.
    pub fn channel(&self, name: &str) -> Result<Arc<Channel>> {
        self.lookup(name)
            .ok_or_else(|| CoreError::ChannelNotFound(name.to_string()))
    }

    /// Create the durable channel, then register it live. If the registry
    /// refuses the name the durable channel is deleted again.
    pub fn create_channel(&self, creator: &User, name: &str) -> Result<Arc<Channel>> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        self.db.create_channel(name, &creator.name)?;
        match self.registry.add(Channel::new(name, creator)) {
            Ok(channel) => {
                info!(channel = %name, creator = %creator.name, "Channel created");
                Ok(channel)
            }
            Err(err) => {
                warn!(channel = %name, "Name already live, undoing durable create");
                if let Err(undo) = self.db.delete_channel(name, &creator.name) {
                    error!(channel = %name, error = %undo, "Failed to undo durable create");
                }
                Err(err)
            }
        }
    }

    pub fn list_channels(&self) -> Result<Vec<ChannelEntry>> {
        Ok(self.db.list_channels()?)
    }

    pub fn has_access(&self, channel: &str, user: &User) -> Result<bool> {
        Ok(self.db.has_access(channel, &user.name)?)
    }

    pub fn grant_access(
        &self,
        channel: &Channel,
        target: &User,
        requester: &User,
    ) -> Result<AccessChange> {
        let change = self
            .db
            .grant_access(channel.name(), &target.name, &requester.name)?;
        match change {
            AccessChange::Applied => {
                info!(channel = %channel.name(), user = %target.name, "Access granted")
            }
            _ => debug!(channel = %channel.name(), user = %target.name, ?change, "Grant not applied"),
        }
        Ok(change)
    }

    /// Revoke `target`'s access. When `target` is the requester this deletes
    /// the channel, which is refused while anyone is connected.
    pub fn revoke_access(
        &self,
        channel: &Arc<Channel>,
        target: &User,
        requester: &User,
    ) -> Result<AccessChange> {
        if target.name == requester.name {
            return self.delete_channel(channel, requester);
        }

        let change = channel.with_admissions_paused(|| -> Result<AccessChange> {
            let change = self
                .db
                .revoke_access(channel.name(), &target.name, &requester.name)?;
            if change == AccessChange::Applied {
                channel.evict(&target.name);
            }
            Ok(change)
        })?;

        match change {
            AccessChange::Applied => {
                info!(channel = %channel.name(), user = %target.name, "Access revoked")
            }
            _ => debug!(channel = %channel.name(), user = %target.name, ?change, "Revoke not applied"),
        }
        Ok(change)
    }

    fn delete_channel(&self, channel: &Arc<Channel>, owner: &User) -> Result<AccessChange> {
        if !channel.is_creator(owner) {
            debug!(channel = %channel.name(), user = %owner.name, "Delete refused: not the creator");
            return Ok(AccessChange::Denied);
        }

        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        channel.with_admissions_paused(|| {
            if channel.has_any_participant() {
                return Err(CoreError::ChannelBusy(channel.name().to_string()));
            }
            if !self.db.delete_channel(channel.name(), &owner.name)? {
                return Ok(AccessChange::Denied);
            }
            if !self.registry.remove(channel) {
                warn!(channel = %channel.name(), "Deleted channel was not the live registry entry");
            }
            info!(channel = %channel.name(), "Channel deleted");
            Ok(AccessChange::Applied)
        })
    }

    // -- Messages --

    /// Append a message if `author` holds access. Content is sanitized and
    /// truncated first. Returns whether a record was appended.
    pub fn append_message(
        &self,
        channel: &Channel,
        author: &User,
        timestamp: i64,
        content: &str,
    ) -> Result<bool> {
        let content = sanitize_content(content);
        let appended = self
            .db
            .append_message(channel.name(), &author.name, timestamp, &content)?;
        if !appended {
            debug!(channel = %channel.name(), user = %author.name, "Message dropped");
        }
        Ok(appended)
    }

    /// The last `limit` messages, oldest first; the whole log for `None`.
    /// A channel without a log reads as empty.
    pub fn read_messages(&self, channel: &str, limit: Option<u32>) -> Result<Vec<Message>> {
        Ok(self.db.read_messages(channel, limit)?)
    }

    // -- Participants --

    pub fn connect(&self, channel: &Channel, user: &User) -> Result<bool> {
        channel.add_participant(Participant::Human(user.clone()), &self.db)
    }

    /// Move `user` from `from` to `to`. Nothing changes unless they are
    /// connected to `from` and admitted to `to`.
    pub fn switch_channel(&self, user: &User, from: &Channel, to: &Channel) -> Result<bool> {
        let participant = Participant::Human(user.clone());
        if !from.is_connected(&participant) {
            return Ok(false);
        }
        if !to.add_participant(participant.clone(), &self.db)? {
            return Ok(false);
        }
        from.remove_participant(&participant);
        Ok(true)
    }

    /// Remove `user` from every live channel. Returns how many they left.
    pub fn disconnect(&self, user: &User) -> usize {
        let participant = Participant::Human(user.clone());
        self.registry
            .all()
            .iter()
            .filter(|channel| channel.remove_participant(&participant))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (AccessEngine, User, User) {
        let engine = AccessEngine::new(Arc::new(Database::open_in_memory().unwrap()));
        let alice = engine.register("alice", "hashA").unwrap();
        let bob = engine.register("bob", "hashB").unwrap();
        (engine, alice, bob)
    }

    #[test]
    fn duplicate_registration_fails() {
        let (engine, _, _) = engine();
        let err = engine.register("alice", "again").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateUser(_)));
        assert_eq!(engine.list_users().unwrap().len(), 2);
    }

    #[test]
    fn create_registers_a_live_channel() {
        let (engine, alice, _) = engine();
        let general = engine.create_channel(&alice, "general").unwrap();

        assert!(Arc::ptr_eq(&engine.lookup("general").unwrap(), &general));
        assert!(general.is_creator(&alice));
        assert!(engine.has_access("general", &alice).unwrap());

        let err = engine.create_channel(&alice, "general").unwrap_err();
        assert!(matches!(err, CoreError::ChannelAlreadyExists(_)));
        assert_eq!(engine.registry().len(), 1);

        let err = engine.channel("random").unwrap_err();
        assert!(matches!(err, CoreError::ChannelNotFound(name) if name == "random"));
    }

    #[test]
    fn registry_refusal_undoes_the_durable_create() {
        let (engine, alice, bob) = engine();
        // Live without a durable record, e.g. left over from another process
        engine.registry().add(Channel::new("general", &alice)).unwrap();

        let err = engine.create_channel(&bob, "general").unwrap_err();
        assert!(matches!(err, CoreError::ChannelAlreadyExists(_)));

        let db = engine.database();
        assert!(db.list_channels().unwrap().is_empty());
        assert!(!db.log_exists("general").unwrap());
        assert!(!engine.has_access("general", &bob).unwrap());
        assert!(engine.lookup("general").unwrap().is_creator(&alice));
    }

    #[test]
    fn non_ascii_case_variants_are_distinct_channels() {
        let (engine, alice, _) = engine();
        engine.create_channel(&alice, "Élan").unwrap();
        engine.create_channel(&alice, "élan").unwrap();

        let listed: Vec<_> = engine
            .list_channels()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(listed, ["Élan", "élan"]);
        assert_eq!(engine.registry().len(), 2);
        assert!(engine.database().log_exists("élan").unwrap());
    }

    #[test]
    fn grant_then_revoke() {
        let (engine, alice, bob) = engine();
        let general = engine.create_channel(&alice, "general").unwrap();

        assert_eq!(engine.grant_access(&general, &bob, &alice).unwrap(), AccessChange::Applied);
        assert!(engine.has_access("general", &bob).unwrap());

        assert_eq!(engine.revoke_access(&general, &bob, &alice).unwrap(), AccessChange::Applied);
        assert!(!engine.has_access("general", &bob).unwrap());
    }

    #[test]
    fn non_owner_cannot_grant_revoke_or_delete() {
        let (engine, alice, bob) = engine();
        let carol = engine.register("carol", "hashC").unwrap();
        let general = engine.create_channel(&alice, "general").unwrap();
        engine.grant_access(&general, &bob, &alice).unwrap();

        assert_eq!(engine.grant_access(&general, &carol, &bob).unwrap(), AccessChange::Denied);
        assert_eq!(engine.revoke_access(&general, &alice, &bob).unwrap(), AccessChange::Denied);
        assert_eq!(engine.revoke_access(&general, &bob, &bob).unwrap(), AccessChange::Denied);
        assert!(engine.lookup("general").is_some());
        assert!(engine.has_access("general", &bob).unwrap());
    }

    #[test]
    fn revoke_disconnects_the_target() {
        let (engine, alice, bob) = engine();
        let general = engine.create_channel(&alice, "general").unwrap();
        engine.grant_access(&general, &bob, &alice).unwrap();
        assert!(engine.connect(&general, &bob).unwrap());

        engine.revoke_access(&general, &bob, &alice).unwrap();
        assert!(!general.is_connected(&Participant::Human(bob.clone())));
        assert!(!engine.connect(&general, &bob).unwrap());
    }

    #[test]
    fn delete_is_refused_while_participants_remain() {
        let (engine, alice, bob) = engine();
        let general = engine.create_channel(&alice, "general").unwrap();
        engine.grant_access(&general, &bob, &alice).unwrap();
        engine.append_message(&general, &alice, 1, "kept").unwrap();
        engine.connect(&general, &bob).unwrap();

        let err = engine.revoke_access(&general, &alice, &alice).unwrap_err();
        assert!(matches!(err, CoreError::ChannelBusy(_)));
        assert!(engine.lookup("general").is_some());
        assert!(engine.has_access("general", &bob).unwrap());
        assert_eq!(engine.read_messages("general", None).unwrap().len(), 1);

        assert_eq!(engine.disconnect(&bob), 1);
        assert_eq!(engine.revoke_access(&general, &alice, &alice).unwrap(), AccessChange::Applied);
        assert!(engine.lookup("general").is_none());
        assert!(engine.list_channels().unwrap().is_empty());
        assert!(!engine.has_access("general", &alice).unwrap());
        assert!(!engine.has_access("general", &bob).unwrap());
        assert!(!engine.database().log_exists("general").unwrap());
        assert!(engine.read_messages("general", None).unwrap().is_empty());
    }

    #[test]
    fn append_sanitizes_and_truncates() {
        let (engine, alice, _) = engine();
        let general = engine.create_channel(&alice, "general").unwrap();

        let long = format!("  <i>{}", "x".repeat(600));
        assert!(engine.append_message(&general, &alice, 5, &long).unwrap());

        let messages = engine.read_messages("general", Some(1)).unwrap();
        assert_eq!(messages[0].content.chars().count(), 512);
        assert!(messages[0].content.starts_with("&lt;i&gt;x"));
    }

    #[test]
    fn switch_requires_both_steps() {
        let (engine, alice, bob) = engine();
        let general = engine.create_channel(&alice, "general").unwrap();
        let private = engine.create_channel(&alice, "private").unwrap();
        engine.grant_access(&general, &bob, &alice).unwrap();
        engine.connect(&general, &bob).unwrap();

        // No grant on the target: bob stays where he is
        assert!(!engine.switch_channel(&bob, &general, &private).unwrap());
        assert_eq!(general.participants(), ["bob"]);

        engine.grant_access(&private, &bob, &alice).unwrap();
        assert!(engine.switch_channel(&bob, &general, &private).unwrap());
        assert!(general.participants().is_empty());
        assert_eq!(private.participants(), ["bob"]);

        // Not connected to the source
        assert!(!engine.switch_channel(&alice, &general, &private).unwrap());
    }

    #[test]
    fn load_hydrates_registry_from_catalog() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.create_user("alice", "hashA").unwrap();
        db.create_channel("general", "alice").unwrap();
        db.create_channel("random", "alice").unwrap();

        let engine = AccessEngine::new(Arc::clone(&db));
        assert_eq!(engine.load().unwrap(), 2);
        assert_eq!(engine.load().unwrap(), 0);
        assert_eq!(engine.lookup("random").unwrap().creator_name(), "alice");
    }
}
