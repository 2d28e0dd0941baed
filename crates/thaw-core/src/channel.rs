use std::sync::{Mutex, PoisonError};

use dashmap::DashSet;
use thaw_db::Database;
use thaw_types::models::{Participant, User};

use crate::Result;

/// A live channel and the participants currently connected to it.
///
/// The participant set is process-local and safe for concurrent use. The
/// creator is held by name only; the durable record lives in the catalog.
#[derive(Debug)]
pub struct Channel {
    name: String,
    creator: String,
    participants: DashSet<Participant>,
    /// Held across "check grant, then admit" and "drop grant, then evict" so
    /// no participant outlives their grant.
    admission: Mutex<()>,
}

impl Channel {
    pub fn new(name: impl Into<String>, creator: &User) -> Self {
        Self {
            name: name.into(),
            creator: creator.name.clone(),
            participants: DashSet::new(),
            admission: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creator_name(&self) -> &str {
        &self.creator
    }

    /// Admit `participant` if the access list grants them view access.
    /// Returns whether they were admitted by this call.
    pub fn add_participant(&self, participant: Participant, db: &Database) -> Result<bool> {
        self.with_admissions_paused(|| {
            if !db.has_access(&self.name, participant.name())? {
                return Ok(false);
            }
            Ok(self.participants.insert(participant))
        })
    }

    /// Remove unconditionally. Returns whether they were connected.
    pub fn remove_participant(&self, participant: &Participant) -> bool {
        self.participants.remove(participant).is_some()
    }

    pub fn is_connected(&self, participant: &Participant) -> bool {
        self.participants.contains(participant)
    }

    pub fn is_creator(&self, user: &User) -> bool {
        self.creator == user.name
    }

    pub fn has_any_participant(&self) -> bool {
        !self.participants.is_empty()
    }

    /// Names of connected participants, sorted.
    pub fn participants(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .participants
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Disconnect every participant whose name is `name`, whatever hash their
    /// session carried.
    pub(crate) fn evict(&self, name: &str) -> usize {
        let before = self.participants.len();
        self.participants.retain(|p| p.name() != name);
        before - self.participants.len()
    }

    /// Run `f` with admissions held off.
    pub(crate) fn with_admissions_paused<T>(&self, f: impl FnOnce() -> T) -> T {
        // The guarded value is (), so a poisoned lock carries no broken state
        let _guard = self.admission.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, Channel, User, User) {
        let db = Database::open_in_memory().unwrap();
        db.create_user("alice", "hashA").unwrap();
        db.create_user("bob", "hashB").unwrap();
        db.create_channel("general", "alice").unwrap();
        let alice = User::new("alice", "hashA");
        let bob = User::new("bob", "hashB");
        let channel = Channel::new("general", &alice);
        (db, channel, alice, bob)
    }

    #[test]
    fn admission_requires_a_grant() {
        let (db, channel, alice, bob) = setup();

        assert!(!channel.add_participant(bob.clone().into(), &db).unwrap());
        assert!(!channel.is_connected(&bob.clone().into()));

        assert!(channel.add_participant(alice.clone().into(), &db).unwrap());
        assert!(channel.is_connected(&alice.clone().into()));
        // Already connected
        assert!(!channel.add_participant(alice.into(), &db).unwrap());

        db.grant_access("general", "bob", "alice").unwrap();
        assert!(channel.add_participant(bob.into(), &db).unwrap());
        assert_eq!(channel.participants(), ["alice", "bob"]);
    }

    #[test]
    fn removal_is_unconditional() {
        let (db, channel, alice, bob) = setup();
        channel.add_participant(alice.clone().into(), &db).unwrap();

        assert!(channel.has_any_participant());
        assert!(!channel.remove_participant(&bob.into()));
        assert!(channel.remove_participant(&alice.clone().into()));
        assert!(!channel.remove_participant(&alice.into()));
        assert!(!channel.has_any_participant());
    }

    #[test]
    fn creator_is_matched_by_name() {
        let (_db, channel, alice, bob) = setup();
        assert!(channel.is_creator(&alice));
        assert!(!channel.is_creator(&bob));
        assert_eq!(channel.creator_name(), "alice");
        assert_eq!(channel.name(), "general");
    }

    #[test]
    fn evict_ignores_hash() {
        let (db, channel, alice, _bob) = setup();
        channel.add_participant(alice.into(), &db).unwrap();
        assert_eq!(channel.evict("alice"), 1);
        assert!(!channel.has_any_participant());
    }
}
