//! Ephemeral per-user presence, level-triggered by backend events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Presence snapshot for one user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceEntry {
    pub is_online: bool,
    pub last_seen_ms: u64,
}

/// Flat presence map updated in place by `presence` bus events.
///
/// No interpolation and no timeout: the backend is the source of truth for
/// transitions, so entries only change when an event names the user.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    entries: HashMap<String, PresenceEntry>,
}

impl PresenceTracker {
    /// Apply one presence event.
    pub fn apply(&mut self, user_id: &str, is_online: bool, last_seen_ms: u64) {
        self.entries.insert(
            user_id.to_owned(),
            PresenceEntry {
                is_online,
                last_seen_ms,
            },
        );
    }

    /// Whether a user is currently online; unknown users are offline.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries
            .get(user_id)
            .map(|entry| entry.is_online)
            .unwrap_or(false)
    }

    /// Last-seen timestamp when the backend has reported one.
    pub fn last_seen_ms(&self, user_id: &str) -> Option<u64> {
        self.entries.get(user_id).map(|entry| entry.last_seen_ms)
    }
}
