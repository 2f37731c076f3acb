//! Per-conversation, per-message read flags.
//!
//! The store is pure in-memory state; the engine persists a snapshot after
//! every mutation. Every mutating operation reports whether it changed
//! anything so callers can skip persistence and observer notification on
//! no-ops.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Keyed mapping conversation -> message -> "is read".
///
/// Invariant: a `true` flag never flips back to `false` except through
/// [`ReadStateStore::clear_conversation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadStateStore {
    conversations: HashMap<String, HashMap<String, bool>>,
}

impl ReadStateStore {
    /// Insert an initial flag for every message lacking an entry.
    ///
    /// First load of a conversation's history defaults everything to read;
    /// once a conversation has any prior entries, unknown messages default
    /// to unread. Returns `true` only when at least one entry was inserted.
    pub fn sync_conversation(&mut self, conversation_id: &str, message_ids: &[String]) -> bool {
        let default_read = !self
            .conversations
            .get(conversation_id)
            .is_some_and(|entries| !entries.is_empty());
        let entries = self
            .conversations
            .entry(conversation_id.to_owned())
            .or_default();

        let mut inserted = false;
        for message_id in message_ids {
            if !entries.contains_key(message_id) {
                entries.insert(message_id.clone(), default_read);
                inserted = true;
            }
        }
        inserted
    }

    /// Register a single message arriving over the live event stream.
    ///
    /// Same default policy as [`sync_conversation`](Self::sync_conversation);
    /// idempotent when the identifier already has an entry.
    pub fn register_incoming(&mut self, conversation_id: &str, message_id: &str) -> bool {
        self.sync_conversation(conversation_id, std::slice::from_ref(&message_id.to_owned()))
    }

    /// Flip a message's flag to read.
    ///
    /// Returns `true` only on the `false -> true` transition; callers rely
    /// on that to fire the outbound mark-read RPC exactly once. A missing
    /// entry is inserted as read defensively so a later-arriving message is
    /// not spuriously marked unread.
    pub fn mark_as_read(&mut self, conversation_id: &str, message_id: &str) -> bool {
        let entries = self
            .conversations
            .entry(conversation_id.to_owned())
            .or_default();
        match entries.get(message_id) {
            Some(true) => false,
            _ => {
                entries.insert(message_id.to_owned(), true);
                true
            }
        }
    }

    /// Remove all entries for a conversation.
    ///
    /// The only operation permitted to destroy history; used for cache-reset
    /// maintenance. Returns `true` when any entry existed.
    pub fn clear_conversation(&mut self, conversation_id: &str) -> bool {
        self.conversations
            .remove(conversation_id)
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Whether a message is flagged read.
    pub fn is_read(&self, conversation_id: &str, message_id: &str) -> bool {
        self.conversations
            .get(conversation_id)
            .and_then(|entries| entries.get(message_id))
            .copied()
            .unwrap_or(false)
    }

    /// Whether the store has any entry for a message.
    pub fn contains(&self, conversation_id: &str, message_id: &str) -> bool {
        self.conversations
            .get(conversation_id)
            .is_some_and(|entries| entries.contains_key(message_id))
    }

    /// Count of messages with a `false` flag in one conversation.
    pub fn unread_count(&self, conversation_id: &str) -> u64 {
        self.conversations
            .get(conversation_id)
            .map(|entries| entries.values().filter(|read| !**read).count() as u64)
            .unwrap_or(0)
    }

    /// Sum of unread counts across all known conversations.
    pub fn total_unread(&self) -> u64 {
        self.conversations
            .keys()
            .map(|conversation_id| self.unread_count(conversation_id))
            .sum()
    }

    /// Conversation ids currently tracked.
    pub fn conversation_ids(&self) -> impl Iterator<Item = &str> {
        self.conversations.keys().map(String::as_str)
    }
}
