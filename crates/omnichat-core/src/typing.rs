//! Ephemeral per-conversation typing indicators with staleness expiry.
//!
//! A typing entry is removed by an explicit stop event or by exceeding the
//! staleness window, whichever comes first. Expiry runs as a periodic sweep
//! rather than per-entry timers, guarding against backends that never send
//! the stop event (client disconnect mid-type).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default staleness window after which an unrefreshed entry expires.
pub const TYPING_STALENESS_MS: u64 = 5_000;

/// One user typing in one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingEntry {
    pub user_id: String,
    pub user_name: Option<String>,
    /// When the entry was created or last refreshed.
    pub timestamp_ms: u64,
}

/// Conversation -> ordered typing entries.
#[derive(Debug, Clone, Default)]
pub struct TypingTracker {
    conversations: HashMap<String, Vec<TypingEntry>>,
}

impl TypingTracker {
    /// Refresh an existing entry's timestamp or append a new one.
    pub fn set_typing(
        &mut self,
        conversation_id: &str,
        user_id: &str,
        user_name: Option<String>,
        now_ms: u64,
    ) {
        let entries = self
            .conversations
            .entry(conversation_id.to_owned())
            .or_default();
        if let Some(entry) = entries.iter_mut().find(|entry| entry.user_id == user_id) {
            entry.timestamp_ms = now_ms;
            if user_name.is_some() {
                entry.user_name = user_name;
            }
        } else {
            entries.push(TypingEntry {
                user_id: user_id.to_owned(),
                user_name,
                timestamp_ms: now_ms,
            });
        }
    }

    /// Remove the entry for a user.
    ///
    /// Returns `true` when an entry existed. The conversation key is dropped
    /// once its list is empty.
    pub fn set_not_typing(&mut self, conversation_id: &str, user_id: &str) -> bool {
        let Some(entries) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.user_id != user_id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.conversations.remove(conversation_id);
        }
        removed
    }

    /// Current typing entries for a conversation, in arrival order.
    pub fn typing_in(&self, conversation_id: &str) -> &[TypingEntry] {
        self.conversations
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drop entries older than `staleness_ms` and empty conversation keys.
    ///
    /// Builds a fresh map instead of mutating in place so readers never
    /// observe a half-updated structure. Returns the conversations whose
    /// entry set changed.
    pub fn sweep(&mut self, now_ms: u64, staleness_ms: u64) -> Vec<String> {
        let mut changed = Vec::new();
        let mut next: HashMap<String, Vec<TypingEntry>> = HashMap::new();

        for (conversation_id, entries) in &self.conversations {
            let kept: Vec<TypingEntry> = entries
                .iter()
                .filter(|entry| now_ms.saturating_sub(entry.timestamp_ms) <= staleness_ms)
                .cloned()
                .collect();
            if kept.len() != entries.len() {
                changed.push(conversation_id.clone());
            }
            if !kept.is_empty() {
                next.insert(conversation_id.clone(), kept);
            }
        }

        self.conversations = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_typing_appends_then_refreshes() {
        let mut tracker = TypingTracker::default();
        tracker.set_typing("c1", "u1", Some("Alice".into()), 1_000);
        tracker.set_typing("c1", "u2", None, 1_100);
        tracker.set_typing("c1", "u1", None, 2_000);

        let entries = tracker.typing_in("c1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, "u1");
        assert_eq!(entries[0].timestamp_ms, 2_000);
        assert_eq!(entries[0].user_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn explicit_stop_removes_entry_and_empty_key() {
        let mut tracker = TypingTracker::default();
        tracker.set_typing("c1", "u1", None, 1_000);

        assert!(tracker.set_not_typing("c1", "u1"));
        assert!(tracker.typing_in("c1").is_empty());
        assert!(!tracker.set_not_typing("c1", "u1"));
    }

    #[test]
    fn sweep_expires_stale_entries_without_stop_event() {
        let mut tracker = TypingTracker::default();
        tracker.set_typing("c1", "u1", None, 1_000);
        tracker.set_typing("c1", "u2", None, 4_000);
        tracker.set_typing("c2", "u3", None, 1_000);

        let changed = tracker.sweep(7_000, TYPING_STALENESS_MS);

        let mut changed_sorted = changed;
        changed_sorted.sort_unstable();
        assert_eq!(changed_sorted, vec!["c1".to_owned(), "c2".to_owned()]);
        let remaining = tracker.typing_in("c1");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, "u2");
        assert!(tracker.typing_in("c2").is_empty());
    }

    #[test]
    fn refresh_extends_an_entry_past_the_window() {
        let mut tracker = TypingTracker::default();
        tracker.set_typing("c1", "u1", None, 1_000);
        tracker.set_typing("c1", "u1", None, 6_000);

        let changed = tracker.sweep(7_000, TYPING_STALENESS_MS);
        assert!(changed.is_empty());
        assert_eq!(tracker.typing_in("c1").len(), 1);
    }

    #[test]
    fn sweep_without_stale_entries_reports_no_change() {
        let mut tracker = TypingTracker::default();
        tracker.set_typing("c1", "u1", None, 1_000);
        assert!(tracker.sweep(2_000, TYPING_STALENESS_MS).is_empty());
    }
}
