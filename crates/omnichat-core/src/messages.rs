//! Per-conversation message cache feeding inference and status views.
//!
//! Holds the ordered history, group rosters, and everything attached to a
//! message over the bus: authoritative receipts and reaction activity.

use std::collections::{HashMap, HashSet};

use crate::types::{MessageRecord, ReactionRecord, Receipt};

/// In-memory message cache with bounded per-conversation retention.
#[derive(Debug, Clone)]
pub struct MessageCache {
    conversations: HashMap<String, Vec<MessageRecord>>,
    members: HashMap<String, Vec<String>>,
    max_messages: usize,
}

impl MessageCache {
    /// Create a cache with a per-conversation item cap (`max_messages >= 1`).
    pub fn new(max_messages: usize) -> Self {
        Self {
            conversations: HashMap::new(),
            members: HashMap::new(),
            max_messages: max_messages.max(1),
        }
    }

    /// Replace a conversation's history, deduplicating by message id and
    /// keeping the latest instance of each id.
    pub fn sync_conversation(&mut self, conversation_id: &str, messages: Vec<MessageRecord>) {
        let deduped = dedupe_and_trim(messages, self.max_messages);
        self.conversations
            .insert(conversation_id.to_owned(), deduped);
    }

    /// Append one message unless its id is already cached.
    ///
    /// Returns `true` when the message was inserted.
    pub fn upsert_message(&mut self, conversation_id: &str, message: MessageRecord) -> bool {
        let messages = self
            .conversations
            .entry(conversation_id.to_owned())
            .or_default();
        if messages
            .iter()
            .any(|existing| existing.message_id == message.message_id)
        {
            return false;
        }

        messages.push(message);
        if messages.len() > self.max_messages {
            let excess = messages.len() - self.max_messages;
            messages.drain(0..excess);
        }
        true
    }

    /// Attach an authoritative receipt to the message the backend named.
    ///
    /// The target may be a protocol-native or local identifier. An existing
    /// receipt from the same user with the same kind is refreshed in place.
    /// Returns `false` when no cached message matches.
    pub fn attach_receipt(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        receipt: Receipt,
    ) -> bool {
        let Some(message) = self.find_message_mut(conversation_id, message_id) else {
            return false;
        };
        if let Some(existing) = message
            .receipts
            .iter_mut()
            .find(|r| r.user_id == receipt.user_id && r.kind == receipt.kind)
        {
            existing.timestamp_ms = receipt.timestamp_ms;
        } else {
            message.receipts.push(receipt);
        }
        true
    }

    /// Apply a reaction add/remove to a message's reaction list.
    ///
    /// Returns `false` when no cached message matches.
    pub fn apply_reaction(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        user_id: &str,
        emoji: &str,
        added: bool,
        timestamp_ms: u64,
    ) -> bool {
        let Some(message) = self.find_message_mut(conversation_id, message_id) else {
            return false;
        };
        if added {
            if let Some(existing) = message
                .reactions
                .iter_mut()
                .find(|r| r.user_id == user_id && r.emoji == emoji)
            {
                existing.timestamp_ms = timestamp_ms;
            } else {
                message.reactions.push(ReactionRecord {
                    user_id: user_id.to_owned(),
                    emoji: emoji.to_owned(),
                    timestamp_ms,
                });
            }
        } else {
            message
                .reactions
                .retain(|r| !(r.user_id == user_id && r.emoji == emoji));
        }
        true
    }

    /// Replace a group conversation's membership roster.
    pub fn set_members(&mut self, conversation_id: &str, members: Vec<String>) {
        self.members.insert(conversation_id.to_owned(), members);
    }

    /// Membership roster; empty for 1:1 conversations.
    pub fn members(&self, conversation_id: &str) -> &[String] {
        self.members
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cached history in arrival order.
    pub fn messages(&self, conversation_id: &str) -> &[MessageRecord] {
        self.conversations
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find a message by local or protocol-native identifier.
    pub fn find_message(&self, conversation_id: &str, message_id: &str) -> Option<&MessageRecord> {
        self.conversations
            .get(conversation_id)?
            .iter()
            .find(|m| matches_id(m, message_id))
    }

    /// Drop a conversation's cached history and roster.
    pub fn clear_conversation(&mut self, conversation_id: &str) {
        self.conversations.remove(conversation_id);
        self.members.remove(conversation_id);
    }

    fn find_message_mut(
        &mut self,
        conversation_id: &str,
        message_id: &str,
    ) -> Option<&mut MessageRecord> {
        self.conversations
            .get_mut(conversation_id)?
            .iter_mut()
            .find(|m| matches_id(m, message_id))
    }
}

fn matches_id(message: &MessageRecord, id: &str) -> bool {
    message.message_id == id || message.protocol_id.as_deref() == Some(id)
}

fn dedupe_and_trim(messages: Vec<MessageRecord>, max_messages: usize) -> Vec<MessageRecord> {
    let mut seen_ids = HashSet::new();
    let mut reversed = Vec::with_capacity(messages.len());

    for message in messages.into_iter().rev() {
        if seen_ids.insert(message.message_id.clone()) {
            reversed.push(message);
        }
    }

    reversed.reverse();
    if reversed.len() > max_messages {
        let excess = reversed.len() - max_messages;
        reversed.drain(0..excess);
    }
    reversed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReceiptKind;

    fn message(id: &str, sender: &str, ts: u64) -> MessageRecord {
        MessageRecord::new(id, None, sender, false, ts)
    }

    #[test]
    fn sync_dedupes_keeping_latest_instance() {
        let mut cache = MessageCache::new(10);
        cache.sync_conversation(
            "c1",
            vec![
                message("m1", "u1", 1),
                message("m2", "u2", 2),
                MessageRecord::new("m1", Some("p1".to_owned()), "u1", false, 3),
            ],
        );

        let messages = cache.messages("c1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].message_id, "m1");
        assert_eq!(messages[1].protocol_id.as_deref(), Some("p1"));
    }

    #[test]
    fn upsert_skips_known_ids_and_trims_oldest() {
        let mut cache = MessageCache::new(2);
        assert!(cache.upsert_message("c1", message("m1", "u1", 1)));
        assert!(!cache.upsert_message("c1", message("m1", "u1", 1)));
        assert!(cache.upsert_message("c1", message("m2", "u1", 2)));
        assert!(cache.upsert_message("c1", message("m3", "u1", 3)));

        let ids: Vec<&str> = cache
            .messages("c1")
            .iter()
            .map(|m| m.message_id.as_str())
            .collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[test]
    fn attaches_receipts_by_protocol_id_and_refreshes_duplicates() {
        let mut cache = MessageCache::new(10);
        cache.upsert_message(
            "c1",
            MessageRecord::new("row-7", Some("p1".to_owned()), "me", true, 1),
        );

        assert!(cache.attach_receipt(
            "c1",
            "p1",
            Receipt::authoritative("u2", ReceiptKind::Delivery, 5),
        ));
        assert!(cache.attach_receipt(
            "c1",
            "p1",
            Receipt::authoritative("u2", ReceiptKind::Delivery, 9),
        ));
        assert!(!cache.attach_receipt(
            "c1",
            "missing",
            Receipt::authoritative("u2", ReceiptKind::Read, 9),
        ));

        let receipts = &cache.find_message("c1", "row-7").expect("cached").receipts;
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].timestamp_ms, 9);
    }

    #[test]
    fn reaction_add_refresh_and_remove() {
        let mut cache = MessageCache::new(10);
        cache.upsert_message("c1", message("m1", "me", 1));

        assert!(cache.apply_reaction("c1", "m1", "u2", "👍", true, 5));
        assert!(cache.apply_reaction("c1", "m1", "u2", "👍", true, 8));
        let reactions = &cache.find_message("c1", "m1").expect("cached").reactions;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].timestamp_ms, 8);

        assert!(cache.apply_reaction("c1", "m1", "u2", "👍", false, 9));
        assert!(cache
            .find_message("c1", "m1")
            .expect("cached")
            .reactions
            .is_empty());
    }

    #[test]
    fn roster_round_trip_and_clear() {
        let mut cache = MessageCache::new(10);
        cache.set_members("g1", vec!["me".into(), "u2".into(), "u3".into()]);
        cache.upsert_message("g1", message("m1", "u2", 1));

        assert_eq!(cache.members("g1").len(), 3);
        cache.clear_conversation("g1");
        assert!(cache.messages("g1").is_empty());
        assert!(cache.members("g1").is_empty());
    }
}
