//! Heuristic receipt inference from reply/reaction activity.
//!
//! When a provider delays or never sends explicit acknowledgments, later
//! activity in the conversation is used as a proxy signal. Both algorithms
//! are pure: they only look at already-known message and participant data.

use std::collections::HashMap;

use crate::types::{MessageRecord, Receipt, ReceiptKind};

/// Latest observed activity timestamp per user, across messages sent and
/// reactions left anywhere in the conversation.
fn latest_activity_by_user(messages: &[MessageRecord]) -> HashMap<String, u64> {
    let mut latest: HashMap<String, u64> = HashMap::new();
    for message in messages {
        record_activity(&mut latest, &message.sender_id, message.timestamp_ms);
        for reaction in &message.reactions {
            record_activity(&mut latest, &reaction.user_id, reaction.timestamp_ms);
        }
    }
    latest
}

fn record_activity(latest: &mut HashMap<String, u64>, user_id: &str, timestamp_ms: u64) {
    let entry = latest.entry(user_id.to_owned()).or_insert(timestamp_ms);
    if timestamp_ms > *entry {
        *entry = timestamp_ms;
    }
}

/// Infer a read receipt for the other participant of a 1:1 conversation.
///
/// If the other participant's latest activity (message or reaction)
/// postdates the target message, they must have seen it; the inferred
/// receipt is timestamped at that activity. No activity at all, or only
/// activity predating the target, yields nothing.
pub fn infer_dm_receipts(
    messages: &[MessageRecord],
    local_user_id: &str,
    target: &MessageRecord,
) -> Vec<Receipt> {
    let activity = latest_activity_by_user(messages);
    let other = activity
        .iter()
        .filter(|(user_id, _)| user_id.as_str() != local_user_id)
        .max_by_key(|(_, timestamp_ms)| **timestamp_ms);

    match other {
        Some((user_id, &timestamp_ms)) if timestamp_ms > target.timestamp_ms => {
            vec![Receipt::inferred(
                user_id.clone(),
                ReceiptKind::Read,
                timestamp_ms,
            )]
        }
        _ => Vec::new(),
    }
}

/// Infer receipts for every other member of a group conversation.
///
/// Members with activity after the target message are counted: none means
/// no inference; all means a read receipt for everyone; anything in between
/// means a delivery receipt for everyone. The partial case is a deliberate
/// approximation: one member's activity only proves the transport delivered
/// the message somewhere, so the inference errs toward optimistic delivery
/// for all and never toward read.
pub fn infer_group_receipts(
    messages: &[MessageRecord],
    members: &[String],
    local_user_id: &str,
    target: &MessageRecord,
) -> Vec<Receipt> {
    let activity = latest_activity_by_user(messages);
    let others: Vec<&String> = members
        .iter()
        .filter(|member| member.as_str() != local_user_id)
        .collect();
    if others.is_empty() {
        return Vec::new();
    }

    let post_target = |member: &str| -> Option<u64> {
        activity
            .get(member)
            .copied()
            .filter(|ts| *ts > target.timestamp_ms)
    };

    let active_count = others
        .iter()
        .filter(|member| post_target(member).is_some())
        .count();
    if active_count == 0 {
        return Vec::new();
    }

    let kind = if active_count == others.len() {
        ReceiptKind::Read
    } else {
        ReceiptKind::Delivery
    };

    // Fallback timestamp for members without their own post-target activity.
    let earliest_qualifying = others
        .iter()
        .filter_map(|member| post_target(member))
        .min()
        .unwrap_or(target.timestamp_ms);

    others
        .iter()
        .map(|member| {
            let timestamp_ms = post_target(member).unwrap_or(earliest_qualifying);
            Receipt::inferred((*member).clone(), kind, timestamp_ms)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReactionRecord;

    fn message(id: &str, sender: &str, ts: u64, from_me: bool) -> MessageRecord {
        MessageRecord::new(id, None, sender, from_me, ts)
    }

    fn with_reaction(mut m: MessageRecord, user: &str, ts: u64) -> MessageRecord {
        m.reactions.push(ReactionRecord {
            user_id: user.to_owned(),
            emoji: "❤️".to_owned(),
            timestamp_ms: ts,
        });
        m
    }

    #[test]
    fn dm_reply_after_target_infers_read_at_activity_time() {
        let target = message("m1", "userA", 0, true);
        let messages = vec![target.clone(), message("m2", "userB", 5, false)];

        let inferred = infer_dm_receipts(&messages, "userA", &target);
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].user_id, "userB");
        assert_eq!(inferred[0].kind, ReceiptKind::Read);
        assert_eq!(inferred[0].timestamp_ms, 5);
        assert!(inferred[0].inferred);
    }

    #[test]
    fn dm_reaction_counts_as_activity() {
        let target = message("m1", "userA", 10, true);
        let messages = vec![with_reaction(target.clone(), "userB", 12)];

        let inferred = infer_dm_receipts(&messages, "userA", &target);
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].timestamp_ms, 12);
    }

    #[test]
    fn dm_without_peer_activity_infers_nothing() {
        let target = message("m1", "userA", 0, true);
        let messages = vec![target.clone()];
        assert!(infer_dm_receipts(&messages, "userA", &target).is_empty());
    }

    #[test]
    fn dm_activity_before_target_infers_nothing() {
        let early = message("m0", "userB", 3, false);
        let target = message("m1", "userA", 10, true);
        let messages = vec![early, target.clone()];
        assert!(infer_dm_receipts(&messages, "userA", &target).is_empty());
    }

    #[test]
    fn group_partial_activity_infers_delivery_for_all_others() {
        let members = vec![
            "me".to_owned(),
            "x".to_owned(),
            "y".to_owned(),
            "z".to_owned(),
        ];
        let target = message("m1", "me", 0, true);
        let messages = vec![with_reaction(target.clone(), "x", 1)];

        let inferred = infer_group_receipts(&messages, &members, "me", &target);
        assert_eq!(inferred.len(), 3);
        assert!(inferred.iter().all(|r| r.kind == ReceiptKind::Delivery));
        // x carries its own activity time; y and z fall back to the earliest
        // qualifying activity among members.
        for receipt in &inferred {
            assert_eq!(receipt.timestamp_ms, 1);
        }
    }

    #[test]
    fn group_all_active_infers_read_with_own_timestamps() {
        let members = vec!["me".to_owned(), "x".to_owned(), "y".to_owned()];
        let target = message("m1", "me", 0, true);
        let messages = vec![
            with_reaction(target.clone(), "x", 2),
            message("m2", "y", 7, false),
        ];

        let inferred = infer_group_receipts(&messages, &members, "me", &target);
        assert_eq!(inferred.len(), 2);
        assert!(inferred.iter().all(|r| r.kind == ReceiptKind::Read));
        let x = inferred.iter().find(|r| r.user_id == "x").expect("x");
        let y = inferred.iter().find(|r| r.user_id == "y").expect("y");
        assert_eq!(x.timestamp_ms, 2);
        assert_eq!(y.timestamp_ms, 7);
    }

    #[test]
    fn group_pre_target_activity_is_not_qualifying() {
        let members = vec!["me".to_owned(), "x".to_owned(), "y".to_owned()];
        let early_x = message("m0", "x", 1, false);
        let early_y = message("m0b", "y", 2, false);
        let target = message("m1", "me", 10, true);
        let messages = vec![early_x, early_y, target.clone()];

        assert!(infer_group_receipts(&messages, &members, "me", &target).is_empty());
    }

    #[test]
    fn group_without_members_infers_nothing() {
        let target = message("m1", "me", 0, true);
        let messages = vec![target.clone()];
        assert!(infer_group_receipts(&messages, &[], "me", &target).is_empty());
    }
}
