//! Status aggregation over merged receipt sets.

use serde::{Deserialize, Serialize};

use crate::types::{DeliveryStatus, Receipt, ReceiptKind};

/// Per-participant status row for group conversations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantStatus {
    pub user_id: String,
    pub status: DeliveryStatus,
}

/// Collapsed group summary ("3 read, 1 delivered").
///
/// Counts never double-count a participant: `sent` is surfaced only while
/// nobody has reached a higher state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub read: u64,
    pub delivered: u64,
    pub sent: u64,
}

/// Aggregate display status for a message from its merged receipt set.
///
/// Receipts from the sender are excluded; senders are not recipients of
/// their own message. Highest state wins: read > delivered > sent.
pub fn message_status(receipts: &[Receipt], sender_id: &str) -> DeliveryStatus {
    receipts
        .iter()
        .filter(|receipt| receipt.user_id != sender_id)
        .map(|receipt| match receipt.kind {
            ReceiptKind::Read => DeliveryStatus::Read,
            ReceiptKind::Delivery => DeliveryStatus::Delivered,
        })
        .max()
        .unwrap_or(DeliveryStatus::Sent)
}

/// Per-participant breakdown for a group message.
///
/// A participant with a read receipt is categorized as read even when a
/// stale delivery receipt also exists for them; a rostered participant with
/// no receipt at all is the baseline `Sent`.
pub fn group_breakdown(
    receipts: &[Receipt],
    members: &[String],
    sender_id: &str,
) -> Vec<ParticipantStatus> {
    members
        .iter()
        .filter(|member| member.as_str() != sender_id)
        .map(|member| {
            let status = receipts
                .iter()
                .filter(|receipt| &receipt.user_id == member)
                .map(|receipt| match receipt.kind {
                    ReceiptKind::Read => DeliveryStatus::Read,
                    ReceiptKind::Delivery => DeliveryStatus::Delivered,
                })
                .max()
                .unwrap_or(DeliveryStatus::Sent);
            ParticipantStatus {
                user_id: member.clone(),
                status,
            }
        })
        .collect()
}

/// Collapse a breakdown into display counts.
pub fn status_summary(breakdown: &[ParticipantStatus]) -> StatusSummary {
    let read = breakdown
        .iter()
        .filter(|p| p.status == DeliveryStatus::Read)
        .count() as u64;
    let delivered = breakdown
        .iter()
        .filter(|p| p.status == DeliveryStatus::Delivered)
        .count() as u64;
    let baseline_sent = breakdown
        .iter()
        .filter(|p| p.status == DeliveryStatus::Sent)
        .count() as u64;

    StatusSummary {
        read,
        delivered,
        sent: if read == 0 && delivered == 0 {
            baseline_sent
        } else {
            0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn highest_state_wins_for_aggregate_status() {
        let receipts = vec![
            Receipt::authoritative("u2", ReceiptKind::Delivery, 5),
            Receipt::authoritative("u3", ReceiptKind::Read, 6),
        ];
        assert_eq!(message_status(&receipts, "me"), DeliveryStatus::Read);
    }

    #[test]
    fn sender_receipts_are_excluded() {
        let receipts = vec![Receipt::authoritative("me", ReceiptKind::Read, 5)];
        assert_eq!(message_status(&receipts, "me"), DeliveryStatus::Sent);
    }

    #[test]
    fn no_receipts_means_sent() {
        assert_eq!(message_status(&[], "me"), DeliveryStatus::Sent);
    }

    #[test]
    fn breakdown_distinguishes_users_behind_the_aggregate() {
        let receipts = vec![
            Receipt::authoritative("u2", ReceiptKind::Delivery, 5),
            Receipt::authoritative("u3", ReceiptKind::Read, 6),
        ];
        let breakdown = group_breakdown(&receipts, &members(&["me", "u2", "u3", "u4"]), "me");

        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].user_id, "u2");
        assert_eq!(breakdown[0].status, DeliveryStatus::Delivered);
        assert_eq!(breakdown[1].status, DeliveryStatus::Read);
        assert_eq!(breakdown[2].status, DeliveryStatus::Sent);
    }

    #[test]
    fn read_implies_delivered_for_a_participant() {
        let receipts = vec![
            Receipt::authoritative("u2", ReceiptKind::Delivery, 5),
            Receipt::authoritative("u2", ReceiptKind::Read, 9),
        ];
        let breakdown = group_breakdown(&receipts, &members(&["me", "u2"]), "me");
        assert_eq!(breakdown[0].status, DeliveryStatus::Read);
    }

    #[test]
    fn summary_suppresses_sent_when_higher_state_exists() {
        let receipts = vec![Receipt::authoritative("u2", ReceiptKind::Read, 5)];
        let breakdown = group_breakdown(&receipts, &members(&["me", "u2", "u3"]), "me");
        let summary = status_summary(&breakdown);

        assert_eq!(summary.read, 1);
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.sent, 0);
    }

    #[test]
    fn summary_shows_sent_only_as_baseline() {
        let breakdown = group_breakdown(&[], &members(&["me", "u2", "u3"]), "me");
        let summary = status_summary(&breakdown);

        assert_eq!(summary.read, 0);
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.sent, 2);
    }

    #[test]
    fn summary_keeps_delivered_alongside_read() {
        let receipts = vec![
            Receipt::authoritative("u2", ReceiptKind::Read, 5),
            Receipt::authoritative("u3", ReceiptKind::Delivery, 4),
        ];
        let breakdown = group_breakdown(&receipts, &members(&["me", "u2", "u3", "u4"]), "me");
        let summary = status_summary(&breakdown);

        assert_eq!(summary.read, 1);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.sent, 0);
    }
}
