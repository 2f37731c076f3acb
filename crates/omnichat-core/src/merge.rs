//! Combining authoritative and inferred receipts into one view.

use std::collections::HashSet;

use crate::types::Receipt;

/// Merge authoritative and inferred receipts, authoritative always winning.
///
/// Every authoritative receipt is kept verbatim; an inferred receipt is
/// appended only when its user has no authoritative receipt at all,
/// regardless of receipt kind or recency. That makes the result independent
/// of the order the underlying bus events arrived in.
pub fn merge_receipts(authoritative: &[Receipt], inferred: &[Receipt]) -> Vec<Receipt> {
    let mut merged = authoritative.to_vec();
    let mut seen_users: HashSet<&str> = authoritative
        .iter()
        .map(|receipt| receipt.user_id.as_str())
        .collect();

    for receipt in inferred {
        if seen_users.insert(receipt.user_id.as_str()) {
            merged.push(receipt.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReceiptKind;

    #[test]
    fn keeps_authoritative_verbatim_and_appends_unseen_inferred() {
        let authoritative = vec![Receipt::authoritative("u1", ReceiptKind::Delivery, 10)];
        let inferred = vec![
            Receipt::inferred("u1", ReceiptKind::Read, 99),
            Receipt::inferred("u2", ReceiptKind::Read, 20),
        ];

        let merged = merge_receipts(&authoritative, &inferred);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], authoritative[0]);
        assert_eq!(merged[1].user_id, "u2");
        assert!(merged[1].inferred);
    }

    #[test]
    fn authoritative_suppresses_newer_inferred_for_same_user() {
        // Correctness rule, not freshness: a stale authoritative delivery
        // still beats a fresh inferred read.
        let authoritative = vec![Receipt::authoritative("u1", ReceiptKind::Delivery, 1)];
        let inferred = vec![Receipt::inferred("u1", ReceiptKind::Read, 100)];

        let merged = merge_receipts(&authoritative, &inferred);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, ReceiptKind::Delivery);
        assert!(!merged[0].inferred);
    }

    #[test]
    fn contains_every_user_exactly_once() {
        let authoritative = vec![
            Receipt::authoritative("u1", ReceiptKind::Read, 5),
            Receipt::authoritative("u2", ReceiptKind::Delivery, 6),
        ];
        let inferred = vec![
            Receipt::inferred("u2", ReceiptKind::Read, 9),
            Receipt::inferred("u3", ReceiptKind::Read, 9),
            Receipt::inferred("u3", ReceiptKind::Delivery, 4),
        ];

        let merged = merge_receipts(&authoritative, &inferred);
        let mut users: Vec<&str> = merged.iter().map(|r| r.user_id.as_str()).collect();
        users.sort_unstable();
        assert_eq!(users, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn empty_inputs_merge_cleanly() {
        assert!(merge_receipts(&[], &[]).is_empty());
        let inferred = vec![Receipt::inferred("u1", ReceiptKind::Read, 1)];
        assert_eq!(merge_receipts(&[], &inferred), inferred);
    }
}
