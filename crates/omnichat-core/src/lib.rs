//! Core read-state and delivery-status reconciliation logic shared by the
//! omnichat engine and its frontends.
//!
//! This crate defines the bus event contract, the read-state store, receipt
//! inference and merge, status aggregation, and the ephemeral presence and
//! typing trackers. Everything here is pure state and policy; I/O lives in
//! `omnichat-engine` and `omnichat-platform`.

/// Inbound/outbound channel primitives.
pub mod channel;
/// Stable engine error types and failure categories.
pub mod error;
/// Message and conversation identifier normalization.
pub mod identity;
/// Heuristic receipt inference from reply/reaction activity.
pub mod inference;
/// Authoritative-wins receipt merge.
pub mod merge;
/// Per-conversation message cache and group rosters.
pub mod messages;
/// Ephemeral presence tracking.
pub mod presence;
/// Persistent per-message read flags.
pub mod readstate;
/// Status aggregation and badge derivation helpers.
pub mod status;
/// Ephemeral typing indicators with staleness expiry.
pub mod typing;
/// Bus event contract and derived-state notification types.
pub mod types;

pub use channel::{ChannelError, EngineChannels, EventStream};
pub use error::{EngineError, EngineErrorCategory};
pub use inference::{infer_dm_receipts, infer_group_receipts};
pub use merge::merge_receipts;
pub use messages::MessageCache;
pub use presence::{PresenceEntry, PresenceTracker};
pub use readstate::ReadStateStore;
pub use status::{ParticipantStatus, StatusSummary, group_breakdown, message_status, status_summary};
pub use typing::{TYPING_STALENESS_MS, TypingEntry, TypingTracker};
pub use types::{
    BusEvent, DeliveryStatus, EngineEvent, MessageRecord, NewMessagePayload, OutboundCall,
    PresencePayload, ReactionPayload, ReactionRecord, Receipt, ReceiptKind, ReceiptPayload,
    SyncPhase, TypingPayload, TypingUser, WireEvent,
};
