use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Acknowledgment kind attached to a (conversation, message) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    /// The message reached the recipient's device.
    Delivery,
    /// The recipient viewed the message.
    Read,
}

/// Timestamped acknowledgment attributable to a specific user.
///
/// `inferred` distinguishes locally derived receipts from authoritative
/// ones pushed by the backend. Inferred receipts are never persisted; they
/// are recomputed on demand from message/reaction activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    /// User the acknowledgment is attributed to.
    pub user_id: String,
    /// Delivery or read.
    pub kind: ReceiptKind,
    /// Milliseconds since Unix epoch.
    pub timestamp_ms: u64,
    /// Whether this receipt was derived locally rather than pushed.
    pub inferred: bool,
}

impl Receipt {
    /// Build an authoritative receipt as pushed by the backend.
    pub fn authoritative(user_id: impl Into<String>, kind: ReceiptKind, timestamp_ms: u64) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            timestamp_ms,
            inferred: false,
        }
    }

    /// Build a locally inferred receipt.
    pub fn inferred(user_id: impl Into<String>, kind: ReceiptKind, timestamp_ms: u64) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            timestamp_ms,
            inferred: true,
        }
    }
}

/// Reaction left on a message; feeds receipt inference as an activity proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionRecord {
    pub user_id: String,
    pub emoji: String,
    pub timestamp_ms: u64,
}

/// Cached message with everything reconciliation needs: identity, sender,
/// attached receipts, and reaction activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    /// Stable local identifier (see `identity::message_key`).
    pub message_id: String,
    /// Protocol-native identifier when the provider assigned one.
    pub protocol_id: Option<String>,
    pub sender_id: String,
    /// Whether the local user sent this message.
    pub is_from_me: bool,
    pub timestamp_ms: u64,
    /// Authoritative receipts attached from `receipt` bus events.
    pub receipts: Vec<Receipt>,
    pub reactions: Vec<ReactionRecord>,
}

impl MessageRecord {
    /// Build a bare message with no receipts or reactions attached yet.
    pub fn new(
        message_id: impl Into<String>,
        protocol_id: Option<String>,
        sender_id: impl Into<String>,
        is_from_me: bool,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            protocol_id,
            sender_id: sender_id.into(),
            is_from_me,
            timestamp_ms,
            receipts: Vec::new(),
            reactions: Vec::new(),
        }
    }
}

/// Display status for an outgoing message. Ordering is strict:
/// `Read > Delivered > Sent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

/// Backend sync lifecycle marker; not part of read-state itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    FetchingContacts,
    FetchingHistory,
    FetchingAvatars,
    Completed,
    Error,
}

/// Named event as delivered by the backend's publish/subscribe channel.
///
/// The payload stays opaque until dispatch; `BusEvent::parse` applies the
/// schema contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl WireEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// `new-message` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub conversation_id: String,
    /// Protocol-native message identifier when already assigned.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Local database row id, available before server persistence completes.
    #[serde(default)]
    pub row_id: Option<i64>,
    pub sender_id: String,
    pub is_from_me: bool,
    pub timestamp_ms: u64,
}

/// `receipt` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    pub conversation_id: String,
    pub message_id: String,
    pub receipt_type: ReceiptKind,
    pub user_id: String,
    pub timestamp_ms: u64,
}

/// `reaction` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub conversation_id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub added: bool,
    pub timestamp_ms: u64,
}

/// `typing` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub is_typing: bool,
}

/// `presence` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: String,
    pub is_online: bool,
    pub last_seen: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct SyncStatusPayload {
    status: SyncPhase,
}

/// Parsed bus event, one variant per backend event name.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    NewMessage(NewMessagePayload),
    Receipt(ReceiptPayload),
    Reaction(ReactionPayload),
    Typing(TypingPayload),
    Presence(PresencePayload),
    SyncStatus(SyncPhase),
    ContactsRefresh,
}

impl BusEvent {
    /// Apply the event schema contract to an opaque wire event.
    ///
    /// Unknown names and malformed payloads both surface as parse errors;
    /// callers drop the event after logging.
    pub fn parse(wire: &WireEvent) -> Result<Self, EngineError> {
        let payload = wire.payload.clone();
        match wire.name.as_str() {
            "new-message" => serde_json::from_value(payload)
                .map(BusEvent::NewMessage)
                .map_err(|err| EngineError::parse("new_message_payload", err.to_string())),
            "receipt" => serde_json::from_value(payload)
                .map(BusEvent::Receipt)
                .map_err(|err| EngineError::parse("receipt_payload", err.to_string())),
            "reaction" => serde_json::from_value(payload)
                .map(BusEvent::Reaction)
                .map_err(|err| EngineError::parse("reaction_payload", err.to_string())),
            "typing" => serde_json::from_value(payload)
                .map(BusEvent::Typing)
                .map_err(|err| EngineError::parse("typing_payload", err.to_string())),
            "presence" => serde_json::from_value(payload)
                .map(BusEvent::Presence)
                .map_err(|err| EngineError::parse("presence_payload", err.to_string())),
            "sync-status" => serde_json::from_value::<SyncStatusPayload>(payload)
                .map(|p| BusEvent::SyncStatus(p.status))
                .map_err(|err| EngineError::parse("sync_status_payload", err.to_string())),
            "contacts-refresh" => Ok(BusEvent::ContactsRefresh),
            other => Err(EngineError::parse(
                "unknown_event",
                format!("unrecognized bus event name '{other}'"),
            )),
        }
    }
}

/// Typing participant snapshot forwarded to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingUser {
    pub user_id: String,
    pub user_name: Option<String>,
}

/// Derived-state notifications broadcast to frontend subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineEvent {
    /// A conversation's unread count changed.
    UnreadChanged {
        conversation_id: String,
        unread: u64,
    },
    /// The process-wide badge total changed.
    BadgeChanged { total_unread: u64 },
    /// A message's merged receipt view may have changed.
    MessageStatusChanged {
        conversation_id: String,
        message_id: String,
    },
    /// The set of users typing in a conversation changed.
    TypingChanged {
        conversation_id: String,
        users: Vec<TypingUser>,
    },
    /// A user's presence flipped.
    PresenceChanged {
        user_id: String,
        is_online: bool,
        last_seen_ms: u64,
    },
    /// Backend sync lifecycle marker.
    SyncPhaseChanged { phase: SyncPhase },
    /// The contact set was refreshed upstream.
    ContactsRefreshed,
}

/// Fire-and-forget outbound calls handed to the transport layer.
///
/// Failures are logged by the transport and never rolled back; the local
/// state stays authoritative for UI purposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutboundCall {
    /// Notify the backend that the local user read a message.
    MarkRead {
        conversation_id: String,
        message_id: String,
    },
    /// Forward the total unread count to the tray badge sink.
    SetBadge { total_unread: u64 },
}
