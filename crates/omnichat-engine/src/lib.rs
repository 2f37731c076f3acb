//! Event-driven reconciliation runtime.
//!
//! The engine consumes opaque wire events from the backend bus, keeps the
//! read-state, message cache, presence, and typing stores consistent, and
//! broadcasts derived-state notifications for frontends. All mutation
//! happens synchronously inside dispatch; the only asynchronous boundaries
//! are the fire-and-forget outbound queue and the periodic typing sweep.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use omnichat_core::{
    BusEvent, DeliveryStatus, EngineChannels, EngineEvent, MessageCache,
    MessageRecord, NewMessagePayload, OutboundCall, ParticipantStatus, PresencePayload,
    PresenceTracker, ReactionPayload, ReadStateStore, Receipt, ReceiptKind, ReceiptPayload,
    StatusSummary, TypingPayload, TypingTracker, TypingUser, WireEvent, group_breakdown, identity,
    infer_dm_receipts, infer_group_receipts, merge_receipts, message_status, status_summary,
};
use omnichat_platform::{KeyValueStore, StoreError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

mod config;
mod resolver;

pub use config::{ConfigError, EngineConfig};
pub use resolver::{AliasResolver, StaticAliasResolver};

/// Read-state reconciliation engine.
///
/// Single-threaded by construction: callers either drive it through
/// [`run`](Self::run) or feed it synchronously via
/// [`handle_wire`](Self::handle_wire) and the local-user operations.
pub struct ReconcileEngine<S: KeyValueStore, R: AliasResolver> {
    channels: EngineChannels,
    config: EngineConfig,
    local_user_id: String,
    read_state: ReadStateStore,
    cache: MessageCache,
    presence: PresenceTracker,
    typing: TypingTracker,
    store: S,
    resolver: R,
    last_badge: Option<u64>,
}

impl<S: KeyValueStore, R: AliasResolver> ReconcileEngine<S, R> {
    /// Build an engine, loading persisted read-state eagerly.
    ///
    /// Missing or corrupt persisted data degrades to an empty store.
    pub fn new(
        config: EngineConfig,
        channels: EngineChannels,
        store: S,
        resolver: R,
        local_user_id: impl Into<String>,
    ) -> Self {
        let read_state = load_read_state(&store, &config.read_state_key);
        let cache = MessageCache::new(config.max_cached_messages);
        Self {
            channels,
            local_user_id: local_user_id.into(),
            read_state,
            cache,
            presence: PresenceTracker::default(),
            typing: TypingTracker::default(),
            store,
            resolver,
            last_badge: None,
            config,
        }
    }

    /// Drive the engine until the bus closes or the token is cancelled.
    ///
    /// Wire events and sweep ticks interleave on one task, so no locking is
    /// needed around the stores.
    pub async fn run(&mut self, mut inbound_rx: mpsc::Receiver<WireEvent>, stop: CancellationToken) {
        let mut sweep =
            tokio::time::interval(Duration::from_millis(self.config.typing_sweep_interval_ms));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                maybe_wire = inbound_rx.recv() => match maybe_wire {
                    Some(wire) => self.handle_wire(&wire),
                    None => break,
                },
                _ = sweep.tick() => self.sweep_typing(now_millis()),
            }
        }
        debug!("reconcile engine loop exited");
    }

    /// Feed one wire event through parse, normalize, and dispatch.
    ///
    /// Malformed payloads and unresolvable identifiers are logged and
    /// dropped; no failure here propagates.
    pub fn handle_wire(&mut self, wire: &WireEvent) {
        let event = match BusEvent::parse(wire) {
            Ok(event) => event,
            Err(err) => {
                warn!(name = %wire.name, error = %err, "dropping malformed bus event");
                return;
            }
        };

        match event {
            BusEvent::NewMessage(payload) => self.on_new_message(payload),
            BusEvent::Receipt(payload) => self.on_receipt(payload),
            BusEvent::Reaction(payload) => self.on_reaction(payload),
            BusEvent::Typing(payload) => self.on_typing(payload),
            BusEvent::Presence(payload) => self.on_presence(payload),
            BusEvent::SyncStatus(phase) => {
                self.channels.emit(EngineEvent::SyncPhaseChanged { phase });
            }
            BusEvent::ContactsRefresh => {
                self.channels.emit(EngineEvent::ContactsRefreshed);
                self.publish_badge();
            }
        }
    }

    /// Bulk-sync one conversation's history into the cache and read-state.
    pub fn open_conversation(&mut self, conversation_id: &str, messages: Vec<MessageRecord>) {
        let message_ids: Vec<String> = messages
            .iter()
            .map(|message| message.message_id.clone())
            .collect();
        self.cache.sync_conversation(conversation_id, messages);

        if self.read_state.sync_conversation(conversation_id, &message_ids) {
            self.persist();
            self.emit_unread(conversation_id);
            self.publish_badge();
        }
    }

    /// Record that the local user viewed a message.
    ///
    /// The outbound mark-read call fires exactly once per `false -> true`
    /// transition; repeats are a complete no-op.
    pub fn mark_displayed(&mut self, conversation_id: &str, message_id: &str) {
        if !self.read_state.mark_as_read(conversation_id, message_id) {
            return;
        }
        self.request_outbound(OutboundCall::MarkRead {
            conversation_id: conversation_id.to_owned(),
            message_id: message_id.to_owned(),
        });
        self.persist();
        self.emit_unread(conversation_id);
        self.publish_badge();
    }

    /// Drop all local state for a conversation (cache-reset maintenance).
    pub fn clear_conversation(&mut self, conversation_id: &str) {
        let had_entries = self.read_state.clear_conversation(conversation_id);
        self.cache.clear_conversation(conversation_id);
        if had_entries {
            self.persist();
            self.emit_unread(conversation_id);
            self.publish_badge();
        }
    }

    /// Replace a group conversation's membership roster.
    pub fn set_members(&mut self, conversation_id: &str, members: Vec<String>) {
        self.cache.set_members(conversation_id, members);
    }

    /// Aggregate display status for a cached message.
    pub fn message_status(&self, conversation_id: &str, message_id: &str) -> Option<DeliveryStatus> {
        let message = self.cache.find_message(conversation_id, message_id)?;
        let merged = self.merged_receipts(conversation_id, message);
        Some(message_status(&merged, &message.sender_id))
    }

    /// Per-participant breakdown for a cached group message.
    pub fn group_breakdown(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Option<Vec<ParticipantStatus>> {
        let message = self.cache.find_message(conversation_id, message_id)?;
        let merged = self.merged_receipts(conversation_id, message);
        Some(group_breakdown(
            &merged,
            self.cache.members(conversation_id),
            &message.sender_id,
        ))
    }

    /// Collapsed summary counts for a cached group message.
    pub fn status_summary(&self, conversation_id: &str, message_id: &str) -> Option<StatusSummary> {
        self.group_breakdown(conversation_id, message_id)
            .map(|breakdown| status_summary(&breakdown))
    }

    /// Unread count for one conversation.
    pub fn unread_count(&self, conversation_id: &str) -> u64 {
        self.read_state.unread_count(conversation_id)
    }

    /// Unread total across all conversations.
    pub fn total_unread(&self) -> u64 {
        self.read_state.total_unread()
    }

    /// Users currently typing in a conversation.
    pub fn typing_users(&self, conversation_id: &str) -> Vec<TypingUser> {
        self.typing
            .typing_in(conversation_id)
            .iter()
            .map(|entry| TypingUser {
                user_id: entry.user_id.clone(),
                user_name: entry.user_name.clone(),
            })
            .collect()
    }

    /// Whether a user is currently online.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.presence.is_online(user_id)
    }

    /// Last-seen timestamp when the backend has reported one.
    pub fn last_seen_ms(&self, user_id: &str) -> Option<u64> {
        self.presence.last_seen_ms(user_id)
    }

    /// Expire stale typing entries and notify affected conversations.
    pub fn sweep_typing(&mut self, now_ms: u64) {
        let changed = self.typing.sweep(now_ms, self.config.typing_staleness_ms);
        for conversation_id in changed {
            let users = self.typing_users(&conversation_id);
            self.channels.emit(EngineEvent::TypingChanged {
                conversation_id,
                users,
            });
        }
    }

    fn on_new_message(&mut self, payload: NewMessagePayload) {
        let Some(conversation_id) = self.normalize_conversation(&payload.conversation_id) else {
            return;
        };
        let message_id = identity::message_key(
            payload.message_id.as_deref(),
            payload.row_id,
            payload.timestamp_ms,
        );
        let record = MessageRecord::new(
            message_id.clone(),
            payload.message_id.clone(),
            payload.sender_id,
            payload.is_from_me,
            payload.timestamp_ms,
        );
        self.cache.upsert_message(&conversation_id, record);

        if self.read_state.register_incoming(&conversation_id, &message_id) {
            self.persist();
            self.emit_unread(&conversation_id);
            self.publish_badge();
        }
    }

    fn on_receipt(&mut self, payload: ReceiptPayload) {
        let Some(conversation_id) = self.normalize_conversation(&payload.conversation_id) else {
            return;
        };
        let receipt = Receipt::authoritative(
            payload.user_id.clone(),
            payload.receipt_type,
            payload.timestamp_ms,
        );
        if !self
            .cache
            .attach_receipt(&conversation_id, &payload.message_id, receipt)
        {
            trace!(
                conversation_id = %conversation_id,
                message_id = %payload.message_id,
                "receipt arrived before its message; cache attach skipped"
            );
        }
        self.channels.emit(EngineEvent::MessageStatusChanged {
            conversation_id: conversation_id.clone(),
            message_id: payload.message_id.clone(),
        });

        if payload.receipt_type == ReceiptKind::Read {
            self.mark_read_by_protocol_id(&conversation_id, &payload.message_id);
        }
    }

    /// Mark-as-read keyed by whatever identifier the backend supplied.
    ///
    /// The identifier is mapped to the cached message's local key when the
    /// message is known; otherwise the flag is written defensively under
    /// the protocol id so a later-arriving message is not spuriously
    /// unread. No outbound call fires here: the transition originated at
    /// the backend, so echoing a mark-read RPC back at it would loop.
    fn mark_read_by_protocol_id(&mut self, conversation_id: &str, protocol_id: &str) {
        let local_id = self
            .cache
            .find_message(conversation_id, protocol_id)
            .map(|message| message.message_id.clone())
            .unwrap_or_else(|| protocol_id.to_owned());

        if self.read_state.mark_as_read(conversation_id, &local_id) {
            self.persist();
            self.emit_unread(conversation_id);
            self.publish_badge();
        }
    }

    fn on_reaction(&mut self, payload: ReactionPayload) {
        let Some(conversation_id) = self.normalize_conversation(&payload.conversation_id) else {
            return;
        };
        if !self.cache.apply_reaction(
            &conversation_id,
            &payload.message_id,
            &payload.user_id,
            &payload.emoji,
            payload.added,
            payload.timestamp_ms,
        ) {
            trace!(
                conversation_id = %conversation_id,
                message_id = %payload.message_id,
                "reaction for unknown message dropped"
            );
            return;
        }
        self.channels.emit(EngineEvent::MessageStatusChanged {
            conversation_id,
            message_id: payload.message_id,
        });
    }

    fn on_typing(&mut self, payload: TypingPayload) {
        let Some(conversation_id) = self.normalize_conversation(&payload.conversation_id) else {
            return;
        };
        if payload.is_typing {
            self.typing.set_typing(
                &conversation_id,
                &payload.user_id,
                payload.user_name,
                now_millis(),
            );
        } else if !self.typing.set_not_typing(&conversation_id, &payload.user_id) {
            return;
        }
        let users = self.typing_users(&conversation_id);
        self.channels.emit(EngineEvent::TypingChanged {
            conversation_id,
            users,
        });
    }

    fn on_presence(&mut self, payload: PresencePayload) {
        self.presence
            .apply(&payload.user_id, payload.is_online, payload.last_seen);
        self.channels.emit(EngineEvent::PresenceChanged {
            user_id: payload.user_id,
            is_online: payload.is_online,
            last_seen_ms: payload.last_seen,
        });
    }

    fn normalize_conversation(&self, raw: &str) -> Option<String> {
        if !identity::is_alias_form(raw) {
            return Some(raw.to_owned());
        }
        match self.resolver.resolve(identity::alias_body(raw)) {
            Ok(canonical) => Some(canonical),
            Err(err) => {
                warn!(alias = %raw, error = %err, "dropping event for unresolvable conversation alias");
                None
            }
        }
    }

    fn merged_receipts(&self, conversation_id: &str, message: &MessageRecord) -> Vec<Receipt> {
        // Inference only applies to the local user's own messages; incoming
        // messages carry whatever the backend pushed.
        let inferred = if !message.is_from_me {
            Vec::new()
        } else {
            let members = self.cache.members(conversation_id);
            let history = self.cache.messages(conversation_id);
            if members.is_empty() {
                infer_dm_receipts(history, &self.local_user_id, message)
            } else {
                infer_group_receipts(history, members, &self.local_user_id, message)
            }
        };
        merge_receipts(&message.receipts, &inferred)
    }

    fn emit_unread(&self, conversation_id: &str) {
        self.channels.emit(EngineEvent::UnreadChanged {
            conversation_id: conversation_id.to_owned(),
            unread: self.read_state.unread_count(conversation_id),
        });
    }

    fn publish_badge(&mut self) {
        let total_unread = self.read_state.total_unread();
        if self.last_badge == Some(total_unread) {
            return;
        }
        self.last_badge = Some(total_unread);
        self.channels.emit(EngineEvent::BadgeChanged { total_unread });
        self.request_outbound(OutboundCall::SetBadge { total_unread });
    }

    fn request_outbound(&self, call: OutboundCall) {
        if let Err(err) = self.channels.request(call) {
            warn!(error = %err, "outbound call dropped");
        }
    }

    fn persist(&self) {
        let encoded = match serde_json::to_string(&self.read_state) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "encoding read-state failed; skipping persistence");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.config.read_state_key, &encoded) {
            warn!(error = %err, "persisting read-state failed; continuing in memory");
        }
    }
}

fn load_read_state<S: KeyValueStore>(store: &S, key: &str) -> ReadStateStore {
    let raw = match store.get(key) {
        Ok(raw) => raw,
        Err(StoreError::NotFound) => {
            debug!(key, "no persisted read-state; starting empty");
            return ReadStateStore::default();
        }
        Err(err) => {
            warn!(key, error = %err, "loading read-state failed; starting empty");
            return ReadStateStore::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(read_state) => read_state,
        Err(err) => {
            warn!(key, error = %err, "persisted read-state is corrupt; starting empty");
            ReadStateStore::default()
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
