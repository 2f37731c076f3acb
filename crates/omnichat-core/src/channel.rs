use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{EngineEvent, OutboundCall, WireEvent};

/// Broadcast stream of derived-state notifications.
pub type EventStream = broadcast::Receiver<EngineEvent>;

/// Errors returned by engine channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The inbound wire-event receiver side is closed.
    #[error("inbound event channel is closed")]
    InboundClosed,
    /// The outbound call queue is closed or full.
    ///
    /// Outbound calls are at-most-once; a full queue drops the call.
    #[error("outbound call channel is closed or full")]
    OutboundUnavailable,
}

/// Channel set connecting the bus adapter, the engine, and subscribers.
///
/// Wire events flow in over `mpsc`, derived notifications fan out over
/// `broadcast`, and fire-and-forget transport calls leave over a second
/// `mpsc` consumed by whatever implements the outbound RPCs.
#[derive(Clone, Debug)]
pub struct EngineChannels {
    inbound_tx: mpsc::Sender<WireEvent>,
    event_tx: broadcast::Sender<EngineEvent>,
    outbound_tx: mpsc::Sender<OutboundCall>,
}

impl EngineChannels {
    /// Create a channel set and return it with both receiver ends.
    pub fn new(
        inbound_buffer: usize,
        event_buffer: usize,
        outbound_buffer: usize,
    ) -> (
        Self,
        mpsc::Receiver<WireEvent>,
        mpsc::Receiver<OutboundCall>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_buffer.max(1));
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_buffer.max(1));

        (
            Self {
                inbound_tx,
                event_tx,
                outbound_tx,
            },
            inbound_rx,
            outbound_rx,
        )
    }

    /// Clone the inbound sender for the bus adapter.
    pub fn inbound_sender(&self) -> mpsc::Sender<WireEvent> {
        self.inbound_tx.clone()
    }

    /// Subscribe to derived-state notifications.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Publish one wire event toward the engine.
    pub async fn publish(&self, event: WireEvent) -> Result<(), ChannelError> {
        self.inbound_tx
            .send(event)
            .await
            .map_err(|_| ChannelError::InboundClosed)
    }

    /// Emit a derived-state notification to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Queue a fire-and-forget outbound call without blocking dispatch.
    pub fn request(&self, call: OutboundCall) -> Result<(), ChannelError> {
        self.outbound_tx
            .try_send(call)
            .map_err(|_| ChannelError::OutboundUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncPhase;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_wire_events_to_receiver() {
        let (channels, mut inbound_rx, _outbound_rx) = EngineChannels::new(8, 8, 8);
        channels
            .publish(WireEvent::new("contacts-refresh", json!({})))
            .await
            .expect("publish should work");

        let event = inbound_rx.recv().await.expect("receiver should have event");
        assert_eq!(event.name, "contacts-refresh");
    }

    #[tokio::test]
    async fn cloned_inbound_sender_outlives_the_channel_set() {
        let (channels, mut inbound_rx, _outbound_rx) = EngineChannels::new(4, 4, 4);
        let sender = channels.inbound_sender();
        drop(channels);

        sender
            .send(WireEvent::new("contacts-refresh", json!({})))
            .await
            .expect("send should work");
        let event = inbound_rx.recv().await.expect("receiver should have event");
        assert_eq!(event.name, "contacts-refresh");
    }

    #[tokio::test]
    async fn fans_out_notifications_to_subscribers() {
        let (channels, _inbound_rx, _outbound_rx) = EngineChannels::new(4, 16, 4);
        let mut a = channels.subscribe();
        let mut b = channels.subscribe();

        channels.emit(EngineEvent::SyncPhaseChanged {
            phase: SyncPhase::Completed,
        });

        let event_a = a.recv().await.expect("subscriber a should receive event");
        let event_b = b.recv().await.expect("subscriber b should receive event");
        assert_eq!(event_a, event_b);
    }

    #[tokio::test]
    async fn queues_outbound_calls_without_blocking() {
        let (channels, _inbound_rx, mut outbound_rx) = EngineChannels::new(4, 4, 4);
        channels
            .request(OutboundCall::SetBadge { total_unread: 3 })
            .expect("request should queue");

        let call = outbound_rx.recv().await.expect("call should arrive");
        assert_eq!(call, OutboundCall::SetBadge { total_unread: 3 });
    }

    #[tokio::test]
    async fn reports_full_outbound_queue() {
        let (channels, _inbound_rx, _outbound_rx) = EngineChannels::new(4, 4, 1);
        channels
            .request(OutboundCall::SetBadge { total_unread: 1 })
            .expect("first request should queue");
        let err = channels
            .request(OutboundCall::SetBadge { total_unread: 2 })
            .expect_err("second request should be dropped");
        assert!(matches!(err, ChannelError::OutboundUnavailable));
    }
}
