//! Scripted end-to-end smoke run: boots the engine against a file-backed
//! store, replays a small burst of bus events through the run loop, and
//! prints the derived state. Run it twice to see read-state persistence.

use std::{env, path::PathBuf, process};

use omnichat_core::{EngineChannels, EngineEvent, MessageRecord, SyncPhase, WireEvent};
use omnichat_engine::{EngineConfig, ReconcileEngine, StaticAliasResolver};
use omnichat_platform::JsonFileStore;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

mod logging;

const CONVERSATION: &str = "15551234567@s.whatsapp.net";

#[tokio::main]
async fn main() {
    logging::init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Bad engine configuration: {err}");
            process::exit(1);
        }
    };
    let data_dir = env::var("OMNICHAT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.omnichat-smoke-store"));
    let store = match JsonFileStore::open(&data_dir) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("Failed to open store at {}: {err}", data_dir.display());
            process::exit(1);
        }
    };

    let mut resolver = StaticAliasResolver::new();
    resolver.insert("99887766554433", CONVERSATION);

    let (channels, inbound_rx, mut outbound_rx) = EngineChannels::new(
        config.inbound_buffer,
        config.event_buffer,
        config.outbound_buffer,
    );
    let inbound = channels.inbound_sender();
    let mut events = channels.subscribe();
    let mut engine = ReconcileEngine::new(config, channels, store, resolver, "me");

    let outgoing_id = Uuid::new_v4().to_string();
    engine.open_conversation(
        CONVERSATION,
        vec![MessageRecord::new(&outgoing_id, None, "me", true, 1_000)],
    );

    let stop = CancellationToken::new();
    let stop_for_task = stop.clone();
    let runner = tokio::spawn(async move {
        engine.run(inbound_rx, stop_for_task).await;
        engine
    });

    let burst = [
        WireEvent::new(
            "new-message",
            json!({
                "conversationId": "alias:99887766554433",
                "messageId": Uuid::new_v4().to_string(),
                "senderId": "15557654321",
                "isFromMe": false,
                "timestampMs": 2_000u64
            }),
        ),
        WireEvent::new(
            "receipt",
            json!({
                "conversationId": CONVERSATION,
                "messageId": outgoing_id,
                "receiptType": "read",
                "userId": "15557654321",
                "timestampMs": 2_500u64
            }),
        ),
        WireEvent::new(
            "typing",
            json!({
                "conversationId": CONVERSATION,
                "userId": "15557654321",
                "userName": "Ada",
                "isTyping": true
            }),
        ),
        WireEvent::new(
            "presence",
            json!({ "userId": "15557654321", "isOnline": true, "lastSeen": 2_600u64 }),
        ),
        WireEvent::new("sync-status", json!({ "status": "completed" })),
    ];
    for event in burst {
        if inbound.send(event).await.is_err() {
            eprintln!("Bus send failed: engine loop is gone");
            process::exit(1);
        }
    }

    // sync-status was published last, so seeing its notification means the
    // whole burst has been dispatched.
    loop {
        match events.recv().await {
            Ok(EngineEvent::SyncPhaseChanged {
                phase: SyncPhase::Completed,
            }) => break,
            Ok(event) => println!("notification: {event:?}"),
            Err(err) => {
                eprintln!("Notification stream ended early: {err}");
                process::exit(1);
            }
        }
    }

    stop.cancel();
    let engine = match runner.await {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("Engine task panicked: {err}");
            process::exit(1);
        }
    };

    println!("unread in {CONVERSATION}: {}", engine.unread_count(CONVERSATION));
    println!("badge total: {}", engine.total_unread());
    println!(
        "outgoing message status: {:?}",
        engine.message_status(CONVERSATION, &outgoing_id)
    );
    println!(
        "typing now: {:?}",
        engine
            .typing_users(CONVERSATION)
            .iter()
            .map(|user| user.user_id.as_str())
            .collect::<Vec<_>>()
    );
    println!("peer online: {}", engine.is_online("15557654321"));
    while let Ok(call) = outbound_rx.try_recv() {
        println!("outbound call: {call:?}");
    }
}
