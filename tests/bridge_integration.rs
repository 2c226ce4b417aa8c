//! End-to-end tests for the bridge: messages flow through the same bounded
//! channel the broker listener feeds, into an in-memory document store.

use std::time::Duration;

use bbq_bridge::prelude::*;
use bbq_bridge::store::{CollectionPath, StoredValue};
use tokio::sync::mpsc;

const CAPACITY: usize = 16;

fn sessions() -> CollectionPath {
	CollectionPath::root("sessions")
}

fn message(topic: &str, payload: &str) -> InboundMessage {
	InboundMessage::new(topic, payload.as_bytes().to_vec())
}

/// Feed `messages` through a channel and wait for the bridge to drain it.
async fn run_bridge(
	store: &MemoryStore,
	config: BridgeConfig,
	messages: Vec<InboundMessage>,
) -> BridgeStats {
	let (sender, receiver) = mpsc::channel(CAPACITY);
	let bridge = Bridge::new(store.clone(), config);
	let runner = tokio::spawn(async move { bridge.run(receiver).await });

	for message in messages {
		sender.send(message).await.unwrap();
	}
	drop(sender);

	tokio::time::timeout(Duration::from_secs(5), runner)
		.await
		.expect("bridge did not stop after the channel closed")
		.unwrap()
}

fn readings(store: &MemoryStore, session: &str, signal: &str) -> Vec<f64> {
	store
		.collection(&sessions().doc(session).collection(signal))
		.into_iter()
		.filter_map(|(_, doc)| doc.get("value").and_then(StoredValue::as_f64))
		.collect()
}

#[tokio::test]
async fn test_reading_updates_session_and_appends() {
	let store = MemoryStore::new();

	let stats = run_bridge(&store, BridgeConfig::default(), vec![message(
		"/bbq/session42/temp",
		"72.3",
	)])
	.await;

	assert_eq!(stats, BridgeStats {
		accepted: 1,
		rejected: 0,
		failed: 0
	});

	let session = store.document(&sessions().doc("session42")).unwrap();
	let last_update = session["last_update"].as_timestamp().unwrap();

	let stored = store
		.collection(&sessions().doc("session42").collection("temp"));
	assert_eq!(stored.len(), 1);
	let (_, reading) = &stored[0];
	assert_eq!(reading["value"], StoredValue::Double(72.3));
	assert_eq!(reading["timestamp"].as_timestamp(), Some(last_update));
}

#[tokio::test]
async fn test_malformed_messages_are_skipped() {
	let store = MemoryStore::new();

	let stats = run_bridge(&store, BridgeConfig::default(), vec![
		message("/bbq/a/b/c", "1.0"),
		message("/bbq/command", "start"),
		message("/bbq/s1/temp", "abc"),
		message("/bbq/s1/temp", "101.5"),
	])
	.await;

	assert_eq!(stats.accepted, 1);
	assert_eq!(stats.rejected, 3);
	assert_eq!(stats.failed, 0);

	// Only the valid reading produced documents
	assert_eq!(store.document_count(), 2);
	assert!(store.document(&sessions().doc("a")).is_none());
	assert_eq!(readings(&store, "s1", "temp"), vec![101.5]);
}

#[tokio::test]
async fn test_multiple_signals_and_sessions() {
	let store = MemoryStore::new();

	let stats = run_bridge(&store, BridgeConfig::default(), vec![
		message("/bbq/s1/food_temp_f", "165.000000"),
		message("/bbq/s1/ambient_temp_f", "225.000000"),
		message("/bbq/s1/duty_pct", "0.350000"),
		message("/bbq/s2/food_temp_f", "140.0"),
		message("/bbq/s1/food_temp_f", "166.000000"),
	])
	.await;

	assert_eq!(stats.accepted, 5);
	assert_eq!(readings(&store, "s1", "food_temp_f"), vec![165.0, 166.0]);
	assert_eq!(readings(&store, "s1", "ambient_temp_f"), vec![225.0]);
	assert_eq!(readings(&store, "s1", "duty_pct"), vec![0.35]);
	assert_eq!(readings(&store, "s2", "food_temp_f"), vec![140.0]);

	// One session document per session, merged in place
	assert_eq!(store.collection(&sessions()).len(), 2);
}

#[tokio::test]
async fn test_last_update_tracks_latest_reading() {
	let store = MemoryStore::new();

	run_bridge(&store, BridgeConfig::default(), vec![
		message("/bbq/s1/temp", "1"),
		message("/bbq/s1/temp", "2"),
	])
	.await;

	let last_update = store
		.document(&sessions().doc("s1"))
		.and_then(|doc| doc["last_update"].as_timestamp())
		.unwrap();
	let newest = store
		.collection(&sessions().doc("s1").collection("temp"))
		.into_iter()
		.filter_map(|(_, doc)| doc["timestamp"].as_timestamp())
		.max()
		.unwrap();

	assert_eq!(last_update, newest);
}

#[tokio::test]
async fn test_store_outage_does_not_stop_bridge() {
	let store = MemoryStore::new();
	store.set_unavailable("connection refused");

	let (sender, receiver) = mpsc::channel(CAPACITY);
	let bridge = Bridge::new(store.clone(), BridgeConfig::default());
	let runner = tokio::spawn(async move { bridge.run(receiver).await });

	sender.send(message("/bbq/s1/temp", "70.0")).await.unwrap();
	// Wait until the failed message has been consumed before recovering
	while sender.capacity() < CAPACITY {
		tokio::task::yield_now().await;
	}
	tokio::time::sleep(Duration::from_millis(50)).await;
	store.set_available();

	sender.send(message("/bbq/s1/temp", "71.0")).await.unwrap();
	drop(sender);

	let stats = runner.await.unwrap();
	assert_eq!(stats.accepted, 1);
	assert_eq!(stats.failed, 1);
	assert_eq!(readings(&store, "s1", "temp"), vec![71.0]);
}

#[tokio::test]
async fn test_independent_writes_with_custom_layout() {
	let store = MemoryStore::new();
	let config = BridgeConfig {
		topic_prefix: "smoker".to_string(),
		sessions_collection: "cooks".to_string(),
		write_mode: WriteMode::Independent,
	};

	let stats = run_bridge(&store, config, vec![
		message("/smoker/brisket/temp", "180.5"),
		message("/bbq/brisket/temp", "180.5"),
	])
	.await;

	assert_eq!(stats.accepted, 1);
	assert_eq!(stats.rejected, 1);
	assert_eq!(store.commit_count(), 2);

	let cook = CollectionPath::root("cooks").doc("brisket");
	assert!(store.document(&cook).is_some());
	assert_eq!(store.collection(&cook.collection("temp")).len(), 1);
	assert!(store.document(&sessions().doc("brisket")).is_none());
}
