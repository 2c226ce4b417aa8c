//! Reading bridge
//!
//! Turns `(topic, payload)` pairs into document writes: a `last_update`
//! merge on the session document and one new reading record in the
//! session's per-signal sub-collection.

/// Bridge error types
pub mod error;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub use error::BridgeError;

use crate::payload::{DecimalDecoder, PayloadDecoder};
use crate::store::{
	CollectionPath, DocumentPath, DocumentStore, FieldValue, Fields,
	WriteBatch,
};
use crate::topic::{DEFAULT_PREFIX, ReadingTopic};

/// Session document field holding the time of the latest reading
pub const LAST_UPDATE_FIELD: &str = "last_update";
/// Reading field holding the server time of the write
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Reading field holding the decoded value
pub const VALUE_FIELD: &str = "value";
/// Top-level collection of session documents
pub const DEFAULT_SESSIONS_COLLECTION: &str = "sessions";

/// Message as delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
	/// Topic name the message was published on
	pub topic: String,
	/// Raw payload bytes
	pub payload: Bytes,
}

impl InboundMessage {
	/// Create a message from a topic and payload
	pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
		}
	}
}

/// How the two writes of a reading reach the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
	/// Session merge and reading append share one atomic commit
	#[default]
	Atomic,
	/// Session merge and reading append are committed one after another.
	/// A failure of the second leaves the first in place.
	Independent,
}

impl FromStr for WriteMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			| "atomic" => Ok(WriteMode::Atomic),
			| "independent" => Ok(WriteMode::Independent),
			| other => Err(format!(
				"unknown write mode '{other}' (expected 'atomic' or \
				 'independent')"
			)),
		}
	}
}

impl fmt::Display for WriteMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| WriteMode::Atomic => f.write_str("atomic"),
			| WriteMode::Independent => f.write_str("independent"),
		}
	}
}

/// Bridge behavior settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
	/// Topic level expected in front of `{session}/{signal}`
	pub topic_prefix: String,
	/// Top-level collection holding session documents
	pub sessions_collection: String,
	/// Whether the session merge and reading append share one commit
	pub write_mode: WriteMode,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			topic_prefix: DEFAULT_PREFIX.to_string(),
			sessions_collection: DEFAULT_SESSIONS_COLLECTION.to_string(),
			write_mode: WriteMode::default(),
		}
	}
}

/// A reading that made it into the store
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
	/// Session id taken from the topic
	pub session: String,
	/// Signal name taken from the topic
	pub signal: String,
	/// Decoded payload
	pub value: f64,
	/// Path of the newly created reading document
	pub reading: DocumentPath,
	/// Commit time reported by the store for the reading write
	pub commit_time: Option<DateTime<Utc>>,
}

/// Message counters reported when the bridge stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
	/// Readings written to the store
	pub accepted: u64,
	/// Messages dropped for a bad topic or payload
	pub rejected: u64,
	/// Messages dropped because the store failed
	pub failed: u64,
}

impl fmt::Display for BridgeStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"accepted={} rejected={} failed={}",
			self.accepted, self.rejected, self.failed
		)
	}
}

/// Parses inbound messages and writes them to a [`DocumentStore`].
///
/// The store is owned by the bridge; messages are handled one at a time, in
/// the order they are received.
pub struct Bridge<S, D = DecimalDecoder> {
	store: S,
	decoder: D,
	config: BridgeConfig,
	sessions: CollectionPath,
}

impl<S> Bridge<S>
where S: DocumentStore
{
	/// Create a bridge that decodes payloads as decimal text
	pub fn new(store: S, config: BridgeConfig) -> Self {
		Self::with_decoder(store, DecimalDecoder::new(), config)
	}
}

impl<S, D> Bridge<S, D>
where
	S: DocumentStore,
	D: PayloadDecoder,
{
	/// Create a bridge with a custom payload decoder
	pub fn with_decoder(store: S, decoder: D, config: BridgeConfig) -> Self {
		let sessions = CollectionPath::root(config.sessions_collection.clone());
		Self {
			store,
			decoder,
			config,
			sessions,
		}
	}

	/// Document store the bridge writes to
	pub fn store(&self) -> &S {
		&self.store
	}

	/// Bridge settings
	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	/// Parse one message and write it to the store.
	///
	/// Topic and payload are both validated before anything is written, so
	/// a malformed message never leaves a partial update behind.
	pub async fn handle_message(
		&self,
		topic: &str,
		payload: &[u8],
	) -> Result<Delivery, BridgeError> {
		let reading_topic =
			ReadingTopic::parse(topic, &self.config.topic_prefix)?;
		let value =
			self.decoder
				.decode(payload)
				.map_err(|e| BridgeError::Payload {
					topic: topic.to_string(),
					source: Box::new(e),
				})?;

		let session = self.sessions.doc(reading_topic.session());
		let mut batch = WriteBatch::new();
		batch.merge(
			session.clone(),
			Fields::from([(
				LAST_UPDATE_FIELD.to_string(),
				FieldValue::ServerTimestamp,
			)]),
		);
		let reading = batch.add(
			&session.collection(reading_topic.signal()),
			Fields::from([
				(TIMESTAMP_FIELD.to_string(), FieldValue::ServerTimestamp),
				(VALUE_FIELD.to_string(), FieldValue::Double(value)),
			]),
		);

		let store_error = |source| BridgeError::Store {
			topic: topic.to_string(),
			source,
		};
		let commit_time = match self.config.write_mode {
			| WriteMode::Atomic => {
				self.store.commit(batch).await.map_err(store_error)?.commit_time
			}
			| WriteMode::Independent => {
				let mut commit_time = None;
				for write in batch {
					commit_time = self
						.store
						.commit(WriteBatch::from(write))
						.await
						.map_err(store_error)?
						.commit_time;
				}
				commit_time
			}
		};

		Ok(Delivery {
			session: reading_topic.session().to_string(),
			signal: reading_topic.signal().to_string(),
			value,
			reading,
			commit_time,
		})
	}

	/// Drain `inbound` until every sender is gone.
	///
	/// Failures are logged and counted; they never stop the loop.
	pub async fn run(
		&self,
		mut inbound: mpsc::Receiver<InboundMessage>,
	) -> BridgeStats {
		let mut stats = BridgeStats::default();
		info!(
			prefix = %self.config.topic_prefix,
			collection = %self.config.sessions_collection,
			write_mode = %self.config.write_mode,
			"Bridge started"
		);

		while let Some(message) = inbound.recv().await {
			match self.handle_message(&message.topic, &message.payload).await {
				| Ok(delivery) => {
					stats.accepted += 1;
					debug!(
						session = %delivery.session,
						signal = %delivery.signal,
						value = delivery.value,
						reading = %delivery.reading,
						"Stored reading"
					);
				}
				| Err(err) if err.is_malformed() => {
					stats.rejected += 1;
					error!(topic = %message.topic, error = %err, "Dropped malformed message");
				}
				| Err(err) => {
					stats.failed += 1;
					error!(topic = %message.topic, error = %err, "Failed to store reading");
				}
			}
		}

		info!(%stats, "Inbound channel closed, bridge stopped");
		stats
	}
}
