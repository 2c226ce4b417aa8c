//! # BBQ Bridge Core
//!
//! Building blocks of a bridge that subscribes to an MQTT broker and
//! persists telemetry readings into a Firestore-style document database.
//!
//! ## Features
//!
//! - **Topic Parsing**: `/bbq/{session}/{signal}` topics become a typed
//!   identity
//! - **Fallible Payload Decoding**: malformed payloads are errors, not crashes
//! - **Document Writes**: session `last_update` merge plus one reading record,
//!   both stamped with the store's own clock
//! - **Resilient Subscription**: the wildcard filter is re-subscribed on every
//!   (re)connection
//! - **Swappable Stores**: Firestore REST and in-memory implementations of
//!   [`DocumentStore`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bbq_bridge_core::{
//!     Bridge, BridgeConfig, BrokerListener, ListenerConfig, MemoryStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ListenerConfig::new("bbq-bridge", "localhost", 1883)
//!         .with_credentials("bbq-bridge", "secret");
//!     let (inbound, connection) = BrokerListener::start(config)?;
//!
//!     let bridge = Bridge::new(MemoryStore::new(), BridgeConfig::default());
//!     let runner = tokio::spawn(async move { bridge.run(inbound).await });
//!
//!     tokio::signal::ctrl_c().await?;
//!     connection.shutdown().await?;
//!     let stats = runner.await?;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Message handling: topic + payload to document writes
pub mod bridge;
pub mod connection;
pub mod listener;
/// Payload decoding
pub mod payload;
pub mod store;
pub mod topic;

// === Core Public API ===
pub use bridge::{
	Bridge, BridgeConfig, BridgeError, BridgeStats, Delivery, InboundMessage,
	WriteMode,
};
pub use connection::BrokerConnection;
pub use listener::{
	BrokerListener, ListenerConfig, ListenerError, ListenerSettings,
};
pub use payload::{DecimalDecoder, PayloadDecoder, PayloadError};
pub use store::{
	CollectionPath, CommitReceipt, DocumentPath, DocumentStore, FieldValue,
	Fields, FirestoreConfig, FirestoreStore, MemoryStore, StoreError,
	TokenSource, WriteBatch,
};
pub use topic::{ReadingTopic, TopicError};
// Essential external types
pub use rumqttc::{MqttOptions, QoS, TlsConfiguration};

/// Error types used throughout the crate
///
/// ```rust
/// use bbq_bridge_core::errors::*;
/// ```
pub mod errors {
	pub use crate::{
		BridgeError, ListenerError, PayloadError, StoreError, TopicError,
	};
}
