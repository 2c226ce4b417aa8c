//! # BBQ Bridge
//!
//! Subscribes to `/bbq/#` on an MQTT broker and persists every reading
//! published as `/bbq/{session}/{signal}` into Firestore:
//!
//! - `sessions/{session}` gets `last_update` set to the server time
//! - `sessions/{session}/{signal}` gains `{timestamp, value}`
//!
//! Malformed topics and payloads are logged and dropped; store failures are
//! logged and the bridge keeps going.
//!
//! ## Running
//!
//! ```bash
//! MQTT_HOST=mqtt.example.com MQTT_USER=bbq-bridge MQTT_PASSWORD=... \
//! FIRESTORE_PROJECT=my-project bbq-bridge
//! ```
//!
//! See [`settings`] for every supported variable.
//!
//! ## Library use
//!
//! ```rust
//! use bbq_bridge::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let bridge = Bridge::new(store.clone(), BridgeConfig::default());
//!
//! let delivery = bridge
//!     .handle_message("/bbq/session42/temp", b"72.3")
//!     .await
//!     .unwrap();
//! assert_eq!(delivery.session, "session42");
//! assert_eq!(store.document_count(), 2);
//! # }
//! ```

pub mod logging;
pub mod settings;

pub use bbq_bridge_core::*;
pub use settings::{Settings, SettingsError};

/// Prelude module for convenient imports
///
/// ```rust
/// use bbq_bridge::prelude::*;
/// ```
pub mod prelude {
	pub use bbq_bridge_core::{
		Bridge, BridgeConfig, BridgeError, BridgeStats, BrokerConnection,
		BrokerListener, DocumentStore, FirestoreStore, InboundMessage,
		ListenerConfig, MemoryStore, WriteMode,
	};

	pub use crate::{Settings, SettingsError};
}
