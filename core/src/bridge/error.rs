use thiserror::Error;

use crate::store::StoreError;
use crate::topic::TopicError;

/// Errors produced while handling one inbound message.
///
/// None of them is fatal to the bridge: the message is dropped and the
/// next one is processed.
#[derive(Debug, Error)]
pub enum BridgeError {
	/// Topic does not have the `/{prefix}/{session}/{signal}` shape
	#[error(transparent)]
	Topic(#[from] TopicError),

	/// Payload could not be decoded into a reading value
	#[error("Malformed payload on topic '{topic}': {source}")]
	Payload {
		/// Topic the payload arrived on
		topic: String,
		/// Decoder error
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	/// Document store refused or failed the writes
	#[error("Failed to store reading from topic '{topic}': {source}")]
	Store {
		/// Topic the reading arrived on
		topic: String,
		/// Store error
		#[source]
		source: StoreError,
	},
}

impl BridgeError {
	/// True for errors caused by the message itself rather than the store
	pub fn is_malformed(&self) -> bool {
		matches!(self, BridgeError::Topic(_) | BridgeError::Payload { .. })
	}
}
