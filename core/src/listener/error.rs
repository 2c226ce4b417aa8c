use rumqttc::ClientError;
use thiserror::Error;

/// Errors raised by the broker listener
#[derive(Debug, Error)]
pub enum ListenerError {
	/// Request could not be handed to the rumqttc event loop
	#[error("Client operation failed: {0}")]
	ClientOperation(#[from] ClientError),

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Event loop task panicked or was cancelled
	#[error("Event loop task failed: {0}")]
	EventLoopTask(#[from] tokio::task::JoinError),
}
