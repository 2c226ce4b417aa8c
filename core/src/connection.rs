//! MQTT connection management module
//!
//! This module provides the connection lifecycle handle returned by
//! [`BrokerListener::start`](crate::listener::BrokerListener::start).

use std::time::Duration;

use rumqttc::AsyncClient;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::listener::ListenerError;

/// Time allowed for the event loop to flush the Disconnect packet
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// MQTT connection handle for lifecycle management
///
/// Keep it alive for as long as messages should be received. The event loop
/// task (and with it the inbound channel) stops on [`shutdown`].
///
/// [`shutdown`]: BrokerConnection::shutdown
pub struct BrokerConnection {
	client: AsyncClient,
	event_loop_handle: Option<JoinHandle<()>>,
}

impl BrokerConnection {
	pub(crate) fn new(
		client: AsyncClient,
		event_loop_handle: JoinHandle<()>,
	) -> Self {
		Self {
			client,
			event_loop_handle: Some(event_loop_handle),
		}
	}

	/// Gracefully shutdown the MQTT connection by:
	/// 1. Sending MQTT Disconnect packet (triggers event loop termination)
	/// 2. Waiting for event loop to finish processing
	pub async fn shutdown(self) -> Result<(), ListenerError> {
		self.shutdown_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
	}

	/// Like [`BrokerConnection::shutdown`], aborting the event loop if it has
	/// not stopped within `timeout` (e.g. because the broker is unreachable
	/// and the Disconnect packet can never be sent).
	pub async fn shutdown_timeout(
		mut self,
		timeout: Duration,
	) -> Result<(), ListenerError> {
		if let Err(e) = self.client.try_disconnect() {
			warn!(error = %e, "Failed to queue MQTT Disconnect");
		}

		let Some(mut handle) = self.event_loop_handle.take() else {
			warn!("No event loop handle available to await");
			return Ok(());
		};

		match tokio::time::timeout(timeout, &mut handle).await {
			| Ok(result) => result.map_err(ListenerError::from),
			| Err(_) => {
				warn!(timeout = ?timeout, "MQTT event loop did not stop in time, aborting");
				handle.abort();
				match handle.await {
					| Err(e) if e.is_cancelled() => Ok(()),
					| other => other.map_err(ListenerError::from),
				}
			}
		}
	}
}

impl Drop for BrokerConnection {
	fn drop(&mut self) {
		if let Some(handle) = self.event_loop_handle.take() {
			error!(
				"BrokerConnection dropped without calling shutdown(). Please \
				 call shutdown() and await its completion before dropping."
			);
			handle.abort();
		}
	}
}
