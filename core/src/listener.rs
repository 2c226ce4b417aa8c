//! Broker listener module
//!
//! Owns the rumqttc event loop. Every successful (re)connection subscribes
//! to the configured wildcard filter, and every inbound publish is
//! forwarded to a bounded channel for the bridge to drain.

pub mod config;
/// Listener error types
pub mod error;

use std::ops::ControlFlow;
use std::time::Duration;

use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{
	AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, QoS, SubAck,
	SubscribeReasonCode,
};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};

pub use config::{ListenerConfig, ListenerSettings};
pub use error::ListenerError;

use crate::bridge::InboundMessage;
use crate::connection::BrokerConnection;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Entry point for connecting to the broker.
pub struct BrokerListener;

impl BrokerListener {
	/// Spawn the event loop task.
	///
	/// Returns the receiving end of the inbound channel and the connection
	/// handle. Connecting happens in the background: failures are logged
	/// and retried with capped exponential backoff for as long as the
	/// connection handle is alive.
	pub fn start(
		config: ListenerConfig,
	) -> Result<
		(mpsc::Receiver<InboundMessage>, BrokerConnection),
		ListenerError,
	> {
		if config.settings.inbound_capacity == 0 {
			return Err(ListenerError::ConfigurationValue(
				"inbound_capacity must be greater than 0".to_string(),
			));
		}
		if config.settings.event_loop_capacity == 0 {
			return Err(ListenerError::ConfigurationValue(
				"event_loop_capacity must be greater than 0".to_string(),
			));
		}

		let (client, event_loop) = AsyncClient::new(
			config.connection,
			config.settings.event_loop_capacity,
		);
		let (sender, receiver) =
			mpsc::channel(config.settings.inbound_capacity);

		let handler = EventHandler {
			client: client.clone(),
			filter: config.filter,
			qos: config.qos,
			inbound: sender,
		};
		let event_loop_handle =
			tokio::spawn(async move { run(event_loop, handler).await });

		Ok((receiver, BrokerConnection::new(client, event_loop_handle)))
	}
}

/// Main event loop. Runs until the client sends Disconnect or the bridge
/// drops the inbound channel.
async fn run(mut event_loop: EventLoop, handler: EventHandler) {
	let mut error_count: u32 = 0;

	loop {
		match event_loop.poll().await {
			| Ok(event) => {
				error_count = 0;
				if handler.handle(event).await.is_break() {
					break;
				}
			}
			| Err(err) => {
				error_count = error_count.saturating_add(1);
				let delay = retry_delay(error_count);
				error!(error_count, error = %err, delay = ?delay, "MQTT connection error, retrying");
				time::sleep(delay).await;
			}
		}
	}
	info!("MQTT event loop terminated");
}

/// Reacts to a single event from the broker connection
struct EventHandler {
	client: AsyncClient,
	filter: String,
	qos: QoS,
	inbound: mpsc::Sender<InboundMessage>,
}

impl EventHandler {
	/// `Break` stops the event loop.
	async fn handle(&self, event: Event) -> ControlFlow<()> {
		match event {
			| Incoming(Packet::ConnAck(ConnAck {
				session_present,
				code: ConnectReturnCode::Success,
			})) => {
				info!(session_present, filter = %self.filter, "Connected to MQTT broker, subscribing");
				// The request channel is drained by the event loop, so awaiting
				// here could deadlock; queue without waiting instead.
				if let Err(err) =
					self.client.try_subscribe(self.filter.clone(), self.qos)
				{
					error!(error = %err, filter = %self.filter, "Failed to queue subscription");
				}
			}
			| Incoming(Packet::ConnAck(ConnAck { code, .. })) => {
				warn!(code = ?code, "MQTT connection rejected by broker");
			}
			| Incoming(Packet::SubAck(SubAck { return_codes, .. })) => {
				if return_codes.contains(&SubscribeReasonCode::Failure) {
					error!(filter = %self.filter, "Broker refused subscription");
				} else {
					info!(filter = %self.filter, "Subscription acknowledged");
				}
			}
			| Incoming(Publish(p)) => {
				debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");

				let message = InboundMessage {
					topic: p.topic,
					payload: p.payload,
				};
				if self.inbound.send(message).await.is_err() {
					warn!("Inbound channel closed, stopping MQTT event loop");
					return ControlFlow::Break(());
				}
			}
			| Incoming(Disconnect) => {
				warn!(
					"Received MQTT Disconnect packet from server, reconnecting"
				);
			}
			| Outgoing(rumqttc::Outgoing::Disconnect) => {
				info!("Sent MQTT Disconnect packet to server");
				return ControlFlow::Break(());
			}
			| notification => {
				debug!(notification = ?notification, "Received other MQTT notification");
			}
		}
		ControlFlow::Continue(())
	}
}

/// Exponential backoff starting at 100ms, capped at 30s
fn retry_delay(error_count: u32) -> Duration {
	let exponent = error_count.saturating_sub(1).min(10);
	(INITIAL_RETRY_DELAY * 2_u32.pow(exponent)).min(MAX_RETRY_DELAY)
}
