//! Configuration for the broker listener

use std::time::Duration;

use rumqttc::{MqttOptions, QoS, TlsConfiguration, Transport};

use crate::topic::{DEFAULT_PREFIX, subscription_filter};

/// Keep-alive interval used unless configured otherwise
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
/// TLS port of the broker
pub const DEFAULT_TLS_PORT: u16 = 8883;

/// Listener-level capacity settings
#[derive(Debug, Clone)]
pub struct ListenerSettings {
	/// Capacity of the rumqttc request channel
	pub event_loop_capacity: usize,
	/// Capacity of the inbound message channel drained by the bridge
	pub inbound_capacity: usize,
}

impl Default for ListenerSettings {
	fn default() -> Self {
		Self {
			event_loop_capacity: 10,
			inbound_capacity: 64,
		}
	}
}

/// Configuration for [`BrokerListener`](super::BrokerListener)
#[derive(Debug, Clone)]
pub struct ListenerConfig {
	/// Underlying MQTT connection options (from rumqttc)
	pub connection: MqttOptions,
	/// Filter subscribed on every successful connection
	pub filter: String,
	/// QoS requested for the subscription
	pub qos: QoS,
	/// Channel capacities
	pub settings: ListenerSettings,
}

impl ListenerConfig {
	/// Plain TCP config subscribing to `/bbq/#`
	pub fn new(client_id: &str, host: &str, port: u16) -> Self {
		let mut connection = MqttOptions::new(client_id, host, port);
		connection.set_keep_alive(DEFAULT_KEEP_ALIVE);
		Self {
			connection,
			filter: subscription_filter(DEFAULT_PREFIX),
			qos: QoS::AtMostOnce,
			settings: ListenerSettings::default(),
		}
	}

	/// Authenticate with username and password
	pub fn with_credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.connection.set_credentials(username, password);
		self
	}

	/// Connect over TLS using `tls`
	pub fn with_tls(mut self, tls: TlsConfiguration) -> Self {
		self.connection.set_transport(Transport::tls_with_config(tls));
		self
	}

	/// Override the keep-alive interval
	pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
		self.connection.set_keep_alive(keep_alive);
		self
	}

	/// Subscribe to the wildcard filter covering `prefix`
	pub fn with_prefix(mut self, prefix: &str) -> Self {
		self.filter = subscription_filter(prefix);
		self
	}

	/// Request `qos` for the subscription
	pub fn with_qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ListenerConfig::new("bridge", "broker.local", 8883);

		assert_eq!(config.filter, "/bbq/#");
		assert_eq!(config.qos, QoS::AtMostOnce);
		assert_eq!(config.connection.keep_alive(), Duration::from_secs(60));
		assert_eq!(
			config.connection.broker_address(),
			("broker.local".to_string(), 8883)
		);
	}

	#[test]
	fn test_builders() {
		let config = ListenerConfig::new("bridge", "broker.local", 1883)
			.with_credentials("bbq-bridge", "secret")
			.with_prefix("smoker")
			.with_qos(QoS::AtLeastOnce)
			.with_keep_alive(Duration::from_secs(15));

		assert_eq!(config.filter, "/smoker/#");
		assert_eq!(config.qos, QoS::AtLeastOnce);
		assert_eq!(config.connection.keep_alive(), Duration::from_secs(15));
		assert_eq!(
			config.connection.credentials(),
			Some(("bbq-bridge".to_string(), "secret".to_string()))
		);
	}
}
