//! Environment-sourced settings
//!
//! Values are read from the process environment after `.env` files have
//! been loaded (see [`load_env_files`]).

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bbq_bridge_core::listener::config::{DEFAULT_KEEP_ALIVE, DEFAULT_TLS_PORT};
use bbq_bridge_core::store::StoreError;
use bbq_bridge_core::topic::validate_prefix;
use bbq_bridge_core::{
	BridgeConfig, FirestoreConfig, FirestoreStore, ListenerConfig, QoS,
	TlsConfiguration, TokenSource, WriteMode,
};
use rumqttc::tokio_rustls::rustls::pki_types::CertificateDer;
use rumqttc::tokio_rustls::rustls::{ClientConfig, RootCertStore};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Errors raised while reading settings
#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("Missing required environment variable {0}")]
	Missing(&'static str),

	#[error("Invalid value for {name}: {reason}")]
	Invalid { name: &'static str, reason: String },

	#[error("Failed to read CA certificate '{}': {source}", path.display())]
	CaCertRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Invalid CA certificate '{}': {reason}", path.display())]
	CaCertInvalid { path: PathBuf, reason: String },

	#[error("Failed to load platform root certificates: {0}")]
	NativeRoots(String),
}

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct MqttSettings {
	pub host: String,
	pub port: u16,
	pub username: String,
	pub password: String,
	pub client_id: String,
	pub keep_alive: Duration,
	pub tls: bool,
	/// PEM bundle to trust instead of the platform roots
	pub ca_cert: Option<PathBuf>,
	pub qos: QoS,
}

/// Document database settings
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
	pub project_id: String,
	pub database_id: String,
	/// `host:port` of a local emulator; disables authentication
	pub emulator_host: Option<String>,
	/// Fixed bearer token; the metadata server is used when absent
	pub access_token: Option<String>,
}

/// Complete bridge settings
#[derive(Debug, Clone)]
pub struct Settings {
	pub mqtt: MqttSettings,
	pub firestore: FirestoreSettings,
	pub bridge: BridgeConfig,
	/// Capacity of the channel between broker and bridge
	pub inbound_capacity: usize,
}

impl Settings {
	/// Read settings from the process environment
	pub fn from_env() -> Result<Self, SettingsError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Read settings through `lookup`, which maps variable names to values
	pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
	where F: Fn(&str) -> Option<String> {
		let env = Lookup(lookup);

		let mqtt = MqttSettings {
			host: env.required("MQTT_HOST")?,
			port: env.parsed("MQTT_PORT", DEFAULT_TLS_PORT)?,
			username: env.required("MQTT_USER")?,
			password: env.required("MQTT_PASSWORD")?,
			client_id: env
				.optional("MQTT_CLIENT_ID")
				.unwrap_or_else(|| client_id("bbq-bridge")),
			keep_alive: keep_alive(&env)?,
			tls: env.flag("MQTT_TLS", true)?,
			ca_cert: env.optional("MQTT_CA_CERT").map(PathBuf::from),
			qos: qos(&env)?,
		};

		let firestore = FirestoreSettings {
			project_id: env.required("FIRESTORE_PROJECT")?,
			database_id: env
				.optional("FIRESTORE_DATABASE")
				.unwrap_or_else(|| "(default)".to_string()),
			emulator_host: env.optional("FIRESTORE_EMULATOR_HOST"),
			access_token: env.optional("FIRESTORE_ACCESS_TOKEN"),
		};

		let defaults = BridgeConfig::default();
		let topic_prefix = env
			.optional("BBQ_TOPIC_PREFIX")
			.unwrap_or(defaults.topic_prefix);
		validate_prefix(&topic_prefix).map_err(|e| SettingsError::Invalid {
			name: "BBQ_TOPIC_PREFIX",
			reason: e.to_string(),
		})?;
		let sessions_collection = env
			.optional("BBQ_SESSIONS_COLLECTION")
			.unwrap_or(defaults.sessions_collection);
		if sessions_collection.contains('/') {
			return Err(SettingsError::Invalid {
				name: "BBQ_SESSIONS_COLLECTION",
				reason: "collection id must not contain '/'".to_string(),
			});
		}
		let write_mode = match env.optional("BBQ_WRITE_MODE") {
			| Some(raw) => raw
				.parse::<WriteMode>()
				.map_err(|reason| SettingsError::Invalid {
					name: "BBQ_WRITE_MODE",
					reason,
				})?,
			| None => defaults.write_mode,
		};

		let inbound_capacity = env.parsed("BBQ_INBOUND_CAPACITY", 64_usize)?;
		if inbound_capacity == 0 {
			return Err(SettingsError::Invalid {
				name: "BBQ_INBOUND_CAPACITY",
				reason: "must be greater than 0".to_string(),
			});
		}

		Ok(Self {
			mqtt,
			firestore,
			bridge: BridgeConfig {
				topic_prefix,
				sessions_collection,
				write_mode,
			},
			inbound_capacity,
		})
	}

	/// Broker listener configuration, including TLS setup
	pub fn listener_config(&self) -> Result<ListenerConfig, SettingsError> {
		let mqtt = &self.mqtt;
		let mut config =
			ListenerConfig::new(&mqtt.client_id, &mqtt.host, mqtt.port)
				.with_credentials(&mqtt.username, &mqtt.password)
				.with_keep_alive(mqtt.keep_alive)
				.with_prefix(&self.bridge.topic_prefix)
				.with_qos(mqtt.qos);
		if mqtt.tls {
			let tls = match &mqtt.ca_cert {
				| Some(path) => create_tls_config(path)?,
				| None => native_tls_config()?,
			};
			config = config.with_tls(TlsConfiguration::Rustls(Arc::new(tls)));
		}
		config.settings.inbound_capacity = self.inbound_capacity;
		Ok(config)
	}

	/// Firestore store for the configured project
	pub fn firestore_store(&self) -> Result<FirestoreStore, StoreError> {
		let fs = &self.firestore;
		let (mut config, tokens) = match &fs.emulator_host {
			| Some(host) => (
				FirestoreConfig::emulator(&fs.project_id, host),
				TokenSource::Anonymous,
			),
			| None => (
				FirestoreConfig::new(&fs.project_id),
				match &fs.access_token {
					| Some(token) => TokenSource::Static(token.clone()),
					| None => TokenSource::metadata(),
				},
			),
		};
		config.database_id = fs.database_id.clone();
		FirestoreStore::new(config, tokens)
	}
}

/// Load `.env` and, when present, `.env.local` (local overrides win).
pub fn load_env_files() {
	if Path::new(".env.local").exists() {
		dotenv::from_filename(".env.local").ok();
	}
	dotenv::dotenv().ok();
}

/// Generate unique client ID with given prefix, e.g. `bbq-bridge_a1b2c3d4`
fn client_id(prefix: &str) -> String {
	let uuid = Uuid::new_v4().simple().to_string();
	format!("{prefix}_{}", &uuid[.. 8])
}

fn keep_alive(
	env: &Lookup<impl Fn(&str) -> Option<String>>,
) -> Result<Duration, SettingsError> {
	let secs =
		env.parsed("MQTT_KEEP_ALIVE_SECS", DEFAULT_KEEP_ALIVE.as_secs())?;
	if secs == 0 {
		return Err(SettingsError::Invalid {
			name: "MQTT_KEEP_ALIVE_SECS",
			reason: "must be at least 1 second".to_string(),
		});
	}
	Ok(Duration::from_secs(secs))
}

fn qos(
	env: &Lookup<impl Fn(&str) -> Option<String>>,
) -> Result<QoS, SettingsError> {
	match env.parsed("MQTT_QOS", 0_u8)? {
		| 0 => Ok(QoS::AtMostOnce),
		| 1 => Ok(QoS::AtLeastOnce),
		| 2 => Ok(QoS::ExactlyOnce),
		| other => Err(SettingsError::Invalid {
			name: "MQTT_QOS",
			reason: format!("{other} is not a QoS level (expected 0, 1 or 2)"),
		}),
	}
}

/// Create TLS configuration with custom CA certificate
fn create_tls_config(path: &Path) -> Result<ClientConfig, SettingsError> {
	let ca_cert = std::fs::read(path).map_err(|source| {
		SettingsError::CaCertRead {
			path: path.to_path_buf(),
			source,
		}
	})?;
	let invalid = |reason: String| SettingsError::CaCertInvalid {
		path: path.to_path_buf(),
		reason,
	};

	let mut root_cert_store = RootCertStore::empty();
	let mut reader = BufReader::new(&ca_cert[..]);
	for cert in rustls_pemfile::certs(&mut reader) {
		let cert = cert.map_err(|e| invalid(e.to_string()))?;
		root_cert_store
			.add(cert)
			.map_err(|e| invalid(e.to_string()))?;
	}
	if root_cert_store.is_empty() {
		return Err(invalid("no certificates found".to_string()));
	}

	Ok(client_config(root_cert_store))
}

/// Create TLS configuration trusting the platform root certificates
fn native_tls_config() -> Result<ClientConfig, SettingsError> {
	let certs = rustls_native_certs::load_native_certs()
		.map_err(|e| SettingsError::NativeRoots(e.to_string()))?;
	Ok(client_config(native_roots(certs)?))
}

fn native_roots(
	certs: Vec<CertificateDer<'static>>,
) -> Result<RootCertStore, SettingsError> {
	let mut root_cert_store = RootCertStore::empty();
	let (added, ignored) = root_cert_store.add_parsable_certificates(certs);
	if ignored > 0 {
		warn!(ignored, "Skipped unparsable platform root certificates");
	}
	if added == 0 {
		return Err(SettingsError::NativeRoots(
			"no usable certificates found".to_string(),
		));
	}
	Ok(root_cert_store)
}

fn client_config(roots: RootCertStore) -> ClientConfig {
	ClientConfig::builder()
		.with_root_certificates(roots)
		.with_no_client_auth()
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where F: Fn(&str) -> Option<String>
{
	/// Non-empty value of `name`
	fn optional(&self, name: &str) -> Option<String> {
		(self.0)(name)
			.map(|value| value.trim().to_string())
			.filter(|value| !value.is_empty())
	}

	fn required(&self, name: &'static str) -> Result<String, SettingsError> {
		self.optional(name).ok_or(SettingsError::Missing(name))
	}

	fn parsed<T>(
		&self,
		name: &'static str,
		default: T,
	) -> Result<T, SettingsError>
	where
		T: std::str::FromStr,
		T::Err: std::fmt::Display,
	{
		match self.optional(name) {
			| Some(raw) => {
				raw.parse().map_err(|e: T::Err| SettingsError::Invalid {
					name,
					reason: format!("'{raw}': {e}"),
				})
			}
			| None => Ok(default),
		}
	}

	fn flag(
		&self,
		name: &'static str,
		default: bool,
	) -> Result<bool, SettingsError> {
		match self.optional(name).map(|raw| raw.to_ascii_lowercase()) {
			| None => Ok(default),
			| Some(raw) => match raw.as_str() {
				| "1" | "true" | "yes" | "on" => Ok(true),
				| "0" | "false" | "no" | "off" => Ok(false),
				| _ => Err(SettingsError::Invalid {
					name,
					reason: format!("'{raw}' is not a boolean"),
				}),
			},
		}
	}
}
