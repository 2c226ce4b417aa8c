use std::process::ExitCode;

use bbq_bridge::settings::{self, Settings};
use bbq_bridge::{Bridge, BrokerListener, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
	settings::load_env_files();
	logging::setup();

	match run().await {
		| Ok(()) => ExitCode::SUCCESS,
		| Err(err) => {
			error!(error = %err, "bbq-bridge failed");
			ExitCode::FAILURE
		}
	}
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
	let settings = Settings::from_env()?;
	info!(
		version = env!("CARGO_PKG_VERSION"),
		host = %settings.mqtt.host,
		port = settings.mqtt.port,
		client_id = %settings.mqtt.client_id,
		project = %settings.firestore.project_id,
		"Starting bbq-bridge"
	);

	let store = settings.firestore_store()?;
	let (inbound, connection) =
		BrokerListener::start(settings.listener_config()?)?;

	let bridge = Bridge::new(store, settings.bridge.clone());
	let runner = tokio::spawn(async move { bridge.run(inbound).await });

	shutdown_signal().await;
	info!("Shutdown signal received, disconnecting");

	// Disconnecting closes the inbound channel; the bridge then drains what
	// is left and returns.
	connection.shutdown().await?;
	let stats = runner.await?;

	info!(%stats, "bbq-bridge stopped");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			error!(error = %err, "Failed to install Ctrl+C handler");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{SignalKind, signal};

		match signal(SignalKind::terminate()) {
			| Ok(mut stream) => {
				stream.recv().await;
			}
			| Err(err) => {
				error!(error = %err, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
}
