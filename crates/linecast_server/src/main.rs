#![forbid(unsafe_code)]

mod config;
mod server;

use std::net::SocketAddr;

use anyhow::Context as _;
use linecast_util::endpoint::TcpEndpoint;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::server::connection::{ConnectionSettings, handle_connection};
use crate::server::health::{HealthState, spawn_health_server};
use crate::server::hub::{BroadcastHubConfig, spawn_broadcast_hub};
use crate::server::registry::SessionRegistry;

/// Fallback chat listener endpoint when neither CLI nor config provide one.
const DEFAULT_BIND_ENDPOINT: &str = "tcp://127.0.0.1:8000";

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: linecast_server [--bind tcp://host:port]\n\
\n\
Options:\n\
\t--bind    Bind endpoint (default: tcp://127.0.0.1:8000)\n\
\t         Format: tcp://host:port or host:port\n\
\t--help   Show this help\n\
"
	);
	std::process::exit(2)
}

fn parse_bind_endpoint(s: &str) -> Result<SocketAddr, String> {
	TcpEndpoint::parse(s)?.to_socket_addr_if_ip_literal()
}

fn parse_args() -> Option<SocketAddr> {
	let mut bind_endpoint: Option<String> = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--bind" | "--listen" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--bind must be non-empty (expected tcp://host:port or host:port)");
					usage_and_exit();
				}
				bind_endpoint = Some(v);
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	bind_endpoint.map(|v| {
		parse_bind_endpoint(&v).unwrap_or_else(|e| {
			eprintln!("{e}");
			usage_and_exit();
		})
	})
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,linecast_server=debug".to_string());

	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.init();
}

fn init_metrics(bind: Option<&str>) {
	let Some(bind) = bind else {
		return;
	};

	match bind.parse::<std::net::SocketAddr>() {
		Ok(addr) => {
			if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
				.with_http_listener(addr)
				.install()
			{
				warn!(error = %e, "failed to start metrics exporter");
			} else {
				info!(%addr, "metrics exporter listening");
			}
		}
		Err(e) => {
			warn!(error = %e, %bind, "invalid metrics bind address (expected host:port)");
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let cli_bind = parse_args();

	let config_path = crate::config::default_config_path()?;
	let server_cfg = crate::config::load_server_config_from_path(&config_path)?;
	info!(path = %config_path.display(), "loaded server config (toml + env overrides)");

	init_metrics(server_cfg.server.metrics_bind.as_deref());

	let health_state = HealthState::new();
	if let Some(bind) = server_cfg.server.health_bind.as_deref() {
		match bind.parse::<std::net::SocketAddr>() {
			Ok(addr) => {
				spawn_health_server(addr, health_state.clone());
				info!(%addr, "health server listening");
			}
			Err(e) => warn!(error = %e, %bind, "invalid health bind address (expected host:port)"),
		}
	}

	let bind_addr = match cli_bind {
		Some(addr) => addr,
		None => {
			let endpoint = server_cfg.server.bind.as_deref().unwrap_or(DEFAULT_BIND_ENDPOINT);
			parse_bind_endpoint(endpoint).map_err(|e| anyhow::anyhow!(e))?
		}
	};

	let listener = TcpListener::bind(bind_addr)
		.await
		.with_context(|| format!("bind chat listener on {bind_addr}"))?;
	info!(bind = %bind_addr, "linecast_server: chat listener ready");

	let registry = SessionRegistry::new();
	let hub = spawn_broadcast_hub(
		registry.clone(),
		BroadcastHubConfig {
			queue_capacity: server_cfg.server.hub_queue_capacity,
			debug_logs: server_cfg.server.hub_debug_logs,
		},
	);

	let conn_settings = ConnectionSettings {
		idle_timeout: server_cfg.server.idle_timeout,
		outbox_capacity: server_cfg.server.outbox_capacity,
	};

	health_state.mark_ready();

	let mut next_conn_id: u64 = 1;

	loop {
		let (stream, remote) = match listener.accept().await {
			Ok(accepted) => accepted,
			Err(e) => {
				warn!(error = %e, "accept failed");
				continue;
			}
		};

		let conn_id = next_conn_id;
		next_conn_id += 1;
		metrics::counter!("linecast_server_connections_total").increment(1);
		info!(conn_id, %remote, "accepted connection");

		let registry = registry.clone();
		let hub = hub.clone();
		let conn_settings = conn_settings.clone();

		tokio::spawn(async move {
			if let Err(e) = handle_connection(conn_id, stream, registry, hub, conn_settings).await {
				warn!(conn_id, error = %e, "connection handler exited with error");
			}
		});
	}
}
