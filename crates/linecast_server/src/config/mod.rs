#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use serde::Deserialize;
use tracing::info;

/// Default config path: `~/.linecast/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".linecast").join("config.toml"))
}

/// Load the server config from TOML and env overrides.
pub fn load_server_config_from_path(path: &Path) -> anyhow::Result<ServerConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ServerConfig::from_file(file_cfg);

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

/// Server config (v1).
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub server: ServerSettings,
}

/// Server settings loaded by the server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
	/// Chat listener endpoint (`tcp://host:port`); the CLI `--bind` wins.
	pub bind: Option<String>,
	/// Inactivity window after which a session is evicted.
	pub idle_timeout: Duration,
	/// Per-session outbox capacity (lines).
	pub outbox_capacity: usize,
	/// Broadcast hub publish queue capacity (lines).
	pub hub_queue_capacity: usize,
	/// Emit a debug line for every hub fan-out.
	pub hub_debug_logs: bool,
	/// Optional metrics exporter bind address (host:port).
	pub metrics_bind: Option<String>,
	/// Optional health/readiness HTTP bind address (host:port).
	pub health_bind: Option<String>,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self {
			bind: None,
			idle_timeout: Duration::from_secs(20),
			outbox_capacity: 256,
			hub_queue_capacity: 1024,
			hub_debug_logs: false,
			metrics_bind: None,
			health_bind: None,
		}
	}
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			server: ServerSettings::default(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	server: FileServerSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	bind: Option<String>,
	idle_timeout_secs: Option<u64>,
	outbox_capacity: Option<usize>,
	hub_queue_capacity: Option<usize>,
	hub_debug_logs: Option<bool>,
	metrics_bind: Option<String>,
	health_bind: Option<String>,
}

impl ServerConfig {
	fn from_file(file: FileConfig) -> Self {
		let defaults = ServerSettings::default();

		Self {
			server: ServerSettings {
				bind: file.server.bind.filter(|s| !s.trim().is_empty()),
				idle_timeout: file
					.server
					.idle_timeout_secs
					.filter(|v| *v > 0)
					.map(Duration::from_secs)
					.unwrap_or(defaults.idle_timeout),
				outbox_capacity: file
					.server
					.outbox_capacity
					.filter(|v| *v > 0)
					.unwrap_or(defaults.outbox_capacity),
				hub_queue_capacity: file
					.server
					.hub_queue_capacity
					.filter(|v| *v > 0)
					.unwrap_or(defaults.hub_queue_capacity),
				hub_debug_logs: file.server.hub_debug_logs.unwrap_or(defaults.hub_debug_logs),
				metrics_bind: file.server.metrics_bind.filter(|s| !s.trim().is_empty()),
				health_bind: file.server.health_bind.filter(|s| !s.trim().is_empty()),
			},
		}
	}
}

fn parse_env_bool(v: &str) -> Option<bool> {
	match v.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(cfg: &mut ServerConfig) {
	if let Ok(v) = std::env::var("LINECAST_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.bind = Some(v);
			info!("server config: bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("LINECAST_IDLE_TIMEOUT_SECS")
		&& let Ok(secs) = v.trim().parse::<u64>()
		&& secs > 0
	{
		cfg.server.idle_timeout = Duration::from_secs(secs);
		info!(secs, "server config: idle_timeout overridden by env");
	}

	if let Ok(v) = std::env::var("LINECAST_OUTBOX_CAPACITY")
		&& let Ok(capacity) = v.trim().parse::<usize>()
		&& capacity > 0
	{
		cfg.server.outbox_capacity = capacity;
		info!(capacity, "server config: outbox_capacity overridden by env");
	}

	if let Ok(v) = std::env::var("LINECAST_HUB_QUEUE_CAPACITY")
		&& let Ok(capacity) = v.trim().parse::<usize>()
		&& capacity > 0
	{
		cfg.server.hub_queue_capacity = capacity;
		info!(capacity, "server config: hub_queue_capacity overridden by env");
	}

	if let Ok(v) = std::env::var("LINECAST_HUB_DEBUG_LOGS")
		&& let Some(enabled) = parse_env_bool(&v)
	{
		cfg.server.hub_debug_logs = enabled;
		info!(enabled, "server config: hub_debug_logs overridden by env");
	}

	if let Ok(v) = std::env::var("LINECAST_METRICS_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.metrics_bind = Some(v);
			info!("server config: metrics_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("LINECAST_HEALTH_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.health_bind = Some(v);
			info!("server config: health_bind overridden by env");
		}
	}
}
