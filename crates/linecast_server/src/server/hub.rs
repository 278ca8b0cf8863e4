#![forbid(unsafe_code)]

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::server::registry::SessionRegistry;

/// Handle for publishing lines into the broadcast hub.
///
/// The hub is a single process-lifetime task: it dequeues one published line
/// at a time and fans it out through the registry, so every session observes
/// broadcasts in the same relative order.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
	tx: mpsc::Sender<String>,
}

/// Configuration for the broadcast hub.
#[derive(Debug, Clone)]
pub struct BroadcastHubConfig {
	/// Maximum number of published lines queued ahead of the fan-out loop.
	pub queue_capacity: usize,

	pub debug_logs: bool,
}

impl Default for BroadcastHubConfig {
	fn default() -> Self {
		Self {
			queue_capacity: 1024,
			debug_logs: false,
		}
	}
}

/// Start the hub's fan-out loop and return the publish handle.
///
/// The loop never blocks on a slow session (delivery is `try_send` inside the
/// registry), so the publish queue always drains and publishers only wait for
/// queue space, never for clients.
pub fn spawn_broadcast_hub(registry: SessionRegistry, cfg: BroadcastHubConfig) -> BroadcastHub {
	let (tx, mut rx) = mpsc::channel::<String>(cfg.queue_capacity);

	tokio::spawn(async move {
		while let Some(line) = rx.recv().await {
			if cfg.debug_logs {
				debug!(line = %line, "hub: fan out");
			}
			registry.deliver_to_all(&line).await;
		}
	});

	BroadcastHub { tx }
}

impl BroadcastHub {
	/// Queue one line for delivery to every currently registered session.
	pub async fn publish(&self, line: String) {
		if self.tx.send(line).await.is_err() {
			// Only possible once the hub task is gone, i.e. at process teardown.
			warn!("hub: publish after fan-out loop stopped; line discarded");
		}
	}
}
