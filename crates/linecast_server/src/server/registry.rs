#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use linecast_protocol::lag_notice;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Shared table of all live sessions, keyed by peer address.
///
/// Every read and write goes through one mutex, so hub fan-out always sees a
/// consistent membership view: a session removed here can never be targeted
/// by a later delivery.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
	inner: Arc<Mutex<Inner>>,
}

/// Point-in-time view of one session, for `who` listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
	pub addr: String,
	pub display_name: String,
}

#[derive(Debug, Default)]
struct Inner {
	sessions: HashMap<String, SessionEntry>,
}

#[derive(Debug)]
struct SessionEntry {
	display_name: String,

	outbox: mpsc::Sender<String>,

	/// Lines dropped since the last successful delivery to this session.
	pending_drops: u64,
}

impl Default for SessionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner::default())),
		}
	}

	/// Register a session under its peer address. The display name starts as
	/// the address itself. Re-inserting an address replaces the old entry.
	pub async fn insert(&self, addr: String, outbox: mpsc::Sender<String>) {
		let mut inner = self.inner.lock().await;
		inner.sessions.insert(
			addr.clone(),
			SessionEntry {
				display_name: addr,
				outbox,
				pending_drops: 0,
			},
		);
	}

	/// Deregister a session. No-op if the address is unknown. Returns whether
	/// an entry was removed.
	pub async fn remove(&self, addr: &str) -> bool {
		let mut inner = self.inner.lock().await;
		inner.sessions.remove(addr).is_some()
	}

	/// Update a session's display name. Returns false if the address is
	/// unknown. Names are not required to be unique.
	pub async fn rename(&self, addr: &str, new_name: &str) -> bool {
		let mut inner = self.inner.lock().await;
		match inner.sessions.get_mut(addr) {
			Some(entry) => {
				entry.display_name = new_name.to_string();
				true
			}
			None => false,
		}
	}

	/// Consistent snapshot of all live sessions, sorted by address so
	/// listings are stable.
	pub async fn snapshot(&self) -> Vec<SessionInfo> {
		let inner = self.inner.lock().await;
		let mut out: Vec<SessionInfo> = inner
			.sessions
			.iter()
			.map(|(addr, entry)| SessionInfo {
				addr: addr.clone(),
				display_name: entry.display_name.clone(),
			})
			.collect();
		out.sort_by(|a, b| a.addr.cmp(&b.addr));
		out
	}

	/// Push one line into every live session's outbox.
	///
	/// Runs entirely under the registry lock, so membership cannot change
	/// between taking the view and delivering. A full outbox drops the line
	/// for that session only and bumps its pending-drop count; the count is
	/// flushed as a lag notice on the next delivery that fits. Sessions whose
	/// writer is gone are pruned.
	pub async fn deliver_to_all(&self, line: &str) {
		let mut inner = self.inner.lock().await;

		let mut dropped_total: u64 = 0;
		let mut closed: Vec<String> = Vec::new();

		for (addr, entry) in inner.sessions.iter_mut() {
			match entry.outbox.try_send(line.to_string()) {
				Ok(()) => {
					if entry.pending_drops > 0 && entry.outbox.try_send(lag_notice(entry.pending_drops)).is_ok() {
						entry.pending_drops = 0;
					}
				}
				Err(mpsc::error::TrySendError::Full(_)) => {
					dropped_total += 1;
					entry.pending_drops = entry.pending_drops.saturating_add(1);
				}
				Err(mpsc::error::TrySendError::Closed(_)) => {
					closed.push(addr.clone());
				}
			}
		}

		for addr in closed {
			inner.sessions.remove(&addr);
			debug!(%addr, "registry: pruned session with closed outbox");
		}

		if dropped_total > 0 {
			metrics::counter!("linecast_server_dropped_lines_total").increment(dropped_total);
			debug!(dropped = dropped_total, "registry: dropped due to full outboxes");
		}
	}

	/// Number of live sessions.
	pub async fn len(&self) -> usize {
		self.inner.lock().await.sessions.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}
