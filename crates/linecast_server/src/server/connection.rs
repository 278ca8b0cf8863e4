#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::Context as _;
use linecast_protocol::{
	Inbound, ParseError, chat_line, login_notice, logout_notice, parse_line, rename_error_reply, rename_reply,
	who_entry, who_header,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::server::hub::BroadcastHub;
use crate::server::registry::SessionRegistry;

/// Per-connection server settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
	/// Inactivity window after which a session is evicted.
	pub idle_timeout: Duration,

	/// Capacity of a session's outbox; lines beyond this are dropped for
	/// that session only.
	pub outbox_capacity: usize,
}

impl Default for ConnectionSettings {
	fn default() -> Self {
		Self {
			idle_timeout: Duration::from_secs(20),
			outbox_capacity: 256,
		}
	}
}

enum CloseReason {
	Quit,
	IdleTimeout,
}

/// Per-connection control loop.
///
/// Registers the session, starts its writer, publishes the login notice, then
/// races inbound lines against the idle watchdog until the peer quits or the
/// window elapses. Deregistration always happens before the logout notice is
/// published, so the notice can never be delivered to the departing session.
pub async fn handle_connection(
	conn_id: u64,
	stream: TcpStream,
	registry: SessionRegistry,
	hub: BroadcastHub,
	settings: ConnectionSettings,
) -> anyhow::Result<()> {
	let session_id = stream.peer_addr().context("resolve peer address")?.to_string();
	let (read_half, write_half) = stream.into_split();

	let (outbox_tx, outbox_rx) = mpsc::channel::<String>(settings.outbox_capacity);

	registry.insert(session_id.clone(), outbox_tx.clone()).await;
	let writer = tokio::spawn(run_session_writer(conn_id, write_half, outbox_rx));

	hub.publish(login_notice(&session_id)).await;
	info!(conn_id, addr = %session_id, "session registered");

	let mut display_name = session_id.clone();
	let mut lines = BufReader::new(read_half).lines();

	let idle = tokio::time::sleep(settings.idle_timeout);
	tokio::pin!(idle);

	let reason = loop {
		tokio::select! {
			res = lines.next_line() => match res {
				Ok(Some(line)) => {
					handle_line(conn_id, &session_id, &mut display_name, &line, &registry, &hub, &outbox_tx).await;
					idle.as_mut().reset(Instant::now() + settings.idle_timeout);
				}
				Ok(None) => break CloseReason::Quit,
				Err(e) => {
					debug!(conn_id, error = %e, "read failed; treating as quit");
					break CloseReason::Quit;
				}
			},
			_ = &mut idle => break CloseReason::IdleTimeout,
		}
	};

	match reason {
		CloseReason::Quit => info!(conn_id, addr = %session_id, "session quit"),
		CloseReason::IdleTimeout => {
			metrics::counter!("linecast_server_idle_evictions_total").increment(1);
			info!(conn_id, addr = %session_id, "session idle, evicting");
		}
	}

	// Remove-then-notify: both go through the registry lock, so the notice
	// fan-out can no longer observe this session.
	registry.remove(&session_id).await;
	hub.publish(logout_notice(&session_id)).await;

	drop(outbox_tx);
	let _ = writer.await;

	Ok(())
}

async fn handle_line(
	conn_id: u64,
	session_id: &str,
	display_name: &mut String,
	line: &str,
	registry: &SessionRegistry,
	hub: &BroadcastHub,
	outbox: &mpsc::Sender<String>,
) {
	match parse_line(line) {
		// Blank keepalive; resets the watchdog but is never broadcast.
		Err(ParseError::Empty) => {}

		Err(ParseError::MissingRenameName) => {
			send_local(conn_id, outbox, rename_error_reply());
		}

		Ok(Inbound::Who) => {
			let sessions = registry.snapshot().await;
			send_local(conn_id, outbox, who_header(sessions.len()));
			for s in &sessions {
				send_local(conn_id, outbox, who_entry(&s.addr, &s.display_name, s.addr == session_id));
			}
		}

		Ok(Inbound::Rename { new_name }) => {
			if registry.rename(session_id, new_name).await {
				info!(conn_id, from = %display_name, to = %new_name, "session renamed");
				*display_name = new_name.to_string();
				send_local(conn_id, outbox, rename_reply(new_name));
			} else {
				debug!(conn_id, "rename for a session no longer registered");
			}
		}

		Ok(Inbound::Chat(text)) => {
			hub.publish(chat_line(display_name, text)).await;
		}
	}
}

/// Queue a local (non-broadcast) reply on the session's own outbox.
///
/// Uses `try_send` so a stalled writer can only lose replies, never wedge the
/// control loop or its watchdog.
fn send_local(conn_id: u64, outbox: &mpsc::Sender<String>, line: String) {
	if let Err(e) = outbox.try_send(line) {
		debug!(conn_id, error = %e, "local reply dropped");
	}
}

/// Drain one session's outbox to the network, in arrival order.
///
/// Ends when every sender is gone (session terminated) or on the first write
/// failure, which marks the connection dead for the control loop to notice.
pub async fn run_session_writer(conn_id: u64, mut write_half: OwnedWriteHalf, mut outbox: mpsc::Receiver<String>) {
	while let Some(line) = outbox.recv().await {
		let mut buf = line.into_bytes();
		buf.push(b'\n');

		if let Err(e) = write_half.write_all(&buf).await {
			debug!(conn_id, error = %e, "session writer: write failed; closing");
			break;
		}
	}

	let _ = write_half.shutdown().await;
}
