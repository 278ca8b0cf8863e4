#![forbid(unsafe_code)]

use tokio::sync::mpsc;

use crate::server::registry::{SessionInfo, SessionRegistry};

fn outbox(capacity: usize) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
	mpsc::channel(capacity)
}

#[tokio::test]
async fn reinserting_an_address_keeps_a_single_entry() {
	let registry = SessionRegistry::new();
	let (tx1, _rx1) = outbox(8);
	let (tx2, _rx2) = outbox(8);

	registry.insert("127.0.0.1:9000".to_string(), tx1).await;
	registry.insert("127.0.0.1:9000".to_string(), tx2).await;

	assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn snapshot_defaults_display_name_to_the_address() {
	let registry = SessionRegistry::new();
	let (tx, _rx) = outbox(8);

	registry.insert("127.0.0.1:9000".to_string(), tx).await;

	assert_eq!(
		registry.snapshot().await,
		vec![SessionInfo {
			addr: "127.0.0.1:9000".to_string(),
			display_name: "127.0.0.1:9000".to_string(),
		}]
	);
}

#[tokio::test]
async fn rename_is_visible_in_snapshots() {
	let registry = SessionRegistry::new();
	let (tx, _rx) = outbox(8);

	registry.insert("127.0.0.1:9000".to_string(), tx).await;
	assert!(registry.rename("127.0.0.1:9000", "Bob").await);

	let snap = registry.snapshot().await;
	assert_eq!(snap[0].display_name, "Bob");
	assert_eq!(snap[0].addr, "127.0.0.1:9000");

	assert!(!registry.rename("127.0.0.1:9999", "nobody").await);
}

#[tokio::test]
async fn deliver_reaches_every_registered_session() {
	let registry = SessionRegistry::new();
	let (tx_a, mut rx_a) = outbox(8);
	let (tx_b, mut rx_b) = outbox(8);

	registry.insert("127.0.0.1:9000".to_string(), tx_a).await;
	registry.insert("127.0.0.1:9001".to_string(), tx_b).await;

	registry.deliver_to_all("[x]: hello").await;

	assert_eq!(rx_a.recv().await.as_deref(), Some("[x]: hello"));
	assert_eq!(rx_b.recv().await.as_deref(), Some("[x]: hello"));
}

#[tokio::test]
async fn removed_session_never_receives_a_delivery() {
	let registry = SessionRegistry::new();
	let (tx_a, mut rx_a) = outbox(8);
	let (tx_b, mut rx_b) = outbox(8);

	registry.insert("127.0.0.1:9000".to_string(), tx_a).await;
	registry.insert("127.0.0.1:9001".to_string(), tx_b).await;

	assert!(registry.remove("127.0.0.1:9000").await);
	assert!(!registry.remove("127.0.0.1:9000").await);

	registry.deliver_to_all("[x]: after-remove").await;

	assert_eq!(rx_b.recv().await.as_deref(), Some("[x]: after-remove"));
	assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn full_outbox_drops_for_that_session_only() {
	let registry = SessionRegistry::new();
	let (tx_slow, mut rx_slow) = outbox(1);
	let (tx_fast, mut rx_fast) = outbox(8);

	registry.insert("127.0.0.1:9000".to_string(), tx_slow).await;
	registry.insert("127.0.0.1:9001".to_string(), tx_fast).await;

	registry.deliver_to_all("line-1").await;
	registry.deliver_to_all("line-2").await;

	assert_eq!(rx_fast.recv().await.as_deref(), Some("line-1"));
	assert_eq!(rx_fast.recv().await.as_deref(), Some("line-2"));

	assert_eq!(rx_slow.recv().await.as_deref(), Some("line-1"));
	assert!(rx_slow.try_recv().is_err(), "second line should have been dropped");
}

#[tokio::test]
async fn lag_notice_is_flushed_once_the_outbox_drains() {
	let registry = SessionRegistry::new();
	let (tx, mut rx) = outbox(2);

	registry.insert("127.0.0.1:9000".to_string(), tx).await;

	registry.deliver_to_all("line-1").await;
	registry.deliver_to_all("line-2").await;
	registry.deliver_to_all("line-3").await; // dropped, outbox full

	assert_eq!(rx.recv().await.as_deref(), Some("line-1"));
	assert_eq!(rx.recv().await.as_deref(), Some("line-2"));

	registry.deliver_to_all("line-4").await;

	assert_eq!(rx.recv().await.as_deref(), Some("line-4"));
	assert_eq!(rx.recv().await.as_deref(), Some(linecast_protocol::lag_notice(1).as_str()));
}

#[tokio::test]
async fn sessions_with_closed_outboxes_are_pruned_on_delivery() {
	let registry = SessionRegistry::new();
	let (tx_a, rx_a) = outbox(8);
	let (tx_b, mut rx_b) = outbox(8);

	registry.insert("127.0.0.1:9000".to_string(), tx_a).await;
	registry.insert("127.0.0.1:9001".to_string(), tx_b).await;

	drop(rx_a);
	registry.deliver_to_all("line-1").await;

	assert_eq!(rx_b.recv().await.as_deref(), Some("line-1"));
	assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn empty_registry_delivery_is_a_no_op() {
	let registry = SessionRegistry::new();
	assert!(registry.is_empty().await);

	registry.deliver_to_all("line-1").await;

	assert!(registry.is_empty().await);
}
