//! Event stream behavior against a deployment with no push endpoint:
//! degradation to polling, balance tracking, filtering and final disconnect.

use dagnet_client::events::{EventBody, EventFilter, EventKind, Notification, StreamEvent};
use dagnet_client::stream::{NetworkEventStream, StreamOptions, StreamState, TransportMode};
use dagnet_crypto::Account;
use dagnet_network::testing::MockTransport;
use dagnet_network::{Deployment, NetworkClient};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A deployment whose push endpoint refuses connections immediately
fn unreachable_deployment() -> Deployment {
    Deployment::custom(
        "local",
        "http://127.0.0.1:1",
        "http://127.0.0.1:1",
        "http://127.0.0.1:1",
    )
}

fn fast_options() -> StreamOptions {
    StreamOptions {
        poll_interval: Duration::from_millis(50),
        recent_limit: 10,
        connect_timeout: Duration::from_millis(250),
        reconnect_base: Duration::from_millis(10),
        reconnect_cap: Duration::from_millis(50),
        max_push_failures: 2,
        ..StreamOptions::default()
    }
}

fn stream_over(mock: Arc<MockTransport>) -> NetworkEventStream {
    let client = NetworkClient::with_transport(unreachable_deployment(), mock);
    NetworkEventStream::with_options(client, fast_options())
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached within 5 seconds");
}

#[tokio::test]
async fn degrades_to_polling_with_one_notification() {
    init_tracing();
    let mock = MockTransport::new();
    mock.route_json("/transactions?", 200, json!({"data": []}));
    mock.route_json("/global-snapshots", 200, json!({"hash": "t0", "ordinal": 1}));

    let stream = stream_over(mock);
    let notifications = Arc::new(Mutex::new(Vec::<StreamEvent>::new()));
    let seen = Arc::clone(&notifications);
    stream.on(EventKind::Custom, move |event| {
        seen.lock().push(event.clone());
    });

    stream.connect().await.unwrap();
    wait_until(|| stream.stats().degraded).await;
    wait_until(|| stream.mode() == TransportMode::Polling).await;
    assert_eq!(stream.state(), StreamState::Connected);

    // Give the loop a few more ticks; the notification must stay unique
    tokio::time::sleep(Duration::from_millis(300)).await;
    let events = notifications.lock().clone();
    let degraded: Vec<_> = events
        .iter()
        .filter(|event| {
            matches!(
                event.body,
                EventBody::Notification(Notification::DegradedToPolling)
            )
        })
        .collect();
    assert_eq!(degraded.len(), 1, "exactly one degradation notice");

    stream.disconnect().await;
}

#[tokio::test]
async fn polling_emits_balance_changes_for_tracked_addresses() {
    let account = Account::generate().unwrap();
    let mock = MockTransport::new();
    mock.route_json("/transactions?", 200, json!({"data": []}));
    mock.route_json("/global-snapshots", 200, json!({"hash": "t0", "ordinal": 1}));
    // Balance moves 100 -> 100 -> 250 and then stays put
    mock.route_json("/balance", 200, json!({"balance": 100, "ordinal": 0}));
    mock.route_json("/balance", 200, json!({"balance": 100, "ordinal": 0}));
    mock.route_json("/balance", 200, json!({"balance": 250, "ordinal": 1}));

    let stream = stream_over(mock);
    stream.track_address(account.address().clone());

    let changes = Arc::new(Mutex::new(Vec::<(u64, u64, i128)>::new()));
    let sink = Arc::clone(&changes);
    stream.on(EventKind::BalanceChange, move |event| {
        if let EventBody::BalanceChange {
            old_balance,
            new_balance,
            change,
            ..
        } = &event.body
        {
            sink.lock().push((*old_balance, *new_balance, *change));
        }
    });

    stream.connect().await.unwrap();
    wait_until(|| changes.lock().len() >= 2).await;
    stream.disconnect().await;

    let observed = changes.lock().clone();
    assert_eq!(observed[0], (0, 100, 100));
    assert_eq!(observed[1], (100, 250, 150));
    assert_eq!(observed.len(), 2, "no spurious change events");
}

#[tokio::test]
async fn polling_emits_new_transactions_without_replaying_history() {
    let account = Account::generate().unwrap();
    let old_tx = json!({"hash": "aa".repeat(32), "source": account.address().as_str(),
                        "destination": account.address().as_str(), "amount": 1, "fee": 0});
    let new_tx = json!({"hash": "bb".repeat(32), "source": account.address().as_str(),
                        "destination": account.address().as_str(), "amount": 2, "fee": 0});

    let mock = MockTransport::new();
    // First poll primes on history; later polls surface one new transaction
    mock.route_json("/transactions?", 200, json!({"data": [old_tx.clone()]}));
    mock.route_json("/transactions?", 200, json!({"data": [old_tx, new_tx]}));
    mock.route_json("/global-snapshots", 200, json!({"hash": "t0", "ordinal": 1}));

    let stream = stream_over(mock);
    let hashes = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&hashes);
    stream.on(EventKind::Transaction, move |event| {
        if let EventBody::Transaction(record) = &event.body {
            sink.lock().push(record.hash.clone());
        }
    });

    stream.connect().await.unwrap();
    wait_until(|| !hashes.lock().is_empty()).await;
    // A few more ticks must not re-emit the same hash
    tokio::time::sleep(Duration::from_millis(300)).await;
    stream.disconnect().await;

    let observed = hashes.lock().clone();
    assert_eq!(observed, vec!["bb".repeat(32)]);
}

#[tokio::test]
async fn filters_suppress_delivery_and_count_it() {
    let account = Account::generate().unwrap();
    let tx = json!({"hash": "cc".repeat(32), "source": account.address().as_str(),
                    "destination": account.address().as_str(), "amount": 5, "fee": 0});

    let mock = MockTransport::new();
    mock.route_json("/transactions?", 200, json!({"data": []}));
    mock.route_json("/transactions?", 200, json!({"data": [tx]}));
    mock.route_json("/global-snapshots", 200, json!({"hash": "t0", "ordinal": 1}));

    let stream = stream_over(mock);
    stream.add_filter(
        "nobody",
        EventFilter::new().with_addresses(["DAG-nobody-matches-this"]),
    );

    let delivered = Arc::new(Mutex::new(0u64));
    let sink = Arc::clone(&delivered);
    stream.on(EventKind::Transaction, move |_| {
        *sink.lock() += 1;
    });

    stream.connect().await.unwrap();
    wait_until(|| stream.stats().events_filtered > 0).await;
    stream.disconnect().await;

    assert_eq!(*delivered.lock(), 0, "filtered events must not reach handlers");
}

#[tokio::test]
async fn disconnect_stops_all_delivery() {
    let mock = MockTransport::new();
    mock.route_json("/transactions?", 200, json!({"data": []}));
    mock.route_json("/global-snapshots", 200, json!({"hash": "t0", "ordinal": 1}));

    let stream = stream_over(mock);
    let count = Arc::new(Mutex::new(0u64));
    let sink = Arc::clone(&count);
    stream.on(EventKind::Custom, move |_| {
        *sink.lock() += 1;
    });

    stream.connect().await.unwrap();
    wait_until(|| stream.stats().degraded).await;
    stream.disconnect().await;
    assert_eq!(stream.state(), StreamState::Disconnected);

    let at_disconnect = *count.lock();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*count.lock(), at_disconnect, "no delivery after disconnect");
}

#[tokio::test]
async fn handler_panics_are_isolated() {
    let mock = MockTransport::new();
    mock.route_json("/transactions?", 200, json!({"data": []}));
    mock.route_json("/global-snapshots", 200, json!({"hash": "t0", "ordinal": 1}));

    let stream = stream_over(mock);
    let reports = Arc::new(Mutex::new(0u64));
    let later = Arc::new(Mutex::new(0u64));

    stream.on(EventKind::Custom, |_| panic!("broken handler"));
    let sink = Arc::clone(&later);
    stream.on(EventKind::Custom, move |_| {
        *sink.lock() += 1;
    });
    let error_sink = Arc::clone(&reports);
    stream.on_error(move |_| {
        *error_sink.lock() += 1;
    });

    stream.connect().await.unwrap();
    wait_until(|| *later.lock() > 0).await;
    stream.disconnect().await;

    assert!(*reports.lock() > 0, "panic reported through error callback");
    assert!(stream.stats().handler_errors > 0);
}
