//! Live event stream over push or polling transports
//!
//! A [`NetworkEventStream`] delivers transactions, balance changes and block
//! tips from one deployment. It prefers the push endpoint and reconnects with
//! exponential backoff when the connection drops; after enough consecutive
//! connection failures it degrades to a polling loop over the read API and
//! says so exactly once through a [`Notification::DegradedToPolling`] event.
//!
//! Handlers run in registration order and are isolated from each other:
//! a panicking handler is reported through the error callback and later
//! handlers still run. Within one feed, events are delivered in receive
//! order.

use crate::error::StreamError;
use crate::events::{
    parse_push_frame, EventBody, EventFilter, EventKind, EventSource, Notification, StreamEvent,
};
use crate::factory::now_millis;
use dagnet_core::types::Address;
use dagnet_network::NetworkClient;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Bound on remembered transaction hashes in polling mode
const SEEN_CAPACITY: usize = 4096;

/// Lifecycle of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Created, never connected
    Idle,
    /// Connection attempt in progress
    Connecting,
    /// Delivering events, over push or polling
    Connected,
    /// Push connection lost, backing off before the next attempt
    Reconnecting,
    /// Final state after `disconnect()`
    Disconnected,
}

/// Which transport currently feeds the stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    /// No feed is active
    Inactive,
    /// Persistent push connection
    Push,
    /// Timer-driven polling of the read API
    Polling,
}

/// Tunable stream behavior
#[derive(Clone, Debug)]
pub struct StreamOptions {
    /// Polling-mode tick interval
    pub poll_interval: Duration,
    /// Transactions fetched per polling tick
    pub recent_limit: usize,
    /// Push handshake deadline
    pub connect_timeout: Duration,
    /// First reconnect delay; doubles per failure
    pub reconnect_base: Duration,
    /// Reconnect delay cap
    pub reconnect_cap: Duration,
    /// Consecutive handshake failures before degrading to polling
    pub max_push_failures: u32,
    /// Idle interval after which a ping is sent
    pub ping_interval: Duration,
    /// Idle interval after which the push connection counts as dead
    pub idle_timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            recent_limit: 50,
            connect_timeout: Duration::from_secs(10),
            reconnect_base: Duration::from_secs(1),
            reconnect_cap: Duration::from_secs(30),
            max_push_failures: 5,
            ping_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Point-in-time stream statistics
#[derive(Clone, Debug, Default)]
pub struct StreamStats {
    /// Events received from any feed, before filtering
    pub events_received: u64,
    /// Events suppressed by filters
    pub events_filtered: u64,
    /// Malformed frames dropped
    pub events_dropped: u64,
    /// Handler invocations that panicked
    pub handler_errors: u64,
    /// Completed push sessions that were lost and retried
    pub reconnections: u64,
    /// Whether the stream has degraded to polling
    pub degraded: bool,
    /// Time since the stream first connected
    pub uptime: Duration,
}

type Handler = Arc<dyn Fn(&StreamEvent) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct StatsInner {
    events_received: u64,
    events_filtered: u64,
    events_dropped: u64,
    handler_errors: u64,
    reconnections: u64,
    degraded: bool,
    connected_at: Option<Instant>,
}

#[derive(Default)]
struct SeenSet {
    set: HashSet<String>,
    order: VecDeque<String>,
}

struct StreamInner {
    network: NetworkClient,
    options: StreamOptions,
    state: Mutex<StreamState>,
    mode: Mutex<TransportMode>,
    finalized: AtomicBool,
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
    on_error: RwLock<Option<ErrorHandler>>,
    filters: RwLock<HashMap<String, EventFilter>>,
    tracked: RwLock<HashSet<Address>>,
    balances: Mutex<HashMap<String, u64>>,
    seen: Mutex<SeenSet>,
    last_tip: Mutex<Option<String>>,
    stats: Mutex<StatsInner>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl StreamInner {
    fn set_state(&self, state: StreamState) {
        *self.state.lock() = state;
    }

    fn set_mode(&self, mode: TransportMode) {
        *self.mode.lock() = mode;
    }

    fn mark_connected(&self) {
        let mut stats = self.stats.lock();
        if stats.connected_at.is_none() {
            stats.connected_at = Some(Instant::now());
        }
    }

    /// Run an event through filters and handlers
    fn emit(&self, event: StreamEvent) {
        self.stats.lock().events_received += 1;

        let filters: Vec<EventFilter> = self.filters.read().values().cloned().collect();
        if !filters.iter().all(|filter| filter.matches(&event)) {
            self.stats.lock().events_filtered += 1;
            return;
        }

        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(&event)));
            if outcome.is_err() {
                self.stats.lock().handler_errors += 1;
                tracing::error!("event handler panicked; continuing with remaining handlers");
                let callback = self.on_error.read().clone();
                if let Some(callback) = callback {
                    callback("event handler panicked");
                }
            }
        }
    }

    /// Record a transaction hash; true if it was not seen before
    fn remember_hash(&self, hash: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.set.contains(hash) {
            return false;
        }
        seen.set.insert(hash.to_string());
        seen.order.push_back(hash.to_string());
        while seen.order.len() > SEEN_CAPACITY {
            if let Some(evicted) = seen.order.pop_front() {
                seen.set.remove(&evicted);
            }
        }
        true
    }
}

/// Long-lived event feed for one deployment
pub struct NetworkEventStream {
    inner: Arc<StreamInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkEventStream {
    /// A stream over a network client with default options
    pub fn new(network: NetworkClient) -> Self {
        Self::with_options(network, StreamOptions::default())
    }

    /// A stream with explicit options
    pub fn with_options(network: NetworkClient, options: StreamOptions) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                network,
                options,
                state: Mutex::new(StreamState::Idle),
                mode: Mutex::new(TransportMode::Inactive),
                finalized: AtomicBool::new(false),
                handlers: RwLock::new(HashMap::new()),
                on_error: RwLock::new(None),
                filters: RwLock::new(HashMap::new()),
                tracked: RwLock::new(HashSet::new()),
                balances: Mutex::new(HashMap::new()),
                seen: Mutex::new(SeenSet::default()),
                last_tip: Mutex::new(None),
                stats: Mutex::new(StatsInner::default()),
                cancel: Mutex::new(None),
            }),
            task: Mutex::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        *self.inner.state.lock()
    }

    /// Which transport currently feeds the stream
    pub fn mode(&self) -> TransportMode {
        *self.inner.mode.lock()
    }

    /// Register a handler for one event kind; handlers fire in
    /// registration order
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Register the callback that reports isolated handler failures
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.inner.on_error.write() = Some(Arc::new(callback));
    }

    /// Add a named filter; all filters must accept an event for delivery
    pub fn add_filter(&self, name: impl Into<String>, filter: EventFilter) {
        self.inner.filters.write().insert(name.into(), filter);
    }

    /// Remove a named filter
    pub fn remove_filter(&self, name: &str) {
        self.inner.filters.write().remove(name);
    }

    /// Track an address for balance-change events
    pub fn track_address(&self, address: Address) {
        self.inner.tracked.write().insert(address);
    }

    /// Stop tracking an address
    pub fn untrack_address(&self, address: &Address) {
        self.inner.tracked.write().remove(address);
        self.inner.balances.lock().remove(address.as_str());
    }

    /// Snapshot of stream statistics
    pub fn stats(&self) -> StreamStats {
        let stats = self.inner.stats.lock();
        StreamStats {
            events_received: stats.events_received,
            events_filtered: stats.events_filtered,
            events_dropped: stats.events_dropped,
            handler_errors: stats.handler_errors,
            reconnections: stats.reconnections,
            degraded: stats.degraded,
            uptime: stats
                .connected_at
                .map(|at| at.elapsed())
                .unwrap_or_default(),
        }
    }

    /// Start delivering events. Idempotent while the stream is live;
    /// connecting again after the final disconnect is an error.
    pub async fn connect(&self) -> Result<(), StreamError> {
        if self.inner.finalized.load(Ordering::SeqCst) {
            return Err(StreamError::Closed);
        }
        {
            let mut state = self.inner.state.lock();
            match *state {
                StreamState::Connecting
                | StreamState::Connected
                | StreamState::Reconnecting => return Ok(()),
                _ => *state = StreamState::Connecting,
            }
        }

        let token = CancellationToken::new();
        *self.inner.cancel.lock() = Some(token.clone());
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run_loop(inner, token));
        *self.task.lock() = Some(handle);
        Ok(())
    }

    /// Stop the stream for good. Cancels timers and the push connection,
    /// waits for in-flight handler invocations, and leaves the stream in
    /// its final `Disconnected` state. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.finalized.store(true, Ordering::SeqCst);
        let token = self.inner.cancel.lock().take();
        if let Some(token) = token {
            token.cancel();
        }
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner.set_mode(TransportMode::Inactive);
        self.inner.set_state(StreamState::Disconnected);
    }
}

enum SessionEnd {
    Cancelled,
    Lost,
    Failed(String),
}

async fn run_loop(inner: Arc<StreamInner>, cancel: CancellationToken) {
    let mut consecutive_failures = 0u32;
    let mut delay = inner.options.reconnect_base;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        match push_session(&inner, &cancel).await {
            SessionEnd::Cancelled => return,
            SessionEnd::Lost => {
                consecutive_failures = 0;
                delay = inner.options.reconnect_base;
                inner.stats.lock().reconnections += 1;
                inner.set_state(StreamState::Reconnecting);
                tracing::warn!("push connection lost, reconnecting");
                if !sleep_or_cancel(delay, &cancel).await {
                    return;
                }
            }
            SessionEnd::Failed(reason) => {
                consecutive_failures += 1;
                tracing::warn!(
                    attempt = consecutive_failures,
                    threshold = inner.options.max_push_failures,
                    "push connection failed: {reason}"
                );
                if consecutive_failures >= inner.options.max_push_failures {
                    degrade_to_polling(&inner);
                    polling_loop(&inner, &cancel).await;
                    return;
                }
                inner.set_state(StreamState::Reconnecting);
                if !sleep_or_cancel(delay, &cancel).await {
                    return;
                }
                delay = (delay * 2).min(inner.options.reconnect_cap);
            }
        }
    }
}

fn degrade_to_polling(inner: &Arc<StreamInner>) {
    inner.stats.lock().degraded = true;
    inner.set_mode(TransportMode::Polling);
    inner.set_state(StreamState::Connected);
    inner.mark_connected();
    tracing::info!("push endpoint unavailable, degraded to polling");
    inner.emit(StreamEvent {
        kind: EventKind::Custom,
        deployment: inner.network.deployment().name.clone(),
        timestamp_ms: now_millis(),
        source: EventSource::Polling,
        body: EventBody::Notification(Notification::DegradedToPolling),
    });
}

async fn push_session(inner: &Arc<StreamInner>, cancel: &CancellationToken) -> SessionEnd {
    let url = inner.network.deployment().events_url();
    let handshake = tokio::time::timeout(inner.options.connect_timeout, connect_async(url.as_str()));

    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return SessionEnd::Cancelled,
        outcome = handshake => match outcome {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => return SessionEnd::Failed(e.to_string()),
            Err(_) => return SessionEnd::Failed("handshake timed out".to_string()),
        },
    };

    inner.set_mode(TransportMode::Push);
    inner.set_state(StreamState::Connected);
    inner.mark_connected();
    tracing::info!(%url, "push connection established");

    let deployment = inner.network.deployment().name.clone();
    let (mut write, mut read) = stream.split();
    let mut ping = tokio::time::interval(inner.options.ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping.tick().await;
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Cancelled;
            }
            _ = ping.tick() => {
                if last_activity.elapsed() >= inner.options.idle_timeout {
                    tracing::warn!("push connection idle past dead threshold");
                    return SessionEnd::Lost;
                }
                if write.send(Message::Ping(Vec::new())).await.is_err() {
                    return SessionEnd::Lost;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    last_activity = Instant::now();
                    match parse_push_frame(&text, &deployment, now_millis()) {
                        Some(event) => inner.emit(event),
                        None => {
                            inner.stats.lock().events_dropped += 1;
                            tracing::debug!("dropped malformed push frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    last_activity = Instant::now();
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("push read error: {e}");
                    return SessionEnd::Lost;
                }
            }
        }
    }
}

async fn polling_loop(inner: &Arc<StreamInner>, cancel: &CancellationToken) {
    let mut interval = tokio::time::interval(inner.options.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut primed = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                poll_once(inner, primed).await;
                primed = true;
            }
        }
    }
}

/// One polling tick: transactions, tracked balances, snapshot tip.
///
/// The first tick primes the transaction and tip baselines without emitting,
/// so connecting does not replay history. Poll errors are logged and retried
/// on the next tick.
async fn poll_once(inner: &Arc<StreamInner>, primed: bool) {
    let deployment = inner.network.deployment().name.clone();

    match inner
        .network
        .recent_transactions(inner.options.recent_limit)
        .await
    {
        Ok(records) => {
            for record in records {
                if record.hash.is_empty() {
                    inner.stats.lock().events_dropped += 1;
                    continue;
                }
                if inner.remember_hash(&record.hash) && primed {
                    inner.emit(StreamEvent {
                        kind: EventKind::Transaction,
                        deployment: deployment.clone(),
                        timestamp_ms: now_millis(),
                        source: EventSource::Polling,
                        body: EventBody::Transaction(record),
                    });
                }
            }
        }
        Err(e) => tracing::warn!("transaction poll failed: {e}"),
    }

    let tracked: Vec<Address> = inner.tracked.read().iter().cloned().collect();
    for address in tracked {
        match inner.network.balance(&address).await {
            Ok(info) => {
                let old_balance = {
                    let mut balances = inner.balances.lock();
                    let old = balances
                        .get(address.as_str())
                        .copied()
                        .unwrap_or_default();
                    balances.insert(address.as_str().to_string(), info.balance);
                    old
                };
                if old_balance != info.balance {
                    inner.emit(StreamEvent {
                        kind: EventKind::BalanceChange,
                        deployment: deployment.clone(),
                        timestamp_ms: now_millis(),
                        source: EventSource::Polling,
                        body: EventBody::BalanceChange {
                            address: address.as_str().to_string(),
                            old_balance,
                            new_balance: info.balance,
                            change: info.balance as i128 - old_balance as i128,
                        },
                    });
                }
            }
            Err(e) => tracing::warn!(%address, "balance poll failed: {e}"),
        }
    }

    match inner.network.latest_snapshot().await {
        Ok(snapshot) => {
            let tip = snapshot
                .hash
                .clone()
                .or_else(|| snapshot.ordinal.map(|o| o.to_string()));
            if let Some(tip) = tip {
                let previous = {
                    let mut last = inner.last_tip.lock();
                    if last.as_deref() == Some(tip.as_str()) {
                        None
                    } else {
                        Some(last.replace(tip))
                    }
                };
                if let Some(previous) = previous {
                    if previous.is_some() {
                        inner.emit(StreamEvent {
                            kind: EventKind::Block,
                            deployment: deployment.clone(),
                            timestamp_ms: now_millis(),
                            source: EventSource::Polling,
                            body: EventBody::Block {
                                hash: snapshot.hash.clone(),
                                ordinal: snapshot.ordinal,
                            },
                        });
                    }
                }
            }
        }
        Err(e) => tracing::debug!("snapshot poll failed: {e}"),
    }
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
