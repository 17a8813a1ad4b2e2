//! Stream event types and filters
//!
//! Events are tagged variants: each kind carries exactly the fields that kind
//! needs, and handlers match on the tag. Filters AND together; an event is
//! delivered only if every registered filter accepts it.

use dagnet_network::TransactionRecord;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Kind tag used for handler registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A transaction was observed
    Transaction,
    /// A tracked address changed balance
    BalanceChange,
    /// A new snapshot tip was observed
    Block,
    /// SDK notifications and unrecognized push payloads
    Custom,
}

/// Which transport produced an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSource {
    /// Server-pushed over the persistent connection
    Push,
    /// Synthesized by the polling loop
    Polling,
}

/// Out-of-band notifications surfaced as custom events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The push endpoint was given up on; the stream now polls
    DegradedToPolling,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegradedToPolling => write!(f, "degraded to polling"),
        }
    }
}

/// Kind-specific event payload
#[derive(Clone, Debug)]
pub enum EventBody {
    /// Payload of [`EventKind::Transaction`]
    Transaction(TransactionRecord),
    /// Payload of [`EventKind::BalanceChange`]
    BalanceChange {
        /// The tracked address
        address: String,
        /// Balance before the change
        old_balance: u64,
        /// Balance after the change
        new_balance: u64,
        /// Signed difference `new - old`
        change: i128,
    },
    /// Payload of [`EventKind::Block`]
    Block {
        /// Snapshot hash, when reported
        hash: Option<String>,
        /// Snapshot ordinal, when reported
        ordinal: Option<u64>,
    },
    /// An SDK notification
    Notification(Notification),
    /// An unrecognized but well-formed push payload
    Custom(Value),
}

/// One event delivered to handlers
#[derive(Clone, Debug)]
pub struct StreamEvent {
    /// Kind tag
    pub kind: EventKind,
    /// Name of the deployment the event came from
    pub deployment: String,
    /// Milliseconds since the Unix epoch at receipt
    pub timestamp_ms: i64,
    /// Which transport produced the event
    pub source: EventSource,
    /// Kind-specific payload
    pub body: EventBody,
}

impl StreamEvent {
    /// Addresses involved in this event, for filtering
    pub fn addresses(&self) -> Vec<&str> {
        match &self.body {
            EventBody::Transaction(tx) => {
                let mut out = Vec::with_capacity(2);
                if !tx.source.is_empty() {
                    out.push(tx.source.as_str());
                }
                if !tx.destination.is_empty() {
                    out.push(tx.destination.as_str());
                }
                out
            }
            EventBody::BalanceChange { address, .. } => vec![address.as_str()],
            _ => Vec::new(),
        }
    }

    /// The amount carried by this event, if any
    pub fn amount(&self) -> Option<u64> {
        match &self.body {
            EventBody::Transaction(tx) => Some(tx.amount),
            EventBody::BalanceChange { change, .. } => Some(change.unsigned_abs().min(u64::MAX as u128) as u64),
            _ => None,
        }
    }

    /// The transaction type tag, if this is a transaction event
    pub fn transaction_type(&self) -> Option<&str> {
        match &self.body {
            EventBody::Transaction(tx) => tx.kind.as_deref(),
            _ => None,
        }
    }
}

type Predicate = Arc<dyn Fn(&StreamEvent) -> bool + Send + Sync>;

/// A conjunction of optional criteria; unset criteria accept everything
#[derive(Clone, Default)]
pub struct EventFilter {
    addresses: Option<HashSet<String>>,
    transaction_types: Option<HashSet<String>>,
    amount_range: Option<(u64, u64)>,
    predicate: Option<Predicate>,
}

impl EventFilter {
    /// A filter that accepts every event
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept only events touching one of these addresses
    pub fn with_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.addresses = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Accept only transaction events with one of these type tags
    pub fn with_transaction_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transaction_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Accept only events whose amount falls in `[min, max]`
    pub fn with_amount_range(mut self, min: u64, max: u64) -> Self {
        self.amount_range = Some((min, max));
        self
    }

    /// Accept only events passing a custom predicate
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StreamEvent) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Whether this filter accepts an event
    pub fn matches(&self, event: &StreamEvent) -> bool {
        if let Some(addresses) = &self.addresses {
            let involved = event.addresses();
            if !involved.iter().any(|a| addresses.contains(*a)) {
                return false;
            }
        }

        if let Some(types) = &self.transaction_types {
            if event.kind == EventKind::Transaction {
                match event.transaction_type() {
                    Some(tag) if types.contains(tag) => {}
                    _ => return false,
                }
            }
        }

        if let Some((min, max)) = self.amount_range {
            let amount = event.amount().unwrap_or(0);
            if amount < min || amount > max {
                return false;
            }
        }

        if let Some(predicate) = &self.predicate {
            if !predicate(event) {
                return false;
            }
        }

        true
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("addresses", &self.addresses)
            .field("transaction_types", &self.transaction_types)
            .field("amount_range", &self.amount_range)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Parse a server-pushed frame into an event, if it is one we recognize.
///
/// Frames look like `{"type": "transaction", "transaction": {...}}` with
/// sibling keys per type; anything else well-formed becomes a custom event
/// and anything malformed is dropped by the caller.
pub(crate) fn parse_push_frame(text: &str, deployment: &str, now_ms: i64) -> Option<StreamEvent> {
    let value: Value = serde_json::from_str(text).ok()?;
    let kind_tag = value.get("type")?.as_str()?;

    let event = |kind, body| StreamEvent {
        kind,
        deployment: deployment.to_string(),
        timestamp_ms: now_ms,
        source: EventSource::Push,
        body,
    };

    match kind_tag {
        "transaction" => {
            let record: TransactionRecord =
                serde_json::from_value(value.get("transaction")?.clone()).ok()?;
            Some(event(EventKind::Transaction, EventBody::Transaction(record)))
        }
        "balance_change" => {
            let data = value.get("balance_data")?;
            let old_balance = data.get("old_balance")?.as_u64()?;
            let new_balance = data.get("new_balance")?.as_u64()?;
            Some(event(
                EventKind::BalanceChange,
                EventBody::BalanceChange {
                    address: data.get("address")?.as_str()?.to_string(),
                    old_balance,
                    new_balance,
                    change: new_balance as i128 - old_balance as i128,
                },
            ))
        }
        "block" => {
            let block = value.get("block")?;
            Some(event(
                EventKind::Block,
                EventBody::Block {
                    hash: block.get("hash").and_then(Value::as_str).map(str::to_string),
                    ordinal: block.get("ordinal").and_then(Value::as_u64),
                },
            ))
        }
        _ => Some(event(EventKind::Custom, EventBody::Custom(value))),
    }
}
