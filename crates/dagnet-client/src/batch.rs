//! Batch request engine
//!
//! Packs independent read operations (and optionally submissions) into one
//! concurrent execution. Dispatch is gated by a semaphore, results come back
//! in caller order, and one operation failing never cancels another. The
//! whole batch only fails up front, on duplicate ids.

use chrono::{DateTime, Utc};
use dagnet_core::types::Address;
use dagnet_core::{validation, Envelope, ValidationError};
use dagnet_network::{
    BalanceInfo, NetworkClient, NetworkError, NodeInfo, PeerInfo, TransactionRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Default bound on operations in flight
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Largest accepted `limit` parameter for transaction listings
const MAX_LIST_LIMIT: usize = 1000;

/// The closed set of operations a batch can carry
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchCall {
    /// Balance and last reference of an address
    Balance {
        /// Address to query
        address: String,
    },
    /// Last accepted ordinal of an address
    Ordinal {
        /// Address to query
        address: String,
    },
    /// Recent transactions involving an address
    Transactions {
        /// Address to query
        address: String,
        /// Maximum records to return
        limit: usize,
    },
    /// Recent transactions across the network
    RecentTransactions {
        /// Maximum records to return
        limit: usize,
    },
    /// Node identity and state
    NodeInfo,
    /// Cluster peer listing
    ClusterInfo,
    /// Submit a signed envelope
    SubmitTransaction {
        /// The signed envelope
        envelope: Envelope,
    },
}

impl BatchCall {
    /// Validate parameters before any dispatch
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Balance { address } | Self::Ordinal { address } => {
                validation::validate_address(address)
            }
            Self::Transactions { address, limit } => {
                validation::validate_address(address)?;
                validate_limit(*limit)
            }
            Self::RecentTransactions { limit } => validate_limit(*limit),
            Self::NodeInfo | Self::ClusterInfo => Ok(()),
            Self::SubmitTransaction { envelope } => validation::validate_envelope(envelope),
        }
    }
}

fn validate_limit(limit: usize) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(ValidationError::new(
            "limit",
            format!("must be between 1 and {MAX_LIST_LIMIT}"),
        ));
    }
    Ok(())
}

/// One operation with its caller-chosen id
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchOperation {
    /// Caller-chosen id, unique within the batch
    pub id: String,
    /// The operation to perform
    pub call: BatchCall,
}

impl BatchOperation {
    /// Pair an id with a call
    pub fn new(id: impl Into<String>, call: BatchCall) -> Self {
        Self {
            id: id.into(),
            call,
        }
    }
}

/// Typed payload of a successful batch item
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BatchData {
    /// Result of [`BatchCall::Balance`]
    Balance(BalanceInfo),
    /// Result of [`BatchCall::Ordinal`]
    Ordinal(u64),
    /// Result of [`BatchCall::Transactions`] or [`BatchCall::RecentTransactions`]
    Transactions(Vec<TransactionRecord>),
    /// Result of [`BatchCall::NodeInfo`]
    NodeInfo(NodeInfo),
    /// Result of [`BatchCall::ClusterInfo`]
    ClusterInfo(Vec<PeerInfo>),
    /// Result of [`BatchCall::SubmitTransaction`]
    Submitted {
        /// Hash of the accepted transaction
        hash: String,
    },
}

/// Outcome of one operation
#[derive(Clone, Debug, Serialize)]
pub struct BatchItem {
    /// The operation's id
    pub id: String,
    /// Whether the operation succeeded
    pub success: bool,
    /// Payload on success
    pub data: Option<BatchData>,
    /// Machine-readable failure kind on failure
    pub error_kind: Option<String>,
    /// Human-readable failure message on failure
    pub error: Option<String>,
    /// Wall time this operation took, measured independently
    pub elapsed_ms: u64,
}

impl BatchItem {
    fn success(id: String, data: BatchData, started: Instant) -> Self {
        Self {
            id,
            success: true,
            data: Some(data),
            error_kind: None,
            error: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn failure(id: String, kind: &str, message: String, started: Instant) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error_kind: Some(kind.to_string()),
            error: Some(message),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Aggregate result of a batch
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    /// Per-operation results in caller order
    pub results: Vec<BatchItem>,
    /// When execution started
    pub started_at: DateTime<Utc>,
    /// When execution finished
    pub finished_at: DateTime<Utc>,
    /// Total wall time
    pub execution_time_ms: u64,
    /// Successes over total, as a percentage; 100 for an empty batch
    pub success_rate: f64,
    /// Whether more than one operation could run at once
    pub concurrent_execution: bool,
}

impl BatchReport {
    /// Find a result by operation id
    pub fn get(&self, id: &str) -> Option<&BatchItem> {
        self.results.iter().find(|item| item.id == id)
    }

    /// Only the successful results
    pub fn successes(&self) -> impl Iterator<Item = &BatchItem> {
        self.results.iter().filter(|item| item.success)
    }

    /// Only the failed results
    pub fn failures(&self) -> impl Iterator<Item = &BatchItem> {
        self.results.iter().filter(|item| !item.success)
    }
}

/// Concurrent executor for batch operations
pub struct BatchEngine {
    network: Arc<NetworkClient>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl BatchEngine {
    /// An engine over a network client with default concurrency
    pub fn new(network: Arc<NetworkClient>) -> Self {
        Self {
            network,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound the number of operations in flight (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// A token that cancels this engine's batches when triggered.
    ///
    /// Cancellation is cooperative: operations that have not started report
    /// `error_kind = "cancelled"`, in-flight operations finish.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute a batch; results come back in input order.
    ///
    /// Fails as a whole only on duplicate ids. An empty batch yields an
    /// empty report with a 100% success rate.
    pub async fn execute(
        &self,
        operations: Vec<BatchOperation>,
    ) -> Result<BatchReport, ValidationError> {
        let mut seen = HashSet::new();
        for op in &operations {
            if !seen.insert(op.id.clone()) {
                return Err(ValidationError::new(
                    "id",
                    format!("duplicate operation id '{}'", op.id),
                ));
            }
        }

        let started_at = Utc::now();
        let timer = Instant::now();
        let total = operations.len();
        let concurrent = self.concurrency > 1 && total > 1;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);
        for op in operations {
            let network = Arc::clone(&self.network);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let id = op.id.clone();
            let handle = tokio::spawn(run_operation(network, semaphore, cancel, op));
            handles.push((id, handle));
        }

        let mut results = Vec::with_capacity(total);
        for (id, handle) in handles {
            match handle.await {
                Ok(item) => results.push(item),
                Err(err) => results.push(BatchItem::failure(
                    id,
                    "internal",
                    format!("operation task failed: {err}"),
                    timer,
                )),
            }
        }

        let successes = results.iter().filter(|item| item.success).count();
        let success_rate = if total == 0 {
            100.0
        } else {
            successes as f64 / total as f64 * 100.0
        };

        Ok(BatchReport {
            results,
            started_at,
            finished_at: Utc::now(),
            execution_time_ms: timer.elapsed().as_millis() as u64,
            success_rate,
            concurrent_execution: concurrent,
        })
    }
}

async fn run_operation(
    network: Arc<NetworkClient>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    op: BatchOperation,
) -> BatchItem {
    let started = Instant::now();

    if let Err(err) = op.call.validate() {
        return BatchItem::failure(op.id, "validation", err.to_string(), started);
    }

    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return BatchItem::failure(op.id, "cancelled", "batch was cancelled".into(), started);
        }
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                return BatchItem::failure(op.id, "internal", "scheduler closed".into(), started);
            }
        },
    };

    let outcome = dispatch(&network, op.call).await;
    drop(permit);

    match outcome {
        Ok(data) => BatchItem::success(op.id, data, started),
        Err(err) => BatchItem::failure(op.id, err.kind(), err.to_string(), started),
    }
}

async fn dispatch(network: &NetworkClient, call: BatchCall) -> Result<BatchData, NetworkError> {
    match call {
        BatchCall::Balance { address } => {
            let address = Address::new(address)?;
            network.balance(&address).await.map(BatchData::Balance)
        }
        BatchCall::Ordinal { address } => {
            let address = Address::new(address)?;
            network.ordinal(&address).await.map(BatchData::Ordinal)
        }
        BatchCall::Transactions { address, limit } => {
            let address = Address::new(address)?;
            network
                .transactions(&address, limit)
                .await
                .map(BatchData::Transactions)
        }
        BatchCall::RecentTransactions { limit } => network
            .recent_transactions(limit)
            .await
            .map(BatchData::Transactions),
        BatchCall::NodeInfo => network.node_info().await.map(BatchData::NodeInfo),
        BatchCall::ClusterInfo => network.cluster_info().await.map(BatchData::ClusterInfo),
        BatchCall::SubmitTransaction { envelope } => network
            .submit(&envelope)
            .await
            .map(|hash| BatchData::Submitted { hash }),
    }
}

/// Balance operations for a set of addresses, ids `balance_0..n`
pub fn balances_of(addresses: &[Address]) -> Vec<BatchOperation> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, address)| {
            BatchOperation::new(
                format!("balance_{i}"),
                BatchCall::Balance {
                    address: address.as_str().to_string(),
                },
            )
        })
        .collect()
}

/// Ordinal operations for a set of addresses, ids `ordinal_0..n`
pub fn ordinals_of(addresses: &[Address]) -> Vec<BatchOperation> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, address)| {
            BatchOperation::new(
                format!("ordinal_{i}"),
                BatchCall::Ordinal {
                    address: address.as_str().to_string(),
                },
            )
        })
        .collect()
}

/// Transaction listings for a set of addresses, ids `transactions_0..n`
pub fn transactions_of(addresses: &[Address], limit: usize) -> Vec<BatchOperation> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, address)| {
            BatchOperation::new(
                format!("transactions_{i}"),
                BatchCall::Transactions {
                    address: address.as_str().to_string(),
                    limit,
                },
            )
        })
        .collect()
}
