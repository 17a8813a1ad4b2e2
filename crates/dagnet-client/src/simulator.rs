//! Pre-flight transaction simulation
//!
//! The simulator validates an envelope against structural and, when a
//! network handle is supplied, environmental preconditions without ever
//! signing or submitting anything. Balance lookups inside one simulation
//! burst are deduplicated through a small time-bounded cache keyed by
//! `(deployment, source)`.

use dagnet_core::{validation, Envelope, Proof, TransactionValue, ValidationError};
use dagnet_network::{BalanceInfo, NetworkClient};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default cache TTL for balance lookups
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Default bound on cached `(deployment, source)` entries
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// DER signature placeholder length used to size unsigned envelopes
const PLACEHOLDER_SIGNATURE_BYTES: usize = 72;

/// Environmental preconditions a transaction can fail
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvironmentalError {
    /// The source cannot cover amount plus fee
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        /// Amount plus fee in smallest units
        required: u64,
        /// Current balance in smallest units
        available: u64,
    },

    /// The parent ordinal is behind the source's current ordinal
    #[error("parent reference is stale: parent ordinal {parent}, current {current}")]
    ParentReferenceStale {
        /// Ordinal named by the envelope's parent reference
        parent: u64,
        /// Last accepted ordinal for the source
        current: u64,
    },
}

/// Qualitative success estimate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Online checks ran and every one passed
    High,
    /// Structurally valid, environment unknown
    Medium,
    /// At least one check failed
    Low,
}

/// Outcome of a simulation
#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    /// Conjunction of every known check
    pub will_succeed: bool,
    /// Structural failures, in validator order
    pub validation_errors: Vec<ValidationError>,
    /// Environmental failures observed online
    pub environmental_errors: Vec<EnvironmentalError>,
    /// Canonical size after signing (placeholder proof if unsigned)
    pub estimated_size_bytes: usize,
    /// Source balance before the transaction, when known
    pub balance_before: Option<u64>,
    /// Source balance after amount and fee, when known; may be negative
    pub balance_after: Option<i128>,
    /// Whether the parent reference is at or ahead of the current ordinal
    pub parent_reference_fresh: Option<bool>,
    /// Qualitative estimate
    pub confidence: Confidence,
}

/// Aggregate outcome of simulating a chained batch
#[derive(Clone, Debug, Serialize)]
pub struct ChainSimulationReport {
    /// Per-envelope structural reports, in chain order
    pub reports: Vec<SimulationReport>,
    /// Sum of amounts and fees across every transfer in the chain
    pub total_spend: u128,
    /// Source balance before the chain, when known
    pub balance_before: Option<u64>,
    /// Source balance after the whole chain, when known; may be negative
    pub cumulative_balance_after: Option<i128>,
    /// Whether every leg passes and the balance covers the whole chain
    pub all_will_succeed: bool,
}

struct CachedBalance {
    info: BalanceInfo,
    fetched_at: Instant,
}

/// Simulation engine, offline or bound to a deployment
pub struct Simulator {
    network: Option<Arc<NetworkClient>>,
    cache: Mutex<HashMap<(String, String), CachedBalance>>,
    cache_ttl: Duration,
    cache_capacity: usize,
}

impl Simulator {
    /// A simulator with no network handle; only structural checks run
    pub fn offline() -> Self {
        Self {
            network: None,
            cache: Mutex::new(HashMap::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// A simulator that also runs balance and ordinal checks
    pub fn new(network: Arc<NetworkClient>) -> Self {
        Self {
            network: Some(network),
            ..Self::offline()
        }
    }

    /// Override the balance cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Simulate an envelope, signed or unsigned.
    ///
    /// Never signs, never submits, never mutates its input.
    pub async fn simulate(&self, envelope: &Envelope) -> SimulationReport {
        self.simulate_with(envelope, true).await
    }

    /// Simulate a chained batch from one source.
    ///
    /// Envelopes are checked structurally one by one; the cumulative spend
    /// is then checked once against the source balance, so a chain that
    /// would drain the account partway through fails as a whole instead of
    /// every leg passing against the same starting balance.
    pub async fn simulate_chain(&self, envelopes: &[Envelope]) -> ChainSimulationReport {
        let mut reports = Vec::with_capacity(envelopes.len());
        let mut total_spend: u128 = 0;
        for envelope in envelopes {
            if let TransactionValue::Transfer { amount, fee, .. } = &envelope.value {
                total_spend += *amount as u128 + *fee as u128;
            }
            reports.push(self.simulate_with(envelope, false).await);
        }

        let mut balance_before = None;
        let mut cumulative_balance_after = None;
        if let (Some(network), Some(first)) = (&self.network, envelopes.first()) {
            if let Some(info) = self
                .fetch_balance(network, first.value.source().as_str())
                .await
            {
                balance_before = Some(info.balance);
                cumulative_balance_after = Some(info.balance as i128 - total_spend as i128);
            }
        }

        let all_will_succeed = reports.iter().all(|report| report.will_succeed)
            && cumulative_balance_after.map_or(true, |after| after >= 0);

        ChainSimulationReport {
            reports,
            total_spend,
            balance_before,
            cumulative_balance_after,
            all_will_succeed,
        }
    }

    async fn simulate_with(&self, envelope: &Envelope, check_environment: bool) -> SimulationReport {
        let mut report = SimulationReport {
            will_succeed: false,
            validation_errors: Vec::new(),
            environmental_errors: Vec::new(),
            estimated_size_bytes: estimated_size(envelope),
            balance_before: None,
            balance_after: None,
            parent_reference_fresh: None,
            confidence: Confidence::Low,
        };

        if let Err(err) = validation::validate_value(&envelope.value) {
            report.validation_errors.push(err);
        }
        if envelope.is_signed() {
            if let Err(err) = validation::validate_envelope(envelope) {
                if !report.validation_errors.contains(&err) {
                    report.validation_errors.push(err);
                }
            }
        }

        let mut online = false;
        if check_environment && report.validation_errors.is_empty() {
            if let (Some(network), TransactionValue::Transfer { .. }) =
                (&self.network, &envelope.value)
            {
                online = self.check_environment(network, envelope, &mut report).await;
            }
        }

        report.will_succeed = report.validation_errors.is_empty()
            && report.environmental_errors.is_empty()
            && report.balance_after.map_or(true, |b| b >= 0)
            && report.parent_reference_fresh.unwrap_or(true);

        report.confidence = if !report.will_succeed {
            Confidence::Low
        } else if online {
            Confidence::High
        } else {
            Confidence::Medium
        };

        report
    }

    /// Whether an online balance check was completed
    async fn check_environment(
        &self,
        network: &Arc<NetworkClient>,
        envelope: &Envelope,
        report: &mut SimulationReport,
    ) -> bool {
        let (amount, fee) = match &envelope.value {
            TransactionValue::Transfer { amount, fee, .. } => (*amount, *fee),
            TransactionValue::DataSubmission { .. } => return false,
        };

        let info = match self.fetch_balance(network, envelope.value.source().as_str()).await {
            Some(info) => info,
            None => return false,
        };

        let required = amount as u128 + fee as u128;
        let after = info.balance as i128 - required as i128;
        report.balance_before = Some(info.balance);
        report.balance_after = Some(after);
        if after < 0 {
            report
                .environmental_errors
                .push(EnvironmentalError::InsufficientBalance {
                    required: required.min(u64::MAX as u128) as u64,
                    available: info.balance,
                });
        }

        let parent = envelope.value.parent();
        let fresh = parent.ordinal >= info.ordinal;
        report.parent_reference_fresh = Some(fresh);
        if !fresh {
            report
                .environmental_errors
                .push(EnvironmentalError::ParentReferenceStale {
                    parent: parent.ordinal,
                    current: info.ordinal,
                });
        }

        true
    }

    async fn fetch_balance(
        &self,
        network: &Arc<NetworkClient>,
        source: &str,
    ) -> Option<BalanceInfo> {
        let key = (network.deployment().name.clone(), source.to_string());
        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.get(&key) {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Some(entry.info.clone());
                }
            }
        }

        let address = source.parse().ok()?;
        match network.balance(&address).await {
            Ok(info) => {
                let mut cache = self.cache.lock();
                if cache.len() >= self.cache_capacity {
                    // Evict the stalest entry when the bound is hit
                    if let Some(oldest) = cache
                        .iter()
                        .min_by_key(|(_, entry)| entry.fetched_at)
                        .map(|(k, _)| k.clone())
                    {
                        cache.remove(&oldest);
                    }
                }
                cache.insert(
                    key,
                    CachedBalance {
                        info: info.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Some(info)
            }
            Err(err) => {
                tracing::warn!(source, "balance lookup failed during simulation: {err}");
                None
            }
        }
    }
}

/// Canonical envelope size, assuming a 72-byte DER placeholder if unsigned
fn estimated_size(envelope: &Envelope) -> usize {
    if envelope.is_signed() {
        serde_json::to_string(envelope).map(|s| s.len()).unwrap_or(0)
    } else {
        let padded = Envelope {
            value: envelope.value.clone(),
            proofs: vec![Proof::new(
                "0".repeat(128),
                "0".repeat(PLACEHOLDER_SIGNATURE_BYTES * 2),
            )],
        };
        serde_json::to_string(&padded).map(|s| s.len()).unwrap_or(0)
    }
}
