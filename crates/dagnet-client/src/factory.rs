//! Transaction factory
//!
//! The single entry point for building outbound transactions. Every function
//! here is stateless and performs no I/O: callers supply the parent reference
//! (fetched beforehand or genesis) and receive an unsigned envelope, or the
//! first validation error. Nothing is ever partially constructed.

use dagnet_core::codec::transaction_hash;
use dagnet_core::types::{constants, Address, MetagraphId, TransactionRef};
use dagnet_core::{validation, Envelope, TransactionValue, ValidationError};
use rand::rngs::OsRng;
use rand::Rng;
use serde_json::Value;

/// Inputs for a token transfer, on the base layer or a metagraph
#[derive(Clone, Debug)]
pub struct TransferSpec {
    /// Sending address
    pub source: Address,
    /// Receiving address
    pub destination: Address,
    /// Amount in smallest units; zero is rejected
    pub amount: u64,
    /// Fee in smallest units
    pub fee: u64,
    /// Salt; drawn from OS randomness when absent
    pub salt: Option<u64>,
    /// Reference to the previous transaction from `source`
    pub parent: TransactionRef,
    /// Set for metagraph token transfers
    pub metagraph_id: Option<MetagraphId>,
}

impl TransferSpec {
    /// A transfer with zero fee, random salt and no metagraph
    pub fn new(
        source: Address,
        destination: Address,
        amount: u64,
        parent: TransactionRef,
    ) -> Self {
        Self {
            source,
            destination,
            amount,
            fee: 0,
            salt: None,
            parent,
            metagraph_id: None,
        }
    }

    /// Set an explicit fee
    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Set an explicit salt instead of drawing one
    pub fn with_salt(mut self, salt: u64) -> Self {
        self.salt = Some(salt);
        self
    }

    /// Route the transfer through a metagraph token
    pub fn with_metagraph(mut self, metagraph_id: MetagraphId) -> Self {
        self.metagraph_id = Some(metagraph_id);
        self
    }
}

/// Inputs for a metagraph data submission
#[derive(Clone, Debug)]
pub struct DataSpec {
    /// Submitting address
    pub source: Address,
    /// JSON payload, at most 64 KiB canonical
    pub data: Value,
    /// The metagraph receiving the data
    pub metagraph_id: MetagraphId,
    /// Reference to the previous transaction from `source`
    pub parent: TransactionRef,
    /// Milliseconds since the Unix epoch; now when absent
    pub timestamp: Option<i64>,
    /// Salt; drawn from OS randomness when absent
    pub salt: Option<u64>,
}

impl DataSpec {
    /// A data submission with current timestamp and random salt
    pub fn new(
        source: Address,
        data: Value,
        metagraph_id: MetagraphId,
        parent: TransactionRef,
    ) -> Self {
        Self {
            source,
            data,
            metagraph_id,
            parent,
            timestamp: None,
            salt: None,
        }
    }

    /// Set an explicit timestamp in milliseconds
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set an explicit salt instead of drawing one
    pub fn with_salt(mut self, salt: u64) -> Self {
        self.salt = Some(salt);
        self
    }
}

/// One leg of a chained batch build
#[derive(Clone, Debug)]
pub struct ChainedTransfer {
    /// Receiving address
    pub destination: Address,
    /// Amount in smallest units
    pub amount: u64,
    /// Fee in smallest units
    pub fee: u64,
}

impl ChainedTransfer {
    /// A zero-fee leg
    pub fn new(destination: Address, amount: u64) -> Self {
        Self {
            destination,
            amount,
            fee: 0,
        }
    }
}

/// Draw a salt uniformly from `[0, 2^63)` using OS randomness
pub fn random_salt() -> u64 {
    OsRng.gen_range(0..=constants::MAX_AMOUNT)
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Build an unsigned token transfer envelope
pub fn build_transfer(spec: &TransferSpec) -> Result<Envelope, ValidationError> {
    validation::validate_address_field(spec.source.as_str(), "source")?;
    validation::validate_address_field(spec.destination.as_str(), "destination")?;
    validation::validate_amount(spec.amount, false)?;
    validation::validate_fee(spec.fee)?;
    validation::validate_parent(&spec.parent)?;
    if let Some(id) = &spec.metagraph_id {
        validation::validate_metagraph_id(id.as_str())?;
    }
    let salt = match spec.salt {
        Some(salt) => {
            validation::validate_salt(salt)?;
            salt
        }
        None => random_salt(),
    };

    Ok(Envelope::unsigned(TransactionValue::Transfer {
        source: spec.source.clone(),
        destination: spec.destination.clone(),
        amount: spec.amount,
        fee: spec.fee,
        salt,
        parent: spec.parent.clone(),
        metagraph_id: spec.metagraph_id.clone(),
    }))
}

/// Build an unsigned data submission envelope
pub fn build_data_submission(spec: &DataSpec) -> Result<Envelope, ValidationError> {
    validation::validate_address_field(spec.source.as_str(), "source")?;
    validation::validate_metagraph_id(spec.metagraph_id.as_str())?;
    validation::validate_data_payload(&spec.data)?;
    validation::validate_parent(&spec.parent)?;
    let timestamp = spec.timestamp.unwrap_or_else(now_millis);
    validation::validate_timestamp(timestamp)?;
    let salt = match spec.salt {
        Some(salt) => {
            validation::validate_salt(salt)?;
            salt
        }
        None => random_salt(),
    };

    Ok(Envelope::unsigned(TransactionValue::DataSubmission {
        source: spec.source.clone(),
        fee: 0,
        salt,
        parent: spec.parent.clone(),
        metagraph_id: spec.metagraph_id.clone(),
        data: spec.data.clone(),
        timestamp,
    }))
}

/// Build a chain of transfers sharing one source.
///
/// The first envelope references `start`; each later envelope references the
/// canonical hash of the previous envelope's value at the next ordinal. Every
/// envelope is independently signable, but the chain is only valid if
/// submitted in build order.
pub fn build_chain(
    source: &Address,
    transfers: &[ChainedTransfer],
    start: &TransactionRef,
) -> Result<Vec<Envelope>, ValidationError> {
    if transfers.is_empty() {
        return Err(ValidationError::new(
            "transfers",
            "at least one transfer must be provided",
        ));
    }

    // Validate the whole batch up front so nothing is partially built
    validation::validate_address_field(source.as_str(), "source")?;
    validation::validate_parent(start)?;
    for transfer in transfers {
        validation::validate_address_field(transfer.destination.as_str(), "destination")?;
        validation::validate_amount(transfer.amount, false)?;
        validation::validate_fee(transfer.fee)?;
    }

    let mut envelopes = Vec::with_capacity(transfers.len());
    let mut parent = start.clone();
    for transfer in transfers {
        let value = TransactionValue::Transfer {
            source: source.clone(),
            destination: transfer.destination.clone(),
            amount: transfer.amount,
            fee: transfer.fee,
            salt: random_salt(),
            parent: parent.clone(),
            metagraph_id: None,
        };
        parent = TransactionRef::new(transaction_hash(&value), parent.ordinal + 1);
        envelopes.push(Envelope::unsigned(value));
    }
    Ok(envelopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagnet_core::codec::{address_from_public_key, transaction_hash};
    use serde_json::json;

    fn addr(seed: u8) -> Address {
        address_from_public_key(&[seed; 64]).expect("derivable")
    }

    #[test]
    fn test_transfer_build() {
        let spec = TransferSpec::new(addr(1), addr(2), 100_000_000, TransactionRef::genesis())
            .with_salt(42);
        let envelope = build_transfer(&spec).unwrap();

        assert!(!envelope.is_signed());
        match &envelope.value {
            TransactionValue::Transfer {
                amount, fee, salt, ..
            } => {
                assert_eq!(*amount, 100_000_000);
                assert_eq!(*fee, 0);
                assert_eq!(*salt, 42);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_transfer_rejects_zero_amount() {
        let spec = TransferSpec::new(addr(1), addr(2), 0, TransactionRef::genesis());
        assert_eq!(build_transfer(&spec).unwrap_err().field, "amount");
    }

    #[test]
    fn test_transfer_amount_boundaries() {
        let ok = TransferSpec::new(addr(1), addr(2), constants::MAX_AMOUNT, TransactionRef::genesis());
        assert!(build_transfer(&ok).is_ok());

        let over = TransferSpec::new(addr(1), addr(2), constants::MAX_AMOUNT, TransactionRef::genesis())
            .with_fee(constants::MAX_AMOUNT + 1);
        assert!(build_transfer(&over).is_err());
    }

    #[test]
    fn test_random_salt_in_range() {
        for _ in 0..64 {
            assert!(random_salt() <= constants::MAX_AMOUNT);
        }
    }

    #[test]
    fn test_metagraph_transfer_carries_id() {
        let spec = TransferSpec::new(addr(1), addr(2), 10, TransactionRef::genesis())
            .with_metagraph(addr(3).into());
        let envelope = build_transfer(&spec).unwrap();
        assert_eq!(
            envelope.value.kind(),
            dagnet_core::TransactionKind::MetagraphTransfer
        );
    }

    #[test]
    fn test_data_submission_defaults() {
        let spec = DataSpec::new(
            addr(1),
            json!({"sensor": "temperature", "value": 25.7}),
            addr(3).into(),
            TransactionRef::genesis(),
        );
        let envelope = build_data_submission(&spec).unwrap();

        match &envelope.value {
            TransactionValue::DataSubmission { timestamp, .. } => {
                assert!(*timestamp > 0);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_data_submission_rejects_bad_payloads() {
        let bad = DataSpec::new(addr(1), json!(null), addr(3).into(), TransactionRef::genesis());
        assert_eq!(build_data_submission(&bad).unwrap_err().field, "data");

        let negative = DataSpec::new(
            addr(1),
            json!({"k": 1}),
            addr(3).into(),
            TransactionRef::genesis(),
        )
        .with_timestamp(-5);
        assert_eq!(
            build_data_submission(&negative).unwrap_err().field,
            "timestamp"
        );
    }

    #[test]
    fn test_chain_links_hash_and_ordinal() {
        let start = TransactionRef::new("ab".repeat(32), 4);
        let legs = vec![
            ChainedTransfer::new(addr(2), 10_000_000),
            ChainedTransfer::new(addr(3), 20_000_000),
            ChainedTransfer::new(addr(4), 30_000_000),
        ];
        let envelopes = build_chain(&addr(1), &legs, &start).unwrap();
        assert_eq!(envelopes.len(), 3);

        assert_eq!(*envelopes[0].value.parent(), start);
        for i in 1..envelopes.len() {
            let expected = TransactionRef::new(
                transaction_hash(&envelopes[i - 1].value),
                start.ordinal + i as u64,
            );
            assert_eq!(*envelopes[i].value.parent(), expected);
        }
    }

    #[test]
    fn test_chain_validates_before_building() {
        let legs = vec![
            ChainedTransfer::new(addr(2), 10),
            ChainedTransfer::new(addr(3), 0),
        ];
        let err = build_chain(&addr(1), &legs, &TransactionRef::genesis()).unwrap_err();
        assert_eq!(err.field, "amount");

        assert!(build_chain(&addr(1), &[], &TransactionRef::genesis()).is_err());
    }
}
