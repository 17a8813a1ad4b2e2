//! The `{value, proofs}` transaction envelope
//!
//! [`TransactionValue`] is the signed portion of a transaction. Its two wire
//! shapes are modelled as tagged variants; the serialized field order matches
//! the canonical declaration order used for hashing, so serializing a value
//! with `serde_json` yields its canonical form directly (object keys inside
//! `data` payloads are sorted by `serde_json`'s map representation).

use crate::types::{Address, MetagraphId, TransactionRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminant of the transaction shapes the factory can produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Native-token transfer
    Transfer,
    /// Token transfer on a metagraph
    MetagraphTransfer,
    /// Data submission to a metagraph
    DataSubmission,
}

/// The signed portion of a transaction.
///
/// Field declaration order is the canonical serialization order:
/// `source, destination, amount, fee, salt, parent, metagraph_id` for
/// transfers and `source, fee, salt, parent, metagraph_id, data, timestamp`
/// for data submissions. Data submissions carry no destination or amount on
/// the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionValue {
    /// Token transfer, on the base layer or on a metagraph
    Transfer {
        /// Sending address
        source: Address,
        /// Receiving address
        destination: Address,
        /// Amount in smallest units
        amount: u64,
        /// Fee in smallest units (conventionally zero)
        fee: u64,
        /// Per-transaction uniqueness salt
        salt: u64,
        /// Reference to the previous transaction from `source`
        parent: TransactionRef,
        /// Present iff the transfer moves a metagraph token
        #[serde(skip_serializing_if = "Option::is_none")]
        metagraph_id: Option<MetagraphId>,
    },

    /// Data submission to a metagraph
    DataSubmission {
        /// Submitting address
        source: Address,
        /// Fee in smallest units (conventionally zero)
        fee: u64,
        /// Per-transaction uniqueness salt
        salt: u64,
        /// Reference to the previous transaction from `source`
        parent: TransactionRef,
        /// The metagraph receiving the data
        metagraph_id: MetagraphId,
        /// Arbitrary JSON payload, at most 64 KiB canonical
        data: Value,
        /// Milliseconds since the Unix epoch
        timestamp: i64,
    },
}

impl TransactionValue {
    /// Which shape this value is
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Transfer {
                metagraph_id: Some(_),
                ..
            } => TransactionKind::MetagraphTransfer,
            Self::Transfer { .. } => TransactionKind::Transfer,
            Self::DataSubmission { .. } => TransactionKind::DataSubmission,
        }
    }

    /// The sending address
    pub fn source(&self) -> &Address {
        match self {
            Self::Transfer { source, .. } | Self::DataSubmission { source, .. } => source,
        }
    }

    /// The fee in smallest units
    pub fn fee(&self) -> u64 {
        match self {
            Self::Transfer { fee, .. } | Self::DataSubmission { fee, .. } => *fee,
        }
    }

    /// The uniqueness salt
    pub fn salt(&self) -> u64 {
        match self {
            Self::Transfer { salt, .. } | Self::DataSubmission { salt, .. } => *salt,
        }
    }

    /// The parent reference
    pub fn parent(&self) -> &TransactionRef {
        match self {
            Self::Transfer { parent, .. } | Self::DataSubmission { parent, .. } => parent,
        }
    }

    /// The metagraph id, if this value targets a metagraph
    pub fn metagraph_id(&self) -> Option<&MetagraphId> {
        match self {
            Self::Transfer { metagraph_id, .. } => metagraph_id.as_ref(),
            Self::DataSubmission { metagraph_id, .. } => Some(metagraph_id),
        }
    }

    /// The transferred amount, if this value is a transfer
    pub fn amount(&self) -> Option<u64> {
        match self {
            Self::Transfer { amount, .. } => Some(*amount),
            Self::DataSubmission { .. } => None,
        }
    }

    /// The destination address, if this value is a transfer
    pub fn destination(&self) -> Option<&Address> {
        match self {
            Self::Transfer { destination, .. } => Some(destination),
            Self::DataSubmission { .. } => None,
        }
    }
}

/// A single signature over the canonical hash of a value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Uncompressed public key, 128 hex chars, without the leading `04` byte
    pub id: String,
    /// DER-encoded ECDSA signature, hex
    pub signature: String,
}

impl Proof {
    /// Create a proof from a public key and signature
    pub fn new(id: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            signature: signature.into(),
        }
    }
}

/// The complete `{value, proofs}` object the network accepts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The signed portion
    pub value: TransactionValue,
    /// Signatures over the canonical hash of `value`, in signing order
    pub proofs: Vec<Proof>,
}

impl Envelope {
    /// Wrap a value with no proofs yet
    pub fn unsigned(value: TransactionValue) -> Self {
        Self {
            value,
            proofs: Vec::new(),
        }
    }

    /// Whether at least one proof is attached
    pub fn is_signed(&self) -> bool {
        !self.proofs.is_empty()
    }
}
