//! Core type definitions for the Dagnet SDK
//!
//! Addresses, metagraph identifiers and parent references. All of these are
//! immutable once constructed and validate themselves on construction, so
//! downstream code never has to re-check a value it received as one of these
//! types.

use crate::error::ValidationError;
use crate::validation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// System constants
pub mod constants {
    /// Fixed literal prefix of every network address
    pub const ADDRESS_PREFIX: &str = "DAG";

    /// Total length of an address string (`DAG` + check digit + tail)
    pub const ADDRESS_LEN: usize = 40;

    /// Length of the base58 tail following `DAG<digit>`
    pub const ADDRESS_TAIL_LEN: usize = 36;

    /// Upper bound (inclusive) for amounts, fees and salts
    pub const MAX_AMOUNT: u64 = (1 << 63) - 1;

    /// Maximum canonical-JSON size of a data payload (64 KiB)
    pub const MAX_DATA_BYTES: usize = 64 * 1024;

    /// Smallest units per display unit (1 token = 1e8 units)
    pub const UNITS_PER_TOKEN: u64 = 100_000_000;

    /// Hex length of a transaction hash
    pub const TX_HASH_LEN: usize = 64;

    /// All-zero hash used by the genesis parent reference
    pub const GENESIS_HASH: &str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// Conversions between smallest units and display units
pub mod amount {
    use super::constants::{MAX_AMOUNT, UNITS_PER_TOKEN};
    use crate::error::ValidationError;

    /// Smallest units as a fractional display value
    pub fn to_display(units: u64) -> f64 {
        units as f64 / UNITS_PER_TOKEN as f64
    }

    /// A display value as smallest units, rounded to the nearest unit
    pub fn from_display(tokens: f64) -> Result<u64, ValidationError> {
        if !tokens.is_finite() || tokens < 0.0 {
            return Err(ValidationError::new(
                "amount",
                "display amount must be a finite non-negative number",
            ));
        }
        let units = (tokens * UNITS_PER_TOKEN as f64).round();
        if units > MAX_AMOUNT as f64 {
            return Err(ValidationError::new(
                "amount",
                format!("cannot exceed {MAX_AMOUNT} smallest units"),
            ));
        }
        Ok(units as u64)
    }
}

/// A network address: `DAG` + one decimal check digit + 36 base58 characters.
///
/// Construction validates the grammar and the check digit, so an `Address`
/// value is always well-formed. Equality is case-sensitive exact match.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate an address string
    pub fn new(address: impl Into<String>) -> Result<Self, ValidationError> {
        let address = address.into();
        validation::validate_address(&address)?;
        Ok(Self(address))
    }

    /// The address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 36-character base58 tail following `DAG<digit>`
    pub fn tail(&self) -> &str {
        &self.0[4..]
    }

    /// The embedded check digit
    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[3] - b'0'
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a metagraph (a sub-chain with its own token or data schema).
///
/// Syntactically identical to [`Address`]; kept as a distinct type because the
/// two are never interchangeable in the wire format.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetagraphId(String);

impl MetagraphId {
    /// Parse and validate a metagraph id
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        validation::validate_metagraph_id(&id)?;
        Ok(Self(id))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Address> for MetagraphId {
    fn from(address: Address) -> Self {
        Self(address.0)
    }
}

impl TryFrom<String> for MetagraphId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MetagraphId> for String {
    fn from(id: MetagraphId) -> Self {
        id.0
    }
}

impl FromStr for MetagraphId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for MetagraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetagraphId({})", self.0)
    }
}

impl fmt::Display for MetagraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the previous transaction in a source's chain.
///
/// The first transaction from any address uses [`TransactionRef::genesis`]:
/// an all-zero hash at ordinal 0. Every later transaction must reference the
/// hash and ordinal of its predecessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    /// Hex hash of the referenced transaction
    pub hash: String,
    /// Ordinal of the referenced transaction
    pub ordinal: u64,
}

impl TransactionRef {
    /// Create a reference from a hash and ordinal
    pub fn new(hash: impl Into<String>, ordinal: u64) -> Self {
        Self {
            hash: hash.into(),
            ordinal,
        }
    }

    /// The canonical genesis reference (all-zero hash, ordinal 0)
    pub fn genesis() -> Self {
        Self {
            hash: constants::GENESIS_HASH.to_string(),
            ordinal: 0,
        }
    }

    /// Whether this is the genesis reference
    pub fn is_genesis(&self) -> bool {
        self.ordinal == 0 && self.hash == constants::GENESIS_HASH
    }
}

impl Default for TransactionRef {
    fn default() -> Self {
        Self::genesis()
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", &self.hash[..16.min(self.hash.len())], self.ordinal)
    }
}
