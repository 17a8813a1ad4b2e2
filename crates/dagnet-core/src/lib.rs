//! # Dagnet Core
//!
//! Core building blocks for the Dagnet client SDK:
//! - `Address` / `MetagraphId` - network identifiers with check digits
//! - `TransactionRef` - parent reference linking a source's transaction chain
//! - `TransactionValue` / `Envelope` - the `{value, proofs}` wire form
//! - `codec` - canonical serialization, hashing and address derivation
//! - `validation` - pure predicates shared by the factory and simulator
//!
//! Everything in this crate is synchronous, allocation-light and free of I/O.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod types;
pub mod validation;

pub use envelope::*;
pub use error::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{address_from_public_key, canonical_hash, canonical_json, transaction_hash};
    pub use crate::envelope::{Envelope, Proof, TransactionKind, TransactionValue};
    pub use crate::error::ValidationError;
    pub use crate::types::{Address, MetagraphId, TransactionRef};
    pub use crate::validation::is_valid_address;
}
