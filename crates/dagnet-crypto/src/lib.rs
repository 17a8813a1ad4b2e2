//! # Dagnet Crypto
//!
//! Account management and transaction signing:
//! - `Account` - a secp256k1 key pair with its derived network address
//! - deterministic ECDSA (RFC 6979) over canonical transaction hashes
//! - strict low-S DER signatures and envelope verification
//!
//! Secrets live only in memory and are zeroized on drop; nothing in this
//! crate persists key material.

pub mod account;
pub mod error;
pub mod signing;

pub use account::Account;
pub use error::CryptoError;
pub use signing::{verify_envelope, verify_signature};
