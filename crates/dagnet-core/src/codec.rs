//! Canonical serialization, hashing and address derivation
//!
//! Every implementation that talks to the network must agree bit-exactly on
//! the bytes being signed. The canonical form of a [`TransactionValue`] is its
//! JSON serialization with the fixed field order declared on the type, no
//! whitespace, plain-decimal integers and sorted keys inside `data` payloads.
//! The canonical hash is SHA-512 over those bytes, truncated to 32 bytes.

use crate::envelope::TransactionValue;
use crate::error::ValidationError;
use crate::types::Address;
use sha2::{Digest, Sha256, Sha512};

/// DER SubjectPublicKeyInfo prefix for an uncompressed secp256k1 point.
///
/// Address derivation hashes `prefix || 04 || X || Y`, mirroring what the
/// network derives from a DER-encoded public key.
pub const PUBKEY_DER_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

/// Canonical JSON serialization of a transaction value.
///
/// This is the exact byte sequence that is hashed and signed.
pub fn canonical_json(value: &TransactionValue) -> String {
    serde_json::to_string(value).expect("transaction values always serialize")
}

/// Canonical hash of a transaction value: SHA-512 truncated to 32 bytes
pub fn canonical_hash(value: &TransactionValue) -> [u8; 32] {
    let digest = Sha512::digest(canonical_json(value).as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// Hex form of the canonical hash, used as the transaction hash
pub fn transaction_hash(value: &TransactionValue) -> String {
    hex::encode(canonical_hash(value))
}

/// Check digit over a base58 tail: sum of its decimal digits, mod 9
pub fn check_digit(tail: &str) -> u8 {
    let sum: u32 = tail.chars().filter_map(|c| c.to_digit(10)).sum();
    (sum % 9) as u8
}

/// Derive a network address from an uncompressed secp256k1 public key.
///
/// Accepts the 65-byte SEC1 form (`04 || X || Y`) or the 64-byte raw point.
/// The point is wrapped in the fixed DER prefix, SHA-256 hashed, base58
/// encoded; the last 36 characters become the tail and the check digit is
/// prepended after the `DAG` literal.
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address, ValidationError> {
    let mut buf = Vec::with_capacity(PUBKEY_DER_PREFIX.len() + 65);
    buf.extend_from_slice(&PUBKEY_DER_PREFIX);
    match public_key.len() {
        65 if public_key[0] == 0x04 => buf.extend_from_slice(public_key),
        64 => {
            buf.push(0x04);
            buf.extend_from_slice(public_key);
        }
        n => {
            return Err(ValidationError::new(
                "public_key",
                format!("expected 64 or 65 bytes, got {n}"),
            ))
        }
    }

    let digest = Sha256::digest(&buf);
    let encoded = bs58::encode(digest).into_string();
    let tail_start = encoded.len().saturating_sub(36);
    let tail = &encoded[tail_start..];
    let digit = check_digit(tail);

    Address::new(format!("DAG{digit}{tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::TransactionValue;
    use crate::types::{constants, TransactionRef};
    use serde_json::json;

    fn addr(seed: u8) -> Address {
        address_from_public_key(&[seed; 64]).expect("derivable")
    }

    #[test]
    fn test_address_shape_and_check_digit() {
        for seed in 0..32u8 {
            let address = address_from_public_key(&[seed; 64]).unwrap();
            let s = address.as_str();
            assert!(s.starts_with("DAG"), "{s}");
            assert_eq!(s.len(), constants::ADDRESS_LEN, "{s}");
            assert_eq!(address.check_digit(), check_digit(address.tail()), "{s}");
        }
    }

    #[test]
    fn test_derivation_is_deterministic_and_prefix_sensitive() {
        let a = address_from_public_key(&[5; 64]).unwrap();
        let b = address_from_public_key(&[5; 64]).unwrap();
        assert_eq!(a, b);

        // The 65-byte SEC1 form of the same point derives the same address
        let mut sec1 = vec![0x04];
        sec1.extend_from_slice(&[5; 64]);
        assert_eq!(address_from_public_key(&sec1).unwrap(), a);

        assert_ne!(address_from_public_key(&[6; 64]).unwrap(), a);
        assert!(address_from_public_key(&[5; 33]).is_err());
    }

    #[test]
    fn test_canonical_transfer_serialization() {
        let source = addr(1);
        let destination = addr(2);
        let value = TransactionValue::Transfer {
            source: source.clone(),
            destination: destination.clone(),
            amount: 100_000_000,
            fee: 0,
            salt: 42,
            parent: TransactionRef::genesis(),
            metagraph_id: None,
        };

        let expected = format!(
            "{{\"source\":\"{source}\",\"destination\":\"{destination}\",\
             \"amount\":100000000,\"fee\":0,\"salt\":42,\
             \"parent\":{{\"hash\":\"{}\",\"ordinal\":0}}}}",
            constants::GENESIS_HASH
        );
        assert_eq!(canonical_json(&value), expected);
    }

    #[test]
    fn test_canonical_data_submission_serialization() {
        let source = addr(3);
        let metagraph = addr(4);
        let value = TransactionValue::DataSubmission {
            source: source.clone(),
            fee: 0,
            salt: 7,
            parent: TransactionRef::new("ab".repeat(32), 5),
            metagraph_id: metagraph.clone().into(),
            data: json!({"value": 25, "sensor": "temperature"}),
            timestamp: 1_700_000_000_000i64,
        };

        // Data keys serialize sorted regardless of insertion order
        let expected = format!(
            "{{\"source\":\"{source}\",\"fee\":0,\"salt\":7,\
             \"parent\":{{\"hash\":\"{}\",\"ordinal\":5}},\
             \"metagraph_id\":\"{metagraph}\",\
             \"data\":{{\"sensor\":\"temperature\",\"value\":25}},\
             \"timestamp\":1700000000000}}",
            "ab".repeat(32)
        );
        assert_eq!(canonical_json(&value), expected);
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let value = TransactionValue::Transfer {
            source: addr(1),
            destination: addr(2),
            amount: 10,
            fee: 0,
            salt: 1,
            parent: TransactionRef::genesis(),
            metagraph_id: None,
        };

        let h1 = canonical_hash(&value);
        let h2 = canonical_hash(&value);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 32);

        let mut other = value.clone();
        if let TransactionValue::Transfer { salt, .. } = &mut other {
            *salt = 2;
        }
        assert_ne!(canonical_hash(&other), h1);

        assert_eq!(transaction_hash(&value), hex::encode(h1));
    }

    #[test]
    fn test_hash_insensitive_to_input_field_order() {
        let source = addr(1);
        let destination = addr(2);
        let in_order = format!(
            "{{\"source\":\"{source}\",\"destination\":\"{destination}\",\
             \"amount\":5,\"fee\":0,\"salt\":9,\
             \"parent\":{{\"hash\":\"{}\",\"ordinal\":0}}}}",
            constants::GENESIS_HASH
        );
        let scrambled = format!(
            "{{\"salt\":9,\"parent\":{{\"ordinal\":0,\"hash\":\"{}\"}},\
             \"fee\":0,\"amount\":5,\
             \"destination\":\"{destination}\",\"source\":\"{source}\"}}",
            constants::GENESIS_HASH
        );

        let a: TransactionValue = serde_json::from_str(&in_order).unwrap();
        let b: TransactionValue = serde_json::from_str(&scrambled).unwrap();
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
    }

    #[test]
    fn test_check_digit_rule() {
        assert_eq!(check_digit("abc"), 0);
        assert_eq!(check_digit("a1b2c3"), 6 % 9);
        assert_eq!(check_digit("999"), 27 % 9);
    }
}
