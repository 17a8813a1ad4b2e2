//! Pure validation predicates
//!
//! All factory and simulator entry points funnel their inputs through these
//! functions before doing any work. Each predicate is stateless and reports
//! the first problem it finds as a [`ValidationError`] naming the field.

use crate::codec;
use crate::envelope::{Envelope, TransactionValue};
use crate::error::ValidationError;
use crate::types::{constants, TransactionRef};
use serde_json::Value;

/// Validate an address string: grammar, base58 tail and check digit
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    validate_address_field(address, "address")
}

/// Validate an address carried in a named field
pub fn validate_address_field(address: &str, field: &str) -> Result<(), ValidationError> {
    if address.is_empty() {
        return Err(ValidationError::new(field, "address cannot be empty"));
    }
    if !address.starts_with(constants::ADDRESS_PREFIX) {
        return Err(ValidationError::new(field, "address must start with 'DAG'"));
    }
    if address.len() != constants::ADDRESS_LEN {
        return Err(ValidationError::new(
            field,
            format!(
                "address must be exactly {} characters, got {}",
                constants::ADDRESS_LEN,
                address.len()
            ),
        ));
    }

    let digit_char = address.as_bytes()[3];
    if !digit_char.is_ascii_digit() {
        return Err(ValidationError::new(
            field,
            "check digit must be a decimal digit",
        ));
    }

    let tail = &address[4..];
    if bs58::decode(tail).into_vec().is_err() {
        return Err(ValidationError::new(
            field,
            "address tail is not valid base58",
        ));
    }

    let expected = codec::check_digit(tail);
    if digit_char - b'0' != expected {
        return Err(ValidationError::new(
            field,
            format!("check digit mismatch, expected {expected}"),
        ));
    }

    Ok(())
}

/// Whether a string is a well-formed address
pub fn is_valid_address(address: &str) -> bool {
    validate_address(address).is_ok()
}

/// Validate an amount: `0 <= amount < 2^63`, zero only where allowed
pub fn validate_amount(amount: u64, allow_zero: bool) -> Result<(), ValidationError> {
    validate_amount_field(amount, allow_zero, "amount")
}

/// Validate an amount carried in a named field
pub fn validate_amount_field(
    amount: u64,
    allow_zero: bool,
    field: &str,
) -> Result<(), ValidationError> {
    if amount > constants::MAX_AMOUNT {
        return Err(ValidationError::new(
            field,
            format!("cannot exceed {}", constants::MAX_AMOUNT),
        ));
    }
    if amount == 0 && !allow_zero {
        return Err(ValidationError::new(field, "must be positive"));
    }
    Ok(())
}

/// Validate a fee: same range as amounts, zero permitted
pub fn validate_fee(fee: u64) -> Result<(), ValidationError> {
    validate_amount_field(fee, true, "fee")
}

/// Validate a salt: same range as amounts, zero permitted
pub fn validate_salt(salt: u64) -> Result<(), ValidationError> {
    validate_amount_field(salt, true, "salt")
}

/// Validate a metagraph id: address rules under the `metagraph_id` field
pub fn validate_metagraph_id(id: &str) -> Result<(), ValidationError> {
    validate_address_field(id, "metagraph_id")
}

/// Validate a transaction hash: 64 hex characters
pub fn validate_transaction_hash(hash: &str) -> Result<(), ValidationError> {
    if hash.len() != constants::TX_HASH_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::new(
            "parent.hash",
            format!("must be {} hex characters", constants::TX_HASH_LEN),
        ));
    }
    Ok(())
}

/// Validate a parent reference
pub fn validate_parent(parent: &TransactionRef) -> Result<(), ValidationError> {
    validate_transaction_hash(&parent.hash)
}

/// Validate a millisecond timestamp: must be positive
pub fn validate_timestamp(timestamp: i64) -> Result<(), ValidationError> {
    if timestamp <= 0 {
        return Err(ValidationError::new(
            "timestamp",
            "must be a positive millisecond timestamp",
        ));
    }
    Ok(())
}

/// Validate a data payload: a non-empty JSON object of at most 64 KiB
pub fn validate_data_payload(data: &Value) -> Result<(), ValidationError> {
    let map = match data {
        Value::Object(map) => map,
        Value::Null => return Err(ValidationError::new("data", "payload cannot be null")),
        _ => return Err(ValidationError::new("data", "payload must be a JSON object")),
    };
    if map.is_empty() {
        return Err(ValidationError::new("data", "payload cannot be empty"));
    }

    let size = serde_json::to_string(data)
        .map_err(|e| ValidationError::new("data", format!("payload not serializable: {e}")))?
        .len();
    if size > constants::MAX_DATA_BYTES {
        return Err(ValidationError::new(
            "data",
            format!(
                "payload is {size} bytes, maximum is {}",
                constants::MAX_DATA_BYTES
            ),
        ));
    }

    Ok(())
}

/// Validate a complete transaction value, shape by shape
pub fn validate_value(value: &TransactionValue) -> Result<(), ValidationError> {
    match value {
        TransactionValue::Transfer {
            source,
            destination,
            amount,
            fee,
            salt,
            parent,
            metagraph_id,
        } => {
            validate_address_field(source.as_str(), "source")?;
            validate_address_field(destination.as_str(), "destination")?;
            validate_amount(*amount, false)?;
            validate_fee(*fee)?;
            validate_salt(*salt)?;
            validate_parent(parent)?;
            if let Some(id) = metagraph_id {
                validate_metagraph_id(id.as_str())?;
            }
            Ok(())
        }
        TransactionValue::DataSubmission {
            source,
            fee,
            salt,
            parent,
            metagraph_id,
            data,
            timestamp,
        } => {
            validate_address_field(source.as_str(), "source")?;
            validate_fee(*fee)?;
            validate_salt(*salt)?;
            validate_parent(parent)?;
            validate_metagraph_id(metagraph_id.as_str())?;
            validate_data_payload(data)?;
            validate_timestamp(*timestamp)
        }
    }
}

/// Validate a signed envelope: value structure, proofs present, and at least
/// one proof whose public key derives the source address
pub fn validate_envelope(envelope: &Envelope) -> Result<(), ValidationError> {
    validate_value(&envelope.value)?;

    if envelope.proofs.is_empty() {
        return Err(ValidationError::new("proofs", "envelope has no proofs"));
    }

    let source = envelope.value.source();
    let mut matched = false;
    for (i, proof) in envelope.proofs.iter().enumerate() {
        let key = hex::decode(&proof.id).map_err(|_| {
            ValidationError::new(format!("proofs[{i}].id"), "public key is not hex")
        })?;
        if key.len() != 64 {
            return Err(ValidationError::new(
                format!("proofs[{i}].id"),
                "public key must be 128 hex characters",
            ));
        }
        if hex::decode(&proof.signature).is_err() {
            return Err(ValidationError::new(
                format!("proofs[{i}].signature"),
                "signature is not hex",
            ));
        }
        if codec::address_from_public_key(&key)? == *source {
            matched = true;
        }
    }

    if !matched {
        return Err(ValidationError::new(
            "proofs",
            "no proof matches the source address",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::address_from_public_key;
    use crate::types::Address;
    use serde_json::json;

    fn addr(seed: u8) -> Address {
        address_from_public_key(&[seed; 64]).expect("derivable")
    }

    #[test]
    fn test_derived_addresses_validate() {
        for seed in 0..16u8 {
            let address = addr(seed);
            assert!(is_valid_address(address.as_str()), "{address}");
        }
    }

    #[test]
    fn test_address_rejections() {
        let address = addr(1).as_str().to_string();

        // Wrong prefix
        assert!(validate_address(&address.replacen("DAG", "BTC", 1)).is_err());
        // 35-character tail
        let mut short = address.clone();
        short.pop();
        assert!(validate_address(&short).is_err());
        // Base58 forbids '0', 'O', 'I' and 'l'
        let mut bad = address.clone();
        bad.replace_range(10..11, "0");
        assert!(validate_address(&bad).is_err());
        // Corrupted check digit
        let mut wrong = address.clone();
        let digit = (wrong.as_bytes()[3] - b'0' + 1) % 10;
        wrong.replace_range(3..4, &digit.to_string());
        assert!(validate_address(&wrong).is_err());
        assert!(validate_address("").is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(validate_amount(1, false).is_ok());
        assert!(validate_amount(constants::MAX_AMOUNT, false).is_ok());
        assert!(validate_amount(constants::MAX_AMOUNT + 1, false).is_err());
        assert!(validate_amount(0, false).is_err());
        assert!(validate_amount(0, true).is_ok());
    }

    #[test]
    fn test_data_payload_bounds() {
        assert!(validate_data_payload(&json!({"k": "v"})).is_ok());
        assert!(validate_data_payload(&json!(null)).is_err());
        assert!(validate_data_payload(&json!([1, 2])).is_err());
        assert!(validate_data_payload(&json!({})).is_err());

        // {"k":"<filler>"} serializes to 8 + filler bytes; aim for exactly 64 KiB
        let filler = "x".repeat(constants::MAX_DATA_BYTES - 8);
        assert!(validate_data_payload(&json!({ "k": filler })).is_ok());
        let filler = "x".repeat(constants::MAX_DATA_BYTES - 7);
        assert!(validate_data_payload(&json!({ "k": filler })).is_err());
    }

    #[test]
    fn test_parent_validation() {
        assert!(validate_parent(&TransactionRef::genesis()).is_ok());
        assert!(validate_parent(&TransactionRef::new("ab".repeat(32), 5)).is_ok());
        assert!(validate_parent(&TransactionRef::new("xyz", 0)).is_err());
    }

    #[test]
    fn test_value_validation_rejects_zero_transfer() {
        let value = TransactionValue::Transfer {
            source: addr(1),
            destination: addr(2),
            amount: 0,
            fee: 0,
            salt: 1,
            parent: TransactionRef::genesis(),
            metagraph_id: None,
        };
        let err = validate_value(&value).unwrap_err();
        assert_eq!(err.field, "amount");
    }

    #[test]
    fn test_self_transfer_is_structurally_valid() {
        let value = TransactionValue::Transfer {
            source: addr(1),
            destination: addr(1),
            amount: 5,
            fee: 0,
            salt: 1,
            parent: TransactionRef::genesis(),
            metagraph_id: None,
        };
        assert!(validate_value(&value).is_ok());
    }

    #[test]
    fn test_envelope_requires_matching_proof() {
        let value = TransactionValue::Transfer {
            source: addr(1),
            destination: addr(2),
            amount: 5,
            fee: 0,
            salt: 1,
            parent: TransactionRef::genesis(),
            metagraph_id: None,
        };

        let unsigned = Envelope::unsigned(value.clone());
        assert_eq!(validate_envelope(&unsigned).unwrap_err().field, "proofs");

        // Proof from the matching key passes; from another key it does not
        let mut signed = unsigned.clone();
        signed.proofs.push(crate::envelope::Proof::new(
            hex::encode([1u8; 64]),
            "00".repeat(70),
        ));
        assert!(validate_envelope(&signed).is_ok());

        let mut mismatched = unsigned;
        mismatched.proofs.push(crate::envelope::Proof::new(
            hex::encode([9u8; 64]),
            "00".repeat(70),
        ));
        assert_eq!(
            validate_envelope(&mismatched).unwrap_err().field,
            "proofs"
        );
    }
}
