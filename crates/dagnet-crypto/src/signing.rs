//! Envelope and signature verification

use crate::error::CryptoError;
use dagnet_core::codec::{address_from_public_key, canonical_hash};
use dagnet_core::Envelope;
use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};

/// Verify a single DER signature against a message and a 128-hex public key
pub fn verify_signature(
    public_key_hex: &str,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), CryptoError> {
    let key = decode_public_key(public_key_hex)?;
    let der = hex::decode(signature_hex)
        .map_err(|e| CryptoError::BadSignature(format!("signature is not hex: {e}")))?;
    let signature = Signature::from_der(&der)
        .map_err(|e| CryptoError::BadSignature(format!("signature is not DER: {e}")))?;

    key.verify(message, &signature)
        .map_err(|_| CryptoError::BadSignature("signature does not match".to_string()))
}

/// Verify every proof of a signed envelope.
///
/// Checks that proofs are present, that each signature verifies against the
/// canonical hash of `value`, and that the first proof's key derives the
/// envelope's source address.
pub fn verify_envelope(envelope: &Envelope) -> Result<(), CryptoError> {
    let first = envelope
        .proofs
        .first()
        .ok_or_else(|| CryptoError::BadSignature("envelope has no proofs".to_string()))?;

    let signer_key = hex::decode(&first.id)
        .map_err(|e| CryptoError::BadSignature(format!("public key is not hex: {e}")))?;
    let signer_address = address_from_public_key(&signer_key)?;
    if signer_address != *envelope.value.source() {
        return Err(CryptoError::BadSignature(format!(
            "signer address {signer_address} does not match source {}",
            envelope.value.source()
        )));
    }

    let hash = canonical_hash(&envelope.value);
    for proof in &envelope.proofs {
        verify_signature(&proof.id, &hash, &proof.signature)?;
    }
    Ok(())
}

fn decode_public_key(public_key_hex: &str) -> Result<VerifyingKey, CryptoError> {
    let raw = hex::decode(public_key_hex)
        .map_err(|e| CryptoError::BadSignature(format!("public key is not hex: {e}")))?;
    let sec1 = match raw.len() {
        64 => {
            let mut bytes = Vec::with_capacity(65);
            bytes.push(0x04);
            bytes.extend_from_slice(&raw);
            bytes
        }
        65 => raw,
        n => {
            return Err(CryptoError::BadSignature(format!(
                "public key must be 64 or 65 bytes, got {n}"
            )))
        }
    };
    VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| CryptoError::BadSignature(format!("public key not on curve: {e}")))
}
