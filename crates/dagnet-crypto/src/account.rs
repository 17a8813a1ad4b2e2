//! Account management
//!
//! An [`Account`] exclusively owns a secp256k1 secret scalar and shares the
//! address derived from its public key. Accounts are created from fresh OS
//! randomness or imported from a 64-hex-character secret; the scalar is
//! validated as non-zero and below the curve order on import.

use crate::error::CryptoError;
use dagnet_core::codec::canonical_hash;
use dagnet_core::{Envelope, Proof};
use dagnet_core::types::Address;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// A secp256k1 key pair bound to its derived network address
pub struct Account {
    signing_key: SigningKey,
    address: Address,
}

impl Account {
    /// Generate a new account from cryptographically secure randomness
    pub fn generate() -> Result<Self, CryptoError> {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Import an account from a 64-hex-character secret
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        if secret_hex.len() != 64 {
            return Err(CryptoError::InvalidKey(format!(
                "secret must be 64 hex characters, got {}",
                secret_hex.len()
            )));
        }
        let bytes = Zeroizing::new(
            hex::decode(secret_hex).map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Result<Self, CryptoError> {
        let point = signing_key.verifying_key().to_encoded_point(false);
        let address = dagnet_core::codec::address_from_public_key(point.as_bytes())?;
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// The address derived from this account's public key
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The public key for verification
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The uncompressed public key as 128 hex characters, without the
    /// leading `04` byte. This is the `id` field of a proof.
    pub fn public_key_hex(&self) -> String {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        hex::encode(&point.as_bytes()[1..])
    }

    /// Export the secret as hex. The buffer zeroizes on drop; callers are
    /// responsible for whatever they copy it into.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.to_bytes()))
    }

    /// Sign a message with deterministic ECDSA (RFC 6979, SHA-256).
    ///
    /// Returns a strict DER encoding in low-S form.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    /// Sign an envelope's value and append the resulting proof.
    ///
    /// The input is not mutated; a new envelope is returned with this
    /// account's proof appended after any existing ones.
    pub fn sign_envelope(&self, envelope: &Envelope) -> Result<Envelope, CryptoError> {
        let hash = canonical_hash(&envelope.value);
        let signature = self.sign(&hash)?;

        let mut signed = envelope.clone();
        signed
            .proofs
            .push(Proof::new(self.public_key_hex(), hex::encode(signature)));
        Ok(signed)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material through Debug
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
