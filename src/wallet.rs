//! Local Ed25519 signer
//!
//! Addresses are `blake2b256(flag || public_key)` with the Ed25519 scheme flag
//! `0x00`. Signatures are produced over `blake2b256(intent || tx_bytes)` where
//! the intent prefix marks a transaction for the current network version,
//! and serialized as `flag || signature || public_key`.

use crate::client::{ClientError, Signer, UserSignature};
use crate::types::{Address, Blake2b256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signer as _, SigningKey, SECRET_KEY_LENGTH};
use blake2::Digest as _;
use std::path::Path;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Ed25519 scheme flag
pub const ED25519_FLAG: u8 = 0x00;

/// Intent prefix for transaction data: scope, version, app id
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Signer holding one Ed25519 key
#[derive(Clone)]
pub struct Ed25519Signer {
    key: Arc<SigningKey>,
    address: Address,
}

impl Ed25519Signer {
    pub fn from_secret(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self::from_key(SigningKey::from_bytes(secret))
    }

    pub fn generate() -> Self {
        Self::from_key(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Load a key file holding either base64 `flag || secret` (33 bytes) or
    /// a JSON array of the 32 secret bytes
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read key file: {}", path.display()))?,
        );
        let trimmed = content.trim();

        let bytes = Zeroizing::new(if trimmed.starts_with('[') {
            serde_json::from_str::<Vec<u8>>(trimmed).context("Failed to parse key JSON")?
        } else {
            let decoded = Zeroizing::new(
                BASE64
                    .decode(trimmed)
                    .context("Failed to decode base64 key")?,
            );
            if decoded.len() == SECRET_KEY_LENGTH + 1 {
                if decoded[0] != ED25519_FLAG {
                    anyhow::bail!("Unsupported key scheme flag: {:#04x}", decoded[0]);
                }
                decoded[1..].to_vec()
            } else {
                decoded.to_vec()
            }
        });

        if bytes.len() != SECRET_KEY_LENGTH {
            anyhow::bail!(
                "Invalid key length: expected {} bytes, got {}",
                SECRET_KEY_LENGTH,
                bytes.len()
            );
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid key: all-zero key rejected");
        }

        let mut secret = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        secret.copy_from_slice(&bytes);
        Ok(Self::from_secret(&secret))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key().as_bytes());
        Self {
            key: Arc::new(key),
            address,
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    /// Signature over `tx_bytes` in the serialized user-signature layout
    pub fn sign_bytes(&self, tx_bytes: &[u8]) -> UserSignature {
        let mut hasher = Blake2b256::new();
        hasher.update(TRANSACTION_INTENT);
        hasher.update(tx_bytes);
        let message = hasher.finalize();

        let signature = self.key.sign(&message);
        let mut bytes = Vec::with_capacity(1 + 64 + 32);
        bytes.push(ED25519_FLAG);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.extend_from_slice(self.key.verifying_key().as_bytes());
        UserSignature::new(bytes)
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Address derived from an Ed25519 public key
pub fn address_of(public_key: &[u8; 32]) -> Address {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    Address::new(hasher.finalize().into())
}

#[async_trait]
impl Signer for Ed25519Signer {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<UserSignature, ClientError> {
        Ok(self.sign_bytes(tx_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_signature_layout_verifies() {
        let signer = Ed25519Signer::from_secret(&[7u8; 32]);
        let tx = b"transaction bytes";
        let sig = signer.sign_bytes(tx);
        let bytes = sig.as_bytes();
        assert_eq!(bytes.len(), 97);
        assert_eq!(bytes[0], ED25519_FLAG);
        assert_eq!(&bytes[65..], &signer.public_key());

        let mut hasher = Blake2b256::new();
        hasher.update(TRANSACTION_INTENT);
        hasher.update(tx);
        let message = hasher.finalize();

        let key = VerifyingKey::from_bytes(&signer.public_key()).unwrap();
        let signature = Signature::from_slice(&bytes[1..65]).unwrap();
        assert!(key.verify(&message, &signature).is_ok());
    }

    #[test]
    fn test_address_is_deterministic() {
        let a = Ed25519Signer::from_secret(&[7u8; 32]);
        let b = Ed25519Signer::from_secret(&[7u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_eq!(a.address(), address_of(&a.public_key()));
        assert_ne!(a.address(), Ed25519Signer::generate().address());
    }

    #[test]
    fn test_key_file_formats() {
        let secret = [9u8; 32];
        let expected = Ed25519Signer::from_secret(&secret).address();

        let mut flagged = vec![ED25519_FLAG];
        flagged.extend_from_slice(&secret);
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", BASE64.encode(&flagged)).unwrap();
        assert_eq!(Ed25519Signer::from_file(file.path()).unwrap().address(), expected);

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", serde_json::to_string(&secret.to_vec()).unwrap()).unwrap();
        assert_eq!(Ed25519Signer::from_file(file.path()).unwrap().address(), expected);
    }

    #[test]
    fn test_key_file_rejects_bad_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", serde_json::to_string(&vec![0u8; 32]).unwrap()).unwrap();
        assert!(Ed25519Signer::from_file(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", BASE64.encode([1u8; 16])).unwrap();
        assert!(Ed25519Signer::from_file(file.path()).is_err());

        let mut wrong_scheme = vec![0x01];
        wrong_scheme.extend_from_slice(&[3u8; 32]);
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", BASE64.encode(&wrong_scheme)).unwrap();
        assert!(Ed25519Signer::from_file(file.path()).is_err());
    }
}
