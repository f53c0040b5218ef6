//! Claim-link encryption.
//!
//! Purchased e-books are delivered through an opaque download token that
//! encodes the product id, so the download handler needs no session or
//! database-backed grant. The token is AES-256-GCM over a small JSON
//! payload, with the data encryption key derived from a process-wide
//! master key via HKDF.
//!
//! Token format (before base64): MAGIC (4 bytes) || nonce (12 bytes) || ciphertext
//!
//! Tokens are encoded with URL-safe unpadded base64 so they can live in a
//! URL path segment. Decoding success does not imply the encoded product
//! still exists; callers must re-validate.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine;
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{AppError, Result};

/// Nonce size for AES-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Master key size (256 bits for AES-256)
const MASTER_KEY_SIZE: usize = 32;

/// Magic bytes identifying a claim token
const CLAIM_MAGIC: &[u8] = b"BKC1";

/// Payload sealed inside a claim token. Field names match the public wire
/// contract used by the frontend claim page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimToken {
    pub product_id: i64,
}

/// Holds the master encryption key for claim links.
/// The actual AES key is derived from it via HKDF.
#[derive(Clone)]
pub struct ClaimKey {
    key: [u8; MASTER_KEY_SIZE],
}

impl std::fmt::Debug for ClaimKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.write_str("ClaimKey(..)")
    }
}

impl ClaimKey {
    /// Create a ClaimKey from a base64-encoded string.
    /// The decoded key must be exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Internal(format!("Invalid master key encoding: {}", e)))?;

        if decoded.len() != MASTER_KEY_SIZE {
            return Err(AppError::Internal(format!(
                "Master key must be {} bytes, got {}",
                MASTER_KEY_SIZE,
                decoded.len()
            )));
        }

        let mut key = [0u8; MASTER_KEY_SIZE];
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }

    /// Generate a new random master key (for initial setup).
    /// Returns the key as a base64-encoded string.
    pub fn generate() -> String {
        use rand::rngs::OsRng;
        use rand::RngCore;
        let mut key = [0u8; MASTER_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    /// Create a ClaimKey from raw bytes.
    /// Note: For production, prefer `from_base64` with a securely stored key.
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the claim-token data encryption key using HKDF.
    fn derive_dek(&self) -> [u8; 32] {
        let hk = Hkdf::<Sha256>::new(Some(b"bookship-v1"), &self.key);
        let mut dek = [0u8; 32];
        hk.expand(b"claim-token", &mut dek)
            .expect("HKDF expand should not fail with valid length");
        dek
    }

    /// Encrypt a payload into a URL-safe token.
    /// The nonce is random, so encrypting the same payload twice yields
    /// different tokens.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        use rand::rngs::OsRng;
        use rand::RngCore;

        let dek = self.derive_dek();
        let cipher = Aes256Gcm::new_from_slice(&dek)
            .map_err(|e| AppError::Internal(format!("Failed to create cipher: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AppError::Internal(format!("Encryption failed: {}", e)))?;

        let mut raw = Vec::with_capacity(CLAIM_MAGIC.len() + NONCE_SIZE + ciphertext.len());
        raw.extend_from_slice(CLAIM_MAGIC);
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);

        Ok(BASE64_URL.encode(raw))
    }

    /// Decrypt a token produced by `encrypt`.
    ///
    /// Fails with a `Decode` error on malformed encoding, truncation,
    /// tampering, or a wrong key - the GCM tag check rejects anything that
    /// was not sealed with this key.
    pub fn decrypt(&self, token: &str) -> Result<Vec<u8>> {
        let raw = BASE64_URL
            .decode(token)
            .map_err(|_| AppError::Decode("Malformed claim token".into()))?;

        if raw.len() < CLAIM_MAGIC.len() + NONCE_SIZE + 1 {
            return Err(AppError::Decode("Claim token too short".into()));
        }

        if &raw[..CLAIM_MAGIC.len()] != CLAIM_MAGIC {
            return Err(AppError::Decode("Invalid claim token format".into()));
        }

        let dek = self.derive_dek();
        let cipher = Aes256Gcm::new_from_slice(&dek)
            .map_err(|e| AppError::Internal(format!("Failed to create cipher: {}", e)))?;

        let nonce_start = CLAIM_MAGIC.len();
        let nonce_end = nonce_start + NONCE_SIZE;
        let nonce = Nonce::from_slice(&raw[nonce_start..nonce_end]);
        let ciphertext = &raw[nonce_end..];

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| AppError::Decode("Claim token integrity check failed".into()))
    }

    /// Seal a claim payload into a token.
    pub fn seal_claim(&self, claim: &ClaimToken) -> Result<String> {
        let plaintext = serde_json::to_vec(claim)?;
        self.encrypt(&plaintext)
    }

    /// Open a claim token back into its payload.
    pub fn open_claim(&self, token: &str) -> Result<ClaimToken> {
        let plaintext = self.decrypt(token)?;
        serde_json::from_slice(&plaintext)
            .map_err(|_| AppError::Decode("Claim token payload invalid".into()))
    }
}
