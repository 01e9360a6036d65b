//! Coin Payload Encryption
//!
//! Encrypts a coin's opening (value, randomness, message) for its recipient
//! using ECDH on Jubjub + ChaCha20-Poly1305.
//!
//! ```text
//! Flow:
//! 1. Sender and recipient agree on shared = r·TK = rk·R
//! 2. Key        = blake3_derive_key("obscura coin payload v1", shared ‖ context)
//! 3. Ciphertext = ChaCha20-Poly1305(key, nonce, plaintext, aad = context)
//! 4. Output     = (nonce, ciphertext ‖ tag)
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

use crate::errors::{PrivacyError, Result};
use crate::operation::{Point, Scalar, point_to_bytes, scalar_from_bytes, scalar_to_bytes};

const PAYLOAD_KEY_DOMAIN: &str = "obscura coin payload v1";

/// Maximum size of a coin message
pub const MAX_MESSAGE_SIZE: usize = 512;

/// An encrypted coin opening (sent on-chain)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Nonce for ChaCha20-Poly1305
    #[serde(with = "hex")]
    pub nonce: [u8; 12],
    /// Encrypted opening with authentication tag
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// nonce + tag
    pub const OVERHEAD: usize = 12 + 16;
}

#[derive(SchemaRead, SchemaWrite)]
struct PayloadPlaintext {
    value: u64,
    randomness: [u8; 32],
    message: Vec<u8>,
}

/// Decrypted coin opening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    pub value: u64,
    pub randomness: Scalar,
    pub message: Vec<u8>,
}

fn derive_payload_key(shared: &Point, context: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(PAYLOAD_KEY_DOMAIN);
    hasher.update(&point_to_bytes(shared));
    hasher.update(context);
    *hasher.finalize().as_bytes()
}

/// Encrypt an opening under `shared`, binding it to `context`.
pub fn seal(shared: &Point, context: &[u8], opening: &Opening) -> Result<EncryptedPayload> {
    if opening.message.len() > MAX_MESSAGE_SIZE {
        return Err(PrivacyError::InvalidLength {
            what: "coin message",
            expected: MAX_MESSAGE_SIZE,
            got: opening.message.len(),
        });
    }
    let plaintext = wincode::serialize(&PayloadPlaintext {
        value: opening.value,
        randomness: scalar_to_bytes(&opening.randomness),
        message: opening.message.clone(),
    })
    .map_err(|e| PrivacyError::Encode(e.to_string()))?;

    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_payload_key(shared, context);
    let cipher = ChaCha20Poly1305::new(&key.into());
    let ciphertext = cipher
        .encrypt(
            &nonce.into(),
            Payload {
                msg: &plaintext,
                aad: context,
            },
        )
        .map_err(|_| PrivacyError::Encode("payload encryption failed".into()))?;

    Ok(EncryptedPayload { nonce, ciphertext })
}

/// Decrypt a payload. Any failure is reported as [`PrivacyError::DecryptError`].
pub fn open(shared: &Point, context: &[u8], payload: &EncryptedPayload) -> Result<Opening> {
    let key = derive_payload_key(shared, context);
    let cipher = ChaCha20Poly1305::new(&key.into());
    let plaintext = cipher
        .decrypt(
            &payload.nonce.into(),
            Payload {
                msg: &payload.ciphertext,
                aad: context,
            },
        )
        .map_err(|_| PrivacyError::DecryptError)?;

    let decoded: PayloadPlaintext =
        wincode::deserialize(&plaintext).map_err(|_| PrivacyError::DecryptError)?;
    let randomness =
        scalar_from_bytes(&decoded.randomness).map_err(|_| PrivacyError::DecryptError)?;

    Ok(Opening {
        value: decoded.value,
        randomness,
        message: decoded.message,
    })
}
