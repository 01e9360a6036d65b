//! Coins
//!
//! A coin is a Pedersen-committed amount owned by a public key. Two
//! mutually exclusive versions exist:
//!
//! ```text
//! ┌───────────────────────────────┐   ┌───────────────────────────────────┐
//! │ CoinV1                        │   │ CoinV2                            │
//! │  owner = address PK           │   │  owner = one-time address (OTA)   │
//! │  C = PK + v·Gv + snd·Gsnd     │   │  C = v·(Gv | asset tag) + r·Gr     │
//! │      + shard·Gsh + r·Gr       │   │  asset tag = Hp(token) + bl·Gr    │
//! │  spent via serial number      │   │  spent via key image              │
//! └───────────────────────────────┘   └───────────────────────────────────┘
//! ```

pub mod encryption;
pub mod v1;
pub mod v2;

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

pub use encryption::{EncryptedPayload, MAX_MESSAGE_SIZE, Opening};
pub use v1::CoinV1;
pub use v2::{CoinV2, TxRandom, asset_base, key_image_base};

use crate::keys::PaymentAddress;
use crate::operation::{Point, hash_to_point};

/// 32-byte token identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(#[serde(with = "hex")] pub [u8; 32]);

impl TokenId {
    /// The native coin
    pub const NATIVE: TokenId = TokenId([0u8; 32]);

    /// Umbrella id under which every confidential-asset token coin is stored
    pub const CONFIDENTIAL_ASSET: TokenId = {
        let mut id = [0u8; 32];
        id[31] = 0xca;
        TokenId(id)
    };

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", hex::encode(self.0))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Well-known address whose spending key nobody knows.
pub static BURNING_ADDRESS: LazyLock<PaymentAddress> = LazyLock::new(|| PaymentAddress {
    public_key: hash_to_point("obscura 2025 burning address", b"pk"),
    transmission_key: hash_to_point("obscura 2025 burning address", b"tk"),
});

pub fn is_burning_key(public_key: &Point) -> bool {
    *public_key == BURNING_ADDRESS.public_key
}

/// A coin of either version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum Coin {
    #[serde(rename = "1")]
    V1(CoinV1),
    #[serde(rename = "2")]
    V2(CoinV2),
}

impl Coin {
    pub fn version(&self) -> u8 {
        match self {
            Coin::V1(_) => 1,
            Coin::V2(_) => 2,
        }
    }

    pub fn public_key(&self) -> &Point {
        match self {
            Coin::V1(c) => &c.public_key,
            Coin::V2(c) => &c.public_key,
        }
    }

    pub fn commitment(&self) -> &Point {
        match self {
            Coin::V1(c) => &c.commitment,
            Coin::V2(c) => &c.commitment,
        }
    }

    /// Plaintext value, if the coin is not concealed
    pub fn value(&self) -> Option<u64> {
        match self {
            Coin::V1(c) => c.value,
            Coin::V2(c) => c.value,
        }
    }

    pub fn is_burning(&self) -> bool {
        is_burning_key(self.public_key())
    }

    pub fn verify_commitment(&self) -> crate::errors::Result<()> {
        match self {
            Coin::V1(c) => c.verify_commitment(),
            Coin::V2(c) => c.verify_commitment(),
        }
    }
}
