/// Rust representations of the values the ticketing contract stores and returns.
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Keccak-256 digest, the hash the contract uses for selectors and promo codes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Error returned when parsing a hex-encoded fixed-width value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} hex-encoded bytes, got {input:?}")]
pub struct ParseHexError {
    pub expected: usize,
    pub input: String,
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let err = || ParseHexError { expected: $len, input: s.to_string() };
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let raw = hex::decode(digits).map_err(|_| err())?;
                let bytes: [u8; $len] = raw.try_into().map_err(|_| err())?;
                Ok($name(bytes))
            }
        }
    };
}

fixed_bytes!(
    /// 20-byte account or contract address.
    Address,
    20
);

fixed_bytes!(
    /// Identifier of a submitted write.
    TxHash,
    32
);

fixed_bytes!(
    /// One-way digest of a promo code plaintext.
    SecretHash,
    32
);

impl Address {
    /// Address derived from an arbitrary seed. Used for sandbox accounts.
    pub fn from_seed(seed: &str) -> Self {
        let digest = keccak256(seed.as_bytes());
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Address(out)
    }

    /// Abbreviated form, e.g. `0x1234...abcd`.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl SecretHash {
    /// Hash of the UTF-8 bytes of `plaintext`.
    pub fn of(plaintext: &str) -> Self {
        SecretHash(keccak256(plaintext.as_bytes()))
    }
}

/// Fixed 32-byte identifier, right-padded with zeros.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    /// Encodes `text` as UTF-8 into a 32-byte word. Returns `None` when it does not fit.
    pub fn from_text(text: &str) -> Option<Self> {
        let raw = text.as_bytes();
        if raw.len() > 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out[..raw.len()].copy_from_slice(raw);
        Some(Bytes32(out))
    }

    /// Text up to the first zero byte. Invalid UTF-8 is replaced lossily.
    pub fn to_text(&self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(32);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({:?})", self.to_text())
    }
}

/// Amount in the ledger's minimal unit (1 ether = 10^18 wei).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Wei(pub u128);

impl Wei {
    pub const PER_ETHER: u128 = 1_000_000_000_000_000_000;

    pub fn value(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for Wei {
    /// Renders as a decimal ether amount without trailing zeros.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::PER_ETHER;
        let frac = self.0 % Self::PER_ETHER;
        if frac == 0 {
            return write!(f, "{} ETH", whole);
        }
        let digits = format!("{:018}", frac);
        write!(f, "{}.{} ETH", whole, digits.trim_end_matches('0'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub id: u64,
    pub name: Bytes32,
    pub owner: Address,
    pub royalty_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Venue {
    pub id: u64,
    pub name: Bytes32,
    pub owner: Address,
    pub capacity: u64,
    pub commission_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Concert {
    pub id: u64,
    pub artist_id: u64,
    pub venue_id: u64,
    /// Unix seconds.
    pub timestamp: u64,
    pub ticket_price: Wei,
    pub validated_by_artist: bool,
    pub validated_by_venue: bool,
}

impl Concert {
    /// A concert can be bought only once both parties have attested it.
    pub fn is_purchasable(&self) -> bool {
        self.validated_by_artist && self.validated_by_venue
    }
}

/// A committed promo code. Only the digest of the plaintext is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoCode {
    pub concert_id: u64,
    pub secret_hash: SecretHash,
    pub redeemed: bool,
}
