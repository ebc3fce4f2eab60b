//! Content key material and identifiers
//!
//! A content key is a 16-byte AES-128 key drawn from the OS CSPRNG. The raw
//! bytes only live for the duration of a protection transaction: they are
//! zeroed explicitly by [`ContentKeyMaterial::erase`] and again on drop.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an AES-128 content key in bytes
pub const CONTENT_KEY_LEN: usize = 16;

/// Prefix of every content key identifier issued by the media service
pub const CONTENT_KEY_ID_PREFIX: &str = "nb:kid:UUID:";

#[derive(Debug, Error)]
pub enum KeyGenerationError {
    #[error("OS random number generator unavailable: {0}")]
    RngUnavailable(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid content key identifier '{id}': {reason}")]
    InvalidKeyId { id: String, reason: String },
}

/// Raw AES-128 content key that zeroizes on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContentKeyMaterial([u8; CONTENT_KEY_LEN]);

impl ContentKeyMaterial {
    /// Generate a fresh key from the OS CSPRNG
    pub fn generate() -> Result<Self, KeyGenerationError> {
        let mut bytes = [0u8; CONTENT_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| KeyGenerationError::RngUnavailable(e.to_string()))?;
        tracing::debug!("generated {}-byte content key", CONTENT_KEY_LEN);
        Ok(Self(bytes))
    }

    /// Create key material from an existing 16-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyGenerationError> {
        if bytes.len() != CONTENT_KEY_LEN {
            return Err(KeyGenerationError::InvalidLength {
                expected: CONTENT_KEY_LEN,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; CONTENT_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Get a reference to the key bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Overwrite the key with zeros in place
    pub fn erase(&mut self) {
        self.0.zeroize();
    }

    /// True once every byte of the buffer is zero
    pub fn is_erased(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for ContentKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentKeyMaterial")
            .field("erased", &self.is_erased())
            .finish()
    }
}

/// Content key identifier of the form `nb:kid:UUID:<uuid>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKeyId(Uuid);

impl ContentKeyId {
    /// Allocate a new random identifier
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse either the prefixed form or a bare UUID
    pub fn parse(s: &str) -> Result<Self, KeyGenerationError> {
        let raw = s.strip_prefix(CONTENT_KEY_ID_PREFIX).unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| KeyGenerationError::InvalidKeyId {
                id: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// The UUID portion of the identifier
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ContentKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CONTENT_KEY_ID_PREFIX, self.0.hyphenated())
    }
}

impl FromStr for ContentKeyId {
    type Err = KeyGenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContentKeyId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentKeyId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Kind of content key as understood by the media service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContentKeyType {
    #[default]
    CommonEncryption,
    StorageEncryption,
    ConfigurationEncryption,
    EnvelopeEncryption,
}

impl ContentKeyType {
    /// Numeric code used on the service wire
    pub fn code(&self) -> u8 {
        match self {
            ContentKeyType::CommonEncryption => 0,
            ContentKeyType::StorageEncryption => 1,
            ContentKeyType::ConfigurationEncryption => 2,
            ContentKeyType::EnvelopeEncryption => 4,
        }
    }
}
