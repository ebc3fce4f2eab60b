use crate::config::ProtectionConfig;
use crate::error::ContentProtectionError;
use crate::key::{ContentKeyId, ContentKeyMaterial, ContentKeyType};
use crate::protection::{self, ProtectionError, ProtectionKeySource};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// How the decrypting party locates the private key for `protection_key_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProtectionKeyType {
    #[default]
    X509CertificateThumbprint,
}

impl ProtectionKeyType {
    pub fn code(&self) -> u8 {
        match self {
            ProtectionKeyType::X509CertificateThumbprint => 0,
        }
    }
}

/// Protected content key as handed to the media service
///
/// Only the wrapped form of the key is carried. The raw key bytes are erased
/// as part of the protection transaction that produced this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentKey {
    pub id: ContentKeyId,
    pub content_key_type: ContentKeyType,
    /// Base64 encoded ciphertext of the raw key under the protection certificate
    pub encrypted_content_key: String,
    pub checksum: String,
    pub protection_key_id: String,
    pub protection_key_type: ProtectionKeyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_policy_id: Option<String>,
}

impl ContentKey {
    /// Decode the wrapped key bytes
    pub fn encrypted_bytes(&self) -> Result<Vec<u8>, ProtectionError> {
        Ok(BASE64.decode(&self.encrypted_content_key)?)
    }

    /// Check the stored checksum against a raw key held by a verifier
    pub fn verify_checksum(&self, raw_key: &ContentKeyMaterial) -> Result<(), ProtectionError> {
        protection::verify_checksum(raw_key, self.id.uuid(), &self.checksum)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Generate, protect and name a fresh content key of `key_type`
///
/// The protection certificate is fetched from `source`. The raw key never
/// leaves this function; it is erased once wrapped.
pub fn create_content_key<S: ProtectionKeySource + ?Sized>(
    source: &S,
    key_type: ContentKeyType,
    config: &ProtectionConfig,
) -> Result<ContentKey, ContentProtectionError> {
    let wrapper = protection::fetch_wrapper(source, key_type, config.key_wrap_padding)?;
    let mut raw_key = ContentKeyMaterial::generate()?;
    let key_id = ContentKeyId::new_random();
    tracing::debug!(key_id = %key_id, ?key_type, "generated content key");

    let content_key = protection::protect(&wrapper, &mut raw_key, key_id, key_type)?;
    Ok(content_key.with_name(config.content_key_name.as_str()))
}

/// Create a common encryption key, as used for PlayReady and Widevine
pub fn create_common_encryption_key<S: ProtectionKeySource + ?Sized>(
    source: &S,
    config: &ProtectionConfig,
) -> Result<ContentKey, ContentProtectionError> {
    create_content_key(source, ContentKeyType::CommonEncryption, config)
}
