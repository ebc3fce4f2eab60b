//! Content key protection under an X.509 protection certificate
//!
//! The media service hands out an X.509 certificate per content key type. The
//! raw content key is wrapped with the certificate's RSA public key and bound
//! to its identifier with a checksum that the key-management service
//! recomputes after unwrapping.
//!
//! # Wire contract
//!
//! - Wrapping: RSA-OAEP with SHA-1 and MGF1-SHA-1 (PKCS#1 v1.5 is available
//!   for legacy deployments). Output is standard base64.
//! - Checksum: AES-128-ECB, no padding, over the 16 key id bytes in GUID
//!   (mixed-endian) order, keyed with the raw content key. The first 8 bytes
//!   of the block are base64 encoded.
//! - Thumbprint: SHA-1 of the certificate DER, uppercase hex.

use crate::content_key::{ContentKey, ProtectionKeyType};
use crate::key::{ContentKeyId, ContentKeyMaterial, ContentKeyType};
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::Certificate;

/// Number of cipher block bytes kept in the checksum
const CHECKSUM_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum ProtectionError {
    #[error("Certificate parse error: {0}")]
    CertificateParse(String),

    #[error("Unsupported certificate public key: {0}")]
    UnsupportedPublicKey(String),

    #[error("Key encryption failed: {0}")]
    Encryption(String),

    #[error("Protection certificate unavailable: {0}")]
    CertificateUnavailable(String),

    #[error("Checksum mismatch for content key {key_id}")]
    ChecksumMismatch { key_id: Uuid },

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

impl ProtectionError {
    /// Every protection failure can be retried against a freshly fetched certificate
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProtectionError::ChecksumMismatch { .. })
    }
}

/// RSA padding used when wrapping the content key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyWrapPadding {
    /// RSA-OAEP with SHA-1 (expected by the media service key store)
    #[default]
    OaepSha1,

    /// RSAES-PKCS1-v1_5
    Pkcs1v15,
}

/// Protection certificate fetched from the media service
#[derive(Debug, Clone)]
pub struct ProtectionCertificate {
    thumbprint: String,
    subject: String,
    public_key: RsaPublicKey,
}

impl ProtectionCertificate {
    /// Parse a DER encoded X.509 certificate
    pub fn from_der(der: &[u8]) -> Result<Self, ProtectionError> {
        let cert = Certificate::from_der(der)
            .map_err(|e| ProtectionError::CertificateParse(e.to_string()))?;
        Self::from_certificate(&cert, der)
    }

    /// Parse a base64 encoded DER certificate, the form the media service returns
    pub fn from_base64(encoded: &str) -> Result<Self, ProtectionError> {
        let compact: String = encoded.split_whitespace().collect();
        let der = BASE64.decode(compact)?;
        Self::from_der(&der)
    }

    /// Parse a PEM encoded certificate
    pub fn from_pem(pem: &str) -> Result<Self, ProtectionError> {
        let cert = Certificate::from_pem(pem.as_bytes())
            .map_err(|e| ProtectionError::CertificateParse(e.to_string()))?;
        let der = cert
            .to_der()
            .map_err(|e| ProtectionError::CertificateParse(e.to_string()))?;
        Self::from_certificate(&cert, &der)
    }

    fn from_certificate(cert: &Certificate, der: &[u8]) -> Result<Self, ProtectionError> {
        let spki = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| ProtectionError::CertificateParse(e.to_string()))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| ProtectionError::UnsupportedPublicKey(e.to_string()))?;

        Ok(Self {
            thumbprint: thumbprint(der),
            subject: cert.tbs_certificate.subject.to_string(),
            public_key,
        })
    }

    /// Uppercase hex SHA-1 thumbprint of the certificate
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }
}

/// SHA-1 fingerprint of a DER encoded certificate, uppercase hex
pub fn thumbprint(certificate_der: &[u8]) -> String {
    hex::encode_upper(Sha1::digest(certificate_der))
}

/// Checksum binding a raw content key to its identifier
pub fn checksum(raw_key: &ContentKeyMaterial, key_id: Uuid) -> String {
    let cipher = Aes128::new(GenericArray::from_slice(raw_key.as_slice()));
    let mut block = GenericArray::clone_from_slice(&key_id.to_bytes_le());
    cipher.encrypt_block(&mut block);
    BASE64.encode(&block[..CHECKSUM_LEN])
}

/// Recompute the checksum and compare it in constant time
pub fn verify_checksum(
    raw_key: &ContentKeyMaterial,
    key_id: Uuid,
    expected: &str,
) -> Result<(), ProtectionError> {
    let actual = checksum(raw_key, key_id);
    if actual.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(ProtectionError::ChecksumMismatch { key_id })
    }
}

/// Encrypts raw content keys for transport to the key store
pub trait KeyWrapper {
    /// Encrypt the raw key bytes
    fn wrap(&self, key: &[u8]) -> Result<Vec<u8>, ProtectionError>;

    /// Identifier of the key that can unwrap the output
    fn protection_key_id(&self) -> &str;

    fn protection_key_type(&self) -> ProtectionKeyType {
        ProtectionKeyType::X509CertificateThumbprint
    }
}

/// Wraps content keys with the RSA public key of a protection certificate
#[derive(Debug, Clone)]
pub struct CertificateKeyWrapper {
    certificate: ProtectionCertificate,
    padding: KeyWrapPadding,
}

impl CertificateKeyWrapper {
    pub fn new(certificate: ProtectionCertificate) -> Self {
        Self {
            certificate,
            padding: KeyWrapPadding::default(),
        }
    }

    #[must_use]
    pub fn with_padding(mut self, padding: KeyWrapPadding) -> Self {
        self.padding = padding;
        self
    }

    pub fn certificate(&self) -> &ProtectionCertificate {
        &self.certificate
    }

    pub fn padding(&self) -> KeyWrapPadding {
        self.padding
    }

    /// Encrypt and base64 encode the raw key
    pub fn wrap_base64(&self, key: &[u8]) -> Result<String, ProtectionError> {
        Ok(BASE64.encode(self.wrap(key)?))
    }
}

impl KeyWrapper for CertificateKeyWrapper {
    fn wrap(&self, key: &[u8]) -> Result<Vec<u8>, ProtectionError> {
        let public_key = self.certificate.public_key();
        let wrapped = match self.padding {
            KeyWrapPadding::OaepSha1 => public_key.encrypt(&mut OsRng, Oaep::new::<Sha1>(), key),
            KeyWrapPadding::Pkcs1v15 => public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, key),
        };
        wrapped.map_err(|e| ProtectionError::Encryption(e.to_string()))
    }

    fn protection_key_id(&self) -> &str {
        self.certificate.thumbprint()
    }
}

/// Wrap a raw key, bind it to `key_id`, and erase the raw bytes
///
/// The raw key is zeroed before this function returns, whether it succeeds
/// or fails.
pub fn protect<W: KeyWrapper + ?Sized>(
    wrapper: &W,
    raw_key: &mut ContentKeyMaterial,
    key_id: ContentKeyId,
    content_key_type: ContentKeyType,
) -> Result<ContentKey, ProtectionError> {
    let key = scopeguard::guard(raw_key, |k| k.erase());

    let encrypted = wrapper.wrap(key.as_slice())?;
    let checksum = checksum(&**key, key_id.uuid());
    verify_checksum(&**key, key_id.uuid(), &checksum)?;

    tracing::info!(
        key_id = %key_id,
        protection_key_id = wrapper.protection_key_id(),
        "protected content key"
    );

    Ok(ContentKey {
        id: key_id,
        content_key_type,
        encrypted_content_key: BASE64.encode(encrypted),
        checksum,
        protection_key_id: wrapper.protection_key_id().to_string(),
        protection_key_type: wrapper.protection_key_type(),
        name: None,
        authorization_policy_id: None,
    })
}

/// Source of protection certificates, implemented by the media service client
pub trait ProtectionKeySource {
    /// Identifier of the protection key for a content key type
    fn protection_key_id(&self, key_type: ContentKeyType) -> Result<String, ProtectionError>;

    /// Base64 encoded DER certificate for a protection key identifier
    fn protection_certificate(&self, protection_key_id: &str) -> Result<String, ProtectionError>;
}

/// Fetch the protection certificate for `key_type` and build a wrapper around it
pub fn fetch_wrapper<S: ProtectionKeySource + ?Sized>(
    source: &S,
    key_type: ContentKeyType,
    padding: KeyWrapPadding,
) -> Result<CertificateKeyWrapper, ProtectionError> {
    let protection_key_id = source.protection_key_id(key_type)?;
    let encoded = source.protection_certificate(&protection_key_id)?;
    let certificate = ProtectionCertificate::from_base64(&encoded)?;

    if !certificate
        .thumbprint()
        .eq_ignore_ascii_case(&protection_key_id)
    {
        tracing::warn!(
            protection_key_id = %protection_key_id,
            thumbprint = certificate.thumbprint(),
            "protection key id differs from certificate thumbprint"
        );
    }

    Ok(CertificateKeyWrapper::new(certificate).with_padding(padding))
}
