//! Common test utilities for content protection integration tests
//!
//! Shared fixtures (the test protection certificate and its private key) and
//! in-memory stand-ins for the media service collaborators.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;
use std::cell::Cell;

pub use content_key_policy::{
    ContentKey, ContentKeyDeliveryType, ContentKeyId, ContentKeyMaterial, ContentKeyType,
    KeyDeliveryUrlSource, PolicyCompositionError, ProtectionError, ProtectionKeySource,
};

/// Self-signed RSA-2048 protection certificate
pub const CERT_DER: &[u8] = include_bytes!("../data/protection_cert.der");

/// PKCS#8 private key matching [`CERT_DER`]
pub const KEY_PEM: &str = include_str!("../data/protection_key.pem");

/// SHA-1 thumbprint of [`CERT_DER`]
pub const THUMBPRINT: &str = "10E4FFC12BE29C65CEC84B20ED577F25DAAEEBAF";

pub const ISSUER: &str = "https://sts.contoso.com";
pub const AUDIENCE: &str = "urn:contoso";

pub fn private_key() -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(KEY_PEM).unwrap()
}

/// Unwrap a protected key the way the key delivery service does
pub fn unwrap_content_key(content_key: &ContentKey) -> ContentKeyMaterial {
    let raw = private_key()
        .decrypt(Oaep::new::<Sha1>(), &content_key.encrypted_bytes().unwrap())
        .unwrap();
    ContentKeyMaterial::from_slice(&raw).unwrap()
}

/// Protection key source serving the fixture certificate
#[derive(Default)]
pub struct FixtureKeySource {
    pub certificate_requests: Cell<usize>,
}

impl ProtectionKeySource for FixtureKeySource {
    fn protection_key_id(&self, _key_type: ContentKeyType) -> Result<String, ProtectionError> {
        Ok(THUMBPRINT.to_string())
    }

    fn protection_certificate(&self, protection_key_id: &str) -> Result<String, ProtectionError> {
        self.certificate_requests.set(self.certificate_requests.get() + 1);
        if protection_key_id == THUMBPRINT {
            Ok(BASE64.encode(CERT_DER))
        } else {
            Err(ProtectionError::CertificateUnavailable(protection_key_id.to_string()))
        }
    }
}

/// Key delivery URL source in the shape the service returns
pub struct FixtureUrlSource;

impl KeyDeliveryUrlSource for FixtureUrlSource {
    fn key_delivery_url(
        &self,
        key_id: &ContentKeyId,
        delivery_type: ContentKeyDeliveryType,
    ) -> Result<String, PolicyCompositionError> {
        match delivery_type {
            ContentKeyDeliveryType::PlayReadyLicense => {
                Ok("https://contoso.keydelivery.mediaservices.windows.net/PlayReady/".to_string())
            }
            ContentKeyDeliveryType::Widevine => Ok(format!(
                "https://contoso.keydelivery.mediaservices.windows.net/Widevine/?KID={}",
                key_id.uuid()
            )),
            other => Err(PolicyCompositionError::UrlUnavailable(format!("{:?}", other))),
        }
    }
}

/// Install a test subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
