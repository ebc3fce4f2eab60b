//! License templates handed to the key delivery service
//!
//! Each delivery type has its own template payload: PlayReady templates are
//! XML documents, Widevine templates are JSON messages. [`LicenseTemplate`]
//! tags the payload with its delivery type so callers never pair a template
//! with the wrong license server.

pub mod playready;
pub mod widevine;

pub use playready::{
    AgcAndColorStripeRestriction, ContentKeySource, PlayReadyLicenseResponseTemplate,
    PlayReadyLicenseTemplate, PlayReadyLicenseType, PlayReadyPlayRight, ScmsRestriction,
    UnknownOutputPassingOption,
};
pub use widevine::{
    AllowedTrackTypes, ContentKeySpecs, Hdcp, PolicyOverrides, RequiredOutputProtection,
    WidevineMessage,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateSerializationError {
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Unexpected element: expected <{expected}>, found <{found}>")]
    UnexpectedElement { expected: String, found: String },

    #[error("Missing required element <{0}>")]
    MissingElement(String),

    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("Template is inconsistent: {0}")]
    Inconsistent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a content key is delivered to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentKeyDeliveryType {
    None,
    PlayReadyLicense,
    BaselineHttp,
    Widevine,
}

impl ContentKeyDeliveryType {
    /// Numeric code used on the service wire
    pub fn code(&self) -> u8 {
        match self {
            ContentKeyDeliveryType::None => 0,
            ContentKeyDeliveryType::PlayReadyLicense => 1,
            ContentKeyDeliveryType::BaselineHttp => 2,
            ContentKeyDeliveryType::Widevine => 3,
        }
    }
}

/// License template tagged with the delivery type it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseTemplate {
    PlayReady(PlayReadyLicenseResponseTemplate),
    Widevine(WidevineMessage),
}

impl LicenseTemplate {
    pub fn delivery_type(&self) -> ContentKeyDeliveryType {
        match self {
            LicenseTemplate::PlayReady(_) => ContentKeyDeliveryType::PlayReadyLicense,
            LicenseTemplate::Widevine(_) => ContentKeyDeliveryType::Widevine,
        }
    }

    /// Serialize to the opaque key delivery configuration string
    pub fn serialize(&self) -> Result<String, TemplateSerializationError> {
        match self {
            LicenseTemplate::PlayReady(template) => template.serialize(),
            LicenseTemplate::Widevine(message) => message.serialize(),
        }
    }

    /// Parse a key delivery configuration for the given delivery type
    pub fn deserialize(
        delivery_type: ContentKeyDeliveryType,
        configuration: &str,
    ) -> Result<Self, TemplateSerializationError> {
        match delivery_type {
            ContentKeyDeliveryType::PlayReadyLicense => Ok(LicenseTemplate::PlayReady(
                PlayReadyLicenseResponseTemplate::deserialize(configuration)?,
            )),
            ContentKeyDeliveryType::Widevine => Ok(LicenseTemplate::Widevine(
                WidevineMessage::deserialize(configuration)?,
            )),
            other => Err(TemplateSerializationError::InvalidValue {
                field: "KeyDeliveryType".to_string(),
                value: format!("{:?}", other),
            }),
        }
    }
}

impl From<PlayReadyLicenseResponseTemplate> for LicenseTemplate {
    fn from(template: PlayReadyLicenseResponseTemplate) -> Self {
        LicenseTemplate::PlayReady(template)
    }
}

impl From<WidevineMessage> for LicenseTemplate {
    fn from(message: WidevineMessage) -> Self {
        LicenseTemplate::Widevine(message)
    }
}

/// Serialize a PlayReady license response template
pub fn build_playready_template(
    template: &PlayReadyLicenseResponseTemplate,
) -> Result<String, TemplateSerializationError> {
    template.serialize()
}

/// Serialize a Widevine license message
pub fn build_widevine_message(
    message: &WidevineMessage,
) -> Result<String, TemplateSerializationError> {
    message.serialize()
}
