//! Widevine license messages
//!
//! Field names are the Widevine license service's JSON contract and are kept
//! in snake case on the wire.

use super::TemplateSerializationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllowedTrackTypes {
    #[serde(rename = "SD_ONLY")]
    SdOnly,
    #[default]
    #[serde(rename = "SD_HD")]
    SdHd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Hdcp {
    #[default]
    #[serde(rename = "HDCP_NONE")]
    None,
    #[serde(rename = "HDCP_V1")]
    V1,
    #[serde(rename = "HDCP_V2")]
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequiredOutputProtection {
    pub hdcp: Hdcp,
}

/// Per-track key requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKeySpecs {
    pub track_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Widevine robustness level, 1 (software) to 5 (hardware secure decode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_output_protection: Option<RequiredOutputProtection>,
}

impl ContentKeySpecs {
    pub fn new(track_type: impl Into<String>) -> Self {
        Self {
            track_type: track_type.into(),
            key_id: None,
            security_level: None,
            required_output_protection: None,
        }
    }

    #[must_use]
    pub fn security_level(mut self, level: u8) -> Self {
        self.security_level = Some(level);
        self
    }

    #[must_use]
    pub fn hdcp(mut self, hdcp: Hdcp) -> Self {
        self.required_output_protection = Some(RequiredOutputProtection { hdcp });
        self
    }
}

/// License policy flags the service applies on top of its defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverrides {
    pub can_play: bool,
    pub can_persist: bool,
    pub can_renew: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rental_duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_duration_seconds: Option<u64>,
}

impl Default for PolicyOverrides {
    fn default() -> Self {
        Self {
            can_play: true,
            can_persist: true,
            can_renew: false,
            rental_duration_seconds: None,
            playback_duration_seconds: None,
            license_duration_seconds: None,
        }
    }
}

/// Widevine license template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidevineMessage {
    pub allowed_track_types: AllowedTrackTypes,
    pub content_key_specs: Vec<ContentKeySpecs>,
    pub policy_overrides: PolicyOverrides,
}

impl Default for WidevineMessage {
    /// SD and HD tracks, one SD key spec at security level 1 without HDCP
    fn default() -> Self {
        Self {
            allowed_track_types: AllowedTrackTypes::SdHd,
            content_key_specs: vec![ContentKeySpecs::new("SD")
                .security_level(1)
                .hdcp(Hdcp::None)],
            policy_overrides: PolicyOverrides::default(),
        }
    }
}

impl WidevineMessage {
    pub fn new(allowed_track_types: AllowedTrackTypes) -> Self {
        Self {
            allowed_track_types,
            content_key_specs: Vec::new(),
            policy_overrides: PolicyOverrides::default(),
        }
    }

    #[must_use]
    pub fn key_spec(mut self, spec: ContentKeySpecs) -> Self {
        self.content_key_specs.push(spec);
        self
    }

    #[must_use]
    pub fn policy_overrides(mut self, overrides: PolicyOverrides) -> Self {
        self.policy_overrides = overrides;
        self
    }

    pub fn validate(&self) -> Result<(), TemplateSerializationError> {
        for spec in &self.content_key_specs {
            if spec.track_type.trim().is_empty() {
                return Err(TemplateSerializationError::InvalidValue {
                    field: "track_type".to_string(),
                    value: spec.track_type.clone(),
                });
            }
            if let Some(level) = spec.security_level {
                if !(1..=5).contains(&level) {
                    return Err(TemplateSerializationError::InvalidValue {
                        field: "security_level".to_string(),
                        value: level.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<String, TemplateSerializationError> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(json: &str) -> Result<Self, TemplateSerializationError> {
        let message: Self = serde_json::from_str(json)?;
        message.validate()?;
        Ok(message)
    }
}
