//! Configuration for the content protection engine.
//!
//! Every field has a default, so a partial JSON document only needs to name
//! the values it overrides.

use crate::delivery::{AssetDeliveryPolicyType, AssetDeliveryProtocol};
use crate::protection::KeyWrapPadding;
use crate::token::TokenType;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Longest test token lifetime a config may ask for
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Configuration for the content protection engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub protection: ProtectionConfig,
    pub token: TokenConfig,
    pub authorization: AuthorizationConfig,
    pub delivery: DeliveryConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifetime_days = self.token.lifetime_days;
        if !(1..=MAX_TOKEN_LIFETIME_DAYS).contains(&lifetime_days) {
            return Err(ConfigError::InvalidValue {
                field: "token.lifetime_days",
                reason: format!(
                    "must be between 1 and {MAX_TOKEN_LIFETIME_DAYS}, got {lifetime_days}"
                ),
            });
        }
        if self.delivery.protocols.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "delivery.protocols",
                reason: "at least one protocol is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Content key protection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// RSA padding for wrapping content keys.
    pub key_wrap_padding: KeyWrapPadding,
    /// Name given to newly created content keys.
    pub content_key_name: String,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            key_wrap_padding: KeyWrapPadding::OaepSha1,
            content_key_name: "ContentKey".into(),
        }
    }
}

/// Token restriction and test token settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub token_type: TokenType,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of generated test tokens.
    pub lifetime_days: i64,
}

impl TokenConfig {
    /// Expiry for a test token issued at `now`
    pub fn expires_on(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        Duration::try_days(self.lifetime_days)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "token.lifetime_days",
                reason: format!("{} days from {now} is out of range", self.lifetime_days),
            })
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_type: TokenType::Jwt,
            issuer: "https://sts.contoso.com".into(),
            audience: "urn:contoso".into(),
            lifetime_days: 365,
        }
    }
}

/// Names given to composed authorization policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub open_policy_name: String,
    pub token_policy_name: String,
    pub playready_option_name: String,
    pub widevine_option_name: String,
    pub open_restriction_name: String,
    pub token_restriction_name: String,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            open_policy_name: "PlayReady Open Content Key Authorization Policy".into(),
            token_policy_name: "PlayReady Token Content Key Authorization Policy".into(),
            playready_option_name: "PlayReady Option".into(),
            widevine_option_name: "Widevine Option".into(),
            open_restriction_name: "Open Restriction".into(),
            token_restriction_name: "Token Restriction".into(),
        }
    }
}

/// Asset delivery policy settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub policy_name: String,
    pub policy_type: AssetDeliveryPolicyType,
    pub protocols: Vec<AssetDeliveryProtocol>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            policy_name: "PlayReady & Widevine Dash Asset Delivery Policy".into(),
            policy_type: AssetDeliveryPolicyType::DynamicCommonEncryption,
            protocols: vec![AssetDeliveryProtocol::Dash],
        }
    }
}
