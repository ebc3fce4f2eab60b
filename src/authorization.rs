//! Content key authorization policies
//!
//! An authorization policy tells the key delivery service how to hand out a
//! content key: one option per delivery type, each carrying its license
//! template and the restrictions a client must satisfy. Composition either
//! succeeds with a complete policy or fails; no partial policy is produced.

use crate::config::AuthorizationConfig;
use crate::content_key::ContentKey;
use crate::template::{ContentKeyDeliveryType, LicenseTemplate, TemplateSerializationError};
use crate::token::TokenRestrictionTemplate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PolicyCompositionError {
    #[error("Authorization policy requires at least one option")]
    NoOptions,

    #[error("Authorization option '{0}' has no restrictions")]
    NoRestrictions(String),

    #[error("Duplicate option for delivery type {0:?}")]
    DuplicateDeliveryType(ContentKeyDeliveryType),

    #[error("Delivery policy requires at least one acquisition URL")]
    NoAcquisitionUrls,

    #[error("Delivery policy requires at least one protocol")]
    NoProtocols,

    #[error("Invalid acquisition URL for {delivery_type:?}: '{url}'")]
    InvalidUrl {
        delivery_type: ContentKeyDeliveryType,
        url: String,
    },

    #[error("Delivery type {0:?} has no license acquisition URL")]
    UnsupportedDeliveryType(ContentKeyDeliveryType),

    #[error("Key delivery URL unavailable: {0}")]
    UrlUnavailable(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateSerializationError),
}

/// Kind of restriction on a key delivery option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKeyRestrictionType {
    Open,
    TokenRestricted,
    IpRestricted,
}

impl ContentKeyRestrictionType {
    pub fn code(&self) -> u8 {
        match self {
            ContentKeyRestrictionType::Open => 0,
            ContentKeyRestrictionType::TokenRestricted => 1,
            ContentKeyRestrictionType::IpRestricted => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Restriction {
    pub name: String,
    pub key_restriction_type: ContentKeyRestrictionType,
    /// Serialized requirements, e.g. token restriction template XML
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
}

impl Restriction {
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_restriction_type: ContentKeyRestrictionType::Open,
            requirements: None,
        }
    }

    pub fn token(
        name: impl Into<String>,
        template: &TokenRestrictionTemplate,
    ) -> Result<Self, PolicyCompositionError> {
        Ok(Self {
            name: name.into(),
            key_restriction_type: ContentKeyRestrictionType::TokenRestricted,
            requirements: Some(template.serialize()?),
        })
    }
}

/// One way of delivering the key, with the restrictions that guard it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizationPolicyOption {
    pub name: String,
    pub key_delivery_type: ContentKeyDeliveryType,
    /// Serialized license template for `key_delivery_type`
    pub key_delivery_configuration: String,
    pub restrictions: Vec<Restriction>,
}

impl AuthorizationPolicyOption {
    /// Parse the license template back out of the delivery configuration
    pub fn license_template(&self) -> Result<LicenseTemplate, TemplateSerializationError> {
        LicenseTemplate::deserialize(self.key_delivery_type, &self.key_delivery_configuration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizationPolicy {
    pub id: String,
    pub name: String,
    pub options: Vec<AuthorizationPolicyOption>,
}

impl AuthorizationPolicy {
    pub fn option(
        &self,
        delivery_type: ContentKeyDeliveryType,
    ) -> Option<&AuthorizationPolicyOption> {
        self.options
            .iter()
            .find(|option| option.key_delivery_type == delivery_type)
    }

    /// Every policy has options, and every option has restrictions
    pub fn validate(&self) -> Result<(), PolicyCompositionError> {
        if self.options.is_empty() {
            return Err(PolicyCompositionError::NoOptions);
        }
        for option in &self.options {
            if option.restrictions.is_empty() {
                return Err(PolicyCompositionError::NoRestrictions(option.name.clone()));
            }
        }
        Ok(())
    }
}

/// Builds authorization policies from license templates
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicyComposer {
    config: AuthorizationConfig,
}

impl AuthorizationPolicyComposer {
    pub fn new(config: AuthorizationConfig) -> Self {
        Self { config }
    }

    /// Policy whose options anyone may use
    pub fn compose_open(
        &self,
        templates: impl IntoIterator<Item = LicenseTemplate>,
    ) -> Result<AuthorizationPolicy, PolicyCompositionError> {
        let restriction = Restriction::open(&self.config.open_restriction_name);
        self.compose(&self.config.open_policy_name, templates, restriction)
    }

    /// Policy whose options require a token matching `token_template`
    pub fn compose_token_restricted(
        &self,
        templates: impl IntoIterator<Item = LicenseTemplate>,
        token_template: &TokenRestrictionTemplate,
    ) -> Result<AuthorizationPolicy, PolicyCompositionError> {
        let restriction = Restriction::token(&self.config.token_restriction_name, token_template)?;
        self.compose(&self.config.token_policy_name, templates, restriction)
    }

    fn compose(
        &self,
        policy_name: &str,
        templates: impl IntoIterator<Item = LicenseTemplate>,
        restriction: Restriction,
    ) -> Result<AuthorizationPolicy, PolicyCompositionError> {
        let mut options: Vec<AuthorizationPolicyOption> = Vec::new();
        for template in templates {
            let delivery_type = template.delivery_type();
            if options
                .iter()
                .any(|option| option.key_delivery_type == delivery_type)
            {
                return Err(PolicyCompositionError::DuplicateDeliveryType(delivery_type));
            }
            options.push(AuthorizationPolicyOption {
                name: self.option_name(delivery_type),
                key_delivery_type: delivery_type,
                key_delivery_configuration: template.serialize()?,
                restrictions: vec![restriction.clone()],
            });
        }

        let policy = AuthorizationPolicy {
            id: format!("nb:ckpid:UUID:{}", Uuid::new_v4()),
            name: policy_name.to_string(),
            options,
        };
        policy.validate()?;

        tracing::info!(
            policy_id = %policy.id,
            policy_name = %policy.name,
            options = policy.options.len(),
            restriction = ?restriction.key_restriction_type,
            "composed authorization policy"
        );
        Ok(policy)
    }

    fn option_name(&self, delivery_type: ContentKeyDeliveryType) -> String {
        match delivery_type {
            ContentKeyDeliveryType::Widevine => self.config.widevine_option_name.clone(),
            _ => self.config.playready_option_name.clone(),
        }
    }

    /// Point `content_key` at `policy`, replacing any earlier policy
    pub fn link(policy: &AuthorizationPolicy, mut content_key: ContentKey) -> ContentKey {
        match content_key.authorization_policy_id.as_deref() {
            Some(current) if current == policy.id => {}
            Some(previous) => {
                tracing::info!(
                    key_id = %content_key.id,
                    previous_policy_id = %previous,
                    policy_id = %policy.id,
                    "replacing content key authorization policy"
                );
                content_key.authorization_policy_id = Some(policy.id.clone());
            }
            None => {
                tracing::debug!(
                    key_id = %content_key.id,
                    policy_id = %policy.id,
                    "linked authorization policy"
                );
                content_key.authorization_policy_id = Some(policy.id.clone());
            }
        }
        content_key
    }
}
