//! Unified error type for the content protection public API
//!
//! Internal modules keep their domain-specific errors for precise handling.
//! This type gives callers a single error to propagate with `?`.
//!
//! # Example
//!
//! ```no_run
//! use content_key_policy::ContentProtectionError;
//!
//! fn publish() -> Result<(), ContentProtectionError> {
//!     // Module errors convert automatically
//!     Ok(())
//! }
//! ```

use crate::authorization::PolicyCompositionError;
use crate::config::ConfigError;
use crate::key::KeyGenerationError;
use crate::protection::ProtectionError;
use crate::template::TemplateSerializationError;
use crate::token::{TokenBuildError, TokenValidationError};
use thiserror::Error;

/// Unified error type for all content protection operations
///
/// # Error Categories
///
/// - **KeyGeneration**: no secure randomness, or malformed key material
/// - **Protection**: certificate, wrapping or checksum failures
/// - **Template**: license or restriction template (de)serialization
/// - **TokenBuild** / **TokenValidation**: restriction tokens
/// - **PolicyComposition**: authorization and delivery policies
/// - **Config**: engine configuration
#[derive(Debug, Error)]
pub enum ContentProtectionError {
    #[error("Key generation error: {0}")]
    KeyGeneration(#[from] KeyGenerationError),

    #[error("Protection error: {0}")]
    Protection(#[from] ProtectionError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateSerializationError),

    #[error("Token build error: {0}")]
    TokenBuild(#[from] TokenBuildError),

    #[error("Token validation error: {0}")]
    TokenValidation(#[from] TokenValidationError),

    #[error("Policy composition error: {0}")]
    PolicyComposition(#[from] PolicyCompositionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ContentProtectionError {
    /// Returns true if the operation may succeed when repeated
    ///
    /// Protection failures are retried against a freshly fetched certificate;
    /// a collaborator that could not produce a URL may answer next time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Protection(e) => e.is_retryable(),
            Self::PolicyComposition(PolicyCompositionError::UrlUnavailable(_)) => true,
            _ => false,
        }
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::KeyGeneration(KeyGenerationError::RngUnavailable(_)) => {
                Some("Check that the operating system random source is available")
            }
            Self::Protection(ProtectionError::CertificateParse(_))
            | Self::Protection(ProtectionError::CertificateUnavailable(_)) => {
                Some("Fetch the protection certificate again for this content key type")
            }
            Self::Protection(ProtectionError::UnsupportedPublicKey(_)) => {
                Some("The protection certificate must carry an RSA public key")
            }
            Self::Protection(ProtectionError::ChecksumMismatch { .. }) => {
                Some("Discard the content key and generate a new one")
            }
            Self::TokenBuild(TokenBuildError::NoRequiredClaims) => {
                Some("Require at least the content key identifier claim")
            }
            Self::TokenBuild(TokenBuildError::InvalidUri { .. }) => {
                Some("Issuer and audience must be absolute URIs, e.g. https://sts.contoso.com or urn:contoso")
            }
            Self::TokenBuild(TokenBuildError::ExpiryNotInFuture { .. }) => {
                Some("Choose an expiry after the current time")
            }
            Self::TokenValidation(TokenValidationError::Expired { .. }) => {
                Some("Request a fresh token from the token service")
            }
            Self::TokenValidation(TokenValidationError::SignatureMismatch) => {
                Some("Check that the token was signed with the primary or an alternate verification key")
            }
            Self::PolicyComposition(PolicyCompositionError::NoOptions) => {
                Some("Pass at least one license template")
            }
            Self::PolicyComposition(PolicyCompositionError::UnsupportedDeliveryType(_)) => {
                Some("Only PlayReady and Widevine acquisition URLs can be configured")
            }
            Self::Config(ConfigError::Parse(_)) => Some("Check the config file is valid JSON"),
            _ => None,
        }
    }

    /// Stable machine-readable code, `CKP_E_<CATEGORY>_<SPECIFIC>`
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::KeyGeneration(e) => match e {
                KeyGenerationError::RngUnavailable(_) => "CKP_E_KEY_RNG_UNAVAILABLE",
                KeyGenerationError::InvalidLength { .. } => "CKP_E_KEY_INVALID_LENGTH",
                KeyGenerationError::InvalidKeyId { .. } => "CKP_E_KEY_INVALID_ID",
            },
            Self::Protection(e) => match e {
                ProtectionError::CertificateParse(_) => "CKP_E_PROTECTION_CERTIFICATE_PARSE",
                ProtectionError::UnsupportedPublicKey(_) => "CKP_E_PROTECTION_UNSUPPORTED_KEY",
                ProtectionError::Encryption(_) => "CKP_E_PROTECTION_ENCRYPTION",
                ProtectionError::CertificateUnavailable(_) => {
                    "CKP_E_PROTECTION_CERTIFICATE_UNAVAILABLE"
                }
                ProtectionError::ChecksumMismatch { .. } => "CKP_E_PROTECTION_CHECKSUM_MISMATCH",
                ProtectionError::Base64Error(_) => "CKP_E_PROTECTION_BASE64",
            },
            Self::Template(e) => match e {
                TemplateSerializationError::MalformedXml(_) => "CKP_E_TEMPLATE_MALFORMED_XML",
                TemplateSerializationError::UnexpectedElement { .. } => {
                    "CKP_E_TEMPLATE_UNEXPECTED_ELEMENT"
                }
                TemplateSerializationError::MissingElement(_) => "CKP_E_TEMPLATE_MISSING_ELEMENT",
                TemplateSerializationError::InvalidValue { .. } => "CKP_E_TEMPLATE_INVALID_VALUE",
                TemplateSerializationError::Inconsistent(_) => "CKP_E_TEMPLATE_INCONSISTENT",
                TemplateSerializationError::Json(_) => "CKP_E_TEMPLATE_JSON",
            },
            Self::TokenBuild(e) => match e {
                TokenBuildError::MissingIssuer => "CKP_E_TOKEN_MISSING_ISSUER",
                TokenBuildError::MissingAudience => "CKP_E_TOKEN_MISSING_AUDIENCE",
                TokenBuildError::InvalidUri { .. } => "CKP_E_TOKEN_INVALID_URI",
                TokenBuildError::NoRequiredClaims => "CKP_E_TOKEN_NO_CLAIMS",
                TokenBuildError::MissingSigningKey => "CKP_E_TOKEN_MISSING_SIGNING_KEY",
                TokenBuildError::EmptyVerificationKey => "CKP_E_TOKEN_EMPTY_KEY",
                TokenBuildError::MissingContentKeyId => "CKP_E_TOKEN_MISSING_KEY_ID",
                TokenBuildError::MissingClaimValue(_) => "CKP_E_TOKEN_MISSING_CLAIM_VALUE",
                TokenBuildError::ExpiryNotInFuture { .. } => "CKP_E_TOKEN_EXPIRY_PAST",
                TokenBuildError::InvalidValidityWindow { .. } => "CKP_E_TOKEN_INVALID_WINDOW",
                TokenBuildError::Serialization(_) => "CKP_E_TOKEN_SERIALIZATION",
            },
            Self::TokenValidation(e) => match e {
                TokenValidationError::Malformed(_) => "CKP_E_VALIDATION_MALFORMED",
                TokenValidationError::UnsupportedAlgorithm(_) => "CKP_E_VALIDATION_ALGORITHM",
                TokenValidationError::SignatureMismatch => "CKP_E_VALIDATION_SIGNATURE",
                TokenValidationError::NoVerificationKey => "CKP_E_VALIDATION_NO_KEY",
                TokenValidationError::Expired { .. } => "CKP_E_VALIDATION_EXPIRED",
                TokenValidationError::NotYetValid { .. } => "CKP_E_VALIDATION_NOT_YET_VALID",
                TokenValidationError::IssuerMismatch { .. } => "CKP_E_VALIDATION_ISSUER",
                TokenValidationError::AudienceMismatch { .. } => "CKP_E_VALIDATION_AUDIENCE",
                TokenValidationError::MissingClaim(_) => "CKP_E_VALIDATION_MISSING_CLAIM",
                TokenValidationError::ClaimMismatch { .. } => "CKP_E_VALIDATION_CLAIM_MISMATCH",
            },
            Self::PolicyComposition(e) => match e {
                PolicyCompositionError::NoOptions => "CKP_E_POLICY_NO_OPTIONS",
                PolicyCompositionError::NoRestrictions(_) => "CKP_E_POLICY_NO_RESTRICTIONS",
                PolicyCompositionError::DuplicateDeliveryType(_) => "CKP_E_POLICY_DUPLICATE_OPTION",
                PolicyCompositionError::NoAcquisitionUrls => "CKP_E_POLICY_NO_URLS",
                PolicyCompositionError::NoProtocols => "CKP_E_POLICY_NO_PROTOCOLS",
                PolicyCompositionError::InvalidUrl { .. } => "CKP_E_POLICY_INVALID_URL",
                PolicyCompositionError::UnsupportedDeliveryType(_) => {
                    "CKP_E_POLICY_UNSUPPORTED_DELIVERY"
                }
                PolicyCompositionError::UrlUnavailable(_) => "CKP_E_POLICY_URL_UNAVAILABLE",
                PolicyCompositionError::Template(_) => "CKP_E_POLICY_TEMPLATE",
            },
            Self::Config(e) => match e {
                ConfigError::Io { .. } => "CKP_E_CONFIG_IO",
                ConfigError::Parse(_) => "CKP_E_CONFIG_PARSE",
                ConfigError::InvalidValue { .. } => "CKP_E_CONFIG_INVALID_VALUE",
            },
        }
    }

    /// Returns true if this is a key generation or protection error
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::KeyGeneration(_) | Self::Protection(_))
    }

    /// Returns true if this is a template serialization error
    pub fn is_template_error(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// Returns true if this is a token build or validation error
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::TokenBuild(_) | Self::TokenValidation(_))
    }

    /// Returns true if this is a policy composition error
    pub fn is_policy_error(&self) -> bool {
        matches!(self, Self::PolicyComposition(_))
    }
}
