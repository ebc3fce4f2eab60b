//! Token restriction templates
//!
//! A token restriction tells the key delivery service which tokens it must
//! accept before issuing a license: who issued them, who they are for, which
//! key signs them, and which claims they must carry. When the
//! content-key-identifier claim is required, the license server only honours
//! a token for the content key whose id the claim carries.
//!
//! # Example
//!
//! ```
//! use content_key_policy::token::{
//!     SymmetricVerificationKey, TokenClaim, TokenRestrictionTemplate, TokenType,
//! };
//!
//! let template = TokenRestrictionTemplate::builder(TokenType::Jwt)
//!     .issuer("https://sts.contoso.com")
//!     .audience("urn:contoso")
//!     .primary_verification_key(SymmetricVerificationKey::generate()?)
//!     .required_claim(TokenClaim::content_key_identifier())
//!     .build()?;
//!
//! let xml = template.serialize()?;
//! assert_eq!(TokenRestrictionTemplate::deserialize(&xml)?, template);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod serializer;
mod test_token;

pub use serializer::TOKEN_RESTRICTION_TEMPLATE_NS;
pub use test_token::{generate_test_token, validate_test_token, TestToken, TokenClaims};

use crate::key::KeyGenerationError;
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Claim type carrying the content key id a token is bound to
pub const CONTENT_KEY_IDENTIFIER_CLAIM_TYPE: &str =
    "urn:microsoft:azure:mediaservices:contentkeyidentifier";

/// Size of a generated symmetric verification key
pub const SYMMETRIC_KEY_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum TokenBuildError {
    #[error("Token restriction requires an issuer")]
    MissingIssuer,

    #[error("Token restriction requires an audience")]
    MissingAudience,

    #[error("{field} is not an absolute URI: '{value}'")]
    InvalidUri { field: &'static str, value: String },

    #[error("Token restriction requires at least one claim")]
    NoRequiredClaims,

    #[error("No verification key available to sign the token")]
    MissingSigningKey,

    #[error("Verification key is empty")]
    EmptyVerificationKey,

    #[error("Template requires the content key identifier claim but no key id was given")]
    MissingContentKeyId,

    #[error("Required claim '{0}' has no value to embed")]
    MissingClaimValue(String),

    #[error("Token expiry {expires_on} is not in the future")]
    ExpiryNotInFuture { expires_on: chrono::DateTime<chrono::Utc> },

    #[error("Token not-before {not_before} is after expiry {expires_on}")]
    InvalidValidityWindow {
        not_before: chrono::DateTime<chrono::Utc>,
        expires_on: chrono::DateTime<chrono::Utc>,
    },

    #[error("Token serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TokenValidationError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Token signature does not match any verification key")]
    SignatureMismatch,

    #[error("Template has no verification key")]
    NoVerificationKey,

    #[error("Token expired at {expired_at}")]
    Expired { expired_at: chrono::DateTime<chrono::Utc> },

    #[error("Token is not valid before {not_before}")]
    NotYetValid { not_before: chrono::DateTime<chrono::Utc> },

    #[error("Issuer mismatch: expected '{expected}', found '{found}'")]
    IssuerMismatch { expected: String, found: String },

    #[error("Audience mismatch: expected '{expected}', found '{found}'")]
    AudienceMismatch { expected: String, found: String },

    #[error("Required claim '{0}' is missing")]
    MissingClaim(String),

    #[error("Claim '{claim}' mismatch: expected '{expected}', found '{found}'")]
    ClaimMismatch {
        claim: String,
        expected: String,
        found: String,
    },
}

/// Format of the tokens a restriction accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum TokenType {
    /// JSON Web Token, HMAC-SHA256 signed compact form
    #[default]
    #[serde(rename = "JWT")]
    Jwt,
    /// Simple Web Token, form-encoded with an HMACSHA256 signature
    #[serde(rename = "SWT")]
    Swt,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Jwt => "JWT",
            TokenType::Swt => "SWT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JWT" => Some(TokenType::Jwt),
            "SWT" => Some(TokenType::Swt),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared secret used to sign and verify restriction tokens
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricVerificationKey {
    key_value: Vec<u8>,
}

impl SymmetricVerificationKey {
    /// Generate a random 64-byte key
    pub fn generate() -> Result<Self, KeyGenerationError> {
        let mut key_value = vec![0u8; SYMMETRIC_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut key_value)
            .map_err(|e| KeyGenerationError::RngUnavailable(e.to_string()))?;
        Ok(Self { key_value })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, TokenBuildError> {
        let key_value = bytes.into();
        if key_value.is_empty() {
            return Err(TokenBuildError::EmptyVerificationKey);
        }
        Ok(Self { key_value })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key_value
    }
}

impl fmt::Debug for SymmetricVerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricVerificationKey")
            .field("len", &self.key_value.len())
            .finish()
    }
}

/// Claim a token must carry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenClaim {
    pub claim_type: String,
    /// Fixed value the claim must have; `None` means any value, or the
    /// content key id for the content-key-identifier claim
    pub claim_value: Option<String>,
}

impl TokenClaim {
    pub fn new(claim_type: impl Into<String>, claim_value: Option<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            claim_value,
        }
    }

    /// Claim binding the token to a single content key
    pub fn content_key_identifier() -> Self {
        Self::new(CONTENT_KEY_IDENTIFIER_CLAIM_TYPE, None)
    }

    pub fn is_content_key_identifier(&self) -> bool {
        self.claim_type == CONTENT_KEY_IDENTIFIER_CLAIM_TYPE
    }
}

/// Token shape a client must present to obtain a license
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRestrictionTemplate {
    pub token_type: TokenType,
    pub issuer: String,
    pub audience: String,
    pub primary_verification_key: Option<SymmetricVerificationKey>,
    pub alternate_verification_keys: Vec<SymmetricVerificationKey>,
    pub required_claims: Vec<TokenClaim>,
}

impl TokenRestrictionTemplate {
    pub fn builder(token_type: TokenType) -> TokenRestrictionTemplateBuilder {
        TokenRestrictionTemplateBuilder::new(token_type)
    }

    /// Build a template from its parts, failing fast on an empty claim set
    pub fn new(
        token_type: TokenType,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        verification_key: SymmetricVerificationKey,
        claims: impl IntoIterator<Item = TokenClaim>,
    ) -> Result<Self, TokenBuildError> {
        Self::builder(token_type)
            .issuer(issuer)
            .audience(audience)
            .primary_verification_key(verification_key)
            .required_claims(claims)
            .build()
    }

    pub fn requires_content_key_identifier(&self) -> bool {
        self.required_claims
            .iter()
            .any(TokenClaim::is_content_key_identifier)
    }

    /// Primary key followed by the alternates
    pub fn verification_keys(&self) -> impl Iterator<Item = &SymmetricVerificationKey> {
        self.primary_verification_key
            .iter()
            .chain(self.alternate_verification_keys.iter())
    }

    /// Check the invariants every template must satisfy. A missing primary
    /// key is tolerated here since the service accepts one written as nil.
    pub fn validate(&self) -> Result<(), TokenBuildError> {
        if self.issuer.trim().is_empty() {
            return Err(TokenBuildError::MissingIssuer);
        }
        if self.audience.trim().is_empty() {
            return Err(TokenBuildError::MissingAudience);
        }
        check_absolute_uri("issuer", &self.issuer)?;
        check_absolute_uri("audience", &self.audience)?;
        if self.required_claims.is_empty() {
            return Err(TokenBuildError::NoRequiredClaims);
        }
        Ok(())
    }
}

fn check_absolute_uri(field: &'static str, value: &str) -> Result<(), TokenBuildError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|_| TokenBuildError::InvalidUri {
            field,
            value: value.to_string(),
        })
}

/// Builder for [`TokenRestrictionTemplate`]
#[derive(Debug, Clone)]
pub struct TokenRestrictionTemplateBuilder {
    token_type: TokenType,
    issuer: Option<String>,
    audience: Option<String>,
    primary_verification_key: Option<SymmetricVerificationKey>,
    alternate_verification_keys: Vec<SymmetricVerificationKey>,
    required_claims: Vec<TokenClaim>,
}

impl TokenRestrictionTemplateBuilder {
    pub fn new(token_type: TokenType) -> Self {
        Self {
            token_type,
            issuer: None,
            audience: None,
            primary_verification_key: None,
            alternate_verification_keys: Vec::new(),
            required_claims: Vec::new(),
        }
    }

    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[must_use]
    pub fn primary_verification_key(mut self, key: SymmetricVerificationKey) -> Self {
        self.primary_verification_key = Some(key);
        self
    }

    #[must_use]
    pub fn alternate_verification_key(mut self, key: SymmetricVerificationKey) -> Self {
        self.alternate_verification_keys.push(key);
        self
    }

    /// Add a required claim; duplicates are ignored
    #[must_use]
    pub fn required_claim(mut self, claim: TokenClaim) -> Self {
        if !self.required_claims.contains(&claim) {
            self.required_claims.push(claim);
        }
        self
    }

    #[must_use]
    pub fn required_claims(self, claims: impl IntoIterator<Item = TokenClaim>) -> Self {
        claims
            .into_iter()
            .fold(self, |builder, claim| builder.required_claim(claim))
    }

    /// Fails on a missing issuer, audience or primary key, or an empty claim set
    pub fn build(self) -> Result<TokenRestrictionTemplate, TokenBuildError> {
        let template = TokenRestrictionTemplate {
            token_type: self.token_type,
            issuer: self.issuer.ok_or(TokenBuildError::MissingIssuer)?,
            audience: self.audience.ok_or(TokenBuildError::MissingAudience)?,
            primary_verification_key: self.primary_verification_key,
            alternate_verification_keys: self.alternate_verification_keys,
            required_claims: self.required_claims,
        };
        template.validate()?;
        if template.primary_verification_key.is_none() {
            return Err(TokenBuildError::MissingSigningKey);
        }

        tracing::debug!(
            token_type = %template.token_type,
            issuer = %template.issuer,
            claims = template.required_claims.len(),
            "built token restriction template"
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SymmetricVerificationKey {
        SymmetricVerificationKey::from_bytes(vec![1u8; 32]).unwrap()
    }

    #[test]
    fn test_build_requires_claims() {
        let result = TokenRestrictionTemplate::builder(TokenType::Jwt)
            .issuer("https://sts.contoso.com")
            .audience("urn:contoso")
            .primary_verification_key(key())
            .build();
        assert!(matches!(result, Err(TokenBuildError::NoRequiredClaims)));
    }

    #[test]
    fn test_build_requires_issuer_and_audience() {
        let missing_issuer = TokenRestrictionTemplate::builder(TokenType::Swt)
            .audience("urn:contoso")
            .required_claim(TokenClaim::content_key_identifier())
            .build();
        assert!(matches!(missing_issuer, Err(TokenBuildError::MissingIssuer)));

        let missing_audience = TokenRestrictionTemplate::builder(TokenType::Swt)
            .issuer("https://sts.contoso.com")
            .required_claim(TokenClaim::content_key_identifier())
            .build();
        assert!(matches!(
            missing_audience,
            Err(TokenBuildError::MissingAudience)
        ));
    }

    #[test]
    fn test_build_requires_primary_key() {
        let result = TokenRestrictionTemplate::builder(TokenType::Jwt)
            .issuer("https://sts.contoso.com")
            .audience("urn:contoso")
            .alternate_verification_key(key())
            .required_claim(TokenClaim::content_key_identifier())
            .build();
        assert!(matches!(result, Err(TokenBuildError::MissingSigningKey)));
    }

    #[test]
    fn test_build_rejects_relative_uri() {
        let result = TokenRestrictionTemplate::new(
            TokenType::Jwt,
            "sts.contoso.com",
            "urn:contoso",
            key(),
            [TokenClaim::content_key_identifier()],
        );
        assert!(matches!(
            result,
            Err(TokenBuildError::InvalidUri { field: "issuer", .. })
        ));
    }

    #[test]
    fn test_duplicate_claims_collapse() {
        let template = TokenRestrictionTemplate::new(
            TokenType::Jwt,
            "https://sts.contoso.com",
            "urn:contoso",
            key(),
            [
                TokenClaim::content_key_identifier(),
                TokenClaim::content_key_identifier(),
                TokenClaim::new("urn:contoso:tier", Some("gold".to_string())),
            ],
        )
        .unwrap();
        assert_eq!(template.required_claims.len(), 2);
        assert!(template.requires_content_key_identifier());
    }

    #[test]
    fn test_verification_key_order() {
        let alternate = SymmetricVerificationKey::from_bytes(vec![2u8; 32]).unwrap();
        let template = TokenRestrictionTemplate::builder(TokenType::Jwt)
            .issuer("https://sts.contoso.com")
            .audience("urn:contoso")
            .primary_verification_key(key())
            .alternate_verification_key(alternate.clone())
            .required_claim(TokenClaim::content_key_identifier())
            .build()
            .unwrap();

        let keys: Vec<_> = template.verification_keys().collect();
        assert_eq!(keys, vec![&key(), &alternate]);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            SymmetricVerificationKey::from_bytes(Vec::new()),
            Err(TokenBuildError::EmptyVerificationKey)
        ));
    }

    #[test]
    fn test_generated_key_length() {
        let key = SymmetricVerificationKey::generate().unwrap();
        assert_eq!(key.as_bytes().len(), SYMMETRIC_KEY_LEN);
        assert!(!format!("{:?}", key).contains(&format!("{:?}", key.as_bytes())));
    }
}
