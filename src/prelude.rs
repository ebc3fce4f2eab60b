//! Content Key Policy Prelude
//!
//! Commonly used types in one import.
//!
//! # Example
//!
//! ```rust
//! use content_key_policy::prelude::*;
//!
//! # fn example() -> Result<(), ContentProtectionError> {
//! let policy = AuthorizationPolicyComposer::default().compose_open([
//!     LicenseTemplate::from(PlayReadyLicenseResponseTemplate::default()),
//!     LicenseTemplate::from(WidevineMessage::default()),
//! ])?;
//! assert_eq!(policy.options.len(), 2);
//! # Ok(())
//! # }
//! ```

// Keys and protection
pub use crate::content_key::{create_common_encryption_key, ContentKey};
pub use crate::key::{ContentKeyId, ContentKeyMaterial, ContentKeyType};
pub use crate::protection::{
    protect, CertificateKeyWrapper, KeyWrapPadding, KeyWrapper, ProtectionCertificate,
    ProtectionKeySource,
};

// License templates
pub use crate::template::{
    ContentKeyDeliveryType, LicenseTemplate, PlayReadyLicenseResponseTemplate,
    PlayReadyLicenseTemplate, WidevineMessage,
};

// Token restrictions
pub use crate::token::{
    generate_test_token, validate_test_token, SymmetricVerificationKey, TestToken, TokenClaim,
    TokenRestrictionTemplate, TokenType,
};

// Policies
pub use crate::authorization::{AuthorizationPolicy, AuthorizationPolicyComposer};
pub use crate::delivery::{
    AssetDeliveryProtocol, DeliveryPolicy, DeliveryPolicyComposer, KeyDeliveryUrlSource,
};

pub use crate::config::EngineConfig;
pub use crate::error::ContentProtectionError;
