pub mod authorization;
pub mod config;
mod content_key;
pub mod delivery;
mod error;
mod key;
pub mod prelude;
pub mod protection;
pub mod template;
pub mod token;
mod xml;

pub use authorization::{
    AuthorizationPolicy, AuthorizationPolicyComposer, AuthorizationPolicyOption,
    ContentKeyRestrictionType, PolicyCompositionError, Restriction,
};
pub use config::{ConfigError, EngineConfig};
pub use content_key::{
    create_common_encryption_key, create_content_key, ContentKey, ProtectionKeyType,
};
pub use delivery::{
    AssetDeliveryPolicyType, AssetDeliveryProtocol, DeliveryConfigKey, DeliveryPolicy,
    DeliveryPolicyComposer, KeyDeliveryUrlSource,
};
pub use error::ContentProtectionError;
pub use key::{ContentKeyId, ContentKeyMaterial, ContentKeyType, KeyGenerationError};
pub use protection::{
    CertificateKeyWrapper, KeyWrapPadding, KeyWrapper, ProtectionCertificate, ProtectionError,
    ProtectionKeySource,
};
pub use template::{ContentKeyDeliveryType, LicenseTemplate, TemplateSerializationError};
pub use token::{
    SymmetricVerificationKey, TokenBuildError, TokenClaim, TokenRestrictionTemplate, TokenType,
    TokenValidationError,
};
