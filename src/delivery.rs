//! Asset delivery policies
//!
//! A delivery policy tells the streaming origin how to encrypt an asset on
//! the fly and where players acquire licenses for it.

use crate::authorization::PolicyCompositionError;
use crate::config::DeliveryConfig;
use crate::key::ContentKeyId;
use crate::template::ContentKeyDeliveryType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Encryption the origin applies when streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetDeliveryPolicyType {
    None,
    Blocked,
    NoDynamicEncryption,
    DynamicEnvelopeEncryption,
    DynamicCommonEncryption,
}

impl AssetDeliveryPolicyType {
    pub fn code(&self) -> u8 {
        match self {
            AssetDeliveryPolicyType::None => 0,
            AssetDeliveryPolicyType::Blocked => 1,
            AssetDeliveryPolicyType::NoDynamicEncryption => 2,
            AssetDeliveryPolicyType::DynamicEnvelopeEncryption => 3,
            AssetDeliveryPolicyType::DynamicCommonEncryption => 4,
        }
    }
}

/// Streaming protocol; the service combines these as bit flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetDeliveryProtocol {
    SmoothStreaming,
    Dash,
    Hls,
    Hds,
}

impl AssetDeliveryProtocol {
    pub fn flag(&self) -> u32 {
        match self {
            AssetDeliveryProtocol::SmoothStreaming => 0x1,
            AssetDeliveryProtocol::Dash => 0x2,
            AssetDeliveryProtocol::Hls => 0x4,
            AssetDeliveryProtocol::Hds => 0x8,
        }
    }
}

/// Keys of the delivery configuration map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeliveryConfigKey {
    PlayReadyLicenseAcquisitionUrl,
    WidevineBaseLicenseAcquisitionUrl,
}

impl DeliveryConfigKey {
    pub fn code(&self) -> u8 {
        match self {
            DeliveryConfigKey::PlayReadyLicenseAcquisitionUrl => 4,
            DeliveryConfigKey::WidevineBaseLicenseAcquisitionUrl => 8,
        }
    }

    /// Configuration key holding the acquisition URL for a delivery type
    pub fn for_delivery_type(
        delivery_type: ContentKeyDeliveryType,
    ) -> Result<Self, PolicyCompositionError> {
        match delivery_type {
            ContentKeyDeliveryType::PlayReadyLicense => {
                Ok(DeliveryConfigKey::PlayReadyLicenseAcquisitionUrl)
            }
            ContentKeyDeliveryType::Widevine => {
                Ok(DeliveryConfigKey::WidevineBaseLicenseAcquisitionUrl)
            }
            other => Err(PolicyCompositionError::UnsupportedDeliveryType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeliveryPolicy {
    pub name: String,
    #[serde(rename = "AssetDeliveryPolicyType")]
    pub policy_type: AssetDeliveryPolicyType,
    #[serde(rename = "AssetDeliveryProtocol")]
    pub protocols: BTreeSet<AssetDeliveryProtocol>,
    #[serde(rename = "AssetDeliveryConfiguration")]
    pub configuration: BTreeMap<DeliveryConfigKey, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigurationEntry<'a> {
    key: u8,
    value: &'a str,
}

impl DeliveryPolicy {
    /// Protocol set as the service's bit mask
    pub fn protocol_flags(&self) -> u32 {
        self.protocols.iter().fold(0, |flags, p| flags | p.flag())
    }

    /// Configuration in the service's `[{"Key":n,"Value":"..."}]` form
    pub fn configuration_json(&self) -> Result<String, serde_json::Error> {
        let entries: Vec<ConfigurationEntry<'_>> = self
            .configuration
            .iter()
            .map(|(key, value)| ConfigurationEntry {
                key: key.code(),
                value,
            })
            .collect();
        serde_json::to_string(&entries)
    }

    pub fn acquisition_url(&self, delivery_type: ContentKeyDeliveryType) -> Option<&str> {
        let key = DeliveryConfigKey::for_delivery_type(delivery_type).ok()?;
        self.configuration.get(&key).map(String::as_str)
    }
}

/// Source of license acquisition URLs, implemented by the media service client
pub trait KeyDeliveryUrlSource {
    fn key_delivery_url(
        &self,
        key_id: &ContentKeyId,
        delivery_type: ContentKeyDeliveryType,
    ) -> Result<String, PolicyCompositionError>;
}

/// Builds delivery policies from license acquisition URLs
#[derive(Debug, Clone, Default)]
pub struct DeliveryPolicyComposer {
    config: DeliveryConfig,
}

impl DeliveryPolicyComposer {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    pub fn compose(
        &self,
        acquisition_urls: impl IntoIterator<Item = (ContentKeyDeliveryType, String)>,
        protocols: impl IntoIterator<Item = AssetDeliveryProtocol>,
    ) -> Result<DeliveryPolicy, PolicyCompositionError> {
        let protocols: BTreeSet<_> = protocols.into_iter().collect();
        if protocols.is_empty() {
            return Err(PolicyCompositionError::NoProtocols);
        }

        let mut configuration = BTreeMap::new();
        for (delivery_type, url) in acquisition_urls {
            let key = DeliveryConfigKey::for_delivery_type(delivery_type)?;
            if url::Url::parse(&url).is_err() {
                return Err(PolicyCompositionError::InvalidUrl { delivery_type, url });
            }
            let value = match key {
                // The Widevine base URL must not carry the token query
                DeliveryConfigKey::WidevineBaseLicenseAcquisitionUrl => strip_query(&url),
                DeliveryConfigKey::PlayReadyLicenseAcquisitionUrl => url,
            };
            if configuration.insert(key, value).is_some() {
                return Err(PolicyCompositionError::DuplicateDeliveryType(delivery_type));
            }
        }
        if configuration.is_empty() {
            return Err(PolicyCompositionError::NoAcquisitionUrls);
        }

        let policy = DeliveryPolicy {
            name: self.config.policy_name.clone(),
            policy_type: self.config.policy_type,
            protocols,
            configuration,
        };

        tracing::info!(
            policy_name = %policy.name,
            protocols = policy.protocol_flags(),
            urls = policy.configuration.len(),
            "composed delivery policy"
        );
        Ok(policy)
    }

    /// Compose with the configured protocol set
    pub fn compose_default(
        &self,
        acquisition_urls: impl IntoIterator<Item = (ContentKeyDeliveryType, String)>,
    ) -> Result<DeliveryPolicy, PolicyCompositionError> {
        self.compose(acquisition_urls, self.config.protocols.iter().copied())
    }

    /// Fetch each acquisition URL for `key_id` from the service, then compose
    pub fn from_service<S: KeyDeliveryUrlSource + ?Sized>(
        &self,
        source: &S,
        key_id: &ContentKeyId,
        delivery_types: &[ContentKeyDeliveryType],
        protocols: impl IntoIterator<Item = AssetDeliveryProtocol>,
    ) -> Result<DeliveryPolicy, PolicyCompositionError> {
        let mut urls = Vec::with_capacity(delivery_types.len());
        for &delivery_type in delivery_types {
            let url = source.key_delivery_url(key_id, delivery_type)?;
            tracing::debug!(key_id = %key_id, ?delivery_type, "fetched key delivery url");
            urls.push((delivery_type, url));
        }
        self.compose(urls, protocols)
    }
}

fn strip_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}
