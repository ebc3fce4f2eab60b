//! PlayReady license response templates
//!
//! The template is an XML document in the Media Services PlayReady template
//! namespace. Elements inside each contract are written in alphabetical
//! order, matching the data contract serializer the license service uses.

use super::TemplateSerializationError;
use crate::xml::{format_duration, invalid_value, XmlBuilder, XmlElement, XSI_NS};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;
use uuid::Uuid;

pub const PLAYREADY_TEMPLATE_NS: &str =
    "http://schemas.microsoft.com/Azure/MediaServices/KeyDelivery/PlayReadyTemplate/v1";

const ANALOG_VIDEO_OPLS: &[u32] = &[100, 150, 200];
const COMPRESSED_DIGITAL_AUDIO_OPLS: &[u32] = &[100, 150, 200, 250, 300];
const COMPRESSED_DIGITAL_VIDEO_OPLS: &[u32] = &[400, 500];
const UNCOMPRESSED_DIGITAL_AUDIO_OPLS: &[u32] = &[100, 150, 200, 250, 300];
const UNCOMPRESSED_DIGITAL_VIDEO_OPLS: &[u32] = &[100, 250, 270, 300];

/// Top-level PlayReady template: one response carrying one or more licenses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayReadyLicenseResponseTemplate {
    pub license_templates: Vec<PlayReadyLicenseTemplate>,
    pub response_custom_data: Option<String>,
}

impl Default for PlayReadyLicenseResponseTemplate {
    fn default() -> Self {
        Self::single(PlayReadyLicenseTemplate::default())
    }
}

impl PlayReadyLicenseResponseTemplate {
    /// Response carrying a single license template
    pub fn single(template: PlayReadyLicenseTemplate) -> Self {
        Self {
            license_templates: vec![template],
            response_custom_data: None,
        }
    }

    #[must_use]
    pub fn with_license(mut self, template: PlayReadyLicenseTemplate) -> Self {
        self.license_templates.push(template);
        self
    }

    #[must_use]
    pub fn with_custom_data(mut self, data: impl Into<String>) -> Self {
        self.response_custom_data = Some(data.into());
        self
    }

    /// Check cross-field rules the license service enforces
    pub fn validate(&self) -> Result<(), TemplateSerializationError> {
        if self.license_templates.is_empty() {
            return Err(TemplateSerializationError::Inconsistent(
                "a PlayReady response template needs at least one license template".to_string(),
            ));
        }
        self.license_templates
            .iter()
            .try_for_each(PlayReadyLicenseTemplate::validate)
    }

    pub fn serialize(&self) -> Result<String, TemplateSerializationError> {
        self.validate()?;

        let mut xml = XmlBuilder::new();
        xml.open(
            "PlayReadyLicenseResponseTemplate",
            &[("xmlns:i", XSI_NS), ("xmlns", PLAYREADY_TEMPLATE_NS)],
        );
        xml.open("LicenseTemplates", &[]);
        for template in &self.license_templates {
            template.write(&mut xml);
        }
        xml.close("LicenseTemplates");
        xml.optional_text("ResponseCustomData", self.response_custom_data.as_deref());
        xml.close("PlayReadyLicenseResponseTemplate");
        Ok(xml.finish())
    }

    pub fn deserialize(xml: &str) -> Result<Self, TemplateSerializationError> {
        let root = XmlElement::parse(xml)?;
        root.expect_name("PlayReadyLicenseResponseTemplate")?;

        let license_templates = root
            .require_child("LicenseTemplates")?
            .children_named("PlayReadyLicenseTemplate")
            .map(PlayReadyLicenseTemplate::read)
            .collect::<Result<Vec<_>, _>>()?;

        let template = Self {
            license_templates,
            response_custom_data: root.child_text("ResponseCustomData").map(str::to_string),
        };
        template.validate()?;
        Ok(template)
    }
}

/// Persistence of the issued license on the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayReadyLicenseType {
    #[default]
    Nonpersistent,
    Persistent,
}

impl PlayReadyLicenseType {
    fn as_str(&self) -> &'static str {
        match self {
            PlayReadyLicenseType::Nonpersistent => "Nonpersistent",
            PlayReadyLicenseType::Persistent => "Persistent",
        }
    }

    fn parse(text: &str) -> Result<Self, TemplateSerializationError> {
        match text {
            "Nonpersistent" => Ok(PlayReadyLicenseType::Nonpersistent),
            "Persistent" => Ok(PlayReadyLicenseType::Persistent),
            other => Err(invalid_value("LicenseType", other)),
        }
    }
}

/// Where the license server finds the content key id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKeySource {
    /// Take the key id from the PlayReady header of the license request
    #[default]
    FromHeader,
    /// Always issue the license for this key id
    FromKeyIdentifier(Uuid),
}

/// Single PlayReady license
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayReadyLicenseTemplate {
    pub allow_test_devices: bool,
    pub begin_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub relative_begin_date: Option<Duration>,
    pub relative_expiration_date: Option<Duration>,
    pub grace_period: Option<Duration>,
    pub license_type: PlayReadyLicenseType,
    pub content_key: ContentKeySource,
    pub play_right: PlayReadyPlayRight,
}

impl PlayReadyLicenseTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn license_type(mut self, license_type: PlayReadyLicenseType) -> Self {
        self.license_type = license_type;
        self
    }

    #[must_use]
    pub fn content_key(mut self, source: ContentKeySource) -> Self {
        self.content_key = source;
        self
    }

    #[must_use]
    pub fn play_right(mut self, play_right: PlayReadyPlayRight) -> Self {
        self.play_right = play_right;
        self
    }

    #[must_use]
    pub fn allow_test_devices(mut self, allow: bool) -> Self {
        self.allow_test_devices = allow;
        self
    }

    #[must_use]
    pub fn valid_window(mut self, begin: DateTime<Utc>, expiration: DateTime<Utc>) -> Self {
        self.begin_date = Some(begin);
        self.expiration_date = Some(expiration);
        self
    }

    #[must_use]
    pub fn relative_expiration(mut self, after_issue: Duration) -> Self {
        self.relative_expiration_date = Some(after_issue);
        self
    }

    #[must_use]
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = Some(grace);
        self
    }

    pub fn validate(&self) -> Result<(), TemplateSerializationError> {
        if self.begin_date.is_some() && self.relative_begin_date.is_some() {
            return Err(TemplateSerializationError::Inconsistent(
                "BeginDate and RelativeBeginDate are mutually exclusive".to_string(),
            ));
        }
        if self.expiration_date.is_some() && self.relative_expiration_date.is_some() {
            return Err(TemplateSerializationError::Inconsistent(
                "ExpirationDate and RelativeExpirationDate are mutually exclusive".to_string(),
            ));
        }
        if let (Some(begin), Some(expiration)) = (self.begin_date, self.expiration_date) {
            if expiration <= begin {
                return Err(TemplateSerializationError::Inconsistent(
                    "ExpirationDate must be after BeginDate".to_string(),
                ));
            }
        }
        self.play_right.validate()
    }

    fn write(&self, xml: &mut XmlBuilder) {
        xml.open("PlayReadyLicenseTemplate", &[]);
        xml.bool("AllowTestDevices", self.allow_test_devices);
        xml.optional_text("BeginDate", self.begin_date.map(format_date).as_deref());
        match self.content_key {
            ContentKeySource::FromHeader => {
                xml.empty("ContentKey", &[("i:type", "ContentEncryptionKeyFromHeader")]);
            }
            ContentKeySource::FromKeyIdentifier(key_id) => {
                xml.open(
                    "ContentKey",
                    &[("i:type", "ContentEncryptionKeyFromKeyIdentifier")],
                );
                xml.text("KeyIdentifier", &key_id.hyphenated().to_string());
                xml.close("ContentKey");
            }
        }
        xml.optional_text(
            "ExpirationDate",
            self.expiration_date.map(format_date).as_deref(),
        );
        xml.optional_text(
            "GracePeriod",
            self.grace_period.map(format_duration).as_deref(),
        );
        xml.text("LicenseType", self.license_type.as_str());
        self.play_right.write(xml);
        xml.optional_text(
            "RelativeBeginDate",
            self.relative_begin_date.map(format_duration).as_deref(),
        );
        xml.optional_text(
            "RelativeExpirationDate",
            self.relative_expiration_date.map(format_duration).as_deref(),
        );
        xml.close("PlayReadyLicenseTemplate");
    }

    fn read(element: &XmlElement) -> Result<Self, TemplateSerializationError> {
        let content_key_element = element.require_child("ContentKey")?;
        let content_key = match content_key_element.attribute("type") {
            Some("ContentEncryptionKeyFromHeader") => ContentKeySource::FromHeader,
            Some("ContentEncryptionKeyFromKeyIdentifier") => {
                let text = content_key_element.require_value("KeyIdentifier")?;
                let key_id =
                    Uuid::parse_str(text).map_err(|_| invalid_value("KeyIdentifier", text))?;
                ContentKeySource::FromKeyIdentifier(key_id)
            }
            other => return Err(invalid_value("ContentKey", other.unwrap_or(""))),
        };

        Ok(Self {
            allow_test_devices: element.child_bool("AllowTestDevices")?.unwrap_or(false),
            begin_date: element
                .child_value("BeginDate")
                .map(|text| parse_date("BeginDate", text))
                .transpose()?,
            expiration_date: element
                .child_value("ExpirationDate")
                .map(|text| parse_date("ExpirationDate", text))
                .transpose()?,
            relative_begin_date: element.child_duration("RelativeBeginDate")?,
            relative_expiration_date: element.child_duration("RelativeExpirationDate")?,
            grace_period: element.child_duration("GracePeriod")?,
            license_type: element
                .child_value("LicenseType")
                .map(PlayReadyLicenseType::parse)
                .transpose()?
                .unwrap_or_default(),
            content_key,
            play_right: PlayReadyPlayRight::read(element.require_child("PlayRight")?)?,
        })
    }
}

/// Handling of video sent to outputs the client cannot identify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownOutputPassingOption {
    #[default]
    NotAllowed,
    Allowed,
    AllowedWithVideoConstriction,
}

impl UnknownOutputPassingOption {
    fn as_str(&self) -> &'static str {
        match self {
            UnknownOutputPassingOption::NotAllowed => "NotAllowed",
            UnknownOutputPassingOption::Allowed => "Allowed",
            UnknownOutputPassingOption::AllowedWithVideoConstriction => {
                "AllowedWithVideoConstriction"
            }
        }
    }

    fn parse(text: &str) -> Result<Self, TemplateSerializationError> {
        match text {
            "NotAllowed" => Ok(UnknownOutputPassingOption::NotAllowed),
            "Allowed" => Ok(UnknownOutputPassingOption::Allowed),
            "AllowedWithVideoConstriction" => {
                Ok(UnknownOutputPassingOption::AllowedWithVideoConstriction)
            }
            other => Err(invalid_value("AllowPassingVideoContentToUnknownOutput", other)),
        }
    }
}

/// Serial Copy Management System restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScmsRestriction {
    pub configuration_data: u8,
}

/// Automatic gain control and color stripe restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgcAndColorStripeRestriction {
    pub configuration_data: u8,
}

/// Play right carried by a PlayReady license
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayReadyPlayRight {
    pub first_play_expiration: Option<Duration>,
    pub scms_restriction: Option<ScmsRestriction>,
    pub agc_and_color_stripe_restriction: Option<AgcAndColorStripeRestriction>,
    pub digital_video_only_content_restriction: bool,
    pub image_constraint_for_analog_component_video_restriction: bool,
    pub image_constraint_for_analog_computer_monitor_restriction: bool,
    pub allow_passing_video_content_to_unknown_output: UnknownOutputPassingOption,
    pub uncompressed_digital_video_opl: Option<u32>,
    pub compressed_digital_video_opl: Option<u32>,
    pub analog_video_opl: Option<u32>,
    pub compressed_digital_audio_opl: Option<u32>,
    pub uncompressed_digital_audio_opl: Option<u32>,
}

impl PlayReadyPlayRight {
    pub fn validate(&self) -> Result<(), TemplateSerializationError> {
        check_opl("AnalogVideoOpl", self.analog_video_opl, ANALOG_VIDEO_OPLS)?;
        check_opl(
            "CompressedDigitalAudioOpl",
            self.compressed_digital_audio_opl,
            COMPRESSED_DIGITAL_AUDIO_OPLS,
        )?;
        check_opl(
            "CompressedDigitalVideoOpl",
            self.compressed_digital_video_opl,
            COMPRESSED_DIGITAL_VIDEO_OPLS,
        )?;
        check_opl(
            "UncompressedDigitalAudioOpl",
            self.uncompressed_digital_audio_opl,
            UNCOMPRESSED_DIGITAL_AUDIO_OPLS,
        )?;
        check_opl(
            "UncompressedDigitalVideoOpl",
            self.uncompressed_digital_video_opl,
            UNCOMPRESSED_DIGITAL_VIDEO_OPLS,
        )?;
        if let Some(scms) = self.scms_restriction {
            check_configuration_data("ScmsRestriction", scms.configuration_data)?;
        }
        if let Some(agc) = self.agc_and_color_stripe_restriction {
            check_configuration_data("AgcAndColorStripeRestriction", agc.configuration_data)?;
        }
        Ok(())
    }

    fn write(&self, xml: &mut XmlBuilder) {
        xml.open("PlayRight", &[]);
        if let Some(agc) = self.agc_and_color_stripe_restriction {
            xml.open("AgcAndColorStripeRestriction", &[]);
            xml.text("ConfigurationData", &agc.configuration_data.to_string());
            xml.close("AgcAndColorStripeRestriction");
        }
        xml.text(
            "AllowPassingVideoContentToUnknownOutput",
            self.allow_passing_video_content_to_unknown_output.as_str(),
        );
        write_opl(xml, "AnalogVideoOpl", self.analog_video_opl);
        write_opl(xml, "CompressedDigitalAudioOpl", self.compressed_digital_audio_opl);
        write_opl(xml, "CompressedDigitalVideoOpl", self.compressed_digital_video_opl);
        xml.bool(
            "DigitalVideoOnlyContentRestriction",
            self.digital_video_only_content_restriction,
        );
        xml.optional_text(
            "FirstPlayExpiration",
            self.first_play_expiration.map(format_duration).as_deref(),
        );
        xml.bool(
            "ImageConstraintForAnalogComponentVideoRestriction",
            self.image_constraint_for_analog_component_video_restriction,
        );
        xml.bool(
            "ImageConstraintForAnalogComputerMonitorRestriction",
            self.image_constraint_for_analog_computer_monitor_restriction,
        );
        if let Some(scms) = self.scms_restriction {
            xml.open("ScmsRestriction", &[]);
            xml.text("ConfigurationData", &scms.configuration_data.to_string());
            xml.close("ScmsRestriction");
        }
        write_opl(xml, "UncompressedDigitalAudioOpl", self.uncompressed_digital_audio_opl);
        write_opl(xml, "UncompressedDigitalVideoOpl", self.uncompressed_digital_video_opl);
        xml.close("PlayRight");
    }

    fn read(element: &XmlElement) -> Result<Self, TemplateSerializationError> {
        Ok(Self {
            first_play_expiration: element.child_duration("FirstPlayExpiration")?,
            scms_restriction: read_configuration_data(element, "ScmsRestriction")?
                .map(|configuration_data| ScmsRestriction { configuration_data }),
            agc_and_color_stripe_restriction: read_configuration_data(
                element,
                "AgcAndColorStripeRestriction",
            )?
            .map(|configuration_data| AgcAndColorStripeRestriction { configuration_data }),
            digital_video_only_content_restriction: element
                .child_bool("DigitalVideoOnlyContentRestriction")?
                .unwrap_or(false),
            image_constraint_for_analog_component_video_restriction: element
                .child_bool("ImageConstraintForAnalogComponentVideoRestriction")?
                .unwrap_or(false),
            image_constraint_for_analog_computer_monitor_restriction: element
                .child_bool("ImageConstraintForAnalogComputerMonitorRestriction")?
                .unwrap_or(false),
            allow_passing_video_content_to_unknown_output: element
                .child_value("AllowPassingVideoContentToUnknownOutput")
                .map(UnknownOutputPassingOption::parse)
                .transpose()?
                .unwrap_or_default(),
            uncompressed_digital_video_opl: element.child_u32("UncompressedDigitalVideoOpl")?,
            compressed_digital_video_opl: element.child_u32("CompressedDigitalVideoOpl")?,
            analog_video_opl: element.child_u32("AnalogVideoOpl")?,
            compressed_digital_audio_opl: element.child_u32("CompressedDigitalAudioOpl")?,
            uncompressed_digital_audio_opl: element.child_u32("UncompressedDigitalAudioOpl")?,
        })
    }
}

fn check_opl(
    field: &str,
    value: Option<u32>,
    allowed: &[u32],
) -> Result<(), TemplateSerializationError> {
    match value {
        Some(opl) if !allowed.contains(&opl) => Err(invalid_value(field, &opl.to_string())),
        _ => Ok(()),
    }
}

fn check_configuration_data(field: &str, value: u8) -> Result<(), TemplateSerializationError> {
    if value > 3 {
        return Err(invalid_value(field, &value.to_string()));
    }
    Ok(())
}

fn write_opl(xml: &mut XmlBuilder, name: &str, value: Option<u32>) {
    if let Some(opl) = value {
        xml.text(name, &opl.to_string());
    }
}

fn read_configuration_data(
    element: &XmlElement,
    name: &str,
) -> Result<Option<u8>, TemplateSerializationError> {
    element
        .child(name)
        .map(|restriction| {
            let text = restriction.require_value("ConfigurationData")?;
            text.parse::<u8>().map_err(|_| invalid_value(name, text))
        })
        .transpose()
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_date(field: &str, text: &str) -> Result<DateTime<Utc>, TemplateSerializationError> {
    DateTime::parse_from_rfc3339(text)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| invalid_value(field, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_template_shape() {
        let xml = PlayReadyLicenseResponseTemplate::default().serialize().unwrap();

        assert!(xml.starts_with("<PlayReadyLicenseResponseTemplate"));
        assert!(xml.contains(PLAYREADY_TEMPLATE_NS));
        assert!(xml.contains("<LicenseTemplates><PlayReadyLicenseTemplate>"));
        assert!(xml.contains(r#"<ContentKey i:type="ContentEncryptionKeyFromHeader" />"#));
        assert!(xml.contains("<LicenseType>Nonpersistent</LicenseType>"));
        assert!(xml.contains(
            "<AllowPassingVideoContentToUnknownOutput>NotAllowed</AllowPassingVideoContentToUnknownOutput>"
        ));
        assert!(!xml.contains("ResponseCustomData"));
    }

    #[test]
    fn test_full_template_round_trip() {
        let play_right = PlayReadyPlayRight {
            first_play_expiration: Some(Duration::from_secs(3_600)),
            scms_restriction: Some(ScmsRestriction {
                configuration_data: 2,
            }),
            agc_and_color_stripe_restriction: Some(AgcAndColorStripeRestriction {
                configuration_data: 1,
            }),
            digital_video_only_content_restriction: true,
            image_constraint_for_analog_component_video_restriction: true,
            image_constraint_for_analog_computer_monitor_restriction: false,
            allow_passing_video_content_to_unknown_output:
                UnknownOutputPassingOption::AllowedWithVideoConstriction,
            uncompressed_digital_video_opl: Some(270),
            compressed_digital_video_opl: Some(400),
            analog_video_opl: Some(150),
            compressed_digital_audio_opl: Some(250),
            uncompressed_digital_audio_opl: Some(300),
        };
        let begin = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2027, 1, 1, 12, 30, 0).unwrap();

        let template = PlayReadyLicenseResponseTemplate::single(
            PlayReadyLicenseTemplate::new()
                .license_type(PlayReadyLicenseType::Persistent)
                .content_key(ContentKeySource::FromKeyIdentifier(Uuid::new_v4()))
                .allow_test_devices(true)
                .valid_window(begin, end)
                .grace_period(Duration::from_secs(300))
                .play_right(play_right),
        )
        .with_license(
            PlayReadyLicenseTemplate::new().relative_expiration(Duration::from_secs(86_400)),
        )
        .with_custom_data("tenant <a&b>");

        let xml = template.serialize().unwrap();
        let back = PlayReadyLicenseResponseTemplate::deserialize(&xml).unwrap();
        assert_eq!(back, template);
    }

    #[test]
    fn test_empty_response_rejected() {
        let template = PlayReadyLicenseResponseTemplate {
            license_templates: vec![],
            response_custom_data: None,
        };
        assert!(matches!(
            template.serialize(),
            Err(TemplateSerializationError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_exclusive_expiration_rejected() {
        let template = PlayReadyLicenseTemplate::new()
            .valid_window(
                Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            )
            .relative_expiration(Duration::from_secs(60));
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_invalid_opl_rejected() {
        let play_right = PlayReadyPlayRight {
            compressed_digital_video_opl: Some(123),
            ..Default::default()
        };
        let result = PlayReadyLicenseResponseTemplate::single(
            PlayReadyLicenseTemplate::new().play_right(play_right),
        )
        .serialize();
        assert!(matches!(
            result,
            Err(TemplateSerializationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_wrong_root() {
        let result = PlayReadyLicenseResponseTemplate::deserialize("<TokenRestrictionTemplate />");
        assert!(matches!(
            result,
            Err(TemplateSerializationError::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn test_deserialize_accepts_nil_elements() {
        let xml = format!(
            r#"<PlayReadyLicenseResponseTemplate xmlns:i="{XSI_NS}" xmlns="{PLAYREADY_TEMPLATE_NS}">
  <LicenseTemplates>
    <PlayReadyLicenseTemplate>
      <AllowTestDevices>false</AllowTestDevices>
      <BeginDate i:nil="true" />
      <ContentKey i:type="ContentEncryptionKeyFromHeader" />
      <ExpirationDate i:nil="true" />
      <LicenseType>Nonpersistent</LicenseType>
      <PlayRight>
        <AllowPassingVideoContentToUnknownOutput>NotAllowed</AllowPassingVideoContentToUnknownOutput>
        <DigitalVideoOnlyContentRestriction>false</DigitalVideoOnlyContentRestriction>
        <ImageConstraintForAnalogComponentVideoRestriction>false</ImageConstraintForAnalogComponentVideoRestriction>
        <ImageConstraintForAnalogComputerMonitorRestriction>false</ImageConstraintForAnalogComputerMonitorRestriction>
      </PlayRight>
    </PlayReadyLicenseTemplate>
  </LicenseTemplates>
  <ResponseCustomData i:nil="true" />
</PlayReadyLicenseResponseTemplate>"#
        );
        let template = PlayReadyLicenseResponseTemplate::deserialize(&xml).unwrap();
        assert_eq!(template, PlayReadyLicenseResponseTemplate::default());
    }

    #[test]
    fn test_round_trip_keeps_custom_data_whitespace() {
        let template = PlayReadyLicenseResponseTemplate::default().with_custom_data("  tenant\n");

        let back = PlayReadyLicenseResponseTemplate::deserialize(&template.serialize().unwrap())
            .unwrap();
        assert_eq!(back.response_custom_data.as_deref(), Some("  tenant\n"));
        assert_eq!(back, template);
    }

    #[test]
    fn test_deserialize_rejects_overflowing_grace_period() {
        let template = PlayReadyLicenseResponseTemplate::single(
            PlayReadyLicenseTemplate::new().grace_period(Duration::from_secs(300)),
        );
        let xml = template.serialize().unwrap().replace(
            "<GracePeriod>PT5M</GracePeriod>",
            "<GracePeriod>P999999999999999999D</GracePeriod>",
        );
        assert!(xml.contains("P999999999999999999D"));

        assert!(matches!(
            PlayReadyLicenseResponseTemplate::deserialize(&xml),
            Err(TemplateSerializationError::InvalidValue { .. })
        ));
    }
}
