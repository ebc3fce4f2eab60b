//! Property-based tests for checksums, templates and test tokens.

use chrono::{DateTime, Duration as TimeDelta, Utc};
use content_key_policy::protection::{checksum, verify_checksum};
use content_key_policy::template::{
    AllowedTrackTypes, ContentKeySource, ContentKeySpecs, Hdcp, PlayReadyLicenseResponseTemplate,
    PlayReadyLicenseTemplate, PlayReadyLicenseType, PlayReadyPlayRight, PolicyOverrides,
    ScmsRestriction, UnknownOutputPassingOption, WidevineMessage,
};
use content_key_policy::token::{
    generate_test_token, validate_test_token, SymmetricVerificationKey, TokenClaim,
    TokenRestrictionTemplate, TokenType,
};
use content_key_policy::ContentKeyMaterial;
use proptest::prelude::*;
use std::time::Duration;
use uuid::Uuid;

fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Any printable text, including markup characters and surrounding whitespace.
/// Carriage returns are excluded since XML normalizes line endings.
fn xml_text() -> impl Strategy<Value = String> {
    "[ \t\n\\PC]{0,24}"
}

fn play_right_strategy() -> impl Strategy<Value = PlayReadyPlayRight> {
    (
        proptest::option::of(prop::sample::select(vec![100u32, 150, 200])),
        proptest::option::of(prop::sample::select(vec![400u32, 500])),
        proptest::option::of(0u8..=3),
        proptest::option::of(1u64..86_400),
        any::<bool>(),
        prop::sample::select(vec![
            UnknownOutputPassingOption::NotAllowed,
            UnknownOutputPassingOption::Allowed,
            UnknownOutputPassingOption::AllowedWithVideoConstriction,
        ]),
    )
        .prop_map(
            |(analog, compressed_video, scms, first_play, digital_only, unknown_output)| {
                PlayReadyPlayRight {
                    analog_video_opl: analog,
                    compressed_digital_video_opl: compressed_video,
                    scms_restriction: scms.map(|configuration_data| ScmsRestriction {
                        configuration_data,
                    }),
                    first_play_expiration: first_play.map(Duration::from_secs),
                    digital_video_only_content_restriction: digital_only,
                    allow_passing_video_content_to_unknown_output: unknown_output,
                    ..Default::default()
                }
            },
        )
}

fn license_strategy() -> impl Strategy<Value = PlayReadyLicenseTemplate> {
    (
        any::<bool>(),
        any::<bool>(),
        proptest::option::of(uuid_strategy()),
        proptest::option::of((1_600_000_000i64..1_900_000_000, 1i64..10_000_000)),
        proptest::option::of(1u64..1_000_000),
        play_right_strategy(),
    )
        .prop_map(
            |(persistent, test_devices, key_id, window, grace, play_right)| {
                let mut license = PlayReadyLicenseTemplate::new()
                    .license_type(if persistent {
                        PlayReadyLicenseType::Persistent
                    } else {
                        PlayReadyLicenseType::Nonpersistent
                    })
                    .allow_test_devices(test_devices)
                    .play_right(play_right);
                if let Some(key_id) = key_id {
                    license = license.content_key(ContentKeySource::FromKeyIdentifier(key_id));
                }
                if let Some((begin, length)) = window {
                    let begin = DateTime::from_timestamp(begin, 0).unwrap();
                    license = license.valid_window(begin, begin + TimeDelta::seconds(length));
                }
                if let Some(grace) = grace {
                    license = license.grace_period(Duration::from_secs(grace));
                }
                license
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Checksums depend only on the key and the key id.
    #[test]
    fn checksum_deterministic(key in any::<[u8; 16]>(), key_id in uuid_strategy()) {
        let material = ContentKeyMaterial::from_slice(&key).unwrap();
        let first = checksum(&material, key_id);
        let second = checksum(&ContentKeyMaterial::from_slice(&key).unwrap(), key_id);

        prop_assert_eq!(first.len(), 12);
        prop_assert_eq!(&first, &second);
        prop_assert!(verify_checksum(&material, key_id, &first).is_ok());
    }

    #[test]
    fn playready_round_trip(
        licenses in prop::collection::vec(license_strategy(), 1..4),
        custom_data in proptest::option::of(xml_text()),
    ) {
        let mut response = PlayReadyLicenseResponseTemplate {
            license_templates: licenses,
            response_custom_data: None,
        };
        if let Some(data) = custom_data {
            response = response.with_custom_data(data);
        }

        let xml = response.serialize().unwrap();
        let back = PlayReadyLicenseResponseTemplate::deserialize(&xml).unwrap();
        prop_assert_eq!(back, response);
    }

    #[test]
    fn widevine_round_trip(
        sd_only in any::<bool>(),
        specs in prop::collection::vec(
            ("[A-Z]{2,5}", proptest::option::of(1u8..=5), any::<bool>()),
            0..4,
        ),
        can_renew in any::<bool>(),
        license_duration in proptest::option::of(0u64..10_000_000),
    ) {
        let mut message = WidevineMessage::new(if sd_only {
            AllowedTrackTypes::SdOnly
        } else {
            AllowedTrackTypes::SdHd
        });
        for (track_type, level, hdcp) in specs {
            let mut spec = ContentKeySpecs::new(track_type);
            if let Some(level) = level {
                spec = spec.security_level(level);
            }
            if hdcp {
                spec = spec.hdcp(Hdcp::V1);
            }
            message = message.key_spec(spec);
        }
        message = message.policy_overrides(PolicyOverrides {
            can_renew,
            license_duration_seconds: license_duration,
            ..Default::default()
        });

        let back = WidevineMessage::deserialize(&message.serialize().unwrap()).unwrap();
        prop_assert_eq!(back, message);
    }

    #[test]
    fn token_template_round_trip(
        swt in any::<bool>(),
        primary in prop::collection::vec(any::<u8>(), 1..96),
        alternates in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..3),
        extra_claims in prop::collection::vec(
            ("urn:[a-z]{1,10}", proptest::option::of(xml_text())),
            0..3,
        ),
    ) {
        let token_type = if swt { TokenType::Swt } else { TokenType::Jwt };
        let mut builder = TokenRestrictionTemplate::builder(token_type)
            .issuer("https://sts.contoso.com")
            .audience("urn:contoso")
            .primary_verification_key(SymmetricVerificationKey::from_bytes(primary).unwrap())
            .required_claim(TokenClaim::content_key_identifier());
        for alternate in alternates {
            let alternate = SymmetricVerificationKey::from_bytes(alternate).unwrap();
            builder = builder.alternate_verification_key(alternate);
        }
        for (claim_type, value) in extra_claims {
            builder = builder.required_claim(TokenClaim::new(claim_type, value));
        }
        let template = builder.build().unwrap();

        let back = TokenRestrictionTemplate::deserialize(&template.serialize().unwrap()).unwrap();
        prop_assert_eq!(back, template);
    }

    /// A generated token carries the key id and is valid until it expires.
    #[test]
    fn test_token_binds_key_id(
        swt in any::<bool>(),
        key in prop::collection::vec(any::<u8>(), 1..96),
        key_id in uuid_strategy(),
        lifetime in 60i64..(400 * 86_400),
    ) {
        let template = TokenRestrictionTemplate::new(
            if swt { TokenType::Swt } else { TokenType::Jwt },
            "https://sts.contoso.com",
            "urn:contoso",
            SymmetricVerificationKey::from_bytes(key).unwrap(),
            [TokenClaim::content_key_identifier()],
        )
        .unwrap();

        let now = Utc::now();
        let expires_on = now + TimeDelta::seconds(lifetime);
        let token = generate_test_token(&template, Some(key_id), expires_on).unwrap();

        let claims = validate_test_token(&template, &token, Some(key_id), now).unwrap();
        prop_assert_eq!(claims.content_key_id(), Some(key_id));
        prop_assert!(validate_test_token(&template, &token, Some(key_id), expires_on).is_err());

        let other_key = Uuid::from_u128(key_id.as_u128().wrapping_add(1));
        prop_assert!(validate_test_token(&template, &token, Some(other_key), now).is_err());
    }
}
