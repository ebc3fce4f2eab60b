//! Signed test tokens for token restrictions
//!
//! Production tokens come from a secure token service. These helpers mint
//! and check tokens in exactly the formats the license server verifies, so a
//! restriction can be exercised end to end without one:
//!
//! - JWT: compact `header.payload.signature`, HS256 over the first two parts
//! - SWT: form-encoded claims followed by `Audience`, `ExpiresOn` and
//!   `Issuer`, then `&HMACSHA256=` and the url-encoded base64 signature

use super::{
    SymmetricVerificationKey, TokenBuildError, TokenRestrictionTemplate, TokenType,
    TokenValidationError, CONTENT_KEY_IDENTIFIER_CLAIM_TYPE,
};
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use std::collections::BTreeMap;
use url::form_urlencoded;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const JWT_ALGORITHM: &str = "HS256";
const SWT_SIGNATURE_PREFIX: &str = "&HMACSHA256=";

/// Claims recovered from a validated token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub issuer: String,
    pub audience: String,
    pub expires_on: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
    /// Every non-registered claim, keyed by claim type
    pub claims: BTreeMap<String, String>,
}

impl TokenClaims {
    /// Content key the token is bound to, if it carries the identifier claim
    pub fn content_key_id(&self) -> Option<Uuid> {
        self.claims
            .get(CONTENT_KEY_IDENTIFIER_CLAIM_TYPE)
            .and_then(|value| Uuid::parse_str(value).ok())
    }
}

/// Builder for a signed test token
#[derive(Debug, Clone)]
pub struct TestToken<'a> {
    template: &'a TokenRestrictionTemplate,
    expires_on: DateTime<Utc>,
    content_key_id: Option<Uuid>,
    not_before: Option<DateTime<Utc>>,
    signing_key: Option<&'a SymmetricVerificationKey>,
}

impl<'a> TestToken<'a> {
    pub fn for_template(
        template: &'a TokenRestrictionTemplate,
        expires_on: DateTime<Utc>,
    ) -> Self {
        Self {
            template,
            expires_on,
            content_key_id: None,
            not_before: None,
            signing_key: None,
        }
    }

    #[must_use]
    pub fn content_key_id(mut self, key_id: Uuid) -> Self {
        self.content_key_id = Some(key_id);
        self
    }

    #[must_use]
    pub fn not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    /// Sign with this key instead of the template's primary key, e.g. to
    /// exercise an alternate key during rollover
    #[must_use]
    pub fn signing_key(mut self, key: &'a SymmetricVerificationKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn sign(self) -> Result<String, TokenBuildError> {
        let now = Utc::now();
        if self.expires_on <= now {
            return Err(TokenBuildError::ExpiryNotInFuture {
                expires_on: self.expires_on,
            });
        }
        if let Some(not_before) = self.not_before {
            if not_before > self.expires_on {
                return Err(TokenBuildError::InvalidValidityWindow {
                    not_before,
                    expires_on: self.expires_on,
                });
            }
        }

        let key = self
            .signing_key
            .or(self.template.primary_verification_key.as_ref())
            .ok_or(TokenBuildError::MissingSigningKey)?;
        let claims = self.claim_values()?;

        let token = match self.template.token_type {
            TokenType::Jwt => self.sign_jwt(key, &claims)?,
            TokenType::Swt => self.sign_swt(key, &claims),
        };

        tracing::info!(
            token_type = %self.template.token_type,
            issuer = %self.template.issuer,
            expires_on = %self.expires_on,
            content_key_id = ?self.content_key_id,
            "generated test token"
        );
        Ok(token)
    }

    /// Values for every required claim, in template order
    fn claim_values(&self) -> Result<Vec<(String, String)>, TokenBuildError> {
        self.template
            .required_claims
            .iter()
            .map(|claim| {
                let value = if claim.is_content_key_identifier() {
                    self.content_key_id
                        .ok_or(TokenBuildError::MissingContentKeyId)?
                        .to_string()
                } else {
                    claim.claim_value.clone().ok_or_else(|| {
                        TokenBuildError::MissingClaimValue(claim.claim_type.clone())
                    })?
                };
                Ok((claim.claim_type.clone(), value))
            })
            .collect()
    }

    fn sign_jwt(
        &self,
        key: &SymmetricVerificationKey,
        claims: &[(String, String)],
    ) -> Result<String, TokenBuildError> {
        let header = json!({
            "alg": JWT_ALGORITHM,
            "typ": "JWT"
        });

        let mut payload = Map::new();
        for (claim_type, value) in claims {
            payload.insert(claim_type.clone(), Value::String(value.clone()));
        }
        payload.insert("iss".to_string(), json!(self.template.issuer));
        payload.insert("aud".to_string(), json!(self.template.audience));
        payload.insert("exp".to_string(), json!(self.expires_on.timestamp()));
        if let Some(not_before) = self.not_before {
            payload.insert("nbf".to_string(), json!(not_before.timestamp()));
        }

        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Value::Object(payload))?);
        let signing_input = format!("{}.{}", header_b64, payload_b64);
        let signature = hmac_sha256(key, signing_input.as_bytes());

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn sign_swt(&self, key: &SymmetricVerificationKey, claims: &[(String, String)]) -> String {
        if self.not_before.is_some() {
            tracing::warn!("SWT tokens carry no not-before time; ignoring it");
        }

        let mut unsigned = String::new();
        for (claim_type, value) in claims {
            unsigned.push_str(&format!("{}={}&", url_encode(claim_type), url_encode(value)));
        }
        unsigned.push_str(&format!("Audience={}&", url_encode(&self.template.audience)));
        unsigned.push_str(&format!("ExpiresOn={}&", self.expires_on.timestamp()));
        unsigned.push_str(&format!("Issuer={}", url_encode(&self.template.issuer)));

        let signature = BASE64.encode(hmac_sha256(key, unsigned.as_bytes()));
        format!("{}{}{}", unsigned, SWT_SIGNATURE_PREFIX, url_encode(&signature))
    }
}

/// Generate a token for `template` that expires at `expires_on`
///
/// `content_key_id` is required when the template demands the content key
/// identifier claim.
pub fn generate_test_token(
    template: &TokenRestrictionTemplate,
    content_key_id: Option<Uuid>,
    expires_on: DateTime<Utc>,
) -> Result<String, TokenBuildError> {
    let token = TestToken::for_template(template, expires_on);
    match content_key_id {
        Some(key_id) => token.content_key_id(key_id).sign(),
        None => token.sign(),
    }
}

/// Check a token the way the license server would at time `now`
///
/// The signature may come from the primary or any alternate verification key.
/// With `content_key_id` set, the token must carry the content key identifier
/// claim for exactly that key. Without it, any well-formed key id is accepted.
pub fn validate_test_token(
    template: &TokenRestrictionTemplate,
    token: &str,
    content_key_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<TokenClaims, TokenValidationError> {
    if template.verification_keys().next().is_none() {
        return Err(TokenValidationError::NoVerificationKey);
    }

    let claims = match template.token_type {
        TokenType::Jwt => parse_jwt(template, token)?,
        TokenType::Swt => parse_swt(template, token)?,
    };

    if claims.issuer != template.issuer {
        return Err(TokenValidationError::IssuerMismatch {
            expected: template.issuer.clone(),
            found: claims.issuer,
        });
    }
    if claims.audience != template.audience {
        return Err(TokenValidationError::AudienceMismatch {
            expected: template.audience.clone(),
            found: claims.audience,
        });
    }
    if now >= claims.expires_on {
        return Err(TokenValidationError::Expired {
            expired_at: claims.expires_on,
        });
    }
    if let Some(not_before) = claims.not_before {
        if now < not_before {
            return Err(TokenValidationError::NotYetValid { not_before });
        }
    }

    for required in &template.required_claims {
        let found = claims
            .claims
            .get(&required.claim_type)
            .ok_or_else(|| TokenValidationError::MissingClaim(required.claim_type.clone()))?;
        if required.is_content_key_identifier() {
            if Uuid::parse_str(found).is_err() {
                return Err(TokenValidationError::Malformed(format!(
                    "content key identifier '{}' is not a UUID",
                    found
                )));
            }
        } else if let Some(expected) = &required.claim_value {
            if found != expected {
                return Err(TokenValidationError::ClaimMismatch {
                    claim: required.claim_type.clone(),
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
    }

    if let Some(expected) = content_key_id {
        let found = claims
            .claims
            .get(CONTENT_KEY_IDENTIFIER_CLAIM_TYPE)
            .ok_or_else(|| {
                TokenValidationError::MissingClaim(CONTENT_KEY_IDENTIFIER_CLAIM_TYPE.to_string())
            })?;
        if Uuid::parse_str(found).ok() != Some(expected) {
            return Err(TokenValidationError::ClaimMismatch {
                claim: CONTENT_KEY_IDENTIFIER_CLAIM_TYPE.to_string(),
                expected: expected.to_string(),
                found: found.clone(),
            });
        }
    }

    tracing::debug!(
        token_type = %template.token_type,
        expires_on = %claims.expires_on,
        content_key_id = ?content_key_id,
        "test token validated"
    );
    Ok(claims)
}

fn parse_jwt(
    template: &TokenRestrictionTemplate,
    token: &str,
) -> Result<TokenClaims, TokenValidationError> {
    let mut parts = token.split('.');
    let segments = (parts.next(), parts.next(), parts.next(), parts.next());
    let (header_b64, payload_b64, signature_b64) = match segments {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => {
            return Err(TokenValidationError::Malformed(
                "expected three dot-separated segments".to_string(),
            ))
        }
    };

    let header: Value = decode_segment(header_b64)?;
    let algorithm = header.get("alg").and_then(Value::as_str).unwrap_or_default();
    if algorithm != JWT_ALGORITHM {
        return Err(TokenValidationError::UnsupportedAlgorithm(algorithm.to_string()));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| TokenValidationError::Malformed(format!("signature: {}", e)))?;
    let signing_input = format!("{}.{}", header_b64, payload_b64);
    verify_signature(template, signing_input.as_bytes(), &signature)?;

    let payload: Map<String, Value> = decode_segment(payload_b64)?;
    let mut claims = BTreeMap::new();
    let mut issuer = None;
    let mut audience = None;
    let mut expires_on = None;
    let mut not_before = None;

    for (name, value) in payload {
        match name.as_str() {
            "iss" => issuer = value.as_str().map(str::to_string),
            "aud" => audience = value.as_str().map(str::to_string),
            "exp" => expires_on = Some(timestamp_value("exp", &value)?),
            "nbf" => not_before = Some(timestamp_value("nbf", &value)?),
            _ => {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                claims.insert(name, text);
            }
        }
    }

    Ok(TokenClaims {
        issuer: issuer.ok_or_else(|| missing("iss"))?,
        audience: audience.ok_or_else(|| missing("aud"))?,
        expires_on: expires_on.ok_or_else(|| missing("exp"))?,
        not_before,
        claims,
    })
}

fn parse_swt(
    template: &TokenRestrictionTemplate,
    token: &str,
) -> Result<TokenClaims, TokenValidationError> {
    let (unsigned, encoded_signature) =
        token.rsplit_once(SWT_SIGNATURE_PREFIX).ok_or_else(|| {
            TokenValidationError::Malformed("missing HMACSHA256 signature".to_string())
        })?;

    let signature_b64: String =
        form_urlencoded::parse(format!("s={}", encoded_signature).as_bytes())
            .map(|(_, value)| value.into_owned())
            .next()
            .unwrap_or_default();
    let signature = BASE64
        .decode(signature_b64)
        .map_err(|e| TokenValidationError::Malformed(format!("signature: {}", e)))?;
    verify_signature(template, unsigned.as_bytes(), &signature)?;

    let mut claims = BTreeMap::new();
    let mut issuer = None;
    let mut audience = None;
    let mut expires_on = None;

    for (name, value) in form_urlencoded::parse(unsigned.as_bytes()) {
        match name.as_ref() {
            "Issuer" => issuer = Some(value.into_owned()),
            "Audience" => audience = Some(value.into_owned()),
            "ExpiresOn" => {
                let secs = value.parse::<i64>().map_err(|_| {
                    TokenValidationError::Malformed(format!(
                        "ExpiresOn '{}' is not a timestamp",
                        value
                    ))
                })?;
                expires_on = Some(from_unix("ExpiresOn", secs)?);
            }
            _ => {
                claims.insert(name.into_owned(), value.into_owned());
            }
        }
    }

    Ok(TokenClaims {
        issuer: issuer.ok_or_else(|| missing("Issuer"))?,
        audience: audience.ok_or_else(|| missing("Audience"))?,
        expires_on: expires_on.ok_or_else(|| missing("ExpiresOn"))?,
        not_before: None,
        claims,
    })
}

/// Accept the signature if any verification key produced it
fn verify_signature(
    template: &TokenRestrictionTemplate,
    message: &[u8],
    signature: &[u8],
) -> Result<(), TokenValidationError> {
    let matched = template.verification_keys().any(|key| {
        HmacSha256::new_from_slice(key.as_bytes())
            .map(|mut mac| {
                mac.update(message);
                mac.verify_slice(signature).is_ok()
            })
            .unwrap_or(false)
    });
    if matched {
        Ok(())
    } else {
        Err(TokenValidationError::SignatureMismatch)
    }
}

fn hmac_sha256(key: &SymmetricVerificationKey, message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn missing(claim: &str) -> TokenValidationError {
    TokenValidationError::MissingClaim(claim.to_string())
}

fn url_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn decode_segment<T: serde::de::DeserializeOwned>(
    segment: &str,
) -> Result<T, TokenValidationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenValidationError::Malformed(e.to_string()))
}

fn timestamp_value(field: &str, value: &Value) -> Result<DateTime<Utc>, TokenValidationError> {
    let secs = value.as_i64().ok_or_else(|| {
        TokenValidationError::Malformed(format!("{} is not a numeric timestamp", field))
    })?;
    from_unix(field, secs)
}

fn from_unix(field: &str, secs: i64) -> Result<DateTime<Utc>, TokenValidationError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        TokenValidationError::Malformed(format!("{} {} is out of range", field, secs))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenClaim;
    use chrono::Duration;

    fn template(token_type: TokenType) -> TokenRestrictionTemplate {
        TokenRestrictionTemplate::builder(token_type)
            .issuer("https://sts.contoso.com")
            .audience("urn:contoso")
            .primary_verification_key(SymmetricVerificationKey::from_bytes(vec![9u8; 64]).unwrap())
            .required_claim(TokenClaim::content_key_identifier())
            .build()
            .unwrap()
    }

    fn key_id() -> Uuid {
        Uuid::parse_str("01234567-89ab-cdef-0123-456789abcdef").unwrap()
    }

    #[test]
    fn test_jwt_carries_key_id_and_expires() {
        let template = template(TokenType::Jwt);
        let expires_on = Utc::now() + Duration::hours(1);
        let token = generate_test_token(&template, Some(key_id()), expires_on).unwrap();

        assert_eq!(token.split('.').count(), 3);
        let claims = validate_test_token(&template, &token, Some(key_id()), Utc::now()).unwrap();
        assert_eq!(claims.content_key_id(), Some(key_id()));
        assert_eq!(claims.issuer, "https://sts.contoso.com");
        assert_eq!(claims.expires_on.timestamp(), expires_on.timestamp());

        let after = expires_on + Duration::seconds(1);
        assert!(matches!(
            validate_test_token(&template, &token, None, after),
            Err(TokenValidationError::Expired { .. })
        ));
    }

    #[test]
    fn test_swt_wire_format() {
        let template = template(TokenType::Swt);
        let expires_on = DateTime::from_timestamp(Utc::now().timestamp() + 3_600, 0).unwrap();
        let token = generate_test_token(&template, Some(key_id()), expires_on).unwrap();

        let expected_prefix = format!(
            "urn%3Amicrosoft%3Aazure%3Amediaservices%3Acontentkeyidentifier={}&Audience=urn%3Acontoso&ExpiresOn={}&Issuer=https%3A%2F%2Fsts.contoso.com&HMACSHA256=",
            key_id(),
            expires_on.timestamp()
        );
        assert!(token.starts_with(&expected_prefix), "{}", token);

        let claims = validate_test_token(&template, &token, None, Utc::now()).unwrap();
        assert_eq!(claims.content_key_id(), Some(key_id()));
        assert!(validate_test_token(&template, &token, None, expires_on).is_err());
    }

    #[test]
    fn test_missing_key_id_rejected() {
        let result = generate_test_token(
            &template(TokenType::Jwt),
            None,
            Utc::now() + Duration::hours(1),
        );
        assert!(matches!(result, Err(TokenBuildError::MissingContentKeyId)));
    }

    #[test]
    fn test_expiry_must_be_in_future() {
        let result = generate_test_token(
            &template(TokenType::Swt),
            Some(key_id()),
            Utc::now() - Duration::seconds(1),
        );
        assert!(matches!(
            result,
            Err(TokenBuildError::ExpiryNotInFuture { .. })
        ));
    }

    #[test]
    fn test_missing_signing_key() {
        let mut template = template(TokenType::Jwt);
        template.primary_verification_key = None;

        let result =
            generate_test_token(&template, Some(key_id()), Utc::now() + Duration::hours(1));
        assert!(matches!(result, Err(TokenBuildError::MissingSigningKey)));
        assert!(matches!(
            validate_test_token(&template, "a.b.c", None, Utc::now()),
            Err(TokenValidationError::NoVerificationKey)
        ));
    }

    #[test]
    fn test_alternate_key_accepted() {
        let alternate = SymmetricVerificationKey::from_bytes(vec![4u8; 32]).unwrap();
        let mut template = template(TokenType::Jwt);
        template.alternate_verification_keys.push(alternate.clone());

        let token = TestToken::for_template(&template, Utc::now() + Duration::hours(1))
            .content_key_id(key_id())
            .signing_key(&alternate)
            .sign()
            .unwrap();
        assert!(validate_test_token(&template, &token, None, Utc::now()).is_ok());

        let stranger = SymmetricVerificationKey::from_bytes(vec![5u8; 32]).unwrap();
        let forged = TestToken::for_template(&template, Utc::now() + Duration::hours(1))
            .content_key_id(key_id())
            .signing_key(&stranger)
            .sign()
            .unwrap();
        assert!(matches!(
            validate_test_token(&template, &forged, None, Utc::now()),
            Err(TokenValidationError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_not_before_window() {
        let template = template(TokenType::Jwt);
        let now = Utc::now();
        let token = TestToken::for_template(&template, now + Duration::hours(2))
            .content_key_id(key_id())
            .not_before(now + Duration::hours(1))
            .sign()
            .unwrap();

        assert!(matches!(
            validate_test_token(&template, &token, None, now),
            Err(TokenValidationError::NotYetValid { .. })
        ));
        assert!(validate_test_token(&template, &token, None, now + Duration::minutes(90)).is_ok());

        let inverted = TestToken::for_template(&template, now + Duration::hours(1))
            .content_key_id(key_id())
            .not_before(now + Duration::hours(2))
            .sign();
        assert!(matches!(
            inverted,
            Err(TokenBuildError::InvalidValidityWindow { .. })
        ));
    }

    #[test]
    fn test_fixed_value_claims() {
        let template = TokenRestrictionTemplate::builder(TokenType::Swt)
            .issuer("https://sts.contoso.com")
            .audience("urn:contoso")
            .primary_verification_key(SymmetricVerificationKey::from_bytes(vec![9u8; 64]).unwrap())
            .required_claim(TokenClaim::new("urn:contoso:tier", Some("gold plus".to_string())))
            .build()
            .unwrap();

        let token = generate_test_token(&template, None, Utc::now() + Duration::hours(1)).unwrap();
        assert!(token.starts_with("urn%3Acontoso%3Atier=gold+plus&"));
        let claims = validate_test_token(&template, &token, None, Utc::now()).unwrap();
        assert_eq!(claims.claims.get("urn:contoso:tier").map(String::as_str), Some("gold plus"));
        assert_eq!(claims.content_key_id(), None);

        let mut stricter = template.clone();
        stricter.required_claims[0].claim_value = Some("platinum".to_string());
        assert!(matches!(
            validate_test_token(&stricter, &token, None, Utc::now()),
            Err(TokenValidationError::ClaimMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_jwt_rejected() {
        let template = template(TokenType::Jwt);
        let token =
            generate_test_token(&template, Some(key_id()), Utc::now() + Duration::hours(1))
                .unwrap();
        let (signing_input, _) = token.rsplit_once('.').unwrap();
        let tampered = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode([0u8; 32]));

        assert!(matches!(
            validate_test_token(&template, &tampered, None, Utc::now()),
            Err(TokenValidationError::SignatureMismatch)
        ));
        assert!(matches!(
            validate_test_token(&template, "only.two", None, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_audience_mismatch() {
        let template = template(TokenType::Swt);
        let token =
            generate_test_token(&template, Some(key_id()), Utc::now() + Duration::hours(1))
                .unwrap();

        let mut other = template.clone();
        other.audience = "urn:fabrikam".to_string();
        assert!(matches!(
            validate_test_token(&other, &token, None, Utc::now()),
            Err(TokenValidationError::AudienceMismatch { .. })
        ));
    }

    #[test]
    fn test_token_bound_to_its_content_key() {
        let other_key = Uuid::parse_str("fedcba98-7654-3210-fedc-ba9876543210").unwrap();
        for token_type in [TokenType::Jwt, TokenType::Swt] {
            let template = template(token_type);
            let token =
                generate_test_token(&template, Some(key_id()), Utc::now() + Duration::hours(1))
                    .unwrap();

            assert!(validate_test_token(&template, &token, Some(key_id()), Utc::now()).is_ok());
            assert!(matches!(
                validate_test_token(&template, &token, Some(other_key), Utc::now()),
                Err(TokenValidationError::ClaimMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_expected_key_id_requires_claim() {
        let template = TokenRestrictionTemplate::builder(TokenType::Jwt)
            .issuer("https://sts.contoso.com")
            .audience("urn:contoso")
            .primary_verification_key(SymmetricVerificationKey::from_bytes(vec![9u8; 64]).unwrap())
            .required_claim(TokenClaim::new("urn:contoso:tier", Some("gold".to_string())))
            .build()
            .unwrap();
        let token = generate_test_token(&template, None, Utc::now() + Duration::hours(1)).unwrap();

        assert!(matches!(
            validate_test_token(&template, &token, Some(key_id()), Utc::now()),
            Err(TokenValidationError::MissingClaim(_))
        ));
    }
}
