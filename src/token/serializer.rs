use super::{SymmetricVerificationKey, TokenClaim, TokenRestrictionTemplate, TokenType};
use crate::template::TemplateSerializationError;
use crate::xml::{invalid_value, XmlBuilder, XmlElement, XSI_NS};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

pub const TOKEN_RESTRICTION_TEMPLATE_NS: &str =
    "http://schemas.microsoft.com/Azure/MediaServices/KeyDelivery/TokenRestrictionTemplate/v1";

const SYMMETRIC_KEY_TYPE: &str = "SymmetricVerificationKey";

impl TokenRestrictionTemplate {
    /// Serialize to the key delivery service's restriction requirements XML
    pub fn serialize(&self) -> Result<String, TemplateSerializationError> {
        self.validate()
            .map_err(|e| TemplateSerializationError::Inconsistent(e.to_string()))?;

        let mut xml = XmlBuilder::new();
        xml.open(
            "TokenRestrictionTemplate",
            &[("xmlns:i", XSI_NS), ("xmlns", TOKEN_RESTRICTION_TEMPLATE_NS)],
        );

        if self.alternate_verification_keys.is_empty() {
            xml.empty("AlternateVerificationKeys", &[]);
        } else {
            xml.open("AlternateVerificationKeys", &[]);
            for key in &self.alternate_verification_keys {
                write_key(&mut xml, "TokenVerificationKey", key);
            }
            xml.close("AlternateVerificationKeys");
        }

        xml.text("Audience", &self.audience);
        xml.text("Issuer", &self.issuer);

        match &self.primary_verification_key {
            Some(key) => write_key(&mut xml, "PrimaryVerificationKey", key),
            None => {
                xml.nil("PrimaryVerificationKey");
            }
        }

        xml.open("RequiredClaims", &[]);
        for claim in &self.required_claims {
            xml.open("TokenClaim", &[]);
            xml.text("ClaimType", &claim.claim_type);
            match &claim.claim_value {
                Some(value) => xml.text("ClaimValue", value),
                None => xml.nil("ClaimValue"),
            };
            xml.close("TokenClaim");
        }
        xml.close("RequiredClaims");

        xml.text("TokenType", self.token_type.as_str());
        xml.close("TokenRestrictionTemplate");
        Ok(xml.finish())
    }

    /// Parse restriction requirements XML
    pub fn deserialize(xml: &str) -> Result<Self, TemplateSerializationError> {
        let root = XmlElement::parse(xml)?;
        root.expect_name("TokenRestrictionTemplate")?;

        let alternate_verification_keys = match root.child("AlternateVerificationKeys") {
            Some(keys) => keys
                .children_named("TokenVerificationKey")
                .map(read_key)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let primary_verification_key = root
            .child("PrimaryVerificationKey")
            .map(read_key)
            .transpose()?;

        let required_claims = root
            .require_child("RequiredClaims")?
            .children_named("TokenClaim")
            .map(|claim| {
                Ok(TokenClaim {
                    claim_type: claim.require_text("ClaimType")?.to_string(),
                    claim_value: claim.child_text("ClaimValue").map(str::to_string),
                })
            })
            .collect::<Result<Vec<_>, TemplateSerializationError>>()?;

        let token_type_text = root.require_value("TokenType")?;
        let token_type = TokenType::parse(token_type_text)
            .ok_or_else(|| invalid_value("TokenType", token_type_text))?;

        let template = Self {
            token_type,
            issuer: root.require_text("Issuer")?.to_string(),
            audience: root.require_text("Audience")?.to_string(),
            primary_verification_key,
            alternate_verification_keys,
            required_claims,
        };
        template
            .validate()
            .map_err(|e| TemplateSerializationError::Inconsistent(e.to_string()))?;
        Ok(template)
    }
}

fn write_key(xml: &mut XmlBuilder, name: &str, key: &SymmetricVerificationKey) {
    xml.open(name, &[("i:type", SYMMETRIC_KEY_TYPE)]);
    xml.text("KeyValue", &BASE64.encode(key.as_bytes()));
    xml.close(name);
}

fn read_key(element: &XmlElement) -> Result<SymmetricVerificationKey, TemplateSerializationError> {
    match element.attribute("type") {
        Some(SYMMETRIC_KEY_TYPE) => {}
        other => return Err(invalid_value(&element.name, other.unwrap_or(""))),
    }
    let text = element.require_value("KeyValue")?;
    let bytes = BASE64
        .decode(text)
        .map_err(|_| invalid_value("KeyValue", text))?;
    SymmetricVerificationKey::from_bytes(bytes).map_err(|_| invalid_value("KeyValue", text))
}
