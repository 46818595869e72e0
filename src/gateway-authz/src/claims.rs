//! Claims validation and identity attribute extraction

use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::AuthorizerConfig;
use crate::error::ClaimsError;
use crate::types::{TokenClaims, UNKNOWN_GROUP, UNKNOWN_PRINCIPAL};

/// Expected audience and issuer for accepted tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsExpectations {
    pub audience: String,
    pub issuer: String,
}

impl ClaimsExpectations {
    pub fn new(audience: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &AuthorizerConfig) -> Self {
        Self::new(config.client_id.clone(), config.expected_issuer())
    }
}

/// Check `aud` and `iss` by exact string equality
pub fn validate_claims(
    claims: &TokenClaims,
    expected: &ClaimsExpectations,
) -> Result<(), ClaimsError> {
    if claims.audience() != Some(expected.audience.as_str()) {
        return Err(ClaimsError::AudienceMismatch);
    }

    if claims.issuer() != Some(expected.issuer.as_str()) {
        return Err(ClaimsError::IssuerMismatch);
    }

    Ok(())
}

/// Identity attributes pulled out of validated claims
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalIdentity {
    /// Principal identifier, `unknown` when the claim is absent
    pub principal_id: String,

    /// First group of the membership claim, `Unknown` when there is none
    pub group: String,

    /// Custom attributes with the prefix stripped, values untouched
    pub custom_attributes: BTreeMap<String, Value>,
}

/// Names of the claims extraction reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimNames {
    pub principal: String,
    pub groups: String,
    pub custom_prefix: String,
}

impl ClaimNames {
    pub fn from_config(config: &AuthorizerConfig) -> Self {
        Self {
            principal: config.principal_claim.clone(),
            groups: config.groups_claim.clone(),
            custom_prefix: config.custom_attribute_prefix.clone(),
        }
    }
}

/// Extract principal, group and custom attributes
pub fn extract_identity(claims: &TokenClaims, names: &ClaimNames) -> PrincipalIdentity {
    let principal_id = claims
        .get_str(&names.principal)
        .unwrap_or(UNKNOWN_PRINCIPAL)
        .to_string();

    let group = first_group(claims.get(&names.groups))
        .unwrap_or(UNKNOWN_GROUP)
        .to_string();

    PrincipalIdentity {
        principal_id,
        group,
        custom_attributes: extract_custom_attributes(claims, &names.custom_prefix),
    }
}

/// All claims whose name starts with `prefix`, keyed by the remainder
pub fn extract_custom_attributes(claims: &TokenClaims, prefix: &str) -> BTreeMap<String, Value> {
    claims
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(prefix)
                .map(|key| (key.to_string(), value.clone()))
        })
        .collect()
}

fn first_group(claim: Option<&Value>) -> Option<&str> {
    match claim? {
        Value::Array(groups) => groups.first().and_then(Value::as_str),
        // Some providers flatten a single-element list
        Value::String(group) => Some(group.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn claims(value: Value) -> TokenClaims {
        serde_json::from_value(value).unwrap()
    }

    fn names() -> ClaimNames {
        ClaimNames {
            principal: "cognito:username".to_string(),
            groups: "cognito:groups".to_string(),
            custom_prefix: "custom:".to_string(),
        }
    }

    fn expectations() -> ClaimsExpectations {
        ClaimsExpectations::new("client-1", "https://cognito-idp.eu-west-1.amazonaws.com/pool")
    }

    #[test]
    fn test_matching_claims_pass() {
        let c = claims(json!({
            "aud": "client-1",
            "iss": "https://cognito-idp.eu-west-1.amazonaws.com/pool",
        }));
        assert!(validate_claims(&c, &expectations()).is_ok());
    }

    #[test]
    fn test_audience_mismatch() {
        for aud in [json!("client-2"), json!("client-1 "), json!(["client-1"]), Value::Null] {
            let c = claims(json!({
                "aud": aud,
                "iss": "https://cognito-idp.eu-west-1.amazonaws.com/pool",
            }));
            assert!(matches!(
                validate_claims(&c, &expectations()),
                Err(ClaimsError::AudienceMismatch)
            ));
        }
    }

    #[test]
    fn test_issuer_is_exact_match() {
        let c = claims(json!({
            "aud": "client-1",
            "iss": "https://cognito-idp.eu-west-1.amazonaws.com/pool/",
        }));
        assert!(matches!(
            validate_claims(&c, &expectations()),
            Err(ClaimsError::IssuerMismatch)
        ));

        let c = claims(json!({ "aud": "client-1" }));
        assert!(matches!(
            validate_claims(&c, &expectations()),
            Err(ClaimsError::IssuerMismatch)
        ));
    }

    #[test]
    fn test_extract_identity() {
        let c = claims(json!({
            "cognito:username": "alice",
            "cognito:groups": ["Admin", "Readers"],
            "custom:department": "finance",
            "custom:dataProductAccess": "sales",
            "email": "alice@example.com",
        }));

        let identity = extract_identity(&c, &names());
        assert_eq!(identity.principal_id, "alice");
        assert_eq!(identity.group, "Admin");
        assert_eq!(identity.custom_attributes.len(), 2);
        assert_eq!(identity.custom_attributes["department"], json!("finance"));
        assert_eq!(identity.custom_attributes["dataProductAccess"], json!("sales"));
    }

    #[test]
    fn test_fallbacks() {
        let identity = extract_identity(&claims(json!({})), &names());
        assert_eq!(identity.principal_id, UNKNOWN_PRINCIPAL);
        assert_eq!(identity.group, UNKNOWN_GROUP);
        assert!(identity.custom_attributes.is_empty());

        let identity = extract_identity(&claims(json!({ "cognito:groups": [] })), &names());
        assert_eq!(identity.group, UNKNOWN_GROUP);
    }

    #[test]
    fn test_non_string_values_pass_through() {
        let c = claims(json!({ "custom:level": 3, "custom:active": true }));
        let attrs = extract_custom_attributes(&c, "custom:");

        assert_eq!(attrs["level"], json!(3));
        assert_eq!(attrs["active"], json!(true));
    }

    #[test]
    fn test_prefix_only_stripped_at_start() {
        let c = claims(json!({ "x-custom:team": "a", "custom:custom:team": "b" }));
        let attrs = extract_custom_attributes(&c, "custom:");

        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["custom:team"], json!("b"));
    }

    proptest! {
        #[test]
        fn custom_attributes_strip_prefix_only(key in "[a-zA-Z][a-zA-Z0-9_]{0,20}", value in ".*") {
            let mut map = serde_json::Map::new();
            map.insert(format!("custom:{}", key), json!(value.clone()));
            let c = TokenClaims::new(map);
            let attrs = extract_custom_attributes(&c, "custom:");

            prop_assert_eq!(attrs.len(), 1);
            prop_assert_eq!(attrs.get(&key), Some(&json!(value)));
        }
    }
}
