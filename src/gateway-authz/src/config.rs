//! Authorizer configuration
//!
//! Read once at process start. A missing required value is a [`ConfigError`]
//! and the server refuses to start.

use crate::error::ConfigError;
use std::time::Duration;

/// Required environment variables
pub const REQUIRED_VARS: [&str; 5] = [
    "AWS_REGION",
    "USER_POOL_ID",
    "CLIENT_ID",
    "POLICY_STORE_ID",
    "POLICY_ENGINE_ENDPOINT",
];

/// Default prefix of custom identity attributes
pub const DEFAULT_CUSTOM_ATTRIBUTE_PREFIX: &str = "custom:";

/// Default claim carrying the principal identifier
pub const DEFAULT_PRINCIPAL_CLAIM: &str = "cognito:username";

/// Default claim carrying group membership
pub const DEFAULT_GROUPS_CLAIM: &str = "cognito:groups";

/// Default entity namespace in the policy store schema
pub const DEFAULT_ENTITY_NAMESPACE: &str = "ExampleCo::Connectiv";

/// Fixed timeout for the JWKS fetch
pub const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Authorizer configuration
#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    /// Identity provider region
    pub region: String,

    /// Identity pool (domain) identifier
    pub user_pool_id: String,

    /// Expected audience (client identifier)
    pub client_id: String,

    /// Policy store identifier
    pub policy_store_id: String,

    /// Prefix marking custom attribute claims
    pub custom_attribute_prefix: String,

    /// Claim holding the principal identifier
    pub principal_claim: String,

    /// Claim holding the group list
    pub groups_claim: String,

    /// Namespace for User / Action / Resource entity types
    pub entity_namespace: String,

    /// Action requested from the policy store
    pub action_id: String,

    /// Resource requested from the policy store
    pub resource_id: String,

    /// Policy decision endpoint
    ///
    /// Requests are sent unsigned, so this must be a signing proxy or an
    /// endpoint that accepts unsigned `IsAuthorized` calls.
    pub policy_engine_endpoint: String,

    /// Deadline for the decision call
    pub policy_engine_timeout: Duration,
}

impl AuthorizerConfig {
    /// Create a configuration with defaults for every optional value
    pub fn new(
        region: impl Into<String>,
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
        policy_store_id: impl Into<String>,
        policy_engine_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            policy_store_id: policy_store_id.into(),
            custom_attribute_prefix: DEFAULT_CUSTOM_ATTRIBUTE_PREFIX.to_string(),
            principal_claim: DEFAULT_PRINCIPAL_CLAIM.to_string(),
            groups_claim: DEFAULT_GROUPS_CLAIM.to_string(),
            entity_namespace: DEFAULT_ENTITY_NAMESPACE.to_string(),
            action_id: "access".to_string(),
            resource_id: "my-resource".to_string(),
            policy_engine_endpoint: policy_engine_endpoint.into(),
            policy_engine_timeout: Duration::from_millis(5000),
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// All missing required keys are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.join(", ")));
        }

        let required = |key: &str| get(key).ok_or_else(|| ConfigError::Missing(key.to_string()));
        let mut config = Self::new(
            required("AWS_REGION")?,
            required("USER_POOL_ID")?,
            required("CLIENT_ID")?,
            required("POLICY_STORE_ID")?,
            required("POLICY_ENGINE_ENDPOINT")?,
        );

        if let Some(prefix) = get("CUSTOM_ATTRIBUTE_PREFIX") {
            config.custom_attribute_prefix = prefix;
        }
        if let Some(claim) = get("PRINCIPAL_CLAIM") {
            config.principal_claim = claim;
        }
        if let Some(claim) = get("GROUPS_CLAIM") {
            config.groups_claim = claim;
        }
        if let Some(namespace) = get("ENTITY_NAMESPACE") {
            config.entity_namespace = namespace;
        }
        if let Some(action) = get("AUTHZ_ACTION_ID") {
            config.action_id = action;
        }
        if let Some(resource) = get("AUTHZ_RESOURCE_ID") {
            config.resource_id = resource;
        }
        if let Some(raw) = get("POLICY_ENGINE_TIMEOUT_MS") {
            let millis: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                key: "POLICY_ENGINE_TIMEOUT_MS".to_string(),
                reason: format!("'{}' is not a number of milliseconds", raw),
            })?;
            if millis == 0 {
                return Err(ConfigError::Invalid {
                    key: "POLICY_ENGINE_TIMEOUT_MS".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.policy_engine_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Issuer expected in every accepted token
    pub fn expected_issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }

    /// Location of the published signing keys
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.expected_issuer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn required_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AWS_REGION", "eu-west-1"),
            ("USER_POOL_ID", "eu-west-1_abc123"),
            ("CLIENT_ID", "client-xyz"),
            ("POLICY_STORE_ID", "ps-1"),
            ("POLICY_ENGINE_ENDPOINT", "http://127.0.0.1:8181"),
        ]
    }

    #[test]
    fn test_defaults_and_derived_urls() {
        let config = AuthorizerConfig::from_lookup(lookup_from(&required_pairs())).unwrap();

        assert_eq!(config.custom_attribute_prefix, "custom:");
        assert_eq!(config.principal_claim, "cognito:username");
        assert_eq!(config.action_id, "access");
        assert_eq!(config.resource_id, "my-resource");
        assert_eq!(
            config.expected_issuer(),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_abc123"
        );
        assert_eq!(
            config.jwks_url(),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_abc123/.well-known/jwks.json"
        );
        assert_eq!(
            config.policy_engine_endpoint,
            "http://127.0.0.1:8181"
        );
        assert_eq!(config.policy_engine_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_required_values_reported_together() {
        let err = AuthorizerConfig::from_lookup(lookup_from(&[("AWS_REGION", "us-east-1")]))
            .unwrap_err();

        match err {
            ConfigError::Missing(keys) => {
                assert!(keys.contains("USER_POOL_ID"));
                assert!(keys.contains("CLIENT_ID"));
                assert!(keys.contains("POLICY_STORE_ID"));
                assert!(keys.contains("POLICY_ENGINE_ENDPOINT"));
                assert!(!keys.contains("AWS_REGION"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut pairs = required_pairs();
        pairs[2] = ("CLIENT_ID", "   ");

        let err = AuthorizerConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "CLIENT_ID"));
    }

    #[test]
    fn test_optional_overrides() {
        let mut pairs = required_pairs();
        pairs.push(("CUSTOM_ATTRIBUTE_PREFIX", "ext:"));
        pairs.push(("POLICY_ENGINE_TIMEOUT_MS", "250"));
        pairs.push(("AUTHZ_ACTION_ID", "read"));

        let config = AuthorizerConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.custom_attribute_prefix, "ext:");
        assert_eq!(config.policy_engine_timeout, Duration::from_millis(250));
        assert_eq!(config.action_id, "read");
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let mut pairs = required_pairs();
        pairs.push(("POLICY_ENGINE_TIMEOUT_MS", "soon"));

        let err = AuthorizerConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "POLICY_ENGINE_TIMEOUT_MS"));
    }

    #[test]
    fn test_policy_engine_endpoint_has_no_default() {
        let pairs: Vec<_> = required_pairs()
            .into_iter()
            .filter(|(key, _)| *key != "POLICY_ENGINE_ENDPOINT")
            .collect();

        let err = AuthorizerConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "POLICY_ENGINE_ENDPOINT"));
    }

    #[test]
    fn test_values_are_trimmed() {
        let mut pairs = required_pairs();
        pairs[0] = ("AWS_REGION", " eu-west-1\n");
        pairs[1] = ("USER_POOL_ID", "eu-west-1_abc123 ");
        pairs.push(("CUSTOM_ATTRIBUTE_PREFIX", " ext: "));

        let config = AuthorizerConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(
            config.expected_issuer(),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_abc123"
        );
        assert_eq!(config.custom_attribute_prefix, "ext:");
    }
}
