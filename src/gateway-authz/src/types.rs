//! Core authorizer types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Principal used whenever identity extraction did not happen
pub const UNKNOWN_PRINCIPAL: &str = "unknown";

/// Group used when the token carries no group membership
pub const UNKNOWN_GROUP: &str = "Unknown";

/// Scheme marker stripped from incoming tokens
pub const BEARER_PREFIX: &str = "Bearer ";

/// Token authorizer event delivered by the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizerEvent {
    /// Event type (e.g. "TOKEN")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Raw authorization header value
    #[serde(rename = "authorizationToken", default)]
    pub authorization_token: Option<String>,

    /// Protected operation the caller wants to invoke
    #[serde(rename = "methodArn", default)]
    pub method_arn: Option<String>,
}

impl AuthorizerEvent {
    /// Create a token event
    pub fn new(token: impl Into<String>, method_arn: impl Into<String>) -> Self {
        Self {
            event_type: Some("TOKEN".to_string()),
            authorization_token: Some(token.into()),
            method_arn: Some(method_arn.into()),
        }
    }

    /// Bearer token with any scheme prefix removed
    pub fn bearer_token(&self) -> &str {
        let raw = self.authorization_token.as_deref().unwrap_or("");
        raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw)
    }

    /// Resource pattern for the policy statement
    pub fn resource_pattern(&self) -> &str {
        self.method_arn.as_deref().unwrap_or("*")
    }
}

/// Decoded payload of a verified token
///
/// Lives only for the duration of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    /// Wrap a claim map
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Raw claim value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Claim value when it is a JSON string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// `aud` claim when it is a single string
    pub fn audience(&self) -> Option<&str> {
        self.get_str("aud")
    }

    /// `iss` claim
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// Iterate over all claims
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for TokenClaims {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}

/// Authorization decision
///
/// There is no third state: anything short of an explicit Allow is Deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    /// Whether access is granted
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Gateway policy effect string
    pub fn as_effect(self) -> &'static str {
        match self {
            Decision::Allow => "Allow",
            Decision::Deny => "Deny",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_effect())
    }
}
