//! Policy decision client
//!
//! Submits an [`AuthorizationQuery`] to the external policy decision service
//! and folds every outcome other than an explicit Allow into Deny.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::AuthorizerConfig;
use crate::error::{ConfigError, PolicyEngineError};
use crate::query::AuthorizationQuery;
use crate::types::Decision;

/// Verdict reported by the policy decision service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineVerdict {
    Allow,
    Deny,
}

impl EngineVerdict {
    /// Parse the service's decision string
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ALLOW" => Some(EngineVerdict::Allow),
            "DENY" => Some(EngineVerdict::Deny),
            _ => None,
        }
    }
}

/// External attribute-based policy decision service
#[async_trait]
pub trait PolicyDecisionService: Send + Sync {
    /// Evaluate one query
    async fn is_authorized(
        &self,
        query: &AuthorizationQuery,
    ) -> Result<EngineVerdict, PolicyEngineError>;
}

/// JSON-over-HTTP `IsAuthorized` client
///
/// Sends the AWS JSON 1.0 request shape without signing it. The endpoint is
/// expected to be a signing proxy or a compatible decision service.
pub struct HttpPolicyDecisionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPolicyDecisionService {
    pub const TARGET: &'static str = "VerifiedPermissions.IsAuthorized";
    pub const CONTENT_TYPE: &'static str = "application/x-amz-json-1.0";

    pub fn new(endpoint: impl Into<String>) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "policy_engine_client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &AuthorizerConfig) -> Result<Self, ConfigError> {
        Self::new(config.policy_engine_endpoint.clone())
    }
}

#[async_trait]
impl PolicyDecisionService for HttpPolicyDecisionService {
    async fn is_authorized(
        &self,
        query: &AuthorizationQuery,
    ) -> Result<EngineVerdict, PolicyEngineError> {
        let payload = serde_json::to_vec(query)
            .map_err(|e| PolicyEngineError::Unexpected(format!("query serialization: {}", e)))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, Self::CONTENT_TYPE)
            .header("X-Amz-Target", Self::TARGET)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let header_code = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let body = response.bytes().await?;

        if !status.is_success() {
            let parsed: Option<Value> = serde_json::from_slice(&body).ok();
            let body_code = parsed
                .as_ref()
                .and_then(|v| v.get("__type"))
                .and_then(Value::as_str)
                .map(|t| t.rsplit('#').next().unwrap_or(t).to_string());
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("message").or_else(|| v.get("Message")))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();

            return Err(PolicyEngineError::Service {
                code: header_code
                    .or(body_code)
                    .unwrap_or_else(|| format!("HTTP{}", status.as_u16())),
                message,
            });
        }

        parse_verdict(&body)
    }
}

/// Extract the verdict from an `IsAuthorized` response body
pub fn parse_verdict(body: &[u8]) -> Result<EngineVerdict, PolicyEngineError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PolicyEngineError::MalformedResponse(e.to_string()))?;

    let raw = value
        .get("decision")
        .and_then(Value::as_str)
        .ok_or_else(|| PolicyEngineError::MalformedResponse("missing 'decision'".to_string()))?;

    EngineVerdict::parse(raw)
        .ok_or_else(|| PolicyEngineError::MalformedResponse(format!("unknown decision '{}'", raw)))
}

/// Fail-closed wrapper around a [`PolicyDecisionService`]
#[derive(Clone)]
pub struct PolicyDecisionClient {
    service: Arc<dyn PolicyDecisionService>,
    timeout: Duration,
}

impl PolicyDecisionClient {
    pub fn new(service: Arc<dyn PolicyDecisionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Call the service under the deadline
    ///
    /// A panic inside the service is reported as an error, not propagated.
    pub async fn evaluate(
        &self,
        query: &AuthorizationQuery,
    ) -> Result<EngineVerdict, PolicyEngineError> {
        let call = AssertUnwindSafe(self.service.is_authorized(query)).catch_unwind();

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PolicyEngineError::Unexpected(
                "policy decision service panicked".to_string(),
            )),
            Err(_) => Err(PolicyEngineError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Allow only on an explicit Allow verdict
    pub async fn decide(&self, query: &AuthorizationQuery) -> Decision {
        fail_closed(&self.evaluate(query).await)
    }
}

/// Map a service outcome to a decision, logging failures
pub fn fail_closed(outcome: &Result<EngineVerdict, PolicyEngineError>) -> Decision {
    match outcome {
        Ok(EngineVerdict::Allow) => {
            debug!("Policy engine verdict: ALLOW");
            Decision::Allow
        }
        Ok(EngineVerdict::Deny) => {
            debug!("Policy engine verdict: DENY");
            Decision::Deny
        }
        Err(e) => {
            error!(kind = e.kind(), code = e.code(), error = %e, "Policy engine evaluation error");
            Decision::Deny
        }
    }
}
