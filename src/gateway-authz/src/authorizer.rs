//! Authorization pipeline
//!
//! ```text
//! token → TokenValidator ─(KeySetCache)─▶ claims check → identity extraction
//!       → QueryBuilder → PolicyDecisionClient → generate_policy
//! ```
//!
//! Every stage error ends the evaluation with Deny. The caller always gets a
//! complete [`PolicyDocument`].

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::claims::{extract_identity, validate_claims, ClaimNames, ClaimsExpectations};
use crate::config::AuthorizerConfig;
use crate::decision::{
    fail_closed, HttpPolicyDecisionService, PolicyDecisionClient, PolicyDecisionService,
};
use crate::error::{AuthorizerError, ConfigError};
use crate::jwks::{HttpJwksSource, KeySetCache, KeySetSource};
use crate::metrics::{AuthorizerMetrics, FailureStage, MetricsCollector};
use crate::policy_document::{generate_policy, PolicyDocument};
use crate::query::QueryBuilder;
use crate::token::TokenValidator;
use crate::types::{AuthorizerEvent, Decision, UNKNOWN_PRINCIPAL};

/// Principal and decision reached by one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub principal_id: String,
    pub decision: Decision,
}

impl Evaluation {
    fn denied(principal_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            decision: Decision::Deny,
        }
    }
}

/// Gateway token authorizer
pub struct Authorizer {
    keys: Arc<KeySetCache>,
    validator: TokenValidator,
    expectations: ClaimsExpectations,
    claim_names: ClaimNames,
    query_builder: QueryBuilder,
    decisions: PolicyDecisionClient,
    action_id: String,
    resource_id: String,
    metrics: Arc<MetricsCollector>,
}

impl Authorizer {
    /// Build the production authorizer: HTTPS JWKS source and HTTP decision service
    ///
    /// Performs the initial key set fetch.
    pub async fn from_config(config: &AuthorizerConfig) -> Result<Self, ConfigError> {
        let keys = Arc::new(HttpJwksSource::new(config.jwks_url(), config.expected_issuer())?);
        let engine = Arc::new(HttpPolicyDecisionService::from_config(config)?);

        Ok(Self::with_services(config, keys, engine).await)
    }

    /// Build an authorizer over arbitrary key and decision services
    pub async fn with_services(
        config: &AuthorizerConfig,
        key_source: Arc<dyn KeySetSource>,
        engine: Arc<dyn PolicyDecisionService>,
    ) -> Self {
        let keys = Arc::new(KeySetCache::new(key_source).await);

        info!(
            policy_store_id = %config.policy_store_id,
            issuer = %config.expected_issuer(),
            "Authorizer initialized"
        );

        Self {
            keys,
            validator: TokenValidator::new(),
            expectations: ClaimsExpectations::from_config(config),
            claim_names: ClaimNames::from_config(config),
            query_builder: QueryBuilder::from_config(config),
            decisions: PolicyDecisionClient::new(engine, config.policy_engine_timeout),
            action_id: config.action_id.clone(),
            resource_id: config.resource_id.clone(),
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Authorize a gateway event
    pub async fn authorize(&self, event: &AuthorizerEvent) -> PolicyDocument {
        self.authorize_token(event.bearer_token(), event.resource_pattern())
            .await
    }

    /// Authorize an already-stripped token for a resource pattern
    pub async fn authorize_token(&self, token: &str, resource: &str) -> PolicyDocument {
        let span = tracing::info_span!("authorize", evaluation_id = %Uuid::new_v4());

        async {
            let start = Instant::now();
            let evaluation = self.evaluate(token).await;

            self.metrics.record_decision(evaluation.decision.is_allowed()).await;
            self.metrics.record_latency(start.elapsed()).await;

            debug!(decision = %evaluation.decision, "Authorization complete");
            generate_policy(&evaluation.principal_id, evaluation.decision, resource, None)
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline up to the decision
    pub async fn evaluate(&self, token: &str) -> Evaluation {
        let claims = match self.validator.verify_with_refresh(token, &self.keys).await {
            Ok(claims) => claims,
            Err(e) => {
                self.record_failure(FailureStage::Token, e.into()).await;
                return Evaluation::denied(UNKNOWN_PRINCIPAL);
            }
        };

        if let Err(e) = validate_claims(&claims, &self.expectations) {
            self.record_failure(FailureStage::Claims, e.into()).await;
            return Evaluation::denied(UNKNOWN_PRINCIPAL);
        }

        let identity = extract_identity(&claims, &self.claim_names);
        let query = self
            .query_builder
            .build(&identity, &self.action_id, &self.resource_id);
        debug!(
            principal = %query.principal.entity_id,
            attributes = query.principal_attributes().len(),
            "Authorization query built"
        );

        let outcome = self.decisions.evaluate(&query).await;
        if outcome.is_err() {
            self.metrics.record_failure(FailureStage::PolicyEngine).await;
        }

        Evaluation {
            principal_id: identity.principal_id,
            decision: fail_closed(&outcome),
        }
    }

    async fn record_failure(&self, stage: FailureStage, err: AuthorizerError) {
        error!(kind = err.kind(), error = %err, "Token/Authorization error");
        self.metrics.record_failure(stage).await;
    }

    /// Shared signing key cache
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    /// Current metrics snapshot
    pub async fn metrics(&self) -> AuthorizerMetrics {
        self.metrics.sync_key_refreshes(self.keys.refresh_count()).await;
        self.metrics.get_metrics().await
    }

    /// Metrics in Prometheus text format
    pub async fn export_metrics(&self) -> String {
        self.metrics.sync_key_refreshes(self.keys.refresh_count()).await;
        self.metrics.export_prometheus().await
    }
}
