//! Prometheus-style metrics for authorizer observability

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Token,
    Claims,
    PolicyEngine,
}

/// Authorizer metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct AuthorizerMetrics {
    /// Total number of evaluations
    pub total_requests: u64,

    /// Allow decisions
    pub allowed_decisions: u64,

    /// Deny decisions
    pub denied_decisions: u64,

    /// Key set refreshes triggered by unknown key ids
    pub key_refreshes: u64,

    pub token_failures: u64,
    pub claims_failures: u64,
    pub policy_engine_failures: u64,

    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,

    /// Cumulative latency over all recorded evaluations
    pub latency_sum_ms: f64,
    pub latency_count: u64,
}

impl AuthorizerMetrics {
    /// Share of evaluations that were allowed
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Metrics collector
pub struct MetricsCollector {
    metrics: Arc<RwLock<AuthorizerMetrics>>,

    /// Recent latencies in ms (bounded)
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(AuthorizerMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(10_000))),
            max_samples: 10_000,
        }
    }

    /// Record a final decision
    pub async fn record_decision(&self, allowed: bool) {
        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;

        if allowed {
            metrics.allowed_decisions += 1;
        } else {
            metrics.denied_decisions += 1;
        }
    }

    /// Record a stage failure
    pub async fn record_failure(&self, stage: FailureStage) {
        let mut metrics = self.metrics.write().await;
        match stage {
            FailureStage::Token => metrics.token_failures += 1,
            FailureStage::Claims => metrics.claims_failures += 1,
            FailureStage::PolicyEngine => metrics.policy_engine_failures += 1,
        }
    }

    /// Mirror the key cache's refresh counter
    pub async fn sync_key_refreshes(&self, refreshes: u64) {
        let mut metrics = self.metrics.write().await;
        metrics.key_refreshes = refreshes;
    }

    /// Record evaluation latency
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);
        if samples.len() > self.max_samples {
            samples.drain(0..1_000);
        }

        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut metrics = self.metrics.write().await;
        metrics.latency_sum_ms += latency_ms;
        metrics.latency_count += 1;
        metrics.avg_latency_ms = metrics.latency_sum_ms / metrics.latency_count as f64;
        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    /// Current metrics snapshot
    pub async fn get_metrics(&self) -> AuthorizerMetrics {
        self.metrics.read().await.clone()
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP authorizer_requests_total Total number of authorization evaluations
# TYPE authorizer_requests_total counter
authorizer_requests_total {}

# HELP authorizer_allowed_total Number of allow decisions
# TYPE authorizer_allowed_total counter
authorizer_allowed_total {}

# HELP authorizer_denied_total Number of deny decisions
# TYPE authorizer_denied_total counter
authorizer_denied_total {}

# HELP authorizer_key_refreshes_total Signing key set refreshes
# TYPE authorizer_key_refreshes_total counter
authorizer_key_refreshes_total {}

# HELP authorizer_failures_total Evaluation failures by stage
# TYPE authorizer_failures_total counter
authorizer_failures_total{{stage="token"}} {}
authorizer_failures_total{{stage="claims"}} {}
authorizer_failures_total{{stage="policy_engine"}} {}

# HELP authorizer_latency_seconds Evaluation latency percentiles
# TYPE authorizer_latency_seconds summary
authorizer_latency_seconds{{quantile="0.5"}} {}
authorizer_latency_seconds{{quantile="0.99"}} {}
authorizer_latency_seconds_sum {}
authorizer_latency_seconds_count {}

# HELP authorizer_latency_avg_seconds Mean evaluation latency
# TYPE authorizer_latency_avg_seconds gauge
authorizer_latency_avg_seconds {}
"#,
            metrics.total_requests,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.key_refreshes,
            metrics.token_failures,
            metrics.claims_failures,
            metrics.policy_engine_failures,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
            metrics.latency_sum_ms / 1000.0,
            metrics.latency_count,
            metrics.avg_latency_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
