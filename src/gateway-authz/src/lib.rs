//! # CretoAI Gateway Authorizer
//!
//! Request authorizer for an API gateway: verifies RS256 identity tokens
//! against the user pool's signing keys, asks an external policy store
//! whether the principal may act on the resource, and answers with a
//! gateway policy document.
//!
//! ## Features
//!
//! - **Key rotation** handled by a single on-demand key set refresh per request
//! - **Fail-closed** decisions: anything other than an explicit ALLOW is Deny
//! - **Claim-driven queries** carrying the first group and `custom:` attributes
//! - **Prometheus metrics** for decisions, failures and latency
//!
//! ## Example
//!
//! ```rust,no_run
//! use cretoai_gateway_authz::{Authorizer, AuthorizerConfig, AuthorizerEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthorizerConfig::from_env()?;
//!     let authorizer = Authorizer::from_config(&config).await?;
//!
//!     let event = AuthorizerEvent::new(
//!         "Bearer eyJraWQiOi...",
//!         "arn:aws:execute-api:us-east-1:123456789012:api/prod/GET/items",
//!     );
//!
//!     let policy = authorizer.authorize(&event).await;
//!     println!("{}", serde_json::to_string_pretty(&policy)?);
//!
//!     Ok(())
//! }
//! ```

pub mod authorizer;
pub mod claims;
pub mod config;
pub mod decision;
pub mod error;
pub mod jwks;
pub mod metrics;
pub mod policy_document;
pub mod query;
pub mod token;
pub mod types;

// Re-export commonly used types
pub use authorizer::{Authorizer, Evaluation};
pub use claims::{extract_identity, validate_claims, ClaimNames, ClaimsExpectations, PrincipalIdentity};
pub use config::AuthorizerConfig;
pub use decision::{
    EngineVerdict, HttpPolicyDecisionService, PolicyDecisionClient, PolicyDecisionService,
};
pub use error::{AuthorizerError, ClaimsError, ConfigError, PolicyEngineError, TokenError};
pub use jwks::{HttpJwksSource, KeySetCache, KeySetSource, SigningKeySet};
pub use metrics::{AuthorizerMetrics, MetricsCollector};
pub use policy_document::{generate_policy, PolicyDocument};
pub use query::{AuthorizationQuery, QueryBuilder};
pub use token::TokenValidator;
pub use types::{AuthorizerEvent, Decision, TokenClaims};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
