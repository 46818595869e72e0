//! Error types for the gateway authorizer
//!
//! Each pipeline stage has its own error enum. None of them escape
//! [`crate::Authorizer::authorize`]; they are logged and folded into a Deny.

use thiserror::Error;

/// Startup configuration errors (fatal)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required value absent or blank
    #[error("Missing required configuration value: {0}")]
    Missing(String),

    /// Value present but unusable
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Token verification errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// The key named by the token header is not in the current key set
    #[error("Signing key not found: {kid}")]
    SignatureError { kid: String },

    /// Any other structural or cryptographic failure
    #[error("Invalid token: {0}")]
    TokenInvalid(String),
}

impl TokenError {
    /// Short classification used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::SignatureError { .. } => "signature_error",
            TokenError::TokenInvalid(_) => "token_invalid",
        }
    }

    /// Whether the failure is attributable to a key missing from the key set
    pub fn is_missing_key(&self) -> bool {
        matches!(self, TokenError::SignatureError { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let reason = match err.kind() {
            ErrorKind::InvalidToken => "malformed token".to_string(),
            ErrorKind::InvalidSignature => "signature verification failed".to_string(),
            ErrorKind::ExpiredSignature => "token expired".to_string(),
            ErrorKind::ImmatureSignature => "token not yet valid".to_string(),
            ErrorKind::InvalidAlgorithm => "algorithm not accepted".to_string(),
            ErrorKind::MissingRequiredClaim(claim) => format!("missing required claim: {}", claim),
            // Decoder messages quote the offending payload, claim values included
            ErrorKind::Json(_) => "malformed claims payload".to_string(),
            ErrorKind::Base64(_) | ErrorKind::Utf8(_) => "malformed token encoding".to_string(),
            _ => format!("JWT error: {}", err),
        };

        TokenError::TokenInvalid(reason)
    }
}

/// Audience / issuer validation errors
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// `aud` claim differs from the configured client id
    #[error("Invalid audience")]
    AudienceMismatch,

    /// `iss` claim differs from the configured identity domain
    #[error("Invalid issuer")]
    IssuerMismatch,
}

impl ClaimsError {
    /// Short classification used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimsError::AudienceMismatch => "audience_mismatch",
            ClaimsError::IssuerMismatch => "issuer_mismatch",
        }
    }
}

/// Policy decision service errors
#[derive(Debug, Error)]
pub enum PolicyEngineError {
    /// Request could not be delivered or the response not read
    #[error("Policy engine transport error: {0}")]
    Transport(String),

    /// Service answered with an error
    #[error("Policy engine service error [{code}]: {message}")]
    Service { code: String, message: String },

    /// Service answered with a body that is not a decision
    #[error("Malformed policy engine response: {0}")]
    MalformedResponse(String),

    /// Caller-imposed deadline elapsed
    #[error("Policy engine call timed out after {0} ms")]
    Timeout(u64),

    /// Anything else, including a panicking service implementation
    #[error("Policy engine evaluation error: {0}")]
    Unexpected(String),
}

impl PolicyEngineError {
    /// Short classification used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyEngineError::Transport(_) => "transport",
            PolicyEngineError::Service { .. } => "service",
            PolicyEngineError::MalformedResponse(_) => "malformed_response",
            PolicyEngineError::Timeout(_) => "timeout",
            PolicyEngineError::Unexpected(_) => "unexpected",
        }
    }

    /// Non-sensitive diagnostic code
    pub fn code(&self) -> &str {
        match self {
            PolicyEngineError::Service { code, .. } => code,
            other => other.kind(),
        }
    }
}

impl From<reqwest::Error> for PolicyEngineError {
    fn from(err: reqwest::Error) -> Self {
        PolicyEngineError::Transport(err.to_string())
    }
}

/// Umbrella error for the authorization pipeline
#[derive(Debug, Error)]
pub enum AuthorizerError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Claims(#[from] ClaimsError),

    #[error(transparent)]
    PolicyEngine(#[from] PolicyEngineError),
}

impl AuthorizerError {
    /// Short classification used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AuthorizerError::Token(e) => e.kind(),
            AuthorizerError::Claims(e) => e.kind(),
            AuthorizerError::PolicyEngine(e) => e.kind(),
        }
    }
}
