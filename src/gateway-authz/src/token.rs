//! Bearer token verification
//!
//! Verification against the cached key set is a two-state machine:
//!
//! ```text
//! Verify ──(key missing)──▶ RefreshAndRetry
//!   │                            │
//!   ▼                            ▼
//! Accept | Reject            Accept | Reject
//! ```
//!
//! `RefreshAndRetry` always terminates, so at most one refresh happens per
//! evaluation no matter how the retry fails.

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::{debug, error};

use crate::error::TokenError;
use crate::jwks::{KeySetCache, SigningKeySet};
use crate::types::TokenClaims;

/// The only accepted signing algorithm
pub const ACCEPTED_ALGORITHM: Algorithm = Algorithm::RS256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerificationState {
    Verify,
    RefreshAndRetry,
}

/// Verifies token signatures and temporal validity
#[derive(Debug, Clone)]
pub struct TokenValidator {
    validation: Validation,
}

impl TokenValidator {
    pub fn new() -> Self {
        let mut validation = Validation::new(ACCEPTED_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Audience and issuer are checked by the claims stage with exact equality
        validation.validate_aud = false;

        Self { validation }
    }

    /// Verify a token against one key set
    ///
    /// Fails with [`TokenError::SignatureError`] only when the token's key id
    /// is absent from `keys`.
    pub fn verify(&self, token: &str, keys: &SigningKeySet) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token)?;

        if header.alg != ACCEPTED_ALGORITHM {
            return Err(TokenError::TokenInvalid(format!(
                "algorithm {:?} not accepted",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| TokenError::TokenInvalid("token header missing 'kid'".to_string()))?;

        let key = keys
            .get(&kid)
            .ok_or_else(|| TokenError::SignatureError { kid: kid.clone() })?;

        let data = decode::<TokenClaims>(token, key, &self.validation)?;

        debug!(kid = %kid, "Token signature verified");
        Ok(data.claims)
    }

    /// Verify against the cache, refreshing it at most once on a missing key
    pub async fn verify_with_refresh(
        &self,
        token: &str,
        cache: &KeySetCache,
    ) -> Result<TokenClaims, TokenError> {
        let mut state = VerificationState::Verify;

        loop {
            match state {
                VerificationState::Verify => {
                    let keys = cache.current();
                    match self.verify(token, &keys) {
                        Err(err) if err.is_missing_key() => {
                            error!(error = %err, "Key not found in JWKS; attempting refresh");
                            state = VerificationState::RefreshAndRetry;
                        }
                        outcome => return outcome,
                    }
                }
                VerificationState::RefreshAndRetry => {
                    let keys = cache.refresh().await;
                    return self.verify(token, &keys);
                }
            }
        }
    }
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self::new()
    }
}
