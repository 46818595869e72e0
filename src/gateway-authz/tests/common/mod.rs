//! Shared fixtures for authorizer integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cretoai_gateway_authz::{
    AuthorizationQuery, AuthorizerConfig, EngineVerdict, KeySetSource, PolicyDecisionService,
    PolicyEngineError, SigningKeySet,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const PRIMARY_PEM: &str = include_str!("../fixtures/primary_rsa.pem");
pub const PRIMARY_JWKS: &str = include_str!("../fixtures/primary_jwks.json");
pub const PRIMARY_KID: &str = "primary-key";

pub const ROTATED_PEM: &str = include_str!("../fixtures/rotated_rsa.pem");
pub const ROTATED_JWKS: &str = include_str!("../fixtures/rotated_jwks.json");
pub const ROTATED_KID: &str = "rotated-key";

pub const CLIENT_ID: &str = "test-client-id";
pub const METHOD_ARN: &str = "arn:aws:execute-api:us-east-1:123456789012:abc123/prod/GET/items";

pub fn test_config() -> AuthorizerConfig {
    AuthorizerConfig::new(
        "us-east-1",
        "us-east-1_TestPool",
        CLIENT_ID,
        "ps-test-store",
        "http://127.0.0.1:9",
    )
}

pub fn issuer() -> String {
    test_config().expected_issuer()
}

pub fn key_set(jwks: &str) -> SigningKeySet {
    SigningKeySet::from_json(issuer(), jwks.as_bytes()).unwrap()
}

pub fn empty_key_set() -> SigningKeySet {
    SigningKeySet::empty(issuer())
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims of a valid identity token for alice
pub fn standard_claims() -> Value {
    json!({
        "sub": "0b5c3f1e-8a44-4d3e-9f0c-2d1f6e7a9b10",
        "aud": CLIENT_ID,
        "iss": issuer(),
        "token_use": "id",
        "iat": now(),
        "exp": now() + 3600,
        "cognito:username": "alice",
        "cognito:groups": ["Admins", "Users"],
        "custom:department": "engineering",
        "custom:clearance": "secret",
        "email": "alice@example.com"
    })
}

/// Replace or remove top-level claims
pub fn with_claims(mut claims: Value, changes: &[(&str, Option<Value>)]) -> Value {
    let map = claims.as_object_mut().unwrap();
    for (name, value) in changes {
        match value {
            Some(v) => {
                map.insert(name.to_string(), v.clone());
            }
            None => {
                map.remove(*name);
            }
        }
    }
    claims
}

/// Sign claims with RS256 under the given key id
pub fn mint(pem: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn primary_token(claims: &Value) -> String {
    mint(PRIMARY_PEM, PRIMARY_KID, claims)
}

/// Key source returning scripted key sets in order, repeating the last one
pub struct CountingSource {
    sets: Mutex<VecDeque<SigningKeySet>>,
    last: Mutex<Option<SigningKeySet>>,
    fetches: AtomicUsize,
}

impl CountingSource {
    pub fn new(sets: Vec<SigningKeySet>) -> Self {
        Self {
            sets: Mutex::new(sets.into()),
            last: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetches, including the initial one
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for CountingSource {
    async fn fetch(&self) -> SigningKeySet {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let next = self.sets.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(set) => {
                *last = Some(set.clone());
                set
            }
            None => last.clone().unwrap_or_else(empty_key_set),
        }
    }
}

type Outcome = Box<dyn Fn() -> Result<EngineVerdict, PolicyEngineError> + Send + Sync>;

/// Decision service answering every query with a fixed outcome
pub struct ScriptedEngine {
    outcome: Outcome,
    calls: AtomicUsize,
    queries: Mutex<Vec<AuthorizationQuery>>,
}

impl ScriptedEngine {
    pub fn new(outcome: impl Fn() -> Result<EngineVerdict, PolicyEngineError> + Send + Sync + 'static) -> Self {
        Self {
            outcome: Box::new(outcome),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn allowing() -> Self {
        Self::new(|| Ok(EngineVerdict::Allow))
    }

    pub fn denying() -> Self {
        Self::new(|| Ok(EngineVerdict::Deny))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<AuthorizationQuery> {
        self.queries.lock().last().cloned()
    }
}

#[async_trait]
impl PolicyDecisionService for ScriptedEngine {
    async fn is_authorized(
        &self,
        query: &AuthorizationQuery,
    ) -> Result<EngineVerdict, PolicyEngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.clone());
        (self.outcome)()
    }
}
