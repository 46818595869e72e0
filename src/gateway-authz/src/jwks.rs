//! Signing key set and its process-wide cache
//!
//! The cache holds one complete [`SigningKeySet`] behind an `Arc`. A refresh
//! fetches a whole new set and swaps the pointer, so readers always see
//! either the previous or the new set in full.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::JWKS_FETCH_TIMEOUT;
use crate::error::ConfigError;

/// Public verification keys of one identity domain, by key id
#[derive(Clone)]
pub struct SigningKeySet {
    keys: HashMap<String, DecodingKey>,
    issuer: String,
    fetched_at: DateTime<Utc>,
}

impl SigningKeySet {
    /// Key set with no keys; every lookup misses
    pub fn empty(issuer: impl Into<String>) -> Self {
        Self {
            keys: HashMap::new(),
            issuer: issuer.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Build a key set from a parsed JWKS document
    ///
    /// Only RSA keys carrying a key id are kept.
    pub fn from_jwks(issuer: impl Into<String>, jwks: &JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(jwks.keys.len());

        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                error!("Skipping JWK without key id");
                continue;
            };

            if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
                error!(kid = %kid, "Skipping non-RSA JWK");
                continue;
            }

            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => error!(kid = %kid, error = %e, "Skipping unusable JWK"),
            }
        }

        Self {
            keys,
            issuer: issuer.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Parse a JWKS JSON document
    pub fn from_json(issuer: impl Into<String>, body: &[u8]) -> Result<Self, serde_json::Error> {
        let jwks: JwkSet = serde_json::from_slice(body)?;
        Ok(Self::from_jwks(issuer, &jwks))
    }

    /// Look up a verification key
    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    /// Whether the set holds the given key id
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Identity domain the keys belong to
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// When this set was fetched
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Key ids in the set, sorted
    pub fn key_ids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }
}

impl std::fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeySet")
            .field("issuer", &self.issuer)
            .field("key_ids", &self.key_ids())
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// Where signing keys come from
///
/// Implementations never fail: an unreachable or unreadable source yields an
/// empty set, which makes every verification against it miss.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the current key set
    async fn fetch(&self) -> SigningKeySet;
}

/// Fetches the JWKS document published by the identity provider
pub struct HttpJwksSource {
    client: reqwest::Client,
    url: String,
    issuer: String,
}

impl HttpJwksSource {
    /// Create a source for the given JWKS URL
    pub fn new(url: impl Into<String>, issuer: impl Into<String>) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "jwks_client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            issuer: issuer.into(),
        })
    }

    async fn try_fetch(&self) -> Result<SigningKeySet, reqwest::Error> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let jwks: JwkSet = response.json().await?;
        Ok(SigningKeySet::from_jwks(self.issuer.clone(), &jwks))
    }
}

#[async_trait]
impl KeySetSource for HttpJwksSource {
    async fn fetch(&self) -> SigningKeySet {
        match self.try_fetch().await {
            Ok(keys) => {
                debug!(url = %self.url, keys = keys.len(), "Fetched JWKS");
                keys
            }
            Err(e) => {
                error!(url = %self.url, error = %e, "Error fetching JWKS");
                SigningKeySet::empty(self.issuer.clone())
            }
        }
    }
}

/// Process-wide signing key cache
///
/// Exposes only [`current`](Self::current) and [`refresh`](Self::refresh).
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    current: RwLock<Arc<SigningKeySet>>,
    refreshes: AtomicU64,
}

impl KeySetCache {
    /// Create the cache, performing the initial fetch
    pub async fn new(source: Arc<dyn KeySetSource>) -> Self {
        let initial = source.fetch().await;
        info!(
            issuer = %initial.issuer(),
            keys = initial.len(),
            "Signing key cache initialized"
        );

        Self {
            source,
            current: RwLock::new(Arc::new(initial)),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current key set
    pub fn current(&self) -> Arc<SigningKeySet> {
        self.current.read().clone()
    }

    /// Fetch a new key set and replace the cached one wholesale
    pub async fn refresh(&self) -> Arc<SigningKeySet> {
        let fresh = Arc::new(self.source.fetch().await);
        *self.current.write() = fresh.clone();
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        debug!(keys = fresh.len(), "Signing key cache refreshed");
        fresh
    }

    /// Number of refreshes since startup
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}
