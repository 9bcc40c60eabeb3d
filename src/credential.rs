//!
//! src/credential.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Fixed pool of independent client identities, each behind its own
//! rate gate so one identity's cooldown never stalls another
//!

use std::{fmt, sync::Arc, time::Duration};

use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::config::{ClientSecretPair, CredentialConfig};

#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    next_allowed: tokio::sync::Mutex<Instant>
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: tokio::sync::Mutex::new(Instant::now())
        }
    }

    /// Blocks until this identity may issue its next request
    pub async fn wait(&self) {
        let mut next = self.next_allowed.lock().await;
        if Instant::now() < *next {
            sleep_until(*next).await;
        }
        *next = Instant::now() + self.min_interval;
    }

    /// Pushes the next permitted request out by at least `cooldown`
    pub async fn defer(&self, cooldown: Duration) {
        let mut next = self.next_allowed.lock().await;
        let until = Instant::now() + cooldown;
        if until > *next {
            *next = until;
        }
    }
}

/// Bearer issued to one identity and when it stops being usable
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub bearer: String,
    pub expires_at: Instant
}

impl CachedToken {
    pub fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// Immutable after construction apart from its own gate and token slot
pub struct Credential {
    label: String,
    client_id: String,
    client_secret: String,
    gate: RateGate,
    token: tokio::sync::Mutex<Option<CachedToken>>
}

impl Credential {
    pub fn new(label: impl Into<String>, pair: &ClientSecretPair, min_interval: Duration) -> Self {
        Self {
            label: label.into(),
            client_id: pair.client_id.clone(),
            client_secret: pair.client_secret.clone(),
            gate: RateGate::new(min_interval),
            token: tokio::sync::Mutex::new(None)
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Held across a token refresh; no other identity ever locks it
    pub fn token_slot(&self) -> &tokio::sync::Mutex<Option<CachedToken>> {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Arc<Credential>>
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials: credentials.into_iter().map(Arc::new).collect() }
    }

    pub fn from_config(cfg: &CredentialConfig, min_interval: Duration) -> Self {
        let credentials = cfg.pairs.iter()
            .enumerate()
            .map(|(i, pair)| Credential::new(format!("client-{}", i + 1), pair, min_interval))
            .collect();
        let pool = Self::new(credentials);
        debug!(credentials = pool.len(), "credential.pool.ready");
        pool
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Credential>> {
        self.credentials.iter()
    }

    /// Any identity, for one-off calls outside a partitioned pass
    pub fn choose(&self) -> Option<Arc<Credential>> {
        let mut rng = SmallRng::from_entropy();
        self.credentials.choose(&mut rng).cloned()
    }
}
