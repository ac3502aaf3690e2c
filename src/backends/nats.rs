//! NATS JetStream key-value (pub/sub bucket) adapter.
//!
//! Native keys are dot-delimited subjects (`database.hosts.0`), converted at
//! the boundary by the [`dotted`] codec. Values are the raw entry payloads.
//!
//! # Watch reconciliation
//!
//! A JetStream KV watch subscription replays the bucket's current state
//! before emitting live updates, on the same stream, so a naive watcher
//! would report every pre-existing key as a fresh change on every restart.
//! The adapter runs the two-phase protocol from [`crate::replay`]:
//!
//! 1. **Drain**: enumerate the bucket and seed the [`RevisionSync`] cache
//!    with each key's current revision. Nothing is reported.
//! 2. **Live**: subscribe with history replay and consume the stream. Every
//!    observed entry updates the cache; only an entry whose revision
//!    advances past the cached one - and whose canonical key matches the
//!    interest prefixes (falling back to the watched prefix) - wakes the
//!    caller.
//!
//! Seeding happens before the subscription is created, so a write racing the
//! drain phase replays with a revision newer than the cache and is reported
//! rather than lost. Replayed entries compare equal and stay silent, and an
//! empty bucket drains in one empty enumeration instead of waiting for a
//! stream marker that would never come.
//!
//! The cache belongs to the adapter instance and persists across watch
//! calls, matching the backend's own view of the bucket.

use std::collections::HashMap;

use async_nats::jetstream::{self, kv};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::path::{dotted, is_relevant, matches_any};
use crate::replay::RevisionSync;
use crate::utils::ScopedTimer;
use crate::{BackendError, DecodeError, Error, KvSource, Result, WatchOptions};

const DEFAULT_URL: &str = "nats://127.0.0.1:4222";

/// Adapter for a NATS JetStream KV bucket.
pub struct NatsSource {
    client: async_nats::Client,
    store: kv::Store,
    revisions: RevisionSync,
}

/// Builder for [`NatsSource`]; `connect` validates the options, dials the
/// servers and opens the bucket.
#[derive(Debug, Default)]
pub struct NatsSourceBuilder {
    servers: Vec<String>,
    bucket: String,
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    credentials_path: Option<String>,
}

impl NatsSourceBuilder {
    fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Set the server URLs (default `nats://127.0.0.1:4222`).
    pub fn servers<I, S>(
        mut self,
        servers: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    /// Enable basic authentication.
    pub fn basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Enable token authentication.
    pub fn token(
        mut self,
        token: impl Into<String>,
    ) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use a NATS 2.0 credentials file.
    pub fn credentials_file(
        mut self,
        path: impl Into<String>,
    ) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Validate options, connect and open the KV bucket.
    pub async fn connect(self) -> Result<NatsSource> {
        if self.bucket.is_empty() {
            return Err(BackendError::invalid_options("nats", "no bucket configured").into());
        }

        let servers = if self.servers.is_empty() {
            DEFAULT_URL.to_string()
        } else {
            self.servers.join(",")
        };

        let mut options = async_nats::ConnectOptions::new().max_reconnects(usize::MAX);
        if let (Some(username), Some(password)) = (self.username, self.password) {
            options = options.user_and_password(username, password);
        }
        if let Some(token) = self.token {
            options = options.token(token);
        }
        if let Some(path) = self.credentials_path {
            options = options.credentials_file(&path).await?;
        }

        let client = options
            .connect(servers.as_str())
            .await
            .map_err(|e| BackendError::unavailable("nats", e))?;
        debug!("connected to nats at {servers}");

        let context = jetstream::new(client.clone());
        let store = context
            .get_key_value(&self.bucket)
            .await
            .map_err(|e| BackendError::unavailable("nats", e))?;

        Ok(NatsSource {
            client,
            store,
            revisions: RevisionSync::new(),
        })
    }
}

impl NatsSource {
    pub fn builder(bucket: impl Into<String>) -> NatsSourceBuilder {
        NatsSourceBuilder::new(bucket)
    }

    /// List the bucket's current keys, native form.
    async fn bucket_keys(&self) -> Result<Vec<String>> {
        let mut keys = self
            .store
            .keys()
            .await
            .map_err(|e| BackendError::request("nats", e))?;

        let mut collected = Vec::new();
        while let Some(key) = keys.next().await {
            collected.push(key.map_err(|e| BackendError::request("nats", e))?);
        }
        Ok(collected)
    }

    /// Drain phase: seed the revision cache with the bucket's current state.
    async fn drain_current_state(&self) -> Result<()> {
        for key in self.bucket_keys().await? {
            let entry = self
                .store
                .entry(&key)
                .await
                .map_err(|e| BackendError::request("nats", e))?;
            if let Some(entry) = entry {
                self.revisions.seed(entry.key, entry.revision);
            }
        }
        debug!("drained {} keys into the revision cache", self.revisions.len());
        Ok(())
    }
}

#[async_trait::async_trait]
impl KvSource for NatsSource {
    async fn get_values(
        &self,
        prefixes: &[String],
    ) -> Result<HashMap<String, String>> {
        let _timer = ScopedTimer::new("nats_get_values");

        let mut values = HashMap::new();
        for key in self.bucket_keys().await? {
            let canonical = dotted::to_canonical(&key);
            if !matches_any(&canonical, prefixes) {
                continue;
            }

            let entry = self
                .store
                .entry(&key)
                .await
                .map_err(|e| BackendError::request("nats", e))?;
            let Some(entry) = entry else {
                // deleted between listing and fetch
                continue;
            };
            if entry.operation != kv::Operation::Put {
                continue;
            }

            let value = String::from_utf8(entry.value.to_vec())
                .map_err(|_| DecodeError::NotUtf8 { key: canonical.clone() })?;
            values.insert(canonical, value);
        }
        Ok(values)
    }

    async fn watch_prefix(
        &self,
        cancel: CancellationToken,
        prefix: &str,
        options: WatchOptions,
    ) -> Result<u64> {
        self.drain_current_state().await?;

        // History replay closes the race between the drain enumeration and
        // subscribing: anything written in between arrives with a revision
        // the cache has not seen.
        let subject = dotted::watch_subject(prefix);
        let mut watch = self
            .store
            .watch_with_history(&subject)
            .await
            .map_err(|e| BackendError::subscription("nats", e))?;

        loop {
            tokio::select! {
                biased;
                // Returning drops `watch`, which unsubscribes the native
                // watcher; cancellation leaks nothing.
                _ = cancel.cancelled() => return Err(Error::WatchCanceled),
                update = watch.next() => {
                    let entry = match update {
                        None => return Err(BackendError::StreamClosed.into()),
                        Some(Err(e)) => {
                            warn!("nats watch stream failed: {e}");
                            return Err(BackendError::subscription("nats", e).into());
                        }
                        Some(Ok(entry)) => entry,
                    };

                    // The cache is updated for every observed entry,
                    // relevant or not, so later watch calls start current.
                    let advanced = self.revisions.observe(&entry.key, entry.revision);
                    let canonical = dotted::to_canonical(&entry.key);
                    if advanced && is_relevant(&canonical, &options.interest_prefixes, prefix) {
                        return Ok(entry.revision);
                    }
                }
            }
        }
    }

    async fn close(&self) {
        // No explicit shutdown in the client; flush what is pending and let
        // the connection close when the last handle drops.
        if let Err(e) = self.client.flush().await {
            warn!("nats flush on close failed: {e}");
        }
    }
}
