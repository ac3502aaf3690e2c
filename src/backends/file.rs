//! File / HTTP document adapter.
//!
//! The backing store is a single YAML or JSON document, read from a
//! filesystem path or fetched from an `http(s)://` URL with optional custom
//! headers. The document is flattened into the canonical key space on every
//! read (JSON is a subset of YAML, so one parser covers both).
//!
//! Documents have no native push notification, so `watch_prefix` polls: each
//! tick rereads and re-flattens the document, digests the entries matching
//! the caller's interest set and returns once the digest moves. An empty
//! interest set together with a root/empty prefix watches the whole
//! document. Cancellation is checked at every tick, and the poll interval is
//! a construction option clamped to a non-zero floor so the loop can never
//! spin hot.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::path::{flatten, is_relevant, matches_any};
use crate::utils::ScopedTimer;
use crate::{BackendError, Error, KvSource, Result, WatchOptions};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
enum Location {
    Path(String),
    Url(String, reqwest::Client),
}

/// Adapter for a YAML/JSON document on disk or behind an HTTP endpoint.
pub struct FileSource {
    location: Location,
    interval: Duration,
}

/// Builder for [`FileSource`].
#[derive(Debug)]
pub struct FileSourceBuilder {
    source: String,
    headers: HashMap<String, String>,
    interval: Duration,
}

impl FileSourceBuilder {
    fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            headers: HashMap::new(),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Add one HTTP header sent with every document fetch. Ignored for
    /// filesystem sources.
    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace the HTTP header set.
    pub fn headers(
        mut self,
        headers: HashMap<String, String>,
    ) -> Self {
        self.headers = headers;
        self
    }

    /// Set the watch poll interval (default 1s, clamped to a non-zero
    /// floor).
    pub fn poll_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.interval = interval;
        self
    }

    pub fn build(self) -> Result<FileSource> {
        if self.source.is_empty() {
            return Err(BackendError::invalid_options("file", "empty document location").into());
        }

        let is_url = self.source.starts_with("http://") || self.source.starts_with("https://");
        let location = if is_url {
            let mut defaults = HeaderMap::new();
            for (name, value) in &self.headers {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    BackendError::invalid_options("file", format!("header {name:?}: {e}"))
                })?;
                let value = HeaderValue::from_str(value).map_err(|e| {
                    BackendError::invalid_options("file", format!("header value: {e}"))
                })?;
                defaults.insert(name, value);
            }
            let client = reqwest::Client::builder()
                .default_headers(defaults)
                .build()?;
            Location::Url(self.source, client)
        } else {
            Location::Path(self.source)
        };

        Ok(FileSource {
            location,
            interval: self.interval.max(MIN_POLL_INTERVAL),
        })
    }
}

impl FileSource {
    /// Start building an adapter for `source`, a filesystem path or an
    /// `http(s)://` URL.
    pub fn builder(source: impl Into<String>) -> FileSourceBuilder {
        FileSourceBuilder::new(source)
    }

    async fn fetch(&self) -> Result<String> {
        match &self.location {
            Location::Path(path) => Ok(tokio::fs::read_to_string(path).await?),
            Location::Url(url, client) => {
                let response = client.get(url).send().await?.error_for_status()?;
                Ok(response.text().await?)
            }
        }
    }

    /// Read, parse and flatten the whole document.
    async fn document(&self) -> Result<HashMap<String, String>> {
        let raw = self.fetch().await?;
        let parsed: serde_json::Value = serde_yaml::from_str(&raw)?;
        flatten(&parsed)
    }

    /// Digest of the document entries relevant to this watch, stable across
    /// map iteration order.
    async fn relevant_digest(
        &self,
        interest: &[String],
        prefix: &str,
    ) -> Result<[u8; 32]> {
        let values = self.document().await?;
        let relevant: BTreeMap<_, _> = values
            .into_iter()
            .filter(|(path, _)| is_relevant(path, interest, prefix))
            .collect();

        let mut hasher = Sha256::new();
        for (path, value) in &relevant {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        Ok(hasher.finalize().into())
    }
}

#[async_trait::async_trait]
impl KvSource for FileSource {
    async fn get_values(
        &self,
        prefixes: &[String],
    ) -> Result<HashMap<String, String>> {
        let _timer = ScopedTimer::new("file_get_values");
        let values = self.document().await?;
        Ok(values
            .into_iter()
            .filter(|(path, _)| matches_any(path, prefixes))
            .collect())
    }

    async fn watch_prefix(
        &self,
        cancel: CancellationToken,
        prefix: &str,
        options: WatchOptions,
    ) -> Result<u64> {
        let baseline = self
            .relevant_digest(&options.interest_prefixes, prefix)
            .await?;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::WatchCanceled),
                _ = sleep(self.interval) => {}
            }

            let current = self
                .relevant_digest(&options.interest_prefixes, prefix)
                .await?;
            if current != baseline {
                debug!("document content changed under {prefix}");
                // No native revision to report; advance an edit counter.
                return Ok(options.resume_token + 1);
            }
        }
    }

    async fn close(&self) {}
}
