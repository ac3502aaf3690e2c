//! Declarative backend settings and the adapter factory.
//!
//! Consumers that wire backends from configuration files rather than code
//! can deserialize a [`BackendSettings`] (TOML file, `POLYKV_*` environment
//! variables, or both layered) and hand it to [`open`] for a boxed
//! [`KvSource`]. Programmatic construction through the per-adapter builders
//! remains the primary API; this layer only maps fields onto them.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::{
    BackendError, EnvSource, EtcdSource, FileSource, KvSource, NatsSource, RedisSource, Result,
};

/// Which adapter a [`BackendSettings`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Etcd,
    Nats,
    File,
    Env,
    Redis,
}

/// Construction options for any backend, flattened into one struct so it
/// can come straight out of a settings file. Unused fields for the selected
/// backend are ignored; required ones are validated by the adapter builders
/// before any connection attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub backend: BackendKind,

    /// Node/endpoint addresses (etcd, nats, redis)
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Basic auth (etcd, nats)
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Token auth (nats)
    #[serde(default)]
    pub token: Option<String>,
    /// Credentials file path (nats)
    #[serde(default)]
    pub credentials: Option<String>,

    /// KV bucket name (nats)
    #[serde(default)]
    pub bucket: Option<String>,

    /// Document path or URL (file)
    #[serde(default)]
    pub document: Option<String>,
    /// Extra HTTP headers sent when `document` is a URL (file)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Watch poll interval in milliseconds (file)
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    /// TLS material, PEM file paths (etcd)
    #[serde(default)]
    pub ca_cert: Option<String>,
    #[serde(default)]
    pub client_cert: Option<String>,
    #[serde(default)]
    pub client_key: Option<String>,

    /// Serve reads without quorum (etcd)
    #[serde(default)]
    pub serializable: bool,
    /// Per-request timeout in milliseconds (etcd)
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl BackendSettings {
    /// Load settings from an optional TOML file with `POLYKV_*` environment
    /// variables layered on top (environment wins).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(Environment::with_prefix("POLYKV").separator("__"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

/// Construct the adapter a settings object describes.
pub async fn open(settings: &BackendSettings) -> Result<Box<dyn KvSource>> {
    debug!("opening {:?} backend", settings.backend);
    match settings.backend {
        BackendKind::Env => Ok(Box::new(EnvSource::new())),

        BackendKind::File => {
            let document = settings.document.clone().ok_or_else(|| {
                BackendError::invalid_options("file", "document location is required")
            })?;
            let mut builder = FileSource::builder(document).headers(settings.headers.clone());
            if let Some(ms) = settings.poll_interval_ms {
                builder = builder.poll_interval(Duration::from_millis(ms));
            }
            Ok(Box::new(builder.build()?))
        }

        BackendKind::Redis => {
            let mut builder = RedisSource::builder().nodes(settings.nodes.clone());
            if let Some(password) = settings.password.clone() {
                builder = builder.password(password);
            }
            Ok(Box::new(builder.connect().await?))
        }

        BackendKind::Nats => {
            let bucket = settings
                .bucket
                .clone()
                .ok_or_else(|| BackendError::invalid_options("nats", "bucket is required"))?;
            let mut builder = NatsSource::builder(bucket).servers(settings.nodes.clone());
            if let (Some(username), Some(password)) =
                (settings.username.clone(), settings.password.clone())
            {
                builder = builder.basic_auth(username, password);
            }
            if let Some(token) = settings.token.clone() {
                builder = builder.token(token);
            }
            if let Some(credentials) = settings.credentials.clone() {
                builder = builder.credentials_file(credentials);
            }
            Ok(Box::new(builder.connect().await?))
        }

        BackendKind::Etcd => {
            let mut builder = EtcdSource::builder(settings.nodes.clone())
                .serializable(settings.serializable);
            if let Some(ca) = settings.ca_cert.clone() {
                builder = builder.ca_cert(ca);
            }
            if let (Some(cert), Some(key)) =
                (settings.client_cert.clone(), settings.client_key.clone())
            {
                builder = builder.client_identity(cert, key);
            }
            if let (Some(username), Some(password)) =
                (settings.username.clone(), settings.password.clone())
            {
                builder = builder.basic_auth(username, password);
            }
            if let Some(ms) = settings.request_timeout_ms {
                builder = builder.request_timeout(Duration::from_millis(ms));
            }
            Ok(Box::new(builder.connect().await?))
        }
    }
}
