//! Environment-variable adapter.
//!
//! Reads the process environment through the canonical key codec
//! (`DATABASE_HOST` <-> `/database/host`). The environment has no change
//! feed, so watching is structurally unsupported: `watch_prefix` returns
//! [`Error::WatchNotSupported`] synchronously, spawns nothing and never
//! touches the cancellation token.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::path::{env_names, matches_any};
use crate::{Error, KvSource, Result, WatchOptions};

/// Read-only view of the process environment.
#[derive(Debug, Default)]
pub struct EnvSource;

impl EnvSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl KvSource for EnvSource {
    async fn get_values(
        &self,
        prefixes: &[String],
    ) -> Result<HashMap<String, String>> {
        let mut values = HashMap::new();
        for (name, value) in std::env::vars() {
            let canonical = env_names::to_canonical(&name);
            if matches_any(&canonical, prefixes) {
                values.insert(canonical, value);
            }
        }
        Ok(values)
    }

    async fn watch_prefix(
        &self,
        _cancel: CancellationToken,
        _prefix: &str,
        _options: WatchOptions,
    ) -> Result<u64> {
        Err(Error::WatchNotSupported)
    }

    async fn close(&self) {}
}
