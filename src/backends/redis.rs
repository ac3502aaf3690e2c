//! Redis (in-memory cache store) adapter.
//!
//! Keys are stored in canonical `/`-rooted form already, so no codec is
//! involved: a prefix read is a direct `GET` of the prefix itself plus a
//! `SCAN MATCH <prefix>/*` sweep for everything below it.
//!
//! Redis offers no per-key change feed usable here, so watching is
//! structurally unsupported and `watch_prefix` returns
//! [`Error::WatchNotSupported`] synchronously.
//!
//! The adapter owns one [`ConnectionManager`]; before each operation the
//! connection is probed with `PING` and rebuilt once on a failed probe.
//! Repeated failure surfaces as [`BackendError::Unavailable`].

use std::collections::HashMap;
use std::path::Path;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::utils::ScopedTimer;
use crate::{BackendError, Error, KvSource, Result, WatchOptions};

const SCAN_BATCH: usize = 1000;
const DEFAULT_PORT: u16 = 6379;

/// Adapter for a Redis cache store.
pub struct RedisSource {
    nodes: Vec<String>,
    password: Option<String>,
    manager: Mutex<Option<ConnectionManager>>,
}

/// Builder for [`RedisSource`]; `connect` validates the options and dials
/// the first reachable node.
#[derive(Debug, Default)]
pub struct RedisSourceBuilder {
    nodes: Vec<String>,
    password: Option<String>,
}

impl RedisSourceBuilder {
    /// Set the node addresses, tried in order (`host:port`, bare `host`, or
    /// a unix socket path).
    pub fn nodes<I, S>(
        mut self,
        nodes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn password(
        mut self,
        password: impl Into<String>,
    ) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Validate options and establish the initial connection.
    pub async fn connect(self) -> Result<RedisSource> {
        if self.nodes.is_empty() {
            return Err(BackendError::invalid_options("redis", "no nodes configured").into());
        }

        let manager = try_connect(&self.nodes, self.password.as_deref()).await?;
        Ok(RedisSource {
            nodes: self.nodes,
            password: self.password,
            manager: Mutex::new(Some(manager)),
        })
    }
}

impl RedisSource {
    pub fn builder() -> RedisSourceBuilder {
        RedisSourceBuilder::default()
    }

    /// Build an adapter without dialing; used to exercise the paths that
    /// must not touch the connection.
    #[cfg(test)]
    pub(crate) fn disconnected(nodes: Vec<String>) -> Self {
        Self {
            nodes,
            password: None,
            manager: Mutex::new(None),
        }
    }

    /// Return a live connection, probing any cached one with `PING` first.
    /// A failed probe discards the connection and reconnects once.
    async fn connected(&self) -> Result<ConnectionManager> {
        let mut guard = self.manager.lock().await;

        if let Some(manager) = guard.as_ref() {
            let mut probe = manager.clone();
            match redis::cmd("PING").query_async::<_, String>(&mut probe).await {
                Ok(pong) if pong == "PONG" => return Ok(probe),
                Ok(other) => warn!("redis liveness probe returned {other:?}, reconnecting"),
                Err(e) => warn!("redis liveness probe failed: {e}, reconnecting"),
            }
            *guard = None;
        }

        let manager = try_connect(&self.nodes, self.password.as_deref()).await?;
        *guard = Some(manager.clone());
        Ok(manager)
    }
}

/// Dial each node in turn and keep the first connection that succeeds.
async fn try_connect(
    nodes: &[String],
    password: Option<&str>,
) -> Result<ConnectionManager> {
    let mut last_err = None;
    for node in nodes {
        let info = connection_info(node, password);
        let client = match redis::Client::open(info) {
            Ok(client) => client,
            Err(e) => {
                warn!("invalid redis node address {node}: {e}");
                last_err = Some(e);
                continue;
            }
        };
        match client.get_connection_manager().await {
            Ok(manager) => {
                debug!("connected to redis node {node}");
                return Ok(manager);
            }
            Err(e) => {
                warn!("connect to redis node {node} failed: {e}");
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(BackendError::unavailable("redis", e).into()),
        None => Err(BackendError::unavailable("redis", "no nodes configured").into()),
    }
}

pub(crate) fn connection_info(
    node: &str,
    password: Option<&str>,
) -> ConnectionInfo {
    // A node that exists on the filesystem is a unix socket, same detection
    // the tcp path never triggers for host:port strings.
    let addr = if Path::new(node).exists() {
        ConnectionAddr::Unix(node.into())
    } else {
        let (host, port) = match node.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (node.to_string(), DEFAULT_PORT),
            },
            None => (node.to_string(), DEFAULT_PORT),
        };
        ConnectionAddr::Tcp(host, port)
    };

    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            password: password.map(str::to_string),
            ..Default::default()
        },
    }
}

/// `SCAN MATCH` pattern for everything strictly below a prefix.
pub(crate) fn scan_pattern(prefix: &str) -> String {
    if prefix == "/" {
        "/*".to_string()
    } else {
        format!("{prefix}/*")
    }
}

#[async_trait::async_trait]
impl KvSource for RedisSource {
    async fn get_values(
        &self,
        prefixes: &[String],
    ) -> Result<HashMap<String, String>> {
        let _timer = ScopedTimer::new("redis_get_values");
        let mut conn = self.connected().await?;

        let mut values = HashMap::new();
        for prefix in prefixes {
            let key = prefix.replace("/*", "");

            // An exact hit means the prefix names a leaf, not a subtree.
            if let Some(value) = conn.get::<_, Option<String>>(&key).await? {
                values.insert(key, value);
                continue;
            }

            let pattern = scan_pattern(&key);
            let mut cursor = 0u64;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;

                for matched in keys {
                    if let Some(value) = conn.get::<_, Option<String>>(&matched).await? {
                        values.insert(matched, value);
                    }
                }

                cursor = next;
                if cursor == 0 {
                    break;
                }
            }
        }
        Ok(values)
    }

    /// Watching is structurally unsupported: returns immediately, spawns no
    /// background work and does not consume the token.
    async fn watch_prefix(
        &self,
        _cancel: CancellationToken,
        _prefix: &str,
        _options: WatchOptions,
    ) -> Result<u64> {
        Err(Error::WatchNotSupported)
    }

    async fn close(&self) {
        // ConnectionManager has no explicit shutdown; dropping the last
        // clone closes the multiplexed connection.
        self.manager.lock().await.take();
    }
}
