//! The uniform facade every backend adapter implements.
//!
//! The rest of the world depends only on this capability set, never on a
//! concrete adapter type. There is deliberately no shared base
//! implementation: each adapter independently satisfies the same black-box
//! contract and is exercised by the same conformance properties.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::{Result, WatchOptions};

#[cfg(test)]
use mockall::automock;

/// Uniform read/watch access to one key-value backend.
///
/// # Contract
///
/// - `get_values` merges the flattened values below every requested prefix
///   into one mapping. Later prefixes never drop earlier matches; on key
///   collision (overlapping prefixes) the last write wins and the values are
///   identical by construction.
/// - `watch_prefix` blocks the calling task until a change is observed at a
///   path matching the options' interest prefixes (falling back to `prefix`
///   when the set is empty), until `cancel` fires, or until the backend
///   reports watching is structurally unsupported. Cancellation is
///   cooperative: it is observed at every suspension point and any native
///   subscription is released before returning.
/// - `close` is an idempotent, best-effort release of the backend
///   connection. It never panics and never blocks indefinitely.
///
/// # Thread safety
///
/// Implementations are `Send + Sync`. A single adapter instance may serve
/// sequential calls on one connection; adapters whose native client is not
/// safe for concurrent use serialize access internally.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait KvSource: Send + Sync {
    /// Fetch all keys at or below each canonical prefix, decoded into the
    /// canonical `/`-rooted key space.
    async fn get_values(
        &self,
        prefixes: &[String],
    ) -> Result<HashMap<String, String>>;

    /// Block until a relevant change occurs and return its resume token.
    ///
    /// Returns [`crate::Error::WatchCanceled`] when `cancel` fires (the
    /// caller's resume token is unchanged) and
    /// [`crate::Error::WatchNotSupported`] immediately on backends without a
    /// native change feed.
    async fn watch_prefix(
        &self,
        cancel: CancellationToken,
        prefix: &str,
        options: WatchOptions,
    ) -> Result<u64>;

    /// Release the backend connection. Safe to call more than once.
    async fn close(&self);
}
