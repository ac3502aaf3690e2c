//! Options carried by a single `watch_prefix` call.

/// Per-call watch configuration: an optional resume token and the set of
/// canonical path prefixes the caller actually cares about.
///
/// The resume token is backend-local (an etcd per-key version, a NATS bucket
/// revision, a document edit counter) and is used to report *what changed*,
/// not to precisely re-enter a stream. Interest prefixes narrow the (often
/// broader) native subscription: a backend may deliver events for the whole
/// watched `prefix`, but only events matching one of the interest prefixes
/// wake the caller. An empty interest set falls back to the subscription
/// prefix itself; each adapter documents its convention.
///
/// Options are built fresh per call and are immutable during the call:
///
/// ```rust,ignore
/// let options = WatchOptions::default()
///     .with_resume_token(last_seen)
///     .with_interest_prefixes(["/database/hosts"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub resume_token: u64,
    pub interest_prefixes: Vec<String>,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the last resume token the caller observed (default: 0).
    pub fn with_resume_token(
        mut self,
        token: u64,
    ) -> Self {
        self.resume_token = token;
        self
    }

    /// Set the canonical path prefixes that qualify an event as relevant.
    pub fn with_interest_prefixes<I, S>(
        mut self,
        prefixes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interest_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}
