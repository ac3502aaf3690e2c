//! polykv - uniform read/watch access to heterogeneous key-value backends.
//!
//! Configuration consumers (templating tools, reloading services) want two
//! operations: read every value below a set of key prefixes, and block until
//! something below a prefix changes. The backends that actually hold the data
//! disagree on everything else - key syntax, nesting, change notification,
//! even whether change notification exists at all.
//!
//! polykv normalizes five backends behind one [`KvSource`] trait:
//!
//! - **etcd v3** - consensus store, spoken natively over gRPC
//! - **NATS JetStream KV** - durable pub/sub bucket with replay-then-stream
//!   watch semantics
//! - **file / HTTP document** - a YAML or JSON document, watched by polling
//! - **environment variables** - read-only, watch structurally unsupported
//! - **Redis** - cache store, watch structurally unsupported
//!
//! # Canonical key space
//!
//! All caller-facing keys are absolute `/`-rooted paths, e.g.
//! `/database/hosts/0/name`. Each adapter translates to and from its native
//! key syntax (`database.hosts.0.name` for NATS subjects,
//! `DATABASE_HOSTS_0_NAME` for the environment).
//!
//! # Watching
//!
//! [`KvSource::watch_prefix`] blocks the calling task until a change is
//! observed at a path matching the caller's interest prefixes, the supplied
//! [`CancellationToken`](tokio_util::sync::CancellationToken) fires
//! ([`Error::WatchCanceled`]), or the backend reports watching is
//! structurally unsupported ([`Error::WatchNotSupported`], returned without
//! blocking). The returned resume token is backend-local: a per-key version
//! counter for etcd, a bucket revision for NATS, an edit counter for
//! documents.
//!
//! # Example
//!
//! ```rust,ignore
//! use polykv::{FileSource, KvSource, WatchOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let source = FileSource::builder("/etc/app/config.yml").build()?;
//! let values = source.get_values(&["/database".to_string()]).await?;
//!
//! let cancel = CancellationToken::new();
//! let options = WatchOptions::default().with_interest_prefixes(["/database"]);
//! let revision = source.watch_prefix(cancel, "/", options).await?;
//! ```

mod backends;
mod errors;
mod path;
mod replay;
mod settings;
mod source;
mod watch;
pub mod utils;

pub use backends::*;
pub use errors::*;
pub use path::*;
pub use replay::*;
pub use settings::*;
pub use source::*;
pub use watch::*;

#[cfg(test)]
mod source_test;
#[cfg(test)]
mod watch_test;
