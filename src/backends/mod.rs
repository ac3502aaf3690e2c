//! One adapter per backend, each independently satisfying the [`KvSource`]
//! contract.
//!
//! There is no shared base implementation: the adapters have nothing in
//! common beyond the trait and the path/replay helpers, and keeping them
//! separate keeps each backend's reconciliation protocol readable on its
//! own.
//!
//! [`KvSource`]: crate::KvSource

mod env;
mod etcd;
mod file;
mod nats;
mod redis;

pub use self::env::EnvSource;
pub use self::etcd::{EtcdSource, EtcdSourceBuilder};
pub use self::file::{FileSource, FileSourceBuilder};
pub use self::nats::{NatsSource, NatsSourceBuilder};
pub use self::redis::{RedisSource, RedisSourceBuilder};

#[cfg(test)]
mod file_test;
