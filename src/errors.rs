//! Error hierarchy for backend access and watch reconciliation.
//!
//! Two of the variants are sentinels rather than failures: callers are
//! expected to match on [`Error::WatchCanceled`] (the watch was told to stop,
//! nothing changed) and [`Error::WatchNotSupported`] (the backend can
//! structurally never watch) to drive their control flow.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend can structurally never notify about changes. Returned
    /// synchronously, never retried.
    #[error("watch is not supported by this backend")]
    WatchNotSupported,

    /// The caller's cancellation token fired before a relevant change was
    /// observed. The caller's resume token is unchanged.
    #[error("watch canceled")]
    WatchCanceled,

    /// Connectivity and request failures of the underlying store
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Malformed native data encountered while decoding
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Settings file / environment parsing failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// True for the caller-initiated stop sentinel.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::WatchCanceled)
    }

    /// True when the backend can never support watching.
    pub fn is_watch_unsupported(&self) -> bool {
        matches!(self, Error::WatchNotSupported)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A required construction option is missing or malformed; checked
    /// before any connection attempt.
    #[error("invalid {backend} options: {reason}")]
    InvalidOptions {
        backend: &'static str,
        reason: String,
    },

    /// Connection could not be established or re-established after the one
    /// silent reconnect attempt each operation is allowed.
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    /// A request against an established connection failed
    #[error("{backend} request failed: {reason}")]
    Request {
        backend: &'static str,
        reason: String,
    },

    /// A native watch subscription could not be created or died mid-stream
    #[error("{backend} subscription failed: {reason}")]
    Subscription {
        backend: &'static str,
        reason: String,
    },

    /// The native event stream ended without error or cancellation
    #[error("watch stream closed unexpectedly")]
    StreamClosed,

    /// gRPC transport layer errors
    #[error(transparent)]
    Transport(#[from] Box<tonic::transport::Error>),

    /// gRPC status code errors
    #[error(transparent)]
    Grpc(#[from] Box<tonic::Status>),

    /// Redis protocol or connection errors
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// HTTP document fetch errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Local document I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn invalid_options(
        backend: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        BackendError::InvalidOptions {
            backend,
            reason: reason.to_string(),
        }
    }

    pub fn unavailable(
        backend: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        BackendError::Unavailable {
            backend,
            reason: reason.to_string(),
        }
    }

    pub fn request(
        backend: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        BackendError::Request {
            backend,
            reason: reason.to_string(),
        }
    }

    pub fn subscription(
        backend: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        BackendError::Subscription {
            backend,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Unparsable YAML/JSON document content
    #[error("invalid document: {0}")]
    Document(#[from] serde_yaml::Error),

    /// A native key or value that must be text is not valid UTF-8
    #[error("value at {key} is not valid UTF-8")]
    NotUtf8 { key: String },

    /// The document root must be a map or a sequence
    #[error("unsupported document root, expected map or sequence")]
    UnsupportedRoot,
}

// ============== Conversion Implementations ============== //
impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        BackendError::Transport(Box::new(err)).into()
    }
}

impl From<tonic::Status> for Error {
    fn from(err: tonic::Status) -> Self {
        BackendError::Grpc(Box::new(err)).into()
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        BackendError::Redis(err).into()
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err).into()
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        DecodeError::Document(err).into()
    }
}
