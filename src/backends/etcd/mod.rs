//! etcd v3 (consensus store) adapter.
//!
//! Keys are already canonical `/`-rooted paths, so no codec is involved.
//! The adapter speaks the etcd gRPC API directly over a lazily-(re)built
//! `tonic` channel: `Range` for prefix reads, the bidirectional `Watch`
//! stream for change notification and `Authenticate` when basic auth is
//! configured (the issued token rides every request as `token` metadata).
//!
//! The native watch subscription is scoped to the literal `prefix`; incoming
//! events are additionally filtered against the caller's interest prefixes.
//! Narrow interest prefixes under a broad subscription cut spurious wakeups
//! but cannot eliminate them: subscription is by literal byte prefix, so
//! `/ab` still wakes for `/abc`. The returned resume token is the triggering
//! key's per-key version counter; cancellation returns with the caller's
//! token unchanged and resumption is best-effort by design.

mod proto;


use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tonic::{Code, Status};
use tracing::{debug, warn};

use crate::path::is_relevant;
use crate::utils::{endpoint_url, ScopedTimer};
use crate::{BackendError, DecodeError, Error, KvSource, Result, WatchOptions};

use proto::range_request::{SortOrder, SortTarget};
use proto::watch_request::RequestUnion;
use proto::{
    AuthenticateRequest, AuthenticateResponse, RangeRequest, RangeResponse, WatchCreateRequest,
    WatchRequest, WatchResponse,
};

const KV_RANGE: &str = "/etcdserverpb.KV/Range";
const WATCH_WATCH: &str = "/etcdserverpb.Watch/Watch";
const AUTH_AUTHENTICATE: &str = "/etcdserverpb.Auth/Authenticate";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// One established connection plus the auth token minted for it.
#[derive(Clone)]
struct Session {
    channel: Channel,
    token: Option<AsciiMetadataValue>,
}

/// Adapter for an etcd v3 cluster.
pub struct EtcdSource {
    endpoints: Vec<String>,
    tls: Option<ClientTlsConfig>,
    auth: Option<(String, String)>,
    serializable: bool,
    connect_timeout: Duration,
    request_timeout: Duration,
    session: Mutex<Option<Session>>,
}

/// Builder for [`EtcdSource`]; `connect` validates the options, loads TLS
/// material and dials the first reachable endpoint.
#[derive(Debug, Default)]
pub struct EtcdSourceBuilder {
    endpoints: Vec<String>,
    ca_cert: Option<String>,
    client_cert: Option<String>,
    client_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    serializable: bool,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl EtcdSourceBuilder {
    fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ..Self::default()
        }
    }

    /// Trust anchor for server verification (PEM file path).
    pub fn ca_cert(
        mut self,
        path: impl Into<String>,
    ) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Client certificate and key for mutual TLS (PEM file paths).
    pub fn client_identity(
        mut self,
        cert_path: impl Into<String>,
        key_path: impl Into<String>,
    ) -> Self {
        self.client_cert = Some(cert_path.into());
        self.client_key = Some(key_path.into());
        self
    }

    /// Enable basic authentication; a token is minted via `Authenticate`.
    pub fn basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Serve reads from the contacted member without quorum.
    pub fn serializable(
        mut self,
        serializable: bool,
    ) -> Self {
        self.serializable = serializable;
        self
    }

    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Timeout applied to each unary request (not to watch streams).
    pub fn request_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate options and establish the initial connection.
    pub async fn connect(self) -> Result<EtcdSource> {
        if self.endpoints.is_empty() {
            return Err(BackendError::invalid_options("etcd", "no endpoints configured").into());
        }

        let mut tls = None;
        if self.ca_cert.is_some() || self.client_cert.is_some() {
            let mut config = ClientTlsConfig::new();
            if let Some(path) = &self.ca_cert {
                let pem = tokio::fs::read(path).await?;
                config = config.ca_certificate(Certificate::from_pem(pem));
            }
            if let (Some(cert), Some(key)) = (&self.client_cert, &self.client_key) {
                let cert = tokio::fs::read(cert).await?;
                let key = tokio::fs::read(key).await?;
                config = config.identity(Identity::from_pem(cert, key));
            }
            tls = Some(config);
        }

        let source = EtcdSource {
            endpoints: self.endpoints,
            tls,
            auth: self.username.zip(self.password),
            serializable: self.serializable,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            session: Mutex::new(None),
        };

        // Fail construction, not the first read, when nothing is reachable.
        source.session().await?;
        Ok(source)
    }
}

impl EtcdSource {
    pub fn builder<I, S>(endpoints: I) -> EtcdSourceBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EtcdSourceBuilder::new(endpoints)
    }

    /// Return the established session, dialing and authenticating if none is
    /// cached.
    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let channel = self.connect_channel().await?;
        let token = match &self.auth {
            Some((username, password)) => {
                Some(self.authenticate(&channel, username, password).await?)
            }
            None => None,
        };

        let session = Session { channel, token };
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached session so the next operation dials fresh.
    async fn invalidate(&self) {
        self.session.lock().await.take();
    }

    async fn connect_channel(&self) -> Result<Channel> {
        let mut last_err: Option<Error> = None;
        for endpoint in &self.endpoints {
            let url = endpoint_url(endpoint, self.tls.is_some());
            match self.dial(&url).await {
                Ok(channel) => {
                    debug!("connected to etcd endpoint {url}");
                    return Ok(channel);
                }
                Err(e) => {
                    warn!("connect to {url} failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Err(BackendError::unavailable("etcd", "no endpoints configured").into()),
        }
    }

    async fn dial(
        &self,
        url: &str,
    ) -> Result<Channel> {
        let mut endpoint = Endpoint::try_from(url.to_string())?
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(60)));
        if let Some(tls) = &self.tls {
            endpoint = endpoint.tls_config(tls.clone())?;
        }
        Ok(endpoint.connect().await?)
    }

    /// One unary etcd call with the per-request timeout applied.
    async fn unary<Req, Resp>(
        &self,
        channel: &Channel,
        token: Option<&AsciiMetadataValue>,
        path: &'static str,
        message: Req,
    ) -> std::result::Result<Resp, Status>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let mut request = tonic::Request::new(message);
        if let Some(token) = token {
            request.metadata_mut().insert("token", token.clone());
        }

        let response = tokio::time::timeout(
            self.request_timeout,
            grpc.unary(request, PathAndQuery::from_static(path), codec),
        )
        .await
        .map_err(|_| Status::deadline_exceeded("etcd request timed out"))??;
        Ok(response.into_inner())
    }

    async fn authenticate(
        &self,
        channel: &Channel,
        username: &str,
        password: &str,
    ) -> Result<AsciiMetadataValue> {
        let request = AuthenticateRequest {
            name: username.to_string(),
            password: password.to_string(),
        };
        let response: AuthenticateResponse = self
            .unary(channel, None, AUTH_AUTHENTICATE, request)
            .await
            .map_err(Error::from)?;

        AsciiMetadataValue::try_from(response.token)
            .map_err(|e| BackendError::request("etcd", format!("unusable auth token: {e}")).into())
    }

    /// Range with one silent reconnect on a connectivity-shaped failure.
    async fn range(
        &self,
        request: RangeRequest,
    ) -> Result<RangeResponse> {
        let session = self.session().await?;
        match self
            .unary(&session.channel, session.token.as_ref(), KV_RANGE, request.clone())
            .await
        {
            Ok(response) => Ok(response),
            Err(status) if connectivity_failure(&status) => {
                debug!("etcd range failed ({status}), reconnecting once");
                self.invalidate().await;
                let session = self.session().await?;
                self.unary(&session.channel, session.token.as_ref(), KV_RANGE, request)
                    .await
                    .map_err(Error::from)
            }
            Err(status) => Err(status.into()),
        }
    }
}

/// Status codes that indicate the channel, not the request, went bad.
fn connectivity_failure(status: &Status) -> bool {
    matches!(status.code(), Code::Unavailable | Code::Unknown | Code::DeadlineExceeded)
}

/// The `[key, range_end)` pair covering everything at or below `prefix`.
///
/// `range_end` is the prefix with its last byte incremented (trailing 0xff
/// bytes dropped); the empty prefix addresses the whole keyspace.
fn prefix_range(prefix: &str) -> (Vec<u8>, Vec<u8>) {
    let key = prefix.as_bytes().to_vec();
    if key.is_empty() {
        return (vec![0], vec![0]);
    }

    let mut end = key.clone();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return (key, end);
        }
    }
    // prefix is all 0xff bytes: read to the end of the keyspace
    (key, vec![0])
}

#[async_trait::async_trait]
impl KvSource for EtcdSource {
    async fn get_values(
        &self,
        prefixes: &[String],
    ) -> Result<HashMap<String, String>> {
        let _timer = ScopedTimer::new("etcd_get_values");

        let mut values = HashMap::new();
        for prefix in prefixes {
            let (key, range_end) = prefix_range(prefix);
            let request = RangeRequest {
                key,
                range_end,
                sort_order: SortOrder::Descend as i32,
                sort_target: SortTarget::Key as i32,
                serializable: self.serializable,
                ..RangeRequest::default()
            };

            let response = self.range(request).await?;
            for kv in response.kvs {
                let key = String::from_utf8(kv.key).map_err(|e| DecodeError::NotUtf8 {
                    key: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                })?;
                let value = String::from_utf8(kv.value)
                    .map_err(|_| DecodeError::NotUtf8 { key: key.clone() })?;
                values.insert(key, value);
            }
        }
        Ok(values)
    }

    async fn watch_prefix(
        &self,
        cancel: CancellationToken,
        prefix: &str,
        options: WatchOptions,
    ) -> Result<u64> {
        let session = self.session().await?;

        let (key, range_end) = prefix_range(prefix);
        let create = WatchRequest {
            request_union: Some(RequestUnion::CreateRequest(WatchCreateRequest {
                key,
                range_end,
                ..WatchCreateRequest::default()
            })),
        };

        let mut grpc = tonic::client::Grpc::new(session.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| BackendError::unavailable("etcd", e))?;
        let codec: ProstCodec<WatchRequest, WatchResponse> = ProstCodec::default();
        let mut request = tonic::Request::new(tokio_stream::once(create));
        if let Some(token) = &session.token {
            request.metadata_mut().insert("token", token.clone());
        }

        let response = grpc
            .streaming(request, PathAndQuery::from_static(WATCH_WATCH), codec)
            .await
            .map_err(Error::from)?;
        let mut stream = response.into_inner();

        loop {
            tokio::select! {
                biased;
                // Returning drops the stream, which tears down the native
                // watch on the server side.
                _ = cancel.cancelled() => return Err(Error::WatchCanceled),
                message = stream.message() => match message {
                    Err(status) => return Err(status.into()),
                    Ok(None) => return Err(BackendError::StreamClosed.into()),
                    Ok(Some(response)) => {
                        if response.canceled {
                            let reason = if response.cancel_reason.is_empty() {
                                "watch canceled by server".to_string()
                            } else {
                                response.cancel_reason
                            };
                            return Err(BackendError::subscription("etcd", reason).into());
                        }
                        for event in response.events {
                            let Some(kv) = event.kv else { continue };
                            let key = String::from_utf8_lossy(&kv.key);
                            if is_relevant(&key, &options.interest_prefixes, prefix) {
                                return Ok(kv.version as u64);
                            }
                        }
                    }
                }
            }
        }
    }

    async fn close(&self) {
        // Dropping the channel closes the underlying HTTP/2 connection.
        self.invalidate().await;
    }
}
