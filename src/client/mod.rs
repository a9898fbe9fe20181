//! Client surface and the request executor.
//!
//! One logical call runs a single sequential pipeline:
//! building (merge + body encode) → dispatching (pre-send hook, transport)
//! → settled. Every terminal state emits the post-settle hook exactly once,
//! then exactly one of the success/error/fail hooks, and releases the
//! cancellation subscription exactly once.


use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use crate::body::{self, Body};
use crate::codec::{ContentCodec, DeflateJsonCodec};
use crate::config::{resolve, DefaultsRegistry, RequestOptions};
use crate::cookies::{CookieSource, NoCookies};
use crate::errors::{FailureKind, RequestError, RequestResult};
use crate::interceptors::{FailureReport, InterceptorSet, Settlement};
use crate::response::{self, ResponseBody, ResponseEnvelope, TransportHandle};
use crate::subscription::{CancelFn, CancelSignal};
use crate::transport::{
    AbortToken, Dispatch, ManagedTransport, SocketTransport, TerminalSignal, TransportBackend,
    TransportCall, TransportKind,
};

/// Resolved outcome of a call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The full response envelope (the default).
    Envelope(Box<ResponseEnvelope>),
    /// The decoded body alone (`pure` mode).
    Pure(ResponseBody),
}

impl Reply {
    /// The envelope, when this reply carries one.
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            Reply::Envelope(envelope) => Some(envelope),
            Reply::Pure(_) => None,
        }
    }

    /// Status code, when the envelope is present.
    pub fn status(&self) -> Option<u16> {
        self.envelope().and_then(|envelope| envelope.status)
    }

    /// The decoded body, either way.
    pub fn body(&self) -> &ResponseBody {
        match self {
            Reply::Envelope(envelope) => &envelope.body,
            Reply::Pure(body) => body,
        }
    }

    /// Consumes the reply, returning the decoded body.
    pub fn into_body(self) -> ResponseBody {
        match self {
            Reply::Envelope(envelope) => envelope.body,
            Reply::Pure(body) => body,
        }
    }
}

/// Unified HTTP request client.
///
/// Cheap to share behind an `Arc`; concurrent calls are fully independent.
pub struct Client {
    instance: RequestOptions,
    defaults: Arc<RwLock<DefaultsRegistry>>,
    interceptors: InterceptorSet,
    codec: Arc<dyn ContentCodec>,
    transport: Arc<dyn TransportBackend>,
}

impl Client {
    /// Creates a client with default options and the managed transport.
    pub fn new() -> RequestResult<Self> {
        Self::builder().build()
    }

    /// Creates a client with instance-level options layered beneath every
    /// call.
    pub fn with_options(options: RequestOptions) -> RequestResult<Self> {
        Self::builder().options(options).build()
    }

    /// Starts a client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Instance-scoped interceptors, emitted before the process-wide set.
    pub fn interceptors(&self) -> &InterceptorSet {
        &self.interceptors
    }

    /// The defaults registry this client layers beneath calls.
    pub fn defaults(&self) -> Arc<RwLock<DefaultsRegistry>> {
        self.defaults.clone()
    }

    /// Executes a fully described request.
    pub async fn request(&self, options: RequestOptions) -> RequestResult<Reply> {
        // Building: layer the configuration against a snapshot of the
        // registry, so a default mutated mid-flight cannot touch this call.
        let registry = self.defaults.read().clone();
        let mut descriptor = resolve(&options, &self.instance, &registry);

        let url_text = descriptor
            .full_url()
            .ok_or_else(|| RequestError::configuration("request URL is required"))?;
        let url: Url = url_text.parse().map_err(|error| RequestError::Configuration {
            message: format!("invalid request URL {url_text:?}: {error}"),
        })?;
        let method = descriptor
            .method
            .clone()
            .ok_or_else(|| RequestError::configuration("request method is required"))?;

        let codec_options = descriptor.request.codec.clone();
        let bytes = body::encode(
            descriptor.body.as_ref(),
            &mut descriptor.request.headers,
            &codec_options,
            self.codec.as_ref(),
        );

        // Dispatching: pre-send hooks see the descriptor by mutable
        // reference, instance scope first.
        self.interceptors
            .request
            .pre
            .emit(&mut descriptor)
            .await
            .map_err(RequestError::interceptor)?;
        InterceptorSet::global()
            .request
            .pre
            .emit(&mut descriptor)
            .await
            .map_err(RequestError::interceptor)?;

        let abort = AbortToken::new();
        let _cancel_guard = CancelGuard::arm(descriptor.cancel.clone(), &abort);

        let call = TransportCall {
            method: method.clone(),
            url: url.clone(),
            headers: descriptor.request.headers.clone(),
            body: bytes,
            timeout: descriptor.request.timeout,
            with_credentials: descriptor.request.with_credentials.unwrap_or(false),
            csrf: descriptor.request.csrf.clone(),
            agents: descriptor.request.agents.clone(),
            abort,
        };

        debug!(%method, url = %url, transport = ?self.transport.kind(), "dispatching request");
        let Dispatch {
            signal,
            headers_sent,
        } = self.transport.execute(call).await;
        let handle = TransportHandle {
            kind: self.transport.kind(),
            headers_sent,
        };

        match signal {
            TerminalSignal::Response {
                status,
                headers,
                body,
            } => {
                let decoded = response::decode(&body, &headers, &descriptor, self.codec.as_ref());
                let envelope = ResponseEnvelope {
                    body: decoded,
                    status: Some(status),
                    headers,
                    handle,
                    options: descriptor,
                };
                self.settle_response(envelope).await
            }
            TerminalSignal::Failure {
                kind,
                status,
                headers,
            } => {
                let envelope = ResponseEnvelope {
                    body: ResponseBody::Empty,
                    status,
                    headers,
                    handle,
                    options: descriptor,
                };
                self.settle_failure(kind, envelope).await
            }
        }
    }

    /// GET convenience entry point.
    pub async fn get(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> RequestResult<Reply> {
        self.verb(Method::GET, url, None, options).await
    }

    /// POST convenience entry point.
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> RequestResult<Reply> {
        self.verb(Method::POST, url, Some(body.into()), options).await
    }

    /// PUT convenience entry point.
    pub async fn put(
        &self,
        url: impl Into<String>,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> RequestResult<Reply> {
        self.verb(Method::PUT, url, Some(body.into()), options).await
    }

    /// PATCH convenience entry point.
    pub async fn patch(
        &self,
        url: impl Into<String>,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> RequestResult<Reply> {
        self.verb(Method::PATCH, url, Some(body.into()), options).await
    }

    /// DELETE convenience entry point.
    pub async fn delete(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> RequestResult<Reply> {
        self.verb(Method::DELETE, url, None, options).await
    }

    /// HEAD convenience entry point.
    pub async fn head(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> RequestResult<Reply> {
        self.verb(Method::HEAD, url, None, options).await
    }

    /// OPTIONS convenience entry point.
    pub async fn options(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> RequestResult<Reply> {
        self.verb(Method::OPTIONS, url, None, options).await
    }

    async fn verb(
        &self,
        method: Method,
        url: impl Into<String>,
        body: Option<Body>,
        mut options: RequestOptions,
    ) -> RequestResult<Reply> {
        options.url = Some(url.into());
        options.method = Some(method);
        if body.is_some() {
            options.body = body;
        }
        self.request(options).await
    }

    async fn emit_post(&self, settlement: &mut Settlement) -> RequestResult<()> {
        self.interceptors
            .request
            .post
            .emit(settlement)
            .await
            .map_err(RequestError::interceptor)?;
        InterceptorSet::global()
            .request
            .post
            .emit(settlement)
            .await
            .map_err(RequestError::interceptor)
    }

    async fn settle_response(&self, envelope: ResponseEnvelope) -> RequestResult<Reply> {
        let pure = envelope.options.response.pure.unwrap_or(false);
        let resolve_on_error = envelope.options.response.resolve_on_error.unwrap_or(false);
        let success = envelope.is_success();

        let mut settlement = Settlement::Response(envelope);
        self.emit_post(&mut settlement).await?;
        let mut envelope = match settlement {
            Settlement::Response(envelope) => envelope,
            Settlement::Failure(report) => report.envelope,
        };

        if success {
            self.interceptors
                .response
                .success
                .emit(&mut envelope)
                .await
                .map_err(RequestError::interceptor)?;
            InterceptorSet::global()
                .response
                .success
                .emit(&mut envelope)
                .await
                .map_err(RequestError::interceptor)?;
        } else {
            self.interceptors
                .response
                .error
                .emit(&mut envelope)
                .await
                .map_err(RequestError::interceptor)?;
            InterceptorSet::global()
                .response
                .error
                .emit(&mut envelope)
                .await
                .map_err(RequestError::interceptor)?;

            if !resolve_on_error {
                debug!(status = ?envelope.status, "settled with error status");
                return Err(RequestError::Status {
                    envelope: Box::new(envelope),
                });
            }
        }

        debug!(status = ?envelope.status, "settled");
        Ok(if pure {
            Reply::Pure(envelope.body)
        } else {
            Reply::Envelope(Box::new(envelope))
        })
    }

    async fn settle_failure(
        &self,
        kind: FailureKind,
        envelope: ResponseEnvelope,
    ) -> RequestResult<Reply> {
        let mut settlement = Settlement::Failure(FailureReport { kind, envelope });
        self.emit_post(&mut settlement).await?;
        let mut report = match settlement {
            Settlement::Failure(report) => report,
            Settlement::Response(envelope) => FailureReport { kind, envelope },
        };

        self.interceptors
            .response
            .fail
            .emit(&mut report)
            .await
            .map_err(RequestError::interceptor)?;
        InterceptorSet::global()
            .response
            .fail
            .emit(&mut report)
            .await
            .map_err(RequestError::interceptor)?;

        debug!(kind = %report.kind, "settled with transport failure");
        Err(RequestError::Transport {
            kind: report.kind,
            envelope: Box::new(report.envelope),
        })
    }
}

/// Ties the transport abort callback to the call's cancellation handle for
/// exactly the lifetime of the call. Dropping the guard (any settlement
/// path, including interceptor errors) releases the subscription once.
struct CancelGuard {
    armed: Option<(Arc<CancelSignal>, CancelFn)>,
}

impl CancelGuard {
    fn arm(signal: Option<Arc<CancelSignal>>, abort: &AbortToken) -> Self {
        let Some(signal) = signal else {
            return Self { armed: None };
        };
        let token = abort.clone();
        let callback: CancelFn = Arc::new(move || token.trigger());
        signal.subscribe(callback.clone());
        Self {
            armed: Some((signal, callback)),
        }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some((signal, callback)) = self.armed.take() {
            signal.unsubscribe(&callback);
        }
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    instance: RequestOptions,
    transport: TransportKind,
    backend: Option<Arc<dyn TransportBackend>>,
    codec: Option<Arc<dyn ContentCodec>>,
    cookies: Option<Arc<dyn CookieSource>>,
    origin: Option<String>,
    defaults: Option<Arc<RwLock<DefaultsRegistry>>>,
}

impl ClientBuilder {
    /// Instance-level options layered beneath every call.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.instance = options;
        self
    }

    /// Selects the transport variant.
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.transport = kind;
        self
    }

    /// Injects a custom transport backend (overrides [`Self::transport`]).
    pub fn transport_backend(mut self, backend: Arc<dyn TransportBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Overrides the content codec.
    pub fn codec(mut self, codec: Arc<dyn ContentCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Injects the cookie source used for CSRF lookup.
    pub fn cookies(mut self, cookies: Arc<dyn CookieSource>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Sets the client's own origin; same-origin targets get CSRF injection
    /// even without credential inclusion.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Injects a defaults registry (the process-wide one is used otherwise).
    pub fn defaults(mut self, defaults: Arc<RwLock<DefaultsRegistry>>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Builds the client.
    pub fn build(self) -> RequestResult<Client> {
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(DeflateJsonCodec) as Arc<dyn ContentCodec>);
        let cookies = self
            .cookies
            .unwrap_or_else(|| Arc::new(NoCookies) as Arc<dyn CookieSource>);
        let origin = self
            .origin
            .map(|origin| {
                origin.parse::<Url>().map_err(|error| RequestError::Configuration {
                    message: format!("invalid origin {origin:?}: {error}"),
                })
            })
            .transpose()?;

        let transport = match self.backend {
            Some(backend) => backend,
            None => match self.transport {
                TransportKind::Managed => {
                    Arc::new(ManagedTransport::new(cookies, origin)?) as Arc<dyn TransportBackend>
                }
                TransportKind::Socket => Arc::new(SocketTransport::new()),
            },
        };

        Ok(Client {
            instance: self.instance,
            defaults: self.defaults.unwrap_or_else(DefaultsRegistry::shared),
            interceptors: InterceptorSet::new(),
            codec,
            transport,
        })
    }
}
