//! Request configuration: the per-call descriptor, the deep merge, and the
//! defaults registry.
//!
//! A call's effective configuration is layered, highest precedence first:
//! explicit per-call options, client instance options, verb-specific
//! defaults, then the generic `request` entry of the registry. Merging is a
//! deep structural merge that clones everything it touches, so an issued
//! descriptor can never be changed retroactively by mutating a defaults
//! table.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use http::Method;
use parking_lot::RwLock;

use crate::body::Body;
use crate::headers::Headers;
use crate::response::ResponseKind;
use crate::subscription::CancelSignal;
use crate::transport::SocketAgent;
use crate::{DEFAULT_ACCEPT, DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER};

/// Codec sub-options for a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodecOptions {
    /// Compress the outgoing body.
    pub compress: Option<bool>,
    /// Reverse codec compression on responses carrying the marker header.
    pub decompress: Option<bool>,
    /// Only adopt compressed bytes when the codec reports a positive gain.
    pub only_positive: Option<bool>,
}

impl CodecOptions {
    fn merged_over(&self, lower: &Self) -> Self {
        Self {
            compress: self.compress.or(lower.compress),
            decompress: self.decompress.or(lower.decompress),
            only_positive: self.only_positive.or(lower.only_positive),
        }
    }

    /// Effective compression flag (off unless configured).
    pub fn compress_enabled(&self) -> bool {
        self.compress.unwrap_or(false)
    }

    /// Effective decompression flag (off unless configured).
    pub fn decompress_enabled(&self) -> bool {
        self.decompress.unwrap_or(false)
    }

    /// Effective positive-gain requirement (on unless configured off).
    pub fn only_positive(&self) -> bool {
        self.only_positive.unwrap_or(true)
    }
}

/// CSRF cookie/header names for a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsrfOptions {
    /// Cookie to read the token from.
    pub cookie: Option<String>,
    /// Header to carry the token on the request.
    pub header: Option<String>,
}

impl CsrfOptions {
    fn merged_over(&self, lower: &Self) -> Self {
        Self {
            cookie: self.cookie.clone().or_else(|| lower.cookie.clone()),
            header: self.header.clone().or_else(|| lower.header.clone()),
        }
    }
}

/// Per-scheme connection-reuse handles for the socket transport.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    /// Agent applied to plain (`http`) connections.
    pub insecure: Option<Arc<SocketAgent>>,
    /// Agent applied to TLS (`https`) connections.
    pub secure: Option<Arc<SocketAgent>>,
}

impl AgentOptions {
    fn merged_over(&self, lower: &Self) -> Self {
        Self {
            insecure: self.insecure.clone().or_else(|| lower.insecure.clone()),
            secure: self.secure.clone().or_else(|| lower.secure.clone()),
        }
    }
}

impl PartialEq for AgentOptions {
    fn eq(&self, other: &Self) -> bool {
        self.insecure.as_deref() == other.insecure.as_deref()
            && self.secure.as_deref() == other.secure.as_deref()
    }
}

/// Request-side options for a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSection {
    /// Request headers; names are case-insensitive, maps merge key-by-key.
    pub headers: Headers,
    /// Include credentials; also gates CSRF injection.
    pub with_credentials: Option<bool>,
    /// CSRF cookie/header names.
    pub csrf: CsrfOptions,
    /// Codec sub-options.
    pub codec: CodecOptions,
    /// Connection-reuse handles.
    pub agents: AgentOptions,
    /// Transport-enforced timeout. `None` means no timeout.
    pub timeout: Option<Duration>,
}

impl RequestSection {
    fn merged_over(&self, lower: &Self) -> Self {
        Self {
            headers: self.headers.merged_over(&lower.headers),
            with_credentials: self.with_credentials.or(lower.with_credentials),
            csrf: self.csrf.merged_over(&lower.csrf),
            codec: self.codec.merged_over(&lower.codec),
            agents: self.agents.merged_over(&lower.agents),
            timeout: self.timeout.or(lower.timeout),
        }
    }
}

/// Response-handling options for a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSection {
    /// Resolve with the decoded body alone instead of the full envelope.
    pub pure: Option<bool>,
    /// Resolve (rather than reject) on non-success status codes.
    pub resolve_on_error: Option<bool>,
    /// Declared response interpretation.
    pub kind: Option<ResponseKind>,
    /// Auto-parse textual responses as JSON.
    pub parse_json: Option<bool>,
}

impl ResponseSection {
    fn merged_over(&self, lower: &Self) -> Self {
        Self {
            pure: self.pure.or(lower.pure),
            resolve_on_error: self.resolve_on_error.or(lower.resolve_on_error),
            kind: self.kind.or(lower.kind),
            parse_json: self.parse_json.or(lower.parse_json),
        }
    }
}

/// Fully layered configuration for a single call.
///
/// Built once per call by [`resolve`]; immutable from the pipeline's point
/// of view after the pre-send hook has run.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Target URL or path.
    pub url: Option<String>,
    /// Fragment prepended to the URL (e.g. a base origin).
    pub url_start: Option<String>,
    /// Fragment appended to the URL (e.g. an API suffix).
    pub url_end: Option<String>,
    /// HTTP method; filled from the registry when absent.
    pub method: Option<Method>,
    /// Logical request body.
    pub body: Option<Body>,
    /// Request-side options.
    pub request: RequestSection,
    /// Response-handling options.
    pub response: ResponseSection,
    /// Cancellation handle for the in-flight call.
    pub cancel: Option<Arc<CancelSignal>>,
}

impl RequestOptions {
    /// Merges `self` over `lower`: present fields win, nested sections merge
    /// field-by-field, header maps key-by-key. Neither input is mutated.
    pub fn merged_over(&self, lower: &Self) -> Self {
        Self {
            url: self.url.clone().or_else(|| lower.url.clone()),
            url_start: self.url_start.clone().or_else(|| lower.url_start.clone()),
            url_end: self.url_end.clone().or_else(|| lower.url_end.clone()),
            method: self.method.clone().or_else(|| lower.method.clone()),
            body: self.body.clone().or_else(|| lower.body.clone()),
            request: self.request.merged_over(&lower.request),
            response: self.response.merged_over(&lower.response),
            cancel: self.cancel.clone().or_else(|| lower.cancel.clone()),
        }
    }

    /// Concatenates the resolved start fragment, URL, and end fragment.
    pub fn full_url(&self) -> Option<String> {
        self.url.as_ref().map(|url| {
            format!(
                "{}{}{}",
                self.url_start.as_deref().unwrap_or(""),
                url,
                self.url_end.as_deref().unwrap_or("")
            )
        })
    }
}

impl PartialEq for RequestOptions {
    fn eq(&self, other: &Self) -> bool {
        let cancel_matches = match (&self.cancel, &other.cancel) {
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        };
        self.url == other.url
            && self.url_start == other.url_start
            && self.url_end == other.url_end
            && self.method == other.method
            && self.body == other.body
            && self.request == other.request
            && self.response == other.response
            && cancel_matches
    }
}

/// Per-verb default fragments, layered beneath instance and per-call
/// options.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultsRegistry {
    /// Base layer for every call; also supplies the default method.
    pub request: RequestOptions,
    /// GET-specific defaults.
    pub get: RequestOptions,
    /// POST-specific defaults.
    pub post: RequestOptions,
    /// PUT-specific defaults.
    pub put: RequestOptions,
    /// PATCH-specific defaults.
    pub patch: RequestOptions,
    /// DELETE-specific defaults.
    pub delete: RequestOptions,
    /// HEAD-specific defaults.
    pub head: RequestOptions,
    /// OPTIONS-specific defaults.
    pub options: RequestOptions,
}

impl DefaultsRegistry {
    /// The frozen template the registry is initialized from and reset to.
    pub fn template() -> Self {
        let mut request = RequestOptions::default();
        request.method = Some(Method::GET);
        request.request.headers.set("accept", DEFAULT_ACCEPT);
        request.request.codec = CodecOptions {
            compress: Some(false),
            decompress: Some(true),
            only_positive: Some(true),
        };
        request.request.csrf = CsrfOptions {
            cookie: Some(DEFAULT_CSRF_COOKIE.to_string()),
            header: Some(DEFAULT_CSRF_HEADER.to_string()),
        };
        request.response = ResponseSection {
            pure: None,
            resolve_on_error: Some(true),
            kind: Some(ResponseKind::Json),
            parse_json: Some(true),
        };

        let json_body = || {
            let mut options = RequestOptions::default();
            options
                .request
                .headers
                .set("content-type", mime::APPLICATION_JSON.as_ref());
            options
        };

        Self {
            request,
            get: RequestOptions::default(),
            post: json_body(),
            put: json_body(),
            patch: json_body(),
            delete: RequestOptions::default(),
            head: RequestOptions::default(),
            options: RequestOptions::default(),
        }
    }

    /// Restores the registry to the frozen template.
    pub fn reset(&mut self) {
        *self = Self::template();
    }

    /// Returns the verb-specific entry for `method`.
    pub fn entry(&self, method: &Method) -> &RequestOptions {
        match *method {
            Method::GET => &self.get,
            Method::POST => &self.post,
            Method::PUT => &self.put,
            Method::PATCH => &self.patch,
            Method::DELETE => &self.delete,
            Method::HEAD => &self.head,
            Method::OPTIONS => &self.options,
            _ => &self.request,
        }
    }

    /// Mutable access to the verb-specific entry for `method`.
    pub fn entry_mut(&mut self, method: &Method) -> &mut RequestOptions {
        match *method {
            Method::GET => &mut self.get,
            Method::POST => &mut self.post,
            Method::PUT => &mut self.put,
            Method::PATCH => &mut self.patch,
            Method::DELETE => &mut self.delete,
            Method::HEAD => &mut self.head,
            Method::OPTIONS => &mut self.options,
            _ => &mut self.request,
        }
    }

    /// Process-wide registry used by clients unless one is injected.
    pub fn shared() -> Arc<RwLock<DefaultsRegistry>> {
        static SHARED: OnceLock<Arc<RwLock<DefaultsRegistry>>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(RwLock::new(DefaultsRegistry::template())))
            .clone()
    }
}

impl Default for DefaultsRegistry {
    fn default() -> Self {
        Self::template()
    }
}

/// Layers a call's configuration: explicit options over instance options
/// over the verb-specific entry over the generic `request` entry.
pub fn resolve(
    explicit: &RequestOptions,
    instance: &RequestOptions,
    registry: &DefaultsRegistry,
) -> RequestOptions {
    let base = explicit.merged_over(instance);
    let method = base
        .method
        .clone()
        .or_else(|| registry.request.method.clone())
        .unwrap_or(Method::GET);

    let mut merged = base
        .merged_over(registry.entry(&method))
        .merged_over(&registry.request);
    if merged.method.is_none() {
        merged.method = Some(method);
    }
    merged
}
