//! # Unified HTTP Request Client
//!
//! Production-ready HTTP request client presenting one request/response
//! contract over two transport backends.
//!
//! ## Features
//!
//! - One promise-like outcome contract over two transports: a managed
//!   variant (pooled high-level HTTP client) and a socket variant (raw
//!   TCP/TLS streams), behaviorally identical from the caller's view
//! - Layered configuration: per-call options over instance options over
//!   per-verb defaults over a resettable global template
//! - Body/content-codec negotiation with a positive-gain gate and a marker
//!   header for transparent decompression
//! - Interceptor chain with four hook points (pre-send, post-settle,
//!   on-success, on-error/on-fail), instance and process-wide scopes
//! - Cooperative cancellation through a one-shot handle, surfaced as a
//!   normal `abort` settlement
//! - Type-safe error taxonomy separating status errors from transport
//!   failures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_request::{Client, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new()?;
//!
//!     let reply = client
//!         .get("https://api.example.com/posts/1", RequestOptions::default())
//!         .await?;
//!     println!("status: {:?}", reply.status());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `client` - Client surface and the request executor
//! - `config` - Per-call descriptor, deep merge, defaults registry
//! - `body` - Logical bodies and the wire encoder
//! - `codec` - Content codec seam and the bundled implementation
//! - `response` - Response envelope and body decoding
//! - `transport` - Transport contract and both backend variants
//! - `interceptors` - Hook points and scopes
//! - `subscription` - Subscriber lists and the cancellation signal
//! - `headers` - Case-insensitive header mapping with value coercion
//! - `cookies` - Cookie lookup seam for CSRF injection
//! - `errors` - Error types and taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod body;
pub mod client;
pub mod codec;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod headers;
pub mod interceptors;
pub mod response;
pub mod subscription;
pub mod transport;

// Development/testing modules
#[cfg(test)]
pub mod fixtures;
#[cfg(test)]
pub mod mocks;

// Re-exports for convenience
pub use body::{Body, FormPart, MultipartForm};
pub use client::{Client, ClientBuilder, Reply};
pub use codec::{binary_value, CodecError, Compressed, ContentCodec, DeflateJsonCodec};
pub use config::{
    AgentOptions, CodecOptions, CsrfOptions, DefaultsRegistry, RequestOptions, RequestSection,
    ResponseSection,
};
pub use cookies::{CookieSource, NoCookies, StaticCookies};
pub use errors::{FailureKind, RequestError, RequestResult};
pub use headers::Headers;
pub use interceptors::{FailureReport, InterceptorSet, RequestHooks, ResponseHooks, Settlement};
pub use response::{ResponseBody, ResponseEnvelope, ResponseKind, TransportHandle};
pub use subscription::{
    subscriber, try_subscriber, CancelFn, CancelSignal, Subscriber, SubscriberError,
    SubscriberHandle, SubscriberList,
};
pub use transport::{
    AbortToken, Dispatch, ManagedTransport, SocketAgent, SocketTransport, TerminalSignal,
    TransportBackend, TransportCall, TransportKind,
};

/// Marker header signaling the body was compressed by the content codec.
pub const CODEC_ENCODING_HEADER: &str = "x-integrations-encoding";

/// Fixed value carried by [`CODEC_ENCODING_HEADER`].
pub const CODEC_ENCODING_VALUE: &str = "deflate-json";

/// Default `accept` header applied by the defaults template.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Default cookie read for CSRF injection.
pub const DEFAULT_CSRF_COOKIE: &str = "CSRF-TOKEN";

/// Default header carrying the CSRF token.
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// User-agent supplied by the socket transport when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("integrations-request/", env!("CARGO_PKG_VERSION"));
