//! Interceptor hook points.
//!
//! Four stages per call, strictly ordered: `request.pre` (before the
//! transport, with the mutable descriptor), `request.post` (post-settle,
//! exactly once, with the settlement), then exactly one of
//! `response.success` / `response.error` / `response.fail`. For each stage
//! the executor emits the client-instance list first, then the process-wide
//! list.

use std::sync::OnceLock;

use crate::config::RequestOptions;
use crate::errors::FailureKind;
use crate::response::ResponseEnvelope;
use crate::subscription::SubscriberList;

/// Payload of the `response.fail` hook and of transport errors.
#[derive(Debug, Clone)]
pub struct FailureReport {
    /// Failure classification.
    pub kind: FailureKind,
    /// Best-effort envelope for the failed call.
    pub envelope: ResponseEnvelope,
}

/// Payload of the post-settle hook: the terminal outcome, either way.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// A real response arrived (any status).
    Response(ResponseEnvelope),
    /// The call failed without a usable response.
    Failure(FailureReport),
}

impl Settlement {
    /// The envelope attached to this settlement.
    pub fn envelope(&self) -> &ResponseEnvelope {
        match self {
            Settlement::Response(envelope) => envelope,
            Settlement::Failure(report) => &report.envelope,
        }
    }
}

/// Request-side hook points.
#[derive(Debug, Default)]
pub struct RequestHooks {
    /// Runs before the transport; receives the mutable descriptor.
    pub pre: SubscriberList<RequestOptions>,
    /// Post-settle; runs exactly once per call, regardless of outcome.
    pub post: SubscriberList<Settlement>,
}

/// Response-side hook points; exactly one fires per call.
#[derive(Debug, Default)]
pub struct ResponseHooks {
    /// Status in the success range.
    pub success: SubscriberList<ResponseEnvelope>,
    /// Status present but outside the success range.
    pub error: SubscriberList<ResponseEnvelope>,
    /// No usable status (abort, timeout, network error).
    pub fail: SubscriberList<FailureReport>,
}

/// One scope's worth of hook points (a client instance, or the process).
#[derive(Debug, Default)]
pub struct InterceptorSet {
    /// Request-side hooks.
    pub request: RequestHooks,
    /// Response-side hooks.
    pub response: ResponseHooks,
}

impl InterceptorSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide set, emitted after the instance set at every hook
    /// point.
    pub fn global() -> &'static InterceptorSet {
        static GLOBAL: OnceLock<InterceptorSet> = OnceLock::new();
        GLOBAL.get_or_init(InterceptorSet::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_set_is_a_singleton() {
        let first = InterceptorSet::global() as *const InterceptorSet;
        let second = InterceptorSet::global() as *const InterceptorSet;
        assert_eq!(first, second);
    }
}
