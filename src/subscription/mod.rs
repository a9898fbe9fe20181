//! Ordered subscriber lists and the one-shot cancellation signal.
//!
//! [`SubscriberList`] is a generic ordered, duplicate-suppressing list of
//! callback handles emitted sequentially; it knows nothing about HTTP.
//! [`CancelSignal`] specializes the same idea into a one-shot trigger used
//! as the cancellation handle for in-flight requests.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Error reported by a subscriber. Not caught by the emitting chain.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// A callback registered on a [`SubscriberList`].
#[async_trait]
pub trait Subscriber<T: Send>: Send + Sync {
    /// Invoked with the emitted value; subscribers may mutate it in place.
    async fn notify(&self, value: &mut T) -> Result<(), SubscriberError>;
}

/// Shared handle to a subscriber; identity (`Arc::ptr_eq`) is what
/// subscribe/unsubscribe compare.
pub type SubscriberHandle<T> = Arc<dyn Subscriber<T>>;

/// Ordered, duplicate-suppressing list of subscriber handles.
pub struct SubscriberList<T: Send> {
    entries: Mutex<Vec<SubscriberHandle<T>>>,
}

impl<T: Send> SubscriberList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber. Registering the same handle twice is a no-op.
    /// Returns the handle for later [`SubscriberList::unsubscribe`].
    pub fn subscribe(&self, subscriber: SubscriberHandle<T>) -> SubscriberHandle<T> {
        let mut entries = self.entries.lock();
        if !entries.iter().any(|entry| Arc::ptr_eq(entry, &subscriber)) {
            entries.push(subscriber.clone());
        }
        subscriber
    }

    /// Removes a subscriber by handle identity.
    pub fn unsubscribe(&self, subscriber: &SubscriberHandle<T>) {
        let mut entries = self.entries.lock();
        if let Some(position) = entries
            .iter()
            .position(|entry| Arc::ptr_eq(entry, subscriber))
        {
            entries.remove(position);
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invokes every subscriber sequentially, in registration order, each
    /// awaited before the next so later subscribers observe earlier side
    /// effects. The first subscriber error aborts the remaining chain.
    pub async fn emit(&self, value: &mut T) -> Result<(), SubscriberError> {
        let snapshot: Vec<_> = self.entries.lock().clone();
        for subscriber in snapshot {
            subscriber.notify(value).await?;
        }
        Ok(())
    }
}

impl<T: Send> Default for SubscriberList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> fmt::Debug for SubscriberList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberList")
            .field("len", &self.len())
            .finish()
    }
}

struct FnSubscriber<F>(F);

#[async_trait]
impl<T, F> Subscriber<T> for FnSubscriber<F>
where
    T: Send + 'static,
    F: Fn(&mut T) + Send + Sync,
{
    async fn notify(&self, value: &mut T) -> Result<(), SubscriberError> {
        (self.0)(value);
        Ok(())
    }
}

struct TryFnSubscriber<F>(F);

#[async_trait]
impl<T, F> Subscriber<T> for TryFnSubscriber<F>
where
    T: Send + 'static,
    F: Fn(&mut T) -> Result<(), SubscriberError> + Send + Sync,
{
    async fn notify(&self, value: &mut T) -> Result<(), SubscriberError> {
        (self.0)(value)
    }
}

/// Wraps a plain closure as a subscriber handle.
pub fn subscriber<T, F>(callback: F) -> SubscriberHandle<T>
where
    T: Send + 'static,
    F: Fn(&mut T) + Send + Sync + 'static,
{
    Arc::new(FnSubscriber(callback))
}

/// Wraps a fallible closure as a subscriber handle.
pub fn try_subscriber<T, F>(callback: F) -> SubscriberHandle<T>
where
    T: Send + 'static,
    F: Fn(&mut T) -> Result<(), SubscriberError> + Send + Sync + 'static,
{
    Arc::new(TryFnSubscriber(callback))
}

/// Callback registered on a [`CancelSignal`].
pub type CancelFn = Arc<dyn Fn() + Send + Sync>;

/// One-shot cancellation handle: armed until [`CancelSignal::cancel`] fires
/// every registered callback exactly once.
///
/// A callback subscribed after the signal has already been triggered is
/// invoked immediately, so cancelling before dispatch still aborts the call.
pub struct CancelSignal {
    callbacks: Mutex<Vec<CancelFn>>,
    triggered: AtomicBool,
}

impl CancelSignal {
    /// Creates a new armed signal. This is the cancellation-handle factory.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            callbacks: Mutex::new(Vec::new()),
            triggered: AtomicBool::new(false),
        })
    }

    /// Registers an abort callback; idempotent per callback identity.
    pub fn subscribe(&self, callback: CancelFn) -> CancelFn {
        {
            let mut callbacks = self.callbacks.lock();
            if !self.triggered.load(Ordering::Acquire) {
                if !callbacks.iter().any(|entry| Arc::ptr_eq(entry, &callback)) {
                    callbacks.push(callback.clone());
                }
                return callback;
            }
        }
        // Already triggered: fire late subscribers immediately.
        callback();
        callback
    }

    /// Removes a callback by identity.
    pub fn unsubscribe(&self, callback: &CancelFn) {
        let mut callbacks = self.callbacks.lock();
        if let Some(position) = callbacks.iter().position(|entry| Arc::ptr_eq(entry, callback)) {
            callbacks.remove(position);
        }
    }

    /// Triggers the signal, invoking every callback in registration order.
    /// Subsequent calls are no-ops.
    pub fn cancel(&self) {
        let snapshot: Vec<_> = {
            let callbacks = self.callbacks.lock();
            if self.triggered.swap(true, Ordering::AcqRel) {
                return;
            }
            callbacks.clone()
        };
        for callback in snapshot {
            callback();
        }
    }

    /// Returns true once the signal has been triggered.
    pub fn is_cancelled(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Number of currently registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("triggered", &self.is_cancelled())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn emit_runs_in_registration_order() {
        let list: SubscriberList<Vec<&'static str>> = SubscriberList::new();
        list.subscribe(subscriber(|trace: &mut Vec<&'static str>| trace.push("first")));
        list.subscribe(subscriber(|trace: &mut Vec<&'static str>| trace.push("second")));

        let mut trace = Vec::new();
        list.emit(&mut trace).await.unwrap();

        assert_eq!(trace, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn duplicate_registration_is_idempotent() {
        let list: SubscriberList<usize> = SubscriberList::new();
        let handle = subscriber(|count: &mut usize| *count += 1);

        list.subscribe(handle.clone());
        list.subscribe(handle.clone());
        assert_eq!(list.len(), 1);

        let mut count = 0;
        list.emit(&mut count).await.unwrap();
        assert_eq!(count, 1);

        list.unsubscribe(&handle);
        assert!(list.is_empty());

        list.emit(&mut count).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn failing_subscriber_aborts_the_chain() {
        let list: SubscriberList<usize> = SubscriberList::new();
        list.subscribe(try_subscriber(|_: &mut usize| Err("boom".into())));
        list.subscribe(subscriber(|count: &mut usize| *count += 1));

        let mut count = 0;
        assert!(list.emit(&mut count).await.is_err());
        assert_eq!(count, 0, "later subscribers must not run");
    }

    #[test]
    fn cancel_fires_once() {
        let signal = CancelSignal::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let callback: CancelFn = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        signal.subscribe(callback.clone());
        signal.subscribe(callback);

        signal.cancel();
        signal.cancel();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(signal.is_cancelled());
    }

    #[test]
    fn late_subscriber_fires_immediately() {
        let signal = CancelSignal::new();
        signal.cancel();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        signal.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
