//! Policy trait and composition.
//!
//! # Composition
//! ```text
//! wrap!(retry, breaker).execute(op)
//!     = retry.execute(|| breaker.execute(op))
//!
//! caller → retry → breaker → op
//!        ←       ←         ← error / value
//! ```
//!
//! The first policy listed is outermost and observes every error, including
//! those manufactured by inner policies (e.g. `CircuitOpen`). `Wrap` holds no
//! state of its own.

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::resilience::error::PolicyResult;

/// A resilience policy around a fallible async operation.
///
/// `operation` is `Fn` rather than `FnOnce` because outer policies may run
/// the inner chain more than once. The cancellation token is the caller's
/// context and is handed unchanged to every layer.
pub trait Policy: Send + Sync {
    fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> impl Future<Output = PolicyResult<T>> + Send
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = PolicyResult<T>> + Send;
}

/// Two policies chained outer-to-inner.
#[derive(Debug, Clone)]
pub struct Wrap<O, I> {
    outer: O,
    inner: I,
}

/// Chain `outer` around `inner`. See [`wrap!`](crate::wrap) for more than two.
pub fn wrap<O: Policy, I: Policy>(outer: O, inner: I) -> Wrap<O, I> {
    Wrap { outer, inner }
}

impl<O, I> Wrap<O, I> {
    pub fn outer(&self) -> &O {
        &self.outer
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

impl<O: Policy, I: Policy> Policy for Wrap<O, I> {
    fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> impl Future<Output = PolicyResult<T>> + Send
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = PolicyResult<T>> + Send,
    {
        async move {
            let inner = &self.inner;
            let operation = &operation;
            self.outer
                .execute(cancel, move || inner.execute(cancel, operation))
                .await
        }
    }
}

impl<P: Policy> Policy for &P {
    fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> impl Future<Output = PolicyResult<T>> + Send
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = PolicyResult<T>> + Send,
    {
        (**self).execute(cancel, operation)
    }
}

impl<P: Policy> Policy for Arc<P> {
    fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> impl Future<Output = PolicyResult<T>> + Send
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = PolicyResult<T>> + Send,
    {
        (**self).execute(cancel, operation)
    }
}

/// An absent policy passes calls straight through.
impl<P: Policy> Policy for Option<P> {
    fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> impl Future<Output = PolicyResult<T>> + Send
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = PolicyResult<T>> + Send,
    {
        async move {
            match self {
                Some(policy) => policy.execute(cancel, operation).await,
                None => operation().await,
            }
        }
    }
}

/// Compose any number of policies, first listed outermost.
///
/// `wrap!(a, b, c)` is `wrap(a, wrap(b, c))`.
#[macro_export]
macro_rules! wrap {
    ($only:expr $(,)?) => {
        $only
    };
    ($outer:expr, $($rest:expr),+ $(,)?) => {
        $crate::resilience::policy::wrap($outer, $crate::wrap!($($rest),+))
    };
}
