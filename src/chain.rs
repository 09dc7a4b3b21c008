//! The chain linker
//!
//! `chain` derives a new future from an existing one. Settlement propagates
//! downstream exactly as for ordinary futures; the added behavior is that the
//! derived future's cancel entry point is wired to its parent's, so
//! cancelling any future in a chain cancels everything upstream of it, while
//! everything downstream of the cancelled link settles through the ordinary
//! rejection path.
//!
//! A chain of `n` futures is `n` independent state machines plus `n - 1`
//! upstream links; the core's idempotent `cancel` keeps two children of one
//! parent from cancelling it twice.

use std::sync::Arc;

use crate::cancellation::Cancellable;
use crate::future::{CancelLink, Future, Promise};
use crate::reason::Reason;

/// What a continuation settles its derived future with: either a plain value
/// or another future whose settlement the derived future adopts.
pub enum Link<U> {
    Value(U),
    Future(Future<U>),
}

/// Continuation run when the parent resolves.
pub type OnResolved<T, U> = Box<dyn FnOnce(T) -> Result<Link<U>, Reason> + Send>;

/// Continuation run when the parent rejects. Returning `Ok` recovers the
/// chain; returning `Err` re-rejects it.
pub type OnRejected<U> = Box<dyn FnOnce(Reason) -> Result<Link<U>, Reason> + Send>;

impl<T: Clone + Send + 'static> Future<T> {
    /// Derive a new future from this one.
    ///
    /// When this future resolves with `v`, `on_resolved(v)` settles the
    /// derived future: `Ok(Link::Value(u))` resolves it, `Ok(Link::Future(f))`
    /// adopts `f`'s eventual settlement, and `Err(reason)` rejects it. A
    /// panic inside the continuation is caught by the linker and rejects the
    /// derived future as well; it never escapes into the scheduler.
    ///
    /// When this future rejects, `on_rejected` follows the same rules if
    /// present; if absent the derived future is re-rejected with the same
    /// reason, never silently swallowed.
    ///
    /// Cancelling the derived future forwards the call to this future, and
    /// so on transitively upstream.
    pub fn chain<U: Clone + Send + 'static>(
        &self,
        on_resolved: OnResolved<T, U>,
        on_rejected: Option<OnRejected<U>>,
    ) -> Future<U> {
        let scheduler = self.scheduler();
        let upstream: Arc<dyn Cancellable + Send + Sync> = Arc::new(self.clone());
        let (child, promise) = Future::pending(&scheduler, CancelLink::Upstream(upstream));

        self.subscribe(move |outcome| {
            let step = match outcome {
                Ok(value) => run_continuation(on_resolved, value),
                Err(reason) => match on_rejected {
                    Some(on_rejected) => run_continuation(on_rejected, reason),
                    None => Err(reason),
                },
            };
            settle_from(promise, step);
        });

        child
    }

    /// Alias of [`chain`](Future::chain) with identical arguments.
    pub fn then<U: Clone + Send + 'static>(
        &self,
        on_resolved: OnResolved<T, U>,
        on_rejected: Option<OnRejected<U>>,
    ) -> Future<U> {
        self.chain(on_resolved, on_rejected)
    }

    /// [`chain`](Future::chain) with the identity pass-through on the
    /// resolved side: values flow through untouched, rejections reach
    /// `on_rejected`.
    pub fn catch(&self, on_rejected: OnRejected<T>) -> Future<T> {
        self.chain(Box::new(|value| Ok(Link::Value(value))), Some(on_rejected))
    }
}

fn run_continuation<A, U>(
    continuation: Box<dyn FnOnce(A) -> Result<Link<U>, Reason> + Send>,
    argument: A,
) -> Result<Link<U>, Reason> {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        continuation(argument)
    }));
    match outcome {
        Ok(step) => step,
        Err(payload) => {
            tracing::trace!("continuation panicked; rejecting the derived future");
            Err(Reason::failed(panic_message(payload.as_ref())))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "continuation panicked".to_string()
    }
}

fn settle_from<U: Clone + Send + 'static>(promise: Promise<U>, step: Result<Link<U>, Reason>) {
    match step {
        Ok(Link::Value(value)) => {
            promise.complete(value);
        }
        Ok(Link::Future(inner)) => {
            inner.subscribe(move |outcome| {
                match outcome {
                    Ok(value) => promise.complete(value),
                    Err(reason) => promise.fail(reason),
                };
            });
        }
        Err(reason) => {
            promise.fail(reason);
        }
    }
}
