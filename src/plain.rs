//! Plain, non-cancellable futures
//!
//! A [`PlainFuture`] settles exactly once with a value or a [`Reason`] and
//! that is all: it has no cancel entry point and no cancellation handler.
//! It models an uninterruptible computation, and is what the static
//! combinators on [`Future`](crate::Future) adapt from.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::reason::Reason;

type Subscription<T> = Box<dyn FnOnce(Result<T, Reason>) + Send>;

struct PlainShared<T> {
    outcome: Option<Result<T, Reason>>,
    subscriptions: Vec<Subscription<T>>,
    waker: Option<Waker>,
}

/// A future that can be settled by its [`PlainPromise`] but never cancelled.
pub struct PlainFuture<T> {
    shared: Arc<Mutex<PlainShared<T>>>,
}

impl<T> Clone for PlainFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// The settling half of a [`PlainFuture`]. First settle wins; later calls
/// are no-ops.
pub struct PlainPromise<T> {
    shared: Arc<Mutex<PlainShared<T>>>,
}

impl<T: Clone + Send + 'static> PlainFuture<T> {
    /// Create a new plain future/promise pair.
    pub fn new() -> (PlainFuture<T>, PlainPromise<T>) {
        let shared = Arc::new(Mutex::new(PlainShared {
            outcome: None,
            subscriptions: Vec::new(),
            waker: None,
        }));

        let future = PlainFuture {
            shared: shared.clone(),
        };
        (future, PlainPromise { shared })
    }

    /// Whether the future has settled.
    pub fn is_settled(&self) -> bool {
        self.shared.lock().unwrap().outcome.is_some()
    }

    /// The settled outcome, or `None` while still pending.
    pub fn try_result(&self) -> Option<Result<T, Reason>> {
        self.shared.lock().unwrap().outcome.clone()
    }

    /// Observe settlement. Unlike the continuations of a cancellable future
    /// this may run inline: it is the adapter seam the combinators build on,
    /// and they re-defer anything user-visible through the scheduler.
    pub(crate) fn subscribe(&self, callback: impl FnOnce(Result<T, Reason>) + Send + 'static) {
        let callback: Subscription<T> = Box::new(callback);
        let settled = {
            let mut shared = self.shared.lock().unwrap();
            match &shared.outcome {
                None => {
                    shared.subscriptions.push(callback);
                    None
                }
                Some(outcome) => Some((callback, outcome.clone())),
            }
        };
        if let Some((callback, outcome)) = settled {
            callback(outcome);
        }
    }
}

impl<T: Clone + Send + 'static> PlainPromise<T> {
    /// Resolve the future. Returns `false` if it had already settled.
    pub fn complete(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the future. Returns `false` if it had already settled.
    pub fn fail(&self, reason: Reason) -> bool {
        self.settle(Err(reason))
    }

    /// Whether the future has settled.
    pub fn is_settled(&self) -> bool {
        self.shared.lock().unwrap().outcome.is_some()
    }

    fn settle(&self, outcome: Result<T, Reason>) -> bool {
        let (subscriptions, waker) = {
            let mut shared = self.shared.lock().unwrap();
            if shared.outcome.is_some() {
                return false;
            }
            shared.outcome = Some(outcome.clone());
            (
                std::mem::take(&mut shared.subscriptions),
                shared.waker.take(),
            )
        };

        for subscription in subscriptions {
            subscription(outcome.clone());
        }
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }
}

impl<T: Clone + Send + 'static> std::future::Future for PlainFuture<T> {
    type Output = Result<T, Reason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock().unwrap();
        match &shared.outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => {
                shared.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
