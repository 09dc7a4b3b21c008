//! The cancellable future core
//!
//! A [`Future`] is a single-assignment container for the eventual result of
//! an asynchronous computation: it settles exactly once, either resolved with
//! a value or rejected with a [`Reason`], and is immutable afterwards. While
//! it is still pending it can additionally be cancelled, which rejects it and
//! notifies an optional handler one scheduler turn later.
//!
//! Settlement is synchronous (`complete`/`fail`/`cancel` move the state
//! machine before returning) but observation never is: continuations are
//! posted to the [`Scheduler`] and run on a later turn, so an observer can
//! always attach itself before a notification could possibly fire.

use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::cancellation::Cancellable;
use crate::reason::Reason;
use crate::scheduler::Scheduler;

pub(crate) type Continuation<T> = Box<dyn FnOnce(Result<T, Reason>) + Send>;
pub(crate) type CancelHandler = Box<dyn FnOnce(Reason) + Send>;

/// How a `cancel` call is carried out while the future is pending.
///
/// Both variants are cleared on settlement through any path, so a handler can
/// never fire late and an upstream link can never outlive the settled future.
pub(crate) enum CancelLink {
    /// Reject this future directly, then fire the optional handler on a later
    /// scheduler turn. The public constructors install this.
    Handler(Option<CancelHandler>),
    /// Forward the call to the future this one was derived from; this future
    /// itself settles only through ordinary downstream propagation. The chain
    /// linker installs this.
    Upstream(Arc<dyn Cancellable + Send + Sync>),
}

enum State<T> {
    Pending,
    Resolved(T),
    Rejected(Reason),
}

impl<T> State<T> {
    fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }
}

struct Shared<T> {
    state: State<T>,
    callbacks: Vec<Continuation<T>>,
    cancel: CancelLink,
    waker: Option<Waker>,
    scheduler: Scheduler,
}

impl<T: Clone + Send + 'static> Shared<T> {
    /// Move out of `Pending`. The caller must have checked `is_pending`.
    fn settle_locked(&mut self, outcome: Result<T, Reason>) {
        self.cancel = CancelLink::Handler(None);

        let callbacks = mem::take(&mut self.callbacks);
        for callback in callbacks {
            let outcome = outcome.clone();
            self.scheduler.post(move || callback(outcome));
        }

        self.state = match outcome {
            Ok(value) => State::Resolved(value),
            Err(reason) => State::Rejected(reason),
        };

        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// A cancellable, chainable future.
///
/// Handles are cheap to clone and share one state machine; cloning a future
/// does not fork the computation.
pub struct Future<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// The settle pair of a pending [`Future`].
///
/// Whichever of [`complete`](Promise::complete) and [`fail`](Promise::fail)
/// is invoked first wins; both are inert afterwards, which guarantees
/// at-most-one settlement even if an initializer calls both.
pub struct Promise<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Create a pending future. `init` runs synchronously and receives the
    /// [`Promise`] with which it must eventually settle the future (or never,
    /// if the future is meant to stay pending forever).
    pub fn new(scheduler: &Scheduler, init: impl FnOnce(Promise<T>)) -> Self {
        let (future, promise) = Self::pending(scheduler, CancelLink::Handler(None));
        init(promise);
        future
    }

    /// Like [`Future::new`], with a cancellation handler. The handler fires
    /// at most once, only when [`cancel`](Future::cancel) is called while the
    /// future is still pending, and only on a scheduler turn after the future
    /// has already been driven to its rejected state.
    pub fn with_cancel_handler(
        scheduler: &Scheduler,
        init: impl FnOnce(Promise<T>),
        on_cancelled: impl FnOnce(Reason) + Send + 'static,
    ) -> Self {
        let link = CancelLink::Handler(Some(Box::new(on_cancelled)));
        let (future, promise) = Self::pending(scheduler, link);
        init(promise);
        future
    }

    /// An already-resolved future. `cancel` on it is a guaranteed no-op.
    pub fn resolved(scheduler: &Scheduler, value: T) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: State::Resolved(value),
                callbacks: Vec::new(),
                cancel: CancelLink::Handler(None),
                waker: None,
                scheduler: scheduler.clone(),
            })),
        }
    }

    /// An already-rejected future. `cancel` on it is a guaranteed no-op.
    pub fn rejected(scheduler: &Scheduler, reason: Reason) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: State::Rejected(reason),
                callbacks: Vec::new(),
                cancel: CancelLink::Handler(None),
                waker: None,
                scheduler: scheduler.clone(),
            })),
        }
    }

    pub(crate) fn pending(scheduler: &Scheduler, cancel: CancelLink) -> (Self, Promise<T>) {
        let shared = Arc::new(Mutex::new(Shared {
            state: State::Pending,
            callbacks: Vec::new(),
            cancel,
            waker: None,
            scheduler: scheduler.clone(),
        }));

        let future = Self {
            shared: shared.clone(),
        };
        (future, Promise { shared })
    }

    /// Request cancellation. Idempotent: callable at any time, any number of
    /// times; on an already-settled future this is a no-op.
    ///
    /// On a pending future built by the public constructors this rejects the
    /// future with `reason` before returning, and posts the cancellation
    /// handler (if any) to the scheduler. On a future derived via `chain`
    /// the call is forwarded upstream instead: the derived future settles
    /// through the ordinary rejection propagation of its parent, so a chain
    /// whose upstream end has already settled is left untouched.
    pub fn cancel(&self, reason: Reason) {
        let mut shared = self.shared.lock().unwrap();
        if !shared.state.is_pending() {
            tracing::trace!("cancel on a settled future ignored");
            return;
        }

        match &mut shared.cancel {
            CancelLink::Handler(slot) => {
                let handler = slot.take();
                tracing::trace!("cancelling pending future: {reason}");
                shared.settle_locked(Err(reason.clone()));
                if let Some(handler) = handler {
                    shared.scheduler.post(move || handler(reason));
                }
            }
            CancelLink::Upstream(parent) => {
                let parent = parent.clone();
                drop(shared);
                parent.cancel(reason);
            }
        }
    }

    /// Whether the future has not yet settled.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().unwrap().state.is_pending()
    }

    /// The settled outcome, or `None` while still pending.
    pub fn try_result(&self) -> Option<Result<T, Reason>> {
        match &self.shared.lock().unwrap().state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Block the calling thread until the future settles.
    ///
    /// Only useful when another thread drives the settlement; on a
    /// single-threaded host, drive the [`Scheduler`] and use
    /// [`try_result`](Future::try_result) or `.await` instead.
    pub fn wait(&self) -> Result<T, Reason> {
        struct Parker(std::thread::Thread);
        impl futures::task::ArcWake for Parker {
            fn wake_by_ref(arc_self: &Arc<Self>) {
                arc_self.0.unpark();
            }
        }

        let waker = futures::task::waker(Arc::new(Parker(std::thread::current())));
        loop {
            {
                let mut shared = self.shared.lock().unwrap();
                let outcome = match &shared.state {
                    State::Pending => None,
                    State::Resolved(value) => Some(Ok(value.clone())),
                    State::Rejected(reason) => Some(Err(reason.clone())),
                };
                match outcome {
                    Some(outcome) => return outcome,
                    None => shared.waker = Some(waker.clone()),
                }
            }
            std::thread::park();
        }
    }

    /// Attach a continuation. If the future is already settled the
    /// continuation is still posted to the scheduler, never run inline.
    pub(crate) fn subscribe(&self, callback: impl FnOnce(Result<T, Reason>) + Send + 'static) {
        let mut shared = self.shared.lock().unwrap();
        let outcome = match &shared.state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        };
        match outcome {
            None => shared.callbacks.push(Box::new(callback)),
            Some(outcome) => shared.scheduler.post(move || callback(outcome)),
        }
    }

    pub(crate) fn scheduler(&self) -> Scheduler {
        self.shared.lock().unwrap().scheduler.clone()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Resolve the future. Returns `false` if it had already settled, in
    /// which case the call is a no-op.
    pub fn complete(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the future. Returns `false` if it had already settled, in
    /// which case the call is a no-op.
    pub fn fail(&self, reason: Reason) -> bool {
        self.settle(Err(reason))
    }

    /// Whether the future has settled through any path.
    pub fn is_settled(&self) -> bool {
        !self.shared.lock().unwrap().state.is_pending()
    }

    fn settle(&self, outcome: Result<T, Reason>) -> bool {
        let mut shared = self.shared.lock().unwrap();
        if !shared.state.is_pending() {
            return false;
        }
        shared.settle_locked(outcome);
        true
    }
}

impl<T: Clone + Send + 'static> std::future::Future for Future<T> {
    type Output = Result<T, Reason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock().unwrap();
        let outcome = match &shared.state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        };
        match outcome {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                shared.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
