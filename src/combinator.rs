//! Static factory combinators
//!
//! Adapters that bring plain, non-cancellable futures into the cancellable
//! world: a direct adapter, and a two-phase combinator for "wait for an
//! uninterruptible prerequisite, then run a cancellable continuation".

use std::sync::{Arc, Mutex};

use crate::future::{CancelLink, Future};
use crate::plain::PlainFuture;
use crate::reason::Reason;
use crate::scheduler::Scheduler;

/// Where the two-phase combinator currently is. The cancel handler's effect
/// depends on which of the first two phases is live when `cancel` arrives.
enum Phase<B> {
    AwaitingPrerequisite { cancelled: bool },
    RunningStep(Future<B>),
    Settled,
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Adapt a plain future: this future settles whenever the plain one
    /// settles. There is no cancellation handler because the wrapped
    /// computation cannot be interrupted; cancelling the adapter only
    /// abandons the observation, and the plain computation runs to
    /// completion unobserved (its late settlement is then a no-op here).
    pub fn from_plain(scheduler: &Scheduler, plain: PlainFuture<T>) -> Future<T> {
        let (future, promise) = Future::pending(scheduler, CancelLink::Handler(None));
        plain.subscribe(move |outcome| {
            match outcome {
                Ok(value) => promise.complete(value),
                Err(reason) => promise.fail(reason),
            };
        });
        future
    }

    /// Wait for an uninterruptible prerequisite, then run a cancellable step.
    ///
    /// While `plain` is pending, cancelling the returned future is a
    /// lightweight pre-emption: the future rejects immediately and `start`
    /// is never invoked once the prerequisite resolves. After `plain`
    /// resolves and `start(value)` has produced an inner future, cancelling
    /// the returned future cancels that inner future instead. If `plain`
    /// itself rejects, the returned future rejects with the same reason
    /// (unless it already settled; settlement is one-way).
    pub fn with_uncancellable_step<A, F>(
        scheduler: &Scheduler,
        plain: PlainFuture<A>,
        start: F,
    ) -> Future<T>
    where
        A: Clone + Send + 'static,
        F: FnOnce(A) -> Future<T> + Send + 'static,
    {
        let phase = Arc::new(Mutex::new(Phase::AwaitingPrerequisite { cancelled: false }));

        let handler_phase = phase.clone();
        let on_cancelled = move |reason: Reason| {
            let mut slot = handler_phase.lock().unwrap();
            let current = std::mem::replace(&mut *slot, Phase::Settled);
            match current {
                Phase::AwaitingPrerequisite { .. } => {
                    *slot = Phase::AwaitingPrerequisite { cancelled: true };
                }
                Phase::RunningStep(inner) => {
                    drop(slot);
                    inner.cancel(reason);
                }
                Phase::Settled => {}
            }
        };

        let link = CancelLink::Handler(Some(Box::new(on_cancelled)));
        let (outer, promise) = Future::pending(scheduler, link);

        plain.subscribe(move |outcome| {
            match outcome {
                Err(reason) => {
                    *phase.lock().unwrap() = Phase::Settled;
                    promise.fail(reason);
                }
                Ok(value) => {
                    let mut slot = phase.lock().unwrap();
                    // A cancel may have rejected the outer future before its
                    // deferred handler got to mark the phase; check both.
                    let pre_empted = promise.is_settled()
                        || matches!(&*slot, Phase::AwaitingPrerequisite { cancelled: true });
                    if pre_empted {
                        *slot = Phase::Settled;
                        return;
                    }

                    let inner = start(value);
                    *slot = Phase::RunningStep(inner.clone());
                    drop(slot);

                    let settle_phase = phase.clone();
                    inner.subscribe(move |outcome| {
                        *settle_phase.lock().unwrap() = Phase::Settled;
                        match outcome {
                            Ok(value) => promise.complete(value),
                            Err(reason) => promise.fail(reason),
                        };
                    });
                }
            }
        });

        outer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::Promise;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pending_with_promise<T: Clone + Send + 'static>(
        scheduler: &Scheduler,
    ) -> (Future<T>, Promise<T>) {
        let mut slot = None;
        let future = Future::new(scheduler, |promise| slot = Some(promise));
        (future, slot.expect("init ran"))
    }

    #[test]
    fn from_plain_settles_with_the_plain_future() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::new();
        let adapted = Future::from_plain(&scheduler, plain);

        assert!(adapted.is_pending());
        assert!(plain_promise.complete(8));
        assert_eq!(adapted.try_result(), Some(Ok(8)));
    }

    #[test]
    fn from_plain_forwards_rejection() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::<i32>::new();
        let adapted = Future::from_plain(&scheduler, plain);

        assert!(plain_promise.fail(Reason::failed("broken")));
        assert_eq!(adapted.try_result(), Some(Err(Reason::failed("broken"))));
    }

    #[test]
    fn cancelling_from_plain_abandons_the_observation() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::new();
        let adapted = Future::from_plain(&scheduler, plain.clone());

        adapted.cancel(Reason::cancelled("stop"));
        scheduler.run_until_idle();
        assert_eq!(adapted.try_result(), Some(Err(Reason::cancelled("stop"))));

        // The plain computation keeps running to completion, unobserved.
        assert!(plain_promise.complete(9));
        assert_eq!(plain.try_result(), Some(Ok(9)));
        assert_eq!(adapted.try_result(), Some(Err(Reason::cancelled("stop"))));
    }

    #[test]
    fn cancel_before_the_prerequisite_prevents_the_step() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::<i32>::new();
        let started = Arc::new(AtomicUsize::new(0));

        let started_clone = started.clone();
        let step_scheduler = scheduler.clone();
        let outer = Future::with_uncancellable_step(&scheduler, plain, move |v: i32| {
            started_clone.fetch_add(1, Ordering::SeqCst);
            Future::resolved(&step_scheduler, v)
        });

        outer.cancel(Reason::cancelled("stop"));
        assert_eq!(outer.try_result(), Some(Err(Reason::cancelled("stop"))));

        scheduler.run_until_idle();
        assert!(plain_promise.complete(1));
        scheduler.run_until_idle();

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(outer.try_result(), Some(Err(Reason::cancelled("stop"))));
    }

    #[test]
    fn cancel_immediately_before_the_prerequisite_resolves_still_prevents_the_step() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::<i32>::new();
        let started = Arc::new(AtomicUsize::new(0));

        let started_clone = started.clone();
        let step_scheduler = scheduler.clone();
        let outer = Future::with_uncancellable_step(&scheduler, plain, move |v: i32| {
            started_clone.fetch_add(1, Ordering::SeqCst);
            Future::resolved(&step_scheduler, v)
        });

        // No scheduler turn between the cancel and the prerequisite settling:
        // the deferred handler has not run yet, the settle guard must hold.
        outer.cancel(Reason::cancelled("stop"));
        assert!(plain_promise.complete(1));
        scheduler.run_until_idle();

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(outer.try_result(), Some(Err(Reason::cancelled("stop"))));
    }

    #[test]
    fn cancel_while_the_step_runs_cancels_the_inner_future() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::<i32>::new();
        let inner_seen = Arc::new(Mutex::new(Vec::new()));

        let inner_seen_clone = inner_seen.clone();
        let step_scheduler = scheduler.clone();
        let outer: Future<i32> = Future::with_uncancellable_step(&scheduler, plain, move |_v| {
            let inner_seen = inner_seen_clone.clone();
            Future::with_cancel_handler(
                &step_scheduler,
                |_promise| {},
                move |reason| inner_seen.lock().unwrap().push(reason),
            )
        });

        assert!(plain_promise.complete(3));
        assert!(outer.is_pending());

        outer.cancel(Reason::cancelled("halt"));
        assert_eq!(outer.try_result(), Some(Err(Reason::cancelled("halt"))));

        scheduler.run_until_idle();
        assert_eq!(*inner_seen.lock().unwrap(), vec![Reason::cancelled("halt")]);
    }

    #[test]
    fn inner_settlement_resolves_the_outer_future() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::<i32>::new();
        let inner_promise = Arc::new(Mutex::new(None));

        let inner_promise_clone = inner_promise.clone();
        let step_scheduler = scheduler.clone();
        let outer: Future<i32> = Future::with_uncancellable_step(&scheduler, plain, move |v| {
            let inner_promise = inner_promise_clone.clone();
            Future::new(&step_scheduler, move |promise| {
                *inner_promise.lock().unwrap() = Some((promise, v));
            })
        });

        assert!(plain_promise.complete(20));
        let (promise, prerequisite) = inner_promise.lock().unwrap().take().expect("step started");
        assert!(promise.complete(prerequisite + 1));
        scheduler.run_until_idle();

        assert_eq!(outer.try_result(), Some(Ok(21)));
    }

    #[test]
    fn cancel_after_the_inner_future_settled_is_a_noop() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::<i32>::new();

        let step_scheduler = scheduler.clone();
        let outer =
            Future::with_uncancellable_step(&scheduler, plain, move |v: i32| {
                Future::resolved(&step_scheduler, v * 10)
            });

        assert!(plain_promise.complete(4));
        scheduler.run_until_idle();
        assert_eq!(outer.try_result(), Some(Ok(40)));

        outer.cancel(Reason::cancelled("late"));
        outer.cancel(Reason::cancelled("later"));
        scheduler.run_until_idle();
        assert_eq!(outer.try_result(), Some(Ok(40)));
    }

    #[test]
    fn prerequisite_rejection_rejects_the_outer_future() {
        let scheduler = Scheduler::new();
        let (plain, plain_promise) = PlainFuture::<i32>::new();
        let started = Arc::new(AtomicUsize::new(0));

        let started_clone = started.clone();
        let step_scheduler = scheduler.clone();
        let outer = Future::with_uncancellable_step(&scheduler, plain, move |v: i32| {
            started_clone.fetch_add(1, Ordering::SeqCst);
            Future::resolved(&step_scheduler, v)
        });

        assert!(plain_promise.fail(Reason::failed("prerequisite broke")));
        scheduler.run_until_idle();

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(
            outer.try_result(),
            Some(Err(Reason::failed("prerequisite broke")))
        );
    }

    #[test]
    fn chained_children_of_the_adapter_see_the_cancellation_as_rejection() {
        use crate::chain::Link;

        let scheduler = Scheduler::new();
        let (plain, _plain_promise) = PlainFuture::<i32>::new();
        let adapted = Future::from_plain(&scheduler, plain);
        let child = adapted.chain(Box::new(|v: i32| Ok(Link::Value(v))), None);

        child.cancel(Reason::cancelled("give up"));
        scheduler.run_until_idle();

        assert_eq!(adapted.try_result(), Some(Err(Reason::cancelled("give up"))));
        assert_eq!(child.try_result(), Some(Err(Reason::cancelled("give up"))));
    }

    #[test]
    fn pending_with_promise_helper_settles() {
        let scheduler = Scheduler::new();
        let (future, promise) = pending_with_promise::<u8>(&scheduler);
        assert!(promise.complete(2));
        assert_eq!(future.try_result(), Some(Ok(2)));
    }
}
