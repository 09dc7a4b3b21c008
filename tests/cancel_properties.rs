//! Property tests for the cancellation invariants.

mod common;

use std::sync::{Arc, Mutex};

use cancellable_future::{Future, Link, Reason, Scheduler};
use proptest::prelude::*;

proptest! {
    /// Cancelling twice is indistinguishable from cancelling once: the final
    /// state carries the first reason, and the handler fires exactly once.
    #[test]
    fn cancel_is_idempotent(first in "[a-z]{1,12}", second in "[a-z]{1,12}") {
        common::setup_tracing();
        let scheduler = Scheduler::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let future: Future<u32> = Future::with_cancel_handler(
            &scheduler,
            |_promise| {},
            move |reason| seen_clone.lock().unwrap().push(reason),
        );

        future.cancel(Reason::cancelled(first.clone()));
        future.cancel(Reason::cancelled(second));
        scheduler.run_until_idle();

        prop_assert_eq!(
            future.try_result(),
            Some(Err(Reason::cancelled(first.clone())))
        );
        let seen = seen.lock().unwrap();
        prop_assert_eq!(seen.len(), 1);
        prop_assert_eq!(&seen[0], &Reason::cancelled(first));
    }

    /// Cancelling any link of a chain settles every link with the same
    /// reason: upstream by direct cancellation, downstream by ordinary
    /// rejection propagation.
    #[test]
    fn every_link_settles_with_the_cancel_reason(
        message in "[a-z]{1,12}",
        links in 1usize..5,
        cancel_at in 0usize..5,
    ) {
        common::setup_tracing();
        let scheduler = Scheduler::new();
        let head: Future<i32> = Future::new(&scheduler, |_promise| {});

        let mut chain = vec![head];
        for _ in 0..links {
            let next = chain
                .last()
                .expect("chain is never empty")
                .chain(Box::new(|v: i32| Ok(Link::Value(v))), None);
            chain.push(next);
        }

        let reason = Reason::cancelled(message);
        chain[cancel_at.min(links)].cancel(reason.clone());
        scheduler.run_until_idle();

        for future in &chain {
            prop_assert_eq!(future.try_result(), Some(Err(reason.clone())));
        }
    }

    /// A cancel that loses the race with settlement changes nothing.
    #[test]
    fn cancel_after_resolution_preserves_the_value(value in any::<i32>()) {
        common::setup_tracing();
        let scheduler = Scheduler::new();
        let future = Future::resolved(&scheduler, value);

        future.cancel(Reason::cancelled("late"));
        scheduler.run_until_idle();

        prop_assert_eq!(future.try_result(), Some(Ok(value)));
    }
}
