//! cancellable-future: chainable futures with cooperative cancellation
//!
//! Ordinary futures propagate settlement downstream, from producer to
//! consumer, but give a consumer no way to call off a computation it no
//! longer wants. This crate adds a `cancel` operation to a single-value
//! future and wires chains of derived futures so that cancellation
//! propagates *upstream* while settlement keeps flowing *downstream*:
//! cancelling a derived future cancels the future it was derived from,
//! transitively, and everything downstream of the cancelled link observes an
//! ordinary rejection.
//!
//! Continuations never run inside the call that triggers them; they are
//! posted to a cooperative [`Scheduler`] and run on a later turn, which is
//! what keeps cancellation handlers from re-entering the future they belong
//! to.
//!
//! ## Chaining
//!
//! ```rust
//! use cancellable_future::{Future, Link, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! let five = Future::resolved(&scheduler, 5);
//! let doubled = five.chain(Box::new(|v: i32| Ok(Link::Value(v * 2))), None);
//!
//! scheduler.run_until_idle();
//! assert_eq!(doubled.try_result(), Some(Ok(10)));
//! ```
//!
//! ## Cancellation
//!
//! ```rust
//! use cancellable_future::{Future, Reason, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! let pending: Future<i32> = Future::with_cancel_handler(
//!     &scheduler,
//!     |_promise| {}, // never settles on its own
//!     |reason| println!("cancelled: {reason}"),
//! );
//!
//! pending.cancel(Reason::cancelled("deadline"));
//! scheduler.run_until_idle();
//! assert_eq!(
//!     pending.try_result(),
//!     Some(Err(Reason::cancelled("deadline")))
//! );
//! ```

#![deny(warnings)]

pub mod cancellation;
pub mod chain;
mod combinator;
pub mod future;
pub mod plain;
pub mod reason;
pub mod scheduler;

// Re-export core types
pub use cancellation::Cancellable;
pub use chain::{Link, OnRejected, OnResolved};
pub use future::{Future, Promise};
pub use plain::{PlainFuture, PlainPromise};
pub use reason::Reason;
pub use scheduler::Scheduler;
