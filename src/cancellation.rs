//! The cancellation entry point
//!
//! Chained futures propagate cancellation upstream by storing the entry point
//! of the future they were derived from, behind this trait. Keeping the seam
//! as a trait means the linker never needs to know the parent's value type.

use crate::future::Future;
use crate::reason::Reason;

/// Something that can be asked, idempotently, to cancel a still-pending
/// computation.
pub trait Cancellable {
    /// Request cancellation with the given reason. Calling this on an
    /// already-settled target is a no-op, which is what makes late or
    /// duplicate calls safe.
    fn cancel(&self, reason: Reason);
}

impl<T: Clone + Send + 'static> Cancellable for Future<T> {
    fn cancel(&self, reason: Reason) {
        Future::cancel(self, reason);
    }
}
