/// A resource whose pending work can be called off.
pub trait Cancellable {
    /// Returns `true` only if this call stopped a not-yet-run unit of work
    /// from running (or from being considered pending). Returns `false` if
    /// it already ran, was already cancelled, or cannot be cancelled.
    fn cancel(&self) -> bool;

    /// Cancel whatever is still pending and release held resources.
    /// Calling this more than once has no further effect.
    fn dispose(&self);
}
