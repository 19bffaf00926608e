//! Stack growth for the recursive parser and evaluator.

/// Free stack below which the next frame runs on a fresh segment.
const RED_ZONE: usize = 128 * 1024;

/// Size of each segment handed out by `stacker`.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f`, growing the stack first when less than [`RED_ZONE`] is left.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
