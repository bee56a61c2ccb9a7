use std::sync::atomic::{AtomicU64, Ordering};

/// Guards a shared resource against out-of-order async completions.
///
/// Each request captures a [`Generation`] from [`RequestGeneration::begin`];
/// starting a new request invalidates every earlier one, and a completion only
/// applies its result if its generation is still the current one.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    current: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Drops every in-flight request without starting a new one.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current.load(Ordering::SeqCst) == generation.0
    }

    /// Returns `value` only if `generation` is still current.
    pub fn complete<T>(&self, generation: Generation, value: T) -> Option<T> {
        self.is_current(generation).then_some(value)
    }
}
