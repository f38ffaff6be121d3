use std::time::Duration;

#[cfg(feature = "loom")]
pub use loom::sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering};
#[cfg(not(feature = "loom"))]
pub use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering};

#[cfg(not(feature = "loom"))]
pub use antidote::{Mutex, MutexGuard};

#[cfg(feature = "loom")]
pub type MutexGuard<'a, T> = loom::sync::MutexGuard<'a, T>;

#[cfg(feature = "loom")]
#[derive(Debug, Default)]
pub struct Mutex<T>(loom::sync::Mutex<T>);

#[cfg(feature = "loom")]
impl<T> Mutex<T> {
    pub fn new(t: T) -> Self {
        Self(loom::sync::Mutex::new(t))
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap()
    }
}

/// Condition variable used as the drain signal.
///
/// `wait_timeout` reports only whether the timeout elapsed, so the std and
/// loom flavours share one signature. Loom does not model time: there the
/// timed wait degrades to a plain wait that never reports a timeout.
///
/// 用作排空信号的条件变量。
pub struct Condvar {
    #[cfg(not(feature = "loom"))]
    inner: antidote::Condvar,
    #[cfg(feature = "loom")]
    inner: loom::sync::Condvar,
}

impl Condvar {
    #[cfg(not(feature = "loom"))]
    pub fn new() -> Self {
        Self {
            inner: antidote::Condvar::new(),
        }
    }

    #[cfg(feature = "loom")]
    pub fn new() -> Self {
        Self {
            inner: loom::sync::Condvar::new(),
        }
    }

    #[cfg(not(feature = "loom"))]
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.inner.wait(guard)
    }

    #[cfg(feature = "loom")]
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.inner.wait(guard).unwrap()
    }

    #[cfg(not(feature = "loom"))]
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        let (guard, result) = self.inner.wait_timeout(guard, timeout);
        (guard, result.timed_out())
    }

    #[cfg(feature = "loom")]
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        _timeout: Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        (self.wait(guard), false)
    }

    pub fn notify_one(&self) {
        self.inner.notify_one();
    }
}

impl std::fmt::Debug for Condvar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}

/// One iteration of a busy-wait loop.
///
/// Loom needs an explicit yield to make progress through spin loops.
#[inline]
pub fn spin_loop() {
    #[cfg(feature = "loom")]
    loom::thread::yield_now();
    #[cfg(not(feature = "loom"))]
    std::hint::spin_loop();
}
