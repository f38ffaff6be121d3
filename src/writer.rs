use std::time::{Duration, Instant};

use crate::epoch::Epoch;
use crate::lock::RcuLock;
use crate::ptr::Retired;
use crate::sync::MutexGuard;

impl RcuLock {
    /// Acquire writer serialization.
    ///
    /// Blocks until no other writer holds the lock. The returned
    /// [`WriteGuard`] releases serialization when dropped.
    ///
    /// 获取写入者串行化。阻塞直到没有其他写入者持有锁。
    #[inline]
    pub fn write_begin(&self) -> WriteGuard<'_> {
        let serial = self.writer.lock();
        WriteGuard { lock: self, serial }
    }
}

/// Outcome of one writer transition.
///
/// 一次写入者切换的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The epoch that was live before the transition.
    pub from: Epoch,
    /// The epoch that is live after it.
    pub to: Epoch,
    /// Current-generation readers still inside when the next epoch was announced.
    pub drained: usize,
    /// Next-generation readers folded into the current generation by the merge.
    pub merged: usize,
    /// Time spent blocked waiting for `drained` readers to leave.
    pub waited: Duration,
}

/// Exclusive writer access to an [`RcuLock`].
///
/// Obtained from [`RcuLock::write_begin`]. At most one `WriteGuard` exists per
/// lock at any time. The write protocol is:
///
/// 1. publish a copy-on-write replacement (e.g. [`RcuPtr::replace`]);
/// 2. [`wait`](Self::wait) until no reader can still observe the old version;
/// 3. [`release`](Self::release) the old version;
/// 4. drop the guard, or call [`end`](Self::end).
///
/// **Thread Safety**: the guard wraps a mutex guard and must stay on the
/// thread that created it.
///
/// 对 [`RcuLock`] 的独占写入者访问。
/// 写入协议：
/// 1. 发布写时复制的替代值；
/// 2. [`wait`](Self::wait) 直到没有读者还能观察到旧版本；
/// 3. [`release`](Self::release) 旧版本；
/// 4. drop 守卫，或调用 [`end`](Self::end)。
///
/// [`RcuPtr::replace`]: crate::RcuPtr::replace
#[must_use]
pub struct WriteGuard<'a> {
    pub(crate) lock: &'a RcuLock,
    /// Holds serialization; the value counts completed transitions.
    serial: MutexGuard<'a, u64>,
}

impl<'a> WriteGuard<'a> {
    /// Run one epoch transition: announce the next epoch, wait for every
    /// reader of the current generation to leave, then merge the readers
    /// admitted meanwhile into the current generation.
    ///
    /// Call this after publishing the replacement and before releasing the
    /// old version. When it returns, no reader can still hold a reference to
    /// anything unlinked before the call.
    ///
    /// Blocks for as long as current-generation readers stay inside; a reader
    /// that never ends blocks the writer forever. If the drain exceeds the
    /// configured slow-drain threshold a `tracing` warning is logged once.
    ///
    /// 执行一次纪元切换：宣告下一个纪元，等待当前代的所有读者离开，
    /// 然后把期间被接纳的读者合并进当前代。
    /// 返回后，调用之前被摘除的任何内容都不会再被读者引用。
    pub fn wait(&mut self) -> Transition {
        let from = self.lock.state.current_epoch();
        let (to, drained) = self.announce_next(from);

        let waited = if drained > 0 {
            self.drain()
        } else {
            Duration::ZERO
        };

        let merged = self.merge(to);
        *self.serial += 1;

        Transition {
            from,
            to,
            drained,
            merged,
            waited,
        }
    }

    /// Free a version retired under this lock.
    ///
    /// Completed transitions are counted separately from the epoch, so the
    /// check below holds even after the epoch has wrapped around.
    ///
    /// # Panics
    /// - If `retired` was unlinked from a pointer bound to another lock: this
    ///   lock's transitions never waited for that lock's readers.
    /// - If no transition has completed since `retired` was unlinked, i.e. the
    ///   writer skipped [`wait`](Self::wait). Readers might still observe it.
    ///
    /// 释放在此锁下退休的版本。
    /// 如果 `retired` 来自绑定到其他锁的指针，或者自其被摘除以来
    /// 没有完成任何切换（即跳过了 `wait`），则 panic。
    pub fn release<T>(&self, retired: Retired<T>) {
        assert!(
            retired.lock == self.lock.id,
            "BUG: Releasing a value retired under a different RcuLock. \
             This lock's transitions do not wait for that lock's readers."
        );
        assert!(
            retired.generation < *self.serial,
            "BUG: Releasing a retired value before `wait` completed a transition. \
             Readers may still observe it."
        );
        // SAFETY: a full transition has completed since the value was
        // unlinked, so every reader that could have loaded it has left.
        unsafe { retired.reclaim() }
    }

    /// Release writer serialization. Equivalent to dropping the guard.
    #[inline]
    pub fn end(self) {}

    /// The lock this guard serializes.
    #[inline]
    pub fn lock(&self) -> &'a RcuLock {
        self.lock
    }

    /// Transitions completed on this lock so far, including this session's.
    #[inline]
    pub(crate) fn transitions(&self) -> u64 {
        *self.serial
    }

    /// Step 1: publish the next epoch as pending and snapshot the readers
    /// still inside the current generation.
    ///
    /// From here until the merge every newly admitted reader is counted as
    /// a next-generation reader, so `current_readers` can only shrink.
    fn announce_next(&self, from: Epoch) -> (Epoch, usize) {
        let _pass = self.lock.gate.enter_exclusive();

        assert!(
            self.lock.state.pending_epoch().is_none(),
            "BUG: Transition announced while another is still pending."
        );

        let next = from.next();
        self.lock.state.set_pending(next);
        let readers = self.lock.state.current_readers.load();

        tracing::trace!(from = %from, to = %next, readers, "announced next epoch");

        (next, readers)
    }

    /// Step 2: block until `current_readers` reaches zero.
    fn drain(&self) -> Duration {
        let started = Instant::now();
        let mut warned = false;
        let mut guard = self.lock.drain.lock();

        while self.lock.state.current_readers.load() > 0 {
            match self.lock.slow_drain_warning {
                Some(threshold) if !warned => {
                    let remaining = threshold.saturating_sub(started.elapsed());
                    let (next_guard, timed_out) = self.lock.drained.wait_timeout(guard, remaining);
                    guard = next_guard;

                    if timed_out || started.elapsed() >= threshold {
                        let readers = self.lock.state.current_readers.load();
                        if readers > 0 {
                            tracing::warn!(
                                epoch = %self.lock.state.current_epoch(),
                                readers,
                                elapsed = ?started.elapsed(),
                                "writer still draining readers of the retiring epoch"
                            );
                        }
                        warned = true;
                    }
                }
                _ => guard = self.lock.drained.wait(guard),
            }
        }

        drop(guard);
        started.elapsed()
    }

    /// Step 3: fold next-generation readers into the current generation,
    /// make `to` live, then clear the marker.
    fn merge(&self, to: Epoch) -> usize {
        let _pass = self.lock.gate.enter_exclusive();

        assert!(
            self.lock.state.current_readers.load() == 0,
            "BUG: Merging epoch {to} while readers of the retiring epoch remain."
        );

        let moved = self.lock.state.next_readers.take();
        self.lock.state.current_readers.absorb(moved);
        self.lock.state.publish(to);

        tracing::trace!(epoch = %to, merged = moved, "merged next epoch");

        moved
    }
}

impl std::fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGuard")
            .field("epoch", &self.lock.current_epoch())
            .finish_non_exhaustive()
    }
}
