use std::time::Duration;

use crate::epoch::Epoch;
use crate::gate::AdmissionGate;
use crate::state::{EpochState, ReaderCounts};
use crate::sync::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default time a writer may spend draining readers before a warning is logged.
/// 写入者排空读者时，记录警告前可等待的默认时长。
pub(crate) const DEFAULT_SLOW_DRAIN_WARNING: Duration = Duration::from_secs(1);

/// Source of lock identities. Zero is never handed out, so it can mean
/// "not bound to any lock" in an [`RcuPtr`](crate::RcuPtr).
/// 锁标识的来源。从不分配零，因此零可以表示"尚未绑定到任何锁"。
static NEXT_LOCK_ID: AtomicUsize = AtomicUsize::new(1);

/// Builder for configuring an [`RcuLock`].
///
/// - `initial_epoch`: the epoch the lock starts in
/// - `slow_drain_warning`: how long a drain may take before it is logged
///
/// # Example
/// ```
/// use std::time::Duration;
/// use rcu_epoch::{Epoch, RcuLock};
///
/// let lock = RcuLock::builder()
///     .initial_epoch(Epoch::MAX)
///     .slow_drain_warning(Duration::from_millis(50))
///     .build();
/// assert_eq!(lock.current_epoch(), Epoch::MAX);
/// ```
///
/// 用于配置 [`RcuLock`] 的构建器。
#[derive(Debug, Clone)]
pub struct RcuLockBuilder {
    initial_epoch: Epoch,
    slow_drain_warning: Option<Duration>,
}

impl RcuLockBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            initial_epoch: Epoch::FIRST,
            slow_drain_warning: Some(DEFAULT_SLOW_DRAIN_WARNING),
        }
    }

    /// Set the epoch the lock starts in.
    ///
    /// Default: `Epoch::FIRST`
    #[inline]
    pub fn initial_epoch(mut self, epoch: Epoch) -> Self {
        self.initial_epoch = epoch;
        self
    }

    /// Set how long a writer may wait for readers to drain before a
    /// `tracing` warning is emitted. Pass `None` to never warn.
    ///
    /// The warning is diagnostic only: the writer keeps waiting.
    ///
    /// Default: `Some(1s)`
    ///
    /// 设置写入者等待读者排空多久之后发出 `tracing` 警告。
    /// 传递 `None` 则从不警告。警告仅用于诊断，写入者会继续等待。
    #[inline]
    pub fn slow_drain_warning(mut self, threshold: impl Into<Option<Duration>>) -> Self {
        self.slow_drain_warning = threshold.into();
        self
    }

    /// Build the lock. Every built lock gets a fresh identity.
    /// 构建锁。每个构建出的锁都有一个新的标识。
    #[inline]
    pub fn build(self) -> RcuLock {
        let id = NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed);
        assert!(id != 0, "BUG: Lock identities exhausted.");

        RcuLock {
            id,
            state: EpochState::new(self.initial_epoch),
            gate: AdmissionGate::new(),
            writer: Mutex::new(0),
            drain: Mutex::new(()),
            drained: Condvar::new(),
            slow_drain_warning: self.slow_drain_warning,
        }
    }
}

impl Default for RcuLockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An epoch-based read-copy-update lock.
///
/// Any number of threads may read concurrently; a reader only registers
/// itself against an epoch and never waits for a writer beyond a few atomic
/// operations. Writers are serialized. A writer publishes a copy-on-write
/// replacement, then calls [`WriteGuard::wait`], which returns once every
/// reader that could still observe the old version has left. The old version
/// can then be released.
///
/// **Reader side**:
/// - [`read_begin`](Self::read_begin) / [`read_end`](Self::read_end): a matched
///   pair; the epoch returned by the first must be passed to the second.
/// - [`read`](Self::read): the same pair as an RAII [`ReadGuard`].
///
/// **Writer side**:
/// - [`write_begin`](Self::write_begin) acquires writer serialization and
///   returns a [`WriteGuard`].
/// - [`WriteGuard::wait`] runs one epoch transition (announce, drain, merge).
/// - Dropping the guard (or [`WriteGuard::end`]) releases serialization.
///
/// **Typical Usage**:
/// ```
/// use rcu_epoch::{RcuLock, RcuPtr};
///
/// let lock = RcuLock::new();
/// let config = RcuPtr::new(String::from("v1"));
///
/// // Reader
/// {
///     let guard = lock.read();
///     assert_eq!(config.load(&guard), "v1");
/// }
///
/// // Writer
/// let mut writer = lock.write_begin();
/// let old = config.replace(String::from("v2"), &writer);
/// writer.wait();
/// writer.release(old);
/// writer.end();
/// ```
///
/// A thread holding a read section must not begin a write on the same lock:
/// the writer's drain would wait for that very reader forever.
///
/// 基于纪元的读-复制-更新锁。
///
/// 任意数量的线程可以并发读取；读者只需在某个纪元下登记自己，
/// 除了少量原子操作之外永远不会等待写入者。写入者是串行化的。
/// 写入者发布写时复制的替代值，然后调用 [`WriteGuard::wait`]，
/// 该方法在所有仍可能观察到旧版本的读者离开后返回，此后旧版本即可被释放。
///
/// [`ReadGuard`]: crate::ReadGuard
/// [`WriteGuard`]: crate::WriteGuard
/// [`WriteGuard::wait`]: crate::WriteGuard::wait
/// [`WriteGuard::end`]: crate::WriteGuard::end
pub struct RcuLock {
    /// Identity that pointers protected by this lock are bound to.
    pub(crate) id: usize,
    pub(crate) state: EpochState,
    pub(crate) gate: AdmissionGate,
    /// Writer serialization; guards the count of completed transitions,
    /// which unlike the epoch never wraps.
    pub(crate) writer: Mutex<u64>,
    /// Drain signal: the writer sleeps on `drained` while current readers remain.
    pub(crate) drain: Mutex<()>,
    pub(crate) drained: Condvar,
    pub(crate) slow_drain_warning: Option<Duration>,
}

impl RcuLock {
    /// Create a lock with default settings.
    /// 使用默认设置创建锁。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a lock.
    /// 开始配置一个锁。
    #[inline]
    pub fn builder() -> RcuLockBuilder {
        RcuLockBuilder::new()
    }

    /// The live epoch, ignoring any transition in flight.
    ///
    /// 当前存活的纪元，忽略任何正在进行的切换。
    #[inline]
    pub fn current_epoch(&self) -> Epoch {
        self.state.current_epoch()
    }

    /// Whether a writer is between announcing the next epoch and merging it.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        self.state.pending_epoch().is_some()
    }

    /// Snapshot of the reader counters.
    #[inline]
    pub fn reader_counts(&self) -> ReaderCounts {
        self.state.counts()
    }
}

impl std::fmt::Debug for RcuLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcuLock")
            .field("epoch", &self.current_epoch())
            .field("pending", &self.state.pending_epoch())
            .field("readers", &self.reader_counts())
            .finish_non_exhaustive()
    }
}

impl Default for RcuLock {
    fn default() -> Self {
        Self::new()
    }
}
