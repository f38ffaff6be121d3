use crate::epoch::{Epoch, NO_TRANSITION};
use crate::sync::{AtomicU32, AtomicUsize, Ordering};

/// A reader counter on its own cache line.
///
/// Readers hammer both counters; keeping them apart from each other and from
/// the epoch words avoids one counter's traffic slowing the other.
///
/// 独占一个缓存行的读者计数器。
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct ReaderCounter {
    count: AtomicUsize,
}

impl ReaderCounter {
    pub(crate) fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn load(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement and return the count left behind.
    ///
    /// Reaching below zero means a reader presented an epoch it was never
    /// admitted under, which is a contract violation.
    #[inline]
    pub(crate) fn decrement(&self) -> usize {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        assert!(
            prev > 0,
            "BUG: Reader counter underflow. \
             `read_end` was called with an epoch that has no matching `read_begin`."
        );
        prev - 1
    }

    /// Add a bulk of readers moved from the other generation.
    #[inline]
    pub(crate) fn absorb(&self, readers: usize) {
        self.count.fetch_add(readers, Ordering::AcqRel);
    }

    /// Take every reader out of this counter, leaving it at zero.
    #[inline]
    pub(crate) fn take(&self) -> usize {
        self.count.swap(0, Ordering::AcqRel)
    }
}

/// Epoch bookkeeping shared by readers and the writer.
///
/// - `epoch`: the live generation; only the writer's merge step advances it.
/// - `marker`: `NO_TRANSITION`, or the epoch an in-flight transition moves to.
/// - `current_readers`: readers admitted under the live generation.
/// - `next_readers`: readers admitted while a transition is in flight.
///
/// Readers mutate the counters only while holding the shared side of the
/// admission gate; the writer changes `epoch`, `marker` and performs the bulk
/// move between counters only while holding the exclusive side.
///
/// 读者与写入者共享的纪元簿记。
///
/// - `epoch`：当前存活的代；只有写入者的合并步骤会推进它。
/// - `marker`：`NO_TRANSITION`，或正在进行的切换所要进入的纪元。
/// - `current_readers`：在当前代下被接纳的读者数。
/// - `next_readers`：在切换进行期间被接纳的读者数。
#[derive(Debug)]
pub(crate) struct EpochState {
    epoch: AtomicU32,
    marker: AtomicU32,
    pub(crate) current_readers: ReaderCounter,
    pub(crate) next_readers: ReaderCounter,
}

impl EpochState {
    pub(crate) fn new(initial: Epoch) -> Self {
        Self {
            epoch: AtomicU32::new(initial.get()),
            marker: AtomicU32::new(NO_TRANSITION),
            current_readers: ReaderCounter::new(),
            next_readers: ReaderCounter::new(),
        }
    }

    #[inline]
    pub(crate) fn current_epoch(&self) -> Epoch {
        let raw = self.epoch.load(Ordering::Acquire);
        Epoch::new(raw).unwrap_or_else(|| unreachable!("BUG: live epoch is zero"))
    }

    /// The epoch an in-flight transition is moving to, if any.
    #[inline]
    pub(crate) fn pending_epoch(&self) -> Option<Epoch> {
        Epoch::new(self.marker.load(Ordering::Acquire))
    }

    /// Writer only, under the exclusive gate.
    #[inline]
    pub(crate) fn set_pending(&self, next: Epoch) {
        self.marker.store(next.get(), Ordering::Release);
    }

    /// Writer only, under the exclusive gate: make `next` live, then clear
    /// the marker.
    #[inline]
    pub(crate) fn publish(&self, next: Epoch) {
        self.epoch.store(next.get(), Ordering::Release);
        self.marker.store(NO_TRANSITION, Ordering::Release);
    }

    pub(crate) fn counts(&self) -> ReaderCounts {
        ReaderCounts {
            current: self.current_readers.load(),
            next: self.next_readers.load(),
        }
    }
}

/// A snapshot of both reader counters.
///
/// The two fields are read one after the other without the admission gate,
/// so under concurrent traffic the pair is only approximately consistent.
/// Once every reader and writer is quiescent it is exact.
///
/// 两个读者计数器的快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderCounts {
    /// Readers admitted under the live epoch.
    pub current: usize,
    /// Readers admitted during an in-flight transition.
    pub next: usize,
}

impl ReaderCounts {
    #[inline]
    pub fn total(&self) -> usize {
        self.current + self.next
    }
}
