use crate::sync::{AtomicUsize, Ordering, spin_loop};

/// High bit of the gate word: set while the writer holds the exclusive side.
const EXCLUSIVE: usize = 1 << (usize::BITS - 1);

/// A writer-preferring shared/exclusive spin gate.
///
/// Readers take the shared side around "sample marker, then touch a counter";
/// the writer takes the exclusive side around its announce and merge steps.
/// Both critical sections are a handful of atomic operations, so spinning is
/// bounded by that and never by a drain.
///
/// Once the writer has set `EXCLUSIVE`, no new reader may enter; the writer
/// then spins until the shared holders already inside have left.
///
/// 偏向写入者的共享/独占自旋闸门。
///
/// 读者在"采样标记，然后修改计数器"期间持有共享端；
/// 写入者在宣告和合并步骤期间持有独占端。
/// 两个临界区都只是少量原子操作，因此自旋时间受其限制，而不会受排空等待影响。
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct AdmissionGate {
    state: AtomicUsize,
}

impl AdmissionGate {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn enter_shared(&self) -> SharedPass<'_> {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & EXCLUSIVE == 0
                && self
                    .state
                    .compare_exchange_weak(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return SharedPass { gate: self };
            }
            spin_loop();
        }
    }

    /// Only the serialized writer calls this, so at most one exclusive
    /// holder can exist.
    pub(crate) fn enter_exclusive(&self) -> ExclusivePass<'_> {
        let prev = self.state.fetch_or(EXCLUSIVE, Ordering::Acquire);
        assert!(
            prev & EXCLUSIVE == 0,
            "BUG: Admission gate entered exclusively twice. \
             Writer serialization has been bypassed."
        );

        while self.state.load(Ordering::Acquire) != EXCLUSIVE {
            spin_loop();
        }

        ExclusivePass { gate: self }
    }
}

#[must_use]
pub(crate) struct SharedPass<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for SharedPass<'_> {
    #[inline]
    fn drop(&mut self) {
        self.gate.state.fetch_sub(1, Ordering::Release);
    }
}

#[must_use]
pub(crate) struct ExclusivePass<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for ExclusivePass<'_> {
    #[inline]
    fn drop(&mut self) {
        self.gate.state.fetch_and(!EXCLUSIVE, Ordering::Release);
    }
}
