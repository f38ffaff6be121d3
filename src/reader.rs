use crate::epoch::Epoch;
use crate::lock::RcuLock;

impl RcuLock {
    /// Admit a reader and return the epoch it was admitted under.
    ///
    /// While no transition is in flight the reader joins the current
    /// generation and receives the live epoch. While a writer is between
    /// announce and merge, the reader joins the next generation and receives
    /// the pending epoch: the writer has already published the replacement,
    /// so this reader is not waited on by the in-flight transition and must
    /// only observe the new version.
    ///
    /// Every call must be paired with exactly one [`read_end`](Self::read_end)
    /// carrying the returned epoch. Prefer [`read`](Self::read), which does the
    /// pairing automatically.
    ///
    /// Never blocks except for the short exclusive window in which the writer
    /// announces or merges.
    ///
    /// 接纳一个读者并返回它被接纳时所在的纪元。
    ///
    /// 没有切换进行时，读者加入当前代并得到存活纪元。
    /// 写入者处于宣告与合并之间时，读者加入下一代并得到挂起的纪元：
    /// 写入者已经发布了替代值，因此正在进行的切换不会等待此读者，
    /// 它也只能观察新版本。
    #[inline]
    pub fn read_begin(&self) -> Epoch {
        let _pass = self.gate.enter_shared();

        match self.state.pending_epoch() {
            Some(next) => {
                self.state.next_readers.increment();
                next
            }
            None => {
                self.state.current_readers.increment();
                self.state.current_epoch()
            }
        }
    }

    /// Deregister a reader admitted by [`read_begin`](Self::read_begin).
    ///
    /// A reader whose epoch equals the pending epoch still sits in the next
    /// generation. Every other valid epoch is the live one: either the reader
    /// was admitted before the transition began, or its generation has since
    /// been merged into the current one. The last current reader to leave
    /// while a transition is in flight wakes the draining writer.
    ///
    /// # Panics
    /// If `epoch` is neither the live nor the pending epoch, or the counter it
    /// maps to is already zero. Both mean the epoch was not returned by a
    /// matching `read_begin` (or was ended twice).
    ///
    /// 注销一个由 [`read_begin`](Self::read_begin) 接纳的读者。
    ///
    /// 纪元等于挂起纪元的读者仍属于下一代。其他有效纪元都是存活纪元：
    /// 读者要么在切换开始前被接纳，要么它所在的代已经被合并进当前代。
    /// 切换进行期间最后一个离开的当前读者会唤醒正在排空的写入者。
    #[inline]
    pub fn read_end(&self, epoch: Epoch) {
        let wake_writer = {
            let _pass = self.gate.enter_shared();
            let pending = self.state.pending_epoch();

            if pending == Some(epoch) {
                self.state.next_readers.decrement();
                false
            } else {
                assert!(
                    epoch == self.state.current_epoch(),
                    "BUG: `read_end` called with epoch {epoch}, which is neither the live \
                     nor the pending epoch. It was not returned by a matching `read_begin`."
                );
                let left = self.state.current_readers.decrement();
                left == 0 && pending.is_some()
            }
        };

        if wake_writer {
            let _drain = self.drain.lock();
            self.drained.notify_one();
        }
    }

    /// Enter a read-side critical section.
    ///
    /// Returns a [`ReadGuard`] that calls `read_end` when dropped. Values
    /// loaded through an [`RcuPtr`](crate::RcuPtr) with this guard stay valid
    /// for the guard's lifetime.
    ///
    /// 进入读侧临界区。
    /// 返回一个 [`ReadGuard`]，在其被 drop 时调用 `read_end`。
    #[inline]
    pub fn read(&self) -> ReadGuard<'_> {
        let epoch = self.read_begin();
        ReadGuard { lock: self, epoch }
    }
}

/// A read-side critical section.
///
/// `ReadGuard` is obtained from [`RcuLock::read`]. While it exists, no writer
/// transition that began after it can complete without waiting for it, so
/// anything the guard observed stays alive.
///
/// Keep guards short: a writer draining the current generation waits for
/// every such guard to drop.
///
/// 读侧临界区。
/// 只要 `ReadGuard` 存在，它所观察到的内容就保持存活。
/// 请保持守卫短暂：排空当前代的写入者会等待每一个这样的守卫被 drop。
#[must_use]
pub struct ReadGuard<'a> {
    lock: &'a RcuLock,
    epoch: Epoch,
}

impl<'a> ReadGuard<'a> {
    /// The epoch this reader was admitted under.
    #[inline]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// The lock this reader is registered with.
    #[inline]
    pub fn lock(&self) -> &'a RcuLock {
        self.lock
    }
}

impl std::fmt::Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadGuard").field("epoch", &self.epoch).finish()
    }
}

impl Drop for ReadGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.read_end(self.epoch);
    }
}
