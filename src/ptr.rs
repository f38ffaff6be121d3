use crate::epoch::Epoch;
use crate::lock::RcuLock;
use crate::reader::ReadGuard;
use crate::sync::{AtomicPtr, AtomicUsize, Ordering};
use crate::writer::WriteGuard;
use std::boxed::Box;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// An RCU-protected shared pointer.
///
/// `RcuPtr<T>` can be read by any number of readers (via `load()` with a
/// [`ReadGuard`]) and replaced by the serialized writer (via `replace()` with
/// a [`WriteGuard`]). A replacement never mutates the published value in
/// place: the writer builds a new value, swaps it in, and gets the old one
/// back as a [`Retired`] that can only be freed after a transition.
///
/// **Lock Binding**:
/// - A pointer is bound to the first [`RcuLock`] whose guard it is used with.
/// - `load()`, `current()` and `replace()` panic when handed a guard of any
///   other lock, and so does releasing a [`Retired`] through another lock.
/// - The returned reference from `load()` cannot outlive the guard.
///
/// **Typical Usage**:
/// ```
/// use rcu_epoch::{RcuLock, RcuPtr};
///
/// let lock = RcuLock::new();
/// let table = RcuPtr::new(vec![1, 2, 3]);
///
/// // Reader thread:
/// let guard = lock.read();
/// assert_eq!(table.load(&guard)[1], 2);
/// drop(guard);
///
/// // Writer thread:
/// let mut writer = lock.write_begin();
/// let mut next = table.current(&writer).clone();
/// next[1] = 20;
/// let old = table.replace(next, &writer);
/// writer.wait();
/// writer.release(old);
/// ```
///
/// 一个受 RCU 保护的共享指针。
///
/// `RcuPtr<T>` 可以被任意数量的读者读取（通过 `load()` 和 [`ReadGuard`]），
/// 并由串行化的写入者替换（通过 `replace()` 和 [`WriteGuard`]）。
/// 替换从不原地修改已发布的值：写入者构造新值并换入，
/// 旧值以 [`Retired`] 的形式返回，只有在一次切换之后才能被释放。
/// 指针绑定到第一个与之配合使用的锁，之后使用其他锁的守卫会 panic。
pub struct RcuPtr<T> {
    ptr: AtomicPtr<T>,
    /// Identity of the lock this pointer is bound to; zero while unbound.
    owner: AtomicUsize,
    _marker: PhantomData<*const T>,
}

// SAFETY: values are created on one thread and dropped on whichever thread
// releases them (requires `Send`); readers on many threads share `&T`
// (requires `Sync`).
unsafe impl<T: Send> Send for RcuPtr<T> {}
unsafe impl<T: Send + Sync> Sync for RcuPtr<T> {}

impl<T> RcuPtr<T> {
    /// Create a new pointer, initialized with the given value.
    /// 创建一个新的指针，初始化为给定的值。
    #[inline]
    pub fn new(data: T) -> Self {
        Self {
            ptr: AtomicPtr::new(Box::into_raw(Box::new(data))),
            owner: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Bind this pointer to `lock`, or check that it already is.
    ///
    /// Only transitions of the bound lock wait for the readers that load
    /// through it, so a guard of any other lock must be rejected.
    ///
    /// 将此指针绑定到 `lock`，或检查它已经绑定到该锁。
    #[inline]
    fn bind(&self, lock: &RcuLock) {
        let owner = match self.owner.load(Ordering::Acquire) {
            0 => match self
                .owner
                .compare_exchange(0, lock.id, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => lock.id,
                Err(current) => current,
            },
            current => current,
        };

        assert!(
            owner == lock.id,
            "BUG: RcuPtr used with a guard of a different RcuLock than the one it is bound to."
        );
    }

    /// Reader load: the currently published value.
    ///
    /// The returned reference lives no longer than the guard, so it cannot be
    /// used after the reader has left its critical section.
    ///
    /// # Panics
    /// If the pointer is bound to a lock other than the guard's.
    ///
    /// 读取者 load：当前已发布的值。
    /// 返回的引用存活时间不超过守卫。守卫来自其他锁时 panic。
    #[inline]
    pub fn load<'a>(&'a self, guard: &'a ReadGuard<'_>) -> &'a T {
        self.bind(guard.lock());
        let ptr = self.ptr.load(Ordering::Acquire);
        // SAFETY: the pointer is never null. The value it points to is only
        // freed through `WriteGuard::release` of the bound lock after a
        // transition, which waits for the reader holding `guard`.
        unsafe { &*ptr }
    }

    /// Writer view of the currently published value, e.g. to copy it.
    ///
    /// Only the writer frees values, and it holds serialization for as long
    /// as the returned reference lives.
    #[inline]
    pub fn current<'a>(&'a self, writer: &'a WriteGuard<'_>) -> &'a T {
        self.bind(writer.lock());
        let ptr = self.ptr.load(Ordering::Acquire);
        // SAFETY: see above; no other writer can replace and free it while
        // `writer` is held.
        unsafe { &*ptr }
    }

    /// Writer replace: publish `data` and return the previous value.
    ///
    /// Readers admitted from now on observe `data`. The previous value stays
    /// alive until handed to [`WriteGuard::release`] after
    /// [`WriteGuard::wait`].
    ///
    /// 写入者替换：发布 `data` 并返回之前的值。
    /// 从现在起被接纳的读者会观察到 `data`。
    /// 之前的值在 `wait` 之后交给 `release` 前一直保持存活。
    #[inline]
    pub fn replace(&self, data: T, writer: &WriteGuard<'_>) -> Retired<T> {
        self.bind(writer.lock());
        let new_ptr = Box::into_raw(Box::new(data));
        let old_ptr = self.ptr.swap(new_ptr, Ordering::AcqRel);

        Retired {
            // SAFETY: `ptr` is initialized from `Box::into_raw` and only ever
            // swapped with other `Box::into_raw` pointers.
            ptr: unsafe { NonNull::new_unchecked(old_ptr) },
            epoch: writer.lock().current_epoch(),
            lock: writer.lock().id,
            generation: writer.transitions(),
        }
    }

    /// Exclusive access to the current value.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        let ptr = self.ptr.load(Ordering::Relaxed);
        // SAFETY: `&mut self` rules out readers and writers.
        unsafe { &mut *ptr }
    }
}

impl<T> std::fmt::Debug for RcuPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ptr = self.ptr.load(Ordering::Relaxed);
        f.debug_tuple("RcuPtr").field(&ptr).finish()
    }
}

impl<T> Drop for RcuPtr<T> {
    /// At drop time no reader or writer can be using the pointer, so the final
    /// value is dropped directly.
    ///
    /// 在 drop 时没有读者或写入者在使用该指针，所以直接 drop 最后的值。
    #[inline]
    fn drop(&mut self) {
        let ptr = self.ptr.load(Ordering::Relaxed);
        if !ptr.is_null() {
            unsafe {
                drop(Box::from_raw(ptr));
            }
        }
    }
}

/// A value unlinked by [`RcuPtr::replace`] that readers may still observe.
///
/// It can only be freed through [`WriteGuard::release`] of the lock it was
/// retired under, which checks that a transition has completed since the
/// value was unlinked. Dropping a
/// `Retired` without releasing it leaks the value rather than freeing it
/// under a reader.
///
/// 由 [`RcuPtr::replace`] 摘除、但读者可能仍在观察的值。
/// 只能通过 [`WriteGuard::release`] 释放；未释放就 drop 会泄漏该值，
/// 而不是在读者仍在使用时释放它。
#[must_use = "a retired value leaks unless passed to `WriteGuard::release`"]
pub struct Retired<T> {
    ptr: NonNull<T>,
    epoch: Epoch,
    /// Identity of the lock it was retired under.
    pub(crate) lock: usize,
    /// Transitions completed on that lock when it was unlinked.
    pub(crate) generation: u64,
}

// SAFETY: a `Retired<T>` owns its `T` exactly like a `Box<T>` would.
unsafe impl<T: Send> Send for Retired<T> {}

impl<T> Retired<T> {
    /// The live epoch at the moment the value was unlinked.
    #[inline]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// # Safety
    /// No reader may still hold a reference to the value.
    #[inline]
    pub(crate) unsafe fn reclaim(self) {
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

impl<T> std::fmt::Debug for Retired<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retired")
            .field("ptr", &self.ptr)
            .field("epoch", &self.epoch)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
