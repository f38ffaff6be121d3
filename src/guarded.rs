use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::lock::RcuLock;
use crate::ptr::{RcuPtr, Retired};
use crate::reader::ReadGuard;
use crate::writer::{Transition, WriteGuard};

/// The capabilities a payload needs to be guarded by an [`Rcu`].
///
/// - `get` runs inside a read-side critical section, concurrently with other
///   readers and with a writer that is building the next version. It must
///   never observe a half-written value.
/// - `copy_and_set` runs while writer serialization is held. It must publish
///   the new version before returning, without mutating the published one in
///   place, and hand back whatever it unlinked.
/// - `release` runs strictly after [`WriteGuard::wait`] has returned.
///
/// 负载被 [`Rcu`] 保护所需的能力。
///
/// - `get` 在读侧临界区中执行，可与其他读者以及正在构建下一版本的写入者并发。
/// - `copy_and_set` 在持有写入者串行化时执行，必须在返回前发布新版本，
///   不得原地修改已发布的版本，并交回被摘除的内容。
/// - `release` 严格在 [`WriteGuard::wait`] 返回之后执行。
pub trait CopyOnWrite {
    type Key;
    type Value;
    /// Whatever `copy_and_set` unlinked.
    type Old;

    fn get(&self, key: &Self::Key, guard: &ReadGuard<'_>) -> Option<Self::Value>;

    fn copy_and_set(&self, key: Self::Key, value: Self::Value, writer: &WriteGuard<'_>)
    -> Self::Old;

    fn release(&self, old: Self::Old, writer: &WriteGuard<'_>);
}

/// A copy-on-write payload paired with the [`RcuLock`] that protects it.
///
/// **Typical Usage**:
/// ```
/// use rcu_epoch::{CowMap, Rcu};
///
/// let routes: Rcu<CowMap<&str, u16>> = Rcu::new(CowMap::new());
/// routes.write("api", 8080);
/// assert_eq!(routes.read(&"api"), Some(8080));
/// assert_eq!(routes.read(&"web"), None);
/// ```
///
/// 一个写时复制负载与保护它的 [`RcuLock`] 的组合。
#[derive(Debug, Default)]
pub struct Rcu<P> {
    lock: RcuLock,
    payload: P,
}

impl<P: CopyOnWrite> Rcu<P> {
    /// Guard `payload` with a lock built from default settings.
    /// 使用默认设置构建的锁保护 `payload`。
    pub fn new(payload: P) -> Self {
        Self::with_lock(RcuLock::new(), payload)
    }

    /// Guard `payload` with a lock configured by the caller.
    /// 使用调用者配置的锁保护 `payload`。
    pub fn with_lock(lock: RcuLock, payload: P) -> Self {
        Self { lock, payload }
    }

    /// Read one value. Never waits for a writer's drain.
    ///
    /// 读取一个值。永远不会等待写入者的排空。
    pub fn read(&self, key: &P::Key) -> Option<P::Value> {
        let guard = self.lock.read();
        self.payload.get(key, &guard)
    }

    /// Replace one value: copy and publish, wait for the readers of the old
    /// version to leave, then release it.
    ///
    /// Blocks while another writer is active and while readers admitted
    /// before this write are still inside.
    ///
    /// 替换一个值：复制并发布，等待旧版本的读者离开，然后释放旧版本。
    pub fn write(&self, key: P::Key, value: P::Value) -> Transition {
        let mut writer = self.lock.write_begin();
        let old = self.payload.copy_and_set(key, value, &writer);
        let transition = writer.wait();
        self.payload.release(old, &writer);
        writer.end();
        transition
    }

    /// The lock guarding the payload, e.g. to take a [`ReadGuard`] for
    /// [`CowMap::get_ref`].
    ///
    /// 保护负载的锁，例如用于为 [`CowMap::get_ref`] 获取 [`ReadGuard`]。
    pub fn lock(&self) -> &RcuLock {
        &self.lock
    }

    /// The guarded payload. Its pointers are bound to [`lock`](Self::lock),
    /// so guards of any other lock are rejected.
    ///
    /// 受保护的负载。其指针绑定到 [`lock`](Self::lock)，其他锁的守卫会被拒绝。
    pub fn payload(&self) -> &P {
        &self.payload
    }
}

/// A copy-on-write hash map: every write clones the table, edits the clone
/// and publishes it; readers always see one complete table.
///
/// Suited to small, read-mostly tables such as routing or configuration
/// snapshots, since each write costs a full copy.
///
/// 写时复制的哈希表：每次写入都会克隆整张表、修改副本并发布；
/// 读者总是看到一张完整的表。
#[derive(Debug)]
pub struct CowMap<K, V> {
    table: RcuPtr<HashMap<K, V>>,
}

impl<K, V> CowMap<K, V> {
    /// An empty table.
    /// 一张空表。
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Start from an existing table.
    /// 从已有的表开始。
    pub fn from_map(map: HashMap<K, V>) -> Self {
        Self {
            table: RcuPtr::new(map),
        }
    }

    /// The whole table as seen by a reader.
    #[inline]
    pub fn snapshot<'a>(&'a self, guard: &'a ReadGuard<'_>) -> &'a HashMap<K, V> {
        self.table.load(guard)
    }
}

impl<K: Hash + Eq, V> CowMap<K, V> {
    /// Look up a key without cloning the value.
    #[inline]
    pub fn get_ref<'a, Q>(&'a self, key: &Q, guard: &'a ReadGuard<'_>) -> Option<&'a V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.load(guard).get(key)
    }
}

impl<K, V> Default for CowMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> CowMap<K, V> {
    /// Copy the table with `key` removed and publish it.
    pub fn copy_and_remove(&self, key: &K, writer: &WriteGuard<'_>) -> Retired<HashMap<K, V>> {
        let mut next = self.table.current(writer).clone();
        next.remove(key);
        self.table.replace(next, writer)
    }
}

impl<K: Hash + Eq + Clone, V: Clone> CopyOnWrite for CowMap<K, V> {
    type Key = K;
    type Value = V;
    type Old = Retired<HashMap<K, V>>;

    fn get(&self, key: &K, guard: &ReadGuard<'_>) -> Option<V> {
        self.table.load(guard).get(key).cloned()
    }

    fn copy_and_set(&self, key: K, value: V, writer: &WriteGuard<'_>) -> Self::Old {
        let mut next = self.table.current(writer).clone();
        next.insert(key, value);
        self.table.replace(next, writer)
    }

    fn release(&self, old: Self::Old, writer: &WriteGuard<'_>) {
        writer.release(old);
    }
}
