/// 并发测试模块
/// 测试读者与写入者切换之间的交错、排空等待和写入者串行化
use crate::{CowMap, Epoch, RcuLock, RcuPtr, Rcu, ReaderCounts};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Spin until `cond` holds, failing the test after a generous deadline.
fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::yield_now();
    }
}

/// 测试1: 读者先被接纳，写入者在排空处阻塞；读者注销后写入者完成合并
#[test]
fn test_writer_blocks_on_drain_until_reader_ends() {
    let lock = Arc::new(RcuLock::new());
    let done = Arc::new(AtomicBool::new(false));

    let epoch = lock.read_begin();
    assert_eq!(epoch, Epoch::FIRST);

    let writer = {
        let lock = Arc::clone(&lock);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut writer = lock.write_begin();
            let transition = writer.wait();
            done.store(true, Ordering::SeqCst);
            transition
        })
    };

    wait_until(|| lock.is_transitioning());
    assert!(!done.load(Ordering::SeqCst));

    // A reader admitted now belongs to the pending epoch and is not waited on.
    let late = lock.read_begin();
    assert_eq!(late, epoch.next());
    assert_eq!(lock.current_epoch(), epoch);
    assert_eq!(lock.reader_counts(), ReaderCounts { current: 1, next: 1 });

    thread::sleep(Duration::from_millis(20));
    assert!(!done.load(Ordering::SeqCst));

    lock.read_end(epoch);
    let transition = writer.join().unwrap();

    assert!(done.load(Ordering::SeqCst));
    assert_eq!(transition.from, epoch);
    assert_eq!(transition.to, late);
    assert_eq!(transition.drained, 1);
    assert_eq!(transition.merged, 1);
    assert!(!lock.is_transitioning());
    assert_eq!(lock.current_epoch(), late);

    // The late reader was merged into the current generation.
    assert_eq!(lock.reader_counts(), ReaderCounts { current: 1, next: 0 });
    lock.read_end(late);
    assert_eq!(lock.reader_counts().total(), 0);
}

/// 测试2: wait 不会在公告前被接纳的读者离开之前返回
#[test]
fn test_wait_outlasts_pre_announce_reader() {
    let lock = Arc::new(RcuLock::new());
    let inside = Arc::new(AtomicBool::new(false));
    let left = Arc::new(AtomicBool::new(false));

    let reader = {
        let lock = Arc::clone(&lock);
        let inside = Arc::clone(&inside);
        let left = Arc::clone(&left);
        thread::spawn(move || {
            let guard = lock.read();
            inside.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            left.store(true, Ordering::SeqCst);
            drop(guard);
        })
    };

    wait_until(|| inside.load(Ordering::SeqCst));

    let mut writer = lock.write_begin();
    let transition = writer.wait();
    assert!(left.load(Ordering::SeqCst));
    assert_eq!(transition.drained, 1);
    drop(writer);

    reader.join().unwrap();
}

/// 测试3: 100 个读者线程与 1 个写入者线程（1000 次顺序更新）
#[test]
fn test_hundred_readers_one_writer_thousand_updates() {
    const READERS: usize = 100;
    const UPDATES: usize = 1000;

    let map = Arc::new(Rcu::new(CowMap::new()));
    map.write(0usize, 0usize);
    let stop = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for _ in 0..READERS {
        let map = Arc::clone(&map);
        let stop = Arc::clone(&stop);
        let reads = Arc::clone(&reads);
        handles.push(thread::spawn(move || {
            let mut last = 0;
            while !stop.load(Ordering::Relaxed) {
                let value = map.read(&0).expect("key 0 is always present");
                // Later read sections never observe an older version.
                assert!(value >= last);
                last = value;
                reads.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    let writer = {
        let map = Arc::clone(&map);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            for i in 1..=UPDATES {
                map.write(0, i);
            }
            stop.store(true, Ordering::Relaxed);
        })
    };

    writer.join().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    let lock = map.lock();
    assert_eq!(lock.reader_counts(), ReaderCounts { current: 0, next: 0 });
    assert!(!lock.is_transitioning());
    // One transition for the seed write plus one per update.
    assert_eq!(lock.current_epoch().get() as usize, 1 + 1 + UPDATES);
    assert_eq!(map.read(&0), Some(UPDATES));
    assert!(reads.load(Ordering::Relaxed) > 0);
}

/// 测试4: 多个写入者线程永远不会交错执行切换步骤
#[test]
fn test_writers_are_serialized() {
    const WRITERS: usize = 4;
    const ITERATIONS: usize = 200;

    let lock = Arc::new(RcuLock::new());
    let in_write = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let lock = Arc::clone(&lock);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let _guard = lock.read();
            }
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let in_write = Arc::clone(&in_write);
            thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let mut writer = lock.write_begin();
                    assert!(!in_write.swap(true, Ordering::SeqCst));

                    let before = lock.current_epoch();
                    assert!(!lock.is_transitioning());
                    let transition = writer.wait();
                    assert_eq!(transition.from, before);
                    assert_eq!(lock.current_epoch(), before.next());
                    assert!(!lock.is_transitioning());

                    in_write.store(false, Ordering::SeqCst);
                    writer.end();
                }
            })
        })
        .collect();

    for handle in writers {
        handle.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    assert_eq!(lock.current_epoch().get() as usize, 1 + WRITERS * ITERATIONS);
    assert_eq!(lock.reader_counts().total(), 0);
}

/// A value whose drops are counted.
struct Tracked {
    words: Vec<u64>,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// 测试5: 读者永远不会观察到被释放或撕裂的版本
#[test]
fn test_readers_never_see_torn_or_released_values() {
    const UPDATES: u64 = 300;

    let lock = Arc::new(RcuLock::new());
    let drops = Arc::new(AtomicUsize::new(0));
    let ptr = Arc::new(RcuPtr::new(Tracked {
        words: vec![0; 64],
        drops: Arc::clone(&drops),
    }));
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let ptr = Arc::clone(&ptr);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let guard = lock.read();
                    let value = ptr.load(&guard);
                    let first = value.words[0];
                    assert!(value.words.iter().all(|w| *w == first));
                }
            })
        })
        .collect();

    for i in 1..=UPDATES {
        let mut writer = lock.write_begin();
        let old = ptr.replace(
            Tracked {
                words: vec![i; 64],
                drops: Arc::clone(&drops),
            },
            &writer,
        );
        writer.wait();
        writer.release(old);
    }

    stop.store(true, Ordering::Relaxed);
    for handle in readers {
        handle.join().unwrap();
    }

    assert_eq!(drops.load(Ordering::SeqCst), UPDATES as usize);
    assert_eq!(lock.reader_counts().total(), 0);
}

/// 测试6: 读者在切换前后反复进出，计数最终归零
#[test]
fn test_reader_churn_across_transitions() {
    let lock = Arc::new(RcuLock::new());
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let a = lock.read_begin();
                    let b = lock.read_begin();
                    thread::yield_now();
                    lock.read_end(a);
                    lock.read_end(b);
                }
            })
        })
        .collect();

    for _ in 0..500 {
        let mut writer = lock.write_begin();
        let transition = writer.wait();
        assert_eq!(transition.to, transition.from.next());
    }

    stop.store(true, Ordering::Relaxed);
    for handle in readers {
        handle.join().unwrap();
    }

    assert_eq!(lock.reader_counts(), ReaderCounts::default());
    assert_eq!(lock.current_epoch().get(), 501);
}
