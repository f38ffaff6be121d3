//! # RCU Epoch
//!
//! An epoch-based read-copy-update lock for values that are read constantly
//! and changed rarely: routing tables, configuration snapshots, small lists.
//!
//! Readers never take a lock that a writer holds for long. A reader registers
//! itself against the live epoch (or, while a writer is mid-transition,
//! against the epoch being transitioned to), reads, and deregisters. Writers
//! are serialized; each one publishes a copy-on-write replacement, waits until
//! every reader that could still see the old version has left, and then frees
//! it synchronously.
//!
//! ## Core Components
//!
//! - [`RcuLock`]: the epoch state machine. Readers use
//!   [`read_begin`](RcuLock::read_begin) / [`read_end`](RcuLock::read_end) or the
//!   RAII [`read`](RcuLock::read); writers use
//!   [`write_begin`](RcuLock::write_begin) and [`WriteGuard::wait`].
//! - [`RcuPtr`]: an atomic pointer whose loads are tied to a [`ReadGuard`] and
//!   whose replacements return a [`Retired`] value that may only be released
//!   after a transition.
//! - [`Rcu`] with [`CopyOnWrite`]: the lock composed with any payload that can
//!   get, copy-and-set and release; [`CowMap`] is a ready-made payload.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use rcu_epoch::{CowMap, Rcu};
//!
//! let table = Arc::new(Rcu::new(CowMap::new()));
//! table.write(1u32, "one");
//!
//! let reader = {
//!     let table = Arc::clone(&table);
//!     thread::spawn(move || {
//!         for _ in 0..100 {
//!             assert!(table.read(&1).is_some());
//!         }
//!     })
//! };
//!
//! table.write(1, "uno");
//! reader.join().unwrap();
//! assert_eq!(table.read(&1), Some("uno"));
//! ```
//!
//! ## Transition protocol
//!
//! [`WriteGuard::wait`] runs three steps, the first and last under an
//! exclusive admission gate that readers hold in shared mode while they pick
//! and update a counter:
//!
//! 1. **announce**: mark the next epoch as pending and snapshot the readers of
//!    the current epoch. Readers admitted from here on count as next-epoch
//!    readers and already see the new version.
//! 2. **drain**: if the snapshot was non-zero, sleep until the last
//!    current-epoch reader leaves and signals.
//! 3. **merge**: move the next-epoch readers into the current count, make the
//!    pending epoch live and clear the marker.
//!
//! Epochs are never zero; they wrap from `u32::MAX` to 1.
//!
//! ## Loom
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test --features loom --test loom_tests --release
//! ```

mod epoch;
mod gate;
mod guarded;
mod lock;
mod ptr;
mod reader;
mod state;
mod sync;
mod writer;

pub use epoch::Epoch;
pub use guarded::{CopyOnWrite, CowMap, Rcu};
pub use lock::{RcuLock, RcuLockBuilder};
pub use ptr::{RcuPtr, Retired};
pub use reader::ReadGuard;
pub use state::ReaderCounts;
pub use writer::{Transition, WriteGuard};

#[cfg(all(test, not(feature = "loom")))]
mod tests;
