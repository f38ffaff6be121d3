use std::fmt;
use std::num::NonZeroU32;

/// Marker value meaning "no writer transition in progress".
/// 表示"没有正在进行的写入者切换"的标记值。
pub(crate) const NO_TRANSITION: u32 = 0;

/// A generation of the guarded value.
///
/// Epochs are never zero: zero is reserved for the transition marker, so that
/// "is a transition pending" stays a plain zero test even after the counter
/// wraps around. Advancing past [`Epoch::MAX`] lands on [`Epoch::FIRST`].
///
/// A reader receives an `Epoch` from [`RcuLock::read_begin`] and must hand the
/// very same value back to [`RcuLock::read_end`].
///
/// 受保护值的一个"代"。
///
/// 纪元永远不为零：零保留给切换标记使用，
/// 这样即使计数器回绕，"是否有切换挂起"仍然只是一次简单的零判断。
/// 越过 [`Epoch::MAX`] 后回到 [`Epoch::FIRST`]。
///
/// [`RcuLock::read_begin`]: crate::RcuLock::read_begin
/// [`RcuLock::read_end`]: crate::RcuLock::read_end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(NonZeroU32);

impl Epoch {
    /// The epoch a freshly built lock starts in.
    pub const FIRST: Epoch = Epoch(NonZeroU32::MIN);

    /// The largest representable epoch; its successor is [`Epoch::FIRST`].
    pub const MAX: Epoch = Epoch(NonZeroU32::MAX);

    /// Returns `None` for zero, which is not a valid epoch.
    #[inline]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(value) => Some(Epoch(value)),
            None => None,
        }
    }

    /// The raw epoch value, never zero.
    /// 原始纪元值，永远不为零。
    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// The epoch that follows this one, wrapping from `MAX` to `FIRST`.
    ///
    /// 下一个纪元，从 `MAX` 回绕到 `FIRST`（跳过 0）。
    #[inline]
    pub const fn next(self) -> Self {
        match self.0.checked_add(1) {
            Some(next) => Epoch(next),
            None => Self::FIRST,
        }
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::FIRST
    }
}

impl From<Epoch> for u32 {
    fn from(epoch: Epoch) -> u32 {
        epoch.get()
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_an_epoch() {
        assert_eq!(Epoch::new(0), None);
        assert_eq!(Epoch::new(1), Some(Epoch::FIRST));
    }

    #[test]
    fn next_increments() {
        let e = Epoch::new(41).unwrap();
        assert_eq!(e.next().get(), 42);
        assert!(e.next() > e);
    }

    #[test]
    fn next_wraps_to_first_skipping_zero() {
        assert_eq!(Epoch::MAX.get(), u32::MAX);
        assert_eq!(Epoch::MAX.next(), Epoch::FIRST);
        assert_ne!(Epoch::MAX.next().get(), NO_TRANSITION);
    }

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(Epoch::new(7).unwrap().to_string(), "7");
        assert_eq!(u32::from(Epoch::FIRST), 1);
    }
}
