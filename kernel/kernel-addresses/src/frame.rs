use crate::{FRAME_SIZE, PhysAddr};
use core::fmt;

/// A physical frame number.
///
/// Frame `n` covers the physical byte range `[n * FRAME_SIZE, (n+1) * FRAME_SIZE)`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Frame(u32);

impl Frame {
    #[inline]
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }

    /// Physical address of the first byte of this frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysAddr {
        PhysAddr::new(self.0 * FRAME_SIZE)
    }

    /// The frame `count` frames after this one.
    #[inline]
    #[must_use]
    pub const fn offset(self, count: u32) -> Self {
        Self(self.0 + count)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
