//! The first translation level: the page directory.
//!
//! - [`DirectoryIndex`]: index type for virtual address bits `[31:22]`.
//! - [`DirectoryEntry`]: either absent or a present, writable pointer to a
//!   page-table frame.
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 entries.

use crate::{ENTRY_COUNT, PageEntryBits};
use kernel_addresses::{Frame, VirtAddr};

/// Index into the page directory (virtual address bits `[31:22]`).
///
/// Strongly typed to avoid mixing with the table level. Range is `0..1024`,
/// checked in debug builds.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct DirectoryIndex(u16);

impl DirectoryIndex {
    /// Directory slot covering `va` (extracts bits `[31:22]`).
    #[inline]
    #[must_use]
    pub const fn of(va: VirtAddr) -> Self {
        Self::new(((va.as_u32() >> 22) & 0x3FF) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < ENTRY_COUNT as u16);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A page directory entry: absent, or a present pointer to a table frame.
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct DirectoryEntry(PageEntryBits);

impl DirectoryEntry {
    /// Not-present entry (supervisor, writable once present).
    #[inline]
    #[must_use]
    pub const fn absent() -> Self {
        Self(PageEntryBits::absent())
    }

    /// Present, writable pointer to the page table stored in `frame`.
    #[inline]
    #[must_use]
    pub const fn table(frame: Frame) -> Self {
        Self(
            PageEntryBits::absent()
                .with_present(true)
                .with_frame(frame),
        )
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// The page-table frame, if this entry is present.
    #[inline]
    #[must_use]
    pub const fn table_frame(self) -> Option<Frame> {
        if self.0.present() {
            Some(self.0.frame())
        } else {
            None
        }
    }

    /// The underlying bitfield for inspection.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> PageEntryBits {
        self.0
    }
}

/// The page directory: 1024 entries, 4 KiB-aligned, one per address space.
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [DirectoryEntry; ENTRY_COUNT],
}

impl PageDirectory {
    #[inline]
    #[must_use]
    pub const fn get(&self, i: DirectoryIndex) -> DirectoryEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: DirectoryIndex, e: DirectoryEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Reset every slot to the not-present default.
    pub fn fill_absent(&mut self) {
        self.entries = [DirectoryEntry::absent(); ENTRY_COUNT];
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_extracts_top_bits() {
        assert_eq!(DirectoryIndex::of(VirtAddr::new(0)).as_usize(), 0);
        assert_eq!(DirectoryIndex::of(VirtAddr::new(0x0040_0000)).as_usize(), 1);
        assert_eq!(
            DirectoryIndex::of(VirtAddr::new(0xFFC0_0000)).as_usize(),
            1023
        );
    }

    #[test]
    fn table_entry_round_trips_frame() {
        let e = DirectoryEntry::table(Frame::new(77));
        assert!(e.is_present());
        assert_eq!(e.table_frame(), Some(Frame::new(77)));
        assert_eq!(DirectoryEntry::absent().table_frame(), None);
    }
}
