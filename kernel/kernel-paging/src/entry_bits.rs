use bitfield_struct::bitfield;
use kernel_addresses::Frame;

/// A single 32-bit paging entry in its raw bitfield form.
///
/// Directory entries and table entries share this layout; only the
/// interpretation of the frame number differs (next-level table vs. mapped
/// page). Wrappers [`DirectoryEntry`](crate::DirectoryEntry) and
/// [`TableEntry`](crate::TableEntry) keep the two apart.
///
/// | Bits  | Name | Meaning |
/// |-------|------|---------|
/// | 0     | `P`  | entry is valid |
/// | 1     | `RW` | writable if set |
/// | 2     | `US` | user-mode accessible if set |
/// | 3     | `PWT`| write-through caching |
/// | 4     | `PCD`| disable caching |
/// | 5     | `A`  | accessed, set by hardware |
/// | 6     | `D`  | dirty (leaf only) |
/// | 7     | `PS` | large page (directory only; unused here) |
/// | 8     | `G`  | global translation |
/// | 9–11  | —    | available to the OS |
/// | 12–31 | addr | physical frame number |
#[bitfield(u32)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2). Clear restricts to supervisor.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU on first access.
    pub accessed: bool,

    /// Dirty (D, bit 6). Leaf entries only.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Always zero here; 4 MiB pages are out of scope.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global: bool,

    /// Bits 9–11, free for OS use.
    #[bits(3)]
    pub avail: u8,

    /// Physical frame number, bits 12–31 of the mapped address.
    #[bits(20)]
    pub frame_number: u32,
}

impl PageEntryBits {
    /// The not-present default: supervisor, read/write once made present.
    /// Raw value `0x2`, the pattern absent slots are filled with.
    #[inline]
    #[must_use]
    pub const fn absent() -> Self {
        Self::new().with_writable(true)
    }

    /// The frame this entry refers to.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Frame {
        Frame::new(self.frame_number())
    }

    /// Replace the frame this entry refers to.
    #[inline]
    #[must_use]
    pub const fn with_frame(self, frame: Frame) -> Self {
        self.with_frame_number(frame.number())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn absent_entry_is_raw_0x2() {
        assert_eq!(u32::from(PageEntryBits::absent()), 0x2);
        assert!(!PageEntryBits::absent().present());
    }

    #[test]
    fn frame_number_occupies_high_bits() {
        let e = PageEntryBits::new()
            .with_present(true)
            .with_writable(true)
            .with_frame(Frame::new(0x12345));
        assert_eq!(u32::from(e), 0x1234_5003);
        assert_eq!(e.frame(), Frame::new(0x12345));
    }
}
