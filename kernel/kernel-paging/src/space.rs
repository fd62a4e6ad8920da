use crate::{
    DirectoryEntry, DirectoryIndex, ENTRY_COUNT, PageDirectory, PageTable, PagingError,
    TABLE_SPAN, TableEntry, TableIndex,
};
use kernel_addresses::{Frame, PhysAddr, PhysMapper, VirtAddr};
use kernel_frames::{FramePoolManager, PoolId};
use log::info;

/// Handle to one address space: a page directory frame and the tables hanging
/// off it.
///
/// The handle itself is a bare frame number; all translation state lives in
/// physical frames. Loading the space and switching translation on are
/// operations of [`Paging`](crate::Paging), which tracks the process-wide
/// active space.
pub struct AddressSpace {
    /// Frame holding the page directory.
    root: Frame,
}

impl AddressSpace {
    /// Build a fresh address space.
    ///
    /// Allocates the directory frame and one table frame per 4 MiB of
    /// `shared_size` from `table_pool`, identity-maps the shared region
    /// present+writable, and fills every other directory slot with the
    /// not-present default so it faults on first touch.
    ///
    /// # Errors
    /// Propagates frame-pool exhaustion.
    ///
    /// # Panics
    /// If `shared_size` is not a positive multiple of the 4 MiB table span.
    pub fn new<M: PhysMapper>(
        mapper: &M,
        frames: &mut FramePoolManager,
        table_pool: PoolId,
        shared_size: u32,
    ) -> Result<Self, PagingError> {
        assert!(
            shared_size > 0 && shared_size % TABLE_SPAN == 0,
            "shared region must be a positive multiple of the table span"
        );

        let root = frames.allocate(mapper, table_pool, 1)?;
        let directory = unsafe { directory_at(mapper, root) };
        directory.fill_absent();

        for span in 0..shared_size / TABLE_SPAN {
            let table_frame = frames.allocate(mapper, table_pool, 1)?;
            let table = unsafe { table_at(mapper, table_frame) };
            let first_frame = span * ENTRY_COUNT as u32;
            for i in 0..ENTRY_COUNT {
                table.set(
                    TableIndex::new(i as u16),
                    TableEntry::page(Frame::new(first_frame + i as u32)),
                );
            }
            directory.set(
                DirectoryIndex::new(span as u16),
                DirectoryEntry::table(table_frame),
            );
        }

        info!(
            "address space built: directory in {root}, {} MiB identity-mapped",
            shared_size >> 20
        );
        Ok(Self { root })
    }

    /// Adopt an existing directory frame, e.g. after reading the hardware
    /// page-table base register.
    #[inline]
    #[must_use]
    pub const fn from_root(root: Frame) -> Self {
        Self { root }
    }

    /// Frame holding this space's page directory.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> Frame {
        self.root
    }

    /// Translate `va` through this space's tables, `None` if unmapped.
    #[must_use]
    pub fn translate<M: PhysMapper>(&self, mapper: &M, va: VirtAddr) -> Option<PhysAddr> {
        let directory = unsafe { directory_at(mapper, self.root) };
        let table_frame = directory.get(DirectoryIndex::of(va)).table_frame()?;
        let table = unsafe { table_at(mapper, table_frame) };
        let frame = table.get(TableIndex::of(va)).page_frame()?;
        Some(PhysAddr::new(frame.base().as_u32() + va.page_offset()))
    }
}

/// View `frame` as the page directory stored in it.
///
/// # Safety
/// `frame` must hold a page directory reachable through `mapper`, and the
/// caller must not hold another reference into the same frame.
pub(crate) unsafe fn directory_at<'a, M: PhysMapper>(mapper: &M, frame: Frame) -> &'a mut PageDirectory {
    unsafe { &mut *mapper.frame_ptr(frame).cast::<PageDirectory>() }
}

/// View `frame` as the page table stored in it.
///
/// # Safety
/// `frame` must hold a page table reachable through `mapper`, and the caller
/// must not hold another reference into the same frame.
pub(crate) unsafe fn table_at<'a, M: PhysMapper>(mapper: &M, frame: Frame) -> &'a mut PageTable {
    unsafe { &mut *mapper.frame_ptr(frame).cast::<PageTable>() }
}
