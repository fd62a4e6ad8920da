use crate::space::{directory_at, table_at};
use crate::{
    AddressSpace, DirectoryEntry, DirectoryIndex, PagingError, TableEntry, TableIndex, hw,
};
use core::fmt;
use kernel_addresses::{Frame, PhysMapper, VirtAddr};
use kernel_frames::{FramePoolManager, PoolId};
use log::{debug, warn};

/// Snapshot of a page-fault trap, built by the exception-dispatch glue from
/// the pushed error code and the hardware fault-address register.
#[derive(Copy, Clone, Debug)]
pub struct FaultInfo {
    /// The faulting linear address (CR2).
    pub address: VirtAddr,
    /// The error code pushed by the processor.
    pub error_code: u32,
}

impl FaultInfo {
    /// `true` if the fault was caused by a write access.
    #[inline]
    #[must_use]
    pub const fn caused_by_write(&self) -> bool {
        self.error_code & 0b10 != 0
    }

    /// `true` if the fault hit a present page (protection violation rather
    /// than a missing mapping).
    #[inline]
    #[must_use]
    pub const fn page_was_present(&self) -> bool {
        self.error_code & 0b1 != 0
    }
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.address,
            if self.caused_by_write() { "write" } else { "read" },
            if self.page_was_present() {
                "protection"
            } else {
                "not present"
            }
        )
    }
}

/// The predicate the fault handler consults before committing a frame to an
/// address: does any allocated virtual-memory region cover it?
///
/// Implemented by the virtual-memory-pool registry. A trait seam keeps the
/// translation layer below the region tracker in the dependency order.
pub trait AddressValidator {
    fn covers(&self, address: VirtAddr) -> bool;
}

/// The paging subsystem context.
///
/// One per kernel: remembers which pool feeds directory/table frames and
/// which feeds mapped pages, the size of the identity-mapped shared region,
/// the active address space, and whether translation is enabled. Held by the
/// kernel's top-level context instead of living in module statics.
pub struct Paging {
    /// Pool for directory and table frames. Must lie in the shared region so
    /// tables stay reachable once translation is on.
    table_pool: PoolId,
    /// Pool for the frames backing faulted-in pages.
    page_pool: PoolId,
    /// Bytes identity-mapped at the bottom of every address space.
    shared_size: u32,
    /// Directory frame of the active space, once one was loaded.
    active: Option<Frame>,
    /// Whether the hardware paging bit has been switched on.
    enabled: bool,
}

impl Paging {
    /// One-time paging configuration; the counterpart of the bootstrap's
    /// "init paging" step.
    #[must_use]
    pub const fn new(table_pool: PoolId, page_pool: PoolId, shared_size: u32) -> Self {
        Self {
            table_pool,
            page_pool,
            shared_size,
            active: None,
            enabled: false,
        }
    }

    /// Build a fresh address space from this context's table pool.
    ///
    /// # Errors
    /// Propagates frame-pool exhaustion.
    pub fn create_space<M: PhysMapper>(
        &self,
        mapper: &M,
        frames: &mut FramePoolManager,
    ) -> Result<AddressSpace, PagingError> {
        AddressSpace::new(mapper, frames, self.table_pool, self.shared_size)
    }

    /// Record `space` as the process-wide active translation without touching
    /// hardware. [`load`](Self::load) is the full operation.
    pub fn set_active(&mut self, space: &AddressSpace) {
        self.active = Some(space.root());
    }

    /// Make `space` active and write its directory base to the hardware
    /// page-table base register.
    ///
    /// # Safety
    /// Must run at CPL0. The space's tables must stay reachable through the
    /// identity mapping once translation is enabled.
    pub unsafe fn load(&mut self, space: &AddressSpace) {
        self.set_active(space);
        unsafe { hw::write_page_table_base(space.root().base()) };
        debug!("loaded address space rooted at {}", space.root());
    }

    /// Switch translation on. From here every access goes through the active
    /// space.
    ///
    /// # Safety
    /// Must run at CPL0 with a loaded space whose shared region identity-maps
    /// the currently executing code and data.
    pub unsafe fn enable(&mut self) {
        unsafe { hw::enable_paging_bit() };
        self.enabled = true;
        debug!("paging enabled");
    }

    /// Directory frame of the active space, if any.
    #[inline]
    #[must_use]
    pub const fn active(&self) -> Option<Frame> {
        self.active
    }

    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    #[must_use]
    pub const fn shared_size(&self) -> u32 {
        self.shared_size
    }

    /// Resolve a page fault against the active space.
    ///
    /// The address must be covered by a registered virtual-memory region;
    /// a fault anywhere else is rejected before any structure is touched,
    /// and the faulting context must be terminated by the caller. For a
    /// legitimate address, the covering page table is built on first touch
    /// (table pool) and the page is backed with a fresh frame (page pool),
    /// both present+writable.
    ///
    /// Interrupts stay masked for the handler's whole duration; the trap glue
    /// holds the interrupt guard.
    ///
    /// # Errors
    /// [`PagingError::AddressNotAllocated`] for an out-of-region address,
    /// [`PagingError::NoActiveSpace`] before a space was loaded, and frame
    /// exhaustion from either pool.
    pub fn handle_fault<M: PhysMapper, V: AddressValidator>(
        &mut self,
        mapper: &M,
        frames: &mut FramePoolManager,
        regions: &V,
        fault: &FaultInfo,
    ) -> Result<Frame, PagingError> {
        let root = self.active.ok_or(PagingError::NoActiveSpace)?;
        let va = fault.address;

        if !regions.covers(va) {
            warn!("rejecting page fault at {fault}");
            return Err(PagingError::AddressNotAllocated(va));
        }

        let directory = unsafe { directory_at(mapper, root) };
        let slot = DirectoryIndex::of(va);
        let table_frame = match directory.get(slot).table_frame() {
            Some(frame) => frame,
            None => {
                let frame = frames.allocate(mapper, self.table_pool, 1)?;
                unsafe { table_at(mapper, frame) }.fill_absent();
                directory.set(slot, DirectoryEntry::table(frame));
                debug!("built page table {frame} for directory slot {}", slot.as_usize());
                frame
            }
        };

        let table = unsafe { table_at(mapper, table_frame) };
        let page_frame = frames.allocate(mapper, self.page_pool, 1)?;
        table.set(TableIndex::of(va), TableEntry::page(page_frame));
        debug!("handled page fault at {va}: backed with {page_frame}");
        Ok(page_frame)
    }

    /// Unmap the page containing `va` from the active space and release its
    /// backing frame.
    ///
    /// Clears the table entry (the directory entry and its table stay; other
    /// pages under the same table remain mapped) and, when translation is on,
    /// forces a translation-cache reload by rewriting the page-table base
    /// register with its current value.
    ///
    /// Returns the released frame, or `None` if the page was never backed —
    /// lazily allocated regions may be released before every page faulted in.
    ///
    /// # Errors
    /// [`PagingError::NoActiveSpace`] before a space was loaded; frame-pool
    /// errors if the mapped frame is not releasable.
    pub fn free_page<M: PhysMapper>(
        &mut self,
        mapper: &M,
        frames: &mut FramePoolManager,
        va: VirtAddr,
    ) -> Result<Option<Frame>, PagingError> {
        let root = self.active.ok_or(PagingError::NoActiveSpace)?;

        let directory = unsafe { directory_at(mapper, root) };
        let Some(table_frame) = directory.get(DirectoryIndex::of(va)).table_frame() else {
            return Ok(None);
        };
        let table = unsafe { table_at(mapper, table_frame) };
        let slot = TableIndex::of(va);
        let Some(frame) = table.get(slot).page_frame() else {
            return Ok(None);
        };

        frames.release(mapper, frame)?;
        table.set(slot, TableEntry::absent());
        if self.enabled {
            unsafe { hw::flush_tlb() };
        }
        debug!("freed page at {}: released {frame}", va.page_base());
        Ok(Some(frame))
    }
}
