//! # Two-level virtual memory translation
//!
//! A 32-bit, two-level paging structure: one page directory of 1024 entries,
//! each either absent or pointing to a page table of 1024 entries, each
//! mapping one 4 KiB page. Virtual address bits `[31:22]` select the
//! directory slot, bits `[21:12]` the table slot.
//!
//! ## Highlights
//!
//! - [`AddressSpace::new`] builds a directory whose first table(s) identity-map
//!   the shared region eagerly; every other directory slot starts absent.
//! - [`Paging`] is the subsystem context: which frame pools feed directory,
//!   table, and page frames, which space is active, and whether translation
//!   is switched on. It replaces the usual pile of module-level statics with
//!   one explicitly owned object.
//! - [`Paging::handle_fault`] resolves a page fault by building the missing
//!   page table on first touch and backing the page with a process-pool
//!   frame — after the address passed the [`AddressValidator`] seam. A fault
//!   outside every allocated region is rejected, not silently mapped.
//! - [`Paging::free_page`] is the teardown path used when a virtual region is
//!   released: return the backing frame, clear the mapping, flush the TLB.
//!
//! ## Safety
//!
//! Table storage lives in raw physical frames reached through
//! [`PhysMapper`](kernel_addresses::PhysMapper); the `unsafe` needed to view
//! a frame as a typed table is confined to this crate. Hardware register
//! access (CR0/CR2/CR3) sits in [`hw`] and is never touched by the pure
//! translation logic.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod directory;
mod entry_bits;
pub mod hw;
mod paging;
mod space;
mod table;

pub use directory::{DirectoryEntry, DirectoryIndex, PageDirectory};
pub use entry_bits::PageEntryBits;
pub use paging::{AddressValidator, FaultInfo, Paging};
pub use space::AddressSpace;
pub use table::{PageTable, TableEntry, TableIndex};

use kernel_addresses::VirtAddr;
use kernel_frames::FramePoolError;

/// Entries per page directory and per page table.
pub const ENTRY_COUNT: usize = 1024;

/// Bytes of virtual address space covered by one page table.
pub const TABLE_SPAN: u32 = kernel_addresses::PAGE_SIZE * ENTRY_COUNT as u32;

/// Errors reported by the paging layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PagingError {
    /// A page fault hit an address no registered virtual-memory region
    /// covers. The faulting context must not be resumed.
    #[error("page fault at {0} hit no allocated region")]
    AddressNotAllocated(VirtAddr),

    /// No address space has been loaded.
    #[error("no address space is loaded")]
    NoActiveSpace,

    /// The backing frame pools could not satisfy an allocation or release.
    #[error(transparent)]
    Frames(#[from] FramePoolError),
}
