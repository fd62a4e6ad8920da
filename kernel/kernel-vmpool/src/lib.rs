//! # Virtual memory pools
//!
//! Per-process tracking of allocated virtual address regions. A [`VmPool`]
//! covers a span of one address space carved out at construction; callers
//! claim regions with [`VmPool::allocate`] and get nothing but address
//! space — physical backing arrives page by page through the fault handler,
//! which asks the pool registry whether a faulting address falls inside any
//! allocated region before committing a frame.
//!
//! Regions are a flat, order-preserving, capped list rather than a sorted
//! structure: pool sizes and region counts are small and bounded by
//! construction, and new regions are placed at the current tail's end, which
//! requires the tail to remain the rightmost region.
//!
//! [`VmPoolRegistry`] owns every pool and implements the paging layer's
//! [`AddressValidator`] seam.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod pool;
mod registry;

pub use pool::{MAX_REGIONS, Region, VmPool};
pub use registry::{MAX_VM_POOLS, VmPoolId, VmPoolRegistry};

use kernel_addresses::VirtAddr;
use kernel_paging::PagingError;

/// Errors reported by virtual-memory-pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmPoolError {
    /// Granting the request would push the committed total past the pool's
    /// capacity.
    #[error("allocation of {requested} bytes exceeds remaining capacity of {available} bytes")]
    CapacityExceeded { requested: u32, available: u32 },

    /// The pool already tracks [`MAX_REGIONS`] regions.
    #[error("region list is full")]
    TooManyRegions,

    /// No region starts at the given address.
    #[error("no region starts at {0}")]
    NoSuchRegion(VirtAddr),

    /// The registry already holds [`MAX_VM_POOLS`] pools.
    #[error("virtual memory pool registry is full")]
    RegistryFull,

    /// Unmapping a released region failed in the paging layer.
    #[error(transparent)]
    Paging(#[from] PagingError),
}
