//! Page-fault trap glue.
//!
//! The exception dispatcher (an external collaborator) routes trap 14 here
//! with the processor-pushed error code. The glue snapshots the fault,
//! masks interrupts for the handler's whole duration, and hands the fault to
//! the paging context. Allowing nested interrupts mid-handler would let a
//! second fault interleave with half-done bitmap and table updates; the
//! guard rules that out on this single core.

use crate::bootstrap::{FRAME_POOLS, PAGING, VM_POOLS};
use kernel_addresses::IdentityMapper;
use kernel_paging::{FaultInfo, hw};
use kernel_sync::IrqGuard;

/// Trap number the handler must be registered under.
pub const PAGE_FAULT_VECTOR: u8 = 14;

/// Handle a page-fault trap.
///
/// A fault the paging layer rejects — an address outside every allocated
/// region, or frame exhaustion — is unrecoverable for the faulting context;
/// this halts the kernel. Resolved faults return and the faulting
/// instruction is retried.
pub extern "C" fn page_fault_trap(error_code: u32) {
    let _masked = IrqGuard::new();

    let fault = FaultInfo {
        address: unsafe { hw::read_fault_address() },
        error_code,
    };

    let mapper = IdentityMapper::new();
    let mut frames = FRAME_POOLS.lock();
    let mut paging = PAGING.lock();
    let vm_pools = VM_POOLS.lock();

    let result = paging
        .as_mut()
        .expect("paging is initialized before faults can occur")
        .handle_fault(&mapper, &mut frames, &*vm_pools, &fault);

    if let Err(error) = result {
        panic!("unresolvable page fault: {error}");
    }
}
