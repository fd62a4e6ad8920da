//! Bootstrap sequence and the kernel's process-wide singletons.
//!
//! The registries and contexts the substrate needs — frame pools, the paging
//! context, virtual memory pools, the scheduler — are owned here, each behind
//! its own spin lock. Call paths never take more than one lock except the
//! fault path, which orders them frame pools → paging → VM pools.

use crate::layout;
use crate::thread::Thread;
use kernel_addresses::IdentityMapper;
use kernel_frames::{FramePool, FramePoolManager, PoolId};
use kernel_paging::{AddressSpace, Paging};
use kernel_sched::Scheduler;
use kernel_sync::SpinLock;
use kernel_vmpool::{VmPoolId, VmPoolRegistry};
use log::{LevelFilter, info};

/// Every live frame pool.
pub static FRAME_POOLS: SpinLock<FramePoolManager> = SpinLock::new(FramePoolManager::new());

/// The paging context, populated by [`bootstrap`].
pub static PAGING: SpinLock<Option<Paging>> = SpinLock::new(None);

/// Every live virtual memory pool; the fault handler's validator.
pub static VM_POOLS: SpinLock<VmPoolRegistry> = SpinLock::new(VmPoolRegistry::new());

/// The ready queue.
pub static SCHEDULER: SpinLock<Scheduler<&'static Thread>> = SpinLock::new(Scheduler::new());

/// Handles produced by [`bootstrap`].
pub struct Bootstrap {
    pub kernel_pool: PoolId,
    pub process_pool: PoolId,
    pub kernel_space: AddressSpace,
    pub kernel_vm_pool: VmPoolId,
}

/// Bring the memory substrate up, in dependency order: logger, frame pools,
/// the physical-memory hole, paging (loaded and enabled), and the kernel's
/// virtual memory pool.
///
/// Any failure here is a configuration error; continuing would corrupt
/// memory accounting, so this halts instead.
///
/// # Safety
/// Must run once, at CPL0, before translation is enabled, with physical
/// memory laid out as [`layout`] describes. The exception dispatcher must
/// route page faults to [`trap::page_fault_trap`](crate::trap::page_fault_trap)
/// before the first access outside the shared region.
#[must_use]
pub unsafe fn bootstrap() -> Bootstrap {
    // Logging first; everything after this reports through it.
    let _ = kernel_debugcon::DebugconLogger::init(LevelFilter::Debug);

    let mapper = IdentityMapper::new();
    let mut frames = FRAME_POOLS.lock();

    let kernel_pool = frames
        .create_pool(
            &mapper,
            layout::KERNEL_POOL_BASE,
            layout::KERNEL_POOL_FRAMES,
            None,
            0,
        )
        .expect("kernel pool geometry is static");

    // The process pool's bitmap is carved out of the kernel pool: the pool
    // itself lies outside the identity-mapped region.
    let info_frames = FramePool::needed_info_frames(layout::PROCESS_POOL_FRAMES);
    let info_frame = frames
        .allocate(&mapper, kernel_pool, info_frames)
        .expect("kernel pool is empty at bootstrap");
    let process_pool = frames
        .create_pool(
            &mapper,
            layout::PROCESS_POOL_BASE,
            layout::PROCESS_POOL_FRAMES,
            Some(info_frame),
            info_frames,
        )
        .expect("process pool geometry is static");

    // Take care of the hole in physical memory.
    frames.mark_inaccessible(
        &mapper,
        process_pool,
        layout::MEM_HOLE_BASE,
        layout::MEM_HOLE_FRAMES,
    );

    let mut paging = Paging::new(kernel_pool, process_pool, layout::SHARED_SIZE);
    let kernel_space = paging
        .create_space(&mapper, &mut frames)
        .expect("kernel pool can back the kernel address space");
    unsafe {
        paging.load(&kernel_space);
        paging.enable();
    }
    *PAGING.lock() = Some(paging);
    drop(frames);

    let kernel_vm_pool = VM_POOLS
        .lock()
        .create(
            layout::KERNEL_VM_POOL_BASE,
            layout::KERNEL_VM_POOL_CAPACITY,
            process_pool,
        )
        .expect("registry is empty at bootstrap");

    info!("bootstrap complete");
    Bootstrap {
        kernel_pool,
        process_pool,
        kernel_space,
        kernel_vm_pool,
    }
}
