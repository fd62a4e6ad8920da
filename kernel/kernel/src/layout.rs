//! Physical and virtual memory layout.
//!
//! The machine model: 32 MiB of physical memory with a 1 MiB hole at 15 MiB.
//! The first 4 MiB hold boot structures and kernel code and are identity-
//! mapped in every address space; the kernel frame pool sits in the second
//! 2 MiB of that region, the process frame pool covers everything above it.

use kernel_addresses::{FRAME_SIZE, Frame, VirtAddr};

const MIB: u32 = 1 << 20;

/// Kernel frame pool: physical 2 MiB..4 MiB. Sources page directories and
/// page tables; lies inside the identity-mapped region so they stay
/// reachable with translation on.
pub const KERNEL_POOL_BASE: Frame = Frame::new(2 * MIB / FRAME_SIZE);
pub const KERNEL_POOL_FRAMES: u32 = 2 * MIB / FRAME_SIZE;

/// Process frame pool: physical 4 MiB..32 MiB. Backs faulted-in pages.
pub const PROCESS_POOL_BASE: Frame = Frame::new(4 * MIB / FRAME_SIZE);
pub const PROCESS_POOL_FRAMES: u32 = 28 * MIB / FRAME_SIZE;

/// A 1 MiB hole in physical memory at 15 MiB; closed at bootstrap so it is
/// never handed out.
pub const MEM_HOLE_BASE: Frame = Frame::new(15 * MIB / FRAME_SIZE);
pub const MEM_HOLE_FRAMES: u32 = MIB / FRAME_SIZE;

/// Bytes identity-mapped at the bottom of every address space.
pub const SHARED_SIZE: u32 = 4 * MIB;

/// The kernel's own virtual memory pool, well above physical memory.
pub const KERNEL_VM_POOL_BASE: VirtAddr = VirtAddr::new(256 * MIB);
pub const KERNEL_VM_POOL_CAPACITY: u32 = 4 * MIB;

#[cfg(test)]
mod test {
    use super::*;
    use kernel_frames::FramePool;

    #[test]
    fn pools_are_disjoint_and_hole_is_inside_process_pool() {
        assert_eq!(
            KERNEL_POOL_BASE.number() + KERNEL_POOL_FRAMES,
            PROCESS_POOL_BASE.number(),
            "pools tile physical memory without overlap"
        );
        assert!(MEM_HOLE_BASE.number() >= PROCESS_POOL_BASE.number());
        assert!(
            MEM_HOLE_BASE.number() + MEM_HOLE_FRAMES
                <= PROCESS_POOL_BASE.number() + PROCESS_POOL_FRAMES
        );
    }

    #[test]
    fn kernel_pool_lies_inside_the_shared_region() {
        let pool_end = (KERNEL_POOL_BASE.number() + KERNEL_POOL_FRAMES) * FRAME_SIZE;
        assert!(pool_end <= SHARED_SIZE);
    }

    #[test]
    fn process_pool_bitmap_fits_one_frame() {
        assert_eq!(FramePool::needed_info_frames(PROCESS_POOL_FRAMES), 1);
    }

    #[test]
    fn vm_pool_lies_outside_physical_memory() {
        assert!(KERNEL_VM_POOL_BASE.as_u32() >= 32 * MIB);
        assert!(KERNEL_VM_POOL_BASE.is_page_aligned());
    }
}
