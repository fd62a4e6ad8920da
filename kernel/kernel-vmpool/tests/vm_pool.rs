//! Virtual-memory-pool behavior over the full stack: frame pools, paging,
//! and the fault handler consulting the pool registry, all against an
//! in-process arena.

use core::cell::UnsafeCell;
use kernel_addresses::{FRAME_SIZE, Frame, PAGE_SIZE, PhysMapper, VirtAddr};
use kernel_frames::{FramePoolManager, PoolId};
use kernel_paging::{AddressValidator, FaultInfo, Paging, PagingError, TABLE_SPAN};
use kernel_vmpool::{MAX_REGIONS, MAX_VM_POOLS, VmPoolError, VmPoolRegistry};

#[repr(C, align(4096))]
struct RawFrame([u8; FRAME_SIZE as usize]);

struct Arena {
    base: Frame,
    frames: Vec<UnsafeCell<RawFrame>>,
}

impl Arena {
    fn new(base: Frame, count: u32) -> Self {
        let frames = (0..count)
            .map(|_| UnsafeCell::new(RawFrame([0; FRAME_SIZE as usize])))
            .collect();
        Self { base, frames }
    }
}

impl PhysMapper for Arena {
    fn frame_ptr(&self, frame: Frame) -> *mut u8 {
        let index = (frame.number() - self.base.number()) as usize;
        self.frames[index].get().cast::<u8>()
    }
}

const POOL_BASE: VirtAddr = VirtAddr::new(0x0800_0000);

struct Fixture {
    arena: Arena,
    frames: FramePoolManager,
    page_pool: PoolId,
    paging: Paging,
    vm_pools: VmPoolRegistry,
}

fn fixture() -> Fixture {
    let arena = Arena::new(Frame::new(0), 256);
    let mut frames = FramePoolManager::new();
    let table_pool = frames
        .create_pool(&arena, Frame::new(8), 64, None, 0)
        .unwrap();
    let page_pool = frames
        .create_pool(&arena, Frame::new(128), 64, None, 0)
        .unwrap();
    let mut paging = Paging::new(table_pool, page_pool, TABLE_SPAN);
    let space = paging.create_space(&arena, &mut frames).unwrap();
    paging.set_active(&space);
    Fixture {
        arena,
        frames,
        page_pool,
        paging,
        vm_pools: VmPoolRegistry::new(),
    }
}

fn fault_at(address: VirtAddr) -> FaultInfo {
    FaultInfo {
        address,
        error_code: 0b10,
    }
}

#[test]
fn construction_reserves_the_control_region() {
    let mut f = fixture();
    let id = f
        .vm_pools
        .create(POOL_BASE, 16 * PAGE_SIZE, f.page_pool)
        .unwrap();

    let pool = f.vm_pools.pool(id);
    assert_eq!(pool.regions_count(), 1);
    assert_eq!(pool.regions_size(), PAGE_SIZE);
    assert!(pool.is_legitimate(POOL_BASE));
    assert!(pool.is_legitimate(VirtAddr::new(POOL_BASE.as_u32() + PAGE_SIZE - 1)));
    assert!(!pool.is_legitimate(VirtAddr::new(POOL_BASE.as_u32() + PAGE_SIZE)));
}

#[test]
fn capacity_counts_the_control_region() {
    let mut f = fixture();
    let id = f
        .vm_pools
        .create(POOL_BASE, 2 * PAGE_SIZE, f.page_pool)
        .unwrap();

    // One page is claimable next to the control page...
    let region = f.vm_pools.pool_mut(id).allocate(PAGE_SIZE).unwrap();
    assert_eq!(region, VirtAddr::new(POOL_BASE.as_u32() + PAGE_SIZE));

    // ...and nothing more, even though the request alone would fit.
    assert_eq!(
        f.vm_pools.pool_mut(id).allocate(PAGE_SIZE),
        Err(VmPoolError::CapacityExceeded {
            requested: PAGE_SIZE,
            available: 0,
        })
    );
}

#[test]
fn faults_are_admitted_only_inside_regions() {
    let mut f = fixture();
    let id = f
        .vm_pools
        .create(POOL_BASE, 16 * PAGE_SIZE, f.page_pool)
        .unwrap();
    let region = f.vm_pools.pool_mut(id).allocate(2 * PAGE_SIZE).unwrap();

    // Inside the region: the fault handler commits a frame.
    f.paging
        .handle_fault(&f.arena, &mut f.frames, &f.vm_pools, &fault_at(region))
        .unwrap();

    // Past the pool's allocated regions: rejected.
    let outside = VirtAddr::new(POOL_BASE.as_u32() + 5 * PAGE_SIZE);
    assert_eq!(
        f.paging
            .handle_fault(&f.arena, &mut f.frames, &f.vm_pools, &fault_at(outside)),
        Err(PagingError::AddressNotAllocated(outside))
    );
}

#[test]
fn release_unmaps_and_returns_frames() {
    let mut f = fixture();
    let id = f
        .vm_pools
        .create(POOL_BASE, 16 * PAGE_SIZE, f.page_pool)
        .unwrap();
    let region = f.vm_pools.pool_mut(id).allocate(3 * PAGE_SIZE).unwrap();

    let free_before = f.frames.pool(f.page_pool).free_frames();

    // Touch two of the three pages; the third stays lazily unbacked.
    for page in [region, region + PAGE_SIZE] {
        f.paging
            .handle_fault(&f.arena, &mut f.frames, &f.vm_pools, &fault_at(page))
            .unwrap();
    }
    assert_eq!(f.frames.pool(f.page_pool).free_frames(), free_before - 2);

    f.vm_pools
        .pool_mut(id)
        .release(&mut f.paging, &f.arena, &mut f.frames, region)
        .unwrap();

    assert_eq!(
        f.frames.pool(f.page_pool).free_frames(),
        free_before,
        "both committed frames came back"
    );
    assert!(!f.vm_pools.pool(id).is_legitimate(region));
    assert_eq!(f.vm_pools.pool(id).regions_count(), 1);
    assert_eq!(f.vm_pools.pool(id).regions_size(), PAGE_SIZE);

    // A new fault on the released address is now rejected.
    assert_eq!(
        f.paging
            .handle_fault(&f.arena, &mut f.frames, &f.vm_pools, &fault_at(region)),
        Err(PagingError::AddressNotAllocated(region))
    );
}

#[test]
fn release_preserves_region_order() {
    let mut f = fixture();
    let id = f
        .vm_pools
        .create(POOL_BASE, 32 * PAGE_SIZE, f.page_pool)
        .unwrap();

    let a = f.vm_pools.pool_mut(id).allocate(PAGE_SIZE).unwrap();
    let b = f.vm_pools.pool_mut(id).allocate(PAGE_SIZE).unwrap();
    let c = f.vm_pools.pool_mut(id).allocate(PAGE_SIZE).unwrap();

    f.vm_pools
        .pool_mut(id)
        .release(&mut f.paging, &f.arena, &mut f.frames, a)
        .unwrap();

    // The tail is still the rightmost region, so the next allocation goes
    // after `c` instead of re-issuing a span that is still claimed.
    let d = f.vm_pools.pool_mut(id).allocate(PAGE_SIZE).unwrap();
    assert_eq!(d, VirtAddr::new(c.as_u32() + PAGE_SIZE));
    assert!(f.vm_pools.pool(id).is_legitimate(b));
    assert!(f.vm_pools.pool(id).is_legitimate(c));
    assert!(!f.vm_pools.pool(id).is_legitimate(a));
}

#[test]
fn release_of_unknown_region_is_reported() {
    let mut f = fixture();
    let id = f
        .vm_pools
        .create(POOL_BASE, 16 * PAGE_SIZE, f.page_pool)
        .unwrap();

    let stray = VirtAddr::new(POOL_BASE.as_u32() + 7 * PAGE_SIZE);
    assert_eq!(
        f.vm_pools
            .pool_mut(id)
            .release(&mut f.paging, &f.arena, &mut f.frames, stray),
        Err(VmPoolError::NoSuchRegion(stray))
    );
}

#[test]
fn region_list_is_capped() {
    let mut f = fixture();
    let id = f
        .vm_pools
        .create(POOL_BASE, 1024 * PAGE_SIZE, f.page_pool)
        .unwrap();

    for _ in 0..MAX_REGIONS - 1 {
        f.vm_pools.pool_mut(id).allocate(PAGE_SIZE).unwrap();
    }
    assert_eq!(
        f.vm_pools.pool_mut(id).allocate(PAGE_SIZE),
        Err(VmPoolError::TooManyRegions)
    );
}

#[test]
fn registry_is_capped_and_starts_empty() {
    let mut f = fixture();
    assert!(
        !f.vm_pools.covers(POOL_BASE),
        "an empty registry admits nothing"
    );

    for i in 0..MAX_VM_POOLS {
        let base = VirtAddr::new(POOL_BASE.as_u32() + (i as u32) * 0x10_0000);
        f.vm_pools.create(base, 4 * PAGE_SIZE, f.page_pool).unwrap();
    }
    assert_eq!(
        f.vm_pools
            .create(VirtAddr::new(0x2000_0000), 4 * PAGE_SIZE, f.page_pool)
            .unwrap_err(),
        VmPoolError::RegistryFull
    );
}
