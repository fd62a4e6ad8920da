use crate::{VmPool, VmPoolError};
use kernel_addresses::VirtAddr;
use kernel_frames::PoolId;
use kernel_paging::AddressValidator;
use log::info;

/// Capacity of the pool registry; a design limit matching the frame-pool
/// registry.
pub const MAX_VM_POOLS: usize = 10;

/// Handle to a pool registered with a [`VmPoolRegistry`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct VmPoolId(usize);

/// Owner and registry of every live [`VmPool`].
///
/// Creating a pool registers it; the registry as a whole answers the fault
/// handler's "is this address allocated anywhere?" question through
/// [`AddressValidator`]. An explicitly owned object held by the kernel's
/// top-level context.
pub struct VmPoolRegistry {
    pools: [Option<VmPool>; MAX_VM_POOLS],
}

impl Default for VmPoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VmPoolRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pools: [const { None }; MAX_VM_POOLS],
        }
    }

    /// Construct a pool over `[base, base + capacity)` and register it.
    ///
    /// # Errors
    /// [`VmPoolError::RegistryFull`] when [`MAX_VM_POOLS`] pools exist.
    pub fn create(
        &mut self,
        base: VirtAddr,
        capacity: u32,
        frame_pool: PoolId,
    ) -> Result<VmPoolId, VmPoolError> {
        let slot = self
            .pools
            .iter()
            .position(Option::is_none)
            .ok_or(VmPoolError::RegistryFull)?;
        self.pools[slot] = Some(VmPool::new(base, capacity, frame_pool));
        info!("registered virtual memory pool at {base}");
        Ok(VmPoolId(slot))
    }

    /// The pool behind `id`.
    #[must_use]
    pub fn pool(&self, id: VmPoolId) -> &VmPool {
        self.pools[id.0].as_ref().expect("pool ids are never retired")
    }

    /// The pool behind `id`, mutably.
    #[must_use]
    pub fn pool_mut(&mut self, id: VmPoolId) -> &mut VmPool {
        self.pools[id.0].as_mut().expect("pool ids are never retired")
    }
}

impl AddressValidator for VmPoolRegistry {
    /// `true` if any registered pool has an allocated region covering
    /// `address`. False while no pool exists: with nothing registered there
    /// is nothing legitimate to fault in.
    fn covers(&self, address: VirtAddr) -> bool {
        self.pools
            .iter()
            .flatten()
            .any(|pool| pool.is_legitimate(address))
    }
}
