use crate::{FramePool, FramePoolError};
use kernel_addresses::{Frame, PhysMapper};

/// Capacity of the pool registry. A design limit, not a tunable: the kernel
/// creates a handful of pools at bootstrap and never destroys them.
pub const MAX_POOLS: usize = 10;

/// Handle to a pool registered with a [`FramePoolManager`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PoolId(usize);

/// Owner and registry of every live [`FramePool`].
///
/// Releasing a sequence requires knowing which pool a bare frame number came
/// from; no per-frame back-pointer exists, so the manager resolves ownership
/// by range containment. The registry is an explicitly owned object handed to
/// whoever needs it rather than process-wide mutable state.
pub struct FramePoolManager {
    pools: [Option<FramePool>; MAX_POOLS],
}

impl Default for FramePoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePoolManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pools: [const { None }; MAX_POOLS],
        }
    }

    /// Construct a pool and register it.
    ///
    /// See [`FramePool`] for the construction semantics of `info_frame` and
    /// `info_frame_count`.
    ///
    /// # Errors
    /// [`FramePoolError::RegistryFull`] when [`MAX_POOLS`] pools exist;
    /// [`FramePoolError::RangeOverlap`] when the new range intersects a
    /// registered pool. Sequences never span two pools, so ranges must be
    /// disjoint.
    pub fn create_pool<M: PhysMapper>(
        &mut self,
        mapper: &M,
        base: Frame,
        frame_count: u32,
        info_frame: Option<Frame>,
        info_frame_count: u32,
    ) -> Result<PoolId, FramePoolError> {
        let disjoint = |pool: &FramePool| {
            base.number() + frame_count <= pool.base().number()
                || base.number() >= pool.base().number() + pool.frame_count()
        };
        if !self.pools.iter().flatten().all(disjoint) {
            return Err(FramePoolError::RangeOverlap);
        }

        let slot = self
            .pools
            .iter()
            .position(Option::is_none)
            .ok_or(FramePoolError::RegistryFull)?;
        self.pools[slot] = Some(FramePool::new(
            mapper,
            base,
            frame_count,
            info_frame,
            info_frame_count,
        ));
        Ok(PoolId(slot))
    }

    /// Allocate `n_frames` contiguous frames from the pool behind `id`.
    ///
    /// # Errors
    /// [`FramePoolError::Exhausted`] if the pool has no suitable run.
    pub fn allocate<M: PhysMapper>(
        &mut self,
        mapper: &M,
        id: PoolId,
        n_frames: u32,
    ) -> Result<Frame, FramePoolError> {
        self.pool_mut(id).get_frames(mapper, n_frames)
    }

    /// Release the allocated sequence starting at `first`, whichever pool
    /// owns it.
    ///
    /// # Errors
    /// [`FramePoolError::UnownedFrame`] if no registered pool's range
    /// contains `first`.
    ///
    /// # Panics
    /// If the owning pool finds `first` is not a sequence head (double free).
    pub fn release<M: PhysMapper>(
        &mut self,
        mapper: &M,
        first: Frame,
    ) -> Result<(), FramePoolError> {
        let pool = self
            .pools
            .iter_mut()
            .flatten()
            .find(|pool| pool.contains(first))
            .ok_or(FramePoolError::UnownedFrame(first))?;
        pool.release(mapper, first);
        Ok(())
    }

    /// Close the exact range `[first, first + n_frames)` of the pool behind
    /// `id`. See [`FramePool::mark_inaccessible`].
    pub fn mark_inaccessible<M: PhysMapper>(
        &mut self,
        mapper: &M,
        id: PoolId,
        first: Frame,
        n_frames: u32,
    ) {
        self.pool_mut(id).mark_inaccessible(mapper, first, n_frames);
    }

    /// The pool behind `id`.
    #[must_use]
    pub fn pool(&self, id: PoolId) -> &FramePool {
        self.pools[id.0].as_ref().expect("pool ids are never retired")
    }

    fn pool_mut(&mut self, id: PoolId) -> &mut FramePool {
        self.pools[id.0].as_mut().expect("pool ids are never retired")
    }
}
