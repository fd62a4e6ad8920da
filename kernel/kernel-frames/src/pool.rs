use crate::{FramePoolError, FrameStatus};
use kernel_addresses::{FRAME_SIZE, Frame, PhysMapper};
use log::{debug, info};

/// Frames of status bitmap described per bitmap frame: two bits per frame,
/// four frames per byte.
const FRAMES_PER_INFO_FRAME: u32 = FRAME_SIZE * 4;

/// A pool of physical frames supporting contiguous-sequence allocation.
///
/// The pool's status bitmap lives in physical frames reached through a
/// [`PhysMapper`]; the pool record itself carries only geometry and counters.
/// Pools are constructed through
/// [`FramePoolManager::create_pool`](crate::FramePoolManager::create_pool),
/// which also registers them for release-time ownership lookup.
pub struct FramePool {
    /// First frame managed by this pool.
    base: Frame,
    /// Number of frames managed. A multiple of 4, and small enough for the
    /// bitmap to fit in a single frame.
    frame_count: u32,
    /// Running count of free frames. Bookkeeping only; allocation fails by
    /// scan, not by this counter.
    free_frames: u32,
    /// Frame holding the status bitmap.
    info_frame: Frame,
    /// Number of bitmap frames accounted to this pool.
    info_frame_count: u32,
}

impl FramePool {
    /// Build a pool over `[base, base + frame_count)`.
    ///
    /// With `info_frame == None` the bitmap is stored in the pool's own first
    /// frame(s), which are marked as an allocated sequence. An `info_frame`
    /// inside the pool's range is marked likewise. An `info_frame` outside
    /// the range was allocated from some other pool and needs no marking
    /// here.
    ///
    /// `info_frame_count == 0` means "exactly as many frames as the bitmap
    /// needs".
    ///
    /// # Panics
    /// If `frame_count` is not a positive multiple of 4, or the bitmap would
    /// not fit in a single frame.
    pub(crate) fn new<M: PhysMapper>(
        mapper: &M,
        base: Frame,
        frame_count: u32,
        info_frame: Option<Frame>,
        info_frame_count: u32,
    ) -> Self {
        assert!(
            frame_count > 0 && frame_count % 4 == 0,
            "frame count must be a positive multiple of 4"
        );
        assert!(
            frame_count <= FRAMES_PER_INFO_FRAME,
            "status bitmap must fit in a single frame"
        );

        let bitmap_frames = if info_frame_count == 0 {
            Self::needed_info_frames(frame_count)
        } else {
            info_frame_count
        };

        let mut pool = Self {
            base,
            frame_count,
            free_frames: frame_count,
            info_frame: info_frame.unwrap_or(base),
            info_frame_count: bitmap_frames,
        };

        // All frames start out free.
        let bitmap = mapper.frame_ptr(pool.info_frame);
        for i in 0..frame_count / 4 {
            unsafe { bitmap.add(i as usize).write(0) };
        }

        // Frames hosting the bitmap inside this pool form one allocated
        // sequence so they are never handed out.
        if let Some(first) = pool.bitmap_home() {
            let rel = first.number() - base.number();
            let end = (rel + bitmap_frames).min(frame_count);
            pool.set_status(mapper, rel, FrameStatus::Head);
            for i in rel + 1..end {
                pool.set_status(mapper, i, FrameStatus::Allocated);
            }
            pool.free_frames -= end - rel;
        }

        info!(
            "frame pool initialized: frames {}..{}, {} free",
            base,
            base.offset(frame_count),
            pool.free_frames
        );
        pool
    }

    /// Where the bitmap occupies this pool's own frames, the first such
    /// frame; `None` when the bitmap is hosted elsewhere.
    fn bitmap_home(&self) -> Option<Frame> {
        self.contains(self.info_frame).then_some(self.info_frame)
    }

    /// Allocate `n_frames` contiguous frames.
    ///
    /// First fit: a single left-to-right scan for the first run of free
    /// frames long enough. The run's first frame is marked head-of-sequence,
    /// the rest continuation.
    ///
    /// # Errors
    /// [`FramePoolError::Exhausted`] if no such run exists.
    ///
    /// # Panics
    /// If `n_frames` is zero or not smaller than the pool size.
    pub fn get_frames<M: PhysMapper>(
        &mut self,
        mapper: &M,
        n_frames: u32,
    ) -> Result<Frame, FramePoolError> {
        assert!(
            n_frames > 0 && n_frames < self.frame_count,
            "request must be smaller than the pool"
        );

        let mut streak = 0;
        let mut start = 0;
        for i in 0..self.frame_count {
            if self.status(mapper, i) == FrameStatus::Free {
                streak += 1;
                if streak == n_frames {
                    break;
                }
            } else {
                streak = 0;
                start = i + 1;
            }
        }
        if streak != n_frames {
            return Err(FramePoolError::Exhausted {
                requested: n_frames,
            });
        }

        self.set_status(mapper, start, FrameStatus::Head);
        for i in start + 1..start + n_frames {
            self.set_status(mapper, i, FrameStatus::Allocated);
        }
        self.free_frames -= n_frames;
        Ok(self.base.offset(start))
    }

    /// Permanently close the exact range `[first, first + n_frames)`,
    /// e.g. a hole in physical memory. Closed frames are never allocated
    /// and cannot be released.
    ///
    /// # Panics
    /// If the range leaves the pool or any frame in it is not free.
    pub fn mark_inaccessible<M: PhysMapper>(&mut self, mapper: &M, first: Frame, n_frames: u32) {
        assert!(self.contains(first), "inaccessible range must lie inside the pool");
        let rel = first.number() - self.base.number();
        assert!(
            rel + n_frames <= self.frame_count,
            "inaccessible range must lie inside the pool"
        );
        for i in rel..rel + n_frames {
            assert!(
                self.status(mapper, i) == FrameStatus::Free,
                "cannot close frame {}: not free",
                self.base.offset(i)
            );
            self.set_status(mapper, i, FrameStatus::Closed);
        }
        self.free_frames -= n_frames;
        debug!(
            "closed frames {}..{}",
            first,
            first.offset(n_frames)
        );
    }

    /// Release the allocated sequence starting at `first`.
    ///
    /// Marks the head free, then walks forward freeing continuation frames
    /// until the next free, head, or closed frame — the natural end of the
    /// sequence.
    ///
    /// # Panics
    /// If `first` is not a head-of-sequence frame. Releasing a non-head
    /// frame means a double free or a corrupted frame number, which is not
    /// recoverable.
    pub(crate) fn release<M: PhysMapper>(&mut self, mapper: &M, first: Frame) {
        let rel = first.number() - self.base.number();
        assert!(
            self.status(mapper, rel) == FrameStatus::Head,
            "release of frame {first} which is not a sequence head"
        );

        self.set_status(mapper, rel, FrameStatus::Free);
        let mut freed = 1;
        let mut i = rel + 1;
        while i < self.frame_count && self.status(mapper, i) == FrameStatus::Allocated {
            self.set_status(mapper, i, FrameStatus::Free);
            freed += 1;
            i += 1;
        }
        self.free_frames += freed;
        debug!("released {freed} frames starting at {first}");
    }

    /// `true` if `frame` lies within this pool's range.
    #[inline]
    #[must_use]
    pub fn contains(&self, frame: Frame) -> bool {
        frame.number() >= self.base.number()
            && frame.number() < self.base.number() + self.frame_count
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> Frame {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Current free-frame count (bookkeeping; see [`get_frames`](Self::get_frames)).
    #[inline]
    #[must_use]
    pub const fn free_frames(&self) -> u32 {
        self.free_frames
    }

    /// Frame holding this pool's status bitmap.
    #[inline]
    #[must_use]
    pub const fn info_frame(&self) -> Frame {
        self.info_frame
    }

    /// Number of bitmap frames accounted to this pool.
    #[inline]
    #[must_use]
    pub const fn info_frame_count(&self) -> u32 {
        self.info_frame_count
    }

    /// Status of the frame at `frame` (absolute number).
    #[must_use]
    pub fn frame_status<M: PhysMapper>(&self, mapper: &M, frame: Frame) -> FrameStatus {
        assert!(self.contains(frame));
        self.status(mapper, frame.number() - self.base.number())
    }

    /// Bitmap frames needed to describe `n_frames` frames at two bits each.
    #[inline]
    #[must_use]
    pub const fn needed_info_frames(n_frames: u32) -> u32 {
        n_frames.div_ceil(FRAMES_PER_INFO_FRAME)
    }

    fn status<M: PhysMapper>(&self, mapper: &M, index: u32) -> FrameStatus {
        debug_assert!(index < self.frame_count);
        let byte = unsafe {
            mapper
                .frame_ptr(self.info_frame)
                .add((index / 4) as usize)
                .read()
        };
        FrameStatus::unpack(byte, index % 4)
    }

    fn set_status<M: PhysMapper>(&mut self, mapper: &M, index: u32, status: FrameStatus) {
        debug_assert!(index < self.frame_count);
        let ptr = unsafe { mapper.frame_ptr(self.info_frame).add((index / 4) as usize) };
        let byte = unsafe { ptr.read() };
        unsafe { ptr.write(status.pack(byte, index % 4)) };
    }
}
