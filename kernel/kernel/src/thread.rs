//! Minimal cooperative threads.
//!
//! A [`Thread`] is an execution context with its own stack; the only state
//! kept while it is suspended is the stack pointer, since the context switch
//! pushes every callee-saved register onto the outgoing stack. Dispatch is
//! what the scheduler's [`RunContext`] seam calls: it saves the running
//! context and switches to the target, returning only when something
//! switches back.

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use kernel_sched::{ContextId, RunContext};

/// Words in the initial frame: six callee-saved registers below the entry
/// address.
const INITIAL_FRAME_WORDS: usize = 7;

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// The running thread as a `*const Thread`, or 0 for the bootstrap context.
static CURRENT: AtomicUsize = AtomicUsize::new(0);

/// Where the bootstrap context's stack pointer is parked after it dispatches
/// its first thread.
static BOOTSTRAP_SP: AtomicUsize = AtomicUsize::new(0);

/// A cooperative execution context.
pub struct Thread {
    id: ContextId,
    /// Stack pointer while suspended; rewritten by every switch away.
    saved_sp: AtomicUsize,
}

impl Thread {
    /// Prepare a thread that will begin in `entry` on `stack`.
    ///
    /// The top of the stack is seeded with a frame the context switch can
    /// "return" through: zeroed callee-saved registers below the entry
    /// address. Threads never return from `entry`; they yield, and leave by
    /// terminating themselves through the scheduler.
    ///
    /// # Panics
    /// If the stack cannot hold the initial frame.
    pub fn new(stack: &'static mut [usize], entry: extern "C" fn() -> !) -> Self {
        let top = stack.len();
        assert!(top >= INITIAL_FRAME_WORDS, "stack too small");

        stack[top - 1] = entry as usize;
        for slot in &mut stack[top - INITIAL_FRAME_WORDS..top - 1] {
            *slot = 0;
        }
        let sp = core::ptr::from_ref(&stack[top - INITIAL_FRAME_WORDS]) as usize;

        Self {
            id: ContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            saved_sp: AtomicUsize::new(sp),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Stack pointer this thread will resume from.
    #[inline]
    #[must_use]
    pub fn saved_stack_pointer(&self) -> usize {
        self.saved_sp.load(Ordering::Relaxed)
    }
}

impl RunContext for &'static Thread {
    fn id(&self) -> ContextId {
        self.id
    }

    /// Switch execution to this thread.
    ///
    /// The outgoing context's stack pointer lands in its own save slot (the
    /// bootstrap context has a dedicated one), so it can be resumed later.
    /// Returns when something dispatches the outgoing context again.
    fn dispatch(&self) {
        let next_sp = self.saved_sp.load(Ordering::Relaxed);
        let previous = CURRENT.swap(core::ptr::from_ref::<Thread>(self) as usize, Ordering::Relaxed);
        let save_slot = if previous == 0 {
            BOOTSTRAP_SP.as_ptr()
        } else {
            // Safety: CURRENT only ever holds &'static Thread pointers.
            unsafe { (*(previous as *const Thread)).saved_sp.as_ptr() }
        };
        unsafe { switch_context(save_slot, next_sp) };
    }
}

/// Save the current callee-saved state on the outgoing stack, park the stack
/// pointer in `*save`, adopt `load` as the new stack pointer, and resume
/// whatever frame lives there.
///
/// # Safety
/// `save` must be a valid slot; `load` must be a stack pointer produced by
/// this function or by [`Thread::new`]'s initial frame.
#[unsafe(naked)]
unsafe extern "C" fn switch_context(save: *mut usize, load: usize) {
    core::arch::naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

#[cfg(test)]
mod test {
    use super::*;

    extern "C" fn spin_forever() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn leaked_stack(words: usize) -> &'static mut [usize] {
        Box::leak(vec![0_usize; words].into_boxed_slice())
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = Thread::new(leaked_stack(32), spin_forever);
        let b = Thread::new(leaked_stack(32), spin_forever);
        assert_ne!(a.id(), b.id());
        assert!(b.id().0 > a.id().0);
    }

    #[test]
    fn initial_frame_returns_into_entry() {
        let stack = leaked_stack(64);
        let bottom = stack.as_ptr() as usize;
        let thread = Thread::new(stack, spin_forever);

        let sp = thread.saved_stack_pointer();
        assert!(sp >= bottom && sp < bottom + 64 * size_of::<usize>());

        // Six zeroed callee-saved slots, then the entry address.
        let frame = unsafe { core::slice::from_raw_parts(sp as *const usize, INITIAL_FRAME_WORDS) };
        assert!(frame[..INITIAL_FRAME_WORDS - 1].iter().all(|&word| word == 0));
        assert_eq!(frame[INITIAL_FRAME_WORDS - 1], spin_forever as usize);
    }
}
