use crate::queue::Fifo;
use core::fmt;
use log::debug;

/// Identity of an execution context, stable for the context's lifetime.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}", self.0)
    }
}

/// The scheduler's view of a runnable execution context.
///
/// `dispatch` transfers control to the context and, for a cooperative
/// implementation, returns only once control comes back to the caller's
/// context.
pub trait RunContext {
    fn id(&self) -> ContextId;

    /// Switch execution to this context.
    fn dispatch(&self);
}

/// Cooperative FIFO scheduler.
///
/// Handles enter at the tail via [`add`](Self::add) or
/// [`resume`](Self::resume) and leave at the head via
/// [`yield_next`](Self::yield_next), so dispatch order is exactly arrival
/// order.
pub struct Scheduler<T> {
    queue: Fifo<T>,
    size: usize,
}

impl<T: RunContext> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RunContext> Scheduler<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: Fifo::new(),
            size: 0,
        }
    }

    /// Hand a new context to the scheduler.
    ///
    /// Mechanically identical to [`resume`](Self::resume); the two entry
    /// points mark distinct call sites (fresh thread vs. one that gave up
    /// the processor earlier).
    pub fn add(&mut self, context: T) {
        debug!("adding {} to the ready queue", context.id());
        self.enqueue(context);
    }

    /// Put a previously suspended context back in line.
    pub fn resume(&mut self, context: T) {
        self.enqueue(context);
    }

    /// Dispatch the context that has waited longest.
    ///
    /// Pops the head of the ready queue and transfers execution to it,
    /// returning the handle once control is back. With an empty queue this
    /// is a no-op returning `None` — there is no idle thread to fall back
    /// on.
    pub fn yield_next(&mut self) -> Option<T> {
        let context = self.queue.pop()?;
        self.size -= 1;
        debug!("dispatching {}", context.id());
        context.dispatch();
        Some(context)
    }

    /// Remove the queued context with identity `id`, if present.
    ///
    /// Drains the queue once, re-enqueuing everything but the first match;
    /// order among the survivors is unchanged. Returns whether a context was
    /// removed. A context currently running is not in the queue and is
    /// unaffected — terminating it is its own job on the way out.
    pub fn terminate(&mut self, id: ContextId) -> bool {
        let mut removed = false;
        for _ in 0..self.size {
            let Some(context) = self.queue.pop() else {
                break;
            };
            if !removed && context.id() == id {
                removed = true;
            } else {
                self.queue.push(context);
            }
        }
        if removed {
            self.size -= 1;
            debug!("removed {id} from the ready queue");
        }
        removed
    }

    /// Number of queued contexts.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn enqueue(&mut self, context: T) {
        self.queue.push(context);
        self.size += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    /// Handle recording every dispatch into a shared trace.
    #[derive(Clone)]
    struct Probe {
        id: ContextId,
        trace: Rc<RefCell<Vec<u32>>>,
    }

    impl RunContext for Probe {
        fn id(&self) -> ContextId {
            self.id
        }

        fn dispatch(&self) {
            self.trace.borrow_mut().push(self.id.0);
        }
    }

    fn probes(n: u32) -> (Vec<Probe>, Rc<RefCell<Vec<u32>>>) {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let probes = (0..n)
            .map(|i| Probe {
                id: ContextId(i),
                trace: Rc::clone(&trace),
            })
            .collect();
        (probes, trace)
    }

    #[test]
    fn yields_in_fifo_order() {
        let (mut probes, trace) = probes(3);
        let mut sched = Scheduler::new();
        for probe in probes.drain(..) {
            sched.add(probe);
        }

        while sched.yield_next().is_some() {}
        assert_eq!(*trace.borrow(), [0, 1, 2]);
        assert!(sched.is_empty());
    }

    #[test]
    fn yield_on_empty_queue_is_a_no_op() {
        let mut sched = Scheduler::<Probe>::new();
        assert!(sched.yield_next().is_none());
        assert_eq!(sched.len(), 0);
    }

    #[test]
    fn resumed_context_goes_to_the_back() {
        let (probes, trace) = probes(3);
        let mut sched = Scheduler::new();
        sched.add(probes[0].clone());
        sched.add(probes[1].clone());

        let first = sched.yield_next().unwrap();
        sched.resume(first);
        sched.add(probes[2].clone());

        while sched.yield_next().is_some() {}
        assert_eq!(*trace.borrow(), [0, 1, 0, 2]);
    }

    #[test]
    fn terminate_removes_exactly_one_match() {
        let (mut probes, trace) = probes(4);
        let mut sched = Scheduler::new();
        for probe in probes.drain(..) {
            sched.add(probe);
        }

        assert!(sched.terminate(ContextId(1)));
        assert_eq!(sched.len(), 3);

        while sched.yield_next().is_some() {}
        assert_eq!(*trace.borrow(), [0, 2, 3]);
    }

    #[test]
    fn terminate_of_absent_context_changes_nothing() {
        let (mut probes, trace) = probes(3);
        let mut sched = Scheduler::new();
        for probe in probes.drain(..) {
            sched.add(probe);
        }

        assert!(!sched.terminate(ContextId(9)));
        assert_eq!(sched.len(), 3);

        while sched.yield_next().is_some() {}
        assert_eq!(*trace.borrow(), [0, 1, 2]);
    }
}
