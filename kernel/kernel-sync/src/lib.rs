//! # Kernel synchronization primitives
//!
//! A spin lock for the kernel's process-wide singletons and an RAII interrupt
//! guard for sections that must not be preempted by a handler. The machine has
//! a single core; the lock exists to make mutation points explicit and to keep
//! host-side tests honest.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;

pub use irq::IrqGuard;
pub use spin_lock::{SpinLock, SpinLockGuard};
