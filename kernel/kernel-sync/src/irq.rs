//! Interrupt masking helpers (`cli`/`sti`) and an RAII guard around them.
//!
//! The page-fault path runs with interrupts masked for the handler's whole
//! duration; the guard restores the previous state on drop, so nested guards
//! compose.

/// Disable hardware interrupts (`cli`).
///
/// Must only be called in a privileged context where `cli` is permitted.
#[inline]
pub fn disable_interrupts() {
    unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// Enable hardware interrupts (`sti`).
///
/// Must only be called in a privileged context where `sti` is permitted.
#[inline]
pub fn enable_interrupts() {
    unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Current `RFLAGS` value; bit 9 (`IF`) is the interrupt-enable flag.
#[inline]
#[must_use]
pub fn rflags() -> u64 {
    let r: u64;
    unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nostack, preserves_flags)) }
    r
}

/// RAII guard that masks interrupts on creation and restores them on drop.
///
/// `sti` is executed on drop only if interrupts were enabled when the guard
/// was created, preserving the original state across nesting.
pub struct IrqGuard {
    /// Whether IF was set when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = (rflags() & (1 << 9)) != 0;
        if enabled {
            disable_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            enable_interrupts();
        }
    }
}
