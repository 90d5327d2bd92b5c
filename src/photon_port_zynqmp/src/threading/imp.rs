use core::{
    arch::{asm, global_asm},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use photon_kernel::{console, Init, PortThreading, StackRegion, TaskEntry};
use tock_registers::interfaces::Readable;

use super::cfg::TaskContext;
use crate::{aarch64, SystemTraits, KERNEL};

/// The software half of CPU Lock. IRQs are masked whenever this is set.
static CPU_LOCK: AtomicBool = AtomicBool::new(false);

/// Set by `enable_interrupts`. Leaving CPU Lock doesn't unmask IRQs before
/// that.
static IRQ_ENABLED: AtomicBool = AtomicBool::new(false);

/// The IRQ nesting depth of the running task.
static IRQ_DEPTH: AtomicUsize = AtomicUsize::new(0);

// Single core, and every update happens with IRQs masked, so plain loads and
// stores are enough. Never use read-modify-write atomics here: with the MMU
// off, they would be exclusive accesses to Device memory.

extern "C" {
    /// Save the callee-saved registers to `*prev` and restore them from
    /// `*next`. Returns in `next`'s context.
    fn photon_switch_context(prev: *mut TaskContext, next: *const TaskContext);

    /// The first return address of a new task. Calls `task_start(x19)`.
    fn photon_task_trampoline() -> !;
}

global_asm!(
    r#"
    .section .text.photon_switch_context, "ax"
    .global photon_switch_context
    .type photon_switch_context, %function
    .balign 4
photon_switch_context:
    stp x19, x20, [x0, #0]
    stp x21, x22, [x0, #16]
    stp x23, x24, [x0, #32]
    stp x25, x26, [x0, #48]
    stp x27, x28, [x0, #64]
    stp x29, x30, [x0, #80]
    mov x9, sp
    str x9, [x0, #96]

    ldp x19, x20, [x1, #0]
    ldp x21, x22, [x1, #16]
    ldp x23, x24, [x1, #32]
    ldp x25, x26, [x1, #48]
    ldp x27, x28, [x1, #64]
    ldp x29, x30, [x1, #80]
    ldr x9, [x1, #96]
    mov sp, x9

    # Make a pending exclusive access of the outgoing task fail
    clrex
    ret

    .global photon_task_trampoline
    .type photon_task_trampoline, %function
photon_task_trampoline:
    mov x0, x19
    # Terminate the frame chain for debuggers
    mov x29, #0
    bl {task_start}
    "#,
    task_start = sym task_start,
);

/// The body of `photon_task_trampoline`.
extern "C" fn task_start(entry: TaskEntry) -> ! {
    IRQ_DEPTH.store(0, Ordering::Relaxed);

    // Safety: The dispatcher handed the processor over with CPU Lock active,
    //         and nothing else owns it now
    unsafe { SystemTraits::leave_cpu_lock() };

    entry();

    if let Err(e) = KERNEL.exit_current() {
        console::kernel_panic::<SystemTraits>(format_args!("task exit failed: {e:?}"));
    }

    // A Zombie task is never resumed
    SystemTraits::halt()
}

/// Mark the entry to an IRQ handler. IRQs are masked.
#[inline]
pub(crate) fn enter_irq() {
    IRQ_DEPTH.store(IRQ_DEPTH.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
}

/// Mark the exit from an IRQ handler. IRQs are masked.
#[inline]
pub(crate) fn leave_irq() {
    IRQ_DEPTH.store(IRQ_DEPTH.load(Ordering::Relaxed) - 1, Ordering::Relaxed);
}

/// Call `f` with IRQs masked, and restore the previous mask afterwards.
#[inline]
pub(crate) fn interrupt_free<T>(f: impl FnOnce() -> T) -> T {
    let were_masked = aarch64::DAIF.is_set(aarch64::DAIF::I);
    aarch64::mask_irq();

    let ret = f();

    if !were_masked {
        // Safety: They were unmasked when we were called
        unsafe { aarch64::unmask_irq() };
    }
    ret
}

unsafe impl PortThreading for SystemTraits {
    type TaskContext = TaskContext;

    fn initialize_context(context: &mut TaskContext, entry: TaskEntry, stack: StackRegion) {
        *context = TaskContext::INIT;
        context.x19_x28[0] = entry as usize as u64;
        context.lr = photon_task_trampoline as usize as u64;
        // AAPCS64 requires 16-byte alignment at public interfaces
        context.sp = (stack.top() & !0xf) as u64;
    }

    fn is_context_valid(context: &TaskContext) -> bool {
        context.is_resumable()
    }

    unsafe fn switch_context(prev: *mut TaskContext, next: *const TaskContext) {
        unsafe {
            (*prev).irq_depth = IRQ_DEPTH.load(Ordering::Relaxed) as u64;

            photon_switch_context(prev, next);

            // Back in `prev`
            IRQ_DEPTH.store((*prev).irq_depth as usize, Ordering::Relaxed);
        }
    }

    unsafe fn try_enter_cpu_lock() -> bool {
        aarch64::mask_irq();
        if CPU_LOCK.load(Ordering::Relaxed) {
            false
        } else {
            CPU_LOCK.store(true, Ordering::Relaxed);
            true
        }
    }

    unsafe fn leave_cpu_lock() {
        CPU_LOCK.store(false, Ordering::Relaxed);

        // An IRQ handler returns with IRQs masked
        if IRQ_ENABLED.load(Ordering::Relaxed) && IRQ_DEPTH.load(Ordering::Relaxed) == 0 {
            // Safety: CPU Lock is gone, and boot has completed
            unsafe { aarch64::unmask_irq() };
        }
    }

    fn is_cpu_lock_active() -> bool {
        CPU_LOCK.load(Ordering::Relaxed)
    }

    fn is_interrupt_context() -> bool {
        IRQ_DEPTH.load(Ordering::Relaxed) != 0
    }

    unsafe fn enable_interrupts() {
        IRQ_ENABLED.store(true, Ordering::Relaxed);
        if !CPU_LOCK.load(Ordering::Relaxed) {
            // Safety: Upheld by the caller
            unsafe { aarch64::unmask_irq() };
        }
    }

    fn wait_for_interrupt() {
        // Ensure all outstanding memory transactions are complete before
        // halting the processor
        unsafe { asm!("dsb sy", "wfi", options(nostack, preserves_flags)) };
    }

    fn halt() -> ! {
        aarch64::mask_irq();
        loop {
            unsafe { asm!("wfi", options(nomem, nostack, preserves_flags)) };
        }
    }
}
