//! The EL1 exception vector table
//!
//! Only "current EL with SP_ELx, IRQ" is handled. Every other vector reports
//! the syndrome and halts.
use core::arch::global_asm;
use photon_kernel::console;
use tock_registers::interfaces::Readable;

use crate::{aarch64, threading::imp, SystemTraits, KERNEL};

extern "C" {
    /// The vector table. Its address goes to `VBAR_EL1`.
    pub static photon_vector_table: u8;
}

global_asm!(
    r#"
    .macro unexpected_vector num
        .balign 0x80
        mov x0, #\num
        b {unexpected_exception}
    .endm

    .section .text.photon_vector_table, "ax"
    .global photon_vector_table
    .balign 0x800
photon_vector_table:
    # Current EL with SP_EL0
    unexpected_vector 0
    unexpected_vector 1
    unexpected_vector 2
    unexpected_vector 3

    # Current EL with SP_ELx
    unexpected_vector 4
    .balign 0x80
    b photon_irq_entry
    unexpected_vector 6
    unexpected_vector 7

    # Lower EL, AArch64
    unexpected_vector 8
    unexpected_vector 9
    unexpected_vector 10
    unexpected_vector 11

    # Lower EL, AArch32
    unexpected_vector 12
    unexpected_vector 13
    unexpected_vector 14
    unexpected_vector 15

    .section .text.photon_irq_entry, "ax"
    .balign 4
photon_irq_entry:
    # x0-x18, x30, ELR_EL1, and SPSR_EL1. The callee-saved registers are
    # preserved by `irq_handler`.
    sub sp, sp, #176
    stp x0, x1, [sp, #0]
    stp x2, x3, [sp, #16]
    stp x4, x5, [sp, #32]
    stp x6, x7, [sp, #48]
    stp x8, x9, [sp, #64]
    stp x10, x11, [sp, #80]
    stp x12, x13, [sp, #96]
    stp x14, x15, [sp, #112]
    stp x16, x17, [sp, #128]
    stp x18, x30, [sp, #144]
    mrs x0, elr_el1
    mrs x1, spsr_el1
    stp x0, x1, [sp, #160]

    bl {irq_handler}

    ldp x0, x1, [sp, #160]
    msr elr_el1, x0
    msr spsr_el1, x1
    ldp x18, x30, [sp, #144]
    ldp x16, x17, [sp, #128]
    ldp x14, x15, [sp, #112]
    ldp x12, x13, [sp, #96]
    ldp x10, x11, [sp, #80]
    ldp x8, x9, [sp, #64]
    ldp x6, x7, [sp, #48]
    ldp x4, x5, [sp, #32]
    ldp x2, x3, [sp, #16]
    ldp x0, x1, [sp, #0]
    add sp, sp, #176
    eret
    "#,
    irq_handler = sym irq_handler,
    unexpected_exception = sym unexpected_exception,
);

/// Called by `photon_irq_entry` with IRQs masked.
///
/// If the kernel dispatches another task from here, this frame stays on the
/// interrupted task's stack until that task is resumed.
extern "C" fn irq_handler() {
    imp::enter_irq();

    // Safety: We are the IRQ entry, and IRQs are masked
    unsafe { KERNEL.handle_irq() };

    imp::leave_irq();
}

/// Called for every vector except the IRQ one. `vector` is the slot index.
extern "C" fn unexpected_exception(vector: u64) -> ! {
    console::kernel_panic::<SystemTraits>(format_args!(
        "unexpected exception (vector {}): ESR_EL1 = {:#010x}, ELR_EL1 = {:#018x}, FAR_EL1 = {:#018x}",
        vector,
        aarch64::ESR_EL1.get(),
        aarch64::ELR_EL1.get(),
        aarch64::FAR_EL1.get(),
    ))
}

/// Install the vector table.
///
/// # Safety
///
/// The caller must be ready to take exceptions through it.
pub unsafe fn install_vector_table() {
    use tock_registers::interfaces::Writeable;
    // Safety: Only the address is taken
    let base = unsafe { core::ptr::addr_of!(photon_vector_table) } as u64;
    aarch64::VBAR_EL1.set(base);
}
