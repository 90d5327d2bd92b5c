tock_registers::register_bitfields! {u64,
    pub DAIF [
        /// Debug exception mask.
        D OFFSET(9) NUMBITS(1) [],
        /// SError interrupt mask.
        A OFFSET(8) NUMBITS(1) [],
        /// IRQ mask.
        I OFFSET(7) NUMBITS(1) [],
        /// FIQ mask.
        F OFFSET(6) NUMBITS(1) []
    ]
}

/// Interrupt Mask Bits
pub const DAIF: DaifAccessor = DaifAccessor;
pub struct DaifAccessor;

impl tock_registers::interfaces::Readable for DaifAccessor {
    type T = u64;
    type R = DAIF::Register;
    sys_reg_read_raw!(u64, DAIF);
}

/// Mask IRQs.
#[inline(always)]
pub fn mask_irq() {
    // Safety: Masking IRQs is always sound
    unsafe { core::arch::asm!("msr daifset, #2", options(nostack, preserves_flags)) };
}

/// Unmask IRQs.
///
/// # Safety
///
/// The caller must be prepared to be interrupted.
#[inline(always)]
pub unsafe fn unmask_irq() {
    unsafe { core::arch::asm!("msr daifclr, #2", options(nostack, preserves_flags)) };
}
