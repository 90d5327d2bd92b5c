//! AArch64 system registers
/// Implements `tock_registers::interfaces::Readable::get`.
#[macropol::macropol]
macro_rules! sys_reg_read_raw {
    ($width:ty, $name:ident) => {
        /// `mrs {out_reg}, $&name`
        #[inline]
        fn get(&self) -> $width {
            let reg;
            unsafe {
                core::arch::asm!(
                    "mrs {}, $&name",
                    lateout(reg) reg,
                    options(nomem, nostack, preserves_flags),
                );
            }
            reg
        }
    };
}

/// Implements `tock_registers::interfaces::Writeable::set`.
#[macropol::macropol]
macro_rules! sys_reg_write_raw {
    ($width:ty, $name:ident) => {
        /// `msr $&name, {in_reg}`
        #[inline]
        fn set(&self, value: $width) {
            unsafe {
                core::arch::asm!(
                    "msr $&name, {}",
                    "isb",
                    in(reg) value,
                    options(nostack, preserves_flags),
                );
            }
        }
    };
}

mod cntfrq_el0;
mod counters;
mod current_el;
mod daif;
mod exception_regs;
mod timers;
mod vbar_el1;
pub use self::cntfrq_el0::*;
pub use self::counters::*;
pub use self::current_el::*;
pub use self::daif::*;
pub use self::exception_regs::*;
pub use self::timers::*;
pub use self::vbar_el1::*;
