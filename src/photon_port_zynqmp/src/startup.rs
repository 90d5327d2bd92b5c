//! The reset entry point and the boot sequence
use photon_kernel::{console, KernelOptions, PortThreading};

use crate::{console as port_console, exception, GicOptions, SystemTraits, KERNEL};

#[doc(hidden)]
pub const EL3_COUNTER_FREQUENCY: u64 = <SystemTraits as KernelOptions>::FALLBACK_FREQUENCY;

#[doc(hidden)]
pub const EL3_GICD_BASE: usize = <SystemTraits as GicOptions>::GIC_DISTRIBUTOR_BASE;

/// The interval of the uptime heartbeat printed by the idle loop.
const HEARTBEAT_INTERVAL_MS: u64 = 1000;

/// Generate the reset entry point `_start`. `link.x` names it as the ELF
/// entry point.
///
/// `_start` parks every core but core 0, drops to Non-secure EL1 if entered
/// at EL2 or EL3, sets up the boot stack, and then jumps to
/// [`reset_handler`].
///
/// Entered at EL3, it also does the firmware's part: it programs
/// `CNTFRQ_EL0` (if zero) with `KernelOptions::FALLBACK_FREQUENCY` and
/// assigns every interrupt to Group 1.
#[macro_export]
macro_rules! use_startup {
    () => {
        ::core::arch::global_asm!(
            r#"
            .section .text.boot, "ax"
            .global _start
            .type _start, %function
        _start:
            # Park the secondary cores
            mrs x0, mpidr_el1
            and x0, x0, #0xff
            cbz x0, 2f
        1:
            wfe
            b 1b

        2:
            mrs x0, CurrentEL
            lsr x0, x0, #2
            cmp x0, #2
            b.lo 3f

            # EL1 is AArch64
            mov x1, #(1 << 31)
            msr hcr_el2, x1
            # Don't trap EL1 accesses to the physical counter and timer
            mrs x1, cnthctl_el2
            orr x1, x1, #3
            msr cnthctl_el2, x1
            msr cntvoff_el2, xzr

            # EL1h with DAIF masked
            mov x1, #0x3c5
            adr x2, 3f
            cmp x0, #3
            b.eq 4f
            msr spsr_el2, x1
            msr elr_el2, x2
            eret

        4:
            # No firmware ran before us, so the frequency may be unset
            mrs x3, cntfrq_el0
            cbnz x3, 5f
            ldr x3, ={counter_frequency}
            msr cntfrq_el0, x3
        5:
            # Make every interrupt Group 1 so the Non-secure EL1 driver can
            # configure it
            ldr x3, ={gicd_base}
            ldr w4, [x3, #0x4]
            and w4, w4, #0x1f
            add x3, x3, #0x80
            mov w5, #-1
        6:
            str w5, [x3], #4
            subs w4, w4, #1
            b.pl 6b

            # Non-secure, lower ELs are AArch64
            mov x3, #0x431
            msr scr_el3, x3
            msr spsr_el3, x1
            msr elr_el3, x2
            eret

        3:
            adrp x0, __stack_top
            add x0, x0, :lo12:__stack_top
            mov sp, x0
            b {reset_handler}
            "#,
            reset_handler = sym $crate::startup::reset_handler,
            counter_frequency = const $crate::startup::EL3_COUNTER_FREQUENCY,
            gicd_base = const $crate::startup::EL3_GICD_BASE,
        );
    };
}

/// Called by `_start` on core 0 at EL1 with a valid stack.
#[doc(hidden)]
pub extern "C" fn reset_handler() -> ! {
    extern "C" {
        // These symbols come from `link.x`
        static mut __sbss: u32;
        static mut __ebss: u32;
    }

    // Initialize RAM
    unsafe {
        r0::zero_bss(
            core::ptr::addr_of_mut!(__sbss),
            core::ptr::addr_of_mut!(__ebss),
        );
    }

    // Safety: IRQs are still masked
    unsafe { exception::install_vector_table() };

    kernel_main()
}

fn kernel_main() -> ! {
    // Safety: This is the only place touching the UART
    unsafe { port_console::init() };
    log::info!("photon kernel starting");

    // Safety: Called once, by the boot context
    if let Err(e) = unsafe { KERNEL.boot() } {
        console::kernel_panic::<SystemTraits>(format_args!("boot failed: {e:?}"));
    }

    match KERNEL.calibrate_delay() {
        Ok(ticks) => log::info!("delay calibration: {ticks} ticks per loop"),
        Err(e) => log::warn!("delay calibration failed: {e:?}"),
    }
    match KERNEL.timer_self_test() {
        Ok(true) => log::info!("timer self-test passed"),
        Ok(false) => log::warn!("timer self-test failed"),
        Err(e) => log::warn!("timer self-test could not run: {e:?}"),
    }
    KERNEL.dump_timer_registers();

    idle_loop()
}

/// The body of the idle task.
fn idle_loop() -> ! {
    let mut next_heartbeat_ms = HEARTBEAT_INTERVAL_MS;
    loop {
        if let Ok(now_ms) = KERNEL.get_uptime_ms() {
            if now_ms >= next_heartbeat_ms {
                console::print::<SystemTraits>(format_args!(
                    "[STATUS] Uptime: {} s\n",
                    now_ms / 1000
                ));
                next_heartbeat_ms = (now_ms / HEARTBEAT_INTERVAL_MS + 1) * HEARTBEAT_INTERVAL_MS;
            }
        }

        SystemTraits::wait_for_interrupt();
    }
}
