//! `PortTimer` on top of the EL1 physical and virtual timers
use core::arch::asm;
use photon_kernel::{CounterSource, PortTimer, TimerCtl};
use tock_registers::interfaces::{Readable, Writeable};

use crate::{aarch64, SystemTraits, WatchdogOptions};

impl PortTimer for SystemTraits {
    fn counter_frequency() -> u64 {
        aarch64::CNTFRQ_EL0.get()
    }

    unsafe fn set_counter_frequency(hz: u64) {
        // `CNTFRQ_EL0` is only writable at EL3, which `_start` always leaves.
        // (It programs the register itself when entered there.)
        let el = aarch64::CURRENT_EL.read(aarch64::CurrentEL::EL);
        log::warn!("CNTFRQ_EL0 is read-only at EL{el}; not setting it to {hz} Hz");
    }

    fn read_counter(source: CounterSource) -> u64 {
        // Don't let the read be executed ahead of the preceding instructions
        unsafe { asm!("isb", options(nostack, preserves_flags)) };
        match source {
            CounterSource::Physical => aarch64::CNTPCT_EL0.get(),
            CounterSource::Virtual => aarch64::CNTVCT_EL0.get(),
        }
    }

    unsafe fn set_timer_value(source: CounterSource, ticks: u32) {
        match source {
            CounterSource::Physical => aarch64::CNTP_TVAL_EL0.set(ticks as u64),
            CounterSource::Virtual => aarch64::CNTV_TVAL_EL0.set(ticks as u64),
        }
    }

    fn compare_value(source: CounterSource) -> u64 {
        match source {
            CounterSource::Physical => aarch64::CNTP_CVAL_EL0.get(),
            CounterSource::Virtual => aarch64::CNTV_CVAL_EL0.get(),
        }
    }

    unsafe fn set_compare_value(source: CounterSource, value: u64) {
        match source {
            CounterSource::Physical => aarch64::CNTP_CVAL_EL0.set(value),
            CounterSource::Virtual => aarch64::CNTV_CVAL_EL0.set(value),
        }
    }

    fn timer_control(source: CounterSource) -> TimerCtl {
        let ctl = match source {
            CounterSource::Physical => aarch64::CNTP_CTL_EL0.extract(),
            CounterSource::Virtual => aarch64::CNTV_CTL_EL0.extract(),
        };

        let mut out = TimerCtl::empty();
        out.set(TimerCtl::ENABLE, ctl.is_set(aarch64::CNT_CTL::ENABLE));
        out.set(TimerCtl::IMASK, ctl.is_set(aarch64::CNT_CTL::IMASK));
        out.set(TimerCtl::ISTATUS, ctl.is_set(aarch64::CNT_CTL::ISTATUS));
        out
    }

    unsafe fn set_timer_control(source: CounterSource, ctl: TimerCtl) {
        let value = aarch64::CNT_CTL::ENABLE.val(ctl.contains(TimerCtl::ENABLE) as u64)
            + aarch64::CNT_CTL::IMASK.val(ctl.contains(TimerCtl::IMASK) as u64);
        match source {
            CounterSource::Physical => aarch64::CNTP_CTL_EL0.write(value),
            CounterSource::Virtual => aarch64::CNTV_CTL_EL0.write(value),
        }
    }

    fn wait_for_event() {
        unsafe { asm!("wfe", options(nomem, nostack, preserves_flags)) };
    }

    fn pet_watchdog() {
        if let Some(base) = SystemTraits::WATCHDOG_BASE {
            // Safety: `WatchdogOptions` names a Cadence SWDT, and only the
            //         tick handler touches it
            unsafe {
                ((base + SWDT_RESTART_OFFSET) as *mut u32).write_volatile(SWDT_RESTART_KEY);
            }
        }
    }
}

/// The SWDT's restart register. Writing the key reloads the counter.
const SWDT_RESTART_OFFSET: usize = 0x8;
const SWDT_RESTART_KEY: u32 = 0x1999;
