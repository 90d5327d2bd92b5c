//! The Armv8 generic timer: time keeping, busy-wait delays, and the
//! scheduling tick.
use crate::{
    error::{BadContextError, BootError, SetTimeoutError},
    gic::InterruptNum,
    klock::{self, CpuLockCell, CpuLockTokenRefMut},
    utils::Init,
    Kernel, KernelTraits,
};

mod ticks;
pub use self::ticks::TickConverter;

const NS_PER_SEC: u64 = 1_000_000_000;

/// The number of iterations of the loop measured by
/// [`Kernel::calibrate_delay`].
const CALIBRATION_LOOP_ITERATIONS: u32 = 10_000;

/// The tolerance of [`Kernel::timer_self_test`], in percent.
const SELF_TEST_TOLERANCE_PERCENT: u64 = 10;

bitflags::bitflags! {
    /// The value of `CNTP_CTL_EL0` or `CNTV_CTL_EL0`.
    pub struct TimerCtl: u64 {
        /// The timer is enabled.
        const ENABLE = 1 << 0;
        /// The timer interrupt is masked.
        const IMASK = 1 << 1;
        /// The timer condition is met (read-only).
        const ISTATUS = 1 << 2;
    }
}

/// Selects between the two counter/timer pairs visible at EL1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterSource {
    /// `CNTPCT_EL0` and the EL1 physical timer.
    Physical,
    /// `CNTVCT_EL0` and the virtual timer.
    Virtual,
}

impl Init for CounterSource {
    const INIT: Self = Self::Physical;
}

impl CounterSource {
    /// The PPI the timer of this pair is wired to.
    pub const fn interrupt_num(self) -> InterruptNum {
        match self {
            Self::Physical => 30,
            Self::Virtual => 27,
        }
    }
}

/// The countdown timer's state.
///
/// ```text
/// Disabled ──set_timeout──▶ Armed ──match──▶ Fired ──interrupt──▶ Disabled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    Disabled,
    Armed,
    /// The deadline has passed but the interrupt hasn't been handled yet.
    Fired,
}

impl Init for TimerState {
    const INIT: Self = Self::Disabled;
}

#[derive(Clone, Copy, Debug)]
struct Uptime {
    /// The counter value captured by [`Kernel::init_timer`].
    boot_ticks: u64,
    /// The counter value at the last update.
    last_ticks: u64,
    /// The ticks counted since boot. Converting the total rather than each
    /// delta keeps the fractions of a nanosecond.
    elapsed_ticks: u64,
    /// The time elapsed since boot.
    ns: u64,
    sec: u64,
}

impl Init for Uptime {
    const INIT: Self = Self {
        boot_ticks: 0,
        last_ticks: 0,
        elapsed_ticks: 0,
        ns: 0,
        sec: 0,
    };
}

/// The timer portion of the kernel state.
pub(crate) struct TimerGlobals<Traits> {
    converter: CpuLockCell<Traits, TickConverter>,
    min_delta_ticks: CpuLockCell<Traits, u64>,
    max_delta_ticks: CpuLockCell<Traits, u64>,
    /// The state of the countdown timer, which always uses
    /// `KernelOptions::TIMER_SOURCE`.
    state: CpuLockCell<Traits, TimerState>,
    /// The counter used for time keeping and delays.
    source: CpuLockCell<Traits, CounterSource>,
    uptime: CpuLockCell<Traits, Uptime>,
}

impl<Traits> Init for TimerGlobals<Traits> {
    const INIT: Self = Self {
        converter: Init::INIT,
        min_delta_ticks: Init::INIT,
        max_delta_ticks: Init::INIT,
        state: Init::INIT,
        source: Init::INIT,
        uptime: Init::INIT,
    };
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Initialize the timer subsystem and enable its interrupt line in the
    /// GIC. The countdown timer is left disabled.
    ///
    /// A counter reporting zero frequency is assumed to run at
    /// `KernelOptions::FALLBACK_FREQUENCY`.
    pub fn init_timer(&self) -> Result<(), BootError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        let timer = &self.timer;

        let mut frequency = Traits::counter_frequency();
        if frequency == 0 {
            log::warn!(
                "counter frequency is not set; assuming {} Hz",
                Traits::FALLBACK_FREQUENCY
            );
            frequency = Traits::FALLBACK_FREQUENCY;
            // Safety: We are initializing the timer
            unsafe { Traits::set_counter_frequency(frequency) };
        }

        timer
            .converter
            .replace(&mut *lock, TickConverter::new(frequency));
        timer
            .min_delta_ticks
            .replace(&mut *lock, Traits::MIN_DELTA_TICKS);
        timer
            .max_delta_ticks
            .replace(&mut *lock, Traits::MAX_DELTA_TICKS);
        timer.source.replace(&mut *lock, Traits::TIMER_SOURCE);

        let now = Traits::read_counter(Traits::TIMER_SOURCE);
        timer.uptime.replace(
            &mut *lock,
            Uptime {
                boot_ticks: now,
                last_ticks: now,
                elapsed_ticks: 0,
                ns: 0,
                sec: 0,
            },
        );

        // Safety: We own the timer
        unsafe { Traits::set_timer_control(Traits::TIMER_SOURCE, TimerCtl::IMASK) };
        timer.state.replace(&mut *lock, TimerState::Disabled);

        let line = Traits::TIMER_SOURCE.interrupt_num();
        self.gic
            .set_priority(line, Traits::TIMER_INTERRUPT_PRIORITY)?;
        self.gic.enable(line)?;

        log::info!(
            "timer: {frequency} Hz, {:?} counter, interrupt line {line}",
            Traits::TIMER_SOURCE
        );
        Ok(())
    }

    /// Fold the counter progress since the last update into the uptime.
    pub fn update_uptime(&self) -> Result<(), BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        self.update_uptime_locked(lock.borrow_mut());
        Ok(())
    }

    fn update_uptime_locked(&self, mut lock: CpuLockTokenRefMut<'_, Traits>) -> u64 {
        let timer = &self.timer;
        let now = Traits::read_counter(*timer.source.read(&*lock));
        let converter = *timer.converter.read(&*lock);

        let uptime = timer.uptime.write(&mut *lock);
        // The subtraction stays correct when the counter wraps around
        let delta = now.wrapping_sub(uptime.last_ticks);
        uptime.elapsed_ticks = uptime.elapsed_ticks.saturating_add(delta);
        uptime.ns = converter.ticks_to_ns(uptime.elapsed_ticks);
        uptime.sec = uptime.ns / NS_PER_SEC;
        uptime.last_ticks = now;
        uptime.ns
    }

    /// Get the time elapsed since [`Self::init_timer`] in nanoseconds.
    pub fn get_uptime_ns(&self) -> Result<u64, BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        Ok(self.update_uptime_locked(lock.borrow_mut()))
    }

    pub fn get_uptime_us(&self) -> Result<u64, BadContextError> {
        Ok(self.get_uptime_ns()? / 1_000)
    }

    pub fn get_uptime_ms(&self) -> Result<u64, BadContextError> {
        Ok(self.get_uptime_ns()? / 1_000_000)
    }

    /// Get the whole seconds elapsed since [`Self::init_timer`].
    pub fn uptime_sec(&self) -> Result<u64, BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        self.update_uptime_locked(lock.borrow_mut());
        Ok(self.timer.uptime.read(&*lock).sec)
    }

    /// Get the counter value captured at boot.
    pub fn boot_ticks(&self) -> Result<u64, BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        Ok(self.timer.uptime.read(&*lock).boot_ticks)
    }

    /// Get the counter frequency in Hz, or `0` before [`Self::init_timer`].
    pub fn counter_frequency(&self) -> Result<u64, BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        Ok(self.timer.converter.read(&*lock).frequency())
    }

    /// Get the converter for the current counter frequency.
    pub fn tick_converter(&self) -> Result<TickConverter, BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        Ok(*self.timer.converter.read(&*lock))
    }

    /// Switch the counter used for time keeping and delays. The uptime
    /// carries over.
    pub fn set_counter_source(&self, source: CounterSource) -> Result<(), BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        let timer = &self.timer;

        self.update_uptime_locked(lock.borrow_mut());
        timer.source.replace(&mut *lock, source);
        timer.uptime.write(&mut *lock).last_ticks = Traits::read_counter(source);

        log::debug!("time keeping now uses the {source:?} counter");
        Ok(())
    }

    /// Get the counter used for time keeping and delays.
    pub fn counter_source(&self) -> Result<CounterSource, BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        Ok(*self.timer.source.read(&*lock))
    }

    /// Get the state of the countdown timer.
    pub fn timer_state(&self) -> Result<TimerState, BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        Ok(match *self.timer.state.read(&*lock) {
            TimerState::Armed
                if Traits::timer_control(Traits::TIMER_SOURCE).contains(TimerCtl::ISTATUS) =>
            {
                TimerState::Fired
            }
            state => state,
        })
    }

    /// Arm the countdown timer to interrupt after `ns` nanoseconds.
    ///
    /// The delay is clamped to the programmable range. Fails with
    /// `AlreadyArmed` unless the timer is disabled.
    ///
    /// There is only one countdown timer, and [`Self::boot`] hands it to the
    /// scheduling tick, which keeps it armed from then on. After boot this
    /// always fails with `AlreadyArmed`.
    pub fn set_timeout(&self, ns: u64) -> Result<(), SetTimeoutError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        if *self.timer.state.read(&*lock) != TimerState::Disabled {
            return Err(SetTimeoutError::AlreadyArmed);
        }
        self.arm_timeout_locked(lock.borrow_mut(), ns);
        Ok(())
    }

    /// Program the countdown timer regardless of its current state.
    fn arm_timeout_locked(&self, mut lock: CpuLockTokenRefMut<'_, Traits>, ns: u64) {
        let timer = &self.timer;
        let ticks = timer
            .converter
            .read(&*lock)
            .ns_to_ticks(ns)
            .max(*timer.min_delta_ticks.read(&*lock))
            .min(*timer.max_delta_ticks.read(&*lock));

        let source = Traits::TIMER_SOURCE;
        // Safety: We own the timer
        unsafe {
            if ticks <= i32::MAX as u64 {
                // `TVAL` is a signed 32-bit down-counter
                Traits::set_timer_value(source, ticks as u32);
            } else {
                let now = Traits::read_counter(source);
                Traits::set_compare_value(source, now.wrapping_add(ticks));
            }
            Traits::set_timer_control(source, TimerCtl::ENABLE);
        }

        timer.state.replace(&mut *lock, TimerState::Armed);
    }

    /// Disable and mask the countdown timer. Uptime is not affected.
    pub fn cancel_timeout(&self) -> Result<(), BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        self.cancel_timeout_locked(lock.borrow_mut());
        Ok(())
    }

    fn cancel_timeout_locked(&self, mut lock: CpuLockTokenRefMut<'_, Traits>) {
        // Safety: We own the timer
        unsafe { Traits::set_timer_control(Traits::TIMER_SOURCE, TimerCtl::IMASK) };
        self.timer.state.replace(&mut *lock, TimerState::Disabled);
    }

    /// Cancel the pending timeout, if any, and arm a new one.
    ///
    /// After boot this stretches or shortens the current tick period: the
    /// expiry is charged as one scheduling tick, and the timer goes back to
    /// `KernelOptions::TICK_PERIOD_NS` afterwards.
    pub fn rearm_timeout(&self, ns: u64) -> Result<(), BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        self.cancel_timeout_locked(lock.borrow_mut());
        self.arm_timeout_locked(lock.borrow_mut(), ns);
        Ok(())
    }

    /// The timer's interrupt handler. Does nothing unless the timer
    /// condition is met.
    ///
    /// Masks the timer, updates the uptime, pets the watchdog, charges a tick
    /// to the running task, and arms the next tick. A reschedule requested by the tick is
    /// carried out after the interrupt completes.
    pub fn on_timer_interrupt(&self) {
        let Ok(mut lock) = klock::lock_cpu::<Traits>() else {
            log::warn!("timer interrupt taken with CPU Lock active");
            return;
        };

        let source = Traits::TIMER_SOURCE;
        if !Traits::timer_control(source).contains(TimerCtl::ISTATUS) {
            return;
        }

        // Safety: We own the timer
        unsafe { Traits::set_timer_control(source, TimerCtl::ENABLE | TimerCtl::IMASK) };
        self.timer.state.replace(&mut *lock, TimerState::Disabled);

        self.update_uptime_locked(lock.borrow_mut());
        Traits::pet_watchdog();

        let reschedule = self.charge_tick(lock.borrow_mut());

        self.arm_timeout_locked(lock.borrow_mut(), Traits::TICK_PERIOD_NS);

        if reschedule {
            self.schedule(lock);
        }
    }

    /// Busy-wait for at least `us` microseconds. The wait never drops below
    /// the minimum programmable delta.
    pub fn delay_us(&self, us: u64) -> Result<(), BadContextError> {
        let (source, target) = {
            let lock = klock::lock_cpu::<Traits>()?;
            let timer = &self.timer;
            let ticks = timer.converter.read(&*lock).us_to_ticks(us);
            (
                *timer.source.read(&*lock),
                ticks.max(*timer.min_delta_ticks.read(&*lock)),
            )
        };

        let start = Traits::read_counter(source);
        while Traits::read_counter(source).wrapping_sub(start) < target {
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Busy-wait for at least `ms` milliseconds, one millisecond at a time.
    pub fn delay_ms(&self, ms: u64) -> Result<(), BadContextError> {
        for _ in 0..ms {
            self.delay_us(1_000)?;
        }
        Ok(())
    }

    /// Wait until the uptime reaches `deadline_ns`, sleeping until the next
    /// event between checks.
    pub fn spin_until(&self, deadline_ns: u64) -> Result<(), BadContextError> {
        while self.get_uptime_ns()? < deadline_ns {
            Traits::wait_for_event();
        }
        Ok(())
    }

    /// Measure how many counter ticks a fixed busy loop takes, and log it.
    pub fn calibrate_delay(&self) -> Result<u64, BadContextError> {
        let source = self.counter_source()?;

        let start = Traits::read_counter(source);
        for _ in 0..CALIBRATION_LOOP_ITERATIONS {
            core::hint::spin_loop();
        }
        let ticks = Traits::read_counter(source).wrapping_sub(start);

        log::info!(
            "calibration: {CALIBRATION_LOOP_ITERATIONS} iterations took {ticks} ticks ({} ns)",
            self.tick_converter()?.ticks_to_ns(ticks)
        );
        Ok(ticks)
    }

    /// Log the registers of the countdown timer.
    pub fn dump_timer_registers(&self) {
        let source = Traits::TIMER_SOURCE;
        let ctl = Traits::timer_control(source);
        let frequency = Traits::counter_frequency();
        log::info!("CNTFRQ  : {frequency:#018x} ({frequency} Hz)");
        log::info!("counter : {:#018x} ({source:?})", Traits::read_counter(source));
        log::info!(
            "CTL     : {:#018x} (En:{} Mask:{} Stat:{})",
            ctl.bits(),
            ctl.contains(TimerCtl::ENABLE) as u8,
            ctl.contains(TimerCtl::IMASK) as u8,
            ctl.contains(TimerCtl::ISTATUS) as u8,
        );
        log::info!("CVAL    : {:#018x}", Traits::compare_value(source));
    }

    /// Check that a 1 ms delay measures as 1 ms within 10%. Return `true`
    /// on success.
    pub fn timer_self_test(&self) -> Result<bool, BadContextError> {
        const EXPECTED_NS: u64 = 1_000_000;
        const SLACK_NS: u64 = EXPECTED_NS * SELF_TEST_TOLERANCE_PERCENT / 100;

        let t1 = self.get_uptime_ns()?;
        self.delay_us(EXPECTED_NS / 1_000)?;
        let t2 = self.get_uptime_ns()?;

        let elapsed = t2.wrapping_sub(t1);
        let pass = (EXPECTED_NS - SLACK_NS..=EXPECTED_NS + SLACK_NS).contains(&elapsed);
        if pass {
            log::info!("timer self-test passed: 1 ms delay took {elapsed} ns");
        } else {
            log::error!("timer self-test failed: 1 ms delay took {elapsed} ns");
        }
        Ok(pass)
    }
}

/// The handler registered for the timer's interrupt line.
pub(crate) fn timer_interrupt_handler<Traits: KernelTraits>(
    kernel: &Kernel<Traits>,
    _line: InterruptNum,
) {
    kernel.on_timer_interrupt();
}
