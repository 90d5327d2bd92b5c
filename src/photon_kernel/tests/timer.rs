//! Generic timer behavior on the simulated port
mod common;

use common::{
    advance_counter, fire_timer, take_switches, task_body, timer_regs, watchdog_pets,
    with_timer_regs, TestSystem, DEFAULT_FREQUENCY, GICC_EOIR, GICD_IPRIORITYR, GICD_ISENABLER,
};
use photon_kernel::{CounterSource, SetTimeoutError, TaskId, TimerCtl, TimerState};
use quickcheck_macros::quickcheck;

const PHYSICAL: usize = 0;
const VIRTUAL: usize = 1;

#[test]
fn frequency_is_zero_before_init() {
    let system = TestSystem::new();
    assert_eq!(system.kernel.counter_frequency(), Ok(0));
}

#[test]
fn zero_frequency_falls_back() {
    let system = TestSystem::new();
    with_timer_regs(|t| t.frequency = 0);
    unsafe { system.kernel.boot() }.unwrap();

    assert_eq!(system.kernel.counter_frequency(), Ok(100_000_000));
    // The fallback is written back to the frequency register
    assert_eq!(timer_regs().frequency, 100_000_000);
}

#[test]
fn boot_arms_the_scheduling_tick() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    let regs = timer_regs();
    assert_eq!(regs.tval[PHYSICAL], Some(100_000));
    assert_eq!(regs.ctl[PHYSICAL], TimerCtl::ENABLE);
    assert_eq!(regs.tval[VIRTUAL], None);
    assert_eq!(kernel.timer_state(), Ok(TimerState::Armed));
    assert_eq!(kernel.counter_source(), Ok(CounterSource::Physical));

    // Line 30 is enabled at the highest priority
    assert_ne!(system.distributor_word(GICD_ISENABLER) & (1 << 30), 0);
    assert_eq!((system.distributor_word(GICD_IPRIORITYR + 7) >> 16) & 0xff, 0);
    assert_eq!(kernel.gic().priority(30), Ok(0));
    assert_eq!(kernel.gic().is_enabled(30), Ok(true));
}

#[test]
fn set_timeout_converts_to_ticks() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    kernel.cancel_timeout().unwrap();
    kernel.set_timeout(500_000).unwrap();
    assert_eq!(timer_regs().tval[PHYSICAL], Some(50_000));
    assert_eq!(timer_regs().ctl[PHYSICAL], TimerCtl::ENABLE);
    assert_eq!(kernel.timer_state(), Ok(TimerState::Armed));
}

#[test]
fn set_timeout_clamps_to_min_delta() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    for ns in [0, 1, 10, 149] {
        kernel.cancel_timeout().unwrap();
        kernel.set_timeout(ns).unwrap();
        assert_eq!(timer_regs().tval[PHYSICAL], Some(15), "{ns} ns");
    }
}

#[test]
fn set_timeout_requires_disabled_timer() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    assert_eq!(kernel.set_timeout(500_000), Err(SetTimeoutError::AlreadyArmed));
    // The armed deadline is kept
    assert_eq!(timer_regs().tval[PHYSICAL], Some(100_000));

    kernel.rearm_timeout(2_000_000).unwrap();
    assert_eq!(timer_regs().tval[PHYSICAL], Some(200_000));
    assert_eq!(kernel.timer_state(), Ok(TimerState::Armed));
}

#[test]
fn rearmed_timeout_is_one_tick() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    kernel.rearm_timeout(5_000_000).unwrap();
    assert_eq!(timer_regs().tval[PHYSICAL], Some(500_000));

    advance_counter(500_000);
    fire_timer(CounterSource::Physical);
    system.raise_irq(30);

    assert_eq!(kernel.task_info(0).unwrap().total_runtime, 1);
    // Back to the tick period, and still unavailable to `set_timeout`
    assert_eq!(timer_regs().tval[PHYSICAL], Some(100_000));
    assert_eq!(kernel.set_timeout(500_000), Err(SetTimeoutError::AlreadyArmed));
}

#[test]
fn long_timeouts_use_the_compare_register() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    advance_counter(5_000);
    kernel.cancel_timeout().unwrap();
    kernel.set_timeout(100_000_000_000).unwrap();

    let regs = timer_regs();
    assert_eq!(regs.tval[PHYSICAL], None);
    assert_eq!(regs.cval[PHYSICAL], 5_000 + 10_000_000_000);
    assert_eq!(regs.ctl[PHYSICAL], TimerCtl::ENABLE);
}

#[test]
fn cancel_masks_the_timer() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    kernel.cancel_timeout().unwrap();
    assert_eq!(timer_regs().ctl[PHYSICAL], TimerCtl::IMASK);
    assert_eq!(kernel.timer_state(), Ok(TimerState::Disabled));

    // Cancelling twice is harmless
    kernel.cancel_timeout().unwrap();
    assert_eq!(kernel.timer_state(), Ok(TimerState::Disabled));
}

#[test]
fn expired_timer_reports_fired() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    fire_timer(CounterSource::Physical);
    assert_eq!(kernel.timer_state(), Ok(TimerState::Fired));
}

#[test]
fn handler_ignores_a_clear_condition() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    advance_counter(100_000);
    kernel.on_timer_interrupt();

    assert_eq!(kernel.task_info(0).unwrap().total_runtime, 0);
    assert_eq!(timer_regs().ctl[PHYSICAL], TimerCtl::ENABLE);
    assert_eq!(kernel.timer_state(), Ok(TimerState::Armed));
}

#[test]
fn tick_interrupt_updates_uptime_and_rearms() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    advance_counter(100_000);
    fire_timer(CounterSource::Physical);
    with_timer_regs(|t| t.tval[PHYSICAL] = None);
    system.raise_irq(30);

    assert_eq!(system.cpu_interface_word(GICC_EOIR), 30);
    assert_eq!(kernel.get_uptime_ns(), Ok(1_000_000));
    assert_eq!(kernel.task_info(0).unwrap().total_runtime, 1);

    let regs = timer_regs();
    assert_eq!(regs.tval[PHYSICAL], Some(100_000));
    assert_eq!(regs.ctl[PHYSICAL], TimerCtl::ENABLE);
    assert_eq!(kernel.timer_state(), Ok(TimerState::Armed));
}

#[test]
fn every_tick_pets_the_watchdog() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    for _ in 0..3 {
        advance_counter(100_000);
        fire_timer(CounterSource::Physical);
        system.raise_irq(30);
    }
    assert_eq!(watchdog_pets(), 3);

    // Not for an interrupt without the timer condition
    kernel.on_timer_interrupt();
    assert_eq!(watchdog_pets(), 3);
}

#[test]
fn tick_interrupts_preempt_after_a_quantum() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    let a = kernel.create_task("a", task_body, 1).unwrap();
    let b = kernel.create_task("b", task_body, 1).unwrap();
    kernel.yield_now().unwrap();
    assert_eq!(take_switches(), [(TaskId::IDLE, a)]);

    for _ in 0..3 {
        advance_counter(100_000);
        fire_timer(CounterSource::Physical);
        system.raise_irq(30);
        assert_eq!(kernel.current_task(), Ok(a));
    }
    assert!(take_switches().is_empty());

    advance_counter(100_000);
    fire_timer(CounterSource::Physical);
    system.raise_irq(30);

    assert_eq!(kernel.current_task(), Ok(b));
    assert_eq!(take_switches(), [(a, b)]);
    assert_eq!(system.cpu_interface_word(GICC_EOIR), 30);
    assert_eq!(kernel.task_info(a.get()).unwrap().total_runtime, 4);
    assert_eq!(kernel.get_uptime_ms(), Ok(4));
}

#[quickcheck]
fn uptime_follows_the_counter_across_wraparound(start: u64, steps: Vec<u32>) -> bool {
    let system = TestSystem::new();
    with_timer_regs(|t| t.counter = start);
    unsafe { system.kernel.boot() }.unwrap();

    let mut total_ticks = 0u64;
    let mut last = 0;
    for step in steps {
        advance_counter(step as u64);
        total_ticks += step as u64;

        let now = system.kernel.get_uptime_ns().unwrap();
        // 100 MHz: one tick is 10 ns
        if now < last || now != total_ticks * 10 {
            return false;
        }
        last = now;
    }
    true
}

#[test]
fn frequent_reads_do_not_lose_time() {
    let system = TestSystem::new();
    // One tick is 10.001 ns
    with_timer_regs(|t| t.frequency = 99_990_000);
    unsafe { system.kernel.boot() }.unwrap();

    for _ in 0..100_000 {
        advance_counter(1);
        system.kernel.get_uptime_ns().unwrap();
    }
    assert_eq!(system.kernel.get_uptime_ns(), Ok(1_000_100));
}

#[test]
fn uptime_in_coarser_units() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    advance_counter(250_000_000);
    assert_eq!(kernel.uptime_sec(), Ok(2));
    assert_eq!(kernel.get_uptime_ms(), Ok(2_500));
    assert_eq!(kernel.get_uptime_us(), Ok(2_500_000));
    assert_eq!(kernel.get_uptime_ns(), Ok(2_500_000_000));
}

#[test]
fn boot_ticks_is_captured_at_init() {
    let system = TestSystem::new();
    with_timer_regs(|t| t.counter = 123_456);
    unsafe { system.kernel.boot() }.unwrap();
    advance_counter(1_000);
    assert_eq!(system.kernel.boot_ticks(), Ok(123_456));
}

#[test]
fn switching_the_counter_keeps_the_uptime() {
    let system = TestSystem::booted();
    let kernel = system.kernel;
    with_timer_regs(|t| t.virtual_offset = 1_000);

    advance_counter(100);
    kernel.set_counter_source(CounterSource::Virtual).unwrap();
    assert_eq!(kernel.counter_source(), Ok(CounterSource::Virtual));
    advance_counter(200);
    assert_eq!(kernel.get_uptime_ns(), Ok(3_000));

    // The scheduling tick stays on the physical timer
    kernel.rearm_timeout(1_000_000).unwrap();
    assert_eq!(timer_regs().tval[PHYSICAL], Some(100_000));
    assert_eq!(timer_regs().tval[VIRTUAL], None);
}

#[test]
fn delay_us_waits_long_enough() {
    let system = TestSystem::booted();
    let kernel = system.kernel;
    with_timer_regs(|t| t.step = 10);

    let start = timer_regs().counter;
    kernel.delay_us(100).unwrap();
    assert!(timer_regs().counter - start >= 10_000);

    // Even a zero delay waits for the minimum delta
    let start = timer_regs().counter;
    kernel.delay_us(0).unwrap();
    assert!(timer_regs().counter - start >= 15);
}

#[test]
fn delay_ms_waits_long_enough() {
    let system = TestSystem::booted();
    let kernel = system.kernel;
    with_timer_regs(|t| t.step = 1_000);

    let start = timer_regs().counter;
    kernel.delay_ms(2).unwrap();
    assert!(timer_regs().counter - start >= 200_000);
}

#[test]
fn spin_until_reaches_the_deadline() {
    let system = TestSystem::booted();
    let kernel = system.kernel;

    kernel.spin_until(1_000_000).unwrap();
    let now = kernel.get_uptime_ns().unwrap();
    assert!(now >= 1_000_000);
    // `wait_for_event` advances the simulated counter by 10 us
    assert!(now < 1_000_000 + 10_000);

    // A past deadline returns immediately
    kernel.spin_until(0).unwrap();
    assert_eq!(kernel.get_uptime_ns(), Ok(now));
}

#[test]
fn self_test_passes_on_an_accurate_counter() {
    let system = TestSystem::booted();
    with_timer_regs(|t| t.step = 1_000);
    assert_eq!(system.kernel.timer_self_test(), Ok(true));
}

#[test]
fn self_test_fails_on_a_coarse_counter() {
    let system = TestSystem::booted();
    with_timer_regs(|t| t.step = 50_000);
    assert_eq!(system.kernel.timer_self_test(), Ok(false));
}

#[test]
fn calibrate_delay_reports_elapsed_ticks() {
    let system = TestSystem::booted();
    with_timer_regs(|t| t.step = 7);
    assert_eq!(system.kernel.calibrate_delay(), Ok(7));
}

#[test]
fn dump_timer_registers_has_no_side_effects() {
    let system = TestSystem::booted();
    let before = timer_regs();
    system.kernel.dump_timer_registers();
    let after = timer_regs();
    assert_eq!(before.ctl, after.ctl);
    assert_eq!(before.cval, after.cval);
    assert_eq!(after.frequency, DEFAULT_FREQUENCY);
}
