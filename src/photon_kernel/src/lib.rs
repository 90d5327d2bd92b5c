#![doc = include_str!("./lib.md")]
#![cfg_attr(not(test), no_std)] // Link `std` only when building a test (`cfg(test)`)
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::new_without_default)]

pub mod console;
pub mod error;
pub mod gic;
pub mod interrupt;
mod kernel;
mod klock;
pub mod task;
pub mod timer;
pub mod utils;

pub use self::{
    error::*,
    gic::{Gic, InterruptLineTriggerMode, InterruptNum, PendingInterrupt},
    interrupt::InterruptHandlerFn,
    kernel::Kernel,
    task::{
        StackPool, StackRegion, TaskEntry, TaskId, TaskInfo, TaskName, TaskSt, MAX_TASKS,
        NUM_PRIORITY_LEVELS, TASK_STACK_SIZE,
    },
    timer::{CounterSource, TickConverter, TimerCtl, TimerState},
    utils::Init,
};

/// Numeric value used to express a task priority. Lower values denote higher
/// priorities.
pub type Priority = u8;

/// Associates a port with the threading primitives the kernel builds on.
///
/// The kernel never inspects [`Self::TaskContext`]. It asks the port to seed
/// it, to validate it, and to hand the processor over from one context to
/// another.
///
/// # Safety
///
/// Implementing a port is inherently unsafe because it's responsible for
/// initializing the execution environment and providing a dispatcher
/// implementation.
///
/// These methods are only meant to be called by the kernel.
pub unsafe trait PortThreading: Sized + 'static {
    /// The fixed-layout snapshot of a suspended task.
    type TaskContext: Init + Send + 'static;

    /// Seed `context` so that resuming it for the first time starts `entry`
    /// with the stack pointer at the top of `stack` and IRQs masked until the
    /// handover completes.
    fn initialize_context(context: &mut Self::TaskContext, entry: TaskEntry, stack: StackRegion);

    /// Return `true` if `context` holds a state that can be resumed.
    fn is_context_valid(context: &Self::TaskContext) -> bool;

    /// Save the current execution state to `prev` and resume `next`.
    ///
    /// Control comes back to the caller only when some later handover resumes
    /// `prev`.
    ///
    /// # Safety
    ///
    /// CPU Lock must be active. `prev` and `next` must point to distinct
    /// contexts, and `next` must be valid according to
    /// [`Self::is_context_valid`].
    unsafe fn switch_context(prev: *mut Self::TaskContext, next: *const Self::TaskContext);

    /// Enter a CPU Lock state if it's inactive. Return `false` if it's
    /// already active.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the kernel.
    unsafe fn try_enter_cpu_lock() -> bool;

    /// Leave a CPU Lock state.
    ///
    /// # Safety
    ///
    /// CPU Lock must be active and owned by the kernel.
    unsafe fn leave_cpu_lock();

    /// Return a flag indicating whether a CPU Lock state is active.
    fn is_cpu_lock_active() -> bool;

    /// Return a flag indicating whether the current context is an interrupt
    /// handler.
    fn is_interrupt_context() -> bool;

    /// Unmask IRQs at the processor. Called once at the end of the boot
    /// sequence.
    ///
    /// # Safety
    ///
    /// The interrupt controller and every enabled line's handler must be
    /// ready to run.
    unsafe fn enable_interrupts();

    /// Put the processor in a low-power state until an interrupt arrives.
    fn wait_for_interrupt();

    /// Stop the processor forever.
    fn halt() -> !;
}

/// Access to the generic timer of the current core.
///
/// Every method takes the [`CounterSource`] whose registers it should
/// access.
pub trait PortTimer {
    /// Read the counter frequency register (Hz).
    fn counter_frequency() -> u64;

    /// Write the counter frequency register.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the kernel during initialization.
    unsafe fn set_counter_frequency(hz: u64);

    /// Read the free-running counter.
    fn read_counter(source: CounterSource) -> u64;

    /// Program the down-counter (`TVAL`). `ticks` must fit in `i32`.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the kernel.
    unsafe fn set_timer_value(source: CounterSource, ticks: u32);

    /// Read the compare register (`CVAL`).
    fn compare_value(source: CounterSource) -> u64;

    /// Write the compare register (`CVAL`).
    ///
    /// # Safety
    ///
    /// Only meant to be called by the kernel.
    unsafe fn set_compare_value(source: CounterSource, value: u64);

    /// Read the control register.
    fn timer_control(source: CounterSource) -> TimerCtl;

    /// Write the control register.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the kernel.
    unsafe fn set_timer_control(source: CounterSource, ctl: TimerCtl);

    /// Wait for an event (`wfe`). Returning early is harmless.
    fn wait_for_event();

    /// Restart the hardware watchdog. Called on every scheduling tick, so a
    /// system that stops taking ticks gets reset.
    ///
    /// Does nothing by default.
    fn pet_watchdog() {}
}

/// A blocking byte sink for diagnostics.
pub trait PortConsole {
    /// Transmit one byte, waiting for the transmitter if needed.
    fn write_byte(byte: u8);
}

/// Compile-time kernel configuration.
pub trait KernelOptions {
    /// The number of ticks a task may run before the scheduler reconsiders.
    const QUANTUM_TICKS: u32 = 10;

    /// The period of the scheduling tick in nanoseconds. The tick owns the
    /// countdown timer of `TIMER_SOURCE` once the kernel is booted.
    const TICK_PERIOD_NS: u64 = 1_000_000;

    /// The counter used for time keeping and scheduling ticks.
    const TIMER_SOURCE: CounterSource = CounterSource::Physical;

    /// The GIC priority of the timer's interrupt line.
    const TIMER_INTERRUPT_PRIORITY: u8 = gic::PRIORITY_HIGHEST;

    /// The frequency substituted when the counter reports zero.
    const FALLBACK_FREQUENCY: u64 = 100_000_000;

    /// The smallest delta (ticks) that can be programmed reliably.
    const MIN_DELTA_TICKS: u64 = 0xf;

    /// The largest delta (ticks) accepted by `set_timeout`.
    const MAX_DELTA_TICKS: u64 = 0x7fff_ffff_ffff_ffff;
}

/// Everything the kernel needs from a port, bundled.
pub trait KernelTraits: PortThreading + PortTimer + PortConsole + KernelOptions {}

impl<T: PortThreading + PortTimer + PortConsole + KernelOptions> KernelTraits for T {}
