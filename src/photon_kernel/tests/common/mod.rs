//! A simulated port for running the kernel on the host.
//!
//! Every test thread gets its own CPU Lock flag, interrupt context flag,
//! generic timer, and console, so tests can run in parallel. The GIC is
//! backed by plain memory owned by each [`TestSystem`].
#![allow(dead_code)]
use photon_kernel::{
    CounterSource, Gic, Init, KernelOptions, PortConsole, PortThreading, PortTimer, StackPool,
    StackRegion, TaskEntry, TaskId, TimerCtl, TASK_STACK_SIZE,
};
use std::cell::{Cell, RefCell};

pub type Kernel = photon_kernel::Kernel<TestTraits>;

pub struct TestTraits;

/// The counter frequency reported by the simulated timer unless a test
/// overrides it.
pub const DEFAULT_FREQUENCY: u64 = 100_000_000;

/// The interrupt lines the simulated distributor implements.
pub const NUM_LINES: usize = 96;

#[derive(Debug)]
pub struct TestContext {
    pub entry: Option<TaskEntry>,
    pub stack: Option<StackRegion>,
    /// Set when the context was seeded or saved.
    pub valid: bool,
}

impl Init for TestContext {
    const INIT: Self = Self {
        entry: None,
        stack: None,
        valid: false,
    };
}

#[derive(Debug, Clone, Copy)]
pub struct TimerRegs {
    pub frequency: u64,
    pub counter: u64,
    /// Added to the counter on every read, so busy-waits terminate.
    pub step: u64,
    pub ctl: [TimerCtl; 2],
    pub tval: [Option<u32>; 2],
    pub cval: [u64; 2],
    /// Virtual counter offset (`CNTVOFF`).
    pub virtual_offset: u64,
}

impl TimerRegs {
    const fn new() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            counter: 0,
            step: 0,
            ctl: [TimerCtl::empty(); 2],
            tval: [None; 2],
            cval: [0; 2],
            virtual_offset: 0,
        }
    }
}

fn source_index(source: CounterSource) -> usize {
    match source {
        CounterSource::Physical => 0,
        CounterSource::Virtual => 1,
    }
}

thread_local! {
    static CPU_LOCK: Cell<bool> = Cell::new(false);
    static IN_INTERRUPT: Cell<bool> = Cell::new(false);
    static IRQ_ENABLED: Cell<bool> = Cell::new(false);
    static CORRUPT_NEXT_CONTEXT: Cell<bool> = Cell::new(false);
    static SWITCHES: RefCell<Vec<(Option<StackRegion>, Option<StackRegion>)>> =
        RefCell::new(Vec::new());
    static TIMER: RefCell<TimerRegs> = RefCell::new(TimerRegs::new());
    static CONSOLE: RefCell<Vec<u8>> = RefCell::new(Vec::new());
    static WATCHDOG_PETS: Cell<usize> = Cell::new(0);
}

unsafe impl PortThreading for TestTraits {
    type TaskContext = TestContext;

    fn initialize_context(context: &mut Self::TaskContext, entry: TaskEntry, stack: StackRegion) {
        context.entry = Some(entry);
        context.stack = Some(stack);
        context.valid = !CORRUPT_NEXT_CONTEXT.with(|c| c.replace(false));
    }

    fn is_context_valid(context: &Self::TaskContext) -> bool {
        context.valid
    }

    unsafe fn switch_context(prev: *mut Self::TaskContext, next: *const Self::TaskContext) {
        assert!(Self::is_cpu_lock_active());
        assert_ne!(prev as *const _, next);
        // Safety: The kernel passes live contexts
        let (prev, next) = unsafe { (&mut *prev, &*next) };
        prev.valid = true;
        SWITCHES.with(|s| s.borrow_mut().push((prev.stack, next.stack)));
        // The host thread carries on as `next`
    }

    unsafe fn try_enter_cpu_lock() -> bool {
        !CPU_LOCK.with(|l| l.replace(true))
    }

    unsafe fn leave_cpu_lock() {
        assert!(CPU_LOCK.with(|l| l.replace(false)));
    }

    fn is_cpu_lock_active() -> bool {
        CPU_LOCK.with(Cell::get)
    }

    fn is_interrupt_context() -> bool {
        IN_INTERRUPT.with(Cell::get)
    }

    unsafe fn enable_interrupts() {
        IRQ_ENABLED.with(|e| e.set(true));
    }

    fn wait_for_interrupt() {
        advance_counter(1_000);
    }

    fn halt() -> ! {
        panic!("processor halted");
    }
}

impl PortTimer for TestTraits {
    fn counter_frequency() -> u64 {
        TIMER.with(|t| t.borrow().frequency)
    }

    unsafe fn set_counter_frequency(hz: u64) {
        TIMER.with(|t| t.borrow_mut().frequency = hz);
    }

    fn read_counter(source: CounterSource) -> u64 {
        TIMER.with(|t| {
            let mut t = t.borrow_mut();
            let value = t.counter;
            t.counter = t.counter.wrapping_add(t.step);
            match source {
                CounterSource::Physical => value,
                CounterSource::Virtual => value.wrapping_sub(t.virtual_offset),
            }
        })
    }

    unsafe fn set_timer_value(source: CounterSource, ticks: u32) {
        TIMER.with(|t| {
            let mut t = t.borrow_mut();
            let i = source_index(source);
            t.tval[i] = Some(ticks);
            t.cval[i] = t.counter.wrapping_add(ticks as u64);
            // The new deadline is in the future
            t.ctl[i] -= TimerCtl::ISTATUS;
        });
    }

    fn compare_value(source: CounterSource) -> u64 {
        TIMER.with(|t| t.borrow().cval[source_index(source)])
    }

    unsafe fn set_compare_value(source: CounterSource, value: u64) {
        TIMER.with(|t| {
            let mut t = t.borrow_mut();
            let i = source_index(source);
            t.tval[i] = None;
            t.cval[i] = value;
            t.ctl[i] -= TimerCtl::ISTATUS;
        });
    }

    fn timer_control(source: CounterSource) -> TimerCtl {
        TIMER.with(|t| t.borrow().ctl[source_index(source)])
    }

    unsafe fn set_timer_control(source: CounterSource, ctl: TimerCtl) {
        TIMER.with(|t| {
            let mut t = t.borrow_mut();
            let i = source_index(source);
            // ISTATUS is read-only
            let istatus = t.ctl[i] & TimerCtl::ISTATUS;
            t.ctl[i] = (ctl - TimerCtl::ISTATUS) | istatus;
        });
    }

    fn wait_for_event() {
        advance_counter(1_000);
    }

    fn pet_watchdog() {
        WATCHDOG_PETS.with(|p| p.set(p.get() + 1));
    }
}

impl PortConsole for TestTraits {
    fn write_byte(byte: u8) {
        CONSOLE.with(|c| c.borrow_mut().push(byte));
    }
}

impl KernelOptions for TestTraits {
    const QUANTUM_TICKS: u32 = 4;
}

// ---------------------------------------------------------------------------
// Test controls

pub fn timer_regs() -> TimerRegs {
    TIMER.with(|t| *t.borrow())
}

pub fn with_timer_regs<R>(f: impl FnOnce(&mut TimerRegs) -> R) -> R {
    TIMER.with(|t| f(&mut t.borrow_mut()))
}

pub fn advance_counter(ticks: u64) {
    with_timer_regs(|t| t.counter = t.counter.wrapping_add(ticks));
}

/// Make the timer condition true for the timer at `source`.
pub fn fire_timer(source: CounterSource) {
    with_timer_regs(|t| t.ctl[source_index(source)] |= TimerCtl::ISTATUS);
}

/// Clear the timer condition, as reprogramming the deadline would.
pub fn clear_timer_condition(source: CounterSource) {
    with_timer_regs(|t| t.ctl[source_index(source)] -= TimerCtl::ISTATUS);
}

/// Run `f` as an interrupt handler.
pub fn in_interrupt<R>(f: impl FnOnce() -> R) -> R {
    assert!(!IN_INTERRUPT.with(|i| i.replace(true)));
    let ret = f();
    IN_INTERRUPT.with(|i| i.set(false));
    ret
}

pub fn irq_enabled() -> bool {
    IRQ_ENABLED.with(Cell::get)
}

pub fn cpu_lock_active() -> bool {
    CPU_LOCK.with(Cell::get)
}

/// Make the next seeded task context invalid.
pub fn corrupt_next_context() {
    CORRUPT_NEXT_CONTEXT.with(|c| c.set(true));
}

pub fn watchdog_pets() -> usize {
    WATCHDOG_PETS.with(Cell::get)
}

pub fn take_console_output() -> String {
    CONSOLE.with(|c| String::from_utf8_lossy(&std::mem::take(&mut *c.borrow_mut())).into_owned())
}

static STACKS: StackPool = StackPool::new();

/// Map a stack region back to the task owning it. The idle task has none.
fn owner_of(stack: Option<StackRegion>) -> TaskId {
    match stack {
        None => TaskId::IDLE,
        Some(region) => {
            let base = STACKS.region(TaskId::IDLE).base;
            TaskId::new((region.base - base) / TASK_STACK_SIZE).unwrap()
        }
    }
}

/// Get and clear the context switches performed so far, as
/// `(outgoing, incoming)` pairs.
pub fn take_switches() -> Vec<(TaskId, TaskId)> {
    SWITCHES.with(|s| {
        std::mem::take(&mut *s.borrow_mut())
            .into_iter()
            .map(|(prev, next)| (owner_of(prev), owner_of(next)))
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Simulated GIC

const GICD_TYPER: usize = 0x004 / 4;
pub const GICD_ISENABLER: usize = 0x100 / 4;
pub const GICD_IPRIORITYR: usize = 0x400 / 4;
pub const GICC_IAR: usize = 0x0c / 4;
pub const GICC_EOIR: usize = 0x10 / 4;

#[repr(C, align(4096))]
pub struct GicMemory {
    distributor: [u32; 1024],
    cpu_interface: [u32; 1024],
}

/// A kernel instance running on the calling thread.
pub struct TestSystem {
    pub kernel: &'static Kernel,
    gic: *mut GicMemory,
}

impl TestSystem {
    /// Construct a kernel. Call [`Self::boot`] to bring it up.
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        // Reset the thread-local hardware in case the test harness reuses
        // this thread
        CPU_LOCK.with(|l| l.set(false));
        IN_INTERRUPT.with(|i| i.set(false));
        IRQ_ENABLED.with(|e| e.set(false));
        CORRUPT_NEXT_CONTEXT.with(|c| c.set(false));
        SWITCHES.with(|s| s.borrow_mut().clear());
        TIMER.with(|t| *t.borrow_mut() = TimerRegs::new());
        CONSOLE.with(|c| c.borrow_mut().clear());
        WATCHDOG_PETS.with(|p| p.set(0));

        let gic = Box::into_raw(Box::new(GicMemory {
            distributor: [0; 1024],
            cpu_interface: [0; 1024],
        }));
        // Safety: `gic` is leaked, so it lives forever
        unsafe {
            (*gic).distributor[GICD_TYPER] = (NUM_LINES / 32 - 1) as u32;
        }
        let gic_handle = unsafe {
            Gic::new(
                (*gic).distributor.as_ptr() as usize,
                (*gic).cpu_interface.as_ptr() as usize,
            )
        };

        let kernel = Box::leak(Box::new(Kernel::new(gic_handle, &STACKS)));
        Self { kernel, gic }
    }

    /// Construct and boot a kernel.
    pub fn booted() -> Self {
        let system = Self::new();
        // Safety: This is the boot context
        unsafe { system.kernel.boot() }.unwrap();
        system
    }

    pub fn distributor_word(&self, word: usize) -> u32 {
        unsafe { std::ptr::read_volatile(&(*self.gic).distributor[word]) }
    }

    pub fn cpu_interface_word(&self, word: usize) -> u32 {
        unsafe { std::ptr::read_volatile(&(*self.gic).cpu_interface[word]) }
    }

    pub fn set_cpu_interface_word(&self, word: usize, value: u32) {
        unsafe { std::ptr::write_volatile(&mut (*self.gic).cpu_interface[word], value) };
    }

    /// Make `GICC_IAR` report `line` and take an IRQ.
    pub fn raise_irq(&self, iar: u32) {
        self.set_cpu_interface_word(GICC_IAR, iar);
        in_interrupt(|| unsafe { self.kernel.handle_irq() });
    }
}

pub extern "C" fn task_body() {}
