use core::fmt;

use crate::{
    error::BootError,
    gic::Gic,
    interrupt::InterruptTable,
    task::{SchedulerState, StackPool},
    timer::{self, TimerGlobals},
    utils::Init,
    KernelTraits, PortThreading,
};

/// The kernel instance. A port keeps exactly one of these in a `static`.
///
/// ```rust,ignore
/// static STACKS: StackPool = StackPool::new();
/// static KERNEL: Kernel<SystemTraits> =
///     Kernel::new(unsafe { Gic::new(0xf901_0000, 0xf902_0000) }, &STACKS);
/// ```
pub struct Kernel<Traits: PortThreading> {
    pub(crate) gic: Gic,
    pub(crate) stacks: &'static StackPool,
    pub(crate) scheduler: SchedulerState<Traits>,
    pub(crate) timer: TimerGlobals<Traits>,
    pub(crate) interrupts: InterruptTable<Traits>,
}

// Safety: Every mutable part is a `CpuLockCell` or is only touched while the
//         CPU Lock token is held. There's only one processor.
unsafe impl<Traits: PortThreading> Sync for Kernel<Traits> {}

impl<Traits: PortThreading> Kernel<Traits> {
    pub const fn new(gic: Gic, stacks: &'static StackPool) -> Self {
        Self {
            gic,
            stacks,
            scheduler: Init::INIT,
            timer: Init::INIT,
            interrupts: Init::INIT,
        }
    }

    /// Get the interrupt controller.
    #[inline]
    pub fn gic(&self) -> &Gic {
        &self.gic
    }
}

impl<Traits: PortThreading> fmt::Debug for Kernel<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("gic", &self.gic)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Bring the kernel up: GIC, timer, scheduler, then the first scheduling
    /// tick. IRQs are unmasked last.
    ///
    /// On return, the caller is the idle task.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, by the boot context, before any other
    /// method of `self`.
    pub unsafe fn boot(&self) -> Result<(), BootError> {
        self.gic.initialize();
        self.init_timer()?;
        self.init_scheduler()?;

        self.register_interrupt_handler(
            Traits::TIMER_SOURCE.interrupt_num(),
            timer::timer_interrupt_handler::<Traits>,
        )?;
        self.rearm_timeout(Traits::TICK_PERIOD_NS)?;

        // Safety: The GIC and the timer handler are ready
        unsafe { Traits::enable_interrupts() };

        log::info!("kernel up, tick period {} ns", Traits::TICK_PERIOD_NS);
        Ok(())
    }
}
