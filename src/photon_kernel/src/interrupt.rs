//! Interrupt dispatch
use crate::{
    error::RegisterInterruptHandlerError,
    gic::{InterruptNum, MAX_INTERRUPT_LINES},
    klock::{self, CpuLockCell},
    utils::Init,
    Kernel, KernelTraits, PortThreading,
};

/// An interrupt handler. Receives the kernel and the line being serviced.
///
/// Handlers run with IRQs masked. They must complete in bounded time, and
/// any scheduling request they make takes effect after they return.
pub type InterruptHandlerFn<Traits> = fn(&Kernel<Traits>, InterruptNum);

/// Maps each interrupt ID to its handler.
pub(crate) struct InterruptTable<Traits: PortThreading> {
    handlers: CpuLockCell<Traits, [Option<InterruptHandlerFn<Traits>>; MAX_INTERRUPT_LINES]>,
}

impl<Traits: PortThreading> Init for InterruptTable<Traits> {
    const INIT: Self = Self {
        handlers: Init::INIT,
    };
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Register the handler for `line`, replacing the previous one.
    ///
    /// This doesn't enable the line in the GIC.
    pub fn register_interrupt_handler(
        &self,
        line: InterruptNum,
        handler: InterruptHandlerFn<Traits>,
    ) -> Result<(), RegisterInterruptHandlerError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        if line >= self.gic.num_lines() {
            return Err(RegisterInterruptHandlerError::InvalidLine);
        }

        self.interrupts.handlers.write(&mut *lock)[line] = Some(handler);
        log::trace!("registered a handler for line {line}");
        Ok(())
    }

    /// The IRQ dispatcher.
    ///
    /// Acknowledges the pending interrupt, calls its handler, completes the
    /// interrupt, and then carries out the dispatch requested by the handler,
    /// if any. Spurious interrupts are ignored without completing them.
    ///
    /// # Safety
    ///
    /// Only meant to be called by the port's IRQ entry, with IRQs masked and
    /// CPU Lock inactive.
    pub unsafe fn handle_irq(&self) {
        let Some(pending) = self.gic.acknowledge() else {
            return;
        };
        let line = pending.line();

        let handler = match klock::lock_cpu::<Traits>() {
            Ok(lock) => self.interrupts.handlers.read(&*lock)[line],
            Err(_) => None,
        };

        match handler {
            Some(handler) => handler(self, line),
            None => unhandled_interrupt(line),
        }

        self.gic.end_of_interrupt(pending);

        // Switch tasks only after the GIC has seen the EOI. Otherwise the
        // line would stay active until this task is resumed.
        if let Ok(mut lock) = klock::lock_cpu::<Traits>() {
            if self.scheduler.take_dispatch_pending(lock.borrow_mut()) {
                self.dispatch(lock);
            }
        }
    }
}

fn unhandled_interrupt(line: InterruptNum) {
    log::debug!("unhandled interrupt on line {line}");
}
