//! The driver for the General Interrupt Controller (GICv2, GIC-400).
use core::fmt;
use tock_registers::{
    fields::FieldValue,
    interfaces::{ReadWriteable, Readable, Writeable},
};

use crate::error::InterruptLineError;

pub mod gic_regs;

/// Identifies an interrupt line (the GIC's interrupt ID).
pub type InterruptNum = usize;

/// The size of the interrupt ID space. IDs `1020..1024` are reserved.
pub const MAX_INTERRUPT_LINES: usize = 1024;

/// The number of interrupt IDs a GICv2 can implement.
pub const MAX_IMPLEMENTED_LINES: usize = 1020;

/// The interrupt ID `GICC_IAR` reports when nothing is pending.
pub const INTERRUPT_ID_SPURIOUS: InterruptNum = 1023;

/// The number of Software Generated Interrupts. SGIs occupy IDs `0..16`.
pub const NUM_SGIS: usize = 16;

/// The first Shared Peripheral Interrupt. IDs below this are private to each
/// core (SGIs and PPIs).
pub const FIRST_SPI: InterruptNum = 32;

pub const PRIORITY_HIGHEST: u8 = 0x00;
pub const PRIORITY_HIGH: u8 = 0x40;
pub const PRIORITY_MEDIUM: u8 = 0x80;
pub const PRIORITY_LOW: u8 = 0xc0;
pub const PRIORITY_LOWEST: u8 = 0xf0;

/// The priority every line gets from [`Gic::initialize`].
pub const PRIORITY_DEFAULT: u8 = PRIORITY_MEDIUM;

/// The CPU interface's priority mask. Lines at [`PRIORITY_LOWEST`] or below
/// are never signaled.
const PRIORITY_MASK: u32 = PRIORITY_LOWEST as u32;

/// `ITARGETSR` value routing four lines to CPU 0.
const TARGET_CPU0_X4: u32 = 0x0101_0101;

/// Specifies the type of signal transition that pends an interrupt.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum InterruptLineTriggerMode {
    /// Asserts an interrupt whenever the interrupt signal level is active and
    /// deasserts whenever the level is not active.
    Level = 0,
    /// Asserts an interrupt upon detection of a rising edge of an interrupt
    /// signal.
    RisingEdge = 1,
}

/// An interrupt that has been acknowledged but not completed yet.
///
/// Returned by [`Gic::acknowledge`] and consumed by
/// [`Gic::end_of_interrupt`], so each acknowledged interrupt is completed
/// exactly once.
#[must_use = "an acknowledged interrupt must be passed to `Gic::end_of_interrupt`"]
#[derive(PartialEq, Eq)]
pub struct PendingInterrupt {
    /// The `GICC_IAR` value, including the source CPU ID of SGIs.
    raw: u32,
}

impl PendingInterrupt {
    /// Get the interrupt ID.
    #[inline]
    pub fn line(&self) -> InterruptNum {
        (self.raw & 0x3ff) as InterruptNum
    }

    /// Get the CPU that requested this interrupt. Only meaningful for SGIs.
    #[inline]
    pub fn source_cpu(&self) -> u8 {
        ((self.raw >> 10) & 0x7) as u8
    }
}

impl fmt::Debug for PendingInterrupt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("PendingInterrupt").field(&self.line()).finish()
    }
}

/// A handle to a GIC's distributor and CPU interface.
///
/// The handle is stateless; everything lives in the registers.
pub struct Gic {
    distributor_base: usize,
    cpu_interface_base: usize,
}

impl fmt::Debug for Gic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Gic")
            .field("distributor_base", &format_args!("{:#x}", self.distributor_base))
            .field(
                "cpu_interface_base",
                &format_args!("{:#x}", self.cpu_interface_base),
            )
            .finish()
    }
}

impl Gic {
    /// Construct a handle from the base addresses of the register blocks.
    ///
    /// # Safety
    ///
    /// The addresses must point to a GIC distributor and CPU interface (or
    /// memory laid out like them) that stay accessible for the lifetime of
    /// the handle.
    pub const unsafe fn new(distributor_base: usize, cpu_interface_base: usize) -> Self {
        Self {
            distributor_base,
            cpu_interface_base,
        }
    }

    #[inline]
    fn distributor(&self) -> &gic_regs::GicDistributor {
        // Safety: Verified by the creator of `self`
        unsafe { &*(self.distributor_base as *const gic_regs::GicDistributor) }
    }

    #[inline]
    fn cpu_interface(&self) -> &gic_regs::GicCpuInterface {
        // Safety: Verified by the creator of `self`
        unsafe { &*(self.cpu_interface_base as *const gic_regs::GicCpuInterface) }
    }

    /// Bring up the distributor and then this core's CPU interface.
    pub fn initialize(&self) {
        self.init_distributor();
        self.init_cpu_interface();
    }

    /// Reset the distributor: every line disabled, not pending, non-secure,
    /// at [`PRIORITY_DEFAULT`], and (SPIs) routed to CPU 0.
    ///
    /// Must be called exactly once per boot.
    pub fn init_distributor(&self) {
        let distributor = self.distributor();
        let num_lines = self.num_lines();
        let num_words = num_lines.div_ceil(32);

        distributor.CTLR.write(gic_regs::GICD_CTLR::Enable::Disable);

        for i in 0..num_words {
            distributor.ICENABLER[i].set(!0);
            distributor.ICPENDR[i].set(!0);
            distributor.IGROUPR[i].set(!0);
        }

        for line in 0..num_lines {
            distributor.IPRIORITYR[line].set(PRIORITY_DEFAULT);
        }

        // `ITARGETSR[0..8]` (SGIs and PPIs) are read-only
        for i in FIRST_SPI / 4..num_lines.div_ceil(4) {
            distributor.ITARGETSR[i].set(TARGET_CPU0_X4);
        }

        distributor.CTLR.write(gic_regs::GICD_CTLR::Enable::Enable);

        log::debug!("GIC distributor up, {num_lines} interrupt lines");
    }

    /// Configure this core's CPU interface and start signaling interrupts.
    pub fn init_cpu_interface(&self) {
        let cpu_interface = self.cpu_interface();
        cpu_interface.PMR.set(PRIORITY_MASK);
        cpu_interface.BPR.set(0);
        cpu_interface
            .CTLR
            .modify(gic_regs::GICC_CTLR::Enable::Enable);
    }

    /// Get the number of interrupt IDs implemented by the distributor.
    pub fn num_lines(&self) -> InterruptNum {
        let raw = self
            .distributor()
            .TYPER
            .read(gic_regs::GICD_TYPER::ITLinesNumber);
        ((raw as usize + 1) * 32).min(MAX_IMPLEMENTED_LINES)
    }

    fn check_line(&self, line: InterruptNum) -> Result<(), InterruptLineError> {
        if line < self.num_lines() {
            Ok(())
        } else {
            Err(InterruptLineError::InvalidLine)
        }
    }

    /// Enable the specified line. Does nothing if it's already enabled.
    pub fn enable(&self, line: InterruptNum) -> Result<(), InterruptLineError> {
        if !self.is_enabled(line)? {
            self.distributor().ISENABLER[line / 32].set(1 << (line % 32));
        }
        Ok(())
    }

    /// Disable the specified line. Does nothing if it's already disabled.
    pub fn disable(&self, line: InterruptNum) -> Result<(), InterruptLineError> {
        if self.is_enabled(line)? {
            self.distributor().ICENABLER[line / 32].set(1 << (line % 32));
        }
        Ok(())
    }

    /// Get a flag indicating whether the specified line is enabled.
    pub fn is_enabled(&self, line: InterruptNum) -> Result<bool, InterruptLineError> {
        self.check_line(line)?;
        Ok(self.distributor().ISENABLER[line / 32].get() & (1 << (line % 32)) != 0)
    }

    /// Set the priority of the specified line. Lower values are more urgent.
    pub fn set_priority(&self, line: InterruptNum, priority: u8) -> Result<(), InterruptLineError> {
        self.check_line(line)?;
        self.distributor().IPRIORITYR[line].set(priority);
        Ok(())
    }

    /// Get the priority of the specified line.
    pub fn priority(&self, line: InterruptNum) -> Result<u8, InterruptLineError> {
        self.check_line(line)?;
        Ok(self.distributor().IPRIORITYR[line].get())
    }

    /// Set the set of CPUs an SPI is forwarded to. SGIs and PPIs have fixed
    /// targets and are rejected.
    pub fn set_target(&self, line: InterruptNum, cpu_mask: u8) -> Result<(), InterruptLineError> {
        self.check_line(line)?;
        if line < FIRST_SPI {
            return Err(InterruptLineError::InvalidLine);
        }

        self.distributor().ITARGETSR[line / 4].modify(FieldValue::<u32, ()>::new(
            0xff,
            (line % 4) * 8,
            cpu_mask as u32,
        ));
        Ok(())
    }

    /// Set the trigger mode of the specified line. SGIs don't support
    /// changing the trigger mode.
    pub fn set_trigger_mode(
        &self,
        line: InterruptNum,
        mode: InterruptLineTriggerMode,
    ) -> Result<(), InterruptLineError> {
        self.check_line(line)?;
        if line < NUM_SGIS {
            return Err(InterruptLineError::InvalidLine);
        }

        // `Int_config[1]` selects edge triggering; `Int_config[0]` is reserved
        self.distributor().ICFGR[line / 16].modify(FieldValue::<u32, ()>::new(
            0b10,
            (line % 16) * 2,
            mode as u32 * 2,
        ));
        Ok(())
    }

    /// Pend the specified line. SGIs are pended through [`Self::send_sgi`].
    pub fn set_pending(&self, line: InterruptNum) -> Result<(), InterruptLineError> {
        self.check_line(line)?;
        if line < NUM_SGIS {
            return Err(InterruptLineError::InvalidLine);
        }
        self.distributor().ISPENDR[line / 32].set(1 << (line % 32));
        Ok(())
    }

    /// Clear the pending state of the specified line.
    pub fn clear_pending(&self, line: InterruptNum) -> Result<(), InterruptLineError> {
        self.check_line(line)?;
        if line < NUM_SGIS {
            return Err(InterruptLineError::InvalidLine);
        }
        self.distributor().ICPENDR[line / 32].set(1 << (line % 32));
        Ok(())
    }

    /// Get a flag indicating whether the specified line is pending.
    pub fn is_pending(&self, line: InterruptNum) -> Result<bool, InterruptLineError> {
        self.check_line(line)?;
        Ok(self.distributor().ISPENDR[line / 32].get() & (1 << (line % 32)) != 0)
    }

    /// Send the SGI `line` to the CPUs in `cpu_mask`.
    pub fn send_sgi(&self, line: InterruptNum, cpu_mask: u8) -> Result<(), InterruptLineError> {
        if line >= NUM_SGIS {
            return Err(InterruptLineError::InvalidLine);
        }
        self.distributor().SGIR.write(
            gic_regs::GICD_SGIR::TargetListFilter::TargetList
                + gic_regs::GICD_SGIR::CPUTargetList.val(cpu_mask as u32)
                + gic_regs::GICD_SGIR::SGIINTID.val(line as u32),
        );
        Ok(())
    }

    /// Acknowledge the highest-priority pending interrupt.
    ///
    /// Returns `None` if the GIC reports a spurious or reserved ID. Such a
    /// result must not be followed by [`Self::end_of_interrupt`].
    pub fn acknowledge(&self) -> Option<PendingInterrupt> {
        let raw = self.cpu_interface().IAR.get();
        let pending = PendingInterrupt { raw };
        if pending.line() >= MAX_IMPLEMENTED_LINES {
            None
        } else {
            Some(pending)
        }
    }

    /// Signal the completion of an interrupt returned by
    /// [`Self::acknowledge`].
    pub fn end_of_interrupt(&self, pending: PendingInterrupt) {
        self.cpu_interface().EOIR.set(pending.raw);
    }
}
