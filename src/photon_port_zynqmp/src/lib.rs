#![doc = include_str!("./lib.md")]
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// Task contexts don't include the FP/SIMD registers
#[cfg(all(target_os = "none", target_feature = "neon"))]
compile_error!("build for `aarch64-unknown-none-softfloat`; FP/SIMD registers are not preserved");

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[macro_use]
mod aarch64;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod console;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod exception;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod panic;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod timer;

/// The standard startup code.
#[doc(hidden)]
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod startup;

/// The thread management implementation for the AArch64 port.
#[doc(hidden)]
pub mod threading {
    pub mod cfg;
    #[cfg(all(target_arch = "aarch64", target_os = "none"))]
    pub mod imp;
}

pub mod uart;

pub use self::threading::cfg::TaskContext;

use photon_kernel::KernelOptions;

/// The system type of the ZynqMP port. Implements every port trait the
/// kernel needs.
pub struct SystemTraits;

/// The locations of the GIC-400 register blocks.
pub trait GicOptions {
    /// The base address of GIC distributor registers.
    const GIC_DISTRIBUTOR_BASE: usize;

    /// The base address of GIC CPU interface registers.
    const GIC_CPU_BASE: usize;
}

/// The system watchdog restarted on every scheduling tick.
pub trait WatchdogOptions {
    /// The base address of a Cadence SWDT, or `None` to leave the watchdog
    /// alone.
    const WATCHDOG_BASE: Option<usize>;
}

/// The configuration of the console UART.
pub trait UartOptions {
    /// The base address of the UART's register block.
    const UART_BASE: usize;

    /// The baud rate.
    const UART_BAUD_RATE: u32;

    /// The frequency of `uart_ref_clk` (Hz).
    const UART_REF_CLOCK: u32;

    /// The most verbose level forwarded to the console by the logger.
    const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
}

impl GicOptions for SystemTraits {
    const GIC_DISTRIBUTOR_BASE: usize = 0xf901_0000;
    const GIC_CPU_BASE: usize = 0xf902_0000;
}

impl WatchdogOptions for SystemTraits {
    // LPD SWDT
    const WATCHDOG_BASE: Option<usize> = Some(0xff15_0000);
}

impl UartOptions for SystemTraits {
    // UART0
    const UART_BASE: usize = 0xff01_0000;
    const UART_BAUD_RATE: u32 = 115_200;
    const UART_REF_CLOCK: u32 = 100_000_000;
}

impl KernelOptions for SystemTraits {}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
static STACKS: photon_kernel::StackPool = photon_kernel::StackPool::new();

/// The kernel instance.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub static KERNEL: photon_kernel::Kernel<SystemTraits> = photon_kernel::Kernel::new(
    // Safety: These are the GIC-400 of the APU, and only the kernel drives it
    unsafe {
        photon_kernel::Gic::new(
            SystemTraits::GIC_DISTRIBUTOR_BASE,
            SystemTraits::GIC_CPU_BASE,
        )
    },
    &STACKS,
);
