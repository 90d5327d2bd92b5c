//! The UART console and the `log` backend
//!
//! Nothing here uses exclusive loads or stores. The MMU is off, so all data
//! accesses are Device accesses, for which they aren't guaranteed to work.
use core::{
    fmt::Write,
    sync::atomic::{AtomicBool, Ordering},
};
use photon_kernel::PortConsole;

use crate::{threading::imp::interrupt_free, uart::Uart, SystemTraits, UartOptions};

// Safety: Only this module drives the console UART
static UART: Uart = unsafe { Uart::new(SystemTraits::UART_BASE) };

/// Set by [`init`] once `UART` is configured.
static CONSOLE_READY: AtomicBool = AtomicBool::new(false);

/// Run `f` with the console UART. Does nothing before [`init`].
///
/// IRQs are masked meanwhile, so lines from different contexts don't
/// interleave.
fn with_uart(f: impl FnOnce(&Uart)) {
    interrupt_free(|| {
        if CONSOLE_READY.load(Ordering::Relaxed) {
            f(&UART);
        }
    });
}

/// Configure the UART, then install the logger.
///
/// # Safety
///
/// Must be called once, by the boot context with IRQs masked, before
/// anything else touches the UART or the `log` facade.
pub unsafe fn init() {
    if UART
        .configure(SystemTraits::UART_REF_CLOCK, SystemTraits::UART_BAUD_RATE)
        .is_err()
    {
        // Nothing to report to yet
        return;
    }
    CONSOLE_READY.store(true, Ordering::Relaxed);

    // `set_logger` would need a compare-and-swap
    // Safety: Nothing else runs yet
    if unsafe { log::set_logger_racy(&Logger) }.is_ok() {
        log::set_max_level(SystemTraits::LOG_LEVEL);
    }
}

impl PortConsole for SystemTraits {
    fn write_byte(byte: u8) {
        with_uart(|uart| uart.write_u8(byte));
    }
}

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= SystemTraits::LOG_LEVEL
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        with_uart(|mut uart| {
            // `&Uart` never fails
            let _ = writeln!(
                uart,
                "[{level:5} {target}] {args}",
                level = record.level(),
                target = record.target(),
                args = record.args()
            );
        });
    }

    fn flush(&self) {
        with_uart(Uart::flush);
    }
}
