//! Diagnostic output and the kernel panic path
use core::{fmt, marker::PhantomData};

use crate::{PortConsole, PortThreading};

/// Implements [`core::fmt::Write`] on top of [`PortConsole::write_byte`].
/// Line feeds are sent as CR-LF.
pub struct Writer<Traits>(PhantomData<Traits>);

impl<Traits> Writer<Traits> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<Traits: PortConsole> fmt::Write for Writer<Traits> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            if b == b'\n' {
                Traits::write_byte(b'\r');
            }
            Traits::write_byte(b);
        }
        Ok(())
    }
}

/// Write formatted text to the console.
pub fn print<Traits: PortConsole>(args: fmt::Arguments<'_>) {
    // `Writer` never fails
    let _ = fmt::Write::write_fmt(&mut Writer::<Traits>::new(), args);
}

/// Report an unrecoverable kernel error on the console and stop the
/// processor.
pub fn kernel_panic<Traits: PortThreading + PortConsole>(reason: fmt::Arguments<'_>) -> ! {
    print::<Traits>(format_args!(
        "\n[KERNEL PANIC] SYSTEM HALTED: {reason}\n"
    ));
    print::<Traits>(format_args!(
        "CPU Core 0 Frozen. Please reset hardware via JTAG.\n"
    ));
    Traits::halt()
}
