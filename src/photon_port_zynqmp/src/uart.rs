//! The Cadence UART driver
use core::fmt;
use tock_registers::interfaces::{Readable, Writeable};

mod uart_regs;
use self::uart_regs::{UartRegs, BAUDDIV, BAUDGEN, CR, MR, SR};

/// The valid range of the baud rate divider (`BAUDDIV.BDIV`).
const BDIV_RANGE: core::ops::RangeInclusive<u32> = 4..=254;

/// The valid range of the baud rate clock divisor (`BAUDGEN.CD`).
const CD_RANGE: core::ops::RangeInclusive<u32> = 1..=65535;

/// The number of spin iterations given to the FIFO reset to complete.
const RESET_SPIN_ITERATIONS: u32 = 1000;

/// The divisor pair producing a baud rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaudDivisors {
    /// `BAUDGEN.CD`
    pub cd: u32,
    /// `BAUDDIV.BDIV`
    pub bdiv: u32,
}

impl BaudDivisors {
    /// Find the divisors approximating `baud_rate` most closely.
    ///
    /// The generated rate is `ref_clock / (cd * (bdiv + 1))`. Returns `None`
    /// if no divisor pair is in range.
    pub fn find(ref_clock: u32, baud_rate: u32) -> Option<Self> {
        if baud_rate == 0 {
            return None;
        }

        let mut best: Option<(u32, Self)> = None;
        for bdiv in BDIV_RANGE {
            let cd = ref_clock / baud_rate.saturating_mul(bdiv + 1);
            if !CD_RANGE.contains(&cd) {
                continue;
            }

            let actual = ref_clock / (cd * (bdiv + 1));
            let error = actual.abs_diff(baud_rate);
            // Ties keep the smaller `bdiv`
            if best.map_or(true, |(best_error, _)| error < best_error) {
                best = Some((error, Self { cd, bdiv }));
            }
        }
        best.map(|(_, divisors)| divisors)
    }

    /// The baud rate actually produced from `ref_clock`.
    pub fn baud_rate(&self, ref_clock: u32) -> u32 {
        ref_clock / (self.cd * (self.bdiv + 1))
    }
}

/// Error type for [`Uart::configure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsupportedBaudRate;

/// A Cadence UART controller used as a polled transmitter.
///
/// Only the base address is stored, so a `Uart` can be built in a `static`.
pub struct Uart {
    base: usize,
}

impl Uart {
    /// Construct a `Uart`.
    ///
    /// # Safety
    ///
    /// `base` must point to the register block of a Cadence UART, which must
    /// not be driven by any other code.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[inline]
    fn regs(&self) -> &UartRegs {
        // Safety: Verified by the creator of `self`
        unsafe { &*(self.base as *const UartRegs) }
    }

    /// Reset the controller and configure it for 8N1 at `baud_rate`. TX and
    /// RX are enabled on return.
    pub fn configure(&self, ref_clock: u32, baud_rate: u32) -> Result<(), UnsupportedBaudRate> {
        let divisors = BaudDivisors::find(ref_clock, baud_rate).ok_or(UnsupportedBaudRate)?;
        let regs = self.regs();

        regs.CR.write(CR::TX_DIS::SET + CR::RX_DIS::SET);
        regs.MR.write(
            MR::CHMODE::Normal + MR::NBSTOP::One + MR::PAR::NoParity + MR::CHRL::EightBits,
        );
        regs.BAUDGEN.write(BAUDGEN::CD.val(divisors.cd));
        regs.BAUDDIV.write(BAUDDIV::BDIV.val(divisors.bdiv));

        regs.CR.write(CR::TXRST::SET + CR::RXRST::SET);
        for _ in 0..RESET_SPIN_ITERATIONS {
            if !regs.CR.is_set(CR::TXRST) && !regs.CR.is_set(CR::RXRST) {
                break;
            }
            core::hint::spin_loop();
        }

        regs.RXWM.set(1);
        regs.TXWM.set(32);
        regs.CR.write(CR::TX_EN::SET + CR::RX_EN::SET + CR::TORST::SET);
        Ok(())
    }

    /// Transmit a byte, waiting while the transmitter FIFO is full.
    #[inline]
    pub fn write_u8(&self, byte: u8) {
        while self.regs().SR.is_set(SR::TXFULL) {
            core::hint::spin_loop();
        }
        self.regs().FIFO.set(byte as u32);
    }

    /// Receive a byte if one is available.
    pub fn read_u8(&self) -> Option<u8> {
        if self.regs().SR.is_set(SR::RXEMPTY) {
            None
        } else {
            Some(self.regs().FIFO.get() as u8)
        }
    }

    /// Wait until every queued byte has been shifted out.
    pub fn flush(&self) {
        while !self.regs().SR.is_set(SR::TXEMPTY) {
            core::hint::spin_loop();
        }
    }
}

impl fmt::Write for &Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            if b == b'\n' {
                self.write_u8(b'\r');
            }
            self.write_u8(b);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The console keeps its `Uart` in a `static`
    static CONSOLE: Uart = unsafe { Uart::new(0xff01_0000) };

    #[test]
    fn polled_io() {
        assert_eq!(CONSOLE.base, 0xff01_0000);

        let mut block = vec![0u32; 32];
        let words = block.as_mut_ptr();
        let uart = unsafe { Uart::new(words as usize) };
        let word = |offset: usize| unsafe { words.add(offset / 4) };

        uart.write_u8(b'x');
        assert_eq!(unsafe { word(0x30).read_volatile() }, b'x' as u32);

        unsafe { word(0x2c).write_volatile(1 << 1) }; // RXEMPTY
        assert_eq!(uart.read_u8(), None);
        unsafe { word(0x2c).write_volatile(0) };
        assert_eq!(uart.read_u8(), Some(b'x'));
    }

    #[test]
    fn console_baud_rate() {
        let divisors = BaudDivisors::find(100_000_000, 115_200).unwrap();
        assert_eq!(divisors, BaudDivisors { cd: 124, bdiv: 6 });
        assert_eq!(divisors.baud_rate(100_000_000), 115_207);
    }

    #[test]
    fn exact_baud_rate() {
        let divisors = BaudDivisors::find(100_000_000, 9600).unwrap();
        assert_eq!(divisors, BaudDivisors { cd: 1736, bdiv: 5 });
        assert_eq!(divisors.baud_rate(100_000_000), 9600);
    }

    #[test]
    fn divisors_stay_in_range() {
        for baud_rate in [300, 1200, 4800, 19_200, 57_600, 230_400, 460_800, 921_600] {
            let divisors = BaudDivisors::find(100_000_000, baud_rate).unwrap();
            assert!(BDIV_RANGE.contains(&divisors.bdiv), "{baud_rate}");
            assert!(CD_RANGE.contains(&divisors.cd), "{baud_rate}");
            let actual = divisors.baud_rate(100_000_000);
            // Within 2%
            assert!(actual.abs_diff(baud_rate) * 50 <= baud_rate, "{baud_rate} -> {actual}");
        }
    }

    #[test]
    fn unreachable_baud_rates() {
        assert_eq!(BaudDivisors::find(100_000_000, 0), None);
        // `cd` would be zero for every `bdiv`
        assert_eq!(BaudDivisors::find(100_000_000, 50_000_000), None);
        // `cd` would exceed 16 bits for every `bdiv`
        assert_eq!(BaudDivisors::find(100_000_000, 1), None);
    }
}
