//! Conversion between counter ticks and wall-clock units.
use num_integer::Integer;

use crate::utils::Init;

const NS_PER_SEC: u64 = 1_000_000_000;
const US_PER_SEC: u64 = 1_000_000;

/// A reduced ratio `unit / tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Ratio {
    units: u64,
    ticks: u64,
}

impl Ratio {
    fn new(units_per_sec: u64, ticks_per_sec: u64) -> Self {
        let gcd = units_per_sec.gcd(&ticks_per_sec);
        Self {
            units: units_per_sec / gcd,
            ticks: ticks_per_sec / gcd,
        }
    }

    fn to_units(self, ticks: u64) -> u64 {
        muldiv(ticks, self.units, self.ticks)
    }

    fn to_ticks(self, units: u64) -> u64 {
        muldiv(units, self.ticks, self.units)
    }
}

/// `x * mul / div`, rounded down and saturated. A zero divisor yields zero.
#[inline]
fn muldiv(x: u64, mul: u64, div: u64) -> u64 {
    match (x as u128 * mul as u128).checked_div(div as u128) {
        Some(q) => q.min(u64::MAX as u128) as u64,
        None => 0,
    }
}

/// Converts between counter ticks and nanoseconds/microseconds for a fixed
/// counter frequency.
///
/// The ratios are reduced by their GCD, so the intermediate products only
/// overflow `u64` for durations that would overflow the result anyway; the
/// product is computed in `u128` regardless and the result saturates at
/// `u64::MAX`.
///
/// Results round toward zero. For frequencies up to 1 GHz,
/// `ns_to_ticks(ticks_to_ns(x))` is `x` or `x - 1`, and exactly `x` when the
/// frequency divides 10⁹.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickConverter {
    frequency: u64,
    ns: Ratio,
    us: Ratio,
}

impl Init for TickConverter {
    /// A converter for an unknown frequency. Every conversion yields zero.
    const INIT: Self = Self {
        frequency: 0,
        ns: Ratio { units: 0, ticks: 0 },
        us: Ratio { units: 0, ticks: 0 },
    };
}

impl TickConverter {
    /// Construct a converter for a counter running at `frequency` Hz.
    /// `frequency` must be non-zero.
    pub fn new(frequency: u64) -> Self {
        debug_assert_ne!(frequency, 0);
        Self {
            frequency,
            ns: Ratio::new(NS_PER_SEC, frequency),
            us: Ratio::new(US_PER_SEC, frequency),
        }
    }

    /// Get the counter frequency in Hz.
    #[inline]
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn ticks_to_ns(&self, ticks: u64) -> u64 {
        self.ns.to_units(ticks)
    }

    pub fn ns_to_ticks(&self, ns: u64) -> u64 {
        self.ns.to_ticks(ns)
    }

    pub fn ticks_to_us(&self, ticks: u64) -> u64 {
        self.us.to_units(ticks)
    }

    pub fn us_to_ticks(&self, us: u64) -> u64 {
        self.us.to_ticks(us)
    }
}
