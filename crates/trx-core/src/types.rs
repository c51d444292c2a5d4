//! Core types used throughout trx.
//!
//! These types describe samples and time on both sides of the rate
//! converter: 16-bit integer IQ pairs at the device's native rate, and
//! 32-bit float complex samples at the baseband rate.

use std::fmt;
use std::str::FromStr;

use num_complex::Complex32;

/// Sample counter at the device's native rate.
///
/// Timestamp `n` names the `n`-th sample since the device clock was zeroed
/// at `start()`. Convert to seconds with [`timestamp_to_secs`].
pub type Timestamp = u64;

/// Convert a device timestamp to seconds at `rate_hz`.
pub fn timestamp_to_secs(ticks: Timestamp, rate_hz: f64) -> f64 {
    ticks as f64 / rate_hz
}

/// Convert a duration in seconds to the nearest device timestamp at `rate_hz`.
///
/// Negative inputs clamp to zero.
pub fn secs_to_timestamp(secs: f64, rate_hz: f64) -> Timestamp {
    (secs * rate_hz).round().max(0.0) as Timestamp
}

// ---------------------------------------------------------------------------
// IqSample
// ---------------------------------------------------------------------------

/// One device-side IQ sample: interleaved signed 16-bit in-phase and
/// quadrature components, as carried in the peripheral's packets.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IqSample {
    pub i: i16,
    pub q: i16,
}

impl IqSample {
    /// The all-zero sample.
    pub const ZERO: IqSample = IqSample { i: 0, q: 0 };

    pub const fn new(i: i16, q: i16) -> Self {
        IqSample { i, q }
    }

    /// Widen to a baseband complex sample. Lossless.
    pub fn to_complex(self) -> Complex32 {
        Complex32::new(f32::from(self.i), f32::from(self.q))
    }

    /// Narrow a baseband complex sample, rounding to nearest and saturating
    /// at the `i16` range.
    pub fn from_complex_saturating(c: Complex32) -> Self {
        IqSample {
            i: saturate(c.re),
            q: saturate(c.im),
        }
    }
}

fn saturate(v: f32) -> i16 {
    // `as` saturates for floats and maps NaN to zero.
    v.round() as i16
}

impl From<IqSample> for Complex32 {
    fn from(s: IqSample) -> Self {
        s.to_complex()
    }
}

// ---------------------------------------------------------------------------
// SampleRate
// ---------------------------------------------------------------------------

/// An exact sample rate in hertz, stored as a reduced fraction.
///
/// GSM baseband runs at 1625/6 kHz, which has no exact `f64`
/// representation, so rate ratios are computed on the fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleRate {
    num: u64,
    den: u64,
}

impl SampleRate {
    /// 400 kHz, the default peripheral streaming rate.
    pub const DEVICE_DEFAULT: SampleRate = SampleRate { num: 400_000, den: 1 };

    /// GSM symbol rate, 13 MHz / 48 = 1625/6 kHz.
    pub const GSM_SYMBOL: SampleRate = SampleRate { num: 812_500, den: 3 };

    /// A rate of `num / den` hertz. Returns `None` if either term is zero.
    pub fn new(num: u64, den: u64) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let g = gcd(u128::from(num), u128::from(den)) as u64;
        Some(SampleRate {
            num: num / g,
            den: den / g,
        })
    }

    /// An integral rate in hertz. Returns `None` for zero.
    pub fn hz(hz: u64) -> Option<Self> {
        Self::new(hz, 1)
    }

    pub fn numerator(&self) -> u64 {
        self.num
    }

    pub fn denominator(&self) -> u64 {
        self.den
    }

    /// The rate as floating-point hertz, for device calls and time conversion.
    pub fn as_hz(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{} Hz", self.num)
        } else {
            write!(f, "{}/{} Hz", self.num, self.den)
        }
    }
}

/// Error returned when parsing a [`SampleRate`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sample rate: {0}")]
pub struct ParseRateError(String);

impl FromStr for SampleRate {
    type Err = ParseRateError;

    /// Parses `"400000"` or `"1625000/6"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s, "1"),
        };
        let num: u64 = num.parse().map_err(|_| ParseRateError(s.to_string()))?;
        let den: u64 = den.parse().map_err(|_| ParseRateError(s.to_string()))?;
        SampleRate::new(num, den).ok_or_else(|| ParseRateError(s.to_string()))
    }
}

/// Greatest common divisor (Euclid). Wide enough for products of two rate
/// terms.
pub fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

// ---------------------------------------------------------------------------
// Device-facing descriptors
// ---------------------------------------------------------------------------

/// Signal direction on the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to antenna.
    Tx,
    /// Antenna to host.
    Rx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Tx => write!(f, "tx"),
            Direction::Rx => write!(f, "rx"),
        }
    }
}

/// Burst markers attached to a timed transmit packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstFlags {
    /// First packet of a new burst; the device re-anchors transmit timing.
    pub start_of_burst: bool,
    /// Last packet of a burst.
    pub end_of_burst: bool,
}

impl BurstFlags {
    /// A packet in the middle of a burst.
    pub const CONTINUATION: BurstFlags = BurstFlags {
        start_of_burst: false,
        end_of_burst: false,
    };

    /// The packet that opens a burst.
    pub const START: BurstFlags = BurstFlags {
        start_of_burst: true,
        end_of_burst: false,
    };
}

/// Gain range supported by one direction of the device, in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRange {
    pub min_db: f64,
    pub max_db: f64,
}

impl GainRange {
    pub fn midpoint(&self) -> f64 {
        (self.min_db + self.max_db) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iq_sample_widen() {
        let c = IqSample::new(-32768, 32767).to_complex();
        assert_eq!(c.re, -32768.0);
        assert_eq!(c.im, 32767.0);
    }

    #[test]
    fn iq_sample_narrow_rounds_and_saturates() {
        assert_eq!(
            IqSample::from_complex_saturating(Complex32::new(1.6, -1.6)),
            IqSample::new(2, -2)
        );
        assert_eq!(
            IqSample::from_complex_saturating(Complex32::new(1.0e6, -1.0e6)),
            IqSample::new(i16::MAX, i16::MIN)
        );
        assert_eq!(
            IqSample::from_complex_saturating(Complex32::new(f32::NAN, 0.0)),
            IqSample::ZERO
        );
    }

    #[test]
    fn named_rates_are_reduced() {
        assert_eq!(SampleRate::GSM_SYMBOL, SampleRate::new(1_625_000, 6).unwrap());
        assert_eq!(SampleRate::DEVICE_DEFAULT, SampleRate::hz(400_000).unwrap());
    }

    #[test]
    fn sample_rate_reduces() {
        let r = SampleRate::new(1_625_000, 6).unwrap();
        assert_eq!(r.numerator(), 812_500);
        assert_eq!(r.denominator(), 3);
        assert!((r.as_hz() - 270_833.333_333).abs() < 1e-3);
    }

    #[test]
    fn sample_rate_rejects_zero() {
        assert!(SampleRate::new(0, 1).is_none());
        assert!(SampleRate::new(1, 0).is_none());
        assert!(SampleRate::hz(0).is_none());
    }

    #[test]
    fn sample_rate_parse() {
        assert_eq!(
            "400000".parse::<SampleRate>().unwrap(),
            SampleRate::hz(400_000).unwrap()
        );
        assert_eq!(
            "1625000/6".parse::<SampleRate>().unwrap(),
            SampleRate::new(1_625_000, 6).unwrap()
        );
        assert!("abc".parse::<SampleRate>().is_err());
        assert!("5/0".parse::<SampleRate>().is_err());
    }

    #[test]
    fn sample_rate_display() {
        assert_eq!(SampleRate::hz(400_000).unwrap().to_string(), "400000 Hz");
        assert_eq!(
            SampleRate::new(1_625_000, 6).unwrap().to_string(),
            "812500/3 Hz"
        );
    }

    #[test]
    fn timestamp_conversion() {
        assert_eq!(timestamp_to_secs(400_000, 400_000.0), 1.0);
        assert_eq!(secs_to_timestamp(0.00005, 400_000.0), 20);
        assert_eq!(secs_to_timestamp(-1.0, 400_000.0), 0);
    }

    #[test]
    fn gcd_basic() {
        assert_eq!(gcd(400_000, 270_000), 10_000);
        assert_eq!(gcd(7, 0), 7);
        // Products of two u64 rate terms stay exact.
        assert_eq!(gcd(u128::from(u64::MAX) * 6, 4), 2);
    }

    #[test]
    fn gain_range_midpoint() {
        let r = GainRange {
            min_db: 0.0,
            max_db: 31.5,
        };
        assert_eq!(r.midpoint(), 15.75);
    }
}
