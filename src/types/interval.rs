//! PostgreSQL `interval` (OID 1186).
use std::fmt;

use bytes::{Buf, BufMut};

/// `(microseconds, days, months)`, range-checked to the bounds the binary
/// wire format can carry (each field is an independent `i64`/`i32` on the
/// wire). Mirrors pg8000's `Interval._setMicroseconds`/`_setDays`/
/// `_setMonths` (`original_source/pg8000/types.py`), which reject the exact
/// extremes of the field's wire width (`min < value < max`, strictly) —
/// Rust's `i64`/`i32` types already bound the field to its wire width, so
/// the only extra check worth keeping is excluding those two extremes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    microseconds: i64,
    days: i32,
    months: i32,
}

/// An [`Interval`] mutator was given a value at the exact boundary of its
/// wire width, which pg8000 rejects as unrepresentable.
#[derive(Debug)]
pub enum IntervalError {
    Microseconds,
    Days,
    Months,
}

impl std::error::Error for IntervalError {}

impl fmt::Display for IntervalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microseconds => f.write_str("microseconds must be representable as a 64-bit integer"),
            Self::Days => f.write_str("days must be representable as a 32-bit integer"),
            Self::Months => f.write_str("months must be representable as a 32-bit integer"),
        }
    }
}

impl Interval {
    pub fn new(microseconds: i64, days: i32, months: i32) -> Result<Self, IntervalError> {
        let mut interval = Self { microseconds: 0, days: 0, months: 0 };
        interval.set_microseconds(microseconds)?;
        interval.set_days(days)?;
        interval.set_months(months)?;
        Ok(interval)
    }

    pub fn microseconds(&self) -> i64 {
        self.microseconds
    }

    pub fn days(&self) -> i32 {
        self.days
    }

    pub fn months(&self) -> i32 {
        self.months
    }

    pub fn set_microseconds(&mut self, value: i64) -> Result<&mut Self, IntervalError> {
        if value == i64::MIN || value == i64::MAX {
            return Err(IntervalError::Microseconds);
        }
        self.microseconds = value;
        Ok(self)
    }

    pub fn set_days(&mut self, value: i32) -> Result<&mut Self, IntervalError> {
        if value == i32::MIN || value == i32::MAX {
            return Err(IntervalError::Days);
        }
        self.days = value;
        Ok(self)
    }

    pub fn set_months(&mut self, value: i32) -> Result<&mut Self, IntervalError> {
        if value == i32::MIN || value == i32::MAX {
            return Err(IntervalError::Months);
        }
        self.months = value;
        Ok(self)
    }
}

/// Encode in binary form, using integer microseconds if `integer_datetimes`
/// is on, or float seconds otherwise (the same flag that governs
/// timestamp encoding).
pub fn encode_binary(interval: &Interval, integer_datetimes: bool, buf: &mut impl BufMut) {
    if integer_datetimes {
        buf.put_i64(interval.microseconds);
    } else {
        buf.put_f64(interval.microseconds as f64 / 1_000_000.0);
    }
    buf.put_i32(interval.days);
    buf.put_i32(interval.months);
}

pub fn decode_binary(mut buf: &[u8], integer_datetimes: bool) -> Interval {
    let microseconds = if integer_datetimes {
        buf.get_i64()
    } else {
        (buf.get_f64() * 1_000_000.0).round() as i64
    };
    let days = buf.get_i32();
    let months = buf.get_i32();
    Interval { microseconds, days, months }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_extreme_microseconds() {
        assert!(Interval::new(i64::MAX, 0, 0).is_err());
        assert!(Interval::new(i64::MIN, 0, 0).is_err());
    }

    #[test]
    fn accepts_ordinary_values() {
        let iv = Interval::new(1, 2, 3).unwrap();
        assert_eq!((iv.microseconds(), iv.days(), iv.months()), (1, 2, 3));
    }

    #[test]
    fn round_trips_binary() {
        let iv = Interval::new(123_456, -7, 1).unwrap();
        let mut buf = Vec::new();
        encode_binary(&iv, true, &mut buf);
        assert_eq!(decode_binary(&buf, true), iv);
    }
}
