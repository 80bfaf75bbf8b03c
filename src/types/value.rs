//! Host-value representation and OID inspection.
//!
//! Mirrors pg8000's `make_params`: a bound parameter is inspected at call
//! time to pick the smallest-fit OID and an encoder, rather than relying on
//! a static `PgType` trait the way `postro` does — the cursor façade takes
//! untyped argument tuples, so the OID has to come from the runtime value.
use std::fmt;

use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use super::interval::Interval;
use super::oid::{self, Oid};

/// Wire format a value is encoded/decoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgFormat {
    Text = 0,
    Binary = 1,
}

/// A bound parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(Date),
    Time(Time),
    Timestamp(PrimitiveDateTime),
    TimestampTz(OffsetDateTime),
    Interval(Interval),
    Uuid([u8; 16]),
    Array(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Numeric(s) | Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "\\x{}", hex(b)),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Timestamp(t) => write!(f, "{t}"),
            Value::TimestampTz(t) => write!(f, "{t}"),
            Value::Interval(i) => write!(f, "{i:?}"),
            Value::Uuid(u) => write!(f, "{}", hex(u)),
            Value::Array(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").unwrap();
    }
    s
}

/// The host OID and preferred wire format this value should be bound as.
///
/// Integers are promoted to the smallest type that fits
/// (`int2 → int4 → int8 → numeric`), matching pg8000's `make_params`.
/// Arrays delegate to [`super::array::inspect`], which can fail.
pub fn inspect(value: &Value) -> Result<(Oid, PgFormat), super::array::ArrayError> {
    match value {
        Value::Array(items) => super::array::inspect(items),
        scalar => Ok(inspect_scalar(scalar)),
    }
}

/// Inspect a value known not to be (or no longer needing to be treated as)
/// an array; used both standalone and as the element inspector inside
/// array homogeneity checks.
pub(super) fn inspect_scalar(value: &Value) -> (Oid, PgFormat) {
    match value {
        Value::Null => (oid::UNKNOWN, PgFormat::Binary),
        Value::Bool(_) => (oid::BOOL, PgFormat::Binary),
        Value::Int(i) => (int_oid(*i), PgFormat::Binary),
        Value::Float(_) => (oid::FLOAT8, PgFormat::Binary),
        Value::Numeric(_) => (oid::NUMERIC, PgFormat::Binary),
        Value::Text(_) => (oid::TEXT, PgFormat::Binary),
        Value::Bytes(_) => (oid::BYTEA, PgFormat::Binary),
        Value::Date(_) => (oid::DATE, PgFormat::Text),
        Value::Time(_) => (oid::TIME, PgFormat::Text),
        Value::Timestamp(_) => (oid::TIMESTAMP, PgFormat::Binary),
        Value::TimestampTz(_) => (oid::TIMESTAMPTZ, PgFormat::Binary),
        Value::Interval(_) => (oid::INTERVAL, PgFormat::Binary),
        Value::Uuid(_) => (oid::UUID, PgFormat::Binary),
        Value::Array(_) => (oid::TEXT_ARRAY, PgFormat::Binary), // unreachable via `inspect`
    }
}

pub(super) fn int_oid(i: i64) -> Oid {
    if i32::try_from(i).is_ok() {
        if i16::try_from(i).is_ok() { oid::INT2 } else { oid::INT4 }
    } else {
        oid::INT8
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn promotes_integers_to_smallest_fit() {
        assert_eq!(inspect(&Value::Int(1)).unwrap().0, oid::INT2);
        assert_eq!(inspect(&Value::Int(100_000)).unwrap().0, oid::INT4);
        assert_eq!(inspect(&Value::Int(i64::MAX)).unwrap().0, oid::INT8);
    }

    #[test]
    fn array_of_homogeneous_ints_picks_common_oid() {
        let arr = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Null]);
        let (oid, _) = inspect(&arr).unwrap();
        assert_eq!(oid, oid::INT2_ARRAY);
    }
}
