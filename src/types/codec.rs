//! Per-OID binary/text encode and decode, dispatched by the session's
//! `pg_types`/`py_types` tables described in the data model.
use bytes::{Buf, BufMut};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use super::array;
use super::datetime;
use super::interval;
use super::numeric;
use super::oid::{self, Oid};
use super::value::Value;

/// Runtime flags consulted by OID-dependent codecs — the negotiated client
/// encoding name and the `integer_datetimes` parameter, both tracked on the
/// session and updated from `ParameterStatus`.
#[derive(Debug, Clone, Copy)]
pub struct CodecFlags {
    pub integer_datetimes: bool,
}

impl Default for CodecFlags {
    fn default() -> Self {
        Self { integer_datetimes: true }
    }
}

/// Encode a bound parameter's binary representation for the given OID.
/// `oid` is whatever [`super::value::inspect`] picked (or NULL's `0`).
pub fn encode(value: &Value, oid: Oid, flags: CodecFlags, buf: &mut Vec<u8>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => buf.put_u8(*b as u8),
        Value::Int(i) => match oid {
            oid::INT2 => buf.put_i16(*i as i16),
            oid::INT4 => buf.put_i32(*i as i32),
            _ => buf.put_i64(*i),
        },
        Value::Float(x) => match oid {
            oid::FLOAT4 => buf.put_f32(*x as f32),
            _ => buf.put_f64(*x),
        },
        Value::Numeric(s) => numeric::encode_binary(s, buf),
        Value::Text(s) => buf.put_slice(s.as_bytes()),
        Value::Bytes(b) => buf.put_slice(b),
        Value::Date(d) => buf.put_slice(datetime::encode_date_text(d).as_bytes()),
        Value::Time(t) => buf.put_slice(datetime::encode_time_text(t).as_bytes()),
        Value::Timestamp(t) => datetime::encode_timestamp_binary(t, flags.integer_datetimes, buf),
        Value::TimestampTz(t) => datetime::encode_timestamptz_binary(t, flags.integer_datetimes, buf),
        Value::Interval(i) => interval::encode_binary(i, flags.integer_datetimes, buf),
        Value::Uuid(u) => buf.put_slice(u),
        Value::Array(items) => {
            let element_oid = element_oid_of(oid);
            array::encode_binary(items, element_oid, buf, |v, oid, out| encode(v, oid, flags, out));
        }
    }
}

/// Decode a column's wire bytes into a [`Value`], given the column's OID,
/// its negotiated format, and the session's codec flags. A `None` payload
/// denotes SQL `NULL`.
pub fn decode(oid: Oid, format: super::value::PgFormat, payload: Option<&[u8]>, flags: CodecFlags) -> Value {
    use super::value::PgFormat;

    let Some(bytes) = payload else {
        return Value::Null;
    };

    if format == PgFormat::Text {
        return decode_text(oid, bytes);
    }

    match oid {
        oid::BOOL => Value::Bool(bytes.first().copied().unwrap_or(0) != 0),
        oid::INT2 => Value::Int(i16::from_be_bytes(bytes.try_into().unwrap_or_default()) as i64),
        oid::INT4 => Value::Int(i32::from_be_bytes(bytes.try_into().unwrap_or_default()) as i64),
        oid::INT8 => Value::Int(i64::from_be_bytes(bytes.try_into().unwrap_or_default())),
        oid::FLOAT4 => Value::Float(f32::from_be_bytes(bytes.try_into().unwrap_or_default()) as f64),
        oid::FLOAT8 => Value::Float(f64::from_be_bytes(bytes.try_into().unwrap_or_default())),
        oid::NUMERIC => Value::Numeric(numeric::decode_binary(bytes)),
        oid::BYTEA => Value::Bytes(bytes.to_vec()),
        oid::UUID => {
            let mut u = [0u8; 16];
            u.copy_from_slice(&bytes[..16.min(bytes.len())]);
            Value::Uuid(u)
        }
        oid::TIMESTAMP => Value::Timestamp(datetime::decode_timestamp_binary(bytes, flags.integer_datetimes)),
        oid::TIMESTAMPTZ => Value::TimestampTz(datetime::decode_timestamptz_binary(bytes, flags.integer_datetimes)),
        oid::INTERVAL => Value::Interval(interval::decode_binary(bytes, flags.integer_datetimes)),
        oid::DATE | oid::TIME => decode_text(oid, bytes),
        o if oid::array_oid_of(element_oid_of(o)).is_some() || is_known_array_oid(o) => {
            array::decode_binary(bytes, |elem_oid, chunk| decode(elem_oid, PgFormat::Binary, chunk, flags))
        }
        _ => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn decode_text(oid: Oid, bytes: &[u8]) -> Value {
    let text = String::from_utf8_lossy(bytes);
    match oid {
        oid::DATE => datetime::decode_date_text(&text).map(Value::Date).unwrap_or(Value::Text(text.into_owned())),
        oid::TIME => datetime::decode_time_text(&text).map(Value::Time).unwrap_or(Value::Text(text.into_owned())),
        oid::OID => Value::Int(text.parse().unwrap_or(0)),
        _ => Value::Text(text.into_owned()),
    }
}

fn element_oid_of(array_oid: Oid) -> Oid {
    match array_oid {
        oid::BOOL_ARRAY => oid::BOOL,
        oid::BYTEA_ARRAY => oid::BYTEA,
        oid::CHAR_ARRAY => oid::CHAR,
        oid::NAME_ARRAY => oid::NAME,
        oid::INT2_ARRAY => oid::INT2,
        oid::INT4_ARRAY => oid::INT4,
        oid::INT8_ARRAY => oid::INT8,
        oid::TEXT_ARRAY => oid::TEXT,
        oid::VARCHAR_ARRAY => oid::VARCHAR,
        oid::FLOAT4_ARRAY => oid::FLOAT4,
        oid::FLOAT8_ARRAY => oid::FLOAT8,
        oid::TIMESTAMP_ARRAY => oid::TIMESTAMP,
        oid::TIMESTAMPTZ_ARRAY => oid::TIMESTAMPTZ,
        oid::DATE_ARRAY => oid::DATE,
        oid::NUMERIC_ARRAY => oid::NUMERIC,
        oid::UUID_ARRAY => oid::UUID,
        _ => oid::TEXT,
    }
}

fn is_known_array_oid(o: Oid) -> bool {
    matches!(
        o,
        oid::BOOL_ARRAY
            | oid::BYTEA_ARRAY
            | oid::CHAR_ARRAY
            | oid::NAME_ARRAY
            | oid::INT2_ARRAY
            | oid::INT4_ARRAY
            | oid::INT8_ARRAY
            | oid::TEXT_ARRAY
            | oid::VARCHAR_ARRAY
            | oid::FLOAT4_ARRAY
            | oid::FLOAT8_ARRAY
            | oid::TIMESTAMP_ARRAY
            | oid::TIMESTAMPTZ_ARRAY
            | oid::DATE_ARRAY
            | oid::NUMERIC_ARRAY
            | oid::UUID_ARRAY
    )
}

/// Remap a PostgreSQL `client_encoding` `ParameterStatus` value to the
/// equivalent Rust-side codec name, per pg8000's `PG_TYPES` table. Unmapped
/// names pass through unchanged — this driver decodes text columns as
/// UTF-8 regardless, the mapping exists so callers inspecting
/// `Session::client_encoding()` see the name they expect.
pub fn remap_client_encoding(pg_name: &str) -> &str {
    match pg_name {
        "latin1" => "iso8859-1",
        "sql_ascii" => "ascii",
        "win1252" => "cp1252",
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_int4() {
        let mut buf = Vec::new();
        encode(&Value::Int(42), oid::INT4, CodecFlags::default(), &mut buf);
        assert_eq!(decode(oid::INT4, super::super::value::PgFormat::Binary, Some(&buf), CodecFlags::default()), Value::Int(42));
    }

    #[test]
    fn decodes_null_regardless_of_oid() {
        assert_eq!(decode(oid::INT4, super::super::value::PgFormat::Binary, None, CodecFlags::default()), Value::Null);
    }

    #[test]
    fn remaps_known_encoding_names() {
        assert_eq!(remap_client_encoding("latin1"), "iso8859-1");
        assert_eq!(remap_client_encoding("utf8"), "utf8");
    }
}
