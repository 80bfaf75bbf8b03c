//! `date` (1082), `time` (1083), `timestamp` (1114), `timestamptz` (1184).
//!
//! Binary timestamps are offsets from the PostgreSQL epoch, 2000-01-01,
//! either as signed microseconds (`integer_datetimes = on`, the default on
//! every server since PG 10) or as `f64` seconds otherwise. `date`/`time`
//! are exchanged in ISO-8601 text form, since pg8000 itself only
//! ever binds/parses them as text.
use bytes::{Buf, BufMut};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use time::format_description::well_known::Iso8601;

fn pg_epoch() -> PrimitiveDateTime {
    PrimitiveDateTime::new(
        Date::from_calendar_date(2000, Month::January, 1).expect("valid date"),
        Time::MIDNIGHT,
    )
}

pub fn encode_timestamp_binary(value: &PrimitiveDateTime, integer_datetimes: bool, buf: &mut impl BufMut) {
    let delta = *value - pg_epoch();
    if integer_datetimes {
        buf.put_i64(delta.whole_microseconds() as i64);
    } else {
        buf.put_f64(delta.as_seconds_f64());
    }
}

pub fn decode_timestamp_binary(mut buf: &[u8], integer_datetimes: bool) -> PrimitiveDateTime {
    let delta = if integer_datetimes {
        time::Duration::microseconds(buf.get_i64())
    } else {
        time::Duration::seconds_f64(buf.get_f64())
    };
    pg_epoch() + delta
}

pub fn encode_timestamptz_binary(value: &OffsetDateTime, integer_datetimes: bool, buf: &mut impl BufMut) {
    let utc = value.to_offset(UtcOffset::UTC);
    let naive = PrimitiveDateTime::new(utc.date(), utc.time());
    encode_timestamp_binary(&naive, integer_datetimes, buf);
}

pub fn decode_timestamptz_binary(buf: &[u8], integer_datetimes: bool) -> OffsetDateTime {
    let naive = decode_timestamp_binary(buf, integer_datetimes);
    naive.assume_utc()
}

pub fn encode_date_text(value: &Date) -> String {
    value.format(&Iso8601::DATE).unwrap_or_else(|_| value.to_string())
}

pub fn decode_date_text(text: &str) -> Result<Date, time::error::Parse> {
    Date::parse(text, &Iso8601::DATE)
}

pub fn encode_time_text(value: &Time) -> String {
    value.format(&Iso8601::TIME).unwrap_or_else(|_| value.to_string())
}

pub fn decode_time_text(text: &str) -> Result<Time, time::error::Parse> {
    Time::parse(text, &Iso8601::TIME)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_timestamp_with_integer_datetimes() {
        let ts = PrimitiveDateTime::new(
            Date::from_calendar_date(2024, Month::March, 15).unwrap(),
            Time::from_hms(12, 30, 0).unwrap(),
        );
        let mut buf = Vec::new();
        encode_timestamp_binary(&ts, true, &mut buf);
        assert_eq!(decode_timestamp_binary(&buf, true), ts);
    }

    #[test]
    fn round_trips_timestamp_with_float_seconds() {
        let ts = PrimitiveDateTime::new(
            Date::from_calendar_date(1999, Month::December, 31).unwrap(),
            Time::from_hms(23, 59, 59).unwrap(),
        );
        let mut buf = Vec::new();
        encode_timestamp_binary(&ts, false, &mut buf);
        assert_eq!(decode_timestamp_binary(&buf, false), ts);
    }
}
