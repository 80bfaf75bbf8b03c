//! PostgreSQL `numeric` (OID 1700): base-10000 digit groups.
//!
//! Grounded on PostgreSQL's own `numeric.c` `set_var_from_str`/`numeric_send`,
//! kept here as plain text-in/text-out since this driver represents
//! `NUMERIC` host-side as a decimal string rather than pulling in a bignum
//! crate.
use bytes::{Buf, BufMut};

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const DIGIT_BASE: i64 = 10_000;

/// Encode a decimal string (`-?\d+(\.\d+)?([eE][+-]?\d+)?`) into PostgreSQL's
/// binary `numeric` wire format.
pub fn encode_binary(text: &str, buf: &mut impl BufMut) {
    if text.eq_ignore_ascii_case("nan") {
        buf.put_i16(0);
        buf.put_i16(0);
        buf.put_u16(NUMERIC_NAN);
        buf.put_i16(0);
        return;
    }

    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => (NUMERIC_NEG, rest),
        None => (NUMERIC_POS, text.strip_prefix('+').unwrap_or(text)),
    };

    // fold scientific notation into a plain decimal string first
    let normalized = normalize_exponent(text);
    let (int_part, frac_part) = match normalized.split_once('.') {
        Some((i, f)) => (i, f),
        None => (normalized.as_str(), ""),
    };
    let dscale = frac_part.len() as i16;

    // group decimal digits into base-10000 groups, aligned on the decimal point
    let mut digits: Vec<i16> = Vec::new();
    let combined: String = format!("{int_part}{frac_part}");
    let total_len = combined.len();
    // pad so that int_part's length is a multiple of 4 counting from the right
    let pad = (4 - int_part.len() % 4) % 4;
    let padded: String = "0".repeat(pad) + &combined;
    let mut weight = (int_part.len() + pad) as i32 / 4 - 1;
    let mut chars: Vec<u8> = padded.bytes().collect();
    // pad the end so total length is a multiple of 4
    while chars.len() % 4 != 0 {
        chars.push(b'0');
    }
    for chunk in chars.chunks(4) {
        let s = std::str::from_utf8(chunk).unwrap();
        digits.push(s.parse::<i16>().unwrap_or(0));
    }

    // strip leading zero groups (adjust weight), and trailing zero groups
    while digits.first() == Some(&0) && digits.len() > 1 {
        digits.remove(0);
        weight -= 1;
    }
    while digits.last() == Some(&0) && digits.len() > 1 {
        digits.pop();
    }
    if total_len == 0 || digits.iter().all(|&d| d == 0) {
        buf.put_i16(0);
        buf.put_i16(0);
        buf.put_u16(NUMERIC_POS);
        buf.put_i16(dscale);
        return;
    }

    buf.put_i16(digits.len() as i16);
    buf.put_i16(weight as i16);
    buf.put_u16(sign);
    buf.put_i16(dscale);
    for d in digits {
        buf.put_i16(d);
    }
}

fn normalize_exponent(text: &str) -> String {
    let Some(epos) = text.find(['e', 'E']) else {
        return text.to_string();
    };
    let (mantissa, exp) = text.split_at(epos);
    let exp: i32 = exp[1..].parse().unwrap_or(0);
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (mantissa.to_string(), String::new()),
    };
    let mut digits = format!("{int_part}{frac_part}");
    let mut point = int_part.len() as i32 + exp;
    if point <= 0 {
        digits = "0".repeat((-point) as usize) + &digits;
        point = 0;
    }
    while (point as usize) > digits.len() {
        digits.push('0');
    }
    if point == 0 {
        format!("0.{digits}")
    } else {
        let (i, f) = digits.split_at(point as usize);
        if f.is_empty() { i.to_string() } else { format!("{i}.{f}") }
    }
}

/// Decode PostgreSQL's binary `numeric` wire format into a decimal string.
pub fn decode_binary(mut buf: &[u8]) -> String {
    let ndigits = buf.get_i16();
    let weight = buf.get_i16() as i32;
    let sign = buf.get_u16();
    let dscale = buf.get_i16();

    if sign == NUMERIC_NAN {
        return "NaN".to_string();
    }

    let mut digits = Vec::with_capacity(ndigits as usize);
    for _ in 0..ndigits {
        digits.push(buf.get_i16());
    }

    let mut int_part = String::new();
    if weight < 0 {
        int_part.push('0');
    } else {
        for i in 0..=weight {
            let group = digits.get(i as usize).copied().unwrap_or(0);
            if i == 0 {
                int_part.push_str(&group.to_string());
            } else {
                int_part.push_str(&format!("{group:04}"));
            }
        }
    }

    let mut frac_part = String::new();
    if dscale > 0 {
        let frac_groups = (dscale as usize).div_ceil(4);
        for i in 0..frac_groups {
            let idx = weight + 1 + i as i32;
            let group = if idx >= 0 { digits.get(idx as usize).copied().unwrap_or(0) } else { 0 };
            frac_part.push_str(&format!("{group:04}"));
        }
        frac_part.truncate(dscale as usize);
    }

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    out.push_str(&int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(&frac_part);
    }

    let _ = DIGIT_BASE;
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_simple_integer() {
        let mut buf = Vec::new();
        encode_binary("1234", &mut buf);
        assert_eq!(decode_binary(&buf), "1234");
    }

    #[test]
    fn round_trips_negative_fraction() {
        let mut buf = Vec::new();
        encode_binary("-12.5", &mut buf);
        assert_eq!(decode_binary(&buf), "-12.5");
    }

    #[test]
    fn zero_forces_positive_sign_and_zero_weight() {
        let mut buf = Vec::new();
        encode_binary("0", &mut buf);
        assert_eq!(&buf[4..6], &NUMERIC_POS.to_be_bytes());
    }
}
