//! Array host-value inspection and binary array codec.
//!
//! Grounded on pg8000's `array_inspect`/`array_recv`/`array_send`
//! (`examples/original_source/pg8000/dbapi.py`): binary header
//! `(ndim, has_null, element_oid)` followed by per-dimension
//! `(length, lbound)` pairs, then elements each length-prefixed
//! (`-1` for NULL), written row-major.
use std::fmt;

use bytes::{Buf, BufMut};

use super::oid::{self, Oid};
use super::value::{inspect_scalar, PgFormat, Value};

/// Bind-parameter array failed host-value inspection.
#[derive(Debug)]
pub enum ArrayError {
    /// Every element (after flattening) was `NULL`, or the array was empty.
    Empty,
    /// Not every element shares the same host type.
    NotHomogenous,
    /// Sibling sub-lists at some dimension have different lengths.
    DimensionsInconsistent,
    /// The element type has no array OID this driver knows how to bind.
    NotSupported,
}

impl std::error::Error for ArrayError {}

impl fmt::Display for ArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "array content is empty",
            Self::NotHomogenous => "array content is not homogenous",
            Self::DimensionsInconsistent => "array dimensions are not consistent",
            Self::NotSupported => "array element type is not supported",
        })
    }
}

/// Inspect a nested `Value::Array` the way pg8000's `array_inspect` does:
/// find the element type, verify homogeneity and rectangularity, and for
/// integer arrays select the smallest-fit OID across every flattened
/// element rather than per-element.
pub fn inspect(items: &[Value]) -> Result<(Oid, PgFormat), ArrayError> {
    check_rectangular(items)?;

    let flat = flatten(items);
    let mut element_oid = None;
    let mut widest_int: Option<i64> = None;

    for item in &flat {
        if matches!(item, Value::Null) {
            continue;
        }
        let (item_oid, _) = inspect_scalar(item);
        match item {
            Value::Int(i) => {
                widest_int = Some(widest_int.map_or(*i, |w: i64| {
                    if i.unsigned_abs() > w.unsigned_abs() { *i } else { w }
                }));
                element_oid.get_or_insert(oid::INT2);
            }
            _ => match element_oid {
                None => element_oid = Some(item_oid),
                Some(oid) if oid == item_oid => {}
                Some(_) => return Err(ArrayError::NotHomogenous),
            },
        }
    }

    let element_oid = element_oid.ok_or(ArrayError::Empty)?;
    let element_oid = match widest_int {
        Some(i) => super::value::int_oid(i),
        None => element_oid,
    };

    let array_oid = oid::array_oid_of(element_oid).ok_or(ArrayError::NotSupported)?;
    Ok((array_oid, PgFormat::Binary))
}

fn flatten(items: &[Value]) -> Vec<&Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Array(inner) => out.extend(flatten(inner)),
            other => out.push(other),
        }
    }
    out
}

/// Every sub-list at a given dimension must have the same length and, if
/// its elements are themselves arrays, the same deeper shape.
fn check_rectangular(items: &[Value]) -> Result<(), ArrayError> {
    let sublists: Vec<&[Value]> = items
        .iter()
        .filter_map(|v| match v {
            Value::Array(inner) => Some(inner.as_slice()),
            _ => None,
        })
        .collect();

    if sublists.is_empty() {
        return Ok(());
    }
    if sublists.len() != items.len() {
        // a mix of scalars and sub-arrays at the same dimension
        return Err(ArrayError::DimensionsInconsistent);
    }
    let len = sublists[0].len();
    if sublists.iter().any(|s| s.len() != len) {
        return Err(ArrayError::DimensionsInconsistent);
    }
    for s in sublists {
        check_rectangular(s)?;
    }
    Ok(())
}

/// Dimensions of a (by now verified rectangular) nested array.
fn shape(items: &[Value]) -> Vec<i32> {
    let mut dims = vec![items.len() as i32];
    if let Some(Value::Array(inner)) = items.first() {
        dims.extend(shape(inner));
    }
    dims
}

/// Encode a (verified) nested array in PostgreSQL's binary array format.
pub fn encode_binary(items: &[Value], element_oid: Oid, buf: &mut impl BufMut, encode_element: impl Fn(&Value, Oid, &mut Vec<u8>)) {
    let dims = shape(items);
    let has_null = flatten(items).iter().any(|v| matches!(v, Value::Null)) as i32;

    buf.put_i32(dims.len() as i32);
    buf.put_i32(has_null);
    buf.put_i32(element_oid);
    for len in &dims {
        buf.put_i32(*len);
        buf.put_i32(1); // lower bound
    }

    for item in flatten(items) {
        match item {
            Value::Null => buf.put_i32(-1),
            other => {
                let mut tmp = Vec::new();
                encode_element(other, element_oid, &mut tmp);
                buf.put_i32(tmp.len() as i32);
                buf.put_slice(&tmp);
            }
        }
    }
}

/// Decode PostgreSQL's binary array format back into a (possibly nested)
/// `Value::Array`, reshaping the flat element stream per the dimension
/// table the wire sent.
pub fn decode_binary(mut buf: &[u8], decode_element: impl Fn(Oid, Option<&[u8]>) -> Value) -> Value {
    let ndim = buf.get_i32();
    let _has_null = buf.get_i32();
    let element_oid = buf.get_i32();

    let mut lengths = Vec::with_capacity(ndim as usize);
    for _ in 0..ndim {
        let len = buf.get_i32();
        let _lbound = buf.get_i32();
        lengths.push(len as usize);
    }

    let mut flat = Vec::new();
    let total: usize = lengths.iter().product::<usize>().max(if ndim == 0 { 0 } else { 1 });
    for _ in 0..total {
        let len = buf.get_i32();
        if len < 0 {
            flat.push(Value::Null);
        } else {
            let (chunk, rest) = buf.split_at(len as usize);
            flat.push(decode_element(element_oid, Some(chunk)));
            buf = rest;
        }
    }

    reshape(&flat, &lengths)
}

fn reshape(flat: &[Value], dims: &[usize]) -> Value {
    if dims.len() <= 1 {
        return Value::Array(flat.to_vec());
    }
    let chunk_size: usize = dims[1..].iter().product();
    let rows = flat.chunks(chunk_size).map(|c| reshape(c, &dims[1..])).collect();
    Value::Array(rows)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_empty_array() {
        assert!(matches!(inspect(&[]), Err(ArrayError::Empty)));
    }

    #[test]
    fn rejects_ragged_nested_array() {
        let a = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::Array(vec![Value::Int(1)]);
        assert!(matches!(inspect(&[a, b]), Err(ArrayError::DimensionsInconsistent)));
    }

    #[test]
    fn rejects_mixed_type_array() {
        let items = vec![Value::Int(1), Value::Text("x".into())];
        assert!(matches!(inspect(&items), Err(ArrayError::NotHomogenous)));
    }

    #[test]
    fn picks_widest_int_oid_across_whole_array() {
        let items = vec![Value::Int(1), Value::Int(100_000)];
        let (array_oid, _) = inspect(&items).unwrap();
        assert_eq!(array_oid, oid::INT4_ARRAY);
    }
}
