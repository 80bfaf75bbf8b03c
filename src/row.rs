//! Row descriptors and decoded rows.
//!
//! Trades `postro/src/row.rs`'s zero-copy `Row` (values indexed lazily out
//! of the raw `DataRow` body) for eager decode into [`Value`] at
//! `DataRow`-handling time: each field is decoded against the portal's row
//! descriptor and appended to the prepared statement's row cache as it
//! arrives — the row cache holds decoded values, not raw bytes.
use std::fmt;
use std::sync::Arc;

use crate::message::backend::{FieldDescription, RowDescription};
use crate::types::codec::{self, CodecFlags};
use crate::types::value::PgFormat;
use crate::types::{Oid, Value};

/// `{name, table_oid, column_attrnum, type_oid, type_size, type_modifier,
/// format, decoder}`. The `decoder` a column uses is resolved
/// from its `type_oid`/`format` at decode time rather than stored as a
/// function pointer, since [`codec::decode`] is already a pure dispatch
/// over those two fields.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    pub name: String,
    pub table_oid: i32,
    pub column_attrnum: i16,
    pub type_oid: Oid,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: PgFormat,
}

/// The shape of a result set: one [`FieldDesc`] per column. Shared (via
/// `Arc`) between every [`Row`] of the same portal so that iterating rows
/// does not re-clone the column metadata.
#[derive(Debug, Clone, Default)]
pub struct RowDescriptor {
    pub fields: Arc<[FieldDesc]>,
}

impl RowDescriptor {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Build from the wire `RowDescription`. The statement-level Describe
    /// always reports format `0` (text) per the protocol's own note
    /// ("format code is not yet known and will always be zero"); the
    /// portal-level Describe carries the negotiated formats.
    pub fn from_wire(desc: RowDescription) -> Self {
        Self {
            fields: desc
                .fields
                .into_iter()
                .map(|f: FieldDescription| FieldDesc {
                    name: f.name,
                    table_oid: f.table_oid,
                    column_attrnum: f.column_attrnum,
                    type_oid: f.type_oid,
                    type_size: f.type_size,
                    type_modifier: f.type_modifier,
                    format: if f.format == 1 { PgFormat::Binary } else { PgFormat::Text },
                })
                .collect(),
        }
    }
}

/// One decoded row: a [`RowDescriptor`] plus each column's decoded
/// [`Value`], in the same order.
#[derive(Debug, Clone)]
pub struct Row {
    desc: RowDescriptor,
    values: Vec<Value>,
}

impl Row {
    /// Decode a wire `DataRow`'s raw column bytes against `desc`, using
    /// `flags` for the OID-dependent codecs (`integer_datetimes`).
    pub fn decode(desc: RowDescriptor, raw: Vec<Option<bytes::Bytes>>, flags: CodecFlags) -> Self {
        let values = desc
            .fields
            .iter()
            .zip(raw)
            .map(|(field, payload)| codec::decode(field.type_oid, field.format, payload.as_deref(), flags))
            .collect();
        Self { desc, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn descriptor(&self) -> &RowDescriptor {
        &self.desc
    }

    /// Column value by ordinal position.
    pub fn get(&self, index: usize) -> Result<&Value, DecodeError> {
        self.values.get(index).ok_or(DecodeError::IndexOutOfBounds(index))
    }

    /// Column value by name — the first column whose `RowDescription` name
    /// matches, per SQL's usual "first match wins" rule for duplicate
    /// column names.
    pub fn get_named(&self, name: &str) -> Result<&Value, DecodeError> {
        let idx = self
            .desc
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| DecodeError::ColumnNotFound(name.to_string()))?;
        self.get(idx)
    }

    /// The `(name, value)` pairs, in column order — backs the cursor's
    /// dict-row iterator.
    pub fn as_pairs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.desc.fields.iter().map(|f| f.name.as_str()).zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Row/column access failed.
#[derive(Debug)]
pub enum DecodeError {
    IndexOutOfBounds(usize),
    ColumnNotFound(String),
}

impl std::error::Error for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfBounds(i) => write!(f, "column index {i} out of bounds"),
            Self::ColumnNotFound(name) => write!(f, "no column named {name:?}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::oid;

    fn desc(type_oid: Oid, name: &str) -> RowDescriptor {
        RowDescriptor {
            fields: Arc::from(vec![FieldDesc {
                name: name.to_string(),
                table_oid: 0,
                column_attrnum: 1,
                type_oid,
                type_size: -1,
                type_modifier: -1,
                format: PgFormat::Binary,
            }]),
        }
    }

    #[test]
    fn decodes_column_by_name_and_index() {
        let d = desc(oid::INT4, "n");
        let row = Row::decode(d, vec![Some(bytes::Bytes::from_static(&42i32.to_be_bytes()))], CodecFlags::default());
        assert_eq!(row.get(0).unwrap(), &Value::Int(42));
        assert_eq!(row.get_named("n").unwrap(), &Value::Int(42));
    }

    #[test]
    fn missing_column_name_errors() {
        let d = desc(oid::INT4, "n");
        let row = Row::decode(d, vec![Some(bytes::Bytes::from_static(&1i32.to_be_bytes()))], CodecFlags::default());
        assert!(matches!(row.get_named("missing"), Err(DecodeError::ColumnNotFound(_))));
    }
}
