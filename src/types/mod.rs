//! PostgreSQL type codecs.
//!
//! Two registries keyed by OID, as the data model describes: `py_types`
//! (host-type → OID/format/encoder, via [`value::inspect`]) and `pg_types`
//! (OID → format/decoder, via [`codec::decode`]).
pub mod array;
pub mod codec;
pub mod datetime;
pub mod interval;
pub mod numeric;
pub mod oid;
pub mod value;

pub use array::ArrayError;
pub use codec::CodecFlags;
pub use interval::{Interval, IntervalError};
pub use oid::Oid;
pub use value::{PgFormat, Value};
