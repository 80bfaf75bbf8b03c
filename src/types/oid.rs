//! PostgreSQL object identifiers for the built-in types this driver speaks.
//!
//! <https://www.postgresql.org/docs/current/datatype-oid.html>

/// A PostgreSQL object identifier. Implemented as `u32` on the wire.
pub type Oid = i32;

pub const BOOL: Oid = 16;
pub const BYTEA: Oid = 17;
pub const CHAR: Oid = 18;
pub const NAME: Oid = 19;
pub const INT8: Oid = 20;
pub const INT2: Oid = 21;
pub const INT4: Oid = 23;
pub const TEXT: Oid = 25;
pub const OID: Oid = 26;
pub const CSTRING: Oid = 2275;
pub const FLOAT4: Oid = 700;
pub const FLOAT8: Oid = 701;
pub const UNKNOWN: Oid = 705;
pub const VARCHAR: Oid = 1043;
pub const DATE: Oid = 1082;
pub const TIME: Oid = 1083;
pub const TIMESTAMP: Oid = 1114;
pub const TIMESTAMPTZ: Oid = 1184;
pub const INTERVAL: Oid = 1186;
pub const NUMERIC: Oid = 1700;
pub const UUID: Oid = 2950;

// array OIDs, element -> array
pub const BOOL_ARRAY: Oid = 1000;
pub const BYTEA_ARRAY: Oid = 1001;
pub const CHAR_ARRAY: Oid = 1002;
pub const NAME_ARRAY: Oid = 1003;
pub const INT2_ARRAY: Oid = 1005;
pub const INT4_ARRAY: Oid = 1007;
pub const TEXT_ARRAY: Oid = 1009;
pub const VARCHAR_ARRAY: Oid = 1015;
pub const INT8_ARRAY: Oid = 1016;
pub const FLOAT4_ARRAY: Oid = 1021;
pub const FLOAT8_ARRAY: Oid = 1022;
pub const TIMESTAMP_ARRAY: Oid = 1115;
pub const DATE_ARRAY: Oid = 1182;
pub const TIMESTAMPTZ_ARRAY: Oid = 1185;
pub const NUMERIC_ARRAY: Oid = 1231;
pub const UUID_ARRAY: Oid = 2951;

/// Map an element OID to its one-dimensional array OID, for the element
/// types this driver can bind as array parameters.
pub fn array_oid_of(element: Oid) -> Option<Oid> {
    Some(match element {
        BOOL => BOOL_ARRAY,
        BYTEA => BYTEA_ARRAY,
        CHAR => CHAR_ARRAY,
        NAME => NAME_ARRAY,
        INT2 => INT2_ARRAY,
        INT4 => INT4_ARRAY,
        INT8 => INT8_ARRAY,
        TEXT | CSTRING => TEXT_ARRAY,
        VARCHAR => VARCHAR_ARRAY,
        FLOAT4 => FLOAT4_ARRAY,
        FLOAT8 => FLOAT8_ARRAY,
        TIMESTAMP => TIMESTAMP_ARRAY,
        TIMESTAMPTZ => TIMESTAMPTZ_ARRAY,
        DATE => DATE_ARRAY,
        NUMERIC => NUMERIC_ARRAY,
        UUID => UUID_ARRAY,
        _ => return None,
    })
}
