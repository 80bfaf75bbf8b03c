//! Backend message decoders.
//!
//! Grounded on `qs/src/message/backend.rs`'s `BackendProtocol` trait and
//! `match_backend!` dispatch macro, extended with the COPY and
//! `NotificationResponse` messages this client requires that the `qs`
//! generation did not yet implement.
use bytes::{Buf, Bytes};

use super::get_nul_string;
use crate::types::Oid;

/// A message the client could not decode: unknown tag or truncated body.
#[derive(Debug)]
pub struct DecodeError {
    pub tag: u8,
    pub reason: &'static str,
}

impl std::error::Error for DecodeError {}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed {:?} message: {}", self.tag as char, self.reason)
    }
}

/// A type decodable from a backend message body, once the tag has
/// identified which variant it is.
pub trait BackendProtocol: Sized {
    const MSGTYPE: u8;
    fn decode(body: Bytes) -> Result<Self, DecodeError>;
}

/// Every backend message this driver's dispatch loop (§4.4) routes.
#[derive(Debug)]
pub enum BackendMessage {
    Authentication(Authentication),
    BackendKeyData(BackendKeyData),
    BindComplete,
    CloseComplete,
    CommandComplete(CommandComplete),
    CopyData(CopyData),
    CopyDone,
    CopyInResponse(CopyResponse),
    CopyOutResponse(CopyResponse),
    DataRow(DataRow),
    EmptyQueryResponse,
    ErrorResponse(FieldDict),
    NoData,
    NoticeResponse(FieldDict),
    NotificationResponse(NotificationResponse),
    ParameterDescription(ParameterDescription),
    ParameterStatus(ParameterStatus),
    ParseComplete,
    PortalSuspended,
    ReadyForQuery(ReadyForQuery),
    RowDescription(RowDescription),
}

impl BackendMessage {
    /// Decode a full message given its tag and body (as split out of the
    /// wire frame by [`super::read_message`]).
    pub fn decode(tag: u8, body: Bytes) -> Result<Self, DecodeError> {
        Ok(match tag {
            Authentication::MSGTYPE => Self::Authentication(Authentication::decode(body)?),
            BackendKeyData::MSGTYPE => Self::BackendKeyData(BackendKeyData::decode(body)?),
            b'2' => Self::BindComplete,
            b'3' => Self::CloseComplete,
            CommandComplete::MSGTYPE => Self::CommandComplete(CommandComplete::decode(body)?),
            b'd' => Self::CopyData(CopyData::decode(body)?),
            b'c' => Self::CopyDone,
            b'G' => Self::CopyInResponse(CopyResponse::decode(body)?),
            b'H' => Self::CopyOutResponse(CopyResponse::decode(body)?),
            DataRow::MSGTYPE => Self::DataRow(DataRow::decode(body)?),
            b'I' => Self::EmptyQueryResponse,
            b'E' => Self::ErrorResponse(FieldDict::decode(body)?),
            b'n' => Self::NoData,
            b'N' => Self::NoticeResponse(FieldDict::decode(body)?),
            b'A' => Self::NotificationResponse(NotificationResponse::decode(body)?),
            b't' => Self::ParameterDescription(ParameterDescription::decode(body)?),
            ParameterStatus::MSGTYPE => Self::ParameterStatus(ParameterStatus::decode(body)?),
            b'1' => Self::ParseComplete,
            b's' => Self::PortalSuspended,
            ReadyForQuery::MSGTYPE => Self::ReadyForQuery(ReadyForQuery::decode(body)?),
            RowDescription::MSGTYPE => Self::RowDescription(RowDescription::decode(body)?),
            other => return Err(DecodeError { tag: other, reason: "unknown backend message tag" }),
        })
    }

    pub fn msgtype(&self) -> u8 {
        match self {
            Self::Authentication(_) => Authentication::MSGTYPE,
            Self::BackendKeyData(_) => BackendKeyData::MSGTYPE,
            Self::BindComplete => b'2',
            Self::CloseComplete => b'3',
            Self::CommandComplete(_) => CommandComplete::MSGTYPE,
            Self::CopyData(_) => b'd',
            Self::CopyDone => b'c',
            Self::CopyInResponse(_) => b'G',
            Self::CopyOutResponse(_) => b'H',
            Self::DataRow(_) => DataRow::MSGTYPE,
            Self::EmptyQueryResponse => b'I',
            Self::ErrorResponse(_) => b'E',
            Self::NoData => b'n',
            Self::NoticeResponse(_) => b'N',
            Self::NotificationResponse(_) => b'A',
            Self::ParameterDescription(_) => b't',
            Self::ParameterStatus(_) => ParameterStatus::MSGTYPE,
            Self::ParseComplete => b'1',
            Self::PortalSuspended => b's',
            Self::ReadyForQuery(_) => ReadyForQuery::MSGTYPE,
            Self::RowDescription(_) => RowDescription::MSGTYPE,
        }
    }
}

/// `AuthenticationRequest` variants this client recognizes. Anything else
/// (GSSAPI, SSPI, SASL, Kerberos) is reported as [`Authentication::Unsupported`]
/// and the session fails with [`crate::error::AuthError::Unsupported`].
#[derive(Debug)]
pub enum Authentication {
    Ok,
    CleartextPassword,
    Md5Password { salt: u32 },
    Unsupported(i32),
}

impl BackendProtocol for Authentication {
    const MSGTYPE: u8 = b'R';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        Ok(match body.get_i32() {
            0 => Self::Ok,
            3 => Self::CleartextPassword,
            5 => Self::Md5Password { salt: body.get_u32() },
            code => Self::Unsupported(code),
        })
    }
}

/// `BackendKeyData` (`'K'`): PID + secret, used only to identify the
/// connection (no `CancelRequest` support — query cancellation is out of scope).
#[derive(Debug, Clone, Copy)]
pub struct BackendKeyData {
    pub process_id: i32,
    pub secret_key: i32,
}

impl BackendProtocol for BackendKeyData {
    const MSGTYPE: u8 = b'K';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        Ok(Self { process_id: body.get_i32(), secret_key: body.get_i32() })
    }
}

/// `ParameterStatus` (`'S'`): a `name`/`value` run-time parameter report.
/// The dispatch loop consults `name == "client_encoding"` and
/// `name == "integer_datetimes"` specially.
#[derive(Debug, Clone)]
pub struct ParameterStatus {
    pub name: String,
    pub value: String,
}

impl BackendProtocol for ParameterStatus {
    const MSGTYPE: u8 = b'S';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        Ok(Self { name: get_nul_string(&mut body), value: get_nul_string(&mut body) })
    }
}

/// The `NoticeResponse`/`ErrorResponse` field-dict: a run of `(code:u8,
/// value:nul string)` records terminated by a zero byte.
#[derive(Debug, Clone, Default)]
pub struct FieldDict {
    pub fields: Vec<(u8, String)>,
}

impl FieldDict {
    /// The `S` (severity), `C` (SQLSTATE code), and `M` (message) fields,
    /// defaulted to empty strings/`"ERROR"` if the server omitted them.
    pub fn severity_code_message(&self) -> (String, String, String) {
        let find = |code| self.fields.iter().find(|(c, _)| *c == code).map(|(_, v)| v.clone());
        (
            find(b'S').unwrap_or_else(|| "ERROR".to_string()),
            find(b'C').unwrap_or_default(),
            find(b'M').unwrap_or_default(),
        )
    }
}

impl BackendProtocol for FieldDict {
    const MSGTYPE: u8 = b'E'; // shared shape with NoticeResponse ('N'); tag not checked here

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        let mut fields = Vec::new();
        while body.has_remaining() {
            let code = body.get_u8();
            if code == 0 {
                break;
            }
            fields.push((code, get_nul_string(&mut body)));
        }
        Ok(Self { fields })
    }
}

/// `RowDescription` (`'T'`): the shape of a result set. One field per
/// column, see [`crate::row::RowDescriptor`] for how this is turned into
/// the statement/portal-level descriptor.
#[derive(Debug, Clone)]
pub struct RowDescription {
    pub fields: Vec<FieldDescription>,
}

#[derive(Debug, Clone)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: i32,
    pub column_attrnum: i16,
    pub type_oid: Oid,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: i16,
}

impl BackendProtocol for RowDescription {
    const MSGTYPE: u8 = b'T';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        let n = body.get_i16();
        let mut fields = Vec::with_capacity(n.max(0) as usize);
        for _ in 0..n {
            fields.push(FieldDescription {
                name: get_nul_string(&mut body),
                table_oid: body.get_i32(),
                column_attrnum: body.get_i16(),
                type_oid: body.get_i32(),
                type_size: body.get_i16(),
                type_modifier: body.get_i32(),
                format: body.get_i16(),
            });
        }
        Ok(Self { fields })
    }
}

/// `DataRow` (`'D'`): one row's worth of length-prefixed column values
/// (`-1` length denotes SQL `NULL`).
#[derive(Debug, Clone)]
pub struct DataRow {
    pub values: Vec<Option<Bytes>>,
}

impl BackendProtocol for DataRow {
    const MSGTYPE: u8 = b'D';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        let n = body.get_i16();
        let mut values = Vec::with_capacity(n.max(0) as usize);
        for _ in 0..n {
            let len = body.get_i32();
            values.push(if len < 0 { None } else { Some(body.split_to(len as usize)) });
        }
        Ok(Self { values })
    }
}

/// `CommandComplete` (`'C'`): the command tag, e.g. `"INSERT 0 2"`.
#[derive(Debug, Clone)]
pub struct CommandComplete {
    pub tag: String,
}

impl CommandComplete {
    /// The trailing row count word (`INSERT 0 N`, `UPDATE N`,
    /// `SELECT N`, `COPY N`, ...). `None` for tags with no row count
    /// (`CREATE TABLE`, etc).
    pub fn row_count(&self) -> Option<i64> {
        self.tag.rsplit(' ').next()?.parse().ok()
    }
}

impl BackendProtocol for CommandComplete {
    const MSGTYPE: u8 = b'C';

    fn decode(body: Bytes) -> Result<Self, DecodeError> {
        Ok(Self { tag: String::from_utf8_lossy(&body).trim_end_matches('\0').to_string() })
    }
}

/// `ReadyForQuery` (`'Z'`): the single-byte transaction status
/// (`I`dle / `T`ransaction / `E`rror).
#[derive(Debug, Clone, Copy)]
pub struct ReadyForQuery {
    pub status: u8,
}

impl BackendProtocol for ReadyForQuery {
    const MSGTYPE: u8 = b'Z';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        Ok(Self { status: body.get_u8() })
    }
}

/// `ParameterDescription` (`'t'`): ignored by this driver —
/// the client trusts its own host-value inspection over the server's
/// inferred parameter OIDs — but still decoded for completeness.
#[derive(Debug, Clone)]
pub struct ParameterDescription {
    pub oids: Vec<Oid>,
}

impl BackendProtocol for ParameterDescription {
    const MSGTYPE: u8 = b't';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        let n = body.get_i16();
        let mut oids = Vec::with_capacity(n.max(0) as usize);
        for _ in 0..n {
            oids.push(body.get_i32());
        }
        Ok(Self { oids })
    }
}

/// `CopyInResponse`/`CopyOutResponse` (`'G'`/`'H'`): overall and per-column
/// format (text/binary) for an about-to-start COPY stream.
#[derive(Debug, Clone)]
pub struct CopyResponse {
    pub format: i8,
    pub column_formats: Vec<i16>,
}

impl BackendProtocol for CopyResponse {
    const MSGTYPE: u8 = b'G'; // shared shape with CopyOutResponse ('H')

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        let format = body.get_i8();
        let n = body.get_i16();
        let mut column_formats = Vec::with_capacity(n.max(0) as usize);
        for _ in 0..n {
            column_formats.push(body.get_i16());
        }
        Ok(Self { format, column_formats })
    }
}

/// `CopyData` (`'d'`), backend direction: one chunk of a COPY OUT stream.
#[derive(Debug, Clone)]
pub struct CopyData {
    pub data: Bytes,
}

impl BackendProtocol for CopyData {
    const MSGTYPE: u8 = b'd';

    fn decode(body: Bytes) -> Result<Self, DecodeError> {
        Ok(Self { data: body })
    }
}

/// `NotificationResponse` (`'A'`): a LISTEN/NOTIFY event, appended to the
/// session's notification queue.
#[derive(Debug, Clone)]
pub struct NotificationResponse {
    pub process_id: i32,
    pub channel: String,
    pub payload: String,
}

impl BackendProtocol for NotificationResponse {
    const MSGTYPE: u8 = b'A';

    fn decode(mut body: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            process_id: body.get_i32(),
            channel: get_nul_string(&mut body),
            payload: get_nul_string(&mut body),
        })
    }
}
