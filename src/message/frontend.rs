//! Frontend message encoders.
//!
//! Grounded on `qs/src/message` (the sibling generation's frontend encoder
//! style, reused here in blocking form) for the
//! exact set of messages this driver speaks: `StartupMessage`, `SSLRequest`,
//! `PasswordMessage`, `Parse`, `Bind`, `Describe`, `Execute`, `Sync`,
//! `Flush`, `Close`, `CopyData`, `CopyDone`, `Terminate`.
use bytes::BufMut;

use super::write_framed;
use crate::ext::BufMutExt;
use crate::types::{Oid, PgFormat};

/// Protocol version 3.0, as a single `(major << 16) | minor` word.
pub const PROTOCOL_VERSION: i32 = 196_608;

/// `SSLRequest`'s fixed magic code.
const SSL_REQUEST_CODE: i32 = 80_877_103;

/// A frontend message, pushed onto the session's write buffer until the
/// next [`crate::session::Session::flush`].
pub trait FrontendProtocol {
    fn encode(&self, buf: &mut Vec<u8>);
}

/// `StartupMessage` (tagless): protocol version, then `key\0value\0` pairs
/// terminated by a zero byte. `database` is only sent when given — the
/// server otherwise defaults it to `user`.
pub struct Startup<'a> {
    pub user: &'a str,
    pub database: Option<&'a str>,
}

impl Startup<'_> {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, None, |buf| {
            buf.put_i32(PROTOCOL_VERSION);
            buf.put_nul_string("user");
            buf.put_nul_string(self.user);
            if let Some(database) = self.database {
                buf.put_nul_string("database");
                buf.put_nul_string(database);
            }
            buf.put_u8(0);
        });
    }
}

/// `SSLRequest` (tagless, fixed 8-byte length): sent before `StartupMessage`
/// when `ssl` is requested. The server answers with a single byte, `'S'` to
/// accept or `'N'` to decline (any other byte is a protocol violation).
pub struct SslRequest;

impl SslRequest {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, None, |buf| buf.put_i32(SSL_REQUEST_CODE));
    }
}

/// `PasswordMessage` (`'p'`): either the cleartext password or, for MD5
/// authentication, the `"md5" || hex(...)` digest computed in
/// [`crate::auth`].
pub struct PasswordMessage<'a> {
    pub password: &'a str,
}

impl FrontendProtocol for PasswordMessage<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, Some(b'p'), |buf| buf.put_nul_string(self.password));
    }
}

/// `Parse` (`'P'`): create (or re-create) a prepared statement from SQL
/// text. Parameter OIDs of `0`/unknown are sent as `705` ("unknown"), per
/// the server infers the type from context.
pub struct Parse<'a> {
    pub statement: &'a str,
    pub sql: &'a str,
    pub param_oids: &'a [Oid],
}

impl FrontendProtocol for Parse<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, Some(b'P'), |buf| {
            buf.put_nul_string(self.statement);
            buf.put_nul_string(self.sql);
            buf.put_i16(self.param_oids.len() as i16);
            for &oid in self.param_oids {
                buf.put_i32(if oid == 0 { crate::types::oid::UNKNOWN } else { oid });
            }
        });
    }
}

/// One bound parameter: its wire bytes, or `None` for SQL `NULL`.
pub type BoundParam<'a> = Option<&'a [u8]>;

/// `Bind` (`'B'`): create a portal from a parsed statement, parameter
/// values, and the result column format codes.
pub struct Bind<'a> {
    pub portal: &'a str,
    pub statement: &'a str,
    pub param_formats: &'a [PgFormat],
    pub params: &'a [BoundParam<'a>],
    pub result_formats: &'a [PgFormat],
}

impl FrontendProtocol for Bind<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, Some(b'B'), |buf| {
            buf.put_nul_string(self.portal);
            buf.put_nul_string(self.statement);
            buf.put_i16(self.param_formats.len() as i16);
            for f in self.param_formats {
                buf.put_i16(*f as i16);
            }
            buf.put_i16(self.params.len() as i16);
            for param in self.params {
                match param {
                    None => buf.put_i32(-1),
                    Some(bytes) => {
                        buf.put_i32(bytes.len() as i32);
                        buf.put_slice(bytes);
                    }
                }
            }
            buf.put_i16(self.result_formats.len() as i16);
            for f in self.result_formats {
                buf.put_i16(*f as i16);
            }
        });
    }
}

/// The target of `Describe`/`Close`: a prepared statement or a portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Statement,
    Portal,
}

impl Target {
    fn tag(self) -> u8 {
        match self {
            Target::Statement => b'S',
            Target::Portal => b'P',
        }
    }
}

/// `Describe` (`'D'`): request a `ParameterDescription`/`RowDescription`
/// (statement) or just `RowDescription`/`NoData` (portal).
pub struct Describe<'a> {
    pub target: Target,
    pub name: &'a str,
}

impl FrontendProtocol for Describe<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, Some(b'D'), |buf| {
            buf.put_u8(self.target.tag());
            buf.put_nul_string(self.name);
        });
    }
}

/// `Close` (`'C'`): close a prepared statement or portal server-side.
pub struct Close<'a> {
    pub target: Target,
    pub name: &'a str,
}

impl FrontendProtocol for Close<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, Some(b'C'), |buf| {
            buf.put_u8(self.target.tag());
            buf.put_nul_string(self.name);
        });
    }
}

/// `Execute` (`'E'`): run a portal, stopping after `max_rows` rows (`0`
/// means "no limit").
pub struct Execute<'a> {
    pub portal: &'a str,
    pub max_rows: i32,
}

impl FrontendProtocol for Execute<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, Some(b'E'), |buf| {
            buf.put_nul_string(self.portal);
            buf.put_i32(self.max_rows);
        });
    }
}

/// `CopyData` (`'d'`): one chunk of a COPY IN stream, or one chunk of a
/// COPY OUT stream when decoded from the backend.
pub struct CopyData<'a> {
    pub data: &'a [u8],
}

impl FrontendProtocol for CopyData<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_framed(buf, Some(b'd'), |buf| buf.put_slice(self.data));
    }
}

macro_rules! singleton {
    ($(#[$doc:meta])* $name:ident, $tag:literal) => {
        $(#[$doc])*
        pub struct $name;

        impl FrontendProtocol for $name {
            fn encode(&self, buf: &mut Vec<u8>) {
                write_framed(buf, Some($tag), |_| {});
            }
        }
    };
}

singleton!(
    /// `Flush` (`'H'`): ask the backend to deliver buffered responses
    /// without waiting for `Sync`.
    Flush, b'H'
);
singleton!(
    /// `Sync` (`'S'`): end an extended-query exchange; the backend answers
    /// with `ReadyForQuery`.
    Sync, b'S'
);
singleton!(
    /// `Terminate` (`'X'`): politely close the connection.
    Terminate, b'X'
);
singleton!(
    /// `CopyDone` (`'c'`): signal that a COPY IN stream has been fully sent.
    CopyDone, b'c'
);
