//! `pgwire` error types.
//!
//! The taxonomy mirrors the standard Python DB-API 2.0 hierarchy
//! (`Warning`, `Error` → `InterfaceError` / `DatabaseError` → `DataError`,
//! `OperationalError`, `IntegrityError`, `InternalError`, `ProgrammingError`,
//! `NotSupportedError`). Rust has no exception hierarchy to subclass, so the
//! hierarchy is flattened into one [`ErrorKind`] enum and exposed through
//! [`Error::class`] for callers that want to branch on the DB-API category
//! rather than the concrete leaf.
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    common::unit_error,
    config::ConfigError,
    placeholder::PlaceholderError,
    row::DecodeError,
    types::array::ArrayError,
};

/// A specialized [`Result`] type for `pgwire` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible errors from the `pgwire` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// The DB-API-style class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    pub(crate) fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Coarse DB-API error category, mirroring `Warning` / `InterfaceError` /
/// `DatabaseError`'s five children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Warning,
    Interface,
    Data,
    Operational,
    Integrity,
    Internal,
    Programming,
    NotSupported,
}

/// All possible error kinds from the `pgwire` library.
pub enum ErrorKind {
    /// URL or environment configuration could not be parsed.
    Config(ConfigError),
    /// A `?`/`:name`/`%s`/`%(name)s` placeholder query failed to translate.
    Placeholder(PlaceholderError),
    /// Transport-level failure: socket I/O, SSL negotiation.
    Io(io::Error),
    /// The server requested an authentication method this client does not
    /// implement, or MD5 authentication was rejected.
    Auth(AuthError),
    /// The server sent a message the client could not make sense of.
    Protocol(ProtocolError),
    /// A `NoticeResponse`/`ErrorResponse` field-dict was not valid UTF-8.
    Utf8(std::str::Utf8Error),
    /// The server returned `ErrorResponse`.
    Database(DatabaseError),
    /// Row/column decode failed (OID mismatch, malformed binary payload).
    Decode(DecodeError),
    /// A `Vec`/slice given as a bind parameter failed array-inspection.
    Array(ArrayError),
    /// Cursor-level misuse.
    Cursor(CursorError),
    /// A `Date`/`Time`/`Timestamp` constructor ([`crate::Date`] and
    /// friends) was given an out-of-range component.
    Component(time::error::ComponentRange),
    /// An [`crate::types::Interval`] mutator was given a value that would
    /// not round-trip over the wire.
    Interval(crate::types::interval::IntervalError),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ConfigError>e => ErrorKind::Config(e));
from!(<PlaceholderError>e => ErrorKind::Placeholder(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<AuthError>e => ErrorKind::Auth(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<std::str::Utf8Error>e => ErrorKind::Utf8(e));
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<ArrayError>e => ErrorKind::Array(e));
from!(<CursorError>e => ErrorKind::Cursor(e));
from!(<time::error::ComponentRange>e => ErrorKind::Component(e));
from!(<crate::types::interval::IntervalError>e => ErrorKind::Interval(e));

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\nStack backtrace:\n")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{backtrace}")?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind {}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::Io(_) | Self::Auth(_) => ErrorClass::Interface,
            Self::Placeholder(_) => ErrorClass::Programming,
            Self::Protocol(_) => ErrorClass::Internal,
            Self::Utf8(_) => ErrorClass::Internal,
            Self::Database(e) => e.class(),
            Self::Decode(_) => ErrorClass::Data,
            Self::Array(_) => ErrorClass::Data,
            Self::Cursor(e) => e.class(),
            Self::Component(_) => ErrorClass::Data,
            Self::Interval(_) => ErrorClass::Data,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Placeholder(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Auth(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
            Self::Array(e) => e.fmt(f),
            Self::Cursor(e) => e.fmt(f),
            Self::Component(e) => e.fmt(f),
            Self::Interval(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// The server requested an authentication method that is not implemented,
/// or rejected the MD5 password offered.
pub enum AuthError {
    /// Authentication code from `AuthenticationRequest` this client cannot
    /// speak (anything other than Ok/Cleartext/MD5).
    Unsupported(i32),
    /// Server returned `ErrorResponse` with SQLSTATE `28000` in reply to the
    /// `PasswordMessage`.
    Md5Failed,
}

impl std::error::Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(code) => write!(f, "authentication method {code} is not supported"),
            Self::Md5Failed => write!(f, "md5 password authentication failed"),
        }
    }
}

/// A backend message the client could not decode: an unknown tag, a
/// malformed body, or a message arriving out of the phase it is valid in.
pub struct ProtocolError {
    reason: String,
}

impl ProtocolError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn unknown_tag(tag: u8) -> Self {
        Self::new(format!("unknown backend message tag {:?}", tag as char))
    }

    pub fn unexpected(tag: u8, phase: &str) -> Self {
        Self::new(format!("unexpected message {:?} during {phase}", tag as char))
    }
}

impl std::error::Error for ProtocolError {}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol error: {}", self.reason)
    }
}

/// The server's `ErrorResponse`, re-classified into the DB-API leaf that
/// its SQLSTATE class belongs to.
pub struct DatabaseError {
    pub severity: String,
    pub code: String,
    pub message: String,
    class: ErrorClass,
}

impl DatabaseError {
    /// Build from an `ErrorResponse` field-dict, classifying by SQLSTATE
    /// class (the first two characters of the 5-character code), per
    /// <https://www.postgresql.org/docs/current/errcodes-appendix.html>.
    pub fn new(severity: String, code: String, message: String) -> Self {
        let class = match code.get(..2) {
            Some("08") => ErrorClass::Operational,  // connection exception
            Some("22") => ErrorClass::Data,          // data exception
            Some("23") => ErrorClass::Integrity,     // integrity constraint violation
            Some("40") => ErrorClass::Operational,   // transaction rollback
            Some("53" | "54" | "55" | "57" | "58") => ErrorClass::Operational,
            Some("0A") => ErrorClass::NotSupported,  // feature not supported
            Some("XX") => ErrorClass::Internal,      // internal error
            _ => ErrorClass::Programming,
        };
        Self { severity, code, message, class }
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }
}

impl std::error::Error for DatabaseError {}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.code, self.message)
    }
}

impl fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Cursor-level misuse, and the COPY-specific preconditions from §4.6.
pub enum CursorError {
    /// `copy_from`/`copy_to` was given neither `table` nor `query`.
    CopyQueryOrTableRequired,
    /// A `query` containing its own `COPY ... FROM/TO STDIN/STDOUT` was
    /// given without a stream to drive it.
    CopyQueryWithoutStream,
    /// The cursor was used after [`Cursor::close`][crate::cursor::Cursor::close].
    CursorClosed,
    /// `fetchone`/`fetchmany`/`fetchall`/`description` called before the
    /// cursor's first `execute`.
    Unexecuted,
}

impl CursorError {
    /// `CursorClosed` is an `InterfaceError`; the others are
    /// `ProgrammingError`-class misuse of the cursor API.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::CursorClosed => ErrorClass::Interface,
            Self::CopyQueryOrTableRequired | Self::CopyQueryWithoutStream | Self::Unexecuted => ErrorClass::Programming,
        }
    }
}

impl std::error::Error for CursorError {}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CopyQueryOrTableRequired => f.write_str("copy_from/copy_to requires a table or query"),
            Self::CopyQueryWithoutStream => f.write_str("copy query given without a stream"),
            Self::CursorClosed => f.write_str("cursor is closed"),
            Self::Unexecuted => f.write_str("attempting to use unexecuted cursor"),
        }
    }
}

unit_error! {
    /// The row cache was empty, the portal was not suspended, and a
    /// fetch was still requested.
    pub struct RowNotFound("no row available");
}
