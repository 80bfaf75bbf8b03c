//! The session / protocol driver: one TCP or Unix connection,
//! startup + authentication, and the blocking dispatch loop that drives the
//! extended-query lifecycle.
//!
//! Translated from `qs/src/connection.rs`'s `poll_message!`/`sync_pending`
//! async-poll pattern into blocking I/O for a preemptive-thread model:
//! where that pattern returns `Poll::Pending` and is woken by the
//! executor, this dispatch loop simply calls a blocking `read`.
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard};

use crate::auth;
use crate::config::Config;
use crate::error::{AuthError, DatabaseError, Error, ErrorKind, ProtocolError, Result};
use crate::message::backend::{Authentication, BackendMessage, FieldDict, NotificationResponse, ParameterStatus};
use crate::message::frontend::{self, FrontendProtocol};
use crate::message::read_message;
use crate::net::Socket;
use crate::row::{Row, RowDescriptor};
use crate::statement::{CopyStream, PreparedStatement, StatementState};
use crate::types::codec::CodecFlags;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// The server's last-observed `ReadyForQuery` status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,
    InTransaction,
    InFailedTransaction,
}

impl TransactionStatus {
    fn from_byte(b: u8) -> Self {
        match b {
            b'T' => Self::InTransaction,
            b'E' => Self::InFailedTransaction,
            _ => Self::Idle,
        }
    }
}

struct SocketState {
    socket: Socket,
    write_buf: Vec<u8>,
}

/// The write buffer plus send/flush/recv primitives, held across one
/// request burst + dispatch so the caller can batch several frontend
/// messages into a single flush.
pub struct SocketGuard<'a> {
    inner: MutexGuard<'a, SocketState>,
}

impl SocketGuard<'_> {
    pub(crate) fn send(&mut self, msg: &impl FrontendProtocol) {
        msg.encode(&mut self.inner.write_buf);
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        self.inner.socket.write_all(&self.inner.write_buf)?;
        self.inner.write_buf.clear();
        Ok(())
    }

    fn recv(&mut self) -> io::Result<(u8, bytes::Bytes)> {
        read_message(&mut self.inner.socket)
    }
}

/// A bounded-capacity subscription to one of the session's multicast event
/// channels (design notes, "Replacing a global multicast-delegate event").
pub struct Subscription<T> {
    rx: Receiver<T>,
}

impl<T> Subscription<T> {
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[derive(Default)]
struct Subscribers<T: Clone> {
    senders: Mutex<Vec<SyncSender<T>>>,
}

impl<T: Clone> Subscribers<T> {
    fn subscribe(&self, capacity: usize) -> Subscription<T> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        self.senders.lock().unwrap().push(tx);
        Subscription { rx }
    }

    /// Deliver to every live subscriber, dropping ones whose receiver has
    /// gone away. Called after releasing the socket lock to avoid
    /// re-entrancy (design notes).
    fn fanout(&self, value: T) {
        self.senders.lock().unwrap().retain(|tx| tx.try_send(value.clone()).is_ok());
    }
}

/// One PostgreSQL connection: transport, transaction status, and the
/// locks that serialize concurrent use.
pub struct Session {
    id: u64,
    socket: Mutex<SocketState>,
    codec_flags: Mutex<CodecFlags>,
    client_encoding: Mutex<String>,
    backend_key: Mutex<Option<(i32, i32)>>,
    tx_status: AtomicU8,
    autocommit: std::sync::atomic::AtomicBool,
    row_cache_size: AtomicI32,
    notifications: Mutex<VecDeque<NotificationResponse>>,
    notice_subs: Subscribers<FieldDict>,
    param_subs: Subscribers<ParameterStatus>,
    notify_subs: Subscribers<NotificationResponse>,
    stmt_counter: AtomicU64,
    portal_counter: AtomicU64,
    /// Serializes cursors competing for the empty prepared-statement name.
    pub(crate) unnamed_stmt_lock: Mutex<()>,
}

impl Session {
    /// Open the transport, negotiate SSL if requested, send `StartupMessage`,
    /// and authenticate.
    pub fn connect(config: &Config) -> Result<Self> {
        let mut socket = match config.unix_sock() {
            Some(path) => Socket::connect_unix(path)?,
            None => Socket::connect_tcp(config.host(), config.port())?,
        };
        socket.set_read_timeout(config.socket_timeout())?;
        socket.set_write_timeout(config.socket_timeout())?;

        if config.ssl() && socket.request_ssl()? {
            #[cfg(feature = "tls")]
            {
                socket = socket.upgrade_tls(config.host())?;
            }
            #[cfg(not(feature = "tls"))]
            {
                return Err(AuthError::Unsupported(0).into());
            }
        }

        let mut startup_buf = Vec::new();
        frontend::Startup { user: config.user(), database: Some(config.database()) }.encode(&mut startup_buf);
        socket.write_all(&startup_buf)?;
        socket.flush()?;

        let session = Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst),
            socket: Mutex::new(SocketState { socket, write_buf: Vec::new() }),
            codec_flags: Mutex::new(CodecFlags::default()),
            client_encoding: Mutex::new("utf8".to_string()),
            backend_key: Mutex::new(None),
            tx_status: AtomicU8::new(b'I'),
            autocommit: std::sync::atomic::AtomicBool::new(false),
            row_cache_size: AtomicI32::new(100),
            notifications: Mutex::new(VecDeque::new()),
            notice_subs: Subscribers::default(),
            param_subs: Subscribers::default(),
            notify_subs: Subscribers::default(),
            stmt_counter: AtomicU64::new(0),
            portal_counter: AtomicU64::new(0),
            unnamed_stmt_lock: Mutex::new(()),
        };

        session.authenticate(config)?;
        Ok(session)
    }

    fn authenticate(&self, config: &Config) -> Result<()> {
        let mut guard = self.lock_socket();
        loop {
            let (tag, body) = guard.recv()?;
            let msg = BackendMessage::decode(tag, body).map_err(|e| ProtocolError::new(e.to_string()))?;
            match msg {
                BackendMessage::Authentication(Authentication::Ok) => {}
                BackendMessage::Authentication(Authentication::CleartextPassword) => {
                    guard.send(&frontend::PasswordMessage { password: config.password() });
                    guard.flush()?;
                }
                BackendMessage::Authentication(Authentication::Md5Password { salt }) => {
                    let hash = auth::md5_password(config.user(), config.password(), salt.to_be_bytes());
                    guard.send(&frontend::PasswordMessage { password: &hash });
                    guard.flush()?;
                }
                BackendMessage::Authentication(Authentication::Unsupported(code)) => {
                    return Err(AuthError::Unsupported(code).into());
                }
                BackendMessage::ParameterStatus(ps) => self.apply_parameter_status(ps),
                BackendMessage::BackendKeyData(k) => {
                    *self.backend_key.lock().unwrap() = Some((k.process_id, k.secret_key));
                }
                BackendMessage::NoticeResponse(dict) => self.notice_subs.fanout(dict),
                BackendMessage::ErrorResponse(dict) => {
                    let (severity, code, message) = dict.severity_code_message();
                    return Err(if code == "28000" {
                        AuthError::Md5Failed.into()
                    } else {
                        DatabaseError::new(severity, code, message).into()
                    });
                }
                BackendMessage::ReadyForQuery(r) => {
                    self.tx_status.store(r.status, Ordering::SeqCst);
                    break;
                }
                other => return Err(ProtocolError::unexpected(other.msgtype(), "startup").into()),
            }
        }
        Ok(())
    }

    fn apply_parameter_status(&self, ps: ParameterStatus) {
        match ps.name.as_str() {
            "client_encoding" => {
                *self.client_encoding.lock().unwrap() =
                    crate::types::codec::remap_client_encoding(&ps.value).to_string();
            }
            "integer_datetimes" => {
                self.codec_flags.lock().unwrap().integer_datetimes = ps.value == "on";
            }
            _ => {}
        }
        self.param_subs.fanout(ps);
    }

    pub(crate) fn lock_socket(&self) -> SocketGuard<'_> {
        SocketGuard { inner: self.socket.lock().unwrap() }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn statement_counter(&self) -> &AtomicU64 {
        &self.stmt_counter
    }

    pub(crate) fn portal_counter(&self) -> &AtomicU64 {
        &self.portal_counter
    }

    pub fn codec_flags(&self) -> CodecFlags {
        *self.codec_flags.lock().unwrap()
    }

    pub fn client_encoding(&self) -> String {
        self.client_encoding.lock().unwrap().clone()
    }

    pub fn row_cache_size(&self) -> i32 {
        self.row_cache_size.load(Ordering::Relaxed)
    }

    pub fn set_row_cache_size(&self, size: i32) {
        self.row_cache_size.store(size, Ordering::Relaxed);
    }

    pub fn backend_key_data(&self) -> Option<(i32, i32)> {
        *self.backend_key.lock().unwrap()
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        TransactionStatus::from_byte(self.tx_status.load(Ordering::SeqCst))
    }

    pub fn set_autocommit(&self, autocommit: bool) {
        self.autocommit.store(autocommit, Ordering::SeqCst);
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit.load(Ordering::SeqCst)
    }

    /// True iff the last `ReadyForQuery` status was
    /// `InTx`/`InFailedTx` and autocommit is off.
    pub fn in_transaction(&self) -> bool {
        !self.autocommit() && matches!(self.transaction_status(), TransactionStatus::InTransaction | TransactionStatus::InFailedTransaction)
    }

    pub fn subscribe_notice(&self, capacity: usize) -> Subscription<FieldDict> {
        self.notice_subs.subscribe(capacity)
    }

    pub fn subscribe_parameter_status(&self, capacity: usize) -> Subscription<ParameterStatus> {
        self.param_subs.subscribe(capacity)
    }

    pub fn subscribe_notification(&self, capacity: usize) -> Subscription<NotificationResponse> {
        self.notify_subs.subscribe(capacity)
    }

    /// Drain the FIFO of LISTEN/NOTIFY events accumulated since the last
    /// call.
    pub fn drain_notifications(&self) -> Vec<NotificationResponse> {
        self.notifications.lock().unwrap().drain(..).collect()
    }

    /// Build a prepared statement bound to this session. `name = Some("")`
    /// requests the unnamed slot; `None` generates a fresh unique name.
    pub fn prepare<'a>(&'a self, sql: &str, style: crate::placeholder::ParamStyle, name: Option<String>) -> Result<PreparedStatement<'a>> {
        let translated = crate::placeholder::translate(sql, style)?;
        Ok(PreparedStatement::new(self, translated, name))
    }

    /// Politely close the connection: send
    /// `Terminate`, no response is expected.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock_socket();
        guard.send(&frontend::Terminate);
        guard.flush()?;
        Ok(())
    }

    /// Run the dispatch loop until
    /// `ReadyForQuery`, routing each message by tag and mutating `state`.
    /// `mid_bind` marks that the just-sent burst included a `Bind`, so a
    /// mid-flight `ErrorResponse` must restore sync by sending `Sync`.
    pub(crate) fn dispatch(&self, guard: &mut SocketGuard<'_>, state: &mut StatementState, mid_bind: bool) -> Result<()> {
        let mut mid_bind = mid_bind;
        let mut latched: Option<Error> = None;

        loop {
            let (tag, body) = guard.recv()?;
            let msg = BackendMessage::decode(tag, body).map_err(|e| ProtocolError::new(e.to_string()))?;

            match msg {
                BackendMessage::NoticeResponse(dict) => self.notice_subs.fanout(dict),
                BackendMessage::ParameterStatus(ps) => self.apply_parameter_status(ps),
                BackendMessage::BackendKeyData(k) => {
                    *self.backend_key.lock().unwrap() = Some((k.process_id, k.secret_key));
                }
                BackendMessage::ParseComplete => {}
                BackendMessage::BindComplete => mid_bind = false,
                BackendMessage::CloseComplete => {}
                BackendMessage::ParameterDescription(_) => {}
                BackendMessage::EmptyQueryResponse => {}
                BackendMessage::NoData => {
                    if state.statement_row_desc.is_none() {
                        state.statement_row_desc = Some(RowDescriptor::default());
                    } else {
                        state.portal_row_desc = RowDescriptor::default();
                        guard.send(&frontend::Execute { portal: &state.portal_name, max_rows: 0 });
                        guard.send(&frontend::Sync);
                        guard.flush()?;
                    }
                }
                BackendMessage::RowDescription(rd) => {
                    let desc = RowDescriptor::from_wire(rd);
                    if state.statement_row_desc.is_none() {
                        state.statement_row_desc = Some(desc);
                    } else {
                        state.portal_row_desc = desc;
                        // "Prefetch after RowDescription" (design notes): the
                        // Execute must be sent from here, before this loop
                        // returns, or an intervening Sync could invalidate
                        // the portal.
                        guard.send(&frontend::Execute { portal: &state.portal_name, max_rows: self.row_cache_size() });
                        guard.send(&frontend::Sync);
                        guard.flush()?;
                    }
                }
                BackendMessage::DataRow(dr) => {
                    let row = Row::decode(state.portal_row_desc.clone(), dr.values, self.codec_flags());
                    state.row_cache.push_back(row);
                }
                BackendMessage::PortalSuspended => state.portal_suspended = true,
                BackendMessage::CommandComplete(cc) => {
                    state.portal_suspended = false;
                    crate::statement::apply_command_complete(state, &cc);
                }
                BackendMessage::CopyInResponse(_) => self.drive_copy_in(guard, state)?,
                BackendMessage::CopyOutResponse(_) => {
                    if !matches!(state.copy_stream, Some(CopyStream::Out(_))) {
                        latched.get_or_insert_with(|| crate::error::CursorError::CopyQueryWithoutStream.into());
                    }
                }
                BackendMessage::CopyData(cd) => {
                    if let Some(CopyStream::Out(w)) = state.copy_stream.as_mut() {
                        w.write_all(&cd.data)?;
                    }
                }
                BackendMessage::CopyDone => {}
                BackendMessage::NotificationResponse(n) => {
                    self.notifications.lock().unwrap().push_back(n.clone());
                    self.notify_subs.fanout(n);
                }
                BackendMessage::ErrorResponse(dict) => {
                    if mid_bind {
                        guard.send(&frontend::Sync);
                        guard.flush()?;
                        mid_bind = false;
                    }
                    let (severity, code, message) = dict.severity_code_message();
                    latched = Some(if code == "28000" {
                        AuthError::Md5Failed.into()
                    } else {
                        DatabaseError::new(severity, code, message).into()
                    });
                }
                BackendMessage::ReadyForQuery(r) => {
                    self.tx_status.store(r.status, Ordering::SeqCst);
                    break;
                }
                BackendMessage::Authentication(_) => {
                    return Err(ProtocolError::new("unexpected AuthenticationRequest after startup").into());
                }
            }
        }

        match latched {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `CopyInResponse` handler: drain the caller-supplied
    /// stream in ≤8 KiB chunks, then send `CopyDone` + `Sync`. Fails if no
    /// stream was attached via [`PreparedStatement::set_copy_stream`].
    fn drive_copy_in(&self, guard: &mut SocketGuard<'_>, state: &mut StatementState) -> Result<()> {
        const CHUNK: usize = 8192;
        let io_result = (|| -> io::Result<()> {
            let Some(CopyStream::In(reader)) = state.copy_stream.as_mut() else {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "CopyInResponse received with no copy stream attached"));
            };
            let mut buf = [0u8; CHUNK];
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                guard.send(&frontend::CopyData { data: &buf[..n] });
                guard.flush().map_err(io::Error::other)?;
            }
            Ok(())
        })();

        guard.send(&frontend::CopyDone);
        guard.send(&frontend::Sync);
        guard.flush()?;
        io_result.map_err(ErrorKind::Io)?;
        Ok(())
    }
}
