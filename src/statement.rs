//! Prepared statement & portal.
//!
//! Name generation is grounded on `postro/src/statement.rs`'s
//! `itoa`-backed `Id`/`StatementName`/`PortalName` types; the session
//! identity is folded into the name (design notes §"Global counters") so
//! that statement/portal names can never collide across connections even
//! if two sessions' per-process counters happen to line up.
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::Result;
use crate::message::backend::CommandComplete;
use crate::message::frontend::{self, Target};
use crate::placeholder::Translated;
use crate::row::{FieldDesc, Row, RowDescriptor};
use crate::session::Session;
use crate::types::value::PgFormat;
use crate::types::{Oid, Value};

/// The format code to request for a result column of this OID, derived
/// from the statement's row descriptor rather than one blanket format:
/// `date`/`time` only round-trip over text, every other codec speaks
/// binary.
fn result_format_for(oid: Oid) -> PgFormat {
    match oid {
        crate::types::oid::DATE | crate::types::oid::TIME => PgFormat::Text,
        _ => PgFormat::Binary,
    }
}

/// Render a unique statement or portal name: `<prefix><session-id>_<seq>`.
fn next_name(prefix: &str, session_id: u64, counter: &AtomicU64) -> String {
    let seq = counter.fetch_add(1, Ordering::SeqCst);
    let mut buf = itoa::Buffer::new();
    format!("{prefix}{}_{}", session_id, buf.format(seq))
}

/// A parameter's resolved OID/format, decided once from the first argument
/// tuple passed to `execute` (types are inspected from the first
/// argument tuple, not re-inspected on subsequent calls).
#[derive(Debug, Clone, Copy)]
pub struct ParamDescriptor {
    pub oid: Oid,
    pub format: PgFormat,
}

/// A stream driving a COPY IN (read from) or COPY OUT (write to)
/// subprotocol exchange.
pub enum CopyStream {
    In(Box<dyn Read + Send>),
    Out(Box<dyn Write + Send>),
}

/// Mutable portal/execution state, guarded by [`PreparedStatement`]'s own
/// lock so that Bind/Execute/row-fetch on one statement serialize
/// independently of the session-wide socket lock.
pub(crate) struct StatementState {
    pub statement_row_desc: Option<RowDescriptor>,
    pub portal_row_desc: RowDescriptor,
    pub row_cache: VecDeque<Row>,
    pub portal_name: String,
    pub portal_suspended: bool,
    pub row_count: i64,
    pub command_tag: Option<String>,
    pub copy_stream: Option<CopyStream>,
}

impl StatementState {
    fn new() -> Self {
        Self {
            statement_row_desc: None,
            portal_row_desc: RowDescriptor::default(),
            row_cache: VecDeque::new(),
            portal_name: String::new(),
            portal_suspended: false,
            row_count: -1,
            command_tag: None,
            copy_stream: None,
        }
    }

    /// Reset everything a fresh Bind needs to (re-)establish ahead of the
    /// next Execute.
    fn reset_for_execute(&mut self) {
        self.row_cache.clear();
        self.row_count = -1;
        self.portal_suspended = false;
        self.command_tag = None;
    }
}

/// A parsed SQL template, plus whatever portal is currently bound to it.
/// `session` is a non-owning handle — the [`Session`] owns the socket and
/// must outlive every statement created from it (design notes, "Cyclic
/// references").
pub struct PreparedStatement<'a> {
    session: &'a Session,
    name: String,
    translated: Translated,
    params: Vec<ParamDescriptor>,
    state: Mutex<StatementState>,
}

impl<'a> PreparedStatement<'a> {
    /// `name` is `Some("")` for the unnamed slot, `None` to generate a
    /// fresh globally-unique name, or `Some(name)` for a caller-chosen one.
    pub(crate) fn new(session: &'a Session, translated: Translated, name: Option<String>) -> Self {
        let name = name.unwrap_or_else(|| next_name("s", session.id(), session.statement_counter()));
        Self { session, name, translated, params: Vec::new(), state: Mutex::new(StatementState::new()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }

    pub fn sql(&self) -> &str {
        &self.translated.sql
    }

    pub fn row_count(&self) -> i64 {
        self.state.lock().unwrap().row_count
    }

    pub fn command_tag(&self) -> Option<String> {
        self.state.lock().unwrap().command_tag.clone()
    }

    pub fn row_descriptor(&self) -> RowDescriptor {
        self.state.lock().unwrap().portal_row_desc.clone()
    }

    /// Reorder `args` into the `$N` positions the translated SQL expects.
    pub fn remap<'v>(&self, args: &'v [Value]) -> Result<Vec<&'v Value>> {
        Ok(self.translated.remap_positional(args)?)
    }

    /// Reorder named `args` into the `$N` positions the translated SQL
    /// expects, for the `named`/`pyformat` dialects whose placeholder order
    /// can differ from the argument list's order.
    pub fn remap_named(&self, args: &[(String, Value)]) -> Result<Vec<Value>> {
        Ok(self.translated.remap(args)?.into_iter().cloned().collect())
    }

    /// Parse: send `Parse` + `Describe(Statement)`
    /// + `Sync` + `Flush` under the session's socket lock, then dispatch
    /// until `ReadyForQuery`. Afterwards `statement_row_desc` is known
    /// (possibly empty, for DDL/DML).
    pub fn parse(&mut self, first_args: &[Value]) -> Result<()> {
        self.params = first_args
            .iter()
            .map(|v| crate::types::value::inspect(v).map(|(oid, format)| ParamDescriptor { oid, format }))
            .collect::<std::result::Result<_, _>>()?;

        let oids: Vec<Oid> = self.params.iter().map(|p| p.oid).collect();

        let mut state = self.state.lock().unwrap();
        let mut guard = self.session.lock_socket();
        guard.send(&frontend::Parse { statement: &self.name, sql: &self.translated.sql, param_oids: &oids });
        guard.send(&frontend::Describe { target: Target::Statement, name: &self.name });
        guard.send(&frontend::Sync);
        guard.send(&frontend::Flush);
        guard.flush()?;

        self.session.dispatch(&mut guard, &mut state, false)?;
        Ok(())
    }

    /// Execute: bind a fresh portal, then let
    /// the dispatcher's prefetch-after-`RowDescription` side effect (design
    /// notes) pull in the first batch before this call returns.
    pub fn execute(&mut self, args: &[Value]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.reset_for_execute();
        state.portal_name = next_name("p", self.session.id(), self.session.portal_counter());

        let mut encoded = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&self.params) {
            encoded.push(match arg {
                Value::Null => None,
                v => {
                    let mut buf = Vec::new();
                    crate::types::codec::encode(v, param.oid, self.session.codec_flags(), &mut buf);
                    Some(buf)
                }
            });
        }
        let param_formats: Vec<PgFormat> = self.params.iter().map(|p| p.format).collect();
        let param_refs: Vec<Option<&[u8]>> = encoded.iter().map(|b| b.as_deref()).collect();
        // Result format codes are derived from the
        // statement row descriptor, not a single blanket format — `date`/
        // `time` only have a textual wire form (§4.3), everything else
        // goes over binary.
        let result_formats: Vec<PgFormat> = state
            .statement_row_desc
            .as_ref()
            .map(|desc| desc.fields.iter().map(|f| result_format_for(f.type_oid)).collect())
            .unwrap_or_default();

        let mut guard = self.session.lock_socket();
        guard.send(&frontend::Bind {
            portal: &state.portal_name,
            statement: &self.name,
            param_formats: &param_formats,
            params: &param_refs,
            result_formats: &result_formats,
        });
        guard.send(&frontend::Describe { target: Target::Portal, name: &state.portal_name });
        guard.send(&frontend::Flush);
        guard.flush()?;

        self.session.dispatch(&mut guard, &mut state, true)?;

        if state.portal_row_desc.is_empty() {
            self.close_portal(&mut guard, &mut state)?;
        }
        Ok(())
    }

    /// Pop the next decoded row, resuming a suspended portal if the cache
    /// has run dry.
    pub fn read_tuple(&mut self) -> Result<Option<Row>> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.row_cache.pop_front() {
            return Ok(Some(row));
        }
        if !state.portal_suspended {
            return Ok(None);
        }

        let portal_name = state.portal_name.clone();
        let mut guard = self.session.lock_socket();
        guard.send(&frontend::Execute { portal: &portal_name, max_rows: self.session.row_cache_size() });
        guard.send(&frontend::Sync);
        guard.send(&frontend::Flush);
        guard.flush()?;
        self.session.dispatch(&mut guard, &mut state, false)?;

        match state.row_cache.pop_front() {
            Some(row) => Ok(Some(row)),
            None => {
                self.close_portal(&mut guard, &mut state)?;
                Ok(None)
            }
        }
    }

    /// Attach a stream to drive a COPY IN/OUT exchange that this
    /// statement's next `execute` will trigger.
    pub fn set_copy_stream(&mut self, stream: CopyStream) {
        self.state.lock().unwrap().copy_stream = Some(stream);
    }

    fn close_portal(&self, guard: &mut crate::session::SocketGuard<'_>, state: &mut StatementState) -> Result<()> {
        if state.portal_name.is_empty() {
            return Ok(());
        }
        guard.send(&frontend::Close { target: Target::Portal, name: &state.portal_name });
        guard.send(&frontend::Sync);
        guard.flush()?;
        self.session.dispatch(guard, state, false)?;
        state.portal_name.clear();
        Ok(())
    }

    /// Close: closes the live portal (if any) and, for
    /// named statements, the statement itself. The unnamed statement is
    /// never explicitly closed.
    pub fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut guard = self.session.lock_socket();
        self.close_portal(&mut guard, &mut state)?;

        if !self.is_unnamed() {
            guard.send(&frontend::Close { target: Target::Statement, name: &self.name });
            guard.send(&frontend::Sync);
            guard.flush()?;
            self.session.dispatch(&mut guard, &mut state, false)?;
        }
        Ok(())
    }
}

/// Extract the trailing row count from a `CommandComplete` tag
/// (`"INSERT 0 N"`, `"UPDATE N"`, `"SELECT N"`, `"COPY N"`, ...).
pub(crate) fn apply_command_complete(state: &mut StatementState, msg: &CommandComplete) {
    state.command_tag = Some(msg.tag.clone());
    if let Some(n) = msg.row_count() {
        state.row_count = if state.row_count == -1 { n } else { state.row_count + n };
    }
}

/// `{name, row field metadata}` convenience used by the cursor's
/// `description` property.
pub fn describe_fields(desc: &RowDescriptor) -> &[FieldDesc] {
    &desc.fields
}
