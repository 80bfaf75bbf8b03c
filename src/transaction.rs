//! Transaction control.
//!
//! Grounded on pg8000's `Connection.begin`/`commit`/`rollback`
//! (`dbapi.py`), which each run a throwaway statement (`BEGIN
//! TRANSACTION`/`COMMIT`/`ROLLBACK`) through the unnamed prepared-statement
//! slot. The source caches those three statements for the lifetime of the
//! connection; this driver re-parses them on every call instead, since a
//! [`PreparedStatement`][crate::statement::PreparedStatement] borrows its
//! [`Session`] and a `Session` cannot hold a statement of its own without a
//! self-referential cycle (design notes, "Cyclic references"). The cost is
//! the micro-optimization the source intended, not correctness — recorded
//! in DESIGN.md.
use crate::error::Result;
use crate::placeholder::ParamStyle;
use crate::session::Session;

/// Run `BEGIN TRANSACTION`, but only if the session isn't already inside a
/// transaction and autocommit is off (the `in_transaction`
/// invariant).
pub fn begin(session: &Session) -> Result<()> {
    if session.in_transaction() || session.autocommit() {
        return Ok(());
    }
    run_control(session, "BEGIN TRANSACTION")
}

/// Run `COMMIT`. The session's `in_transaction` state follows the next
/// `ReadyForQuery` status automatically; no separate
/// bookkeeping is needed here.
pub fn commit(session: &Session) -> Result<()> {
    run_control(session, "COMMIT")
}

/// Run `ROLLBACK`.
pub fn rollback(session: &Session) -> Result<()> {
    run_control(session, "ROLLBACK")
}

fn run_control(session: &Session, sql: &str) -> Result<()> {
    let _guard = session.unnamed_stmt_lock.lock().unwrap();
    let mut stmt = session.prepare(sql, ParamStyle::Format, Some(String::new()))?;
    stmt.parse(&[])?;
    stmt.execute(&[])?;
    Ok(())
}
