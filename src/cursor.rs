//! The cursor façade: `execute`/`executemany`/`fetchone`/
//! `fetchmany`/`fetchall`/`copy_from`/`copy_to`/`description`/`row_count`/
//! `close`, sitting atop one [`PreparedStatement`] at a time.
//!
//! Grounded on pg8000's `Cursor` (`dbapi.py`): every `execute` reuses the
//! unnamed prepared-statement slot, serialized across cursors on the same
//! session by [`Session::unnamed_stmt_lock`], and implicitly
//! opens a transaction first via [`crate::transaction::begin`] unless
//! autocommit is on.
use std::io::{Read, Write};

use crate::copy;
use crate::error::{CursorError, Error, Result};
use crate::placeholder::ParamStyle;
use crate::row::Row;
use crate::session::Session;
use crate::statement::{CopyStream, PreparedStatement};
use crate::transaction;
use crate::types::{Oid, Value};

/// `(name, type_oid, display_size, internal_size, precision, scale,
/// null_ok)` — only the first two fields are populated by
/// this driver, matching pg8000's own DB-API 2.0 implementation.
pub type ColumnDescription = (String, Oid, Option<i32>, Option<i32>, Option<i32>, Option<i32>, Option<bool>);

/// One decoded row, re-shaped as `(column name, value)` pairs — backs
/// [`Cursor::read_dict`]/[`Cursor::iterate_dict`].
#[derive(Debug, Clone)]
pub struct DictRow {
    pub fields: Vec<(String, Value)>,
}

impl DictRow {
    fn from_row(row: &Row) -> Self {
        Self { fields: row.as_pairs().map(|(name, value)| (name.to_string(), value.clone())).collect() }
    }
}

/// A user-facing, row-at-a-time cursor over one [`Session`].
pub struct Cursor<'a> {
    session: &'a Session,
    stmt: Option<PreparedStatement<'a>>,
    row_count: i64,
    closed: bool,
}

impl<'a> Cursor<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session, stmt: None, row_count: -1, closed: false }
    }

    /// The number of rows the last `execute*` produced or affected, or
    /// `-1` if unknown/not yet executed.
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// One [`ColumnDescription`] per result column, or `None` if the
    /// cursor has not executed a statement that returns rows.
    pub fn description(&self) -> Option<Vec<ColumnDescription>> {
        let stmt = self.stmt.as_ref()?;
        let desc = stmt.row_descriptor();
        if desc.is_empty() {
            return None;
        }
        Some(desc.fields.iter().map(|f| (f.name.clone(), f.type_oid, None, None, None, None, None)).collect())
    }

    /// Execute a parameterized statement written in `style`'s placeholder
    /// dialect, with `args` supplied positionally.
    ///
    /// For `qmark`/`format` this is simply appearance order. For `numeric`,
    /// where a `:N` placeholder can reference an argument out of the order
    /// it appears in the query, `args` is reordered through the
    /// translator's remap before binding, so `args` itself stays in
    /// argument-list order (`args[0]` is `:1`, etc.) regardless of where
    /// `:N` shows up in the SQL text.
    pub fn execute(&mut self, style: ParamStyle, sql: &str, args: &[Value]) -> Result<()> {
        self.execute_inner(style, sql, args, None)
    }

    /// Execute a statement written in the `named`/`pyformat` dialects,
    /// whose placeholders are looked up by name rather than position:
    /// `args` may be given in any order, since each `:name`/`%(name)s`
    /// occurrence is matched against `args` by name before binding.
    pub fn execute_named(&mut self, style: ParamStyle, sql: &str, args: &[(String, Value)]) -> Result<()> {
        if self.closed {
            return Err(CursorError::CursorClosed.into());
        }
        self.row_count = -1;
        transaction::begin(self.session)?;

        let _guard = self.session.unnamed_stmt_lock.lock().unwrap();
        let mut stmt = self.session.prepare(sql, style, Some(String::new()))?;
        let bound = stmt.remap_named(args)?;
        stmt.parse(&bound)?;
        stmt.execute(&bound)?;

        self.row_count = stmt.row_count();
        self.stmt = Some(stmt);
        Ok(())
    }

    /// Prepare `sql` once, then execute it against every argument tuple in
    /// `arg_batches`, accumulating `row_count` across all of them.
    pub fn executemany(&mut self, style: ParamStyle, sql: &str, arg_batches: &[Vec<Value>]) -> Result<()> {
        if self.closed {
            return Err(CursorError::CursorClosed.into());
        }
        self.row_count = -1;
        transaction::begin(self.session)?;

        let _guard = self.session.unnamed_stmt_lock.lock().unwrap();
        let first = arg_batches.first().map(Vec::as_slice).unwrap_or(&[]);
        let mut stmt = self.session.prepare(sql, style, Some(String::new()))?;
        let first_bound = stmt.remap(first)?.into_iter().cloned().collect::<Vec<_>>();
        stmt.parse(&first_bound)?;

        for args in arg_batches {
            let bound = stmt.remap(args)?.into_iter().cloned().collect::<Vec<_>>();
            stmt.execute(&bound)?;
            let batch_count = stmt.row_count();
            self.row_count = match (self.row_count, batch_count) {
                (_, -1) => -1,
                (-1, n) => n,
                (acc, n) => acc + n,
            };
        }
        self.stmt = Some(stmt);
        Ok(())
    }

    fn execute_inner(&mut self, style: ParamStyle, sql: &str, args: &[Value], stream: Option<CopyStream>) -> Result<()> {
        if self.closed {
            return Err(CursorError::CursorClosed.into());
        }
        self.row_count = -1;
        transaction::begin(self.session)?;

        let _guard = self.session.unnamed_stmt_lock.lock().unwrap();
        let mut stmt = self.session.prepare(sql, style, Some(String::new()))?;
        let bound = stmt.remap(args)?.into_iter().cloned().collect::<Vec<_>>();
        stmt.parse(&bound)?;
        if let Some(stream) = stream {
            stmt.set_copy_stream(stream);
        }
        stmt.execute(&bound)?;

        self.row_count = stmt.row_count();
        self.stmt = Some(stmt);
        Ok(())
    }

    /// `COPY <table|query> FROM STDIN`, driving `stream` as the data
    /// source.
    pub fn copy_from(
        &mut self,
        stream: impl Read + Send + 'static,
        table: Option<&str>,
        query: Option<&str>,
        sep: &str,
        null: Option<&str>,
    ) -> Result<()> {
        let sql = copy::copy_from_sql(table, query, sep, null)?;
        self.execute_inner(ParamStyle::Format, &sql, &[], Some(CopyStream::In(Box::new(stream))))
    }

    /// `COPY <table|query> TO STDOUT`, driving `stream` as the data sink.
    pub fn copy_to(
        &mut self,
        stream: impl Write + Send + 'static,
        table: Option<&str>,
        query: Option<&str>,
        sep: &str,
        null: Option<&str>,
    ) -> Result<()> {
        let sql = copy::copy_to_sql(table, query, sep, null)?;
        self.execute_inner(ParamStyle::Format, &sql, &[], Some(CopyStream::Out(Box::new(stream))))
    }

    /// Read one row as a tuple of values, or `None` after the last row.
    pub fn fetchone(&mut self) -> Result<Option<Row>> {
        let stmt = self.stmt.as_mut().ok_or_else(|| Error::from(CursorError::Unexecuted))?;
        stmt.read_tuple()
    }

    /// Read up to `size` rows.
    pub fn fetchmany(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(size);
        for _ in 0..size {
            match self.fetchone()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Read every remaining row.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetchone()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Read one row as `(column name, value)` pairs, or `None` after the
    /// last row.
    pub fn read_dict(&mut self) -> Result<Option<DictRow>> {
        Ok(self.fetchone()?.map(|row| DictRow::from_row(&row)))
    }

    /// A lazy iterator of tuple rows.
    pub fn iterate_tuple(&mut self) -> Tuples<'_, 'a> {
        Tuples { cursor: self }
    }

    /// A lazy iterator of dict rows.
    pub fn iterate_dict(&mut self) -> Dicts<'_, 'a> {
        Dicts { cursor: self }
    }

    /// Close the cursor: closes the underlying prepared statement's live
    /// portal (and, since the cursor always uses the unnamed slot, nothing
    /// further needs closing).
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(mut stmt) = self.stmt.take() {
            stmt.close()?;
        }
        self.closed = true;
        Ok(())
    }
}

/// Lazy tuple-row iterator returned by [`Cursor::iterate_tuple`].
pub struct Tuples<'c, 'a> {
    cursor: &'c mut Cursor<'a>,
}

impl Iterator for Tuples<'_, '_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.fetchone() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Lazy dict-row iterator returned by [`Cursor::iterate_dict`].
pub struct Dicts<'c, 'a> {
    cursor: &'c mut Cursor<'a>,
}

impl Iterator for Dicts<'_, '_> {
    type Item = Result<DictRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.read_dict() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
