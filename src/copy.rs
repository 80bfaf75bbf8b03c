//! The COPY subprotocol surface: `CopyInResponse`/`CopyOutResponse`
//! handlers, and `copy_from`/`copy_to` SQL synthesis.
//!
//! The chunked drive itself — reading the caller's stream in ≤8 KiB pieces
//! and wiring `CopyData` frames both ways — lives on
//! [`crate::session::Session::dispatch`] next to the rest of the message
//! routing. This module only owns the two
//! things that are specific to the cursor-facing surface: the
//! [`CopyStream`] re-export callers attach to a statement, and the SQL
//! synthesis `copy_from`/`copy_to` do when only a table (not a full query)
//! is given.
//!
//! pg8000's `Cursor.copy_from`/`copy_to` (`dbapi.py`) synthesize `"COPY %s
//! FROM stdout DELIMITER '%s'"` — using `stdout` for the *from* direction,
//! which is not valid PostgreSQL grammar (`FROM` wants `STDIN`). This is a
//! latent bug in the source; this driver emits the literal keyword the
//! server actually expects for each direction.
use crate::error::{CursorError, Result};

pub use crate::statement::CopyStream;

/// Synthesize `COPY <table> FROM STDIN DELIMITER '<sep>' [NULL '<null>']`.
pub fn copy_from_sql(table: Option<&str>, query: Option<&str>, sep: &str, null: Option<&str>) -> Result<String> {
    build(table, query, sep, null, "FROM STDIN")
}

/// Synthesize `COPY <table> TO STDOUT DELIMITER '<sep>' [NULL '<null>']`.
pub fn copy_to_sql(table: Option<&str>, query: Option<&str>, sep: &str, null: Option<&str>) -> Result<String> {
    build(table, query, sep, null, "TO STDOUT")
}

fn build(table: Option<&str>, query: Option<&str>, sep: &str, null: Option<&str>, direction: &str) -> Result<String> {
    if let Some(query) = query {
        return Ok(query.to_string());
    }
    let table = table.ok_or(CursorError::CopyQueryOrTableRequired)?;
    let mut sql = format!("COPY {table} {direction} DELIMITER '{sep}'");
    if let Some(null) = null {
        sql.push_str(&format!(" NULL '{null}'"));
    }
    Ok(sql)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn synthesizes_copy_from_with_table() {
        let sql = copy_from_sql(Some("t"), None, "\t", None).unwrap();
        assert_eq!(sql, "COPY t FROM STDIN DELIMITER '\t'");
    }

    #[test]
    fn synthesizes_copy_to_with_null_clause() {
        let sql = copy_to_sql(Some("t"), None, ",", Some("\\N")).unwrap();
        assert_eq!(sql, "COPY t TO STDOUT DELIMITER ',' NULL '\\N'");
    }

    #[test]
    fn prefers_explicit_query_over_table() {
        let sql = copy_from_sql(None, Some("COPY t FROM STDIN"), "\t", None).unwrap();
        assert_eq!(sql, "COPY t FROM STDIN");
    }

    #[test]
    fn requires_table_or_query() {
        assert!(copy_from_sql(None, None, "\t", None).is_err());
    }
}
