//! Placeholder-dialect translation: `?` / `:N` / `:name` / `%s` / `%(name)s`
//! → canonical `$N`, plus the argument remap this rewrite implies.
//!
//! Grounded on `postro/src/sql.rs`'s quote-aware character scanner,
//! generalized from one dialect to the five pg8000 `dbapi.py` supports
//! (`paramstyle`).
use std::fmt;

/// The placeholder dialect a query is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    Qmark,
    Numeric,
    Named,
    Format,
    PyFormat,
}

/// A query rewritten to canonical `$N` placeholders, with the closure that
/// remaps a caller's argument tuple into positional order.
pub struct Translated {
    pub sql: String,
    positions: Vec<PlaceholderRef>,
}

enum PlaceholderRef {
    /// Positional dialects (`qmark`, `format`) bind straight through.
    Index(usize),
    /// Named dialects (`numeric`, `named`, `pyformat`) look the argument up
    /// by name or by the `:N` index.
    Name(String),
}

impl Translated {
    /// Reorder `args` (by position for qmark/format, by name/index for the
    /// named dialects) into the order the rewritten `$N` placeholders need.
    pub fn remap<'a, T>(&self, args: &'a [(String, T)]) -> Result<Vec<&'a T>, PlaceholderError>
    where
        T: 'a,
    {
        self.positions
            .iter()
            .map(|p| match p {
                PlaceholderRef::Index(i) => args.get(*i).map(|(_, v)| v),
                PlaceholderRef::Name(name) => args.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            })
            .map(|v| v.ok_or(PlaceholderError::new("missing bind argument for placeholder")))
            .collect()
    }

    /// Positional-only remap, for `qmark`/`format`/`numeric` callers that
    /// pass a plain argument slice rather than a name/value list.
    pub fn remap_positional<'a, T>(&self, args: &'a [T]) -> Result<Vec<&'a T>, PlaceholderError> {
        self.positions
            .iter()
            .map(|p| match p {
                PlaceholderRef::Index(i) => args.get(*i),
                PlaceholderRef::Name(n) => n.parse::<usize>().ok().and_then(|i| args.get(i.saturating_sub(1))),
            })
            .map(|v| v.ok_or(PlaceholderError::new("missing bind argument for placeholder")))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    SingleQuote,
    QuotedIdent,
    EscapedString,
    Placeholder,
}

/// Translate `sql`, written in `style`, into canonical `$N` form.
pub fn translate(sql: &str, style: ParamStyle) -> Result<Translated, PlaceholderError> {
    let mut out = String::with_capacity(sql.len());
    let mut positions: Vec<PlaceholderRef> = Vec::new();
    let mut names_seen: Vec<String> = Vec::new();

    let mut state = State::Outside;
    let mut chars = sql.char_indices().peekable();
    let mut placeholder_start = 0usize;
    let mut prev = '\0';
    let mut next_index = 0usize;

    while let Some((i, c)) = chars.next() {
        match state {
            State::Outside => match c {
                '\'' if prev == 'E' || prev == 'e' => {
                    out.push(c);
                    state = State::EscapedString;
                }
                '\'' => {
                    out.push(c);
                    state = State::SingleQuote;
                }
                '"' => {
                    out.push(c);
                    state = State::QuotedIdent;
                }
                '?' if style == ParamStyle::Qmark => {
                    positions.push(PlaceholderRef::Index(next_index));
                    next_index += 1;
                    out.push_str(&format!("${}", positions.len()));
                }
                ':' if matches!(style, ParamStyle::Numeric | ParamStyle::Named) => {
                    placeholder_start = i;
                    state = State::Placeholder;
                }
                '%' if matches!(style, ParamStyle::Format | ParamStyle::PyFormat) => {
                    placeholder_start = i;
                    state = State::Placeholder;
                }
                _ => out.push(c),
            },
            State::SingleQuote if matches!(style, ParamStyle::Format | ParamStyle::PyFormat) && c == '%' => {
                handle_percent_in_quote(&mut chars, &mut out)?;
            }
            State::SingleQuote => {
                out.push(c);
                if c == '\'' {
                    if chars.peek().map(|(_, n)| *n) == Some('\'') {
                        let (_, n) = chars.next().unwrap();
                        out.push(n);
                    } else {
                        state = State::Outside;
                    }
                }
            }
            State::QuotedIdent if matches!(style, ParamStyle::Format | ParamStyle::PyFormat) && c == '%' => {
                handle_percent_in_quote(&mut chars, &mut out)?;
            }
            State::QuotedIdent => {
                out.push(c);
                if c == '"' {
                    state = State::Outside;
                }
            }
            State::EscapedString if matches!(style, ParamStyle::Format | ParamStyle::PyFormat) && c == '%' => {
                handle_percent_in_quote(&mut chars, &mut out)?;
            }
            State::EscapedString => {
                out.push(c);
                if c == '\'' && prev != '\\' {
                    state = State::Outside;
                }
            }
            State::Placeholder => {
                let ident_char = c.is_alphanumeric() || c == '_';
                match style {
                    ParamStyle::Numeric => {
                        if !c.is_ascii_digit() {
                            let n: usize = sql[placeholder_start + 1..i].parse().map_err(|_| {
                                PlaceholderError::new("invalid :N placeholder")
                            })?;
                            let n_pos = push_named(&mut positions, &mut names_seen, n.to_string());
                            out.push_str(&format!("${n_pos}"));
                            state = State::Outside;
                            reprocess(&mut state, &mut out, &mut positions, &mut next_index, style, c)?;
                        }
                    }
                    ParamStyle::Named => {
                        if !ident_char {
                            let name = sql[placeholder_start + 1..i].to_string();
                            if name.is_empty() {
                                return Err(PlaceholderError::new("empty :name placeholder"));
                            }
                            let n_pos = push_named(&mut positions, &mut names_seen, name);
                            out.push_str(&format!("${n_pos}"));
                            state = State::Outside;
                            reprocess(&mut state, &mut out, &mut positions, &mut next_index, style, c)?;
                        }
                    }
                    ParamStyle::Format => {
                        match c {
                            's' => {
                                positions.push(PlaceholderRef::Index(next_index));
                                next_index += 1;
                                out.push_str(&format!("${}", positions.len()));
                                state = State::Outside;
                            }
                            '%' => {
                                out.push('%');
                                state = State::Outside;
                            }
                            _ => return Err(PlaceholderError::new("invalid %-placeholder")),
                        }
                    }
                    ParamStyle::PyFormat => {
                        if c == '%' {
                            out.push('%');
                            state = State::Outside;
                        } else if c == '(' {
                            let Some(close) = sql[i..].find(")s") else {
                                return Err(PlaceholderError::new("unterminated %(name)s placeholder"));
                            };
                            let name = sql[i + 1..i + close].to_string();
                            let n_pos = push_named(&mut positions, &mut names_seen, name);
                            out.push_str(&format!("${n_pos}"));
                            for _ in 0..close + 1 {
                                chars.next();
                            }
                            state = State::Outside;
                        } else {
                            return Err(PlaceholderError::new("invalid %-placeholder"));
                        }
                    }
                    ParamStyle::Qmark => unreachable!("qmark has no multi-char placeholder state"),
                }
            }
        }
        prev = c;
    }

    if state == State::Placeholder {
        match style {
            ParamStyle::Numeric | ParamStyle::Named => {
                let name = sql[placeholder_start + 1..].to_string();
                if name.is_empty() {
                    return Err(PlaceholderError::new("empty placeholder at end of query"));
                }
                let n_pos = push_named(&mut positions, &mut names_seen, name);
                out.push_str(&format!("${n_pos}"));
            }
            _ => return Err(PlaceholderError::new("unterminated placeholder at end of query")),
        }
    }

    Ok(Translated { sql: out, positions })
}

/// A `%` seen inside a quoted string literal/identifier, for `format`/
/// `pyformat` dialects only: only an escaped `%%` is supported there (it
/// collapses to one `%`), anything else is a parse error — mirrors the
/// source scanner's `INSIDE_SQ`/`INSIDE_QI`/`INSIDE_ES` `%` handling.
fn handle_percent_in_quote<I: Iterator<Item = (usize, char)>>(
    chars: &mut std::iter::Peekable<I>,
    out: &mut String,
) -> Result<(), PlaceholderError> {
    match chars.peek().map(|&(_, n)| n) {
        Some('%') => {
            chars.next();
            out.push('%');
            Ok(())
        }
        Some(other) => Err(PlaceholderError::new(format!("'%{other}' not supported in quoted string"))),
        None => Err(PlaceholderError::new("'%' at end of quoted string not supported")),
    }
}

/// Record `name`, returning the `$N` number it should be emitted as: the
/// first occurrence allocates a fresh bind slot, a later occurrence of the
/// same name reuses the slot it was first assigned (named dialects never
/// mix `Name` and `Index` entries in the same `positions` vector, so
/// `seen`'s index always lines up with `positions`'s).
fn push_named(positions: &mut Vec<PlaceholderRef>, seen: &mut Vec<String>, name: String) -> usize {
    if let Some(idx) = seen.iter().position(|n| *n == name) {
        idx + 1
    } else {
        seen.push(name.clone());
        positions.push(PlaceholderRef::Name(name));
        positions.len()
    }
}

/// After closing a named/numeric placeholder on a non-identifier
/// character, that character still needs to be interpreted under
/// `State::Outside` rules (it might open a new placeholder or a quote).
fn reprocess(
    state: &mut State,
    out: &mut String,
    positions: &mut Vec<PlaceholderRef>,
    next_index: &mut usize,
    style: ParamStyle,
    c: char,
) -> Result<(), PlaceholderError> {
    match c {
        '\'' => {
            out.push(c);
            *state = State::SingleQuote;
        }
        '"' => {
            out.push(c);
            *state = State::QuotedIdent;
        }
        ':' if matches!(style, ParamStyle::Numeric | ParamStyle::Named) => {
            *state = State::Placeholder;
        }
        _ => {
            let _ = next_index;
            out.push(c);
        }
    }
    Ok(())
}

/// The query could not be translated: a malformed `%X` escape, an
/// unterminated placeholder, or an out-of-range `:N`.
pub struct PlaceholderError {
    reason: String,
}

impl PlaceholderError {
    fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl std::error::Error for PlaceholderError {}

impl fmt::Display for PlaceholderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "placeholder translation failed: {}", self.reason)
    }
}

impl fmt::Debug for PlaceholderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn translates_qmark_positionally() {
        let t = translate("select * from t where a = ? and b = ?", ParamStyle::Qmark).unwrap();
        assert_eq!(t.sql, "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn translates_format_and_preserves_percent_escape() {
        let t = translate("select %s, '100%%' as lit", ParamStyle::Format).unwrap();
        assert_eq!(t.sql, "select $1, '100%' as lit");
    }

    #[test]
    fn rejects_lone_percent_inside_quoted_literal() {
        assert!(translate("select '%d' from t", ParamStyle::Format).is_err());
    }

    #[test]
    fn ignores_placeholders_inside_quoted_literal() {
        let t = translate("select '?' , ?", ParamStyle::Qmark).unwrap();
        assert_eq!(t.sql, "select '?' , $1");
    }

    #[test]
    fn reuses_named_placeholder_position() {
        let t = translate("select :x, :y, :x", ParamStyle::Named).unwrap();
        assert_eq!(t.sql, "select $1, $2, $1");
    }

    #[test]
    fn reuses_pyformat_placeholder_position() {
        let t = translate("select %(x)s, %(y)s, %(x)s", ParamStyle::PyFormat).unwrap();
        assert_eq!(t.sql, "select $1, $2, $1");
    }

    #[test]
    fn rejects_invalid_format_escape() {
        assert!(translate("select %d", ParamStyle::Format).is_err());
    }
}
