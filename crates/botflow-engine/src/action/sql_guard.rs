//! Statement guard for spec-authored SQL.
//!
//! Statements are lexed once so string literals, quoted identifiers and
//! comments never influence keyword, separator or parameter detection.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::ActionError;

/// Value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
}

/// Guarded statement with `$n` placeholders and their values in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Read-only; must start with `SELECT`, gets a row cap.
    Query,
    /// Must start with `INSERT`, `UPDATE` or `DELETE`.
    Exec,
}

impl StatementKind {
    fn allows(self, keyword: &str) -> bool {
        let allowed: &[&str] = match self {
            StatementKind::Query => &["SELECT"],
            StatementKind::Exec => &["INSERT", "UPDATE", "DELETE"],
        };
        allowed.iter().any(|kw| kw.eq_ignore_ascii_case(keyword))
    }

    fn describe(self) -> &'static str {
        match self {
            StatementKind::Query => "queries must start with SELECT",
            StatementKind::Exec => "statements must start with INSERT, UPDATE or DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Word,
    Param,
    Positional,
    Semicolon,
    Open,
    Close,
    Literal,
    Comment,
    Space,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct Lexeme<'a> {
    kind: Kind,
    text: &'a str,
}

impl Lexeme<'_> {
    fn is_significant(&self) -> bool {
        !matches!(self.kind, Kind::Space | Kind::Comment)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == Kind::Word && self.text.eq_ignore_ascii_case(keyword)
    }
}

fn violation(message: impl Into<String>) -> ActionError {
    ActionError::SecurityViolation(message.into())
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_ident_char(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric()
}

fn ident_end(sql: &str, from: usize) -> usize {
    sql[from..]
        .char_indices()
        .find(|(_, ch)| !is_ident_char(*ch))
        .map(|(offset, _)| from + offset)
        .unwrap_or(sql.len())
}

fn quoted_end(bytes: &[u8], from: usize, quote: u8) -> Result<usize, ActionError> {
    let mut i = from + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(violation("unterminated quoted text"))
}

fn block_comment_end(bytes: &[u8], from: usize) -> Result<usize, ActionError> {
    let mut depth = 0usize;
    let mut i = from;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => i += 1,
        }
    }
    Err(violation("unterminated block comment"))
}

fn lex(sql: &str) -> Result<Vec<Lexeme<'_>>, ActionError> {
    let bytes = sql.as_bytes();
    let mut lexemes = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let next = bytes.get(i + 1).copied();
        let kind = match bytes[i] {
            b if b.is_ascii_whitespace() => {
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                Kind::Space
            }
            b'-' if next == Some(b'-') => {
                i = sql[i..].find('\n').map(|pos| i + pos).unwrap_or(sql.len());
                Kind::Comment
            }
            b'/' if next == Some(b'*') => {
                i = block_comment_end(bytes, i)?;
                Kind::Comment
            }
            b'\'' => {
                i = quoted_end(bytes, i, b'\'')?;
                Kind::Literal
            }
            b'"' => {
                i = quoted_end(bytes, i, b'"')?;
                Kind::Literal
            }
            b'$' if next.is_some_and(|b| b.is_ascii_digit()) => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                Kind::Positional
            }
            b'$' => {
                let tag_end = sql[i + 1..]
                    .char_indices()
                    .find(|(_, ch)| *ch != '_' && !ch.is_alphanumeric())
                    .map(|(offset, _)| i + 1 + offset)
                    .unwrap_or(sql.len());
                if bytes.get(tag_end) == Some(&b'$') {
                    let tag = &sql[i..=tag_end];
                    let body = tag_end + 1;
                    let close = sql[body..]
                        .find(tag)
                        .ok_or_else(|| violation("unterminated dollar-quoted text"))?;
                    i = body + close + tag.len();
                    Kind::Literal
                } else {
                    i += 1;
                    Kind::Other
                }
            }
            b':' if next == Some(b':') => {
                i += 2;
                Kind::Other
            }
            b':' if sql[i + 1..].chars().next().is_some_and(is_ident_start) => {
                i = ident_end(sql, i + 1);
                Kind::Param
            }
            b';' => {
                i += 1;
                Kind::Semicolon
            }
            b'(' => {
                i += 1;
                Kind::Open
            }
            b')' => {
                i += 1;
                Kind::Close
            }
            _ => {
                let ch = sql[i..].chars().next().unwrap_or_default();
                if is_ident_start(ch) {
                    i = ident_end(sql, i);
                    Kind::Word
                } else {
                    i += ch.len_utf8().max(1);
                    Kind::Other
                }
            }
        };
        lexemes.push(Lexeme {
            kind,
            text: &sql[start..i],
        });
    }
    Ok(lexemes)
}

/// Validates `sql` for `kind`, caps queries at `row_cap` rows and rewrites
/// `:name` parameters into positional binds taken from `binds`.
pub fn prepare(
    sql: &str,
    kind: StatementKind,
    row_cap: usize,
    binds: &BTreeMap<String, SqlValue>,
) -> Result<BoundStatement, ActionError> {
    let lexemes = lex(sql)?;
    let significant: Vec<usize> = lexemes
        .iter()
        .enumerate()
        .filter(|(_, lexeme)| lexeme.is_significant())
        .map(|(index, _)| index)
        .collect();

    let Some(&first) = significant.first() else {
        return Err(violation("empty statement"));
    };
    let leading = lexemes[first];
    if leading.kind != Kind::Word || !kind.allows(leading.text) {
        return Err(violation(format!(
            "{}, found `{}`",
            kind.describe(),
            leading.text
        )));
    }

    let mut body_end = None;
    let mut terminated = false;
    for &index in &significant {
        let lexeme = lexemes[index];
        if terminated {
            if lexeme.kind == Kind::Semicolon {
                continue;
            }
            return Err(violation("multiple statements are not allowed"));
        }
        match lexeme.kind {
            Kind::Semicolon => terminated = true,
            Kind::Positional => {
                return Err(violation("positional parameters are not allowed"));
            }
            _ => body_end = Some(index),
        }
    }
    let last = body_end.unwrap_or(first);
    let body = &lexemes[first..=last];

    let mut has_limit = false;
    if kind == StatementKind::Query {
        let mut depth = 0usize;
        for lexeme in body {
            match lexeme.kind {
                Kind::Open => depth += 1,
                Kind::Close => depth = depth.saturating_sub(1),
                Kind::Word if depth == 0 && lexeme.is_keyword("LIMIT") => has_limit = true,
                Kind::Word if depth == 0 && lexeme.is_keyword("INTO") => {
                    return Err(violation("SELECT INTO is not allowed"));
                }
                _ => {}
            }
        }
    }

    let mut shaped = String::with_capacity(sql.len() + 16);
    let mut names: Vec<&str> = Vec::new();
    let mut params = Vec::new();
    for lexeme in body {
        if lexeme.kind != Kind::Param {
            shaped.push_str(lexeme.text);
            continue;
        }
        let name = &lexeme.text[1..];
        let position = match names.iter().position(|known| *known == name) {
            Some(position) => position,
            None => {
                names.push(name);
                let value = binds.get(name).cloned().unwrap_or_else(|| {
                    debug!(param = name, "unbound sql parameter, binding NULL");
                    SqlValue::Null
                });
                params.push(value);
                names.len() - 1
            }
        };
        shaped.push('$');
        shaped.push_str(&(position + 1).to_string());
    }
    if kind == StatementKind::Query && !has_limit {
        shaped.push_str(&format!(" LIMIT {row_cap}"));
    }

    Ok(BoundStatement {
        sql: shaped,
        params,
    })
}
