//! Callback token codec.
//!
//! ```text
//! cal_date:{bot}:{user}:{YYYY-MM-DD}:{mode}:{var}
//! cal_nav:{bot}:{user}:{YYYY-MM}:{mode}:{var}
//! cal_back:{bot}:{user}:{var}
//! cal_time:{bot}:{user}:{YYYY-MM-DD}:{HH-MM}:{var}
//! cal_ignore
//! pg:sel:{bot}:{user}:{id}
//! pg:next:{bot}:{user}:{page}
//! pg:prev:{bot}:{user}:{page}
//! pg:ignore
//! ```

use std::fmt;
use std::str::FromStr;

use botflow_spec::{CalendarMode, format_iso_date, is_token_safe, parse_iso_date};
use thiserror::Error;
use time::{Date, Month};

/// Longest token the transport accepts.
pub const MAX_TOKEN_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Calendar,
    Pagination,
}

/// Namespace of a raw token, judged by prefix only.
pub fn namespace_of(raw: &str) -> Option<Namespace> {
    if raw.starts_with("cal_") {
        Some(Namespace::Calendar)
    } else if raw == "pg" || raw.starts_with("pg:") {
        Some(Namespace::Pagination)
    } else {
        None
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unknown callback token `{0}`")]
    Unknown(String),
    #[error("`{kind}` expects {expected} fields, got {got}")]
    FieldCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("`{kind}` has invalid {field} `{value}`")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackToken {
    CalDate {
        bot_id: i64,
        user_id: i64,
        date: Date,
        mode: CalendarMode,
        var: String,
    },
    CalNav {
        bot_id: i64,
        user_id: i64,
        year: i32,
        month: Month,
        mode: CalendarMode,
        var: String,
    },
    CalBack {
        bot_id: i64,
        user_id: i64,
        var: String,
    },
    CalTime {
        bot_id: i64,
        user_id: i64,
        date: Date,
        hour: u8,
        minute: u8,
        var: String,
    },
    CalIgnore,
    PgSel {
        bot_id: i64,
        user_id: i64,
        id: String,
    },
    PgNext {
        bot_id: i64,
        user_id: i64,
        page: usize,
    },
    PgPrev {
        bot_id: i64,
        user_id: i64,
        page: usize,
    },
    PgIgnore,
}

impl CallbackToken {
    pub fn namespace(&self) -> Namespace {
        match self {
            CallbackToken::CalDate { .. }
            | CallbackToken::CalNav { .. }
            | CallbackToken::CalBack { .. }
            | CallbackToken::CalTime { .. }
            | CallbackToken::CalIgnore => Namespace::Calendar,
            _ => Namespace::Pagination,
        }
    }

    /// `(bot_id, user_id)` the token was issued for; `None` for no-op tokens.
    pub fn owner(&self) -> Option<(i64, i64)> {
        match self {
            CallbackToken::CalDate { bot_id, user_id, .. }
            | CallbackToken::CalNav { bot_id, user_id, .. }
            | CallbackToken::CalBack { bot_id, user_id, .. }
            | CallbackToken::CalTime { bot_id, user_id, .. }
            | CallbackToken::PgSel { bot_id, user_id, .. }
            | CallbackToken::PgNext { bot_id, user_id, .. }
            | CallbackToken::PgPrev { bot_id, user_id, .. } => Some((*bot_id, *user_id)),
            CallbackToken::CalIgnore | CallbackToken::PgIgnore => None,
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, CallbackToken::CalIgnore | CallbackToken::PgIgnore)
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackToken::CalDate {
                bot_id,
                user_id,
                date,
                mode,
                var,
            } => write!(
                f,
                "cal_date:{bot_id}:{user_id}:{}:{}:{var}",
                format_iso_date(*date),
                mode.as_str()
            ),
            CallbackToken::CalNav {
                bot_id,
                user_id,
                year,
                month,
                mode,
                var,
            } => write!(
                f,
                "cal_nav:{bot_id}:{user_id}:{year:04}-{:02}:{}:{var}",
                u8::from(*month),
                mode.as_str()
            ),
            CallbackToken::CalBack {
                bot_id,
                user_id,
                var,
            } => write!(f, "cal_back:{bot_id}:{user_id}:{var}"),
            CallbackToken::CalTime {
                bot_id,
                user_id,
                date,
                hour,
                minute,
                var,
            } => write!(
                f,
                "cal_time:{bot_id}:{user_id}:{}:{hour:02}-{minute:02}:{var}",
                format_iso_date(*date)
            ),
            CallbackToken::CalIgnore => f.write_str("cal_ignore"),
            CallbackToken::PgSel {
                bot_id,
                user_id,
                id,
            } => write!(f, "pg:sel:{bot_id}:{user_id}:{id}"),
            CallbackToken::PgNext {
                bot_id,
                user_id,
                page,
            } => write!(f, "pg:next:{bot_id}:{user_id}:{page}"),
            CallbackToken::PgPrev {
                bot_id,
                user_id,
                page,
            } => write!(f, "pg:prev:{bot_id}:{user_id}:{page}"),
            CallbackToken::PgIgnore => f.write_str("pg:ignore"),
        }
    }
}

struct Fields<'a> {
    kind: &'static str,
    parts: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(kind: &'static str, parts: Vec<&'a str>, expected: usize) -> Result<Self, TokenError> {
        if parts.len() != expected {
            return Err(TokenError::FieldCount {
                kind,
                expected,
                got: parts.len(),
            });
        }
        Ok(Self { kind, parts })
    }

    fn invalid(&self, field: &'static str, value: &str) -> TokenError {
        TokenError::InvalidField {
            kind: self.kind,
            field,
            value: value.to_string(),
        }
    }

    fn int(&self, index: usize, field: &'static str) -> Result<i64, TokenError> {
        let raw = self.parts[index];
        raw.parse().map_err(|_| self.invalid(field, raw))
    }

    /// Page numbers are capped at `u32::MAX` so offset arithmetic stays in range.
    fn page(&self, index: usize) -> Result<usize, TokenError> {
        let raw = self.parts[index];
        raw.parse::<u32>()
            .ok()
            .and_then(|page| usize::try_from(page).ok())
            .ok_or_else(|| self.invalid("page", raw))
    }

    fn date(&self, index: usize) -> Result<Date, TokenError> {
        let raw = self.parts[index];
        parse_iso_date(raw).ok_or_else(|| self.invalid("date", raw))
    }

    fn mode(&self, index: usize) -> Result<CalendarMode, TokenError> {
        let raw = self.parts[index];
        CalendarMode::parse(raw).ok_or_else(|| self.invalid("mode", raw))
    }

    fn var(&self, index: usize) -> Result<String, TokenError> {
        let raw = self.parts[index];
        if is_token_safe(raw) {
            Ok(raw.to_string())
        } else {
            Err(self.invalid("var", raw))
        }
    }

    fn month(&self, index: usize) -> Result<(i32, Month), TokenError> {
        let raw = self.parts[index];
        let parsed = raw.split_once('-').and_then(|(year, month)| {
            if year.len() != 4 || month.len() != 2 {
                return None;
            }
            let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
            Some((year.parse::<i32>().ok()?, month))
        });
        parsed.ok_or_else(|| self.invalid("month", raw))
    }

    fn time(&self, index: usize) -> Result<(u8, u8), TokenError> {
        let raw = self.parts[index];
        let parsed = raw.split_once('-').and_then(|(hour, minute)| {
            if hour.len() != 2 || minute.len() != 2 {
                return None;
            }
            let hour = hour.parse::<u8>().ok().filter(|h| *h < 24)?;
            let minute = minute.parse::<u8>().ok().filter(|m| *m < 60)?;
            Some((hour, minute))
        });
        parsed.ok_or_else(|| self.invalid("time", raw))
    }
}

impl FromStr for CallbackToken {
    type Err = TokenError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(':').collect();
        let (pg, kind, rest) = match parts.as_slice() {
            ["cal_ignore", ..] => return Ok(CallbackToken::CalIgnore),
            ["pg", "ignore", ..] => return Ok(CallbackToken::PgIgnore),
            ["pg", sub, rest @ ..] => (true, *sub, rest.to_vec()),
            [head, rest @ ..] => (false, *head, rest.to_vec()),
            [] => return Err(TokenError::Unknown(raw.to_string())),
        };
        match kind {
            "cal_date" if !pg => {
                let f = Fields::new("cal_date", rest, 5)?;
                Ok(CallbackToken::CalDate {
                    bot_id: f.int(0, "bot_id")?,
                    user_id: f.int(1, "user_id")?,
                    date: f.date(2)?,
                    mode: f.mode(3)?,
                    var: f.var(4)?,
                })
            }
            "cal_nav" if !pg => {
                let f = Fields::new("cal_nav", rest, 5)?;
                let (year, month) = f.month(2)?;
                Ok(CallbackToken::CalNav {
                    bot_id: f.int(0, "bot_id")?,
                    user_id: f.int(1, "user_id")?,
                    year,
                    month,
                    mode: f.mode(3)?,
                    var: f.var(4)?,
                })
            }
            "cal_back" if !pg => {
                let f = Fields::new("cal_back", rest, 3)?;
                Ok(CallbackToken::CalBack {
                    bot_id: f.int(0, "bot_id")?,
                    user_id: f.int(1, "user_id")?,
                    var: f.var(2)?,
                })
            }
            "cal_time" if !pg => {
                let f = Fields::new("cal_time", rest, 5)?;
                let (hour, minute) = f.time(3)?;
                Ok(CallbackToken::CalTime {
                    bot_id: f.int(0, "bot_id")?,
                    user_id: f.int(1, "user_id")?,
                    date: f.date(2)?,
                    hour,
                    minute,
                    var: f.var(4)?,
                })
            }
            "sel" if pg => {
                let f = Fields::new("pg:sel", rest, 3)?;
                let id = f.parts[2];
                if id.is_empty() {
                    return Err(f.invalid("id", id));
                }
                Ok(CallbackToken::PgSel {
                    bot_id: f.int(0, "bot_id")?,
                    user_id: f.int(1, "user_id")?,
                    id: id.to_string(),
                })
            }
            "next" | "prev" if pg => {
                let f = Fields::new(if kind == "next" { "pg:next" } else { "pg:prev" }, rest, 3)?;
                let (bot_id, user_id, page) = (f.int(0, "bot_id")?, f.int(1, "user_id")?, f.page(2)?);
                Ok(if kind == "next" {
                    CallbackToken::PgNext {
                        bot_id,
                        user_id,
                        page,
                    }
                } else {
                    CallbackToken::PgPrev {
                        bot_id,
                        user_id,
                        page,
                    }
                })
            }
            _ => Err(TokenError::Unknown(raw.to_string())),
        }
    }
}
