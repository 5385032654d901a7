use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month};

use crate::error::SpecError;
use crate::keyboard::ButtonSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetDef {
    Calendar(CalendarDef),
    Pagination(PaginationDef),
}

impl WidgetDef {
    /// Prompt text shown above the widget, if the spec sets one.
    pub fn prompt(&self) -> Option<&str> {
        match self {
            WidgetDef::Calendar(def) => def.text.as_deref(),
            WidgetDef::Pagination(def) => def.text.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarMode {
    #[default]
    Date,
    Datetime,
}

impl CalendarMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarMode::Date => "date",
            CalendarMode::Datetime => "datetime",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "date" => Some(CalendarMode::Date),
            "datetime" => Some(CalendarMode::Datetime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub mode: CalendarMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<DateBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<DateBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    #[serde(default = "default_start_hour")]
    pub start_hour: u8,
    #[serde(default = "default_end_hour")]
    pub end_hour: u8,
    #[serde(default = "default_step_min")]
    pub step_min: u16,
}

fn default_start_hour() -> u8 {
    9
}

fn default_end_hour() -> u8 {
    21
}

fn default_step_min() -> u16 {
    30
}

/// Calendar bound: a fixed date or a date relative to "today" in the widget timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateBound {
    Today,
    OffsetDays(i64),
    Fixed(Date),
}

impl DateBound {
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("today") {
            return Ok(DateBound::Today);
        }
        if let Some(days) = trimmed.strip_suffix('d')
            && (days.starts_with('+') || days.starts_with('-'))
        {
            return days
                .parse::<i64>()
                .map(DateBound::OffsetDays)
                .map_err(|_| SpecError::InvalidBound(raw.to_string()));
        }
        parse_iso_date(trimmed)
            .map(DateBound::Fixed)
            .ok_or_else(|| SpecError::InvalidBound(raw.to_string()))
    }

    pub fn resolve(&self, today: Date) -> Date {
        match self {
            DateBound::Today => today,
            DateBound::OffsetDays(days) => today
                .checked_add(Duration::days(*days))
                .unwrap_or(today),
            DateBound::Fixed(date) => *date,
        }
    }
}

impl TryFrom<String> for DateBound {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DateBound::parse(&value)
    }
}

impl From<DateBound> for String {
    fn from(value: DateBound) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Today => f.write_str("today"),
            DateBound::OffsetDays(days) => write!(f, "{days:+}d"),
            DateBound::Fixed(date) => f.write_str(&format_iso_date(*date)),
        }
    }
}

/// Parses `YYYY-MM-DD`.
pub fn parse_iso_date(raw: &str) -> Option<Date> {
    let mut parts = raw.split('-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    if parts.next().is_some() || year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    Date::from_calendar_date(year.parse().ok()?, month, day.parse().ok()?).ok()
}

pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageSource {
    /// Parameterized query; `:limit` and `:offset` are bound per page.
    Sql { sql: String },
    /// List stored in the session context under `key`.
    Ctx { key: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub source: PageSource,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    pub item_template: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_keyboard: Vec<Vec<ButtonSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_text: Option<String>,
}

fn default_page_size() -> usize {
    5
}

fn default_id_field() -> String {
    "id".into()
}
