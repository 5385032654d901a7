use botflow_spec::{CalendarDef, CalendarMode, format_iso_date};
use serde_json::json;
use time::{Date, Month, OffsetDateTime, UtcOffset};
use tracing::warn;

use super::token::{CallbackToken, MAX_TOKEN_BYTES};
use super::{ViewPrompt, WidgetEvent, WidgetView};
use crate::context::Caller;
use crate::reply::{Button, Keyboard};

const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const TIMES_PER_ROW: usize = 4;
const BLANK: &str = " ";

/// Parses `UTC`, `Z` or a fixed `±HH:MM` offset.
pub fn parse_tz(raw: &str) -> Option<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
        return Some(UtcOffset::UTC);
    }
    let (negative, rest) = match raw.as_bytes().first()? {
        b'+' => (false, &raw[1..]),
        b'-' => (true, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "00"));
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: u8 = hours.parse().ok().filter(|h| *h <= 23)?;
    let minutes: u8 = minutes.parse().ok().filter(|m| *m <= 59)?;
    let (hours, minutes) = (hours as i8, minutes as i8);
    if negative {
        UtcOffset::from_hms(-hours, -minutes, 0).ok()
    } else {
        UtcOffset::from_hms(hours, minutes, 0).ok()
    }
}

fn month_start(year: i32, month: Month) -> Option<Date> {
    Date::from_calendar_date(year, month, 1).ok()
}

fn month_end(year: i32, month: Month) -> Option<Date> {
    Date::from_calendar_date(year, month, time::util::days_in_year_month(year, month)).ok()
}

fn shift_month(year: i32, month: Month, forward: bool) -> (i32, Month) {
    match (forward, month) {
        (true, Month::December) => (year + 1, Month::January),
        (false, Month::January) => (year - 1, Month::December),
        (true, _) => (year, month.next()),
        (false, _) => (year, month.previous()),
    }
}

fn ignore() -> Button {
    Button::callback(BLANK, CallbackToken::CalIgnore.encode())
}

fn token_button(label: impl Into<String>, token: CallbackToken) -> Button {
    let encoded = token.encode();
    if encoded.len() > MAX_TOKEN_BYTES {
        warn!(token = %encoded, len = encoded.len(), "calendar token exceeds transport limit");
    }
    Button::callback(label, encoded)
}

/// Month grid and time picker for one calendar step.
pub struct CalendarWidget<'a> {
    def: &'a CalendarDef,
    var: &'a str,
    caller: Caller,
    now: OffsetDateTime,
}

impl<'a> CalendarWidget<'a> {
    /// `now` is shifted into the calendar's timezone, falling back to
    /// `default_tz` and then UTC.
    pub fn new(
        def: &'a CalendarDef,
        var: &'a str,
        caller: Caller,
        now: OffsetDateTime,
        default_tz: &str,
    ) -> Self {
        let tz = def.tz.as_deref().unwrap_or(default_tz);
        let offset = parse_tz(tz).unwrap_or_else(|| {
            warn!(tz, "unsupported calendar timezone, using UTC");
            UtcOffset::UTC
        });
        Self {
            def,
            var,
            caller,
            now: now.to_offset(offset),
        }
    }

    pub fn today(&self) -> Date {
        self.now.date()
    }

    pub fn bounds(&self) -> (Option<Date>, Option<Date>) {
        let today = self.today();
        (
            self.def.min.map(|bound| bound.resolve(today)),
            self.def.max.map(|bound| bound.resolve(today)),
        )
    }

    pub fn in_range(&self, date: Date) -> bool {
        let (min, max) = self.bounds();
        min.is_none_or(|min| date >= min) && max.is_none_or(|max| date <= max)
    }

    fn month_in_range(&self, year: i32, month: Month) -> bool {
        let (min, max) = self.bounds();
        let (Some(first), Some(last)) = (month_start(year, month), month_end(year, month)) else {
            return false;
        };
        min.is_none_or(|min| last >= min) && max.is_none_or(|max| first <= max)
    }

    /// Month shown first: today's, clamped into the selectable range.
    pub fn initial_month(&self) -> (i32, Month) {
        let (min, max) = self.bounds();
        let mut anchor = self.today();
        if let Some(min) = min
            && anchor < min
        {
            anchor = min;
        }
        if let Some(max) = max
            && anchor > max
        {
            anchor = max;
        }
        (anchor.year(), anchor.month())
    }

    pub fn initial_view(&self) -> WidgetView {
        let (year, month) = self.initial_month();
        self.month_view(year, month)
    }

    pub fn month_view(&self, year: i32, month: Month) -> WidgetView {
        let mode = self.def.mode;
        let nav = |(year, month): (i32, Month), label: &str| {
            if self.month_in_range(year, month) {
                token_button(
                    label,
                    CallbackToken::CalNav {
                        bot_id: self.caller.bot_id,
                        user_id: self.caller.user_id,
                        year,
                        month,
                        mode,
                        var: self.var.to_string(),
                    },
                )
            } else {
                ignore()
            }
        };

        let mut rows = vec![
            vec![
                nav(shift_month(year, month, false), "«"),
                Button::callback(format!("{month} {year}"), CallbackToken::CalIgnore.encode()),
                nav(shift_month(year, month, true), "»"),
            ],
            WEEKDAYS
                .iter()
                .map(|day| Button::callback(*day, CallbackToken::CalIgnore.encode()))
                .collect(),
        ];

        if let Some(first) = month_start(year, month) {
            let lead = usize::from(first.weekday().number_days_from_monday());
            let mut cells: Vec<Button> = (0..lead).map(|_| ignore()).collect();
            for day in 1..=time::util::days_in_year_month(year, month) {
                let Ok(date) = Date::from_calendar_date(year, month, day) else {
                    continue;
                };
                if self.in_range(date) {
                    cells.push(token_button(
                        day.to_string(),
                        CallbackToken::CalDate {
                            bot_id: self.caller.bot_id,
                            user_id: self.caller.user_id,
                            date,
                            mode,
                            var: self.var.to_string(),
                        },
                    ));
                } else {
                    cells.push(ignore());
                }
            }
            while cells.len() % 7 != 0 {
                cells.push(ignore());
            }
            rows.extend(cells.chunks(7).map(<[Button]>::to_vec));
        }

        WidgetView {
            prompt: ViewPrompt::Default,
            keyboard: Keyboard::inline(rows),
            meta: json!({
                "widget": "calendar",
                "view": "month",
                "month": format!("{year:04}-{:02}", u8::from(month)),
            }),
        }
    }

    /// Selectable `(hour, minute)` slots of `date`; past slots of today are skipped.
    pub fn slots(&self, date: Date) -> Vec<(u8, u8)> {
        let start = u32::from(self.def.start_hour) * 60;
        let end = u32::from(self.def.end_hour.min(24)) * 60;
        let step = u32::from(self.def.step_min.max(1));
        let cutoff = (date == self.today())
            .then(|| u32::from(self.now.hour()) * 60 + u32::from(self.now.minute()));
        (start..end)
            .step_by(step as usize)
            .filter(|minutes| cutoff.is_none_or(|cutoff| *minutes > cutoff))
            .map(|minutes| ((minutes / 60) as u8, (minutes % 60) as u8))
            .collect()
    }

    pub fn time_view(&self, date: Date) -> WidgetView {
        let buttons: Vec<Button> = self
            .slots(date)
            .into_iter()
            .map(|(hour, minute)| {
                token_button(
                    format!("{hour:02}:{minute:02}"),
                    CallbackToken::CalTime {
                        bot_id: self.caller.bot_id,
                        user_id: self.caller.user_id,
                        date,
                        hour,
                        minute,
                        var: self.var.to_string(),
                    },
                )
            })
            .collect();
        let mut rows: Vec<Vec<Button>> = buttons.chunks(TIMES_PER_ROW).map(<[Button]>::to_vec).collect();
        rows.push(vec![token_button(
            "« Back",
            CallbackToken::CalBack {
                bot_id: self.caller.bot_id,
                user_id: self.caller.user_id,
                var: self.var.to_string(),
            },
        )]);
        WidgetView {
            prompt: ViewPrompt::PickTime(date),
            keyboard: Keyboard::inline(rows),
            meta: json!({
                "widget": "calendar",
                "view": "time",
                "date": format_iso_date(date),
            }),
        }
    }

    /// Applies a calendar token. Ownership is checked by the caller.
    pub fn decode(&self, token: &CallbackToken) -> WidgetEvent {
        match token {
            CallbackToken::CalIgnore => WidgetEvent::Ignore,
            CallbackToken::CalNav {
                year,
                month,
                mode,
                var,
                ..
            } => {
                if var != self.var || *mode != self.def.mode {
                    return WidgetEvent::Rejected("stale calendar");
                }
                if !self.month_in_range(*year, *month) {
                    return WidgetEvent::Rejected("month out of range");
                }
                WidgetEvent::View(self.month_view(*year, *month))
            }
            CallbackToken::CalDate { date, mode, var, .. } => {
                if var != self.var || *mode != self.def.mode {
                    return WidgetEvent::Rejected("stale calendar");
                }
                if !self.in_range(*date) {
                    return WidgetEvent::Rejected("date out of range");
                }
                match self.def.mode {
                    CalendarMode::Date => WidgetEvent::Selected(format_iso_date(*date)),
                    CalendarMode::Datetime => WidgetEvent::View(self.time_view(*date)),
                }
            }
            CallbackToken::CalTime {
                date,
                hour,
                minute,
                var,
                ..
            } => {
                if var != self.var || self.def.mode != CalendarMode::Datetime {
                    return WidgetEvent::Rejected("stale calendar");
                }
                if !self.in_range(*date) || !self.slots(*date).contains(&(*hour, *minute)) {
                    return WidgetEvent::Rejected("time out of range");
                }
                WidgetEvent::Selected(format!(
                    "{} {hour:02}:{minute:02}",
                    format_iso_date(*date)
                ))
            }
            CallbackToken::CalBack { var, .. } => {
                if var != self.var {
                    return WidgetEvent::Rejected("stale calendar");
                }
                WidgetEvent::View(self.initial_view())
            }
            _ => WidgetEvent::Rejected("not a calendar token"),
        }
    }
}

#[cfg(test)]
mod tests {
    use botflow_spec::{DateBound, parse_iso_date};
    use time::macros::datetime;

    use super::*;

    fn def(mode: CalendarMode) -> CalendarDef {
        CalendarDef {
            text: None,
            mode,
            min: None,
            max: None,
            tz: None,
            start_hour: 9,
            end_hour: 12,
            step_min: 30,
        }
    }

    fn date(raw: &str) -> Date {
        parse_iso_date(raw).unwrap()
    }

    #[test]
    fn parses_fixed_offsets() {
        assert_eq!(parse_tz("UTC"), Some(UtcOffset::UTC));
        assert_eq!(parse_tz("+03:00"), UtcOffset::from_hms(3, 0, 0).ok());
        assert_eq!(parse_tz("-05:30"), UtcOffset::from_hms(-5, -30, 0).ok());
        assert_eq!(parse_tz("Europe/Paris"), None);
    }

    #[test]
    fn rejects_doubled_signs_and_out_of_range_offsets() {
        assert_eq!(parse_tz("--128:00"), None);
        assert_eq!(parse_tz("+-5:00"), None);
        assert_eq!(parse_tz("+24:00"), None);
        assert_eq!(parse_tz("+05:75"), None);
    }

    #[test]
    fn month_grid_starts_on_monday() {
        let def = def(CalendarMode::Date);
        let widget = CalendarWidget::new(&def, "d", Caller::new(1, 2), datetime!(2024-05-10 12:00 UTC), "UTC");
        let view = widget.month_view(2024, Month::May);
        let rows = &view.keyboard.rows;
        assert_eq!(rows[0][1].label, "May 2024");
        assert_eq!(rows[1][0].label, "Mo");
        // 2024-05-01 is a Wednesday
        assert_eq!(rows[2][0].callback_token.as_deref(), Some("cal_ignore"));
        assert_eq!(rows[2][2].label, "1");
        assert_eq!(
            rows[2][2].callback_token.as_deref(),
            Some("cal_date:1:2:2024-05-01:date:d")
        );
        assert!(rows[2..].iter().all(|row| row.len() == 7));
    }

    #[test]
    fn out_of_range_days_and_arrows_are_inert() {
        let mut def = def(CalendarMode::Date);
        def.min = Some(DateBound::Today);
        def.max = Some(DateBound::OffsetDays(5));
        let widget = CalendarWidget::new(&def, "d", Caller::new(1, 2), datetime!(2024-05-10 12:00 UTC), "UTC");
        let view = widget.month_view(2024, Month::May);
        let tokens: Vec<&str> = view.keyboard.tokens().collect();
        assert_eq!(tokens.iter().filter(|t| t.starts_with("cal_date")).count(), 6);
        assert_eq!(view.keyboard.rows[0][0].callback_token.as_deref(), Some("cal_ignore"));
        assert_eq!(view.keyboard.rows[0][2].callback_token.as_deref(), Some("cal_ignore"));

        let early = CallbackToken::CalDate {
            bot_id: 1,
            user_id: 2,
            date: date("2024-05-09"),
            mode: CalendarMode::Date,
            var: "d".into(),
        };
        assert!(matches!(widget.decode(&early), WidgetEvent::Rejected(_)));
    }

    #[test]
    fn date_mode_selects_on_first_pick() {
        let def = def(CalendarMode::Date);
        let widget = CalendarWidget::new(&def, "d", Caller::new(1, 2), datetime!(2024-05-10 12:00 UTC), "UTC");
        let token = CallbackToken::CalDate {
            bot_id: 1,
            user_id: 2,
            date: date("2024-06-01"),
            mode: CalendarMode::Date,
            var: "d".into(),
        };
        assert_eq!(widget.decode(&token), WidgetEvent::Selected("2024-06-01".into()));
    }

    #[test]
    fn datetime_mode_needs_a_time() {
        let def = def(CalendarMode::Datetime);
        let widget = CalendarWidget::new(&def, "when", Caller::new(1, 2), datetime!(2024-05-10 12:00 UTC), "UTC");
        let pick = CallbackToken::CalDate {
            bot_id: 1,
            user_id: 2,
            date: date("2024-06-01"),
            mode: CalendarMode::Datetime,
            var: "when".into(),
        };
        let WidgetEvent::View(view) = widget.decode(&pick) else {
            panic!("expected time view");
        };
        let labels: Vec<&str> = view.keyboard.rows[0].iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["09:00", "09:30", "10:00", "10:30"]);
        assert_eq!(view.keyboard.rows.last().unwrap()[0].callback_token.as_deref(), Some("cal_back:1:2:when"));

        let time = CallbackToken::CalTime {
            bot_id: 1,
            user_id: 2,
            date: date("2024-06-01"),
            hour: 11,
            minute: 30,
            var: "when".into(),
        };
        assert_eq!(widget.decode(&time), WidgetEvent::Selected("2024-06-01 11:30".into()));

        let off_grid = CallbackToken::CalTime {
            bot_id: 1,
            user_id: 2,
            date: date("2024-06-01"),
            hour: 12,
            minute: 0,
            var: "when".into(),
        };
        assert!(matches!(widget.decode(&off_grid), WidgetEvent::Rejected(_)));
    }

    #[test]
    fn past_slots_of_today_are_hidden() {
        let def = def(CalendarMode::Datetime);
        let widget = CalendarWidget::new(&def, "when", Caller::new(1, 2), datetime!(2024-05-10 10:15 UTC), "+01:00");
        // 11:15 local
        assert_eq!(widget.slots(date("2024-05-10")), vec![(11, 30)]);
    }
}
