#![allow(missing_docs)]

pub mod action;
pub mod bot;
pub mod error;
pub mod flow;
pub mod i18n;
pub mod keyboard;
pub mod session;
pub mod step;
pub mod validate;
pub mod widget;

pub use action::{
    Action, ActionDef, KNOWN_ACTIONS, RateLimitParams, RateLimitScope, ReplyTemplateParams,
    SqlExecParams, SqlQueryParams,
};
pub use bot::{BotSpec, IntentSpec, LegacyWizardSpec};
pub use error::SpecError;
pub use flow::{FlowKind, FlowSpec, MenuParams, WizardParams};
pub use i18n::{LocaleConfig, LocaleStrategy};
pub use keyboard::{ButtonSpec, ParseMode};
pub use session::{FORMAT_VERSION, WizardSession};
pub use step::{AskStep, StepSpec, ValidateSpec, WidgetStep};
pub use validate::{IssueSeverity, SpecIssue, SpecReport, is_token_safe, validate_bot_spec};
pub use widget::{
    CalendarDef, CalendarMode, DateBound, PageSource, PaginationDef, WidgetDef,
    format_iso_date, parse_iso_date,
};
