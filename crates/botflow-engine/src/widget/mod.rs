//! Inline-keyboard widgets embedded in wizard steps.

pub mod calendar;
pub mod pagination;
pub mod token;

use botflow_spec::{CalendarDef, PaginationDef, WidgetDef, format_iso_date};
use serde_json::Value;
use time::{Date, OffsetDateTime};

use crate::context::ExecContext;
use crate::engine::Engine;
use crate::error::ActionError;
use crate::render::messages;
use crate::reply::{Keyboard, RenderedReply};
use calendar::CalendarWidget;
use pagination::PaginationWidget;

/// Which text accompanies a widget keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewPrompt {
    /// The widget's own `text`, or the engine default.
    Default,
    /// Nothing to choose from.
    Empty,
    /// Time picker for a chosen date.
    PickTime(Date),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView {
    pub prompt: ViewPrompt,
    pub keyboard: Keyboard,
    pub meta: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// Intermediate state; re-render without advancing the wizard.
    View(WidgetView),
    /// Terminal value for the step variable.
    Selected(String),
    Ignore,
    Rejected(&'static str),
}

impl Engine {
    pub(crate) fn calendar<'a>(
        &self,
        def: &'a CalendarDef,
        var: &'a str,
        ctx: &ExecContext,
    ) -> CalendarWidget<'a> {
        CalendarWidget::new(
            def,
            var,
            ctx.caller,
            OffsetDateTime::now_utc(),
            &self.config.calendar_default_tz,
        )
    }

    /// First view of a widget step.
    pub(crate) async fn widget_prompt(
        &self,
        widget: &WidgetDef,
        var: &str,
        ctx: &ExecContext,
    ) -> Result<RenderedReply, ActionError> {
        let view = match widget {
            WidgetDef::Calendar(def) => self.calendar(def, var, ctx).initial_view(),
            WidgetDef::Pagination(def) => {
                let widget = PaginationWidget::new(def, ctx.caller);
                let page = widget.fetch(self, ctx, 0).await?;
                widget.view(self, ctx, 0, page).await
            }
        };
        Ok(self.render_view(widget, view, ctx).await)
    }

    pub(crate) async fn render_view(
        &self,
        widget: &WidgetDef,
        view: WidgetView,
        ctx: &ExecContext,
    ) -> RenderedReply {
        let text = match (&view.prompt, widget) {
            (ViewPrompt::PickTime(date), _) => {
                self.renderer
                    .message(ctx, messages::CALENDAR_PICK_TIME, &[("date", format_iso_date(*date))])
                    .await
            }
            (ViewPrompt::Empty, _) => match widget {
                WidgetDef::Pagination(PaginationDef {
                    empty_text: Some(empty_text),
                    ..
                }) => self.renderer.render(empty_text, ctx).await,
                _ => self.renderer.message(ctx, messages::PAGINATION_EMPTY, &[]).await,
            },
            (ViewPrompt::Default, _) => match widget.prompt() {
                Some(text) => self.renderer.render(text, ctx).await,
                None => {
                    let fallback = match widget {
                        WidgetDef::Calendar(_) => messages::CALENDAR_PICK_DATE,
                        WidgetDef::Pagination(_) => messages::PAGINATION_PICK,
                    };
                    self.renderer.message(ctx, fallback, &[]).await
                }
            },
        };
        RenderedReply::text(text)
            .with_keyboard(view.keyboard)
            .with_meta(view.meta)
    }
}
