use botflow_spec::{StepSpec, WidgetDef};
use tracing::{debug, warn};

use crate::context::{Caller, ExecContext};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::reply::RenderedReply;
use crate::widget::WidgetEvent;
use crate::widget::pagination::PaginationWidget;
use crate::widget::token::{CallbackToken, Namespace, namespace_of};
use crate::wizard::{StepInput, WizardMachine};

/// Routes widget callback tokens to the widget of the caller's current step.
pub struct CallbackRouter<'a> {
    engine: &'a Engine,
}

impl<'a> CallbackRouter<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub async fn route(&self, caller: Caller, raw: &str) -> Result<Option<RenderedReply>, EngineError> {
        if namespace_of(raw).is_none() {
            debug!(token = raw, "non-widget callback dropped");
            return Ok(None);
        }
        let token: CallbackToken = match raw.parse() {
            Ok(token) => token,
            Err(err) => {
                warn!(token = raw, error = %err, "malformed callback token dropped");
                self.engine.metrics.stale_callback();
                return Ok(None);
            }
        };
        if token.is_ignore() {
            return Ok(None);
        }
        if token.owner() != Some((caller.bot_id, caller.user_id)) {
            warn!(
                token = raw,
                bot_id = caller.bot_id,
                user_id = caller.user_id,
                "callback token issued for another identity"
            );
            self.engine.metrics.stale_callback();
            return Ok(None);
        }

        let Some(session) = self.engine.load_session(&caller).await? else {
            debug!(token = raw, "callback without active session dropped");
            self.engine.metrics.stale_callback();
            return Ok(None);
        };
        let Some(StepSpec::Widget(step)) = session.current_step().cloned() else {
            debug!(token = raw, "current step is not a widget");
            self.engine.metrics.stale_callback();
            return Ok(None);
        };

        let spec = self.engine.load_spec(caller.bot_id).await?;
        let locale = self
            .engine
            .renderer
            .localizer()
            .select_locale(caller.bot_id, caller.user_id, &spec.locale_config())
            .await;
        let ctx = ExecContext::from_session(caller, locale.as_str(), &session);

        let event = match (&step.widget, token.namespace()) {
            (WidgetDef::Calendar(def), Namespace::Calendar) => {
                self.engine.calendar(def, &step.var, &ctx).decode(&token)
            }
            (WidgetDef::Pagination(def), Namespace::Pagination) => {
                match PaginationWidget::new(def, caller).decode(self.engine, &ctx, &token).await {
                    Ok(event) => event,
                    Err(err) => {
                        self.engine.metrics.action_failure();
                        warn!(token = raw, code = err.code(), error = %err, "pagination source failed");
                        return Ok(Some(self.engine.generic_error(caller, &locale).await));
                    }
                }
            }
            _ => WidgetEvent::Rejected("token does not match current widget"),
        };

        match event {
            WidgetEvent::Ignore => Ok(None),
            WidgetEvent::Rejected(reason) => {
                debug!(token = raw, reason, "callback rejected");
                self.engine.metrics.stale_callback();
                Ok(None)
            }
            WidgetEvent::View(view) => Ok(Some(self.engine.render_view(&step.widget, view, &ctx).await)),
            WidgetEvent::Selected(value) => {
                debug!(entry_cmd = session.entry_cmd(), var = %step.var, "widget value selected");
                WizardMachine::new(self.engine)
                    .advance(
                        caller,
                        &locale,
                        session,
                        StepInput::Widget {
                            var: step.var.clone(),
                            value,
                        },
                    )
                    .await
            }
        }
    }
}
