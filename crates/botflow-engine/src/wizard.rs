//! Wizard state machine: start, advance, complete.

use botflow_spec::{FlowSpec, StepSpec, WizardParams, WizardSession};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::action::{Hook, HookOutcome};
use crate::context::{Caller, ExecContext};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::render::messages;
use crate::reply::RenderedReply;

/// Input that answers the current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    Text(String),
    /// Terminal widget value, tagged with the variable its token carried.
    Widget { var: String, value: String },
}

pub struct WizardMachine<'a> {
    engine: &'a Engine,
}

impl<'a> WizardMachine<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Starts `flow` from scratch, discarding any session the caller had.
    pub async fn start(
        &self,
        caller: Caller,
        locale: &str,
        flow: &FlowSpec,
    ) -> Result<RenderedReply, EngineError> {
        let Some(params) = flow.as_wizard() else {
            return Ok(self.engine.generic_error(caller, locale).await);
        };
        self.engine.delete_session(&caller).await?;

        let ttl = params
            .ttl_sec
            .unwrap_or(self.engine.config.default_session_ttl_sec);
        let mut session = WizardSession::new(flow.clone(), ttl);
        let mut ctx = ExecContext::from_session(caller, locale, &session);
        info!(
            bot_id = caller.bot_id,
            user_id = caller.user_id,
            entry_cmd = %flow.entry_cmd,
            steps = params.steps.len(),
            "starting wizard"
        );

        let intro = match self.engine.run_hook(Hook::OnEnter, &params.on_enter, &mut ctx).await {
            Ok(HookOutcome::Completed(reply)) => reply,
            Ok(HookOutcome::Blocked(reply)) => return Ok(reply),
            Err(_) => return Ok(self.engine.generic_error(caller, locale).await),
        };

        if params.steps.is_empty() {
            return self.complete(caller, params, &mut ctx, intro).await;
        }

        session.vars = ctx.vars.clone();
        session.context = ctx.data.clone();
        let prompt = match self.prompt(&session, &ctx).await {
            Ok(prompt) => prompt,
            Err(reply) => return Ok(reply),
        };
        self.engine.save_session(&caller, &session).await?;
        Ok(match intro {
            Some(intro) if !intro.text.is_empty() => RenderedReply {
                text: format!("{}\n\n{}", intro.text, prompt.text),
                ..prompt
            },
            _ => prompt,
        })
    }

    /// Applies `input` to the current step of `session`. `None` means the
    /// input was stale and nothing should be sent.
    pub async fn advance(
        &self,
        caller: Caller,
        locale: &str,
        mut session: WizardSession,
        input: StepInput,
    ) -> Result<Option<RenderedReply>, EngineError> {
        let Some(params) = session.flow_snapshot.as_wizard().cloned() else {
            self.engine.delete_session(&caller).await?;
            return Ok(None);
        };
        let Some(step) = session.current_step().cloned() else {
            self.engine.delete_session(&caller).await?;
            return Ok(None);
        };
        let mut ctx = ExecContext::from_session(caller, locale, &session);

        let value = match (&step, input) {
            (StepSpec::Ask(ask), StepInput::Text(text)) => {
                if let Some(validate) = &ask.validate
                    && !input_matches(&validate.regex, &text)
                {
                    debug!(var = %ask.var, "input failed validation");
                    let msg = if validate.msg.is_empty() {
                        self.engine
                            .renderer
                            .message(&ctx, messages::INVALID_INPUT, &[])
                            .await
                    } else {
                        self.engine.renderer.render(&validate.msg, &ctx).await
                    };
                    return Ok(Some(RenderedReply::text(msg)));
                }
                text
            }
            (StepSpec::Widget(_), StepInput::Text(_)) => {
                debug!(var = %step.var(), "text sent to widget step, re-rendering");
                return match self.prompt(&session, &ctx).await {
                    Ok(prompt) => Ok(Some(prompt)),
                    Err(reply) => Ok(Some(reply)),
                };
            }
            (StepSpec::Widget(widget), StepInput::Widget { var, value }) if var == widget.var => value,
            (_, StepInput::Widget { var, .. }) => {
                debug!(token_var = %var, step_var = %step.var(), "stale widget value dropped");
                self.engine.metrics.stale_callback();
                return Ok(None);
            }
        };

        ctx.vars.insert(step.var().to_string(), value);

        match self.engine.run_hook(Hook::OnStep, &params.on_step, &mut ctx).await {
            Ok(HookOutcome::Completed(_)) => {}
            Ok(HookOutcome::Blocked(reply)) => return Ok(Some(reply)),
            Err(_) => return Ok(Some(self.engine.generic_error(caller, locale).await)),
        }

        if session.step_index + 1 >= params.steps.len() {
            return self
                .complete(caller, &params, &mut ctx, None)
                .await
                .map(Some);
        }

        session.step_index += 1;
        session.vars = ctx.vars.clone();
        session.context = ctx.data.clone();
        let prompt = match self.prompt(&session, &ctx).await {
            Ok(prompt) => prompt,
            Err(reply) => return Ok(Some(reply)),
        };
        self.engine.save_session(&caller, &session).await?;
        Ok(Some(prompt))
    }

    /// Runs `on_complete`; the session is only deleted when it succeeds so a
    /// failed completion can be retried. `earlier` is used when the hook
    /// renders nothing.
    async fn complete(
        &self,
        caller: Caller,
        params: &WizardParams,
        ctx: &mut ExecContext,
        earlier: Option<RenderedReply>,
    ) -> Result<RenderedReply, EngineError> {
        let reply = match self
            .engine
            .run_hook(Hook::OnComplete, &params.on_complete, ctx)
            .await
        {
            Ok(HookOutcome::Completed(reply)) => reply,
            Ok(HookOutcome::Blocked(reply)) => return Ok(reply),
            Err(_) => return Ok(self.engine.generic_error(caller, &ctx.locale).await),
        };
        if let Err(err) = self.engine.delete_session(&caller).await {
            warn!(bot_id = caller.bot_id, user_id = caller.user_id, error = %err, "failed to delete finished session");
        }
        info!(bot_id = caller.bot_id, user_id = caller.user_id, vars = ctx.vars.len(), "wizard completed");
        match reply.or(earlier) {
            Some(reply) => Ok(reply),
            None => Ok(RenderedReply::text(
                self.engine
                    .renderer
                    .message(ctx, messages::WIZARD_DONE, &[])
                    .await,
            )),
        }
    }

    /// Prompt of the current step. A failing widget source yields the generic
    /// error reply as `Err`.
    pub(crate) async fn prompt(
        &self,
        session: &WizardSession,
        ctx: &ExecContext,
    ) -> Result<RenderedReply, RenderedReply> {
        let Some(step) = session.current_step() else {
            return Err(self.engine.generic_error(ctx.caller, &ctx.locale).await);
        };
        match step {
            StepSpec::Ask(ask) => Ok(RenderedReply::text(
                self.engine.renderer.render(&ask.ask, ctx).await,
            )),
            StepSpec::Widget(widget) => {
                match self.engine.widget_prompt(&widget.widget, &widget.var, ctx).await {
                    Ok(reply) => Ok(reply),
                    Err(err) => {
                        self.engine.metrics.action_failure();
                        warn!(var = %widget.var, code = err.code(), error = %err, "widget source failed");
                        Err(self.engine.generic_error(ctx.caller, &ctx.locale).await)
                    }
                }
            }
        }
    }
}

/// Regex check anchored to the whole input. Patterns that fail to compile
/// accept the input.
fn input_matches(pattern: &str, input: &str) -> bool {
    let anchored = format!("^(?:{pattern})$");
    match Regex::new(&anchored) {
        Ok(regex) => regex.is_match(input),
        Err(err) => {
            warn!(pattern, error = %err, "invalid validation regex, accepting input");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::input_matches;

    #[test]
    fn validation_is_anchored() {
        assert!(input_matches(r"\d+", "123"));
        assert!(!input_matches(r"\d+", "12a"));
        assert!(input_matches(r"a|b", "b"));
    }

    #[test]
    fn broken_pattern_fails_open() {
        assert!(input_matches(r"(", "anything"));
    }
}
