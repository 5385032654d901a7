//! Action pipeline run by wizard hooks.

pub mod ratelimit;
pub mod reply;
pub mod sql;
pub mod sql_guard;

use std::fmt;

use botflow_spec::{Action, ActionDef, RateLimitParams};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::context::ExecContext;
use crate::engine::Engine;
use crate::error::ActionError;
use crate::render::messages;
use crate::reply::RenderedReply;
use ratelimit::{RateDecision, RateLimiter};
use sql::shape_rows;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    OnEnter,
    OnStep,
    OnComplete,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hook::OnEnter => "on_enter",
            Hook::OnStep => "on_step",
            Hook::OnComplete => "on_complete",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Every action ran; carries the last `action.reply_template` output.
    Completed(Option<RenderedReply>),
    /// A rate limit stopped the hook; the reply explains why.
    Blocked(RenderedReply),
}

impl Engine {
    /// Runs `actions` in order against `ctx`. The first failing action aborts
    /// the rest.
    pub async fn run_hook(
        &self,
        hook: Hook,
        actions: &[ActionDef],
        ctx: &mut ExecContext,
    ) -> Result<HookOutcome, ActionError> {
        let mut last_reply = None;
        for (index, def) in actions.iter().enumerate() {
            match self.run_action(def, ctx, &mut last_reply).await {
                Ok(None) => {}
                Ok(Some(blocked)) => {
                    debug!(%hook, index, "hook stopped by rate limit");
                    return Ok(HookOutcome::Blocked(blocked));
                }
                Err(err) => {
                    self.metrics.action_failure();
                    match &err {
                        ActionError::SecurityViolation(reason) => {
                            self.metrics.security_violation();
                            warn!(%hook, index, action = %def.kind, %reason, "statement rejected");
                        }
                        _ => error!(%hook, index, action = %def.kind, code = err.code(), error = %err, "action failed"),
                    }
                    return Err(err);
                }
            }
        }
        Ok(HookOutcome::Completed(last_reply))
    }

    async fn run_action(
        &self,
        def: &ActionDef,
        ctx: &mut ExecContext,
        last_reply: &mut Option<RenderedReply>,
    ) -> Result<Option<RenderedReply>, ActionError> {
        match def.resolve()? {
            Action::SqlQuery(params) => {
                let rows = self.sql.query(&params.sql, &ctx.sql_params()).await?;
                ctx.set_data(params.result_var, shape_rows(rows, params.scalar, params.flatten));
            }
            Action::SqlExec(params) => {
                let affected = self.sql.execute(&params.sql, &ctx.sql_params()).await?;
                if let Some(result_var) = params.result_var {
                    ctx.set_data(result_var, Value::from(affected));
                }
            }
            Action::ReplyTemplate(params) => {
                *last_reply = Some(reply::render_reply(&self.renderer, &params, ctx).await);
            }
            Action::RateLimit(params) => return Ok(self.rate_limit(&params, ctx).await),
        }
        Ok(None)
    }

    async fn rate_limit(&self, params: &RateLimitParams, ctx: &ExecContext) -> Option<RenderedReply> {
        let suffix = match &params.key_suffix {
            Some(template) => Some(self.renderer.render(template, ctx).await),
            None => None,
        };
        let key = RateLimiter::key(&ctx.caller, params.scope, suffix.as_deref());
        let RateDecision::Blocked { retry_in } = self
            .limiter
            .check(&key, params.window_s, params.allowance)
            .await
        else {
            return None;
        };
        self.metrics.rate_limited();
        let text = match &params.message {
            Some(message) => {
                let mut extra = Map::new();
                extra.insert("retry_in".into(), Value::from(retry_in));
                self.renderer.render_with(message, ctx, &extra).await
            }
            None => {
                self.renderer
                    .message(ctx, messages::RATE_LIMITED, &[("retry_in", retry_in.to_string())])
                    .await
            }
        };
        Some(RenderedReply::text(text).with_meta(serde_json::json!({ "retry_in": retry_in })))
    }
}
