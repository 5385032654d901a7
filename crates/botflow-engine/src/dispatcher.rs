use botflow_spec::MenuParams;
use tracing::{debug, error, info};

use crate::action::reply::render_keyboard;
use crate::context::{Caller, ExecContext};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::render::messages;
use crate::reply::RenderedReply;
use crate::router::CallbackRouter;
use crate::wizard::{StepInput, WizardMachine};

/// `/cmd@BotName args` -> `/cmd args`, so group-chat commands match entry commands.
pub fn normalize_command(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with('/') || text.contains(char::is_whitespace) {
        return text;
    }
    text.split_once('@').map(|(cmd, _)| cmd).unwrap_or(text)
}

impl Engine {
    /// Handles one inbound text message. Never fails: errors become the
    /// generic localized reply.
    pub async fn handle(&self, bot_id: i64, user_id: i64, text: &str) -> RenderedReply {
        self.handle_as(Caller::new(bot_id, user_id), text).await
    }

    pub async fn handle_as(&self, caller: Caller, text: &str) -> RenderedReply {
        match self.dispatch(caller, text).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(bot_id = caller.bot_id, user_id = caller.user_id, error = %err, "turn failed");
                self.generic_error(caller, "").await
            }
        }
    }

    /// Handles one callback token. `None` means nothing should be sent.
    pub async fn handle_callback(&self, bot_id: i64, user_id: i64, token: &str) -> Option<RenderedReply> {
        self.handle_callback_as(Caller::new(bot_id, user_id), token).await
    }

    pub async fn handle_callback_as(&self, caller: Caller, token: &str) -> Option<RenderedReply> {
        match CallbackRouter::new(self).route(caller, token).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(bot_id = caller.bot_id, user_id = caller.user_id, error = %err, "callback failed");
                Some(self.generic_error(caller, "").await)
            }
        }
    }

    async fn dispatch(&self, caller: Caller, text: &str) -> Result<RenderedReply, EngineError> {
        let spec = self.load_spec(caller.bot_id).await?;
        let locale = self
            .renderer
            .localizer()
            .select_locale(caller.bot_id, caller.user_id, &spec.locale_config())
            .await;
        let command = normalize_command(text);

        if let Some(menu) = spec.menu(command).and_then(|flow| flow.as_menu()) {
            debug!(bot_id = caller.bot_id, command, "menu");
            return Ok(self.render_menu(caller, &locale, menu).await);
        }
        if let Some(flow) = spec.wizard(command) {
            return WizardMachine::new(self).start(caller, &locale, flow).await;
        }
        if let Some(legacy) = spec.legacy_wizard(command) {
            info!(bot_id = caller.bot_id, command, "starting legacy wizard");
            return WizardMachine::new(self)
                .start(caller, &locale, &legacy.to_flow())
                .await;
        }

        if let Some(session) = self.load_session(&caller).await? {
            let reply = WizardMachine::new(self)
                .advance(caller, &locale, session, StepInput::Text(text.trim().to_string()))
                .await?;
            if let Some(reply) = reply {
                return Ok(reply);
            }
        }

        let ctx = ExecContext::new(caller, locale.as_str());
        if let Some(intent) = spec.match_intent(text) {
            let text = self.renderer.render(&intent.reply, &ctx).await;
            return Ok(RenderedReply::text(text).with_parse_mode(intent.parse_mode));
        }
        debug!(bot_id = caller.bot_id, "no flow, session or intent matched");
        Ok(RenderedReply::text(
            self.renderer.message(&ctx, messages::UNKNOWN_COMMAND, &[]).await,
        ))
    }

    async fn render_menu(&self, caller: Caller, locale: &str, menu: &MenuParams) -> RenderedReply {
        let ctx = ExecContext::new(caller, locale);
        let text = self.renderer.render(&menu.text, &ctx).await;
        let mut reply = RenderedReply::text(text).with_parse_mode(menu.parse_mode);
        if !menu.keyboard.is_empty() {
            reply = reply.with_keyboard(render_keyboard(&self.renderer, &menu.keyboard, &ctx).await);
        }
        reply
    }

    /// Generic failure reply. An empty `locale` means the spec was not
    /// available, so only the built-in text is used.
    pub(crate) async fn generic_error(&self, caller: Caller, locale: &str) -> RenderedReply {
        if locale.is_empty() {
            return RenderedReply::text(messages::ERROR.1);
        }
        let ctx = ExecContext::new(caller, locale);
        RenderedReply::text(self.renderer.message(&ctx, messages::ERROR, &[]).await)
    }
}
