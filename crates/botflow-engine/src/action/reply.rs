use botflow_spec::{ButtonSpec, ReplyTemplateParams};
use tracing::warn;

use crate::context::ExecContext;
use crate::render::TextRenderer;
use crate::reply::{Button, Keyboard, RenderedReply};
use crate::widget::token::MAX_TOKEN_BYTES;

pub async fn render_reply(
    renderer: &TextRenderer,
    params: &ReplyTemplateParams,
    ctx: &ExecContext,
) -> RenderedReply {
    let text = renderer
        .render_list(&params.text, params.empty_text.as_deref(), ctx)
        .await;
    let mut reply = RenderedReply::text(text).with_parse_mode(params.parse_mode);
    if let Some(rows) = &params.keyboard {
        reply = reply.with_keyboard(render_keyboard(renderer, rows, ctx).await);
    }
    reply
}

/// Renders spec buttons. Any button carrying callback data makes the keyboard
/// inline; otherwise it is a reply keyboard of plain labels.
pub async fn render_keyboard(
    renderer: &TextRenderer,
    rows: &[Vec<ButtonSpec>],
    ctx: &ExecContext,
) -> Keyboard {
    let inline = rows.iter().flatten().any(|button| button.callback_data.is_some());
    let mut rendered = Vec::with_capacity(rows.len());
    for row in rows {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            let label = renderer.render(&button.text, ctx).await;
            let token = match &button.callback_data {
                Some(data) => Some(renderer.render(data, ctx).await),
                None => None,
            };
            if let Some(token) = &token
                && token.len() > MAX_TOKEN_BYTES
            {
                warn!(token = %token, len = token.len(), "callback token exceeds transport limit");
            }
            buttons.push(match token {
                Some(token) => Button::callback(label, token),
                None => Button::label(label),
            });
        }
        rendered.push(buttons);
    }
    if inline {
        Keyboard::inline(rendered)
    } else {
        Keyboard::reply(rendered)
    }
}
