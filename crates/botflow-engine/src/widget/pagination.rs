use botflow_spec::{PageSource, PaginationDef};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::token::{CallbackToken, MAX_TOKEN_BYTES};
use super::{ViewPrompt, WidgetEvent, WidgetView};
use crate::action::reply::render_keyboard;
use crate::action::sql_guard::SqlValue;
use crate::context::{Caller, ExecContext};
use crate::engine::Engine;
use crate::error::ActionError;
use crate::reply::{Button, Keyboard};

/// One page of items plus whether another page follows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub has_next: bool,
}

/// Paged item picker over a SQL query or a list kept in the session context.
pub struct PaginationWidget<'a> {
    def: &'a PaginationDef,
    caller: Caller,
}

impl<'a> PaginationWidget<'a> {
    pub fn new(def: &'a PaginationDef, caller: Caller) -> Self {
        Self { def, caller }
    }

    fn page_size(&self) -> usize {
        self.def.page_size.max(1)
    }

    /// Items of `page`, fetching one extra row to learn whether more follow.
    pub async fn fetch(&self, engine: &Engine, ctx: &ExecContext, page: usize) -> Result<Page, ActionError> {
        let size = self.page_size();
        let Some(offset) = page.checked_mul(size) else {
            return Ok(Page {
                items: Vec::new(),
                has_next: false,
            });
        };
        let mut items = self.load(engine, ctx, size.saturating_add(1), offset).await?;
        let has_next = items.len() > size;
        items.truncate(size);
        Ok(Page { items, has_next })
    }

    async fn load(
        &self,
        engine: &Engine,
        ctx: &ExecContext,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Value>, ActionError> {
        match &self.def.source {
            PageSource::Sql { sql } => {
                let mut binds = ctx.sql_params();
                binds.insert("limit".into(), SqlValue::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
                binds.insert("offset".into(), SqlValue::Int(i64::try_from(offset).unwrap_or(i64::MAX)));
                let rows = engine.sql.query(sql, &binds).await?;
                Ok(rows
                    .into_iter()
                    .map(|row| Value::Object(row.into_iter().collect()))
                    .collect())
            }
            PageSource::Ctx { key } => {
                let Some(list) = ctx.data.get(key).and_then(Value::as_array) else {
                    debug!(key, "pagination list missing from context");
                    return Ok(Vec::new());
                };
                Ok(list.iter().skip(offset).take(limit).cloned().collect())
            }
        }
    }

    /// Stable id of an item, read from `id_field`.
    pub fn item_id(&self, item: &Value) -> Option<String> {
        let raw = match item {
            Value::Object(map) => map.get(&self.def.id_field)?,
            scalar => scalar,
        };
        let id = match raw {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            _ => return None,
        };
        (!id.is_empty() && !id.contains(':')).then_some(id)
    }

    pub async fn view(&self, engine: &Engine, ctx: &ExecContext, page: usize, items: Page) -> WidgetView {
        let mut rows = Vec::new();
        for item in &items.items {
            let Some(id) = self.item_id(item) else {
                warn!(id_field = %self.def.id_field, "pagination item without usable id skipped");
                continue;
            };
            let extra = match item {
                Value::Object(map) => map.clone(),
                scalar => {
                    let mut map = Map::new();
                    map.insert("value".into(), scalar.clone());
                    map
                }
            };
            let label = engine
                .renderer
                .render_with(&self.def.item_template, ctx, &extra)
                .await;
            let token = CallbackToken::PgSel {
                bot_id: self.caller.bot_id,
                user_id: self.caller.user_id,
                id,
            }
            .encode();
            if token.len() > MAX_TOKEN_BYTES {
                warn!(token = %token, len = token.len(), "pagination token exceeds transport limit");
            }
            rows.push(vec![Button::callback(label, token)]);
        }

        let empty = rows.is_empty() && page == 0;
        if page > 0 || items.has_next {
            let pager = |target: Option<usize>, label: &str, forward: bool| match target {
                Some(page) => {
                    let (bot_id, user_id) = (self.caller.bot_id, self.caller.user_id);
                    let token = if forward {
                        CallbackToken::PgNext { bot_id, user_id, page }
                    } else {
                        CallbackToken::PgPrev { bot_id, user_id, page }
                    };
                    Button::callback(label, token.encode())
                }
                None => Button::callback(" ", CallbackToken::PgIgnore.encode()),
            };
            rows.push(vec![
                pager(page.checked_sub(1), "‹", false),
                Button::callback(page.saturating_add(1).to_string(), CallbackToken::PgIgnore.encode()),
                pager(page.checked_add(1).filter(|_| items.has_next), "›", true),
            ]);
        }
        if !self.def.extra_keyboard.is_empty() {
            let extra = render_keyboard(&engine.renderer, &self.def.extra_keyboard, ctx).await;
            rows.extend(extra.rows);
        }

        WidgetView {
            prompt: if empty { ViewPrompt::Empty } else { ViewPrompt::Default },
            keyboard: Keyboard::inline(rows),
            meta: json!({
                "widget": "pagination",
                "page": page,
                "has_next": items.has_next,
                "items": items.items.len(),
            }),
        }
    }

    /// True when `id` belongs to the source; SQL sources are scanned up to
    /// `pagination_scan_limit` rows.
    pub async fn contains(&self, engine: &Engine, ctx: &ExecContext, id: &str) -> Result<bool, ActionError> {
        let items = self
            .load(engine, ctx, engine.config.pagination_scan_limit, 0)
            .await?;
        Ok(items
            .iter()
            .any(|item| self.item_id(item).as_deref() == Some(id)))
    }

    pub async fn decode(
        &self,
        engine: &Engine,
        ctx: &ExecContext,
        token: &CallbackToken,
    ) -> Result<WidgetEvent, ActionError> {
        match token {
            CallbackToken::PgIgnore => Ok(WidgetEvent::Ignore),
            CallbackToken::PgNext { page, .. } | CallbackToken::PgPrev { page, .. } => {
                let items = self.fetch(engine, ctx, *page).await?;
                if items.items.is_empty() && *page > 0 {
                    return Ok(WidgetEvent::Rejected("page out of range"));
                }
                Ok(WidgetEvent::View(self.view(engine, ctx, *page, items).await))
            }
            CallbackToken::PgSel { id, .. } => {
                if self.contains(engine, ctx, id).await? {
                    Ok(WidgetEvent::Selected(id.clone()))
                } else {
                    Ok(WidgetEvent::Rejected("unknown item"))
                }
            }
            _ => Ok(WidgetEvent::Rejected("not a pagination token")),
        }
    }
}
