use std::collections::BTreeMap;

use botflow_spec::WizardSession;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::action::sql_guard::SqlValue;

/// Identity a turn is processed for. `chat_id` defaults to the user id, which
/// is what private chats look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    pub bot_id: i64,
    pub user_id: i64,
    pub chat_id: i64,
}

impl Caller {
    pub fn new(bot_id: i64, user_id: i64) -> Self {
        Self {
            bot_id,
            user_id,
            chat_id: user_id,
        }
    }

    pub fn with_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = chat_id;
        self
    }
}

const RESERVED: &[&str] = &["bot_id", "user_id", "chat_id"];

/// Variables visible to actions and templates during a turn.
///
/// `vars` holds wizard answers, `data` holds action results. Reserved
/// identity keys always win over both, so user input cannot impersonate them.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub caller: Caller,
    pub locale: String,
    pub vars: IndexMap<String, String>,
    pub data: Map<String, Value>,
}

impl ExecContext {
    pub fn new(caller: Caller, locale: impl Into<String>) -> Self {
        Self {
            caller,
            locale: locale.into(),
            vars: IndexMap::new(),
            data: Map::new(),
        }
    }

    pub fn from_session(caller: Caller, locale: impl Into<String>, session: &WizardSession) -> Self {
        Self {
            caller,
            locale: locale.into(),
            vars: session.vars.clone(),
            data: session.context.clone(),
        }
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Flat JSON scope handed to the template renderer.
    pub fn template_value(&self) -> Value {
        let mut scope = self.data.clone();
        for (name, value) in &self.vars {
            scope.insert(name.clone(), Value::String(value.clone()));
        }
        scope.insert("bot_id".into(), Value::from(self.caller.bot_id));
        scope.insert("user_id".into(), Value::from(self.caller.user_id));
        scope.insert("chat_id".into(), Value::from(self.caller.chat_id));
        scope.insert("locale".into(), Value::String(self.locale.clone()));
        Value::Object(scope)
    }

    /// Named bind values for SQL statements.
    pub fn sql_params(&self) -> BTreeMap<String, SqlValue> {
        let mut binds = BTreeMap::new();
        for (name, value) in &self.data {
            match value {
                Value::String(text) => {
                    binds.insert(name.clone(), SqlValue::Text(text.clone()));
                }
                Value::Number(number) => {
                    let bound = number
                        .as_i64()
                        .map(SqlValue::Int)
                        .unwrap_or_else(|| SqlValue::Text(number.to_string()));
                    binds.insert(name.clone(), bound);
                }
                Value::Bool(flag) => {
                    binds.insert(name.clone(), SqlValue::Text(flag.to_string()));
                }
                _ => {}
            }
        }
        for (name, value) in &self.vars {
            if RESERVED.contains(&name.as_str()) {
                continue;
            }
            binds.insert(name.clone(), SqlValue::Text(value.clone()));
        }
        binds.insert("bot_id".into(), SqlValue::Int(self.caller.bot_id));
        binds.insert("user_id".into(), SqlValue::Int(self.caller.user_id));
        binds.insert("chat_id".into(), SqlValue::Int(self.caller.chat_id));
        binds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids_cannot_be_overridden() {
        let mut ctx = ExecContext::new(Caller::new(7, 42), "en");
        ctx.vars.insert("user_id".into(), "1".into());
        ctx.vars.insert("name".into(), "Bob".into());

        let scope = ctx.template_value();
        assert_eq!(scope["user_id"], Value::from(42));
        assert_eq!(scope["name"], Value::from("Bob"));

        let binds = ctx.sql_params();
        assert_eq!(binds["user_id"], SqlValue::Int(42));
        assert_eq!(binds["chat_id"], SqlValue::Int(42));
        assert_eq!(binds["name"], SqlValue::Text("Bob".into()));
    }
}
