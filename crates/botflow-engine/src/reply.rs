use botflow_spec::ParseMode;
use serde::Serialize;
use serde_json::Value;

/// A button as handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_token: Option<String>,
}

impl Button {
    pub fn callback(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_token: Some(token.into()),
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardKind {
    /// Buttons attached to the message, answered with callback tokens.
    Inline,
    /// Persistent keyboard whose labels are sent back as text.
    Reply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub kind: KeyboardKind,
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn inline(rows: Vec<Vec<Button>>) -> Self {
        Self {
            kind: KeyboardKind::Inline,
            rows,
        }
    }

    pub fn reply(rows: Vec<Vec<Button>>) -> Self {
        Self {
            kind: KeyboardKind::Reply,
            rows,
        }
    }

    /// Every callback token carried by the keyboard, row by row.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|button| button.callback_token.as_deref())
    }
}

/// What one turn produces for the transport: text, optional keyboard and hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedReply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl RenderedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            keyboard: None,
            meta: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_parse_mode(mut self, parse_mode: Option<ParseMode>) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}
