use serde::{Deserialize, Serialize};

/// A single keyboard button as written in a spec.
///
/// Menu keyboards only carry `text`; inline keyboards attached to replies
/// also carry `callback_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub text: String,
    #[serde(
        default,
        alias = "callback",
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_data: Option<String>,
}

/// Formatting hint forwarded to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    #[serde(rename = "HTML", alias = "html")]
    Html,
    #[serde(rename = "Markdown", alias = "markdown")]
    Markdown,
    #[serde(rename = "MarkdownV2", alias = "markdown_v2")]
    MarkdownV2,
}
