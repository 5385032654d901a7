/// A `t:key {name=value, ...}` reference. Placeholder values are themselves
/// templates rendered against the execution scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedText<'a> {
    pub key: &'a str,
    pub placeholders: Vec<(&'a str, &'a str)>,
}

/// Parses a localized reference; plain text yields `None`.
pub fn parse_localized(text: &str) -> Option<LocalizedText<'_>> {
    let rest = text.trim().strip_prefix("t:")?;
    let key_end = rest
        .find(|ch: char| ch.is_whitespace() || ch == '{')
        .unwrap_or(rest.len());
    let key = &rest[..key_end];
    if key.is_empty() {
        return None;
    }
    let tail = rest[key_end..].trim();
    if tail.is_empty() {
        return Some(LocalizedText {
            key,
            placeholders: Vec::new(),
        });
    }
    let inner = tail.strip_prefix('{')?.strip_suffix('}')?;
    Some(LocalizedText {
        key,
        placeholders: split_pairs(inner),
    })
}

fn split_pairs(inner: &str) -> Vec<(&str, &str)> {
    let bytes = inner.as_bytes();
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') && depth > 0 => {
                depth -= 1;
                i += 2;
                continue;
            }
            b',' if depth == 0 => {
                pieces.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    pieces.push(&inner[start..]);

    pieces
        .into_iter()
        .filter_map(|piece| {
            let (name, value) = piece.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name, unquote(value.trim())))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
