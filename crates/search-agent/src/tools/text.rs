use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").unwrap()
});
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Turns a fragment of markup into plain text on a single line.
pub(super) fn plain_text(markup: &str) -> String {
    let stripped = TAG_RE.replace_all(markup, "");
    collapse_whitespace(&decode_entities(&stripped))
}

pub(super) fn collapse_whitespace(text: &str) -> String {
    SPACE_RE.replace_all(text.trim(), " ").into_owned()
}

pub(super) fn decode_entities(text: &str) -> Cow<'_, str> {
    ENTITY_RE.replace_all(text, |caps: &Captures<'_>| {
        let entity = &caps[1];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => numeric_entity(entity),
        };
        match decoded {
            Some(c) => c.to_string(),
            None => caps[0].to_owned(),
        }
    })
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}
