use std::sync::LazyLock;

use regex::Regex;

/// The stop sequence sent with every request. Models that ignore it are cut
/// at the same marker during parsing.
pub(crate) const OBSERVATION_MARKER: &str = "\nObservation:";

const FINAL_ANSWER_MARKER: &str = "Final Answer:";

static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").unwrap());
static ACTION_INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").unwrap());
static THOUGHT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Thought\s*:").unwrap());

/// What the model decided to do in one reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Call a tool with a query.
    ToolCall {
        /// The tool name.
        name: String,
        /// The query, trimmed and unquoted.
        input: String,
    },
    /// Answer the user and stop.
    FinalAnswer {
        /// The answer.
        text: String,
    },
    /// The reply didn't follow the expected format.
    ParseError {
        /// What was missing.
        reason: String,
    },
}

/// A parsed model reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedOutput {
    /// The reasoning before the action, without the `Thought:` prefix.
    /// May be empty.
    pub thought: String,
    /// The decided action.
    pub action: Action,
}

/// One finished iteration of an agent run.
#[derive(Clone, Debug)]
pub(crate) struct AgentStep {
    /// The model reply as it is replayed to the model.
    pub log: String,
    pub action: Action,
    /// What the model is told after the reply.
    pub observation: String,
}

/// Returns `text` up to the first observation the model made up itself.
pub(crate) fn cut_at_observation(text: &str) -> &str {
    match text.find(OBSERVATION_MARKER) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// Parses a model reply written in the thought/action format.
///
/// A tool call needs an `Action:` line followed by an `Action Input:`
/// line; otherwise a `Final Answer:` ends the run. When a reply contains
/// both, whichever comes first wins, and an answer followed by a tool call
/// ends at the first blank line or at the call.
pub fn parse_output(text: &str) -> ParsedOutput {
    let text = cut_at_observation(text);
    let action_match = ACTION_RE.find(text);
    let final_idx = text.find(FINAL_ANSWER_MARKER);

    if let Some(action_match) = action_match {
        if final_idx.is_none_or(|idx| action_match.start() < idx) {
            return ParsedOutput {
                thought: thought_of(&text[..action_match.start()]),
                action: parse_tool_call(&text[action_match.end()..]),
            };
        }
    }

    if let Some(idx) = final_idx {
        let start = idx + FINAL_ANSWER_MARKER.len();
        let mut answer = &text[start..];
        // A tool call made up after the answer isn't part of it.
        if let Some(action_match) = action_match {
            let call = action_match.start().saturating_sub(start);
            let end = answer.find("\n\n").map_or(call, |blank| blank.min(call));
            answer = &answer[..end];
        }
        let answer = answer.trim();
        return ParsedOutput {
            thought: thought_of(&text[..idx]),
            action: Action::FinalAnswer {
                text: answer.to_owned(),
            },
        };
    }

    ParsedOutput {
        thought: thought_of(text),
        action: Action::ParseError {
            reason: "Missing 'Action:' after 'Thought:'".to_owned(),
        },
    }
}

// `rest` starts right after `Action:`.
fn parse_tool_call(rest: &str) -> Action {
    let Some(input_match) = ACTION_INPUT_RE.find(rest) else {
        return Action::ParseError {
            reason: "Missing 'Action Input:' after 'Action:'".to_owned(),
        };
    };

    let name = rest[..input_match.start()]
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| matches!(c, '[' | ']' | '`' | '"' | '\''))
        .trim();
    if name.is_empty() {
        return Action::ParseError {
            reason: "Missing tool name after 'Action:'".to_owned(),
        };
    }

    let input = rest[input_match.end()..]
        .trim_start()
        .lines()
        .next()
        .unwrap_or_default()
        .trim();
    Action::ToolCall {
        name: name.to_owned(),
        input: unquote(input).to_owned(),
    }
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        let stripped = text
            .strip_prefix(quote)
            .and_then(|text| text.strip_suffix(quote));
        if let Some(stripped) = stripped {
            return stripped.trim();
        }
    }
    text
}

fn thought_of(text: &str) -> String {
    THOUGHT_PREFIX_RE.replace(text, "").trim().to_owned()
}
