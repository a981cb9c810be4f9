//! Lookup tools and the registry that invokes them.

mod error;
mod object;
mod registry;

pub use error::{Error, ErrorKind};
pub use registry::{Observation, Registry, RegistryBuilder, ToolDescriptor};

/// The result bound applied when a tool doesn't choose its own.
pub const DEFAULT_MAX_CHARS: usize = 200;

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A lookup tool that can be called by the model.
///
/// Every tool takes a free-text query and returns a short text. Tools
/// should keep their results small on their own (a few items, a few
/// hundred characters), but the registry enforces [`Tool::max_chars`]
/// regardless.
///
/// Implementations should be stateless. Configuration such as an HTTP
/// client or a result count is set at construction and copied into the
/// futures returned by [`Tool::execute`].
pub trait Tool: Send + Sync + 'static {
    /// Returns the name the model uses to call the tool.
    fn name(&self) -> &str;

    /// Returns a one-line description that tells the model when to use
    /// the tool.
    fn description(&self) -> &str;

    /// Returns the maximum number of characters of a result.
    fn max_chars(&self) -> usize {
        DEFAULT_MAX_CHARS
    }

    /// Runs the tool with a trimmed, non-empty query.
    ///
    /// This method must return a future that is fully independent of
    /// `self`, and the future should be cancellation safe.
    fn execute(
        &self,
        query: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// Returns the longest prefix of `text` with at most `max_chars`
/// characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("transformer", 5), "trans");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abc", 0), "");
        // Counted in characters, never splitting one.
        assert_eq!(truncate_chars("Schrödinger", 6), "Schröd");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }
}
