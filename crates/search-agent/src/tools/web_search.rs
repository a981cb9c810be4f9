use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use search_agent_core::tool::{Error as ToolError, Tool, ToolResult};

use super::text::plain_text;
use super::{LookupOptions, fetch_text};

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(?:a|div|td)[^>]*class="[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td)>"#)
        .unwrap()
});

/// Searches the web with DuckDuckGo's HTML endpoint.
pub struct WebSearchTool {
    client: Client,
    options: LookupOptions,
}

impl WebSearchTool {
    /// Creates a web search tool that sends requests with `client`.
    #[inline]
    pub fn new(client: Client, options: LookupOptions) -> Self {
        Self { client, options }
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "Search"
    }

    fn description(&self) -> &str {
        "A web search engine. Useful for questions about current events or \
         anything not covered by an encyclopedia or research papers. Input \
         should be a search query."
    }

    fn max_chars(&self) -> usize {
        self.options.max_chars
    }

    fn execute(
        &self,
        query: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let top_k = self.options.top_k;
        async move {
            let url = format!("{ENDPOINT}?q={}", urlencoding::encode(&query));
            let html = fetch_text(&client, &url).await?;
            let snippets = extract_snippets(&html, top_k);
            if snippets.is_empty() {
                return Err(ToolError::no_results());
            }
            Ok(snippets.join(" "))
        }
    }
}

/// Returns the text of the first `top_k` result snippets of a result page.
pub(crate) fn extract_snippets(html: &str, top_k: usize) -> Vec<String> {
    SNIPPET_RE
        .captures_iter(html)
        .map(|caps| plain_text(&caps[1]))
        .filter(|snippet| !snippet.is_empty())
        .take(top_k)
        .collect()
}
