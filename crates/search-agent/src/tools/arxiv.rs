use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use search_agent_core::tool::{Error as ToolError, Tool, ToolResult};

use super::text::{collapse_whitespace, decode_entities};
use super::{LookupOptions, fetch_text};

const ENDPOINT: &str = "https://export.arxiv.org/api/query";

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry\b[^>]*>(.*?)</entry>").unwrap());
static PUBLISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<published>\s*(\d{4}-\d{2}-\d{2})").unwrap()
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").unwrap());
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<summary\b[^>]*>(.*?)</summary>").unwrap()
});
static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<author\b[^>]*>.*?<name>(.*?)</name>.*?</author>")
        .unwrap()
});

/// Searches paper abstracts with the Arxiv export API.
pub struct ArxivTool {
    client: Client,
    options: LookupOptions,
}

impl ArxivTool {
    /// Creates an Arxiv tool that sends requests with `client`.
    #[inline]
    pub fn new(client: Client, options: LookupOptions) -> Self {
        Self { client, options }
    }
}

impl Tool for ArxivTool {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "A search engine for scientific articles on arxiv.org. Useful for \
         questions about physics, mathematics, computer science, \
         quantitative biology, quantitative finance, statistics, electrical \
         engineering, and economics. Input should be a search query."
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
            let url = format!(
                "{ENDPOINT}?search_query=all:{}&start=0&max_results={top_k}",
                urlencoding::encode(&query)
            );
            let feed = fetch_text(&client, &url).await?;
            let entries = parse_entries(&feed, top_k);
            if entries.is_empty() {
                return Err(ToolError::no_results());
            }
            Ok(entries.join("\n\n"))
        }
    }
}

/// Formats the first `top_k` entries of an Atom feed.
pub(crate) fn parse_entries(feed: &str, top_k: usize) -> Vec<String> {
    ENTRY_RE
        .captures_iter(feed)
        .filter_map(|caps| format_entry(&caps[1]))
        .take(top_k)
        .collect()
}

fn format_entry(entry: &str) -> Option<String> {
    let field = |re: &Regex| {
        re.captures(entry)
            .map(|caps| collapse_whitespace(&decode_entities(&caps[1])))
    };
    let title = field(&*TITLE_RE)?;
    let summary = field(&*SUMMARY_RE).unwrap_or_default();
    let published = PUBLISHED_RE
        .captures(entry)
        .map(|caps| caps[1].to_owned())
        .unwrap_or_default();
    let authors = AUTHOR_RE
        .captures_iter(entry)
        .map(|caps| collapse_whitespace(&decode_entities(&caps[1])))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "Published: {published}\nTitle: {title}\nAuthors: {authors}\nSummary: {summary}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = include_str!("../../fixtures/arxiv.xml");

    #[test]
    fn test_parse_entries() {
        let entries = parse_entries(FEED, 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0],
            "Published: 2024-03-11\n\
             Title: Efficient Transformers: A Survey of Attention & Beyond\n\
             Authors: Jane Doe, Richard Roe\n\
             Summary: Transformer models are expensive to train and serve. We review methods that reduce the cost of attention."
        );

        let entries = parse_entries(FEED, 3);
        assert_eq!(entries.len(), 2);
        assert!(entries[1].starts_with("Published: 2023-11-30\nTitle: Linear Attention"));
    }

    #[test]
    fn test_empty_feed() {
        let feed = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:qwertyuiop</title>
  <opensearch:totalResults>0</opensearch:totalResults>
</feed>"#;
        assert!(parse_entries(feed, 1).is_empty());
    }
}
