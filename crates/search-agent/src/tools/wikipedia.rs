use std::collections::HashMap;

use reqwest::Client;
use search_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use serde::Deserialize;

use super::text::collapse_whitespace;
use super::{LookupOptions, fetch_text};

const ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";

#[derive(Deserialize)]
struct QueryResponse {
    // Missing when the search found nothing.
    query: Option<Query>,
}

#[derive(Deserialize)]
struct Query {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    index: u32,
    #[serde(default)]
    extract: Option<String>,
}

/// Looks up article introductions on English Wikipedia.
pub struct WikipediaTool {
    client: Client,
    options: LookupOptions,
}

impl WikipediaTool {
    /// Creates a Wikipedia tool that sends requests with `client`.
    #[inline]
    pub fn new(client: Client, options: LookupOptions) -> Self {
        Self { client, options }
    }
}

impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn description(&self) -> &str {
        "An encyclopedia. Useful for general questions about people, places, \
         companies, facts, historical events, or other subjects. Input \
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
            let url = format!(
                "{ENDPOINT}?action=query&generator=search&gsrsearch={}\
                 &gsrlimit={top_k}&prop=extracts&exintro=1&explaintext=1\
                 &format=json",
                urlencoding::encode(&query)
            );
            let body = fetch_text(&client, &url).await?;
            let pages = parse_pages(&body)?;
            if pages.is_empty() {
                return Err(ToolError::no_results());
            }
            Ok(pages.join("\n\n"))
        }
    }
}

/// Formats the pages of a query response in search order.
pub(crate) fn parse_pages(body: &str) -> Result<Vec<String>, ToolError> {
    let resp: QueryResponse = serde_json::from_str(body).map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("undecodable response: {err}"))
    })?;
    let Some(query) = resp.query else {
        return Ok(vec![]);
    };

    let mut pages: Vec<Page> = query.pages.into_values().collect();
    pages.sort_by_key(|page| page.index);
    Ok(pages
        .into_iter()
        .filter_map(|page| {
            let extract = collapse_whitespace(page.extract.as_deref()?);
            if extract.is_empty() {
                return None;
            }
            Some(format!("Page: {}\nSummary: {extract}", page.title))
        })
        .collect())
}
