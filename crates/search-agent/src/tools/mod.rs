//! The lookup tools the agent can call.
//!
//! Every tool sends one HTTP request per query and extracts a short text
//! from the response. The extraction functions are kept separate from the
//! I/O so they can be tested against saved responses.

mod arxiv;
mod text;
mod web_search;
mod wikipedia;

use std::time::Duration;

use reqwest::{Client, Response};
use search_agent_core::tool::{DEFAULT_MAX_CHARS, Error as ToolError, Registry};

pub use arxiv::ArxivTool;
pub use web_search::WebSearchTool;
pub use wikipedia::WikipediaTool;

/// How much a tool fetches and returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupOptions {
    /// Results joined into one observation.
    pub top_k: usize,
    /// The observation bound in characters.
    pub max_chars: usize,
    /// The HTTP request timeout.
    pub timeout: Duration,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            top_k: 1,
            max_chars: DEFAULT_MAX_CHARS,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Creates a registry with web search, Arxiv and Wikipedia, in that order.
pub fn default_registry(options: LookupOptions) -> Registry {
    let client = http_client(options.timeout);
    Registry::builder()
        .with_tool(WebSearchTool::new(client.clone(), options))
        .with_tool(ArxivTool::new(client.clone(), options))
        .with_tool(WikipediaTool::new(client, options))
        .build()
}

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(concat!("search-agent/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|err| {
            warn!("failed to build http client: {err}");
            Client::new()
        })
}

/// Sends a GET request and returns the body of a successful response.
async fn fetch_text(client: &Client, url: &str) -> Result<String, ToolError> {
    trace!("GET {url}");
    let resp = client.get(url).send().await.map_err(request_failed)?;
    let resp = check_status(resp)?;
    resp.text().await.map_err(request_failed)
}

fn check_status(resp: Response) -> Result<Response, ToolError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(ToolError::execution_error().with_reason(format!("HTTP {status}")))
}

fn request_failed(err: reqwest::Error) -> ToolError {
    let reason = if err.is_timeout() {
        "request timed out".to_owned()
    } else {
        format!("request failed: {err}")
    };
    ToolError::execution_error().with_reason(reason)
}
