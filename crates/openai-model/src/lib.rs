//! A model provider for OpenAI-compatible chat completion APIs, such as
//! Groq or OpenAI itself.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use search_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAIConfig, OpenAIConfigBuilder,
};
use io::{Chunks, Sse};
use proto::{ChatCompletion, ErrorBody};
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_connect() || err.is_timeout() {
            ErrorKind::Unavailable
        } else {
            ErrorKind::Other
        };
        Self::new(err.to_string(), kind)
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ErrorKind::Unauthorized
            }
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
            status if status.is_server_error() => ErrorKind::Unavailable,
            _ => ErrorKind::Other,
        };
        let detail = serde_json::from_str::<ErrorBody>(body)
            .map(|body| body.error.message)
            .unwrap_or_else(|_| {
                status.canonical_reason().unwrap_or("unknown").to_owned()
            });
        Self::new(format!("HTTP {}: {detail}", status.as_u16()), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn name(&self) -> &str {
        "openai"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let stream = req.stream;
        let body = proto::create_request(req, &self.config);
        let mut builder = self
            .client
            .post(self.config.completions_url())
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::ACCEPT,
                if stream {
                    "text/event-stream"
                } else {
                    "application/json"
                },
            )
            .json(&body);
        if let Some(timeout) = self.config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let resp_fut = builder.send();

        async move {
            let resp = resp_fut.await.map_err(Error::from_reqwest)?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                let err = Error::from_status(status, &body);
                warn!("request rejected: {err}");
                return Err(err);
            }

            if !stream {
                let completion = resp
                    .json::<ChatCompletion>()
                    .await
                    .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
                return Ok(OpenAIResponse::from_completion(completion));
            }

            if !is_event_stream(&resp) {
                return Err(Error::new(
                    format!(
                        "unexpected content type: {:?}",
                        resp.headers().get(header::CONTENT_TYPE)
                    ),
                    ErrorKind::Other,
                ));
            }

            // Here we got a successful streaming response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(OpenAIResponse::from_sse(sse))
        }
    }
}

fn is_event_stream(resp: &Response) -> bool {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Mime>().ok())
        .map(|m| m.type_() == mime::TEXT && m.subtype() == mime::EVENT_STREAM)
        .unwrap_or(false)
}
