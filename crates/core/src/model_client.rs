use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use search_agent_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

type DeltaFn = Arc<dyn Fn(String) + Send + Sync + 'static>;
type AttemptResult = Result<ModelClientResponse, AttemptFailure>;
type BoxedAttemptFuture = Pin<Box<dyn Future<Output = AttemptResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, DeltaFn) -> BoxedAttemptFuture + Send + Sync
>;

/// How failed model requests are retried.
///
/// Only failures that happen before anything was streamed are retried,
/// and only if the provider reports them as retryable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// The delay before the first retry; later delays grow exponentially.
    pub initial_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(500),
        }
    }
}

/// A wrapper around a model provider that erases its type and drives the
/// streamed response to completion.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry: RetryPolicy,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(
        provider: P,
        retry: RetryPolicy,
    ) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_delta| {
            let fut = provider.send_request(&req);
            let span = debug_span!(
                "model request",
                provider = provider.name(),
                messages = req.messages.len()
            );
            Box::pin(
                async move {
                    trace!("sending request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_delta).await
                }
                .instrument(span),
            )
        });
        Self { handler_fn, retry }
    }

    #[inline]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sends a request and returns the complete response, calling
    /// `on_delta` for every piece of text as it arrives.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: impl Fn(String) + Send + Sync + 'static,
    ) -> Result<ModelClientResponse, Box<dyn ModelProviderError>> {
        let on_delta: DeltaFn = Arc::new(on_delta);
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_interval)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        backoff::future::retry(backoff, || {
            attempt += 1;
            let current = attempt;
            let max_retries = self.retry.max_retries;
            let fut = (self.handler_fn)(req.clone(), Arc::clone(&on_delta));
            async move {
                fut.await.map_err(|failure| {
                    let kind = failure.error.kind();
                    if failure.streamed
                        || !kind.is_retryable()
                        || current > max_retries
                    {
                        return backoff::Error::permanent(failure.error);
                    }
                    warn!("attempt {current} failed ({kind}), retrying");
                    backoff::Error::transient(failure.error)
                })
            }
        })
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    /// All streamed text, concatenated.
    pub text: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

struct AttemptFailure {
    error: Box<dyn ModelProviderError>,
    // Whether any text reached `on_delta` before the failure.
    streamed: bool,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: DeltaFn,
) -> AttemptResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("request failed: {err}");
            return Err(AttemptFailure {
                error: Box::new(err),
                streamed: false,
            });
        }
    };

    let mut text = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("response failed: {err}");
                return Err(AttemptFailure {
                    error: Box::new(err),
                    streamed: !text.is_empty(),
                });
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                text.push_str(&delta);
                on_delta(delta);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    debug!(chars = text.len(), ?finish_reason, "finished a request");

    Ok(ModelClientResponse {
        text,
        finish_reason,
    })
}
