//! A local scripted model for testing purpose.

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use search_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    deltas: VecDeque<String>,
    finish_reason: Option<ModelFinishReason>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        if let Some(delta) = this.deltas.pop_front() {
            return Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                delta,
            ))));
        }
        // `take` makes polling after completion return `None`.
        Poll::Ready(Ok(this.finish_reason.take().map(ModelResponseEvent::Completed)))
    }
}

#[derive(Clone)]
enum ConversationStep {
    UserInput,
    AssistantResponse(PresetResponse),
}

/// A local scripted model for testing purpose.
///
/// Before sending requests, set up the conversation script, which is how
/// the model should respond to a request. The step is selected by the
/// number of messages in the request, so a request with `n` messages is
/// answered by the `n`-th step (0-based). Any message the agent sends,
/// including tool observations, takes a user input step.
///
/// Responses only depend on the request, which makes the model
/// deterministic no matter how many times a conversation is replayed.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    attempts: Arc<Mutex<HashMap<usize, u64>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    #[inline]
    pub fn add_user_input_step(&mut self) {
        self.conversation_script.push(ConversationStep::UserInput);
    }

    /// Adds a user input step followed by the given response.
    #[inline]
    pub fn add_exchange(&mut self, preset: PresetResponse) {
        self.add_user_input_step();
        self.add_assistant_response_step(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, including failed ones.
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn respond(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }

        let step_idx = req.messages.len();
        let Some(step) = self.conversation_script.get(step_idx) else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };
        let preset = match step {
            ConversationStep::UserInput => {
                return Err(Error {
                    message: "not an assistant response step",
                    kind: ErrorKind::Other,
                });
            }
            ConversationStep::AssistantResponse(preset) => preset,
        };

        let attempt = {
            let mut attempts = match self.attempts.lock() {
                Ok(attempts) => attempts,
                Err(poisoned) => poisoned.into_inner(),
            };
            let counter = attempts.entry(step_idx).or_default();
            let attempt = *counter;
            *counter += 1;
            attempt
        };
        if preset.should_fail(attempt) {
            return Err(Error {
                message: "scripted failure",
                kind: ErrorKind::Unavailable,
            });
        }

        Ok(TestModelResponse {
            deltas: preset.deltas.iter().cloned().collect(),
            finish_reason: Some(preset.finish_reason),
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn name(&self) -> &str {
        "test"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.respond(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use search_agent_model::ModelMessage;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ModelFinishReason>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut finish_reason = None;
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            match event {
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason)
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
            }
        }
        (msg, finish_reason)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_exchange(PresetResponse::with_deltas(["Hello, ", "world!"]));
        provider.add_exchange(
            PresetResponse::with_text(
                "Thought: I need the encyclopedia.\nAction: wikipedia\nAction Input: Rust",
            )
            .truncated(),
        );

        let mut req =
            ModelRequest::with_messages([ModelMessage::User("Hi".to_owned())]);
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, reason) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert_eq!(reason, Some(ModelFinishReason::Stop));

        req.messages.push(ModelMessage::Assistant(msg));
        req.messages
            .push(ModelMessage::User("What is Rust?".to_owned()));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, reason) = collect_response(resp).await;
        assert!(msg.ends_with("Action Input: Rust"));
        assert_eq!(reason, Some(ModelFinishReason::Length));

        assert_eq!(provider.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_script_exhausted() {
        let provider = TestModelProvider::default();
        let req =
            ModelRequest::with_messages([ModelMessage::User("Hi".to_owned())]);
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_exchange(PresetResponse::with_text("Done").with_failures(1));

        let req =
            ModelRequest::with_messages([ModelMessage::User("Hi".to_owned())]);
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        // Clones share the attempt counter.
        let cloned = provider.clone();
        let resp = cloned.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await.0, "Done");
    }
}
