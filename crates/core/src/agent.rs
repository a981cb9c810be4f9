mod action;
mod builder;
mod config;
mod error;
mod event;
mod prompt;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use search_agent_model::{ModelFinishReason, ModelMessage, ModelRequest};
use tracing::Instrument;

use crate::conversation::Conversation;
use crate::model_client::ModelClient;
use crate::tool::Registry;
pub use action::{Action, ParsedOutput, parse_output};
use action::{AgentStep, OBSERVATION_MARKER, cut_at_observation};
pub use builder::AgentBuilder;
pub use config::AgentConfig;
pub use error::AgentError;
pub use event::{AgentEvent, EventReceiver, EventSender, event_channel};

struct AgentInner {
    model_client: ModelClient,
    registry: Registry,
    config: AgentConfig,
    instruction: String,
}

/// An agent that answers one utterance at a time by alternating between
/// model replies and tool calls.
///
/// The agent holds no conversation state, so a single agent can serve
/// any number of sessions. Cloning is cheap.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            registry,
            config,
        } = builder;

        let instruction = prompt::render_instruction(&registry.definitions());
        let inner = AgentInner {
            model_client: model_client.with_retry(config.retry),
            registry,
            config,
            instruction,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the configuration of this agent.
    #[inline]
    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Returns the tools of this agent.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Returns the system instruction sent with every request.
    #[inline]
    pub fn instruction(&self) -> &str {
        &self.inner.instruction
    }

    /// Answers `utterance` in the context of `history`.
    ///
    /// Everything that happens during the run is reported to `events` as
    /// it happens. The history is only read; recording the exchange is up
    /// to the caller.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future stops the model
    /// stream and any running tool call.
    pub async fn run(
        &self,
        utterance: &str,
        history: &Conversation,
        events: &EventSender,
    ) -> Result<String, AgentError> {
        let span = info_span!("agent run", history = history.len());
        let fut = self.run_steps(utterance, history, events).instrument(span);
        let Some(limit) = self.inner.config.max_execution_time else {
            return fut.await;
        };
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("agent run timed out after {limit:?}");
                Err(AgentError::Timeout(limit))
            }
        }
    }

    async fn run_steps(
        &self,
        utterance: &str,
        history: &Conversation,
        events: &EventSender,
    ) -> Result<String, AgentError> {
        let config = &self.inner.config;
        let mut steps: Vec<AgentStep> = vec![];
        let mut parse_errors = 0;

        for iteration in 1..=config.max_iterations {
            debug!("iteration {iteration}");
            let req = self.make_request(utterance, history, &steps);
            let resp = self
                .inner
                .model_client
                .send_request(req, {
                    let events = events.clone();
                    move |delta| events.send(AgentEvent::MessageDelta(delta))
                })
                .await
                .map_err(AgentError::Model)?;
            if resp.finish_reason == Some(ModelFinishReason::Length) {
                warn!("model reply was cut by the token limit");
            }

            let log = cut_at_observation(&resp.text).trim().to_owned();
            let ParsedOutput { thought, action } = parse_output(&log);
            if !thought.is_empty() && !matches!(action, Action::ParseError { .. })
            {
                events.send(AgentEvent::Thought(thought));
            }

            let observation = match &action {
                Action::FinalAnswer { text } => {
                    info!("got a final answer after {iteration} iterations");
                    events.send(AgentEvent::FinalAnswer(text.clone()));
                    return Ok(text.clone());
                }
                Action::ToolCall { name, input } => {
                    events.send(AgentEvent::ToolCall {
                        tool: name.clone(),
                        input: input.clone(),
                    });
                    let observation =
                        self.inner.registry.render(name, input).await;
                    events.send(AgentEvent::ToolResult {
                        tool: name.clone(),
                        output: observation.text.clone(),
                        failed: observation.failed,
                    });
                    observation.text
                }
                Action::ParseError { reason } => {
                    warn!("unparsable model reply: {reason}");
                    events.send(AgentEvent::ParseError {
                        reason: reason.clone(),
                    });
                    parse_errors += 1;
                    if parse_errors > config.max_parse_retries {
                        return Err(AgentError::MalformedOutput {
                            reason: reason.clone(),
                            retries: config.max_parse_retries,
                        });
                    }
                    prompt::correction(reason)
                }
            };

            steps.push(AgentStep {
                log,
                action,
                observation,
            });
        }

        warn!("no final answer after {} iterations", config.max_iterations);
        Err(AgentError::IterationLimit(config.max_iterations))
    }

    fn make_request(
        &self,
        utterance: &str,
        history: &Conversation,
        steps: &[AgentStep],
    ) -> ModelRequest {
        let mut messages: Vec<ModelMessage> =
            Vec::with_capacity(history.len() + 1 + steps.len() * 2);
        messages.extend(history.to_model_messages());
        messages.push(ModelMessage::User(utterance.to_owned()));
        for step in steps {
            trace!("replaying step: {:?}", step.action);
            messages.push(ModelMessage::Assistant(step.log.clone()));
            messages.push(ModelMessage::User(format!(
                "Observation: {}",
                step.observation
            )));
        }

        ModelRequest {
            instruction: Some(self.inner.instruction.clone()),
            messages,
            stop: vec![OBSERVATION_MARKER.to_owned()],
            stream: self.inner.config.stream,
        }
    }
}
