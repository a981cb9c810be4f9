use search_agent_core::conversation::Conversation;
use search_agent_core::{Agent, AgentError, EventSender};

/// The assistant turn recorded when a run fails.
pub const PLACEHOLDER_ANSWER: &str = "Oops! Something went wrong.";

/// A chat session: one conversation answered by an agent.
///
/// Sessions are independent values. Several sessions may share one
/// [`Agent`], since the agent keeps no state of its own between runs.
pub struct Session {
    agent: Agent,
    conversation: Conversation,
}

impl Session {
    /// Creates a session with an empty conversation.
    #[inline]
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            conversation: Conversation::new(),
        }
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the agent answering this session.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Sends a message and records the exchange.
    ///
    /// The answer is recorded on success, and [`PLACEHOLDER_ANSWER`] is
    /// recorded on failure, so every message gets exactly one reply in the
    /// conversation either way.
    pub async fn send_message(
        &mut self,
        message: &str,
        events: &EventSender,
    ) -> Result<String, AgentError> {
        let result = self.agent.run(message, &self.conversation, events).await;
        match &result {
            Ok(answer) => self.conversation.push_exchange(message, answer.as_str()),
            Err(err) => {
                warn!("agent run failed: {err}");
                self.conversation.push_exchange(message, PLACEHOLDER_ANSWER);
            }
        }
        result
    }
}
