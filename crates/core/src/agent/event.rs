use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Something that happened during an agent run, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    /// A piece of the model reply as it streams in.
    MessageDelta(String),
    /// The reasoning the model gave before acting.
    Thought(String),
    /// A tool is about to be called.
    ToolCall {
        /// The tool name.
        tool: String,
        /// The query.
        input: String,
    },
    /// A tool call finished.
    ToolResult {
        /// The tool name.
        tool: String,
        /// The observation given to the model.
        output: String,
        /// Whether the observation is an error.
        failed: bool,
    },
    /// The model reply could not be understood.
    ParseError {
        /// What was missing.
        reason: String,
    },
    /// The run ended with an answer.
    FinalAnswer(String),
}

/// The receiving end of an event channel.
pub type EventReceiver = UnboundedReceiver<AgentEvent>;

/// The sending end of an event channel.
///
/// Sending never fails: events are dropped when the receiver is gone or
/// when the sender is disabled.
#[derive(Clone, Debug, Default)]
pub struct EventSender(Option<UnboundedSender<AgentEvent>>);

impl EventSender {
    /// Creates a sender that drops every event.
    #[inline]
    pub fn disabled() -> Self {
        Self(None)
    }

    pub(crate) fn send(&self, event: AgentEvent) {
        let Some(tx) = &self.0 else {
            return;
        };
        if tx.send(event).is_err() {
            trace!("event receiver is gone");
        }
    }
}

/// Creates a channel for the events of agent runs.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = unbounded_channel();
    (EventSender(Some(tx)), rx)
}
