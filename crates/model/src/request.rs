/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The system instruction, placed before every message.
    pub instruction: Option<String>,
    /// The input messages, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Sequences at which the model should stop generating.
    pub stop: Vec<String>,
    /// Whether the response should be delivered incrementally.
    pub stream: bool,
}

impl ModelRequest {
    /// Creates a streaming request with the given messages.
    #[inline]
    pub fn with_messages(messages: impl Into<Vec<ModelMessage>>) -> Self {
        Self {
            instruction: None,
            messages: messages.into(),
            stop: vec![],
            stream: true,
        }
    }
}

/// A complete chat message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// A user input text. Tool observations are also sent as user text.
    User(String),
    /// A text previously generated by the model.
    Assistant(String),
}

impl ModelMessage {
    /// Returns the text of this message.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            ModelMessage::User(content) | ModelMessage::Assistant(content) => {
                content
            }
        }
    }
}
