//! Conversation-related types.

use std::fmt::{self, Display};

use search_agent_model::ModelMessage;

/// Who a [`Turn`] is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The person chatting with the agent.
    User,
    /// The agent.
    Assistant,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One message in a conversation. Turns cannot be changed once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Returns who said this.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this turn.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    fn to_model_message(&self) -> ModelMessage {
        match self.role {
            Role::User => ModelMessage::User(self.content.clone()),
            Role::Assistant => ModelMessage::Assistant(self.content.clone()),
        }
    }
}

/// The ordered history of one chat session.
///
/// The history only grows, and it grows by whole exchanges: every user
/// turn is immediately followed by the assistant turn answering it.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all turns, oldest first.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends a user turn and the assistant turn that answers it.
    pub fn push_exchange<U, A>(&mut self, user: U, assistant: A)
    where
        U: Into<String>,
        A: Into<String>,
    {
        self.turns.reserve(2);
        self.turns.push(Turn {
            role: Role::User,
            content: user.into(),
        });
        self.turns.push(Turn {
            role: Role::Assistant,
            content: assistant.into(),
        });
    }

    pub(crate) fn to_model_messages(
        &self,
    ) -> impl Iterator<Item = ModelMessage> + '_ {
        self.turns.iter().map(Turn::to_model_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchanges_keep_pairs() {
        let mut conversation = Conversation::new();
        assert!(conversation.is_empty());

        conversation.push_exchange("Who wrote Dune?", "Frank Herbert.");
        conversation.push_exchange("When?", "1965.");

        let roles: Vec<Role> =
            conversation.turns().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(conversation.turns()[3].content(), "1965.");

        let messages: Vec<ModelMessage> =
            conversation.to_model_messages().collect();
        assert_eq!(messages[0], ModelMessage::User("Who wrote Dune?".to_owned()));
        assert_eq!(
            messages[1],
            ModelMessage::Assistant("Frank Herbert.".to_owned())
        );
    }
}
