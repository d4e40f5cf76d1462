//! Conversation buffer used when assembling prompts

use crate::llm::MessageRole;

/// One turn held in the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    Human(String),
    Ai(String),
}

/// Append-only record of the exchange, formatted for the prompt's
/// chat history section.
#[derive(Debug, Clone, Default)]
pub struct ConversationBuffer {
    turns: Vec<Turn>,
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::Human(content.into()));
    }

    pub fn add_ai(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::Ai(content.into()));
    }

    /// User messages become human turns; everything else is the model.
    pub fn add(&mut self, role: MessageRole, content: impl Into<String>) {
        match role {
            MessageRole::User => self.add_user(content),
            _ => self.add_ai(content),
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// `Human: ...` / `AI: ...` lines, oldest first
    pub fn buffer_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        self.turns
            .iter()
            .map(|turn| match turn {
                Turn::Human(text) => format!("Human: {}", text),
                Turn::Ai(text) => format!("AI: {}", text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_string() {
        let mut buffer = ConversationBuffer::new();
        assert_eq!(buffer.buffer_string(), "");

        buffer.add(MessageRole::User, "hi");
        buffer.add(MessageRole::Assistant, "hello");
        buffer.add(MessageRole::System, "note");

        assert_eq!(buffer.buffer_string(), "Human: hi\nAI: hello\nAI: note");
    }

    #[test]
    fn test_clear() {
        let mut buffer = ConversationBuffer::new();
        buffer.add_user("x");
        buffer.clear();
        assert_eq!(buffer.buffer_string(), "");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_len_counts_turns() {
        let mut buffer = ConversationBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);

        buffer.add_user("question");
        buffer.add_ai("answer");
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_empty());
    }
}
