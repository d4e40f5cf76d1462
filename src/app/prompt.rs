//! Prompt assembly for the code assistant

use crate::utils::text::template::SimpleTemplate;

/// Marker the model is asked to put in front of lines worth remembering
pub const DEFAULT_IMPORTANT_MARKER: &str = "[IMPORTANT]";

const PROMPT_TEMPLATE: &str = r#"
You are a helpful code assistant with memory of our conversation.

Important Information from our conversation:
{{important_info}}

Chat History:
{{chat_history}}

Current request:
{{user_request}}
- If user asks multiple concepts or if you need to generate a very long code with separate use cases, you may give multiple code snippets separately and explanation for each snippet.
- If code is necessary, the response should include raw code with backticks (```python) for code blocks.
- Inline code should be in backticks.
- Return raw text without HTML formatting.
- If you identify any important information that should be remembered (like user preferences, project requirements, or technical constraints), start that line with {{marker}} in your response.
"#;

/// Builds the prompt sent to the model for one chat turn
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    marker: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORTANT_MARKER)
    }
}

impl PromptBuilder {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Fill the template. Facts are listed one per line.
    pub fn build(&self, user_request: &str, chat_history: &str, important_info: &[String]) -> String {
        let mut template = SimpleTemplate::new();
        template.set("important_info", &important_info.join("\n"));
        template.set("chat_history", chat_history);
        template.set("user_request", user_request);
        template.set("marker", &self.marker);
        template.render(PROMPT_TEMPLATE)
    }
}
