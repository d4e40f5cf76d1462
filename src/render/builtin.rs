use async_trait::async_trait;

use super::{RenderResult, Renderer};
use crate::utils::text::markdown;

/// In-process markdown engine (comrak)
#[derive(Debug, Clone, Default)]
pub struct BuiltinRenderer;

impl BuiltinRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Renderer for BuiltinRenderer {
    async fn render(&self, markdown: &str) -> RenderResult<String> {
        Ok(markdown::to_html(markdown))
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_renders_common_markdown() {
        let html = BuiltinRenderer::new()
            .render("# Title\n\nUse `let x = 1;` here.\n\n- one\n- two\n")
            .await
            .unwrap();

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<code>let x = 1;</code>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[tokio::test]
    async fn test_fenced_block_gets_language_class() {
        let html = BuiltinRenderer::new()
            .render("```python\nprint('hi')\n```\n")
            .await
            .unwrap();
        assert!(html.contains(r#"<pre><code class="language-python">"#));
    }
}
