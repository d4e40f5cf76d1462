//! Markdown to HTML rendering for model responses
//!
//! Model output is converted by one of the [`Renderer`] implementations and
//! then passed through [`CodeWidgets`], which turns every code block into an
//! interactive widget the frontend can copy from or run.

mod builtin;
mod pandoc;
mod widgets;

pub use builtin::BuiltinRenderer;
pub use pandoc::PandocRenderer;
pub use widgets::CodeWidgets;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Document converter not available: {0}")]
    Unavailable(String),

    #[error("Error: {0}")]
    Converter(String),

    #[error("Document converter timed out after {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Converts markdown into an HTML fragment
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, markdown: &str) -> RenderResult<String>;

    fn name(&self) -> &str;
}

/// Which renderer the service uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// External pandoc binary only
    Pandoc,
    /// In-process markdown engine only
    Builtin,
    /// Pandoc, falling back to the builtin engine when it fails
    Auto,
}

impl FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pandoc" => Ok(RendererKind::Pandoc),
            "builtin" => Ok(RendererKind::Builtin),
            "auto" => Ok(RendererKind::Auto),
            other => Err(format!(
                "Unknown renderer '{}', expected pandoc, builtin or auto",
                other
            )),
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RendererKind::Pandoc => "pandoc",
            RendererKind::Builtin => "builtin",
            RendererKind::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// Tries the primary renderer and falls back to the secondary on any error
pub struct FallbackRenderer {
    primary: Box<dyn Renderer>,
    fallback: Box<dyn Renderer>,
}

impl FallbackRenderer {
    pub fn new(primary: Box<dyn Renderer>, fallback: Box<dyn Renderer>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl Renderer for FallbackRenderer {
    async fn render(&self, markdown: &str) -> RenderResult<String> {
        match self.primary.render(markdown).await {
            Ok(html) => Ok(html),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Renderer failed, falling back"
                );
                self.fallback.render(markdown).await
            }
        }
    }

    fn name(&self) -> &str {
        "auto"
    }
}

/// Build the renderer selected in config
pub fn create_renderer(kind: RendererKind, pandoc_path: &str) -> Box<dyn Renderer> {
    match kind {
        RendererKind::Pandoc => Box::new(PandocRenderer::new(pandoc_path)),
        RendererKind::Builtin => Box::new(BuiltinRenderer::new()),
        RendererKind::Auto => Box::new(FallbackRenderer::new(
            Box::new(PandocRenderer::new(pandoc_path)),
            Box::new(BuiltinRenderer::new()),
        )),
    }
}

/// Renderer plus the code-widget pass, as used for chat replies
pub struct ResponseRenderer {
    renderer: Box<dyn Renderer>,
    widgets: CodeWidgets,
}

impl ResponseRenderer {
    pub fn new(renderer: Box<dyn Renderer>, widgets: CodeWidgets) -> Self {
        Self { renderer, widgets }
    }

    pub async fn render(&self, markdown: &str) -> RenderResult<String> {
        let html = self.renderer.render(markdown).await?;
        Ok(self.widgets.wrap(&html))
    }

    pub fn renderer_name(&self) -> &str {
        self.renderer.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl Renderer for Failing {
        async fn render(&self, _markdown: &str) -> RenderResult<String> {
            Err(RenderError::Unavailable("pandoc".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_renderer_kind_parsing() {
        assert_eq!("auto".parse::<RendererKind>(), Ok(RendererKind::Auto));
        assert_eq!("Pandoc".parse::<RendererKind>(), Ok(RendererKind::Pandoc));
        assert!("html".parse::<RendererKind>().is_err());
        assert_eq!(RendererKind::Builtin.to_string(), "builtin");
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let renderer = FallbackRenderer::new(Box::new(Failing), Box::new(BuiltinRenderer::new()));
        let html = renderer.render("**bold**").await.unwrap();
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[tokio::test]
    async fn test_response_renderer_wraps_code() {
        let renderer = ResponseRenderer::new(
            Box::new(BuiltinRenderer::new()),
            CodeWidgets::new(["javascript"]),
        );
        let html = renderer
            .render("Try:\n\n```javascript\nconsole.log(1 < 2);\n```\n")
            .await
            .unwrap();

        assert!(html.contains(r#"<div class="code-widget" data-language="javascript">"#));
        assert!(html.contains("console.log(1 &lt; 2);"));
        assert!(html.contains("code-widget-run"));
        assert_eq!(renderer.renderer_name(), "builtin");
    }
}
