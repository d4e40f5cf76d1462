use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{RenderError, RenderResult, Renderer};

const PANDOC_TIMEOUT: Duration = Duration::from_secs(30);

/// Markdown reader with raw HTML passthrough off. Model output is untrusted.
const PANDOC_FROM: &str = "markdown-raw_html-raw_attribute";

/// Renders through an external `pandoc` binary
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    program: String,
    timeout: Duration,
}

impl PandocRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: PANDOC_TIMEOUT,
        }
    }
}

#[async_trait]
impl Renderer for PandocRenderer {
    async fn render(&self, markdown: &str) -> RenderResult<String> {
        // Both files are removed when dropped, whichever way we leave.
        let mut input = tempfile::Builder::new()
            .prefix("codepal-")
            .suffix(".txt")
            .tempfile()?;
        input.write_all(markdown.as_bytes())?;
        input.flush()?;

        let output = tempfile::Builder::new()
            .prefix("codepal-")
            .suffix(".html")
            .tempfile()?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--from")
            .arg(PANDOC_FROM)
            .arg("--to")
            .arg("html")
            .arg(input.path())
            .arg("-o")
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => RenderError::Unavailable(self.program.clone()),
            _ => RenderError::Io(e),
        })?;

        let result = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RenderError::Timeout(
                    humantime::format_duration(self.timeout).to_string(),
                ))
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).to_string();
            return Err(RenderError::Converter(stderr));
        }

        let html = tokio::fs::read_to_string(output.path()).await?;
        debug!(bytes = html.len(), "pandoc conversion finished");
        Ok(html)
    }

    fn name(&self) -> &str {
        "pandoc"
    }
}
