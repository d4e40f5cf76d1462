//! Code snippet execution for the "try it" feature
//!
//! A snippet is written to a scratch directory and run with the interpreter
//! configured for its language. This is a timeout and cleanup wrapper around
//! a subprocess, not an isolation boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::utils::text::string::truncate_bytes;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Execution timed out after {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SandboxResult<T> = Result<T, SandboxError>;

/// How to run one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Program to invoke, looked up on PATH
    pub interpreter: String,
    /// Arguments placed before the snippet path
    #[serde(default)]
    pub args: Vec<String>,
    /// File suffix for the snippet, including the dot
    pub suffix: String,
    /// Other names the language goes by in code fences
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Sandbox settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    #[serde(with = "crate::utils::duration_str")]
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub default_language: String,
    pub runtimes: BTreeMap<String, RuntimeSpec>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let mut runtimes = BTreeMap::new();
        runtimes.insert(
            "javascript".to_string(),
            RuntimeSpec {
                interpreter: "node".to_string(),
                args: Vec::new(),
                suffix: ".js".to_string(),
                aliases: vec!["js".to_string(), "node".to_string()],
            },
        );
        runtimes.insert(
            "python".to_string(),
            RuntimeSpec {
                interpreter: "python3".to_string(),
                args: Vec::new(),
                suffix: ".py".to_string(),
                aliases: vec!["py".to_string(), "python3".to_string()],
            },
        );

        Self {
            timeout: Duration::from_secs(5),
            max_output_bytes: 64 * 1024,
            default_language: "javascript".to_string(),
            runtimes,
        }
    }
}

/// Result of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    /// stdout when the process exited 0, stderr otherwise
    pub output: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Runs snippets with a fixed timeout
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    config: SandboxConfig,
}

impl SandboxRunner {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Canonical language name for `language` (or the default when absent)
    pub fn resolve(&self, language: Option<&str>) -> SandboxResult<(&str, &RuntimeSpec)> {
        let wanted = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.config.default_language.as_str())
            .to_ascii_lowercase();

        self.config
            .runtimes
            .iter()
            .find(|(name, spec)| {
                name.eq_ignore_ascii_case(&wanted)
                    || spec.aliases.iter().any(|a| a.eq_ignore_ascii_case(&wanted))
            })
            .map(|(name, spec)| (name.as_str(), spec))
            .ok_or(SandboxError::UnsupportedLanguage(wanted))
    }

    /// Every name a Run button may be offered for
    pub fn runnable_languages(&self) -> Vec<String> {
        self.config
            .runtimes
            .iter()
            .flat_map(|(name, spec)| std::iter::once(name.clone()).chain(spec.aliases.iter().cloned()))
            .collect()
    }

    /// Execute a snippet and capture its output
    pub async fn run(&self, code: &str, language: Option<&str>) -> SandboxResult<RunOutcome> {
        let (name, runtime) = self.resolve(language)?;

        // The directory and the snippet in it go away when `workdir` drops,
        // including on timeout.
        let workdir = tempfile::Builder::new().prefix("codepal-run-").tempdir()?;
        let script = workdir.path().join(format!("snippet{}", runtime.suffix));
        tokio::fs::write(&script, code).await?;

        let mut cmd = Command::new(&runtime.interpreter);
        cmd.args(&runtime.args)
            .arg(&script)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let child = cmd.spawn().map_err(|source| match source.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => SandboxError::Spawn {
                interpreter: runtime.interpreter.clone(),
                source,
            },
            _ => SandboxError::Io(source),
        })?;

        let output = match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(language = name, "Snippet timed out");
                return Err(SandboxError::Timeout(
                    humantime::format_duration(self.config.timeout).to_string(),
                ));
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let success = output.status.success();
        let stream = if success { &output.stdout } else { &output.stderr };
        let text = String::from_utf8_lossy(stream);
        let (kept, truncated) = truncate_bytes(&text, self.config.max_output_bytes);
        let mut rendered = kept.to_string();
        if truncated {
            rendered.push_str(&format!(
                "\n... output truncated ({} bytes total)",
                text.len()
            ));
        }

        debug!(
            language = name,
            exit_code = ?output.status.code(),
            duration_ms,
            "Snippet finished"
        );

        Ok(RunOutcome {
            success,
            output: rendered,
            exit_code: output.status.code(),
            duration_ms,
        })
    }
}

#[cfg(test)]
pub(crate) fn shell_runner(timeout: Duration, max_output_bytes: usize) -> SandboxRunner {
    let mut runtimes = BTreeMap::new();
    runtimes.insert(
        "shell".to_string(),
        RuntimeSpec {
            interpreter: "sh".to_string(),
            args: Vec::new(),
            suffix: ".sh".to_string(),
            aliases: vec!["sh".to_string()],
        },
    );
    SandboxRunner::new(SandboxConfig {
        timeout,
        max_output_bytes,
        default_language: "shell".to_string(),
        runtimes,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner() -> SandboxRunner {
        shell_runner(Duration::from_secs(5), 1024)
    }

    #[tokio::test]
    async fn test_successful_run_returns_stdout() {
        let outcome = runner().run("echo 'Hello, World!'\necho oops >&2", None).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "Hello, World!\n");
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_failed_run_returns_stderr() {
        let outcome = runner()
            .run("echo ignored\necho 'boom' >&2\nexit 3", Some("sh"))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.output, "boom\n");
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = shell_runner(Duration::from_millis(200), 1024);
        let err = runner.run("sleep 5", None).await.unwrap_err();
        assert!(matches!(err, SandboxError::Timeout(_)));
        assert_eq!(err.to_string(), "Execution timed out after 200ms");
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let err = runner().run("puts 1", Some("Ruby")).await.unwrap_err();
        assert!(matches!(err, SandboxError::UnsupportedLanguage(ref l) if l == "ruby"));
    }

    #[tokio::test]
    async fn test_output_truncated() {
        let runner = shell_runner(Duration::from_secs(5), 10);
        let outcome = runner.run("printf '%s' 0123456789abcdef", None).await.unwrap();
        assert!(outcome.output.starts_with("0123456789\n... output truncated (16 bytes total)"));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let mut config = SandboxConfig::default();
        config.runtimes.get_mut("javascript").unwrap().interpreter =
            "no-such-interpreter-here".to_string();
        let err = SandboxRunner::new(config).run("1", Some("js")).await.unwrap_err();
        assert!(matches!(err, SandboxError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_runs_in_scratch_directory() {
        let outcome = runner().run("ls", None).await.unwrap();
        assert_eq!(outcome.output, "snippet.sh\n");
    }

    #[test]
    fn test_default_runtimes_and_aliases() {
        let runner = SandboxRunner::new(SandboxConfig::default());
        assert_eq!(runner.resolve(None).unwrap().0, "javascript");
        assert_eq!(runner.resolve(Some("JS")).unwrap().0, "javascript");
        assert_eq!(runner.resolve(Some("py")).unwrap().0, "python");

        let languages = runner.runnable_languages();
        for name in ["javascript", "js", "node", "python", "py", "python3"] {
            assert!(languages.contains(&name.to_string()), "missing {}", name);
        }
    }
}
