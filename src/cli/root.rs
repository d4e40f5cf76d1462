use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use super::models::ModelsCommand;
use super::run::RunCommand;
use super::serve::ServeCommand;
use crate::config::Config;

/// codepal - a chat backend for your local code assistant model
#[derive(Parser)]
#[command(
    name = "codepal",
    version,
    about = "A chat backend for your local code assistant model",
    long_about = r#"codepal serves a chat UI backed by a locally hosted Ollama model.
Conversations are kept in SQLite, lines the model marks as important are
remembered across turns, and code blocks in replies can be run in place.

Examples:
  codepal                          # Start the server on 127.0.0.1:5000
  codepal serve --bind 0.0.0.0:8080
  codepal run "explain this regex"  # One chat turn without the server
  codepal models                   # List models the Ollama server has"#
)]
pub struct Cli {
    /// Current working directory
    #[arg(short = 'c', long = "cwd", global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve(ServeCommand),

    /// Run a single chat turn non-interactively
    Run(RunCommand),

    /// List the models available on the model server
    Models(ModelsCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }

        // Change working directory if specified
        if let Some(cwd) = &self.cwd {
            std::env::set_current_dir(cwd).map_err(|e| {
                anyhow::anyhow!("Failed to change directory to {}: {}", cwd.display(), e)
            })?;
            info!("Changed working directory to: {}", cwd.display());
        }

        // Initialize configuration
        let config = Config::init().await?;
        debug!("Configuration initialized");

        match self.command {
            Some(Commands::Serve(serve_cmd)) => serve_cmd.execute(config).await,
            Some(Commands::Run(run_cmd)) => run_cmd.execute(&config).await,
            Some(Commands::Models(models_cmd)) => models_cmd.execute(&config).await,
            None => ServeCommand::default().execute(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["codepal", "--debug", "serve", "--bind", "0.0.0.0:8080"]);
        assert!(cli.debug);
        match cli.command {
            Some(Commands::Serve(cmd)) => assert_eq!(cmd.bind.as_deref(), Some("0.0.0.0:8080")),
            _ => panic!("expected serve"),
        }

        let cli = Cli::parse_from(["codepal", "run", "--session", "abc", "--raw", "fix", "this"]);
        match cli.command {
            Some(Commands::Run(cmd)) => {
                assert_eq!(cmd.session, "abc");
                assert!(cmd.raw);
                assert_eq!(cmd.prompt, vec!["fix", "this"]);
            }
            _ => panic!("expected run"),
        }

        let cli = Cli::parse_from(["codepal"]);
        assert!(cli.command.is_none());
    }
}
