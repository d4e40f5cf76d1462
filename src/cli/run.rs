use anyhow::{anyhow, Result};
use clap::Args;
use std::io::{self, Read};
use tracing::{debug, info};

use crate::app::ChatService;
use crate::config::Config;

/// Run a single chat turn non-interactively
#[derive(Args)]
pub struct RunCommand {
    /// The prompt to run. If not provided, will read from stdin
    pub prompt: Vec<String>,

    /// Chat to add the turn to
    #[arg(short = 's', long = "session", default_value = "cli")]
    pub session: String,

    /// Print the model's markdown instead of rendered HTML
    #[arg(short = 'r', long = "raw")]
    pub raw: bool,
}

impl RunCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        debug!("Executing run command");

        // Get the prompt either from arguments or stdin
        let prompt = self.get_prompt()?;

        if prompt.trim().is_empty() {
            return Err(anyhow!("No prompt provided. Use arguments or pipe input via stdin."));
        }

        info!("Running prompt: {}", prompt.chars().take(50).collect::<String>());

        let service = ChatService::from_config(config)?;
        let reply = service.chat(&self.session, prompt.trim()).await?;

        if self.raw {
            println!("{}", reply.raw);
        } else {
            println!("{}", reply.response);
        }

        if let Some(chat) = service.get_chat(&self.session).await? {
            info!(
                "Chat '{}' now holds {} important fact(s)",
                chat.title.unwrap_or_default(),
                reply.important_info.len()
            );
        }

        Ok(())
    }

    fn get_prompt(&self) -> Result<String> {
        if !self.prompt.is_empty() {
            // Join all arguments into a single prompt
            Ok(self.prompt.join(" "))
        } else {
            // Read from stdin
            debug!("Reading prompt from stdin");
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| anyhow!("Failed to read from stdin: {}", e))?;
            Ok(buffer)
        }
    }
}
