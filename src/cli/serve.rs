use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::ChatService;
use crate::config::Config;
use crate::server;

/// Start the HTTP server
#[derive(Args, Default)]
pub struct ServeCommand {
    /// Address to listen on, overriding the configured one
    #[arg(short = 'b', long = "bind")]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(self, mut config: Config) -> Result<()> {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }

        let service = Arc::new(ChatService::from_config(&config)?);

        let health = service.health().await;
        if health.model_reachable {
            info!("Model server reachable, using model {}", health.model);
        } else {
            warn!("Model server is not reachable; chat requests will fail until it is up");
        }

        server::serve(service, &config.bind_addr, &config.static_dir).await
    }
}
