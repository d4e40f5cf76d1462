use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::llm::ProviderFactory;

/// List the models available on the model server
#[derive(Args)]
pub struct ModelsCommand {}

impl ModelsCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let provider = ProviderFactory::create_provider(config.provider_config())?;
        let models = provider.list_models().await?;

        if models.is_empty() {
            println!("No models installed on the {} server", provider.name());
            return Ok(());
        }

        for model in models {
            let marker = if model == provider.model()
                || model.strip_suffix(":latest") == Some(provider.model())
            {
                "*"
            } else {
                " "
            };
            println!("{} {}", marker, model);
        }

        Ok(())
    }
}
