use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use talktab_interaction::ValidationClient;

use super::utils::bootstrap;

pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = bootstrap(config_path, None)?;
    let client = ValidationClient::from_config(&config.validator)
        .context("Failed to create validation client")?;

    if client.health_check().await {
        println!(
            "{}",
            format!("✓ Validator is healthy ({})", config.validator.base_url).bright_green()
        );
        Ok(())
    } else {
        anyhow::bail!("Validator at {} is not healthy", config.validator.base_url)
    }
}
