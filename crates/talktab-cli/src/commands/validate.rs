use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use talktab_core::validation::{SchemaValidator, ValidationOutcome};
use talktab_interaction::ValidationClient;

use super::utils::bootstrap;

/// One-shot validation of a schema file. Ctrl-C aborts retries.
pub async fn run(
    config_path: Option<PathBuf>,
    new_file: PathBuf,
    old_file: Option<PathBuf>,
) -> Result<()> {
    let config = bootstrap(config_path, None)?;

    let new_schema = fs::read_to_string(&new_file)
        .with_context(|| format!("Failed to read {}", new_file.display()))?;
    let old_schema = match &old_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => String::new(),
    };

    let client = ValidationClient::from_config(&config.validator)
        .context("Failed to create validation client")?;

    let cancel = CancellationToken::new();
    let outcome = {
        let validation = client.validate(&old_schema, &new_schema, &cancel);
        tokio::pin!(validation);
        loop {
            tokio::select! {
                outcome = &mut validation => break outcome,
                _ = tokio::signal::ctrl_c() => cancel.cancel(),
            }
        }
    };

    match outcome {
        ValidationOutcome::Success { diff, .. } => {
            println!("{}", format!("✓ {} is valid", new_file.display()).bright_green());
            let diff = serde_json::to_string_pretty(&diff).context("Failed to render diff")?;
            println!("{}", "Diff:".bright_black());
            println!("{diff}");
            Ok(())
        }
        ValidationOutcome::DomainFailure { errors } => {
            println!("{}", format!("✗ {} is invalid", new_file.display()).red());
            for issue in &errors {
                println!("  {}", issue.to_string().yellow());
            }
            anyhow::bail!("Schema rejected with {} error(s)", errors.len())
        }
        ValidationOutcome::TransportFailure { cause, attempts } => {
            anyhow::bail!("Validator unreachable after {attempts} attempt(s): {cause}")
        }
        ValidationOutcome::ProtocolFailure { detail } => {
            anyhow::bail!("Validator returned an unreadable response: {detail}")
        }
        ValidationOutcome::Cancelled => anyhow::bail!("Validation cancelled"),
    }
}
