use crate::built_info;
use crate::cli::actions::{Action, OutputOptions};
use crate::collectors::config::CollectorConfig;
use crate::collectors::orchestrator;
use crate::collectors::stats::AgentStats;
use crate::database::{ConnectionSettings, OracleDatabase};
use crate::integration::Integration;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Handle the action
///
/// # Errors
///
/// Returns an error if the database cannot be reached, the instance lookup
/// fails or the payload cannot be published.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::ShowVersion => {
            println!("{}", version_info());
        }
        Action::Run {
            settings,
            config,
            output,
        } => {
            run(settings, config, output).await?;
        }
    }

    Ok(())
}

async fn run(settings: ConnectionSettings, config: CollectorConfig, output: OutputOptions) -> Result<()> {
    let db = OracleDatabase::connect(settings)
        .await
        .context("failed to open database")?;
    db.ping().await.context("failed to ping database")?;

    let stats = AgentStats::new();
    let integration = Integration::new(built_info::PKG_NAME, built_info::PKG_VERSION);

    let (integration, summary) =
        orchestrator::collect(Arc::new(db), Arc::new(config), integration, stats.clone()).await?;

    if summary.failed > 0 {
        warn!(failed = summary.failed, jobs = summary.launched, "some collection jobs failed");
    }

    integration
        .publish(std::io::stdout().lock(), output.pretty)
        .context("failed to publish payload")?;

    if let Some(path) = output.stats_file {
        stats
            .write_textfile(&path)
            .with_context(|| format!("failed to write stats file {}", path.display()))?;
        info!(path = %path.display(), "wrote agent stats");
    }

    Ok(())
}

#[must_use]
pub fn version_info() -> String {
    format!(
        "{} version: {}, target: {}, rustc: {}, git commit: {}, build date: {}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::TARGET,
        built_info::RUSTC_VERSION,
        built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown"),
        built_info::BUILT_TIME_UTC,
    )
}
