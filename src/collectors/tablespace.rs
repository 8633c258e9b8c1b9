use crate::collectors::config::CollectorConfig;
use crate::collectors::{EntityKind, MetricGroup, all_groups};
use crate::database::Database;
use anyhow::{Result, anyhow};
use tracing::{debug, error, info, instrument, warn};

const TABLESPACE_COUNT_QUERY: &str = "SELECT count(1) FROM DBA_TABLESPACES WHERE TABLESPACE_NAME <> 'TEMP'";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Skip(String),
}

impl Gate {
    #[must_use]
    pub const fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Decide whether tablespace groups may run in this pass.
#[instrument(skip(db, config), level = "info", fields(otel.kind = "internal"))]
pub async fn check(db: &dyn Database, config: &CollectorConfig) -> Gate {
    match config.tablespaces() {
        Some([]) => {
            info!("no tablespaces specified, nothing to collect");
            Gate::Skip("empty tablespace allow-list".to_string())
        }
        Some(names) => {
            debug!(tablespaces = names.len(), "collecting allow-listed tablespaces");
            Gate::Proceed
        }
        None => match count(db).await {
            Err(e) => {
                warn!(error = %e, "unable to determine the number of tablespaces, skipping tablespace collection");
                Gate::Skip(format!("tablespace count failed: {e}"))
            }
            Ok(count) if count > config.max_tablespaces => {
                error!(
                    tablespaces = count,
                    max_tablespaces = config.max_tablespaces,
                    "too many tablespaces to collect, use the tablespaces allow-list to limit collection size"
                );
                Gate::Skip(format!("{count} tablespaces exceed the limit of {}", config.max_tablespaces))
            }
            Ok(count) => {
                debug!(tablespaces = count, "tablespace count within limit");
                Gate::Proceed
            }
        },
    }
}

async fn count(db: &dyn Database) -> Result<usize> {
    let rows = db.query(TABLESPACE_COUNT_QUERY).await?;
    let value = rows.scalar().ok_or_else(|| anyhow!("tablespace count returned no rows"))?;
    let count = value
        .as_f64()
        .ok_or_else(|| anyhow!("tablespace count is not numeric: {value}"))?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(count.max(0.0) as usize)
}

/// Enabled tablespace-scoped groups.
#[must_use]
pub fn groups(config: &CollectorConfig) -> Vec<&'static MetricGroup> {
    all_groups()
        .into_iter()
        .filter(|g| g.scope == EntityKind::Tablespace && g.is_enabled(config))
        .collect()
}

/// Tablespace groups to launch in this pass: none when no group is enabled
/// (without querying), none when the gate skips, otherwise every enabled
/// group.
pub async fn admitted_groups(db: &dyn Database, config: &CollectorConfig) -> Vec<&'static MetricGroup> {
    let groups = groups(config);
    if groups.is_empty() {
        debug!("every tablespace group is disabled");
        return groups;
    }

    match check(db, config).await {
        Gate::Proceed => groups,
        Gate::Skip(reason) => {
            debug!(reason = %reason, "tablespace collection skipped");
            Vec::new()
        }
    }
}
