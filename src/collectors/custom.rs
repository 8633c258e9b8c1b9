//! User supplied queries, either a single ad-hoc query or a YAML file of
//! queries:
//!
//! ```yaml
//! queries:
//!   - query: SELECT username, count(*) AS sessions FROM v$session GROUP BY username
//!     sample_name: MySessionSample
//!     metric_types:
//!       sessions: gauge
//! ```

use crate::collectors::config::ConfigError;
use crate::collectors::executor::send;
use crate::collectors::util::instance_id_string;
use crate::collectors::{CustomRecordBatch, Message};
use crate::database::{Database, normalize_query};
use crate::integration::MetricKind;
use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, instrument};

pub const DEFAULT_SAMPLE: &str = "OracleCustomSample";

/// Queries from a config file admitted to the database at once.
pub const MAX_CONCURRENT_QUERIES: usize = 10;

const INSTANCE_QUERY: &str = "SELECT INSTANCE_NUMBER FROM v$instance";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomQuery {
    pub query: String,
    pub sample_name: String,
    /// Keyed by lower-cased column name.
    pub overrides: HashMap<String, MetricKind>,
}

impl CustomQuery {
    #[must_use]
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            sample_name: DEFAULT_SAMPLE.to_string(),
            overrides: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_sample_name(mut self, sample: &str) -> Self {
        if !sample.trim().is_empty() {
            self.sample_name = sample.trim().to_string();
        }
        self
    }

    #[must_use]
    pub fn with_override(mut self, column: &str, kind: MetricKind) -> Self {
        self.overrides.insert(column.to_ascii_lowercase(), kind);
        self
    }
}

#[derive(Deserialize)]
struct QueryFile {
    #[serde(default)]
    queries: Vec<QueryEntry>,
}

#[derive(Deserialize)]
struct QueryEntry {
    query: String,
    #[serde(default)]
    sample_name: Option<String>,
    #[serde(default)]
    metric_types: HashMap<String, String>,
}

/// Read a custom query file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML, or names
/// an unknown metric type.
pub fn load_config(path: &Path) -> Result<Vec<CustomQuery>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::CustomConfigRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&raw).map_err(|reason| ConfigError::CustomConfigParse {
        path: path.display().to_string(),
        reason,
    })
}

fn parse_config(raw: &str) -> Result<Vec<CustomQuery>, String> {
    let file: QueryFile = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;

    file.queries
        .into_iter()
        .map(|entry| {
            let mut query = CustomQuery::new(entry.query.trim())
                .with_sample_name(entry.sample_name.as_deref().unwrap_or_default());
            for (column, kind) in entry.metric_types {
                let kind = kind.parse::<MetricKind>().map_err(|e| format!("column {column}: {e}"))?;
                query = query.with_override(&column, kind);
            }
            if query.query.is_empty() {
                return Err("entry with an empty query".to_string());
            }
            Ok(query)
        })
        .collect()
}

/// Run one custom query and push its rows as a single batch.
///
/// # Errors
///
/// Returns an error if the instance lookup or the query itself fails. No
/// batch is emitted in that case.
#[instrument(skip(db, query, tx), level = "info", fields(sample = %query.sample_name, otel.kind = "internal"))]
pub async fn collect(db: &dyn Database, query: &CustomQuery, tx: &Sender<Message>) -> Result<usize> {
    let instance = db.query(INSTANCE_QUERY).await.inspect_err(|e| {
        error!(query = %normalize_query(&query.query), error = %e, "failed to get instance number");
    })?;
    let Some(instance_id) = instance.scalar().and_then(instance_id_string) else {
        error!(query = %normalize_query(&query.query), "v$instance returned no instance number");
        return Err(anyhow!("v$instance returned no instance number"));
    };

    let rows = db.query(&query.query).await.inspect_err(|e| {
        error!(query = %normalize_query(&query.query), error = %e, "failed to execute custom query");
    })?;

    if rows.is_empty() {
        info!(query = %normalize_query(&query.query), "query did not return any results");
    }

    let count = rows.len();
    send(
        tx,
        Message::Custom(CustomRecordBatch {
            instance_id,
            sample: query.sample_name.clone(),
            rows,
            overrides: query.overrides.clone(),
        }),
    )
    .await?;

    debug!(rows = count, "custom query collected");
    Ok(count)
}

/// [`collect`] behind a permit from `limiter`.
///
/// # Errors
///
/// Returns an error if the semaphore was closed or the query fails.
pub async fn collect_limited(
    db: &dyn Database,
    query: &CustomQuery,
    tx: &Sender<Message>,
    limiter: &Semaphore,
) -> Result<usize> {
    let _permit = limiter
        .acquire()
        .await
        .map_err(|e| anyhow!("custom query limiter closed: {e}"))?;
    collect(db, query, tx).await
}
