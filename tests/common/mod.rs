use anyhow::Result;
use oracledb_agent::collectors::config::{CollectorConfig, Endpoint};
use oracledb_agent::collectors::orchestrator::{self, JobSummary};
use oracledb_agent::collectors::stats::AgentStats;
use oracledb_agent::database::Value;
use oracledb_agent::database::mock::{MockDatabase, MockResponse};
use oracledb_agent::integration::{Integration, MetricSet};
use std::sync::Arc;

/// Lookup query expectation mapping each `(id, name)`.
pub fn with_instances(db: MockDatabase, instances: &[(i64, &str)]) -> Result<MockDatabase> {
    let rows = instances
        .iter()
        .map(|(id, name)| vec![Value::from(*name), Value::Number(id.to_string())])
        .collect();
    Ok(db.on(
        "INSTANCE_NAME, INST_ID",
        MockResponse::rows(&["INSTANCE_NAME", "INST_ID"], rows),
    )?)
}

/// Answer every remaining query with an empty result. Register last.
pub fn with_catch_all(db: MockDatabase) -> Result<MockDatabase> {
    Ok(db.on(".*", MockResponse::empty(&[]).repeatedly())?)
}

pub fn tablespace_count(n: i64) -> MockResponse {
    MockResponse::rows(&["COUNT(1)"], vec![vec![Value::Number(n.to_string())]])
}

pub fn endpoint() -> Endpoint {
    Endpoint {
        hostname: "db.example".into(),
        port: 1521,
        service_name: "ORCLPDB1".into(),
    }
}

/// Metrics only, reported from [`endpoint`].
pub fn metrics_config() -> CollectorConfig {
    CollectorConfig::new()
        .with_outputs(true, false)
        .with_endpoint(endpoint())
}

pub async fn run(db: Arc<MockDatabase>, config: CollectorConfig) -> Result<(Integration, JobSummary)> {
    orchestrator::collect(
        db,
        Arc::new(config),
        Integration::new("oracledb_agent", "0.0.0"),
        AgentStats::new(),
    )
    .await
}

/// Metric sets of entity `(name, type)`.
#[allow(dead_code)]
pub fn sets<'a>(integration: &'a Integration, name: &str, entity_type: &str) -> Vec<&'a MetricSet> {
    integration
        .find_entity(name, entity_type)
        .map(|e| e.metrics.iter().collect())
        .unwrap_or_default()
}
