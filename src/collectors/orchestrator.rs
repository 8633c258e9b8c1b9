use crate::collectors::aggregator::Aggregator;
use crate::collectors::config::CollectorConfig;
use crate::collectors::custom::{self, CustomQuery, MAX_CONCURRENT_QUERIES};
use crate::collectors::instances::InstanceLookup;
use crate::collectors::stats::AgentStats;
use crate::collectors::{EntityKind, Message, MetricGroup, all_groups, executor, inventory, tablespace};
use crate::database::Database;
use crate::integration::Integration;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, instrument};
use tracing_futures::Instrument as _;

/// Capacity of the queue between producers and the aggregator.
pub const QUEUE_CAPACITY: usize = 100;

/// Outcome of the producers of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct JobOutcome {
    name: String,
    result: Result<usize>,
}

/// Enabled instance-scoped groups.
#[must_use]
pub fn instance_groups(config: &CollectorConfig) -> Vec<&'static MetricGroup> {
    all_groups()
        .into_iter()
        .filter(|g| g.scope == EntityKind::Instance && g.is_enabled(config))
        .collect()
}

pub struct Orchestrator {
    db: Arc<dyn Database>,
    config: Arc<CollectorConfig>,
    lookup: Arc<InstanceLookup>,
    stats: AgentStats,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        db: Arc<dyn Database>,
        config: Arc<CollectorConfig>,
        lookup: Arc<InstanceLookup>,
        stats: AgentStats,
    ) -> Self {
        Self {
            db,
            config,
            lookup,
            stats,
        }
    }

    /// Run one collection pass into `integration`.
    ///
    /// Every job writes to one queue. The supervisor owns the original
    /// sender and drops it once every job has finished, which is the only
    /// way the queue closes. The aggregator drains the queue concurrently
    /// until then. Job failures are logged and counted in the summary.
    #[instrument(skip(self, integration), level = "info", fields(otel.kind = "internal"))]
    pub async fn run(&self, integration: Integration) -> (Integration, JobSummary) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        let producers = async move {
            let jobs = self.launch(&tx).await;
            info!(jobs = jobs.len(), "launched collection jobs");
            supervise(jobs, tx).await
        };
        let aggregator = Aggregator::new(integration, Arc::clone(&self.lookup), self.config.endpoint.clone());

        let (summary, integration) = tokio::join!(producers, aggregator.run(rx));

        self.stats.set_bundles(integration.metric_set_count());
        info!(
            jobs = summary.launched,
            failed = summary.failed,
            bundles = integration.metric_set_count(),
            "collection pass finished"
        );

        (integration, summary)
    }

    /// Spawn every job of the pass. Tablespace groups join once the gate
    /// admits them, while the other jobs are already running.
    async fn launch(&self, tx: &Sender<Message>) -> JoinSet<JobOutcome> {
        let mut jobs = JoinSet::new();

        if self.config.collect_metrics {
            self.spawn_metric_jobs(&mut jobs, tx);
        }

        if self.config.collect_inventory {
            let db = Arc::clone(&self.db);
            let tx = tx.clone();
            self.spawn(&mut jobs, "inventory", async move {
                inventory::collect(db.as_ref(), &tx).await
            });
        }

        if self.config.collect_metrics {
            for group in tablespace::admitted_groups(self.db.as_ref(), &self.config).await {
                self.spawn_group(&mut jobs, group, tx);
            }
        }

        jobs
    }

    fn spawn_group(&self, jobs: &mut JoinSet<JobOutcome>, group: &'static MetricGroup, tx: &Sender<Message>) {
        let db = Arc::clone(&self.db);
        let config = Arc::clone(&self.config);
        let tx = tx.clone();
        self.spawn(jobs, group.name, async move {
            executor::collect(db.as_ref(), group, &config, &tx).await
        });
    }

    fn spawn_metric_jobs(&self, jobs: &mut JoinSet<JobOutcome>, tx: &Sender<Message>) {
        for group in instance_groups(&self.config) {
            self.spawn_group(jobs, group, tx);
        }

        if let Some(query) = &self.config.custom_metrics_query {
            let db = Arc::clone(&self.db);
            let query = CustomQuery::new(query);
            let tx = tx.clone();
            self.spawn(jobs, "custom_metrics_query", async move {
                custom::collect(db.as_ref(), &query, &tx).await
            });
        }

        if !self.config.custom_queries.is_empty() {
            let limiter = Arc::new(Semaphore::new(MAX_CONCURRENT_QUERIES));
            for (idx, query) in self.config.custom_queries.iter().cloned().enumerate() {
                let db = Arc::clone(&self.db);
                let limiter = Arc::clone(&limiter);
                let tx = tx.clone();
                self.spawn(jobs, &format!("custom_metrics_config.{idx}"), async move {
                    custom::collect_limited(db.as_ref(), &query, &tx, &limiter).await
                });
            }
        }
    }

    fn spawn<F>(&self, jobs: &mut JoinSet<JobOutcome>, name: &str, job: F)
    where
        F: Future<Output = Result<usize>> + Send + 'static,
    {
        let name = name.to_string();
        let stats = self.stats.clone();
        let span = info_span!("collector.collect", job = %name, otel.kind = "internal");

        jobs.spawn(
            async move {
                let timer = stats.start_job(&name);
                let result = job.await;
                match &result {
                    Ok(records) => {
                        stats.add_records(*records);
                        timer.success();
                    }
                    Err(_) => timer.error(),
                }
                JobOutcome { name, result }
            }
            .instrument(span),
        );
    }
}

async fn supervise(mut jobs: JoinSet<JobOutcome>, tx: Sender<Message>) -> JobSummary {
    let mut summary = JobSummary {
        launched: jobs.len(),
        ..JobSummary::default()
    };

    while let Some(joined) = jobs.join_next().await {
        match joined {
            Ok(JobOutcome { name, result: Ok(records) }) => {
                debug!(job = %name, records, "job finished");
                summary.succeeded += 1;
            }
            Ok(JobOutcome { name, result: Err(e) }) => {
                debug!(job = %name, error = %e, "job failed");
                summary.failed += 1;
            }
            Err(e) => {
                error!(error = %e, "collection job panicked or was cancelled");
                summary.failed += 1;
            }
        }
    }

    drop(tx);
    summary
}

/// Load the instance lookup and run a full pass against `db`.
///
/// # Errors
///
/// Returns an error if the instance lookup cannot be built.
pub async fn collect(
    db: Arc<dyn Database>,
    config: Arc<CollectorConfig>,
    integration: Integration,
    stats: AgentStats,
) -> Result<(Integration, JobSummary)> {
    let lookup = Arc::new(InstanceLookup::load(db.as_ref()).await?);
    Ok(Orchestrator::new(db, config, lookup, stats).run(integration).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::GROUP_NAMES;
    use crate::database::Value;
    use crate::database::mock::{MockDatabase, MockResponse};

    fn orchestrator(db: MockDatabase, config: CollectorConfig) -> Orchestrator {
        let lookup: InstanceLookup = [("1", "ORCL1")].into_iter().collect();
        Orchestrator::new(Arc::new(db), Arc::new(config), Arc::new(lookup), AgentStats::new())
    }

    fn every_group() -> Vec<String> {
        GROUP_NAMES.iter().map(|g| (*g).to_string()).collect()
    }

    #[test]
    fn test_instance_groups_respect_config() {
        let all = instance_groups(&CollectorConfig::new());
        assert_eq!(all.len(), 20);
        assert!(all.iter().all(|g| g.scope == EntityKind::Instance));
        assert!(!all.iter().any(|g| g.name == "pdb_sys_metrics"));

        let config = CollectorConfig::new()
            .with_skipped(&["sysstat".into()])
            .with_sys_metrics_source(crate::collectors::config::SysMetricsSource::All);
        let names: Vec<_> = instance_groups(&config).iter().map(|g| g.name).collect();
        assert!(!names.contains(&"sysstat"));
        assert!(names.contains(&"pdb_sys_metrics"));
    }

    #[tokio::test]
    async fn test_inventory_only_pass() -> Result<()> {
        let db = MockDatabase::new().on(
            r"FROM gv\$parameter",
            MockResponse::rows(
                &["INST_ID", "NAME", "VALUE", "DESCRIPTION"],
                vec![vec![Value::Int(1), Value::from("processes"), Value::from("300"), Value::from("p")]],
            ),
        )?;
        let orchestrator = orchestrator(db, CollectorConfig::new().with_outputs(false, true));

        let (integration, summary) = orchestrator.run(Integration::new("test", "0.0.0")).await;
        assert_eq!(summary, JobSummary { launched: 1, succeeded: 1, failed: 0 });

        let entity = integration.find_entity("ORCL1", "ora-instance");
        assert!(entity.is_some_and(|e| e.inventory.contains_key("processes")));
        assert_eq!(integration.metric_set_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_one_batch_per_custom_query() -> Result<()> {
        let db = MockDatabase::new()
            .on(
                "INSTANCE_NUMBER",
                MockResponse::rows(&["INSTANCE_NUMBER"], vec![vec![Value::Int(1)]]).repeatedly(),
            )?
            .on(
                "FROM app_",
                MockResponse::rows(&["N"], vec![vec![Value::Int(1)], vec![Value::Int(2)]]).repeatedly(),
            )?;
        let config = CollectorConfig::new()
            .with_outputs(true, false)
            .with_skipped(&every_group())
            .with_custom_query(Some("SELECT n FROM app_a".into()))
            .with_custom_queries(vec![
                CustomQuery::new("SELECT n FROM app_b").with_sample_name("B"),
                CustomQuery::new("SELECT n FROM app_c").with_sample_name("C"),
            ]);
        let orchestrator = orchestrator(db, config);

        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let jobs = orchestrator.launch(&tx).await;
        let summary = supervise(jobs, tx).await;

        let mut samples = Vec::new();
        while let Some(message) = rx.recv().await {
            match message {
                Message::Custom(batch) => {
                    assert_eq!(batch.rows.len(), 2);
                    samples.push(batch.sample);
                }
                other => anyhow::bail!("unexpected message {other:?}"),
            }
        }
        samples.sort();

        assert_eq!(samples, vec!["B", "C", "OracleCustomSample"]);
        assert_eq!(summary, JobSummary { launched: 3, succeeded: 3, failed: 0 });
        Ok(())
    }

    #[tokio::test]
    async fn test_tablespace_groups_are_separate_jobs() -> Result<()> {
        let db = MockDatabase::new()
            .on(
                "DBA_TABLESPACES WHERE",
                MockResponse::rows(&["COUNT(1)"], vec![vec![Value::Int(1)]]),
            )?
            .on("DBA_TABLESPACE_USAGE_METRICS", MockResponse::error("ORA-00942"))?
            .on(".*", MockResponse::empty(&[]).repeatedly())?;
        let instance_groups: Vec<String> = instance_groups(&CollectorConfig::new())
            .iter()
            .map(|g| g.name.to_string())
            .collect();
        let config = CollectorConfig::new()
            .with_outputs(true, false)
            .with_skipped(&instance_groups);
        let stats = AgentStats::new();
        let orchestrator = Orchestrator::new(
            Arc::new(db),
            Arc::new(config),
            Arc::new(InstanceLookup::default()),
            stats.clone(),
        );

        let (_, summary) = orchestrator.run(Integration::new("test", "0.0.0")).await;

        assert_eq!(summary, JobSummary { launched: 6, succeeded: 5, failed: 1 });
        assert_eq!(stats.job_errors("tablespace_metrics"), 1);
        Ok(())
    }
}
