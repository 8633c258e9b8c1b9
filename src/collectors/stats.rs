use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::path::Path;
use std::time::Instant;

/// Self-monitoring for one collection pass.
#[derive(Clone)]
pub struct AgentStats {
    job_duration_seconds: HistogramVec,
    job_errors_total: IntCounterVec,
    records_total: IntCounter,
    bundles: IntGauge,
    registry: Registry,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentStats {
    /// Create the stats registry.
    ///
    /// # Panics
    ///
    /// Panics if metric creation or registration fails.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let job_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "oracledb_agent_job_duration_seconds",
                "Time spent running each collection job in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["job"],
        )
        .expect("oracledb_agent_job_duration_seconds");

        let job_errors_total = IntCounterVec::new(
            Opts::new("oracledb_agent_job_errors_total", "Total number of failed collection jobs"),
            &["job"],
        )
        .expect("oracledb_agent_job_errors_total");

        let records_total = IntCounter::with_opts(Opts::new(
            "oracledb_agent_records_total",
            "Total number of records emitted by collection jobs",
        ))
        .expect("oracledb_agent_records_total");

        let bundles = IntGauge::with_opts(Opts::new(
            "oracledb_agent_bundles",
            "Number of metric sets in the published payload",
        ))
        .expect("oracledb_agent_bundles");

        let registry = Registry::new();
        registry
            .register(Box::new(job_duration_seconds.clone()))
            .expect("register oracledb_agent_job_duration_seconds");
        registry
            .register(Box::new(job_errors_total.clone()))
            .expect("register oracledb_agent_job_errors_total");
        registry
            .register(Box::new(records_total.clone()))
            .expect("register oracledb_agent_records_total");
        registry
            .register(Box::new(bundles.clone()))
            .expect("register oracledb_agent_bundles");

        Self {
            job_duration_seconds,
            job_errors_total,
            records_total,
            bundles,
            registry,
        }
    }

    #[must_use]
    pub fn start_job(&self, job: &str) -> JobTimer {
        JobTimer {
            job: job.to_string(),
            start: Instant::now(),
            stats: self.clone(),
            finished: false,
        }
    }

    pub fn add_records(&self, count: usize) {
        self.records_total.inc_by(count as u64);
    }

    pub fn set_bundles(&self, count: usize) {
        self.bundles.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    #[must_use]
    pub fn records(&self) -> u64 {
        self.records_total.get()
    }

    #[must_use]
    pub fn job_errors(&self, job: &str) -> u64 {
        self.job_errors_total.with_label_values(&[job]).get()
    }

    fn record_success(&self, job: &str, duration: f64) {
        self.job_duration_seconds
            .with_label_values(&[job])
            .observe(duration);
    }

    fn record_error(&self, job: &str, duration: f64) {
        self.job_errors_total.with_label_values(&[job]).inc();
        self.job_duration_seconds
            .with_label_values(&[job])
            .observe(duration);
    }

    /// Text exposition of every agent metric.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Write [`render`](Self::render) output to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()?)?;
        Ok(())
    }
}

/// Times one job. Dropping an unfinished timer counts as success.
pub struct JobTimer {
    job: String,
    start: Instant,
    stats: AgentStats,
    finished: bool,
}

impl JobTimer {
    pub fn success(mut self) {
        self.finished = true;
        let duration = self.start.elapsed().as_secs_f64();
        self.stats.record_success(&self.job, duration);
    }

    pub fn error(mut self) {
        self.finished = true;
        let duration = self.start.elapsed().as_secs_f64();
        self.stats.record_error(&self.job, duration);
    }
}

impl Drop for JobTimer {
    fn drop(&mut self) {
        if !self.finished {
            let duration = self.start.elapsed().as_secs_f64();
            self.stats.record_success(&self.job, duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_job_timer_records_duration() {
        let stats = AgentStats::new();

        let timer = stats.start_job("sysstat");
        thread::sleep(Duration::from_millis(5));
        timer.success();

        let text = stats.render().unwrap();
        assert!(text.contains("oracledb_agent_job_duration_seconds_count{job=\"sysstat\"} 1"));
        assert_eq!(stats.job_errors("sysstat"), 0);
    }

    #[test]
    fn test_job_timer_records_error_once() {
        let stats = AgentStats::new();
        stats.start_job("sga").error();
        assert_eq!(stats.job_errors("sga"), 1);
    }

    #[test]
    fn test_dropped_timer_counts_as_success() {
        let stats = AgentStats::new();
        {
            let _timer = stats.start_job("pga_metrics");
        }
        assert_eq!(stats.job_errors("pga_metrics"), 0);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_write_textfile() {
        let stats = AgentStats::new();
        stats.add_records(7);
        stats.set_bundles(3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.prom");
        stats.write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("oracledb_agent_records_total 7"));
        assert!(text.contains("oracledb_agent_bundles 3"));
        assert_eq!(stats.records(), 7);
    }
}
