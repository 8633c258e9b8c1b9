//! Collection engine.
//!
//! Every catalog [`MetricGroup`] and every custom query runs as its own task
//! and pushes [`Message`]s onto one bounded queue. A single aggregator drains
//! the queue into per-entity metric sets once all producers are done.

use crate::collectors::config::CollectorConfig;
use crate::database::{Rows, Value};
use crate::integration::MetricKind;
use std::collections::HashMap;
use std::fmt;

#[macro_use]
mod register_macro;

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod custom;
pub mod executor;
pub mod instances;
pub mod inventory;
pub mod orchestrator;
pub mod stats;
pub mod tablespace;
pub mod util;

/// The kind of entity a metric belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Instance,
    Tablespace,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Tablespace => "tablespace",
        }
    }

    #[must_use]
    pub const fn entity_type(self) -> &'static str {
        match self {
            Self::Instance => "ora-instance",
            Self::Tablespace => "ora-tablespace",
        }
    }

    #[must_use]
    pub const fn sample(self) -> &'static str {
        match self {
            Self::Instance => "OracleDatabaseSample",
            Self::Tablespace => "OracleTablespaceSample",
        }
    }

    /// Column identifying the entity in catalog result sets.
    #[must_use]
    pub const fn entity_column(self) -> &'static str {
        match self {
            Self::Instance => "INST_ID",
            Self::Tablespace => "TABLESPACE_NAME",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value exported from a group's result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubMetric {
    /// Exported metric name.
    pub name: &'static str,
    /// Column name (`Columns`) or label value (`NameValue`) it is read from.
    pub source: &'static str,
    pub kind: MetricKind,
    /// Non-default metrics are only emitted with extended metrics enabled.
    pub default: bool,
}

impl SubMetric {
    #[must_use]
    pub const fn gauge(name: &'static str, source: &'static str, default: bool) -> Self {
        Self {
            name,
            source,
            kind: MetricKind::Gauge,
            default,
        }
    }

    #[must_use]
    pub const fn rate(name: &'static str, source: &'static str) -> Self {
        Self {
            name,
            source,
            kind: MetricKind::Rate,
            default: true,
        }
    }

    #[must_use]
    pub const fn attribute(name: &'static str, source: &'static str) -> Self {
        Self {
            name,
            source,
            kind: MetricKind::Attribute,
            default: true,
        }
    }

    #[must_use]
    pub const fn selected(&self, extended: bool) -> bool {
        self.default || extended
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelMatch {
    Exact,
    Contains,
}

impl LabelMatch {
    #[must_use]
    pub fn matches(self, label: &str, source: &str) -> bool {
        match self {
            Self::Exact => label == source,
            Self::Contains => label.contains(source),
        }
    }
}

/// How a group's rows turn into records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoder {
    /// Each sub-metric reads the column named by its `source`.
    Columns,
    /// Each row carries one value in `value`, identified by the text in
    /// `label`. The first sub-metric whose `source` matches wins.
    NameValue {
        label: &'static str,
        value: &'static str,
        matching: LabelMatch,
    },
}

/// Static description of one diagnostic query.
pub struct MetricGroup {
    pub name: &'static str,
    pub scope: EntityKind,
    pub sql: fn(&CollectorConfig) -> String,
    pub metrics: &'static [SubMetric],
    pub decoder: Decoder,
    /// Prepended to every exported metric name.
    pub prefix: &'static str,
    pub enabled: fn(&CollectorConfig) -> bool,
}

impl MetricGroup {
    #[must_use]
    pub fn query(&self, config: &CollectorConfig) -> String {
        (self.sql)(config)
    }

    /// Not skipped by name and switched on by the configuration.
    #[must_use]
    pub fn is_enabled(&self, config: &CollectorConfig) -> bool {
        !config.is_skipped(self.name) && (self.enabled)(config)
    }

    #[must_use]
    pub fn metric_name(&self, metric: &SubMetric) -> String {
        format!("{}{}", self.prefix, metric.name)
    }
}

impl fmt::Debug for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricGroup")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("metrics", &self.metrics.len())
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

/// Entity a record is written to. Instance ids are raw and resolved to
/// names by the aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Instance(String),
    Tablespace(String),
}

impl EntityRef {
    #[must_use]
    pub fn new(kind: EntityKind, id: String) -> Self {
        match kind {
            EntityKind::Instance => Self::Instance(id),
            EntityKind::Tablespace => Self::Tablespace(id),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Instance(_) => EntityKind::Instance,
            Self::Tablespace(_) => EntityKind::Tablespace,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Instance(id) | Self::Tablespace(id) => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub name: String,
    pub value: Value,
    pub kind: MetricKind,
    pub target: EntityRef,
}

/// All rows of one custom query, in result order. Typing is left to the
/// aggregator.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomRecordBatch {
    pub instance_id: String,
    pub sample: String,
    pub rows: Rows,
    /// Keyed by lower-cased column name.
    pub overrides: HashMap<String, MetricKind>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InventoryItem {
    pub instance_id: String,
    pub name: String,
    pub value: Value,
    pub description: String,
}

/// Everything producers can put on the queue.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Record(TelemetryRecord),
    Custom(CustomRecordBatch),
    Inventory(InventoryItem),
}

register_metric_groups! {
    long_running_queries => catalog::instance::LONG_RUNNING_QUERIES,
    sgauga_total_memory => catalog::instance::SGA_UGA_TOTAL_MEMORY,
    sga_shared_pool_library_cache_sharable_statement => catalog::instance::SGA_SHARED_POOL_LIBRARY_CACHE_SHARABLE_STATEMENT,
    sga_shared_pool_library_cache_shareable_user => catalog::instance::SGA_SHARED_POOL_LIBRARY_CACHE_SHAREABLE_USER,
    sga_shared_pool_library_cache_reload_ratio => catalog::instance::SGA_SHARED_POOL_LIBRARY_CACHE_RELOAD_RATIO,
    sga_shared_pool_library_cache_hit_ratio => catalog::instance::SGA_SHARED_POOL_LIBRARY_CACHE_HIT_RATIO,
    sga_shared_pool_dict_cache_ratio => catalog::instance::SGA_SHARED_POOL_DICT_CACHE_RATIO,
    sga_log_buffer_space_waits => catalog::instance::SGA_LOG_BUFFER_SPACE_WAITS,
    sga_log_alloc_retries => catalog::instance::SGA_LOG_ALLOC_RETRIES,
    sga_hit_ratio => catalog::instance::SGA_HIT_RATIO,
    sysstat => catalog::instance::SYSSTAT,
    sga => catalog::instance::SGA,
    rollback_segments => catalog::instance::ROLLBACK_SEGMENTS,
    redo_log_waits => catalog::instance::REDO_LOG_WAITS,
    locked_accounts => catalog::instance::LOCKED_ACCOUNTS,
    read_write_metrics => catalog::instance::READ_WRITE_METRICS,
    pga_metrics => catalog::instance::PGA_METRICS,
    sys_metrics => catalog::sysmetrics::SYS_METRICS,
    pdb_sys_metrics => catalog::sysmetrics::PDB_SYS_METRICS,
    global_name_instance => catalog::instance::GLOBAL_NAME_INSTANCE,
    db_id_instance => catalog::instance::DB_ID_INSTANCE,
    tablespace_metrics => catalog::tablespace::TABLESPACE_METRICS,
    global_name_tablespace => catalog::tablespace::GLOBAL_NAME_TABLESPACE,
    db_id_tablespace => catalog::tablespace::DB_ID_TABLESPACE,
    cdb_datafiles_offline => catalog::tablespace::CDB_DATAFILES_OFFLINE,
    pdb_datafiles_offline => catalog::tablespace::PDB_DATAFILES_OFFLINE,
    pdb_non_write => catalog::tablespace::PDB_NON_WRITE,
}
