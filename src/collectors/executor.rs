//! Runs one catalog group and turns its rows into records.
//!
//! Decode policy, shared by every group:
//! - a column the decoder needs to identify the entity or the label/value
//!   pair is missing from the result shape: the whole group is rejected
//!   with a [`DecodeError`] and nothing is emitted;
//! - a sub-metric's column is absent (`Columns`): that sub-metric is left
//!   out;
//! - a single value is NULL, or is not numeric for a numeric kind: only that
//!   value is skipped and the row carries on;
//! - a row without an entity id is skipped.

use crate::collectors::config::CollectorConfig;
use crate::collectors::util::{instance_id_string, text};
use crate::collectors::{Decoder, EntityKind, EntityRef, Message, MetricGroup, SubMetric, TelemetryRecord};
use crate::database::{Database, Rows, Value, normalize_query};
use crate::integration::MetricKind;
use anyhow::{Result, anyhow};
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("group {group}: result set has no column {column}")]
    MissingColumn { group: String, column: String },
}

/// Execute `group` and push its records onto `tx`. Returns the number of
/// records emitted.
///
/// # Errors
///
/// Returns an error if the query fails, the result shape cannot be decoded
/// or the queue was closed. No record is emitted in the first two cases.
#[instrument(skip(db, group, config, tx), level = "info", fields(group = group.name, otel.kind = "internal"))]
pub async fn collect(
    db: &dyn Database,
    group: &MetricGroup,
    config: &CollectorConfig,
    tx: &Sender<Message>,
) -> Result<usize> {
    let sql = group.query(config);

    let rows = match db.query(&sql).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(group = group.name, query = %normalize_query(&sql), error = %e, "failed to execute query");
            return Err(e.into());
        }
    };

    if rows.is_empty() {
        warn!(group = group.name, query = %normalize_query(&sql), "query did not return any results");
        return Ok(0);
    }

    let records = decode(group, &rows, config.extended_metrics).inspect_err(|e| {
        error!(group = group.name, query = %normalize_query(&sql), error = %e, "failed to decode result set");
    })?;

    let count = records.len();
    for record in records {
        send(tx, Message::Record(record)).await?;
    }

    debug!(group = group.name, rows = rows.len(), records = count, "group collected");
    Ok(count)
}

pub(crate) async fn send(tx: &Sender<Message>, message: Message) -> Result<()> {
    tx.send(message)
        .await
        .map_err(|_| anyhow!("output queue closed"))
}

/// Decode a full result set. Records keep row order.
///
/// # Errors
///
/// Returns an error if a column the decoder depends on is missing.
pub fn decode(group: &MetricGroup, rows: &Rows, extended: bool) -> Result<Vec<TelemetryRecord>, DecodeError> {
    let entity_idx = require(group, rows, group.scope.entity_column())?;

    match group.decoder {
        Decoder::Columns => Ok(decode_columns(group, rows, entity_idx, extended)),
        Decoder::NameValue {
            label,
            value,
            matching,
        } => {
            let label_idx = require(group, rows, label)?;
            let value_idx = require(group, rows, value)?;

            let mut records = Vec::new();
            for row in rows.iter() {
                let Some(target) = entity(group.scope, row.get(entity_idx)) else {
                    debug!(group = group.name, "skipping row without entity id");
                    continue;
                };
                let Some(label) = row.get(label_idx).and_then(text) else {
                    continue;
                };

                let Some(metric) = group
                    .metrics
                    .iter()
                    .filter(|m| m.selected(extended))
                    .find(|m| matching.matches(&label, m.source))
                else {
                    continue;
                };

                if let Some(value) = accept(group, metric, row.get(value_idx)) {
                    records.push(TelemetryRecord {
                        name: group.metric_name(metric),
                        value,
                        kind: metric.kind,
                        target,
                    });
                }
            }
            Ok(records)
        }
    }
}

fn decode_columns(group: &MetricGroup, rows: &Rows, entity_idx: usize, extended: bool) -> Vec<TelemetryRecord> {
    let columns: Vec<(&SubMetric, usize)> = group
        .metrics
        .iter()
        .filter(|m| m.selected(extended))
        .filter_map(|m| match rows.column_index(m.source) {
            Some(idx) => Some((m, idx)),
            None => {
                debug!(group = group.name, column = m.source, "column not in result set");
                None
            }
        })
        .collect();

    let mut records = Vec::new();
    for row in rows.iter() {
        let Some(target) = entity(group.scope, row.get(entity_idx)) else {
            debug!(group = group.name, "skipping row without entity id");
            continue;
        };

        for (metric, idx) in &columns {
            if let Some(value) = accept(group, metric, row.get(*idx)) {
                records.push(TelemetryRecord {
                    name: group.metric_name(metric),
                    value,
                    kind: metric.kind,
                    target: target.clone(),
                });
            }
        }
    }
    records
}

fn require(group: &MetricGroup, rows: &Rows, column: &str) -> Result<usize, DecodeError> {
    rows.column_index(column)
        .ok_or_else(|| DecodeError::MissingColumn {
            group: group.name.to_string(),
            column: column.to_string(),
        })
}

fn entity(kind: EntityKind, value: Option<&Value>) -> Option<EntityRef> {
    let value = value?;
    let id = match kind {
        EntityKind::Instance => instance_id_string(value),
        EntityKind::Tablespace => text(value),
    }?;
    Some(EntityRef::new(kind, id))
}

fn accept(group: &MetricGroup, metric: &SubMetric, value: Option<&Value>) -> Option<Value> {
    let value = value?.clone().sanitize();

    if value.is_null() {
        debug!(group = group.name, metric = metric.name, "skipping null value");
        return None;
    }

    if metric.kind != MetricKind::Attribute && value.as_f64().is_none() {
        warn!(group = group.name, metric = metric.name, value = %value, "skipping non-numeric value");
        return None;
    }

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::catalog::instance::{PGA_METRICS, READ_WRITE_METRICS, REDO_LOG_WAITS};
    use crate::collectors::catalog::tablespace::TABLESPACE_METRICS;
    use crate::database::mock::{MockDatabase, MockResponse};
    use tokio::sync::mpsc;

    fn rows(columns: &[&str], data: Vec<Vec<Value>>) -> Rows {
        Rows::new(columns.iter().map(|c| (*c).to_string()).collect(), data)
    }

    #[test]
    fn test_columns_decoder() {
        let result = rows(
            &["INST_ID", "PhysicalReads", "PhysicalWrites"],
            vec![vec![Value::Number("1".into()), Value::Int(12), Value::Int(23)]],
        );

        let records = decode(&READ_WRITE_METRICS, &result, false).unwrap_or_default();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.target == EntityRef::Instance("1".into())));
        assert!(records.iter().all(|r| r.kind == MetricKind::Rate));
        assert_eq!(records.first().map(|r| r.name.as_str()), Some("disk.reads"));
    }

    #[test]
    fn test_extended_filter() {
        let result = rows(
            &["TABLESPACE_NAME", "USED", "SIZE", "USED_PERCENT", "OFFLINE"],
            vec![vec![
                Value::from("TS1"),
                Value::Int(11),
                Value::Int(123),
                Value::Int(12),
                Value::Int(0),
            ]],
        );

        let basic = decode(&TABLESPACE_METRICS, &result, false).unwrap_or_default();
        let names: Vec<_> = basic.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["tablespace.spaceUsedPercentage", "tablespace.isOffline"]);

        let extended = decode(&TABLESPACE_METRICS, &result, true).unwrap_or_default();
        assert_eq!(extended.len(), 4);
    }

    #[test]
    fn test_missing_entity_column_rejects_group() {
        let result = rows(&["USED_PERCENT"], vec![vec![Value::Int(12)]]);
        assert!(matches!(
            decode(&TABLESPACE_METRICS, &result, false),
            Err(DecodeError::MissingColumn { ref column, .. }) if column == "TABLESPACE_NAME"
        ));
    }

    #[test]
    fn test_bad_value_skips_only_that_value() {
        let result = rows(
            &["TABLESPACE_NAME", "USED_PERCENT", "OFFLINE"],
            vec![
                vec![Value::from("TS1"), Value::Null, Value::Int(0)],
                vec![Value::from("TS2"), Value::from("n/a"), Value::Int(1)],
            ],
        );

        let records = decode(&TABLESPACE_METRICS, &result, false).unwrap_or_default();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.name == "tablespace.isOffline"));
    }

    #[test]
    fn test_name_value_first_match_wins() {
        let result = rows(
            &["TOTAL_WAITS", "INST_ID", "EVENT"],
            vec![
                vec![Value::Int(5), Value::Int(1), Value::from("log file switch (checkpoint incomplete)")],
                vec![Value::Int(7), Value::Int(1), Value::from("db file sequential read")],
                vec![Value::Int(9), Value::Int(1), Value::from("buffer busy waits")],
            ],
        );

        let records = decode(&REDO_LOG_WAITS, &result, false).unwrap_or_default();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["redoLog.logFileSwitchCheckpointIncomplete", "sga.bufferBusyWaits"]
        );
    }

    #[test]
    fn test_name_value_respects_extended() {
        let result = rows(
            &["INST_ID", "NAME", "VALUE"],
            vec![
                vec![Value::Int(1), Value::from("total PGA inuse"), Value::Int(135)],
                vec![Value::Int(1), Value::from("global memory bound"), Value::Int(1000)],
            ],
        );

        assert_eq!(decode(&PGA_METRICS, &result, false).map(|r| r.len()), Ok(1));
        assert_eq!(decode(&PGA_METRICS, &result, true).map(|r| r.len()), Ok(2));
    }

    #[tokio::test]
    async fn test_zero_rows_emit_nothing() -> Result<()> {
        let db = MockDatabase::new().on("DBA_TABLESPACE_USAGE_METRICS", MockResponse::empty(&["TABLESPACE_NAME"]))?;
        let (tx, mut rx) = mpsc::channel(8);

        let count = collect(&db, &TABLESPACE_METRICS, &CollectorConfig::new(), &tx).await?;
        drop(tx);

        assert_eq!(count, 0);
        assert!(rx.recv().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_query_failure_emits_nothing() -> Result<()> {
        let db = MockDatabase::new().on("gv\\$pgastat", MockResponse::error("ORA-00942: table or view does not exist"))?;
        let (tx, mut rx) = mpsc::channel(8);

        let result = collect(&db, &PGA_METRICS, &CollectorConfig::new(), &tx).await;
        drop(tx);

        assert!(result.is_err());
        assert!(rx.recv().await.is_none());
        Ok(())
    }
}
