//! Single consumer of the collection queue. Owns the output payload and the
//! bundle cache for the whole pass, so neither needs locking.

use crate::collectors::config::Endpoint;
use crate::collectors::instances::InstanceLookup;
use crate::collectors::util::text;
use crate::collectors::{CustomRecordBatch, EntityKind, EntityRef, InventoryItem, Message, TelemetryRecord};
use crate::database::Value;
use crate::integration::{BundleId, IdAttribute, Integration, MetricKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, instrument, warn};

const METRIC_NAME: &str = "metric_name";
const METRIC_TYPE: &str = "metric_type";
const METRIC_VALUE: &str = "metric_value";

/// One metric set per (entity identity, entity kind).
#[derive(Debug, Default)]
pub struct BundleCache {
    sets: HashMap<(String, EntityKind), BundleId>,
}

impl BundleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing set for `identity`, or a new one tagged with display
    /// metadata.
    pub fn get_or_create(
        &mut self,
        integration: &mut Integration,
        endpoint: &Endpoint,
        identity: &str,
        kind: EntityKind,
    ) -> Option<BundleId> {
        let key = (identity.to_string(), kind);
        if let Some(id) = self.sets.get(&key) {
            return Some(*id);
        }

        let id = new_bundle(integration, endpoint, identity, kind, kind.sample())?;
        self.sets.insert(key, id);
        Some(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

fn new_bundle(
    integration: &mut Integration,
    endpoint: &Endpoint,
    identity: &str,
    kind: EntityKind,
    sample: &str,
) -> Option<BundleId> {
    let entity = integration.entity(
        identity,
        kind.entity_type(),
        vec![
            IdAttribute::new("endpoint", &endpoint.to_string()),
            IdAttribute::new("serviceName", &endpoint.service_name),
        ],
    );

    integration.new_metric_set(
        entity,
        sample,
        &[
            ("displayName", identity.to_string()),
            ("entityName", format!("{}:{identity}", kind.entity_type())),
            ("reportingEndpoint", endpoint.to_string()),
        ],
    )
}

pub struct Aggregator {
    integration: Integration,
    cache: BundleCache,
    lookup: Arc<InstanceLookup>,
    endpoint: Endpoint,
}

impl Aggregator {
    #[must_use]
    pub fn new(integration: Integration, lookup: Arc<InstanceLookup>, endpoint: Endpoint) -> Self {
        Self {
            integration,
            cache: BundleCache::new(),
            lookup,
            endpoint,
        }
    }

    /// Drain `rx` until every sender is gone.
    #[instrument(skip(self, rx), level = "info", fields(otel.kind = "internal"))]
    pub async fn run(mut self, mut rx: Receiver<Message>) -> Integration {
        let mut messages = 0usize;
        while let Some(message) = rx.recv().await {
            self.apply(message);
            messages += 1;
        }

        debug!(messages, bundles = self.integration.metric_set_count(), "queue drained");
        self.integration
    }

    pub fn apply(&mut self, message: Message) {
        match message {
            Message::Record(record) => self.record(record),
            Message::Custom(batch) => self.custom(batch),
            Message::Inventory(item) => self.inventory(item),
        }
    }

    #[must_use]
    pub fn into_integration(self) -> Integration {
        self.integration
    }

    fn identity(&self, target: &EntityRef) -> String {
        match target {
            EntityRef::Instance(id) => self.lookup.resolve(id).to_string(),
            EntityRef::Tablespace(name) => name.clone(),
        }
    }

    fn record(&mut self, record: TelemetryRecord) {
        let kind = record.target.kind();
        let identity = self.identity(&record.target);

        let Some(id) = self
            .cache
            .get_or_create(&mut self.integration, &self.endpoint, &identity, kind)
        else {
            error!(entity = %identity, kind = %kind, "failed to create metric set");
            return;
        };

        if let Some(set) = self.integration.metric_set_mut(id)
            && let Err(e) = set.set_metric(&record.name, &record.value, record.kind)
        {
            error!(metric = %record.name, entity = %identity, error = %e, "failed to set metric");
        }
    }

    fn custom(&mut self, batch: CustomRecordBatch) {
        let identity = self.lookup.resolve(&batch.instance_id).to_string();

        for row in batch.rows.iter() {
            let Some(id) = new_bundle(
                &mut self.integration,
                &self.endpoint,
                &identity,
                EntityKind::Instance,
                &batch.sample,
            ) else {
                error!(entity = %identity, sample = %batch.sample, "failed to create custom metric set");
                return;
            };

            for (name, value, kind) in custom_metrics(batch.rows.columns(), row, &batch.overrides) {
                if let Some(set) = self.integration.metric_set_mut(id)
                    && let Err(e) = set.set_metric(&name, &value, kind)
                {
                    error!(metric = %name, sample = %batch.sample, error = %e, "failed to set custom metric");
                }
            }
        }
    }

    fn inventory(&mut self, item: InventoryItem) {
        let identity = self.lookup.resolve(&item.instance_id).to_string();
        let entity = self.integration.entity(
            &identity,
            EntityKind::Instance.entity_type(),
            vec![
                IdAttribute::new("endpoint", &self.endpoint.to_string()),
                IdAttribute::new("serviceName", &self.endpoint.service_name),
            ],
        );

        if let Some(entity) = self.integration.entity_mut(entity) {
            entity.set_inventory_item(&item.name, "value", inventory_value(&item.value));
            entity.set_inventory_item(&item.name, "description", serde_json::Value::String(item.description));
        }
    }
}

fn inventory_value(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Typed metrics for one custom row, in column order.
///
/// A row with `METRIC_NAME`, `METRIC_TYPE` and `METRIC_VALUE` columns is a
/// single metric and its other columns are attributes. Any other row maps
/// each column to a metric typed by override or by its value. Column names
/// are compared ignoring ASCII case; of two names that differ only by case the
/// first one is kept.
fn custom_metrics(
    columns: &[String],
    row: &[Value],
    overrides: &HashMap<String, MetricKind>,
) -> Vec<(String, Value, MetricKind)> {
    let mut named: Vec<(String, String, Value)> = Vec::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(row) {
        let lower = column.to_ascii_lowercase();
        if named.iter().any(|(seen, _, _)| *seen == lower) {
            warn!(column = %column, "duplicate custom column name, keeping the first one");
            continue;
        }
        named.push((lower, column.clone(), value.clone().sanitize()));
    }

    let take = |named: &mut Vec<(String, String, Value)>, key: &str| {
        named
            .iter()
            .position(|(lower, _, _)| lower == key)
            .map(|idx| named.remove(idx).2)
    };

    let mut metrics = Vec::new();

    if [METRIC_NAME, METRIC_TYPE, METRIC_VALUE]
        .iter()
        .all(|c| named.iter().any(|(lower, _, _)| lower == c))
    {
        let name = take(&mut named, METRIC_NAME).and_then(|v| text(&v));
        let kind = take(&mut named, METRIC_TYPE).and_then(|v| text(&v));
        let value = take(&mut named, METRIC_VALUE);

        match (name, kind.as_deref().map(str::parse::<MetricKind>), value) {
            (Some(name), Some(Ok(kind)), Some(value)) => metrics.push((name, value, kind)),
            (name, Some(Err(e)), _) => {
                warn!(metric = ?name, error = %e, "skipping custom metric with unknown type");
            }
            (name, _, _) => warn!(metric = ?name, "skipping incomplete custom metric"),
        }

        for (_, column, value) in named {
            if !value.is_null() {
                metrics.push((column, value, MetricKind::Attribute));
            }
        }
        return metrics;
    }

    for (lower, column, value) in named {
        if value.is_null() {
            continue;
        }
        let kind = overrides.get(&lower).copied().unwrap_or_else(|| infer_kind(&value));
        metrics.push((column, value, kind));
    }
    metrics
}

/// Numeric values are gauges, everything else an attribute.
#[must_use]
pub const fn infer_kind(value: &Value) -> MetricKind {
    if value.is_numeric() {
        MetricKind::Gauge
    } else {
        MetricKind::Attribute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Rows;

    fn endpoint() -> Endpoint {
        Endpoint {
            hostname: "db.example".into(),
            port: 1521,
            service_name: "ORCL".into(),
        }
    }

    fn aggregator(lookup: InstanceLookup) -> Aggregator {
        Aggregator::new(Integration::new("test", "0.0.0"), Arc::new(lookup), endpoint())
    }

    fn record(name: &str, value: Value, target: EntityRef) -> Message {
        Message::Record(TelemetryRecord {
            name: name.into(),
            value,
            kind: MetricKind::Gauge,
            target,
        })
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut integration = Integration::new("test", "0.0.0");
        let mut cache = BundleCache::new();

        let a = cache.get_or_create(&mut integration, &endpoint(), "TS1", EntityKind::Tablespace);
        let b = cache.get_or_create(&mut integration, &endpoint(), "TS1", EntityKind::Tablespace);
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(integration.metric_set_count(), 1);

        let set = a.and_then(|id| integration.metric_set(id));
        assert_eq!(set.map(|s| s.sample()), Some("OracleTablespaceSample"));
        assert_eq!(
            set.and_then(|s| s.get("entityName")),
            Some(&serde_json::json!("ora-tablespace:TS1"))
        );
        assert_eq!(
            set.and_then(|s| s.get("reportingEndpoint")),
            Some(&serde_json::json!("db.example:1521"))
        );
    }

    #[test]
    fn test_same_identity_different_kind() {
        let mut integration = Integration::new("test", "0.0.0");
        let mut cache = BundleCache::new();

        let a = cache.get_or_create(&mut integration, &endpoint(), "X", EntityKind::Tablespace);
        let b = cache.get_or_create(&mut integration, &endpoint(), "X", EntityKind::Instance);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_instance_record_resolves_name() {
        let mut agg = aggregator([("1", "MyInstance")].into_iter().collect());
        agg.apply(record("sga.hitRatio", Value::Float(0.98), EntityRef::Instance("1".into())));
        agg.apply(record("sga.fixedSizeInBytes", Value::Int(10), EntityRef::Instance("2".into())));

        let integration = agg.into_integration();
        assert!(integration.find_entity("MyInstance", "ora-instance").is_some());
        assert!(integration.find_entity("2", "ora-instance").is_some());
        assert!(integration.find_entity("1", "ora-instance").is_none());
    }

    #[test]
    fn test_rejected_write_keeps_going() {
        let mut agg = aggregator(InstanceLookup::default());
        agg.apply(record("tablespace.isOffline", Value::from("yes"), EntityRef::Tablespace("TS1".into())));
        agg.apply(record("tablespace.spaceUsedPercentage", Value::Int(12), EntityRef::Tablespace("TS1".into())));

        let integration = agg.into_integration();
        let set = integration
            .find_entity("TS1", "ora-tablespace")
            .and_then(|e| e.metrics.first());
        assert_eq!(set.and_then(|s| s.get("tablespace.isOffline")), None);
        assert_eq!(
            set.and_then(|s| s.get("tablespace.spaceUsedPercentage")),
            Some(&serde_json::json!(12))
        );
    }

    fn row(cells: &[(&str, Value)]) -> (Vec<String>, Vec<Value>) {
        cells
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .unzip()
    }

    #[test]
    fn test_custom_kind_inference_and_override() {
        let (columns, values) = row(&[
            ("SESSIONS", Value::Number("8".into())),
            ("USERNAME", Value::from("APP")),
            ("WAITS", Value::Int(3)),
            ("EMPTY", Value::Null),
        ]);
        let overrides = [("waits".to_string(), MetricKind::Rate)].into_iter().collect();

        assert_eq!(
            custom_metrics(&columns, &values, &overrides),
            vec![
                ("SESSIONS".to_string(), Value::Int(8), MetricKind::Gauge),
                ("USERNAME".to_string(), Value::from("APP"), MetricKind::Attribute),
                ("WAITS".to_string(), Value::Int(3), MetricKind::Rate),
            ]
        );
    }

    #[test]
    fn test_custom_metric_name_type_value_row() {
        let (columns, values) = row(&[
            ("METRIC_NAME", Value::from("app.sessions")),
            ("METRIC_TYPE", Value::from("gauge")),
            ("METRIC_VALUE", Value::Number("42".into())),
            ("OWNER", Value::from("APP")),
        ]);

        assert_eq!(
            custom_metrics(&columns, &values, &HashMap::new()),
            vec![
                ("app.sessions".to_string(), Value::Int(42), MetricKind::Gauge),
                ("OWNER".to_string(), Value::from("APP"), MetricKind::Attribute),
            ]
        );
    }

    #[test]
    fn test_custom_columns_differing_by_case_keep_first() {
        let (columns, values) = row(&[
            ("Waits", Value::Int(1)),
            ("WAITS", Value::Int(2)),
            ("waits", Value::Int(3)),
            ("OWNER", Value::from("APP")),
        ]);

        assert_eq!(
            custom_metrics(&columns, &values, &HashMap::new()),
            vec![
                ("Waits".to_string(), Value::Int(1), MetricKind::Gauge),
                ("OWNER".to_string(), Value::from("APP"), MetricKind::Attribute),
            ]
        );
    }

    #[test]
    fn test_custom_batch_one_set_per_row() {
        let mut agg = aggregator([("1", "ORCL1")].into_iter().collect());
        let rows = Rows::new(vec!["N".into()], (0..3).map(|i| vec![Value::Int(i)]).collect());

        agg.apply(Message::Custom(CustomRecordBatch {
            instance_id: "1".into(),
            sample: "MySample".into(),
            rows,
            overrides: HashMap::new(),
        }));

        let integration = agg.into_integration();
        let entity = integration.find_entity("ORCL1", "ora-instance");
        assert_eq!(entity.map(|e| e.metrics.len()), Some(3));
        assert!(entity.is_some_and(|e| e.metrics.iter().all(|s| s.sample() == "MySample")));
    }

    #[test]
    fn test_inventory_item() {
        let mut agg = aggregator([("1", "ORCL1")].into_iter().collect());
        agg.apply(Message::Inventory(InventoryItem {
            instance_id: "1".into(),
            name: "processes".into(),
            value: Value::Int(300),
            description: "user processes".into(),
        }));

        let integration = agg.into_integration();
        let item = integration
            .find_entity("ORCL1", "ora-instance")
            .and_then(|e| e.inventory.get("processes"));
        assert_eq!(item.and_then(|i| i.get("value")), Some(&serde_json::json!(300)));
        assert_eq!(
            item.and_then(|i| i.get("description")),
            Some(&serde_json::json!("user processes"))
        );
    }

    #[tokio::test]
    async fn test_run_drains_until_closed() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let agg = aggregator(InstanceLookup::default());
        let handle = tokio::spawn(agg.run(rx));

        for i in 0..10 {
            let _ = tx
                .send(record("m", Value::Int(i), EntityRef::Tablespace(format!("TS{i}"))))
                .await;
        }
        drop(tx);

        let integration = handle.await.ok();
        assert_eq!(integration.map(|i| i.metric_set_count()), Some(10));
    }
}
