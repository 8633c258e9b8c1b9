//! Output payload: entities, their metric sets and inventory, serialised as
//! one JSON document per run.

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

pub mod metric;

pub use self::metric::{MetricError, MetricKind, MetricSet};

pub const PROTOCOL_VERSION: &str = "3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdAttribute {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl IdAttribute {
    #[must_use]
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id_attributes: Vec<IdAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub entity: EntityMetadata,
    pub metrics: Vec<MetricSet>,
    pub inventory: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    pub events: Vec<serde_json::Value>,
}

impl Entity {
    pub fn set_inventory_item(&mut self, key: &str, field: &str, value: serde_json::Value) {
        self.inventory
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }
}

/// Stable handle to one metric set inside an [`Integration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleId {
    entity: usize,
    set: usize,
}

#[derive(Debug, Serialize)]
pub struct Integration {
    name: String,
    protocol_version: &'static str,
    integration_version: String,
    data: Vec<Entity>,
    #[serde(skip)]
    index: HashMap<(String, String), usize>,
}

impl Integration {
    #[must_use]
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            protocol_version: PROTOCOL_VERSION,
            integration_version: version.to_string(),
            data: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Position of the entity `(name, entity_type)`, created on first use.
    /// The id attributes of an existing entity are left untouched.
    pub fn entity(&mut self, name: &str, entity_type: &str, id_attributes: Vec<IdAttribute>) -> usize {
        let key = (name.to_string(), entity_type.to_string());
        if let Some(idx) = self.index.get(&key) {
            return *idx;
        }

        self.data.push(Entity {
            entity: EntityMetadata {
                name: name.to_string(),
                entity_type: entity_type.to_string(),
                id_attributes,
            },
            metrics: Vec::new(),
            inventory: BTreeMap::new(),
            events: Vec::new(),
        });

        let idx = self.data.len() - 1;
        self.index.insert(key, idx);
        idx
    }

    pub fn entity_mut(&mut self, idx: usize) -> Option<&mut Entity> {
        self.data.get_mut(idx)
    }

    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.data
    }

    #[must_use]
    pub fn find_entity(&self, name: &str, entity_type: &str) -> Option<&Entity> {
        self.index
            .get(&(name.to_string(), entity_type.to_string()))
            .and_then(|idx| self.data.get(*idx))
    }

    /// Append a new metric set to an entity.
    pub fn new_metric_set(&mut self, entity: usize, sample: &str, attributes: &[(&str, String)]) -> Option<BundleId> {
        let target = self.data.get_mut(entity)?;
        target.metrics.push(MetricSet::new(sample, attributes));
        Some(BundleId {
            entity,
            set: target.metrics.len() - 1,
        })
    }

    #[must_use]
    pub fn metric_set(&self, id: BundleId) -> Option<&MetricSet> {
        self.data
            .get(id.entity)
            .and_then(|e| e.metrics.get(id.set))
    }

    pub fn metric_set_mut(&mut self, id: BundleId) -> Option<&mut MetricSet> {
        self.data
            .get_mut(id.entity)
            .and_then(|e| e.metrics.get_mut(id.set))
    }

    #[must_use]
    pub fn metric_set_count(&self) -> usize {
        self.data.iter().map(|e| e.metrics.len()).sum()
    }

    /// Serialise the payload followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails.
    pub fn publish<W: Write>(&self, mut out: W, pretty: bool) -> Result<()> {
        if pretty {
            serde_json::to_writer_pretty(&mut out, self)?;
        } else {
            serde_json::to_writer(&mut out, self)?;
        }
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Value;

    fn ids() -> Vec<IdAttribute> {
        vec![
            IdAttribute::new("endpoint", "testhost:1234"),
            IdAttribute::new("serviceName", "testServiceName"),
        ]
    }

    #[test]
    fn test_entity_is_created_once() {
        let mut i = Integration::new("oracletest", "0.0.1");
        let a = i.entity("MyInstance", "ora-instance", ids());
        let b = i.entity("MyInstance", "ora-instance", Vec::new());
        let c = i.entity("MyInstance", "ora-tablespace", ids());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(i.entities().len(), 2);
        assert_eq!(
            i.find_entity("MyInstance", "ora-instance")
                .map(|e| e.entity.id_attributes.len()),
            Some(2)
        );
    }

    #[test]
    fn test_metric_set_handles() {
        let mut i = Integration::new("oracletest", "0.0.1");
        let e = i.entity("TS1", "ora-tablespace", ids());
        let first = i.new_metric_set(e, "OracleTablespaceSample", &[]);
        let second = i.new_metric_set(e, "OracleCustomSample", &[]);

        assert!(first.is_some());
        assert_ne!(first, second);
        assert_eq!(i.metric_set_count(), 2);
        assert!(i.new_metric_set(42, "OracleTablespaceSample", &[]).is_none());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_publish_payload_shape() {
        let mut i = Integration::new("oracletest", "0.0.1");
        let e = i.entity("MyInstance", "ora-instance", ids());
        let id = i
            .new_metric_set(
                e,
                "OracleDatabaseSample",
                &[
                    ("displayName", "MyInstance".to_string()),
                    ("entityName", "ora-instance:MyInstance".to_string()),
                    ("reportingEndpoint", "testhost:1234".to_string()),
                ],
            )
            .unwrap();
        i.metric_set_mut(id)
            .unwrap()
            .set_metric("testmetric", &Value::from("testattr"), MetricKind::Attribute)
            .unwrap();

        let mut out = Vec::new();
        i.publish(&mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();

        let expected = r#"{"name":"oracletest","protocol_version":"3","integration_version":"0.0.1","data":[{"entity":{"name":"MyInstance","type":"ora-instance","id_attributes":[{"Key":"endpoint","Value":"testhost:1234"},{"Key":"serviceName","Value":"testServiceName"}]},"metrics":[{"displayName":"MyInstance","entityName":"ora-instance:MyInstance","event_type":"OracleDatabaseSample","reportingEndpoint":"testhost:1234","testmetric":"testattr"}],"inventory":{},"events":[]}]}"#;
        assert_eq!(text, format!("{expected}\n"));
    }

    #[test]
    fn test_inventory_items() {
        let mut i = Integration::new("oracletest", "0.0.1");
        let e = i.entity("MyInstance", "ora-instance", ids());
        if let Some(entity) = i.entity_mut(e) {
            entity.set_inventory_item("version", "value", serde_json::json!("19.0.0.0.0"));
            entity.set_inventory_item("version", "description", serde_json::json!("OracleDB version"));
        }

        let entity = i.find_entity("MyInstance", "ora-instance");
        let item = entity.and_then(|e| e.inventory.get("version"));
        assert_eq!(item.map(BTreeMap::len), Some(2));
    }
}
