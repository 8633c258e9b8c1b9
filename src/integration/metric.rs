use crate::database::Value;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a metric value is interpreted by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Rate,
    Delta,
    Attribute,
}

impl MetricKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Rate => "rate",
            Self::Delta => "delta",
            Self::Attribute => "attribute",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Attribute)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gauge" => Ok(Self::Gauge),
            "rate" => Ok(Self::Rate),
            "delta" => Ok(Self::Delta),
            "attribute" => Ok(Self::Attribute),
            other => Err(MetricError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("unknown metric type '{0}'")]
    UnknownKind(String),

    #[error("metric '{name}' has a null value")]
    Null { name: String },

    #[error("metric '{name}' of type {kind} requires a numeric value, got '{value}'")]
    NotNumeric {
        name: String,
        kind: MetricKind,
        value: String,
    },
}

/// One sample (event) of key/value telemetry for an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSet {
    sample: String,
    values: BTreeMap<String, serde_json::Value>,
    kinds: BTreeMap<String, MetricKind>,
}

impl MetricSet {
    #[must_use]
    pub fn new(sample: &str, attributes: &[(&str, String)]) -> Self {
        let mut set = Self {
            sample: sample.to_string(),
            values: BTreeMap::new(),
            kinds: BTreeMap::new(),
        };
        for (name, value) in attributes {
            set.values
                .insert((*name).to_string(), serde_json::Value::String(value.clone()));
            set.kinds.insert((*name).to_string(), MetricKind::Attribute);
        }
        set
    }

    #[must_use]
    pub fn sample(&self) -> &str {
        &self.sample
    }

    /// Write a metric, replacing any earlier value with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error for null values and for non-numeric values of a
    /// numeric kind.
    pub fn set_metric(&mut self, name: &str, value: &Value, kind: MetricKind) -> Result<(), MetricError> {
        let encoded = encode(name, value, kind)?;
        self.values.insert(name.to_string(), encoded);
        self.kinds.insert(name.to_string(), kind);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    #[must_use]
    pub fn kind(&self, name: &str) -> Option<MetricKind> {
        self.kinds.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn encode(name: &str, value: &Value, kind: MetricKind) -> Result<serde_json::Value, MetricError> {
    let value = value.clone().sanitize();

    if value.is_null() {
        return Err(MetricError::Null {
            name: name.to_string(),
        });
    }

    if !kind.is_numeric() {
        return Ok(serde_json::Value::String(value.to_string()));
    }

    let not_numeric = || MetricError::NotNumeric {
        name: name.to_string(),
        kind,
        value: value.to_string(),
    };

    match &value {
        Value::Int(i) => Ok(serde_json::Value::from(*i)),
        Value::Str(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                Ok(serde_json::Value::from(i))
            } else {
                let f = s.trim().parse::<f64>().map_err(|_| not_numeric())?;
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .ok_or_else(not_numeric)
            }
        }
        other => other
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .ok_or_else(not_numeric),
    }
}

impl Serialize for MetricSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: BTreeMap<&str, &serde_json::Value> =
            self.values.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let event_type = serde_json::Value::String(self.sample.clone());
        entries.insert("event_type", &event_type);

        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, v) in entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("GAUGE".parse::<MetricKind>(), Ok(MetricKind::Gauge));
        assert_eq!(" rate ".parse::<MetricKind>(), Ok(MetricKind::Rate));
        assert_eq!("delta".parse::<MetricKind>(), Ok(MetricKind::Delta));
        assert_eq!("attribute".parse::<MetricKind>(), Ok(MetricKind::Attribute));
        assert!(matches!(
            "histogram".parse::<MetricKind>(),
            Err(MetricError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_gauge_accepts_numeric_values() {
        let mut set = MetricSet::new("OracleDatabaseSample", &[]);
        assert!(set.set_metric("a", &Value::Int(12), MetricKind::Gauge).is_ok());
        assert!(set.set_metric("b", &Value::Number("0.5".into()), MetricKind::Gauge).is_ok());
        assert!(set.set_metric("c", &Value::Str("42".into()), MetricKind::Rate).is_ok());

        assert_eq!(set.get("a"), Some(&serde_json::json!(12)));
        assert_eq!(set.get("b"), Some(&serde_json::json!(0.5)));
        assert_eq!(set.get("c"), Some(&serde_json::json!(42)));
        assert_eq!(set.kind("c"), Some(MetricKind::Rate));
    }

    #[test]
    fn test_gauge_rejects_text_and_null() {
        let mut set = MetricSet::new("OracleDatabaseSample", &[]);
        assert!(matches!(
            set.set_metric("a", &Value::from("ONLINE"), MetricKind::Gauge),
            Err(MetricError::NotNumeric { .. })
        ));
        assert!(matches!(
            set.set_metric("a", &Value::Null, MetricKind::Gauge),
            Err(MetricError::Null { .. })
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_attribute_is_stringified() {
        let mut set = MetricSet::new("OracleTablespaceSample", &[]);
        assert!(set.set_metric("dbID", &Value::Number("12345".into()), MetricKind::Attribute).is_ok());
        assert_eq!(set.get("dbID"), Some(&serde_json::json!("12345")));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_serializes_with_event_type() {
        let mut set = MetricSet::new("OracleTablespaceSample", &[("displayName", "TS1".to_string())]);
        set.set_metric("tablespace.spaceUsedPercentage", &Value::Int(12), MetricKind::Gauge)
            .unwrap();

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(
            json,
            r#"{"displayName":"TS1","event_type":"OracleTablespaceSample","tablespace.spaceUsedPercentage":12}"#
        );
    }
}
