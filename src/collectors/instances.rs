use crate::collectors::util::{instance_id_string, text};
use crate::database::{Database, normalize_query};
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

const INSTANCE_QUERY: &str = r"
    SELECT
      INSTANCE_NAME, INST_ID
    FROM gv$instance";

/// Instance id to instance name, built once before collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceLookup {
    names: HashMap<String, String>,
}

impl InstanceLookup {
    /// Query `gv$instance` for every instance of the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or its rows cannot be read.
    #[instrument(skip(db), level = "info", err)]
    pub async fn load(db: &dyn Database) -> Result<Self> {
        let rows = db
            .query(INSTANCE_QUERY)
            .await
            .context("failed to load instances")?;

        if rows.is_empty() {
            warn!(query = %normalize_query(INSTANCE_QUERY), "query did not return any results");
        }

        let name_idx = rows
            .column_index("INSTANCE_NAME")
            .ok_or_else(|| anyhow!("instance query returned no INSTANCE_NAME column"))?;
        let id_idx = rows
            .column_index("INST_ID")
            .ok_or_else(|| anyhow!("instance query returned no INST_ID column"))?;

        let mut names = HashMap::new();
        for row in rows.iter() {
            let id = row
                .get(id_idx)
                .and_then(instance_id_string)
                .context("instance row without INST_ID")?;
            let name = row
                .get(name_idx)
                .and_then(text)
                .context("instance row without INSTANCE_NAME")?;
            names.insert(id, name);
        }

        debug!(instances = names.len(), "loaded instance lookup");
        Ok(Self { names })
    }

    /// Instance name for `id`, or `id` itself when unknown.
    #[must_use]
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.names.get(id).map_or(id, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InstanceLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
