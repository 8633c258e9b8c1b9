use crate::collectors::executor::send;
use crate::collectors::util::{instance_id_string, text};
use crate::collectors::{InventoryItem, Message};
use crate::database::{Database, Value, normalize_query};
use anyhow::{Result, anyhow};
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, instrument, warn};

const INVENTORY_QUERY: &str = r"
    SELECT
      INST_ID,
      NAME,
      VALUE,
      DESCRIPTION
    FROM gv$parameter
    UNION
    SELECT
      INST_ID,
      'version',
      VERSION,
      'OracleDB version'
    FROM gv$instance";

/// Read instance parameters and the database version as inventory items.
///
/// # Errors
///
/// Returns an error if the query fails, the result has an unexpected shape,
/// or the queue was closed.
#[instrument(skip(db, tx), level = "info", fields(otel.kind = "internal"))]
pub async fn collect(db: &dyn Database, tx: &Sender<Message>) -> Result<usize> {
    let rows = db.query(INVENTORY_QUERY).await.inspect_err(|e| {
        error!(query = %normalize_query(INVENTORY_QUERY), error = %e, "failed to collect inventory");
    })?;

    if rows.is_empty() {
        warn!(query = %normalize_query(INVENTORY_QUERY), "query did not return any results");
        return Ok(0);
    }

    let column = |name: &str| {
        rows.column_index(name).ok_or_else(|| {
            error!(column = name, "inventory result has no such column");
            anyhow!("inventory query returned no {name} column")
        })
    };
    let (id_idx, name_idx, value_idx, desc_idx) =
        (column("INST_ID")?, column("NAME")?, column("VALUE")?, column("DESCRIPTION")?);

    let mut count = 0;
    for row in rows.iter() {
        let (Some(instance_id), Some(name)) = (
            row.get(id_idx).and_then(instance_id_string),
            row.get(name_idx).and_then(text),
        ) else {
            debug!("skipping inventory row without instance or name");
            continue;
        };

        let item = InventoryItem {
            instance_id,
            name,
            value: row.get(value_idx).cloned().unwrap_or(Value::Null).sanitize(),
            description: row.get(desc_idx).and_then(text).unwrap_or_default(),
        };
        send(tx, Message::Inventory(item)).await?;
        count += 1;
    }

    debug!(items = count, "inventory collected");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::mock::{MockDatabase, MockResponse};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_collect_inventory() -> Result<()> {
        let db = MockDatabase::new().on(
            r"FROM gv\$parameter",
            MockResponse::rows(
                &["INST_ID", "NAME", "VALUE", "DESCRIPTION"],
                vec![
                    vec![
                        Value::Number("1".into()),
                        Value::from("processes"),
                        Value::from("300"),
                        Value::from("user processes"),
                    ],
                    vec![
                        Value::Number("1".into()),
                        Value::from("version"),
                        Value::from("19.0.0.0.0"),
                        Value::from("OracleDB version"),
                    ],
                    vec![Value::Null, Value::from("orphan"), Value::Null, Value::Null],
                ],
            ),
        )?;
        let (tx, mut rx) = mpsc::channel(8);

        assert_eq!(collect(&db, &tx).await?, 2);
        drop(tx);

        let Some(Message::Inventory(first)) = rx.recv().await else {
            anyhow::bail!("expected an inventory item");
        };
        assert_eq!(first.instance_id, "1");
        assert_eq!(first.name, "processes");
        assert_eq!(first.value, Value::from("300"));
        assert_eq!(first.description, "user processes");
        Ok(())
    }
}
