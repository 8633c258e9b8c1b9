//! Tablespace-scoped groups. These only run once the tablespace gate lets
//! them through, and every query honours the allow-list.

use super::{always, tablespace_clause};
use crate::collectors::config::CollectorConfig;
use crate::collectors::{Decoder, EntityKind, MetricGroup, SubMetric};

fn tablespace_metrics_sql(config: &CollectorConfig) -> String {
    format!(
        r#"
    SELECT a.TABLESPACE_NAME,
      a.USED_PERCENT,
      a.USED_SPACE AS "USED",
      a.TABLESPACE_SIZE AS "SIZE",
      b.TABLESPACE_OFFLINE AS "OFFLINE"
    FROM DBA_TABLESPACE_USAGE_METRICS a
    JOIN (
      SELECT
        TABLESPACE_NAME,
        MAX( CASE WHEN status = 'OFFLINE' THEN 1 ELSE 0 END) AS "TABLESPACE_OFFLINE"
      FROM DBA_TABLESPACES
      GROUP BY TABLESPACE_NAME
    ) b
    ON a.TABLESPACE_NAME = b.TABLESPACE_NAME{}"#,
        tablespace_clause(config, "WHERE", "a.TABLESPACE_NAME")
    )
}

pub static TABLESPACE_METRICS: MetricGroup = MetricGroup {
    name: "tablespace_metrics",
    scope: EntityKind::Tablespace,
    sql: tablespace_metrics_sql,
    metrics: &[
        SubMetric::gauge("tablespace.spaceConsumedInBytes", "USED", false),
        SubMetric::gauge("tablespace.spaceReservedInBytes", "SIZE", false),
        SubMetric::gauge("tablespace.spaceUsedPercentage", "USED_PERCENT", true),
        SubMetric::gauge("tablespace.isOffline", "OFFLINE", true),
    ],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn global_name_tablespace_sql(config: &CollectorConfig) -> String {
    format!(
        r"
    SELECT
      t1.TABLESPACE_NAME,
      t2.GLOBAL_NAME
    FROM
      (SELECT TABLESPACE_NAME FROM DBA_TABLESPACES{}) t1,
      (SELECT GLOBAL_NAME FROM global_name) t2",
        tablespace_clause(config, "WHERE", "TABLESPACE_NAME")
    )
}

pub static GLOBAL_NAME_TABLESPACE: MetricGroup = MetricGroup {
    name: "global_name_tablespace",
    scope: EntityKind::Tablespace,
    sql: global_name_tablespace_sql,
    metrics: &[SubMetric::attribute("globalName", "GLOBAL_NAME")],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn db_id_tablespace_sql(config: &CollectorConfig) -> String {
    format!(
        r"
    SELECT
      t1.TABLESPACE_NAME,
      t2.DBID
    FROM
      (SELECT TABLESPACE_NAME FROM DBA_TABLESPACES{}) t1,
      (SELECT DBID FROM v$database) t2",
        tablespace_clause(config, "WHERE", "TABLESPACE_NAME")
    )
}

pub static DB_ID_TABLESPACE: MetricGroup = MetricGroup {
    name: "db_id_tablespace",
    scope: EntityKind::Tablespace,
    sql: db_id_tablespace_sql,
    metrics: &[SubMetric::attribute("dbID", "DBID")],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn cdb_datafiles_offline_sql(config: &CollectorConfig) -> String {
    format!(
        r#"
    SELECT
      sum(CASE WHEN ONLINE_STATUS IN ('ONLINE', 'SYSTEM','RECOVER') THEN 0 ELSE 1 END)
        AS "CDB_DATAFILES_OFFLINE",
      TABLESPACE_NAME
    FROM dba_data_files{}
    GROUP BY TABLESPACE_NAME"#,
        tablespace_clause(config, "WHERE", "TABLESPACE_NAME")
    )
}

pub static CDB_DATAFILES_OFFLINE: MetricGroup = MetricGroup {
    name: "cdb_datafiles_offline",
    scope: EntityKind::Tablespace,
    sql: cdb_datafiles_offline_sql,
    metrics: &[SubMetric::gauge("tablespace.offlineCDBDatafiles", "CDB_DATAFILES_OFFLINE", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn pdb_datafiles_offline_sql(config: &CollectorConfig) -> String {
    format!(
        r#"
    SELECT
      sum(CASE WHEN ONLINE_STATUS IN ('ONLINE','SYSTEM','RECOVER') THEN 0 ELSE 1 END)
        AS "PDB_DATAFILES_OFFLINE",
      a.TABLESPACE_NAME
    FROM cdb_data_files a, cdb_pdbs b
    WHERE a.con_id = b.con_id{}
    GROUP BY a.TABLESPACE_NAME"#,
        tablespace_clause(config, "AND", "a.TABLESPACE_NAME")
    )
}

pub static PDB_DATAFILES_OFFLINE: MetricGroup = MetricGroup {
    name: "pdb_datafiles_offline",
    scope: EntityKind::Tablespace,
    sql: pdb_datafiles_offline_sql,
    metrics: &[SubMetric::gauge("tablespace.offlinePDBDatafiles", "PDB_DATAFILES_OFFLINE", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn pdb_non_write_sql(config: &CollectorConfig) -> String {
    format!(
        r#"
    SELECT TABLESPACE_NAME,
      sum(CASE WHEN ONLINE_STATUS IN ('ONLINE','SYSTEM','RECOVER') THEN 0 ELSE 1 END) AS "PDB_NON_WRITE_MODE"
    FROM cdb_data_files a, cdb_pdbs b
    WHERE a.con_id = b.con_id{}
    GROUP BY TABLESPACE_NAME"#,
        tablespace_clause(config, "AND", "TABLESPACE_NAME")
    )
}

pub static PDB_NON_WRITE: MetricGroup = MetricGroup {
    name: "pdb_non_write",
    scope: EntityKind::Tablespace,
    sql: pdb_non_write_sql,
    metrics: &[SubMetric::gauge("tablespace.pdbDatafilesNonWrite", "PDB_NON_WRITE_MODE", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};
