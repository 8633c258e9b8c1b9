//! Instance-scoped groups. Every result set carries an `INST_ID` column.

use super::always;
use crate::collectors::config::CollectorConfig;
use crate::collectors::{Decoder, EntityKind, LabelMatch, MetricGroup, SubMetric};

fn long_running_queries_sql(_: &CollectorConfig) -> String {
    r"
    SELECT inst_id, sum(num) AS total FROM ((
      SELECT i.inst_id, 1 AS num
      FROM gv$session s, gv$instance i
      WHERE i.inst_id=s.inst_id
      AND s.status='ACTIVE'
      AND s.type <>'BACKGROUND'
      AND s.last_call_et > 60
      GROUP BY i.inst_id
    ) UNION (
      SELECT i.inst_id, 0 AS num
      FROM gv$session s, gv$instance i
      WHERE i.inst_id=s.inst_id
    ))
    GROUP BY inst_id"
        .to_string()
}

pub static LONG_RUNNING_QUERIES: MetricGroup = MetricGroup {
    name: "long_running_queries",
    scope: EntityKind::Instance,
    sql: long_running_queries_sql,
    metrics: &[SubMetric::gauge("longRunningQueries", "TOTAL", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn sga_uga_total_memory_sql(_: &CollectorConfig) -> String {
    r"
    SELECT SUM(value) AS sum, inst.inst_id
    FROM GV$sesstat, GV$statname, GV$INSTANCE inst
    WHERE name = 'session uga memory max'
    AND GV$sesstat.statistic#=GV$statname.statistic#
    AND GV$sesstat.inst_id=inst.inst_id
    AND GV$statname.inst_id=inst.inst_id
    GROUP BY inst.inst_id"
        .to_string()
}

pub static SGA_UGA_TOTAL_MEMORY: MetricGroup = MetricGroup {
    name: "sgauga_total_memory",
    scope: EntityKind::Instance,
    sql: sga_uga_total_memory_sql,
    metrics: &[SubMetric::gauge("sga.ugaTotalMemoryInBytes", "SUM", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn sharable_statement_sql(_: &CollectorConfig) -> String {
    r"
    SELECT SUM(sqlarea.sharable_mem) AS sum, inst.inst_id
    FROM GV$sqlarea sqlarea, GV$INSTANCE inst
    WHERE sqlarea.executions > 5
    AND inst.inst_id=sqlarea.inst_id
    GROUP BY inst.inst_id"
        .to_string()
}

pub static SGA_SHARED_POOL_LIBRARY_CACHE_SHARABLE_STATEMENT: MetricGroup = MetricGroup {
    name: "sga_shared_pool_library_cache_sharable_statement",
    scope: EntityKind::Instance,
    sql: sharable_statement_sql,
    metrics: &[SubMetric::gauge(
        "sga.sharedPoolLibraryCacheShareableMemoryPerStatementInBytes",
        "SUM",
        true,
    )],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn shareable_user_sql(_: &CollectorConfig) -> String {
    r"
    SELECT SUM(250 * sqlarea.users_opening) AS sum, inst.inst_id
    FROM GV$sqlarea sqlarea, GV$INSTANCE inst
    WHERE inst.inst_id=sqlarea.inst_id
    GROUP BY inst.inst_id"
        .to_string()
}

pub static SGA_SHARED_POOL_LIBRARY_CACHE_SHAREABLE_USER: MetricGroup = MetricGroup {
    name: "sga_shared_pool_library_cache_shareable_user",
    scope: EntityKind::Instance,
    sql: shareable_user_sql,
    metrics: &[SubMetric::gauge(
        "sga.sharedPoolLibraryCacheShareableMemoryPerUserInBytes",
        "SUM",
        true,
    )],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn library_cache_reload_ratio_sql(_: &CollectorConfig) -> String {
    r"
    SELECT (sum(libcache.reloads)/sum(libcache.pins)) AS ratio, inst.inst_id
    FROM GV$librarycache libcache, GV$INSTANCE inst
    WHERE inst.inst_id=libcache.inst_id
    GROUP BY inst.inst_id"
        .to_string()
}

pub static SGA_SHARED_POOL_LIBRARY_CACHE_RELOAD_RATIO: MetricGroup = MetricGroup {
    name: "sga_shared_pool_library_cache_reload_ratio",
    scope: EntityKind::Instance,
    sql: library_cache_reload_ratio_sql,
    metrics: &[SubMetric::gauge("sga.sharedPoolLibraryCacheReloadRatio", "RATIO", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn library_cache_hit_ratio_sql(_: &CollectorConfig) -> String {
    r"
    SELECT libcache.gethitratio AS ratio, inst.inst_id
    FROM GV$librarycache libcache, GV$INSTANCE inst
    WHERE namespace='SQL AREA'
    AND inst.inst_id=libcache.inst_id"
        .to_string()
}

pub static SGA_SHARED_POOL_LIBRARY_CACHE_HIT_RATIO: MetricGroup = MetricGroup {
    name: "sga_shared_pool_library_cache_hit_ratio",
    scope: EntityKind::Instance,
    sql: library_cache_hit_ratio_sql,
    metrics: &[SubMetric::gauge("sga.sharedPoolLibraryCacheHitRatio", "RATIO", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn dict_cache_ratio_sql(_: &CollectorConfig) -> String {
    r"
    SELECT (SUM(rcache.getmisses)/SUM(rcache.gets)) AS ratio, inst.inst_id
    FROM GV$rowcache rcache, GV$INSTANCE inst
    WHERE inst.inst_id=rcache.inst_id
    GROUP BY inst.inst_id"
        .to_string()
}

pub static SGA_SHARED_POOL_DICT_CACHE_RATIO: MetricGroup = MetricGroup {
    name: "sga_shared_pool_dict_cache_ratio",
    scope: EntityKind::Instance,
    sql: dict_cache_ratio_sql,
    metrics: &[SubMetric::gauge("sga.sharedPoolDictCacheMissRatio", "RATIO", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn log_buffer_space_waits_sql(_: &CollectorConfig) -> String {
    r"
    SELECT count(wait.inst_id) AS count, inst.inst_id
    FROM GV$SESSION_WAIT wait, GV$INSTANCE inst
    WHERE wait.event like 'log buffer space%'
    AND inst.inst_id=wait.inst_id
    GROUP BY inst.inst_id"
        .to_string()
}

pub static SGA_LOG_BUFFER_SPACE_WAITS: MetricGroup = MetricGroup {
    name: "sga_log_buffer_space_waits",
    scope: EntityKind::Instance,
    sql: log_buffer_space_waits_sql,
    metrics: &[SubMetric::gauge("sga.logBufferSpaceWaits", "COUNT", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn log_alloc_retries_sql(_: &CollectorConfig) -> String {
    r"
    SELECT (rbar.value/re.value) AS ratio, inst.inst_id
    FROM GV$SYSSTAT rbar, GV$SYSSTAT re, GV$INSTANCE inst
    WHERE rbar.name like 'redo buffer allocation retries'
    AND re.name like 'redo entries'
    AND re.inst_id=inst.inst_id AND rbar.inst_id=inst.inst_id"
        .to_string()
}

pub static SGA_LOG_ALLOC_RETRIES: MetricGroup = MetricGroup {
    name: "sga_log_alloc_retries",
    scope: EntityKind::Instance,
    sql: log_alloc_retries_sql,
    metrics: &[SubMetric::gauge("sga.logBufferAllocationRetriesRatio", "RATIO", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn sga_hit_ratio_sql(_: &CollectorConfig) -> String {
    r"
    SELECT inst.inst_id, (1 - (phy.value - lob.value - dir.value)/ses.value) AS ratio
    FROM GV$SYSSTAT ses, GV$SYSSTAT lob, GV$SYSSTAT dir, GV$SYSSTAT phy, GV$INSTANCE inst
    WHERE ses.name='session logical reads'
    AND dir.name='physical reads direct'
    AND lob.name='physical reads direct (lob)'
    AND phy.name='physical reads'
    AND ses.inst_id=inst.inst_id
    AND lob.inst_id=inst.inst_id
    AND dir.inst_id=inst.inst_id
    AND phy.inst_id=inst.inst_id"
        .to_string()
}

pub static SGA_HIT_RATIO: MetricGroup = MetricGroup {
    name: "sga_hit_ratio",
    scope: EntityKind::Instance,
    sql: sga_hit_ratio_sql,
    metrics: &[SubMetric::gauge("sga.hitRatio", "RATIO", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn sysstat_sql(_: &CollectorConfig) -> String {
    r"
    SELECT sysstat.value, inst.inst_id, sysstat.name
    FROM GV$SYSSTAT sysstat, GV$INSTANCE inst
    WHERE sysstat.inst_id=inst.inst_id"
        .to_string()
}

pub static SYSSTAT: MetricGroup = MetricGroup {
    name: "sysstat",
    scope: EntityKind::Instance,
    sql: sysstat_sql,
    metrics: &[
        SubMetric::gauge("sga.logBufferRedoAllocationRetries", "redo buffer allocation retries", true),
        SubMetric::gauge("sga.logBufferRedoEntries", "redo entries", true),
        SubMetric::gauge("sorts.memoryInBytes", "sorts (memory)", true),
        SubMetric::gauge("sorts.diskInBytes", "sorts (disk)", true),
    ],
    decoder: Decoder::NameValue {
        label: "NAME",
        value: "VALUE",
        matching: LabelMatch::Exact,
    },
    prefix: "",
    enabled: always,
};

fn sga_sql(_: &CollectorConfig) -> String {
    r"
    SELECT sga.name, sga.value, inst.inst_id
    FROM GV$SGA sga, GV$INSTANCE inst
    WHERE sga.inst_id=inst.inst_id"
        .to_string()
}

pub static SGA: MetricGroup = MetricGroup {
    name: "sga",
    scope: EntityKind::Instance,
    sql: sga_sql,
    metrics: &[
        SubMetric::gauge("sga.fixedSizeInBytes", "Fixed Size", true),
        SubMetric::gauge("sga.redoBuffersInBytes", "Redo Buffers", true),
    ],
    decoder: Decoder::NameValue {
        label: "NAME",
        value: "VALUE",
        matching: LabelMatch::Exact,
    },
    prefix: "",
    enabled: always,
};

fn rollback_segments_sql(_: &CollectorConfig) -> String {
    r"
    SELECT
      SUM(stat.gets) AS gets,
      sum(stat.waits) AS waits,
      sum(stat.waits)/sum(stat.gets) AS ratio,
      inst.inst_id
    FROM GV$ROLLSTAT stat, GV$INSTANCE inst
    WHERE stat.inst_id=inst.inst_id
    GROUP BY inst.inst_id"
        .to_string()
}

pub static ROLLBACK_SEGMENTS: MetricGroup = MetricGroup {
    name: "rollback_segments",
    scope: EntityKind::Instance,
    sql: rollback_segments_sql,
    metrics: &[
        SubMetric::gauge("rollbackSegments.gets", "GETS", true),
        SubMetric::gauge("rollbackSegments.waits", "WAITS", true),
        SubMetric::gauge("rollbackSegments.ratioWait", "RATIO", true),
    ],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn redo_log_waits_sql(_: &CollectorConfig) -> String {
    r"
    SELECT
      sysevent.total_waits,
      inst.inst_id,
      sysevent.event
    FROM
      GV$SYSTEM_EVENT sysevent,
      GV$INSTANCE inst
    WHERE sysevent.inst_id=inst.inst_id"
        .to_string()
}

// Event names are matched by substring, so the partial labels below cover
// the "log file switch (checkpoint incomplete)" family.
pub static REDO_LOG_WAITS: MetricGroup = MetricGroup {
    name: "redo_log_waits",
    scope: EntityKind::Instance,
    sql: redo_log_waits_sql,
    metrics: &[
        SubMetric::gauge("redoLog.waits", "log file parallel write", true),
        SubMetric::gauge("redoLog.logFileSwitch", "log file switch completion", true),
        SubMetric::gauge("redoLog.logFileSwitchCheckpointIncomplete", "log file switch (check", true),
        SubMetric::gauge("redoLog.logFileSwitchArchivingNeeded", "log file switch (arch", true),
        SubMetric::gauge("sga.bufferBusyWaits", "buffer busy waits", true),
        SubMetric::gauge("sga.freeBufferWaits", "free buffer waits", true),
        SubMetric::gauge("sga.freeBufferInspected", "free buffer inspected", true),
    ],
    decoder: Decoder::NameValue {
        label: "EVENT",
        value: "TOTAL_WAITS",
        matching: LabelMatch::Contains,
    },
    prefix: "",
    enabled: always,
};

fn locked_accounts_sql(_: &CollectorConfig) -> String {
    r#"
    SELECT
      INST_ID, LOCKED_ACCOUNTS
    FROM
    ( SELECT count(1) AS "LOCKED_ACCOUNTS"
      FROM
        cdb_users a,
        cdb_pdbs b
      WHERE a.con_id = b.con_id
        AND username IN ('SYS', 'SYSTEM', 'DBSNMP')
        AND a.account_status != 'OPEN'
    ) l,
    gv$instance i"#
        .to_string()
}

pub static LOCKED_ACCOUNTS: MetricGroup = MetricGroup {
    name: "locked_accounts",
    scope: EntityKind::Instance,
    sql: locked_accounts_sql,
    metrics: &[SubMetric::gauge("lockedAccounts", "LOCKED_ACCOUNTS", true)],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn read_write_metrics_sql(_: &CollectorConfig) -> String {
    r#"
    SELECT
      INST_ID,
      SUM(PHYRDS) AS "PhysicalReads",
      SUM(PHYWRTS) AS "PhysicalWrites",
      SUM(PHYBLKRD) AS "PhysicalBlockReads",
      SUM(PHYBLKWRT) AS "PhysicalBlockWrites",
      SUM(READTIM) * 10 AS "ReadTime",
      SUM(WRITETIM) * 10 AS "WriteTime"
    FROM gv$filestat
    GROUP BY INST_ID"#
        .to_string()
}

pub static READ_WRITE_METRICS: MetricGroup = MetricGroup {
    name: "read_write_metrics",
    scope: EntityKind::Instance,
    sql: read_write_metrics_sql,
    metrics: &[
        SubMetric::rate("disk.reads", "PhysicalReads"),
        SubMetric::rate("disk.writes", "PhysicalWrites"),
        SubMetric::rate("disk.blocksRead", "PhysicalBlockReads"),
        SubMetric::rate("disk.blocksWritten", "PhysicalBlockWrites"),
        SubMetric::rate("disk.readTimeInMilliseconds", "ReadTime"),
        SubMetric::rate("disk.writeTimeInMilliseconds", "WriteTime"),
    ],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn pga_metrics_sql(_: &CollectorConfig) -> String {
    "SELECT INST_ID, NAME, VALUE FROM gv$pgastat".to_string()
}

pub static PGA_METRICS: MetricGroup = MetricGroup {
    name: "pga_metrics",
    scope: EntityKind::Instance,
    sql: pga_metrics_sql,
    metrics: &[
        SubMetric::gauge("memory.pgaInUseInBytes", "total PGA inuse", false),
        SubMetric::gauge("memory.pgaAllocatedInBytes", "total PGA allocated", false),
        SubMetric::gauge("memory.pgaFreeableInBytes", "total freeable PGA memory", false),
        SubMetric::gauge("memory.pgaMaxSizeInBytes", "global memory bound", true),
    ],
    decoder: Decoder::NameValue {
        label: "NAME",
        value: "VALUE",
        matching: LabelMatch::Exact,
    },
    prefix: "",
    enabled: always,
};

fn global_name_instance_sql(_: &CollectorConfig) -> String {
    r"
    SELECT
      t1.INST_ID,
      t2.GLOBAL_NAME
    FROM
      (SELECT INST_ID FROM gv$instance) t1,
      (SELECT GLOBAL_NAME FROM global_name) t2"
        .to_string()
}

pub static GLOBAL_NAME_INSTANCE: MetricGroup = MetricGroup {
    name: "global_name_instance",
    scope: EntityKind::Instance,
    sql: global_name_instance_sql,
    metrics: &[SubMetric::attribute("globalName", "GLOBAL_NAME")],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};

fn db_id_instance_sql(_: &CollectorConfig) -> String {
    r"
    SELECT
      t1.INST_ID,
      t2.DBID
    FROM
      (SELECT INST_ID FROM gv$instance) t1,
      (SELECT DBID FROM v$database) t2"
        .to_string()
}

pub static DB_ID_INSTANCE: MetricGroup = MetricGroup {
    name: "db_id_instance",
    scope: EntityKind::Instance,
    sql: db_id_instance_sql,
    metrics: &[SubMetric::attribute("dbID", "DBID")],
    decoder: Decoder::Columns,
    prefix: "",
    enabled: always,
};
