//! System metric views. `gv$sysmetric` reports the whole instance,
//! `gv$con_sysmetric` reports per container; both share one label table.

use crate::collectors::config::CollectorConfig;
use crate::collectors::{Decoder, EntityKind, LabelMatch, MetricGroup, SubMetric};

const fn g(name: &'static str, source: &'static str, default: bool) -> SubMetric {
    SubMetric::gauge(name, source, default)
}

const SYS_METRIC_TABLE: &[SubMetric] = &[
    g("memory.bufferCacheHitRatio", "Buffer Cache Hit Ratio", true),
    g("memory.sortsRatio", "Memory Sorts Ratio", false),
    g("memory.redoAllocationHitRatio", "Redo Allocation Hit Ratio", false),
    g("query.transactionsPerSecond", "User Transaction Per Sec", true),
    g("query.physicalReadsPerTransaction", "Physical Reads Per Txn", false),
    g("query.physicalWritesPerTransaction", "Physical Writes Per Txn", false),
    g("disk.physicalReadsPerSecond", "Physical Reads Direct Per Sec", true),
    g("query.physicalReadsDirectPerTransaction", "Physical Reads Direct Per Txn", false),
    g("disk.physicalWritesPerSecond", "Physical Writes Direct Per Sec", true),
    g("query.physicalWritesDirectPerTransaction", "Physical Writes Direct Per Txn", false),
    g("disk.physicalLobsReadsPerSecond", "Physical Reads Direct Lobs Per Sec", false),
    g("query.physicalLobsReadsPerTransaction", "Physical Reads Direct Lobs Per Txn", false),
    g("disk.physicalLobsWritesPerSecond", "Physical Writes Direct Lobs Per Sec", false),
    g("query.physicalLobsWritesPerTransaction", "Physical Writes Direct Lobs Per Txn", false),
    g("memory.redoGeneratedBytesPerSecond", "Redo Generated Per Sec", false),
    g("memory.redoGeneratedBytesPerTransaction", "Redo Generated Per Txn", false),
    g("db.logonsPerTransaction", "Logons Per Txn", false),
    g("db.openCursorsPerSecond", "Open Cursors Per Sec", false),
    g("db.openCursorsPerTransaction", "Open Cursors Per Txn", false),
    g("db.userCommitsPerSecond", "User Commits Per Sec", false),
    g("db.userCommitsPercentage", "User Commits Percentage", false),
    g("db.userRollbacksPerSecond", "User Rollbacks Per Sec", false),
    g("db.userRollbacksPercentage", "User Rollbacks Percentage", false),
    g("db.userCallsPerSecond", "User Calls Per Sec", false),
    g("db.userCallsPerTransaction", "User Calls Per Txn", false),
    g("db.recursiveCallsPerSecond", "Recursive Calls Per Sec", false),
    g("db.recursiveCallsPerTransaction", "Recursive Calls Per Txn", false),
    g("db.logicalReadsPerSecond", "Logical Reads Per Sec", false),
    g("db.logicalReadsPerTransaction", "Logical Reads Per Txn", false),
    g("db.dbwrCheckpointsPerSecond", "DBWR Checkpoints Per Sec", false),
    g("db.backgroundCheckpointsPerSecond", "Background Checkpoints Per Sec", false),
    g("db.redoWritesPerSecond", "Redo Writes Per Sec", false),
    g("db.redoWritesPerTransaction", "Redo Writes Per Txn", false),
    g("db.longTableScansPerSecond", "Long Table Scans Per Sec", false),
    g("db.longTableScansPerTransaction", "Long Table Scans Per Txn", false),
    g("db.totalTableScansPerSecond", "Total Table Scans Per Sec", true),
    g("db.totalTableScansPerTransaction", "Total Table Scans Per Txn", false),
    g("db.fullIndexScansPerSecond", "Full Index Scans Per Sec", false),
    g("db.fullIndexScansPerTransaction", "Full Index Scans Per Txn", false),
    g("db.totalIndexScansPerSecond", "Total Index Scans Per Sec", true),
    g("db.totalIndexScansPerTransaction", "Total Index Scans Per Txn", false),
    g("db.totalParseCountPerSecond", "Total Parse Count Per Sec", false),
    g("db.totalParseCountPerTransaction", "Total Parse Count Per Txn", false),
    g("db.hardParseCountPerSecond", "Hard Parse Count Per Sec", false),
    g("db.hardParseCountPerTransaction", "Hard Parse Count Per Txn", false),
    g("db.parseFailureCountPerSecond", "Parse Failure Count Per Sec", false),
    g("db.parseFailureCountPerTransaction", "Parse Failure Count Per Txn", false),
    g("db.cursorCacheHitsPerAttempts", "Cursor Cache Hit Ratio", false),
    g("disk.sortPerSecond", "Disk Sort Per Sec", false),
    g("disk.sortPerTransaction", "Disk Sort Per Txn", false),
    g("db.rowsPerSort", "Rows Per Sort", false),
    g("db.softParseRatio", "Soft Parse Ratio", false),
    g("db.userCallsRatio", "User Calls Ratio", false),
    g("db.hostCpuUtilization", "Host CPU Utilization (%)", true),
    g("network.trafficBytePerSecond", "Network Traffic Volume Per Sec", true),
    g("db.enqueueTimeoutsPerSecond", "Enqueue Timeouts Per Sec", false),
    g("db.enqueueTimeoutsPerTransaction", "Enqueue Timeouts Per Txn", false),
    g("db.enqueueWaitsPerSecond", "Enqueue Waits Per Sec", false),
    g("db.enqueueWaitsPerTransaction", "Enqueue Waits Per Txn", false),
    g("db.enqueueDeadlocksPerSecond", "Enqueue Deadlocks Per Sec", false),
    g("db.enqueueDeadlocksPerTransaction", "Enqueue Deadlocks Per Txn", false),
    g("db.enqueueRequestsPerSecond", "Enqueue Requests Per Sec", false),
    g("db.enqueueRequestsPerTransaction", "Enqueue Requests Per Txn", false),
    g("db.blockGetsPerSecond", "DB Block Gets Per Sec", false),
    g("db.blockGetsPerTransaction", "DB Block Gets Per Txn", false),
    g("db.consistentReadGetsPerSecond", "Consistent Read Gets Per Sec", false),
    g("db.blockChangesPerSecond", "DB Block Changes Per Sec", false),
    g("db.consistentReadGetsPerTransaction", "Consistent Read Gets Per Txn", false),
    g("db.blockChangesPerTransaction", "DB Block Changes Per Txn", false),
    g("db.consistentReadChangesPerSecond", "Consistent Read Changes Per Sec", false),
    g("db.consistentReadChangesPerTransaction", "Consistent Read Changes Per Txn", false),
    g("db.cpuUsagePerSecond", "CPU Usage Per Sec", true),
    g("db.cpuUsagePerTransaction", "CPU Usage Per Txn", false),
    g("db.crBlocksCreatedPerSecond", "CR Blocks Created Per Sec", false),
    g("db.crBlocksCreatedPerTransaction", "CR Blocks Created Per Txn", false),
    g("db.crUndoRecordsAppliedPerSecond", "CR Undo Records Applied Per Sec", false),
    g("db.crUndoRecordsAppliedPerTransaction", "CR Undo Records Applied Per Txn", false),
    g("db.userRollbackUndoRecordsAppliedPerSecond", "User Rollback UndoRec Applied Per Sec", false),
    g("db.userRollbackUndoRecordsAppliedPerTransaction", "User Rollback Undo Records Applied Per Txn", false),
    g("db.leafNodeSplitsPerSecond", "Leaf Node Splits Per Sec", false),
    g("db.leafNodeSplitsPerTransaction", "Leaf Node Splits Per Txn", false),
    g("db.branchNodeSplitsPerSecond", "Branch Node Splits Per Sec", false),
    g("db.branchNodeSplitsPerTransaction", "Branch Node Splits Per Txn", false),
    g("disk.physicalReadIoRequestsPerSecond", "Physical Read Total IO Requests Per Sec", true),
    g("disk.physicalReadBytesPerSecond", "Physical Read Total Bytes Per Sec", true),
    g("db.GcCrBlockRecievedPerSecond", "GC CR Block Received Per Second", false),
    g("db.GcCrBlockRecievedPerTransaction", "GC CR Block Received Per Txn", false),
    g("db.GcCurrentBlockReceivedPerSecond", "GC Current Block Received Per Second", false),
    g("db.GcCurrentBlockReceivedPerTransaction", "GC Current Block Received Per Txn", false),
    g("db.globalCacheAverageCrGetTime", "Global Cache Average CR Get Time", false),
    g("db.globalCacheAverageCurrentGetTime", "Global Cache Average Current Get Time", false),
    g("disk.physicalWriteTotalIoRequestsPerSecond", "Physical Write Total IO Requests Per Sec", true),
    g("memory.globalCacheBlocksCorrupted", "Global Cache Blocks Corrupted", false),
    g("memory.globalCacheBlocksLost", "Global Cache Blocks Lost", false),
    g("db.currentLogons", "Current Logons Count", false),
    g("db.currentOpenCursors", "Current Open Cursors Count", false),
    g("db.userLimitPercentage", "User Limit %", false),
    g("db.sqlServiceResponseTime", "SQL Service Response Time", true),
    g("db.waitTimeRatio", "Database Wait Time Ratio", false),
    g("db.cpuTimeRatio", "Database CPU Time Ratio", false),
    g("db.responseTimePerTransaction", "Response Time Per Txn", false),
    g("db.rowCacheHitRatio", "Row Cache Hit Ratio", false),
    g("db.rowCacheMissRatio", "Row Cache Miss Ratio", false),
    g("db.libraryCacheHitRatio", "Library Cache Hit Ratio", false),
    g("db.libraryCacheMissRatio", "Library Cache Miss Ratio", false),
    g("db.sharedPoolFreePercentage", "Shared Pool Free %", false),
    g("db.pgaCacheHitPercentage", "PGA Cache Hit %", false),
    g("db.processLimitPercentage", "Process Limit %", false),
    g("db.sessionLimitPercentage", "Session Limit %", false),
    g("db.executionsPerTransaction", "Executions Per Txn", false),
    g("db.executionsPerSecond", "Executions Per Sec", true),
    g("db.TransactionsPerLogon", "Txns Per Logon", false),
    g("db.databaseCpuTimePerSecond", "Database Time Per Sec", false),
    g("disk.physicalWriteBytesPerSecond", "Physical Write Total Bytes Per Sec", false),
    g("disk.physicalWriteIoRequestsPerSecond", "Physical Write IO Requests Per Sec", false),
    g("db.blockChangesPerUserCall", "DB Block Changes Per User Call", false),
    g("db.blockGetsPerUserCall", "DB Block Gets Per User Call", false),
    g("db.executionsPerUserCall", "Executions Per User Call", false),
    g("disk.logicalReadsPerUserCall", "Logical Reads Per User Call", false),
    g("db.sortsPerUserCall", "Total Sorts Per User Call", false),
    g("db.tableScansPerUserCall", "Total Table Scans Per User Call", false),
    g("db.osLoad", "Current OS Load", false),
    g("db.streamsPoolUsagePercentage", "Streams Pool Usage Percentage", false),
    g("network.ioMegabytesPerSecond", "I/O Megabytes per Second", true),
    g("network.ioRequestsPerSecond", "I/O Requests per Second", true),
    g("db.averageActiveSessions", "Average Active Sessions", false),
    g("db.activeSerialSessions", "Active Serial Sessions", false),
    g("db.activeParallelSessions", "Active Parallel Sessions", false),
    g("db.backgroundCpuUsagePerSecond", "Background CPU Usage Per Sec", false),
    g("db.backgroundTimePerSecond", "Background Time Per Sec", false),
    g("db.hostCpuUsagePerSecond", "Host CPU Usage Per Sec", false),
    g("disk.tempSpaceUsedInBytes", "Temp Space Used", false),
    g("db.sessionCount", "Session Count", true),
];

const DECODER: Decoder = Decoder::NameValue {
    label: "METRIC_NAME",
    value: "VALUE",
    matching: LabelMatch::Exact,
};

fn sys_metrics_sql(_: &CollectorConfig) -> String {
    r"
    SELECT
      INST_ID,
      METRIC_NAME,
      VALUE
    FROM gv$sysmetric"
        .to_string()
}

fn pdb_sys_metrics_sql(_: &CollectorConfig) -> String {
    r"
    SELECT
      INST_ID,
      METRIC_NAME,
      VALUE
    FROM gv$con_sysmetric"
        .to_string()
}

const fn sys_enabled(config: &CollectorConfig) -> bool {
    config.sys_metrics_source.includes_sys()
}

const fn pdb_enabled(config: &CollectorConfig) -> bool {
    config.sys_metrics_source.includes_pdb()
}

pub static SYS_METRICS: MetricGroup = MetricGroup {
    name: "sys_metrics",
    scope: EntityKind::Instance,
    sql: sys_metrics_sql,
    metrics: SYS_METRIC_TABLE,
    decoder: DECODER,
    prefix: "",
    enabled: sys_enabled,
};

pub static PDB_SYS_METRICS: MetricGroup = MetricGroup {
    name: "pdb_sys_metrics",
    scope: EntityKind::Instance,
    sql: pdb_sys_metrics_sql,
    metrics: SYS_METRIC_TABLE,
    decoder: DECODER,
    prefix: "pdb.",
    enabled: pdb_enabled,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::config::SysMetricsSource;
    use std::collections::HashSet;

    #[test]
    fn test_labels_and_names_are_unique() {
        let labels: HashSet<_> = SYS_METRIC_TABLE.iter().map(|m| m.source).collect();
        let names: HashSet<_> = SYS_METRIC_TABLE.iter().map(|m| m.name).collect();
        assert_eq!(labels.len(), SYS_METRIC_TABLE.len());
        assert_eq!(names.len(), SYS_METRIC_TABLE.len());
    }

    #[test]
    fn test_source_selection() {
        let sys = CollectorConfig::new();
        assert!(SYS_METRICS.is_enabled(&sys));
        assert!(!PDB_SYS_METRICS.is_enabled(&sys));

        let pdb = CollectorConfig::new().with_sys_metrics_source(SysMetricsSource::Pdb);
        assert!(!SYS_METRICS.is_enabled(&pdb));
        assert!(PDB_SYS_METRICS.is_enabled(&pdb));

        let all = CollectorConfig::new().with_sys_metrics_source(SysMetricsSource::All);
        assert!(SYS_METRICS.is_enabled(&all));
        assert!(PDB_SYS_METRICS.is_enabled(&all));
    }

    #[test]
    fn test_pdb_metrics_are_prefixed() {
        let metric = SubMetric::gauge("db.cpuUsagePerSecond", "CPU Usage Per Sec", true);
        assert_eq!(PDB_SYS_METRICS.metric_name(&metric), "pdb.db.cpuUsagePerSecond");
        assert_eq!(SYS_METRICS.metric_name(&metric), "db.cpuUsagePerSecond");
        assert!(PDB_SYS_METRICS.query(&CollectorConfig::new()).contains("gv$con_sysmetric"));
    }
}
