//! CockroachDB `/_status/vars` series mapped to check metrics

use std::collections::BTreeMap;

pub const METRIC_MAP: &[(&str, &str)] = &[
    ("addsstable_applications", "addsstable.applications"),
    ("capacity", "capacity.total"),
    ("capacity_available", "capacity.available"),
    ("capacity_reserved", "capacity.reserved"),
    ("capacity_used", "capacity.used"),
    ("clock_offset_meannanos", "clock.offset.meannanos"),
    ("clock_offset_stddevnanos", "clock.offset.stddevnanos"),
    ("distsender_batches", "distsender.batches.total"),
    ("distsender_rpc_sent", "distsender.rpc.sent.total"),
    ("exec_error", "exec.error"),
    ("exec_latency", "exec.latency"),
    ("exec_success", "exec.success"),
    ("gossip_connections_incoming", "gossip.connections.incoming"),
    ("gossip_connections_outgoing", "gossip.connections.outgoing"),
    ("liveness_heartbeatfailures", "liveness.heartbeatfailures"),
    ("liveness_livenodes", "liveness.livenodes"),
    ("node_id", "node_id"),
    ("ranges", "ranges"),
    ("ranges_unavailable", "ranges.unavailable"),
    ("ranges_underreplicated", "ranges.underreplicated"),
    ("replicas", "replicas.total"),
    ("replicas_leaders", "replicas.leaders"),
    ("rocksdb_block_cache_hits", "rocksdb.block.cache.hits"),
    ("rocksdb_block_cache_misses", "rocksdb.block.cache.misses"),
    ("sql_conns", "sql.conns"),
    ("sql_delete_count", "sql.delete.count"),
    ("sql_insert_count", "sql.insert.count"),
    ("sql_query_count", "sql.query.count"),
    ("sql_select_count", "sql.select.count"),
    ("sql_service_latency", "sql.service.latency"),
    ("sql_txn_abort_count", "sql.txn.abort.count"),
    ("sql_txn_begin_count", "sql.txn.begin.count"),
    ("sql_txn_commit_count", "sql.txn.commit.count"),
    ("sql_update_count", "sql.update.count"),
    ("sys_cpu_sys_percent", "sys.cpu.sys.percent"),
    ("sys_cpu_user_percent", "sys.cpu.user.percent"),
    ("sys_goroutines", "sys.goroutines"),
    ("sys_rss", "sys.rss"),
    ("sys_uptime", "sys.uptime"),
    ("txn_aborts", "txn.aborts"),
    ("txn_commits", "txn.commits"),
    ("txn_durations", "txn.durations"),
];

pub fn metric_map() -> BTreeMap<String, String> {
    METRIC_MAP
        .iter()
        .map(|(raw, name)| (raw.to_string(), name.to_string()))
        .collect()
}
