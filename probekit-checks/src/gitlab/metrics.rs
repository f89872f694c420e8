//! Raw Prometheus names exposed by GitLab and Gitaly, mapped to check metrics

use std::collections::BTreeMap;

pub const GITLAB_METRICS: &[(&str, &str)] = &[
    ("gitlab_banzai_cached_render_real_duration_seconds", "banzai.cached_render_real_duration_seconds"),
    ("gitlab_banzai_cacheless_render_real_duration_seconds", "banzai.cacheless_render_real_duration_seconds"),
    ("gitlab_cache_misses_total", "cache.misses_total"),
    ("gitlab_cache_operation_duration_seconds", "cache.operation_duration_seconds"),
    ("gitlab_database_transaction_seconds", "database.transaction_seconds"),
    ("gitlab_rails_queue_duration_seconds", "rails_queue_duration_seconds"),
    ("gitlab_sql_duration_seconds", "sql_duration_seconds"),
    ("gitlab_transaction_duration_seconds", "transaction.duration_seconds"),
    ("http_requests_total", "http_requests_total"),
    ("http_request_duration_seconds", "http_request_duration_seconds"),
    ("job_waiter_started_total", "job.waiter_started_total"),
    ("pipelines_created_total", "pipelines_created_total"),
    ("puma_active_connections", "puma.active_connections"),
    ("puma_max_threads", "puma.max_threads"),
    ("puma_pool_capacity", "puma.pool_capacity"),
    ("puma_queued_connections", "puma.queued_connections"),
    ("puma_running", "puma.running"),
    ("puma_running_workers", "puma.running_workers"),
    ("puma_workers", "puma.workers"),
    ("rack_requests_total", "rack.http_requests_total"),
    ("ruby_file_descriptors", "ruby.file_descriptors"),
    ("ruby_gc_duration_seconds", "ruby.gc_duration_seconds"),
    ("ruby_memory_bytes", "ruby.memory_bytes"),
    ("ruby_process_cpu_seconds_total", "ruby.process_cpu_seconds_total"),
    ("ruby_process_resident_memory_bytes", "ruby.process_resident_memory_bytes"),
    ("ruby_sampler_duration_seconds_total", "ruby.sampler_duration_seconds_total"),
    ("sidekiq_jobs_completion_seconds", "sidekiq.jobs_completion_seconds"),
    ("sidekiq_running_jobs", "sidekiq.running_jobs"),
    ("upload_file_does_not_exist", "upload_file_does_not_exist"),
    ("user_session_logins_total", "user_session_logins_total"),
];

pub const GITALY_METRICS: &[(&str, &str)] = &[
    ("gitaly_authentications_total", "authentications"),
    ("gitaly_cacheinvalidator_rpc_total", "cacheinvalidator_rpc"),
    ("gitaly_catfile_cache_members", "catfile_cache_members"),
    ("gitaly_spawn_timeouts_total", "spawn_timeouts"),
    ("gitaly_supervisor_health_checks_total", "supervisor_health_checks"),
    ("go_goroutines", "go_goroutines"),
    ("go_memstats_alloc_bytes", "go_memstats_alloc_bytes"),
    ("grpc_server_handled_total", "grpc_server_handled"),
    ("grpc_server_started_total", "grpc_server_started"),
    ("process_cpu_seconds_total", "process_cpu_seconds"),
    ("process_resident_memory_bytes", "process_resident_memory_bytes"),
];

pub fn metric_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(raw, name)| (raw.to_string(), name.to_string()))
        .collect()
}
