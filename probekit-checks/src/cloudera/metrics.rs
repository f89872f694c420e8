//! Time-series metrics queried per Cloudera Manager entity category

/// Entity category of a time-series query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Cluster,
    Host,
    Role,
}

impl Category {
    /// Name used in metric names and tags (`cloudera.<name>.*`, `cloudera_<name>:`)
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Cluster => "cluster",
            Category::Host => "host",
            Category::Role => "role",
        }
    }

    /// `category=` value of the tsquery language
    pub fn query_name(self) -> &'static str {
        match self {
            Category::Cluster => "CLUSTER",
            Category::Host => "HOST",
            Category::Role => "ROLE",
        }
    }

    pub fn metrics(self) -> &'static [&'static str] {
        match self {
            Category::Cluster => CLUSTER_METRICS,
            Category::Host => HOST_METRICS,
            Category::Role => ROLE_METRICS,
        }
    }
}

pub const CLUSTER_METRICS: &[&str] = &[
    "cpu_percent_across_hosts",
    "total_read_bytes_rate_across_disks",
    "total_write_bytes_rate_across_disks",
    "total_bytes_receive_rate_across_network_interfaces",
    "total_bytes_transmit_rate_across_network_interfaces",
];

pub const HOST_METRICS: &[&str] = &[
    "alerts_rate",
    "cpu_iowait_rate",
    "cpu_irq_rate",
    "cpu_nice_rate",
    "cpu_soft_irq_rate",
    "cpu_steal_rate",
    "cpu_system_rate",
    "cpu_user_rate",
    "events_critical_rate",
    "events_important_rate",
    "health_bad_rate",
    "health_concerning_rate",
    "health_disabled_rate",
    "health_good_rate",
    "health_unknown_rate",
    "load_1",
    "load_5",
    "load_15",
    "num_cores",
    "num_physical_cores",
    "physical_memory_buffers",
    "physical_memory_cached",
    "physical_memory_total",
    "physical_memory_used",
    "swap_out_rate",
    "swap_used",
    "total_bytes_receive_rate_across_network_interfaces",
    "total_bytes_transmit_rate_across_network_interfaces",
    "total_read_bytes_rate_across_disks",
    "total_write_bytes_rate_across_disks",
];

pub const ROLE_METRICS: &[&str] = &[
    "alerts_rate",
    "cpu_system_rate",
    "cpu_user_rate",
    "events_critical_rate",
    "events_important_rate",
    "health_bad_rate",
    "health_concerning_rate",
    "health_disabled_rate",
    "health_good_rate",
    "health_unknown_rate",
    "mem_rss",
    "mem_swap",
    "mem_virtual",
    "oom_exits_rate",
    "read_bytes_rate",
    "unexpected_exits_rate",
    "uptime",
    "write_bytes_rate",
];
