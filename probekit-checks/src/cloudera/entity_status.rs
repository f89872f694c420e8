use probekit_base::ServiceCheckStatus;

/// Map a Cloudera Manager `entityStatus` to a service check status
pub fn entity_status(status: Option<&str>) -> ServiceCheckStatus {
    match status {
        Some("GOOD_HEALTH") | Some("STARTING") | Some("STARTED") => ServiceCheckStatus::Ok,
        Some("CONCERNING_HEALTH") => ServiceCheckStatus::Warning,
        Some("BAD_HEALTH") | Some("STOPPED") | Some("DOWN") | Some("STOPPING") => ServiceCheckStatus::Critical,
        // UNKNOWN, NONE, UNKNOWN_HEALTH, DISABLED_HEALTH, HISTORY_NOT_AVAILABLE
        _ => ServiceCheckStatus::Unknown,
    }
}
