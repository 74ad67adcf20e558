//! Log groups

use odin_core::resource::{DeletionPolicy, Resource};

/// Six months
pub const RETENTION_DAYS: i64 = 180;

/// Log group destroyed together with the stack
pub fn log_group(logical_id: &str, name: &str) -> Resource {
    Resource::new("AWS::Logs::LogGroup", logical_id)
        .with_property("LogGroupName", name)
        .with_property("RetentionInDays", RETENTION_DAYS)
        .with_removal_policy(DeletionPolicy::Delete)
}
