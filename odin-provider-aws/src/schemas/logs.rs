//! CloudWatch Logs resource schema definitions

use odin_core::schema::{AttributeSchema, ResourceSchema};

use super::types::{retention_days, string};

pub fn log_group() -> ResourceSchema {
    ResourceSchema::new("AWS::Logs::LogGroup")
        .attribute(string("LogGroupName"))
        .attribute(AttributeSchema::new("RetentionInDays", retention_days()))
        .attribute(string("KmsKeyId"))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![log_group()]
}
