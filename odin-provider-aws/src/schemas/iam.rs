//! IAM resource schema definitions

use odin_core::schema::{AttributeSchema, ResourceSchema, types};

use super::types::string;

pub fn role() -> ResourceSchema {
    ResourceSchema::new("AWS::IAM::Role")
        .attribute(AttributeSchema::new("AssumeRolePolicyDocument", types::document()).required())
        .attribute(AttributeSchema::new("ManagedPolicyArns", types::string_list()))
        .attribute(string("RoleName"))
        .attribute(string("Path"))
        .attribute(AttributeSchema::new("Tags", types::tags()))
}

pub fn instance_profile() -> ResourceSchema {
    ResourceSchema::new("AWS::IAM::InstanceProfile")
        .attribute(AttributeSchema::new("Roles", types::string_list()).required())
        .attribute(string("InstanceProfileName"))
        .attribute(string("Path"))
}

pub fn policy() -> ResourceSchema {
    ResourceSchema::new("AWS::IAM::Policy")
        .with_description("Inline policy attached to roles")
        .attribute(string("PolicyName").required())
        .attribute(AttributeSchema::new("PolicyDocument", types::document()).required())
        .attribute(AttributeSchema::new("Roles", types::string_list()))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![role(), instance_profile(), policy()]
}
