//! IAM policy documents and roles

use odin_core::resource::{Resource, Value};

const POLICY_VERSION: &str = "2012-10-17";

/// `arn:<partition>:iam::aws:policy/<name>`
pub fn managed_policy_arn(name: &str) -> Value {
    Value::join(
        "",
        vec![
            Value::from("arn:"),
            Value::reference("AWS::Partition"),
            Value::from(format!(":iam::aws:policy/{}", name)),
        ],
    )
}

/// `arn:<partition>:s3:::<bucket><suffix>`
pub fn bucket_arn(bucket: &str, suffix: &str) -> Value {
    Value::join(
        "",
        vec![
            Value::from("arn:"),
            Value::reference("AWS::Partition"),
            Value::from(format!(":s3:::{}{}", bucket, suffix)),
        ],
    )
}

pub fn allow(actions: &[&str], resources: Vec<Value>) -> Value {
    Value::map([
        ("Effect", Value::from("Allow")),
        ("Action", Value::list(actions.iter().copied())),
        ("Resource", Value::List(resources)),
    ])
}

pub fn policy_document(statements: Vec<Value>) -> Value {
    Value::map([
        ("Version", Value::from(POLICY_VERSION)),
        ("Statement", Value::List(statements)),
    ])
}

/// Trust policy letting `service` assume the role
pub fn assume_role_policy(service: &str) -> Value {
    policy_document(vec![Value::map([
        ("Effect", Value::from("Allow")),
        ("Action", Value::from("sts:AssumeRole")),
        ("Principal", Value::map([("Service", Value::from(service))])),
    ])])
}

/// Role assumable by `service` with the given managed policies attached
pub fn service_role(logical_id: &str, service: &str, managed_policies: &[&str]) -> Resource {
    let mut role = Resource::new("AWS::IAM::Role", logical_id)
        .with_property("AssumeRolePolicyDocument", assume_role_policy(service));
    if !managed_policies.is_empty() {
        role = role.with_property(
            "ManagedPolicyArns",
            Value::list(managed_policies.iter().map(|name| managed_policy_arn(name))),
        );
    }
    role
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn managed_policy_arn_uses_partition() {
        assert_eq!(
            managed_policy_arn("CloudWatchLogsFullAccess").to_json(),
            json!({"Fn::Join": ["", ["arn:", {"Ref": "AWS::Partition"}, ":iam::aws:policy/CloudWatchLogsFullAccess"]]})
        );
    }

    #[test]
    fn service_role_trusts_the_service() {
        let role = service_role("OdinMongoInstanceRole", "ec2.amazonaws.com", &["CloudWatchLogsFullAccess"]);
        let json = role.to_json();
        assert_eq!(
            json["Properties"]["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "ec2.amazonaws.com"
        );
        assert_eq!(json["Properties"]["ManagedPolicyArns"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn role_without_managed_policies_omits_the_property() {
        let role = service_role("TaskRole", "ecs-tasks.amazonaws.com", &[]);
        assert!(role.property("ManagedPolicyArns").is_none());
    }
}
