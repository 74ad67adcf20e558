//! Read-only access to existing S3 buckets

use odin_core::resource::{Resource, Value};
use odin_core::template::Template;

use crate::error::Result;
use crate::iam;

const READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

/// Attach a policy to `role` allowing reads from exactly `buckets`
///
/// Returns the policy's logical id, or `None` when there is nothing to grant.
pub fn grant_read_buckets(
    template: &mut Template,
    policy_id: &str,
    role: &str,
    component: &str,
    buckets: &[String],
) -> Result<Option<String>> {
    if buckets.is_empty() {
        return Ok(None);
    }

    let resources = buckets
        .iter()
        .flat_map(|bucket| [iam::bucket_arn(bucket, ""), iam::bucket_arn(bucket, "/*")])
        .collect();

    template.add_resource(
        Resource::new("AWS::IAM::Policy", policy_id)
            .with_property("PolicyName", policy_id)
            .with_property(
                "PolicyDocument",
                iam::policy_document(vec![iam::allow(READ_ACTIONS, resources)]),
            )
            .with_property("Roles", Value::list([Value::reference(role)]))
            .with_component(component),
    )?;
    Ok(Some(policy_id.to_string()))
}
