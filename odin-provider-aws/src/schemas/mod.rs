//! AWS resource schema definitions

pub mod autoscaling;
pub mod cloudfront;
pub mod ec2;
pub mod ecs;
pub mod elb;
pub mod iam;
pub mod logs;
pub mod route53;
pub mod types;

use odin_core::schema::ResourceSchema;

/// Returns all AWS schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(autoscaling::schemas());
    schemas.extend(cloudfront::schemas());
    schemas.extend(ec2::schemas());
    schemas.extend(ecs::schemas());
    schemas.extend(elb::schemas());
    schemas.extend(iam::schemas());
    schemas.extend(logs::schemas());
    schemas.extend(route53::schemas());
    schemas
}
