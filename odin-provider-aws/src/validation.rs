//! Validation of synthesized templates against the AWS resource schemas
//!
//! Every resource must have a known type and only the properties its schema
//! lists. Intrinsic values are accepted wherever a literal would be.

use std::collections::BTreeMap;

use odin_core::schema::ResourceSchema;
use odin_core::template::Template;

use crate::schemas::all_schemas;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Logical id of the offending resource
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Schemas indexed by resource type
pub struct SchemaRegistry {
    schemas: BTreeMap<String, ResourceSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(all_schemas())
    }
}

impl SchemaRegistry {
    pub fn new(schemas: Vec<ResourceSchema>) -> Self {
        Self {
            schemas: schemas
                .into_iter()
                .map(|s| (s.resource_type.clone(), s))
                .collect(),
        }
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.schemas.get(resource_type)
    }

    pub fn validate(&self, template: &Template) -> ValidationResult {
        let mut errors = Vec::new();

        for resource in template.resources() {
            let Some(schema) = self.get(&resource.id.resource_type) else {
                errors.push(ValidationError {
                    path: resource.id.name.clone(),
                    message: format!("Unknown resource type '{}'", resource.id.resource_type),
                });
                continue;
            };
            if let Err(found) = schema.validate(&resource.properties) {
                errors.extend(found.into_iter().map(|e| ValidationError {
                    path: resource.id.name.clone(),
                    message: e.to_string(),
                }));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validate `template` against every known AWS schema
pub fn validate_template(template: &Template) -> ValidationResult {
    SchemaRegistry::default().validate(template)
}

#[cfg(test)]
mod tests {
    use odin_core::resource::{Resource, Value};
    use odin_stack::{OdinConfig, synthesize};

    use super::*;

    const CONFIG: &str = r#"
account: "123456789012"
region: eu-north-1
key_pair: odin-key
hosted_zone_id: Z0123456789ABCDEFGHIJ
certificate_arn: arn:aws:acm:eu-north-1:123456789012:certificate/abcd
network:
  nat_eip_allocation_id: eipalloc-0123456789abcdef0
mongo:
  data_volume_id: vol-0123456789abcdef0
  availability_zone: eu-north-1a
edge:
  ui_bucket: odin-ui
"#;

    #[test]
    fn synthesized_stack_matches_schemas() {
        let config = OdinConfig::from_yaml_str(CONFIG).unwrap();
        let template = synthesize(&config).unwrap();
        if let Err(errors) = validate_template(&template) {
            let lines: Vec<_> = errors.iter().map(ToString::to_string).collect();
            panic!("schema errors:\n{}", lines.join("\n"));
        }
    }

    #[test]
    fn unknown_types_and_properties_are_reported() {
        let mut template = Template::new();
        template
            .add_resource(Resource::new("AWS::SQS::Queue", "Queue"))
            .unwrap();
        template
            .add_resource(
                Resource::new("AWS::EC2::VPC", "Vpc")
                    .with_property("CidrBlock", "10.0.0.0/16")
                    .with_property("CidrBlok", "10.0.0.0/16"),
            )
            .unwrap();

        let errors = validate_template(&template).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.path == "Queue" && e.message.contains("AWS::SQS::Queue")));
        assert!(errors.iter().any(|e| e.path == "Vpc" && e.message.contains("CidrBlok")));
    }

    #[test]
    fn intrinsics_satisfy_typed_properties() {
        let mut template = Template::new();
        template
            .add_resource(
                Resource::new("AWS::EC2::Subnet", "Subnet")
                    .with_property("VpcId", Value::reference("Vpc"))
                    .with_property("CidrBlock", Value::get_att("Vpc", "CidrBlock")),
            )
            .unwrap();
        assert!(validate_template(&template).is_ok());
    }
}
