//! AWS-specific type definitions

use odin_core::resource::Value;
use odin_core::schema::{AttributeSchema, AttributeType};

/// Valid AWS regions
pub const VALID_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "eu-central-1",
    "eu-north-1",
    "eu-south-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
];

/// Retention periods CloudWatch Logs accepts
const RETENTION_DAYS: &[i64] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

pub fn enum_of(variants: &[&str]) -> AttributeType {
    AttributeType::Enum(variants.iter().map(|v| v.to_string()).collect())
}

pub fn struct_of(name: &str, fields: Vec<AttributeSchema>) -> AttributeType {
    AttributeType::Struct {
        name: name.to_string(),
        fields,
    }
}

pub fn list_of(inner: AttributeType) -> AttributeType {
    AttributeType::List(Box::new(inner))
}

pub fn string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

pub fn integer(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Int)
}

pub fn boolean(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Bool)
}

/// Availability zone: a valid region followed by one letter
pub fn availability_zone() -> AttributeType {
    AttributeType::Custom {
        name: "AvailabilityZone".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            let Value::String(s) = value else {
                return Err("Expected string".to_string());
            };
            let valid = s.len() > 1
                && s.ends_with(|c: char| c.is_ascii_lowercase())
                && VALID_REGIONS.contains(&&s[..s.len() - 1]);
            if valid {
                Ok(())
            } else {
                Err(format!("Invalid availability zone '{}'", s))
            }
        },
    }
}

/// EC2 instance type such as `t3.large`
pub fn instance_type() -> AttributeType {
    AttributeType::Custom {
        name: "InstanceType".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s)
                if s.split_once('.').is_some_and(|(family, size)| {
                    !family.is_empty()
                        && !size.is_empty()
                        && family.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                }) =>
            {
                Ok(())
            }
            Value::String(s) => Err(format!("Invalid instance type '{}'", s)),
            _ => Err("Expected string".to_string()),
        },
    }
}

pub fn retention_days() -> AttributeType {
    AttributeType::Custom {
        name: "RetentionInDays".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(n) if RETENTION_DAYS.contains(n) => Ok(()),
            Value::Int(n) => Err(format!("{} is not a supported retention period", n)),
            _ => Err("Expected integer".to_string()),
        },
    }
}

/// Security group rule, ingress or egress
pub fn security_group_rule(name: &str) -> AttributeType {
    struct_of(
        name,
        vec![
            string("IpProtocol").required(),
            AttributeSchema::new("FromPort", odin_core::schema::types::port()),
            AttributeSchema::new("ToPort", odin_core::schema::types::port()),
            AttributeSchema::new("CidrIp", odin_core::schema::types::cidr()),
            string("SourceSecurityGroupId"),
            string("DestinationSecurityGroupId"),
            string("Description"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_zones() {
        let az = availability_zone();
        assert!(az.validate(&Value::from("eu-north-1a")).is_ok());
        assert!(az.validate(&Value::from("eu-north-1")).is_err());
        assert!(az.validate(&Value::from("mars-1a")).is_err());
    }

    #[test]
    fn instance_types() {
        let t = instance_type();
        assert!(t.validate(&Value::from("t3.large")).is_ok());
        assert!(t.validate(&Value::from("large")).is_err());
    }

    #[test]
    fn retention() {
        let r = retention_days();
        assert!(r.validate(&Value::Int(180)).is_ok());
        assert!(r.validate(&Value::Int(181)).is_err());
    }
}
