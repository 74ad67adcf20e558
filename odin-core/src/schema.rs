//! Schema - Property schemas for template resource types
//!
//! Providers describe the properties each resource type accepts so a
//! synthesized template can be checked before it is handed to the control
//! plane.

use std::collections::BTreeMap;
use std::fmt;

use crate::resource::Value;

/// Property type
#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Int,
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    List(Box<AttributeType>),
    /// Map with free-form keys
    Map(Box<AttributeType>),
    /// Nested object with a fixed set of fields
    Struct {
        name: String,
        fields: Vec<AttributeSchema>,
    },
    /// Anything, checked by the control plane only
    Any,
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        // Intrinsics resolve at apply time; their result type is not known here
        if value.is_intrinsic() {
            return Ok(());
        }

        match (self, value) {
            (AttributeType::Any, _) => Ok(()),
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Struct { fields, .. }, Value::Map(map)) => {
                validate_fields(fields.iter(), map)
                    .map_err(|mut errors| errors.remove(0))
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Struct { name, .. } => name.clone(),
            AttributeType::Any => "Any".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required property '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown property '{name}'")]
    UnknownAttribute { name: String },

    #[error("Property '{name}': {inner}")]
    PropertyError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::Ref(target) => format!("Ref({})", target),
            Value::GetAtt(target, attr) => format!("GetAtt({}.{})", target, attr),
            Value::Join(_, _) => "Join".to_string(),
            Value::Base64(_) => "Base64".to_string(),
        }
    }
}

/// Property schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    /// CloudFormation type (e.g., "AWS::EC2::VPC")
    pub resource_type: String,
    pub attributes: BTreeMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: BTreeMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate resource properties
    ///
    /// Properties the schema does not list are errors; the control plane
    /// rejects them too.
    pub fn validate(&self, properties: &BTreeMap<String, Value>) -> Result<(), Vec<TypeError>> {
        validate_fields(self.attributes.values(), properties)
    }
}

fn validate_fields<'a>(
    fields: impl Iterator<Item = &'a AttributeSchema>,
    values: &BTreeMap<String, Value>,
) -> Result<(), Vec<TypeError>> {
    let fields: BTreeMap<&str, &AttributeSchema> =
        fields.map(|f| (f.name.as_str(), f)).collect();
    let mut errors = Vec::new();

    for (name, schema) in &fields {
        if schema.required && !values.contains_key(*name) {
            errors.push(TypeError::MissingRequired {
                name: name.to_string(),
            });
        }
    }

    for (name, value) in values {
        match fields.get(name.as_str()) {
            Some(schema) => {
                if let Err(e) = schema.attr_type.validate(value) {
                    errors.push(TypeError::PropertyError {
                        name: name.clone(),
                        inner: Box::new(e),
                    });
                }
            }
            None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// Port number type (0-65535)
    pub fn port() -> AttributeType {
        AttributeType::Custom {
            name: "Port".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (0..=65535).contains(n) => Ok(()),
                Value::Int(_) => Err("Port number must be between 0 and 65535".to_string()),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_cidr(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }

    /// `[{Key, Value}]` tag list
    pub fn tags() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::Struct {
            name: "Tag".to_string(),
            fields: vec![
                AttributeSchema::new("Key", AttributeType::String).required(),
                AttributeSchema::new("Value", AttributeType::String).required(),
            ],
        }))
    }

    /// List of strings
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// Loosely typed JSON document (policy documents and similar)
    pub fn document() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::Any))
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    }

    let ip = parts[0];
    let prefix = parts[1];

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn intrinsics_satisfy_scalar_types() {
        assert!(AttributeType::Int.validate(&Value::reference("X")).is_ok());
        assert!(
            types::cidr()
                .validate(&Value::get_att("OdinVPC", "CidrBlock"))
                .is_ok()
        );
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["a".to_string(), "b".to_string()]);
        assert!(t.validate(&Value::String("a".to_string())).is_ok());
        assert!(t.validate(&Value::String("c".to_string())).is_err());
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(-1)).is_err());
    }

    #[test]
    fn validate_port() {
        let t = types::port();
        assert!(t.validate(&Value::Int(27017)).is_ok());
        assert!(t.validate(&Value::Int(70000)).is_err());
        assert!(t.validate(&Value::from("22")).is_err());
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("AWS::Test::Thing")
            .attribute(AttributeSchema::new("Name", AttributeType::String).required())
            .attribute(AttributeSchema::new("Count", types::positive_int()))
            .attribute(AttributeSchema::new("Enabled", AttributeType::Bool));

        let mut props = BTreeMap::new();
        props.insert("Name".to_string(), Value::from("thing"));
        props.insert("Count".to_string(), Value::Int(5));
        props.insert("Enabled".to_string(), Value::Bool(true));

        assert!(schema.validate(&props).is_ok());
    }

    #[test]
    fn missing_required_and_unknown_properties() {
        let schema = ResourceSchema::new("AWS::Test::Thing")
            .attribute(AttributeSchema::new("Name", AttributeType::String).required());

        let mut props = BTreeMap::new();
        props.insert("Color".to_string(), Value::from("red"));
        let errors = schema.validate(&props).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::MissingRequired { name } if name == "Name"))
        );
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::UnknownAttribute { name } if name == "Color"))
        );
    }

    #[test]
    fn tags_require_key_and_value() {
        let t = types::tags();
        let good = Value::list([Value::map([("Key", "Name"), ("Value", "OdinVPC")])]);
        let bad = Value::list([Value::map([("Key", "Name")])]);
        assert!(t.validate(&good).is_ok());
        assert!(t.validate(&bad).is_err());
    }

    #[test]
    fn documents_accept_anything() {
        let doc = Value::map([
            ("Version", Value::from("2012-10-17")),
            ("Statement", Value::list([Value::map([("Effect", "Allow")])])),
        ]);
        assert!(types::document().validate(&doc).is_ok());
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();

        assert!(t.validate(&Value::from("10.0.0.0/16")).is_ok());
        assert!(t.validate(&Value::from("0.0.0.0/0")).is_ok());

        assert!(t.validate(&Value::from("10.0.0.0")).is_err());
        assert!(t.validate(&Value::from("10.0.0.0/33")).is_err());
        assert!(t.validate(&Value::from("10.0.0.256/16")).is_err());
        assert!(t.validate(&Value::Int(42)).is_err());
    }
}
