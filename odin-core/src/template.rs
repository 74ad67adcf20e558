//! Template - A synthesized stack ready for the control plane
//!
//! A `Template` owns every resource, parameter and output of one stack.
//! Collections are ordered by logical id, so synthesizing the same topology
//! twice always yields the same JSON.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;
use thiserror::Error;

use crate::graph::DependencyGraph;
use crate::resource::{DeletionPolicy, Resource, ResourceId, Value, is_pseudo_parameter};

/// Template format version understood by the control plane
pub const FORMAT_VERSION: &str = "2010-09-09";

static LOGICAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,255}$").expect("valid logical id pattern"));

/// Errors raised while building, checking or parsing a template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Duplicate logical id '{0}'")]
    DuplicateLogicalId(String),

    #[error("Invalid logical id '{0}': must be 1-255 alphanumeric characters")]
    InvalidLogicalId(String),

    #[error("{from} references unknown logical id '{target}'")]
    UnresolvedReference { from: String, target: String },

    #[error("Dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Invalid template: {0}")]
    Invalid(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Template input parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter type (e.g., "String", "AWS::SSM::Parameter::Value<String>")
    pub parameter_type: String,
    pub default: Option<String>,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(parameter_type: impl Into<String>) -> Self {
        Self {
            parameter_type: parameter_type.into(),
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("Type".to_string(), json!(self.parameter_type));
        if let Some(default) = &self.default {
            body.insert("Default".to_string(), json!(default));
        }
        if let Some(description) = &self.description {
            body.insert("Description".to_string(), json!(description));
        }
        serde_json::Value::Object(body)
    }
}

/// Template output
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Value,
    pub description: Option<String>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("Value".to_string(), self.value.to_json());
        if let Some(description) = &self.description {
            body.insert("Description".to_string(), json!(description));
        }
        serde_json::Value::Object(body)
    }
}

/// A complete stack template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    pub description: Option<String>,
    parameters: BTreeMap<String, Parameter>,
    resources: BTreeMap<String, Resource>,
    outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a resource, rejecting invalid or already used logical ids
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), TemplateError> {
        let name = resource.id.name.clone();
        self.check_new_id(&name)?;
        self.resources.insert(name, resource);
        Ok(())
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        parameter: Parameter,
    ) -> Result<(), TemplateError> {
        let name = name.into();
        self.check_new_id(&name)?;
        self.parameters.insert(name, parameter);
        Ok(())
    }

    pub fn add_output(&mut self, name: impl Into<String>, output: Output) -> Result<(), TemplateError> {
        let name = name.into();
        if !LOGICAL_ID.is_match(&name) {
            return Err(TemplateError::InvalidLogicalId(name));
        }
        if self.outputs.contains_key(&name) {
            return Err(TemplateError::DuplicateLogicalId(name));
        }
        self.outputs.insert(name, output);
        Ok(())
    }

    fn check_new_id(&self, name: &str) -> Result<(), TemplateError> {
        if !LOGICAL_ID.is_match(name) {
            return Err(TemplateError::InvalidLogicalId(name.to_string()));
        }
        if self.resources.contains_key(name) || self.parameters.contains_key(name) {
            return Err(TemplateError::DuplicateLogicalId(name.to_string()));
        }
        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> Vec<&'a Resource> {
        self.resources
            .values()
            .filter(|r| r.id.resource_type == resource_type)
            .collect()
    }

    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources.values().map(|r| r.id.clone()).collect()
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.get(name)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_resources(self.resources.values())
    }

    fn resolves(&self, target: &str) -> bool {
        is_pseudo_parameter(target)
            || self.resources.contains_key(target)
            || self.parameters.contains_key(target)
    }

    /// Check that every reference resolves and resources form a DAG
    pub fn validate(&self) -> Result<(), Vec<TemplateError>> {
        let mut errors = Vec::new();

        for resource in self.resources.values() {
            for target in resource.references() {
                if !self.resolves(&target) {
                    errors.push(TemplateError::UnresolvedReference {
                        from: resource.id.name.clone(),
                        target,
                    });
                }
            }
            for target in &resource.depends_on {
                if !self.resources.contains_key(target) && self.resolves(target) {
                    errors.push(TemplateError::Invalid(format!(
                        "{} lists '{}' in DependsOn, which is not a resource",
                        resource.id.name, target
                    )));
                }
            }
        }

        for (name, output) in &self.outputs {
            for target in output.value.references() {
                if !self.resolves(&target) {
                    errors.push(TemplateError::UnresolvedReference {
                        from: format!("Output {}", name),
                        target,
                    });
                }
            }
        }

        if let Some(cycle) = self.dependency_graph().find_cycle() {
            errors.push(TemplateError::DependencyCycle(cycle));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("AWSTemplateFormatVersion".to_string(), json!(FORMAT_VERSION));
        if let Some(description) = &self.description {
            body.insert("Description".to_string(), json!(description));
        }
        if !self.parameters.is_empty() {
            body.insert(
                "Parameters".to_string(),
                serde_json::Value::Object(
                    self.parameters
                        .iter()
                        .map(|(k, p)| (k.clone(), p.to_json()))
                        .collect(),
                ),
            );
        }
        body.insert(
            "Resources".to_string(),
            serde_json::Value::Object(
                self.resources
                    .iter()
                    .map(|(k, r)| (k.clone(), r.to_json()))
                    .collect(),
            ),
        );
        if !self.outputs.is_empty() {
            body.insert(
                "Outputs".to_string(),
                serde_json::Value::Object(
                    self.outputs
                        .iter()
                        .map(|(k, o)| (k.clone(), o.to_json()))
                        .collect(),
                ),
            );
        }
        serde_json::Value::Object(body)
    }

    /// Pretty-printed JSON, as written by `synth`
    pub fn to_json_string(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(&self.to_json())?)
    }

    /// Compact JSON, as sent to the control plane
    pub fn to_compact_string(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string(&self.to_json())?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, TemplateError> {
        let json: serde_json::Value = serde_json::from_str(s)?;
        Self::from_json(&json)
    }

    /// Parse a template document (for instance one fetched from a deployed stack)
    pub fn from_json(json: &serde_json::Value) -> Result<Self, TemplateError> {
        let root = json
            .as_object()
            .ok_or_else(|| TemplateError::Invalid("template must be a JSON object".to_string()))?;

        let mut template = Template {
            description: root
                .get("Description")
                .and_then(|d| d.as_str())
                .map(str::to_string),
            ..Template::default()
        };

        if let Some(params) = root.get("Parameters").and_then(|p| p.as_object()) {
            for (name, body) in params {
                let parameter_type = body.get("Type").and_then(|t| t.as_str()).ok_or_else(|| {
                    TemplateError::Invalid(format!("parameter {} has no Type", name))
                })?;
                let mut parameter = Parameter::new(parameter_type);
                parameter.default = body
                    .get("Default")
                    .and_then(|d| d.as_str())
                    .map(str::to_string);
                parameter.description = body
                    .get("Description")
                    .and_then(|d| d.as_str())
                    .map(str::to_string);
                template.parameters.insert(name.clone(), parameter);
            }
        }

        let resources = root
            .get("Resources")
            .and_then(|r| r.as_object())
            .ok_or_else(|| TemplateError::Invalid("template has no Resources".to_string()))?;
        for (name, body) in resources {
            template
                .resources
                .insert(name.clone(), resource_from_json(name, body)?);
        }

        if let Some(outputs) = root.get("Outputs").and_then(|o| o.as_object()) {
            for (name, body) in outputs {
                let value = body.get("Value").ok_or_else(|| {
                    TemplateError::Invalid(format!("output {} has no Value", name))
                })?;
                let mut output = Output::new(Value::from_json(value));
                output.description = body
                    .get("Description")
                    .and_then(|d| d.as_str())
                    .map(str::to_string);
                template.outputs.insert(name.clone(), output);
            }
        }

        Ok(template)
    }
}

fn resource_from_json(name: &str, body: &serde_json::Value) -> Result<Resource, TemplateError> {
    let resource_type = body
        .get("Type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| TemplateError::Invalid(format!("resource {} has no Type", name)))?;

    let mut resource = Resource::new(resource_type, name);

    if let Some(Value::Map(properties)) = body.get("Properties").map(Value::from_json) {
        resource.properties = properties;
    }
    if let Some(Value::Map(metadata)) = body.get("Metadata").map(Value::from_json) {
        resource.metadata = metadata;
    }

    match body.get("DependsOn") {
        Some(serde_json::Value::String(dep)) => {
            resource.depends_on.insert(dep.clone());
        }
        Some(serde_json::Value::Array(deps)) => {
            for dep in deps.iter().filter_map(|d| d.as_str()) {
                resource.depends_on.insert(dep.to_string());
            }
        }
        _ => {}
    }

    resource.deletion_policy = body
        .get("DeletionPolicy")
        .and_then(|p| p.as_str())
        .and_then(DeletionPolicy::parse);
    resource.update_replace_policy = body
        .get("UpdateReplacePolicy")
        .and_then(|p| p.as_str())
        .and_then(DeletionPolicy::parse);

    Ok(resource)
}
