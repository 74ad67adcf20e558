//! Resource - Template resources and the values they carry

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::json;

/// Parameters the control plane always provides to a template
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::NoValue",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackId",
    "AWS::StackName",
    "AWS::URLSuffix",
];

/// Metadata key recording which topology component emitted a resource
pub const COMPONENT_METADATA_KEY: &str = "odin:component";

/// Returns true if `name` is a pseudo parameter such as `AWS::Region`
pub fn is_pseudo_parameter(name: &str) -> bool {
    PSEUDO_PARAMETERS.contains(&name)
}

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// CloudFormation type (e.g., "AWS::EC2::VPC")
    pub resource_type: String,
    /// Logical id inside the template (e.g., "OdinVPC")
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.resource_type)
    }
}

/// Property value of a resource
///
/// Besides plain data, a value can be one of the intrinsic functions the
/// control plane resolves when the template is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// `Ref` to a resource, a template parameter or a pseudo parameter
    Ref(String),
    /// `Fn::GetAtt` (logical id, attribute name)
    GetAtt(String, String),
    /// `Fn::Join` (delimiter, parts)
    Join(String, Vec<Value>),
    /// `Fn::Base64`
    Base64(Box<Value>),
}

impl Value {
    pub fn reference(target: impl Into<String>) -> Self {
        Value::Ref(target.into())
    }

    pub fn get_att(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::GetAtt(target.into(), attribute.into())
    }

    pub fn join(delimiter: impl Into<String>, parts: Vec<Value>) -> Self {
        Value::Join(delimiter.into(), parts)
    }

    pub fn base64(inner: Value) -> Self {
        Value::Base64(Box::new(inner))
    }

    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value from anything convertible to values
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns true for values resolved by the control plane
    pub fn is_intrinsic(&self) -> bool {
        matches!(
            self,
            Value::Ref(_) | Value::GetAtt(_, _) | Value::Join(_, _) | Value::Base64(_)
        )
    }

    /// Returns true for literal values that carry nothing (empty string or list)
    pub fn is_empty_literal(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Logical ids and parameters this value points at, pseudo parameters included
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut BTreeSet<String>) {
        match self {
            Value::Ref(target) | Value::GetAtt(target, _) => {
                out.insert(target.clone());
            }
            Value::List(items) | Value::Join(_, items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Value::Map(map) => {
                for v in map.values() {
                    v.collect_references(out);
                }
            }
            Value::Base64(inner) => inner.collect_references(out),
            Value::String(_) | Value::Int(_) | Value::Bool(_) => {}
        }
    }

    /// Convert to template JSON
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => json!(s),
            Value::Int(n) => json!(n),
            Value::Bool(b) => json!(b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Ref(target) => json!({ "Ref": target }),
            Value::GetAtt(target, attribute) => json!({ "Fn::GetAtt": [target, attribute] }),
            Value::Join(delimiter, parts) => {
                let parts: Vec<_> = parts.iter().map(Value::to_json).collect();
                json!({ "Fn::Join": [delimiter, parts] })
            }
            Value::Base64(inner) => json!({ "Fn::Base64": inner.to_json() }),
        }
    }

    /// Parse template JSON back into a value
    ///
    /// Single-key objects naming a known intrinsic become the intrinsic;
    /// any other object is kept as a plain map.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::String(String::new()),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::String(n.to_string()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => {
                if obj.len() == 1
                    && let Some((key, inner)) = obj.iter().next()
                    && let Some(intrinsic) = Self::intrinsic_from_json(key, inner)
                {
                    return intrinsic;
                }
                Value::Map(
                    obj.iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    fn intrinsic_from_json(key: &str, inner: &serde_json::Value) -> Option<Self> {
        match key {
            "Ref" => inner.as_str().map(Value::reference),
            "Fn::GetAtt" => match inner {
                serde_json::Value::Array(parts) if parts.len() == 2 => {
                    Some(Value::get_att(parts[0].as_str()?, parts[1].as_str()?))
                }
                serde_json::Value::String(s) => {
                    let (target, attribute) = s.split_once('.')?;
                    Some(Value::get_att(target, attribute))
                }
                _ => None,
            },
            "Fn::Join" => {
                let parts = inner.as_array()?;
                if parts.len() != 2 {
                    return None;
                }
                let delimiter = parts[0].as_str()?;
                let items = parts[1].as_array()?;
                Some(Value::join(
                    delimiter,
                    items.iter().map(Value::from_json).collect(),
                ))
            }
            "Fn::Base64" => Some(Value::base64(Value::from_json(inner))),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// What happens to the physical resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
            DeletionPolicy::Snapshot => "Snapshot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Delete" => Some(DeletionPolicy::Delete),
            "Retain" => Some(DeletionPolicy::Retain),
            "Snapshot" => Some(DeletionPolicy::Snapshot),
            _ => None,
        }
    }
}

/// Desired state of one template resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub properties: BTreeMap<String, Value>,
    /// Explicit ordering dependencies (`DependsOn`)
    pub depends_on: BTreeSet<String>,
    pub deletion_policy: Option<DeletionPolicy>,
    pub update_replace_policy: Option<DeletionPolicy>,
    pub metadata: BTreeMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            deletion_policy: None,
            update_replace_policy: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Append a `{Key, Value}` entry to the `Tags` list
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let tag = Value::map([("Key", Value::String(key.into())), ("Value", value.into())]);
        match self.properties.get_mut("Tags") {
            Some(Value::List(tags)) => tags.push(tag),
            _ => {
                self.properties
                    .insert("Tags".to_string(), Value::List(vec![tag]));
            }
        }
        self
    }

    pub fn with_name_tag(self, name: impl Into<String>) -> Self {
        self.with_tag("Name", name.into())
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    /// Set both the deletion and the update-replace policy
    pub fn with_removal_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.metadata.insert(
            COMPONENT_METADATA_KEY.to_string(),
            Value::String(component.into()),
        );
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Value of the tag with the given key, if it is a literal string
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.properties
            .get("Tags")
            .and_then(Value::as_list)?
            .iter()
            .find(|t| t.get("Key").and_then(Value::as_str) == Some(key))
            .and_then(|t| t.get("Value"))
            .and_then(Value::as_str)
    }

    pub fn name_tag(&self) -> Option<&str> {
        self.tag("Name")
    }

    pub fn component(&self) -> Option<&str> {
        self.metadata
            .get(COMPONENT_METADATA_KEY)
            .and_then(Value::as_str)
    }

    /// Everything this resource needs to exist first, explicit or referenced
    pub fn references(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = self
            .properties
            .values()
            .flat_map(|v| v.references())
            .collect();
        out.extend(self.depends_on.iter().cloned());
        out
    }

    /// Convert to the JSON body of a template resource entry
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("Type".to_string(), json!(self.id.resource_type));
        if !self.properties.is_empty() {
            body.insert(
                "Properties".to_string(),
                Value::Map(self.properties.clone()).to_json(),
            );
        }
        if !self.depends_on.is_empty() {
            body.insert(
                "DependsOn".to_string(),
                json!(self.depends_on.iter().collect::<Vec<_>>()),
            );
        }
        if let Some(policy) = self.deletion_policy {
            body.insert("DeletionPolicy".to_string(), json!(policy.as_str()));
        }
        if let Some(policy) = self.update_replace_policy {
            body.insert("UpdateReplacePolicy".to_string(), json!(policy.as_str()));
        }
        if !self.metadata.is_empty() {
            body.insert(
                "Metadata".to_string(),
                Value::Map(self.metadata.clone()).to_json(),
            );
        }
        serde_json::Value::Object(body)
    }
}

/// Current state of a resource as recorded in a deployed template
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    pub properties: BTreeMap<String, Value>,
    pub depends_on: BTreeSet<String>,
    pub deletion_policy: Option<DeletionPolicy>,
    pub update_replace_policy: Option<DeletionPolicy>,
    pub metadata: BTreeMap<String, Value>,
    pub component: Option<String>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            deletion_policy: None,
            update_replace_policy: None,
            metadata: BTreeMap::new(),
            component: None,
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, properties: BTreeMap<String, Value>) -> Self {
        Self {
            id,
            properties,
            depends_on: BTreeSet::new(),
            deletion_policy: None,
            update_replace_policy: None,
            metadata: BTreeMap::new(),
            component: None,
            exists: true,
        }
    }

    /// Snapshot of a resource taken from a deployed template
    pub fn from_resource(resource: &Resource) -> Self {
        Self {
            id: resource.id.clone(),
            properties: resource.properties.clone(),
            depends_on: resource.depends_on.clone(),
            deletion_policy: resource.deletion_policy,
            update_replace_policy: resource.update_replace_policy,
            metadata: resource.metadata.clone(),
            component: resource.component().map(str::to_string),
            exists: true,
        }
    }
}
