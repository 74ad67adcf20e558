//! Differ - Compare a desired template with the current one to generate a Plan
//!
//! The current template comes from a previous `synth` output or from the
//! deployed stack. Comparing a template with itself always yields an empty
//! plan.

use std::collections::{BTreeMap, BTreeSet};

use crate::effect::Effect;
use crate::plan::{Plan, Section, SectionChange};
use crate::resource::{Resource, ResourceId, State};
use crate::template::Template;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_properties: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_properties(desired, current);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_properties: changed,
        }
    }
}

/// Properties that differ, including ones only present on one side
fn find_changed_properties(desired: &Resource, current: &State) -> Vec<String> {
    let keys: BTreeSet<&String> = desired
        .properties
        .keys()
        .chain(current.properties.keys())
        .collect();

    let mut changed: Vec<String> = keys
        .into_iter()
        .filter(|key| desired.properties.get(*key) != current.properties.get(*key))
        .cloned()
        .collect();

    if desired.depends_on != current.depends_on {
        changed.push("DependsOn".to_string());
    }
    if desired.deletion_policy != current.deletion_policy {
        changed.push("DeletionPolicy".to_string());
    }
    if desired.update_replace_policy != current.update_replace_policy {
        changed.push("UpdateReplacePolicy".to_string());
    }
    if desired.metadata != current.metadata {
        changed.push("Metadata".to_string());
    }

    changed
}

/// Added, changed and removed entries of one named template section
fn diff_section<T: PartialEq>(
    section: Section,
    desired: &BTreeMap<String, T>,
    current: &BTreeMap<String, T>,
) -> Vec<SectionChange> {
    let names: BTreeSet<&String> = desired.keys().chain(current.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| {
            let symbol = match (desired.get(name), current.get(name)) {
                (Some(_), None) => '+',
                (None, Some(_)) => '-',
                (Some(d), Some(c)) if d != c => '~',
                _ => return None,
            };
            Some(SectionChange {
                section,
                name: name.clone(),
                symbol,
            })
        })
        .collect()
}

/// Changes outside `Resources`; with no current template there is nothing to compare
fn section_changes(desired: &Template, current: Option<&Template>) -> Vec<SectionChange> {
    let Some(current) = current else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    if desired.description != current.description {
        changes.push(SectionChange {
            section: Section::Description,
            name: String::new(),
            symbol: '~',
        });
    }
    changes.extend(diff_section(
        Section::Parameter,
        desired.parameters(),
        current.parameters(),
    ));
    changes.extend(diff_section(
        Section::Output,
        desired.outputs(),
        current.outputs(),
    ));
    changes
}

/// Compute the Plan that turns `current` into `desired`
///
/// Creates and updates follow the desired template's dependency order;
/// deletes come last. A resource whose type changed is deleted and
/// created again.
pub fn create_plan(desired: &Template, current: Option<&Template>) -> Plan {
    let mut plan = Plan::new();

    let order = desired
        .dependency_graph()
        .topological_order()
        .unwrap_or_else(|_| desired.resources().map(|r| r.id.name.clone()).collect());

    let mut replaced = Vec::new();

    for name in &order {
        let Some(resource) = desired.resource(name) else {
            continue;
        };

        let current_state = match current.and_then(|t| t.resource(name)) {
            Some(existing) if existing.id.resource_type == resource.id.resource_type => {
                State::from_resource(existing)
            }
            Some(existing) => {
                replaced.push(State::from_resource(existing));
                State::not_found(resource.id.clone())
            }
            None => State::not_found(resource.id.clone()),
        };

        match diff(resource, &current_state) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_properties,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_properties,
            }),
            Diff::NoChange(_) => {}
        }
    }

    for state in replaced {
        plan.add(Effect::Delete(state));
    }

    if let Some(current) = current {
        for existing in current.resources() {
            if desired.resource(&existing.id.name).is_none() {
                plan.add(Effect::Delete(State::from_resource(existing)));
            }
        }
    }

    for change in section_changes(desired, current) {
        plan.add_section_change(change);
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DeletionPolicy, Value};
    use crate::template::{Output, Parameter};

    fn log_group(name: &str, retention: i64) -> Resource {
        Resource::new("AWS::Logs::LogGroup", name)
            .with_property("LogGroupName", format!("/Odin/{}", name))
            .with_property("RetentionInDays", retention)
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = log_group("Mongo", 180);
        let current = State::not_found(desired.id.clone());

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = log_group("Mongo", 180);
        let current = State::from_resource(&desired);

        let result = diff(&desired, &current);
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_reports_changed_and_removed_properties() {
        let desired = log_group("Mongo", 180);
        let mut previous = log_group("Mongo", 30);
        previous
            .properties
            .insert("KmsKeyId".to_string(), Value::from("key"));
        let current = State::from_resource(&previous);

        match diff(&desired, &current) {
            Diff::Update {
                changed_properties, ..
            } => {
                assert_eq!(
                    changed_properties,
                    vec!["KmsKeyId".to_string(), "RetentionInDays".to_string()]
                );
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_notices_policy_changes() {
        let desired = log_group("Mongo", 180).with_removal_policy(DeletionPolicy::Delete);
        let current = State::from_resource(&log_group("Mongo", 180));

        match diff(&desired, &current) {
            Diff::Update {
                changed_properties, ..
            } => assert_eq!(changed_properties, vec!["DeletionPolicy".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn plan_against_nothing_creates_everything_in_dependency_order() {
        let mut desired = Template::new();
        desired
            .add_resource(
                Resource::new("AWS::EC2::VolumeAttachment", "Attach")
                    .with_property("InstanceId", Value::reference("Instance")),
            )
            .unwrap();
        desired
            .add_resource(Resource::new("AWS::EC2::Instance", "Instance"))
            .unwrap();

        let plan = create_plan(&desired, None);
        let names: Vec<_> = plan
            .effects()
            .iter()
            .map(|e| e.resource_id().name.clone())
            .collect();
        assert_eq!(names, vec!["Instance".to_string(), "Attach".to_string()]);
        assert_eq!(plan.summary().create, 2);
    }

    #[test]
    fn plan_against_itself_is_empty() {
        let mut template = Template::new();
        template.add_resource(log_group("Mongo", 180)).unwrap();
        template.add_resource(log_group("Admin", 180)).unwrap();

        let plan = create_plan(&template, Some(&template));
        assert!(plan.is_empty());
    }

    #[test]
    fn plan_updates_deletes_and_replaces() {
        let mut current = Template::new();
        current.add_resource(log_group("Mongo", 30)).unwrap();
        current.add_resource(log_group("Legacy", 30)).unwrap();
        current
            .add_resource(Resource::new("AWS::EC2::Volume", "Admin"))
            .unwrap();

        let mut desired = Template::new();
        desired.add_resource(log_group("Mongo", 180)).unwrap();
        desired.add_resource(log_group("Admin", 180)).unwrap();

        let plan = create_plan(&desired, Some(&current));
        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.update, 1);
        assert_eq!(summary.delete, 2);
        assert!(matches!(plan.effects().last(), Some(Effect::Delete(_))));
    }

    #[test]
    fn diff_notices_replace_policy_and_metadata() {
        let mut desired = log_group("Mongo", 180).with_component("mongo");
        desired.update_replace_policy = Some(DeletionPolicy::Retain);
        let current = State::from_resource(&log_group("Mongo", 180));

        match diff(&desired, &current) {
            Diff::Update {
                changed_properties, ..
            } => assert_eq!(
                changed_properties,
                vec!["UpdateReplacePolicy".to_string(), "Metadata".to_string()]
            ),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    fn parameterized(default: &str, output: &str) -> Template {
        let mut template = Template::new();
        template.add_resource(log_group("Mongo", 180)).unwrap();
        template
            .add_parameter(
                "OdinSecretKeyParameter",
                Parameter::new("AWS::SSM::Parameter::Value<String>").with_default(default),
            )
            .unwrap();
        template
            .add_output("OdinServiceUrl", Output::new(Value::from(output)))
            .unwrap();
        template
    }

    #[test]
    fn plan_reports_parameter_and_output_changes() {
        let current = parameterized("/odin/secret_key", "https://odin.example.com/rest_api/");
        let desired = parameterized("/odin/secret_key_v2", "https://api.example.com/rest_api/");

        let plan = create_plan(&desired, Some(&current));
        assert!(!plan.is_empty());
        assert!(plan.effects().is_empty());

        let changes: Vec<String> = plan.section_changes().iter().map(ToString::to_string).collect();
        assert_eq!(
            changes,
            vec![
                "~ Parameter OdinSecretKeyParameter".to_string(),
                "~ Output OdinServiceUrl".to_string(),
            ]
        );
    }

    #[test]
    fn plan_reports_added_and_removed_outputs() {
        let current = parameterized("/odin/secret_key", "a");
        let mut desired = parameterized("/odin/secret_key", "a");
        desired
            .add_output("OdinVpcId", Output::new(Value::reference("Mongo")))
            .unwrap();

        let plan = create_plan(&desired, Some(&current));
        assert_eq!(plan.section_changes()[0].symbol, '+');

        let plan = create_plan(&current, Some(&desired));
        assert_eq!(plan.section_changes()[0].symbol, '-');
        assert_eq!(plan.section_changes()[0].name, "OdinVpcId");
    }
}
