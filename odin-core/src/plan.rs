//! Plan - Collection of Effects
//!
//! A Plan is an ordered list of Effects the control plane will carry out.
//! Nothing changes until the template behind it is applied.

use std::collections::BTreeMap;

use crate::effect::Effect;

/// Template section outside `Resources` that a plan can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Description,
    Parameter,
    Output,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Description => write!(f, "Description"),
            Section::Parameter => write!(f, "Parameter"),
            Section::Output => write!(f, "Output"),
        }
    }
}

/// An added, changed or removed parameter, output or description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionChange {
    pub section: Section,
    pub name: String,
    /// `+` added, `~` changed, `-` removed
    pub symbol: char,
}

impl std::fmt::Display for SectionChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{} {}", self.symbol, self.section)
        } else {
            write!(f, "{} {} {}", self.symbol, self.section, self.name)
        }
    }
}

/// Plan containing Effects to be executed
#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
    section_changes: Vec<SectionChange>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn add_section_change(&mut self, change: SectionChange) {
        self.section_changes.push(change);
    }

    pub fn section_changes(&self) -> &[SectionChange] {
        &self.section_changes
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.section_changes.is_empty()
    }

    /// Generate a summary of the Plan for display
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Create(_) => summary.create += 1,
                Effect::Update { .. } => summary.update += 1,
                Effect::Delete(_) => summary.delete += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}

/// Label for effects whose resource carries no component metadata
pub const UNGROUPED: &str = "other";

/// A Plan with its effects grouped by topology component
#[derive(Debug, Clone, Default)]
pub struct ComponentPlan {
    pub plan: Plan,
    /// Component name -> effect indices, in plan order
    pub groups: BTreeMap<String, Vec<usize>>,
}

impl ComponentPlan {
    pub fn from_plan(plan: Plan) -> Self {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, effect) in plan.effects().iter().enumerate() {
            let component = effect.component().unwrap_or(UNGROUPED).to_string();
            groups.entry(component).or_default().push(idx);
        }
        Self { plan, groups }
    }

    /// Component an effect belongs to
    pub fn component_of(&self, effect_idx: usize) -> &str {
        self.groups
            .iter()
            .find(|(_, indices)| indices.contains(&effect_idx))
            .map(|(name, _)| name.as_str())
            .unwrap_or(UNGROUPED)
    }

    /// Display effects grouped by component
    pub fn display_by_component(&self) -> String {
        let mut output = String::new();

        for (component, indices) in &self.groups {
            output.push_str(&format!("{}:\n", component));
            for idx in indices {
                if let Some(effect) = self.plan.effects().get(*idx) {
                    output.push_str(&format!("  {}\n", format_effect_brief(effect)));
                }
            }
            output.push('\n');
        }

        if !self.plan.section_changes().is_empty() {
            output.push_str("template:\n");
            for change in self.plan.section_changes() {
                output.push_str(&format!("  {}\n", change));
            }
            output.push('\n');
        }

        output.push_str(&format!("{}\n", self.plan.summary()));
        output
    }
}

/// Format an effect briefly for display
pub fn format_effect_brief(effect: &Effect) -> String {
    let id = effect.resource_id();
    match effect {
        Effect::Update {
            changed_properties, ..
        } => format!(
            "{} {} [{}]",
            effect.symbol(),
            id,
            changed_properties.join(", ")
        ),
        _ => format!("{} {}", effect.symbol(), id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceId, State};

    #[test]
    fn empty_plan() {
        let plan = Plan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.summary(), PlanSummary::default());
    }

    #[test]
    fn plan_summary() {
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("AWS::EC2::Subnet", "A")));
        plan.add(Effect::Create(Resource::new("AWS::EC2::Subnet", "B")));
        plan.add(Effect::Delete(State::not_found(ResourceId::new(
            "AWS::EC2::Subnet",
            "C",
        ))));

        let summary = plan.summary();
        assert_eq!(summary.create, 2);
        assert_eq!(summary.delete, 1);
        assert_eq!(
            summary.to_string(),
            "Plan: 2 to create, 0 to update, 1 to delete"
        );
    }

    #[test]
    fn component_plan_groups_effects() {
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("AWS::EC2::VPC", "OdinVPC").with_component("network"),
        ));
        plan.add(Effect::Create(
            Resource::new("AWS::EC2::Subnet", "OdinPublicSubnet1").with_component("network"),
        ));
        plan.add(Effect::Create(
            Resource::new("AWS::EC2::Instance", "OdinMongo").with_component("mongo"),
        ));
        plan.add(Effect::Create(Resource::new("AWS::SSM::Thing", "Loose")));

        let grouped = ComponentPlan::from_plan(plan);

        assert_eq!(grouped.groups.get("network"), Some(&vec![0, 1]));
        assert_eq!(grouped.component_of(2), "mongo");
        assert_eq!(grouped.component_of(3), UNGROUPED);

        let text = grouped.display_by_component();
        assert!(text.contains("network:\n  + OdinVPC (AWS::EC2::VPC)\n"));
        assert!(text.ends_with("Plan: 4 to create, 0 to update, 0 to delete\n"));
    }

    #[test]
    fn section_changes_make_a_plan_non_empty() {
        let mut plan = Plan::new();
        plan.add_section_change(SectionChange {
            section: Section::Parameter,
            name: "OdinSecretKeyParameter".to_string(),
            symbol: '~',
        });

        assert!(!plan.is_empty());
        assert_eq!(plan.summary(), PlanSummary::default());

        let text = ComponentPlan::from_plan(plan).display_by_component();
        assert!(text.contains("template:\n  ~ Parameter OdinSecretKeyParameter\n"));
    }
}
