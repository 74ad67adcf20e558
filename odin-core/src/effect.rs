//! Effect - A single change the control plane will make to a stack

use crate::resource::{Resource, ResourceId, State};

/// One resource-level change between two templates
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Resource is new
    Create(Resource),
    /// Resource exists with different properties
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_properties: Vec<String>,
    },
    /// Resource is no longer part of the topology
    Delete(State),
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } => id,
            Effect::Delete(state) => &state.id,
        }
    }

    /// Topology component the affected resource belongs to
    pub fn component(&self) -> Option<&str> {
        match self {
            Effect::Create(r) => r.component(),
            Effect::Update { to, .. } => to.component(),
            Effect::Delete(state) => state.component.as_deref(),
        }
    }

    /// Plan symbol: `+` create, `~` update, `-` delete
    pub fn symbol(&self) -> char {
        match self {
            Effect::Create(_) => '+',
            Effect::Update { .. } => '~',
            Effect::Delete(_) => '-',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_accessors() {
        let create = Effect::Create(
            Resource::new("AWS::EC2::VPC", "OdinVPC").with_component("network"),
        );
        assert_eq!(create.symbol(), '+');
        assert_eq!(create.resource_id().name, "OdinVPC");
        assert_eq!(create.component(), Some("network"));

        let delete = Effect::Delete(State::not_found(ResourceId::new(
            "AWS::EC2::VPC",
            "Old",
        )));
        assert_eq!(delete.symbol(), '-');
        assert_eq!(delete.component(), None);
    }
}
