//! Odin AWS Provider
//!
//! CloudFormation provider for the Odin topology.
//!
//! ## Module Structure
//!
//! - `provider` - CloudFormationProvider implementation
//! - `schemas` - Property schemas for every resource type the topology emits
//! - `validation` - Template validation against those schemas
//! - `utils` - Stack status and template upload helpers

pub mod provider;
pub mod schemas;
pub mod utils;
pub mod validation;

// Re-export main types
pub use provider::{CloudFormationProvider, TemplateSource};
pub use validation::{ValidationError, validate_template};

use odin_core::provider::{BoxFuture, DeployOutcome, Provider, ProviderResult};
use odin_core::template::Template;

impl Provider for CloudFormationProvider {
    fn name(&self) -> &'static str {
        "cloudformation"
    }

    fn current_template(&self, stack_name: &str) -> BoxFuture<'_, ProviderResult<Option<Template>>> {
        let stack_name = stack_name.to_string();
        Box::pin(async move { self.get_template(&stack_name).await })
    }

    fn deploy(
        &self,
        stack_name: &str,
        template: &Template,
    ) -> BoxFuture<'_, ProviderResult<DeployOutcome>> {
        let stack_name = stack_name.to_string();
        let template = template.clone();
        Box::pin(async move { self.deploy_stack(&stack_name, &template).await })
    }

    fn destroy(&self, stack_name: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let stack_name = stack_name.to_string();
        Box::pin(async move { self.delete_stack(&stack_name).await })
    }
}
