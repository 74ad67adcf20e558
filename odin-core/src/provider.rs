//! Provider - Trait abstracting the control plane a template is applied to
//!
//! A Provider knows how to read the template of a deployed stack and how to
//! hand a new template to the control plane. Everything else (resource
//! ordering, rollback, secret resolution) happens on the provider side.

use std::future::Future;
use std::pin::Pin;

use crate::template::Template;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub stack_name: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref stack) = self.stack_name {
            write!(f, "[{}] {}", stack, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_name: None,
            cause: None,
        }
    }

    pub fn for_stack(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = Some(stack_name.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a deploy did to the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Created,
    Updated,
    /// The control plane found nothing to change
    Unchanged,
}

impl std::fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployOutcome::Created => write!(f, "created"),
            DeployOutcome::Updated => write!(f, "updated"),
            DeployOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Main Provider trait
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "cloudformation")
    fn name(&self) -> &'static str;

    /// Template the stack was last deployed with
    ///
    /// Returns `None` if the stack does not exist.
    fn current_template(&self, stack_name: &str) -> BoxFuture<'_, ProviderResult<Option<Template>>>;

    /// Create or update the stack and wait until the control plane settles
    fn deploy(
        &self,
        stack_name: &str,
        template: &Template,
    ) -> BoxFuture<'_, ProviderResult<DeployOutcome>>;

    /// Delete the stack and wait until it is gone
    fn destroy(&self, stack_name: &str) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn current_template(&self, stack_name: &str) -> BoxFuture<'_, ProviderResult<Option<Template>>> {
        (**self).current_template(stack_name)
    }

    fn deploy(
        &self,
        stack_name: &str,
        template: &Template,
    ) -> BoxFuture<'_, ProviderResult<DeployOutcome>> {
        (**self).deploy(stack_name, template)
    }

    fn destroy(&self, stack_name: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).destroy(stack_name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::resource::Resource;

    /// In-memory provider keeping one template per stack
    #[derive(Default)]
    pub(crate) struct MockProvider {
        pub(crate) stacks: Mutex<HashMap<String, Template>>,
    }

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn current_template(
            &self,
            stack_name: &str,
        ) -> BoxFuture<'_, ProviderResult<Option<Template>>> {
            let current = self
                .stacks
                .lock()
                .map(|stacks| stacks.get(stack_name).cloned())
                .map_err(|_| ProviderError::new("mock poisoned"));
            Box::pin(async move { current })
        }

        fn deploy(
            &self,
            stack_name: &str,
            template: &Template,
        ) -> BoxFuture<'_, ProviderResult<DeployOutcome>> {
            let stack_name = stack_name.to_string();
            let template = template.clone();
            Box::pin(async move {
                let mut stacks = self
                    .stacks
                    .lock()
                    .map_err(|_| ProviderError::new("mock poisoned"))?;
                let outcome = match stacks.get(&stack_name) {
                    None => DeployOutcome::Created,
                    Some(existing) if *existing == template => DeployOutcome::Unchanged,
                    Some(_) => DeployOutcome::Updated,
                };
                stacks.insert(stack_name, template);
                Ok(outcome)
            })
        }

        fn destroy(&self, stack_name: &str) -> BoxFuture<'_, ProviderResult<()>> {
            let stack_name = stack_name.to_string();
            Box::pin(async move {
                let mut stacks = self
                    .stacks
                    .lock()
                    .map_err(|_| ProviderError::new("mock poisoned"))?;
                stacks
                    .remove(&stack_name)
                    .map(|_| ())
                    .ok_or_else(|| ProviderError::new("stack does not exist").for_stack(stack_name))
            })
        }
    }

    fn template() -> Template {
        let mut template = Template::new();
        template
            .add_resource(Resource::new("AWS::EC2::VPC", "OdinVPC"))
            .unwrap();
        template
    }

    #[tokio::test]
    async fn mock_provider_reports_missing_stack() {
        let provider = MockProvider::default();
        let current = provider.current_template("OdinAPIStack").await.unwrap();
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn mock_provider_deploy_then_redeploy() {
        let provider: Box<dyn Provider> = Box::new(MockProvider::default());
        let outcome = provider.deploy("OdinAPIStack", &template()).await.unwrap();
        assert_eq!(outcome, DeployOutcome::Created);

        let outcome = provider.deploy("OdinAPIStack", &template()).await.unwrap();
        assert_eq!(outcome, DeployOutcome::Unchanged);
    }

    #[test]
    fn error_display_includes_stack() {
        let err = ProviderError::new("Stack is in UPDATE_ROLLBACK_COMPLETE").for_stack("OdinAPIStack");
        assert_eq!(
            err.to_string(),
            "[OdinAPIStack] Stack is in UPDATE_ROLLBACK_COMPLETE"
        );
    }
}
