//! Interpreter - Apply a template through a Provider
//!
//! Computing the plan is side-effect free; `apply` and `destroy` are where
//! the control plane is actually called.

use log::info;

use crate::differ::create_plan;
use crate::plan::Plan;
use crate::provider::{DeployOutcome, Provider, ProviderResult};
use crate::template::Template;

/// Result of an apply or destroy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Template handed to the control plane
    Deployed(DeployOutcome),
    /// Stack deleted
    Destroyed,
    /// Nothing was sent
    Skipped { reason: String },
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
}

/// Interpreter that applies templates using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Plan the changes between the deployed stack and `desired`
    pub async fn plan(&self, stack_name: &str, desired: &Template) -> ProviderResult<Plan> {
        let current = self.provider.current_template(stack_name).await?;
        Ok(create_plan(desired, current.as_ref()))
    }

    /// Deploy `desired`
    ///
    /// An empty plan is still sent: parameter values resolved at deploy time
    /// (such as SSM secrets) can change without the template changing, and
    /// the provider reports `Unchanged` when nothing moved.
    pub async fn apply(
        &self,
        stack_name: &str,
        desired: &Template,
        plan: &Plan,
    ) -> ProviderResult<ApplyOutcome> {
        if self.config.dry_run {
            return Ok(ApplyOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        info!(
            "Deploying {} through {} ({})",
            stack_name,
            self.provider.name(),
            plan.summary()
        );
        let outcome = self.provider.deploy(stack_name, desired).await?;
        Ok(ApplyOutcome::Deployed(outcome))
    }

    /// Delete the stack if it exists
    pub async fn destroy(&self, stack_name: &str) -> ProviderResult<ApplyOutcome> {
        if self.provider.current_template(stack_name).await?.is_none() {
            return Ok(ApplyOutcome::Skipped {
                reason: format!("stack {} does not exist", stack_name),
            });
        }
        if self.config.dry_run {
            return Ok(ApplyOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        info!("Destroying {} through {}", stack_name, self.provider.name());
        self.provider.destroy(stack_name).await?;
        Ok(ApplyOutcome::Destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::MockProvider;
    use crate::resource::Resource;
    use crate::template::Parameter;

    fn template(retention: i64) -> Template {
        let mut template = Template::new();
        template
            .add_resource(
                Resource::new("AWS::Logs::LogGroup", "OdinMongoLogGroup")
                    .with_property("RetentionInDays", retention),
            )
            .unwrap();
        template
    }

    #[tokio::test]
    async fn apply_creates_then_redeploys_unchanged() {
        let interpreter = Interpreter::new(MockProvider::default());

        let plan = interpreter.plan("Odin", &template(180)).await.unwrap();
        assert_eq!(plan.summary().create, 1);
        let outcome = interpreter.apply("Odin", &template(180), &plan).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Deployed(DeployOutcome::Created));

        let plan = interpreter.plan("Odin", &template(180)).await.unwrap();
        assert!(plan.is_empty());
        let outcome = interpreter.apply("Odin", &template(180), &plan).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Deployed(DeployOutcome::Unchanged));
    }

    #[tokio::test]
    async fn apply_deploys_parameter_only_change() {
        let interpreter = Interpreter::new(MockProvider::default());
        let mut before = template(180);
        before
            .add_parameter(
                "OdinSecretKeyParameter",
                Parameter::new("AWS::SSM::Parameter::Value<String>").with_default("/odin/secret_key"),
            )
            .unwrap();
        let plan = interpreter.plan("Odin", &before).await.unwrap();
        interpreter.apply("Odin", &before, &plan).await.unwrap();

        let mut after = template(180);
        after
            .add_parameter(
                "OdinSecretKeyParameter",
                Parameter::new("AWS::SSM::Parameter::Value<String>").with_default("/odin/secret_key_v2"),
            )
            .unwrap();
        let plan = interpreter.plan("Odin", &after).await.unwrap();
        assert!(plan.effects().is_empty());
        assert_eq!(plan.section_changes().len(), 1);

        let outcome = interpreter.apply("Odin", &after, &plan).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Deployed(DeployOutcome::Updated));
        assert_eq!(
            interpreter.provider().stacks.lock().unwrap().get("Odin"),
            Some(&after)
        );
    }

    #[tokio::test]
    async fn apply_updates_changed_template() {
        let interpreter = Interpreter::new(MockProvider::default());
        let plan = interpreter.plan("Odin", &template(30)).await.unwrap();
        interpreter.apply("Odin", &template(30), &plan).await.unwrap();

        let plan = interpreter.plan("Odin", &template(180)).await.unwrap();
        assert_eq!(plan.summary().update, 1);
        let outcome = interpreter.apply("Odin", &template(180), &plan).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Deployed(DeployOutcome::Updated));
    }

    #[tokio::test]
    async fn dry_run_sends_nothing() {
        let interpreter = Interpreter::new(MockProvider::default())
            .with_config(InterpreterConfig { dry_run: true });
        let plan = interpreter.plan("Odin", &template(180)).await.unwrap();
        let outcome = interpreter.apply("Odin", &template(180), &plan).await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Skipped { .. }));
        assert!(interpreter.provider().stacks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn destroy_missing_stack_is_skipped() {
        let interpreter = Interpreter::new(MockProvider::default());
        let outcome = interpreter.destroy("Odin").await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn destroy_existing_stack() {
        let interpreter = Interpreter::new(MockProvider::default());
        let plan = interpreter.plan("Odin", &template(180)).await.unwrap();
        interpreter.apply("Odin", &template(180), &plan).await.unwrap();

        let outcome = interpreter.destroy("Odin").await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Destroyed);
    }
}
