//! CloudFormation Provider implementation
//!
//! This module contains the provider that hands synthesized templates to
//! the CloudFormation control plane and waits for the stack to settle.

use std::time::Duration;

use aws_config::Region;
use aws_sdk_cloudformation::Client as CloudFormationClient;
use aws_sdk_cloudformation::types::{Capability, TemplateStage};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use log::{debug, info};
use odin_core::provider::{DeployOutcome, ProviderError, ProviderResult};
use odin_core::template::Template;

use crate::utils::{
    StackState, classify_status, is_missing_stack_error, is_no_updates_error, needs_recreate,
    needs_upload, template_key, template_url,
};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLL_ATTEMPTS: usize = 720;
/// Failed resource events reported with a failed stack
const MAX_FAILURE_EVENTS: usize = 5;

/// How the template reaches CloudFormation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Body(String),
    /// Uploaded to S3 first, for templates over the inline limit
    Url(String),
}

/// AWS CloudFormation Provider
pub struct CloudFormationProvider {
    cloudformation_client: CloudFormationClient,
    s3_client: S3Client,
    region: String,
    template_bucket: Option<String>,
}

impl CloudFormationProvider {
    /// Create a new provider for the specified region
    pub async fn new(region: &str, template_bucket: Option<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            cloudformation_client: CloudFormationClient::new(&config),
            s3_client: S3Client::new(&config),
            region: region.to_string(),
            template_bucket,
        }
    }

    /// Create with specific clients (for testing)
    pub fn with_clients(
        cloudformation_client: CloudFormationClient,
        s3_client: S3Client,
        region: String,
        template_bucket: Option<String>,
    ) -> Self {
        Self {
            cloudformation_client,
            s3_client,
            region,
            template_bucket,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Template the stack was created or last updated with
    pub async fn get_template(&self, stack_name: &str) -> ProviderResult<Option<Template>> {
        let result = self
            .cloudformation_client
            .get_template()
            .stack_name(stack_name)
            .template_stage(TemplateStage::Original)
            .send()
            .await;

        match result {
            Ok(response) => {
                let Some(body) = response.template_body() else {
                    return Ok(None);
                };
                Template::from_json_str(body).map(Some).map_err(|e| {
                    ProviderError::new("Deployed template cannot be parsed")
                        .for_stack(stack_name)
                        .with_cause(e)
                })
            }
            Err(e) => {
                let err_str = format!("{:?}", e);
                if is_missing_stack_error(&err_str) {
                    Ok(None)
                } else {
                    Err(
                        ProviderError::new(format!("Failed to get template: {:?}", e))
                            .for_stack(stack_name),
                    )
                }
            }
        }
    }

    /// Current status and status reason, `None` if the stack does not exist
    pub async fn stack_status(
        &self,
        stack_name: &str,
    ) -> ProviderResult<Option<(String, Option<String>)>> {
        let result = self
            .cloudformation_client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        match result {
            Ok(response) => Ok(response.stacks().first().and_then(|stack| {
                stack.stack_status().map(|status| {
                    (
                        status.as_str().to_string(),
                        stack.stack_status_reason().map(str::to_string),
                    )
                })
            })),
            Err(e) => {
                let err_str = format!("{:?}", e);
                if is_missing_stack_error(&err_str) {
                    Ok(None)
                } else {
                    Err(
                        ProviderError::new(format!("Failed to describe stack: {:?}", e))
                            .for_stack(stack_name),
                    )
                }
            }
        }
    }

    /// Most recent failed resource events, newest first
    async fn failure_reasons(&self, stack_name: &str) -> Vec<String> {
        let result = self
            .cloudformation_client
            .describe_stack_events()
            .stack_name(stack_name)
            .send()
            .await;

        let Ok(response) = result else {
            return Vec::new();
        };
        response
            .stack_events()
            .iter()
            .filter(|event| {
                event
                    .resource_status()
                    .is_some_and(|s| s.as_str().ends_with("_FAILED"))
            })
            .filter_map(|event| {
                let reason = event.resource_status_reason()?;
                Some(format!(
                    "{}: {}",
                    event.logical_resource_id().unwrap_or("?"),
                    reason
                ))
            })
            .take(MAX_FAILURE_EVENTS)
            .collect()
    }

    /// Inline body, or an S3 URL when the body is over the inline limit
    pub async fn prepare_template(
        &self,
        stack_name: &str,
        template: &Template,
    ) -> ProviderResult<TemplateSource> {
        let body = template.to_compact_string().map_err(|e| {
            ProviderError::new("Failed to serialize template")
                .for_stack(stack_name)
                .with_cause(e)
        })?;
        if !needs_upload(body.len()) {
            return Ok(TemplateSource::Body(body));
        }

        let Some(bucket) = &self.template_bucket else {
            return Err(ProviderError::new(format!(
                "Template is {} bytes, over the inline limit; set deployment.template_bucket",
                body.len()
            ))
            .for_stack(stack_name));
        };

        let key = template_key(stack_name, &body);
        info!("Uploading template to s3://{}/{}", bucket, key);
        self.s3_client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .content_type("application/json")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to upload template: {:?}", e))
                    .for_stack(stack_name)
            })?;

        Ok(TemplateSource::Url(template_url(bucket, &self.region, &key)))
    }

    async fn create_stack(&self, stack_name: &str, source: TemplateSource) -> ProviderResult<()> {
        let mut req = self
            .cloudformation_client
            .create_stack()
            .stack_name(stack_name)
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam);
        req = match source {
            TemplateSource::Body(body) => req.template_body(body),
            TemplateSource::Url(url) => req.template_url(url),
        };

        info!("Creating stack {}", stack_name);
        req.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to create stack: {:?}", e)).for_stack(stack_name)
        })?;
        self.wait_for_stack(stack_name).await
    }

    /// Returns false when CloudFormation found nothing to change
    async fn update_stack(&self, stack_name: &str, source: TemplateSource) -> ProviderResult<bool> {
        let mut req = self
            .cloudformation_client
            .update_stack()
            .stack_name(stack_name)
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam);
        req = match source {
            TemplateSource::Body(body) => req.template_body(body),
            TemplateSource::Url(url) => req.template_url(url),
        };

        info!("Updating stack {}", stack_name);
        if let Err(e) = req.send().await {
            let err_str = format!("{:?}", e);
            if is_no_updates_error(&err_str) {
                return Ok(false);
            }
            return Err(
                ProviderError::new(format!("Failed to update stack: {:?}", e)).for_stack(stack_name),
            );
        }
        self.wait_for_stack(stack_name).await?;
        Ok(true)
    }

    /// Create or update the stack with `template`
    pub async fn deploy_stack(
        &self,
        stack_name: &str,
        template: &Template,
    ) -> ProviderResult<DeployOutcome> {
        let existing = self.stack_status(stack_name).await?;

        if let Some((status, _)) = &existing {
            if needs_recreate(status) {
                return Err(ProviderError::new(format!(
                    "Stack is in {}; destroy it before deploying again",
                    status
                ))
                .for_stack(stack_name));
            }
            if classify_status(status) == StackState::InProgress {
                return Err(
                    ProviderError::new(format!("Stack is busy ({})", status)).for_stack(stack_name),
                );
            }
        }

        let source = self.prepare_template(stack_name, template).await?;
        match existing {
            None => {
                self.create_stack(stack_name, source).await?;
                Ok(DeployOutcome::Created)
            }
            Some(_) => {
                if self.update_stack(stack_name, source).await? {
                    Ok(DeployOutcome::Updated)
                } else {
                    Ok(DeployOutcome::Unchanged)
                }
            }
        }
    }

    /// Delete the stack and wait until it is gone
    pub async fn delete_stack(&self, stack_name: &str) -> ProviderResult<()> {
        if self.stack_status(stack_name).await?.is_none() {
            return Err(ProviderError::new("Stack does not exist").for_stack(stack_name));
        }

        info!("Deleting stack {}", stack_name);
        self.cloudformation_client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to delete stack: {:?}", e)).for_stack(stack_name)
            })?;
        self.wait_for_stack(stack_name).await
    }

    /// Poll until the stack reaches a terminal status
    ///
    /// A stack that disappears while waiting was deleted successfully.
    async fn wait_for_stack(&self, stack_name: &str) -> ProviderResult<()> {
        for _ in 0..MAX_POLL_ATTEMPTS {
            let Some((status, reason)) = self.stack_status(stack_name).await? else {
                return Ok(());
            };
            debug!("{}: {}", stack_name, status);

            match classify_status(&status) {
                StackState::InProgress => tokio::time::sleep(POLL_INTERVAL).await,
                StackState::Succeeded => return Ok(()),
                StackState::Failed => {
                    let mut message = format!("Stack ended in {}", status);
                    if let Some(reason) = reason {
                        message.push_str(&format!(": {}", reason));
                    }
                    for event in self.failure_reasons(stack_name).await {
                        message.push_str(&format!("\n  {}", event));
                    }
                    return Err(ProviderError::new(message).for_stack(stack_name));
                }
            }
        }

        Err(ProviderError::new("Timed out waiting for the stack").for_stack(stack_name))
    }
}

#[cfg(test)]
mod tests {
    use odin_core::resource::Resource;

    use super::*;

    fn provider(template_bucket: Option<&str>) -> CloudFormationProvider {
        let region = Region::new("eu-north-1");
        let cfn = aws_sdk_cloudformation::Config::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(region.clone())
            .build();
        let s3 = aws_sdk_s3::Config::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(region)
            .build();
        CloudFormationProvider::with_clients(
            CloudFormationClient::from_conf(cfn),
            S3Client::from_conf(s3),
            "eu-north-1".to_string(),
            template_bucket.map(str::to_string),
        )
    }

    fn large_template() -> Template {
        let mut template = Template::new();
        for i in 0..1000 {
            template
                .add_resource(
                    Resource::new("AWS::Logs::LogGroup", format!("Group{}", i))
                        .with_property("LogGroupName", format!("/odin/a/rather/long/group/name/{}", i))
                        .with_property("RetentionInDays", 180i64),
                )
                .unwrap();
        }
        template
    }

    #[tokio::test]
    async fn small_templates_are_sent_inline() {
        let mut template = Template::new();
        template
            .add_resource(Resource::new("AWS::EC2::VPC", "OdinVPC").with_property("CidrBlock", "10.0.0.0/16"))
            .unwrap();

        let source = provider(None)
            .prepare_template("OdinAPIStack", &template)
            .await
            .unwrap();
        assert_eq!(
            source,
            TemplateSource::Body(template.to_compact_string().unwrap())
        );
    }

    #[tokio::test]
    async fn large_templates_need_a_bucket() {
        let template = large_template();
        assert!(needs_upload(template.to_compact_string().unwrap().len()));

        let err = provider(None)
            .prepare_template("OdinAPIStack", &template)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("template_bucket"));
        assert_eq!(err.stack_name.as_deref(), Some("OdinAPIStack"));
    }
}
