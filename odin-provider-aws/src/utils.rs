//! Helpers for CloudFormation status handling and template upload

use sha2::{Digest, Sha256};

/// Largest template body CloudFormation accepts inline
pub const INLINE_TEMPLATE_LIMIT: usize = 51_200;

/// Message CloudFormation returns when an update would change nothing
const NO_UPDATES: &str = "No updates are to be performed";

/// Where a stack is in its lifecycle, as far as waiting is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    InProgress,
    Succeeded,
    /// Terminal, but the requested change did not take effect
    Failed,
}

/// Classify a CloudFormation stack status string
pub fn classify_status(status: &str) -> StackState {
    if status.ends_with("_IN_PROGRESS") {
        return StackState::InProgress;
    }
    match status {
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "DELETE_COMPLETE" | "IMPORT_COMPLETE" => {
            StackState::Succeeded
        }
        _ => StackState::Failed,
    }
}

/// A stack in this status cannot be updated and has to be deleted first
pub fn needs_recreate(status: &str) -> bool {
    status == "ROLLBACK_COMPLETE"
}

/// `UpdateStack` found nothing to change
pub fn is_no_updates_error(message: &str) -> bool {
    message.contains(NO_UPDATES)
}

/// The stack named in the request does not exist
pub fn is_missing_stack_error(message: &str) -> bool {
    message.contains("does not exist")
}

/// Whether a template body of `len` bytes has to go through S3
pub fn needs_upload(len: usize) -> bool {
    len > INLINE_TEMPLATE_LIMIT
}

/// Object key of an uploaded template; the same body always lands on the same key
pub fn template_key(stack_name: &str, body: &str) -> String {
    format!("odin/{}/{}.json", stack_name, digest(body))
}

/// Virtual-hosted style URL CloudFormation can read the template from
pub fn template_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

/// Hex SHA-256 of a template body
fn digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status("CREATE_IN_PROGRESS"), StackState::InProgress);
        assert_eq!(
            classify_status("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"),
            StackState::InProgress
        );
        assert_eq!(classify_status("UPDATE_COMPLETE"), StackState::Succeeded);
        assert_eq!(classify_status("ROLLBACK_COMPLETE"), StackState::Failed);
        assert_eq!(classify_status("UPDATE_ROLLBACK_COMPLETE"), StackState::Failed);
        assert_eq!(classify_status("DELETE_FAILED"), StackState::Failed);
    }

    #[test]
    fn test_error_messages() {
        assert!(is_no_updates_error(
            "ValidationError: No updates are to be performed."
        ));
        assert!(is_missing_stack_error(
            "Stack with id OdinAPIStack does not exist"
        ));
        assert!(!is_missing_stack_error("Throttling: Rate exceeded"));
    }

    #[test]
    fn test_upload_threshold() {
        assert!(!needs_upload(INLINE_TEMPLATE_LIMIT));
        assert!(needs_upload(INLINE_TEMPLATE_LIMIT + 1));
    }

    #[test]
    fn test_template_location() {
        let key = template_key("OdinAPIStack", "{}");
        assert!(key.starts_with("odin/OdinAPIStack/"));
        assert_eq!(key, template_key("OdinAPIStack", "{}"));
        assert_ne!(key, template_key("OdinAPIStack", "{ }"));
        assert_eq!(
            key,
            "odin/OdinAPIStack/44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a.json"
        );
        assert_eq!(
            template_url("odin-templates", "eu-north-1", &key),
            format!("https://odin-templates.s3.eu-north-1.amazonaws.com/{}", key)
        );
    }
}
