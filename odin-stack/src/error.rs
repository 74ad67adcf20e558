//! Errors raised while loading configuration and synthesizing the topology

use std::path::PathBuf;

use odin_core::template::TemplateError;
use thiserror::Error;

use crate::cidr::CidrError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Synthesized template is invalid:\n  {}", format_errors(.0))]
    InvalidTemplate(Vec<TemplateError>),

    #[error("Network: {0}")]
    Cidr(#[from] CidrError),

    #[error("No machine image configured for region {region} ({role})")]
    MissingMachineImage { region: String, role: String },

    #[error("No {tier} subnet in availability zone {zone}")]
    NoSubnet { tier: String, zone: String },
}

fn format_errors(errors: &[TemplateError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n  ")
}

pub type Result<T> = std::result::Result<T, StackError>;
