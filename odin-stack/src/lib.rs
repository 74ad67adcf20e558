//! Odin Stack
//!
//! Builds the Odin API deployment topology from an [`config::OdinConfig`]:
//! network fabric, database and admin hosts, the Fargate API service, the
//! CloudFront edge and DNS. [`stack::synthesize`] returns the validated
//! template.

pub mod admin;
pub mod buckets;
pub mod cidr;
pub mod config;
pub mod dns;
pub mod edge;
pub mod error;
pub mod findings;
pub mod host;
pub mod iam;
pub mod logs;
pub mod mongo;
pub mod network;
pub mod parameters;
pub mod service;
pub mod stack;
pub mod user_data;

pub use config::OdinConfig;
pub use error::{ConfigError, StackError};
pub use stack::{OdinApiStack, synthesize};

/// Component names recorded on every resource, used to group plans
pub mod component {
    pub const NETWORK: &str = "network";
    pub const MONGO: &str = "mongo";
    pub const ADMIN: &str = "admin";
    pub const API: &str = "api";
    pub const EDGE: &str = "edge";
    pub const DNS: &str = "dns";
}
