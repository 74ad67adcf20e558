//! Configuration - YAML description of one Odin deployment
//!
//! Only the values that identify the account and pre-existing resources are
//! required; everything else defaults to the production topology.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;

use odin_core::schema::validate_cidr;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "odin.yaml";

/// Address that matches every IPv4 source
pub const ANYWHERE: &str = "0.0.0.0/0";

static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$").expect("valid regex"));
static ACCOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("valid regex"));
static BUCKET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid regex"));
static STACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OdinConfig {
    #[serde(default = "default_stack_name")]
    pub stack_name: String,
    pub account: String,
    pub region: String,
    /// EC2 key pair used by both hosts
    pub key_pair: String,
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    /// Public hosted zone of `domain_name`
    pub hosted_zone_id: String,
    /// ACM certificate for `domain_name`
    pub certificate_arn: String,
    /// Region -> AMI for the database and admin hosts
    #[serde(default = "default_machine_images")]
    pub machine_images: BTreeMap<String, String>,
    pub network: NetworkConfig,
    pub mongo: MongoConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub edge: EdgeConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_vpc_cidr")]
    pub cidr: String,
    /// Defaults to `<region>a` and `<region>b`
    #[serde(default)]
    pub availability_zones: Vec<String>,
    #[serde(default = "default_mask")]
    pub public_mask: u8,
    #[serde(default = "default_mask")]
    pub private_mask: u8,
    #[serde(default = "default_mask")]
    pub isolated_mask: u8,
    #[serde(default = "default_nat_instance_type")]
    pub nat_instance_type: String,
    /// Region -> AMI for the NAT instance; the latest Amazon Linux 2023
    /// image is used for regions not listed
    #[serde(default)]
    pub nat_machine_images: BTreeMap<String, String>,
    /// Pre-allocated Elastic IP bound to the NAT instance
    pub nat_eip_allocation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MongoConfig {
    #[serde(default = "default_mongo_instance_type")]
    pub instance_type: String,
    /// Existing EBS volume holding the database files
    pub data_volume_id: String,
    /// Availability zone of `data_volume_id`
    pub availability_zone: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_anywhere")]
    pub ssh_ingress_cidr: String,
    #[serde(default = "default_anywhere")]
    pub client_ingress_cidr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    #[serde(default = "default_admin_instance_type")]
    pub instance_type: String,
    #[serde(default = "default_anywhere")]
    pub ssh_ingress_cidr: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            instance_type: default_admin_instance_type(),
            ssh_ingress_cidr: default_anywhere(),
        }
    }
}

/// Target-tracking trigger with its own cooldowns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingTrigger {
    pub target: u32,
    pub scale_in_cooldown_secs: u32,
    pub scale_out_cooldown_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ApiConfig {
    pub repository: String,
    pub image_tag: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub container_port: u16,
    pub desired_count: u32,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub cpu_scaling: ScalingTrigger,
    pub request_scaling: ScalingTrigger,
    pub health_check_path: String,
    pub idle_timeout_secs: u32,
    /// Buckets the API may read
    pub buckets: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            repository: "odin-api".to_string(),
            image_tag: "latest".to_string(),
            cpu: 2048,
            memory_mib: 4096,
            container_port: 8000,
            desired_count: 1,
            min_capacity: 1,
            max_capacity: 20,
            cpu_scaling: ScalingTrigger {
                target: 50,
                scale_in_cooldown_secs: 60,
                scale_out_cooldown_secs: 60,
            },
            request_scaling: ScalingTrigger {
                target: 1000,
                scale_in_cooldown_secs: 120,
                scale_out_cooldown_secs: 60,
            },
            health_check_path: "/rest_api/health_check".to_string(),
            idle_timeout_secs: 360,
            buckets: [
                "odin-apriori",
                "odin-era5",
                "odin-osiris",
                "odin-psql",
                "odin-smr",
                "odin-solar",
                "odin-vds-data",
                "odin-zpt",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeConfig {
    /// Existing bucket holding the UI build
    pub ui_bucket: String,
    /// Certificate for the distribution; CloudFront only accepts
    /// certificates from us-east-1. Defaults to `certificate_arn`.
    #[serde(default)]
    pub certificate_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Bucket for templates too large to send inline
    #[serde(default)]
    pub template_bucket: Option<String>,
}

fn default_stack_name() -> String {
    "OdinAPIStack".to_string()
}

fn default_domain_name() -> String {
    "odin-smr.org".to_string()
}

fn default_machine_images() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "eu-north-1".to_string(),
        "ami-08fdff97845b0d82e".to_string(),
    )])
}

fn default_vpc_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_mask() -> u8 {
    24
}

fn default_nat_instance_type() -> String {
    "t3.small".to_string()
}

fn default_mongo_instance_type() -> String {
    "t3.large".to_string()
}

fn default_admin_instance_type() -> String {
    "t3.nano".to_string()
}

fn default_device() -> String {
    "/dev/sdf".to_string()
}

fn default_anywhere() -> String {
    ANYWHERE.to_string()
}

/// Memory sizes (MiB) Fargate accepts for a CPU size
pub fn fargate_memory_options(cpu: u32) -> Vec<u32> {
    match cpu {
        256 => vec![512, 1024, 2048],
        512 => (1..=4).map(|gb| gb * 1024).collect(),
        1024 => (2..=8).map(|gb| gb * 1024).collect(),
        2048 => (4..=16).map(|gb| gb * 1024).collect(),
        4096 => (8..=30).map(|gb| gb * 1024).collect(),
        8192 => (4..=15).map(|n| n * 4096).collect(),
        16384 => (4..=15).map(|n| n * 8192).collect(),
        _ => Vec::new(),
    }
}

impl OdinConfig {
    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: OdinConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: OdinConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Availability zones the network spans
    pub fn availability_zones(&self) -> Vec<String> {
        if self.network.availability_zones.is_empty() {
            vec![format!("{}a", self.region), format!("{}b", self.region)]
        } else {
            self.network.availability_zones.clone()
        }
    }

    /// AMI of the database and admin hosts in the configured region
    pub fn machine_image(&self) -> Option<&str> {
        self.machine_images.get(&self.region).map(String::as_str)
    }

    pub fn nat_machine_image(&self) -> Option<&str> {
        self.network
            .nat_machine_images
            .get(&self.region)
            .map(String::as_str)
    }

    pub fn edge_certificate_arn(&self) -> &str {
        self.edge
            .certificate_arn
            .as_deref()
            .unwrap_or(&self.certificate_arn)
    }

    /// Check every invariant and report all violations at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !STACK_NAME.is_match(&self.stack_name) {
            errors.push(format!("stack_name '{}' is not a valid stack name", self.stack_name));
        }
        if !ACCOUNT.is_match(&self.account) {
            errors.push(format!("account '{}' must be 12 digits", self.account));
        }
        if !REGION.is_match(&self.region) {
            errors.push(format!("region '{}' is not a valid region", self.region));
        }
        for (field, value) in [
            ("key_pair", &self.key_pair),
            ("domain_name", &self.domain_name),
            ("hosted_zone_id", &self.hosted_zone_id),
            ("network.nat_eip_allocation_id", &self.network.nat_eip_allocation_id),
            ("mongo.data_volume_id", &self.mongo.data_volume_id),
            ("mongo.device", &self.mongo.device),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{} must not be empty", field));
            }
        }
        for (field, arn) in [
            ("certificate_arn", self.certificate_arn.as_str()),
            ("edge.certificate_arn", self.edge_certificate_arn()),
        ] {
            if !arn.starts_with("arn:") || !arn.contains(":acm:") {
                errors.push(format!("{} '{}' is not an ACM certificate ARN", field, arn));
            }
        }

        self.validate_network(&mut errors);
        self.validate_hosts(&mut errors);
        self.validate_api(&mut errors);

        if !BUCKET_NAME.is_match(&self.edge.ui_bucket) {
            errors.push(format!("edge.ui_bucket '{}' is not a valid bucket name", self.edge.ui_bucket));
        }
        if let Some(bucket) = &self.deployment.template_bucket
            && !BUCKET_NAME.is_match(bucket)
        {
            errors.push(format!(
                "deployment.template_bucket '{}' is not a valid bucket name",
                bucket
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    fn validate_network(&self, errors: &mut Vec<String>) {
        if let Err(e) = validate_cidr(&self.network.cidr) {
            errors.push(format!("network.cidr: {}", e));
        }
        for (field, mask) in [
            ("network.public_mask", self.network.public_mask),
            ("network.private_mask", self.network.private_mask),
            ("network.isolated_mask", self.network.isolated_mask),
        ] {
            // VPC subnets must be between /16 and /28
            if !(16..=28).contains(&mask) {
                errors.push(format!("{} /{} must be between /16 and /28", field, mask));
            }
        }

        let zones = self.availability_zones();
        let distinct: BTreeSet<&String> = zones.iter().collect();
        if distinct.len() != zones.len() {
            errors.push(format!(
                "network.availability_zones lists a zone more than once ({})",
                zones.join(", ")
            ));
        }
        // The load balancer needs subnets in two zones
        if distinct.len() < 2 {
            errors.push(format!(
                "network.availability_zones needs at least two distinct zones, got {}",
                distinct.len()
            ));
        }
        for zone in &zones {
            if !zone.starts_with(&self.region) || zone.len() != self.region.len() + 1 {
                errors.push(format!(
                    "availability zone '{}' is not in region {}",
                    zone, self.region
                ));
            }
        }
        if !zones.contains(&self.mongo.availability_zone) {
            errors.push(format!(
                "mongo.availability_zone '{}' is not one of the network's zones ({})",
                self.mongo.availability_zone,
                zones.join(", ")
            ));
        }
    }

    fn validate_hosts(&self, errors: &mut Vec<String>) {
        if self.machine_image().is_none() {
            errors.push(format!(
                "machine_images has no image for region {}",
                self.region
            ));
        }
        for (field, cidr) in [
            ("mongo.ssh_ingress_cidr", &self.mongo.ssh_ingress_cidr),
            ("mongo.client_ingress_cidr", &self.mongo.client_ingress_cidr),
            ("admin.ssh_ingress_cidr", &self.admin.ssh_ingress_cidr),
        ] {
            if let Err(e) = validate_cidr(cidr) {
                errors.push(format!("{}: {}", field, e));
            }
        }
        for (field, instance_type) in [
            ("network.nat_instance_type", &self.network.nat_instance_type),
            ("mongo.instance_type", &self.mongo.instance_type),
            ("admin.instance_type", &self.admin.instance_type),
        ] {
            if !instance_type.contains('.') {
                errors.push(format!("{} '{}' is not an instance type", field, instance_type));
            }
        }
    }

    fn validate_api(&self, errors: &mut Vec<String>) {
        let api = &self.api;

        let memory = fargate_memory_options(api.cpu);
        if memory.is_empty() {
            errors.push(format!("api.cpu {} is not a Fargate CPU size", api.cpu));
        } else if !memory.contains(&api.memory_mib) {
            errors.push(format!(
                "api.memory_mib {} is not valid for {} CPU units",
                api.memory_mib, api.cpu
            ));
        }

        if api.min_capacity > api.max_capacity {
            errors.push(format!(
                "api.min_capacity {} is greater than api.max_capacity {}",
                api.min_capacity, api.max_capacity
            ));
        } else if api.desired_count < api.min_capacity || api.desired_count > api.max_capacity {
            errors.push(format!(
                "api.desired_count {} is outside [{}, {}]",
                api.desired_count, api.min_capacity, api.max_capacity
            ));
        }
        if api.max_capacity == 0 {
            errors.push("api.max_capacity must be at least 1".to_string());
        }
        if api.cpu_scaling.target == 0 || api.cpu_scaling.target > 100 {
            errors.push(format!(
                "api.cpu_scaling.target {} must be a percentage between 1 and 100",
                api.cpu_scaling.target
            ));
        }
        if api.request_scaling.target == 0 {
            errors.push("api.request_scaling.target must be at least 1".to_string());
        }

        if api.container_port == 0 {
            errors.push("api.container_port must not be 0".to_string());
        }
        if !api.health_check_path.starts_with('/') {
            errors.push(format!(
                "api.health_check_path '{}' must start with '/'",
                api.health_check_path
            ));
        }
        if !(1..=4000).contains(&api.idle_timeout_secs) {
            errors.push(format!(
                "api.idle_timeout_secs {} must be between 1 and 4000",
                api.idle_timeout_secs
            ));
        }
        if api.repository.is_empty() || api.image_tag.is_empty() {
            errors.push("api.repository and api.image_tag must not be empty".to_string());
        }
        for bucket in &api.buckets {
            if !BUCKET_NAME.is_match(bucket) {
                errors.push(format!("api.buckets: '{}' is not a valid bucket name", bucket));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use super::*;

    pub(crate) const MINIMAL: &str = r#"
account: "123456789012"
region: eu-north-1
key_pair: odin-key
hosted_zone_id: Z0123456789ABCDEFGHIJ
certificate_arn: arn:aws:acm:eu-north-1:123456789012:certificate/abcd
network:
  nat_eip_allocation_id: eipalloc-0123456789abcdef0
mongo:
  data_volume_id: vol-0123456789abcdef0
  availability_zone: eu-north-1a
edge:
  ui_bucket: odin-ui
"#;

    /// Minimal valid configuration used across the crate's tests
    pub(crate) fn minimal() -> OdinConfig {
        OdinConfig::from_yaml_str(MINIMAL).unwrap()
    }

    #[test]
    fn minimal_config_gets_production_defaults() {
        let config = minimal();
        assert_eq!(config.stack_name, "OdinAPIStack");
        assert_eq!(config.domain_name, "odin-smr.org");
        assert_eq!(config.network.cidr, "10.0.0.0/16");
        assert_eq!(config.network.nat_instance_type, "t3.small");
        assert_eq!(config.mongo.instance_type, "t3.large");
        assert_eq!(config.mongo.device, "/dev/sdf");
        assert_eq!(config.admin.instance_type, "t3.nano");
        assert_eq!(config.api.cpu, 2048);
        assert_eq!(config.api.memory_mib, 4096);
        assert_eq!(config.api.max_capacity, 20);
        assert_eq!(config.api.buckets.len(), 8);
        assert_eq!(config.machine_image(), Some("ami-08fdff97845b0d82e"));
        assert_eq!(config.nat_machine_image(), None);
        assert_eq!(
            config.availability_zones(),
            vec!["eu-north-1a".to_string(), "eu-north-1b".to_string()]
        );
        assert_eq!(config.edge_certificate_arn(), config.certificate_arn);
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = OdinConfig::load(file.path()).unwrap();
        assert_eq!(config, minimal());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = OdinConfig::load(dir.path().join("odin.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let yaml = MINIMAL.replace("key_pair: odin-key\n", "");
        let err = OdinConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("key_pair"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let yaml = format!("{}surprise: true\n", MINIMAL);
        assert!(matches!(
            OdinConfig::from_yaml_str(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn yaml_round_trip_keeps_values() {
        let config = minimal();
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(OdinConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    fn invalid(config: &OdinConfig) -> Vec<String> {
        match config.validate() {
            Err(ConfigError::Invalid(errors)) => errors,
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn scaling_bounds_are_checked() {
        let mut config = minimal();
        config.api.min_capacity = 5;
        config.api.max_capacity = 2;
        let errors = invalid(&config);
        assert!(errors.iter().any(|e| e.contains("greater than")));

        let mut config = minimal();
        config.api.desired_count = 21;
        let errors = invalid(&config);
        assert!(errors.iter().any(|e| e.contains("desired_count")));
    }

    #[test]
    fn fargate_sizes_are_checked() {
        let mut config = minimal();
        config.api.memory_mib = 1024;
        assert!(invalid(&config)[0].contains("not valid for 2048 CPU units"));

        config.api.cpu = 3000;
        assert!(invalid(&config)[0].contains("not a Fargate CPU size"));

        assert!(fargate_memory_options(2048).contains(&16384));
        assert!(fargate_memory_options(256).contains(&512));
    }

    #[test]
    fn volume_zone_must_belong_to_network() {
        let mut config = minimal();
        config.mongo.availability_zone = "eu-north-1c".to_string();
        let errors = invalid(&config);
        assert!(errors.iter().any(|e| e.contains("mongo.availability_zone")));

        config.network.availability_zones =
            vec!["eu-north-1a".to_string(), "eu-north-1c".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_zones_are_rejected() {
        let mut config = minimal();
        config.network.availability_zones =
            vec!["eu-north-1a".to_string(), "eu-north-1a".to_string()];
        let errors = invalid(&config);
        assert!(errors.iter().any(|e| e.contains("more than once")));
        assert!(errors.iter().any(|e| e.contains("at least two distinct zones")));
    }

    #[test]
    fn single_zone_is_rejected() {
        let mut config = minimal();
        config.network.availability_zones = vec!["eu-north-1a".to_string()];
        let errors = invalid(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("at least two distinct zones, got 1"));
    }

    #[test]
    fn all_problems_are_reported_together() {
        let mut config = minimal();
        config.region = "eu-west-9".to_string();
        config.network.cidr = "10.0.0.0".to_string();
        config.mongo.ssh_ingress_cidr = "everywhere".to_string();
        config.edge.ui_bucket = "Odin_UI".to_string();
        let errors = invalid(&config);
        // Unknown region also loses its machine image and zone membership
        assert!(errors.len() >= 4);
        assert!(errors.iter().any(|e| e.starts_with("network.cidr")));
        assert!(errors.iter().any(|e| e.starts_with("mongo.ssh_ingress_cidr")));
        assert!(errors.iter().any(|e| e.starts_with("edge.ui_bucket")));
        assert!(errors.iter().any(|e| e.contains("machine_images")));
    }

    #[test]
    fn invalid_error_lists_every_problem() {
        let err = ConfigError::Invalid(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Invalid config:\n  a\n  b");
    }
}
