//! OdinAPIStack - assembles the whole topology into one template

use log::{info, warn};
use odin_core::resource::Value;
use odin_core::template::{Output, Template};

use crate::admin::build_admin;
use crate::config::OdinConfig;
use crate::dns::{build_private_zone, build_records};
use crate::edge::build_edge;
use crate::error::{Result, StackError};
use crate::findings::findings;
use crate::mongo::build_mongo;
use crate::network::{NetworkSpec, build_network};
use crate::parameters::add_ssm_parameters;
use crate::service::build_api_service;

pub const DESCRIPTION: &str = "Odin API: network, database and admin hosts, Fargate service, CloudFront edge and DNS";

/// A validated configuration ready to be synthesized
#[derive(Debug, Clone)]
pub struct OdinApiStack {
    config: OdinConfig,
}

impl OdinApiStack {
    pub fn new(config: OdinConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn name(&self) -> &str {
        &self.config.stack_name
    }

    pub fn config(&self) -> &OdinConfig {
        &self.config
    }

    pub fn synthesize(&self) -> Result<Template> {
        synthesize(&self.config)
    }
}

/// Build the topology described by `config`
///
/// The result has passed [`Template::validate`]; open ingress rules are
/// logged as warnings.
pub fn synthesize(config: &OdinConfig) -> Result<Template> {
    let mut template = Template::new().with_description(DESCRIPTION);

    add_ssm_parameters(&mut template)?;
    let network = build_network(&mut template, &NetworkSpec::from_config(config)?)?;
    let private_zone = build_private_zone(&mut template, &network)?;
    let mongo = build_mongo(&mut template, config, &network)?;
    let admin = build_admin(&mut template, config, &network)?;
    let api = build_api_service(&mut template, config, &network, &mongo)?;
    let edge = build_edge(&mut template, config, &api)?;
    build_records(&mut template, config, &private_zone, &mongo, &admin, &edge)?;

    template.add_output(
        "OdinMongoPrivateIp",
        Output::new(mongo.private_ip()).with_description("Database host private address"),
    )?;
    template.add_output(
        "OdinAdminPublicIp",
        Output::new(admin.public_ip()).with_description("Admin host public address"),
    )?;
    template.add_output(
        "OdinVPCId",
        Output::new(Value::reference(&network.vpc)).with_description("VPC id"),
    )?;

    template.validate().map_err(StackError::InvalidTemplate)?;

    for finding in findings(&template) {
        warn!("Security finding: {}", finding);
    }
    info!(
        "Synthesized {} with {} resources",
        config.stack_name,
        template.len()
    );
    Ok(template)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use odin_core::differ::create_plan;

    use super::*;
    use crate::config::tests::minimal;
    use crate::network::{NAT_INSTANCE, SubnetType, TIER_TAG};

    fn template() -> Template {
        synthesize(&minimal()).unwrap()
    }

    #[test]
    fn exactly_one_vpc_tagged_odin_vpc() {
        let template = template();
        let vpcs = template.resources_of_type("AWS::EC2::VPC");
        assert_eq!(vpcs.len(), 1);
        assert_eq!(vpcs[0].name_tag(), Some("OdinVPC"));
    }

    #[test]
    fn host_roles_are_unique() {
        let template = template();
        let names: Vec<_> = template
            .resources_of_type("AWS::EC2::Instance")
            .iter()
            .filter_map(|i| i.name_tag())
            .filter(|n| *n == "OdinMongo" || *n == "OdinAdmin")
            .collect();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn three_tiers_and_nat_routes() {
        let template = template();
        let tiers: BTreeSet<_> = template
            .resources_of_type("AWS::EC2::Subnet")
            .iter()
            .filter_map(|s| s.tag(TIER_TAG))
            .collect();
        assert_eq!(tiers.len(), 3);

        let egress: Vec<_> = template
            .resources_of_type("AWS::EC2::Subnet")
            .into_iter()
            .filter(|s| s.tag(TIER_TAG) == Some(SubnetType::PrivateWithEgress.as_str()))
            .collect();
        assert_eq!(egress.len(), 2);
        for subnet in egress {
            let route = template
                .resource(&format!("{}DefaultRoute", subnet.id.name))
                .unwrap();
            assert_eq!(route.property("InstanceId"), Some(&Value::reference(NAT_INSTANCE)));
        }
    }

    #[test]
    fn hosts_boot_after_their_route_out() {
        let template = template();
        let graph = template.dependency_graph();

        let mongo = graph.transitive_dependencies("OdinMongo");
        assert!(mongo.contains(NAT_INSTANCE));
        assert!(mongo.contains("OdinNATEIPAssociation"));
        assert!(mongo.contains("OdinVPCGatewayAttachment"));
        assert!(mongo.contains("OdinPrivateNATSubnet1DefaultRoute"));

        let admin = graph.transitive_dependencies("OdinAdmin");
        assert!(admin.contains("OdinVPCGatewayAttachment"));
        assert!(admin.contains("OdinPublicSubnet1DefaultRoute"));
        assert!(!admin.contains(NAT_INSTANCE));
    }

    #[test]
    fn volume_zone_equals_instance_zone() {
        let template = template();
        let instance = template.resource("OdinMongo").unwrap();
        assert_eq!(
            instance.property("AvailabilityZone").and_then(Value::as_str),
            Some(minimal().mongo.availability_zone.as_str())
        );
    }

    #[test]
    fn synthesis_is_byte_identical() {
        let first = template().to_json_string().unwrap();
        let second = template().to_json_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn self_diff_is_empty() {
        let template = template();
        assert!(create_plan(&template, Some(&template)).is_empty());

        let reparsed = Template::from_json_str(&template.to_json_string().unwrap()).unwrap();
        assert!(create_plan(&template, Some(&reparsed)).is_empty());
    }

    #[test]
    fn references_resolve_and_graph_is_acyclic() {
        let template = template();
        template.validate().unwrap();
        assert!(template.dependency_graph().topological_order().is_ok());
    }

    #[test]
    fn default_config_reports_open_ports() {
        let found = findings(&template());
        let ports: BTreeSet<_> = found.iter().map(|f| (f.resource.as_str(), f.port)).collect();
        assert!(ports.contains(&("OdinMongoSecurityGroup", 22)));
        assert!(ports.contains(&("OdinMongoSecurityGroup", 27017)));
        assert!(ports.contains(&("OdinAdminSecurityGroup", 22)));
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn narrowed_ingress_clears_findings() {
        let mut config = minimal();
        config.mongo.ssh_ingress_cidr = "10.0.0.0/16".to_string();
        config.mongo.client_ingress_cidr = "10.0.0.0/16".to_string();
        config.admin.ssh_ingress_cidr = "203.0.113.0/24".to_string();
        assert!(findings(&synthesize(&config).unwrap()).is_empty());
    }

    #[test]
    fn stack_rejects_invalid_config() {
        let mut config = minimal();
        config.api.min_capacity = 3;
        config.api.max_capacity = 2;
        assert!(matches!(
            OdinApiStack::new(config),
            Err(StackError::Config(_))
        ));

        let mut config = minimal();
        config.network.availability_zones =
            vec!["eu-north-1a".to_string(), "eu-north-1a".to_string()];
        assert!(matches!(
            OdinApiStack::new(config),
            Err(StackError::Config(_))
        ));
    }

    #[test]
    fn stack_exposes_name_and_template() {
        let stack = OdinApiStack::new(minimal()).unwrap();
        assert_eq!(stack.name(), "OdinAPIStack");
        let template = stack.synthesize().unwrap();
        assert!(template.output("OdinServiceLoadBalancerDNS").is_some());
        assert_eq!(template.parameters().len(), 8);
    }
}
