//! Network fabric - VPC, subnet tiers, internet gateway and NAT instance
//!
//! Subnet CIDRs are carved out of the VPC range in tier order, and in zone
//! order inside each tier, so a given configuration always produces the
//! same layout.

use log::debug;
use odin_core::resource::{Resource, Value};
use odin_core::template::{Parameter, Template};

use crate::cidr::{CidrAllocator, Ipv4Cidr};
use crate::component;
use crate::config::OdinConfig;
use crate::error::{Result, StackError};
use crate::user_data::{UserData, nat_commands};

pub const VPC: &str = "OdinVPC";
const INTERNET_GATEWAY: &str = "OdinVPCInternetGateway";
const GATEWAY_ATTACHMENT: &str = "OdinVPCGatewayAttachment";
pub const NAT_INSTANCE: &str = "OdinVPCNatInstance";
const NAT_SECURITY_GROUP: &str = "OdinVPCNatSecurityGroup";
const NAT_EIP_ASSOCIATION: &str = "OdinNATEIPAssociation";
pub const NAT_IMAGE_PARAMETER: &str = "NatInstanceImageId";
const NAT_IMAGE_SSM_PATH: &str = "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64";

pub const TIER_TAG: &str = "odin:subnet-tier";
const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// Routing policy shared by the subnets of a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubnetType {
    /// Default route to the internet gateway
    Public,
    /// Default route to the NAT instance
    PrivateWithEgress,
    /// No default route
    PrivateIsolated,
}

impl SubnetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetType::Public => "Public",
            SubnetType::PrivateWithEgress => "PrivateWithEgress",
            SubnetType::PrivateIsolated => "PrivateIsolated",
        }
    }
}

impl std::fmt::Display for SubnetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetTier {
    pub name: String,
    pub subnet_type: SubnetType,
    pub cidr_mask: u8,
}

impl SubnetTier {
    pub fn new(name: impl Into<String>, subnet_type: SubnetType, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            subnet_type,
            cidr_mask,
        }
    }
}

/// Where the NAT instance image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NatImage {
    /// Fixed AMI id
    Ami(String),
    /// Latest Amazon Linux image, resolved through a public SSM parameter
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub cidr: Ipv4Cidr,
    pub availability_zones: Vec<String>,
    pub tiers: Vec<SubnetTier>,
    pub nat_instance_type: String,
    pub nat_image: NatImage,
    pub nat_eip_allocation_id: String,
}

impl NetworkSpec {
    pub fn from_config(config: &OdinConfig) -> Result<Self> {
        let network = &config.network;
        Ok(Self {
            cidr: network.cidr.parse()?,
            availability_zones: config.availability_zones(),
            tiers: vec![
                SubnetTier::new("OdinPublicSubnet", SubnetType::Public, network.public_mask),
                SubnetTier::new(
                    "OdinPrivateNATSubnet",
                    SubnetType::PrivateWithEgress,
                    network.private_mask,
                ),
                SubnetTier::new(
                    "OdinPrivateSubnet",
                    SubnetType::PrivateIsolated,
                    network.isolated_mask,
                ),
            ],
            nat_instance_type: network.nat_instance_type.clone(),
            nat_image: match config.nat_machine_image() {
                Some(ami) => NatImage::Ami(ami.to_string()),
                None => NatImage::Latest,
            },
            nat_eip_allocation_id: network.nat_eip_allocation_id.clone(),
        })
    }
}

/// One subnet in one availability zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub logical_id: String,
    pub subnet_type: SubnetType,
    pub availability_zone: String,
    pub cidr: Ipv4Cidr,
    pub route_table: String,
}

impl Subnet {
    pub fn id(&self) -> Value {
        Value::reference(&self.logical_id)
    }

    /// Resources that must exist before an instance here can reach the internet
    pub fn egress_dependencies(&self) -> Vec<String> {
        let route = format!("{}DefaultRoute", self.logical_id);
        match self.subnet_type {
            SubnetType::Public => vec![route],
            SubnetType::PrivateWithEgress => vec![route, NAT_EIP_ASSOCIATION.to_string()],
            SubnetType::PrivateIsolated => Vec::new(),
        }
    }
}

/// The built network, as seen by the rest of the topology
#[derive(Debug, Clone)]
pub struct Network {
    pub vpc: String,
    pub cidr: Ipv4Cidr,
    pub availability_zones: Vec<String>,
    pub subnets: Vec<Subnet>,
    pub nat_instance: String,
}

impl Network {
    pub fn vpc_id(&self) -> Value {
        Value::reference(&self.vpc)
    }

    pub fn subnets(&self, subnet_type: SubnetType) -> Vec<&Subnet> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == subnet_type)
            .collect()
    }

    /// Subnet of a tier in a given zone
    pub fn subnet_in(&self, subnet_type: SubnetType, zone: &str) -> Result<&Subnet> {
        self.subnets
            .iter()
            .find(|s| s.subnet_type == subnet_type && s.availability_zone == zone)
            .ok_or_else(|| StackError::NoSubnet {
                tier: subnet_type.to_string(),
                zone: zone.to_string(),
            })
    }

    /// Subnet of a tier in the first zone
    pub fn first_subnet(&self, subnet_type: SubnetType) -> Result<&Subnet> {
        let zone = self.availability_zones.first().map(String::as_str).unwrap_or("");
        self.subnet_in(subnet_type, zone)
    }

    /// List of `Ref`s to every subnet of a tier
    pub fn subnet_ids(&self, subnet_type: SubnetType) -> Value {
        Value::List(self.subnets(subnet_type).into_iter().map(Subnet::id).collect())
    }
}

/// Lay out `tiers` across `zones` inside `cidr`
pub fn allocate_subnets(
    cidr: Ipv4Cidr,
    tiers: &[SubnetTier],
    zones: &[String],
) -> Result<Vec<(usize, String, Ipv4Cidr)>> {
    let mut allocator = CidrAllocator::new(cidr);
    let mut layout = Vec::new();
    for (tier_idx, tier) in tiers.iter().enumerate() {
        for zone in zones {
            layout.push((tier_idx, zone.clone(), allocator.allocate(tier.cidr_mask)?));
        }
    }
    Ok(layout)
}

fn network_resource(resource_type: &str, logical_id: &str) -> Resource {
    Resource::new(resource_type, logical_id).with_component(component::NETWORK)
}

/// Add the network fabric to `template`
pub fn build_network(template: &mut Template, spec: &NetworkSpec) -> Result<Network> {
    if spec.availability_zones.is_empty() {
        return Err(StackError::NoSubnet {
            tier: "any".to_string(),
            zone: "(no availability zones configured)".to_string(),
        });
    }

    template.add_resource(
        network_resource("AWS::EC2::VPC", VPC)
            .with_property("CidrBlock", spec.cidr.to_string())
            .with_property("EnableDnsHostnames", true)
            .with_property("EnableDnsSupport", true)
            .with_property("InstanceTenancy", "default")
            .with_name_tag(VPC),
    )?;
    template.add_resource(
        network_resource("AWS::EC2::InternetGateway", INTERNET_GATEWAY).with_name_tag(VPC),
    )?;
    template.add_resource(
        network_resource("AWS::EC2::VPCGatewayAttachment", GATEWAY_ATTACHMENT)
            .with_property("VpcId", Value::reference(VPC))
            .with_property("InternetGatewayId", Value::reference(INTERNET_GATEWAY)),
    )?;

    let layout = allocate_subnets(spec.cidr, &spec.tiers, &spec.availability_zones)?;
    let mut subnets = Vec::new();
    for (tier_idx, zone, cidr) in layout {
        let tier = &spec.tiers[tier_idx];
        let zone_idx = spec
            .availability_zones
            .iter()
            .position(|z| *z == zone)
            .unwrap_or(0);
        let subnet = add_subnet(template, tier, &zone, zone_idx + 1, cidr)?;
        debug!("Subnet {} {} in {}", subnet.logical_id, cidr, zone);
        subnets.push(subnet);
    }

    let network = Network {
        vpc: VPC.to_string(),
        cidr: spec.cidr,
        availability_zones: spec.availability_zones.clone(),
        subnets,
        nat_instance: NAT_INSTANCE.to_string(),
    };

    add_nat_instance(template, spec, &network)?;

    for subnet in &network.subnets {
        let target = match subnet.subnet_type {
            SubnetType::Public => Some(("GatewayId", INTERNET_GATEWAY, GATEWAY_ATTACHMENT)),
            SubnetType::PrivateWithEgress => Some(("InstanceId", NAT_INSTANCE, NAT_INSTANCE)),
            SubnetType::PrivateIsolated => None,
        };
        if let Some((key, target, after)) = target {
            template.add_resource(
                network_resource("AWS::EC2::Route", &format!("{}DefaultRoute", subnet.logical_id))
                    .with_property("RouteTableId", Value::reference(&subnet.route_table))
                    .with_property("DestinationCidrBlock", DEFAULT_ROUTE)
                    .with_property(key, Value::reference(target))
                    .depends_on(after),
            )?;
        }
    }

    Ok(network)
}

fn add_subnet(
    template: &mut Template,
    tier: &SubnetTier,
    zone: &str,
    index: usize,
    cidr: Ipv4Cidr,
) -> Result<Subnet> {
    let logical_id = format!("{}{}", tier.name, index);
    let route_table = format!("{}RouteTable", logical_id);

    template.add_resource(
        network_resource("AWS::EC2::Subnet", &logical_id)
            .with_property("VpcId", Value::reference(VPC))
            .with_property("AvailabilityZone", zone)
            .with_property("CidrBlock", cidr.to_string())
            .with_property("MapPublicIpOnLaunch", tier.subnet_type == SubnetType::Public)
            .with_name_tag(format!("{}/{}", VPC, logical_id))
            .with_tag(TIER_TAG, tier.subnet_type.as_str()),
    )?;
    template.add_resource(
        network_resource("AWS::EC2::RouteTable", &route_table)
            .with_property("VpcId", Value::reference(VPC))
            .with_name_tag(format!("{}/{}", VPC, logical_id)),
    )?;
    template.add_resource(
        network_resource(
            "AWS::EC2::SubnetRouteTableAssociation",
            &format!("{}RouteTableAssociation", logical_id),
        )
        .with_property("SubnetId", Value::reference(&logical_id))
        .with_property("RouteTableId", Value::reference(&route_table)),
    )?;

    Ok(Subnet {
        logical_id,
        subnet_type: tier.subnet_type,
        availability_zone: zone.to_string(),
        cidr,
        route_table,
    })
}

fn add_nat_instance(template: &mut Template, spec: &NetworkSpec, network: &Network) -> Result<()> {
    let subnet = network.first_subnet(SubnetType::Public)?;

    template.add_resource(
        network_resource("AWS::EC2::SecurityGroup", NAT_SECURITY_GROUP)
            .with_property("GroupDescription", "Odin NAT instance: traffic from inside the VPC")
            .with_property("VpcId", network.vpc_id())
            .with_property(
                "SecurityGroupIngress",
                Value::list([Value::map([
                    ("IpProtocol", Value::from("-1")),
                    ("CidrIp", Value::from(spec.cidr.to_string())),
                    ("Description", Value::from("All traffic from the VPC")),
                ])]),
            )
            .with_property(
                "SecurityGroupEgress",
                Value::list([Value::map([
                    ("IpProtocol", Value::from("-1")),
                    ("CidrIp", Value::from(DEFAULT_ROUTE)),
                    ("Description", Value::from("All outbound traffic")),
                ])]),
            )
            .with_name_tag(format!("{}/NatSecurityGroup", VPC)),
    )?;

    let image = match &spec.nat_image {
        NatImage::Ami(ami) => Value::from(ami),
        NatImage::Latest => {
            template.add_parameter(
                NAT_IMAGE_PARAMETER,
                Parameter::new("AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>")
                    .with_default(NAT_IMAGE_SSM_PATH)
                    .with_description("Machine image of the NAT instance"),
            )?;
            Value::reference(NAT_IMAGE_PARAMETER)
        }
    };

    let user_data = UserData::for_linux().add_commands(nat_commands(&spec.cidr.to_string()));
    template.add_resource(
        network_resource("AWS::EC2::Instance", NAT_INSTANCE)
            .with_property("ImageId", image)
            .with_property("InstanceType", spec.nat_instance_type.as_str())
            .with_property("AvailabilityZone", subnet.availability_zone.as_str())
            .with_property("SubnetId", subnet.id())
            .with_property("SourceDestCheck", false)
            .with_property(
                "SecurityGroupIds",
                Value::list([Value::get_att(NAT_SECURITY_GROUP, "GroupId")]),
            )
            .with_property("UserData", user_data.to_value())
            .with_name_tag(format!("{}/NatInstance", VPC))
            .depends_on(format!("{}DefaultRoute", subnet.logical_id)),
    )?;

    template.add_resource(
        network_resource("AWS::EC2::EIPAssociation", NAT_EIP_ASSOCIATION)
            .with_property("AllocationId", spec.nat_eip_allocation_id.as_str())
            .with_property("InstanceId", Value::reference(NAT_INSTANCE)),
    )?;

    Ok(())
}
