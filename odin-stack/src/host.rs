//! Host - EC2 instance with its security group, role and log group
//!
//! Both the database host and the admin host are built from a [`HostSpec`].

use odin_core::resource::{Resource, Value};
use odin_core::template::Template;

use crate::error::Result;
use crate::iam;
use crate::logs;
use crate::network::{Network, Subnet};
use crate::user_data::UserData;

/// TCP ingress rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub port: u16,
    pub cidr: String,
    pub description: String,
}

impl IngressRule {
    pub fn tcp(port: u16, cidr: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port,
            cidr: cidr.into(),
            description: description.into(),
        }
    }

    fn to_value(&self) -> Value {
        Value::map([
            ("IpProtocol", Value::from("tcp")),
            ("FromPort", Value::from(self.port)),
            ("ToPort", Value::from(self.port)),
            ("CidrIp", Value::from(self.cidr.as_str())),
            ("Description", Value::from(self.description.as_str())),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct HostSpec<'a> {
    /// Logical id prefix and `Name` tag
    pub name: &'a str,
    pub component: &'a str,
    pub instance_type: &'a str,
    pub image_id: &'a str,
    pub key_pair: &'a str,
    pub subnet: &'a Subnet,
    pub ingress: Vec<IngressRule>,
    pub managed_policies: Vec<&'a str>,
    pub log_group_name: &'a str,
    pub user_data: UserData,
}

/// Logical ids of what was built for a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub instance: String,
    pub security_group: String,
    pub role: String,
    pub instance_profile: String,
    pub log_group: String,
    pub availability_zone: String,
}

impl Host {
    pub fn private_ip(&self) -> Value {
        Value::get_att(&self.instance, "PrivateIp")
    }

    pub fn public_ip(&self) -> Value {
        Value::get_att(&self.instance, "PublicIp")
    }
}

/// Add a host and its supporting resources to `template`
pub fn add_host(template: &mut Template, network: &Network, spec: HostSpec<'_>) -> Result<Host> {
    let host = Host {
        instance: spec.name.to_string(),
        security_group: format!("{}SecurityGroup", spec.name),
        role: format!("{}InstanceRole", spec.name),
        instance_profile: format!("{}InstanceProfile", spec.name),
        log_group: format!("{}LogGroup", spec.name),
        availability_zone: spec.subnet.availability_zone.clone(),
    };

    template.add_resource(
        Resource::new("AWS::EC2::SecurityGroup", &host.security_group)
            .with_property("GroupDescription", format!("{} security group", spec.name))
            .with_property("VpcId", network.vpc_id())
            .with_property(
                "SecurityGroupIngress",
                Value::List(spec.ingress.iter().map(IngressRule::to_value).collect()),
            )
            .with_property(
                "SecurityGroupEgress",
                Value::list([Value::map([
                    ("IpProtocol", Value::from("-1")),
                    ("CidrIp", Value::from("0.0.0.0/0")),
                    ("Description", Value::from("All outbound traffic")),
                ])]),
            )
            .with_name_tag(spec.name)
            .with_component(spec.component),
    )?;

    template.add_resource(
        iam::service_role(&host.role, "ec2.amazonaws.com", &spec.managed_policies)
            .with_name_tag(spec.name)
            .with_component(spec.component),
    )?;
    template.add_resource(
        Resource::new("AWS::IAM::InstanceProfile", &host.instance_profile)
            .with_property("Roles", Value::list([Value::reference(&host.role)]))
            .with_component(spec.component),
    )?;

    template.add_resource(
        logs::log_group(&host.log_group, spec.log_group_name).with_component(spec.component),
    )?;

    let mut instance = Resource::new("AWS::EC2::Instance", &host.instance)
        .with_property("ImageId", spec.image_id)
        .with_property("InstanceType", spec.instance_type)
        .with_property("KeyName", spec.key_pair)
        .with_property("AvailabilityZone", host.availability_zone.as_str())
        .with_property("SubnetId", spec.subnet.id())
        .with_property(
            "SecurityGroupIds",
            Value::list([Value::get_att(&host.security_group, "GroupId")]),
        )
        .with_property("IamInstanceProfile", Value::reference(&host.instance_profile))
        .with_property("UserData", spec.user_data.to_value())
        .with_name_tag(spec.name)
        .with_component(spec.component)
        // Log shipping starts at boot
        .depends_on(&host.log_group);
    // The startup script installs packages, so the route out has to be up first
    for dependency in spec.subnet.egress_dependencies() {
        instance = instance.depends_on(dependency);
    }
    template.add_resource(instance)?;

    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::minimal;
    use crate::network::{NetworkSpec, SubnetType, build_network};

    #[test]
    fn host_gets_group_role_profile_and_logs() {
        let mut template = Template::new();
        let network =
            build_network(&mut template, &NetworkSpec::from_config(&minimal()).unwrap()).unwrap();
        let subnet = network.first_subnet(SubnetType::Public).unwrap();

        let host = add_host(
            &mut template,
            &network,
            HostSpec {
                name: "OdinTest",
                component: "test",
                instance_type: "t3.nano",
                image_id: "ami-1",
                key_pair: "key",
                subnet,
                ingress: vec![IngressRule::tcp(22, "0.0.0.0/0", "SSH")],
                managed_policies: vec!["CloudWatchLogsFullAccess"],
                log_group_name: "/Odin/Test",
                user_data: UserData::for_linux().add_command("true"),
            },
        )
        .unwrap();

        assert_eq!(host.availability_zone, "eu-north-1a");
        let instance = template.resource("OdinTest").unwrap();
        assert_eq!(instance.name_tag(), Some("OdinTest"));
        assert_eq!(instance.component(), Some("test"));
        assert_eq!(
            instance.property("IamInstanceProfile"),
            Some(&Value::reference("OdinTestInstanceProfile"))
        );
        assert!(template.resource("OdinTestLogGroup").is_some());

        let group = template.resource("OdinTestSecurityGroup").unwrap();
        let ingress = group.property("SecurityGroupIngress").and_then(Value::as_list).unwrap();
        assert_eq!(ingress[0].get("FromPort"), Some(&Value::Int(22)));

        assert_eq!(host.private_ip(), Value::get_att("OdinTest", "PrivateIp"));
        template.validate().unwrap();
    }
}
