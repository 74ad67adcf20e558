//! OdinAdmin - small public host for administration and log access

use odin_core::template::Template;

use crate::component;
use crate::config::OdinConfig;
use crate::error::{Result, StackError};
use crate::host::{Host, HostSpec, IngressRule, add_host};
use crate::network::{Network, SubnetType};
use crate::user_data::{UserData, awslogs_commands, mongodb_repo_command};

pub const NAME: &str = "OdinAdmin";
pub const LOG_GROUP_NAME: &str = "/Odin/Admin";

pub fn user_data(region: &str) -> UserData {
    UserData::for_linux()
        .add_command(mongodb_repo_command())
        .add_commands(["yum update -y", "yum install -y mongodb-mongosh awslogs"])
        .add_commands(awslogs_commands(region, LOG_GROUP_NAME))
}

pub fn build_admin(template: &mut Template, config: &OdinConfig, network: &Network) -> Result<Host> {
    let image_id = config
        .machine_image()
        .ok_or_else(|| StackError::MissingMachineImage {
            region: config.region.clone(),
            role: NAME.to_string(),
        })?;

    add_host(
        template,
        network,
        HostSpec {
            name: NAME,
            component: component::ADMIN,
            instance_type: &config.admin.instance_type,
            image_id,
            key_pair: &config.key_pair,
            subnet: network.first_subnet(SubnetType::Public)?,
            ingress: vec![IngressRule::tcp(22, &config.admin.ssh_ingress_cidr, "SSH")],
            managed_policies: vec!["CloudWatchLogsFullAccess"],
            log_group_name: LOG_GROUP_NAME,
            user_data: user_data(&config.region),
        },
    )
}

#[cfg(test)]
mod tests {
    use odin_core::resource::Value;

    use super::*;
    use crate::config::tests::minimal;
    use crate::network::{NetworkSpec, build_network};

    #[test]
    fn admin_host_is_public_and_small() {
        let config = minimal();
        let mut template = Template::new();
        let network =
            build_network(&mut template, &NetworkSpec::from_config(&config).unwrap()).unwrap();
        let host = build_admin(&mut template, &config, &network).unwrap();

        let instance = template.resource(&host.instance).unwrap();
        assert_eq!(instance.name_tag(), Some("OdinAdmin"));
        assert_eq!(
            instance.property("InstanceType").and_then(Value::as_str),
            Some("t3.nano")
        );
        assert_eq!(
            instance.property("SubnetId"),
            Some(&Value::reference("OdinPublicSubnet1"))
        );
        assert_eq!(host.public_ip(), Value::get_att("OdinAdmin", "PublicIp"));
    }

    #[test]
    fn startup_installs_shell_and_ships_logs() {
        let script = user_data("eu-north-1").render();
        assert!(script.contains("yum install -y mongodb-mongosh awslogs"));
        assert!(script.contains("log_group_name = /Odin/Admin"));
        assert!(script.ends_with("chkconfig awslogs on"));
    }
}
