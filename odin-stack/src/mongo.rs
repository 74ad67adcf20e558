//! OdinMongo - document database host on a pre-existing data volume

use odin_core::resource::{Resource, Value};
use odin_core::template::Template;

use crate::component;
use crate::config::OdinConfig;
use crate::error::{Result, StackError};
use crate::host::{Host, HostSpec, IngressRule, add_host};
use crate::network::{Network, SubnetType};
use crate::user_data::{UserData, awslogs_commands, mongodb_repo_command};

pub const NAME: &str = "OdinMongo";
pub const LOG_GROUP_NAME: &str = "/Odin/Mongo";
pub const MONGO_PORT: u16 = 27017;
const DATA_DIR: &str = "/data/mongodb";
const VOLUME_ATTACHMENT: &str = "OdinMongoDataVolumeAttachment";

/// Boot script: install MongoDB, move its data onto the attached volume,
/// listen on all interfaces and ship logs
pub fn user_data(region: &str, device: &str) -> UserData {
    UserData::for_linux()
        .add_command(mongodb_repo_command())
        .add_commands([
            "yum update -y".to_string(),
            "yum install -y mongodb-org awslogs".to_string(),
            "service mongod stop".to_string(),
            format!("mkdir -p {}", DATA_DIR),
            format!("mount {} {}", device, DATA_DIR),
            format!("chown mongod:mongod {}", DATA_DIR),
            format!("sed -i 's|/var/lib/mongo|{}|g' /etc/mongod.conf", DATA_DIR),
            "sed -i 's|127.0.0.1|0.0.0.0|g' /etc/mongod.conf".to_string(),
            "service mongod start".to_string(),
        ])
        .add_commands(awslogs_commands(region, LOG_GROUP_NAME))
}

pub fn build_mongo(template: &mut Template, config: &OdinConfig, network: &Network) -> Result<Host> {
    let image_id = config
        .machine_image()
        .ok_or_else(|| StackError::MissingMachineImage {
            region: config.region.clone(),
            role: NAME.to_string(),
        })?;
    // The volume cannot move, so the instance follows it
    let subnet = network.subnet_in(SubnetType::PrivateWithEgress, &config.mongo.availability_zone)?;

    let host = add_host(
        template,
        network,
        HostSpec {
            name: NAME,
            component: component::MONGO,
            instance_type: &config.mongo.instance_type,
            image_id,
            key_pair: &config.key_pair,
            subnet,
            ingress: vec![
                IngressRule::tcp(22, &config.mongo.ssh_ingress_cidr, "SSH"),
                IngressRule::tcp(MONGO_PORT, &config.mongo.client_ingress_cidr, "MongoDB clients"),
            ],
            managed_policies: vec!["CloudWatchLogsFullAccess"],
            log_group_name: LOG_GROUP_NAME,
            user_data: user_data(&config.region, &config.mongo.device),
        },
    )?;

    template.add_resource(
        Resource::new("AWS::EC2::VolumeAttachment", VOLUME_ATTACHMENT)
            .with_property("Device", config.mongo.device.as_str())
            .with_property("InstanceId", Value::reference(&host.instance))
            .with_property("VolumeId", config.mongo.data_volume_id.as_str())
            .with_component(component::MONGO)
            .depends_on(&host.instance),
    )?;

    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::minimal;
    use crate::network::{NetworkSpec, build_network};

    fn build(config: &OdinConfig) -> Result<(Template, Host)> {
        let mut template = Template::new();
        let network = build_network(&mut template, &NetworkSpec::from_config(config)?)?;
        let host = build_mongo(&mut template, config, &network)?;
        Ok((template, host))
    }

    #[test]
    fn instance_follows_the_volume_zone() {
        let mut config = minimal();
        config.mongo.availability_zone = "eu-north-1b".to_string();
        let (template, host) = build(&config).unwrap();

        let instance = template.resource(NAME).unwrap();
        assert_eq!(
            instance.property("AvailabilityZone").and_then(Value::as_str),
            Some("eu-north-1b")
        );
        assert_eq!(
            instance.property("SubnetId"),
            Some(&Value::reference("OdinPrivateNATSubnet2"))
        );
        assert_eq!(host.availability_zone, config.mongo.availability_zone);
    }

    #[test]
    fn volume_attachment_waits_for_the_instance() {
        let (template, _) = build(&minimal()).unwrap();
        let attachment = template.resource(VOLUME_ATTACHMENT).unwrap();
        assert!(attachment.depends_on.contains(NAME));
        assert_eq!(
            attachment.property("VolumeId").and_then(Value::as_str),
            Some("vol-0123456789abcdef0")
        );
        assert_eq!(
            attachment.property("Device").and_then(Value::as_str),
            Some("/dev/sdf")
        );
    }

    #[test]
    fn volume_zone_outside_network_fails() {
        let mut config = minimal();
        config.mongo.availability_zone = "eu-north-1c".to_string();
        assert!(matches!(build(&config), Err(StackError::NoSubnet { .. })));
    }

    #[test]
    fn missing_image_fails() {
        let mut config = minimal();
        config.machine_images.clear();
        assert!(matches!(
            build(&config),
            Err(StackError::MissingMachineImage { .. })
        ));
    }

    #[test]
    fn startup_script_order() {
        let commands = user_data("eu-north-1", "/dev/sdf").commands().to_vec();
        let position = |needle: &str| {
            commands
                .iter()
                .position(|c| c.contains(needle))
                .unwrap_or_else(|| panic!("missing {}", needle))
        };
        assert_eq!(position("mongodb-org-6.0.repo"), 0);
        assert!(position("service mongod stop") < position("mount /dev/sdf /data/mongodb"));
        assert!(position("chown mongod:mongod") < position("service mongod start"));
        assert!(position("127.0.0.1|0.0.0.0") < position("service mongod start"));
        assert!(position("log_group_name = /Odin/Mongo") < position("service awslogs start"));

        // Every occurrence on a line is rewritten
        assert!(commands.contains(
            &"sed -i 's|/var/lib/mongo|/data/mongodb|g' /etc/mongod.conf".to_string()
        ));
        assert!(commands.contains(&"sed -i 's|127.0.0.1|0.0.0.0|g' /etc/mongod.conf".to_string()));
    }
}
