//! DNS - private `odin` zone and the records pointing at the topology

use odin_core::resource::{Resource, Value};
use odin_core::template::Template;

use crate::component;
use crate::config::OdinConfig;
use crate::edge::{CLOUDFRONT_HOSTED_ZONE_ID, Edge};
use crate::error::Result;
use crate::host::Host;
use crate::network::Network;

pub const PRIVATE_ZONE: &str = "OdinPrivateZone";
pub const PRIVATE_ZONE_NAME: &str = "odin";
pub const DEFAULT_TTL: i64 = 1800;

/// Zone a record is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zone {
    /// Existing public zone, by hosted zone id
    Public { id: String, name: String },
    /// Zone created by this template, by logical id
    Private { logical_id: String, name: String },
}

impl Zone {
    pub fn name(&self) -> &str {
        match self {
            Zone::Public { name, .. } | Zone::Private { name, .. } => name,
        }
    }

    fn hosted_zone_id(&self) -> Value {
        match self {
            Zone::Public { id, .. } => Value::from(id.as_str()),
            Zone::Private { logical_id, .. } => Value::reference(logical_id),
        }
    }

    /// Fully qualified name of `record` inside this zone
    ///
    /// An empty record is the zone apex. A record already ending with the
    /// zone name is taken as is.
    pub fn fqdn(&self, record: &str) -> String {
        let zone = self.name().trim_end_matches('.');
        let record = record.trim_end_matches('.');
        if record.is_empty() || record == zone {
            format!("{}.", zone)
        } else if record.ends_with(&format!(".{}", zone)) {
            format!("{}.", record)
        } else {
            format!("{}.{}.", record, zone)
        }
    }
}

/// Where a record points
#[derive(Debug, Clone, PartialEq)]
pub enum RecordTarget {
    Addresses(Vec<Value>),
    Alias { dns_name: Value, hosted_zone_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ARecord {
    pub logical_id: String,
    pub zone: Zone,
    pub name: String,
    pub target: RecordTarget,
}

impl ARecord {
    pub fn to_resource(&self) -> Resource {
        let resource = Resource::new("AWS::Route53::RecordSet", &self.logical_id)
            .with_property("HostedZoneId", self.zone.hosted_zone_id())
            .with_property("Name", self.zone.fqdn(&self.name))
            .with_property("Type", "A")
            .with_component(component::DNS);
        match &self.target {
            RecordTarget::Addresses(addresses) => resource
                .with_property("TTL", DEFAULT_TTL.to_string())
                .with_property("ResourceRecords", Value::List(addresses.clone())),
            RecordTarget::Alias {
                dns_name,
                hosted_zone_id,
            } => resource.with_property(
                "AliasTarget",
                Value::map([
                    ("DNSName", dns_name.clone()),
                    ("HostedZoneId", Value::from(hosted_zone_id.as_str())),
                ]),
            ),
        }
    }
}

pub fn build_private_zone(template: &mut Template, network: &Network) -> Result<Zone> {
    template.add_resource(
        Resource::new("AWS::Route53::HostedZone", PRIVATE_ZONE)
            .with_property("Name", PRIVATE_ZONE_NAME)
            .with_property(
                "VPCs",
                Value::list([Value::map([
                    ("VPCId", network.vpc_id()),
                    ("VPCRegion", Value::reference("AWS::Region")),
                ])]),
            )
            .with_component(component::DNS),
    )?;
    Ok(Zone::Private {
        logical_id: PRIVATE_ZONE.to_string(),
        name: PRIVATE_ZONE_NAME.to_string(),
    })
}

/// Every record of the topology, each exactly once
pub fn records(
    config: &OdinConfig,
    private_zone: &Zone,
    mongo: &Host,
    admin: &Host,
    edge: &Edge,
) -> Vec<ARecord> {
    let public_zone = Zone::Public {
        id: config.hosted_zone_id.clone(),
        name: config.domain_name.clone(),
    };

    vec![
        ARecord {
            logical_id: "OdinUIAliasRecord".to_string(),
            zone: public_zone.clone(),
            name: String::new(),
            target: RecordTarget::Alias {
                dns_name: edge.domain_name(),
                hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_string(),
            },
        },
        ARecord {
            logical_id: "OdinAdminAliasRecord".to_string(),
            zone: public_zone,
            name: "admin".to_string(),
            target: RecordTarget::Addresses(vec![admin.public_ip()]),
        },
        ARecord {
            logical_id: "OdinAdminPrivateAliasRecord".to_string(),
            zone: private_zone.clone(),
            name: "admin".to_string(),
            target: RecordTarget::Addresses(vec![admin.private_ip()]),
        },
        ARecord {
            logical_id: "OdinMongoPrivateAliasRecord".to_string(),
            zone: private_zone.clone(),
            name: "mongo".to_string(),
            target: RecordTarget::Addresses(vec![mongo.private_ip()]),
        },
    ]
}

pub fn build_records(
    template: &mut Template,
    config: &OdinConfig,
    private_zone: &Zone,
    mongo: &Host,
    admin: &Host,
    edge: &Edge,
) -> Result<()> {
    for record in records(config, private_zone, mongo, admin, edge) {
        template.add_resource(record.to_resource())?;
    }
    Ok(())
}
