//! Route 53 resource schema definitions

use odin_core::schema::{AttributeSchema, ResourceSchema, types};

use super::types::{boolean, enum_of, list_of, string, struct_of};

pub fn hosted_zone() -> ResourceSchema {
    ResourceSchema::new("AWS::Route53::HostedZone")
        .attribute(string("Name").required())
        .attribute(AttributeSchema::new(
            "VPCs",
            list_of(struct_of(
                "VPC",
                vec![string("VPCId").required(), string("VPCRegion").required()],
            )),
        ))
        .attribute(AttributeSchema::new(
            "HostedZoneConfig",
            struct_of("HostedZoneConfig", vec![string("Comment")]),
        ))
}

pub fn record_set() -> ResourceSchema {
    ResourceSchema::new("AWS::Route53::RecordSet")
        .attribute(string("HostedZoneId"))
        .attribute(string("HostedZoneName"))
        .attribute(string("Name").required())
        .attribute(
            AttributeSchema::new("Type", enum_of(&["A", "AAAA", "CNAME", "MX", "TXT"])).required(),
        )
        .attribute(string("TTL"))
        .attribute(AttributeSchema::new("ResourceRecords", types::string_list()))
        .attribute(AttributeSchema::new(
            "AliasTarget",
            struct_of(
                "AliasTarget",
                vec![
                    string("DNSName").required(),
                    string("HostedZoneId").required(),
                    boolean("EvaluateTargetHealth"),
                ],
            ),
        ))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![hosted_zone(), record_set()]
}
