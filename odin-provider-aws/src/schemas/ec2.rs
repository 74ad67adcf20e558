//! EC2 resource schema definitions

use odin_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types::{
    availability_zone, boolean, enum_of, instance_type, list_of, security_group_rule, string,
};

fn tags() -> AttributeSchema {
    AttributeSchema::new("Tags", types::tags())
}

pub fn vpc() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::VPC")
        .with_description("Virtual private cloud")
        .attribute(AttributeSchema::new("CidrBlock", types::cidr()).required())
        .attribute(boolean("EnableDnsHostnames"))
        .attribute(boolean("EnableDnsSupport"))
        .attribute(AttributeSchema::new(
            "InstanceTenancy",
            enum_of(&["default", "dedicated", "host"]),
        ))
        .attribute(tags())
}

pub fn internet_gateway() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::InternetGateway").attribute(tags())
}

pub fn vpc_gateway_attachment() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::VPCGatewayAttachment")
        .attribute(string("VpcId").required())
        .attribute(string("InternetGatewayId"))
        .attribute(string("VpnGatewayId"))
}

pub fn subnet() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::Subnet")
        .attribute(string("VpcId").required())
        .attribute(AttributeSchema::new("AvailabilityZone", availability_zone()))
        .attribute(AttributeSchema::new("CidrBlock", types::cidr()))
        .attribute(boolean("MapPublicIpOnLaunch"))
        .attribute(tags())
}

pub fn route_table() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::RouteTable")
        .attribute(string("VpcId").required())
        .attribute(tags())
}

pub fn subnet_route_table_association() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::SubnetRouteTableAssociation")
        .attribute(string("SubnetId").required())
        .attribute(string("RouteTableId").required())
}

pub fn route() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::Route")
        .attribute(string("RouteTableId").required())
        .attribute(AttributeSchema::new("DestinationCidrBlock", types::cidr()))
        .attribute(string("GatewayId"))
        .attribute(string("InstanceId"))
        .attribute(string("NatGatewayId"))
}

pub fn security_group() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::SecurityGroup")
        .attribute(string("GroupDescription").required())
        .attribute(string("GroupName"))
        .attribute(string("VpcId"))
        .attribute(AttributeSchema::new(
            "SecurityGroupIngress",
            list_of(security_group_rule("Ingress")),
        ))
        .attribute(AttributeSchema::new(
            "SecurityGroupEgress",
            list_of(security_group_rule("Egress")),
        ))
        .attribute(tags())
}

pub fn instance() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::Instance")
        .attribute(string("ImageId").required())
        .attribute(AttributeSchema::new("InstanceType", instance_type()).required())
        .attribute(string("KeyName"))
        .attribute(AttributeSchema::new("AvailabilityZone", availability_zone()))
        .attribute(string("SubnetId"))
        .attribute(AttributeSchema::new("SecurityGroupIds", types::string_list()))
        .attribute(string("IamInstanceProfile"))
        .attribute(AttributeSchema::new("UserData", AttributeType::String))
        .attribute(boolean("SourceDestCheck"))
        .attribute(tags())
}

pub fn eip_association() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::EIPAssociation")
        .attribute(string("AllocationId"))
        .attribute(string("InstanceId"))
        .attribute(string("NetworkInterfaceId"))
}

pub fn volume_attachment() -> ResourceSchema {
    ResourceSchema::new("AWS::EC2::VolumeAttachment")
        .with_description("Attaches an existing EBS volume")
        .attribute(string("Device").required())
        .attribute(string("InstanceId").required())
        .attribute(string("VolumeId").required())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        vpc(),
        internet_gateway(),
        vpc_gateway_attachment(),
        subnet(),
        route_table(),
        subnet_route_table_association(),
        route(),
        security_group(),
        instance(),
        eip_association(),
        volume_attachment(),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use odin_core::resource::Value;

    use super::*;

    #[test]
    fn security_group_rules_are_checked() {
        let schema = security_group();
        let mut props = BTreeMap::new();
        props.insert("GroupDescription".to_string(), Value::from("db"));
        props.insert(
            "SecurityGroupIngress".to_string(),
            Value::list([Value::map([
                ("IpProtocol", Value::from("tcp")),
                ("FromPort", Value::Int(27017)),
                ("ToPort", Value::Int(27017)),
                ("CidrIp", Value::from("0.0.0.0/0")),
            ])]),
        );
        assert!(schema.validate(&props).is_ok());

        props.insert(
            "SecurityGroupIngress".to_string(),
            Value::list([Value::map([
                ("IpProtocol", Value::from("tcp")),
                ("FromPort", Value::Int(70000)),
            ])]),
        );
        assert!(schema.validate(&props).is_err());
    }

    #[test]
    fn instance_requires_image_and_type() {
        let mut props = BTreeMap::new();
        props.insert("InstanceType".to_string(), Value::from("t3.large"));
        let errors = instance().validate(&props).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("ImageId"));
    }
}
