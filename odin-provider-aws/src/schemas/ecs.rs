//! ECS resource schema definitions

use odin_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types::{boolean, enum_of, integer, list_of, string, struct_of};

fn container_definition() -> AttributeType {
    struct_of(
        "ContainerDefinition",
        vec![
            string("Name").required(),
            string("Image").required(),
            boolean("Essential"),
            AttributeSchema::new(
                "PortMappings",
                list_of(struct_of(
                    "PortMapping",
                    vec![
                        AttributeSchema::new("ContainerPort", types::port()).required(),
                        AttributeSchema::new("Protocol", enum_of(&["tcp", "udp"])),
                        string("Name"),
                        AttributeSchema::new("AppProtocol", enum_of(&["http", "http2", "grpc"])),
                    ],
                )),
            ),
            AttributeSchema::new(
                "Environment",
                list_of(struct_of(
                    "KeyValuePair",
                    vec![string("Name").required(), string("Value").required()],
                )),
            ),
            AttributeSchema::new(
                "HealthCheck",
                struct_of(
                    "HealthCheck",
                    vec![
                        AttributeSchema::new("Command", types::string_list()).required(),
                        AttributeSchema::new("Interval", types::positive_int()),
                        AttributeSchema::new("Timeout", types::positive_int()),
                        AttributeSchema::new("Retries", types::positive_int()),
                        integer("StartPeriod"),
                    ],
                ),
            ),
            AttributeSchema::new(
                "LogConfiguration",
                struct_of(
                    "LogConfiguration",
                    vec![
                        string("LogDriver").required(),
                        AttributeSchema::new("Options", AttributeType::Map(Box::new(AttributeType::String))),
                    ],
                ),
            ),
        ],
    )
}

pub fn cluster() -> ResourceSchema {
    ResourceSchema::new("AWS::ECS::Cluster")
        .attribute(string("ClusterName"))
        .attribute(AttributeSchema::new("Tags", types::tags()))
}

pub fn task_definition() -> ResourceSchema {
    ResourceSchema::new("AWS::ECS::TaskDefinition")
        .attribute(string("Family"))
        .attribute(string("Cpu"))
        .attribute(string("Memory"))
        .attribute(AttributeSchema::new(
            "NetworkMode",
            enum_of(&["awsvpc", "bridge", "host", "none"]),
        ))
        .attribute(AttributeSchema::new("RequiresCompatibilities", types::string_list()))
        .attribute(string("ExecutionRoleArn"))
        .attribute(string("TaskRoleArn"))
        .attribute(AttributeSchema::new(
            "ContainerDefinitions",
            list_of(container_definition()),
        ))
}

pub fn service() -> ResourceSchema {
    ResourceSchema::new("AWS::ECS::Service")
        .attribute(string("ServiceName"))
        .attribute(string("Cluster"))
        .attribute(string("TaskDefinition"))
        .attribute(AttributeSchema::new(
            "LaunchType",
            enum_of(&["EC2", "FARGATE", "EXTERNAL"]),
        ))
        .attribute(integer("DesiredCount"))
        .attribute(integer("HealthCheckGracePeriodSeconds"))
        .attribute(AttributeSchema::new(
            "DeploymentConfiguration",
            struct_of(
                "DeploymentConfiguration",
                vec![integer("MaximumPercent"), integer("MinimumHealthyPercent")],
            ),
        ))
        .attribute(AttributeSchema::new(
            "NetworkConfiguration",
            struct_of(
                "NetworkConfiguration",
                vec![AttributeSchema::new(
                    "AwsvpcConfiguration",
                    struct_of(
                        "AwsVpcConfiguration",
                        vec![
                            AttributeSchema::new("AssignPublicIp", enum_of(&["ENABLED", "DISABLED"])),
                            AttributeSchema::new("Subnets", types::string_list()).required(),
                            AttributeSchema::new("SecurityGroups", types::string_list()),
                        ],
                    ),
                )],
            ),
        ))
        .attribute(AttributeSchema::new(
            "LoadBalancers",
            list_of(struct_of(
                "LoadBalancer",
                vec![
                    string("ContainerName"),
                    AttributeSchema::new("ContainerPort", types::port()),
                    string("TargetGroupArn"),
                ],
            )),
        ))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![cluster(), task_definition(), service()]
}
