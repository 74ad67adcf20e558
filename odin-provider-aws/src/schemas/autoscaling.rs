//! Application Auto Scaling resource schema definitions

use odin_core::schema::{AttributeSchema, ResourceSchema, types};

use super::types::{boolean, enum_of, integer, string, struct_of};

pub fn scalable_target() -> ResourceSchema {
    ResourceSchema::new("AWS::ApplicationAutoScaling::ScalableTarget")
        .attribute(integer("MinCapacity").required())
        .attribute(AttributeSchema::new("MaxCapacity", types::positive_int()).required())
        .attribute(string("ResourceId").required())
        .attribute(string("ScalableDimension").required())
        .attribute(string("ServiceNamespace").required())
        .attribute(string("RoleARN"))
}

pub fn scaling_policy() -> ResourceSchema {
    ResourceSchema::new("AWS::ApplicationAutoScaling::ScalingPolicy")
        .attribute(string("PolicyName").required())
        .attribute(AttributeSchema::new(
            "PolicyType",
            enum_of(&["StepScaling", "TargetTrackingScaling"]),
        ).required())
        .attribute(string("ScalingTargetId"))
        .attribute(AttributeSchema::new(
            "TargetTrackingScalingPolicyConfiguration",
            struct_of(
                "TargetTrackingScalingPolicyConfiguration",
                vec![
                    AttributeSchema::new("TargetValue", types::positive_int()).required(),
                    integer("ScaleInCooldown"),
                    integer("ScaleOutCooldown"),
                    boolean("DisableScaleIn"),
                    AttributeSchema::new(
                        "PredefinedMetricSpecification",
                        struct_of(
                            "PredefinedMetricSpecification",
                            vec![
                                AttributeSchema::new(
                                    "PredefinedMetricType",
                                    enum_of(&[
                                        "ECSServiceAverageCPUUtilization",
                                        "ECSServiceAverageMemoryUtilization",
                                        "ALBRequestCountPerTarget",
                                    ]),
                                )
                                .required(),
                                string("ResourceLabel"),
                            ],
                        ),
                    ),
                ],
            ),
        ))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![scalable_target(), scaling_policy()]
}
