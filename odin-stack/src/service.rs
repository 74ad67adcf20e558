//! Odin API - Fargate service behind an HTTPS application load balancer
//!
//! The task reads its configuration from SSM parameters and talks to the
//! database host over its private address. Two target-tracking policies
//! scale the service between the configured bounds.

use std::collections::BTreeMap;

use odin_core::resource::{Resource, Value};
use odin_core::template::{Output, Template};

use crate::buckets::grant_read_buckets;
use crate::component;
use crate::config::{ApiConfig, OdinConfig, ScalingTrigger};
use crate::error::Result;
use crate::host::Host;
use crate::iam;
use crate::logs;
use crate::network::{Network, SubnetType};
use crate::parameters;

pub const CLUSTER: &str = "OdinApiCluster";
pub const SERVICE: &str = "OdinFargateService";
pub const CONTAINER: &str = "OdinAPIContainer";
pub const TASK_DEFINITION: &str = "OdinAPITaskDefinition";
pub const LOAD_BALANCER: &str = "OdinServiceLB";
pub const TARGET_GROUP: &str = "OdinServiceTargetGroup";
pub const SCALABLE_TARGET: &str = "OdinServiceScalableTarget";
pub const LOG_GROUP_NAME: &str = "/Odin/OdinApi";

const LOG_GROUP: &str = "OdinClusterLogGroup";
const EXECUTION_ROLE: &str = "OdinAPITaskDefinitionExecutionRole";
const TASK_ROLE: &str = "OdinAPITaskDefinitionTaskRole";
const TASK_ROLE_BUCKETS: &str = "OdinAPITaskDefinitionTaskRoleBuckets";
const LB_SECURITY_GROUP: &str = "OdinServiceLBSecurityGroup";
const SERVICE_SECURITY_GROUP: &str = "OdinServiceSecurityGroup";
const HTTPS_LISTENER: &str = "OdinServiceLBHttpsListener";
const HTTP_LISTENER: &str = "OdinServiceLBHttpRedirectListener";
const CPU_SCALING: &str = "OdinServiceCpuScaling";
const REQUEST_SCALING: &str = "OdinServiceRequestScaling";

const PORT_NAME: &str = "odinapi";
const APP_PROTOCOL: &str = "http2";
const STREAM_PREFIX: &str = "OdinAPI";
const HEALTH_CHECK_INTERVAL: i64 = 120;
const HEALTH_CHECK_TIMEOUT: i64 = 20;
const HEALTH_CHECK_RETRIES: i64 = 5;
const HEALTHY_THRESHOLD: i64 = 2;
const UNHEALTHY_THRESHOLD: i64 = 7;
const HEALTH_CHECK_GRACE_PERIOD: i64 = 60;

/// Logical ids other parts of the topology point at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiService {
    pub cluster: String,
    pub service: String,
    pub load_balancer: String,
    pub target_group: String,
    pub scalable_target: String,
}

impl ApiService {
    pub fn load_balancer_dns(&self) -> Value {
        Value::get_att(&self.load_balancer, "DNSName")
    }
}

/// Environment of the API container
pub fn container_environment(mongo: &Host) -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("SECRET_KEY".to_string(), parameters::SECRET_KEY.value()),
        ("ODIN_API_PRODUCTION".to_string(), Value::from("1")),
        ("ODINAPI_MONGODB_USERNAME".to_string(), parameters::MONGO_USER.value()),
        ("ODINAPI_MONGODB_PASSWORD".to_string(), parameters::MONGO_PASSWORD.value()),
        ("ODINAPI_MONGODB_HOST".to_string(), mongo.private_ip()),
        ("PGHOST".to_string(), parameters::PG_HOST.value()),
        ("PGDBNAME".to_string(), parameters::PG_DBNAME.value()),
        ("PGUSER".to_string(), parameters::PG_USER.value()),
        ("PGPASS".to_string(), parameters::PG_PASS.value()),
    ])
}

/// `<account>.dkr.ecr.<region>.<suffix>/<repository>:<tag>`
fn image(config: &OdinConfig) -> Value {
    Value::join(
        "",
        vec![
            Value::from(format!("{}.dkr.ecr.", config.account)),
            Value::reference("AWS::Region"),
            Value::from("."),
            Value::reference("AWS::URLSuffix"),
            Value::from(format!("/{}:{}", config.api.repository, config.api.image_tag)),
        ],
    )
}

fn api_resource(resource_type: &str, logical_id: &str) -> Resource {
    Resource::new(resource_type, logical_id).with_component(component::API)
}

fn container_definition(config: &OdinConfig, mongo: &Host) -> Value {
    let api = &config.api;
    let environment = container_environment(mongo)
        .into_iter()
        .map(|(name, value)| Value::map([("Name", Value::String(name)), ("Value", value)]))
        .collect::<Vec<_>>();

    Value::map([
        ("Name", Value::from(CONTAINER)),
        ("Image", image(config)),
        ("Essential", Value::from(true)),
        (
            "PortMappings",
            Value::list([Value::map([
                ("ContainerPort", Value::from(api.container_port)),
                ("Protocol", Value::from("tcp")),
                ("Name", Value::from(PORT_NAME)),
                ("AppProtocol", Value::from(APP_PROTOCOL)),
            ])]),
        ),
        ("Environment", Value::List(environment)),
        (
            "HealthCheck",
            Value::map([
                (
                    "Command",
                    Value::list([
                        "CMD-SHELL".to_string(),
                        format!(
                            "curl -f http://localhost:{}{} || exit 1",
                            api.container_port, api.health_check_path
                        ),
                    ]),
                ),
                ("Interval", Value::from(HEALTH_CHECK_INTERVAL)),
                ("Timeout", Value::from(HEALTH_CHECK_TIMEOUT)),
                ("Retries", Value::from(HEALTH_CHECK_RETRIES)),
            ]),
        ),
        (
            "LogConfiguration",
            Value::map([
                ("LogDriver", Value::from("awslogs")),
                (
                    "Options",
                    Value::map([
                        ("awslogs-group", Value::reference(LOG_GROUP)),
                        ("awslogs-region", Value::reference("AWS::Region")),
                        ("awslogs-stream-prefix", Value::from(STREAM_PREFIX)),
                    ]),
                ),
            ]),
        ),
    ])
}

fn add_task_definition(template: &mut Template, config: &OdinConfig, mongo: &Host) -> Result<()> {
    template.add_resource(
        logs::log_group(LOG_GROUP, LOG_GROUP_NAME).with_component(component::API),
    )?;

    template.add_resource(
        iam::service_role(
            EXECUTION_ROLE,
            "ecs-tasks.amazonaws.com",
            &["service-role/AmazonECSTaskExecutionRolePolicy"],
        )
        .with_component(component::API),
    )?;
    template.add_resource(
        iam::service_role(TASK_ROLE, "ecs-tasks.amazonaws.com", &[]).with_component(component::API),
    )?;
    grant_read_buckets(
        template,
        TASK_ROLE_BUCKETS,
        TASK_ROLE,
        component::API,
        &config.api.buckets,
    )?;

    template.add_resource(
        api_resource("AWS::ECS::TaskDefinition", TASK_DEFINITION)
            .with_property("Family", TASK_DEFINITION)
            // Fargate takes CPU and memory as strings
            .with_property("Cpu", config.api.cpu.to_string())
            .with_property("Memory", config.api.memory_mib.to_string())
            .with_property("NetworkMode", "awsvpc")
            .with_property("RequiresCompatibilities", Value::list(["FARGATE"]))
            .with_property("ExecutionRoleArn", Value::get_att(EXECUTION_ROLE, "Arn"))
            .with_property("TaskRoleArn", Value::get_att(TASK_ROLE, "Arn"))
            .with_property(
                "ContainerDefinitions",
                Value::list([container_definition(config, mongo)]),
            ),
    )?;
    Ok(())
}

fn ingress_from_cidr(port: u16, description: &str) -> Value {
    Value::map([
        ("IpProtocol", Value::from("tcp")),
        ("FromPort", Value::from(port)),
        ("ToPort", Value::from(port)),
        ("CidrIp", Value::from("0.0.0.0/0")),
        ("Description", Value::from(description)),
    ])
}

fn egress_anywhere() -> Value {
    Value::list([Value::map([
        ("IpProtocol", Value::from("-1")),
        ("CidrIp", Value::from("0.0.0.0/0")),
        ("Description", Value::from("All outbound traffic")),
    ])])
}

fn add_load_balancer(template: &mut Template, config: &OdinConfig, network: &Network) -> Result<()> {
    let api = &config.api;

    template.add_resource(
        api_resource("AWS::EC2::SecurityGroup", LB_SECURITY_GROUP)
            .with_property("GroupDescription", "Odin API load balancer")
            .with_property("VpcId", network.vpc_id())
            .with_property(
                "SecurityGroupIngress",
                Value::list([
                    ingress_from_cidr(443, "HTTPS"),
                    ingress_from_cidr(80, "HTTP, redirected to HTTPS"),
                ]),
            )
            .with_property("SecurityGroupEgress", egress_anywhere()),
    )?;
    template.add_resource(
        api_resource("AWS::EC2::SecurityGroup", SERVICE_SECURITY_GROUP)
            .with_property("GroupDescription", "Odin API tasks")
            .with_property("VpcId", network.vpc_id())
            .with_property(
                "SecurityGroupIngress",
                Value::list([Value::map([
                    ("IpProtocol", Value::from("tcp")),
                    ("FromPort", Value::from(api.container_port)),
                    ("ToPort", Value::from(api.container_port)),
                    (
                        "SourceSecurityGroupId",
                        Value::get_att(LB_SECURITY_GROUP, "GroupId"),
                    ),
                    ("Description", Value::from("Load balancer to API")),
                ])]),
            )
            .with_property("SecurityGroupEgress", egress_anywhere()),
    )?;

    template.add_resource(
        api_resource("AWS::ElasticLoadBalancingV2::LoadBalancer", LOAD_BALANCER)
            .with_property("Type", "application")
            .with_property("Scheme", "internet-facing")
            .with_property("Subnets", network.subnet_ids(SubnetType::Public))
            .with_property(
                "SecurityGroups",
                Value::list([Value::get_att(LB_SECURITY_GROUP, "GroupId")]),
            )
            .with_property(
                "LoadBalancerAttributes",
                Value::list([Value::map([
                    ("Key", Value::from("idle_timeout.timeout_seconds")),
                    ("Value", Value::from(api.idle_timeout_secs.to_string())),
                ])]),
            ),
    )?;

    template.add_resource(
        api_resource("AWS::ElasticLoadBalancingV2::TargetGroup", TARGET_GROUP)
            .with_property("TargetType", "ip")
            .with_property("Protocol", "HTTP")
            .with_property("Port", api.container_port)
            .with_property("VpcId", network.vpc_id())
            .with_property("HealthCheckPath", api.health_check_path.as_str())
            .with_property("HealthCheckIntervalSeconds", HEALTH_CHECK_INTERVAL)
            .with_property("HealthCheckTimeoutSeconds", HEALTH_CHECK_TIMEOUT)
            .with_property("HealthyThresholdCount", HEALTHY_THRESHOLD)
            .with_property("UnhealthyThresholdCount", UNHEALTHY_THRESHOLD),
    )?;

    template.add_resource(
        api_resource("AWS::ElasticLoadBalancingV2::Listener", HTTPS_LISTENER)
            .with_property("LoadBalancerArn", Value::reference(LOAD_BALANCER))
            .with_property("Port", 443i64)
            .with_property("Protocol", "HTTPS")
            .with_property(
                "Certificates",
                Value::list([Value::map([(
                    "CertificateArn",
                    Value::from(config.certificate_arn.as_str()),
                )])]),
            )
            .with_property(
                "DefaultActions",
                Value::list([Value::map([
                    ("Type", Value::from("forward")),
                    ("TargetGroupArn", Value::reference(TARGET_GROUP)),
                ])]),
            ),
    )?;
    template.add_resource(
        api_resource("AWS::ElasticLoadBalancingV2::Listener", HTTP_LISTENER)
            .with_property("LoadBalancerArn", Value::reference(LOAD_BALANCER))
            .with_property("Port", 80i64)
            .with_property("Protocol", "HTTP")
            .with_property(
                "DefaultActions",
                Value::list([Value::map([
                    ("Type", Value::from("redirect")),
                    (
                        "RedirectConfig",
                        Value::map([
                            ("Protocol", "HTTPS"),
                            ("Port", "443"),
                            ("StatusCode", "HTTP_301"),
                        ]),
                    ),
                ])]),
            ),
    )?;
    Ok(())
}

fn target_tracking(
    logical_id: &str,
    trigger: &ScalingTrigger,
    metric: Value,
) -> Resource {
    api_resource("AWS::ApplicationAutoScaling::ScalingPolicy", logical_id)
        .with_property("PolicyName", logical_id)
        .with_property("PolicyType", "TargetTrackingScaling")
        .with_property("ScalingTargetId", Value::reference(SCALABLE_TARGET))
        .with_property(
            "TargetTrackingScalingPolicyConfiguration",
            Value::map([
                ("TargetValue", Value::from(trigger.target)),
                ("ScaleInCooldown", Value::from(trigger.scale_in_cooldown_secs)),
                ("ScaleOutCooldown", Value::from(trigger.scale_out_cooldown_secs)),
                ("PredefinedMetricSpecification", metric),
            ]),
        )
}

fn add_scaling(template: &mut Template, api: &ApiConfig) -> Result<()> {
    // Bounds come from config only; triggers never move them
    template.add_resource(
        api_resource("AWS::ApplicationAutoScaling::ScalableTarget", SCALABLE_TARGET)
            .with_property("MinCapacity", api.min_capacity)
            .with_property("MaxCapacity", api.max_capacity)
            .with_property("ServiceNamespace", "ecs")
            .with_property("ScalableDimension", "ecs:service:DesiredCount")
            .with_property(
                "ResourceId",
                Value::join(
                    "/",
                    vec![
                        Value::from("service"),
                        Value::reference(CLUSTER),
                        Value::get_att(SERVICE, "Name"),
                    ],
                ),
            ),
    )?;

    template.add_resource(target_tracking(
        CPU_SCALING,
        &api.cpu_scaling,
        Value::map([(
            "PredefinedMetricType",
            Value::from("ECSServiceAverageCPUUtilization"),
        )]),
    ))?;
    template.add_resource(target_tracking(
        REQUEST_SCALING,
        &api.request_scaling,
        Value::map([
            ("PredefinedMetricType", Value::from("ALBRequestCountPerTarget")),
            (
                "ResourceLabel",
                Value::join(
                    "/",
                    vec![
                        Value::get_att(LOAD_BALANCER, "LoadBalancerFullName"),
                        Value::get_att(TARGET_GROUP, "TargetGroupFullName"),
                    ],
                ),
            ),
        ]),
    ))?;
    Ok(())
}

/// Add the cluster, task, load balancer, service and scaling to `template`
pub fn build_api_service(
    template: &mut Template,
    config: &OdinConfig,
    network: &Network,
    mongo: &Host,
) -> Result<ApiService> {
    let api = &config.api;

    template.add_resource(
        api_resource("AWS::ECS::Cluster", CLUSTER).with_property("ClusterName", CLUSTER),
    )?;
    add_task_definition(template, config, mongo)?;
    add_load_balancer(template, config, network)?;

    template.add_resource(
        api_resource("AWS::ECS::Service", SERVICE)
            .with_property("ServiceName", SERVICE)
            .with_property("Cluster", Value::reference(CLUSTER))
            .with_property("TaskDefinition", Value::reference(TASK_DEFINITION))
            .with_property("LaunchType", "FARGATE")
            .with_property("DesiredCount", api.desired_count)
            .with_property("HealthCheckGracePeriodSeconds", HEALTH_CHECK_GRACE_PERIOD)
            .with_property(
                "DeploymentConfiguration",
                Value::map([
                    ("MaximumPercent", Value::from(200i64)),
                    ("MinimumHealthyPercent", Value::from(50i64)),
                ]),
            )
            .with_property(
                "NetworkConfiguration",
                Value::map([(
                    "AwsvpcConfiguration",
                    Value::map([
                        ("AssignPublicIp", Value::from("DISABLED")),
                        ("Subnets", network.subnet_ids(SubnetType::PrivateWithEgress)),
                        (
                            "SecurityGroups",
                            Value::list([Value::get_att(SERVICE_SECURITY_GROUP, "GroupId")]),
                        ),
                    ]),
                )]),
            )
            .with_property(
                "LoadBalancers",
                Value::list([Value::map([
                    ("ContainerName", Value::from(CONTAINER)),
                    ("ContainerPort", Value::from(api.container_port)),
                    ("TargetGroupArn", Value::reference(TARGET_GROUP)),
                ])]),
            )
            // A target group must be attached to a listener before a service uses it
            .depends_on(HTTPS_LISTENER)
            .depends_on(HTTP_LISTENER),
    )?;

    add_scaling(template, api)?;

    template.add_output(
        "OdinServiceLoadBalancerDNS",
        Output::new(Value::get_att(LOAD_BALANCER, "DNSName"))
            .with_description("Odin API load balancer DNS name"),
    )?;
    template.add_output(
        "OdinServiceServiceURL",
        Output::new(Value::from(format!("https://{}/rest_api/", config.domain_name)))
            .with_description("Public Odin API URL"),
    )?;

    Ok(ApiService {
        cluster: CLUSTER.to_string(),
        service: SERVICE.to_string(),
        load_balancer: LOAD_BALANCER.to_string(),
        target_group: TARGET_GROUP.to_string(),
        scalable_target: SCALABLE_TARGET.to_string(),
    })
}
