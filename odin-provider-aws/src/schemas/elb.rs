//! Elastic Load Balancing v2 resource schema definitions

use odin_core::schema::{AttributeSchema, ResourceSchema, types};

use super::types::{enum_of, integer, list_of, string, struct_of};

pub fn load_balancer() -> ResourceSchema {
    ResourceSchema::new("AWS::ElasticLoadBalancingV2::LoadBalancer")
        .attribute(string("Name"))
        .attribute(AttributeSchema::new("Type", enum_of(&["application", "network", "gateway"])))
        .attribute(AttributeSchema::new("Scheme", enum_of(&["internet-facing", "internal"])))
        .attribute(AttributeSchema::new("Subnets", types::string_list()))
        .attribute(AttributeSchema::new("SecurityGroups", types::string_list()))
        .attribute(AttributeSchema::new(
            "LoadBalancerAttributes",
            list_of(struct_of(
                "LoadBalancerAttribute",
                vec![string("Key").required(), string("Value").required()],
            )),
        ))
        .attribute(AttributeSchema::new("Tags", types::tags()))
}

pub fn target_group() -> ResourceSchema {
    ResourceSchema::new("AWS::ElasticLoadBalancingV2::TargetGroup")
        .attribute(AttributeSchema::new("TargetType", enum_of(&["instance", "ip", "lambda", "alb"])))
        .attribute(AttributeSchema::new("Protocol", enum_of(&["HTTP", "HTTPS", "TCP", "TLS", "UDP"])))
        .attribute(AttributeSchema::new("Port", types::port()))
        .attribute(string("VpcId"))
        .attribute(string("HealthCheckPath"))
        .attribute(AttributeSchema::new("HealthCheckIntervalSeconds", types::positive_int()))
        .attribute(AttributeSchema::new("HealthCheckTimeoutSeconds", types::positive_int()))
        .attribute(integer("HealthyThresholdCount"))
        .attribute(integer("UnhealthyThresholdCount"))
}

pub fn listener() -> ResourceSchema {
    let redirect = struct_of(
        "RedirectConfig",
        vec![
            string("Protocol"),
            string("Port"),
            string("Host"),
            string("Path"),
            string("Query"),
            AttributeSchema::new("StatusCode", enum_of(&["HTTP_301", "HTTP_302"])).required(),
        ],
    );
    let action = struct_of(
        "Action",
        vec![
            AttributeSchema::new("Type", enum_of(&["forward", "redirect", "fixed-response"]))
                .required(),
            string("TargetGroupArn"),
            AttributeSchema::new("RedirectConfig", redirect),
        ],
    );

    ResourceSchema::new("AWS::ElasticLoadBalancingV2::Listener")
        .attribute(string("LoadBalancerArn").required())
        .attribute(AttributeSchema::new("Port", types::port()))
        .attribute(AttributeSchema::new("Protocol", enum_of(&["HTTP", "HTTPS", "TCP", "TLS"])))
        .attribute(string("SslPolicy"))
        .attribute(AttributeSchema::new(
            "Certificates",
            list_of(struct_of("Certificate", vec![string("CertificateArn")])),
        ))
        .attribute(AttributeSchema::new("DefaultActions", list_of(action)).required())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![load_balancer(), target_group(), listener()]
}
