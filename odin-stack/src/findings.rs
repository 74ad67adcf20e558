//! Security findings - ingress rules open to the whole internet

use std::fmt;

use odin_core::resource::Value;
use odin_core::template::Template;

use crate::config::ANYWHERE;

/// Ports expected to face the internet
const PUBLIC_PORTS: &[i64] = &[80, 443];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityFinding {
    /// Logical id of the security group
    pub resource: String,
    pub port: i64,
    pub cidr: String,
}

impl fmt::Display for SecurityFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} allows tcp/{} from {}",
            self.resource, self.port, self.cidr
        )
    }
}

fn open_rule(resource: &str, rule: &Value) -> Option<SecurityFinding> {
    let cidr = rule.get("CidrIp").and_then(Value::as_str)?;
    if cidr != ANYWHERE {
        return None;
    }
    let port = rule.get("FromPort").and_then(Value::as_int).unwrap_or(-1);
    if PUBLIC_PORTS.contains(&port) {
        return None;
    }
    Some(SecurityFinding {
        resource: resource.to_string(),
        port,
        cidr: cidr.to_string(),
    })
}

/// Every ingress rule reachable from anywhere on a non-web port
pub fn findings(template: &Template) -> Vec<SecurityFinding> {
    let mut out = Vec::new();
    for group in template.resources_of_type("AWS::EC2::SecurityGroup") {
        let rules = group
            .property("SecurityGroupIngress")
            .and_then(Value::as_list)
            .unwrap_or_default();
        out.extend(rules.iter().filter_map(|rule| open_rule(&group.id.name, rule)));
    }
    for ingress in template.resources_of_type("AWS::EC2::SecurityGroupIngress") {
        let rule = Value::Map(ingress.properties.clone());
        out.extend(open_rule(&ingress.id.name, &rule));
    }
    out
}
