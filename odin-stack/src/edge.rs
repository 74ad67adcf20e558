//! Edge - CloudFront distribution for the UI bucket and the API
//!
//! The UI bucket is the default origin, read through an origin access
//! identity. Requests under `/rest_api/*` go to the load balancer and are
//! never cached.

use odin_core::resource::{Resource, Value};
use odin_core::template::{Output, Template};

use crate::component;
use crate::config::OdinConfig;
use crate::error::Result;
use crate::service::ApiService;

pub const DISTRIBUTION: &str = "OdinUICloudfront";
const ORIGIN_ACCESS_IDENTITY: &str = "OdinUIOriginAccessIdentity";

pub const API_PATH_PATTERN: &str = "/rest_api/*";
const UI_ORIGIN_ID: &str = "OdinUIBucketOrigin";
const API_ORIGIN_ID: &str = "OdinServiceLBOrigin";

/// Managed cache policy `Managed-CachingDisabled`
pub const CACHING_DISABLED: &str = "4135ea2d-6df8-44a3-9df3-4b5a84be39ad";
/// Managed cache policy `Managed-CachingOptimized`
pub const CACHING_OPTIMIZED: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";
/// Managed origin request policy `Managed-AllViewer`
pub const ALL_VIEWER: &str = "216adef6-5c7f-47e4-b989-5492eafa07d3";
/// Hosted zone every CloudFront distribution lives in
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

const ALL_METHODS: [&str; 7] = ["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub distribution: String,
}

impl Edge {
    pub fn domain_name(&self) -> Value {
        Value::get_att(&self.distribution, "DomainName")
    }
}

fn error_response(code: i64) -> Value {
    Value::map([
        ("ErrorCode", Value::from(code)),
        ("ResponseCode", Value::from(200i64)),
        ("ResponsePagePath", Value::from("/index.html")),
    ])
}

fn distribution_config(config: &OdinConfig, api: &ApiService) -> Value {
    let ui_origin = Value::map([
        ("Id", Value::from(UI_ORIGIN_ID)),
        (
            "DomainName",
            Value::from(format!("{}.s3.amazonaws.com", config.edge.ui_bucket)),
        ),
        (
            "S3OriginConfig",
            Value::map([(
                "OriginAccessIdentity",
                Value::join(
                    "",
                    vec![
                        Value::from("origin-access-identity/cloudfront/"),
                        Value::reference(ORIGIN_ACCESS_IDENTITY),
                    ],
                ),
            )]),
        ),
    ]);
    let api_origin = Value::map([
        ("Id", Value::from(API_ORIGIN_ID)),
        ("DomainName", api.load_balancer_dns()),
        (
            "CustomOriginConfig",
            Value::map([
                ("OriginProtocolPolicy", Value::from("https-only")),
                ("HTTPSPort", Value::from(443i64)),
                ("OriginSSLProtocols", Value::list(["TLSv1.2"])),
            ]),
        ),
    ]);

    let default_behavior = Value::map([
        ("TargetOriginId", Value::from(UI_ORIGIN_ID)),
        ("ViewerProtocolPolicy", Value::from("redirect-to-https")),
        ("CachePolicyId", Value::from(CACHING_OPTIMIZED)),
        ("Compress", Value::from(true)),
    ]);
    let api_behavior = Value::map([
        ("PathPattern", Value::from(API_PATH_PATTERN)),
        ("TargetOriginId", Value::from(API_ORIGIN_ID)),
        ("ViewerProtocolPolicy", Value::from("redirect-to-https")),
        ("CachePolicyId", Value::from(CACHING_DISABLED)),
        ("OriginRequestPolicyId", Value::from(ALL_VIEWER)),
        ("AllowedMethods", Value::list(ALL_METHODS)),
        ("CachedMethods", Value::list(["GET", "HEAD"])),
        ("Compress", Value::from(true)),
    ]);

    Value::map([
        ("Enabled", Value::from(true)),
        ("Comment", Value::from("Odin UI and API")),
        ("Aliases", Value::list([config.domain_name.as_str()])),
        ("DefaultRootObject", Value::from("index.html")),
        ("HttpVersion", Value::from("http2")),
        ("IPV6Enabled", Value::from(true)),
        ("PriceClass", Value::from("PriceClass_All")),
        ("Origins", Value::list([ui_origin, api_origin])),
        ("DefaultCacheBehavior", default_behavior),
        ("CacheBehaviors", Value::list([api_behavior])),
        (
            "CustomErrorResponses",
            Value::list([error_response(403), error_response(404)]),
        ),
        (
            "ViewerCertificate",
            Value::map([
                ("AcmCertificateArn", Value::from(config.edge_certificate_arn())),
                ("SslSupportMethod", Value::from("sni-only")),
                ("MinimumProtocolVersion", Value::from("TLSv1.2_2021")),
            ]),
        ),
    ])
}

pub fn build_edge(template: &mut Template, config: &OdinConfig, api: &ApiService) -> Result<Edge> {
    template.add_resource(
        Resource::new(
            "AWS::CloudFront::CloudFrontOriginAccessIdentity",
            ORIGIN_ACCESS_IDENTITY,
        )
        .with_property(
            "CloudFrontOriginAccessIdentityConfig",
            Value::map([(
                "Comment",
                Value::from(format!("Identity for {}", config.edge.ui_bucket)),
            )]),
        )
        .with_component(component::EDGE),
    )?;

    template.add_resource(
        Resource::new("AWS::CloudFront::Distribution", DISTRIBUTION)
            .with_property("DistributionConfig", distribution_config(config, api))
            .with_component(component::EDGE),
    )?;

    template.add_output(
        "OdinUICloudfrontDomainName",
        Output::new(Value::get_att(DISTRIBUTION, "DomainName"))
            .with_description("CloudFront domain name"),
    )?;

    Ok(Edge {
        distribution: DISTRIBUTION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> ApiService {
        ApiService {
            cluster: "OdinApiCluster".to_string(),
            service: "OdinFargateService".to_string(),
            load_balancer: "OdinServiceLB".to_string(),
            target_group: "OdinServiceTargetGroup".to_string(),
            scalable_target: "OdinServiceScalableTarget".to_string(),
        }
    }

    fn distribution() -> Value {
        let config = crate::config::tests::minimal();
        let mut template = Template::new();
        build_edge(&mut template, &config, &api()).unwrap();
        template
            .resource(DISTRIBUTION)
            .and_then(|d| d.property("DistributionConfig"))
            .cloned()
            .unwrap()
    }

    #[test]
    fn api_path_is_never_cached() {
        let config = distribution();
        let behaviors = config.get("CacheBehaviors").and_then(Value::as_list).unwrap();
        let api = behaviors
            .iter()
            .find(|b| b.get("PathPattern") == Some(&Value::from(API_PATH_PATTERN)))
            .unwrap();
        assert_eq!(api.get("CachePolicyId"), Some(&Value::from(CACHING_DISABLED)));
        assert_eq!(api.get("OriginRequestPolicyId"), Some(&Value::from(ALL_VIEWER)));
        assert_eq!(api.get("TargetOriginId"), Some(&Value::from(API_ORIGIN_ID)));
    }

    #[test]
    fn ui_is_the_default_origin() {
        let config = distribution();
        let default = config.get("DefaultCacheBehavior").unwrap();
        assert_eq!(default.get("TargetOriginId"), Some(&Value::from(UI_ORIGIN_ID)));
        assert_eq!(
            default.get("ViewerProtocolPolicy"),
            Some(&Value::from("redirect-to-https"))
        );
        assert_eq!(config.get("Aliases"), Some(&Value::list(["odin-smr.org"])));
    }

    #[test]
    fn api_origin_is_https_only_load_balancer() {
        let config = distribution();
        let origins = config.get("Origins").and_then(Value::as_list).unwrap();
        let api = &origins[1];
        assert_eq!(api.get("DomainName"), Some(&Value::get_att("OdinServiceLB", "DNSName")));
        assert_eq!(
            api.get("CustomOriginConfig").and_then(|c| c.get("OriginProtocolPolicy")),
            Some(&Value::from("https-only"))
        );
    }

    #[test]
    fn spa_errors_fall_back_to_index() {
        let config = distribution();
        let errors = config.get("CustomErrorResponses").and_then(Value::as_list).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].get("ErrorCode"), Some(&Value::Int(404)));
        assert_eq!(errors[1].get("ResponsePagePath"), Some(&Value::from("/index.html")));
    }
}
