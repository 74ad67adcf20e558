//! CloudFront resource schema definitions

use odin_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types::{boolean, enum_of, integer, list_of, string, struct_of};

const VIEWER_PROTOCOL_POLICIES: &[&str] = &["allow-all", "https-only", "redirect-to-https"];

fn behavior_fields() -> Vec<AttributeSchema> {
    vec![
        string("TargetOriginId").required(),
        AttributeSchema::new("ViewerProtocolPolicy", enum_of(VIEWER_PROTOCOL_POLICIES)).required(),
        string("CachePolicyId"),
        string("OriginRequestPolicyId"),
        AttributeSchema::new("AllowedMethods", types::string_list()),
        AttributeSchema::new("CachedMethods", types::string_list()),
        boolean("Compress"),
    ]
}

fn origin() -> AttributeType {
    struct_of(
        "Origin",
        vec![
            string("Id").required(),
            string("DomainName").required(),
            string("OriginPath"),
            AttributeSchema::new(
                "S3OriginConfig",
                struct_of("S3OriginConfig", vec![string("OriginAccessIdentity")]),
            ),
            AttributeSchema::new(
                "CustomOriginConfig",
                struct_of(
                    "CustomOriginConfig",
                    vec![
                        AttributeSchema::new(
                            "OriginProtocolPolicy",
                            enum_of(&["http-only", "match-viewer", "https-only"]),
                        )
                        .required(),
                        AttributeSchema::new("HTTPPort", types::port()),
                        AttributeSchema::new("HTTPSPort", types::port()),
                        AttributeSchema::new("OriginSSLProtocols", types::string_list()),
                    ],
                ),
            ),
        ],
    )
}

fn distribution_config() -> AttributeType {
    let mut cache_behavior = behavior_fields();
    cache_behavior.push(string("PathPattern").required());

    struct_of(
        "DistributionConfig",
        vec![
            boolean("Enabled").required(),
            string("Comment"),
            AttributeSchema::new("Aliases", types::string_list()),
            string("DefaultRootObject"),
            AttributeSchema::new(
                "HttpVersion",
                enum_of(&["http1.1", "http2", "http3", "http2and3"]),
            ),
            boolean("IPV6Enabled"),
            AttributeSchema::new(
                "PriceClass",
                enum_of(&["PriceClass_100", "PriceClass_200", "PriceClass_All"]),
            ),
            AttributeSchema::new("Origins", list_of(origin())).required(),
            AttributeSchema::new(
                "DefaultCacheBehavior",
                struct_of("DefaultCacheBehavior", behavior_fields()),
            )
            .required(),
            AttributeSchema::new(
                "CacheBehaviors",
                list_of(struct_of("CacheBehavior", cache_behavior)),
            ),
            AttributeSchema::new(
                "CustomErrorResponses",
                list_of(struct_of(
                    "CustomErrorResponse",
                    vec![
                        integer("ErrorCode").required(),
                        integer("ResponseCode"),
                        string("ResponsePagePath"),
                        integer("ErrorCachingMinTTL"),
                    ],
                )),
            ),
            AttributeSchema::new(
                "ViewerCertificate",
                struct_of(
                    "ViewerCertificate",
                    vec![
                        string("AcmCertificateArn"),
                        boolean("CloudFrontDefaultCertificate"),
                        AttributeSchema::new("SslSupportMethod", enum_of(&["sni-only", "vip", "static-ip"])),
                        string("MinimumProtocolVersion"),
                    ],
                ),
            ),
        ],
    )
}

pub fn origin_access_identity() -> ResourceSchema {
    ResourceSchema::new("AWS::CloudFront::CloudFrontOriginAccessIdentity").attribute(
        AttributeSchema::new(
            "CloudFrontOriginAccessIdentityConfig",
            struct_of(
                "CloudFrontOriginAccessIdentityConfig",
                vec![string("Comment").required()],
            ),
        )
        .required(),
    )
}

pub fn distribution() -> ResourceSchema {
    ResourceSchema::new("AWS::CloudFront::Distribution")
        .attribute(AttributeSchema::new("DistributionConfig", distribution_config()).required())
        .attribute(AttributeSchema::new("Tags", types::tags()))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![origin_access_identity(), distribution()]
}
