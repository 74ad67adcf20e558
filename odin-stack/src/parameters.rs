//! SSM parameters resolved by the control plane when the template is applied
//!
//! Values never appear in the template; a rotated secret reaches the
//! running service on the next apply.

use odin_core::resource::Value;
use odin_core::template::{Parameter, Template};

use crate::error::Result;

const SSM_STRING: &str = "AWS::SSM::Parameter::Value<String>";

/// One SSM key exposed as a template parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsmParameter {
    pub logical_id: &'static str,
    pub key: &'static str,
}

impl SsmParameter {
    pub fn value(&self) -> Value {
        Value::reference(self.logical_id)
    }
}

pub const SECRET_KEY: SsmParameter = SsmParameter {
    logical_id: "OdinSecretKey",
    key: "/odin-api/secret-key",
};
pub const MONGO_USER: SsmParameter = SsmParameter {
    logical_id: "OdinMongoUser",
    key: "/odin/mongo/user",
};
pub const MONGO_PASSWORD: SsmParameter = SsmParameter {
    logical_id: "OdinMongoPassword",
    key: "/odin/mongo/password",
};
pub const PG_HOST: SsmParameter = SsmParameter {
    logical_id: "OdinPGHOST",
    key: "/odin/psql/host",
};
pub const PG_USER: SsmParameter = SsmParameter {
    logical_id: "OdinPGUSER",
    key: "/odin/psql/user",
};
pub const PG_DBNAME: SsmParameter = SsmParameter {
    logical_id: "OdinPGDBNAME",
    key: "/odin/psql/db",
};
pub const PG_PASS: SsmParameter = SsmParameter {
    logical_id: "OdinPGPASS",
    key: "/odin/psql/password",
};

pub const ALL: [SsmParameter; 7] = [
    SECRET_KEY,
    MONGO_USER,
    MONGO_PASSWORD,
    PG_HOST,
    PG_USER,
    PG_DBNAME,
    PG_PASS,
];

pub fn add_ssm_parameters(template: &mut Template) -> Result<()> {
    for parameter in ALL {
        template.add_parameter(
            parameter.logical_id,
            Parameter::new(SSM_STRING)
                .with_default(parameter.key)
                .with_description(format!("SSM parameter {}", parameter.key)),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_becomes_an_ssm_parameter() {
        let mut template = Template::new();
        add_ssm_parameters(&mut template).unwrap();
        assert_eq!(template.parameters().len(), 7);

        let pg_pass = template.parameter("OdinPGPASS").unwrap();
        assert_eq!(pg_pass.parameter_type, SSM_STRING);
        assert_eq!(pg_pass.default.as_deref(), Some("/odin/psql/password"));
        assert_eq!(PG_PASS.value(), Value::reference("OdinPGPASS"));
    }
}
