//! Startup scripts run by instances on first boot

use odin_core::resource::Value;

const SHEBANG: &str = "#!/bin/bash";

const MONGODB_REPO_FILE: &str = "/etc/yum.repos.d/mongodb-org-6.0.repo";

const MONGODB_REPO: &str = "[mongodb-org-6.0]
name=MongoDB Repository
baseurl=https://repo.mongodb.org/yum/amazon/2/mongodb-org/6.0/x86_64/
gpgcheck=1
enabled=1
gpgkey=https://www.mongodb.org/static/pgp/server-6.0.asc";

/// Ordered list of shell commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    commands: Vec<String>,
}

impl UserData {
    pub fn for_linux() -> Self {
        Self::default()
    }

    pub fn add_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn add_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Script text, one command per line
    pub fn render(&self) -> String {
        let mut script = String::from(SHEBANG);
        for command in &self.commands {
            script.push('\n');
            script.push_str(command);
        }
        script
    }

    /// `UserData` property value
    pub fn to_value(&self) -> Value {
        Value::base64(Value::String(self.render()))
    }
}

/// Writes the MongoDB 6.0 yum repository definition
pub fn mongodb_repo_command() -> String {
    format!("echo '{}' > {}", MONGODB_REPO, MONGODB_REPO_FILE)
}

/// Points the awslogs agent at `region` and `log_group`, then starts it
pub fn awslogs_commands(region: &str, log_group: &str) -> Vec<String> {
    vec![
        format!(
            "sed -i 's|region = us-east-1|region = {}|' /etc/awslogs/awscli.conf",
            region
        ),
        format!(
            "sed -i 's|#log_group_name = |log_group_name = {}|' /etc/awslogs/awslogs.conf",
            log_group
        ),
        "service awslogs start".to_string(),
        "chkconfig awslogs on".to_string(),
    ]
}

/// Turns an instance into a NAT gateway for `vpc_cidr`
pub fn nat_commands(vpc_cidr: &str) -> Vec<String> {
    vec![
        "yum install -y iptables-services".to_string(),
        "echo 'net.ipv4.ip_forward=1' > /etc/sysctl.d/90-nat.conf".to_string(),
        "sysctl --system".to_string(),
        format!(
            "iptables -t nat -A POSTROUTING -o $(ip route show default | awk '{{print $5}}') -s {} -j MASQUERADE",
            vpc_cidr
        ),
        "iptables -F FORWARD".to_string(),
        "service iptables save".to_string(),
        "systemctl enable --now iptables".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_keeps_command_order() {
        let user_data = UserData::for_linux()
            .add_command("yum update -y")
            .add_commands(["service mongod stop", "service mongod start"]);
        assert_eq!(
            user_data.render(),
            "#!/bin/bash\nyum update -y\nservice mongod stop\nservice mongod start"
        );
    }

    #[test]
    fn to_value_is_base64_of_script() {
        let user_data = UserData::for_linux().add_command("true");
        assert_eq!(
            user_data.to_value(),
            Value::base64(Value::from("#!/bin/bash\ntrue"))
        );
    }

    #[test]
    fn awslogs_commands_substitute_region_and_group() {
        let commands = awslogs_commands("eu-north-1", "/Odin/Mongo");
        assert_eq!(
            commands[0],
            "sed -i 's|region = us-east-1|region = eu-north-1|' /etc/awslogs/awscli.conf"
        );
        assert!(commands[1].contains("log_group_name = /Odin/Mongo|"));
        assert_eq!(commands.last().map(String::as_str), Some("chkconfig awslogs on"));
    }

    #[test]
    fn mongodb_repo_is_written_to_yum_repos() {
        let command = mongodb_repo_command();
        assert!(command.starts_with("echo '[mongodb-org-6.0]"));
        assert!(command.ends_with("> /etc/yum.repos.d/mongodb-org-6.0.repo"));
        assert!(command.contains("server-6.0.asc"));
    }

    #[test]
    fn nat_commands_masquerade_the_vpc() {
        let commands = nat_commands("10.0.0.0/16");
        assert!(commands.iter().any(|c| c.contains("-s 10.0.0.0/16 -j MASQUERADE")));
    }
}
