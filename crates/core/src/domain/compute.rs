use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        }
    }
}

/// Predefined bootstrap scripts offered to the user by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapScript {
    #[default]
    None,
    Apache,
    Nginx,
    Greeting,
}

impl BootstrapScript {
    pub fn user_data(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Apache => {
                "#!/bin/bash\nyum update -y\nyum install -y httpd\nsystemctl enable httpd\nsystemctl start httpd"
            }
            Self::Nginx => {
                "#!/bin/bash\nyum install -y nginx\nsystemctl enable nginx\nsystemctl start nginx"
            }
            Self::Greeting => "#!/bin/bash\necho 'Hello from Provy' > /home/ec2-user/hello.txt",
        }
    }
}

/// Everything needed to launch one instance. `image_id` of `None` asks the
/// provider for its current default Linux image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceLaunchSpec {
    pub name: String,
    pub instance_type: String,
    pub image_id: Option<String>,
    pub subnet_id: String,
    pub public_ip: bool,
    pub ebs_size_gb: u32,
    pub bootstrap: BootstrapScript,
    pub tags: BTreeMap<String, String>,
}

impl InstanceLaunchSpec {
    pub fn new(
        name: impl Into<String>,
        instance_type: impl Into<String>,
        subnet_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instance_type: instance_type.into(),
            image_id: None,
            subnet_id: subnet_id.into(),
            public_ip: true,
            ebs_size_gb: 8,
            bootstrap: BootstrapScript::None,
            tags: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BootstrapScript, InstanceLaunchSpec};

    #[test]
    fn launch_spec_defaults_match_small_linux_host() {
        let spec = InstanceLaunchSpec::new("web-1", "t3.micro", "subnet-0001");
        assert!(spec.public_ip);
        assert_eq!(spec.ebs_size_gb, 8);
        assert!(spec.image_id.is_none());
        assert_eq!(spec.bootstrap, BootstrapScript::None);
    }

    #[test]
    fn bootstrap_scripts_are_shell_fragments() {
        assert!(BootstrapScript::Apache.user_data().starts_with("#!/bin/bash"));
        assert!(BootstrapScript::Nginx.user_data().contains("nginx"));
        assert!(BootstrapScript::None.user_data().is_empty());
    }
}
