use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IamEntityKind {
    User,
    Group,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSpec {
    pub username: String,
    pub policies: Vec<String>,
    pub console_access: bool,
    pub programmatic_access: bool,
}

impl UserSpec {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            policies: Vec::new(),
            console_access: false,
            programmatic_access: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub policies: Vec<String>,
}

/// A managed-policy attachment targeting either a user or a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttachment {
    pub entity: IamEntityKind,
    pub name: String,
    pub policy: String,
}

#[cfg(test)]
mod tests {
    use super::UserSpec;

    #[test]
    fn new_users_start_without_access_paths() {
        let spec = UserSpec::new("alice");
        assert!(spec.policies.is_empty());
        assert!(!spec.console_access);
        assert!(!spec.programmatic_access);
    }
}
