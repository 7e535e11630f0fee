use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketEncryption {
    #[default]
    None,
    Aes256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    pub region: String,
    pub versioning: bool,
    pub encryption: BucketEncryption,
    pub block_public_access: bool,
    pub tags: BTreeMap<String, String>,
}

impl BucketSpec {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            versioning: false,
            encryption: BucketEncryption::None,
            block_public_access: true,
            tags: BTreeMap::new(),
        }
    }
}
