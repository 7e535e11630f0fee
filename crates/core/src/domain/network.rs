use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures raised before allocation begins. These are
/// precondition violations and never originate inside the allocator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NetworkSpecError {
    #[error("invalid parent CIDR `{0}` (expected e.g. 10.0.0.0/16)")]
    InvalidParentCidr(String),
    #[error("unknown subnet tier `{0}` (expected public|private)")]
    UnknownTier(String),
    #[error("invalid host count `{0}`")]
    InvalidHostCount(String),
    #[error("unknown route table mode `{0}` (expected shared|separate)")]
    InvalidRouteTableMode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetTier {
    Public,
    Private,
}

impl SubnetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl FromStr for SubnetTier {
    type Err = NetworkSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(NetworkSpecError::UnknownTier(other.to_string())),
        }
    }
}

/// One requested subnet: how many usable host addresses the caller needs
/// and whether the subnet routes through the internet gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRequest {
    pub hosts: u32,
    pub tier: SubnetTier,
}

impl SubnetRequest {
    pub fn public(hosts: u32) -> Self {
        Self { hosts, tier: SubnetTier::Public }
    }

    pub fn private(hosts: u32) -> Self {
        Self { hosts, tier: SubnetTier::Private }
    }
}

/// Caller pass-through flags: whether an internet gateway or NAT gateway
/// was explicitly asked for. Presence in the final plan is decided by the
/// gateway policy, not by these flags alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRequest {
    pub internet_gateway: bool,
    pub nat_gateway: bool,
}

/// A carved-out child block. `request_index` points back at the position of
/// the originating request in the caller's list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedSubnet {
    pub network: Ipv4Net,
    pub tier: SubnetTier,
    pub request_index: usize,
}

/// The result of one allocation run. `subnets` is in the caller's original
/// request order. Immutable after construction; nothing is retained across
/// runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPlan {
    pub parent: Ipv4Net,
    pub subnets: Vec<AllocatedSubnet>,
    pub internet_gateway: bool,
    pub nat_gateway: bool,
    pub subnet_count: usize,
}

impl NetworkPlan {
    pub fn public_subnets(&self) -> impl Iterator<Item = &AllocatedSubnet> {
        self.subnets.iter().filter(|subnet| subnet.tier == SubnetTier::Public)
    }

    pub fn private_subnets(&self) -> impl Iterator<Item = &AllocatedSubnet> {
        self.subnets.iter().filter(|subnet| subnet.tier == SubnetTier::Private)
    }
}

/// How private subnets share route tables when the plan is materialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTableMode {
    #[default]
    Shared,
    Separate,
}

impl FromStr for RouteTableMode {
    type Err = NetworkSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shared" | "1" => Ok(Self::Shared),
            "separate" => Ok(Self::Separate),
            other => Err(NetworkSpecError::InvalidRouteTableMode(other.to_string())),
        }
    }
}

pub fn parse_parent_block(input: &str) -> Result<Ipv4Net, NetworkSpecError> {
    input
        .trim()
        .parse::<Ipv4Net>()
        .map_err(|_| NetworkSpecError::InvalidParentCidr(input.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::{parse_parent_block, NetworkSpecError, RouteTableMode, SubnetTier};

    #[test]
    fn parses_tier_case_insensitively() {
        assert_eq!("Public".parse::<SubnetTier>().ok(), Some(SubnetTier::Public));
        assert_eq!(" private ".parse::<SubnetTier>().ok(), Some(SubnetTier::Private));
    }

    #[test]
    fn rejects_unknown_tier() {
        let error = "dmz".parse::<SubnetTier>().expect_err("dmz is not a tier");
        assert_eq!(error, NetworkSpecError::UnknownTier("dmz".to_string()));
    }

    #[test]
    fn parses_valid_parent_block() {
        let parent = parse_parent_block("10.0.0.0/16").expect("valid CIDR");
        assert_eq!(parent.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn rejects_malformed_parent_block() {
        for input in ["10.0.0.0", "10.0.0.0/33", "not-a-cidr", "10.0.0/16"] {
            assert!(
                matches!(parse_parent_block(input), Err(NetworkSpecError::InvalidParentCidr(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn route_table_mode_accepts_legacy_shared_alias() {
        assert_eq!("1".parse::<RouteTableMode>().ok(), Some(RouteTableMode::Shared));
        assert_eq!("separate".parse::<RouteTableMode>().ok(), Some(RouteTableMode::Separate));
    }
}
