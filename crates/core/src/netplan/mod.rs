//! Network planning: subnet packing plus gateway policy.
//!
//! `plan` is the allocator contract from the outside: a pure function from
//! a parent block, a request list, and the caller's gateway flags to an
//! immutable [`NetworkPlan`]. Each call owns its own cursor and result, so
//! concurrent runs need no coordination here; guarding against the live
//! cloud state is the provisioning layer's concern.

pub mod allocator;
pub mod gateway;

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

pub use allocator::{pack, prefix_for_hosts, usable_hosts, AllocationError};
pub use gateway::{decide, GatewayDecision};

use crate::domain::network::{GatewayRequest, NetworkPlan, SubnetRequest, SubnetTier};

pub fn plan(
    parent: Ipv4Net,
    requests: &[SubnetRequest],
    gateways: GatewayRequest,
) -> Result<NetworkPlan, AllocationError> {
    let subnets = allocator::pack(parent, requests)?;
    let has_public = subnets.iter().any(|subnet| subnet.tier == SubnetTier::Public);
    let has_private = subnets.iter().any(|subnet| subnet.tier == SubnetTier::Private);
    let decision = gateway::decide(gateways, has_public, has_private);

    let subnet_count = subnets.len();
    Ok(NetworkPlan {
        parent,
        subnets,
        internet_gateway: decision.internet_gateway,
        nat_gateway: decision.nat_gateway,
        subnet_count,
    })
}

/// Suggest the first `10.i.0.0/16` (i in 1..255) that does not conflict
/// with any existing block. `None` when the whole 10/8 sweep is taken.
pub fn suggest_parent_block(existing: &[Ipv4Net]) -> Option<Ipv4Net> {
    (1..255u8)
        .filter_map(|octet| Ipv4Net::new(Ipv4Addr::new(10, octet, 0, 0), 16).ok())
        .find(|candidate| existing.iter().all(|block| !blocks_overlap(*candidate, *block)))
}

fn blocks_overlap(a: Ipv4Net, b: Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ipnet::Ipv4Net;

    use crate::domain::network::{GatewayRequest, SubnetRequest};

    use super::{plan, suggest_parent_block, AllocationError};

    fn parent(cidr: &str) -> Ipv4Net {
        Ipv4Net::from_str(cidr).expect("valid parent CIDR")
    }

    #[test]
    fn plan_combines_packing_and_gateway_flags() {
        let requests = vec![SubnetRequest::public(62), SubnetRequest::private(14)];
        let gateways = GatewayRequest { internet_gateway: false, nat_gateway: true };
        let network_plan = plan(parent("10.0.0.0/16"), &requests, gateways).expect("fits");

        assert_eq!(network_plan.subnet_count, 2);
        assert_eq!(network_plan.subnets[0].network.to_string(), "10.0.0.0/26");
        assert_eq!(network_plan.subnets[1].network.to_string(), "10.0.0.64/28");
        assert!(network_plan.internet_gateway);
        assert!(network_plan.nat_gateway);
    }

    #[test]
    fn nat_request_without_public_subnet_downgrades_without_error() {
        let requests = vec![SubnetRequest::private(30)];
        let gateways = GatewayRequest { internet_gateway: false, nat_gateway: true };
        let network_plan = plan(parent("10.0.0.0/16"), &requests, gateways).expect("no error");

        assert!(!network_plan.nat_gateway);
        assert!(!network_plan.internet_gateway);
        assert_eq!(network_plan.subnet_count, 1);
    }

    #[test]
    fn empty_request_list_yields_empty_plan() {
        let network_plan =
            plan(parent("10.0.0.0/16"), &[], GatewayRequest::default()).expect("valid");
        assert_eq!(network_plan.subnet_count, 0);
        assert!(network_plan.subnets.is_empty());
        assert!(!network_plan.internet_gateway);
        assert!(!network_plan.nat_gateway);
    }

    #[test]
    fn capacity_exhaustion_propagates_from_packing() {
        let requests = vec![SubnetRequest::public(1000)];
        let error = plan(parent("10.0.0.0/24"), &requests, GatewayRequest::default())
            .expect_err("/24 cannot hold 1000 hosts");
        assert!(matches!(error, AllocationError::InsufficientSpace { .. }));
    }

    #[test]
    fn suggests_first_free_sixteen() {
        let existing =
            vec![parent("10.1.0.0/16"), parent("10.2.0.0/16"), parent("192.168.0.0/24")];
        let suggested = suggest_parent_block(&existing).expect("space available");
        assert_eq!(suggested.to_string(), "10.3.0.0/16");
    }

    #[test]
    fn suggestion_skips_blocks_containing_existing_networks() {
        let existing = vec![parent("10.1.128.0/24")];
        let suggested = suggest_parent_block(&existing).expect("space available");
        assert_eq!(suggested.to_string(), "10.2.0.0/16");
    }

    #[test]
    fn suggestion_exhausts_when_sweep_is_taken() {
        let existing: Vec<Ipv4Net> = vec![parent("10.0.0.0/8")];
        assert!(suggest_parent_block(&existing).is_none());
    }
}
