//! Prefix-aligned subnet packing.
//!
//! Carves non-overlapping child blocks out of a parent network with a
//! single forward-moving cursor. Requests are packed largest-first because
//! large blocks carry the strictest alignment constraints; the result is
//! returned in the caller's original request order.

use std::cmp::Reverse;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use thiserror::Error;

use crate::domain::network::{AllocatedSubnet, SubnetRequest};

/// The single failure mode of packing. Any request that cannot be placed
/// aborts the whole run; no partial subnet set is ever returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("insufficient address space in {parent} for requested subnets")]
    InsufficientSpace { parent: Ipv4Net },
}

/// Smallest prefix length whose block offers at least `hosts` usable
/// addresses, two being reserved for the network and broadcast
/// identifiers. Floors at /30, so requests for 0 or 1 hosts still get a
/// four-address block. Returns `None` when no IPv4 prefix is large enough.
pub fn prefix_for_hosts(hosts: u32) -> Option<u8> {
    let needed = (u64::from(hosts) + 2).max(4);
    let bits = 64 - u64::from((needed - 1).leading_zeros());
    if bits > 32 {
        return None;
    }
    Some(32 - bits as u8)
}

/// Usable host addresses in a block of the given prefix length.
pub fn usable_hosts(prefix_len: u8) -> u64 {
    (1u64 << (32 - u32::from(prefix_len))).saturating_sub(2)
}

pub fn pack(
    parent: Ipv4Net,
    requests: &[SubnetRequest],
) -> Result<Vec<AllocatedSubnet>, AllocationError> {
    let mut order: Vec<usize> = (0..requests.len()).collect();
    order.sort_by_key(|&index| (Reverse(requests[index].hosts), index));

    let parent_end = u64::from(u32::from(parent.broadcast()));
    let mut cursor = u64::from(u32::from(parent.network()));
    let mut allocated = Vec::with_capacity(requests.len());

    for index in order {
        let request = &requests[index];
        let prefix_len = prefix_for_hosts(request.hosts)
            .ok_or(AllocationError::InsufficientSpace { parent })?;
        let block_size = 1u64 << (32 - u32::from(prefix_len));

        // Each child must itself be a valid CIDR block, so the base has to
        // sit on a block_size boundary at or after the cursor.
        let aligned = match cursor % block_size {
            0 => cursor,
            rem => cursor + (block_size - rem),
        };
        let last = aligned + block_size - 1;
        if last > parent_end {
            return Err(AllocationError::InsufficientSpace { parent });
        }

        let network = Ipv4Net::new(Ipv4Addr::from(aligned as u32), prefix_len)
            .map_err(|_| AllocationError::InsufficientSpace { parent })?;
        allocated.push(AllocatedSubnet { network, tier: request.tier, request_index: index });
        cursor = aligned + block_size;
    }

    allocated.sort_by_key(|subnet| subnet.request_index);
    Ok(allocated)
}
