//! Materializes a [`NetworkPlan`] through a [`CloudProvider`].
//!
//! Creation order: VPC, internet gateway, subnets in caller order, route
//! tables, then the NAT gateway and its private default routes. Any real
//! mutual exclusion against live cloud state belongs to the provider; this
//! layer only sequences the calls.

use std::collections::BTreeMap;

use serde::Serialize;

use provy_core::domain::network::{NetworkPlan, RouteTableMode, SubnetTier};

use crate::error::CloudError;
use crate::provider::CloudProvider;

#[derive(Clone, Debug)]
pub struct ProvisionOptions {
    pub name: String,
    pub route_table_mode: RouteTableMode,
    pub tags: BTreeMap<String, String>,
}

impl ProvisionOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), route_table_mode: RouteTableMode::Shared, tags: BTreeMap::new() }
    }
}

/// The summary record handed back to the conversational layer: allocated
/// subnet ids in caller order, gateway ids when present, and the count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VpcProvisionSummary {
    pub vpc_id: String,
    pub cidr: String,
    pub internet_gateway_id: Option<String>,
    pub nat_gateway_id: Option<String>,
    pub subnet_ids: Vec<String>,
    pub public_subnet_ids: Vec<String>,
    pub private_subnet_ids: Vec<String>,
    pub subnet_count: usize,
}

pub struct NetworkProvisioner<'a, P> {
    provider: &'a P,
}

impl<'a, P: CloudProvider> NetworkProvisioner<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    pub async fn apply(
        &self,
        plan: &NetworkPlan,
        options: &ProvisionOptions,
    ) -> Result<VpcProvisionSummary, CloudError> {
        let cidr = plan.parent.to_string();
        let vpc = self.provider.create_vpc(&options.name, &cidr, &options.tags).await?;
        tracing::info!(vpc_id = %vpc.id, cidr = %cidr, "vpc created");

        let internet_gateway = if plan.internet_gateway {
            let gateway = self.provider.create_internet_gateway(&vpc.id).await?;
            tracing::info!(vpc_id = %vpc.id, igw_id = %gateway.id, "internet gateway attached");
            Some(gateway)
        } else {
            None
        };

        let mut subnet_ids = Vec::with_capacity(plan.subnets.len());
        let mut public_subnet_ids = Vec::new();
        let mut private_subnet_ids = Vec::new();
        for allocated in &plan.subnets {
            let subnet = self
                .provider
                .create_subnet(&vpc.id, &allocated.network.to_string(), allocated.tier)
                .await?;
            match allocated.tier {
                SubnetTier::Public => public_subnet_ids.push(subnet.id.clone()),
                SubnetTier::Private => private_subnet_ids.push(subnet.id.clone()),
            }
            subnet_ids.push(subnet.id);
        }

        if !public_subnet_ids.is_empty() {
            let table = self.provider.create_route_table(&vpc.id).await?;
            if let Some(gateway) = &internet_gateway {
                self.provider.create_route(&table.id, "0.0.0.0/0", &gateway.id).await?;
            }
            for subnet_id in &public_subnet_ids {
                self.provider.associate_route_table(&table.id, subnet_id).await?;
            }
        }

        let mut private_route_table_ids = Vec::new();
        if !private_subnet_ids.is_empty() {
            match options.route_table_mode {
                RouteTableMode::Separate => {
                    for subnet_id in &private_subnet_ids {
                        let table = self.provider.create_route_table(&vpc.id).await?;
                        self.provider.associate_route_table(&table.id, subnet_id).await?;
                        private_route_table_ids.push(table.id);
                    }
                }
                RouteTableMode::Shared => {
                    let table = self.provider.create_route_table(&vpc.id).await?;
                    for subnet_id in &private_subnet_ids {
                        self.provider.associate_route_table(&table.id, subnet_id).await?;
                    }
                    private_route_table_ids.push(table.id);
                }
            }
        }

        let nat_gateway = if plan.nat_gateway {
            // The gateway policy guarantees a public subnet exists here.
            match public_subnet_ids.first() {
                Some(home_subnet) => {
                    let allocation = self.provider.allocate_address().await?;
                    let gateway =
                        self.provider.create_nat_gateway(home_subnet, &allocation.id).await?;
                    for table_id in &private_route_table_ids {
                        self.provider.create_route(table_id, "0.0.0.0/0", &gateway.id).await?;
                    }
                    tracing::info!(
                        vpc_id = %vpc.id,
                        nat_id = %gateway.id,
                        subnet_id = %home_subnet,
                        "nat gateway provisioned"
                    );
                    Some(gateway)
                }
                None => {
                    return Err(CloudError::InvalidRequest(
                        "nat gateway flagged but plan has no public subnet".to_string(),
                    ))
                }
            }
        } else {
            None
        };

        Ok(VpcProvisionSummary {
            vpc_id: vpc.id,
            cidr,
            internet_gateway_id: internet_gateway.map(|gateway| gateway.id),
            nat_gateway_id: nat_gateway.map(|gateway| gateway.id),
            subnet_count: subnet_ids.len(),
            subnet_ids,
            public_subnet_ids,
            private_subnet_ids,
        })
    }
}
