//! The seam between the assistant and a real cloud API. The HTTP client
//! and the in-memory provider both implement this trait, so everything
//! above it can be exercised without network access.

use std::collections::BTreeMap;

use provy_core::domain::compute::InstanceLaunchSpec;
use provy_core::domain::identity::{GroupSpec, UserSpec};
use provy_core::domain::network::SubnetTier;
use provy_core::domain::storage::BucketSpec;

use crate::error::CloudError;
use crate::models::{
    AddressAllocation, Bucket, Group, Instance, InternetGateway, NatGateway, RouteTable, Subnet,
    User, Vpc,
};

#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    fn region(&self) -> &str;

    /// Cheap credential/reachability probe.
    async fn ping(&self) -> Result<(), CloudError>;

    // Network
    async fn create_vpc(
        &self,
        name: &str,
        cidr: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<Vpc, CloudError>;
    async fn list_vpcs(&self) -> Result<Vec<Vpc>, CloudError>;
    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: &str,
        tier: SubnetTier,
    ) -> Result<Subnet, CloudError>;
    async fn create_internet_gateway(&self, vpc_id: &str) -> Result<InternetGateway, CloudError>;
    async fn create_route_table(&self, vpc_id: &str) -> Result<RouteTable, CloudError>;
    async fn create_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &str,
    ) -> Result<(), CloudError>;
    async fn associate_route_table(
        &self,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<(), CloudError>;
    async fn allocate_address(&self) -> Result<AddressAllocation, CloudError>;
    async fn create_nat_gateway(
        &self,
        subnet_id: &str,
        allocation_id: &str,
    ) -> Result<NatGateway, CloudError>;

    // Compute
    async fn run_instance(&self, spec: &InstanceLaunchSpec) -> Result<Instance, CloudError>;
    async fn list_instances(&self) -> Result<Vec<Instance>, CloudError>;
    async fn start_instance(&self, instance_id: &str) -> Result<Instance, CloudError>;
    async fn stop_instance(&self, instance_id: &str) -> Result<Instance, CloudError>;
    async fn terminate_instance(&self, instance_id: &str) -> Result<Instance, CloudError>;

    // Storage
    async fn create_bucket(&self, spec: &BucketSpec) -> Result<Bucket, CloudError>;
    async fn list_buckets(&self) -> Result<Vec<Bucket>, CloudError>;
    async fn delete_bucket(&self, name: &str) -> Result<(), CloudError>;

    // Identity
    async fn create_user(&self, spec: &UserSpec) -> Result<User, CloudError>;
    async fn list_users(&self) -> Result<Vec<User>, CloudError>;
    async fn delete_user(&self, username: &str) -> Result<(), CloudError>;
    async fn create_group(&self, spec: &GroupSpec) -> Result<Group, CloudError>;
    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<(), CloudError>;
    async fn attach_user_policy(&self, username: &str, policy: &str) -> Result<(), CloudError>;
    async fn detach_user_policy(&self, username: &str, policy: &str) -> Result<(), CloudError>;
}
