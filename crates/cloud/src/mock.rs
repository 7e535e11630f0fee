//! In-memory cloud provider.
//!
//! Backs tests and the CLI's dry-run mode. Resources live in shared maps
//! keyed by deterministic ids, so repeated runs against a fresh instance
//! produce identical output.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{TimeZone, Utc};

use provy_core::domain::compute::{InstanceLaunchSpec, InstanceState};
use provy_core::domain::identity::{GroupSpec, UserSpec};
use provy_core::domain::network::SubnetTier;
use provy_core::domain::storage::BucketSpec;

use crate::error::CloudError;
use crate::models::{
    AddressAllocation, Bucket, Group, Instance, InternetGateway, NatGateway, Route, RouteTable,
    Subnet, User, Vpc,
};
use crate::provider::CloudProvider;

const DEFAULT_IMAGE_ID: &str = "ami-0a1b2c3d4e5f6a7b8";

#[derive(Clone)]
pub struct MemoryCloud {
    region: String,
    vpcs: Arc<Mutex<BTreeMap<String, Vpc>>>,
    subnets: Arc<Mutex<BTreeMap<String, Subnet>>>,
    route_tables: Arc<Mutex<BTreeMap<String, RouteTable>>>,
    internet_gateways: Arc<Mutex<BTreeMap<String, InternetGateway>>>,
    nat_gateways: Arc<Mutex<BTreeMap<String, NatGateway>>>,
    addresses: Arc<Mutex<BTreeMap<String, AddressAllocation>>>,
    instances: Arc<Mutex<BTreeMap<String, Instance>>>,
    buckets: Arc<Mutex<BTreeMap<String, Bucket>>>,
    users: Arc<Mutex<BTreeMap<String, User>>>,
    groups: Arc<Mutex<BTreeMap<String, Group>>>,
    next_id: Arc<Mutex<u64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, CloudError> {
    mutex.lock().map_err(|_| CloudError::Internal("resource store is poisoned".to_string()))
}

impl MemoryCloud {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            vpcs: Arc::new(Mutex::new(BTreeMap::new())),
            subnets: Arc::new(Mutex::new(BTreeMap::new())),
            route_tables: Arc::new(Mutex::new(BTreeMap::new())),
            internet_gateways: Arc::new(Mutex::new(BTreeMap::new())),
            nat_gateways: Arc::new(Mutex::new(BTreeMap::new())),
            addresses: Arc::new(Mutex::new(BTreeMap::new())),
            instances: Arc::new(Mutex::new(BTreeMap::new())),
            buckets: Arc::new(Mutex::new(BTreeMap::new())),
            users: Arc::new(Mutex::new(BTreeMap::new())),
            groups: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn next_id(&self, prefix: &str) -> Result<String, CloudError> {
        let mut counter = lock(&self.next_id)?;
        let id = format!("{prefix}-{:08x}", *counter);
        *counter += 1;
        Ok(id)
    }

    fn fixed_timestamp(sequence: u64) -> chrono::DateTime<Utc> {
        // Monotonic but reproducible stamps; one second apart per resource.
        Utc.timestamp_opt(1_700_000_000 + sequence as i64, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn sequence(&self) -> Result<u64, CloudError> {
        Ok(*lock(&self.next_id)?)
    }

    /// Direct view of a route table, used by tests to assert routing.
    pub fn route_table(&self, route_table_id: &str) -> Option<RouteTable> {
        self.route_tables.lock().ok().and_then(|tables| tables.get(route_table_id).cloned())
    }

    /// Direct view of a subnet, used by tests to assert placement.
    pub fn subnet(&self, subnet_id: &str) -> Option<Subnet> {
        self.subnets.lock().ok().and_then(|subnets| subnets.get(subnet_id).cloned())
    }
}

#[async_trait::async_trait]
impl CloudProvider for MemoryCloud {
    fn region(&self) -> &str {
        &self.region
    }

    async fn ping(&self) -> Result<(), CloudError> {
        Ok(())
    }

    async fn create_vpc(
        &self,
        name: &str,
        cidr: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<Vpc, CloudError> {
        let id = self.next_id("vpc")?;
        let vpc =
            Vpc { id: id.clone(), name: name.to_string(), cidr: cidr.to_string(), tags: tags.clone() };
        lock(&self.vpcs)?.insert(id, vpc.clone());
        Ok(vpc)
    }

    async fn list_vpcs(&self) -> Result<Vec<Vpc>, CloudError> {
        Ok(lock(&self.vpcs)?.values().cloned().collect())
    }

    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: &str,
        tier: SubnetTier,
    ) -> Result<Subnet, CloudError> {
        if !lock(&self.vpcs)?.contains_key(vpc_id) {
            return Err(CloudError::NotFound(format!("vpc {vpc_id}")));
        }
        let id = self.next_id("subnet")?;
        let subnet =
            Subnet { id: id.clone(), vpc_id: vpc_id.to_string(), cidr: cidr.to_string(), tier };
        lock(&self.subnets)?.insert(id, subnet.clone());
        Ok(subnet)
    }

    async fn create_internet_gateway(&self, vpc_id: &str) -> Result<InternetGateway, CloudError> {
        if !lock(&self.vpcs)?.contains_key(vpc_id) {
            return Err(CloudError::NotFound(format!("vpc {vpc_id}")));
        }
        let id = self.next_id("igw")?;
        let gateway = InternetGateway { id: id.clone(), vpc_id: vpc_id.to_string() };
        lock(&self.internet_gateways)?.insert(id, gateway.clone());
        Ok(gateway)
    }

    async fn create_route_table(&self, vpc_id: &str) -> Result<RouteTable, CloudError> {
        if !lock(&self.vpcs)?.contains_key(vpc_id) {
            return Err(CloudError::NotFound(format!("vpc {vpc_id}")));
        }
        let id = self.next_id("rtb")?;
        let table = RouteTable {
            id: id.clone(),
            vpc_id: vpc_id.to_string(),
            routes: Vec::new(),
            subnet_ids: Vec::new(),
        };
        lock(&self.route_tables)?.insert(id, table.clone());
        Ok(table)
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &str,
    ) -> Result<(), CloudError> {
        let mut tables = lock(&self.route_tables)?;
        let table = tables
            .get_mut(route_table_id)
            .ok_or_else(|| CloudError::NotFound(format!("route table {route_table_id}")))?;
        table
            .routes
            .push(Route { destination: destination.to_string(), target: target.to_string() });
        Ok(())
    }

    async fn associate_route_table(
        &self,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<(), CloudError> {
        if !lock(&self.subnets)?.contains_key(subnet_id) {
            return Err(CloudError::NotFound(format!("subnet {subnet_id}")));
        }
        let mut tables = lock(&self.route_tables)?;
        let table = tables
            .get_mut(route_table_id)
            .ok_or_else(|| CloudError::NotFound(format!("route table {route_table_id}")))?;
        table.subnet_ids.push(subnet_id.to_string());
        Ok(())
    }

    async fn allocate_address(&self) -> Result<AddressAllocation, CloudError> {
        let id = self.next_id("eipalloc")?;
        let allocation = AddressAllocation { id: id.clone() };
        lock(&self.addresses)?.insert(id, allocation.clone());
        Ok(allocation)
    }

    async fn create_nat_gateway(
        &self,
        subnet_id: &str,
        allocation_id: &str,
    ) -> Result<NatGateway, CloudError> {
        if !lock(&self.subnets)?.contains_key(subnet_id) {
            return Err(CloudError::NotFound(format!("subnet {subnet_id}")));
        }
        if !lock(&self.addresses)?.contains_key(allocation_id) {
            return Err(CloudError::NotFound(format!("address allocation {allocation_id}")));
        }
        let id = self.next_id("nat")?;
        let gateway = NatGateway {
            id: id.clone(),
            subnet_id: subnet_id.to_string(),
            allocation_id: allocation_id.to_string(),
        };
        lock(&self.nat_gateways)?.insert(id, gateway.clone());
        Ok(gateway)
    }

    async fn run_instance(&self, spec: &InstanceLaunchSpec) -> Result<Instance, CloudError> {
        if !lock(&self.subnets)?.contains_key(&spec.subnet_id) {
            return Err(CloudError::NotFound(format!("subnet {}", spec.subnet_id)));
        }
        let sequence = self.sequence()?;
        let id = self.next_id("i")?;
        let instance = Instance {
            id: id.clone(),
            name: spec.name.clone(),
            instance_type: spec.instance_type.clone(),
            image_id: spec.image_id.clone().unwrap_or_else(|| DEFAULT_IMAGE_ID.to_string()),
            subnet_id: spec.subnet_id.clone(),
            state: InstanceState::Running,
            public_ip: spec
                .public_ip
                .then(|| format!("203.0.113.{}", (sequence % 250) + 1)),
            launched_at: Self::fixed_timestamp(sequence),
        };
        lock(&self.instances)?.insert(id, instance.clone());
        Ok(instance)
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, CloudError> {
        Ok(lock(&self.instances)?.values().cloned().collect())
    }

    async fn start_instance(&self, instance_id: &str) -> Result<Instance, CloudError> {
        self.transition_instance(instance_id, InstanceState::Running)
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<Instance, CloudError> {
        self.transition_instance(instance_id, InstanceState::Stopped)
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<Instance, CloudError> {
        self.transition_instance(instance_id, InstanceState::Terminated)
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> Result<Bucket, CloudError> {
        let mut buckets = lock(&self.buckets)?;
        if buckets.contains_key(&spec.name) {
            return Err(CloudError::Conflict(format!("bucket {} already exists", spec.name)));
        }
        let sequence = self.sequence()?;
        let bucket = Bucket {
            name: spec.name.clone(),
            region: spec.region.clone(),
            versioning: spec.versioning,
            encryption: spec.encryption,
            block_public_access: spec.block_public_access,
            created_at: Self::fixed_timestamp(sequence),
        };
        buckets.insert(spec.name.clone(), bucket.clone());
        Ok(bucket)
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>, CloudError> {
        Ok(lock(&self.buckets)?.values().cloned().collect())
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), CloudError> {
        lock(&self.buckets)?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("bucket {name}")))
    }

    async fn create_user(&self, spec: &UserSpec) -> Result<User, CloudError> {
        let mut users = lock(&self.users)?;
        if users.contains_key(&spec.username) {
            return Err(CloudError::Conflict(format!("user {} already exists", spec.username)));
        }
        let sequence = self.sequence()?;
        let user = User {
            username: spec.username.clone(),
            policies: spec.policies.clone(),
            console_access: spec.console_access,
            programmatic_access: spec.programmatic_access,
            created_at: Self::fixed_timestamp(sequence),
        };
        users.insert(spec.username.clone(), user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, CloudError> {
        Ok(lock(&self.users)?.values().cloned().collect())
    }

    async fn delete_user(&self, username: &str) -> Result<(), CloudError> {
        lock(&self.users)?
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("user {username}")))
    }

    async fn create_group(&self, spec: &GroupSpec) -> Result<Group, CloudError> {
        let mut groups = lock(&self.groups)?;
        if groups.contains_key(&spec.name) {
            return Err(CloudError::Conflict(format!("group {} already exists", spec.name)));
        }
        let group = Group {
            name: spec.name.clone(),
            policies: spec.policies.clone(),
            members: Vec::new(),
        };
        groups.insert(spec.name.clone(), group.clone());
        Ok(group)
    }

    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<(), CloudError> {
        if !lock(&self.users)?.contains_key(username) {
            return Err(CloudError::NotFound(format!("user {username}")));
        }
        let mut groups = lock(&self.groups)?;
        let entry =
            groups.get_mut(group).ok_or_else(|| CloudError::NotFound(format!("group {group}")))?;
        if !entry.members.iter().any(|member| member == username) {
            entry.members.push(username.to_string());
        }
        Ok(())
    }

    async fn attach_user_policy(&self, username: &str, policy: &str) -> Result<(), CloudError> {
        let mut users = lock(&self.users)?;
        let user = users
            .get_mut(username)
            .ok_or_else(|| CloudError::NotFound(format!("user {username}")))?;
        if !user.policies.iter().any(|attached| attached == policy) {
            user.policies.push(policy.to_string());
        }
        Ok(())
    }

    async fn detach_user_policy(&self, username: &str, policy: &str) -> Result<(), CloudError> {
        let mut users = lock(&self.users)?;
        let user = users
            .get_mut(username)
            .ok_or_else(|| CloudError::NotFound(format!("user {username}")))?;
        user.policies.retain(|attached| attached != policy);
        Ok(())
    }
}

impl MemoryCloud {
    fn transition_instance(
        &self,
        instance_id: &str,
        state: InstanceState,
    ) -> Result<Instance, CloudError> {
        let mut instances = lock(&self.instances)?;
        let instance = instances
            .get_mut(instance_id)
            .ok_or_else(|| CloudError::NotFound(format!("instance {instance_id}")))?;
        instance.state = state;
        Ok(instance.clone())
    }
}
