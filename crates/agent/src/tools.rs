//! Tool registry.
//!
//! Every provisioning operation is a [`Tool`]: a named, JSON-in/JSON-out
//! unit the runtime dispatches to. Tools translate domain failures into
//! typed errors the runtime can map onto user-facing replies.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use provy_cloud::models::Instance;
use provy_cloud::{CloudProvider, NetworkProvisioner, ProvisionOptions};
use provy_core::catalog::{network_cost_line, InstanceCatalog};
use provy_core::domain::compute::{BootstrapScript, InstanceLaunchSpec};
use provy_core::domain::identity::{GroupSpec, UserSpec};
use provy_core::domain::network::{
    parse_parent_block, GatewayRequest, RouteTableMode, SubnetRequest, SubnetTier,
};
use provy_core::domain::storage::{BucketEncryption, BucketSpec};
use provy_core::errors::{ApplicationError, DomainError};
use provy_core::netplan;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<Value> {
        let tool =
            self.tools.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tool.execute(input).await
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.values().map(|tool| tool.name()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Wire up the full default tool set against one provider.
pub fn register_default_tools<P>(
    registry: &mut ToolRegistry,
    provider: Arc<P>,
    catalog: InstanceCatalog,
    route_table_mode: RouteTableMode,
) where
    P: CloudProvider + 'static,
{
    registry.register(CreateVpcTool { provider: Arc::clone(&provider), route_table_mode });
    registry.register(ListVpcsTool { provider: Arc::clone(&provider) });
    registry.register(CreateInstanceTool { provider: Arc::clone(&provider), catalog });
    registry.register(ListInstancesTool { provider: Arc::clone(&provider) });
    for action in [LifecycleAction::Start, LifecycleAction::Stop, LifecycleAction::Terminate] {
        registry.register(InstanceLifecycleTool { provider: Arc::clone(&provider), action });
    }
    registry.register(CreateBucketTool { provider: Arc::clone(&provider) });
    registry.register(ListBucketsTool { provider: Arc::clone(&provider) });
    registry.register(DeleteBucketTool { provider: Arc::clone(&provider) });
    registry.register(CreateUserTool { provider: Arc::clone(&provider) });
    registry.register(ListUsersTool { provider: Arc::clone(&provider) });
    registry.register(DeleteUserTool { provider: Arc::clone(&provider) });
    registry.register(CreateGroupTool { provider: Arc::clone(&provider) });
    registry.register(AddUserToGroupTool { provider: Arc::clone(&provider) });
    registry.register(AttachPolicyTool { provider: Arc::clone(&provider), detach: false });
    registry.register(AttachPolicyTool { provider, detach: true });
}

fn domain_error(error: impl Into<DomainError>) -> anyhow::Error {
    anyhow::Error::new(ApplicationError::from(error.into()))
}

// ---- network ----

#[derive(Debug, Deserialize)]
struct CreateVpcInput {
    name: String,
    cidr: String,
    #[serde(default)]
    subnets: Vec<SubnetRequest>,
    #[serde(default)]
    internet_gateway: bool,
    #[serde(default)]
    nat_gateway: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSubnet {
    pub subnet_id: String,
    pub cidr: String,
    pub tier: SubnetTier,
}

/// Output of `create_vpc`: the provisioned ids joined with the allocation
/// plan, in the caller's request order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcCreated {
    pub vpc_id: String,
    pub name: String,
    pub cidr: String,
    pub subnets: Vec<CreatedSubnet>,
    pub internet_gateway_id: Option<String>,
    pub nat_gateway_id: Option<String>,
    pub nat_downgraded: bool,
    pub subnet_count: usize,
    pub monthly_cost: String,
}

struct CreateVpcTool<P> {
    provider: Arc<P>,
    route_table_mode: RouteTableMode,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for CreateVpcTool<P> {
    fn name(&self) -> &'static str {
        "create_vpc"
    }

    fn description(&self) -> &'static str {
        "Create a VPC with packed subnets and optional internet/NAT gateways"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: CreateVpcInput = serde_json::from_value(input)?;
        let parent = parse_parent_block(&input.cidr).map_err(domain_error)?;
        let gateways = GatewayRequest {
            internet_gateway: input.internet_gateway,
            nat_gateway: input.nat_gateway,
        };
        let plan = netplan::plan(parent, &input.subnets, gateways).map_err(domain_error)?;

        let provisioner = NetworkProvisioner::new(self.provider.as_ref());
        let options = ProvisionOptions {
            name: input.name.clone(),
            route_table_mode: self.route_table_mode,
            tags: Default::default(),
        };
        let summary = provisioner.apply(&plan, &options).await.map_err(anyhow::Error::new)?;

        let subnets = plan
            .subnets
            .iter()
            .zip(&summary.subnet_ids)
            .map(|(allocated, subnet_id)| CreatedSubnet {
                subnet_id: subnet_id.clone(),
                cidr: allocated.network.to_string(),
                tier: allocated.tier,
            })
            .collect();

        let output = VpcCreated {
            vpc_id: summary.vpc_id,
            name: input.name,
            cidr: summary.cidr,
            subnets,
            internet_gateway_id: summary.internet_gateway_id,
            nat_gateway_id: summary.nat_gateway_id,
            nat_downgraded: input.nat_gateway && !plan.nat_gateway,
            subnet_count: summary.subnet_count,
            monthly_cost: network_cost_line(plan.nat_gateway),
        };
        Ok(serde_json::to_value(output)?)
    }
}

struct ListVpcsTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for ListVpcsTool<P> {
    fn name(&self) -> &'static str {
        "list_vpcs"
    }

    fn description(&self) -> &'static str {
        "List all VPCs and their CIDR blocks"
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        let vpcs = self.provider.list_vpcs().await.map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(vpcs)?)
    }
}

// ---- compute ----

fn default_true() -> bool {
    true
}

fn default_ebs_size() -> u32 {
    8
}

#[derive(Debug, Deserialize)]
struct CreateInstanceInput {
    name: String,
    instance_type: String,
    subnet_id: String,
    #[serde(default)]
    image_id: Option<String>,
    #[serde(default = "default_true")]
    public_ip: bool,
    #[serde(default = "default_ebs_size")]
    ebs_size_gb: u32,
    #[serde(default)]
    bootstrap: BootstrapScript,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCreated {
    pub instance: Instance,
    pub estimated_cost: String,
}

struct CreateInstanceTool<P> {
    provider: Arc<P>,
    catalog: InstanceCatalog,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for CreateInstanceTool<P> {
    fn name(&self) -> &'static str {
        "create_instance"
    }

    fn description(&self) -> &'static str {
        "Launch an instance into a subnet"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: CreateInstanceInput = serde_json::from_value(input)?;
        let spec = InstanceLaunchSpec {
            name: input.name,
            instance_type: input.instance_type,
            image_id: input.image_id,
            subnet_id: input.subnet_id,
            public_ip: input.public_ip,
            ebs_size_gb: input.ebs_size_gb,
            bootstrap: input.bootstrap,
            tags: Default::default(),
        };
        let instance = self.provider.run_instance(&spec).await.map_err(anyhow::Error::new)?;
        let estimated_cost = self.catalog.estimate_line(&instance.instance_type);
        Ok(serde_json::to_value(InstanceCreated { instance, estimated_cost })?)
    }
}

struct ListInstancesTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for ListInstancesTool<P> {
    fn name(&self) -> &'static str {
        "list_instances"
    }

    fn description(&self) -> &'static str {
        "List all instances and their states"
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        let instances = self.provider.list_instances().await.map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(instances)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LifecycleAction {
    Start,
    Stop,
    Terminate,
}

#[derive(Debug, Deserialize)]
struct InstanceIdInput {
    instance_id: String,
}

struct InstanceLifecycleTool<P> {
    provider: Arc<P>,
    action: LifecycleAction,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for InstanceLifecycleTool<P> {
    fn name(&self) -> &'static str {
        match self.action {
            LifecycleAction::Start => "start_instance",
            LifecycleAction::Stop => "stop_instance",
            LifecycleAction::Terminate => "terminate_instance",
        }
    }

    fn description(&self) -> &'static str {
        match self.action {
            LifecycleAction::Start => "Start an instance by id",
            LifecycleAction::Stop => "Stop an instance by id",
            LifecycleAction::Terminate => "Terminate an instance by id",
        }
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: InstanceIdInput = serde_json::from_value(input)?;
        let instance = match self.action {
            LifecycleAction::Start => self.provider.start_instance(&input.instance_id).await,
            LifecycleAction::Stop => self.provider.stop_instance(&input.instance_id).await,
            LifecycleAction::Terminate => {
                self.provider.terminate_instance(&input.instance_id).await
            }
        }
        .map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(instance)?)
    }
}

// ---- storage ----

#[derive(Debug, Deserialize)]
struct CreateBucketInput {
    name: String,
    region: String,
    #[serde(default)]
    versioning: bool,
    #[serde(default)]
    encryption: BucketEncryption,
    #[serde(default = "default_true")]
    block_public_access: bool,
}

struct CreateBucketTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for CreateBucketTool<P> {
    fn name(&self) -> &'static str {
        "create_bucket"
    }

    fn description(&self) -> &'static str {
        "Create an object-storage bucket"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: CreateBucketInput = serde_json::from_value(input)?;
        let spec = BucketSpec {
            name: input.name,
            region: input.region,
            versioning: input.versioning,
            encryption: input.encryption,
            block_public_access: input.block_public_access,
            tags: Default::default(),
        };
        let bucket = self.provider.create_bucket(&spec).await.map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(bucket)?)
    }
}

struct ListBucketsTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for ListBucketsTool<P> {
    fn name(&self) -> &'static str {
        "list_buckets"
    }

    fn description(&self) -> &'static str {
        "List all buckets"
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        let buckets = self.provider.list_buckets().await.map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(buckets)?)
    }
}

#[derive(Debug, Deserialize)]
struct BucketNameInput {
    name: String,
}

struct DeleteBucketTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for DeleteBucketTool<P> {
    fn name(&self) -> &'static str {
        "delete_bucket"
    }

    fn description(&self) -> &'static str {
        "Delete a bucket by name"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: BucketNameInput = serde_json::from_value(input)?;
        self.provider.delete_bucket(&input.name).await.map_err(anyhow::Error::new)?;
        Ok(serde_json::json!({ "deleted": input.name }))
    }
}

// ---- identity ----

#[derive(Debug, Deserialize)]
struct CreateUserInput {
    username: String,
    #[serde(default)]
    policies: Vec<String>,
    #[serde(default)]
    console_access: bool,
    #[serde(default)]
    programmatic_access: bool,
}

struct CreateUserTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for CreateUserTool<P> {
    fn name(&self) -> &'static str {
        "create_user"
    }

    fn description(&self) -> &'static str {
        "Create an IAM user with optional policies and access paths"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: CreateUserInput = serde_json::from_value(input)?;
        let spec = UserSpec {
            username: input.username,
            policies: input.policies,
            console_access: input.console_access,
            programmatic_access: input.programmatic_access,
        };
        let user = self.provider.create_user(&spec).await.map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(user)?)
    }
}

struct ListUsersTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for ListUsersTool<P> {
    fn name(&self) -> &'static str {
        "list_users"
    }

    fn description(&self) -> &'static str {
        "List IAM users"
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        let users = self.provider.list_users().await.map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(users)?)
    }
}

#[derive(Debug, Deserialize)]
struct UsernameInput {
    username: String,
}

struct DeleteUserTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for DeleteUserTool<P> {
    fn name(&self) -> &'static str {
        "delete_user"
    }

    fn description(&self) -> &'static str {
        "Delete an IAM user by name"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: UsernameInput = serde_json::from_value(input)?;
        self.provider.delete_user(&input.username).await.map_err(anyhow::Error::new)?;
        Ok(serde_json::json!({ "deleted": input.username }))
    }
}

#[derive(Debug, Deserialize)]
struct CreateGroupInput {
    name: String,
    #[serde(default)]
    policies: Vec<String>,
}

struct CreateGroupTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for CreateGroupTool<P> {
    fn name(&self) -> &'static str {
        "create_group"
    }

    fn description(&self) -> &'static str {
        "Create an IAM group with attached policies"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: CreateGroupInput = serde_json::from_value(input)?;
        let spec = GroupSpec { name: input.name, policies: input.policies };
        let group = self.provider.create_group(&spec).await.map_err(anyhow::Error::new)?;
        Ok(serde_json::to_value(group)?)
    }
}

#[derive(Debug, Deserialize)]
struct MembershipInput {
    username: String,
    group: String,
}

struct AddUserToGroupTool<P> {
    provider: Arc<P>,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for AddUserToGroupTool<P> {
    fn name(&self) -> &'static str {
        "add_user_to_group"
    }

    fn description(&self) -> &'static str {
        "Add an IAM user to a group"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: MembershipInput = serde_json::from_value(input)?;
        self.provider
            .add_user_to_group(&input.username, &input.group)
            .await
            .map_err(anyhow::Error::new)?;
        Ok(serde_json::json!({ "username": input.username, "group": input.group }))
    }
}

#[derive(Debug, Deserialize)]
struct PolicyInput {
    username: String,
    policy: String,
}

struct AttachPolicyTool<P> {
    provider: Arc<P>,
    detach: bool,
}

#[async_trait]
impl<P: CloudProvider + 'static> Tool for AttachPolicyTool<P> {
    fn name(&self) -> &'static str {
        if self.detach {
            "detach_policy"
        } else {
            "attach_policy"
        }
    }

    fn description(&self) -> &'static str {
        if self.detach {
            "Detach a managed policy from a user"
        } else {
            "Attach a managed policy to a user"
        }
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: PolicyInput = serde_json::from_value(input)?;
        if self.detach {
            self.provider
                .detach_user_policy(&input.username, &input.policy)
                .await
                .map_err(anyhow::Error::new)?;
        } else {
            self.provider
                .attach_user_policy(&input.username, &input.policy)
                .await
                .map_err(anyhow::Error::new)?;
        }
        Ok(serde_json::json!({ "username": input.username, "policy": input.policy }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use provy_cloud::{CloudProvider, MemoryCloud};
    use provy_core::catalog::InstanceCatalog;
    use provy_core::domain::network::{RouteTableMode, SubnetTier};
    use provy_core::errors::{ApplicationError, DomainError};
    use provy_core::netplan::AllocationError;

    use super::{register_default_tools, ToolRegistry, VpcCreated};

    fn registry_with_memory_cloud() -> (ToolRegistry, Arc<MemoryCloud>) {
        let provider = Arc::new(MemoryCloud::new("us-east-1"));
        let mut registry = ToolRegistry::default();
        register_default_tools(
            &mut registry,
            Arc::clone(&provider),
            InstanceCatalog::builtin(),
            RouteTableMode::Shared,
        );
        (registry, provider)
    }

    #[tokio::test]
    async fn registry_contains_full_tool_set() {
        let (registry, _provider) = registry_with_memory_cloud();
        assert_eq!(registry.len(), 17);
        assert!(registry.names().contains(&"create_vpc"));
        assert!(registry.names().contains(&"detach_policy"));
    }

    #[tokio::test]
    async fn create_vpc_reports_allocation_in_request_order() {
        let (registry, _provider) = registry_with_memory_cloud();
        let input = json!({
            "name": "dev-net",
            "cidr": "10.0.0.0/16",
            "subnets": [
                { "hosts": 62, "tier": "public" },
                { "hosts": 14, "tier": "private" }
            ],
            "nat_gateway": true
        });

        let output = registry.execute("create_vpc", input).await.expect("tool runs");
        let created: VpcCreated = serde_json::from_value(output).expect("typed output");

        assert_eq!(created.subnet_count, 2);
        assert_eq!(created.subnets[0].cidr, "10.0.0.0/26");
        assert_eq!(created.subnets[0].tier, SubnetTier::Public);
        assert_eq!(created.subnets[1].cidr, "10.0.0.64/28");
        assert!(created.internet_gateway_id.is_some());
        assert!(created.nat_gateway_id.is_some());
        assert!(!created.nat_downgraded);
        assert_eq!(created.monthly_cost, "Estimated monthly cost: $32.40 (IGW + NAT)");
    }

    #[tokio::test]
    async fn create_vpc_flags_nat_downgrade() {
        let (registry, _provider) = registry_with_memory_cloud();
        let input = json!({
            "name": "private-net",
            "cidr": "10.1.0.0/16",
            "subnets": [{ "hosts": 30, "tier": "private" }],
            "nat_gateway": true
        });

        let output = registry.execute("create_vpc", input).await.expect("no error");
        let created: VpcCreated = serde_json::from_value(output).expect("typed output");
        assert!(created.nat_downgraded);
        assert!(created.nat_gateway_id.is_none());
        assert_eq!(created.monthly_cost, "Estimated monthly cost: $0.00 (IGW + NAT)");
    }

    #[tokio::test]
    async fn create_vpc_surfaces_capacity_exhaustion_as_typed_error() {
        let (registry, _provider) = registry_with_memory_cloud();
        let input = json!({
            "name": "too-small",
            "cidr": "10.0.0.0/24",
            "subnets": [{ "hosts": 1000, "tier": "public" }]
        });

        let error = registry.execute("create_vpc", input).await.expect_err("cannot fit");
        let application = error
            .downcast_ref::<ApplicationError>()
            .expect("typed application error");
        assert!(matches!(
            application,
            ApplicationError::Domain(DomainError::Allocation(AllocationError::InsufficientSpace {
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn create_instance_includes_cost_estimate() {
        let (registry, provider) = registry_with_memory_cloud();
        let vpc = provider.create_vpc("dev", "10.0.0.0/16", &Default::default()).await.unwrap();
        let subnet =
            provider.create_subnet(&vpc.id, "10.0.0.0/24", SubnetTier::Public).await.unwrap();

        let output = registry
            .execute(
                "create_instance",
                json!({ "name": "web-1", "instance_type": "t3.micro", "subnet_id": subnet.id }),
            )
            .await
            .expect("tool runs");

        assert_eq!(output["instance"]["name"], "web-1");
        assert!(output["estimated_cost"].as_str().unwrap_or_default().starts_with("$0.0104/hr"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let (registry, _provider) = registry_with_memory_cloud();
        let error = registry.execute("mint_money", Value::Null).await.expect_err("no such tool");
        assert!(error.to_string().contains("unknown tool"));
    }
}
