//! The agent runtime: extract an intent, consult session memory, dispatch
//! the matching tool, and render a reply. The extractor is strictly a
//! translator - every provisioning decision (packing, gateway policy,
//! validation) is made by the deterministic core underneath.

use std::str::FromStr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use serde_json::json;
use uuid::Uuid;

use provy_cloud::models::{Bucket, Group, Instance, User, Vpc};
use provy_cloud::{CloudError, CloudProvider};
use provy_core::catalog::InstanceCatalog;
use provy_core::domain::network::RouteTableMode;
use provy_core::errors::ApplicationError;
use provy_core::knowledge::KnowledgeBase;
use provy_core::netplan::suggest_parent_block;

use crate::intent::{
    BucketSlots, InstanceSlots, Intent, IntentExtractor, UserSlots, VpcSlots,
};
use crate::replies;
use crate::session::{SessionStore, SessionUpdate};
use crate::tools::{register_default_tools, InstanceCreated, ToolRegistry, VpcCreated};

const LAST_INSTANCE_KEY: &str = "last_instance_id";

pub struct AgentRuntime<P: CloudProvider + 'static> {
    provider: Arc<P>,
    extractor: IntentExtractor,
    sessions: SessionStore,
    registry: ToolRegistry,
    knowledge: KnowledgeBase,
    catalog: InstanceCatalog,
    default_region: String,
}

impl<P: CloudProvider + 'static> AgentRuntime<P> {
    pub fn new(provider: Arc<P>, knowledge: KnowledgeBase, route_table_mode: RouteTableMode) -> Self {
        let catalog = InstanceCatalog::builtin();
        let mut registry = ToolRegistry::default();
        register_default_tools(
            &mut registry,
            Arc::clone(&provider),
            catalog.clone(),
            route_table_mode,
        );
        let default_region = provider.region().to_string();

        Self {
            provider,
            extractor: IntentExtractor::new(),
            sessions: SessionStore::new(),
            registry,
            knowledge,
            catalog,
            default_region,
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub async fn handle_message(&self, user_id: &str, text: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        let extracted = self.extractor.extract(text);
        tracing::info!(
            user_id,
            correlation_id = %correlation_id,
            intent = extracted.intent.key(),
            confidence = extracted.confidence,
            "intent extracted"
        );

        self.sessions.update(user_id, SessionUpdate::intent(extracted.intent.key()));
        if let Some(clarification) = extracted.clarification {
            return clarification;
        }

        match extracted.intent {
            Intent::Help => replies::help_text(),
            Intent::KnowledgeQuery => self
                .knowledge
                .lookup(text)
                .map(str::to_string)
                .unwrap_or_else(|| "I don't have that in my knowledge base yet.".to_string()),
            Intent::InstanceRecommendation => self
                .knowledge
                .recommend_instance(text)
                .map(str::to_string)
                .unwrap_or_else(|| self.catalog.recommend(text)),
            Intent::CreateVpc(slots) => self.create_vpc(user_id, slots, &correlation_id).await,
            Intent::ListVpcs => self.list_vpcs(&correlation_id).await,
            Intent::CreateInstance(slots) => {
                self.create_instance(user_id, slots, &correlation_id).await
            }
            Intent::ListInstances => self.list_instances(&correlation_id).await,
            Intent::StartInstance { instance_id } => {
                self.instance_lifecycle(user_id, "start_instance", "Start", instance_id, &correlation_id)
                    .await
            }
            Intent::StopInstance { instance_id } => {
                self.instance_lifecycle(user_id, "stop_instance", "Stop", instance_id, &correlation_id)
                    .await
            }
            Intent::TerminateInstance { instance_id } => {
                self.instance_lifecycle(
                    user_id,
                    "terminate_instance",
                    "Termination",
                    instance_id,
                    &correlation_id,
                )
                .await
            }
            Intent::CreateBucket(slots) => self.create_bucket(user_id, slots, &correlation_id).await,
            Intent::ListBuckets => self.list_buckets(&correlation_id).await,
            Intent::DeleteBucket { name } => self.delete_bucket(name, &correlation_id).await,
            Intent::CreateUser(slots) => self.create_user(user_id, slots, &correlation_id).await,
            Intent::ListUsers => self.list_users(&correlation_id).await,
            Intent::DeleteUser { username } => self.delete_user(username, &correlation_id).await,
            Intent::CreateGroup { name, policies } => {
                self.create_group(name, policies, &correlation_id).await
            }
            Intent::AddUserToGroup { username, group } => {
                self.add_user_to_group(username, group, &correlation_id).await
            }
            Intent::AttachPolicy { username, policy } => {
                self.change_policy(username, policy, false, &correlation_id).await
            }
            Intent::DetachPolicy { username, policy } => {
                self.change_policy(username, policy, true, &correlation_id).await
            }
            Intent::Unknown => replies::help_text(),
        }
    }

    async fn create_vpc(&self, user_id: &str, slots: VpcSlots, correlation_id: &str) -> String {
        let cidr = match slots.cidr {
            Some(cidr) => cidr,
            None => match self.suggest_cidr(correlation_id).await {
                Ok(suggested) => suggested,
                Err(reply) => return reply,
            },
        };
        let name = slots.name.unwrap_or_else(|| "provy-vpc".to_string());
        let input = json!({
            "name": name,
            "cidr": cidr,
            "subnets": slots.subnets,
            "internet_gateway": slots.internet_gateway,
            "nat_gateway": slots.nat_gateway,
        });

        match self.registry.execute("create_vpc", input).await {
            Ok(output) => match serde_json::from_value::<VpcCreated>(output) {
                Ok(created) => {
                    self.sessions.update(
                        user_id,
                        SessionUpdate::intent("create_vpc")
                            .action("provisioned")
                            .entity(created.vpc_id.clone()),
                    );
                    replies::vpc_created(&created)
                }
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    /// Pick the first free 10.x.0.0/16 given the blocks already in use,
    /// mirroring what the allocator would be given by a form-based caller.
    async fn suggest_cidr(&self, correlation_id: &str) -> Result<String, String> {
        let vpcs = self
            .provider
            .list_vpcs()
            .await
            .map_err(|error| self.render_error(anyhow::Error::new(error), correlation_id))?;
        let existing: Vec<Ipv4Net> =
            vpcs.iter().filter_map(|vpc| Ipv4Net::from_str(&vpc.cidr).ok()).collect();
        suggest_parent_block(&existing)
            .map(|block| block.to_string())
            .ok_or_else(|| {
                "No free parent block is left in 10.0.0.0/8; please provide a CIDR explicitly."
                    .to_string()
            })
    }

    async fn list_vpcs(&self, correlation_id: &str) -> String {
        match self.registry.execute("list_vpcs", json!({})).await {
            Ok(output) => match serde_json::from_value::<Vec<Vpc>>(output) {
                Ok(vpcs) => replies::vpcs_list(&vpcs),
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn create_instance(
        &self,
        user_id: &str,
        slots: InstanceSlots,
        correlation_id: &str,
    ) -> String {
        let input = json!({
            "name": slots.name.unwrap_or_else(|| "provy-instance".to_string()),
            "instance_type": slots.instance_type,
            "subnet_id": slots.subnet_id,
            "public_ip": slots.public_ip,
        });

        match self.registry.execute("create_instance", input).await {
            Ok(output) => match serde_json::from_value::<InstanceCreated>(output) {
                Ok(created) => {
                    self.sessions.update(
                        user_id,
                        SessionUpdate::intent("create_instance")
                            .action("provisioned")
                            .entity(created.instance.id.clone())
                            .context(LAST_INSTANCE_KEY, created.instance.id.clone()),
                    );
                    replies::instance_created(&created)
                }
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn list_instances(&self, correlation_id: &str) -> String {
        match self.registry.execute("list_instances", json!({})).await {
            Ok(output) => match serde_json::from_value::<Vec<Instance>>(output) {
                Ok(instances) => replies::instances_list(&instances),
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn instance_lifecycle(
        &self,
        user_id: &str,
        tool: &str,
        verb: &str,
        instance_id: Option<String>,
        correlation_id: &str,
    ) -> String {
        let instance_id = instance_id.or_else(|| {
            self.sessions.get(user_id).context.get(LAST_INSTANCE_KEY).cloned()
        });
        let Some(instance_id) = instance_id else {
            return "Please specify the instance id (e.g. `stop instance i-00000003`).".to_string();
        };

        match self.registry.execute(tool, json!({ "instance_id": instance_id })).await {
            Ok(output) => match serde_json::from_value::<Instance>(output) {
                Ok(instance) => {
                    self.sessions.update(
                        user_id,
                        SessionUpdate::intent(tool)
                            .action("executed")
                            .entity(instance.id.clone())
                            .context(LAST_INSTANCE_KEY, instance.id.clone()),
                    );
                    replies::instance_transitioned(&instance, verb)
                }
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn create_bucket(
        &self,
        user_id: &str,
        slots: BucketSlots,
        correlation_id: &str,
    ) -> String {
        let input = json!({
            "name": slots.name,
            "region": slots.region.unwrap_or_else(|| self.default_region.clone()),
            "versioning": slots.versioning,
        });

        match self.registry.execute("create_bucket", input).await {
            Ok(output) => match serde_json::from_value::<Bucket>(output) {
                Ok(bucket) => {
                    self.sessions.update(
                        user_id,
                        SessionUpdate::intent("create_bucket")
                            .action("provisioned")
                            .entity(bucket.name.clone()),
                    );
                    replies::bucket_created(&bucket)
                }
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn list_buckets(&self, correlation_id: &str) -> String {
        match self.registry.execute("list_buckets", json!({})).await {
            Ok(output) => match serde_json::from_value::<Vec<Bucket>>(output) {
                Ok(buckets) => replies::buckets_list(&buckets),
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn delete_bucket(&self, name: Option<String>, correlation_id: &str) -> String {
        let Some(name) = name else {
            return "Which bucket should be deleted?".to_string();
        };
        match self.registry.execute("delete_bucket", json!({ "name": name })).await {
            Ok(_) => replies::bucket_deleted(&name),
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn create_user(&self, user_id: &str, slots: UserSlots, correlation_id: &str) -> String {
        let input = json!({
            "username": slots.username,
            "policies": slots.policies,
            "console_access": slots.console_access,
            "programmatic_access": slots.programmatic_access,
        });

        match self.registry.execute("create_user", input).await {
            Ok(output) => match serde_json::from_value::<User>(output) {
                Ok(user) => {
                    self.sessions.update(
                        user_id,
                        SessionUpdate::intent("create_user")
                            .action("provisioned")
                            .entity(user.username.clone()),
                    );
                    replies::user_created(&user)
                }
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn list_users(&self, correlation_id: &str) -> String {
        match self.registry.execute("list_users", json!({})).await {
            Ok(output) => match serde_json::from_value::<Vec<User>>(output) {
                Ok(users) => replies::users_list(&users),
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn delete_user(&self, username: Option<String>, correlation_id: &str) -> String {
        let Some(username) = username else {
            return "Which user should be deleted?".to_string();
        };
        match self.registry.execute("delete_user", json!({ "username": username })).await {
            Ok(_) => replies::user_deleted(&username),
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn create_group(
        &self,
        name: Option<String>,
        policies: Vec<String>,
        correlation_id: &str,
    ) -> String {
        let Some(name) = name else {
            return "Please give the group a name.".to_string();
        };
        match self
            .registry
            .execute("create_group", json!({ "name": name, "policies": policies }))
            .await
        {
            Ok(output) => match serde_json::from_value::<Group>(output) {
                Ok(group) => replies::group_created(&group),
                Err(error) => self.render_error(error.into(), correlation_id),
            },
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn add_user_to_group(
        &self,
        username: Option<String>,
        group: Option<String>,
        correlation_id: &str,
    ) -> String {
        let (Some(username), Some(group)) = (username, group) else {
            return "Tell me both the user and the group.".to_string();
        };
        match self
            .registry
            .execute("add_user_to_group", json!({ "username": username, "group": group }))
            .await
        {
            Ok(_) => replies::user_added_to_group(&username, &group),
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    async fn change_policy(
        &self,
        username: Option<String>,
        policy: Option<String>,
        detach: bool,
        correlation_id: &str,
    ) -> String {
        let (Some(username), Some(policy)) = (username, policy) else {
            return "Tell me both the user and the policy.".to_string();
        };
        let tool = if detach { "detach_policy" } else { "attach_policy" };
        match self
            .registry
            .execute(tool, json!({ "username": username, "policy": policy }))
            .await
        {
            Ok(_) => replies::policy_changed(&username, &policy, detach),
            Err(error) => self.render_error(error, correlation_id),
        }
    }

    fn render_error(&self, error: anyhow::Error, correlation_id: &str) -> String {
        if let Some(application) = error.downcast_ref::<ApplicationError>() {
            tracing::warn!(correlation_id, error = %application, "request rejected");
            let interface = application.clone().into_interface(correlation_id);
            return replies::error_reply(interface.user_message(), correlation_id);
        }

        if let Some(cloud) = error.downcast_ref::<CloudError>() {
            tracing::warn!(correlation_id, error = %cloud, "provider call failed");
            return match cloud {
                CloudError::NotFound(what) => format!("I couldn't find {what}."),
                CloudError::Conflict(what) => format!("That conflicts with existing resources: {what}."),
                CloudError::Authentication(_) => replies::error_reply(
                    "The cloud provider rejected our credentials.",
                    correlation_id,
                ),
                _ => replies::error_reply(
                    "The cloud provider is temporarily unavailable. Please retry shortly.",
                    correlation_id,
                ),
            };
        }

        tracing::error!(correlation_id, error = %error, "unexpected failure");
        replies::error_reply("An unexpected internal error occurred.", correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use provy_cloud::{CloudProvider, MemoryCloud};
    use provy_core::domain::network::RouteTableMode;
    use provy_core::knowledge::KnowledgeBase;

    use super::AgentRuntime;

    fn runtime() -> AgentRuntime<MemoryCloud> {
        AgentRuntime::new(
            Arc::new(MemoryCloud::new("us-east-1")),
            KnowledgeBase::builtin(),
            RouteTableMode::Shared,
        )
    }

    #[tokio::test]
    async fn full_vpc_conversation_reports_packed_subnets() {
        let runtime = runtime();
        let reply = runtime
            .handle_message(
                "u1",
                "create vpc named dev 10.0.0.0/16 with 1 public subnet for 62 hosts and 1 private subnet for 14 hosts with nat",
            )
            .await;

        assert!(reply.contains("10.0.0.0/26"), "reply: {reply}");
        assert!(reply.contains("10.0.0.64/28"), "reply: {reply}");
        assert!(reply.contains("NAT gateway: nat-"), "reply: {reply}");
        assert!(reply.contains("$32.40"), "reply: {reply}");
    }

    #[tokio::test]
    async fn capacity_exhaustion_is_actionable_and_all_or_nothing() {
        let runtime = runtime();
        let reply = runtime
            .handle_message("u1", "create vpc 10.0.0.0/24 with 1 public subnet for 1000 hosts")
            .await;
        assert!(
            reply.contains("The requested subnets do not fit in the given block."),
            "reply: {reply}"
        );

        // Nothing was partially provisioned.
        let listing = runtime.handle_message("u1", "list vpcs").await;
        assert_eq!(listing, "No VPCs found.");
    }

    #[tokio::test]
    async fn nat_downgrade_is_reported_not_errored() {
        let runtime = runtime();
        let reply = runtime
            .handle_message(
                "u1",
                "create vpc 10.4.0.0/16 with 1 private subnet for 20 hosts and nat",
            )
            .await;
        assert!(reply.contains("NAT gateway: none"), "reply: {reply}");
        assert!(reply.contains("needs a public subnet"), "reply: {reply}");
    }

    #[tokio::test]
    async fn missing_cidr_is_auto_suggested_from_existing_blocks() {
        let provider = Arc::new(MemoryCloud::new("us-east-1"));
        provider
            .create_vpc("existing", "10.1.0.0/16", &Default::default())
            .await
            .expect("seed vpc");
        let runtime = AgentRuntime::new(
            Arc::clone(&provider),
            KnowledgeBase::builtin(),
            RouteTableMode::Shared,
        );

        let reply =
            runtime.handle_message("u1", "create vpc with 1 public subnet for 10 hosts").await;
        assert!(reply.contains("10.2.0.0/16"), "reply: {reply}");
    }

    #[tokio::test]
    async fn lifecycle_follows_up_via_session_memory() {
        let runtime = runtime();
        runtime.handle_message("u1", "create vpc named dev 10.0.0.0/16 with 1 public subnet for 10 hosts").await;
        let listing = runtime.handle_message("u1", "list vpcs").await;
        assert!(listing.contains("vpc-"), "listing: {listing}");

        // Find the created subnet id through the provider-visible listing.
        let reply = runtime
            .handle_message("u1", "launch instance named web t3.micro in subnet-00000003")
            .await;
        assert!(reply.contains("Instance **i-"), "reply: {reply}");

        let stop_reply = runtime.handle_message("u1", "stop instance").await;
        assert!(stop_reply.contains("now stopped"), "reply: {stop_reply}");
    }

    #[tokio::test]
    async fn lifecycle_without_any_context_asks_for_an_id() {
        let runtime = runtime();
        let reply = runtime.handle_message("u1", "stop instance").await;
        assert!(reply.contains("specify the instance id"), "reply: {reply}");
    }

    #[tokio::test]
    async fn knowledge_and_recommendation_answers() {
        let runtime = runtime();
        let answer = runtime.handle_message("u1", "what is s3").await;
        assert!(answer.contains("object storage"), "answer: {answer}");

        let recommendation =
            runtime.handle_message("u1", "recommend an instance for testing").await;
        assert!(recommendation.contains("t3.micro"), "recommendation: {recommendation}");
    }

    #[tokio::test]
    async fn bucket_round_trip() {
        let runtime = runtime();
        let created = runtime
            .handle_message("u1", "create bucket team-logs in eu-west-1 with versioning")
            .await;
        assert!(created.contains("team-logs"), "reply: {created}");
        assert!(created.contains("eu-west-1"), "reply: {created}");

        let listing = runtime.handle_message("u1", "list buckets").await;
        assert!(listing.contains("team-logs"), "listing: {listing}");

        let deleted = runtime.handle_message("u1", "delete bucket team-logs").await;
        assert!(deleted.contains("deleted"), "reply: {deleted}");
        assert_eq!(runtime.handle_message("u1", "list buckets").await, "No buckets found.");
    }

    #[tokio::test]
    async fn iam_round_trip() {
        let runtime = runtime();
        let created = runtime
            .handle_message("u1", "create user alice with console access")
            .await;
        assert!(created.contains("alice"), "reply: {created}");
        assert!(created.contains("Console access"), "reply: {created}");

        runtime.handle_message("u1", "create group admins AdministratorAccess").await;
        let membership = runtime.handle_message("u1", "add user alice to group admins").await;
        assert!(membership.contains("added to group"), "reply: {membership}");

        let attach = runtime
            .handle_message("u1", "attach policy ReadOnlyAccess to user alice")
            .await;
        assert!(attach.contains("ReadOnlyAccess"), "reply: {attach}");

        let missing = runtime.handle_message("u1", "delete user bob").await;
        assert!(missing.contains("couldn't find"), "reply: {missing}");
    }

    #[tokio::test]
    async fn duplicate_bucket_is_reported_as_conflict() {
        let runtime = runtime();
        runtime.handle_message("u1", "create bucket team-logs").await;
        let reply = runtime.handle_message("u1", "create bucket team-logs").await;
        assert!(reply.contains("conflicts"), "reply: {reply}");
    }
}
