//! Markdown reply rendering for the conversational layer.

use provy_cloud::models::{Bucket, Group, Instance, User, Vpc};

use crate::tools::{InstanceCreated, VpcCreated};

pub fn help_text() -> String {
    [
        "Here is what I can do:",
        "- `create vpc named dev 10.0.0.0/16 with 2 public subnets for 50 hosts and 1 private subnet for 200 hosts with nat`",
        "- `list vpcs`",
        "- `launch instance named web-1 t3.micro in subnet-00000002`",
        "- `list instances` / `start instance i-...` / `stop instance i-...` / `terminate instance i-...`",
        "- `create bucket team-logs in us-east-1 with versioning`",
        "- `list buckets` / `delete bucket team-logs`",
        "- `create user alice with console access` / `list users` / `delete user alice`",
        "- `create group admins AdministratorAccess` / `add user alice to group admins`",
        "- `attach policy ReadOnlyAccess to user alice`",
        "- `what is a nat gateway` / `recommend an instance for testing`",
    ]
    .join("\n")
}

pub fn vpc_created(created: &VpcCreated) -> String {
    let mut lines = vec![format!(
        "VPC **{}** (`{}`) created as *{}*.",
        created.vpc_id, created.cidr, created.name
    )];

    if created.subnets.is_empty() {
        lines.push("No subnets were requested.".to_string());
    } else {
        lines.push(format!("Subnets ({}):", created.subnet_count));
        for subnet in &created.subnets {
            lines.push(format!(
                "- `{}` ({}) -> {}",
                subnet.cidr,
                subnet.tier.as_str(),
                subnet.subnet_id
            ));
        }
    }

    match &created.internet_gateway_id {
        Some(id) => lines.push(format!("Internet gateway: {id}")),
        None => lines.push("Internet gateway: none".to_string()),
    }
    match &created.nat_gateway_id {
        Some(id) => lines.push(format!("NAT gateway: {id}")),
        None => lines.push("NAT gateway: none".to_string()),
    }
    if created.nat_downgraded {
        lines.push(
            "Note: NAT was requested, but a NAT gateway needs a public subnet to live in, so none was provisioned.".to_string(),
        );
    }
    lines.push(created.monthly_cost.clone());

    lines.join("\n")
}

pub fn vpcs_list(vpcs: &[Vpc]) -> String {
    if vpcs.is_empty() {
        return "No VPCs found.".to_string();
    }
    let mut lines = vec!["**VPCs:**".to_string()];
    for vpc in vpcs {
        lines.push(format!("- {} (`{}`) - {}", vpc.id, vpc.cidr, vpc.name));
    }
    lines.join("\n")
}

pub fn instance_created(created: &InstanceCreated) -> String {
    let instance = &created.instance;
    let mut lines = vec![format!(
        "Instance **{}** ({}) launched in {}.",
        instance.id, instance.instance_type, instance.subnet_id
    )];
    if let Some(public_ip) = &instance.public_ip {
        lines.push(format!("Public IP: {public_ip}"));
    }
    lines.push(format!("Estimated cost: {}", created.estimated_cost));
    lines.join("\n")
}

pub fn instances_list(instances: &[Instance]) -> String {
    if instances.is_empty() {
        return "No instances found.".to_string();
    }
    let mut lines = vec!["**Instances:**".to_string()];
    for instance in instances {
        lines.push(format!(
            "- {} ({}, {})",
            instance.id,
            instance.instance_type,
            instance.state.as_str()
        ));
    }
    lines.join("\n")
}

pub fn instance_transitioned(instance: &Instance, verb: &str) -> String {
    format!("{verb} request sent for instance **{}** (now {}).", instance.id, instance.state.as_str())
}

pub fn bucket_created(bucket: &Bucket) -> String {
    format!(
        "Bucket **{}** created in `{}`{}.",
        bucket.name,
        bucket.region,
        if bucket.versioning { " with versioning" } else { "" }
    )
}

pub fn buckets_list(buckets: &[Bucket]) -> String {
    if buckets.is_empty() {
        return "No buckets found.".to_string();
    }
    let mut lines = vec!["**Buckets:**".to_string()];
    for bucket in buckets {
        lines.push(format!(
            "- {} (region: {}, created: {})",
            bucket.name,
            bucket.region,
            bucket.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
    lines.join("\n")
}

pub fn bucket_deleted(name: &str) -> String {
    format!("Bucket **{name}** and all its contents have been deleted.")
}

pub fn user_created(user: &User) -> String {
    let mut lines = vec![format!("IAM user **{}** created.", user.username)];
    if !user.policies.is_empty() {
        lines.push(format!("Attached policies: {}", user.policies.join(", ")));
    }
    if user.console_access {
        lines.push("Console access enabled with a temporary password reset required.".to_string());
    }
    if user.programmatic_access {
        lines.push("Programmatic access keys were issued.".to_string());
    }
    lines.join("\n")
}

pub fn users_list(users: &[User]) -> String {
    if users.is_empty() {
        return "No IAM users found.".to_string();
    }
    let mut lines = vec!["**IAM users:**".to_string()];
    for user in users {
        lines.push(format!(
            "- {} (created: {})",
            user.username,
            user.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
    lines.join("\n")
}

pub fn user_deleted(username: &str) -> String {
    format!("IAM user **{username}** deleted.")
}

pub fn group_created(group: &Group) -> String {
    if group.policies.is_empty() {
        format!("IAM group **{}** created.", group.name)
    } else {
        format!(
            "IAM group **{}** created with policies: {}.",
            group.name,
            group.policies.join(", ")
        )
    }
}

pub fn user_added_to_group(username: &str, group: &str) -> String {
    format!("User **{username}** added to group **{group}**.")
}

pub fn policy_changed(username: &str, policy: &str, detached: bool) -> String {
    if detached {
        format!("Policy **{policy}** detached from user **{username}**.")
    } else {
        format!("Policy **{policy}** attached to user **{username}**.")
    }
}

pub fn error_reply(user_message: &str, correlation_id: &str) -> String {
    format!("{user_message} (ref {correlation_id})")
}

#[cfg(test)]
mod tests {
    use provy_core::domain::network::SubnetTier;

    use crate::tools::{CreatedSubnet, VpcCreated};

    use super::{help_text, vpc_created};

    fn created_fixture() -> VpcCreated {
        VpcCreated {
            vpc_id: "vpc-00000001".to_string(),
            name: "dev-net".to_string(),
            cidr: "10.0.0.0/16".to_string(),
            subnets: vec![
                CreatedSubnet {
                    subnet_id: "subnet-00000003".to_string(),
                    cidr: "10.0.0.0/26".to_string(),
                    tier: SubnetTier::Public,
                },
                CreatedSubnet {
                    subnet_id: "subnet-00000004".to_string(),
                    cidr: "10.0.0.64/28".to_string(),
                    tier: SubnetTier::Private,
                },
            ],
            internet_gateway_id: Some("igw-00000002".to_string()),
            nat_gateway_id: Some("nat-00000008".to_string()),
            nat_downgraded: false,
            subnet_count: 2,
            monthly_cost: "Estimated monthly cost: $32.40 (IGW + NAT)".to_string(),
        }
    }

    #[test]
    fn vpc_reply_lists_subnets_in_order_with_gateways() {
        let reply = vpc_created(&created_fixture());
        let public_position = reply.find("10.0.0.0/26").expect("public subnet listed");
        let private_position = reply.find("10.0.0.64/28").expect("private subnet listed");
        assert!(public_position < private_position);
        assert!(reply.contains("igw-00000002"));
        assert!(reply.contains("nat-00000008"));
        assert!(reply.contains("$32.40"));
    }

    #[test]
    fn downgraded_nat_gets_an_explanatory_note() {
        let mut created = created_fixture();
        created.nat_gateway_id = None;
        created.nat_downgraded = true;
        let reply = vpc_created(&created);
        assert!(reply.contains("NAT gateway: none"));
        assert!(reply.contains("needs a public subnet"));
    }

    #[test]
    fn help_covers_all_resource_families() {
        let help = help_text();
        for needle in ["vpc", "instance", "bucket", "user", "group", "policy"] {
            assert!(help.contains(needle), "help should mention {needle}");
        }
    }
}
