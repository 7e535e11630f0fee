use serde_json::json;

use provy_core::domain::network::{
    parse_parent_block, GatewayRequest, NetworkPlan, SubnetRequest,
};
use provy_core::netplan::{self, usable_hosts};
use provy_core::{catalog, SubnetTier};

use crate::commands::CommandResult;

pub fn run(
    parent: &str,
    subnet_args: &[String],
    internet_gateway: bool,
    nat: bool,
    json: bool,
) -> CommandResult {
    let parent = match parse_parent_block(parent) {
        Ok(parent) => parent,
        Err(error) => return CommandResult::failure("plan", "validation", error.to_string(), 2),
    };

    let mut requests = Vec::with_capacity(subnet_args.len());
    for argument in subnet_args {
        match parse_subnet_argument(argument) {
            Ok(request) => requests.push(request),
            Err(message) => return CommandResult::failure("plan", "validation", message, 2),
        }
    }

    let gateways = GatewayRequest { internet_gateway, nat_gateway: nat };
    match netplan::plan(parent, &requests, gateways) {
        Ok(plan) => {
            let output = if json { render_json(&plan) } else { render_human(&plan, nat) };
            CommandResult { exit_code: 0, output }
        }
        Err(error) => CommandResult::failure(
            "plan",
            "capacity",
            format!("{error}: requested subnets do not fit in the given block"),
            4,
        ),
    }
}

fn parse_subnet_argument(argument: &str) -> Result<SubnetRequest, String> {
    let Some((tier, hosts)) = argument.split_once(':') else {
        return Err(format!("invalid subnet spec `{argument}` (expected TIER:HOSTS, e.g. public:62)"));
    };
    let tier: SubnetTier = tier.parse().map_err(|error| format!("{error}"))?;
    let hosts = hosts
        .parse::<u32>()
        .map_err(|_| format!("invalid host count `{hosts}` in subnet spec `{argument}`"))?;
    Ok(SubnetRequest { hosts, tier })
}

fn render_json(plan: &NetworkPlan) -> String {
    let subnets: Vec<_> = plan
        .subnets
        .iter()
        .map(|subnet| {
            json!({
                "cidr": subnet.network.to_string(),
                "tier": subnet.tier.as_str(),
                "request_index": subnet.request_index,
                "usable_hosts": usable_hosts(subnet.network.prefix_len()),
            })
        })
        .collect();

    let payload = json!({
        "parent": plan.parent.to_string(),
        "subnets": subnets,
        "internet_gateway": plan.internet_gateway,
        "nat_gateway": plan.nat_gateway,
        "subnet_count": plan.subnet_count,
    });
    serde_json::to_string_pretty(&payload).unwrap_or_else(|error| {
        format!("{{\"error\":\"plan serialization failed: {error}\"}}")
    })
}

fn render_human(plan: &NetworkPlan, nat_requested: bool) -> String {
    let mut lines = vec![format!("allocation plan for {}:", plan.parent)];

    if plan.subnets.is_empty() {
        lines.push("- no subnets requested".to_string());
    }
    for subnet in &plan.subnets {
        lines.push(format!(
            "- {} {} ({} usable hosts)",
            subnet.network,
            subnet.tier.as_str(),
            usable_hosts(subnet.network.prefix_len())
        ));
    }

    lines.push(format!("internet gateway: {}", if plan.internet_gateway { "yes" } else { "no" }));
    lines.push(format!("nat gateway: {}", if plan.nat_gateway { "yes" } else { "no" }));
    if nat_requested && !plan.nat_gateway {
        lines.push(
            "note: NAT was requested but needs both a public and a private subnet; it was not included".to_string(),
        );
    }
    lines.push(catalog::network_cost_line(plan.nat_gateway));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::run;

    fn subnet_args(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn plans_spec_example_with_minimal_prefixes() {
        let result = run(
            "10.0.0.0/16",
            &subnet_args(&["public:62", "private:14"]),
            false,
            true,
            false,
        );
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("10.0.0.0/26 public (62 usable hosts)"), "{}", result.output);
        assert!(result.output.contains("10.0.0.64/28 private (14 usable hosts)"), "{}", result.output);
        assert!(result.output.contains("nat gateway: yes"), "{}", result.output);
        assert!(result.output.contains("$32.40"), "{}", result.output);
    }

    #[test]
    fn json_output_preserves_request_order() {
        let result = run(
            "10.0.0.0/16",
            &subnet_args(&["private:14", "public:62"]),
            false,
            false,
            true,
        );
        assert_eq!(result.exit_code, 0);
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("valid JSON");
        assert_eq!(payload["subnets"][0]["tier"], "private");
        assert_eq!(payload["subnets"][0]["request_index"], 0);
        assert_eq!(payload["subnets"][1]["cidr"], "10.0.0.0/26");
    }

    #[test]
    fn capacity_exhaustion_sets_dedicated_exit_code() {
        let result = run("10.0.0.0/24", &subnet_args(&["public:1000"]), false, false, false);
        assert_eq!(result.exit_code, 4);
        assert!(result.output.contains("insufficient address space"), "{}", result.output);
        assert!(
            result.output.contains("requested subnets do not fit in the given block"),
            "{}",
            result.output
        );
    }

    #[test]
    fn malformed_inputs_fail_validation_before_allocation() {
        let bad_parent = run("not-a-cidr", &[], false, false, false);
        assert_eq!(bad_parent.exit_code, 2);
        assert!(bad_parent.output.contains("invalid parent CIDR"), "{}", bad_parent.output);

        let bad_tier = run("10.0.0.0/16", &subnet_args(&["dmz:20"]), false, false, false);
        assert_eq!(bad_tier.exit_code, 2);
        assert!(bad_tier.output.contains("unknown subnet tier"), "{}", bad_tier.output);

        let bad_hosts = run("10.0.0.0/16", &subnet_args(&["public:lots"]), false, false, false);
        assert_eq!(bad_hosts.exit_code, 2);
        assert!(bad_hosts.output.contains("invalid host count"), "{}", bad_hosts.output);
    }

    #[test]
    fn empty_request_list_is_a_valid_plan() {
        let result = run("10.0.0.0/16", &[], false, false, false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("no subnets requested"), "{}", result.output);
        assert!(result.output.contains("internet gateway: no"), "{}", result.output);
    }

    #[test]
    fn nat_downgrade_note_appears_without_public_subnets() {
        let result = run("10.0.0.0/16", &subnet_args(&["private:20"]), false, true, false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("nat gateway: no"), "{}", result.output);
        assert!(result.output.contains("note: NAT was requested"), "{}", result.output);
    }
}
