//! Deterministic intent extraction.
//!
//! No model in the loop: a synonym map normalizes common phrasings, then
//! keyword rules classify the request and token scans pull out the slots
//! (resource ids, names, instance types, subnet specs). Underspecified
//! requests come back with a clarification prompt instead of an intent the
//! runtime would have to guess at.

use std::str::FromStr;

use ipnet::Ipv4Net;

use provy_core::domain::network::{SubnetRequest, SubnetTier};

const SYNONYMS: &[(&str, &str)] = &[
    ("spin up", "create"),
    ("set up", "create"),
    ("setup", "create"),
    ("provision", "create"),
    ("launch", "create"),
    ("build", "create"),
    ("create ec2", "create instance"),
    ("create server", "create instance"),
    ("new instance", "create instance"),
    ("new server", "create instance"),
    ("new ec2", "create instance"),
    ("create s3", "create bucket"),
    ("new s3", "create bucket"),
    ("make bucket", "create bucket"),
    ("bucket create", "create bucket"),
    ("new bucket", "create bucket"),
    ("terminate ec2", "terminate instance"),
    ("delete instance", "terminate instance"),
    ("new vpc", "create vpc"),
    ("new user", "create user"),
    ("new group", "create group"),
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VpcSlots {
    pub name: Option<String>,
    pub cidr: Option<String>,
    pub subnets: Vec<SubnetRequest>,
    pub internet_gateway: bool,
    pub nat_gateway: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceSlots {
    pub name: Option<String>,
    pub instance_type: Option<String>,
    pub subnet_id: Option<String>,
    pub public_ip: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketSlots {
    pub name: Option<String>,
    pub region: Option<String>,
    pub versioning: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserSlots {
    pub username: Option<String>,
    pub policies: Vec<String>,
    pub console_access: bool,
    pub programmatic_access: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    CreateVpc(VpcSlots),
    ListVpcs,
    CreateInstance(InstanceSlots),
    ListInstances,
    StartInstance { instance_id: Option<String> },
    StopInstance { instance_id: Option<String> },
    TerminateInstance { instance_id: Option<String> },
    CreateBucket(BucketSlots),
    ListBuckets,
    DeleteBucket { name: Option<String> },
    CreateUser(UserSlots),
    ListUsers,
    DeleteUser { username: Option<String> },
    CreateGroup { name: Option<String>, policies: Vec<String> },
    AddUserToGroup { username: Option<String>, group: Option<String> },
    AttachPolicy { username: Option<String>, policy: Option<String> },
    DetachPolicy { username: Option<String>, policy: Option<String> },
    InstanceRecommendation,
    KnowledgeQuery,
    Help,
    Unknown,
}

impl Intent {
    /// Stable key recorded in session memory.
    pub fn key(&self) -> &'static str {
        match self {
            Self::CreateVpc(_) => "create_vpc",
            Self::ListVpcs => "list_vpcs",
            Self::CreateInstance(_) => "create_instance",
            Self::ListInstances => "list_instances",
            Self::StartInstance { .. } => "start_instance",
            Self::StopInstance { .. } => "stop_instance",
            Self::TerminateInstance { .. } => "terminate_instance",
            Self::CreateBucket(_) => "create_bucket",
            Self::ListBuckets => "list_buckets",
            Self::DeleteBucket { .. } => "delete_bucket",
            Self::CreateUser(_) => "create_user",
            Self::ListUsers => "list_users",
            Self::DeleteUser { .. } => "delete_user",
            Self::CreateGroup { .. } => "create_group",
            Self::AddUserToGroup { .. } => "add_user_to_group",
            Self::AttachPolicy { .. } => "attach_policy",
            Self::DetachPolicy { .. } => "detach_policy",
            Self::InstanceRecommendation => "instance_recommendation",
            Self::KnowledgeQuery => "knowledge_query",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedIntent {
    pub intent: Intent,
    pub confidence: u8,
    pub clarification: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> ExtractedIntent {
        let normalized = apply_synonyms(&text.to_ascii_lowercase());
        let raw_tokens = tokenize(text);

        let intent = detect_intent(&normalized, &raw_tokens);
        let clarification = clarification_for(&intent);
        let confidence = confidence_for(&intent, &clarification);

        ExtractedIntent { intent, confidence, clarification }
    }
}

fn apply_synonyms(text: &str) -> String {
    let mut output = text.to_string();
    for (from, to) in SYNONYMS {
        if output.contains(from) {
            output = output.replace(from, to);
        }
    }
    output
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || matches!(character, '.' | '/' | '-' | '_') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

fn detect_intent(normalized: &str, raw_tokens: &[String]) -> Intent {
    let has = |word: &str| normalized.split_whitespace().any(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()) == word);

    if normalized.trim().is_empty() || has("help") {
        return Intent::Help;
    }

    let knowledge_lead = ["what is", "what does", "explain", "how does", "tell me about", "define"];
    if knowledge_lead.iter().any(|lead| normalized.contains(lead)) {
        return Intent::KnowledgeQuery;
    }

    if normalized.contains("recommend")
        || (normalized.contains("which") && normalized.contains("instance"))
        || (normalized.contains("need") && normalized.contains("instance"))
    {
        return Intent::InstanceRecommendation;
    }

    if normalized.contains("create") {
        if has("vpc") || has("network") {
            return Intent::CreateVpc(parse_vpc_slots(normalized, raw_tokens));
        }
        if has("instance") {
            return Intent::CreateInstance(parse_instance_slots(raw_tokens));
        }
        if has("bucket") {
            return Intent::CreateBucket(parse_bucket_slots(normalized, raw_tokens));
        }
        if has("group") {
            return Intent::CreateGroup {
                name: value_after(raw_tokens, &["group"]),
                policies: parse_policies(raw_tokens),
            };
        }
        if has("user") {
            return Intent::CreateUser(parse_user_slots(normalized, raw_tokens));
        }
    }

    if normalized.contains("add") && has("group") && has("user") {
        return Intent::AddUserToGroup {
            username: value_after(raw_tokens, &["user"]),
            group: value_after(raw_tokens, &["group"]),
        };
    }

    if normalized.contains("attach") && has("policy") {
        return Intent::AttachPolicy {
            username: value_after(raw_tokens, &["user", "to"]),
            policy: value_after(raw_tokens, &["policy"]),
        };
    }

    if normalized.contains("detach") && has("policy") {
        return Intent::DetachPolicy {
            username: value_after(raw_tokens, &["user", "from"]),
            policy: value_after(raw_tokens, &["policy"]),
        };
    }

    if has("list") || has("show") {
        if has("instance") || has("instances") || has("ec2") || has("servers") {
            return Intent::ListInstances;
        }
        if has("bucket") || has("buckets") || has("s3") {
            return Intent::ListBuckets;
        }
        if has("vpc") || has("vpcs") || has("networks") {
            return Intent::ListVpcs;
        }
        if has("user") || has("users") || has("iam") {
            return Intent::ListUsers;
        }
    }

    if has("start") && (has("instance") || instance_id(raw_tokens).is_some()) {
        return Intent::StartInstance { instance_id: instance_id(raw_tokens) };
    }
    if has("stop") && (has("instance") || instance_id(raw_tokens).is_some()) {
        return Intent::StopInstance { instance_id: instance_id(raw_tokens) };
    }
    if (has("terminate") || has("delete")) && (has("instance") || instance_id(raw_tokens).is_some())
    {
        return Intent::TerminateInstance { instance_id: instance_id(raw_tokens) };
    }

    if (has("delete") || has("remove")) && has("bucket") {
        return Intent::DeleteBucket { name: value_after(raw_tokens, &["bucket"]) };
    }
    if (has("delete") || has("remove")) && has("user") {
        return Intent::DeleteUser { username: value_after(raw_tokens, &["user"]) };
    }

    Intent::Unknown
}

fn clarification_for(intent: &Intent) -> Option<String> {
    match intent {
        Intent::CreateInstance(slots) => {
            let mut missing = Vec::new();
            if slots.instance_type.is_none() {
                missing.push("an instance type (e.g. t3.micro)");
            }
            if slots.subnet_id.is_none() {
                missing.push("a subnet id (e.g. subnet-00000002)");
            }
            if missing.is_empty() {
                None
            } else {
                Some(format!("To create the instance I still need {}.", missing.join(" and ")))
            }
        }
        Intent::CreateBucket(slots) if slots.name.is_none() => {
            Some("Please give the bucket a name, e.g. `create bucket team-logs`.".to_string())
        }
        Intent::CreateUser(slots) if slots.username.is_none() => {
            Some("Please give the user a name, e.g. `create user alice`.".to_string())
        }
        Intent::CreateGroup { name: None, .. } => {
            Some("Please give the group a name, e.g. `create group admins`.".to_string())
        }
        Intent::AddUserToGroup { username: None, .. }
        | Intent::AddUserToGroup { group: None, .. } => {
            Some("Tell me both the user and the group, e.g. `add user alice to group admins`.".to_string())
        }
        Intent::AttachPolicy { policy: None, .. } | Intent::DetachPolicy { policy: None, .. } => {
            Some("Which policy? e.g. `attach policy ReadOnlyAccess to user alice`.".to_string())
        }
        Intent::AttachPolicy { username: None, .. }
        | Intent::DetachPolicy { username: None, .. } => {
            Some("Which user should the policy change apply to?".to_string())
        }
        Intent::DeleteBucket { name: None } => {
            Some("Which bucket should be deleted? e.g. `delete bucket team-logs`.".to_string())
        }
        Intent::DeleteUser { username: None } => {
            Some("Which user should be deleted? e.g. `delete user alice`.".to_string())
        }
        Intent::Unknown => Some(
            "I didn't catch that. I can create and manage VPCs, instances, buckets, and IAM users - try `help` for examples.".to_string(),
        ),
        _ => None,
    }
}

fn confidence_for(intent: &Intent, clarification: &Option<String>) -> u8 {
    let base: u8 = match intent {
        Intent::Unknown => 10,
        Intent::Help | Intent::KnowledgeQuery | Intent::InstanceRecommendation => 70,
        Intent::CreateVpc(slots) => {
            let mut score = 55u8;
            if slots.cidr.is_some() {
                score += 15;
            }
            if !slots.subnets.is_empty() {
                score += 20;
            }
            score
        }
        _ => 75,
    };
    if clarification.is_some() {
        base.saturating_sub(25).max(10)
    } else {
        base.min(100)
    }
}

fn parse_vpc_slots(normalized: &str, raw_tokens: &[String]) -> VpcSlots {
    VpcSlots {
        name: value_after(raw_tokens, &["named", "called"]),
        cidr: cidr_token(raw_tokens),
        subnets: parse_subnet_specs(raw_tokens),
        internet_gateway: normalized.contains("internet gateway") || normalized.contains("igw"),
        nat_gateway: normalized.contains("nat"),
    }
}

fn parse_instance_slots(raw_tokens: &[String]) -> InstanceSlots {
    let lowered: Vec<String> = raw_tokens.iter().map(|token| token.to_ascii_lowercase()).collect();
    let private = lowered.iter().any(|token| token == "private")
        || lowered.windows(3).any(|window| {
            matches!(window, [no, public, ip] if no == "no" && public == "public" && ip == "ip")
        });

    InstanceSlots {
        name: value_after(raw_tokens, &["named", "called"]),
        instance_type: raw_tokens.iter().find(|token| looks_like_instance_type(token)).cloned(),
        subnet_id: raw_tokens
            .iter()
            .find(|token| token.starts_with("subnet-") && token.len() > "subnet-".len())
            .cloned(),
        public_ip: !private,
    }
}

fn parse_bucket_slots(normalized: &str, raw_tokens: &[String]) -> BucketSlots {
    let name = value_after(raw_tokens, &["bucket", "named", "called"])
        .filter(|candidate| !candidate.eq_ignore_ascii_case("in"));
    BucketSlots {
        name,
        region: raw_tokens.iter().find(|token| looks_like_region(token)).cloned(),
        versioning: normalized.contains("versioning") || normalized.contains("versioned"),
    }
}

fn parse_user_slots(normalized: &str, raw_tokens: &[String]) -> UserSlots {
    UserSlots {
        username: value_after(raw_tokens, &["user", "named", "called"]),
        policies: parse_policies(raw_tokens),
        console_access: normalized.contains("console"),
        programmatic_access: normalized.contains("programmatic")
            || normalized.contains("access key"),
    }
}

/// Expand phrases like "2 public subnets for 50 hosts and 1 private subnet
/// for 200 hosts" into individual subnet requests. A tier keyword without a
/// resolvable host count is skipped; the caller decides whether to ask for
/// more detail.
fn parse_subnet_specs(raw_tokens: &[String]) -> Vec<SubnetRequest> {
    let lowered: Vec<String> = raw_tokens.iter().map(|token| token.to_ascii_lowercase()).collect();
    let mut specs = Vec::new();

    for (index, token) in lowered.iter().enumerate() {
        let tier = match token.as_str() {
            "public" => SubnetTier::Public,
            "private" => SubnetTier::Private,
            _ => continue,
        };

        let count = index
            .checked_sub(1)
            .and_then(|previous| lowered[previous].parse::<u32>().ok())
            .filter(|&count| (1..=32).contains(&count))
            .unwrap_or(1);

        let mut hosts = None;
        for next in index + 1..lowered.len() {
            let word = lowered[next].as_str();
            if word == "public" || word == "private" {
                break;
            }
            if (word == "hosts" || word == "host") && next > 0 {
                hosts = lowered[next - 1].parse::<u32>().ok();
                if hosts.is_some() {
                    break;
                }
            }
        }

        if let Some(hosts) = hosts {
            for _ in 0..count {
                specs.push(SubnetRequest { hosts, tier });
            }
        }
    }

    specs
}

fn parse_policies(raw_tokens: &[String]) -> Vec<String> {
    raw_tokens
        .iter()
        .filter(|token| {
            token.len() > 6
                && token.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                && (token.ends_with("Access") || token.ends_with("Policy"))
        })
        .cloned()
        .collect()
}

fn value_after(raw_tokens: &[String], keys: &[&str]) -> Option<String> {
    raw_tokens.windows(2).find_map(|window| {
        let [key, value] = window else {
            return None;
        };
        let key = key.to_ascii_lowercase();
        if keys.contains(&key.as_str()) && !is_filler(value) {
            Some(value.clone())
        } else {
            None
        }
    })
}

fn is_filler(token: &str) -> bool {
    matches!(
        token.to_ascii_lowercase().as_str(),
        "a" | "an" | "the" | "in" | "with" | "for" | "to" | "named" | "called" | "and" | "group"
            | "user"
    )
}

fn instance_id(raw_tokens: &[String]) -> Option<String> {
    raw_tokens
        .iter()
        .find(|token| token.starts_with("i-") && token.len() > 2)
        .cloned()
}

fn cidr_token(raw_tokens: &[String]) -> Option<String> {
    raw_tokens.iter().find(|token| Ipv4Net::from_str(token).is_ok()).cloned()
}

fn looks_like_instance_type(token: &str) -> bool {
    let Some((family, size)) = token.split_once('.') else {
        return false;
    };
    !family.is_empty()
        && family.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && family.chars().any(|c| c.is_ascii_digit())
        && !size.is_empty()
        && size.chars().all(|c| c.is_ascii_alphanumeric())
}

fn looks_like_region(token: &str) -> bool {
    let parts: Vec<&str> = token.split('-').collect();
    parts.len() == 3
        && parts[0].chars().all(|c| c.is_ascii_alphabetic())
        && parts[1].chars().all(|c| c.is_ascii_alphabetic())
        && parts[2].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use provy_core::domain::network::{SubnetRequest, SubnetTier};

    use super::{Intent, IntentExtractor};

    #[test]
    fn extracts_full_vpc_request() {
        let extractor = IntentExtractor::new();
        let extracted = extractor.extract(
            "create vpc named dev-net 10.0.0.0/16 with 2 public subnets for 50 hosts and 1 private subnet for 200 hosts and a nat gateway",
        );

        let Intent::CreateVpc(slots) = extracted.intent else {
            panic!("expected CreateVpc, got {:?}", extracted.intent);
        };
        assert_eq!(slots.name.as_deref(), Some("dev-net"));
        assert_eq!(slots.cidr.as_deref(), Some("10.0.0.0/16"));
        assert_eq!(
            slots.subnets,
            vec![
                SubnetRequest::public(50),
                SubnetRequest::public(50),
                SubnetRequest::private(200),
            ]
        );
        assert!(slots.nat_gateway);
        assert!(extracted.clarification.is_none());
        assert!(extracted.confidence >= 80);
    }

    #[test]
    fn vpc_without_cidr_still_classifies() {
        let extractor = IntentExtractor::new();
        let extracted = extractor.extract("spin up a vpc with 1 public subnet for 20 hosts");

        let Intent::CreateVpc(slots) = extracted.intent else {
            panic!("expected CreateVpc");
        };
        assert!(slots.cidr.is_none());
        assert_eq!(slots.subnets, vec![SubnetRequest { hosts: 20, tier: SubnetTier::Public }]);
    }

    #[test]
    fn instance_creation_requires_type_and_subnet() {
        let extractor = IntentExtractor::new();
        let extracted = extractor.extract("create instance named web-1");
        assert!(matches!(extracted.intent, Intent::CreateInstance(_)));
        let clarification = extracted.clarification.expect("missing slots prompt");
        assert!(clarification.contains("instance type"));
        assert!(clarification.contains("subnet id"));
    }

    #[test]
    fn complete_instance_request_has_no_clarification() {
        let extractor = IntentExtractor::new();
        let extracted =
            extractor.extract("launch instance named web-1 t3.micro in subnet-00000002");

        let Intent::CreateInstance(slots) = extracted.intent else {
            panic!("expected CreateInstance");
        };
        assert_eq!(slots.name.as_deref(), Some("web-1"));
        assert_eq!(slots.instance_type.as_deref(), Some("t3.micro"));
        assert_eq!(slots.subnet_id.as_deref(), Some("subnet-00000002"));
        assert!(slots.public_ip);
        assert!(extracted.clarification.is_none());
    }

    #[test]
    fn lifecycle_verbs_pick_up_instance_ids() {
        let extractor = IntentExtractor::new();
        assert_eq!(
            extractor.extract("stop instance i-00000007").intent,
            Intent::StopInstance { instance_id: Some("i-00000007".to_string()) }
        );
        assert_eq!(
            extractor.extract("terminate i-00000007").intent,
            Intent::TerminateInstance { instance_id: Some("i-00000007".to_string()) }
        );
        assert_eq!(
            extractor.extract("start instance").intent,
            Intent::StartInstance { instance_id: None }
        );
    }

    #[test]
    fn bucket_request_keeps_original_case_and_region() {
        let extractor = IntentExtractor::new();
        let extracted =
            extractor.extract("create bucket Team-Logs in eu-west-1 with versioning enabled");

        let Intent::CreateBucket(slots) = extracted.intent else {
            panic!("expected CreateBucket");
        };
        assert_eq!(slots.name.as_deref(), Some("Team-Logs"));
        assert_eq!(slots.region.as_deref(), Some("eu-west-1"));
        assert!(slots.versioning);
    }

    #[test]
    fn policy_names_survive_normalization() {
        let extractor = IntentExtractor::new();
        let extracted =
            extractor.extract("attach policy ReadOnlyAccess to user alice");
        assert_eq!(
            extracted.intent,
            Intent::AttachPolicy {
                username: Some("alice".to_string()),
                policy: Some("ReadOnlyAccess".to_string()),
            }
        );
    }

    #[test]
    fn knowledge_and_recommendation_routes() {
        let extractor = IntentExtractor::new();
        assert_eq!(extractor.extract("what is a nat gateway?").intent, Intent::KnowledgeQuery);
        assert_eq!(
            extractor.extract("recommend an instance for testing").intent,
            Intent::InstanceRecommendation
        );
    }

    #[test]
    fn unknown_text_asks_for_direction() {
        let extractor = IntentExtractor::new();
        let extracted = extractor.extract("sing me a song about clouds");
        assert_eq!(extracted.intent, Intent::Unknown);
        assert!(extracted.clarification.is_some());
        assert!(extracted.confidence <= 20);
    }

    #[test]
    fn handles_twenty_plus_common_phrases() {
        struct Case {
            text: &'static str,
            expected_key: &'static str,
        }

        let cases = vec![
            Case { text: "create vpc 10.5.0.0/16", expected_key: "create_vpc" },
            Case { text: "spin up a new vpc for the team", expected_key: "create_vpc" },
            Case { text: "build vpc with 1 private subnet for 10 hosts", expected_key: "create_vpc" },
            Case { text: "provision a network named staging", expected_key: "create_vpc" },
            Case { text: "list vpcs", expected_key: "list_vpcs" },
            Case { text: "show me the vpcs", expected_key: "list_vpcs" },
            Case { text: "launch ec2 named api t3.medium in subnet-0a", expected_key: "create_instance" },
            Case { text: "spin up ec2 for testing", expected_key: "create_instance" },
            Case { text: "create server named worker", expected_key: "create_instance" },
            Case { text: "new instance please", expected_key: "create_instance" },
            Case { text: "list instances", expected_key: "list_instances" },
            Case { text: "show ec2", expected_key: "list_instances" },
            Case { text: "start instance i-00000003", expected_key: "start_instance" },
            Case { text: "stop instance i-00000003", expected_key: "stop_instance" },
            Case { text: "terminate instance i-00000003", expected_key: "terminate_instance" },
            Case { text: "delete instance i-00000003", expected_key: "terminate_instance" },
            Case { text: "create bucket team-logs", expected_key: "create_bucket" },
            Case { text: "make bucket backups in us-east-1", expected_key: "create_bucket" },
            Case { text: "list buckets", expected_key: "list_buckets" },
            Case { text: "show s3", expected_key: "list_buckets" },
            Case { text: "delete bucket team-logs", expected_key: "delete_bucket" },
            Case { text: "create user alice with console access", expected_key: "create_user" },
            Case { text: "new user bob", expected_key: "create_user" },
            Case { text: "list users", expected_key: "list_users" },
            Case { text: "delete user bob", expected_key: "delete_user" },
            Case { text: "create group admins AdministratorAccess", expected_key: "create_group" },
            Case { text: "add user alice to group admins", expected_key: "add_user_to_group" },
            Case { text: "detach policy ReadOnlyAccess from user alice", expected_key: "detach_policy" },
            Case { text: "explain s3 to me", expected_key: "knowledge_query" },
            Case { text: "which instance should i use for production", expected_key: "instance_recommendation" },
            Case { text: "help", expected_key: "help" },
        ];

        let extractor = IntentExtractor::new();
        for (index, case) in cases.iter().enumerate() {
            let extracted = extractor.extract(case.text);
            assert_eq!(
                extracted.intent.key(),
                case.expected_key,
                "case {index}: {}",
                case.text
            );
            assert!(extracted.confidence > 0, "case {index} confidence: {}", case.text);
        }
    }
}
