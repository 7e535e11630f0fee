//! Keyword knowledge base: service descriptions, instance recommendation
//! hints, and FAQ entries. Ships with built-in content and can be replaced
//! wholesale by a TOML document.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not read knowledge base `{path}`: {source}")]
    ReadFile { path: String, source: std::io::Error },
    #[error("could not parse knowledge base: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct KnowledgeBase {
    #[serde(default)]
    services: BTreeMap<String, String>,
    #[serde(default)]
    recommendations: BTreeMap<String, String>,
    #[serde(default)]
    faq: Vec<FaqEntry>,
}

impl KnowledgeBase {
    pub fn builtin() -> Self {
        let mut services = BTreeMap::new();
        services.insert(
            "ec2".to_string(),
            "EC2 provides resizable virtual servers (instances) in the cloud.".to_string(),
        );
        services.insert(
            "s3".to_string(),
            "S3 is durable object storage organized into buckets.".to_string(),
        );
        services.insert(
            "vpc".to_string(),
            "A VPC is an isolated virtual network you carve into subnets.".to_string(),
        );
        services.insert(
            "iam".to_string(),
            "IAM manages users, groups, roles, and the policies attached to them.".to_string(),
        );
        services.insert(
            "subnet".to_string(),
            "A subnet is a CIDR slice of a VPC; public subnets route through an internet gateway."
                .to_string(),
        );
        services.insert(
            "nat gateway".to_string(),
            "A NAT gateway lets private-subnet resources reach the internet without being reachable from it. It must sit in a public subnet.".to_string(),
        );
        services.insert(
            "internet gateway".to_string(),
            "An internet gateway gives public subnets a route to the public internet.".to_string(),
        );

        let mut recommendations = BTreeMap::new();
        recommendations.insert(
            "test".to_string(),
            "For test or demo environments, t3.micro is low-cost and free tier eligible."
                .to_string(),
        );
        recommendations.insert(
            "demo".to_string(),
            "For test or demo environments, t3.micro is low-cost and free tier eligible."
                .to_string(),
        );
        recommendations.insert(
            "production".to_string(),
            "For production workloads, consider m5.large or c6a.large depending on CPU and memory needs.".to_string(),
        );

        let faq = vec![
            FaqEntry {
                question: "why did my nat gateway not get created".to_string(),
                answer: "A NAT gateway needs at least one public subnet to live in. Add a public subnet to the request and NAT can be provisioned.".to_string(),
            },
            FaqEntry {
                question: "how many hosts fit in a subnet".to_string(),
                answer: "A /n block holds 2^(32-n) addresses, two of which are reserved for the network and broadcast identifiers.".to_string(),
            },
        ];

        Self { services, recommendations, faq }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, KnowledgeError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file; a missing file falls back to the built-in
    /// content rather than failing.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        if !path.exists() {
            return Ok(Self::builtin());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| KnowledgeError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.recommendations.is_empty() && self.faq.is_empty()
    }

    /// Lookup order: service keywords, recommendation keywords, exact FAQ
    /// question, then partial FAQ word overlap.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        let text = text.to_ascii_lowercase();

        for (keyword, description) in &self.services {
            if text.contains(keyword.as_str()) {
                return Some(description);
            }
        }

        for (keyword, suggestion) in &self.recommendations {
            if text.contains(keyword.as_str()) {
                return Some(suggestion);
            }
        }

        if let Some(entry) = self.faq.iter().find(|entry| entry.question.to_ascii_lowercase() == text)
        {
            return Some(&entry.answer);
        }

        self.faq
            .iter()
            .find(|entry| {
                entry
                    .question
                    .to_ascii_lowercase()
                    .split_whitespace()
                    .filter(|word| word.len() > 3)
                    .any(|word| text.contains(word))
            })
            .map(|entry| entry.answer.as_str())
    }

    pub fn recommend_instance(&self, text: &str) -> Option<&str> {
        let text = text.to_ascii_lowercase();
        self.recommendations
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, suggestion)| suggestion.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::KnowledgeBase;

    #[test]
    fn builtin_answers_service_questions() {
        let knowledge = KnowledgeBase::builtin();
        let answer = knowledge.lookup("what is a nat gateway?").expect("known service");
        assert!(answer.contains("public subnet"));
    }

    #[test]
    fn service_keywords_win_over_faq() {
        let knowledge = KnowledgeBase::builtin();
        let answer = knowledge.lookup("explain s3 to me").expect("known service");
        assert!(answer.contains("object storage"));
    }

    #[test]
    fn partial_faq_match_covers_reworded_questions() {
        let knowledge = KnowledgeBase::builtin();
        let answer = knowledge.lookup("how many hosts in a /26").expect("faq entry");
        assert!(answer.contains("reserved"));
    }

    #[test]
    fn unknown_topics_return_nothing() {
        let knowledge = KnowledgeBase::builtin();
        assert!(knowledge.lookup("quantum teleportation pricing").is_none());
    }

    #[test]
    fn toml_document_replaces_builtin_content() {
        let raw = r#"
[services]
lambda = "Lambda runs functions without servers."

[recommendations]
batch = "Use c6a.large for batch crunching."

[[faq]]
question = "what is provy"
answer = "A provisioning assistant."
"#;
        let knowledge = KnowledgeBase::from_toml_str(raw).expect("valid TOML");
        assert_eq!(
            knowledge.lookup("what is lambda"),
            Some("Lambda runs functions without servers.")
        );
        assert_eq!(
            knowledge.recommend_instance("nightly batch job"),
            Some("Use c6a.large for batch crunching.")
        );
    }

    #[test]
    fn recommendation_keyed_by_environment_keyword() {
        let knowledge = KnowledgeBase::builtin();
        let suggestion =
            knowledge.recommend_instance("need a box for a quick demo").expect("demo keyword");
        assert!(suggestion.contains("t3.micro"));
    }
}
