use std::path::Path;

use serde::Serialize;

use provy_core::config::{AppConfig, LoadOptions, ProviderMode};
use provy_core::domain::network::{parse_parent_block, GatewayRequest, SubnetRequest};
use provy_core::knowledge::KnowledgeBase;
use provy_core::netplan;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_provider_readiness(&config));
            checks.push(check_default_parent_block(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "provider_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "default_parent_block",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    checks.push(check_knowledge_base());
    checks.push(check_allocator_selftest());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_provider_readiness(config: &AppConfig) -> DoctorCheck {
    match config.provider.mode {
        ProviderMode::Memory => DoctorCheck {
            name: "provider_readiness",
            status: CheckStatus::Pass,
            details: "in-memory provider; provisioning actions are simulated".to_string(),
        },
        ProviderMode::Http => {
            // Validation already guarantees base_url and api_token are set.
            let base_url = config.provider.base_url.as_deref().unwrap_or("<unset>");
            DoctorCheck {
                name: "provider_readiness",
                status: CheckStatus::Pass,
                details: format!("http provider configured against {base_url}"),
            }
        }
    }
}

fn check_default_parent_block(config: &AppConfig) -> DoctorCheck {
    match parse_parent_block(&config.network.default_parent_cidr) {
        Ok(parent) => DoctorCheck {
            name: "default_parent_block",
            status: CheckStatus::Pass,
            details: format!("default parent block {parent} parses"),
        },
        Err(error) => DoctorCheck {
            name: "default_parent_block",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_knowledge_base() -> DoctorCheck {
    match KnowledgeBase::load(Path::new("knowledge.toml")) {
        Ok(knowledge) if knowledge.is_empty() => DoctorCheck {
            name: "knowledge_base",
            status: CheckStatus::Fail,
            details: "knowledge base loaded but contains no entries".to_string(),
        },
        Ok(_) => DoctorCheck {
            name: "knowledge_base",
            status: CheckStatus::Pass,
            details: "knowledge base available".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "knowledge_base",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

/// End-to-end allocator smoke: the canonical 62/14-host request pair must
/// pack into a /26 and a /28.
fn check_allocator_selftest() -> DoctorCheck {
    let parent = match parse_parent_block("10.0.0.0/16") {
        Ok(parent) => parent,
        Err(error) => {
            return DoctorCheck {
                name: "allocator_selftest",
                status: CheckStatus::Fail,
                details: error.to_string(),
            }
        }
    };
    let requests = [SubnetRequest::public(62), SubnetRequest::private(14)];
    let gateways = GatewayRequest { internet_gateway: false, nat_gateway: true };

    match netplan::plan(parent, &requests, gateways) {
        Ok(plan) => {
            let cidrs: Vec<String> =
                plan.subnets.iter().map(|subnet| subnet.network.to_string()).collect();
            if cidrs == ["10.0.0.0/26", "10.0.0.64/28"] && plan.nat_gateway {
                DoctorCheck {
                    name: "allocator_selftest",
                    status: CheckStatus::Pass,
                    details: "packed 62/14 hosts into 10.0.0.0/26 and 10.0.0.64/28".to_string(),
                }
            } else {
                DoctorCheck {
                    name: "allocator_selftest",
                    status: CheckStatus::Fail,
                    details: format!("unexpected allocation: {cidrs:?}"),
                }
            }
        }
        Err(error) => DoctorCheck {
            name: "allocator_selftest",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("[{marker}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{build_report, run, CheckStatus};

    #[test]
    fn default_environment_passes_all_checks() {
        let report = build_report();
        assert_eq!(report.overall_status, CheckStatus::Pass, "{report:?}");
        assert!(report.checks.iter().any(|check| check.name == "allocator_selftest"));
    }

    #[test]
    fn json_output_is_parseable() {
        let output = run(true);
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
        assert_eq!(parsed["overall_status"], "pass");
    }

    #[test]
    fn human_output_lists_every_check() {
        let output = run(false);
        for name in [
            "config_validation",
            "provider_readiness",
            "default_parent_block",
            "knowledge_base",
            "allocator_selftest",
        ] {
            assert!(output.contains(name), "missing check {name} in {output}");
        }
    }
}
