//! Instance offerings and static cost estimates.

use rust_decimal::Decimal;

const HOURS_PER_MONTH: u32 = 730;

/// Flat monthly NAT gateway estimate; the internet gateway itself is free.
fn nat_monthly_usd() -> Decimal {
    Decimal::new(32_40, 2)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceOffering {
    pub name: &'static str,
    pub hourly_usd: Decimal,
    pub summary: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceCatalog {
    offerings: Vec<InstanceOffering>,
}

impl Default for InstanceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl InstanceCatalog {
    pub fn builtin() -> Self {
        Self {
            offerings: vec![
                InstanceOffering {
                    name: "t3.micro",
                    hourly_usd: Decimal::new(104, 4),
                    summary: "low-cost, free tier eligible, suited to test and demo workloads",
                },
                InstanceOffering {
                    name: "t3.medium",
                    hourly_usd: Decimal::new(416, 4),
                    summary: "burstable general purpose, suited to development services",
                },
                InstanceOffering {
                    name: "m5.large",
                    hourly_usd: Decimal::new(96, 3),
                    summary: "general purpose production workloads",
                },
                InstanceOffering {
                    name: "c6a.large",
                    hourly_usd: Decimal::new(765, 4),
                    summary: "compute optimized production workloads",
                },
            ],
        }
    }

    pub fn offerings(&self) -> &[InstanceOffering] {
        &self.offerings
    }

    pub fn hourly_rate(&self, instance_type: &str) -> Option<Decimal> {
        self.offerings
            .iter()
            .find(|offering| offering.name == instance_type)
            .map(|offering| offering.hourly_usd)
    }

    pub fn monthly_rate(&self, instance_type: &str) -> Option<Decimal> {
        self.hourly_rate(instance_type).map(|hourly| hourly * Decimal::from(HOURS_PER_MONTH))
    }

    /// Human-readable cost line for a known instance type, or a note that
    /// no estimate is available.
    pub fn estimate_line(&self, instance_type: &str) -> String {
        match self.hourly_rate(instance_type) {
            Some(hourly) => {
                let monthly = hourly * Decimal::from(HOURS_PER_MONTH);
                format!("${hourly:.4}/hr (~${monthly:.2}/mo)")
            }
            None => format!("no cost estimate available for {instance_type}"),
        }
    }

    /// Keyword-driven recommendation matching the assistant's phrasing:
    /// test-like words pick the smallest offering, production-like words
    /// the general purpose ones, anything else a short overview.
    pub fn recommend(&self, text: &str) -> String {
        let text = text.to_ascii_lowercase();
        if ["test", "dev", "practice", "demo"].iter().any(|word| text.contains(word)) {
            return "For test or demo environments, t3.micro is recommended (low-cost, free tier eligible).".to_string();
        }
        if ["production", "heavy", "enterprise"].iter().any(|word| text.contains(word)) {
            return "For production workloads, consider m5.large or c6a.large depending on CPU and memory needs.".to_string();
        }
        "Common instance types: t3.micro (test), t3.medium (dev), m5.large (prod).".to_string()
    }
}

/// Static monthly network cost: the internet gateway is free, NAT is a
/// flat estimate.
pub fn monthly_network_cost(nat_enabled: bool) -> Decimal {
    if nat_enabled {
        nat_monthly_usd()
    } else {
        Decimal::ZERO
    }
}

pub fn network_cost_line(nat_enabled: bool) -> String {
    format!("Estimated monthly cost: ${:.2} (IGW + NAT)", monthly_network_cost(nat_enabled))
}
