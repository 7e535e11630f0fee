pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;
pub mod netplan;

pub use catalog::{monthly_network_cost, network_cost_line, InstanceCatalog, InstanceOffering};
pub use domain::compute::{BootstrapScript, InstanceLaunchSpec, InstanceState};
pub use domain::identity::{GroupSpec, IamEntityKind, PolicyAttachment, UserSpec};
pub use domain::network::{
    parse_parent_block, AllocatedSubnet, GatewayRequest, NetworkPlan, NetworkSpecError,
    RouteTableMode, SubnetRequest, SubnetTier,
};
pub use domain::storage::{BucketEncryption, BucketSpec};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use knowledge::{FaqEntry, KnowledgeBase, KnowledgeError};
pub use netplan::{plan, suggest_parent_block, AllocationError, GatewayDecision};
