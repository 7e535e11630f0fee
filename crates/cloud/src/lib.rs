//! Cloud provider surface.
//!
//! The assistant core never talks to a cloud API directly; it goes through
//! the [`CloudProvider`] trait. Two implementations ship here:
//!
//! - [`HttpCloud`] - reqwest client against a REST provisioning API
//! - [`MemoryCloud`] - in-memory provider for tests and dry-run chat
//!
//! [`NetworkProvisioner`] turns an allocation plan into the provider calls
//! that materialize it (VPC, subnets, route tables, gateways).

pub mod client;
pub mod error;
pub mod mock;
pub mod models;
pub mod provider;
pub mod provisioner;

pub use client::HttpCloud;
pub use error::CloudError;
pub use mock::MemoryCloud;
pub use provider::CloudProvider;
pub use provisioner::{NetworkProvisioner, ProvisionOptions, VpcProvisionSummary};
