//! Agent runtime - deterministic intent extraction and orchestration.
//!
//! This crate is the conversational brain of provy:
//! - **Intent extraction** (`intent`) - parse natural language into a typed
//!   `Intent` with slots, via synonym normalization and keyword rules
//! - **Session memory** (`session`) - per-user context with a TTL, so
//!   follow-ups can resolve "the instance" to a concrete id
//! - **Tools** (`tools`) - one JSON-in/JSON-out tool per provisioning
//!   operation, dispatched through a registry
//! - **Runtime** (`runtime`) - extract, consult session, dispatch, render
//! - **Replies** (`replies`) - markdown summaries for the chat surface
//!
//! There is no model in the loop: extraction is pure string processing,
//! and every provisioning decision (subnet packing, gateway policy,
//! validation) is made by the deterministic core.

pub mod intent;
pub mod replies;
pub mod runtime;
pub mod session;
pub mod tools;

pub use intent::{ExtractedIntent, Intent, IntentExtractor};
pub use runtime::AgentRuntime;
pub use session::{Session, SessionStore, SessionUpdate};
pub use tools::{register_default_tools, Tool, ToolRegistry};
