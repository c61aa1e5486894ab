//! Spec layer: typed resource records + their local validation.
//!
//! Records only check what they can see on their own (name formats, size
//! tiers, grant patterns). Checks that span records, such as a token pointing
//! at a resource that was never declared, live in the model layer.

pub mod compute;
pub mod env;
pub mod iam;
pub mod pipe;
pub mod queue;
pub mod token;

pub use compute::{ClusterSpec, ContainerSpec, LogGroupSpec, TaskTemplateSpec};
pub use env::Environment;
pub use iam::{Grant, RoleSpec};
pub use pipe::RoutingRuleSpec;
pub use queue::QueueSpec;
pub use token::Token;

/// A value surfaced to operators once the descriptor is materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub logical_id: String,
    pub description: Option<String>,
    pub value: Token,
}
