//! Validation failures raised while building a descriptor.
//!
//! Every variant aborts the whole construction; there is no partial result.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("invalid environment: {0}")]
    Environment(String),

    #[error("cannot resolve network: {0}")]
    NetworkUnresolved(String),

    #[error("network {vpc_id} has no public subnets to place the task in")]
    NoPublicSubnets { vpc_id: String },

    #[error("malformed permission grant: {0}")]
    MalformedGrant(String),

    #[error("container override is missing a container name")]
    MissingContainerName,

    #[error("invalid task size: {0}")]
    InvalidTaskSize(String),

    #[error("invalid log destination: {0}")]
    InvalidLogging(String),

    #[error("invalid queue: {0}")]
    InvalidQueue(String),

    #[error("invalid routing rule: {0}")]
    InvalidRoutingRule(String),

    #[error("invalid logical id {0:?}: must be 1-255 alphanumeric characters")]
    InvalidLogicalId(String),

    #[error("duplicate logical id {0}")]
    DuplicateLogicalId(String),

    #[error("{from} references {target}, which is not declared or does not expose that attribute")]
    DanglingReference { from: String, target: String },

    #[error("reference cycle: {0}")]
    ReferenceCycle(String),
}

pub type DescriptorResult<T> = std::result::Result<T, DescriptorError>;
