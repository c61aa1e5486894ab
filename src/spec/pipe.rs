//! Routing rule: queue source, batching, and the ECS task it launches.

use crate::error::{DescriptorError, DescriptorResult};
use crate::spec::Token;
use tracing::warn;

const MAX_BATCH_SIZE: u32 = 10_000;
const MAX_BATCHING_WINDOW_SECS: u32 = 300;
const EPHEMERAL_STORAGE_GIB: std::ops::RangeInclusive<u32> = 21..=200;
const MAX_TASK_COUNT: u32 = 10;

/// Path expression that extracts `field` from the body of a queue message.
pub fn body_field(field: &str) -> String {
    format!("$.body.{field}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqsSourceParams {
    pub batch_size: u32,
    pub max_batching_window_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityProviderItem {
    pub capacity_provider: String,
    pub base: Option<u32>,
    pub weight: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsVpcConfig {
    pub subnets: Vec<String>,
    pub assign_public_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOverride {
    /// Must name a container of the task template.
    pub name: Option<String>,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOverrides {
    pub container_overrides: Vec<ContainerOverride>,
    /// Platform-required; carries no behavior beyond the allowed range.
    pub ephemeral_storage_gib: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcsTargetParams {
    pub task_definition_arn: Token,
    pub task_count: u32,
    pub capacity_provider_strategy: Vec<CapacityProviderItem>,
    pub network: AwsVpcConfig,
    pub overrides: TaskOverrides,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRuleSpec {
    pub logical_id: String,
    pub name: String,
    pub description: Option<String>,
    pub role_arn: Token,
    pub source: Token,
    pub target: Token,
    pub source_params: SqsSourceParams,
    pub target_params: EcsTargetParams,
    /// Resources that must exist before the pipe is created.
    pub depends_on: Vec<String>,
}

impl RoutingRuleSpec {
    pub fn validate(&self) -> DescriptorResult<()> {
        let invalid = |msg: String| Err(DescriptorError::InvalidRoutingRule(msg));

        if self.name.is_empty() || self.name.len() > 64 {
            return invalid(format!("pipe name {:?} must be 1-64 characters", self.name));
        }

        let src = &self.source_params;
        if src.batch_size == 0 || src.batch_size > MAX_BATCH_SIZE {
            return invalid(format!(
                "batch size {} outside 1..={MAX_BATCH_SIZE}",
                src.batch_size
            ));
        }
        if src.max_batching_window_secs > MAX_BATCHING_WINDOW_SECS {
            return invalid(format!(
                "batching window {}s exceeds {MAX_BATCHING_WINDOW_SECS}s",
                src.max_batching_window_secs
            ));
        }
        if src.batch_size > 10 && src.max_batching_window_secs == 0 {
            return invalid(format!(
                "batch size {} requires a batching window of at least 1s",
                src.batch_size
            ));
        }
        if src.max_batching_window_secs == 0 {
            warn!(pipe = %self.name, "batching window is 0s; every message starts a task immediately");
        }

        let tgt = &self.target_params;
        if tgt.task_count == 0 || tgt.task_count > MAX_TASK_COUNT {
            return invalid(format!(
                "task count {} outside 1..={MAX_TASK_COUNT}",
                tgt.task_count
            ));
        }
        if tgt.network.subnets.is_empty() {
            return invalid("network configuration lists no subnets".to_string());
        }
        for item in &tgt.capacity_provider_strategy {
            if item.capacity_provider.is_empty() {
                return invalid("capacity provider strategy item has no provider".to_string());
            }
        }

        for o in &tgt.overrides.container_overrides {
            match o.name.as_deref() {
                Some(n) if !n.trim().is_empty() => {}
                _ => return Err(DescriptorError::MissingContainerName),
            }
        }
        if let Some(gib) = tgt.overrides.ephemeral_storage_gib {
            if !EPHEMERAL_STORAGE_GIB.contains(&gib) {
                return invalid(format!(
                    "ephemeral storage {gib} GiB outside {}..={} GiB",
                    EPHEMERAL_STORAGE_GIB.start(),
                    EPHEMERAL_STORAGE_GIB.end()
                ));
            }
        }

        Ok(())
    }
}
