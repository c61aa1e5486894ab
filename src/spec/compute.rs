//! Cluster, task template and container log destination.

use crate::error::{DescriptorError, DescriptorResult};
use crate::spec::Token;

pub const FARGATE: &str = "FARGATE";
pub const FARGATE_SPOT: &str = "FARGATE_SPOT";

/// Retention periods CloudWatch Logs accepts, in days.
const RETENTION_DAYS: [u32; 22] = [
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// (CPU units, min MiB, max MiB, step MiB) for each Fargate CPU size.
/// 256 CPU is the odd one: 512, 1024, 2048 only.
const FARGATE_TIERS: [(u32, u32, u32, u32); 6] = [
    (512, 1024, 4096, 1024),
    (1024, 2048, 8192, 1024),
    (2048, 4096, 16384, 1024),
    (4096, 8192, 30720, 1024),
    (8192, 16384, 61440, 4096),
    (16384, 32768, 122880, 8192),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub logical_id: String,
    pub name: String,
    pub fargate_capacity_providers: bool,
    /// Network the cluster runs tasks in. Resolved before the cluster exists.
    pub vpc_id: String,
}

impl ClusterSpec {
    pub fn arn(&self) -> Token {
        Token::attr(&self.logical_id, "Arn")
    }

    /// Logical id of the capacity-provider association, when Fargate is enabled.
    pub fn capacity_providers_id(&self) -> Option<String> {
        self.fargate_capacity_providers
            .then(|| format!("{}CapacityProviders", self.logical_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroupSpec {
    pub logical_id: String,
    pub retention_days: u32,
}

impl LogGroupSpec {
    pub fn validate(&self) -> DescriptorResult<()> {
        if !RETENTION_DAYS.contains(&self.retention_days) {
            return Err(DescriptorError::InvalidLogging(format!(
                "log retention of {} days is not a supported retention period",
                self.retention_days
            )));
        }
        Ok(())
    }

    pub fn arn(&self) -> Token {
        Token::attr(&self.logical_id, "Arn")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    /// Logical id of the log group the awslogs driver writes to.
    pub log_group: String,
    pub stream_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplateSpec {
    pub logical_id: String,
    pub family: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub containers: Vec<ContainerSpec>,
    pub task_role: Token,
    pub execution_role: Token,
}

impl TaskTemplateSpec {
    pub fn validate(&self) -> DescriptorResult<()> {
        validate_fargate_size(self.cpu, self.memory_mib)?;
        if self.containers.is_empty() {
            return Err(DescriptorError::InvalidTaskSize(format!(
                "task template {} declares no containers",
                self.logical_id
            )));
        }
        for c in &self.containers {
            if c.name.trim().is_empty() {
                return Err(DescriptorError::MissingContainerName);
            }
            if c.image.trim().is_empty() {
                return Err(DescriptorError::InvalidTaskSize(format!(
                    "container {} has no image",
                    c.name
                )));
            }
        }
        Ok(())
    }

    /// The first container added is the default one.
    pub fn default_container(&self) -> Option<&ContainerSpec> {
        self.containers.first()
    }

    pub fn arn(&self) -> Token {
        Token::reference(&self.logical_id)
    }
}

/// Check a CPU/memory pair against the combinations Fargate accepts.
pub fn validate_fargate_size(cpu: u32, memory_mib: u32) -> DescriptorResult<()> {
    let ok = if cpu == 256 {
        matches!(memory_mib, 512 | 1024 | 2048)
    } else {
        match FARGATE_TIERS.iter().find(|(c, ..)| *c == cpu) {
            Some(&(_, min, max, step)) => {
                memory_mib >= min && memory_mib <= max && (memory_mib - min) % step == 0
            }
            None => {
                return Err(DescriptorError::InvalidTaskSize(format!(
                    "{cpu} is not a Fargate CPU size"
                )));
            }
        }
    };

    if !ok {
        return Err(DescriptorError::InvalidTaskSize(format!(
            "{memory_mib} MiB is not a valid memory size for {cpu} CPU units"
        )));
    }
    Ok(())
}
