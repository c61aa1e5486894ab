//! Descriptor model: the validated resource graph handed to the renderer.

pub mod graph;
pub mod stack;

pub use graph::ResourceGraph;
pub use stack::{StackProps, build_descriptor};

use crate::spec::{
    ClusterSpec, Environment, LogGroupSpec, OutputSpec, QueueSpec, RoleSpec, RoutingRuleSpec,
    TaskTemplateSpec, Token,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityProviderAssociation {
    pub logical_id: String,
    pub cluster: Token,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Queue(QueueSpec),
    LogGroup(LogGroupSpec),
    Cluster(ClusterSpec),
    CapacityProviders(CapacityProviderAssociation),
    TaskTemplate(TaskTemplateSpec),
    Role(RoleSpec),
    RoutingRule(RoutingRuleSpec),
}

impl Resource {
    pub fn logical_id(&self) -> &str {
        match self {
            Self::Queue(q) => &q.logical_id,
            Self::LogGroup(l) => &l.logical_id,
            Self::Cluster(c) => &c.logical_id,
            Self::CapacityProviders(c) => &c.logical_id,
            Self::TaskTemplate(t) => &t.logical_id,
            Self::Role(r) => &r.logical_id,
            Self::RoutingRule(p) => &p.logical_id,
        }
    }

    /// Every logical id this resource occupies. A role with grants also owns
    /// its inline policy.
    pub fn declared_ids(&self) -> Vec<String> {
        let mut ids = vec![self.logical_id().to_string()];
        if let Self::Role(r) = self {
            if !r.grants.is_empty() {
                ids.push(r.policy_id());
            }
        }
        ids
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Queue(_) => "AWS::SQS::Queue",
            Self::LogGroup(_) => "AWS::Logs::LogGroup",
            Self::Cluster(_) => "AWS::ECS::Cluster",
            Self::CapacityProviders(_) => "AWS::ECS::ClusterCapacityProviderAssociations",
            Self::TaskTemplate(_) => "AWS::ECS::TaskDefinition",
            Self::Role(_) => "AWS::IAM::Role",
            Self::RoutingRule(_) => "AWS::Pipes::Pipe",
        }
    }

    /// Attributes other resources may read with GetAtt.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Queue(_) => &["Arn", "QueueName", "QueueUrl"],
            Self::LogGroup(_) => &["Arn"],
            Self::Cluster(_) => &["Arn"],
            Self::CapacityProviders(_) => &[],
            Self::TaskTemplate(_) => &["TaskDefinitionArn"],
            Self::Role(_) => &["Arn", "RoleId"],
            Self::RoutingRule(_) => &["Arn", "CurrentState"],
        }
    }

    /// Tokens this resource reads from other resources.
    pub fn references(&self) -> Vec<Token> {
        match self {
            Self::Queue(q) => q
                .dead_letter
                .iter()
                .map(|d| Token::attr(&d.queue, "Arn"))
                .collect(),
            Self::LogGroup(_) | Self::Cluster(_) => Vec::new(),
            Self::CapacityProviders(c) => vec![c.cluster.clone()],
            Self::TaskTemplate(t) => {
                let mut refs = vec![t.task_role.clone(), t.execution_role.clone()];
                refs.extend(t.containers.iter().map(|c| Token::reference(&c.log_group)));
                refs
            }
            Self::Role(r) => r
                .grants
                .iter()
                .flat_map(|g| {
                    g.resources
                        .iter()
                        .cloned()
                        .chain(g.condition.iter().map(|c| c.value.clone()))
                })
                .collect(),
            Self::RoutingRule(p) => {
                let mut refs = vec![
                    p.role_arn.clone(),
                    p.source.clone(),
                    p.target.clone(),
                    p.target_params.task_definition_arn.clone(),
                ];
                refs.extend(p.depends_on.iter().map(Token::reference));
                refs
            }
        }
    }
}

/// A fully validated deployment descriptor.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub stack_name: String,
    pub env: Environment,
    /// Construction order.
    pub resources: Vec<Resource>,
    pub outputs: Vec<OutputSpec>,
}

impl Descriptor {
    pub fn routing_rules(&self) -> impl Iterator<Item = &RoutingRuleSpec> {
        self.resources.iter().filter_map(|r| match r {
            Resource::RoutingRule(p) => Some(p),
            _ => None,
        })
    }
}

#[cfg(test)]
impl Descriptor {
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id() == logical_id)
    }

    pub fn queue(&self, logical_id: &str) -> Option<&QueueSpec> {
        match self.resource(logical_id)? {
            Resource::Queue(q) => Some(q),
            _ => None,
        }
    }

    pub fn role(&self, logical_id: &str) -> Option<&RoleSpec> {
        match self.resource(logical_id)? {
            Resource::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn output(&self, logical_id: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.logical_id == logical_id)
    }
}
