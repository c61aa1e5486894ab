//! The queue -> pipe -> Fargate task topology.
//!
//! Built in one linear pass, each step using only what earlier steps produced:
//! queues, network lookup, cluster, task template, pipe role, pipe, outputs.

use crate::error::{DescriptorError, DescriptorResult};
use crate::model::{CapacityProviderAssociation, Descriptor, Resource, ResourceGraph};
use crate::network::{NetworkLookup, SubnetType};
use crate::spec::compute::{FARGATE, FARGATE_SPOT};
use crate::spec::pipe::{
    AwsVpcConfig, CapacityProviderItem, ContainerOverride, EcsTargetParams, SqsSourceParams,
    TaskOverrides, body_field,
};
use crate::spec::queue::CONSUME_ACTIONS;
use crate::spec::{
    ClusterSpec, ContainerSpec, Environment, Grant, LogGroupSpec, OutputSpec, QueueSpec, RoleSpec,
    RoutingRuleSpec, TaskTemplateSpec, Token,
};
use tracing::info;

pub const DEFAULT_STACK_NAME: &str = "sqs-fargate-eventbridge-pipe";

pub const QUEUE_NAME: &str = "sqs-event-queue";
pub const DEAD_LETTER_QUEUE_NAME: &str = "sqs-event-queue-dlq";
pub const CLUSTER_NAME: &str = "ecs-cluster";
pub const PIPE_NAME: &str = "sqs-fargate-task-pipe";
pub const PIPE_ROLE_NAME: &str = "sqs-fargate-pipe-role";

pub const MAX_RECEIVE_COUNT: u32 = 2;
pub const QUEUE_VISIBILITY_TIMEOUT_SECS: u32 = 300;
pub const BATCH_SIZE: u32 = 1;
pub const MAX_BATCHING_WINDOW_SECS: u32 = 120;
pub const PAYLOAD_FIELD: &str = "SQS_PAYLOAD";
pub const ENTRYPOINT: &str = "/bin/echo";

const PIPES_PRINCIPAL: &str = "pipes.amazonaws.com";
const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

const TASK_CPU: u32 = 256;
const TASK_MEMORY_MIB: u32 = 512;
const CONTAINER_IMAGE: &str = "alpine";
const LOG_STREAM_PREFIX: &str = "/app/";
const LOG_RETENTION_DAYS: u32 = 1;
const EPHEMERAL_STORAGE_GIB: u32 = 21;

#[derive(Debug, Clone)]
pub struct StackProps {
    pub stack_name: String,
    pub env: Environment,
}

impl StackProps {
    pub fn new(env: Environment) -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            env,
        }
    }
}

/// Task definition family derived from the stack name and construct id.
fn family_name(stack_name: &str, logical_id: &str) -> String {
    let prefix: String = stack_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    format!("{prefix}{logical_id}")
}

pub fn build_descriptor(
    props: &StackProps,
    lookup: &dyn NetworkLookup,
) -> DescriptorResult<Descriptor> {
    let env = &props.env;
    info!(stack = %props.stack_name, account = %env.account, region = %env.region, "building descriptor");

    // 1) Queue pair.
    let dead_letter = QueueSpec::new("deadLetterQueue", DEAD_LETTER_QUEUE_NAME);
    let queue = QueueSpec::new("sqsQueue", QUEUE_NAME)
        .with_visibility_timeout(QUEUE_VISIBILITY_TIMEOUT_SECS)
        .with_dead_letter(&dead_letter, MAX_RECEIVE_COUNT);
    dead_letter.validate()?;
    queue.validate()?;
    info!(queue = QUEUE_NAME, overflow = DEAD_LETTER_QUEUE_NAME, "declared queue pair");

    // 2) Network.
    let network = lookup.default_network(env)?;
    let public_subnets: Vec<String> = network
        .select_subnets(SubnetType::Public)
        .into_iter()
        .map(str::to_string)
        .collect();
    if public_subnets.is_empty() {
        return Err(DescriptorError::NoPublicSubnets {
            vpc_id: network.vpc_id,
        });
    }
    info!(
        vpc_id = %network.vpc_id,
        public_subnets = public_subnets.len(),
        zones = ?network.availability_zones(SubnetType::Public),
        "resolved network"
    );

    // 3) Cluster.
    let cluster = ClusterSpec {
        logical_id: "ecsCluster".to_string(),
        name: CLUSTER_NAME.to_string(),
        fargate_capacity_providers: true,
        vpc_id: network.vpc_id.clone(),
    };
    let capacity = cluster
        .capacity_providers_id()
        .map(|logical_id| CapacityProviderAssociation {
            logical_id,
            cluster: Token::reference(&cluster.logical_id),
            providers: vec![FARGATE.to_string(), FARGATE_SPOT.to_string()],
        });
    info!(
        cluster = CLUSTER_NAME,
        vpc_id = %cluster.vpc_id,
        fargate = cluster.fargate_capacity_providers,
        "declared cluster"
    );

    // 4) Task template: log group, task role, execution role.
    let log_group = LogGroupSpec {
        logical_id: "fargateTaskDefinitionDefaultContainerLogGroup".to_string(),
        retention_days: LOG_RETENTION_DAYS,
    };
    log_group.validate()?;

    let task_role = RoleSpec::new("fargateTaskDefinitionTaskRole", ECS_TASKS_PRINCIPAL);
    let mut execution_role =
        RoleSpec::new("fargateTaskDefinitionExecutionRole", ECS_TASKS_PRINCIPAL);
    execution_role.add_to_policy(Grant::allow(
        ["logs:CreateLogStream", "logs:PutLogEvents"],
        vec![log_group.arn()],
    ))?;

    let task = TaskTemplateSpec {
        logical_id: "fargateTaskDefinition".to_string(),
        family: family_name(&props.stack_name, "fargateTaskDefinition"),
        cpu: TASK_CPU,
        memory_mib: TASK_MEMORY_MIB,
        containers: vec![ContainerSpec {
            name: "defaultContainer".to_string(),
            image: CONTAINER_IMAGE.to_string(),
            command: Vec::new(),
            log_group: log_group.logical_id.clone(),
            stream_prefix: LOG_STREAM_PREFIX.to_string(),
        }],
        task_role: task_role.arn(),
        execution_role: execution_role.arn(),
    };
    task.validate()?;
    info!(family = %task.family, cpu = task.cpu, memory_mib = task.memory_mib, "declared task template");

    // 5) Pipe role.
    let mut pipe_role = RoleSpec::new("eventbridgeIAMRole", PIPES_PRINCIPAL)
        .named(PIPE_ROLE_NAME)
        .described("IAM Role for EventBridge Pipe");
    pipe_role.add_to_policy(Grant::allow(CONSUME_ACTIONS, vec![queue.arn()]))?;
    pipe_role.add_to_policy(
        Grant::allow(["ecs:RunTask"], vec![task.arn()]).when(
            "ArnLike",
            "ecs:cluster",
            cluster.arn(),
        ),
    )?;
    pipe_role.add_to_policy(
        Grant::allow(["iam:PassRole"], vec![Token::literal("*")]).when(
            "StringLike",
            "iam:PassedToService",
            Token::literal(ECS_TASKS_PRINCIPAL),
        ),
    )?;
    info!(role = PIPE_ROLE_NAME, grants = pipe_role.grants.len(), "declared pipe role");

    // 6) Pipe.
    let container_name = task
        .default_container()
        .map(|c| c.name.clone())
        .ok_or(DescriptorError::MissingContainerName)?;
    let pipe = RoutingRuleSpec {
        logical_id: "eventbridgePipe".to_string(),
        name: PIPE_NAME.to_string(),
        description: Some("Eventbridge Pipe to invoke Fargate Task".to_string()),
        role_arn: pipe_role.arn(),
        source: queue.arn(),
        target: cluster.arn(),
        source_params: SqsSourceParams {
            batch_size: BATCH_SIZE,
            max_batching_window_secs: MAX_BATCHING_WINDOW_SECS,
        },
        target_params: EcsTargetParams {
            task_definition_arn: task.arn(),
            task_count: 1,
            capacity_provider_strategy: vec![CapacityProviderItem {
                capacity_provider: FARGATE_SPOT.to_string(),
                base: Some(1),
                weight: None,
            }],
            network: AwsVpcConfig {
                subnets: public_subnets,
                assign_public_ip: true,
            },
            overrides: TaskOverrides {
                container_overrides: vec![ContainerOverride {
                    name: Some(container_name),
                    command: vec![ENTRYPOINT.to_string(), body_field(PAYLOAD_FIELD)],
                }],
                ephemeral_storage_gib: Some(EPHEMERAL_STORAGE_GIB),
            },
        },
        depends_on: vec![pipe_role.policy_id()],
    };
    pipe.validate()?;
    info!(pipe = PIPE_NAME, batch_size = BATCH_SIZE, window_secs = MAX_BATCHING_WINDOW_SECS, "declared pipe");

    // 7) Outputs.
    let outputs = vec![
        OutputSpec {
            logical_id: "sqsQueueOutput".to_string(),
            description: Some("SQS Queue Url".to_string()),
            value: queue.url(),
        },
        OutputSpec {
            logical_id: "eventbridgePipeOutput".to_string(),
            description: Some("EventBridge Pipe".to_string()),
            value: Token::literal(&pipe.name),
        },
    ];

    let mut graph = ResourceGraph::new();
    graph.add(Resource::Queue(dead_letter))?;
    graph.add(Resource::Queue(queue))?;
    graph.add(Resource::Cluster(cluster))?;
    if let Some(capacity) = capacity {
        graph.add(Resource::CapacityProviders(capacity))?;
    }
    graph.add(Resource::LogGroup(log_group))?;
    graph.add(Resource::Role(task_role))?;
    graph.add(Resource::Role(execution_role))?;
    graph.add(Resource::TaskTemplate(task))?;
    graph.add(Resource::Role(pipe_role))?;
    graph.add(Resource::RoutingRule(pipe))?;
    graph.validate(&outputs)?;

    let resources = graph.into_resources();
    info!(resources = resources.len(), outputs = outputs.len(), "descriptor complete");

    Ok(Descriptor {
        stack_name: props.stack_name.clone(),
        env: env.clone(),
        resources,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ContextLookup;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn env() -> Environment {
        Environment::new("111111111111", "us-east-1").unwrap()
    }

    fn lookup_with(groups: serde_json::Value) -> ContextLookup {
        let mut ctx = ContextLookup::default();
        ctx.insert_default_network(&env(), json!({ "vpcId": "vpc-0abc", "subnetGroups": groups }));
        ctx
    }

    fn default_lookup() -> ContextLookup {
        lookup_with(json!([
            { "name": "Public", "type": "Public", "subnets": [
                { "subnetId": "subnet-pub-a", "availabilityZone": "us-east-1a" },
                { "subnetId": "subnet-pub-b", "availabilityZone": "us-east-1b" } ] },
            { "name": "Private", "type": "Private", "subnets": [
                { "subnetId": "subnet-priv-a", "availabilityZone": "us-east-1a" } ] }
        ]))
    }

    fn build() -> Descriptor {
        build_descriptor(&StackProps::new(env()), &default_lookup()).unwrap()
    }

    #[test]
    fn primary_queue_redrives_to_overflow_after_two_receives() {
        let d = build();
        let queue = d.queue("sqsQueue").unwrap();
        let dlq = queue.dead_letter.as_ref().unwrap();
        assert_eq!(dlq.max_receive_count, 2);
        assert_eq!(d.queue(&dlq.queue).unwrap().name, DEAD_LETTER_QUEUE_NAME);
        assert_eq!(queue.visibility_timeout_secs, Some(300));
    }

    #[test]
    fn pipe_role_grants_are_exactly_consume_run_task_pass_role() {
        let d = build();
        let role = d.role("eventbridgeIAMRole").unwrap();
        assert_eq!(role.name.as_deref(), Some(PIPE_ROLE_NAME));
        assert_eq!(role.assumed_by, "pipes.amazonaws.com");
        assert_eq!(role.grants.len(), 3);

        let consume = &role.grants[0];
        assert_eq!(consume.actions, CONSUME_ACTIONS.map(String::from).to_vec());
        assert_eq!(consume.resources, vec![Token::attr("sqsQueue", "Arn")]);
        assert_eq!(consume.condition, None);

        let run = &role.grants[1];
        assert_eq!(run.actions, vec!["ecs:RunTask".to_string()]);
        assert_eq!(run.resources, vec![Token::reference("fargateTaskDefinition")]);
        let cond = run.condition.as_ref().unwrap();
        assert_eq!(
            (cond.operator.as_str(), cond.key.as_str(), &cond.value),
            ("ArnLike", "ecs:cluster", &Token::attr("ecsCluster", "Arn"))
        );

        let pass = &role.grants[2];
        assert_eq!(pass.actions, vec!["iam:PassRole".to_string()]);
        assert_eq!(pass.resources, vec![Token::literal("*")]);
        let cond = pass.condition.as_ref().unwrap();
        assert_eq!(
            (cond.operator.as_str(), cond.key.as_str(), &cond.value),
            ("StringLike", "iam:PassedToService", &Token::literal("ecs-tasks.amazonaws.com"))
        );
    }

    #[test]
    fn pipe_batches_one_message_per_two_minutes() {
        let d = build();
        let pipe = d.routing_rules().next().unwrap();
        assert_eq!(pipe.source_params.batch_size, 1);
        assert_eq!(pipe.source_params.max_batching_window_secs, 120);
        assert_eq!(pipe.source, Token::attr("sqsQueue", "Arn"));
        assert_eq!(pipe.target, Token::attr("ecsCluster", "Arn"));
    }

    #[test]
    fn pipe_runs_in_public_subnets_with_payload_argument() {
        let d = build();
        let tp = &d.routing_rules().next().unwrap().target_params;
        assert_eq!(tp.network.subnets, vec!["subnet-pub-a", "subnet-pub-b"]);
        assert!(tp.network.assign_public_ip);
        let o = &tp.overrides.container_overrides[0];
        assert_eq!(o.name.as_deref(), Some("defaultContainer"));
        assert_eq!(o.command, vec!["/bin/echo", "$.body.SQS_PAYLOAD"]);
        assert_eq!(tp.overrides.ephemeral_storage_gib, Some(21));
    }

    #[test]
    fn private_only_network_fails() {
        let lookup = lookup_with(json!([
            { "name": "Private", "type": "Private", "subnets": [
                { "subnetId": "subnet-priv-a", "availabilityZone": "us-east-1a" } ] },
            { "name": "Isolated", "type": "Isolated", "subnets": [
                { "subnetId": "subnet-iso-a", "availabilityZone": "us-east-1a" } ] }
        ]));
        let err = build_descriptor(&StackProps::new(env()), &lookup).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::NoPublicSubnets {
                vpc_id: "vpc-0abc".to_string()
            }
        );
    }

    #[test]
    fn unresolvable_network_fails() {
        let other = Environment::new("222222222222", "eu-west-1").unwrap();
        let err = build_descriptor(&StackProps::new(other), &default_lookup()).unwrap_err();
        assert!(matches!(err, DescriptorError::NetworkUnresolved(_)));
    }

    #[test]
    fn end_to_end_names_and_outputs() {
        let d = build();
        assert_eq!(d.stack_name, "sqs-fargate-eventbridge-pipe");
        assert_eq!(d.queue("sqsQueue").unwrap().name, "sqs-event-queue");
        assert_eq!(d.routing_rules().next().unwrap().name, "sqs-fargate-task-pipe");

        let out = d.output("sqsQueueOutput").unwrap();
        assert_eq!(out.value, Token::reference("sqsQueue"));
        assert_eq!(out.description.as_deref(), Some("SQS Queue Url"));
        assert_eq!(
            d.output("eventbridgePipeOutput").unwrap().value,
            Token::literal("sqs-fargate-task-pipe")
        );
    }

    #[test]
    fn resources_follow_construction_order() {
        let d = build();
        let ids: Vec<&str> = d.resources.iter().map(|r| r.logical_id()).collect();
        assert_eq!(
            ids,
            vec![
                "deadLetterQueue",
                "sqsQueue",
                "ecsCluster",
                "ecsClusterCapacityProviders",
                "fargateTaskDefinitionDefaultContainerLogGroup",
                "fargateTaskDefinitionTaskRole",
                "fargateTaskDefinitionExecutionRole",
                "fargateTaskDefinition",
                "eventbridgeIAMRole",
                "eventbridgePipe",
            ]
        );
    }

    #[test]
    fn family_strips_characters_outside_family_alphabet() {
        assert_eq!(family_name("my.stack-1", "task"), "mystack-1task");
    }
}
