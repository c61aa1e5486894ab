use crate::model::{CapacityProviderAssociation, Descriptor, Resource};
use crate::spec::iam::Grant;
use crate::spec::pipe::RoutingRuleSpec;
use crate::spec::{
    ClusterSpec, Environment, LogGroupSpec, QueueSpec, RoleSpec, TaskTemplateSpec, Token,
};
use serde_json::{Map, Value, json};

const POLICY_VERSION: &str = "2012-10-17";
const FORMAT_VERSION: &str = "2010-09-09";

/// Build the template document for a descriptor.
///
/// Resources appear in construction order; a role with grants is followed by
/// its inline policy.
pub fn template_value(descriptor: &Descriptor) -> Value {
    let mut resources = Map::new();
    for r in &descriptor.resources {
        resources.insert(r.logical_id().to_string(), resource_value(r, &descriptor.env));
        if let Resource::Role(role) = r {
            if !role.grants.is_empty() {
                resources.insert(role.policy_id(), policy_value(role));
            }
        }
    }

    let mut outputs = Map::new();
    for o in &descriptor.outputs {
        let mut out = Map::new();
        if let Some(d) = &o.description {
            out.insert("Description".into(), json!(d));
        }
        out.insert("Value".into(), o.value.to_json());
        outputs.insert(o.logical_id.clone(), Value::Object(out));
    }

    json!({
        "AWSTemplateFormatVersion": FORMAT_VERSION,
        "Description": format!("{} ({}/{})", descriptor.stack_name, descriptor.env.account, descriptor.env.region),
        "Resources": resources,
        "Outputs": outputs,
    })
}

/// Render the template as pretty-printed JSON.
pub fn render_template(descriptor: &Descriptor) -> anyhow::Result<String> {
    let mut text = serde_json::to_string_pretty(&template_value(descriptor))?;
    text.push('\n');
    Ok(text)
}

fn resource_value(resource: &Resource, env: &Environment) -> Value {
    let mut v = json!({
        "Type": resource.resource_type(),
        "Properties": match resource {
            Resource::Queue(q) => queue_properties(q),
            Resource::LogGroup(l) => log_group_properties(l),
            Resource::Cluster(c) => cluster_properties(c),
            Resource::CapacityProviders(c) => capacity_properties(c),
            Resource::TaskTemplate(t) => task_properties(t, env),
            Resource::Role(r) => role_properties(r),
            Resource::RoutingRule(p) => pipe_properties(p),
        },
    });

    let retention = match resource {
        Resource::Queue(_) => Some("Delete"),
        Resource::LogGroup(_) => Some("Retain"),
        _ => None,
    };
    if let Some(policy) = retention {
        v["UpdateReplacePolicy"] = json!(policy);
        v["DeletionPolicy"] = json!(policy);
    }

    if let Resource::RoutingRule(p) = resource {
        if !p.depends_on.is_empty() {
            v["DependsOn"] = json!(p.depends_on);
        }
    }
    v
}

fn queue_properties(q: &QueueSpec) -> Value {
    let mut props = json!({ "QueueName": q.name });
    if let Some(dlq) = &q.dead_letter {
        props["RedrivePolicy"] = json!({
            "deadLetterTargetArn": Token::attr(&dlq.queue, "Arn"),
            "maxReceiveCount": dlq.max_receive_count,
        });
    }
    if let Some(secs) = q.visibility_timeout_secs {
        props["VisibilityTimeout"] = json!(secs);
    }
    props
}

fn log_group_properties(l: &LogGroupSpec) -> Value {
    json!({ "RetentionInDays": l.retention_days })
}

fn cluster_properties(c: &ClusterSpec) -> Value {
    json!({ "ClusterName": c.name })
}

fn capacity_properties(c: &CapacityProviderAssociation) -> Value {
    json!({
        "CapacityProviders": c.providers,
        "Cluster": c.cluster,
        "DefaultCapacityProviderStrategy": [],
    })
}

fn task_properties(t: &TaskTemplateSpec, env: &Environment) -> Value {
    let containers: Vec<Value> = t
        .containers
        .iter()
        .map(|c| {
            let mut v = json!({
                "Essential": true,
                "Image": c.image,
                "LogConfiguration": {
                    "LogDriver": "awslogs",
                    "Options": {
                        "awslogs-group": Token::reference(&c.log_group),
                        "awslogs-stream-prefix": c.stream_prefix,
                        "awslogs-region": env.region,
                    },
                },
                "Name": c.name,
            });
            if !c.command.is_empty() {
                v["Command"] = json!(c.command);
            }
            v
        })
        .collect();

    json!({
        "ContainerDefinitions": containers,
        "Cpu": t.cpu.to_string(),
        "ExecutionRoleArn": t.execution_role,
        "Family": t.family,
        "Memory": t.memory_mib.to_string(),
        "NetworkMode": "awsvpc",
        "RequiresCompatibilities": ["FARGATE"],
        "TaskRoleArn": t.task_role,
    })
}

fn role_properties(r: &RoleSpec) -> Value {
    let mut props = json!({
        "AssumeRolePolicyDocument": {
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": r.assumed_by },
            }],
            "Version": POLICY_VERSION,
        },
    });
    if let Some(d) = &r.description {
        props["Description"] = json!(d);
    }
    if let Some(n) = &r.name {
        props["RoleName"] = json!(n);
    }
    props
}

fn policy_value(r: &RoleSpec) -> Value {
    json!({
        "Type": "AWS::IAM::Policy",
        "Properties": {
            "PolicyDocument": {
                "Statement": r.grants.iter().map(statement).collect::<Vec<_>>(),
                "Version": POLICY_VERSION,
            },
            "PolicyName": r.policy_id(),
            "Roles": [Token::reference(&r.logical_id)],
        },
    })
}

/// Single-element action/resource lists collapse to a scalar.
fn one_or_many<T: serde::Serialize>(items: &[T]) -> Value {
    match items {
        [one] => json!(one),
        many => json!(many),
    }
}

fn statement(g: &Grant) -> Value {
    let mut s = json!({
        "Action": one_or_many(&g.actions),
        "Effect": "Allow",
        "Resource": one_or_many(&g.resources),
    });
    if let Some(c) = &g.condition {
        s["Condition"] = json!({ c.operator.as_str(): { c.key.as_str(): c.value } });
    }
    s
}

fn pipe_properties(p: &RoutingRuleSpec) -> Value {
    let tp = &p.target_params;

    let strategy: Vec<Value> = tp
        .capacity_provider_strategy
        .iter()
        .map(|item| {
            let mut v = json!({ "CapacityProvider": item.capacity_provider });
            if let Some(base) = item.base {
                v["Base"] = json!(base);
            }
            if let Some(weight) = item.weight {
                v["Weight"] = json!(weight);
            }
            v
        })
        .collect();

    let overrides: Vec<Value> = tp
        .overrides
        .container_overrides
        .iter()
        .map(|o| json!({ "Command": o.command, "Name": o.name }))
        .collect();

    let mut ecs = json!({
        "CapacityProviderStrategy": strategy,
        "NetworkConfiguration": {
            "AwsvpcConfiguration": {
                "AssignPublicIp": if tp.network.assign_public_ip { "ENABLED" } else { "DISABLED" },
                "Subnets": tp.network.subnets,
            },
        },
        "Overrides": { "ContainerOverrides": overrides },
        "TaskCount": tp.task_count,
        "TaskDefinitionArn": tp.task_definition_arn,
    });
    if let Some(gib) = tp.overrides.ephemeral_storage_gib {
        ecs["Overrides"]["EphemeralStorage"] = json!({ "SizeInGiB": gib });
    }

    let mut props = json!({
        "Name": p.name,
        "RoleArn": p.role_arn,
        "Source": p.source,
        "SourceParameters": {
            "SqsQueueParameters": {
                "BatchSize": p.source_params.batch_size,
                "MaximumBatchingWindowInSeconds": p.source_params.max_batching_window_secs,
            },
        },
        "Target": p.target,
        "TargetParameters": { "EcsTaskParameters": ecs },
    });
    if let Some(d) = &p.description {
        props["Description"] = json!(d);
    }
    props
}
