//! Roles and permission grants.
//!
//! A grant is scoped to a set of resource patterns and an optional condition.
//! Patterns are checked when the grant is added, so a malformed grant fails the
//! descriptor before anything references the role.

use crate::error::{DescriptorError, DescriptorResult};
use crate::spec::Token;
use regex::Regex;
use std::sync::LazyLock;

// `*` alone, or service:Action where the action may carry wildcards.
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|[a-z0-9-]+:[A-Za-z0-9*?]+)$").expect("action regex")
});

// arn:partition:service:region:account:resource; region and account may be
// wildcarded.
static ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws(-[a-z]+)*:[a-z0-9-]+:[a-z0-9*?-]*:(\d{12}|[0-9]*[*?][0-9*?]*)?:.+$")
        .expect("arn regex")
});

// [ForAnyValue:|ForAllValues:]<base>[IfExists]
static CONDITION_OPERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:ForAnyValue|ForAllValues):)?(?P<base>[A-Za-z]+?)(?:IfExists)?$")
        .expect("condition operator regex")
});

const CONDITION_OPERATORS: [&str; 26] = [
    "StringEquals",
    "StringNotEquals",
    "StringEqualsIgnoreCase",
    "StringNotEqualsIgnoreCase",
    "StringLike",
    "StringNotLike",
    "NumericEquals",
    "NumericNotEquals",
    "NumericLessThan",
    "NumericLessThanEquals",
    "NumericGreaterThan",
    "NumericGreaterThanEquals",
    "DateEquals",
    "DateNotEquals",
    "DateLessThan",
    "DateLessThanEquals",
    "DateGreaterThan",
    "DateGreaterThanEquals",
    "Bool",
    "BinaryEquals",
    "IpAddress",
    "NotIpAddress",
    "ArnEquals",
    "ArnNotEquals",
    "ArnLike",
    "ArnNotLike",
];

/// `Null` takes neither the set prefix nor the `IfExists` suffix.
fn is_condition_operator(op: &str) -> bool {
    if op == "Null" {
        return true;
    }
    CONDITION_OPERATOR_RE
        .captures(op)
        .and_then(|c| c.name("base"))
        .is_some_and(|base| CONDITION_OPERATORS.contains(&base.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub operator: String,
    pub key: String,
    pub value: Token,
}

/// An allow statement. Grants never deny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub actions: Vec<String>,
    pub resources: Vec<Token>,
    pub condition: Option<Condition>,
}

impl Grant {
    pub fn allow<I, S>(actions: I, resources: Vec<Token>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resources,
            condition: None,
        }
    }

    pub fn when(mut self, operator: &str, key: &str, value: Token) -> Self {
        self.condition = Some(Condition {
            operator: operator.to_string(),
            key: key.to_string(),
            value,
        });
        self
    }

    pub fn validate(&self) -> DescriptorResult<()> {
        if self.actions.is_empty() {
            return Err(DescriptorError::MalformedGrant(
                "grant has no actions".to_string(),
            ));
        }
        for a in &self.actions {
            if !ACTION_RE.is_match(a) {
                return Err(DescriptorError::MalformedGrant(format!(
                    "action {a:?} is not of the form service:Action"
                )));
            }
        }

        if self.resources.is_empty() {
            return Err(DescriptorError::MalformedGrant(format!(
                "grant for {} has no resources",
                self.actions.join(",")
            )));
        }
        for r in &self.resources {
            if let Some(pattern) = r.as_literal() {
                if pattern != "*" && !ARN_RE.is_match(pattern) {
                    return Err(DescriptorError::MalformedGrant(format!(
                        "resource pattern {pattern:?} is neither '*' nor an ARN"
                    )));
                }
            }
        }

        if let Some(c) = &self.condition {
            if !is_condition_operator(&c.operator) {
                return Err(DescriptorError::MalformedGrant(format!(
                    "unknown condition operator {}",
                    c.operator
                )));
            }
            if c.key.split_once(':').is_none_or(|(svc, k)| svc.is_empty() || k.is_empty()) {
                return Err(DescriptorError::MalformedGrant(format!(
                    "condition key {:?} is not of the form service:key",
                    c.key
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub logical_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Service principal allowed to assume the role.
    pub assumed_by: String,
    pub grants: Vec<Grant>,
}

impl RoleSpec {
    pub fn new(logical_id: impl Into<String>, assumed_by: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            name: None,
            description: None,
            assumed_by: assumed_by.into(),
            grants: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a grant. Grants keep the order they were added in.
    pub fn add_to_policy(&mut self, grant: Grant) -> DescriptorResult<()> {
        grant.validate()?;
        self.grants.push(grant);
        Ok(())
    }

    pub fn arn(&self) -> Token {
        Token::attr(&self.logical_id, "Arn")
    }

    /// Logical id of the inline policy carrying the grants.
    pub fn policy_id(&self) -> String {
        format!("{}DefaultPolicy", self.logical_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_keep_insertion_order() {
        let mut role = RoleSpec::new("r", "pipes.amazonaws.com");
        role.add_to_policy(Grant::allow(["sqs:ReceiveMessage"], vec![Token::attr("q", "Arn")]))
            .unwrap();
        role.add_to_policy(
            Grant::allow(["iam:PassRole"], vec![Token::literal("*")]).when(
                "StringLike",
                "iam:PassedToService",
                Token::literal("ecs-tasks.amazonaws.com"),
            ),
        )
        .unwrap();
        let actions: Vec<_> = role.grants.iter().map(|g| g.actions[0].as_str()).collect();
        assert_eq!(actions, ["sqs:ReceiveMessage", "iam:PassRole"]);
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        let mut role = RoleSpec::new("r", "pipes.amazonaws.com");
        let bad = [
            Grant::allow(["RunTask"], vec![Token::literal("*")]),
            Grant::allow(["ecs:RunTask"], vec![Token::literal("task/*")]),
            Grant::allow(["ecs:RunTask"], vec![]),
            Grant::allow(["ecs:RunTask"], vec![Token::literal("*")]).when(
                "ArnMaybe",
                "ecs:cluster",
                Token::literal("*"),
            ),
            Grant::allow(["ecs:RunTask"], vec![Token::literal("*")]).when(
                "ArnLike",
                "cluster",
                Token::literal("*"),
            ),
            Grant::allow(["ecs:RunTask"], vec![Token::literal("*")]).when(
                "ForSomeValues:StringLike",
                "ecs:cluster",
                Token::literal("*"),
            ),
            Grant::allow(["ecs:RunTask"], vec![Token::literal("*")]).when(
                "NullIfExists",
                "ecs:cluster",
                Token::literal("*"),
            ),
        ];
        for grant in bad {
            assert!(matches!(
                role.add_to_policy(grant),
                Err(DescriptorError::MalformedGrant(_))
            ));
        }
        assert!(role.grants.is_empty());
    }

    #[test]
    fn literal_arns_are_accepted() {
        Grant::allow(
            ["ecs:RunTask"],
            vec![Token::literal("arn:aws:ecs:us-east-1:111111111111:task-definition/app:1")],
        )
        .validate()
        .unwrap();
    }

    #[test]
    fn wildcard_patterns_are_accepted() {
        let arns = ["arn:aws:sqs:*:*:sqs-event-queue", "arn:aws:ecs:us-east-?:111111111111:cluster/*"];
        for arn in arns {
            Grant::allow(["sqs:*"], vec![Token::literal(arn)])
                .validate()
                .unwrap();
        }
        Grant::allow(["*"], vec![Token::literal("*")]).validate().unwrap();
    }

    #[test]
    fn full_condition_operator_family_is_accepted() {
        let operators = [
            "ArnNotLike",
            "StringNotLike",
            "StringEqualsIfExists",
            "NumericLessThanEquals",
            "DateGreaterThan",
            "IpAddress",
            "Null",
            "ForAnyValue:StringLike",
            "ForAllValues:StringEqualsIfExists",
        ];
        for op in operators {
            Grant::allow(["ecs:RunTask"], vec![Token::literal("*")])
                .when(op, "ecs:cluster", Token::literal("*"))
                .validate()
                .unwrap_or_else(|e| panic!("{op}: {e}"));
        }
    }
}
