//! Cross-resource references.
//!
//! A token is either a plain string or a reference to another resource in the
//! same descriptor, resolved later by the provisioning engine:
//!
//!   Token::Ref("sqsQueue")                 =>  { "Ref": "sqsQueue" }
//!   Token::GetAtt("sqsQueue", "Arn")       =>  { "Fn::GetAtt": ["sqsQueue", "Arn"] }
//!   Token::Literal("*")                    =>  "*"

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    Literal(String),
    Ref(String),
    GetAtt(String, String),
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Self::Ref(logical_id.into())
    }

    pub fn attr(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt(logical_id.into(), attribute.into())
    }

    /// Logical id (and attribute, for GetAtt) this token points at.
    pub fn target(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::Literal(_) => None,
            Self::Ref(id) => Some((id.as_str(), None)),
            Self::GetAtt(id, attr) => Some((id.as_str(), Some(attr.as_str()))),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Literal(s) => Value::String(s.clone()),
            Self::Ref(id) => json!({ "Ref": id }),
            Self::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id, attr] }),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(s) => f.write_str(s),
            Self::Ref(id) => write!(f, "${{{id}}}"),
            Self::GetAtt(id, attr) => write!(f, "${{{id}.{attr}}}"),
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
