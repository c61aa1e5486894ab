//! Queue records: a primary queue and an optional overflow (dead-letter) target.

use crate::error::{DescriptorError, DescriptorResult};
use crate::spec::Token;
use regex::Regex;
use std::sync::LazyLock;

static QUEUE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,80}$").expect("queue name regex"));

/// Actions granted to a consumer of a queue.
pub const CONSUME_ACTIONS: [&str; 5] = [
    "sqs:ReceiveMessage",
    "sqs:ChangeMessageVisibility",
    "sqs:GetQueueUrl",
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
];

/// Longest visibility timeout SQS accepts (12 hours).
const MAX_VISIBILITY_TIMEOUT_SECS: u32 = 43_200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub logical_id: String,
    pub name: String,
    pub visibility_timeout_secs: Option<u32>,
    pub dead_letter: Option<DeadLetterSpec>,
}

/// Where messages go after `max_receive_count` failed deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterSpec {
    /// Logical id of the overflow queue.
    pub queue: String,
    pub max_receive_count: u32,
}

impl QueueSpec {
    pub fn new(logical_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            name: name.into(),
            visibility_timeout_secs: None,
            dead_letter: None,
        }
    }

    pub fn with_visibility_timeout(mut self, secs: u32) -> Self {
        self.visibility_timeout_secs = Some(secs);
        self
    }

    pub fn with_dead_letter(mut self, overflow: &QueueSpec, max_receive_count: u32) -> Self {
        self.dead_letter = Some(DeadLetterSpec {
            queue: overflow.logical_id.clone(),
            max_receive_count,
        });
        self
    }

    pub fn validate(&self) -> DescriptorResult<()> {
        if !QUEUE_NAME_RE.is_match(&self.name) {
            return Err(DescriptorError::InvalidQueue(format!(
                "queue name {:?} must be 1-80 characters of [A-Za-z0-9_-]",
                self.name
            )));
        }
        if let Some(secs) = self.visibility_timeout_secs {
            if secs > MAX_VISIBILITY_TIMEOUT_SECS {
                return Err(DescriptorError::InvalidQueue(format!(
                    "{}: visibility timeout {secs}s exceeds {MAX_VISIBILITY_TIMEOUT_SECS}s",
                    self.name
                )));
            }
        }
        if let Some(dlq) = &self.dead_letter {
            if dlq.max_receive_count < 1 {
                return Err(DescriptorError::InvalidQueue(format!(
                    "{}: max receive count must be at least 1",
                    self.name
                )));
            }
            if dlq.queue == self.logical_id {
                return Err(DescriptorError::InvalidQueue(format!(
                    "{} cannot be its own overflow queue",
                    self.name
                )));
            }
        }
        Ok(())
    }

    pub fn arn(&self) -> Token {
        Token::attr(&self.logical_id, "Arn")
    }

    /// Resolves to the queue URL.
    pub fn url(&self) -> Token {
        Token::reference(&self.logical_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_letter_points_at_overflow_queue() {
        let dlq = QueueSpec::new("deadLetterQueue", "sqs-event-queue-dlq");
        let queue = QueueSpec::new("sqsQueue", "sqs-event-queue").with_dead_letter(&dlq, 2);
        queue.validate().unwrap();
        assert_eq!(
            queue.dead_letter,
            Some(DeadLetterSpec {
                queue: "deadLetterQueue".to_string(),
                max_receive_count: 2
            })
        );
    }

    #[test]
    fn zero_receive_count_is_rejected() {
        let dlq = QueueSpec::new("deadLetterQueue", "dlq");
        let queue = QueueSpec::new("sqsQueue", "main").with_dead_letter(&dlq, 0);
        assert!(matches!(queue.validate(), Err(DescriptorError::InvalidQueue(_))));
    }

    #[test]
    fn names_with_dots_are_rejected() {
        let queue = QueueSpec::new("q", "events.fifo.bad");
        assert!(queue.validate().is_err());
        let long = QueueSpec::new("q", "a".repeat(81));
        assert!(long.validate().is_err());
    }
}
