//! Target account/region for a descriptor.

use crate::error::{DescriptorError, DescriptorResult};
use regex::Regex;
use std::sync::LazyLock;

static ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("account regex"));
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").expect("region regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> DescriptorResult<Self> {
        let account = account.into().trim().to_string();
        let region = region.into().trim().to_string();

        if !ACCOUNT_RE.is_match(&account) {
            return Err(DescriptorError::Environment(format!(
                "account must be 12 digits, got {account:?}"
            )));
        }
        if !REGION_RE.is_match(&region) {
            return Err(DescriptorError::Environment(format!(
                "region {region:?} is not a valid region name"
            )));
        }

        Ok(Self { account, region })
    }
}
