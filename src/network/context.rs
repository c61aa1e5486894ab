//! Lookup results cached in a context file (cdk.context.json).
//!
//! The file is a flat JSON object keyed by lookup key. A default-VPC lookup for
//! account 111111111111 in us-east-1 is stored under:
//!
//!   vpc-provider:account=111111111111:filter.isDefault=true:region=us-east-1:returnAsymmetricSubnets=true
//!
//! Failed lookups may be cached as `{ "$providerError": "..." }`.

use crate::Result;
use crate::error::{DescriptorError, DescriptorResult};
use crate::network::{Network, NetworkLookup};
use crate::spec::Environment;

use anyhow::{Context, bail};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

const PROVIDER_ERROR: &str = "$providerError";

pub fn default_vpc_key(env: &Environment) -> String {
    format!(
        "vpc-provider:account={}:filter.isDefault=true:region={}:returnAsymmetricSubnets=true",
        env.account, env.region
    )
}

#[derive(Debug, Clone, Default)]
pub struct ContextLookup {
    entries: BTreeMap<String, Value>,
}

impl ContextLookup {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("parse context JSON")?;
        let Value::Object(map) = value else {
            bail!("context must be a JSON object keyed by lookup key");
        };
        Ok(Self {
            entries: map.into_iter().collect(),
        })
    }

    /// Record a network under the default-VPC key for `env`.
    #[cfg(test)]
    pub fn insert_default_network(&mut self, env: &Environment, network: Value) {
        self.entries.insert(default_vpc_key(env), network);
    }
}

/// Read a context file. A missing file yields an empty context, so the
/// lookup itself reports which key is absent.
pub fn load_context_file(path: impl AsRef<Path>) -> Result<ContextLookup> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "context file not found; starting with empty context");
        return Ok(ContextLookup::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("read context file {}", path.display()))?;
    let ctx = ContextLookup::parse(&text)
        .with_context(|| format!("load context file {}", path.display()))?;
    debug!(path = %path.display(), entries = ctx.entries.len(), "loaded context");
    Ok(ctx)
}

impl NetworkLookup for ContextLookup {
    fn default_network(&self, env: &Environment) -> DescriptorResult<Network> {
        let key = default_vpc_key(env);
        let value = self.entries.get(&key).ok_or_else(|| {
            DescriptorError::NetworkUnresolved(format!(
                "no default network recorded for account {} in {} (missing context key {key})",
                env.account, env.region
            ))
        })?;

        if let Some(err) = value.get(PROVIDER_ERROR) {
            return Err(DescriptorError::NetworkUnresolved(format!(
                "lookup for {key} failed: {}",
                err.as_str().unwrap_or("unknown provider error")
            )));
        }

        let network: Network = serde_json::from_value(value.clone()).map_err(|e| {
            DescriptorError::NetworkUnresolved(format!("context entry {key} is malformed: {e}"))
        })?;
        debug!(vpc_id = %network.vpc_id, groups = network.subnet_groups.len(), "resolved default network");
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env() -> Environment {
        Environment::new("111111111111", "us-east-1").unwrap()
    }

    #[test]
    fn key_matches_context_file_format() {
        assert_eq!(
            default_vpc_key(&env()),
            "vpc-provider:account=111111111111:filter.isDefault=true:region=us-east-1:returnAsymmetricSubnets=true"
        );
    }

    #[test]
    fn resolves_network_from_parsed_file() {
        let key = default_vpc_key(&env());
        let text = json!({
            key: {
                "vpcId": "vpc-123",
                "vpcCidrBlock": "172.31.0.0/16",
                "subnetGroups": [{
                    "name": "Public",
                    "type": "Public",
                    "subnets": [{
                        "subnetId": "subnet-1",
                        "cidr": "172.31.0.0/20",
                        "availabilityZone": "us-east-1a",
                        "routeTableId": "rtb-1"
                    }]
                }]
            }
        })
        .to_string();
        let ctx = ContextLookup::parse(&text).unwrap();
        let net = ctx.default_network(&env()).unwrap();
        assert_eq!(net.vpc_id, "vpc-123");
        assert_eq!(net.subnet_groups[0].subnets[0].subnet_id, "subnet-1");
    }

    #[test]
    fn missing_key_is_unresolved() {
        let err = ContextLookup::default().default_network(&env()).unwrap_err();
        assert!(matches!(err, DescriptorError::NetworkUnresolved(_)));
    }

    #[test]
    fn provider_error_is_unresolved() {
        let mut ctx = ContextLookup::default();
        ctx.insert_default_network(&env(), json!({ "$providerError": "no default VPC" }));
        match ctx.default_network(&env()) {
            Err(DescriptorError::NetworkUnresolved(msg)) => assert!(msg.contains("no default VPC")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_object_context_is_rejected() {
        assert!(ContextLookup::parse("[1, 2]").is_err());
    }

    #[test]
    fn missing_file_loads_as_empty_context() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = load_context_file(dir.path().join("cdk.context.json")).unwrap();
        assert!(ctx.entries.is_empty());
        assert!(matches!(
            ctx.default_network(&env()),
            Err(DescriptorError::NetworkUnresolved(_))
        ));
    }

    #[test]
    fn loads_network_from_file_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cdk.context.json");
        let key = default_vpc_key(&env());
        let body = json!({ key: { "vpcId": "vpc-disk", "subnetGroups": [] } });
        fs::write(&path, body.to_string()).unwrap();

        let ctx = load_context_file(&path).unwrap();
        assert_eq!(ctx.default_network(&env()).unwrap().vpc_id, "vpc-disk");
    }

    #[test]
    fn unparsable_file_names_the_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cdk.context.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_context_file(&path).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("load context file"), "{chain}");
        assert!(chain.contains(&path.display().to_string()), "{chain}");
        assert!(chain.contains("parse context JSON"), "{chain}");
    }
}
