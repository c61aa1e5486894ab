//! Network lookup for the default VPC of an account/region.

pub mod context;
pub mod subnet;

pub use context::{ContextLookup, load_context_file};
pub use subnet::{Network, SubnetType};

use crate::error::DescriptorResult;
use crate::spec::Environment;

/// Resolves the network a descriptor places its cluster and tasks in.
pub trait NetworkLookup {
    fn default_network(&self, env: &Environment) -> DescriptorResult<Network>;
}
