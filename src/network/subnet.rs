//! Network shape as returned by a lookup.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SubnetType {
    Public,
    Private,
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub subnet_id: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubnetGroup {
    #[serde(rename = "type")]
    pub kind: SubnetType,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_groups: Vec<SubnetGroup>,
}

impl Network {
    /// Subnet ids of every group of the given type, in declaration order.
    pub fn select_subnets(&self, kind: SubnetType) -> Vec<&str> {
        self.subnet_groups
            .iter()
            .filter(|g| g.kind == kind)
            .flat_map(|g| g.subnets.iter().map(|s| s.subnet_id.as_str()))
            .collect()
    }

    /// Distinct availability zones covered by subnets of the given type.
    pub fn availability_zones(&self, kind: SubnetType) -> Vec<&str> {
        let mut zones: Vec<&str> = self
            .subnet_groups
            .iter()
            .filter(|g| g.kind == kind)
            .flat_map(|g| g.subnets.iter().map(|s| s.availability_zone.as_str()))
            .collect();
        zones.sort_unstable();
        zones.dedup();
        zones
    }
}
