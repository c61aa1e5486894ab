//! Resource registry and cross-reference validation.
//!
//! Checks, in order:
//! - logical ids are well-formed and unique
//! - every token resolves to a declared resource exposing that attribute
//! - the reference graph is acyclic

use crate::error::{DescriptorError, DescriptorResult};
use crate::model::Resource;
use crate::spec::{OutputSpec, Token};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static LOGICAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,255}$").expect("logical id regex"));

#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: Vec<Resource>,
    /// logical id -> index into `resources`
    index: BTreeMap<String, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) -> DescriptorResult<()> {
        let pos = self.resources.len();
        for id in resource.declared_ids() {
            if !LOGICAL_ID_RE.is_match(&id) {
                return Err(DescriptorError::InvalidLogicalId(id));
            }
            if self.index.contains_key(&id) {
                return Err(DescriptorError::DuplicateLogicalId(id));
            }
        }
        for id in resource.declared_ids() {
            self.index.insert(id, pos);
        }
        self.resources.push(resource);
        Ok(())
    }

    fn resolve(&self, from: &str, token: &Token) -> DescriptorResult<Option<usize>> {
        let Some((id, attr)) = token.target() else {
            return Ok(None);
        };
        let dangling = || DescriptorError::DanglingReference {
            from: from.to_string(),
            target: token.to_string(),
        };
        let &pos = self.index.get(id).ok_or_else(dangling)?;
        if let Some(attr) = attr {
            // Attributes belong to the primary id only, not to companion ids.
            let owner = &self.resources[pos];
            if owner.logical_id() != id || !owner.attributes().contains(&attr) {
                return Err(dangling());
            }
        }
        Ok(Some(pos))
    }

    /// Validate every reference (including outputs) and reject cycles.
    pub fn validate(&self, outputs: &[OutputSpec]) -> DescriptorResult<()> {
        let mut edges: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (pos, r) in self.resources.iter().enumerate() {
            for token in r.references() {
                if let Some(dst) = self.resolve(r.logical_id(), &token)? {
                    edges.entry(pos).or_default().push(dst);
                }
            }
        }
        for o in outputs {
            self.resolve(&o.logical_id, &o.value)?;
        }

        // DFS coloring over "references" edges.
        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Mark {
            Temp,
            Perm,
        }

        fn dfs(
            v: usize,
            graph: &ResourceGraph,
            edges: &BTreeMap<usize, Vec<usize>>,
            marks: &mut BTreeMap<usize, Mark>,
            stack: &mut Vec<usize>,
        ) -> DescriptorResult<()> {
            match marks.get(&v) {
                Some(Mark::Perm) => return Ok(()),
                Some(Mark::Temp) => {
                    stack.push(v);
                    let path: Vec<&str> = stack
                        .iter()
                        .map(|&i| graph.resources[i].logical_id())
                        .collect();
                    return Err(DescriptorError::ReferenceCycle(path.join(" -> ")));
                }
                None => {}
            }

            marks.insert(v, Mark::Temp);
            stack.push(v);
            if let Some(next) = edges.get(&v) {
                for &n in next {
                    dfs(n, graph, edges, marks, stack)?;
                }
            }
            stack.pop();
            marks.insert(v, Mark::Perm);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        for v in 0..self.resources.len() {
            stack.clear();
            dfs(v, self, &edges, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }
}
