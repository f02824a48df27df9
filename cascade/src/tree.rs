// Job tree node: a scheduled job plus its direct dependents

use crate::models::{JobDetail, JobKey};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// A node on a job tree
///
/// A node's children are its direct dependents, submitted to the scheduler
/// only after the node's own handler completes successfully. Trees are
/// finite and acyclic by construction: children are finalized before they
/// are attached, so a node can never re-acquire one of its ancestors.
#[derive(Debug, Clone)]
pub struct JobTreeNode {
    pub detail: JobDetail,
    pub children: HashSet<JobTreeNode>,
}

impl JobTreeNode {
    pub fn new(detail: JobDetail) -> Self {
        Self {
            detail,
            children: HashSet::new(),
        }
    }

    pub fn key(&self) -> &JobKey {
        &self.detail.spec.key
    }

    /// Number of nodes in this subtree, the node itself included
    pub fn total_nodes(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(JobTreeNode::total_nodes)
            .sum::<usize>()
    }
}

// Nodes are identified by their job key; identity is assigned once at
// finalize time and never changes afterwards.
impl PartialEq for JobTreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for JobTreeNode {}

impl Hash for JobTreeNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
