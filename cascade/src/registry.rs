// Process-wide registry of fired job trees, keyed by root identity

use crate::models::JobKey;
use crate::tree::JobTreeNode;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Concurrency-safe mapping from a fired tree's root identity to its full
/// node, including the whole descendant structure
///
/// One entry per fired tree, inserted when the root is accepted by the
/// scheduler. Entries are never removed automatically; `remove` is the
/// explicit pruning hook for long-running hosts.
#[derive(Debug, Default)]
pub struct JobRegistry {
    trees: RwLock<HashMap<JobKey, Arc<JobTreeNode>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert; the last writer wins if the same identity is fired twice
    pub fn insert(&self, key: JobKey, node: Arc<JobTreeNode>) {
        let mut trees = self.trees.write().unwrap_or_else(|e| e.into_inner());
        trees.insert(key, node);
    }

    /// Non-blocking lookup of the tree fired under `key`
    pub fn get(&self, key: &JobKey) -> Option<Arc<JobTreeNode>> {
        let trees = self.trees.read().unwrap_or_else(|e| e.into_inner());
        trees.get(key).cloned()
    }

    /// Explicitly prune a tree; a no-op if the key was never registered
    pub fn remove(&self, key: &JobKey) -> Option<Arc<JobTreeNode>> {
        let mut trees = self.trees.write().unwrap_or_else(|e| e.into_inner());
        trees.remove(key)
    }

    pub fn len(&self) -> usize {
        let trees = self.trees.read().unwrap_or_else(|e| e.into_inner());
        trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobDetail, JobSpec, ScheduleSpec};

    fn node(name: &str, job_type: &str) -> Arc<JobTreeNode> {
        Arc::new(JobTreeNode::new(JobDetail {
            spec: JobSpec {
                key: JobKey::new(name, "default"),
                job_type: job_type.to_string(),
                payload: None,
                description: None,
                allow_concurrent: true,
                request_recovery: false,
                durable: false,
            },
            schedule: ScheduleSpec::default(),
        }))
    }

    #[test]
    fn test_insert_and_get() {
        let registry = JobRegistry::new();
        let root = node("root", "jobs::Root");
        registry.insert(root.key().clone(), root.clone());

        let found = registry.get(root.key()).unwrap();
        assert_eq!(found.key(), root.key());
        assert!(registry.get(&JobKey::new("other", "default")).is_none());
    }

    #[test]
    fn test_upsert_last_writer_wins() {
        let registry = JobRegistry::new();
        let key = JobKey::new("root", "default");
        registry.insert(key.clone(), node("root", "jobs::First"));
        registry.insert(key.clone(), node("root", "jobs::Second"));

        assert_eq!(registry.len(), 1);
        let found = registry.get(&key).unwrap();
        assert_eq!(found.detail.spec.job_type, "jobs::Second");
    }

    #[test]
    fn test_remove_prunes_entry() {
        let registry = JobRegistry::new();
        let root = node("root", "jobs::Root");
        registry.insert(root.key().clone(), root.clone());

        assert!(registry.remove(root.key()).is_some());
        assert!(registry.get(root.key()).is_none());
        assert!(registry.remove(root.key()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let registry = Arc::new(JobRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let name = format!("job-{i}-{j}");
                        let n = node(&name, "jobs::Load");
                        registry.insert(n.key().clone(), n.clone());
                        assert!(registry.get(n.key()).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 800);
    }
}
