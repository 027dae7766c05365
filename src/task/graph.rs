/*!
 * Task Graph
 * DAG storage, validation, and topological level execution
 */

use super::executor::ThreadPoolExecutor;
use super::types::{GraphRunOptions, GraphRunStats, GraphTaskOptions, TaskSubmitOptions};
use crate::core::{CoreResult, ErrorModule, Status, StatusCode, TaskId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn graph_status(code: StatusCode, message: impl Into<String>) -> Status {
    Status::with_module(code, message, ErrorModule::Task, 0)
}

struct GraphNode {
    job: Arc<dyn Fn() + Send + Sync + 'static>,
    options: GraphTaskOptions,
}

/// Task graph executed in topological order.
///
/// Nodes and edges live in ordered maps keyed by task id, so storage can
/// reshape without dangling references. A graph can run inline on the caller
/// or level-by-level on a [`ThreadPoolExecutor`].
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, GraphNode>,
    edges: BTreeMap<TaskId, BTreeSet<TaskId>>,
    next_id: TaskId,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGraph {
    pub fn new() -> Self {
        Self { nodes: BTreeMap::new(), edges: BTreeMap::new(), next_id: 1 }
    }

    /// Add a node with default options, returning its id
    pub fn add_task(&mut self, f: impl Fn() + Send + Sync + 'static) -> TaskId {
        self.add_task_ex(f, GraphTaskOptions::default())
    }

    /// Add a node with explicit priority / serial key
    pub fn add_task_ex(
        &mut self,
        f: impl Fn() + Send + Sync + 'static,
        options: GraphTaskOptions,
    ) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, GraphNode { job: Arc::new(f), options });
        self.edges.entry(id).or_default();
        id
    }

    /// Record that `before` must finish before `after` starts.
    /// Duplicate edges are deduplicated silently.
    pub fn add_dependency(&mut self, before: TaskId, after: TaskId) -> CoreResult<()> {
        if before == after {
            return Err(graph_status(
                StatusCode::InvalidArgument,
                "self dependency is not allowed",
            ));
        }
        if !self.nodes.contains_key(&before) || !self.nodes.contains_key(&after) {
            return Err(graph_status(StatusCode::NotFound, "task id not found"));
        }
        self.edges.entry(before).or_default().insert(after);
        Ok(())
    }

    /// `before_ids[i] -> after` for every listed id
    pub fn add_dependencies(&mut self, after: TaskId, before_ids: &[TaskId]) -> CoreResult<()> {
        for &before in before_ids {
            self.add_dependency(before, after)?;
        }
        Ok(())
    }

    /// Check the graph is acyclic and every edge endpoint is live
    pub fn validate(&self) -> CoreResult<()> {
        let mut indegree = self.build_indegree()?;

        let mut ready: VecDeque<TaskId> =
            indegree.iter().filter(|(_, &d)| d == 0).map(|(&id, _)| id).collect();

        let mut processed = 0usize;
        while let Some(id) = ready.pop_front() {
            processed += 1;
            if let Some(successors) = self.edges.get(&id) {
                for dst in successors {
                    if let Some(d) = indegree.get_mut(dst) {
                        *d -= 1;
                        if *d == 0 {
                            ready.push_back(*dst);
                        }
                    }
                }
            }
        }

        if processed != self.nodes.len() {
            return Err(graph_status(
                StatusCode::InvalidArgument,
                "task graph contains cycle or unresolved dependency",
            ));
        }
        Ok(())
    }

    /// Drop all nodes and edges and restart id allocation
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.next_id = 1;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run every node inline on the caller, parents before children.
    /// The first panicking node aborts the run with `InternalError`.
    pub fn run(&self) -> CoreResult<()> {
        self.validate()?;
        let mut indegree = self.build_indegree()?;

        let mut ready: VecDeque<TaskId> =
            indegree.iter().filter(|(_, &d)| d == 0).map(|(&id, _)| id).collect();

        while let Some(id) = ready.pop_front() {
            let node = self
                .nodes
                .get(&id)
                .ok_or_else(|| {
                    graph_status(StatusCode::InternalError, "node missing during execution")
                })?;

            let job = Arc::clone(&node.job);
            if catch_unwind(AssertUnwindSafe(|| job())).is_err() {
                return Err(graph_status(StatusCode::InternalError, "task function panicked"));
            }

            if let Some(successors) = self.edges.get(&id) {
                for dst in successors {
                    let d = indegree.get_mut(dst).ok_or_else(|| {
                        graph_status(
                            StatusCode::InternalError,
                            "indegree missing for destination node",
                        )
                    })?;
                    if *d > 0 {
                        *d -= 1;
                    }
                    if *d == 0 {
                        ready.push_back(*dst);
                    }
                }
            }
        }
        Ok(())
    }

    /// Run the graph on an executor, dispatching ready nodes in levels.
    ///
    /// Each level is bounded by `max_concurrency` (0 means all ready nodes),
    /// submitted with the node's priority and serial key, and awaited before
    /// successors become ready, so a node starts only after every ancestor
    /// has returned. With `fail_fast`, the first level containing a failed
    /// node aborts the run.
    pub fn run_with_executor(
        &self,
        executor: &ThreadPoolExecutor,
        options: &GraphRunOptions,
    ) -> CoreResult<GraphRunStats> {
        self.validate()?;
        let mut indegree = self.build_indegree()?;

        let mut ready: VecDeque<TaskId> =
            indegree.iter().filter(|(_, &d)| d == 0).map(|(&id, _)| id).collect();

        let total = self.nodes.len() as u64;
        let mut processed = 0u64;
        let mut succeeded = 0u64;
        let mut failed = 0u64;

        while !ready.is_empty() {
            let level_cap = if options.max_concurrency == 0 {
                ready.len()
            } else {
                (options.max_concurrency as usize).min(ready.len())
            };

            let mut level = Vec::with_capacity(level_cap);
            while level.len() < level_cap {
                match ready.pop_front() {
                    Some(id) => level.push(id),
                    None => break,
                }
            }

            let mut submissions: Vec<(TaskId, TaskId, Arc<AtomicBool>)> =
                Vec::with_capacity(level.len());
            for &node_id in &level {
                let node = self.nodes.get(&node_id).ok_or_else(|| {
                    graph_status(StatusCode::InternalError, "node missing during execution")
                })?;

                let job = Arc::clone(&node.job);
                let node_failed = Arc::new(AtomicBool::new(false));
                let failed_flag = Arc::clone(&node_failed);
                let submitted = executor.submit_ex(
                    move || {
                        if catch_unwind(AssertUnwindSafe(|| job())).is_err() {
                            failed_flag.store(true, Ordering::Relaxed);
                        }
                    },
                    TaskSubmitOptions {
                        priority: node.options.priority,
                        tag: 0,
                        serial_key: node.options.serial_key,
                    },
                );

                match submitted {
                    Ok(task_id) => submissions.push((node_id, task_id, node_failed)),
                    Err(status) => {
                        let ids: Vec<TaskId> = submissions.iter().map(|s| s.1).collect();
                        if !ids.is_empty() {
                            let _ = executor.wait_batch(&ids, 0);
                        }
                        return Err(status);
                    }
                }
            }

            let ids: Vec<TaskId> = submissions.iter().map(|s| s.1).collect();
            executor.wait_batch(&ids, 0)?;

            let mut level_failed = 0u64;
            for (_, _, node_failed) in &submissions {
                processed += 1;
                if node_failed.load(Ordering::Relaxed) {
                    level_failed += 1;
                } else {
                    succeeded += 1;
                }
            }
            failed += level_failed;

            if options.fail_fast && level_failed > 0 {
                return Err(graph_status(StatusCode::InternalError, "graph node failed"));
            }

            for (node_id, _, _) in &submissions {
                if let Some(successors) = self.edges.get(node_id) {
                    for dst in successors {
                        let d = indegree.get_mut(dst).ok_or_else(|| {
                            graph_status(
                                StatusCode::InternalError,
                                "indegree missing for destination node",
                            )
                        })?;
                        if *d > 0 {
                            *d -= 1;
                        }
                        if *d == 0 {
                            ready.push_back(*dst);
                        }
                    }
                }
            }
        }

        if processed != total {
            return Err(graph_status(
                StatusCode::InvalidArgument,
                "task graph contains cycle or unresolved dependency",
            ));
        }

        Ok(GraphRunStats {
            total,
            succeeded,
            failed,
            canceled: total - succeeded - failed,
        })
    }

    fn build_indegree(&self) -> CoreResult<BTreeMap<TaskId, usize>> {
        let mut indegree: BTreeMap<TaskId, usize> =
            self.nodes.keys().map(|&id| (id, 0)).collect();

        for successors in self.edges.values() {
            for dst in successors {
                let d = indegree.get_mut(dst).ok_or_else(|| {
                    graph_status(StatusCode::InternalError, "edge references missing node")
                })?;
                *d += 1;
            }
        }
        Ok(indegree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_ids_start_at_one() {
        let mut graph = TaskGraph::new();
        assert_eq!(graph.add_task(|| {}), 1);
        assert_eq!(graph.add_task(|| {}), 2);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut graph = TaskGraph::new();
        let id = graph.add_task(|| {});
        let status = graph.add_dependency(id, id).unwrap_err();
        assert_eq!(status.code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn test_unknown_id_rejected() {
        let mut graph = TaskGraph::new();
        let id = graph.add_task(|| {});
        let status = graph.add_dependency(id, 42).unwrap_err();
        assert_eq!(status.code(), StatusCode::NotFound);
    }

    #[test]
    fn test_duplicate_edges_deduplicated() {
        let mut graph = TaskGraph::new();
        let a = graph.add_task(|| {});
        let b = graph.add_task(|| {});
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(a, b).unwrap();
        graph.validate().unwrap();
    }

    #[test]
    fn test_cycle_fails_validation() {
        let mut graph = TaskGraph::new();
        let a = graph.add_task(|| {});
        let b = graph.add_task(|| {});
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(b, a).unwrap();
        let status = graph.validate().unwrap_err();
        assert_eq!(status.code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn test_inline_run_respects_order() {
        let order = Arc::new(AtomicU64::new(0));
        let mut graph = TaskGraph::new();

        let seen_a = Arc::clone(&order);
        let a = graph.add_task(move || {
            seen_a.fetch_add(1, Ordering::SeqCst);
        });
        let seen_b = Arc::clone(&order);
        let b = graph.add_task(move || {
            // Parent ran first.
            assert_eq!(seen_b.load(Ordering::SeqCst), 1);
        });
        graph.add_dependency(a, b).unwrap();

        graph.run().unwrap();
    }

    #[test]
    fn test_clear_restarts_ids() {
        let mut graph = TaskGraph::new();
        graph.add_task(|| {});
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.add_task(|| {}), 1);
    }
}
