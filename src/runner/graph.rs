//! Dependency graph of migration steps.
//!
//! [`TaskGraph`] owns the step list for a run. Steps keep their insertion
//! order, which is also the tie-break when several steps are runnable at
//! once. Only the workflow engine transitions step status.

use std::collections::{HashMap, HashSet};

use crate::error::{LeapfrogError, Result};
use crate::plan::{Step, StepStatus};

/// Steps and their declared dependency edges.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Steps in insertion order.
    steps: Vec<Step>,
    /// Map of step id to its position in `steps`.
    index: HashMap<String, usize>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a step list, preserving its order.
    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Result<Self> {
        let mut graph = Self::new();
        for step in steps {
            graph.add_task(step)?;
        }
        Ok(graph)
    }

    /// Append a step.
    ///
    /// Fails with [`LeapfrogError::DuplicateStep`] if the id is taken.
    pub fn add_task(&mut self, step: Step) -> Result<()> {
        if self.index.contains_key(&step.id) {
            return Err(LeapfrogError::DuplicateStep { id: step.id });
        }
        self.index.insert(step.id.clone(), self.steps.len());
        self.steps.push(step);
        Ok(())
    }

    /// Get a step by id.
    pub fn get(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Check if a step exists in the graph.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All steps in insertion order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Get the number of steps in the graph.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps that are PENDING with every dependency COMPLETED, in insertion
    /// order.
    ///
    /// A dependency id that is not in the graph never counts as completed.
    pub fn runnable_tasks(&self) -> Vec<&Step> {
        self.steps.iter().filter(|s| self.is_runnable(s)).collect()
    }

    /// Check if a step is PENDING with all its dependencies COMPLETED.
    pub fn is_runnable(&self, step: &Step) -> bool {
        step.status == StepStatus::Pending && self.dependencies_completed(step)
    }

    fn dependencies_completed(&self, step: &Step) -> bool {
        step.dependency_ids.iter().all(|dep| {
            self.get(dep)
                .is_some_and(|d| d.status == StepStatus::Completed)
        })
    }

    /// Dependency references that point at ids missing from the graph.
    ///
    /// Returns `(step id, missing dependency id)` pairs.
    pub fn unknown_dependencies(&self) -> Vec<(String, String)> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.dependency_ids
                    .iter()
                    .filter(|dep| !self.contains(dep))
                    .map(|dep| (step.id.clone(), dep.clone()))
            })
            .collect()
    }

    /// Find a cycle in the graph, returning the path if one exists.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        fn dfs(
            node: usize,
            graph: &TaskGraph,
            state: &mut [State],
            path: &mut Vec<usize>,
        ) -> Option<Vec<String>> {
            state[node] = State::Visiting;
            path.push(node);

            for dep in &graph.steps[node].dependency_ids {
                let Some(&next) = graph.index.get(dep) else {
                    continue;
                };
                match state[next] {
                    State::Visiting => {
                        let start = path.iter().position(|&p| p == next).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..]
                            .iter()
                            .map(|&i| graph.steps[i].id.clone())
                            .collect();
                        cycle.push(graph.steps[next].id.clone());
                        return Some(cycle);
                    }
                    State::Unvisited => {
                        if let Some(cycle) = dfs(next, graph, state, path) {
                            return Some(cycle);
                        }
                    }
                    State::Visited => {}
                }
            }

            path.pop();
            state[node] = State::Visited;
            None
        }

        let mut state = vec![State::Unvisited; self.steps.len()];
        let mut path = Vec::new();

        for node in 0..self.steps.len() {
            if state[node] == State::Unvisited {
                if let Some(cycle) = dfs(node, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Fail with [`LeapfrogError::CircularDependency`] if the graph has a
    /// cycle.
    pub fn check_acyclic(&self) -> Result<()> {
        match self.find_cycle() {
            Some(cycle) => Err(LeapfrogError::CircularDependency {
                cycle: cycle.join(" -> "),
            }),
            None => Ok(()),
        }
    }

    /// Ids of steps that depend on the given step, directly or indirectly,
    /// in insertion order.
    pub fn transitive_dependents(&self, id: &str) -> Vec<String> {
        let mut reached: HashSet<&str> = HashSet::new();
        let mut to_visit = vec![id];

        while let Some(current) = to_visit.pop() {
            for step in &self.steps {
                if step.dependency_ids.iter().any(|d| d == current)
                    && reached.insert(step.id.as_str())
                {
                    to_visit.push(step.id.as_str());
                }
            }
        }

        self.steps
            .iter()
            .filter(|s| reached.contains(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect()
    }

    /// First step the engine may pick: IN_PROGRESS, or runnable.
    pub(super) fn next_selectable(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress || self.is_runnable(s))
    }

    /// Transition a step. Returns false when the id is unknown.
    pub(super) fn set_status(&mut self, id: &str, status: StepStatus) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.steps[i].status = status;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str]) -> Step {
        Step::new(id, "TEST", id, "TestAgent").depends_on(deps.iter().copied())
    }

    fn ids(steps: &[&Step]) -> Vec<String> {
        steps.iter().map(|s| s.id.clone()).collect()
    }

    #[test]
    fn empty_graph_has_nothing_runnable() {
        let graph = TaskGraph::new();
        assert!(graph.is_empty());
        assert!(graph.runnable_tasks().is_empty());
    }

    #[test]
    fn add_task_rejects_duplicate_id() {
        let mut graph = TaskGraph::new();
        graph.add_task(step("a", &[])).unwrap();
        let err = graph.add_task(step("a", &[])).unwrap_err();
        assert!(matches!(err, LeapfrogError::DuplicateStep { id } if id == "a"));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn step_without_dependencies_is_immediately_runnable() {
        let graph = TaskGraph::from_steps([step("a", &[])]).unwrap();
        assert_eq!(ids(&graph.runnable_tasks()), vec!["a"]);
    }

    #[test]
    fn runnable_respects_dependencies() {
        let mut graph =
            TaskGraph::from_steps([step("a", &[]), step("b", &["a"]), step("c", &["b"])])
                .unwrap();

        assert_eq!(ids(&graph.runnable_tasks()), vec!["a"]);

        graph.set_status("a", StepStatus::Completed);
        assert_eq!(ids(&graph.runnable_tasks()), vec!["b"]);
    }

    #[test]
    fn runnable_returns_insertion_order() {
        let graph =
            TaskGraph::from_steps([step("zeta", &[]), step("alpha", &[]), step("mid", &[])])
                .unwrap();
        assert_eq!(
            ids(&graph.runnable_tasks()),
            vec!["zeta", "alpha", "mid"]
        );
    }

    #[test]
    fn non_pending_steps_are_never_runnable() {
        let mut graph = TaskGraph::from_steps([
            step("a", &[]),
            step("b", &[]),
            step("c", &[]),
            step("d", &[]),
            step("e", &[]),
        ])
        .unwrap();
        graph.set_status("a", StepStatus::InProgress);
        graph.set_status("b", StepStatus::Completed);
        graph.set_status("c", StepStatus::Failed);
        graph.set_status("d", StepStatus::Skipped);

        assert_eq!(ids(&graph.runnable_tasks()), vec!["e"]);
    }

    #[test]
    fn failed_dependency_blocks_dependent() {
        let mut graph = TaskGraph::from_steps([step("a", &[]), step("b", &["a"])]).unwrap();
        graph.set_status("a", StepStatus::Failed);
        assert!(graph.runnable_tasks().is_empty());
    }

    #[test]
    fn unknown_dependency_never_satisfies() {
        let graph = TaskGraph::from_steps([step("a", &["ghost"])]).unwrap();
        assert!(graph.runnable_tasks().is_empty());
        assert_eq!(
            graph.unknown_dependencies(),
            vec![("a".to_string(), "ghost".to_string())]
        );
    }

    #[test]
    fn runnable_tasks_is_idempotent() {
        let mut graph = TaskGraph::from_steps([
            step("a", &[]),
            step("b", &["a"]),
            step("c", &[]),
            step("d", &["a", "c"]),
        ])
        .unwrap();
        graph.set_status("a", StepStatus::Completed);

        let first = ids(&graph.runnable_tasks());
        let second = ids(&graph.runnable_tasks());
        assert_eq!(first, second);
        assert_eq!(first, vec!["b", "c"]);
    }

    #[test]
    fn runnable_never_returns_step_with_incomplete_dependency() {
        let mut graph = TaskGraph::from_steps([
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ])
        .unwrap();

        let statuses = [
            StepStatus::Pending,
            StepStatus::InProgress,
            StepStatus::Completed,
            StepStatus::Failed,
        ];
        for a in statuses {
            for b in statuses {
                graph.set_status("a", a);
                graph.set_status("b", b);
                for runnable in graph.runnable_tasks() {
                    for dep in &runnable.dependency_ids {
                        assert_eq!(graph.get(dep).unwrap().status, StepStatus::Completed);
                    }
                }
            }
        }
    }

    #[test]
    fn next_selectable_prefers_in_progress_in_list_order() {
        let mut graph = TaskGraph::from_steps([step("a", &[]), step("b", &[])]).unwrap();
        graph.set_status("b", StepStatus::InProgress);
        assert_eq!(graph.next_selectable().unwrap().id, "a");

        graph.set_status("a", StepStatus::Completed);
        assert_eq!(graph.next_selectable().unwrap().id, "b");
    }

    #[test]
    fn set_status_unknown_id_returns_false() {
        let mut graph = TaskGraph::new();
        assert!(!graph.set_status("missing", StepStatus::Completed));
    }

    #[test]
    fn no_cycle_returns_none() {
        let graph = TaskGraph::from_steps([step("a", &[]), step("b", &["a"])]).unwrap();
        assert!(graph.find_cycle().is_none());
        assert!(graph.check_acyclic().is_ok());
    }

    #[test]
    fn simple_cycle_returns_path() {
        let graph = TaskGraph::from_steps([step("a", &["b"]), step("b", &["a"])]).unwrap();
        let path = graph.find_cycle().unwrap();
        assert!(path.len() >= 2);
        assert_eq!(path.first(), path.last());
        assert!(matches!(
            graph.check_acyclic(),
            Err(LeapfrogError::CircularDependency { .. })
        ));
    }

    #[test]
    fn self_cycle_detected() {
        let graph = TaskGraph::from_steps([step("a", &["a"])]).unwrap();
        assert_eq!(graph.find_cycle().unwrap(), vec!["a", "a"]);
    }

    #[test]
    fn transitive_dependents_in_insertion_order() {
        let graph = TaskGraph::from_steps([
            step("a", &[]),
            step("b", &["a"]),
            step("x", &[]),
            step("c", &["b"]),
        ])
        .unwrap();

        assert_eq!(graph.transitive_dependents("a"), vec!["b", "c"]);
        assert!(graph.transitive_dependents("x").is_empty());
    }
}
