// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! DAG construction over a [`wf_core::Workflow`].
//!
//! Indexes steps by id, derives child edges from declared `parent_step_ids`,
//! detects cycles and unknown parents, and emits a topological order that is
//! stable under ties: among steps with no ordering constraint between them,
//! the one declared earlier in the workflow's `steps` sequence is emitted
//! first. This is the order the scheduler must also honor for receipt
//! append, so it is computed once here and reused.

use std::collections::{BinaryHeap, HashMap};

use wf_core::{Step, Workflow};
use wf_error::{ErrorInfo, ErrorKind};

/// The graph derived from a workflow: an id index, child adjacency, initial
/// indegree counts, and the precomputed topological order.
#[derive(Debug, Clone)]
pub struct StepGraph {
    by_id: HashMap<String, Step>,
    children: HashMap<String, Vec<String>>,
    indegree: HashMap<String, usize>,
    order: Vec<String>,
}

impl StepGraph {
    /// Build a graph from a workflow.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::WorkflowSchemaInvalid` on a duplicate step id,
    /// `ErrorKind::WorkflowBadParent` if any `parent_step_ids` entry does
    /// not resolve to a step in the same workflow, and
    /// `ErrorKind::WorkflowCyclic` if the dependency graph is not acyclic.
    pub fn build(workflow: &Workflow) -> Result<Self, ErrorInfo> {
        let mut by_id = HashMap::with_capacity(workflow.steps.len());
        let mut declaration_index = HashMap::with_capacity(workflow.steps.len());
        for (index, step) in workflow.steps.iter().enumerate() {
            if by_id.insert(step.id.clone(), step.clone()).is_some() {
                return Err(ErrorInfo::new(
                    ErrorKind::WorkflowSchemaInvalid,
                    format!("duplicate step id `{}`", step.id),
                )
                .with_path(format!("steps[{index}].id")));
            }
            declaration_index.insert(step.id.clone(), index);
        }

        let mut children: HashMap<String, Vec<String>> =
            by_id.keys().map(|id| (id.clone(), Vec::new())).collect();
        let mut indegree: HashMap<String, usize> =
            by_id.keys().map(|id| (id.clone(), 0)).collect();

        for (index, step) in workflow.steps.iter().enumerate() {
            for parent in &step.parent_step_ids {
                let Some(kids) = children.get_mut(parent) else {
                    return Err(ErrorInfo::new(
                        ErrorKind::WorkflowBadParent,
                        format!(
                            "step `{}` declares parent `{parent}`, which does not exist",
                            step.id
                        ),
                    )
                    .with_path(format!("steps[{index}].parent_step_ids")));
                };
                kids.push(step.id.clone());
                *indegree.get_mut(&step.id).expect("step indexed above") += 1;
            }
        }

        let order = topological_order(&children, &indegree, &declaration_index)?;

        Ok(Self {
            by_id,
            children,
            indegree,
            order,
        })
    }

    /// Look up a step by id.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.by_id.get(id)
    }

    /// Children of `id` — steps that declare `id` as a parent.
    #[must_use]
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Initial indegree of `id` (count of parents it declares).
    #[must_use]
    pub fn indegree_of(&self, id: &str) -> usize {
        self.indegree.get(id).copied().unwrap_or(0)
    }

    /// The deterministic topological order: a linear extension of the
    /// parent-child relation, ties broken by declaration order.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Number of steps in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the graph has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Min-heap entry ordered by declaration index, ascending (so
/// `BinaryHeap`, a max-heap, is wrapped in `Reverse` at the call site).
#[derive(PartialEq, Eq)]
struct Ready {
    index: usize,
    id: String,
}

impl Ord for Ready {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse so BinaryHeap pops the smallest declaration index first.
        other.index.cmp(&self.index)
    }
}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn topological_order(
    children: &HashMap<String, Vec<String>>,
    indegree: &HashMap<String, usize>,
    declaration_index: &HashMap<String, usize>,
) -> Result<Vec<String>, ErrorInfo> {
    let mut remaining = indegree.clone();
    let mut heap: BinaryHeap<Ready> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| Ready {
            index: declaration_index[id],
            id: id.clone(),
        })
        .collect();

    let mut order = Vec::with_capacity(indegree.len());
    while let Some(Ready { id, .. }) = heap.pop() {
        order.push(id.clone());
        for child in children.get(&id).into_iter().flatten() {
            let count = remaining.get_mut(child).expect("child indexed in indegree");
            *count -= 1;
            if *count == 0 {
                heap.push(Ready {
                    index: declaration_index[child],
                    id: child.clone(),
                });
            }
        }
    }

    if order.len() < indegree.len() {
        return Err(ErrorInfo::new(
            ErrorKind::WorkflowCyclic,
            "dependency graph contains a cycle",
        ));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, parents: &[&str]) -> Step {
        let mut s = Step::new(id, "noop");
        s.parent_step_ids = parents.iter().map(|p| (*p).to_string()).collect();
        s
    }

    #[test]
    fn linear_chain_orders_by_dependency() {
        let wf = Workflow::new(
            "linear",
            vec![step("s1", &[]), step("s2", &["s1"]), step("s3", &["s2"])],
        );
        let graph = StepGraph::build(&wf).unwrap();
        assert_eq!(graph.order(), ["s1", "s2", "s3"]);
    }

    #[test]
    fn diamond_breaks_ties_by_declaration_order() {
        let wf = Workflow::new(
            "diamond",
            vec![
                step("start", &[]),
                step("a", &["start"]),
                step("b", &["start"]),
                step("merge", &["a", "b"]),
            ],
        );
        let graph = StepGraph::build(&wf).unwrap();
        assert_eq!(graph.order(), ["start", "a", "b", "merge"]);
    }

    #[test]
    fn unrelated_roots_keep_declaration_order() {
        let wf = Workflow::new("roots", vec![step("x", &[]), step("y", &[])]);
        let graph = StepGraph::build(&wf).unwrap();
        assert_eq!(graph.order(), ["x", "y"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let wf = Workflow::new(
            "cyclic",
            vec![step("a", &["b"]), step("b", &["a"])],
        );
        let err = StepGraph::build(&wf).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkflowCyclic);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let wf = Workflow::new("bad_parent", vec![step("a", &["ghost"])]);
        let err = StepGraph::build(&wf).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkflowBadParent);
    }

    #[test]
    fn duplicate_step_id_is_rejected() {
        let wf = Workflow::new("dup", vec![step("a", &[]), step("a", &[])]);
        let err = StepGraph::build(&wf).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkflowSchemaInvalid);
    }

    #[test]
    fn empty_workflow_builds_empty_graph() {
        let wf = Workflow::new("empty", vec![]);
        let graph = StepGraph::build(&wf).unwrap();
        assert!(graph.is_empty());
        assert!(graph.order().is_empty());
    }

    #[test]
    fn order_is_a_linear_extension_of_parent_child_relation() {
        let wf = Workflow::new(
            "fanout",
            vec![
                step("root", &[]),
                step("mid1", &["root"]),
                step("mid2", &["root"]),
                step("leaf", &["mid1", "mid2"]),
            ],
        );
        let graph = StepGraph::build(&wf).unwrap();
        let pos: HashMap<&str, usize> = graph
            .order()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for step in &wf.steps {
            for parent in &step.parent_step_ids {
                assert!(pos[parent.as_str()] < pos[step.id.as_str()]);
            }
        }
    }
}
