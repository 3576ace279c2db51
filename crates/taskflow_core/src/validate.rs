//! Local checks run before a command is applied: date containment between a
//! parent and its child, and acyclicity of the dependency graph.
//!
//! Both operate on the in-memory view only. Races with concurrent server-side
//! changes surface later, during reconciliation.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TaskError};
use crate::ids::TaskId;
use crate::task::{DateRange, DependencyEdge, Task};

/// Fails with [`TaskError::DateRangeConflict`] unless `child` fits inside `parent`'s range.
pub fn check_date_containment(parent: &Task, child: &DateRange) -> Result<()> {
    if parent.dates.contains(child) {
        return Ok(());
    }
    Err(TaskError::DateRangeConflict {
        child: *child,
        parent: parent.dates,
        parent_title: parent.title.clone(),
        suggested: child.clamp_to(&parent.dates),
    })
}

/// Dependency edges plus a precedence adjacency index.
///
/// `blocks(A, B)` orders A before B; `depends_on(A, B)` orders B before A.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: Vec<DependencyEdge>,
    successors: HashMap<TaskId, Vec<TaskId>>,
}

impl DependencyGraph {
    /// Loads edges as-is. Stored data is trusted here; new edges go through [`Self::check_insert`].
    pub fn from_edges(edges: Vec<DependencyEdge>) -> Self {
        let mut graph = Self::default();
        for edge in edges {
            graph.insert_unchecked(edge);
        }
        graph
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, edge: &DependencyEdge) -> bool {
        self.edges.contains(edge)
    }

    /// Edges where `id` is the source or the target.
    pub fn edges_of<'a>(&'a self, id: &'a TaskId) -> impl Iterator<Item = &'a DependencyEdge> + 'a {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// Validates a new edge: no self-edges, no duplicates, no cycles.
    pub fn check_insert(&self, edge: &DependencyEdge) -> Result<()> {
        if edge.from_task_id == edge.to_task_id {
            return Err(TaskError::CycleDetected {
                path: vec![edge.from_task_id.clone(), edge.to_task_id.clone()],
            });
        }
        if self.contains(edge) {
            return Err(TaskError::validation(format!(
                "dependency {} -> {} already exists",
                edge.from_task_id, edge.to_task_id
            )));
        }
        let (before, after) = edge.precedence();
        if let Some(mut path) = self.path(after, before) {
            path.push(after.clone());
            return Err(TaskError::CycleDetected { path });
        }
        Ok(())
    }

    /// Depth-first reachability, O(V + E). Returns the path `from ..= to` if one exists.
    pub fn path(&self, from: &TaskId, to: &TaskId) -> Option<Vec<TaskId>> {
        let mut visited: HashSet<&TaskId> = HashSet::new();
        let mut parents: HashMap<&TaskId, &TaskId> = HashMap::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                let mut path = vec![current.clone()];
                let mut cursor = current;
                while let Some(prev) = parents.get(cursor) {
                    path.push((*prev).clone());
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            if !visited.insert(current) {
                continue;
            }
            for next in self.successors.get(current).into_iter().flatten() {
                if !visited.contains(next) {
                    parents.entry(next).or_insert(current);
                    stack.push(next);
                }
            }
        }
        None
    }

    pub fn insert(&mut self, edge: DependencyEdge) -> Result<()> {
        self.check_insert(&edge)?;
        self.insert_unchecked(edge);
        Ok(())
    }

    fn insert_unchecked(&mut self, edge: DependencyEdge) {
        let (before, after) = edge.precedence();
        self.successors
            .entry(before.clone())
            .or_default()
            .push(after.clone());
        self.edges.push(edge);
    }

    pub fn remove(&mut self, edge: &DependencyEdge) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e != edge);
        let removed = self.edges.len() != before;
        if removed {
            self.reindex();
        }
        removed
    }

    /// Drops every edge touching one of `ids`.
    pub fn remove_tasks(&mut self, ids: &HashSet<TaskId>) -> usize {
        let before = self.edges.len();
        self.edges
            .retain(|e| !ids.contains(&e.from_task_id) && !ids.contains(&e.to_task_id));
        let removed = before - self.edges.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    fn reindex(&mut self) {
        let edges = std::mem::take(&mut self.edges);
        self.successors.clear();
        for edge in edges {
            self.insert_unchecked(edge);
        }
    }
}
