//! Co-run cycle detection.
//!
//! Tasks may name a `CoRunGroup` of other tasks that must run together.
//! The groups form a directed graph `task → group members`; a cycle in
//! that graph is reported as a circular dependency.
//!
//! # Algorithm
//! Depth-first search with an explicit frame stack. The traversal keeps
//! the set of visited nodes plus the current path; reaching a node that
//! is still on the path closes a cycle. Each search starts from a fresh
//! visited set, so every start node is judged independently.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.3 (Depth-first search)

use std::collections::{HashMap, HashSet};

/// Adjacency of co-run groups, keeping the order tasks were added.
#[derive(Debug, Clone, Default)]
pub struct CoRunGraph {
    order: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl CoRunGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the co-run group of `task`, replacing any earlier group.
    pub fn insert(&mut self, task: impl Into<String>, group: Vec<String>) {
        let task = task.into();
        if !self.edges.contains_key(&task) {
            self.order.push(task.clone());
        }
        self.edges.insert(task, group);
    }

    /// Adjacency map.
    pub fn edges(&self) -> &HashMap<String, Vec<String>> {
        &self.edges
    }

    /// Tasks with a recorded group, in insertion order.
    pub fn starts(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of tasks with a recorded group.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no groups are recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the first cycle reachable from `start`, if any.
    pub fn find_cycle(&self, start: &str) -> Option<Vec<String>> {
        find_cycle(&self.edges, start)
    }
}

/// Search state threaded through the walk.
#[derive(Default)]
struct Traversal<'a> {
    visited: HashSet<&'a str>,
    path: Vec<&'a str>,
    on_path: HashSet<&'a str>,
}

impl<'a> Traversal<'a> {
    fn enter(&mut self, node: &'a str) {
        self.visited.insert(node);
        self.path.push(node);
        self.on_path.insert(node);
    }

    fn leave(&mut self) {
        if let Some(node) = self.path.pop() {
            self.on_path.remove(node);
        }
    }

    /// The path from `node` to the top of the stack, closed back on `node`.
    fn cycle_through(&self, node: &str) -> Vec<String> {
        let from = self.path.iter().position(|n| *n == node).unwrap_or(0);
        let mut cycle: Vec<String> = self.path[from..].iter().map(|n| n.to_string()).collect();
        cycle.push(node.to_string());
        cycle
    }
}

/// Whether a cycle is reachable from `start`.
pub fn has_cycle(adjacency: &HashMap<String, Vec<String>>, start: &str) -> bool {
    find_cycle(adjacency, start).is_some()
}

/// Returns the first cycle reachable from `start`, as a path that begins
/// and ends on the same task.
///
/// Nodes without an adjacency entry are leaves. A task that lists itself
/// is a cycle of length one.
pub fn find_cycle<'a>(
    adjacency: &'a HashMap<String, Vec<String>>,
    start: &'a str,
) -> Option<Vec<String>> {
    let mut state = Traversal::default();
    walk(adjacency, start, &mut state)
}

fn walk<'a>(
    adjacency: &'a HashMap<String, Vec<String>>,
    start: &'a str,
    state: &mut Traversal<'a>,
) -> Option<Vec<String>> {
    // Each frame is (node, index of the next neighbour to try).
    let mut frames: Vec<(&'a str, usize)> = vec![(start, 0)];
    state.enter(start);

    while let Some(&(node, next)) = frames.last() {
        let neighbour = adjacency
            .get(node)
            .and_then(|group| group.get(next))
            .map(String::as_str);

        let Some(neighbour) = neighbour else {
            frames.pop();
            state.leave();
            continue;
        };
        if let Some(top) = frames.last_mut() {
            top.1 += 1;
        }

        if state.on_path.contains(neighbour) {
            return Some(state.cycle_through(neighbour));
        }
        if !state.visited.contains(neighbour) {
            state.enter(neighbour);
            frames.push((neighbour, 0));
        }
    }

    None
}
