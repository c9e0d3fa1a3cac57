//! Delegation graph
//!
//! Tracks the directed "waiting on" relation between agents and detects
//! cycles in it. A delegation does not reserve resources; an unresolved
//! cycle is a deadlock precursor, so the manager refuses to grant new
//! units to agents sitting on one.
//!
//! # Determinism
//!
//! Adjacency is kept in `BTreeMap`s and neighbors are visited in sorted
//! order, so cycle paths come out the same for the same edge set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AgentId;

/// One directed delegation edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationInfo {
    pub from_agent: AgentId,
    pub to_agent: AgentId,

    /// Opaque description of the delegated task
    pub task_description: String,

    /// When the delegation was reported
    pub reported_at: DateTime<Utc>,

    /// Insertion order, used to pick the newest edge on a cycle
    pub(crate) seq: u64,
}

/// Outcome of `report_delegation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationResult {
    /// Whether the edge is now in the graph
    pub accepted: bool,

    /// Whether adding the edge would create (or created) a cycle
    pub cycle_detected: bool,

    /// The cycle in edge order, closed on its first agent
    /// (e.g. `[0, 1, 2, 0]`); empty when no cycle
    pub cycle_path: Vec<AgentId>,
}

/// Directed delegation graph keyed by `(from, to)`
///
/// No parallel edges: reporting an existing pair refreshes its task
/// description and timestamp. Self-loops are rejected by the manager
/// before reaching the graph.
#[derive(Debug, Clone, Default)]
pub struct DelegationGraph {
    edges: BTreeMap<(AgentId, AgentId), DelegationInfo>,
    next_seq: u64,
}

impl DelegationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges currently in the graph
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up one edge
    pub fn edge(&self, from: AgentId, to: AgentId) -> Option<&DelegationInfo> {
        self.edges.get(&(from, to))
    }

    /// All edges in key order
    pub fn edges(&self) -> impl Iterator<Item = &DelegationInfo> {
        self.edges.values()
    }

    /// Insert or refresh the edge `from -> to`
    pub fn insert_edge(&mut self, from: AgentId, to: AgentId, task_description: String) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.edges.insert(
            (from, to),
            DelegationInfo {
                from_agent: from,
                to_agent: to,
                task_description,
                reported_at: Utc::now(),
                seq,
            },
        );
    }

    /// Remove the edge `from -> to`, returning whether it existed
    pub fn remove_edge(&mut self, from: AgentId, to: AgentId) -> bool {
        self.edges.remove(&(from, to)).is_some()
    }

    /// Remove every edge touching `agent`, returning the removed pairs
    pub fn remove_agent(&mut self, agent: AgentId) -> Vec<(AgentId, AgentId)> {
        let removed: Vec<(AgentId, AgentId)> = self
            .edges
            .keys()
            .copied()
            .filter(|&(from, to)| from == agent || to == agent)
            .collect();
        for key in &removed {
            self.edges.remove(key);
        }
        removed
    }

    /// The cycle that adding `from -> to` would close, if any
    ///
    /// Searches for a path `to -> ... -> from` over the existing edges;
    /// the returned path is that chain closed on `to`, matching the
    /// direction the new edge would complete.
    pub fn would_create_cycle(&self, from: AgentId, to: AgentId) -> Option<Vec<AgentId>> {
        let path = self.find_path(to, from)?;
        let mut cycle = path;
        cycle.push(to);
        Some(cycle)
    }

    /// Any cycle currently in the graph, closed on its first agent
    pub fn find_cycle(&self) -> Option<Vec<AgentId>> {
        // An edge u -> v with a return path v -> ... -> u closes a cycle.
        // Edge-key order makes the answer deterministic.
        for &(from, to) in self.edges.keys() {
            if let Some(path) = self.find_path(to, from) {
                // path = [to, ..., from]; prepending `from` closes it
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(from);
                cycle.extend(path);
                return Some(cycle);
            }
        }
        None
    }

    /// Agents on at least one delegation cycle
    ///
    /// Tarjan's strongly-connected components; members of any SCC with
    /// two or more agents sit on a cycle. O(V+E).
    pub fn agents_on_cycles(&self) -> BTreeSet<AgentId> {
        let vertices: Vec<AgentId> = self
            .edges
            .keys()
            .flat_map(|&(from, to)| [from, to])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index_of: BTreeMap<AgentId, usize> = vertices
            .iter()
            .enumerate()
            .map(|(index, &agent)| (agent, index))
            .collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        for &(from, to) in self.edges.keys() {
            adjacency[index_of[&from]].push(index_of[&to]);
        }

        let mut state = TarjanState {
            index: 0,
            indices: vec![None; vertices.len()],
            lowlinks: vec![0; vertices.len()],
            on_stack: vec![false; vertices.len()],
            stack: Vec::new(),
            sccs: Vec::new(),
        };
        for vertex in 0..vertices.len() {
            if state.indices[vertex].is_none() {
                strongconnect(&adjacency, vertex, &mut state);
            }
        }

        state
            .sccs
            .into_iter()
            .filter(|scc| scc.len() >= 2)
            .flatten()
            .map(|index| vertices[index])
            .collect()
    }

    /// The edge with the highest insertion sequence among the cycle's
    /// consecutive pairs
    pub(crate) fn newest_edge_on_cycle(
        &self,
        cycle: &[AgentId],
    ) -> Option<(AgentId, AgentId)> {
        cycle
            .windows(2)
            .filter_map(|pair| {
                self.edges
                    .get(&(pair[0], pair[1]))
                    .map(|info| (info.seq, (pair[0], pair[1])))
            })
            .max_by_key(|&(seq, _)| seq)
            .map(|(_, key)| key)
    }

    /// Shortest-by-DFS path `start -> ... -> goal` over existing edges
    ///
    /// Iterative DFS over sorted neighbors; returns the vertex path
    /// including both endpoints, or `None` when unreachable.
    fn find_path(&self, start: AgentId, goal: AgentId) -> Option<Vec<AgentId>> {
        if start == goal {
            return Some(vec![start]);
        }

        let mut visited = BTreeSet::new();
        let mut parents: BTreeMap<AgentId, AgentId> = BTreeMap::new();
        let mut stack = vec![start];
        visited.insert(start);

        while let Some(current) = stack.pop() {
            let neighbors = self
                .edges
                .range((current, AgentId::MIN)..=(current, AgentId::MAX))
                .map(|(&(_, to), _)| to);
            for neighbor in neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                parents.insert(neighbor, current);
                if neighbor == goal {
                    let mut path = vec![goal];
                    let mut cursor = goal;
                    while let Some(&parent) = parents.get(&cursor) {
                        path.push(parent);
                        cursor = parent;
                    }
                    path.reverse();
                    return Some(path);
                }
                stack.push(neighbor);
            }
        }
        None
    }
}

struct TarjanState {
    index: usize,
    indices: Vec<Option<usize>>,
    lowlinks: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    sccs: Vec<Vec<usize>>,
}

fn strongconnect(adjacency: &[Vec<usize>], vertex: usize, state: &mut TarjanState) {
    state.indices[vertex] = Some(state.index);
    state.lowlinks[vertex] = state.index;
    state.index += 1;
    state.stack.push(vertex);
    state.on_stack[vertex] = true;

    for &next in &adjacency[vertex] {
        if state.indices[next].is_none() {
            strongconnect(adjacency, next, state);
            state.lowlinks[vertex] = state.lowlinks[vertex].min(state.lowlinks[next]);
        } else if state.on_stack[next] {
            state.lowlinks[vertex] = state.lowlinks[vertex].min(state.indices[next].unwrap());
        }
    }

    if Some(state.lowlinks[vertex]) == state.indices[vertex] {
        let mut scc = Vec::new();
        loop {
            let member = state.stack.pop().unwrap();
            state.on_stack[member] = false;
            scc.push(member);
            if member == vertex {
                break;
            }
        }
        state.sccs.push(scc);
    }
}
