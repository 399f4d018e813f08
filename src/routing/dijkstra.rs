//! Dense Dijkstra over an adjacency list.
//!
//! Graphs here are a handful of waypoints, so the O(V²) linear scan for the
//! next vertex is used instead of a heap. The scan keeps tie-breaking
//! deterministic: among equal tentative distances the lowest index wins.

use crate::validation::error::{NavError, NavResult};
use log::trace;

/// Shortest-path tree rooted at one source
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTree {
    pub source: usize,
    /// Tentative distances; `f64::INFINITY` for unreachable nodes
    pub distances: Vec<f64>,
    /// Predecessor of each node on its shortest path, `None` for the source
    /// and for unreachable nodes
    pub predecessors: Vec<Option<usize>>,
}

impl SearchTree {
    /// True if `node` has a finite distance from the source
    pub fn is_reachable(&self, node: usize) -> bool {
        self.distances.get(node).is_some_and(|d| d.is_finite())
    }

    /// Node indices from the source to `target`, `None` if unreachable
    pub fn path_to(&self, target: usize) -> Option<Vec<usize>> {
        if !self.is_reachable(target) {
            return None;
        }
        let mut path = vec![target];
        let mut current = target;
        while current != self.source {
            current = self.predecessors[current]?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }
}

/// Result of a single-pair query
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    pub nodes: Vec<usize>,
    pub distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ShortestPathSolver;

impl ShortestPathSolver {
    pub fn new() -> Self {
        Self
    }

    /// Full shortest-path tree from `source`.
    ///
    /// `adjacency[u]` lists `(v, weight)` pairs. Weights must be finite and
    /// non-negative; zero is a valid weight.
    pub fn search(&self, adjacency: &[Vec<(usize, f64)>], source: usize) -> NavResult<SearchTree> {
        let n = adjacency.len();
        if source >= n {
            return Err(NavError::invalid(format!(
                "source node {} out of range for {} nodes",
                source, n
            )));
        }
        for (u, edges) in adjacency.iter().enumerate() {
            for &(v, w) in edges {
                if v >= n {
                    return Err(NavError::invalid(format!("edge {} -> {} leaves the graph", u, v)));
                }
                if !w.is_finite() || w < 0.0 {
                    return Err(NavError::invalid(format!("edge {} -> {} has weight {}", u, v, w)));
                }
            }
        }

        let mut distances = vec![f64::INFINITY; n];
        let mut predecessors: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        distances[source] = 0.0;

        for _ in 0..n {
            let mut next = None;
            let mut best = f64::INFINITY;
            for v in 0..n {
                if !visited[v] && distances[v] < best {
                    best = distances[v];
                    next = Some(v);
                }
            }
            let Some(u) = next else {
                break;
            };
            visited[u] = true;

            for &(v, w) in &adjacency[u] {
                if visited[v] {
                    continue;
                }
                let candidate = distances[u] + w;
                if candidate < distances[v] {
                    distances[v] = candidate;
                    predecessors[v] = Some(u);
                }
            }
        }

        Ok(SearchTree {
            source,
            distances,
            predecessors,
        })
    }

    /// Shortest path from `source` to `target`
    pub fn shortest_path(
        &self,
        adjacency: &[Vec<(usize, f64)>],
        source: usize,
        target: usize,
    ) -> NavResult<ShortestPath> {
        if target >= adjacency.len() {
            return Err(NavError::invalid(format!(
                "target node {} out of range for {} nodes",
                target,
                adjacency.len()
            )));
        }
        let tree = self.search(adjacency, source)?;
        let nodes = tree.path_to(target).ok_or_else(|| NavError::NoRouteFound {
            from: format!("node {}", source),
            to: format!("node {}", target),
        })?;
        trace!("shortest path {:?}, length {:.3}", nodes, tree.distances[target]);

        Ok(ShortestPath {
            nodes,
            distance: tree.distances[target],
        })
    }
}
