use crate::core::types::Point2;
use crate::routing::obstacles::ObstacleField;
use crate::validation::error::{NavError, NavResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identity of a routing node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaypointId {
    Start,
    Crossing(u32),
    Destination,
}

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaypointId::Start => write!(f, "start"),
            WaypointId::Crossing(id) => write!(f, "crossing {}", id),
            WaypointId::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    pub position: Point2,
}

/// Fixed crossings laid out row-major on a grid with `columns` columns.
///
/// Two crossings are adjacent when they sit next to each other in the same
/// row or in the same column one row apart.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossingLayout {
    crossings: Vec<Waypoint>,
    columns: usize,
}

impl CrossingLayout {
    /// Crossings in row-major order, `columns` per row. Ids must be unique.
    pub fn new(crossings: Vec<(u32, Point2)>, columns: usize) -> NavResult<Self> {
        if columns == 0 {
            return Err(NavError::invalid("crossing layout needs at least one column"));
        }
        let mut seen = HashSet::with_capacity(crossings.len());
        for (id, position) in &crossings {
            if !seen.insert(*id) {
                return Err(NavError::invalid(format!("duplicate crossing id {}", id)));
            }
            if !position.is_finite() {
                return Err(NavError::invalid(format!("crossing {} has a non-finite position", id)));
            }
        }

        Ok(Self {
            crossings: crossings
                .into_iter()
                .map(|(id, position)| Waypoint {
                    id: WaypointId::Crossing(id),
                    position,
                })
                .collect(),
            columns,
        })
    }

    /// Number of crossings
    pub fn len(&self) -> usize {
        self.crossings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crossings.is_empty()
    }

    /// Crossings per grid row
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Crossings in configuration order
    pub fn crossings(&self) -> &[Waypoint] {
        &self.crossings
    }

    /// Grid adjacency between crossings at layout positions `i` and `j`
    pub fn are_adjacent(&self, i: usize, j: usize) -> bool {
        if i >= self.crossings.len() || j >= self.crossings.len() || i == j {
            return false;
        }
        let (row_i, col_i) = (i / self.columns, i % self.columns);
        let (row_j, col_j) = (j / self.columns, j % self.columns);
        (row_i == row_j && col_i.abs_diff(col_j) == 1) || (col_i == col_j && row_i.abs_diff(row_j) == 1)
    }
}

/// Undirected, weighted graph over start, the crossings and destination.
///
/// Node 0 is the start, nodes `1..=n` are the crossings in layout order and
/// node `n + 1` is the destination. An edge exists only when the straight
/// segment between its ends is unobstructed; its weight is the Euclidean
/// length, which may legitimately be zero.
#[derive(Debug, Clone)]
pub struct WaypointGraph {
    waypoints: Vec<Waypoint>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl WaypointGraph {
    pub const START: usize = 0;

    /// Build the graph for one request. Start is node 0 and the destination is the last node.
    pub fn build(start: Point2, destination: Point2, layout: &CrossingLayout, field: &ObstacleField) -> Self {
        let mut waypoints = Vec::with_capacity(layout.len() + 2);
        waypoints.push(Waypoint {
            id: WaypointId::Start,
            position: start,
        });
        waypoints.extend_from_slice(layout.crossings());
        waypoints.push(Waypoint {
            id: WaypointId::Destination,
            position: destination,
        });

        let mut graph = Self {
            adjacency: vec![Vec::new(); waypoints.len()],
            waypoints,
        };
        let destination_index = graph.destination_index();

        for i in 0..layout.len() {
            for j in (i + 1)..layout.len() {
                if layout.are_adjacent(i, j) {
                    graph.connect_if_visible(i + 1, j + 1, field);
                }
            }
        }

        graph.connect_if_visible(Self::START, destination_index, field);
        for crossing in 1..destination_index {
            graph.connect_if_visible(Self::START, crossing, field);
            graph.connect_if_visible(destination_index, crossing, field);
        }

        for neighbors in &mut graph.adjacency {
            neighbors.sort_by_key(|&(node, _)| node);
        }
        graph
    }

    fn connect_if_visible(&mut self, u: usize, v: usize, field: &ObstacleField) {
        let (a, b) = (self.waypoints[u].position, self.waypoints[v].position);
        if field.can_connect(a, b) {
            let weight = a.distance(&b);
            self.adjacency[u].push((v, weight));
            self.adjacency[v].push((u, weight));
        } else {
            debug!("no edge {} - {}: obstructed", self.waypoints[u].id, self.waypoints[v].id);
        }
    }

    /// Node count, crossings plus start and destination
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Index of the destination node
    pub fn destination_index(&self) -> usize {
        self.waypoints.len() - 1
    }

    /// Waypoint at node `index`
    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// All waypoints in node order
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Neighbours of `index` in ascending node order
    pub fn neighbors(&self, index: usize) -> &[(usize, f64)] {
        self.adjacency.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Weight of the edge `u`–`v`, `None` when there is no edge
    pub fn edge_weight(&self, u: usize, v: usize) -> Option<f64> {
        self.neighbors(u).iter().find(|&&(n, _)| n == v).map(|&(_, w)| w)
    }

    /// Per-node `(neighbour, weight)` lists
    pub fn adjacency(&self) -> &[Vec<(usize, f64)>] {
        &self.adjacency
    }
}
