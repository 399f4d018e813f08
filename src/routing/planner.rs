use crate::core::types::Point2;
use crate::routing::dijkstra::ShortestPathSolver;
use crate::routing::graph::{CrossingLayout, Waypoint, WaypointGraph, WaypointId};
use crate::routing::obstacles::ObstacleField;
use crate::validation::error::{NavError, NavResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Start and destination of a routing request. A request without a
/// destination is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: Point2,
    pub destination: Option<Point2>,
}

/// Ordered waypoints from start to destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub waypoints: Vec<Waypoint>,
    /// Sum of the edge lengths along the route
    pub length: f64,
}

impl Route {
    /// Waypoint coordinates in travel order
    pub fn points(&self) -> Vec<Point2> {
        self.waypoints.iter().map(|w| w.position).collect()
    }
}

/// Plans obstacle-free routes through the fixed crossings.
///
/// The obstacle field and the crossing layout are shared read-only; a new
/// graph is built for every request.
#[derive(Debug, Clone)]
pub struct RoutePlanner {
    field: Arc<ObstacleField>,
    layout: Arc<CrossingLayout>,
    solver: ShortestPathSolver,
}

impl RoutePlanner {
    /// Planner over a shared obstacle field and crossing layout
    pub fn new(field: Arc<ObstacleField>, layout: Arc<CrossingLayout>) -> Self {
        Self {
            field,
            layout,
            solver: ShortestPathSolver::new(),
        }
    }

    /// Current obstacle field
    pub fn field(&self) -> &Arc<ObstacleField> {
        &self.field
    }

    /// Current crossing layout
    pub fn layout(&self) -> &Arc<CrossingLayout> {
        &self.layout
    }

    /// Shortest obstacle-free route from `start` to `destination` through the crossings
    pub fn plan(&self, start: Point2, destination: Point2) -> NavResult<Route> {
        if !start.is_finite() {
            return Err(NavError::invalid(format!("start {} is not finite", start)));
        }
        if !destination.is_finite() {
            return Err(NavError::invalid(format!("destination {} is not finite", destination)));
        }

        let graph = WaypointGraph::build(start, destination, &self.layout, &self.field);
        let target = graph.destination_index();
        let path = self
            .solver
            .shortest_path(graph.adjacency(), WaypointGraph::START, target)
            .map_err(|e| match e {
                NavError::NoRouteFound { .. } => NavError::NoRouteFound {
                    from: format!("{} {}", WaypointId::Start, start),
                    to: format!("{} {}", WaypointId::Destination, destination),
                },
                other => other,
            })?;

        let waypoints: Vec<Waypoint> = path
            .nodes
            .iter()
            .filter_map(|&i| graph.waypoint(i).copied())
            .collect();
        debug!(
            "route {} -> {}: {} waypoints, length {:.3}",
            start,
            destination,
            waypoints.len(),
            path.distance
        );

        Ok(Route {
            waypoints,
            length: path.distance,
        })
    }

    /// Validate `request` and plan it
    pub fn plan_request(&self, request: &RouteRequest) -> NavResult<Route> {
        let destination = request
            .destination
            .ok_or_else(|| NavError::invalid("route request has no destination"))?;
        self.plan(request.start, destination)
    }
}
