//! Obstacle-aware routing through fixed crossings

pub mod dijkstra;
pub mod graph;
pub mod obstacles;
pub mod planner;

pub use dijkstra::{SearchTree, ShortestPath, ShortestPathSolver};
pub use graph::{CrossingLayout, Waypoint, WaypointGraph, WaypointId};
pub use obstacles::{segments_intersect, Obstacle, ObstacleField};
pub use planner::{Route, RoutePlanner, RouteRequest};
