use crate::core::types::Point2;
use crate::validation::error::{NavError, NavResult};
use log::trace;

/// Test whether segment A–B meets segment C–D.
///
/// Each segment is turned into an implicit line `a·x + b·y = c` and the two
/// lines are intersected. Parallel (including collinear) segments report no
/// intersection. Otherwise the crossing point must fall inside both segments'
/// bounding boxes, with touching endpoints counted as a hit.
pub fn segments_intersect(a: Point2, b: Point2, c: Point2, d: Point2) -> bool {
    let a1 = b.y - a.y;
    let b1 = a.x - b.x;
    let c1 = a1 * a.x + b1 * a.y;

    let a2 = d.y - c.y;
    let b2 = c.x - d.x;
    let c2 = a2 * c.x + b2 * c.y;

    let det = a1 * b2 - a2 * b1;
    if det == 0.0 {
        return false;
    }

    let x = (b2 * c1 - b1 * c2) / det;
    let y = (a1 * c2 - a2 * c1) / det;

    within(x, a.x, b.x) && within(y, a.y, b.y) && within(x, c.x, d.x) && within(y, c.y, d.y)
}

fn within(v: f64, e1: f64, e2: f64) -> bool {
    e1.min(e2) <= v && v <= e1.max(e2)
}

/// Quadrilateral obstacle given by four vertices in boundary order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    vertices: [Point2; 4],
}

impl Obstacle {
    /// Quadrilateral from four ordered vertices
    pub fn new(vertices: [Point2; 4]) -> NavResult<Self> {
        if let Some(bad) = vertices.iter().find(|v| !v.is_finite()) {
            return Err(NavError::invalid(format!("obstacle vertex {} is not finite", bad)));
        }
        Ok(Self { vertices })
    }

    /// Axis-aligned rectangle from two opposite corners
    pub fn rectangle(min: Point2, max: Point2) -> NavResult<Self> {
        Self::new([
            Point2::new(min.x, min.y),
            Point2::new(max.x, min.y),
            Point2::new(max.x, max.y),
            Point2::new(min.x, max.y),
        ])
    }

    /// Vertices in boundary order
    pub fn vertices(&self) -> &[Point2; 4] {
        &self.vertices
    }

    /// The four boundary edges, closing back to the first vertex
    pub fn edges(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
        (0..4).map(move |k| (self.vertices[k], self.vertices[(k + 1) % 4]))
    }

    /// Whether segment `a`–`b` touches any edge
    pub fn blocks(&self, a: Point2, b: Point2) -> bool {
        self.edges().any(|(c, d)| segments_intersect(a, b, c, d))
    }
}

/// Immutable set of obstacles shared by every routing request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
}

impl ObstacleField {
    /// Field holding `obstacles`
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    /// Number of obstacles
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }

    /// True when the straight segment `a`–`b` crosses no obstacle edge.
    /// Stops at the first blocking edge.
    pub fn can_connect(&self, a: Point2, b: Point2) -> bool {
        match self.obstacles.iter().position(|o| o.blocks(a, b)) {
            Some(index) => {
                trace!("segment {} -> {} blocked by obstacle {}", a, b, index);
                false
            }
            None => true,
        }
    }
}
