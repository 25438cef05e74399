//! Polygon geometry for district masks.
//!
//! Rings are closed sequences of `(x, y)` vertices. Containment is inclusive:
//! a point on a polygon's outline, or on the outline of one of its holes,
//! counts as inside.

use super::types::GeometryError;
use crate::raster::{BoundingBox, Crs};

/// Relative tolerance for "point lies on an edge".
const EDGE_EPSILON: f64 = 1e-12;

type Point = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingPosition {
    Inside,
    OnBoundary,
    Outside,
}

/// A closed ring of vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring(Vec<Point>);

impl Ring {
    /// Build a ring, closing it if the last vertex differs from the first.
    pub fn new(mut points: Vec<Point>) -> Self {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if first != last {
                points.push(first);
            }
        }
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Signed shoelace area; positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        self.0
            .windows(2)
            .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
            .sum::<f64>()
            / 2.0
    }

    fn validate(&self) -> Result<(), GeometryError> {
        if self.0.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(GeometryError::NonFinite);
        }
        if self.0.len() < 4 {
            return Err(GeometryError::Degenerate(format!(
                "ring has {} vertices, need at least 3 distinct",
                self.0.len().saturating_sub(1)
            )));
        }
        if self.signed_area() == 0.0 {
            return Err(GeometryError::Degenerate("ring encloses no area".to_string()));
        }
        Ok(())
    }

    fn position(&self, x: f64, y: f64) -> RingPosition {
        let mut inside = false;
        for edge in self.0.windows(2) {
            let ((x1, y1), (x2, y2)) = (edge[0], edge[1]);
            if on_segment((x1, y1), (x2, y2), (x, y)) {
                return RingPosition::OnBoundary;
            }
            if (y1 > y) != (y2 > y) {
                let crossing = x1 + (y - y1) * (x2 - x1) / (y2 - y1);
                if x < crossing {
                    inside = !inside;
                }
            }
        }
        if inside {
            RingPosition::Inside
        } else {
            RingPosition::Outside
        }
    }

    fn reproject(&self, from: Crs, to: Crs) -> Result<Ring, GeometryError> {
        self.0
            .iter()
            .map(|&(x, y)| from.transform_point(to, x, y))
            .collect::<Result<Vec<_>, _>>()
            .map(Ring)
    }
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let cross = dx * (p.1 - a.1) - dy * (p.0 - a.0);
    let scale = dx.abs().max(dy.abs()).max(f64::MIN_POSITIVE);
    if cross.abs() > EDGE_EPSILON * scale * scale.max(1.0) {
        return false;
    }
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

/// A polygon with an exterior ring and zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self { exterior, holes }
    }

    /// Axis-aligned rectangle, handy for tests and synthetic districts.
    pub fn rectangle(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self::new(
            Ring::new(vec![(left, bottom), (right, bottom), (right, top), (left, top)]),
            Vec::new(),
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self.exterior.position(x, y) {
            RingPosition::Outside => false,
            RingPosition::OnBoundary => true,
            RingPosition::Inside => !self
                .holes
                .iter()
                .any(|hole| hole.position(x, y) == RingPosition::Inside),
        }
    }

    fn validate(&self) -> Result<(), GeometryError> {
        self.exterior.validate()?;
        self.holes.iter().try_for_each(Ring::validate)
    }
}

/// One or more polygons forming a district.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPolygon(pub Vec<Polygon>);

impl MultiPolygon {
    pub fn polygons(&self) -> &[Polygon] {
        &self.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.0.iter().any(|polygon| polygon.contains(x, y))
    }

    /// Bounding box of every exterior ring.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(
            self.0
                .iter()
                .flat_map(|polygon| polygon.exterior.points().iter().copied()),
        )
    }

    /// Check every ring is finite and encloses area.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.0.is_empty() {
            return Err(GeometryError::Degenerate("no polygons".to_string()));
        }
        self.0.iter().try_for_each(Polygon::validate)
    }

    pub fn reproject(&self, from: Crs, to: Crs) -> Result<MultiPolygon, GeometryError> {
        if from == to {
            return Ok(self.clone());
        }
        self.0
            .iter()
            .map(|polygon| {
                Ok(Polygon {
                    exterior: polygon.exterior.reproject(from, to)?,
                    holes: polygon
                        .holes
                        .iter()
                        .map(|hole| hole.reproject(from, to))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, GeometryError>>()
            .map(MultiPolygon)
    }
}

impl From<Polygon> for MultiPolygon {
    fn from(polygon: Polygon) -> Self {
        MultiPolygon(vec![polygon])
    }
}
