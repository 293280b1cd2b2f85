//! Vector data: outlet points in, polylines out

use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};

/// A user-specified point from which upstream analysis starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub x: f64,
    pub y: f64,
    /// External identifier; sequential ids are assigned when absent
    #[serde(default)]
    pub id: Option<i32>,
}

impl Outlet {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, id: None }
    }

    pub fn with_id(x: f64, y: f64, id: i32) -> Self {
        Self { x, y, id: Some(id) }
    }
}

/// One polyline: a stream segment or a longest flow path.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Vertices in real-world coordinates, in flow order
    pub geometry: LineString<f64>,
    /// Optional integer id written as an attribute
    pub id: Option<i32>,
}

impl Line {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self {
            geometry: LineString::from(points),
            id: None,
        }
    }

    pub fn with_id(mut self, id: Option<i32>) -> Self {
        self.id = id;
        self
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.geometry.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    pub fn first(&self) -> Option<Coord<f64>> {
        self.geometry.0.first().copied()
    }

    pub fn last(&self) -> Option<Coord<f64>> {
        self.geometry.0.last().copied()
    }

    /// Planar length along the vertices
    pub fn length(&self) -> f64 {
        self.geometry
            .0
            .windows(2)
            .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
            .sum()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.geometry.0.iter().map(|c| (c.x, c.y))
    }
}

/// Collection of output lines
#[derive(Debug, Clone, Default)]
pub struct LineCollection {
    pub lines: Vec<Line>,
}

impl LineCollection {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter()
    }
}

impl From<Vec<Line>> for LineCollection {
    fn from(lines: Vec<Line>) -> Self {
        Self { lines }
    }
}

impl IntoIterator for LineCollection {
    type Item = Line;
    type IntoIter = std::vec::IntoIter<Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}
