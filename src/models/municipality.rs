// SPDX-License-Identifier: MIT

//! Municipality model and geometry handling.

use chrono::{DateTime, Utc};
use geo::{BoundingRect, Contains, MultiPolygon, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// A municipality with its boundary geometry.
#[derive(Debug, Clone)]
pub struct Municipality {
    /// Municipality name (e.g., "Oldambt")
    pub name: String,
    /// Boundary geometry (can be Polygon or MultiPolygon)
    pub geometry: MunicipalityGeometry,
    /// Cached bounding rectangle of the geometry
    pub bounds: Option<Rect<f64>>,
}

/// Municipality geometry - either a simple polygon or multi-polygon.
#[derive(Debug, Clone)]
pub enum MunicipalityGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl MunicipalityGeometry {
    /// Check if a point falls inside this geometry.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        match self {
            MunicipalityGeometry::Polygon(p) => p.contains(point),
            MunicipalityGeometry::MultiPolygon(mp) => mp.contains(point),
        }
    }

    /// Bounding rectangle of the geometry, if it is non-degenerate.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            MunicipalityGeometry::Polygon(p) => p.bounding_rect(),
            MunicipalityGeometry::MultiPolygon(mp) => mp.bounding_rect(),
        }
    }
}

impl Municipality {
    pub fn new(name: String, geometry: MunicipalityGeometry) -> Self {
        let bounds = geometry.bounding_rect();
        Self {
            name,
            geometry,
            bounds,
        }
    }

    /// Check if a point falls inside this municipality, using the cached
    /// bounding rect as a cheap pre-filter.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        if let Some(bounds) = &self.bounds {
            if !bounds.contains(point) {
                return false;
            }
        }
        self.geometry.contains(point)
    }
}

/// A recorded visit of a user to a municipality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MunicipalityVisit {
    pub id: i64,
    pub user_id: i64,
    pub municipality: String,
    /// The session whose route first touched this municipality
    pub session_id: i64,
    pub visited_on: DateTime<Utc>,
}
