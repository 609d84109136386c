// SPDX-License-Identifier: MIT

//! Municipality boundary loading and point lookup service.

use geo::{Contains, MultiPolygon, Point, Polygon, Rect};
use geojson::GeoJson;
use std::fs;
use std::path::Path;

use crate::models::municipality::{Municipality, MunicipalityGeometry};

/// Service for loading municipality boundaries and locating route points.
#[derive(Default, Clone)]
pub struct RegionService {
    municipalities: Vec<Municipality>,
    /// Bounding rectangle of all municipalities together
    total_bounds: Option<Rect<f64>>,
}

impl RegionService {
    /// Load municipalities from a GeoJSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegionError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| RegionError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load municipalities from a GeoJSON string.
    pub fn load_from_json(json_data: &str) -> Result<Self, RegionError> {
        let geojson: GeoJson = json_data
            .parse()
            .map_err(|e: geojson::Error| RegionError::ParseError(e.to_string()))?;

        let mut municipalities = Vec::new();

        if let GeoJson::FeatureCollection(collection) = geojson {
            for feature in collection.features {
                // Water bodies carry the same boundary format but are not
                // municipalities anyone trains in
                let is_water = feature
                    .property("water")
                    .and_then(|v| v.as_str())
                    .map(|v| v.eq_ignore_ascii_case("ja"))
                    .unwrap_or(false);
                if is_water {
                    continue;
                }

                let name = feature
                    .property("statnaam")
                    .or_else(|| feature.property("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string();

                if let Some(geom) = feature.geometry {
                    let geometry = Self::convert_geometry(geom.value)?;
                    municipalities.push(Municipality::new(name, geometry));
                }
            }
        }

        let total_bounds = Self::combined_bounds(&municipalities);

        tracing::info!(count = municipalities.len(), "Loaded municipalities");
        Ok(Self {
            municipalities,
            total_bounds,
        })
    }

    /// Convert GeoJSON geometry to our internal format.
    fn convert_geometry(value: geojson::Value) -> Result<MunicipalityGeometry, RegionError> {
        use std::convert::TryInto;

        let poly_result: Result<Polygon<f64>, _> = value.clone().try_into();
        if let Ok(poly) = poly_result {
            return Ok(MunicipalityGeometry::Polygon(poly));
        }

        let multi_result: Result<MultiPolygon<f64>, _> = value.try_into();
        if let Ok(multi) = multi_result {
            return Ok(MunicipalityGeometry::MultiPolygon(multi));
        }

        Err(RegionError::UnsupportedGeometry)
    }

    fn combined_bounds(municipalities: &[Municipality]) -> Option<Rect<f64>> {
        let mut iter = municipalities.iter().filter_map(|m| m.bounds);
        let first = iter.next()?;
        Some(iter.fold(first, |acc, rect| {
            let min_x = acc.min().x.min(rect.min().x);
            let min_y = acc.min().y.min(rect.min().y);
            let max_x = acc.max().x.max(rect.max().x);
            let max_y = acc.max().y.max(rect.max().y);
            Rect::new((min_x, min_y), (max_x, max_y))
        }))
    }

    /// Get the list of municipalities.
    pub fn municipalities(&self) -> &[Municipality] {
        &self.municipalities
    }

    /// Names of all known municipalities.
    pub fn names(&self) -> Vec<String> {
        self.municipalities.iter().map(|m| m.name.clone()).collect()
    }

    /// Find the municipality containing a point.
    ///
    /// Consecutive route points usually fall in the same municipality, so
    /// the caller passes the previous hit and we check that one before
    /// scanning the full list.
    pub fn find_municipality(&self, point: &Point<f64>, previous: Option<&str>) -> Option<&str> {
        if let Some(bounds) = &self.total_bounds {
            if !bounds.contains(point) {
                return None;
            }
        }

        if let Some(prev_name) = previous {
            if let Some(prev) = self.municipalities.iter().find(|m| m.name == prev_name) {
                if prev.contains(point) {
                    return Some(prev.name.as_str());
                }
            }
        }

        self.municipalities
            .iter()
            .find(|m| m.contains(point))
            .map(|m| m.name.as_str())
    }

    /// Municipalities touched by a route, in first-seen order without
    /// duplicates. Decoded coordinates are x = longitude, y = latitude,
    /// matching the GeoJSON boundaries.
    pub fn municipalities_for_line(&self, line: &geo::LineString<f64>) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut previous: Option<String> = None;

        for coord in line.coords() {
            let point = Point::new(coord.x, coord.y);
            if let Some(name) = self.find_municipality(&point, previous.as_deref()) {
                if !seen.iter().any(|s| s == name) {
                    seen.push(name.to_string());
                }
                previous = Some(name.to_string());
            }
        }

        seen
    }

    /// Municipalities for an encoded polyline (Strava format, precision 5).
    pub fn municipalities_for_polyline(&self, encoded: &str) -> Result<Vec<String>, RegionError> {
        let line = polyline::decode_polyline(encoded, 5)
            .map_err(|e| RegionError::PolylineError(e.to_string()))?;
        Ok(self.municipalities_for_line(&line))
    }

    /// Bounding rectangle of all loaded boundaries.
    pub fn total_bounds(&self) -> Option<Rect<f64>> {
        self.total_bounds
    }
}

/// Errors from municipality boundary operations.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse GeoJSON: {0}")]
    ParseError(String),

    #[error("Unsupported geometry type (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry,

    #[error("Failed to decode polyline: {0}")]
    PolylineError(String),
}
