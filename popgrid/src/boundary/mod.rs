//! Administrative district boundaries.
//!
//! The [`BoundaryRegistry`] loads one GeoJSON file per country, renames the
//! source properties onto the canonical `{region, district, district_id}`
//! schema and keeps the result read-only for the rest of the run.

mod geometry;
mod registry;
mod types;

pub use geometry::{MultiPolygon, Polygon, Ring};
pub use registry::{load_country_file, parse_geojson, BoundaryRegistry};
pub use types::{BoundaryError, BoundaryFields, DistrictBoundary, GeometryError};
