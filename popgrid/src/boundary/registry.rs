//! Boundary registry: loads district polygons per country from GeoJSON.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use super::geometry::{MultiPolygon, Polygon, Ring};
use super::types::{BoundaryError, BoundaryFields, DistrictBoundary, GeometryError};
use crate::demography::CountryCode;
use crate::raster::Crs;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    crs: Option<NamedCrs>,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct NamedCrs {
    properties: NamedCrsProperties,
}

#[derive(Debug, Deserialize)]
struct NamedCrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<FeatureGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum FeatureGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

/// District boundaries for every loaded country.
///
/// Built once and never mutated afterwards; boundary sets are handed out as
/// shared slices so aggregation workers can read them concurrently.
#[derive(Debug, Default)]
pub struct BoundaryRegistry {
    sets: BTreeMap<CountryCode, Arc<[DistrictBoundary]>>,
}

impl BoundaryRegistry {
    /// Load each country's boundary file.
    ///
    /// A country whose file fails to load is logged and left out; the
    /// remaining countries still load.
    pub fn load(files: &[(CountryCode, PathBuf)], fields: &BoundaryFields) -> Self {
        let mut sets = BTreeMap::new();

        for (country, path) in files {
            match load_country_file(path, fields) {
                Ok(districts) => {
                    info!(
                        country = %country,
                        districts = districts.len(),
                        "Loaded admin boundaries for {}: {} districts",
                        country,
                        districts.len()
                    );
                    sets.insert(country.clone(), Arc::from(districts));
                }
                Err(e) => {
                    error!(country = %country, path = %path.display(), error = %e, "Failed to load admin boundaries");
                }
            }
        }

        Self { sets }
    }

    /// Build a registry from boundary sets already in memory.
    pub fn from_sets(sets: impl IntoIterator<Item = (CountryCode, Vec<DistrictBoundary>)>) -> Self {
        Self {
            sets: sets
                .into_iter()
                .map(|(country, districts)| (country, Arc::from(districts)))
                .collect(),
        }
    }

    /// Districts for `country` in file order, or an empty slice.
    pub fn boundaries_for(&self, country: &CountryCode) -> &[DistrictBoundary] {
        self.sets.get(country).map(|set| &set[..]).unwrap_or(&[])
    }

    /// Shared handle to a country's districts.
    pub fn shared(&self, country: &CountryCode) -> Option<Arc<[DistrictBoundary]>> {
        self.sets.get(country).cloned()
    }

    pub fn contains(&self, country: &CountryCode) -> bool {
        self.sets.contains_key(country)
    }

    pub fn countries(&self) -> impl Iterator<Item = &CountryCode> {
        self.sets.keys()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Read and normalize one GeoJSON boundary file.
pub fn load_country_file(
    path: &Path,
    fields: &BoundaryFields,
) -> Result<Vec<DistrictBoundary>, BoundaryError> {
    let text = fs::read_to_string(path).map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let collection: FeatureCollection =
        serde_json::from_str(&text).map_err(|source| BoundaryError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let districts = normalize(collection, fields)?;
    if districts.is_empty() {
        return Err(BoundaryError::NoFeatures {
            path: path.to_path_buf(),
        });
    }
    Ok(districts)
}

/// Parse GeoJSON text into canonical districts.
pub fn parse_geojson(
    text: &str,
    fields: &BoundaryFields,
) -> Result<Vec<DistrictBoundary>, BoundaryError> {
    let collection: FeatureCollection =
        serde_json::from_str(text).map_err(|source| BoundaryError::Json {
            path: PathBuf::from("<memory>"),
            source,
        })?;
    normalize(collection, fields)
}

fn normalize(
    collection: FeatureCollection,
    fields: &BoundaryFields,
) -> Result<Vec<DistrictBoundary>, BoundaryError> {
    let crs = match collection.crs {
        Some(named) => Crs::parse(&named.properties.name)
            .ok_or(BoundaryError::UnsupportedCrs(named.properties.name))?,
        None => Crs::WGS84,
    };

    let mut seen = HashSet::new();
    let mut districts = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();

        let Some(district_id) = property_text(&properties, &fields.district_id) else {
            warn!(feature = index, field = %fields.district_id, "Skipping feature without identifier");
            continue;
        };

        let geometry = match feature.geometry.map(to_multipolygon) {
            Some(Ok(geometry)) => geometry,
            Some(Err(e)) => {
                warn!(district_id = %district_id, error = %e, "Skipping feature with unusable geometry");
                continue;
            }
            None => {
                warn!(district_id = %district_id, "Skipping feature without geometry");
                continue;
            }
        };

        if !seen.insert(district_id.clone()) {
            warn!(district_id = %district_id, "Duplicate district identifier, keeping first");
            continue;
        }

        let district = property_text(&properties, &fields.district).unwrap_or_else(|| district_id.clone());
        let region = property_text(&properties, &fields.region).unwrap_or_default();

        districts.push(DistrictBoundary {
            district_id,
            district,
            region,
            geometry,
            crs,
        });
    }

    Ok(districts)
}

fn property_text(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_multipolygon(geometry: FeatureGeometry) -> Result<MultiPolygon, GeometryError> {
    match geometry {
        FeatureGeometry::Polygon { coordinates } => Ok(MultiPolygon(vec![to_polygon(coordinates)?])),
        FeatureGeometry::MultiPolygon { coordinates } => coordinates
            .into_iter()
            .map(to_polygon)
            .collect::<Result<Vec<_>, _>>()
            .map(MultiPolygon),
        FeatureGeometry::Unsupported => Err(GeometryError::Degenerate(
            "geometry type is not Polygon or MultiPolygon".to_string(),
        )),
    }
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon, GeometryError> {
    let mut rings = rings.into_iter().map(to_ring);
    let exterior = rings
        .next()
        .ok_or_else(|| GeometryError::Degenerate("polygon has no rings".to_string()))??;
    let holes = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, holes))
}

fn to_ring(positions: Vec<Vec<f64>>) -> Result<Ring, GeometryError> {
    positions
        .into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => Err(GeometryError::Degenerate("position has fewer than two coordinates".to_string())),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Ring::new)
}
