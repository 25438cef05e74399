//! Coordinate reference systems.
//!
//! Only EPSG codes are modeled. Reprojection is supported between WGS 84
//! (EPSG:4326) and spherical Web Mercator (EPSG:3857); every other pair is
//! reported as unsupported.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::boundary::GeometryError;

/// WGS 84 semi-major axis used by spherical Web Mercator (meters).
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the Web Mercator square.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_6;

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(u32);

impl Crs {
    pub const WGS84: Crs = Crs(4326);
    pub const WEB_MERCATOR: Crs = Crs(3857);

    pub fn from_epsg(code: u32) -> Self {
        match code {
            // Legacy aliases of spherical Web Mercator
            900913 | 3785 | 102100 | 102113 => Self::WEB_MERCATOR,
            other => Self(other),
        }
    }

    pub fn epsg(self) -> u32 {
        self.0
    }

    /// Parse `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`, `urn:ogc:def:crs:OGC:1.3:CRS84`
    /// or a bare code.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let upper = text.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Some(Self::WGS84);
        }
        let code = upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.rsplit_once("EPSG::").map(|(_, code)| code))
            .or_else(|| upper.rsplit_once("EPSG:").map(|(_, code)| code))
            .unwrap_or(&upper);
        code.trim().parse().ok().map(Self::from_epsg)
    }

    /// Transform a single point from `self` into `target`.
    pub fn transform_point(self, target: Crs, x: f64, y: f64) -> Result<(f64, f64), GeometryError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        match (self, target) {
            (from, to) if from == to => Ok((x, y)),
            (Crs::WGS84, Crs::WEB_MERCATOR) => Ok(lonlat_to_mercator(x, y)),
            (Crs::WEB_MERCATOR, Crs::WGS84) => Ok(mercator_to_lonlat(x, y)),
            (from, to) => Err(GeometryError::UnsupportedReprojection { from, to }),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unrecognized coordinate reference '{}'", s))
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}
