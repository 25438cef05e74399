//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use popgrid::demography::{AgeBand, CountryCode, Sex, UnitKey};
use popgrid::raster::resolve_url;
use popgrid::source::{RasterSource, SourceError};
use serde_json::json;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const BASE_URL: &str = "https://rasters.example.org/constrained";

pub fn country(code: &str) -> CountryCode {
    CountryCode::new(code).unwrap()
}

pub fn unit(code: &str, sex: Sex, band: &str) -> UnitKey {
    UnitKey::new(country(code), sex, AgeBand::from_raw(band))
}

pub fn url_for(unit: &UnitKey) -> String {
    resolve_url(BASE_URL, unit)
}

/// Raster source serving canned payloads by URL.
///
/// Unknown URLs answer 404; URLs registered with `fail` answer the given status.
#[derive(Default)]
pub struct ScriptedSource {
    bodies: HashMap<String, Vec<u8>>,
    failures: HashMap<String, u16>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn serve(mut self, unit: &UnitKey, body: Vec<u8>) -> Self {
        self.bodies.insert(url_for(unit), body);
        self
    }

    pub fn fail(mut self, unit: &UnitKey, status: u16) -> Self {
        self.failures.insert(url_for(unit), status);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RasterSource for ScriptedSource {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.failures.get(url) {
            return Err(SourceError::Status {
                status: *status,
                url: url.to_string(),
            });
        }
        let body = self.bodies.get(url).ok_or_else(|| SourceError::Status {
            status: 404,
            url: url.to_string(),
        })?;
        sink.write_all(body)?;
        Ok(body.len() as u64)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Encode a single-band float GeoTIFF in EPSG:4326.
///
/// `origin` is the top-left corner; cells are square with side `pixel`.
pub fn geotiff(width: u32, height: u32, values: &[f32], origin: (f64, f64), pixel: f64) -> Vec<u8> {
    geotiff_with_nodata(width, height, values, origin, pixel, None)
}

pub fn geotiff_with_nodata(
    width: u32,
    height: u32,
    values: &[f32],
    origin: (f64, f64),
    pixel: f64,
    nodata: Option<&str>,
) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(width, height)
            .unwrap();
        let dir = image.encoder();
        dir.write_tag(Tag::ModelPixelScaleTag, &[pixel, pixel, 0.0][..])
            .unwrap();
        dir.write_tag(
            Tag::ModelTiepointTag,
            &[0.0, 0.0, 0.0, origin.0, origin.1, 0.0][..],
        )
        .unwrap();
        dir.write_tag(
            Tag::GeoKeyDirectoryTag,
            &[1u16, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326][..],
        )
        .unwrap();
        if let Some(nodata) = nodata {
            dir.write_tag(Tag::GdalNodata, nodata).unwrap();
        }
        image.write_data(values).unwrap();
    }
    buffer.into_inner()
}

/// The two-district fixture grid: a 6×3 raster over x 0..6, y 0..3 whose
/// left 3×3 block holds `left` per cell and right block holds `right`.
pub fn two_block_grid(left: f32, right: f32) -> Vec<u8> {
    let mut values = Vec::with_capacity(18);
    for _ in 0..3 {
        values.extend([left; 3]);
        values.extend([right; 3]);
    }
    geotiff(6, 3, &values, (0.0, 3.0), 1.0)
}

/// A district for [`write_boundaries`]: id, name, region and rectangle (l, b, r, t).
pub struct DistrictSpec<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub region: &'a str,
    pub rect: (f64, f64, f64, f64),
}

/// Write a GADM-style GeoJSON boundary file and return its path.
pub fn write_boundaries(dir: &Path, code: &str, districts: &[DistrictSpec<'_>]) -> PathBuf {
    let features: Vec<_> = districts
        .iter()
        .map(|d| {
            let (l, b, r, t) = d.rect;
            json!({
                "type": "Feature",
                "properties": { "GID_2": d.id, "NAME_2": d.name, "NAME_1": d.region },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[l, b], [r, b], [r, t], [l, t], [l, b]]]
                }
            })
        })
        .collect();
    let collection = json!({
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" } },
        "features": features,
    });

    let path = dir.join(format!("gadm41_{}_2.json", code));
    std::fs::write(&path, serde_json::to_string_pretty(&collection).unwrap()).unwrap();
    path
}

/// The standard two-district layout matching [`two_block_grid`].
pub fn two_districts() -> [DistrictSpec<'static>; 2] {
    [
        DistrictSpec {
            id: "KEN.1.1_1",
            name: "Westlands",
            region: "Nairobi",
            rect: (0.0, 0.0, 3.0, 3.0),
        },
        DistrictSpec {
            id: "KEN.1.2_1",
            name: "Kibra",
            region: "Nairobi",
            rect: (3.0, 0.0, 6.0, 3.0),
        },
    ]
}
