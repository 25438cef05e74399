//! GeoTIFF decoding.
//!
//! Reads the first band of a GeoTIFF into `f64` cells together with the
//! affine georeference, the EPSG code from the GeoKey directory and the GDAL
//! nodata sentinel.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::TiffError;
use tracing::trace;

use super::crs::Crs;
use super::types::{DecodeError, GeoTransform, GridHandle, RasterMetadata};
use crate::demography::UnitKey;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const SAMPLE_FORMAT_UINT: u16 = 1;
const SAMPLE_FORMAT_INT: u16 = 2;
const SAMPLE_FORMAT_IEEE_FP: u16 = 3;

const MODEL_TYPE_PROJECTED: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Georeference and layout read from the TIFF directory.
struct Header {
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<f64>,
}

/// Decode a GeoTIFF file into a grid for `unit`.
pub fn decode_path(unit: &UnitKey, path: &Path) -> Result<GridHandle, DecodeError> {
    let file = File::open(path).map_err(TiffError::from)?;
    decode_grid(unit, BufReader::new(file))
}

/// Decode a GeoTIFF stream into a grid for `unit`.
pub fn decode_grid<R: Read + Seek>(unit: &UnitKey, reader: R) -> Result<GridHandle, DecodeError> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let header = read_header(&mut decoder)?;

    let samples = match decoder.read_image()? {
        DecodingResult::U8(v) => widen(v),
        DecodingResult::U16(v) => widen(v),
        DecodingResult::U32(v) => widen(v),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => widen(v),
        DecodingResult::I16(v) => widen(v),
        DecodingResult::I32(v) => widen(v),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => widen(v),
        DecodingResult::F64(v) => v,
    };

    let cells = header.width * header.height;
    if cells == 0 || samples.len() % cells != 0 {
        return Err(DecodeError::ShapeMismatch {
            expected: cells,
            actual: samples.len(),
        });
    }

    // Interleaved multi-band data: keep band 1.
    let bands = samples.len() / cells;
    let values = if bands == 1 {
        samples
    } else {
        samples.into_iter().step_by(bands).collect()
    };

    trace!(
        unit = %unit,
        width = header.width,
        height = header.height,
        bands = bands,
        "Decoded raster"
    );

    GridHandle::new(
        unit.clone(),
        header.width,
        header.height,
        values,
        header.transform,
        header.crs,
        header.nodata,
    )
}

/// Read spatial metadata only, leaving pixel data untouched.
pub fn read_metadata(unit: &UnitKey, path: &Path) -> Result<RasterMetadata, DecodeError> {
    let file = File::open(path).map_err(TiffError::from)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let header = read_header(&mut decoder)?;

    Ok(RasterMetadata {
        unit: unit.clone(),
        crs: header.crs,
        transform: header.transform,
        width: header.width,
        height: header.height,
        bounds: header.transform.bounds(header.width, header.height),
        nodata: header.nodata,
    })
}

fn widen<T: Into<f64>>(values: Vec<T>) -> Vec<f64> {
    values.into_iter().map(Into::into).collect()
}

fn read_header<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Header, DecodeError> {
    check_sample_format(decoder)?;
    let (width, height) = decoder.dimensions()?;
    let geokeys = read_geokeys(decoder)?;

    let mut transform = read_transform(decoder)?;
    if geokey(&geokeys, GT_RASTER_TYPE_KEY) == Some(RASTER_PIXEL_IS_POINT) {
        // Tie points name cell centers; shift to the corner convention.
        transform.c -= 0.5 * transform.a + 0.5 * transform.b;
        transform.f -= 0.5 * transform.d + 0.5 * transform.e;
    }

    Ok(Header {
        width: width as usize,
        height: height as usize,
        transform,
        crs: crs_from_geokeys(&geokeys),
        nodata: read_nodata(decoder)?,
    })
}

/// Only plain integer and IEEE float samples widen losslessly into a population band.
fn check_sample_format<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<(), DecodeError> {
    let Some(value) = decoder.find_tag(Tag::SampleFormat)? else {
        return Ok(());
    };
    let unsupported = value.into_u16_vec()?.into_iter().find(|code| {
        !matches!(
            *code,
            SAMPLE_FORMAT_UINT | SAMPLE_FORMAT_INT | SAMPLE_FORMAT_IEEE_FP
        )
    });
    match unsupported {
        None => Ok(()),
        Some(code) => Err(DecodeError::UnsupportedSampleFormat(
            match code {
                4 => "untyped samples (SampleFormat 4)".to_string(),
                5 => "complex integer samples (SampleFormat 5)".to_string(),
                6 => "complex float samples (SampleFormat 6)".to_string(),
                other => format!("SampleFormat {}", other),
            },
        )),
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform, DecodeError> {
    if let Some(matrix) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = matrix.into_f64_vec()?;
        if m.len() >= 8 {
            let transform = GeoTransform {
                a: m[0],
                b: m[1],
                c: m[3],
                d: m[4],
                e: m[5],
                f: m[7],
            };
            if transform.is_finite() && transform.inverse().is_some() {
                return Ok(transform);
            }
        }
        return Err(DecodeError::MissingGeoreference);
    }

    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;
    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
    let (Some(tiepoint), Some(scale)) = (tiepoint, scale) else {
        return Err(DecodeError::MissingGeoreference);
    };
    let tie = tiepoint.into_f64_vec()?;
    let scale = scale.into_f64_vec()?;
    if tie.len() < 6 || scale.len() < 2 || scale[0] == 0.0 || scale[1] == 0.0 {
        return Err(DecodeError::MissingGeoreference);
    }

    // Tie point (i, j, k) -> (x, y, z); pixel rows grow southwards.
    let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
    let transform = GeoTransform {
        a: scale[0],
        b: 0.0,
        c: x - i * scale[0],
        d: 0.0,
        e: -scale[1],
        f: y + j * scale[1],
    };
    if !transform.is_finite() {
        return Err(DecodeError::MissingGeoreference);
    }
    Ok(transform)
}

fn read_geokeys<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<u16>, DecodeError> {
    match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(value) => Ok(value.into_u16_vec()?),
        None => Ok(Vec::new()),
    }
}

/// Look up a GeoKey stored inline in the directory.
fn geokey(directory: &[u16], key: u16) -> Option<u16> {
    // Header is 4 shorts; each entry is (key, location, count, value).
    directory
        .get(4..)?
        .chunks_exact(4)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

fn crs_from_geokeys(directory: &[u16]) -> Option<Crs> {
    let projected = geokey(directory, PROJECTED_CS_TYPE_KEY).filter(|c| *c != USER_DEFINED);
    let geographic = geokey(directory, GEOGRAPHIC_TYPE_KEY).filter(|c| *c != USER_DEFINED);

    match geokey(directory, GT_MODEL_TYPE_KEY) {
        Some(MODEL_TYPE_PROJECTED) => projected.or(geographic),
        _ => geographic.or(projected),
    }
    .map(|code| Crs::from_epsg(u32::from(code)))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>, DecodeError> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    Ok(match text.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Some(f64::NAN),
        other => other.parse().ok(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::demography::{AgeBand, CountryCode, Sex};
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    pub(crate) fn unit() -> UnitKey {
        UnitKey::new(CountryCode::new("KEN").unwrap(), Sex::Female, AgeBand::from_raw("80_plus"))
    }

    /// Encode a single-band float GeoTIFF in EPSG:4326 with a tiepoint georeference.
    pub(crate) fn encode_geotiff(
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

    #[test]
    fn test_decode_reads_values_and_georeference() {
        let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let bytes = encode_geotiff(3, 2, &values, (36.0, 1.0), 0.5, None);

        let grid = decode_grid(&unit(), Cursor::new(bytes)).unwrap();

        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.values(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(grid.crs(), Some(Crs::WGS84));
        assert_eq!(grid.transform().cell_center(0, 0), (36.25, 0.75));
        assert_eq!(grid.nodata(), None);
    }

    #[test]
    fn test_decode_reads_gdal_nodata() {
        let values = [1.0f32, -99999.0, 2.0, 3.0];
        let bytes = encode_geotiff(2, 2, &values, (0.0, 0.0), 1.0, Some("-99999"));

        let grid = decode_grid(&unit(), Cursor::new(bytes)).unwrap();

        assert_eq!(grid.nodata(), Some(-99999.0));
        assert_eq!(grid.valid_sum(), 6.0);
    }

    #[test]
    fn test_decode_rejects_missing_georeference() {
        let mut buffer = Cursor::new(Vec::new());
        TiffEncoder::new(&mut buffer)
            .unwrap()
            .write_image::<colortype::Gray32Float>(2, 2, &[0.0f32; 4])
            .unwrap();

        let err = decode_grid(&unit(), Cursor::new(buffer.into_inner())).unwrap_err();
        assert!(matches!(err, DecodeError::MissingGeoreference));
    }

    #[test]
    fn test_decode_rejects_complex_samples() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
            let mut image = encoder
                .new_image::<colortype::Gray32Float>(2, 2)
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::SampleFormat, &[6u16][..])
                .unwrap();
            image.write_data(&[0.0f32; 4]).unwrap();
        }

        let err = decode_grid(&unit(), Cursor::new(buffer.into_inner())).unwrap_err();
        match err {
            DecodeError::UnsupportedSampleFormat(detail) => assert!(detail.contains("complex")),
            other => panic!("expected UnsupportedSampleFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_grid(&unit(), Cursor::new(b"<html>not found</html>".to_vec())).unwrap_err();
        assert!(matches!(err, DecodeError::Tiff(_)));
    }

    #[test]
    fn test_read_metadata_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("F_80_plus.tif");
        std::fs::write(&path, encode_geotiff(4, 2, &[0.0; 8], (30.0, 5.0), 0.5, Some("nan"))).unwrap();

        let meta = read_metadata(&unit(), &path).unwrap();

        assert_eq!((meta.width, meta.height), (4, 2));
        assert_eq!(meta.bounds.left, 30.0);
        assert_eq!(meta.bounds.right, 32.0);
        assert_eq!(meta.bounds.bottom, 4.0);
        assert!(meta.nodata.unwrap().is_nan());
    }

    #[test]
    fn test_geokey_lookup() {
        let dir = [1u16, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32737];
        assert_eq!(geokey(&dir, 3072), Some(32737));
        assert_eq!(crs_from_geokeys(&dir), Some(Crs::from_epsg(32737)));
        assert_eq!(geokey(&dir, 2048), None);
    }
}
