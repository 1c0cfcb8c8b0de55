use anyhow::Result;
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;
use serde::Serialize;
use std::path::Path;

/// Metadata read back from a published image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExifData {
    pub description: Option<String>,
    pub artist: Option<String>,
    pub date_time_original: Option<String>,
    pub create_date: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    /// Meters, negative below sea level.
    pub gps_altitude: Option<f64>,
}

impl ExifData {
    pub fn has_gps(&self) -> bool {
        self.gps_latitude.is_some() && self.gps_longitude.is_some()
    }
}

/// Read the embedded metadata of a JPEG file.
///
/// A file without a parseable EXIF block yields `ExifData::default()`.
pub fn read_exif(path: &Path) -> Result<ExifData> {
    if !path.is_file() {
        anyhow::bail!("No such file: {}", path.display());
    }

    let Some(metadata) = load_metadata(path) else {
        log::debug!("No EXIF data found in {}", path.display());
        return Ok(ExifData::default());
    };

    let mut data = ExifData::default();
    let mut lat_ref: Option<char> = None;
    let mut lng_ref: Option<char> = None;
    let mut lat_dms: Option<f64> = None;
    let mut lng_dms: Option<f64> = None;
    let mut alt_ref: u8 = 0;
    let mut alt: Option<f64> = None;

    for tag in &metadata {
        match tag {
            ExifTag::ImageDescription(s) => data.description = clean_string(s),
            ExifTag::Artist(s) => data.artist = clean_string(s),
            ExifTag::DateTimeOriginal(s) => data.date_time_original = clean_string(s),
            ExifTag::CreateDate(s) => data.create_date = clean_string(s),
            ExifTag::GPSLatitudeRef(s) => lat_ref = ref_char(s),
            ExifTag::GPSLongitudeRef(s) => lng_ref = ref_char(s),
            ExifTag::GPSLatitude(rats) => lat_dms = dms_to_decimal(rats),
            ExifTag::GPSLongitude(rats) => lng_dms = dms_to_decimal(rats),
            ExifTag::GPSAltitudeRef(bytes) => alt_ref = bytes.first().copied().unwrap_or(0),
            ExifTag::GPSAltitude(rats) => alt = rats.first().and_then(rational_to_f64),
            _ => {}
        }
    }

    data.gps_latitude = lat_dms.map(|v| signed(v, lat_ref, 'S'));
    data.gps_longitude = lng_dms.map(|v| signed(v, lng_ref, 'W'));
    data.gps_altitude = alt.map(|v| if alt_ref == 1 { -v } else { v });

    Ok(data)
}

/// Load EXIF with little_exif, treating panics and parse errors as "no EXIF".
fn load_metadata(path: &Path) -> Option<Metadata> {
    let path_owned = path.to_path_buf();
    let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path_owned));

    match result {
        Ok(Ok(m)) => Some(m),
        Ok(Err(e)) => {
            log::debug!("little_exif could not parse EXIF: {e:?}");
            None
        }
        Err(_) => {
            log::debug!("little_exif panicked parsing EXIF");
            None
        }
    }
}

fn clean_string(s: &str) -> Option<String> {
    let s = s.trim_end_matches('\0').trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn ref_char(s: &str) -> Option<char> {
    s.trim_end_matches('\0').trim().chars().next()
}

fn rational_to_f64(r: &uR64) -> Option<f64> {
    if r.denominator == 0 {
        None
    } else {
        Some(r.nominator as f64 / r.denominator as f64)
    }
}

/// Convert three rationals (deg, min, sec) to decimal degrees.
fn dms_to_decimal(rats: &[uR64]) -> Option<f64> {
    if rats.len() < 3 {
        return None;
    }
    let degrees = rational_to_f64(&rats[0])?;
    let minutes = rational_to_f64(&rats[1])?;
    let seconds = rational_to_f64(&rats[2])?;
    Some(degrees + minutes / 60.0 + seconds / 3600.0)
}

fn signed(value: f64, reference: Option<char>, negative: char) -> f64 {
    if reference == Some(negative) { -value } else { value }
}
