use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{ProduceError, Result};
use crate::record::Location;

/// Input format of `created_at`.
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
/// EXIF DateTime format (no sub-seconds, no offset).
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Denominator of the seconds rational in a GPS coordinate.
pub const SECONDS_DENOMINATOR: u32 = 100;
/// Denominator of the altitude rational.
pub const ALTITUDE_DENOMINATOR: u32 = 100;

/// GPSAltitudeRef values.
pub const ALTITUDE_ABOVE_SEA_LEVEL: u8 = 0;
pub const ALTITUDE_BELOW_SEA_LEVEL: u8 = 1;

/// Degrees, minutes and hundredths of seconds of an unsigned angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dms {
    pub degrees: u32,
    pub minutes: u32,
    /// Seconds × 100, truncated toward zero.
    pub centiseconds: u32,
}

impl Dms {
    /// Split the absolute value of `value` into DMS.
    ///
    /// Minutes and seconds are truncated, not rounded, so the reconstructed
    /// angle is never larger than the input and is off by less than
    /// 1/360000 degree.
    ///
    /// ```rust
    /// use waypoint_exif::exif::Dms;
    ///
    /// let dms = Dms::from_degrees(-33.8568);
    /// assert_eq!((dms.degrees, dms.minutes), (33, 51));
    /// assert!((dms.to_degrees() - 33.8568).abs() < 1.0 / 360_000.0);
    /// ```
    pub fn from_degrees(value: f64) -> Self {
        let abs = value.abs();
        let degrees = abs.trunc();
        let minutes = ((abs - degrees) * 60.0).trunc();
        let seconds = (abs - degrees - minutes / 60.0) * 3600.0;
        Self {
            degrees: degrees as u32,
            minutes: minutes as u32,
            centiseconds: (seconds * SECONDS_DENOMINATOR as f64) as u32,
        }
    }

    pub fn seconds(&self) -> f64 {
        self.centiseconds as f64 / SECONDS_DENOMINATOR as f64
    }

    pub fn to_degrees(&self) -> f64 {
        self.degrees as f64 + self.minutes as f64 / 60.0 + self.seconds() / 3600.0
    }
}

/// The GPS IFD group written for a located photo.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsBlock {
    /// `'N'` or `'S'`.
    pub latitude_ref: char,
    pub latitude: Dms,
    /// `'E'` or `'W'`.
    pub longitude_ref: char,
    pub longitude: Dms,
    pub altitude_ref: u8,
    /// |altitude| × 100, rounded.
    pub altitude_centimeters: u32,
}

impl GpsBlock {
    pub fn from_location(loc: &Location) -> Self {
        let (altitude_ref, altitude_centimeters) = altitude_rational(loc.alt);
        Self {
            latitude_ref: if loc.lat >= 0.0 { 'N' } else { 'S' },
            latitude: Dms::from_degrees(loc.lat),
            longitude_ref: if loc.lng >= 0.0 { 'E' } else { 'W' },
            longitude: Dms::from_degrees(loc.lng),
            altitude_ref,
            altitude_centimeters,
        }
    }

    /// Altitude in meters, negative below sea level.
    pub fn altitude(&self) -> f64 {
        let meters = self.altitude_centimeters as f64 / ALTITUDE_DENOMINATOR as f64;
        if self.altitude_ref == ALTITUDE_BELOW_SEA_LEVEL { -meters } else { meters }
    }
}

/// Altitude reference and numerator over [`ALTITUDE_DENOMINATOR`].
pub fn altitude_rational(alt: f64) -> (u8, u32) {
    let reference = if alt < 0.0 {
        ALTITUDE_BELOW_SEA_LEVEL
    } else {
        ALTITUDE_ABOVE_SEA_LEVEL
    };
    (reference, (alt.abs() * ALTITUDE_DENOMINATOR as f64).round() as u32)
}

/// Parse a record timestamp as UTC and render it as local EXIF time in `tz`.
///
/// ```rust
/// use waypoint_exif::exif::format_capture_time;
///
/// let tz: chrono_tz::Tz = "Europe/Berlin".parse().unwrap();
/// let local = format_capture_time("2024-06-01T12:00:00.000000Z", tz).unwrap();
/// assert_eq!(local, "2024:06:01 14:00:00");
/// ```
pub fn format_capture_time(created_at: &str, tz: Tz) -> Result<String> {
    let naive = NaiveDateTime::parse_from_str(created_at, RECORD_TIMESTAMP_FORMAT)
        .map_err(|_| ProduceError::InvalidTimestamp(created_at.to_string()))?;
    let local = Utc.from_utc_datetime(&naive).with_timezone(&tz);
    Ok(local.format(EXIF_DATETIME_FORMAT).to_string())
}

/// Everything embedded into a published image.
///
/// Optional fields are `None` when absent; the writer emits no tag at all for
/// them, never an empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataBlock {
    pub description: Option<String>,
    pub artist: Option<String>,
    /// DateTimeOriginal.
    pub date_time_original: String,
    /// CreateDate (the "digitized" timestamp).
    pub date_time_digitized: String,
    pub gps: Option<GpsBlock>,
}

impl MetadataBlock {
    pub fn builder(capture_time: impl Into<String>) -> MetadataBuilder {
        MetadataBuilder {
            capture_time: capture_time.into(),
            description: None,
            artist: None,
            gps: None,
        }
    }
}

/// Builds a [`MetadataBlock`], keeping only non-empty text fields.
#[derive(Debug)]
pub struct MetadataBuilder {
    capture_time: String,
    description: Option<String>,
    artist: Option<String>,
    gps: Option<GpsBlock>,
}

impl MetadataBuilder {
    pub fn description(mut self, text: &str) -> Self {
        self.description = non_empty(text);
        self
    }

    pub fn artist(mut self, text: &str) -> Self {
        self.artist = non_empty(text);
        self
    }

    pub fn location(mut self, location: Option<&Location>) -> Self {
        self.gps = location.map(GpsBlock::from_location);
        self
    }

    pub fn build(self) -> MetadataBlock {
        MetadataBlock {
            description: self.description,
            artist: self.artist,
            date_time_digitized: self.capture_time.clone(),
            date_time_original: self.capture_time,
            gps: self.gps,
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() { None } else { Some(text.to_string()) }
}
