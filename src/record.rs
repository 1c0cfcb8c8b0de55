use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// A tour photo as delivered by the route API.
///
/// Only `id`, `name`, `src` and `created_at` are required. `created_at` is a
/// UTC timestamp in the fixed `YYYY-MM-DDTHH:MM:SS.ffffffZ` format.
///
/// # Example
///
/// ```rust
/// use waypoint_exif::record::ImageRecord;
///
/// let record: ImageRecord = serde_json::from_str(r#"{
///     "id": 42,
///     "name": "Summit",
///     "src": "https://photos.example.com/42.jpg?width=800",
///     "created_at": "2024-06-01T12:00:00.000000Z",
///     "location": { "lat": 47.42, "lng": 10.98 }
/// }"#).unwrap();
///
/// assert_eq!(record.id, "42");
/// assert_eq!(record.location.unwrap().alt, 0.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// May be empty, but must be present.
    pub name: String,
    pub src: String,
    pub created_at: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub highlight_id: Option<String>,
    #[serde(rename = "_embedded", default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Embedded>,
}

/// Geographic position of a photo. `alt` is meters above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub alt: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embedded {
    #[serde(default)]
    pub creator: Option<Creator>,
}

/// The user who created a photo or highlight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ImageRecord {
    /// Display name of the embedded creator, or an empty string.
    pub fn author(&self) -> &str {
        self.embedded
            .as_ref()
            .and_then(|e| e.creator.as_ref())
            .and_then(|c| c.display_name.as_deref())
            .unwrap_or("")
    }

    /// File name for the published image: `<id>.jpg`, with characters that
    /// are unsafe in file names replaced by `_`.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let stem = if stem.is_empty() { "image".to_string() } else { stem };
        format!("{stem}.jpg")
    }
}

/// Envelope returned by the tour images endpoint.
#[derive(Deserialize)]
struct ItemsEnvelope {
    #[serde(rename = "_embedded")]
    embedded: ItemsEmbedded,
}

#[derive(Deserialize)]
struct ItemsEmbedded {
    items: Vec<ImageRecord>,
}

/// Parse records from JSON text.
///
/// Accepts a single record, an array of records, or a
/// `{"_embedded": {"items": [...]}}` envelope.
pub fn parse_records(text: &str) -> Result<Vec<ImageRecord>> {
    let value: serde_json::Value = serde_json::from_str(text).context("Invalid JSON")?;

    if value.is_array() {
        return serde_json::from_value(value).context("Failed to parse record array");
    }

    if value.pointer("/_embedded/items").is_some() {
        let envelope: ItemsEnvelope =
            serde_json::from_value(value).context("Failed to parse items envelope")?;
        return Ok(envelope.embedded.items);
    }

    let record: ImageRecord = serde_json::from_value(value).context("Failed to parse record")?;
    Ok(vec![record])
}

/// Load records from a JSON file (see [`parse_records`]).
pub fn load_records(path: &Path) -> Result<Vec<ImageRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_records(&contents).with_context(|| format!("Failed to load records from {}", path.display()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(v: StringOrNumber) -> Self {
        match v {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FULL: &str = r#"{
        "id": "abc",
        "name": "Lake",
        "src": "https://photos.example.com/abc.png?w=1",
        "created_at": "2024-06-01T12:00:00.000000Z",
        "location": { "lat": -33.5, "lng": 151.25, "alt": 12.5 },
        "highlight_id": 4711,
        "_embedded": { "creator": { "display_name": "Jane" } }
    }"#;

    // ── ImageRecord ──────────────────────────────────────────────────

    #[test]
    fn parses_full_record() {
        let r: ImageRecord = serde_json::from_str(FULL).unwrap();
        assert_eq!(r.id, "abc");
        assert_eq!(r.name, "Lake");
        assert_eq!(r.highlight_id.as_deref(), Some("4711"));
        assert_eq!(r.author(), "Jane");
        let loc = r.location.unwrap();
        assert_eq!(loc.lat, -33.5);
        assert_eq!(loc.alt, 12.5);
    }

    #[test]
    fn minimal_record_defaults() {
        let r: ImageRecord = serde_json::from_str(
            r#"{"id": 7, "name": "", "src": "http://x/7.jpg", "created_at": "2024-01-01T00:00:00.000000Z"}"#,
        )
        .unwrap();
        assert_eq!(r.id, "7");
        assert_eq!(r.name, "");
        assert!(r.location.is_none());
        assert!(r.highlight_id.is_none());
        assert_eq!(r.author(), "");
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = serde_json::from_str::<ImageRecord>(
            r#"{"id": 7, "src": "http://x/7.jpg", "created_at": "2024-01-01T00:00:00.000000Z"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("name"), "{err}");
    }

    #[test]
    fn null_highlight_is_none() {
        let r: ImageRecord = serde_json::from_str(
            r#"{"id": 7, "name": "n", "src": "s", "created_at": "c", "highlight_id": null}"#,
        )
        .unwrap();
        assert!(r.highlight_id.is_none());
    }

    #[test]
    fn location_altitude_defaults_to_zero() {
        let loc: Location = serde_json::from_str(r#"{"lat": 1.0, "lng": 2.0}"#).unwrap();
        assert_eq!(loc.alt, 0.0);
    }

    #[test]
    fn file_name_sanitizes_id() {
        let mut r: ImageRecord = serde_json::from_str(FULL).unwrap();
        assert_eq!(r.file_name(), "abc.jpg");
        r.id = "../etc/passwd".into();
        assert_eq!(r.file_name(), "___etc_passwd.jpg");
        r.id = String::new();
        assert_eq!(r.file_name(), "image.jpg");
    }

    // ── parse_records ────────────────────────────────────────────────

    #[test]
    fn parse_single_array_and_envelope() {
        assert_eq!(parse_records(FULL).unwrap().len(), 1);

        let array = format!("[{FULL}, {FULL}]");
        assert_eq!(parse_records(&array).unwrap().len(), 2);

        let envelope = format!(r#"{{"_embedded": {{"items": [{FULL}]}}}}"#);
        let records = parse_records(&envelope).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "abc");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_records("not json").is_err());
        assert!(parse_records(r#"{"id": 1}"#).is_err());
    }

    #[test]
    fn load_records_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.json");
        fs::write(&path, FULL).unwrap();
        let records = load_records(&path).unwrap();
        assert_eq!(records[0].name, "Lake");

        assert!(load_records(&dir.path().join("missing.json")).is_err());
    }
}
