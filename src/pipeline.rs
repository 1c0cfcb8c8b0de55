use chrono_tz::Tz;
use reqwest::Client;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{ProduceError, Result};
use crate::exif::{self, MetadataBlock};
use crate::fetch::{self, DEFAULT_TIMEOUT_SECS, FetchedImage, PayloadKind};
use crate::highlight::{HighlightResolver, LookupMode};
use crate::record::ImageRecord;
use crate::transcode;

/// Downloads a tour photo, normalizes it to JPEG and publishes it with
/// description, author, capture time and GPS embedded as EXIF.
///
/// # Example
///
/// ```rust,no_run
/// use waypoint_exif::pipeline::MetadataImageBuilder;
/// use waypoint_exif::record::ImageRecord;
/// use std::path::Path;
///
/// # async fn example(record: ImageRecord) -> Result<(), waypoint_exif::ProduceError> {
/// let builder = MetadataImageBuilder::new(record, None, "Europe/Berlin", 90)?;
/// let path = builder.produce(Path::new("photos/123.jpg")).await?;
/// println!("Saved {}", path.display());
/// # Ok(())
/// # }
/// ```
pub struct MetadataImageBuilder {
    record: ImageRecord,
    resolver: Option<Arc<dyn HighlightResolver>>,
    /// `created_at` rendered as local EXIF time in the target zone.
    capture_time: String,
    quality: u8,
    lookup_mode: LookupMode,
    resolve_highlights: bool,
    client: Client,
}

impl MetadataImageBuilder {
    /// Create a builder for one record.
    ///
    /// Fails if `timezone` is not a known IANA zone, `quality` is outside 1–100
    /// or the record's `created_at` cannot be parsed.
    pub fn new(
        record: ImageRecord,
        resolver: Option<Arc<dyn HighlightResolver>>,
        timezone: &str,
        quality: u8,
    ) -> Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| ProduceError::InvalidTimeZone(timezone.to_string()))?;

        if !(1..=100).contains(&quality) {
            return Err(ProduceError::InvalidQuality(quality));
        }

        let capture_time = exif::format_capture_time(&record.created_at, timezone)?;

        let client = build_client(&record.src, Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;

        Ok(Self {
            record,
            resolver,
            capture_time,
            quality,
            lookup_mode: LookupMode::default(),
            resolve_highlights: true,
            client,
        })
    }

    /// Create a builder with time zone, quality, timeout and lookup behavior
    /// taken from `config`.
    pub fn from_config(
        record: ImageRecord,
        resolver: Option<Arc<dyn HighlightResolver>>,
        config: &Config,
    ) -> Result<Self> {
        let builder = Self::new(record, resolver, &config.timezone, config.jpeg_quality)?
            .with_lookup_mode(config.highlight.lookup_mode())
            .with_timeout(Duration::from_secs(config.fetch_timeout_secs))?;

        Ok(if config.highlight.enabled {
            builder
        } else {
            builder.without_highlights()
        })
    }

    pub fn with_lookup_mode(mut self, mode: LookupMode) -> Self {
        self.lookup_mode = mode;
        self
    }

    /// Replace the default 15 second request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(&self.record.src, timeout)?;
        Ok(self)
    }

    /// Never resolve highlight references, even when a resolver is set.
    pub fn without_highlights(mut self) -> Self {
        self.resolve_highlights = false;
        self
    }

    /// Fetch, normalize, tag and atomically publish the image at `output`.
    ///
    /// Returns `output` on success. On failure nothing is left at `output`.
    pub async fn produce(&self, output: &Path) -> Result<PathBuf> {
        let fetched = fetch::fetch_image(&self.client, &self.record.src).await?;

        let (description, author) = self.captions().await?;

        let jpeg = normalize(fetched, self.quality)?;

        let block = MetadataBlock::builder(self.capture_time.as_str())
            .description(&description)
            .artist(&author)
            .location(self.record.location.as_ref())
            .build();
        log::debug!("Metadata for {}: {block:?}", self.record.id);

        publish(&jpeg, &block, output)
    }

    /// Description and author, overridden by the referenced highlight if any.
    async fn captions(&self) -> Result<(String, String)> {
        let own = (self.record.name.clone(), self.record.author().to_string());

        let Some(ref id) = self.record.highlight_id else {
            return Ok(own);
        };
        if !self.resolve_highlights {
            return Ok(own);
        }

        let lookup = match self.resolver {
            Some(ref resolver) => {
                log::debug!("Resolving highlight {id} via {}", resolver.name());
                resolver.resolve(id).await.map_err(|e| format!("{e:#}"))
            }
            None => Err("no highlight resolver configured".to_string()),
        };

        match lookup {
            Ok(highlight) => Ok((
                highlight.description().to_string(),
                highlight.author().to_string(),
            )),
            Err(reason) if self.lookup_mode == LookupMode::Ignore => {
                log::warn!("Ignoring failed lookup of highlight {id}: {reason}");
                Ok(own)
            }
            Err(reason) => Err(ProduceError::HighlightLookup {
                id: id.clone(),
                reason,
            }),
        }
    }
}

fn build_client(src: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProduceError::Fetch {
            url: src.to_string(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}

/// Turn a downloaded payload into JPEG bytes.
///
/// PNG is re-encoded at `quality`; JPEG passes through untouched.
pub fn normalize(fetched: FetchedImage, quality: u8) -> Result<Vec<u8>> {
    let sniffed = PayloadKind::from_magic(&fetched.bytes);
    match (fetched.kind, sniffed) {
        (PayloadKind::Png, PayloadKind::Jpeg) => {
            log::debug!("{} declared PNG but contains JPEG, passing through", fetched.url);
            Ok(fetched.bytes)
        }
        (PayloadKind::Png, _) => transcode::png_to_jpeg(&fetched.bytes, quality),
        (_, PayloadKind::Jpeg) => Ok(fetched.bytes),
        (_, PayloadKind::Png) => transcode::png_to_jpeg(&fetched.bytes, quality),
        (declared, _) => Err(ProduceError::Decode(format!(
            "{} is not a PNG or JPEG image (declared {declared:?})",
            fetched.url
        ))),
    }
}

/// Write `jpeg` with `block` embedded to `output`, atomically.
///
/// The bytes go to a temporary file in the destination directory, the EXIF
/// block is injected there, and the file is renamed onto `output`. The
/// temporary file is removed on every failure path.
pub fn publish(jpeg: &[u8], block: &MetadataBlock, output: &Path) -> Result<PathBuf> {
    let tiff = exif::serialize_exif(block)?;

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| ProduceError::publish(output, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".waypoint-exif-")
        .suffix(".jpg")
        .tempfile_in(&dir)
        .map_err(|e| ProduceError::publish(output, e))?;

    tmp.write_all(jpeg)
        .and_then(|_| tmp.flush())
        .map_err(|e| ProduceError::publish(output, e))?;

    exif::inject_exif(tmp.path(), &tiff)?;

    tmp.persist(output)
        .map_err(|e| ProduceError::publish(output, e.error))?;

    log::debug!("Published {}", output.display());
    Ok(output.to_path_buf())
}

/// Outcome of processing one record from the CLI.
#[derive(Debug, Serialize)]
pub struct RecordResult {
    pub id: String,
    pub output: PathBuf,
    pub written: bool,
    /// Output already existed and overwriting is disabled.
    pub skipped: bool,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
}

/// Build and run a [`MetadataImageBuilder`] for `record`, writing
/// `<output_dir>/<id>.jpg`. Errors are captured in the result.
pub async fn process_record(
    record: ImageRecord,
    resolver: Option<Arc<dyn HighlightResolver>>,
    config: &Config,
    output_dir: &Path,
) -> RecordResult {
    let output = output_dir.join(record.file_name());
    let mut result = RecordResult {
        id: record.id.clone(),
        output: output.clone(),
        written: false,
        skipped: false,
        error_kind: None,
        error: None,
    };

    if !config.output.overwrite && output.exists() {
        log::info!("  Skipping existing {}", output.display());
        result.skipped = true;
        return result;
    }

    let produced = match MetadataImageBuilder::from_config(record, resolver, config) {
        Ok(builder) => builder.produce(&output).await,
        Err(e) => Err(e),
    };

    match produced {
        Ok(_) => result.written = true,
        Err(e) => {
            result.error_kind = Some(e.kind());
            result.error = Some(e.to_string());
        }
    }

    result
}

/// Collect record JSON files from the given paths.
///
/// Files are taken as-is; directories are walked recursively for `*.json`.
pub fn collect_record_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    collect_files(paths, &["json"])
}

/// Collect JPEG files from the given paths (for `--show-exif`).
pub fn collect_jpeg_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    collect_files(paths, &["jpg", "jpeg"])
}

fn collect_files(paths: &[PathBuf], extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && has_extension(p, extensions) {
                    files.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    files
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}
