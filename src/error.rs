use thiserror::Error;

/// Errors surfaced by [`MetadataImageBuilder`](crate::pipeline::MetadataImageBuilder).
///
/// Every variant aborts the whole `produce` call. Nothing is retried and no
/// partial file is left at the destination path.
#[derive(Debug, Error)]
pub enum ProduceError {
    /// Non-2xx HTTP status, timeout, or connection failure while downloading.
    #[error("failed to fetch image from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The payload is not a valid image of the detected type.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The highlight resolver failed for a record that references a highlight.
    #[error("highlight lookup for {id} failed: {reason}")]
    HighlightLookup { id: String, reason: String },

    /// EXIF serialization, JPEG re-encoding or container injection failed.
    #[error("failed to encode image metadata: {0}")]
    Encode(String),

    /// Writing the temporary file or moving it into place failed.
    #[error("failed to publish {path}: {reason}")]
    Publish { path: String, reason: String },

    #[error("unknown time zone: {0}")]
    InvalidTimeZone(String),

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    /// `created_at` does not follow `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
    #[error("invalid capture timestamp {0:?}")]
    InvalidTimestamp(String),
}

impl ProduceError {
    pub(crate) fn publish(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::Publish {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable name of the error kind (used in CLI JSON output).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Decode(_) => "decode",
            Self::HighlightLookup { .. } => "highlight_lookup",
            Self::Encode(_) => "encode",
            Self::Publish { .. } => "publish",
            Self::InvalidTimeZone(_) => "invalid_time_zone",
            Self::InvalidQuality(_) => "invalid_quality",
            Self::InvalidTimestamp(_) => "invalid_timestamp",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProduceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn publish_helper_formats_path() {
        let err = ProduceError::publish(Path::new("/tmp/out.jpg"), "disk full");
        assert_eq!(err.to_string(), "failed to publish /tmp/out.jpg: disk full");
        assert_eq!(err.kind(), "publish");
    }

    #[test]
    fn fetch_error_message_includes_url() {
        let err = ProduceError::Fetch {
            url: "https://example.com/a.jpg".into(),
            reason: "HTTP 404 Not Found".into(),
        };
        assert!(err.to_string().contains("https://example.com/a.jpg"));
        assert!(err.to_string().contains("404"));
    }
}
