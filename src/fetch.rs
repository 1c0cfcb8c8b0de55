use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};

use crate::error::{ProduceError, Result};

/// Default timeout for image downloads and highlight lookups.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Encoding of a downloaded payload, as far as it matters for normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Png,
    Jpeg,
    Other,
}

impl PayloadKind {
    /// Map a `Content-Type` header value. Returns `None` for values that say
    /// nothing about the encoding (`application/octet-stream`, `binary/...`).
    pub fn from_content_type(value: &str) -> Option<Self> {
        let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/png" | "image/x-png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "" | "application/octet-stream" | "binary/octet-stream" => None,
            m if m.starts_with("image/") => Some(Self::Other),
            _ => None,
        }
    }

    /// Map the extension of a URL path.
    pub fn from_url(url: &Url) -> Option<Self> {
        let last = url.path_segments()?.next_back()?;
        let ext = last.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Sniff the payload's magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => Self::Png,
            Ok(image::ImageFormat::Jpeg) => Self::Jpeg,
            _ => Self::Other,
        }
    }
}

/// Raw image bytes plus the detected encoding.
#[derive(Debug)]
pub struct FetchedImage {
    pub url: Url,
    pub bytes: Vec<u8>,
    pub kind: PayloadKind,
}

impl FetchedImage {
    pub fn is_png(&self) -> bool {
        self.kind == PayloadKind::Png
    }
}

/// Remove the query string from a URL, keeping path and fragment.
///
/// ```rust
/// use waypoint_exif::fetch::strip_query;
///
/// let url = strip_query("https://cdn.example.com/p/1.jpg?width=800&crop=true#top").unwrap();
/// assert_eq!(url.as_str(), "https://cdn.example.com/p/1.jpg#top");
/// ```
pub fn strip_query(src: &str) -> Result<Url> {
    let mut url = Url::parse(src).map_err(|e| ProduceError::Fetch {
        url: src.to_string(),
        reason: format!("invalid URL: {e}"),
    })?;
    url.set_query(None);
    Ok(url)
}

/// Download an image with a single GET request.
///
/// The query string of `src` is dropped before the request. The client is
/// expected to carry the request timeout. Any non-2xx status fails with
/// [`ProduceError::Fetch`].
pub async fn fetch_image(client: &Client, src: &str) -> Result<FetchedImage> {
    let url = strip_query(src)?;
    log::debug!("GET {url}");

    let fetch_err = |reason: String| ProduceError::Fetch {
        url: url.to_string(),
        reason,
    };

    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_err(describe_reqwest_error(&e)))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(fetch_err(format!("HTTP {status}")));
    }

    let declared = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(PayloadKind::from_content_type);

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| fetch_err(describe_reqwest_error(&e)))?
        .to_vec();

    let kind = declared
        .or_else(|| PayloadKind::from_url(&url))
        .unwrap_or_else(|| PayloadKind::from_magic(&bytes));

    log::debug!("Downloaded {} bytes ({kind:?})", bytes.len());

    Ok(FetchedImage { url, bytes, kind })
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
