mod komoot;

pub use komoot::{DEFAULT_API_BASE, KomootHighlightResolver};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::record::{Creator, Embedded};

/// A point of interest whose name and creator override a photo's own
/// description and author.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<Embedded>,
}

impl Highlight {
    pub fn new(base_name: Option<&str>, creator: Option<&str>) -> Self {
        Self {
            base_name: base_name.map(str::to_string),
            embedded: Some(Embedded {
                creator: Some(Creator {
                    display_name: creator.map(str::to_string),
                }),
            }),
        }
    }

    /// Override for the image description (empty when the highlight has no name).
    pub fn description(&self) -> &str {
        self.base_name.as_deref().unwrap_or("")
    }

    /// Override for the image author (empty when the creator is unknown).
    pub fn author(&self) -> &str {
        self.embedded
            .as_ref()
            .and_then(|e| e.creator.as_ref())
            .and_then(|c| c.display_name.as_deref())
            .unwrap_or("")
    }
}

/// How a failed highlight lookup affects the whole operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// The failure aborts `produce` with a highlight lookup error.
    #[default]
    Fatal,
    /// The failure is logged and the record's own fields are kept.
    Ignore,
}

/// Capability to resolve highlights by identifier.
///
/// The crate ships [`KomootHighlightResolver`]; tests and embedders can
/// provide their own.
///
/// # Example
///
/// ```rust
/// use waypoint_exif::highlight::{Highlight, HighlightResolver};
///
/// struct Fixed;
///
/// #[async_trait::async_trait]
/// impl HighlightResolver for Fixed {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     async fn resolve(&self, _id: &str) -> anyhow::Result<Highlight> {
///         Ok(Highlight::new(Some("Zugspitze"), Some("Jane")))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait HighlightResolver: Send + Sync {
    /// The display name of this resolver (used in logs).
    fn name(&self) -> &str;
    /// Look up a highlight by its identifier.
    async fn resolve(&self, id: &str) -> Result<Highlight>;
}
