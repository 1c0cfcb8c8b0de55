//! # waypoint-exif
//!
//! Turns tour photo records into self-describing JPEG files: the image is
//! downloaded, PNGs are flattened onto white and re-encoded as JPEG, and the
//! record's description, author, capture time and GPS position are embedded
//! as EXIF. The file is published atomically at the requested path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypoint_exif::config::Config;
//! use waypoint_exif::highlight::{HighlightResolver, KomootHighlightResolver};
//! use waypoint_exif::pipeline::MetadataImageBuilder;
//! use waypoint_exif::record::load_records;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let resolver: Arc<dyn HighlightResolver> =
//!         Arc::new(KomootHighlightResolver::new(&config.highlight.api_base)?);
//!
//!     for record in load_records("tour.json".as_ref())? {
//!         let output = config.output.directory.join(record.file_name());
//!         let builder = MetadataImageBuilder::from_config(record, Some(resolver.clone()), &config)?;
//!         builder.produce(&output).await?;
//!         println!("Saved {}", output.display());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`] — [`MetadataImageBuilder`] and record/file collection
//! - [`record`] — input records and their JSON loading
//! - [`fetch`] — image download and payload detection
//! - [`transcode`] — PNG to JPEG normalization
//! - [`highlight`] — highlight override lookup
//! - [`exif`] — metadata block building, EXIF writing and reading
//! - [`config`] — configuration types and loading/saving
//! - [`error`] — [`ProduceError`]

pub mod config;
pub mod error;
pub mod exif;
pub mod fetch;
pub mod highlight;
pub mod pipeline;
pub mod record;
pub mod transcode;

pub use error::ProduceError;
pub use pipeline::MetadataImageBuilder;
