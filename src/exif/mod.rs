//! EXIF metadata building, writing and reading.
//!
//! - [`MetadataBlock`] — the fields embedded into a published photo
//! - [`serialize_exif`] / [`inject_exif`] — encode a block and splice it into a JPEG
//! - [`read_exif`] — read the embedded block back from a file

mod metadata;
mod reader;
mod writer;

pub use metadata::{
    ALTITUDE_ABOVE_SEA_LEVEL, ALTITUDE_BELOW_SEA_LEVEL, Dms, EXIF_DATETIME_FORMAT, GpsBlock,
    MetadataBlock, MetadataBuilder, RECORD_TIMESTAMP_FORMAT, altitude_rational,
    format_capture_time,
};
pub use reader::{ExifData, read_exif};
pub use writer::{build_tags, inject_exif, serialize_exif};
