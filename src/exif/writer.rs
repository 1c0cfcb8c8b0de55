use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;
use std::path::Path;

use super::metadata::{ALTITUDE_DENOMINATOR, Dms, GpsBlock, MetadataBlock, SECONDS_DENOMINATOR};
use crate::error::{ProduceError, Result};

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;

fn ur64(nominator: u32, denominator: u32) -> uR64 {
    uR64 {
        nominator,
        denominator,
    }
}

fn dms_rationals(dms: &Dms) -> Vec<uR64> {
    vec![
        ur64(dms.degrees, 1),
        ur64(dms.minutes, 1),
        ur64(dms.centiseconds, SECONDS_DENOMINATOR),
    ]
}

/// Translate a metadata block into EXIF tags.
///
/// Only present fields produce tags: an absent description yields no
/// ImageDescription at all, and a block without GPS yields no GPS IFD.
pub fn build_tags(block: &MetadataBlock) -> Vec<ExifTag> {
    let mut tags = Vec::new();

    if let Some(ref description) = block.description {
        tags.push(ExifTag::ImageDescription(description.clone()));
    }
    if let Some(ref artist) = block.artist {
        tags.push(ExifTag::Artist(artist.clone()));
    }

    tags.push(ExifTag::DateTimeOriginal(block.date_time_original.clone()));
    tags.push(ExifTag::CreateDate(block.date_time_digitized.clone()));

    if let Some(ref gps) = block.gps {
        collect_gps_tags(&mut tags, gps);
    }

    tags
}

fn collect_gps_tags(tags: &mut Vec<ExifTag>, gps: &GpsBlock) {
    tags.push(ExifTag::GPSLatitudeRef(gps.latitude_ref.to_string()));
    tags.push(ExifTag::GPSLatitude(dms_rationals(&gps.latitude)));
    tags.push(ExifTag::GPSLongitudeRef(gps.longitude_ref.to_string()));
    tags.push(ExifTag::GPSLongitude(dms_rationals(&gps.longitude)));
    tags.push(ExifTag::GPSAltitudeRef(vec![gps.altitude_ref]));
    tags.push(ExifTag::GPSAltitude(vec![ur64(
        gps.altitude_centimeters,
        ALTITUDE_DENOMINATOR,
    )]));
}

/// Serialize a metadata block into raw TIFF-structured EXIF data
/// (what follows `Exif\0\0` in a JPEG APP1 segment).
pub fn serialize_exif(block: &MetadataBlock) -> Result<Vec<u8>> {
    let mut metadata = Metadata::new();
    for tag in build_tags(block) {
        metadata.set_tag(tag);
    }

    let app1 = metadata
        .as_u8_vec(FileExtension::JPEG)
        .map_err(|e| ProduceError::Encode(format!("EXIF serialization failed: {e:?}")))?;

    if app1.len() <= JPEG_EXIF_OVERHEAD {
        return Err(ProduceError::Encode("EXIF serialization produced no data".into()));
    }
    Ok(app1[JPEG_EXIF_OVERHEAD..].to_vec())
}

/// Replace the EXIF segment of the JPEG at `path` with `tiff_data`.
///
/// All other segments are kept. The EXIF APP1 is placed right after a
/// leading JFIF APP0, or first when there is none.
pub fn inject_exif(path: &Path, tiff_data: &[u8]) -> Result<()> {
    let file_bytes = std::fs::read(path)
        .map_err(|e| ProduceError::Encode(format!("failed to read {}: {e}", path.display())))?;

    let mut jpeg = Jpeg::from_bytes(Bytes::from(file_bytes))
        .map_err(|e| ProduceError::Encode(format!("failed to parse JPEG: {e}")))?;

    jpeg.set_exif(Some(Bytes::copy_from_slice(tiff_data)));
    move_exif_to_front(&mut jpeg);

    let output = jpeg.encoder().bytes();
    std::fs::write(path, &output)
        .map_err(|e| ProduceError::Encode(format!("failed to write {}: {e}", path.display())))?;

    log::debug!("Injected {} bytes of EXIF into {}", tiff_data.len(), path.display());
    Ok(())
}

/// Find the position of the EXIF APP1 segment in a JPEG.
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == MARKER_APP1 && s.contents().starts_with(EXIF_PREFIX))
}

fn move_exif_to_front(jpeg: &mut Jpeg) {
    let Some(pos) = find_exif_segment_pos(jpeg) else {
        return;
    };
    let target = match jpeg.segments().first() {
        Some(first) if first.marker() == MARKER_APP0 => 1,
        _ => 0,
    };
    if pos > target {
        let segments = jpeg.segments_mut();
        let seg = segments.remove(pos);
        segments.insert(target, seg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::reader::read_exif;
    use crate::record::Location;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn jpeg_fixture() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 200])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    fn full_block() -> MetadataBlock {
        MetadataBlock::builder("2024:06:01 14:00:00")
            .description("Summit view")
            .artist("Jane")
            .location(Some(&Location { lat: 47.421_234, lng: -10.985_5, alt: 2962.25 }))
            .build()
    }

    fn has_tag(tags: &[ExifTag], pred: impl Fn(&ExifTag) -> bool) -> bool {
        tags.iter().any(pred)
    }

    // ── build_tags ───────────────────────────────────────────────────

    #[test]
    fn full_block_emits_all_tags() {
        let tags = build_tags(&full_block());
        assert!(has_tag(&tags, |t| matches!(t, ExifTag::ImageDescription(s) if s == "Summit view")));
        assert!(has_tag(&tags, |t| matches!(t, ExifTag::Artist(s) if s == "Jane")));
        assert!(has_tag(&tags, |t| matches!(t, ExifTag::DateTimeOriginal(s) if s == "2024:06:01 14:00:00")));
        assert!(has_tag(&tags, |t| matches!(t, ExifTag::CreateDate(s) if s == "2024:06:01 14:00:00")));
        assert!(has_tag(&tags, |t| matches!(t, ExifTag::GPSLatitudeRef(s) if s == "N")));
        assert!(has_tag(&tags, |t| matches!(t, ExifTag::GPSLongitudeRef(s) if s == "W")));
        assert!(has_tag(&tags, |t| matches!(t, ExifTag::GPSAltitudeRef(v) if v == &vec![0u8])));
        assert!(has_tag(&tags, |t| matches!(
            t,
            ExifTag::GPSAltitude(v) if v.len() == 1 && v[0].nominator == 296225 && v[0].denominator == 100
        )));
    }

    #[test]
    fn absent_fields_emit_no_tags() {
        let block = MetadataBlock::builder("2024:06:01 14:00:00")
            .description("")
            .artist("")
            .location(None)
            .build();
        let tags = build_tags(&block);

        assert!(!has_tag(&tags, |t| matches!(t, ExifTag::ImageDescription(_))));
        assert!(!has_tag(&tags, |t| matches!(t, ExifTag::Artist(_))));
        assert!(!has_tag(&tags, |t| matches!(
            t,
            ExifTag::GPSLatitudeRef(_)
                | ExifTag::GPSLatitude(_)
                | ExifTag::GPSLongitudeRef(_)
                | ExifTag::GPSLongitude(_)
                | ExifTag::GPSAltitudeRef(_)
                | ExifTag::GPSAltitude(_)
        )));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn latitude_rationals_have_expected_denominators() {
        let tags = build_tags(&full_block());
        let lat = tags
            .iter()
            .find_map(|t| match t {
                ExifTag::GPSLatitude(v) => Some(v.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(lat.len(), 3);
        assert_eq!((lat[0].nominator, lat[0].denominator), (47, 1));
        assert_eq!((lat[1].nominator, lat[1].denominator), (25, 1));
        assert_eq!(lat[2].denominator, 100);
    }

    // ── serialize / inject ───────────────────────────────────────────

    #[test]
    fn serialized_exif_is_tiff() {
        let tiff = serialize_exif(&full_block()).unwrap();
        assert!(tiff.starts_with(b"II") || tiff.starts_with(b"MM"), "{:?}", &tiff[..4]);
    }

    #[test]
    fn inject_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, jpeg_fixture()).unwrap();

        let tiff = serialize_exif(&full_block()).unwrap();
        inject_exif(&path, &tiff).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();

        let data = read_exif(&path).unwrap();
        assert_eq!(data.description.as_deref(), Some("Summit view"));
        assert_eq!(data.artist.as_deref(), Some("Jane"));
        assert_eq!(data.date_time_original.as_deref(), Some("2024:06:01 14:00:00"));
        assert_eq!(data.create_date.as_deref(), Some("2024:06:01 14:00:00"));
        assert!((data.gps_latitude.unwrap() - 47.421_234).abs() < 1.0 / 360_000.0);
        assert!((data.gps_longitude.unwrap() + 10.985_5).abs() < 1.0 / 360_000.0);
        assert_eq!(data.gps_altitude, Some(2962.25));
    }

    #[test]
    fn inject_replaces_existing_exif() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, jpeg_fixture()).unwrap();

        inject_exif(&path, &serialize_exif(&full_block()).unwrap()).unwrap();
        let bare = MetadataBlock::builder("2020:01:01 00:00:00").build();
        inject_exif(&path, &serialize_exif(&bare).unwrap()).unwrap();

        let data = read_exif(&path).unwrap();
        assert_eq!(data.description, None);
        assert_eq!(data.gps_latitude, None);
        assert_eq!(data.date_time_original.as_deref(), Some("2020:01:01 00:00:00"));

        let jpeg = Jpeg::from_bytes(Bytes::from(std::fs::read(&path).unwrap())).unwrap();
        let exif_segments = jpeg
            .segments()
            .iter()
            .filter(|s| s.marker() == MARKER_APP1 && s.contents().starts_with(EXIF_PREFIX))
            .count();
        assert_eq!(exif_segments, 1);
    }

    #[test]
    fn inject_rejects_non_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        let err = inject_exif(&path, &serialize_exif(&full_block()).unwrap()).unwrap_err();
        assert!(matches!(err, ProduceError::Encode(_)));
    }
}
