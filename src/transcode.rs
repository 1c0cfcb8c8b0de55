//! PNG → JPEG normalization.
//!
//! JPEG has no alpha channel, so transparent pixels are flattened onto an
//! opaque white background before encoding. Output is always 4:4:4 chroma.
//! With the `mozjpeg` feature (default) the Huffman tables are optimized for
//! each image; without it `image`'s baseline encoder writes the standard ones.

#[cfg(not(feature = "mozjpeg"))]
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::error::{ProduceError, Result};

/// Default JPEG quality used when re-encoding.
pub const DEFAULT_QUALITY: u8 = 90;

/// Decode PNG bytes and re-encode them as JPEG at `quality` (1–100).
pub fn png_to_jpeg(png: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)
        .map_err(|e| ProduceError::Decode(format!("invalid PNG: {e}")))?;

    log::debug!(
        "Re-encoding {}x{} PNG ({:?}) as JPEG q={quality}",
        img.width(),
        img.height(),
        img.color()
    );

    let rgb = flatten_to_rgb(&img);
    encode_jpeg(&rgb, quality)
}

/// Convert any color mode to 8-bit RGB, compositing alpha onto white.
pub fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        out.put_pixel(x, y, Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]));
    }
    out
}

/// `c·α + 255·(1−α)` in 8-bit integer arithmetic, rounded.
fn over_white(c: u8, a: u8) -> u8 {
    let c = c as u32;
    let a = a as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(feature = "mozjpeg")]
fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = rgb.dimensions();

    // libjpeg errors surface as panics in mozjpeg.
    let encoded = std::panic::catch_unwind(|| -> std::io::Result<Vec<u8>> {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_chroma_sampling_pixel_sizes((1, 1), (1, 1));
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(rgb.as_raw())?;
        comp.finish()
    });

    match encoded {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(ProduceError::Encode(format!("JPEG encoding failed: {e}"))),
        Err(_) => Err(ProduceError::Encode("JPEG encoder panicked".into())),
    }
}

#[cfg(not(feature = "mozjpeg"))]
fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(rgb)
        .map_err(|e| ProduceError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}
