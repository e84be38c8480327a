//! Image re-encoding backends

use crate::config::Background;
use crate::error::{Error, Result};
use crate::media::MediaType;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Limits for a single re-encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReencodeOptions {
    pub max_output_bytes: u64,
    pub max_dimension: u32,
    /// Percent, 1..=100
    pub quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub data: Vec<u8>,
    pub media_type: MediaType,
}

/// The image work the normalizer delegates. Implementations may fail freely;
/// callers treat every error as "keep what you had".
pub trait ImageCodec {
    fn convert_to_jpeg(&self, data: &[u8], quality: u8) -> Result<Vec<u8>>;

    fn reencode(
        &self,
        data: &[u8],
        media_type: &MediaType,
        options: &ReencodeOptions,
    ) -> Result<Encoded>;
}

/// `image`-crate backed codec.
#[derive(Debug, Clone, Copy)]
pub struct RasterCodec {
    background: Background,
}

impl RasterCodec {
    pub fn new(background: Background) -> Self {
        Self { background }
    }
}

impl Default for RasterCodec {
    fn default() -> Self {
        Self::new(Background::WHITE)
    }
}

impl ImageCodec for RasterCodec {
    fn convert_to_jpeg(&self, data: &[u8], quality: u8) -> Result<Vec<u8>> {
        let img = image::load_from_memory(data).map_err(Error::Decode)?;
        encode_jpeg(&img, quality, self.background)
    }

    fn reencode(
        &self,
        data: &[u8],
        media_type: &MediaType,
        options: &ReencodeOptions,
    ) -> Result<Encoded> {
        let img = image::load_from_memory(data).map_err(Error::Decode)?;
        let img = fit_within(img, options.max_dimension);

        let target = reencode_target(media_type);

        let mut buffer = self.encode_as(&img, &target, options.quality)?;

        // Shrink until the codec's own target is met, down to half size
        let (width, height) = img.dimensions();
        let mut scale = 0.9;
        while buffer.len() as u64 > options.max_output_bytes && scale > 0.5 {
            let new_width = ((width as f32 * scale) as u32).max(1);
            let new_height = ((height as f32 * scale) as u32).max(1);
            let smaller = img.resize(new_width, new_height, FilterType::Lanczos3);
            buffer = self.encode_as(&smaller, &target, options.quality)?;
            tracing::trace!(scale, size = buffer.len(), "downscaled re-encode");
            scale *= 0.9;
        }

        Ok(Encoded {
            data: buffer,
            media_type: target,
        })
    }
}

impl RasterCodec {
    fn encode_as(&self, img: &DynamicImage, target: &MediaType, quality: u8) -> Result<Vec<u8>> {
        let format = match target.as_str() {
            "image/png" => ImageFormat::Png,
            "image/gif" => ImageFormat::Gif,
            "image/bmp" => ImageFormat::Bmp,
            _ => return encode_jpeg(img, quality, self.background),
        };

        let mut buffer = Cursor::new(Vec::new());
        let written = if format == ImageFormat::Png {
            img.write_to(&mut buffer, format)
        } else if img.color().has_alpha() {
            // The BMP and GIF writers only take 8-bit buffers
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buffer, format)
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buffer, format)
        };
        written.map_err(Error::Encode)?;
        Ok(buffer.into_inner())
    }
}

/// Lossless formats keep their type (quality has no effect there); anything
/// else leaves as JPEG.
fn reencode_target(media_type: &MediaType) -> MediaType {
    match media_type.as_str() {
        "image/png" => MediaType::png(),
        "image/gif" => MediaType::gif(),
        "image/bmp" => MediaType::bmp(),
        _ => MediaType::jpeg(),
    }
}

fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if max_dimension == 0 || width.max(height) <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: u8, background: Background) -> Result<Vec<u8>> {
    let rgb = flatten(img, background);
    let (width, height) = rgb.dimensions();

    let mut result_data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut result_data, quality.clamp(1, 100));
    encoder
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(Error::Encode)?;

    Ok(result_data)
}

/// Composite onto an opaque background; JPEG has no alpha.
fn flatten(img: &DynamicImage, background: Background) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let [br, bg, bb] = background.0;
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let alpha = p[3] as u16;
        let blend = |c: u8, b: u8| ((c as u16 * alpha + b as u16 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(p[0], br), blend(p[1], bg), blend(p[2], bb)])
    })
}
