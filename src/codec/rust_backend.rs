//! Production codec built on the `image` crate, with libwebp for WebP.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Detect container | `image::ImageReader::with_guessed_format` (magic bytes, then extension) |
//! | Decode animated GIF / APNG / WebP | `image::AnimationDecoder::into_frames` |
//! | Decode everything else | `image::ImageReader::decode` |
//! | Encode JPEG | `JpegEncoder::new_with_quality` (alpha flattened onto white) |
//! | Encode PNG | `PngEncoder::new_with_quality` (quality → compression effort) |
//! | Encode WebP (still + animated) | `webp::Encoder`, `webp::AnimEncoder` |
//! | Encode animated GIF | `GifEncoder::encode_frames` |
//! | Loop count, final WebP frame duration | raw chunk access in `codec::container` |
//! | Encode BMP / TIFF / ICO / still GIF | `DynamicImage::write_to` |
//! | ICO downscale | `DynamicImage::resize` with `Lanczos3` |
//!
//! Every frame is decoded up front and kept as full-canvas RGBA, so any frame
//! can be encoded in any order. Animated outputs keep each frame's delay and
//! the source's loop count.

use super::backend::{Codec, CodecError, SourceImage};
use super::container;
use super::params::{MAX_ICO_DIMENSION, Quality, png_compression};
use crate::format::Format;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{FilterType as PngFilter, PngDecoder, PngEncoder};
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{
    AnimationDecoder, DynamicImage, ExtendedColorType, Frame, ImageEncoder, ImageFormat,
    ImageReader, Rgb, RgbImage, RgbaImage,
};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// Delay used for frames that carry none, matching common viewer behavior.
const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Pure `image`-crate codec (plus libwebp for WebP output).
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path) -> impl Fn(image::ImageError) -> CodecError + '_ {
    move |e| CodecError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn encode_error(e: image::ImageError) -> CodecError {
    CodecError::Encode(e.to_string())
}

fn open_buffered(path: &Path) -> Result<BufReader<File>, CodecError> {
    Ok(BufReader::new(File::open(path)?))
}

fn decode_still(path: &Path) -> Result<Vec<Frame>, CodecError> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(decode_error(path))?;
    Ok(vec![Frame::new(img.to_rgba8())])
}

/// Decode every frame of `path`, using the animation decoder when the
/// container can animate.
fn decode_frames(path: &Path, format: Option<ImageFormat>) -> Result<Vec<Frame>, CodecError> {
    let frames = match format {
        Some(ImageFormat::Gif) => GifDecoder::new(open_buffered(path)?)
            .map_err(decode_error(path))?
            .into_frames()
            .collect_frames()
            .map_err(decode_error(path))?,
        Some(ImageFormat::Png) => {
            let decoder = PngDecoder::new(open_buffered(path)?).map_err(decode_error(path))?;
            if decoder.is_apng().map_err(decode_error(path))? {
                decoder
                    .apng()
                    .map_err(decode_error(path))?
                    .into_frames()
                    .collect_frames()
                    .map_err(decode_error(path))?
            } else {
                decode_still(path)?
            }
        }
        Some(ImageFormat::WebP) => {
            let decoder = WebPDecoder::new(open_buffered(path)?).map_err(decode_error(path))?;
            if decoder.has_animation() {
                decoder
                    .into_frames()
                    .collect_frames()
                    .map_err(decode_error(path))?
            } else {
                decode_still(path)?
            }
        }
        _ => decode_still(path)?,
    };

    if frames.is_empty() {
        return Err(CodecError::Decode {
            path: path.to_path_buf(),
            message: "image contains no frames".to_string(),
        });
    }
    Ok(frames)
}

/// Display time of a frame in whole milliseconds.
fn frame_delay_ms(frame: &Frame) -> u32 {
    let (numer, denom) = frame.delay().numer_denom_ms();
    match numer.checked_div(denom) {
        Some(0) | None => DEFAULT_FRAME_DELAY_MS,
        Some(ms) => ms,
    }
}

/// Composite RGBA pixels onto a white background.
fn flatten_on_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Adapt a frame to what `format` can hold: ICO size limit, no alpha for
/// formats without transparency.
fn prepare_frame(frame: &RgbaImage, format: Format) -> DynamicImage {
    let mut img = DynamicImage::ImageRgba8(frame.clone());
    if format == Format::Ico && (img.width() > MAX_ICO_DIMENSION || img.height() > MAX_ICO_DIMENSION)
    {
        img = img.resize(MAX_ICO_DIMENSION, MAX_ICO_DIMENSION, FilterType::Lanczos3);
    }
    if !format.capabilities().supports_alpha {
        img = DynamicImage::ImageRgb8(flatten_on_white(&img.to_rgba8()));
    }
    img
}

fn encode_still(img: &DynamicImage, format: Format, quality: Quality) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    match format {
        Format::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.value().max(1))
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .map_err(encode_error)?;
        }
        Format::Png => {
            let rgba = img.to_rgba8();
            PngEncoder::new_with_quality(&mut buf, png_compression(quality), PngFilter::Adaptive)
                .write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(encode_error)?;
        }
        Format::Webp => {
            let rgba = img.to_rgba8();
            let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                .encode(quality.value() as f32);
            buf.extend_from_slice(&encoded);
        }
        Format::Gif | Format::Bmp | Format::Tiff | Format::Ico => {
            img.write_to(&mut Cursor::new(&mut buf), format.to_image_format())
                .map_err(encode_error)?;
        }
    }
    Ok(buf)
}

fn encode_animated_gif(source: &SourceImage) -> Result<Vec<u8>, CodecError> {
    let repeat = match source.loop_count() {
        0 => Repeat::Infinite,
        n => Repeat::Finite(n),
    };
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(repeat).map_err(encode_error)?;
        encoder
            .encode_frames(source.frames().iter().cloned())
            .map_err(encode_error)?;
    }
    Ok(buf)
}

fn encode_animated_webp(source: &SourceImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
    let first = source.frame(0)?.buffer();
    let (width, height) = (first.width(), first.height());

    let mut config = webp::WebPConfig::new()
        .map_err(|_| CodecError::Encode("failed to initialize WebP encoder config".into()))?;
    config.quality = quality.value() as f32;

    let mut encoder = webp::AnimEncoder::new(width, height, &config);
    encoder.set_loop_count(source.loop_count() as i32);
    let mut timestamp: i32 = 0;
    for frame in source.frames() {
        let buffer = frame.buffer();
        encoder.add_frame(webp::AnimFrame::from_rgba(
            buffer.as_raw(),
            buffer.width(),
            buffer.height(),
            timestamp,
        ));
        timestamp = timestamp.saturating_add(frame_delay_ms(frame) as i32);
    }
    let encoded = encoder
        .try_encode()
        .map_err(|e| CodecError::Encode(format!("animated WebP encode failed: {e:?}")))?;

    // The encoder is closed without an end timestamp, so the last frame's
    // duration is a guess until it is set from the source.
    let mut bytes = encoded.to_vec();
    container::set_webp_total_duration(&mut bytes, timestamp.max(0) as u32);
    Ok(bytes)
}

impl Codec for RustCodec {
    fn open(&self, path: &Path) -> Result<SourceImage, CodecError> {
        let detected = ImageReader::open(path)?.with_guessed_format()?.format();
        let frames = decode_frames(path, detected)?;
        let source = SourceImage::new(path, detected.and_then(Format::from_image_format), frames);

        // Containers without a stored count loop forever.
        let loop_count = match detected {
            Some(format) if source.is_animated() => {
                container::loop_count(&std::fs::read(path)?, format).unwrap_or(0)
            }
            _ => 0,
        };
        Ok(source.with_loop_count(loop_count))
    }

    fn encode_frame(
        &self,
        source: &SourceImage,
        index: usize,
        format: Format,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError> {
        let frame = source.frame(index)?;
        let img = prepare_frame(frame.buffer(), format);
        encode_still(&img, format, quality)
    }

    fn encode_animated(
        &self,
        source: &SourceImage,
        format: Format,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError> {
        match format {
            Format::Gif => encode_animated_gif(source),
            Format::Webp => encode_animated_webp(source, quality),
            other => Err(CodecError::Encode(format!(
                "{other} cannot hold an animation"
            ))),
        }
    }
}
