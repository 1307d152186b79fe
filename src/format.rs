//! Supported container formats and their capability table.
//!
//! Every format the converter can write is a variant of the closed [`Format`]
//! enum. What a format can hold is answered by one static table row in
//! [`Format::capabilities`], so the rest of the pipeline asks the table
//! instead of branching on format names:
//!
//! | Format | Animation | Quality | Alpha | Extension |
//! |--------|-----------|---------|-------|-----------|
//! | JPEG   | no        | yes     | no    | `.jpg`    |
//! | PNG    | no        | yes¹    | yes   | `.png`    |
//! | GIF    | yes       | no      | yes   | `.gif`    |
//! | BMP    | no        | no      | yes   | `.bmp`    |
//! | TIFF   | no²       | no      | yes   | `.tif`    |
//! | WEBP   | yes       | yes     | yes   | `.webp`   |
//! | ICO    | no        | no      | yes   | `.ico`    |
//!
//! ¹ PNG is lossless; quality maps onto compression effort instead.
//! ² TIFF can hold several pages, but the encoder only writes one.
//!
//! Adding a format means adding a variant, one table row, and its branch in
//! the codec backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unknown image format: {0:?}")]
    UnknownFormat(String),
}

/// An image container format the converter can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Gif,
    Bmp,
    #[serde(alias = "tif")]
    Tiff,
    Webp,
    Ico,
}

/// What a target format can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatCapabilities {
    /// Can hold more than one frame with timing.
    pub supports_animation: bool,
    /// Honors the scalar quality knob.
    pub supports_quality: bool,
    /// Can store transparency.
    pub supports_alpha: bool,
}

impl Format {
    /// All formats, in the order they are listed to users.
    pub const ALL: [Format; 7] = [
        Format::Jpeg,
        Format::Png,
        Format::Gif,
        Format::Bmp,
        Format::Tiff,
        Format::Webp,
        Format::Ico,
    ];

    pub fn capabilities(self) -> FormatCapabilities {
        let (supports_animation, supports_quality, supports_alpha) = match self {
            Format::Jpeg => (false, true, false),
            Format::Png => (false, true, true),
            Format::Gif => (true, false, true),
            Format::Bmp => (false, false, true),
            Format::Tiff => (false, false, true),
            Format::Webp => (true, true, true),
            Format::Ico => (false, false, true),
        };
        FormatCapabilities {
            supports_animation,
            supports_quality,
            supports_alpha,
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Bmp => "bmp",
            Format::Tiff => "tif",
            Format::Webp => "webp",
            Format::Ico => "ico",
        }
    }

    /// Every extension that identifies this format on input.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Jpeg => &["jpg", "jpeg", "jpe", "jfif"],
            Format::Png => &["png", "apng"],
            Format::Gif => &["gif"],
            Format::Bmp => &["bmp", "dib"],
            Format::Tiff => &["tif", "tiff"],
            Format::Webp => &["webp"],
            Format::Ico => &["ico"],
        }
    }

    /// Look a format up by file extension (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.to_ascii_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// The matching `image` crate format.
    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            Format::Jpeg => image::ImageFormat::Jpeg,
            Format::Png => image::ImageFormat::Png,
            Format::Gif => image::ImageFormat::Gif,
            Format::Bmp => image::ImageFormat::Bmp,
            Format::Tiff => image::ImageFormat::Tiff,
            Format::Webp => image::ImageFormat::WebP,
            Format::Ico => image::ImageFormat::Ico,
        }
    }

    pub fn from_image_format(format: image::ImageFormat) -> Option<Format> {
        Format::ALL
            .into_iter()
            .find(|f| f.to_image_format() == format)
    }

    /// Upper-case display name (`"JPEG"`, `"WEBP"`).
    pub fn name(self) -> &'static str {
        match self {
            Format::Jpeg => "JPEG",
            Format::Png => "PNG",
            Format::Gif => "GIF",
            Format::Bmp => "BMP",
            Format::Tiff => "TIFF",
            Format::Webp => "WEBP",
            Format::Ico => "ICO",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    /// Accepts a format name or any of its extensions, with or without a
    /// leading dot, in any case: `"jpeg"`, `"JPG"`, `".tif"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        Format::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(trimmed))
            .or_else(|| Format::from_extension(trimmed))
            .ok_or_else(|| FormatError::UnknownFormat(s.to_string()))
    }
}

/// Capability lookup by format identifier.
///
/// Fails with [`FormatError::UnknownFormat`] when the identifier names no
/// supported format.
pub fn capabilities_of(identifier: &str) -> Result<FormatCapabilities, FormatError> {
    identifier.parse::<Format>().map(Format::capabilities)
}
