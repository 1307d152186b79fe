//! Encoding parameter types.
//!
//! - [`Quality`]: the single scalar quality knob (0–100, default 85). Clamped
//!   on construction. Only formats whose capability row says so honor it.
//! - [`png_compression`]: how PNG, which is lossless, turns quality into
//!   compression effort.

use image::codecs::png::CompressionType;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Largest width or height an ICO entry can hold.
pub const MAX_ICO_DIMENSION: u32 = 256;

/// Quality setting for lossy encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u8);

impl Quality {
    pub const LOW: Quality = Quality(50);
    pub const MEDIUM: Quality = Quality(85);
    pub const HIGH: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0 as u32
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid quality {0:?}: expected 0-100, low, medium or high")]
pub struct InvalidQuality(String);

/// Parses a number from 0 to 100 or a preset name.
impl FromStr for Quality {
    type Err = InvalidQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::LOW),
            "medium" => Ok(Quality::MEDIUM),
            "high" => Ok(Quality::HIGH),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|&n| n <= 100)
                .map(Quality::new)
                .ok_or_else(|| InvalidQuality(s.to_string())),
        }
    }
}

/// Map quality onto PNG compression effort.
///
/// Higher quality means less time spent compressing: the zlib-style level
/// `9 - q * 9 / 100` is bucketed into the three effort settings the encoder
/// offers (0–2 fast, 3–6 default, 7–9 best).
pub fn png_compression(quality: Quality) -> CompressionType {
    let level = 9 - (quality.value() as u32 * 9 / 100);
    match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 0);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_medium() {
        assert_eq!(Quality::default(), Quality::MEDIUM);
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn presets() {
        assert_eq!(Quality::LOW.value(), 50);
        assert_eq!(Quality::HIGH.value(), 100);
    }

    #[test]
    fn quality_deserializes_with_clamping() {
        let q: Quality = serde_json::from_str("250").unwrap();
        assert_eq!(q.value(), 100);
        assert_eq!(serde_json::to_string(&Quality::LOW).unwrap(), "50");
    }

    #[test]
    fn parse_numbers_and_presets() {
        assert_eq!("low".parse::<Quality>().unwrap(), Quality::LOW);
        assert_eq!("High".parse::<Quality>().unwrap(), Quality::HIGH);
        assert_eq!("70".parse::<Quality>().unwrap().value(), 70);
        assert!("101".parse::<Quality>().is_err());
        assert!("best".parse::<Quality>().is_err());
    }

    #[test]
    fn png_compression_buckets() {
        assert!(matches!(png_compression(Quality::HIGH), CompressionType::Fast));
        assert!(matches!(png_compression(Quality::new(80)), CompressionType::Fast));
        assert!(matches!(png_compression(Quality::LOW), CompressionType::Default));
        assert!(matches!(png_compression(Quality::new(10)), CompressionType::Best));
        assert!(matches!(png_compression(Quality::new(0)), CompressionType::Best));
    }
}
