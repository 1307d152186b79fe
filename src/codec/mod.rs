//! Codec adapter: decoding sources and encoding frames.
//!
//! | Operation | Where |
//! |---|---|
//! | **Open** (detect container, decode all frames) | [`Codec::open`] |
//! | **Frame count** | [`Codec::frame_count`] |
//! | **Encode one frame** as a still | [`Codec::encode_frame`] |
//! | **Encode an animation** with timing | [`Codec::encode_animated`] |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`] and its per-format mappings
//! - **Backend**: [`Codec`] trait + [`SourceImage`]
//! - **Rust backend**: [`RustCodec`], the production implementation
//! - **Container**: loop counts and WebP frame timing in raw chunk bytes

pub mod backend;
mod container;
mod params;
pub mod rust_backend;

pub use backend::{Codec, CodecError, Dimensions, SourceImage};
pub use params::{InvalidQuality, MAX_ICO_DIMENSION, Quality, png_compression};
pub use rust_backend::RustCodec;
