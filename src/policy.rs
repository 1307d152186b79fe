//! Animation policy resolution.
//!
//! Decides, per source, how a (possibly multi-frame) image maps onto what the
//! target format can hold. The decision depends only on three inputs and is
//! a total function over them:
//!
//! | Source frames | Target animates | Requested policy              | Effective mode         |
//! |---------------|-----------------|-------------------------------|------------------------|
//! | 1             | any             | any                           | `SingleFrame`          |
//! | >1            | yes             | any                           | `AnimatedPassthrough`  |
//! | >1            | no              | `Auto` / `ForceFirstFrame`    | `SingleFrame` (frame 0)|
//! | >1            | no              | `ForceSplit`                  | `FrameSplit`           |
//! | >1            | no              | `SkipIfAnimated`              | `Skip`                 |

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user asked for when a source is animated.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationPolicy {
    /// Keep the animation when the target can hold it, else the first frame.
    #[default]
    Auto,
    /// Only the first frame when the target cannot animate.
    ForceFirstFrame,
    /// One still file per frame when the target cannot animate.
    ForceSplit,
    /// Leave animated sources alone when the target cannot animate.
    SkipIfAnimated,
}

/// The conversion strategy chosen for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveMode {
    SingleFrame,
    AnimatedPassthrough,
    FrameSplit,
    Skip,
}

impl fmt::Display for EffectiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EffectiveMode::SingleFrame => "single frame",
            EffectiveMode::AnimatedPassthrough => "animated",
            EffectiveMode::FrameSplit => "frame split",
            EffectiveMode::Skip => "skip",
        })
    }
}

/// Resolve the effective mode for a source with `frame_count` frames.
///
/// A frame count of zero is treated like a still image.
pub fn resolve(
    frame_count: usize,
    target_supports_animation: bool,
    requested: AnimationPolicy,
) -> EffectiveMode {
    if frame_count <= 1 {
        return EffectiveMode::SingleFrame;
    }
    if target_supports_animation {
        return EffectiveMode::AnimatedPassthrough;
    }
    match requested {
        AnimationPolicy::Auto | AnimationPolicy::ForceFirstFrame => EffectiveMode::SingleFrame,
        AnimationPolicy::ForceSplit => EffectiveMode::FrameSplit,
        AnimationPolicy::SkipIfAnimated => EffectiveMode::Skip,
    }
}
