//! End-to-end conversions through the public API with the real codec.
//!
//! Fixtures are generated into a temp directory per test; outputs are decoded
//! again with `RustCodec` to check what was actually written.

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, Delay, Frame, Frames, Rgba, RgbaImage};
use image_convert::batch::{BatchReport, BatchRunner, submit_batch};
use image_convert::codec::{Codec, Quality, RustCodec};
use image_convert::format::Format;
use image_convert::job::{
    self, ConversionJob, ConversionOutcome, ErrorKind, SkipReason, TargetSpec,
};
use image_convert::naming::PathClaims;
use image_convert::policy::{AnimationPolicy, EffectiveMode};
use std::collections::HashSet;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_png(path: &Path, width: u32, height: u32) -> PathBuf {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 120, 255])
    })
    .save(path)
    .unwrap();
    path.to_path_buf()
}

fn write_gif(path: &Path, frames: usize) -> PathBuf {
    write_timed_gif(path, &vec![60; frames])
}

fn write_timed_gif(path: &Path, delays_ms: &[u32]) -> PathBuf {
    let file = fs::File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    encoder
        .encode_frames(delays_ms.iter().enumerate().map(|(i, &delay)| {
            let shade = (i * 25 % 256) as u8;
            let buffer = RgbaImage::from_pixel(12, 10, Rgba([shade, 0, 255 - shade, 255]));
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(delay, 1))
        }))
        .unwrap();
    path.to_path_buf()
}

/// Per-frame display times of an animated GIF or WebP, in milliseconds.
fn delays_in(path: &Path) -> Vec<u32> {
    let reader = BufReader::new(fs::File::open(path).unwrap());
    let frames: Frames = match path.extension().and_then(|e| e.to_str()) {
        Some("gif") => GifDecoder::new(reader).unwrap().into_frames(),
        Some("webp") => WebPDecoder::new(reader).unwrap().into_frames(),
        other => panic!("not an animated output: {other:?}"),
    };
    frames
        .collect_frames()
        .unwrap()
        .iter()
        .map(|f| {
            let (numer, denom) = f.delay().numer_denom_ms();
            numer / denom
        })
        .collect()
}

fn target(format: Format, animation: AnimationPolicy) -> TargetSpec {
    TargetSpec::new(format, Quality::default(), animation)
}

fn outcome_for<'a>(report: &'a BatchReport, source: &Path) -> &'a ConversionOutcome {
    &report
        .entries()
        .iter()
        .find(|e| e.job.source == source)
        .unwrap_or_else(|| panic!("no outcome for {}", source.display()))
        .outcome
}

fn frames_in(path: &Path) -> usize {
    let codec = RustCodec::new();
    let source = codec.open(path).unwrap();
    codec.frame_count(&source)
}

#[test]
fn ten_frame_animation_to_jpeg_force_split() {
    let tmp = TempDir::new().unwrap();
    let gif = write_gif(&tmp.path().join("walk.gif"), 10);
    let job = ConversionJob::new(&gif, target(Format::Jpeg, AnimationPolicy::ForceSplit), None);

    let outcome = job::execute(&job, &RustCodec::new(), &PathClaims::new(false));

    let ConversionOutcome::Success {
        outputs,
        mode,
        source_frames,
    } = outcome
    else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(mode, EffectiveMode::FrameSplit);
    assert_eq!(source_frames, 10);
    let expected: Vec<PathBuf> = (0..10)
        .map(|i| tmp.path().join(format!("walk_{i:04}.jpg")))
        .collect();
    assert_eq!(outputs, expected);
    for path in &outputs {
        assert_eq!(frames_in(path), 1);
    }
}

#[test]
fn static_png_to_gif_is_single_frame() {
    let tmp = TempDir::new().unwrap();
    let png = write_png(&tmp.path().join("still.png"), 20, 16);
    let job = ConversionJob::new(&png, target(Format::Gif, AnimationPolicy::Auto), None);

    let outcome = job::execute(&job, &RustCodec::new(), &PathClaims::new(false));

    match outcome {
        ConversionOutcome::Success { outputs, mode, .. } => {
            assert_eq!(mode, EffectiveMode::SingleFrame);
            assert_eq!(outputs, vec![tmp.path().join("still.gif")]);
            let img = image::open(&outputs[0]).unwrap();
            assert_eq!((img.width(), img.height()), (20, 16));
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn animated_gif_to_webp_keeps_all_frames() {
    let tmp = TempDir::new().unwrap();
    let gif = write_gif(&tmp.path().join("spin.gif"), 5);
    let job = ConversionJob::new(&gif, target(Format::Webp, AnimationPolicy::Auto), None);

    let outcome = job::execute(&job, &RustCodec::new(), &PathClaims::new(false));

    match outcome {
        ConversionOutcome::Success { outputs, mode, .. } => {
            assert_eq!(mode, EffectiveMode::AnimatedPassthrough);
            assert_eq!(outputs, vec![tmp.path().join("spin.webp")]);
            assert_eq!(frames_in(&outputs[0]), 5);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn animated_gif_to_gif_keeps_all_frames() {
    let tmp = TempDir::new().unwrap();
    let gif = write_gif(&tmp.path().join("loop.gif"), 3);
    let out = tmp.path().join("out");
    let job = ConversionJob::new(&gif, target(Format::Gif, AnimationPolicy::Auto), Some(out.clone()));

    let outcome = job::execute(&job, &RustCodec::new(), &PathClaims::new(false));

    assert_eq!(outcome.outputs(), &[out.join("loop.gif")]);
    assert_eq!(frames_in(&out.join("loop.gif")), 3);
}

#[test]
fn animated_passthrough_keeps_uneven_frame_timing() {
    let tmp = TempDir::new().unwrap();
    let gif = write_timed_gif(&tmp.path().join("pause.gif"), &[100, 100, 500]);
    let codec = RustCodec::new();

    for format in [Format::Gif, Format::Webp] {
        let out = tmp.path().join(format.extension());
        let job = ConversionJob::new(&gif, target(format, AnimationPolicy::Auto), Some(out));

        let outcome = job::execute(&job, &codec, &PathClaims::new(false));

        let outputs = outcome.outputs();
        assert_eq!(outputs.len(), 1, "{format}: {outcome:?}");
        assert_eq!(delays_in(&outputs[0]), vec![100, 100, 500], "{format}");
    }
}

#[test]
fn animated_to_ico_skip_if_animated_continues_batch() {
    let tmp = TempDir::new().unwrap();
    let gif = write_gif(&tmp.path().join("clip.gif"), 4);
    let png = write_png(&tmp.path().join("icon.png"), 32, 32);
    let policy = target(Format::Ico, AnimationPolicy::SkipIfAnimated);

    let report = submit_batch(&RustCodec::new(), &[gif.clone(), png.clone()], policy, None, 2)
        .unwrap();

    assert_eq!(report.len(), 2);
    assert_eq!(
        outcome_for(&report, &gif),
        &ConversionOutcome::Skipped {
            reason: SkipReason::AnimationUnsupported
        }
    );
    assert!(!tmp.path().join("clip.ico").exists());
    assert_eq!(
        outcome_for(&report, &png).outputs(),
        &[tmp.path().join("icon.ico")]
    );
}

#[test]
fn deleted_source_fails_alone() {
    let tmp = TempDir::new().unwrap();
    let sources: Vec<PathBuf> = (1..=5)
        .map(|i| write_png(&tmp.path().join(format!("shot{i}.png")), 8, 8))
        .collect();
    fs::remove_file(&sources[2]).unwrap();

    let report = submit_batch(
        &RustCodec::new(),
        &sources,
        target(Format::Jpeg, AnimationPolicy::Auto),
        None,
        3,
    )
    .unwrap();

    assert_eq!(report.len(), 5);
    assert!(matches!(
        outcome_for(&report, &sources[2]),
        ConversionOutcome::Failed {
            kind: ErrorKind::SourceUnreadable,
            ..
        }
    ));
    for (i, source) in sources.iter().enumerate().filter(|(i, _)| *i != 2) {
        let outputs = outcome_for(&report, source).outputs();
        assert_eq!(outputs, &[tmp.path().join(format!("shot{}.jpg", i + 1))]);
        assert!(outputs[0].exists());
    }
}

#[test]
fn corrupt_source_is_unreadable() {
    let tmp = TempDir::new().unwrap();
    let bogus = tmp.path().join("bogus.png");
    fs::write(&bogus, b"definitely not a png").unwrap();
    let job = ConversionJob::new(&bogus, target(Format::Bmp, AnimationPolicy::Auto), None);

    let outcome = job::execute(&job, &RustCodec::new(), &PathClaims::new(false));

    assert!(matches!(
        outcome,
        ConversionOutcome::Failed {
            kind: ErrorKind::SourceUnreadable,
            ..
        }
    ));
    assert!(!tmp.path().join("bogus.bmp").exists());
}

#[test]
fn single_frame_conversion_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let png = write_png(&tmp.path().join("same.png"), 24, 24);
    let job = ConversionJob::new(&png, target(Format::Jpeg, AnimationPolicy::Auto), None);
    let codec = RustCodec::new();

    let first = job::execute(&job, &codec, &PathClaims::new(true));
    let first_bytes = fs::read(&first.outputs()[0]).unwrap();
    let second = job::execute(&job, &codec, &PathClaims::new(true));
    let second_bytes = fs::read(&second.outputs()[0]).unwrap();

    assert_eq!(first.outputs(), second.outputs());
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn colliding_base_names_get_distinct_paths() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    let jobs: Vec<ConversionJob> = (0..6)
        .map(|i| {
            let dir = tmp.path().join(format!("cam{i}"));
            fs::create_dir_all(&dir).unwrap();
            let source = write_png(&dir.join("frame.png"), 6, 6);
            ConversionJob::new(
                source,
                target(Format::Webp, AnimationPolicy::Auto),
                Some(out.clone()),
            )
        })
        .collect();

    let codec = RustCodec::new();
    let report = BatchRunner::new(&codec).run(jobs, 4).unwrap();

    let outputs: HashSet<PathBuf> = report
        .entries()
        .iter()
        .flat_map(|e| e.outcome.outputs().to_vec())
        .collect();
    assert_eq!(outputs.len(), 6);
    assert!(outputs.iter().all(|p| p.exists()));
}

#[test]
fn directory_input_converts_into_sibling_directory() {
    let tmp = TempDir::new().unwrap();
    let album = tmp.path().join("album");
    fs::create_dir_all(&album).unwrap();
    write_png(&album.join("a.png"), 8, 8);
    write_gif(&album.join("b.gif"), 2);
    fs::write(album.join("notes.txt"), "not an image").unwrap();

    let report = submit_batch(
        &RustCodec::new(),
        &[album],
        target(Format::Png, AnimationPolicy::ForceSplit),
        None,
        2,
    )
    .unwrap();

    let converted = tmp.path().join("album_converted");
    assert_eq!(report.summary().succeeded, 2);
    assert_eq!(report.summary().animated, 1);
    assert!(converted.join("a.png").exists());
    assert!(converted.join("b_0000.png").exists());
    assert!(converted.join("b_0001.png").exists());
}

#[test]
fn report_serializes_to_json() {
    let tmp = TempDir::new().unwrap();
    let png = write_png(&tmp.path().join("one.png"), 4, 4);

    let report = submit_batch(
        &RustCodec::new(),
        &[png],
        target(Format::Tiff, AnimationPolicy::Auto),
        None,
        1,
    )
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["entries"][0]["outcome"]["status"], "success");
    assert_eq!(json["entries"][0]["outcome"]["mode"], "single_frame");
    assert_eq!(json["entries"][0]["job"]["target"]["format"], "tiff");
}
