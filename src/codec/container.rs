//! Animation metadata read from and written into raw container bytes.
//!
//! The `image` decoders hand out frames and delays but not the loop count,
//! and libwebp closes an animation without an end timestamp. Both live in
//! small fixed-layout chunks, handled here:
//!
//! | Container | Chunk | Field |
//! |---|---|---|
//! | GIF | `NETSCAPE2.0` application extension | loop count, u16 LE |
//! | PNG (APNG) | `acTL` | play count, u32 BE |
//! | WebP | `ANIM` | loop count, u16 LE at offset 4 |
//! | WebP | `ANMF` | frame duration, u24 LE at offset 12 |
//!
//! A loop count of 0 means the animation repeats forever in all three.

use image::ImageFormat;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const MAX_FRAME_DURATION_MS: u32 = 0xFF_FFFF;

/// Loop count stored in an animated container, if it has one.
pub fn loop_count(bytes: &[u8], format: ImageFormat) -> Option<u16> {
    match format {
        ImageFormat::Gif => gif_loop_count(bytes),
        ImageFormat::Png => apng_loop_count(bytes),
        ImageFormat::WebP => webp_loop_count(bytes),
        _ => None,
    }
}

fn gif_loop_count(bytes: &[u8]) -> Option<u16> {
    [b"NETSCAPE2.0", b"ANIMEXTS1.0"].iter().find_map(|tag| {
        let start = bytes.windows(tag.len()).position(|w| w == tag.as_slice())? + tag.len();
        match bytes.get(start..start + 4)? {
            [3, 1, lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    })
}

fn apng_loop_count(bytes: &[u8]) -> Option<u16> {
    if !bytes.starts_with(PNG_SIGNATURE) {
        return None;
    }
    let mut pos = PNG_SIGNATURE.len();
    while let Some(header) = bytes.get(pos..pos + 8) {
        let len = u32::from_be_bytes(header[0..4].try_into().ok()?) as usize;
        let data = bytes.get(pos + 8..pos + 8 + len)?;
        match &header[4..8] {
            b"acTL" => {
                let plays = u32::from_be_bytes(data.get(4..8)?.try_into().ok()?);
                return Some(plays.min(u16::MAX as u32) as u16);
            }
            // acTL must come before the image data
            b"IDAT" => return None,
            _ => {}
        }
        // length, type, data, CRC
        pos += 12 + len;
    }
    None
}

/// Payload location of one RIFF chunk.
struct Chunk {
    id: [u8; 4],
    start: usize,
    len: usize,
}

fn riff_chunks(bytes: &[u8]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if !bytes.starts_with(b"RIFF") || bytes.get(8..12) != Some(b"WEBP".as_slice()) {
        return chunks;
    }
    let mut pos = 12;
    while let Some(header) = bytes.get(pos..pos + 8) {
        let id = [header[0], header[1], header[2], header[3]];
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = pos + 8;
        if start + len > bytes.len() {
            break;
        }
        chunks.push(Chunk { id, start, len });
        // payloads are padded to an even length
        pos = start + len + (len & 1);
    }
    chunks
}

fn webp_loop_count(bytes: &[u8]) -> Option<u16> {
    riff_chunks(bytes)
        .into_iter()
        .find(|c| &c.id == b"ANIM" && c.len >= 6)
        .map(|c| u16::from_le_bytes([bytes[c.start + 4], bytes[c.start + 5]]))
}

fn read_u24(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// Set the last frame's duration of an animated WebP so the whole animation
/// lasts `total_ms`.
///
/// libwebp assigns the last frame a guessed duration when the stream is
/// closed without an end timestamp. Earlier frames are left untouched; a
/// stream without `ANMF` frames is returned as is.
pub fn set_webp_total_duration(webp: &mut [u8], total_ms: u32) {
    let frames: Vec<Chunk> = riff_chunks(webp)
        .into_iter()
        .filter(|c| &c.id == b"ANMF" && c.len >= 16)
        .collect();
    let Some((last, earlier)) = frames.split_last() else {
        return;
    };
    let elapsed: u32 = earlier
        .iter()
        .map(|c| read_u24(&webp[c.start + 12..]))
        .fold(0, u32::saturating_add);
    let duration = total_ms.saturating_sub(elapsed).min(MAX_FRAME_DURATION_MS);
    webp[last.start + 12..last.start + 15].copy_from_slice(&duration.to_le_bytes()[..3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_timed_gif;
    use image::codecs::gif::Repeat;

    fn riff_chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn anmf(duration_ms: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 16];
        payload[12..15].copy_from_slice(&duration_ms.to_le_bytes()[..3]);
        riff_chunk(b"ANMF", &payload)
    }

    fn webp_container(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        out.extend_from_slice(b"WEBP");
        out.extend_from_slice(&body);
        out
    }

    fn anmf_durations(webp: &[u8]) -> Vec<u32> {
        riff_chunks(webp)
            .into_iter()
            .filter(|c| &c.id == b"ANMF")
            .map(|c| read_u24(&webp[c.start + 12..]))
            .collect()
    }

    #[test]
    fn gif_loop_count_read_from_netscape_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let finite = tmp.path().join("three.gif");
        let forever = tmp.path().join("forever.gif");
        write_timed_gif(&finite, &[50, 50], Repeat::Finite(3), 4, 4);
        write_timed_gif(&forever, &[50, 50], Repeat::Infinite, 4, 4);

        let bytes = std::fs::read(&finite).unwrap();
        assert_eq!(loop_count(&bytes, ImageFormat::Gif), Some(3));
        let bytes = std::fs::read(&forever).unwrap();
        assert_eq!(loop_count(&bytes, ImageFormat::Gif), Some(0));
    }

    #[test]
    fn gif_without_extension_has_no_loop_count() {
        assert_eq!(gif_loop_count(b"GIF89a\x01\x00\x01\x00\x00\x00\x00;"), None);
    }

    #[test]
    fn apng_loop_count_read_from_actl() {
        let mut png = PNG_SIGNATURE.to_vec();
        let mut chunk = |kind: &[u8; 4], data: &[u8]| {
            png.extend_from_slice(&(data.len() as u32).to_be_bytes());
            png.extend_from_slice(kind);
            png.extend_from_slice(data);
            png.extend_from_slice(&[0; 4]);
        };
        chunk(b"IHDR", &[0; 13]);
        chunk(b"acTL", &[0, 0, 0, 4, 0, 0, 0, 2]);
        chunk(b"IDAT", &[]);

        assert_eq!(loop_count(&png, ImageFormat::Png), Some(2));
    }

    #[test]
    fn apng_actl_after_image_data_is_ignored() {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&[0, 0, 0, 0]);
        png.extend_from_slice(b"IDAT");
        png.extend_from_slice(&[0; 4]);
        png.extend_from_slice(&[0, 0, 0, 8]);
        png.extend_from_slice(b"acTL");
        png.extend_from_slice(&[0, 0, 0, 4, 0, 0, 0, 2, 0, 0, 0, 0]);

        assert_eq!(apng_loop_count(&png), None);
    }

    #[test]
    fn webp_loop_count_read_from_anim() {
        let webp = webp_container(&[
            riff_chunk(b"VP8X", &[0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
            riff_chunk(b"ANIM", &[255, 255, 255, 255, 5, 0]),
            anmf(100),
        ]);
        assert_eq!(loop_count(&webp, ImageFormat::WebP), Some(5));
    }

    #[test]
    fn webp_total_duration_rewrites_only_last_frame() {
        let mut webp = webp_container(&[
            riff_chunk(b"ANIM", &[0; 6]),
            anmf(100),
            anmf(100),
            anmf(100),
        ]);
        set_webp_total_duration(&mut webp, 700);
        assert_eq!(anmf_durations(&webp), vec![100, 100, 500]);
    }

    #[test]
    fn webp_total_duration_covers_merged_frames() {
        // libwebp folds identical frames into one ANMF with the summed time
        let mut webp = webp_container(&[anmf(300), anmf(40)]);
        set_webp_total_duration(&mut webp, 800);
        assert_eq!(anmf_durations(&webp), vec![300, 500]);
    }

    #[test]
    fn webp_without_frames_is_unchanged() {
        let original = webp_container(&[riff_chunk(b"VP8L", &[1, 2, 3])]);
        let mut webp = original.clone();
        set_webp_total_duration(&mut webp, 500);
        assert_eq!(webp, original);
        assert_eq!(loop_count(&webp, ImageFormat::WebP), None);
    }
}
