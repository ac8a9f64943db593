//! Canonical pixel and audio conversion. Everything downstream of the
//! ingress adapter sees 8-bit RGB at the analysis size and 16-bit PCM mono
//! at 16 kHz; no other component converts media.

use std::sync::Arc;

use image::{imageops, RgbImage};

use autocut_core::Frame;

use crate::room::{RawFrame, RawPixels};

pub const ANALYSIS_WIDTH: u32 = 640;
pub const ANALYSIS_HEIGHT: u32 = 360;
pub const AUDIO_SAMPLE_RATE: u32 = 16_000;

/// Reduce a possibly-high-bit-depth component to 8 bits. Over-range values
/// saturate rather than wrap, so a 10-bit HDR source maps deterministically
/// into the 8-bit BT.709 range.
#[inline]
fn to_8bit(value: u16, bit_depth: u8) -> u8 {
    let shifted = if bit_depth > 8 {
        value >> (bit_depth - 8)
    } else {
        value
    };
    shifted.min(255) as u8
}

/// BT.709 limited-range YUV to full-range RGB.
#[inline]
fn yuv_to_rgb_bt709(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as f32 - 16.0;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    let r = 1.164 * c + 1.793 * e;
    let g = 1.164 * c - 0.213 * d - 0.533 * e;
    let b = 1.164 * c + 2.112 * d;
    [
        r.clamp(0.0, 255.0) as u8,
        g.clamp(0.0, 255.0) as u8,
        b.clamp(0.0, 255.0) as u8,
    ]
}

fn i420_to_rgb(
    y: &[u16],
    u: &[u16],
    v: &[u16],
    width: u32,
    height: u32,
    bit_depth: u8,
) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let mut rgb = vec![0u8; w * h * 3];
    for row in 0..h {
        for col in 0..w {
            let yi = row * w + col;
            let ci = (row / 2) * cw + col / 2;
            let py = to_8bit(y[yi], bit_depth);
            let pu = to_8bit(*u.get(ci).unwrap_or(&128), bit_depth);
            let pv = to_8bit(*v.get(ci).unwrap_or(&128), bit_depth);
            let px = yuv_to_rgb_bt709(py, pu, pv);
            rgb[yi * 3..yi * 3 + 3].copy_from_slice(&px);
        }
    }
    rgb
}

/// Convert a raw frame into the canonical analysis frame for `cam_id`.
pub fn canonical_frame(cam_id: &str, raw: &RawFrame) -> Option<Frame> {
    let rgb = match &raw.pixels {
        RawPixels::Rgb8(data) => {
            if data.len() != (raw.width * raw.height * 3) as usize {
                return None;
            }
            data.clone()
        }
        RawPixels::I420 { y, u, v, bit_depth } => {
            if y.len() != (raw.width * raw.height) as usize {
                return None;
            }
            i420_to_rgb(y, u, v, raw.width, raw.height, *bit_depth)
        }
    };

    let img = RgbImage::from_raw(raw.width, raw.height, rgb)?;
    let img = if raw.width != ANALYSIS_WIDTH || raw.height != ANALYSIS_HEIGHT {
        imageops::resize(
            &img,
            ANALYSIS_WIDTH,
            ANALYSIS_HEIGHT,
            imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    Some(Frame {
        cam_id: cam_id.to_string(),
        ts: raw.ts,
        width: ANALYSIS_WIDTH,
        height: ANALYSIS_HEIGHT,
        data: Arc::new(img.into_raw()),
    })
}

/// Downmix interleaved f32 to mono, resample linearly to 16 kHz, and
/// quantize to i16 with clamping.
pub fn canonical_audio(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<i16> {
    if samples.is_empty() || channels == 0 || sample_rate == 0 {
        return Vec::new();
    }
    let ch = channels as usize;
    let mono: Vec<f32> = samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect();

    let resampled: Vec<f32> = if sample_rate == AUDIO_SAMPLE_RATE {
        mono
    } else {
        let ratio = sample_rate as f64 / AUDIO_SAMPLE_RATE as f64;
        let out_len = ((mono.len() as f64) / ratio).floor() as usize;
        (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = pos as usize;
                let frac = (pos - idx as f64) as f32;
                let a = mono[idx.min(mono.len() - 1)];
                let b = mono[(idx + 1).min(mono.len() - 1)];
                a + (b - a) * frac
            })
            .collect()
    };

    resampled
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_bit_saturates_not_wraps() {
        // 1023 is full-scale 10-bit; must land at 255, not wrap to 3.
        assert_eq!(to_8bit(1023, 10), 255);
        assert_eq!(to_8bit(512, 10), 128);
        assert_eq!(to_8bit(235, 8), 235);
        // Out-of-spec over-range 8-bit input still saturates.
        assert_eq!(to_8bit(300, 8), 255);
    }

    #[test]
    fn bt709_grey_is_grey() {
        let [r, g, b] = yuv_to_rgb_bt709(126, 128, 128);
        assert!(r.abs_diff(g) <= 1 && g.abs_diff(b) <= 1);
    }

    #[test]
    fn canonical_frame_resizes_to_analysis_size() {
        let raw = RawFrame {
            width: 1280,
            height: 720,
            ts: 1.0,
            pixels: RawPixels::Rgb8(vec![10u8; 1280 * 720 * 3]),
        };
        let frame = canonical_frame("cam-a", &raw).unwrap();
        assert_eq!(frame.width, ANALYSIS_WIDTH);
        assert_eq!(frame.height, ANALYSIS_HEIGHT);
        assert_eq!(frame.data.len(), (ANALYSIS_WIDTH * ANALYSIS_HEIGHT * 3) as usize);
    }

    #[test]
    fn canonical_frame_rejects_short_buffer() {
        let raw = RawFrame {
            width: 640,
            height: 360,
            ts: 1.0,
            pixels: RawPixels::Rgb8(vec![0u8; 100]),
        };
        assert!(canonical_frame("cam-a", &raw).is_none());
    }

    #[test]
    fn i420_frame_converts() {
        let (w, h) = (64u32, 36u32);
        let raw = RawFrame {
            width: w,
            height: h,
            ts: 1.0,
            pixels: RawPixels::I420 {
                y: vec![126u16; (w * h) as usize],
                u: vec![128u16; ((w / 2) * (h / 2)) as usize],
                v: vec![128u16; ((w / 2) * (h / 2)) as usize],
                bit_depth: 8,
            },
        };
        let frame = canonical_frame("cam-a", &raw).unwrap();
        assert_eq!(frame.width, ANALYSIS_WIDTH);
    }

    #[test]
    fn audio_downmix_and_resample() {
        // 48 kHz stereo, 100 ms -> 16 kHz mono, 100 ms
        let samples = vec![0.5f32; 4800 * 2];
        let out = canonical_audio(&samples, 2, 48_000);
        assert_eq!(out.len(), 1600);
        assert!(out.iter().all(|&s| s > 0));
    }

    #[test]
    fn audio_clamps_out_of_range() {
        let samples = vec![2.0f32, -2.0];
        let out = canonical_audio(&samples, 1, AUDIO_SAMPLE_RATE);
        assert_eq!(out[0], i16::MAX);
        assert_eq!(out[1], -i16::MAX);
    }
}
