//! Object detection behind an HTTP inference endpoint. The engine (YOLO or
//! anything with the same contract) runs out of process; this adapter only
//! ships frames and validates what comes back.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use serde::Deserialize;
use tracing::debug;

use autocut_core::{BBox, Detection, Frame};

use crate::traits::{Detector, Unavailable};

pub fn encode_frame_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let img = RgbImage::from_raw(frame.width, frame.height, frame.data.as_ref().clone())
        .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&img)
        .context("jpeg encode failed")?;
    Ok(buf)
}

pub fn frame_to_base64_jpeg(frame: &Frame, quality: u8) -> Result<String> {
    Ok(base64::engine::general_purpose::STANDARD.encode(encode_frame_jpeg(frame, quality)?))
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    class: String,
    confidence: f32,
    /// Normalized [x, y, w, h].
    bbox: [f32; 4],
    #[serde(default)]
    track_id: Option<u64>,
    #[serde(default)]
    velocity: Option<[f32; 2]>,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<WireDetection>,
}

#[derive(Debug, Clone)]
pub struct HttpDetectorConfig {
    pub endpoint: String,
    pub confidence_threshold: f32,
    /// When non-empty, only these classes pass.
    pub class_filter: Vec<String>,
    pub jpeg_quality: u8,
}

impl Default for HttpDetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            confidence_threshold: 0.3,
            class_filter: Vec::new(),
            jpeg_quality: 80,
        }
    }
}

pub struct HttpDetector {
    cfg: HttpDetectorConfig,
    client: reqwest::Client,
}

impl HttpDetector {
    pub fn new(cfg: HttpDetectorConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let image = frame_to_base64_jpeg(frame, self.cfg.jpeg_quality)?;
        let body = serde_json::json!({
            "image": image,
            "camId": frame.cam_id,
            "timestamp": frame.ts,
            "confidenceThreshold": self.cfg.confidence_threshold,
        });

        let response = self
            .client
            .post(&self.cfg.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Unavailable::new(format!("detector endpoint unreachable: {}", e)))?;

        if response.status().as_u16() == 503 {
            return Err(Unavailable::new("detector warming up"));
        }
        let response = response.error_for_status()?;
        let parsed: DetectResponse = response.json().await?;

        let mut detections = Vec::with_capacity(parsed.detections.len());
        for wire in parsed.detections {
            if wire.confidence < self.cfg.confidence_threshold {
                continue;
            }
            if !self.cfg.class_filter.is_empty() && !self.cfg.class_filter.contains(&wire.class) {
                continue;
            }
            let [x, y, w, h] = wire.bbox;
            let bbox = BBox::new(x, y, w, h);
            detections.push(Detection {
                class: wire.class,
                confidence: wire.confidence,
                centroid: Some(bbox.centroid()),
                bbox,
                track_id: wire.track_id,
                velocity: wire.velocity,
            });
        }
        debug!(
            "detector returned {} detections for {}",
            detections.len(),
            frame.cam_id
        );
        Ok(detections)
    }
}

/// Sanity-check an observation before it enters the cache. Anything out of
/// range poisons the whole tick for that camera.
pub fn validate_detections(detections: &[Detection]) -> bool {
    detections.iter().all(|d| {
        d.confidence.is_finite()
            && (0.0..=1.0).contains(&d.confidence)
            && d.bbox.w.is_finite()
            && d.bbox.h.is_finite()
            && d.bbox.w >= 0.0
            && d.bbox.h >= 0.0
            && d.bbox.x.is_finite()
            && d.bbox.y.is_finite()
    })
}
