//! Scene understanding behind a VLM-style HTTP endpoint. Called at a lower
//! cadence than detection because a description costs an order of magnitude
//! more than a detector pass.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use autocut_core::{Detection, Frame, SceneDescription};

use crate::detector::frame_to_base64_jpeg;
use crate::traits::{SceneDescriber, Unavailable};

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    caption: String,
    /// 1..5; clipped on our side regardless of what the model says.
    interest: f32,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

#[derive(Debug, Clone)]
pub struct HttpSceneDescriberConfig {
    pub endpoint: String,
    pub jpeg_quality: u8,
}

pub struct HttpSceneDescriber {
    cfg: HttpSceneDescriberConfig,
    client: reqwest::Client,
}

impl HttpSceneDescriber {
    pub fn new(cfg: HttpSceneDescriberConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SceneDescriber for HttpSceneDescriber {
    async fn describe(&self, frame: &Frame, detections: &[Detection]) -> Result<SceneDescription> {
        let image = frame_to_base64_jpeg(frame, self.cfg.jpeg_quality)?;
        let classes: Vec<&str> = detections.iter().map(|d| d.class.as_str()).collect();
        let body = serde_json::json!({
            "image": image,
            "camId": frame.cam_id,
            "detectedClasses": classes,
        });

        let response = self
            .client
            .post(&self.cfg.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Unavailable::new(format!("scene endpoint unreachable: {}", e)))?;
        if response.status().as_u16() == 503 {
            return Err(Unavailable::new("scene model warming up"));
        }
        let parsed: DescribeResponse = response.error_for_status()?.json().await?;

        debug!(
            "scene for {}: interest {} tags {:?}",
            frame.cam_id, parsed.interest, parsed.tags
        );
        Ok(SceneDescription {
            tags: parsed.tags,
            caption: parsed.caption,
            interest: parsed.interest.clamp(1.0, 5.0),
            confidence: parsed.confidence.clamp(0.0, 1.0),
        })
    }
}
