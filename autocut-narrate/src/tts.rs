//! Text-to-speech backends. The HTTP engine speaks the contract of a
//! Piper-style service: POST text, WAV bytes back, duration in a header.

use std::io::Cursor;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use hound::{SampleFormat, WavSpec, WavWriter};

#[derive(Debug, Clone)]
pub struct TtsAudio {
    pub wav: Bytes,
    pub sample_rate: u32,
    pub duration_secs: f32,
}

#[async_trait]
pub trait TtsEngine: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<TtsAudio>;
}

#[derive(Debug, Clone)]
pub struct HttpTtsConfig {
    pub endpoint: String,
    /// Piper speed control; 1.0 is normal, lower is faster.
    pub length_scale: f32,
}

pub struct HttpTtsEngine {
    cfg: HttpTtsConfig,
    client: reqwest::Client,
}

impl HttpTtsEngine {
    pub fn new(cfg: HttpTtsConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TtsEngine for HttpTtsEngine {
    async fn synthesize(&self, text: &str) -> Result<TtsAudio> {
        if text.trim().is_empty() {
            return Err(anyhow!("empty narration text"));
        }
        let body = serde_json::json!({
            "text": text,
            "length_scale": self.cfg.length_scale,
        });
        let response = self
            .client
            .post(&self.cfg.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let sample_rate = header_f64(&response, "X-Sample-Rate").unwrap_or(16_000.0) as u32;
        let header_duration = header_f64(&response, "X-Audio-Duration");
        let wav = response.bytes().await?;

        let duration_secs = header_duration.unwrap_or_else(|| {
            // 16-bit mono PCM after the 44-byte WAV header.
            let samples = wav.len().saturating_sub(44) / 2;
            samples as f64 / sample_rate as f64
        }) as f32;

        Ok(TtsAudio {
            wav,
            sample_rate,
            duration_secs,
        })
    }
}

fn header_f64(response: &reqwest::Response, name: &str) -> Option<f64> {
    response
        .headers()
        .get(name)?
        .to_str()
        .ok()?
        .parse::<f64>()
        .ok()
}

/// Deterministic offline engine: synthesizes silence at roughly speaking
/// pace. Keeps the full pipeline runnable with no TTS service.
pub struct SilenceTts {
    pub sample_rate: u32,
    pub secs_per_word: f32,
}

impl Default for SilenceTts {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            secs_per_word: 0.3,
        }
    }
}

#[async_trait]
impl TtsEngine for SilenceTts {
    async fn synthesize(&self, text: &str) -> Result<TtsAudio> {
        let words = text.split_whitespace().count().max(1);
        let duration_secs = words as f32 * self.secs_per_word;
        let n_samples = (duration_secs * self.sample_rate as f32) as usize;

        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for _ in 0..n_samples {
                writer.write_sample(0i16)?;
            }
            writer.finalize()?;
        }

        Ok(TtsAudio {
            wav: Bytes::from(cursor.into_inner()),
            sample_rate: self.sample_rate,
            duration_secs,
        })
    }
}
