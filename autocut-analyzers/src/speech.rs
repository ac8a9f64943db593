//! Speech recognition. Two engines share the energy math: a local
//! energy-only recognizer that detects speech presence without producing
//! text, and an HTTP adapter for a real ASR service that returns word-level
//! timings.

use std::io::Cursor;

use anyhow::Result;
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::Deserialize;
use tracing::debug;

use autocut_core::{AudioChunk, KeywordBag, SpeechSegment, WordTiming};

use crate::traits::{SpeechRecognizer, Unavailable};

/// RMS level of a PCM window in dBFS. Silence floors at -80.
pub fn rms_dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return -80.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / i16::MAX as f64;
            v * v
        })
        .sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        -80.0
    } else {
        (20.0 * rms.log10()).max(-80.0) as f32
    }
}

/// Energy-gated voice activity without transcription. Keeps the speech
/// feature path alive when no ASR backend is configured.
pub struct EnergySpeechRecognizer {
    /// Windows below this level are treated as silence.
    pub vad_floor_db: f32,
}

impl Default for EnergySpeechRecognizer {
    fn default() -> Self {
        Self { vad_floor_db: -45.0 }
    }
}

#[async_trait]
impl SpeechRecognizer for EnergySpeechRecognizer {
    async fn transcribe(&self, audio: &AudioChunk) -> Result<Vec<SpeechSegment>> {
        let energy = rms_dbfs(&audio.samples);
        if energy < self.vad_floor_db {
            return Ok(Vec::new());
        }
        let duration = audio.duration_secs();
        Ok(vec![SpeechSegment {
            text: String::new(),
            start_ts: audio.ts - duration,
            end_ts: audio.ts,
            word_timings: Vec::new(),
            keywords: Vec::new(),
            energy_db: energy,
        }])
    }
}

#[derive(Debug, Deserialize)]
struct WireWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<WireWord>,
}

#[derive(Debug, Clone)]
pub struct HttpSpeechRecognizerConfig {
    pub endpoint: String,
    pub vad_floor_db: f32,
}

pub struct HttpSpeechRecognizer {
    cfg: HttpSpeechRecognizerConfig,
    client: reqwest::Client,
    bag: KeywordBag,
}

impl HttpSpeechRecognizer {
    pub fn new(cfg: HttpSpeechRecognizerConfig, keywords: &[String]) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
            bag: KeywordBag::new(keywords),
        }
    }
}

fn wav_bytes(audio: &AudioChunk) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in audio.samples.iter() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[async_trait]
impl SpeechRecognizer for HttpSpeechRecognizer {
    async fn transcribe(&self, audio: &AudioChunk) -> Result<Vec<SpeechSegment>> {
        let energy = rms_dbfs(&audio.samples);
        if energy < self.cfg.vad_floor_db {
            // Below the floor there is nothing worth shipping upstream.
            return Ok(Vec::new());
        }

        let wav = wav_bytes(audio)?;
        let response = self
            .client
            .post(&self.cfg.endpoint)
            .header("Content-Type", "audio/wav")
            .body(wav)
            .send()
            .await
            .map_err(|e| Unavailable::new(format!("asr endpoint unreachable: {}", e)))?;
        if response.status().as_u16() == 503 {
            return Err(Unavailable::new("asr model warming up"));
        }
        let parsed: TranscribeResponse = response.error_for_status()?.json().await?;

        if parsed.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let duration = audio.duration_secs();
        let window_start = audio.ts - duration;
        let word_timings: Vec<WordTiming> = parsed
            .words
            .iter()
            .map(|w| WordTiming {
                word: w.word.clone(),
                start_ts: window_start + w.start,
                end_ts: window_start + w.end,
            })
            .collect();
        let end_ts = word_timings
            .iter()
            .map(|w| w.end_ts)
            .fold(audio.ts, f64::max);

        let keywords = self.bag.extract(&parsed.text);
        debug!(
            "asr for {}: {} words, {} keyword hits",
            audio.cam_id,
            word_timings.len(),
            keywords.len()
        );

        Ok(vec![SpeechSegment {
            text: parsed.text,
            start_ts: window_start,
            end_ts,
            word_timings,
            keywords,
            energy_db: energy,
        }])
    }
}
