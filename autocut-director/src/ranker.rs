//! The ranker: at a fixed tick rate, reduce each live camera's latest
//! observations to one published score.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use autocut_analyzers::ObservationCache;
use autocut_core::{now_ts, CameraFeatures, CameraScore, DirectorConfig};
use autocut_events::Bus;

use crate::features::{self, FeatureContext, FeatureSet};
use crate::scorer::Scorer;
use crate::state::ProgramShared;

#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub ranking_rate_hz: f64,
    pub staleness_window_sec: f64,
    pub v_max: f32,
    pub novelty_tau_sec: f64,
    pub keyword_k: usize,
    pub interest_decay_sec: f64,
}

impl From<&DirectorConfig> for RankerConfig {
    fn from(cfg: &DirectorConfig) -> Self {
        Self {
            ranking_rate_hz: cfg.ranking_rate_hz,
            staleness_window_sec: cfg.policy.staleness_window_sec,
            v_max: cfg.v_max,
            novelty_tau_sec: cfg.novelty_tau_sec,
            keyword_k: cfg.keyword_k,
            interest_decay_sec: 2.0,
        }
    }
}

pub struct Ranker {
    cache: Arc<ObservationCache>,
    bus: Arc<Bus>,
    shared: Arc<ProgramShared>,
    scorer: Box<dyn Scorer>,
    cfg: RankerConfig,
}

impl Ranker {
    pub fn new(
        cache: Arc<ObservationCache>,
        bus: Arc<Bus>,
        shared: Arc<ProgramShared>,
        scorer: Box<dyn Scorer>,
        cfg: RankerConfig,
    ) -> Self {
        Self {
            cache,
            bus,
            shared,
            scorer,
            cfg,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs_f64(1.0 / self.cfg.ranking_rate_hz);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("ranker running at {:.1} Hz", self.cfg.ranking_rate_hz);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for score in self.tick(now_ts()) {
                        self.bus.publish_score(score);
                    }
                }
                _ = shutdown.changed() => {
                    info!("ranker shutting down");
                    return;
                }
            }
        }
    }

    /// One ranking pass: exactly one score per live camera, tagged `now`.
    pub fn tick(&self, now: f64) -> Vec<CameraScore> {
        self.cache.prune_stale(now, self.cfg.staleness_window_sec);

        let mut records = self.cache.snapshot();
        records.sort_by(|a, b| a.cam_id.cmp(&b.cam_id));

        let state = self.shared.snapshot();
        let program_cam = state.current_cam.clone();
        let sightings: Vec<_> = records
            .iter()
            .filter_map(|rec| features::subject_sighting(rec))
            .collect();
        let hottest = features::hottest_subject(&sightings, now, program_cam.as_deref());

        let mut scores = Vec::with_capacity(records.len());
        for rec in &records {
            if rec.degraded {
                scores.push(CameraScore {
                    cam_id: rec.cam_id.clone(),
                    timestamp: now,
                    score: 0.0,
                    reason: "degraded".into(),
                    features: CameraFeatures::default(),
                });
                continue;
            }

            let ctx = FeatureContext {
                now,
                v_max: self.cfg.v_max,
                novelty_tau_sec: self.cfg.novelty_tau_sec,
                keyword_k: self.cfg.keyword_k,
                interest_decay_sec: self.cfg.interest_decay_sec,
                speech_max_age_sec: self.cfg.staleness_window_sec,
                program_cam: program_cam.as_deref(),
                last_on_air: &state.last_on_air,
                hottest_subject: hottest,
            };
            let fs = features::compute(rec, &ctx);
            let has_observations = rec.detections.is_some()
                || rec.tracks.is_some()
                || rec.speech.is_some()
                || rec.scene.is_some();

            let (score, reason) = if has_observations {
                (self.scorer.score(&fs), self.rationale(&fs))
            } else {
                // Camera just joined: keep its stream aligned with a zeroed
                // placeholder score.
                (0.0, "no-data".to_string())
            };

            scores.push(CameraScore {
                cam_id: rec.cam_id.clone(),
                timestamp: now,
                score,
                reason,
                features: fs.to_features(),
            });
        }
        scores
    }

    /// Threshold phrases in the ranker's stock vocabulary, ordered by
    /// weighted contribution; the two strongest make the reason. Stable
    /// formatting, <= 140 chars. A camera whose features all sit below
    /// their phrase thresholds reads as `general scene`.
    fn rationale(&self, fs: &FeatureSet) -> String {
        let contribs = self.scorer.contributions(fs);
        // (weighted contribution, phrase); pushed in contribution order so
        // the stable sort keeps ties deterministic.
        let mut phrases: Vec<(f32, String)> = Vec::new();
        for (name, value, weighted) in &contribs {
            let phrase = match *name {
                "faceSalience" if *value > 0.6 => Some("face visible".to_string()),
                "motionSalience" if *value > 0.5 => Some("high motion".to_string()),
                "speechEnergy" if *value > 0.5 => Some("speech detected".to_string()),
                "keywordBoost" if *value > 0.0 && !fs.keywords.is_empty() => {
                    Some(format!("keywords: {}", top_keywords(&fs.keywords)))
                }
                "continuityBonus" if *value > 0.5 => Some("subject tracked".to_string()),
                "interest" if *value >= 0.75 => Some("high interest".to_string()),
                _ => None,
            };
            if let Some(phrase) = phrase {
                phrases.push((*weighted, phrase));
            }
        }
        if !fs.tags.is_empty() {
            // Tags ride on the scene interest contribution, after the
            // interest phrase itself on ties.
            let interest = contribs
                .iter()
                .find(|(name, _, _)| *name == "interest")
                .map(|(_, _, weighted)| *weighted)
                .unwrap_or(0.0);
            let tags: Vec<&str> = fs.tags.iter().take(2).map(String::as_str).collect();
            phrases.push((interest, format!("tags: {}", tags.join(","))));
        }

        if phrases.is_empty() {
            return "general scene".to_string();
        }
        phrases.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut reason = phrases
            .iter()
            .take(2)
            .map(|(_, phrase)| phrase.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if reason.len() > 140 {
            let mut cut = 140;
            while !reason.is_char_boundary(cut) {
                cut -= 1;
            }
            reason.truncate(cut);
        }
        reason
    }
}

/// Up to two distinct keywords, first-seen order.
fn top_keywords(keywords: &[String]) -> String {
    let mut seen: Vec<&str> = Vec::with_capacity(2);
    for keyword in keywords {
        if !seen.contains(&keyword.as_str()) {
            seen.push(keyword);
        }
        if seen.len() == 2 {
            break;
        }
    }
    seen.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_keywords_dedupes_in_order() {
        let hits = vec![
            "goal".to_string(),
            "goal".to_string(),
            "applause".to_string(),
            "wow".to_string(),
        ];
        assert_eq!(top_keywords(&hits), "goal,applause");
        assert_eq!(top_keywords(&["goal".to_string()]), "goal");
    }
}
