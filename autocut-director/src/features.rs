//! Per-camera feature extraction. Every feature lands in [0,1]; an absent
//! slot (analyzer unavailable) stays `None` so the scorer can redistribute
//! its weight instead of punishing the camera with a zero.

use std::collections::HashMap;

use autocut_analyzers::CamObservations;
use autocut_core::{CamId, CameraFeatures, Track};

/// Cross-cam identity heuristic for the main subject: track ids do not
/// survive across cameras, so class plus frame quadrant stands in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectKey {
    pub class: String,
    pub quadrant: u8,
}

#[derive(Debug, Clone)]
pub struct SubjectSighting {
    pub cam_id: CamId,
    pub key: SubjectKey,
    pub age: u32,
    pub ts: f64,
}

/// Inputs shared by every camera's feature pass on one ranking tick.
pub struct FeatureContext<'a> {
    pub now: f64,
    pub v_max: f32,
    pub novelty_tau_sec: f64,
    pub keyword_k: usize,
    /// Seconds before a carried scene interest fully decays.
    pub interest_decay_sec: f64,
    /// Carried speech older than this is treated as absent.
    pub speech_max_age_sec: f64,
    pub program_cam: Option<&'a str>,
    pub last_on_air: &'a HashMap<CamId, f64>,
    pub hottest_subject: Option<&'a SubjectKey>,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub face_salience: Option<f32>,
    pub main_subject_overlap: Option<f32>,
    pub motion_salience: Option<f32>,
    pub speech_energy: Option<f32>,
    pub keyword_boost: Option<f32>,
    pub framing_score: Option<f32>,
    pub novelty_decay: Option<f32>,
    pub continuity_bonus: Option<f32>,
    pub interest: Option<f32>,
    pub tags: Vec<String>,
    pub top_objects: Vec<String>,
    pub recent_speech_text: String,
    pub keywords: Vec<String>,
}

impl FeatureSet {
    /// Values in weight order, parallel to `RankingWeights::named`.
    pub fn slots(&self) -> [Option<f32>; 9] {
        [
            self.face_salience,
            self.main_subject_overlap,
            self.motion_salience,
            self.speech_energy,
            self.keyword_boost,
            self.framing_score,
            self.novelty_decay,
            self.continuity_bonus,
            self.interest,
        ]
    }

    /// Wire representation; absent slots publish as zero.
    pub fn to_features(&self) -> CameraFeatures {
        let get = |v: Option<f32>| v.unwrap_or(0.0);
        CameraFeatures {
            face_salience: get(self.face_salience),
            main_subject_overlap: get(self.main_subject_overlap),
            motion_salience: get(self.motion_salience),
            speech_energy: get(self.speech_energy),
            keyword_boost: get(self.keyword_boost),
            framing_score: get(self.framing_score),
            novelty_decay: get(self.novelty_decay),
            continuity_bonus: get(self.continuity_bonus),
            interest: get(self.interest),
            tags: self.tags.clone(),
            top_objects: self.top_objects.clone(),
            recent_speech_text: self.recent_speech_text.clone(),
        }
    }
}

/// The camera's main-subject sighting for cross-cam matching, if it has one.
pub fn subject_sighting(rec: &CamObservations) -> Option<SubjectSighting> {
    let tracks = rec.tracks.as_ref()?;
    let id = rec.main_subject?;
    let track = tracks.iter().find(|t| t.track_id == id)?;
    Some(SubjectSighting {
        cam_id: rec.cam_id.clone(),
        key: SubjectKey {
            class: track.class.clone(),
            quadrant: track.bbox.quadrant(),
        },
        age: track.age,
        ts: rec.ts,
    })
}

/// The globally hottest subject over sightings from the last second: the
/// longest-lived one, ties resolved in favor of the current program cam.
pub fn hottest_subject<'a>(
    sightings: &'a [SubjectSighting],
    now: f64,
    program_cam: Option<&str>,
) -> Option<&'a SubjectKey> {
    sightings
        .iter()
        .filter(|s| now - s.ts <= 1.0)
        .max_by_key(|s| (s.age, Some(s.cam_id.as_str()) == program_cam))
        .map(|s| &s.key)
}

pub fn compute(rec: &CamObservations, ctx: &FeatureContext) -> FeatureSet {
    let mut fs = FeatureSet::default();

    if let Some(detections) = &rec.detections {
        let face: f32 = detections
            .iter()
            .filter(|d| d.is_person())
            .map(|d| d.bbox.area() * d.confidence)
            .sum();
        fs.face_salience = Some(face.clamp(0.0, 1.0));

        fs.framing_score = Some(
            detections
                .iter()
                .max_by(|a, b| {
                    a.bbox
                        .area()
                        .partial_cmp(&b.bbox.area())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|d| rule_of_thirds(d.bbox.centroid()))
                .unwrap_or(0.0),
        );

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for d in detections {
            *counts.entry(d.class.as_str()).or_default() += 1;
        }
        let mut classes: Vec<(&str, usize)> = counts.into_iter().collect();
        classes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        fs.top_objects = classes.iter().take(3).map(|(c, _)| c.to_string()).collect();
    }

    if let Some(tracks) = &rec.tracks {
        fs.motion_salience = Some(motion_salience(tracks, ctx.v_max));

        let main = rec
            .main_subject
            .and_then(|id| tracks.iter().find(|t| t.track_id == id));
        fs.continuity_bonus = Some(
            main.map(|t| (t.age as f32 / 30.0).min(1.0))
                .unwrap_or(0.0),
        );
        fs.main_subject_overlap = Some(match (main, ctx.hottest_subject) {
            (Some(track), Some(hot)) => {
                let key = SubjectKey {
                    class: track.class.clone(),
                    quadrant: track.bbox.quadrant(),
                };
                if key == *hot {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        });
    }

    let speech_fresh = rec
        .speech_ts
        .map_or(true, |ts| ctx.now - ts <= ctx.speech_max_age_sec);
    if let (Some(segments), true) = (&rec.speech, speech_fresh) {
        let speech_present = !segments.is_empty();
        let energy = segments
            .iter()
            .map(|s| s.energy_db)
            .fold(f32::NEG_INFINITY, f32::max);
        fs.speech_energy = Some(if speech_present {
            normalize_dbfs(energy)
        } else {
            0.0
        });

        let keyword_hits: usize = segments.iter().map(|s| s.keywords.len()).sum();
        fs.keyword_boost = Some((keyword_hits as f32 / ctx.keyword_k as f32).min(1.0));
        fs.keywords = segments.iter().flat_map(|s| s.keywords.clone()).collect();
        fs.recent_speech_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    fs.novelty_decay = Some(novelty(&rec.cam_id, ctx));

    if let (Some(scene), Some(scene_ts)) = (&rec.scene, rec.scene_ts) {
        let age = (ctx.now - scene_ts).max(0.0);
        let decay = (1.0 - age / ctx.interest_decay_sec).clamp(0.0, 1.0) as f32;
        fs.interest = Some(scene.normalized_interest() * decay);
        fs.tags = scene.tags.clone();
    }

    fs
}

fn motion_salience(tracks: &[Track], v_max: f32) -> f32 {
    let speeds: Vec<f32> = tracks
        .iter()
        .filter(|t| t.age >= 3)
        .filter_map(|t| t.velocity)
        .map(|[dx, dy]| ((dx * dx + dy * dy).sqrt() / v_max).min(1.0))
        .collect();
    if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f32>() / speeds.len() as f32
    }
}

/// -60 dBFS and below is 0, -10 dBFS and above is 1.
pub fn normalize_dbfs(db: f32) -> f32 {
    ((db + 60.0) / 50.0).clamp(0.0, 1.0)
}

/// Proximity of a point to the nearest rule-of-thirds intersection: 1 at an
/// intersection, 0 at the farthest possible point (a frame corner).
pub fn rule_of_thirds((cx, cy): (f32, f32)) -> f32 {
    if !(0.0..=1.0).contains(&cx) || !(0.0..=1.0).contains(&cy) {
        return 0.0;
    }
    let points = [
        (1.0 / 3.0, 1.0 / 3.0),
        (2.0 / 3.0, 1.0 / 3.0),
        (1.0 / 3.0, 2.0 / 3.0),
        (2.0 / 3.0, 2.0 / 3.0),
    ];
    let d = points
        .iter()
        .map(|(px, py)| ((cx - px).powi(2) + (cy - py).powi(2)).sqrt())
        .fold(f32::INFINITY, f32::min);
    let d_max = (2.0f32).sqrt() / 3.0;
    (1.0 - d / d_max).clamp(0.0, 1.0)
}

/// How "fresh" a camera is: 0 right after leaving program, approaching 1
/// with time away. Never-selected cameras are fully novel; the current
/// program cam keeps whatever it had when it went on air.
fn novelty(cam_id: &str, ctx: &FeatureContext) -> f32 {
    match ctx.last_on_air.get(cam_id) {
        Some(&left_at) => {
            let dt = (ctx.now - left_at).max(0.0);
            (1.0 - (-dt / ctx.novelty_tau_sec).exp()) as f32
        }
        None => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocut_core::{BBox, Detection, SceneDescription, SpeechSegment};

    fn base_ctx<'a>(last_on_air: &'a HashMap<CamId, f64>) -> FeatureContext<'a> {
        FeatureContext {
            now: 10.0,
            v_max: 0.5,
            novelty_tau_sec: 8.0,
            keyword_k: 3,
            interest_decay_sec: 2.0,
            speech_max_age_sec: 2.0,
            program_cam: None,
            last_on_air,
            hottest_subject: None,
        }
    }

    fn rec_with_detections(detections: Vec<Detection>) -> CamObservations {
        let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
        rec.detections = Some(detections);
        rec
    }

    #[test]
    fn absent_slots_stay_none() {
        let empty = HashMap::new();
        let rec = CamObservations::next_tick(None, "cam-a", 10.0);
        let fs = compute(&rec, &base_ctx(&empty));
        assert!(fs.face_salience.is_none());
        assert!(fs.speech_energy.is_none());
        assert!(fs.interest.is_none());
        // Novelty is derived from program history, always present.
        assert_eq!(fs.novelty_decay, Some(1.0));
    }

    #[test]
    fn face_salience_sums_person_boxes() {
        let empty = HashMap::new();
        let rec = rec_with_detections(vec![
            Detection::new("person", 1.0, BBox::new(0.0, 0.0, 0.5, 0.5)),
            Detection::new("chair", 1.0, BBox::new(0.5, 0.5, 0.5, 0.5)),
        ]);
        let fs = compute(&rec, &base_ctx(&empty));
        assert!((fs.face_salience.unwrap() - 0.25).abs() < 1e-6);
        assert_eq!(fs.top_objects, vec!["chair".to_string(), "person".to_string()]);
    }

    #[test]
    fn speech_energy_is_gated_by_presence() {
        let empty = HashMap::new();
        let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
        rec.speech = Some(vec![]);
        let fs = compute(&rec, &base_ctx(&empty));
        // Window analyzed, no speech present: zero, not absent.
        assert_eq!(fs.speech_energy, Some(0.0));
        assert_eq!(fs.keyword_boost, Some(0.0));
    }

    #[test]
    fn speech_energy_normalizes_dbfs_window() {
        assert_eq!(normalize_dbfs(-60.0), 0.0);
        assert_eq!(normalize_dbfs(-10.0), 1.0);
        assert!((normalize_dbfs(-35.0) - 0.5).abs() < 1e-6);
        assert_eq!(normalize_dbfs(-80.0), 0.0);
        assert_eq!(normalize_dbfs(0.0), 1.0);
    }

    #[test]
    fn keyword_boost_saturates_at_k() {
        let empty = HashMap::new();
        let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
        rec.speech = Some(vec![SpeechSegment {
            text: "goal goal goal goal".into(),
            start_ts: 9.0,
            end_ts: 10.0,
            word_timings: vec![],
            keywords: vec!["goal".into(); 4],
            energy_db: -20.0,
        }]);
        let fs = compute(&rec, &base_ctx(&empty));
        assert_eq!(fs.keyword_boost, Some(1.0));
    }

    #[test]
    fn rule_of_thirds_peaks_at_intersections() {
        assert!((rule_of_thirds((1.0 / 3.0, 1.0 / 3.0)) - 1.0).abs() < 1e-6);
        assert!(rule_of_thirds((0.5, 0.5)) > 0.0);
        assert!(rule_of_thirds((0.0, 0.0)) < rule_of_thirds((1.0 / 3.0, 1.0 / 3.0)));
        // Off-screen centroid scores zero.
        assert_eq!(rule_of_thirds((1.4, 0.5)), 0.0);
    }

    #[test]
    fn novelty_rises_with_time_off_air() {
        let mut last = HashMap::new();
        last.insert("cam-a".to_string(), 10.0);
        let mut ctx = base_ctx(&last);

        ctx.now = 10.0;
        let fresh = compute(&CamObservations::next_tick(None, "cam-a", 10.0), &ctx);
        assert!(fresh.novelty_decay.unwrap() < 1e-6);

        ctx.now = 18.0;
        let later = compute(&CamObservations::next_tick(None, "cam-a", 18.0), &ctx);
        assert!(later.novelty_decay.unwrap() > 0.6);

        ctx.now = 60.0;
        let long = compute(&CamObservations::next_tick(None, "cam-a", 60.0), &ctx);
        assert!(long.novelty_decay.unwrap() > 0.99);
    }

    #[test]
    fn interest_decays_linearly_after_scene_refresh() {
        let empty = HashMap::new();
        let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
        rec.scene = Some(SceneDescription {
            tags: vec!["concert".into()],
            caption: "a stage".into(),
            interest: 5.0,
            confidence: 0.9,
        });
        rec.scene_ts = Some(10.0);

        let mut ctx = base_ctx(&empty);
        ctx.now = 10.0;
        assert_eq!(compute(&rec, &ctx).interest, Some(1.0));
        ctx.now = 11.0;
        assert!((compute(&rec, &ctx).interest.unwrap() - 0.5).abs() < 1e-6);
        ctx.now = 12.5;
        assert_eq!(compute(&rec, &ctx).interest, Some(0.0));
    }

    #[test]
    fn hottest_subject_prefers_age_then_program_cam() {
        let sightings = vec![
            SubjectSighting {
                cam_id: "cam-a".into(),
                key: SubjectKey {
                    class: "person".into(),
                    quadrant: 0,
                },
                age: 10,
                ts: 10.0,
            },
            SubjectSighting {
                cam_id: "cam-b".into(),
                key: SubjectKey {
                    class: "person".into(),
                    quadrant: 3,
                },
                age: 10,
                ts: 10.0,
            },
            SubjectSighting {
                cam_id: "cam-c".into(),
                key: SubjectKey {
                    class: "dog".into(),
                    quadrant: 1,
                },
                age: 5,
                ts: 10.0,
            },
        ];
        let hot = hottest_subject(&sightings, 10.0, Some("cam-b")).unwrap();
        assert_eq!(hot.quadrant, 3);

        // Stale sightings are ignored.
        let hot = hottest_subject(&sightings, 20.0, None);
        assert!(hot.is_none());
    }
}
