use std::sync::Arc;

use autocut_analyzers::{CamObservations, ObservationCache};
use autocut_core::{
    BBox, Detection, DirectorConfig, RankingWeights, SceneDescription, SpeechSegment, Track,
};
use autocut_director::{ProgramShared, Ranker, RankerConfig, WeightedSum};
use autocut_events::Bus;

fn ranker(cache: Arc<ObservationCache>, shared: Arc<ProgramShared>) -> Ranker {
    let cfg = RankerConfig::from(&DirectorConfig::default());
    Ranker::new(
        cache,
        Arc::new(Bus::new()),
        shared,
        Box::new(WeightedSum::new(RankingWeights::default())),
        cfg,
    )
}

fn person_track(id: u64, age: u32) -> Track {
    Track {
        track_id: id,
        class: "person".into(),
        bbox: BBox::new(0.25, 0.2, 0.3, 0.5),
        age,
        score: 0.9,
        velocity: Some([0.1, 0.0]),
    }
}

#[test]
fn one_score_per_cam_per_tick() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    for cam in ["cam-a", "cam-b", "cam-c"] {
        cache.upsert(CamObservations::next_tick(None, cam, 10.0));
    }
    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    assert_eq!(scores.len(), 3);
    let mut cams: Vec<&str> = scores.iter().map(|s| s.cam_id.as_str()).collect();
    cams.dedup();
    assert_eq!(cams.len(), 3);
    assert!(scores.iter().all(|s| s.timestamp == 10.0));
}

#[test]
fn just_joined_cam_scores_no_data() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    cache.upsert(CamObservations::next_tick(None, "cam-a", 10.0));
    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    assert_eq!(scores[0].score, 0.0);
    assert_eq!(scores[0].reason, "no-data");
    assert_eq!(scores[0].features.face_salience, 0.0);
}

#[test]
fn degraded_cam_scores_zero() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
    rec.degraded = true;
    // Even with observations present, degraded forces zero.
    rec.detections = Some(vec![Detection::new(
        "person",
        0.9,
        BBox::new(0.2, 0.2, 0.5, 0.5),
    )]);
    cache.upsert(rec);
    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    assert_eq!(scores[0].score, 0.0);
    assert_eq!(scores[0].reason, "degraded");
}

#[test]
fn scores_and_features_stay_in_range() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
    // Deliberately hot inputs: huge boxes, loud audio, many keywords.
    rec.detections = Some(vec![
        Detection::new("person", 1.0, BBox::new(0.0, 0.0, 1.0, 1.0)),
        Detection::new("person", 1.0, BBox::new(0.0, 0.0, 1.0, 1.0)),
    ]);
    rec.tracks = Some(vec![person_track(1, 500)]);
    rec.main_subject = Some(1);
    rec.scene = Some(SceneDescription {
        tags: vec!["crowd".into()],
        caption: "a crowd".into(),
        interest: 5.0,
        confidence: 1.0,
    });
    rec.scene_ts = Some(10.0);
    rec.speech = Some(vec![SpeechSegment {
        text: "goal goal goal goal goal".into(),
        start_ts: 9.0,
        end_ts: 10.0,
        word_timings: vec![],
        keywords: vec!["goal".into(); 5],
        energy_db: 0.0,
    }]);
    rec.speech_ts = Some(10.0);
    cache.upsert(rec);

    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    let score = &scores[0];
    assert!((0.0..=1.0).contains(&score.score));
    assert!(score.features.all_in_range());
}

#[test]
fn rationale_orders_the_two_strongest_phrases() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
    // A dominant face box and a long-lived tracked subject; motion and
    // speech stay below their phrase thresholds.
    rec.detections = Some(vec![Detection::new(
        "person",
        0.95,
        BBox::new(0.1, 0.05, 0.8, 0.9),
    )]);
    rec.tracks = Some(vec![person_track(1, 20)]);
    rec.main_subject = Some(1);
    rec.speech = Some(vec![SpeechSegment {
        text: "quiet room".into(),
        start_ts: 9.0,
        end_ts: 10.0,
        word_timings: vec![],
        keywords: vec![],
        energy_db: -40.0,
    }]);
    cache.upsert(rec);

    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    let reason = &scores[0].reason;
    assert!(reason.len() <= 140);
    // Face salience carries the bigger weighted contribution.
    assert_eq!(reason, "face visible, subject tracked");
}

#[test]
fn keyword_rationale_lists_distinct_keywords() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
    rec.speech = Some(vec![SpeechSegment {
        text: "goal goal applause".into(),
        start_ts: 9.0,
        end_ts: 10.0,
        word_timings: vec![],
        keywords: vec!["goal".into(), "goal".into(), "applause".into()],
        energy_db: -60.0,
    }]);
    cache.upsert(rec);

    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    assert_eq!(scores[0].reason, "keywords: goal,applause");
}

#[test]
fn high_interest_scene_brings_its_tags() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
    rec.scene = Some(SceneDescription {
        tags: vec!["crowd".into(), "stage".into(), "lights".into()],
        caption: "a crowd in front of a stage".into(),
        interest: 5.0,
        confidence: 0.9,
    });
    rec.scene_ts = Some(10.0);
    cache.upsert(rec);

    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    assert_eq!(scores[0].reason, "high interest, tags: crowd,stage");
}

#[test]
fn weak_features_fall_back_to_general_scene() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let mut rec = CamObservations::next_tick(None, "cam-a", 10.0);
    // Observations exist, but nothing clears a phrase threshold. This is
    // distinct from the no-observations case, which stays "no-data".
    rec.detections = Some(vec![]);
    rec.speech = Some(vec![]);
    cache.upsert(rec);

    let ranker = ranker(cache, shared);
    let scores = ranker.tick(10.0);
    assert_eq!(scores[0].reason, "general scene");
}

#[test]
fn stale_cams_are_pruned_from_ranking() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    cache.upsert(CamObservations::next_tick(None, "cam-old", 1.0));
    cache.upsert(CamObservations::next_tick(None, "cam-new", 9.9));
    let ranker = ranker(cache.clone(), shared);
    let scores = ranker.tick(10.0);
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].cam_id, "cam-new");
    assert!(cache.get("cam-old").is_none());
}

#[test]
fn timestamps_are_monotonic_per_cam_across_ticks() {
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let ranker = ranker(cache.clone(), shared);
    let mut last = f64::MIN;
    for i in 0..10 {
        let now = 10.0 + i as f64 * 0.1;
        cache.upsert(CamObservations::next_tick(None, "cam-a", now));
        let scores = ranker.tick(now);
        assert_eq!(scores.len(), 1);
        assert!(scores[0].timestamp > last);
        last = scores[0].timestamp;
    }
}
