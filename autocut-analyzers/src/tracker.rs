//! Greedy IoU tracker. One instance serves all cameras but state is strictly
//! per-cam; ids never cross cameras.

use std::collections::HashMap;

use autocut_core::{BBox, Detection, Track};

use crate::traits::{FrameMeta, Tracker};

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Ticks a track survives without a matching detection.
    pub max_age: u32,
    /// IoU threshold for associating detections to tracks.
    pub iou_threshold: f32,
    /// Minimum detection confidence to start a new track.
    pub init_min_score: f32,
    /// Window (ticks) considered by the main-subject rule.
    pub main_subject_window: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            iou_threshold: 0.3,
            init_min_score: 0.3,
            main_subject_window: 30,
        }
    }
}

#[derive(Debug, Clone)]
struct TrackState {
    id: u64,
    class: String,
    bbox: BBox,
    age: u32,
    misses: u32,
    score: f32,
    velocity: Option<[f32; 2]>,
    last_ts: f64,
    /// Tick index when this track last matched a detection.
    last_seen_tick: u64,
}

#[derive(Debug, Default)]
struct CamTracks {
    tracks: Vec<TrackState>,
    next_id: u64,
    tick: u64,
}

pub struct CentroidTracker {
    cfg: TrackerConfig,
    cams: HashMap<String, CamTracks>,
}

impl CentroidTracker {
    pub fn new(cfg: TrackerConfig) -> Self {
        Self {
            cfg,
            cams: HashMap::new(),
        }
    }
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Tracker for CentroidTracker {
    fn update(&mut self, cam_id: &str, detections: &[Detection], meta: FrameMeta) -> Vec<Track> {
        let cfg = self.cfg.clone();
        let cam = self.cams.entry(cam_id.to_string()).or_default();
        cam.tick += 1;

        // Greedy association, highest-confidence detections first.
        let mut order: Vec<usize> = (0..detections.len()).collect();
        order.sort_by(|&a, &b| {
            detections[b]
                .confidence
                .partial_cmp(&detections[a].confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut claimed = vec![false; cam.tracks.len()];
        let mut matched_detection = vec![false; detections.len()];

        for &di in &order {
            let det = &detections[di];
            let mut best: Option<(usize, f32)> = None;
            for (ti, track) in cam.tracks.iter().enumerate() {
                if claimed[ti] || track.class != det.class {
                    continue;
                }
                let iou = track.bbox.iou(&det.bbox);
                if iou >= cfg.iou_threshold && best.map_or(true, |(_, b)| iou > b) {
                    best = Some((ti, iou));
                }
            }
            if let Some((ti, _)) = best {
                claimed[ti] = true;
                matched_detection[di] = true;
                let track = &mut cam.tracks[ti];
                let dt = (meta.ts - track.last_ts).max(1e-3) as f32;
                let (ox, oy) = track.bbox.centroid();
                let (nx, ny) = det.bbox.centroid();
                track.velocity = Some([(nx - ox) / dt, (ny - oy) / dt]);
                track.bbox = det.bbox;
                track.score = det.confidence;
                track.age += 1;
                track.misses = 0;
                track.last_ts = meta.ts;
                track.last_seen_tick = cam.tick;
            }
        }

        // Age out unmatched tracks.
        for (ti, track) in cam.tracks.iter_mut().enumerate() {
            if !claimed[ti] {
                track.misses += 1;
            }
        }
        cam.tracks.retain(|t| t.misses <= cfg.max_age);

        // New tracks from confident unmatched detections.
        for (di, det) in detections.iter().enumerate() {
            if matched_detection[di] || det.confidence < cfg.init_min_score {
                continue;
            }
            cam.next_id += 1;
            cam.tracks.push(TrackState {
                id: cam.next_id,
                class: det.class.clone(),
                bbox: det.bbox,
                age: 1,
                misses: 0,
                score: det.confidence,
                velocity: None,
                last_ts: meta.ts,
                last_seen_tick: cam.tick,
            });
        }

        cam.tracks
            .iter()
            .map(|t| Track {
                track_id: t.id,
                class: t.class.clone(),
                bbox: t.bbox,
                age: t.age,
                score: t.score,
                velocity: t.velocity,
            })
            .collect()
    }

    fn main_subject(&self, cam_id: &str) -> Option<u64> {
        let cam = self.cams.get(cam_id)?;
        let window_floor = cam.tick.saturating_sub(self.cfg.main_subject_window as u64);
        cam.tracks
            .iter()
            .filter(|t| t.last_seen_tick > window_floor)
            .max_by(|a, b| {
                // Longest-lived first; proximity to frame center breaks the
                // tie, bbox area breaks any remainder.
                a.age.cmp(&b.age).then_with(|| {
                    center_proximity(&b.bbox)
                        .partial_cmp(&center_proximity(&a.bbox))
                        .unwrap_or(std::cmp::Ordering::Equal)
                }).then_with(|| {
                    a.bbox
                        .area()
                        .partial_cmp(&b.bbox.area())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
            })
            .map(|t| t.id)
    }

    fn forget(&mut self, cam_id: &str) {
        self.cams.remove(cam_id);
    }
}

/// Distance from the bbox centroid to the frame center, normalized units.
fn center_proximity(bbox: &BBox) -> f32 {
    let (cx, cy) = bbox.centroid();
    ((cx - 0.5).powi(2) + (cy - 0.5).powi(2)).sqrt()
}
