//! The decision engine: sole writer of the program state. Consumes the
//! score stream, evaluates the switching policy on a fixed tick, and emits
//! exactly one decision per tick.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use autocut_analyzers::ObservationCache;
use autocut_core::{
    now_ts, CamId, CameraScore, ProgramState, SwitchAction, SwitchDecision, SwitchPolicy,
};
use autocut_events::Bus;

use crate::state::{EngineCommand, ProgramShared};

/// Switch history retained for the ping-pong guard and observability.
const HISTORY_CAP: usize = 32;

/// Grace period after the last word before a cut is considered clean.
const WORD_TAIL_SEC: f64 = 0.08;

pub struct DecisionEngine {
    shared: Arc<ProgramShared>,
    cache: Arc<ObservationCache>,
    bus: Arc<Bus>,
    policy: SwitchPolicy,
    decision_rate_hz: f64,
    state: ProgramState,
    latest: HashMap<CamId, CameraScore>,
    defer_ticks: u32,
}

impl DecisionEngine {
    pub fn new(
        shared: Arc<ProgramShared>,
        cache: Arc<ObservationCache>,
        bus: Arc<Bus>,
        policy: SwitchPolicy,
        decision_rate_hz: f64,
    ) -> Self {
        Self {
            shared,
            cache,
            bus,
            policy,
            decision_rate_hz,
            state: ProgramState::default(),
            latest: HashMap::new(),
            defer_ticks: 0,
        }
    }

    pub fn state(&self) -> &ProgramState {
        &self.state
    }

    /// Accept a score off the bus. Malformed scores are dropped here so the
    /// policy only ever sees well-formed input.
    pub fn ingest(&mut self, score: CameraScore) {
        if !score.score.is_finite() || !(0.0..=1.0).contains(&score.score) {
            warn!(
                "dropping malformed score for {}: {}",
                score.cam_id, score.score
            );
            return;
        }
        if let Some(prev) = self.latest.get(&score.cam_id) {
            if score.timestamp < prev.timestamp {
                return;
            }
        }
        self.latest.insert(score.cam_id.clone(), score);
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs_f64(1.0 / self.decision_rate_hz);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut scores = self.bus.subscribe_scores();
        info!("decision engine running at {:.1} Hz", self.decision_rate_hz);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = now_ts();
                    // Strictly recoverable: a panic beneath evaluate leaves
                    // the previous state in place and emits a typed HOLD.
                    let decision = match catch_unwind(AssertUnwindSafe(|| self.evaluate(now))) {
                        Ok(decision) => decision,
                        Err(_) => {
                            error!("decision evaluation panicked, state untouched");
                            SwitchDecision::hold(now, self.state.current_cam.clone(), "internal-error")
                        }
                    };
                    self.publish(decision);
                }
                score = scores.next() => {
                    if let Some(score) = score {
                        self.ingest(score);
                    }
                }
                _ = shutdown.changed() => {
                    info!("decision engine shutting down");
                    return;
                }
            }
        }
    }

    fn publish(&mut self, decision: SwitchDecision) {
        self.shared.write_state(self.state.clone());
        self.shared.write_latest_scores(self.latest.clone());
        self.shared.set_ready();
        if decision.action == SwitchAction::Switch {
            info!(
                "SWITCH {} -> {} ({})",
                decision.from_cam.as_deref().unwrap_or("-"),
                decision.to_cam.as_deref().unwrap_or("-"),
                decision.rationale
            );
        }
        self.bus.publish_decision(decision);
    }

    /// One decision tick. Pure with respect to wall time: `now` is passed
    /// in, so tests drive the clock.
    pub fn evaluate(&mut self, now: f64) -> SwitchDecision {
        for command in self.shared.drain_commands() {
            match command {
                EngineCommand::SetManual(cam) => self.shared.write_manual(Some(cam)),
                EngineCommand::ClearManual => self.shared.write_manual(None),
                EngineCommand::Reset => {
                    self.state = ProgramState::default();
                    self.latest.clear();
                    self.defer_ticks = 0;
                    self.shared.write_manual(None);
                }
            }
        }

        // 1. Garbage-collect stale scores.
        let staleness = self.policy.staleness_window_sec;
        self.latest.retain(|_, s| now - s.timestamp <= staleness);

        // 2. Expire cooldowns.
        self.state.cooldowns.retain(|_, not_before| *not_before > now);

        // Manual override: scoring continues but does not drive switches.
        // The single aligning switch still respects the target's cooldown.
        if let Some(manual) = self.shared.manual_cam() {
            if self.state.current_cam.as_ref() != Some(&manual)
                && self.latest.contains_key(&manual)
                && !self.state.in_cooldown(&manual, now)
            {
                return self.do_switch(now, manual, None, "manual", 1.0, false);
            }
            return SwitchDecision::hold(now, self.state.current_cam.clone(), "manual");
        }

        // 3. Best candidate outside cooldown.
        let best = self
            .latest
            .values()
            .filter(|s| !self.state.in_cooldown(&s.cam_id, now))
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // Stable tie-break: the current cam wins, then the
                    // lexicographically smaller id.
                    .then_with(|| {
                        let a_cur = Some(&a.cam_id) == self.state.current_cam.as_ref();
                        let b_cur = Some(&b.cam_id) == self.state.current_cam.as_ref();
                        a_cur.cmp(&b_cur)
                    })
                    .then_with(|| b.cam_id.cmp(&a.cam_id))
            })
            .cloned();

        let Some(best) = best else {
            // A current cam with no fresh score cannot stay program.
            if let Some(current) = self.state.current_cam.clone() {
                if !self.latest.contains_key(&current) {
                    self.state.current_cam = None;
                    self.state.shot_start_ts = None;
                }
            }
            return SwitchDecision::hold(now, self.state.current_cam.clone(), "no-candidates");
        };

        // 4. First selection.
        let Some(current_id) = self.state.current_cam.clone() else {
            return self.do_switch(now, best.cam_id, None, "initial", 1.0, false);
        };

        // 5. Current camera went stale.
        let Some(current) = self.latest.get(&current_id).cloned() else {
            return self.do_switch(now, best.cam_id, None, "current-stale", 1.0, false);
        };

        // 6. Forced cut on overlong shots, to the best other camera.
        let shot_duration = now - self.state.shot_start_ts.unwrap_or(now);
        if shot_duration > self.policy.max_shot_duration_sec {
            let best_other = self
                .latest
                .values()
                .filter(|s| s.cam_id != current_id && !self.state.in_cooldown(&s.cam_id, now))
                .max_by(|a, b| {
                    a.score
                        .partial_cmp(&b.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.cam_id.cmp(&a.cam_id))
                })
                .cloned();
            if let Some(target) = best_other {
                let delta = target.score - current.score;
                // A forced cut unlocks the ping-pong guard.
                return self.do_switch(now, target.cam_id, Some(delta), "max-duration", 1.0, true);
            }
        }

        // 7. Already on the best camera.
        if best.cam_id == current_id {
            self.defer_ticks = 0;
            return SwitchDecision::hold(now, Some(current_id), "same-best");
        }

        // 8. Hysteresis.
        if self.policy.enable_hysteresis && shot_duration < self.policy.min_hold_sec {
            return SwitchDecision::hold(now, Some(current_id), "min-hold");
        }

        // 9. Score margin.
        let delta = best.score - current.score;
        if delta < self.policy.delta_s_threshold {
            return SwitchDecision::hold(now, Some(current_id), "delta-below-threshold");
        }

        // 10. Ping-pong guard.
        if self.is_ping_pong(&best.cam_id) {
            return SwitchDecision::hold(now, Some(current_id), "ping-pong");
        }

        // 11. Speech-boundary alignment, with bounded deferral.
        if self.policy.enable_speech_align
            && self.defer_ticks < self.policy.max_defer_ticks
            && self.mid_word(&current_id, now)
        {
            self.defer_ticks += 1;
            return SwitchDecision::hold(now, Some(current_id), "mid-word");
        }

        // 12. Cut.
        let confidence = (0.5 + delta).clamp(0.0, 1.0);
        let rationale = best.reason.clone();
        self.do_switch(now, best.cam_id, Some(delta), rationale, confidence, false)
    }

    fn do_switch(
        &mut self,
        now: f64,
        to: CamId,
        delta: Option<f32>,
        rationale: impl Into<String>,
        confidence: f32,
        reset_history: bool,
    ) -> SwitchDecision {
        let from = self.state.current_cam.take();
        if let Some(from_cam) = &from {
            if self.policy.enable_cooldown {
                self.state
                    .cooldowns
                    .insert(from_cam.clone(), now + self.policy.cooldown_sec);
            }
            self.state.last_on_air.insert(from_cam.clone(), now);
        }
        self.state.current_cam = Some(to.clone());
        self.state.last_switch_ts = Some(now);
        self.state.shot_start_ts = Some(now);
        if reset_history {
            self.state.history.clear();
        }
        self.state.history.push_back((to.clone(), now));
        while self.state.history.len() > HISTORY_CAP {
            self.state.history.pop_front();
        }
        self.defer_ticks = 0;

        SwitchDecision {
            timestamp: now,
            action: SwitchAction::Switch,
            from_cam: from,
            to_cam: Some(to),
            delta_score: delta,
            rationale: rationale.into(),
            confidence,
        }
    }

    /// Would switching to `target` make it appear `pingPongMaxRevisits`
    /// or more times within the last `pingPongWindow` switches?
    fn is_ping_pong(&self, target: &str) -> bool {
        self.state
            .history
            .iter()
            .rev()
            .take(self.policy.ping_pong_window)
            .filter(|(cam, _)| cam == target)
            .count()
            >= self.policy.ping_pong_max_revisits
    }

    /// Is the current cam's speaker mid-word right now?
    fn mid_word(&self, current: &str, now: f64) -> bool {
        let Some(rec) = self.cache.get(current) else {
            return false;
        };
        let Some(segments) = &rec.speech else {
            return false;
        };
        let Some(segment) = segments
            .iter()
            .max_by(|a, b| a.end_ts.partial_cmp(&b.end_ts).unwrap_or(std::cmp::Ordering::Equal))
        else {
            return false;
        };
        let end = segment
            .word_timings
            .last()
            .map(|w| w.end_ts)
            .unwrap_or(segment.end_ts);
        now < end + WORD_TAIL_SEC
    }
}
