//! Shared view of the program selection. The decision engine is the only
//! writer of [`ProgramState`]; everyone else reads deep-copy snapshots, and
//! control inputs (manual override, reset) arrive through a command queue
//! drained at the top of each decision tick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;
use parking_lot::RwLock;

use autocut_core::{CamId, CameraScore, ProgramState};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    SetManual(CamId),
    ClearManual,
    Reset,
}

/// Engine operating mode, derived for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Idle,
    Live,
    Manual,
}

#[derive(Default)]
pub struct ProgramShared {
    state: RwLock<ProgramState>,
    latest_scores: RwLock<HashMap<CamId, CameraScore>>,
    manual: RwLock<Option<CamId>>,
    commands: SegQueue<EngineCommand>,
    ready: AtomicBool,
}

impl ProgramShared {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    /// Deep copy of the program state.
    pub fn snapshot(&self) -> ProgramState {
        self.state.read().clone()
    }

    pub fn current_cam(&self) -> Option<CamId> {
        self.state.read().current_cam.clone()
    }

    pub fn latest_scores(&self) -> Vec<CameraScore> {
        self.latest_scores.read().values().cloned().collect()
    }

    pub fn latest_score(&self, cam_id: &str) -> Option<CameraScore> {
        self.latest_scores.read().get(cam_id).cloned()
    }

    pub fn manual_cam(&self) -> Option<CamId> {
        self.manual.read().clone()
    }

    pub fn mode(&self) -> EngineMode {
        if self.manual.read().is_some() {
            EngineMode::Manual
        } else if self.state.read().current_cam.is_some() {
            EngineMode::Live
        } else {
            EngineMode::Idle
        }
    }

    pub fn push_command(&self, command: EngineCommand) {
        self.commands.push(command);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    // Writer-side accessors, used by the engine task only.

    pub(crate) fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub(crate) fn drain_commands(&self) -> Vec<EngineCommand> {
        let mut out = Vec::new();
        while let Some(cmd) = self.commands.pop() {
            out.push(cmd);
        }
        out
    }

    pub(crate) fn write_state(&self, state: ProgramState) {
        *self.state.write() = state;
    }

    pub(crate) fn write_manual(&self, manual: Option<CamId>) {
        *self.manual.write() = manual;
    }

    pub(crate) fn write_latest_scores(&self, scores: HashMap<CamId, CameraScore>) {
        *self.latest_scores.write() = scores;
    }
}
