//! Pipeline stepper projection.
//!
//! The backend reports a coarse `PipelineStatus` plus a loosely named list of
//! step records. The dashboard always shows the same five stages, so this
//! module folds both signals into a fixed `[StepState; 5]`. The projection is
//! a pure function: it is recomputed on every poll and never fails.
//!
//! Precedence when the two signals disagree is heuristic: coarse status wins
//! for stages upstream of the current one, so the stepper never shows a later
//! stage active while an earlier one looks unfinished.

use serde::Serialize;

use crate::models::{PipelineStatus, PipelineStep, StepStatus};

/// Labels of the five visual stages, in slot order.
pub const STEP_LABELS: [&str; STEP_COUNT] = ["Upload", "Extract", "Classify", "Review", "Generate"];

pub const STEP_COUNT: usize = 5;

const UPLOAD: usize = 0;
const EXTRACT: usize = 1;
const CLASSIFY: usize = 2;
const REVIEW: usize = 3;
const GENERATE: usize = 4;

/// Visual state of one stepper slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// The projected stepper: one state per stage.
pub type StepStates = [StepState; STEP_COUNT];

/// Map a backend step name onto a stage slot.
///
/// Substring match on the lowercased name, first rule wins.
pub fn step_index(step_name: &str) -> Option<usize> {
    let name = step_name.to_lowercase();
    if name.contains("upload") || name.contains("file") {
        Some(UPLOAD)
    } else if name.contains("extract") {
        Some(EXTRACT)
    } else if name.contains("classif") {
        Some(CLASSIFY)
    } else if name.contains("review") || name.contains("validat") {
        Some(REVIEW)
    } else if name.contains("generat") {
        Some(GENERATE)
    } else {
        None
    }
}

/// Project backend status and step records onto the five stepper slots.
pub fn derive_step_states(overall: PipelineStatus, steps: &[PipelineStep]) -> StepStates {
    use StepState::*;

    let mut states = [Pending; STEP_COUNT];

    // Any pipeline activity means files were uploaded.
    if !steps.is_empty() || overall != PipelineStatus::Draft {
        states[UPLOAD] = Completed;
    }

    for step in steps {
        let Some(idx) = step_index(&step.name) else {
            continue;
        };
        match step.status {
            StepStatus::Completed => states[idx] = Completed,
            StepStatus::Running => states[idx] = Running,
            StepStatus::Failed => states[idx] = Failed,
            StepStatus::Skipped => states[idx] = Skipped,
            StepStatus::Pending => {}
        }
    }

    let upgrade = |slot: &mut StepState, to: StepState| {
        if *slot == Pending {
            *slot = to;
        }
    };

    match overall {
        PipelineStatus::Draft | PipelineStatus::Unknown => {}
        PipelineStatus::Extracting => upgrade(&mut states[EXTRACT], Running),
        PipelineStatus::Classifying => {
            upgrade(&mut states[EXTRACT], Completed);
            upgrade(&mut states[CLASSIFY], Running);
        }
        PipelineStatus::Validating => {
            states[EXTRACT] = Completed;
            states[CLASSIFY] = Completed;
            upgrade(&mut states[REVIEW], Running);
        }
        PipelineStatus::Reviewing => {
            states[EXTRACT] = Completed;
            states[CLASSIFY] = Completed;
            states[REVIEW] = Running;
        }
        PipelineStatus::Generating => {
            states[EXTRACT] = Completed;
            states[CLASSIFY] = Completed;
            states[REVIEW] = Completed;
            upgrade(&mut states[GENERATE], Running);
        }
        PipelineStatus::Completed => states = [Completed; STEP_COUNT],
        PipelineStatus::Error => {
            if let Some(slot) = states.iter_mut().find(|s| **s == Running) {
                *slot = Failed;
            }
        }
    }

    states
}

/// Glyph for a slot: a mark for settled states, the 1-based stage number otherwise.
pub fn step_glyph(state: StepState, index: usize) -> String {
    match state {
        StepState::Completed => "✓".to_string(),
        StepState::Failed => "✗".to_string(),
        StepState::Skipped => "–".to_string(),
        StepState::Running | StepState::Pending => (index + 1).to_string(),
    }
}

/// One-line text rendering, e.g. `[✓ Upload] ── [2 Extract*] ── [3 Classify] ...`.
/// The running stage is starred.
pub fn render_stepper(states: &StepStates) -> String {
    states
        .iter()
        .zip(STEP_LABELS)
        .enumerate()
        .map(|(i, (state, label))| {
            let marker = if *state == StepState::Running { "*" } else { "" };
            format!("[{} {}{}]", step_glyph(*state, i), label, marker)
        })
        .collect::<Vec<_>>()
        .join(" ── ")
}
