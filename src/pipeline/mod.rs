//! Pipeline progress: stepper projection and background polling.

pub mod poller;
pub mod stepper;

pub use poller::{spawn_periodic_refresh, spawn_progress_poller, PollEvent, PollerHandle};
pub use stepper::{derive_step_states, render_stepper, StepState, StepStates, STEP_LABELS};
