//! Sleep-mode gatekeeping.
//!
//! Low-power sampling is only justified while the device dwells in a visit
//! that is worth keeping. Everywhere else the recorder withdraws the
//! preference and, if the sensing subsystem has already dropped out of
//! active recording, tells it to resume.

use tracing::{debug, warn};

use crate::sensing::SensingSubsystem;
use crate::timeline::{KeeperThresholds, TimelineItem};
use crate::types::RecordingState;

/// Result of one gatekeeper evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepModeDecision {
    /// The current item is a worth-keeping visit; low-power sampling is
    /// preferred while stationary.
    AllowLowPower,
    /// Low-power preference withdrawn. `resumed_recording` is set when
    /// active recording had to be forced back on.
    Withdrawn { resumed_recording: bool },
}

/// Evaluates whether the current item justifies low-power sampling.
#[derive(Debug, Clone)]
pub struct SleepModeGatekeeper {
    thresholds: KeeperThresholds,
    last_preference: Option<bool>,
    forced_resumes: u64,
}

impl SleepModeGatekeeper {
    pub fn new(thresholds: KeeperThresholds) -> Self {
        Self {
            thresholds,
            last_preference: None,
            forced_resumes: 0,
        }
    }

    /// Whether `current` justifies low-power sampling.
    ///
    /// Pure; safe to call while the store is locked.
    pub fn allows_low_power(&self, current: Option<&TimelineItem>) -> bool {
        current.is_some_and(|item| item.is_worth_keeping(&self.thresholds))
    }

    /// Signal the sensing subsystem's low-power preference for `current`.
    ///
    /// The preference is signalled on every call, not only on change.
    pub fn update_preference(
        &mut self,
        current: Option<&TimelineItem>,
        recording_state: RecordingState,
        sensing: &dyn SensingSubsystem,
    ) -> SleepModeDecision {
        let allow = self.allows_low_power(current);
        self.apply_preference(allow, recording_state, sensing)
    }

    /// Signal an already evaluated preference. Call with no store lock held:
    /// the sensing subsystem may read the store from its callbacks.
    pub fn apply_preference(
        &mut self,
        allow: bool,
        recording_state: RecordingState,
        sensing: &dyn SensingSubsystem,
    ) -> SleepModeDecision {
        sensing.set_prefer_low_power_while_stationary(allow);
        if self.last_preference != Some(allow) {
            debug!(prefer_low_power = allow, "sleep mode preference changed");
            self.last_preference = Some(allow);
        }

        if allow {
            return SleepModeDecision::AllowLowPower;
        }

        let resumed_recording = !recording_state.is_active();
        if resumed_recording {
            warn!(?recording_state, "no visit worth keeping; resuming active recording");
            sensing.start_recording();
            self.forced_resumes += 1;
        }
        SleepModeDecision::Withdrawn { resumed_recording }
    }

    /// Last preference signalled, if any.
    pub fn last_preference(&self) -> Option<bool> {
        self.last_preference
    }

    /// Number of times active recording was forced back on.
    pub fn forced_resumes(&self) -> u64 {
        self.forced_resumes
    }
}

impl Default for SleepModeGatekeeper {
    fn default() -> Self {
        Self::new(KeeperThresholds::default())
    }
}
