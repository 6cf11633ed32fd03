//! Core data types for the timeline recorder.
//!
//! This module defines the sample-level vocabulary shared by every stage of
//! the recorder: what the sensing subsystem hands us, what a recorded sample
//! looks like once the store has materialized it, and the small enums that
//! drive segmentation decisions.
//!
//! Design principle: Types should make intent obvious. A missing location
//! fix or a missing classification is an `Option`, never a sentinel value,
//! and every consumer decides its own fallback.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RECORDING AND MOVEMENT STATE
// ============================================================================

/// Process-wide recording mode of the sensing subsystem.
///
/// Written only by the sensing subsystem. The recorder reads it and
/// expresses preferences, it never sets it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    /// Not recording at all.
    #[default]
    Off,
    /// Full-cadence recording.
    Active,
    /// Reduced-cadence (sleep) recording.
    LowPower,
}

impl RecordingState {
    /// Returns true for full-cadence recording.
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingState::Active)
    }

    /// Returns true for the reduced-cadence sleep state.
    pub fn is_low_power(&self) -> bool {
        matches!(self, RecordingState::LowPower)
    }
}

/// Movement classification attached to each sample by the sensing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingState {
    /// Device is dwelling in one place.
    Stationary,
    /// Device is clearly moving.
    Moving,
    /// Not enough evidence either way. Treated as moving for segmentation.
    Uncertain,
}

impl MovingState {
    pub fn is_stationary(&self) -> bool {
        matches!(self, MovingState::Stationary)
    }
}

// ============================================================================
// ACTIVITY TYPES
// ============================================================================

/// Activity or transport type assigned to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Stationary,
    Walking,
    Running,
    Cycling,
    Car,
    Bus,
    Train,
    Tram,
    Boat,
    Airplane,
    Unknown,
}

impl ActivityType {
    /// Returns true for any type describing movement.
    ///
    /// `Unknown` counts as moving: it only ever shows up on samples that the
    /// sensing layer did not call stationary.
    pub fn is_moving(&self) -> bool {
        !matches!(self, ActivityType::Stationary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Stationary => "stationary",
            ActivityType::Walking => "walking",
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
            ActivityType::Car => "car",
            ActivityType::Bus => "bus",
            ActivityType::Train => "train",
            ActivityType::Tram => "tram",
            ActivityType::Boat => "boat",
            ActivityType::Airplane => "airplane",
            ActivityType::Unknown => "unknown",
        }
    }
}

// ============================================================================
// LOCATION
// ============================================================================

/// A single location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub horizontal_accuracy_m: f64,
    /// Ground speed in m/s. Negative means the fix carried no valid speed.
    pub speed_mps: f64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy_m: f64, speed_mps: f64) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy_m,
            speed_mps,
        }
    }

    /// Speed in m/s, or `None` when the fix reported an invalid speed.
    pub fn speed(&self) -> Option<f64> {
        if self.speed_mps.is_finite() && self.speed_mps >= 0.0 {
            Some(self.speed_mps)
        } else {
            None
        }
    }
}

// ============================================================================
// CLASSIFIER OUTPUT
// ============================================================================

/// One scored candidate from the activity classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierScore {
    pub activity_type: ActivityType,
    /// Score in [0.0, 1.0].
    pub score: f64,
}

/// Scored candidates returned by a classifier for a single sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResults {
    pub scores: Vec<ClassifierScore>,
}

impl ClassifierResults {
    pub fn new(scores: Vec<ClassifierScore>) -> Self {
        Self { scores }
    }

    /// Highest scoring candidate. The first one wins a tie.
    pub fn best(&self) -> Option<ClassifierScore> {
        self.scores.iter().copied().fold(None, |best, candidate| match best {
            Some(current) if current.score >= candidate.score => Some(current),
            _ => Some(candidate),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

// ============================================================================
// SAMPLES
// ============================================================================

/// Stable identity of a recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId(pub Uuid);

impl SampleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SampleId {
    fn default() -> Self {
        Self::new()
    }
}

/// A sample as delivered by the sensing subsystem, before the store has
/// given it an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub recording_state: RecordingState,
    pub moving_state: MovingState,
    pub location: Option<LocationFix>,
    /// Activity type already known to the sensing layer, if any.
    pub activity_type: Option<ActivityType>,
}

impl RawSample {
    pub fn new(timestamp_ms: u64, recording_state: RecordingState, moving_state: MovingState) -> Self {
        Self {
            timestamp_ms,
            recording_state,
            moving_state,
            location: None,
            activity_type: None,
        }
    }

    /// Active, stationary sample.
    pub fn stationary(timestamp_ms: u64) -> Self {
        Self::new(timestamp_ms, RecordingState::Active, MovingState::Stationary)
    }

    /// Active, moving sample.
    pub fn moving(timestamp_ms: u64) -> Self {
        Self::new(timestamp_ms, RecordingState::Active, MovingState::Moving)
    }

    /// Boundary marker for an unmonitored interval.
    pub fn gap_boundary(timestamp_ms: u64) -> Self {
        Self::new(timestamp_ms, RecordingState::Off, MovingState::Uncertain)
    }

    pub fn with_location(mut self, location: LocationFix) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_activity(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = Some(activity_type);
        self
    }

    pub fn with_recording_state(mut self, recording_state: RecordingState) -> Self {
        self.recording_state = recording_state;
        self
    }
}

/// A recorded sample.
///
/// Classification fields are filled in between materialization and the
/// hand-off to segmentation. Once a sample is appended to a timeline item it
/// is owned by that item and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub recording_state: RecordingState,
    pub moving_state: MovingState,
    pub location: Option<LocationFix>,
    pub activity_type: Option<ActivityType>,
    pub classifier_results: Option<ClassifierResults>,
    pub unfiltered_classifier_results: Option<ClassifierResults>,
}

impl Sample {
    /// Materialize a raw sample under a fresh identity.
    pub fn from_raw(raw: RawSample) -> Self {
        Self {
            id: SampleId::new(),
            timestamp_ms: raw.timestamp_ms,
            recording_state: raw.recording_state,
            moving_state: raw.moving_state,
            location: raw.location,
            activity_type: raw.activity_type,
            classifier_results: None,
            unfiltered_classifier_results: None,
        }
    }

    /// Effective activity type: the explicit one if set, else the best
    /// filtered classifier result.
    pub fn effective_activity_type(&self) -> Option<ActivityType> {
        self.activity_type.or_else(|| {
            self.classifier_results
                .as_ref()
                .and_then(ClassifierResults::best)
                .map(|best| best.activity_type)
        })
    }

    /// Speed from the location fix, if there is a fix with a valid speed.
    pub fn speed(&self) -> Option<f64> {
        self.location.as_ref().and_then(LocationFix::speed)
    }

    pub fn is_stationary(&self) -> bool {
        self.moving_state.is_stationary()
    }
}
