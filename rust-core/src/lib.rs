//! Trace Timeline Recorder Library
//!
//! Turns a stream of motion and location samples into a doubly linked
//! timeline of visits (stationary dwells), paths (contiguous movement) and
//! data gaps (unmonitored intervals), while steering the sensing subsystem
//! between active and low-power sampling.
//!
//! # Design Philosophy
//!
//! - **Incremental**: every sample is decided on arrival; superseded items
//!   are never reopened.
//! - **Single writer**: all chain mutation happens inside the store's
//!   mutation scope, one sample at a time.
//! - **Battery awareness**: low-power sampling is only preferred while the
//!   device dwells in a visit worth keeping, and low-power samples in a
//!   visit are capped.
//! - **Infallible at runtime**: unmet preconditions are silent no-ops; only
//!   construction can fail, on invalid configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trace_timeline::{MemoryStore, RawSample, RecorderConfig, TimelineRecorder};
//!
//! let mut recorder = TimelineRecorder::new(Arc::new(MemoryStore::new()), sensing, RecorderConfig::default())?;
//! recorder.start_recording();
//! recorder.sample_ready(RawSample::stationary(now_ms));
//! let visit = recorder.current_visit();
//! ```

pub mod cadence;
pub mod config;
pub mod data_gap;
pub mod error;
pub mod events;
pub mod export;
pub mod item_factory;
pub mod recorder;
pub mod segmentation;
pub mod sensing;
pub mod sleep_mode;
pub mod store;
pub mod timeline;
pub mod types;

#[cfg(test)]
mod testing;



// Re-export commonly used types
pub use config::RecorderConfig;
pub use error::{ConfigError, RecorderError};
pub use events::{EventBus, ItemUpdate, TimelineEvent};
pub use export::TimelineExport;
pub use recorder::TimelineRecorder;
pub use segmentation::{CloseReason, IgnoreReason, SegmentAction};
pub use sensing::{Classifier, Clock, SensingSignal, SensingSubsystem, SystemClock};
pub use store::{MemoryStore, Timeline, TimelineStore};
pub use timeline::{ItemId, ItemKind, TimelineItem};
pub use types::{
    ActivityType, ClassifierResults, ClassifierScore, LocationFix, MovingState, RawSample, RecordingState, Sample,
    SampleId,
};
