/// Basic usage example: feed location samples, get a visit/path timeline
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use trace_timeline::export::TimelineExport;
use trace_timeline::sensing::ManualClock;
use trace_timeline::{
    ActivityType, Clock, LocationFix, MemoryStore, RawSample, RecorderConfig, RecordingState, SensingSubsystem,
    TimelineEvent, TimelineRecorder, TimelineStore,
};
use tracing_subscriber::EnvFilter;

/// Sensing subsystem that switches state immediately.
#[derive(Default)]
struct SimulatedSensing {
    state: AtomicU8,
    prefer_low_power: AtomicBool,
}

impl SensingSubsystem for SimulatedSensing {
    fn recording_state(&self) -> RecordingState {
        match self.state.load(Ordering::SeqCst) {
            1 => RecordingState::Active,
            2 => RecordingState::LowPower,
            _ => RecordingState::Off,
        }
    }

    fn start_recording(&self) {
        self.state.store(1, Ordering::SeqCst);
    }

    fn stop_recording(&self) {
        self.state.store(0, Ordering::SeqCst);
    }

    fn set_prefer_low_power_while_stationary(&self, prefer: bool) {
        self.prefer_low_power.store(prefer, Ordering::SeqCst);
    }

    fn sleep_cycle_duration_ms(&self) -> u64 {
        60_000
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Trace Timeline Recorder: Basic Example ===\n");

    let start_ms = 1_700_000_000_000;
    let clock = Arc::new(ManualClock::new(start_ms));
    let store = Arc::new(MemoryStore::new());
    let mut recorder = TimelineRecorder::new(store.clone(), Arc::new(SimulatedSensing::default()), RecorderConfig::default())?
        .with_clock(clock.clone());

    let mut events = recorder.subscribe();
    recorder.start_recording();

    // Morning: at home, walk to the station, train to the office
    let phases: [(usize, Option<(ActivityType, f64)>); 4] = [
        (40, None),
        (25, Some((ActivityType::Walking, 1.4))),
        (60, Some((ActivityType::Train, 22.0))),
        (40, None),
    ];

    for (count, movement) in phases {
        for _ in 0..count {
            let now = clock.now_ms();
            let raw = match movement {
                None => RawSample::stationary(now).with_location(LocationFix::new(51.5072, -0.1276, 15.0, 0.0)),
                Some((activity, speed)) => RawSample::moving(now)
                    .with_activity(activity)
                    .with_location(LocationFix::new(51.5072, -0.1276, 15.0, speed)),
            };
            recorder.sample_ready(raw);
            clock.advance(6_000);
        }
    }

    println!("Events:");
    while let Ok(event) = events.try_recv() {
        if let TimelineEvent::NewTimelineItem(item) = event {
            println!("  new {:<8} {}", item.kind.as_str(), item.id);
        }
    }

    println!("\nTimeline:");
    store.read(|timeline| {
        for item in timeline.items_in_order() {
            println!(
                "  {:<8} {:>4} samples  {:>6.1} min  {}",
                item.kind.as_str(),
                item.sample_count(),
                item.duration_ms() as f64 / 60_000.0,
                item.moving_activity_type().map(|a| a.as_str()).unwrap_or("-"),
            );
        }
    });

    let export: TimelineExport = recorder.export();
    println!("\nSummary: {}", serde_json::to_string(&export.summary)?);
    Ok(())
}
