/// Sleep cycle example: drive the recorder through its signal queue while the
/// sensing subsystem drops into low power during a long dwell
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use trace_timeline::{
    Clock, MemoryStore, RawSample, RecorderConfig, RecordingState, SensingSignal, SensingSubsystem, TimelineEvent,
    TimelineRecorder,
};
use tracing_subscriber::EnvFilter;

/// Replay clock: each reading is one throttle interval after the previous.
struct ReplayClock {
    next_ms: AtomicU64,
}

impl Clock for ReplayClock {
    fn now_ms(&self) -> u64 {
        self.next_ms.fetch_add(INTERVAL_MS, Ordering::SeqCst)
    }
}

#[derive(Default)]
struct SimulatedSensing {
    state: AtomicU8,
    prefer_low_power: AtomicBool,
}

impl SimulatedSensing {
    fn enter_low_power(&self) {
        self.state.store(2, Ordering::SeqCst);
    }
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

const START_MS: u64 = 1_700_000_000_000;
const INTERVAL_MS: u64 = 6_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    println!("=== Trace Timeline Recorder: Sleep Cycle Example ===\n");

    let sensing = Arc::new(SimulatedSensing::default());
    let clock = Arc::new(ReplayClock {
        next_ms: AtomicU64::new(START_MS),
    });
    let mut recorder = TimelineRecorder::new(Arc::new(MemoryStore::new()), sensing.clone(), RecorderConfig::default())?
        .with_clock(clock);
    recorder.start_recording();

    let mut events = recorder.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let TimelineEvent::NewTimelineItem(item) = event {
                println!("new {} {}", item.kind.as_str(), item.id);
            }
        }
    });

    let (tx, rx) = mpsc::channel(128);
    let worker = tokio::spawn(recorder.run(rx));

    let mut timestamp_ms = START_MS;
    let mut next_timestamp = || {
        timestamp_ms += INTERVAL_MS;
        timestamp_ms
    };

    // Settle into a visit while actively recording
    for _ in 0..30 {
        tx.send(SensingSignal::SampleReady(RawSample::stationary(next_timestamp()))).await?;
    }

    // The subsystem asks, then drops to low power
    tx.send(SensingSignal::WillEnterLowPower).await?;
    sensing.enter_low_power();
    tx.send(SensingSignal::RecordingStateChanged(RecordingState::LowPower)).await?;

    for _ in 0..50 {
        let raw = RawSample::stationary(next_timestamp()).with_recording_state(RecordingState::LowPower);
        tx.send(SensingSignal::SampleReady(raw)).await?;
    }

    // Leaving the visit
    for _ in 0..10 {
        tx.send(SensingSignal::SampleReady(RawSample::moving(next_timestamp()))).await?;
    }

    drop(tx);
    let recorder = worker.await?;

    println!("\nrecording state after leaving: {:?}", sensing.recording_state());
    println!("forced resumes: {}", recorder.gatekeeper().forced_resumes());
    println!("low-power samples evicted: {}", recorder.segmentation().samples_evicted());
    println!("\n{}", recorder.export().to_json()?);

    drop(recorder);
    printer.await?;
    Ok(())
}
