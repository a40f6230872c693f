//! Recording fakes for the playback seams, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::engine::{AudioQueueEngine, EngineParts, PlaybackState};
use super::output::AudioOutput;
use super::synth::SpeechSynthesizer;
use super::wake_lock::WakeLock;
use crate::error::{AudioError, SynthesisError, WakeLockError};

#[derive(Default)]
pub struct FakeSynth {
    pub fail_on: Option<String>,
    pub calls: Mutex<Vec<String>>,
    /// When set, each reply is held until the gate is notified.
    pub gate: Option<Arc<Notify>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_on.as_deref() == Some(text) {
            return Err(SynthesisError::MissingAudio);
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Clips "play" for a fixed number of unpaused polls.
pub struct FakeOutput {
    polls_per_clip: usize,
    fail: bool,
    remaining: Mutex<usize>,
    paused: AtomicBool,
    played: Mutex<Vec<String>>,
    pub stops: AtomicUsize,
}

impl FakeOutput {
    pub fn new(polls_per_clip: usize) -> Arc<Self> {
        Arc::new(Self {
            polls_per_clip,
            fail: false,
            remaining: Mutex::new(0),
            paused: AtomicBool::new(false),
            played: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Arc::into_inner(Self::new(0)).unwrap()
        })
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioOutput for FakeOutput {
    fn play(&self, audio: Vec<u8>) -> Result<(), AudioError> {
        if self.fail {
            return Err(AudioError::Decode("bad clip".into()));
        }
        self.played
            .lock()
            .unwrap()
            .push(String::from_utf8(audio).unwrap());
        *self.remaining.lock().unwrap() = self.polls_per_clip;
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.remaining.lock().unwrap() = 0;
    }

    fn is_finished(&self) -> bool {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining == 0 {
            return true;
        }
        if !self.paused.load(Ordering::SeqCst) {
            *remaining -= 1;
        }
        false
    }
}

#[derive(Default)]
pub struct FakeWakeLock {
    pub held: AtomicBool,
    pub acquired: AtomicUsize,
}

impl WakeLock for FakeWakeLock {
    fn acquire(&self) -> Result<(), WakeLockError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub engine: AudioQueueEngine,
    pub synth: Arc<FakeSynth>,
    pub speech: Arc<FakeOutput>,
    pub bell: Arc<FakeOutput>,
    pub wake_lock: Arc<FakeWakeLock>,
}

pub fn harness_with(synth: FakeSynth, speech: Arc<FakeOutput>, bell_sound: Option<&str>) -> Harness {
    let synth = Arc::new(synth);
    let bell = FakeOutput::new(2);
    let wake_lock = Arc::new(FakeWakeLock::default());
    let engine = AudioQueueEngine::new(EngineParts {
        synth: synth.clone(),
        speech: speech.clone(),
        bell: bell.clone(),
        bell_sound: bell_sound.map(|s| Arc::from(s.as_bytes())),
        wake_lock: wake_lock.clone(),
        poll_interval: Duration::from_millis(1),
    });
    Harness {
        engine,
        synth,
        speech,
        bell,
        wake_lock,
    }
}

pub fn harness() -> Harness {
    harness_with(FakeSynth::default(), FakeOutput::new(3), Some("ding"))
}

pub async fn wait_for_idle(engine: &AudioQueueEngine) {
    let mut state = engine.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == PlaybackState::Idle),
    )
    .await
    .expect("playback did not finish")
    .unwrap();
}
