//! Audio queue engine: sequential narration of a built queue.
//!
//! IDLE → PLAYING ⇄ TRANSITION_PAUSE → IDLE, with PAUSED reachable from
//! either active state.
//!
//! One task per playback run walks the queue. Every step races the run's
//! cancellation token, and every side effect of a run (status, reading,
//! starting a clip, advancing) happens under the run lock only while the
//! run's generation is current, so a `stop()` at any point leaves nothing
//! behind.
//! Timed silences are frozen while paused and continue with the time that
//! was left.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::output::AudioOutput;
use super::queue::QueueItem;
use super::synth::SpeechSynthesizer;
use super::wake_lock::WakeLock;
use crate::error::WakeLockError;

const READING_PREVIEW_CHARS: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    TransitionPause,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Playing => write!(f, "PLAYING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::TransitionPause => write!(f, "TRANSITION_PAUSE"),
        }
    }
}

/// Which playback buttons are shown, and the pause button's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub play: bool,
    pub pause: bool,
    pub stop: bool,
    pub pause_label: &'static str,
}

impl PlaybackState {
    pub fn controls(self) -> Controls {
        match self {
            Self::Idle => Controls {
                play: true,
                pause: false,
                stop: false,
                pause_label: "Pause",
            },
            Self::Playing | Self::TransitionPause => Controls {
                play: false,
                pause: true,
                stop: true,
                pause_label: "Pause",
            },
            Self::Paused => Controls {
                play: false,
                pause: true,
                stop: true,
                pause_label: "Resume",
            },
        }
    }

    fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::TransitionPause)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackOptions {
    pub play_bell: bool,
    pub keep_awake: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub status: StatusMessage,
    pub reading: String,
    pub position: usize,
    pub queue_len: usize,
    pub controls: Controls,
}

/// Collaborators the engine drives.
pub struct EngineParts {
    pub synth: Arc<dyn SpeechSynthesizer>,
    pub speech: Arc<dyn AudioOutput>,
    pub bell: Arc<dyn AudioOutput>,
    /// Encoded transition sound. `None` when it could not be loaded.
    pub bell_sound: Option<Arc<[u8]>>,
    pub wake_lock: Arc<dyn WakeLock>,
    pub poll_interval: Duration,
}

struct RunState {
    state: PlaybackState,
    /// State to return to when resuming from PAUSED.
    resume_to: PlaybackState,
    queue: Vec<QueueItem>,
    position: usize,
    generation: u64,
    cancel: CancellationToken,
    options: PlaybackOptions,
    reading: String,
}

struct Inner {
    parts: EngineParts,
    run: Mutex<RunState>,
    status: Mutex<StatusMessage>,
    state_tx: watch::Sender<PlaybackState>,
    paused_tx: watch::Sender<bool>,
    status_tx: broadcast::Sender<StatusMessage>,
}

#[derive(Clone)]
pub struct AudioQueueEngine {
    inner: Arc<Inner>,
}

impl AudioQueueEngine {
    pub fn new(parts: EngineParts) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (paused_tx, _) = watch::channel(false);
        let (status_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                parts,
                run: Mutex::new(RunState {
                    state: PlaybackState::Idle,
                    resume_to: PlaybackState::Playing,
                    queue: Vec::new(),
                    position: 0,
                    generation: 0,
                    cancel: CancellationToken::new(),
                    options: PlaybackOptions::default(),
                    reading: String::new(),
                }),
                status: Mutex::new(StatusMessage::default()),
                state_tx,
                paused_tx,
                status_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.inner.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PlaybackState {
        self.lock().state
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusMessage> {
        self.inner.status_tx.subscribe()
    }

    pub fn status(&self) -> StatusMessage {
        self.inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let run = self.lock();
        PlaybackSnapshot {
            state: run.state,
            status: self.status(),
            reading: run.reading.clone(),
            position: run.position,
            queue_len: run.queue.len(),
            controls: run.state.controls(),
        }
    }

    /// Replace the queue. Only allowed while IDLE.
    pub fn load(&self, queue: Vec<QueueItem>, options: PlaybackOptions) -> bool {
        let mut run = self.lock();
        if run.state != PlaybackState::Idle {
            debug!("Ignoring queue load while {}", run.state);
            return false;
        }
        debug!("Queue loaded with {} items", queue.len());
        run.queue = queue;
        run.position = 0;
        run.options = options;
        true
    }

    /// Begin playing the loaded queue from the top. Only valid from IDLE.
    pub fn start(&self) -> bool {
        let (generation, cancel, keep_awake) = {
            let mut run = self.lock();
            if run.state != PlaybackState::Idle {
                debug!("Start ignored while {}", run.state);
                return false;
            }
            if run.queue.is_empty() {
                drop(run);
                self.set_status("Nothing to play.", false);
                return false;
            }
            run.position = 0;
            run.generation += 1;
            run.cancel = CancellationToken::new();
            self.transition(&mut run, PlaybackState::Playing);
            (run.generation, run.cancel.clone(), run.options.keep_awake)
        };

        self.inner.paused_tx.send_replace(false);
        if keep_awake {
            self.acquire_wake_lock();
        }

        info!("Playback started");
        let engine = self.clone();
        tokio::spawn(async move { engine.run(generation, cancel).await });
        true
    }

    pub fn pause(&self) -> bool {
        {
            let mut run = self.lock();
            if !run.state.is_active() {
                return false;
            }
            run.resume_to = run.state;
            self.transition(&mut run, PlaybackState::Paused);
        }
        self.inner.paused_tx.send_replace(true);
        self.inner.parts.speech.pause();
        self.inner.parts.bell.pause();
        self.set_status("Paused.", false);
        self.inner.parts.wake_lock.release();
        true
    }

    pub fn resume(&self) -> bool {
        let keep_awake = {
            let mut run = self.lock();
            if run.state != PlaybackState::Paused {
                return false;
            }
            let target = run.resume_to;
            self.transition(&mut run, target);
            run.options.keep_awake
        };
        self.set_status("Resuming...", false);
        if keep_awake {
            self.acquire_wake_lock();
        }
        self.inner.paused_tx.send_replace(false);
        self.inner.parts.speech.resume();
        self.inner.parts.bell.resume();
        true
    }

    pub fn toggle_pause(&self) -> bool {
        match self.state() {
            PlaybackState::Paused => self.resume(),
            _ => self.pause(),
        }
    }

    /// Cancel everything and return to IDLE. Valid from any state.
    pub fn stop(&self) {
        self.halt(None, None);
    }

    /// Tear down the current run. With `only_generation`, nothing happens
    /// unless that run is still current. Subscribers see IDLE only after the
    /// final status is published.
    fn halt(&self, only_generation: Option<u64>, final_status: Option<&str>) -> bool {
        {
            let mut run = self.lock();
            if only_generation.is_some_and(|g| g != run.generation) {
                return false;
            }
            run.cancel.cancel();
            run.generation += 1;
            run.queue.clear();
            run.position = 0;
            run.reading.clear();
        }
        self.inner.paused_tx.send_replace(false);
        self.inner.parts.speech.stop();
        self.inner.parts.bell.stop();
        self.inner.parts.wake_lock.release();
        self.set_status("Playback stopped.", false);
        if let Some(text) = final_status {
            self.set_status(text, false);
        }

        let mut run = self.lock();
        self.transition(&mut run, PlaybackState::Idle);
        true
    }

    fn transition(&self, run: &mut RunState, next: PlaybackState) {
        if run.state != next {
            debug!("Playback {} → {next}", run.state);
            run.state = next;
            self.inner.state_tx.send_replace(next);
        }
    }

    /// Mark which active state the run is in. While paused, the change is
    /// remembered for resume instead.
    fn enter(&self, generation: u64, next: PlaybackState) {
        let mut run = self.lock();
        if run.generation != generation {
            return;
        }
        if run.state == PlaybackState::Paused {
            run.resume_to = next;
        } else {
            self.transition(&mut run, next);
        }
    }

    fn set_status(&self, text: impl Into<String>, is_error: bool) {
        let message = StatusMessage {
            text: text.into(),
            is_error,
        };
        debug!("Status: {}", message.text);
        *self
            .inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message.clone();
        let _ = self.inner.status_tx.send(message);
    }

    /// Run `f` under the run lock, only if `generation` is still the
    /// current run. A concurrent `stop()` is ordered entirely before or
    /// after it.
    fn while_current<R>(&self, generation: u64, f: impl FnOnce(&mut RunState) -> R) -> Option<R> {
        let mut run = self.lock();
        if run.generation != generation {
            return None;
        }
        Some(f(&mut run))
    }

    /// Status write from a run; dropped once the run is stale.
    fn run_status(&self, generation: u64, text: impl Into<String>, is_error: bool) -> bool {
        let text = text.into();
        self.while_current(generation, |_| self.set_status(text, is_error))
            .is_some()
    }

    fn set_reading(&self, generation: u64, text: &str) {
        self.while_current(generation, |run| {
            run.reading = text.chars().take(READING_PREVIEW_CHARS).collect();
        });
    }

    fn acquire_wake_lock(&self) {
        match self.inner.parts.wake_lock.acquire() {
            Ok(()) => {}
            Err(WakeLockError::Unsupported) => debug!("Keep screen awake unsupported"),
            Err(e) => {
                warn!("{e}");
                self.set_status(format!("Could not activate keep screen awake: {e}"), true);
            }
        }
    }

    async fn run(self, generation: u64, cancel: CancellationToken) {
        loop {
            let item = {
                let run = self.lock();
                if run.generation != generation {
                    return;
                }
                run.queue.get(run.position).cloned()
            };
            let Some(item) = item else {
                self.finish(generation);
                return;
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = self.play_item(generation, &item) => {}
            }

            let mut run = self.lock();
            if run.generation != generation {
                return;
            }
            run.position += 1;
        }
    }

    fn finish(&self, generation: u64) {
        if self.halt(Some(generation), Some("Finished all prayers.")) {
            info!("Playback finished");
        }
    }

    async fn play_item(&self, generation: u64, item: &QueueItem) {
        match item {
            QueueItem::Speech { text } => self.speak(generation, text).await,
            QueueItem::Pause { duration_ms } => self.transition_pause(generation, *duration_ms).await,
        }
    }

    async fn speak(&self, generation: u64, text: &str) {
        self.enter(generation, PlaybackState::Playing);
        if text.trim().is_empty() {
            warn!("Attempted to speak empty text");
            self.set_reading(generation, "");
            self.run_status(generation, "Nothing to speak.", false);
            return;
        }

        if !self.run_status(generation, "Synthesizing audio...", false) {
            return;
        }
        self.set_reading(generation, text);
        let audio = match self.inner.parts.synth.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                error!("Speech synthesis failed: {e}");
                self.run_status(generation, format!("Error: {e}"), true);
                return;
            }
        };

        self.wait_until_unpaused().await;
        let speech = &self.inner.parts.speech;
        let started = self.while_current(generation, |run| {
            self.set_status("Playing...", false);
            let result = speech.play(audio);
            if result.is_ok() && run.state == PlaybackState::Paused {
                speech.pause();
            }
            result
        });
        match started {
            None => {
                debug!("Discarding audio synthesized for a stopped run");
                return;
            }
            Some(Err(e)) => {
                error!("Error playing audio: {e}");
                self.run_status(generation, format!("Error playing audio: {e}"), true);
                return;
            }
            Some(Ok(())) => {}
        }

        self.wait_for(speech.as_ref()).await;
        self.run_status(generation, "Finished segment.", false);
    }

    async fn transition_pause(&self, generation: u64, duration_ms: u64) {
        self.enter(generation, PlaybackState::TransitionPause);
        let pausing = format!("Pausing for {} seconds...", format_secs(duration_ms));
        if !self.run_status(generation, pausing, false) {
            return;
        }
        self.set_reading(generation, "");
        self.pausable_sleep(Duration::from_millis(duration_ms)).await;

        let Some(play_bell) = self.while_current(generation, |run| run.options.play_bell) else {
            return;
        };
        if !play_bell {
            debug!("Bell sound disabled");
            return;
        }
        let Some(sound) = self.inner.parts.bell_sound.clone() else {
            warn!("Bell sound not loaded");
            self.run_status(generation, "Bell error (unknown).", true);
            return;
        };

        let bell = &self.inner.parts.bell;
        let started = self.while_current(generation, |run| {
            self.set_status("Playing transition sound...", false);
            let result = bell.play(sound.to_vec());
            if result.is_ok() && run.state == PlaybackState::Paused {
                bell.pause();
            }
            result
        });
        match started {
            None => return,
            Some(Err(e)) => {
                error!("Bell sound failed: {e}");
                self.run_status(generation, format!("Bell play error: {e}"), true);
                return;
            }
            Some(Ok(())) => {}
        }
        self.wait_for(bell.as_ref()).await;
        self.run_status(generation, "Transition finished.", false);
    }

    /// Poll an audio element until its clip has played out. A paused clip
    /// does not finish.
    async fn wait_for(&self, output: &dyn AudioOutput) {
        while !output.is_finished() {
            tokio::time::sleep(self.inner.parts.poll_interval).await;
        }
    }

    async fn wait_until_unpaused(&self) {
        let mut paused = self.inner.paused_tx.subscribe();
        wait_until(&mut paused, false).await;
    }

    /// Sleep for `duration` of unpaused time.
    async fn pausable_sleep(&self, duration: Duration) {
        let mut paused = self.inner.paused_tx.subscribe();
        let mut remaining = duration;
        loop {
            wait_until(&mut paused, false).await;
            let started = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(remaining) => return,
                _ = wait_until(&mut paused, true) => {
                    remaining = remaining.saturating_sub(started.elapsed());
                    debug!("Timed pause frozen with {remaining:?} left");
                }
            }
        }
    }
}

async fn wait_until(rx: &mut watch::Receiver<bool>, value: bool) {
    loop {
        if *rx.borrow_and_update() == value {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn format_secs(ms: u64) -> String {
    if ms % 1000 == 0 {
        (ms / 1000).to_string()
    } else {
        format!("{}", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::testing::{harness, harness_with, wait_for_idle, FakeOutput, FakeSynth};
    use std::sync::atomic::Ordering;

    const BELL_ON: PlaybackOptions = PlaybackOptions {
        play_bell: true,
        keep_awake: true,
    };

    fn drain(rx: &mut broadcast::Receiver<StatusMessage>) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|m| m.text)
            .collect()
    }

    #[tokio::test]
    async fn plays_queue_in_order_then_finishes() {
        let h = harness();
        let mut statuses = h.engine.subscribe_status();
        h.engine.load(
            vec![
                QueueItem::speech("Adoration."),
                QueueItem::speech("Praise him."),
                QueueItem::Pause { duration_ms: 5 },
                QueueItem::speech("Amen."),
            ],
            BELL_ON,
        );

        assert!(h.engine.start());
        assert!(h.wake_lock.is_held());
        wait_for_idle(&h.engine).await;

        assert_eq!(h.speech.played(), ["Adoration.", "Praise him.", "Amen."]);
        assert_eq!(h.bell.played(), ["ding"]);
        assert_eq!(h.engine.status().text, "Finished all prayers.");
        assert!(!h.wake_lock.is_held());

        let seen = drain(&mut statuses);
        for expected in [
            "Synthesizing audio...",
            "Playing...",
            "Finished segment.",
            "Pausing for 0.005 seconds...",
            "Playing transition sound...",
            "Transition finished.",
            "Playback stopped.",
            "Finished all prayers.",
        ] {
            assert!(seen.iter().any(|s| s == expected), "missing status {expected}");
        }
        assert_eq!(seen.last().map(String::as_str), Some("Finished all prayers."));
    }

    #[tokio::test]
    async fn stop_clears_queue_and_start_then_reports_nothing_to_play() {
        let h = harness_with(FakeSynth::default(), FakeOutput::new(100_000), None);
        h.engine.load(
            vec![QueueItem::speech("long"), QueueItem::speech("never")],
            PlaybackOptions::default(),
        );
        assert!(h.engine.start());

        let mut statuses = h.engine.subscribe_status();
        while h.speech.played().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        h.engine.stop();
        drain(&mut statuses);

        let snapshot = h.engine.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert_eq!(snapshot.queue_len, 0);
        assert_eq!(snapshot.position, 0);
        assert_eq!(snapshot.status.text, "Playback stopped.");
        assert!(h.speech.stops.load(Ordering::SeqCst) >= 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(drain(&mut statuses).is_empty());
        assert_eq!(h.engine.status().text, "Playback stopped.");

        assert!(!h.engine.start());
        assert_eq!(h.engine.status().text, "Nothing to play.");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.speech.played(), ["long"]);
        assert_eq!(h.engine.status().text, "Nothing to play.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_while_synthesizing_discards_the_late_clip() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let synth = FakeSynth {
            gate: Some(gate.clone()),
            ..FakeSynth::default()
        };
        let h = harness_with(synth, FakeOutput::new(100_000), None);
        let mut statuses = h.engine.subscribe_status();
        h.engine.load(
            vec![QueueItem::speech("late"), QueueItem::speech("never")],
            PlaybackOptions::default(),
        );
        assert!(h.engine.start());

        while h.synth.calls.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        h.engine.stop();
        gate.notify_one();
        drain(&mut statuses);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.speech.played().is_empty());
        assert_eq!(h.engine.state(), PlaybackState::Idle);
        assert_eq!(h.engine.status().text, "Playback stopped.");
        assert!(drain(&mut statuses).is_empty());
        assert_eq!(*h.synth.calls.lock().unwrap(), ["late"]);
    }

    #[tokio::test]
    async fn stop_during_timed_pause_skips_bell_and_rest() {
        let h = harness();
        let mut statuses = h.engine.subscribe_status();
        let mut state = h.engine.subscribe_state();
        h.engine.load(
            vec![QueueItem::Pause { duration_ms: 20 }, QueueItem::speech("after")],
            BELL_ON,
        );
        assert!(h.engine.start());
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == PlaybackState::TransitionPause),
        )
        .await
        .unwrap()
        .unwrap();

        h.engine.stop();
        drain(&mut statuses);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(h.bell.played().is_empty());
        assert!(h.speech.played().is_empty());
        assert!(h.synth.calls.lock().unwrap().is_empty());
        assert_eq!(h.engine.state(), PlaybackState::Idle);
        assert!(drain(&mut statuses).is_empty());
    }

    #[tokio::test]
    async fn synthesis_failure_is_reported_and_skipped() {
        let synth = FakeSynth {
            fail_on: Some("broken".into()),
            ..FakeSynth::default()
        };
        let h = harness_with(synth, FakeOutput::new(1), None);
        let mut statuses = h.engine.subscribe_status();
        h.engine.load(
            vec![
                QueueItem::speech("first"),
                QueueItem::speech("broken"),
                QueueItem::speech("   "),
                QueueItem::speech("last"),
            ],
            PlaybackOptions::default(),
        );
        h.engine.start();
        wait_for_idle(&h.engine).await;

        assert_eq!(h.speech.played(), ["first", "last"]);
        assert_eq!(h.synth.calls.lock().unwrap().len(), 3);
        let seen = drain(&mut statuses);
        assert!(seen.contains(&"Error: No audio content received.".to_string()));
        assert!(seen.contains(&"Nothing to speak.".to_string()));
    }

    #[tokio::test]
    async fn playback_failure_advances() {
        let h = harness_with(FakeSynth::default(), FakeOutput::failing(), None);
        let mut statuses = h.engine.subscribe_status();
        h.engine.load(
            vec![QueueItem::speech("a"), QueueItem::speech("b")],
            PlaybackOptions::default(),
        );
        h.engine.start();
        wait_for_idle(&h.engine).await;

        let errors: Vec<String> = drain(&mut statuses)
            .into_iter()
            .filter(|s| s.starts_with("Error playing audio"))
            .collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(h.synth.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn pause_freezes_timed_silence_until_resume() {
        let h = harness();
        h.engine.load(
            vec![QueueItem::Pause { duration_ms: 30 }, QueueItem::speech("after")],
            PlaybackOptions::default(),
        );
        h.engine.start();
        assert!(h.engine.pause());
        assert_eq!(h.engine.state(), PlaybackState::Paused);
        assert_eq!(h.engine.snapshot().controls.pause_label, "Resume");

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(h.speech.played().is_empty());
        assert_eq!(h.engine.state(), PlaybackState::Paused);

        assert!(h.engine.resume());
        assert_eq!(h.engine.state(), PlaybackState::TransitionPause);
        wait_for_idle(&h.engine).await;
        assert_eq!(h.speech.played(), ["after"]);
        assert!(h.bell.played().is_empty());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_wake_lock() {
        let h = harness_with(FakeSynth::default(), FakeOutput::new(100_000), None);
        h.engine.load(vec![QueueItem::speech("hold")], BELL_ON);
        h.engine.start();
        assert!(h.wake_lock.is_held());

        assert!(h.engine.toggle_pause());
        assert!(!h.wake_lock.is_held());
        assert!(!h.engine.pause());

        assert!(h.engine.toggle_pause());
        assert!(h.wake_lock.is_held());
        assert_eq!(h.wake_lock.acquired.load(Ordering::SeqCst), 2);

        h.engine.stop();
        assert!(!h.wake_lock.is_held());
    }

    #[tokio::test]
    async fn missing_bell_sound_is_not_fatal() {
        let h = harness_with(FakeSynth::default(), FakeOutput::new(1), None);
        let mut statuses = h.engine.subscribe_status();
        h.engine.load(
            vec![QueueItem::Pause { duration_ms: 1 }, QueueItem::speech("next")],
            BELL_ON,
        );
        h.engine.start();
        wait_for_idle(&h.engine).await;

        assert!(drain(&mut statuses).contains(&"Bell error (unknown).".to_string()));
        assert_eq!(h.speech.played(), ["next"]);
    }

    #[tokio::test]
    async fn start_and_load_only_from_idle() {
        let h = harness_with(FakeSynth::default(), FakeOutput::new(100_000), None);
        h.engine.load(vec![QueueItem::speech("one")], PlaybackOptions::default());
        assert!(h.engine.start());
        assert!(!h.engine.start());
        assert!(!h.engine.load(Vec::new(), PlaybackOptions::default()));
        h.engine.stop();
        assert!(h.engine.load(Vec::new(), PlaybackOptions::default()));
    }

    #[test]
    fn controls_follow_state() {
        assert_eq!(
            PlaybackState::Idle.controls(),
            Controls {
                play: true,
                pause: false,
                stop: false,
                pause_label: "Pause"
            }
        );
        for state in [PlaybackState::Playing, PlaybackState::TransitionPause] {
            let controls = state.controls();
            assert!(!controls.play && controls.pause && controls.stop);
            assert_eq!(controls.pause_label, "Pause");
        }
        assert_eq!(PlaybackState::Paused.controls().pause_label, "Resume");
    }

    #[test]
    fn pause_durations_format_like_seconds() {
        assert_eq!(format_secs(5000), "5");
        assert_eq!(format_secs(0), "0");
        assert_eq!(format_secs(2500), "2.5");
    }
}
