//! Local audio elements: one for speech, one for the transition bell.
//!
//! rodio 0.21: the `OutputStream` is not `Send`, so it is opened and kept
//! alive on a dedicated thread; elements share its `Mixer`.

use std::io::Cursor;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;

use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStreamBuilder, Sink};
use tracing::{debug, info, warn};

use crate::error::AudioError;

/// A single audio element. At most one clip is loaded at a time; playing a
/// new clip replaces the previous one.
pub trait AudioOutput: Send + Sync {
    /// Load encoded audio (mp3, wav, ...) and start playing it.
    fn play(&self, audio: Vec<u8>) -> Result<(), AudioError>;
    fn pause(&self);
    fn resume(&self);
    /// Silence and unload the current clip.
    fn stop(&self);
    /// True once the current clip has played out, or when nothing is loaded.
    fn is_finished(&self) -> bool;
}

/// Open the default output device and return its mixer. `None` when no
/// device is available; playback then reports an error per clip.
pub fn open_default_mixer() -> Option<Mixer> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("audio-output".into())
        .spawn(move || match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => {
                if tx.send(Ok(stream.mixer().clone())).is_err() {
                    return;
                }
                // Keep the stream alive for the process lifetime.
                loop {
                    thread::park();
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e.to_string()));
            }
        });
    if let Err(e) = spawned {
        warn!("Failed to start audio thread: {e}");
        return None;
    }

    match rx.recv() {
        Ok(Ok(mixer)) => {
            info!("Audio output opened");
            Some(mixer)
        }
        Ok(Err(e)) => {
            warn!("Failed to open audio output: {e}");
            None
        }
        Err(_) => {
            warn!("Audio thread exited before opening output");
            None
        }
    }
}

/// Read an encoded clip from disk, e.g. the transition bell.
pub fn load_clip(path: &Path) -> Option<Arc<[u8]>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
            Some(Arc::from(bytes))
        }
        Err(e) => {
            warn!("Failed to load sound {}: {e}", path.display());
            None
        }
    }
}

pub struct RodioOutput {
    name: &'static str,
    mixer: Option<Mixer>,
    sink: Mutex<Option<Sink>>,
}

impl RodioOutput {
    pub fn new(name: &'static str, mixer: Option<Mixer>) -> Self {
        Self {
            name,
            mixer,
            sink: Mutex::new(None),
        }
    }

    fn with_sink(&self, f: impl FnOnce(&Sink)) {
        if let Some(sink) = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            f(sink);
        }
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, audio: Vec<u8>) -> Result<(), AudioError> {
        let mixer = self.mixer.as_ref().ok_or(AudioError::Unavailable)?;
        let source =
            Decoder::new(Cursor::new(audio)).map_err(|e| AudioError::Decode(e.to_string()))?;

        let sink = Sink::connect_new(mixer);
        sink.append(source);

        let previous = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(sink);
        if let Some(previous) = previous {
            previous.stop();
        }
        debug!("{}: clip started", self.name);
        Ok(())
    }

    fn pause(&self) {
        self.with_sink(Sink::pause);
    }

    fn resume(&self) {
        self.with_sink(Sink::play);
    }

    fn stop(&self) {
        let current = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sink) = current {
            sink.stop();
            debug!("{}: stopped", self.name);
        }
    }

    fn is_finished(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, Sink::empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_without_device_reports_unavailable() {
        let output = RodioOutput::new("speech", None);
        assert!(matches!(
            output.play(vec![0u8; 16]),
            Err(AudioError::Unavailable)
        ));
        assert!(output.is_finished());
        output.pause();
        output.resume();
        output.stop();
    }

    #[test]
    fn missing_clip_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_clip(&dir.path().join("bell.mp3")).is_none());

        let path = dir.path().join("bell.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        assert_eq!(load_clip(&path).as_deref(), Some(&b"RIFF"[..]));
    }
}
