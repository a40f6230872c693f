//! Narrated playback of the displayed prayer.
//!
//! - `queue`: flattening prompts into speech and pause items
//! - `engine`: the playback state machine
//! - `synth`: remote speech synthesis
//! - `output`: rodio-backed audio elements
//! - `wake_lock`: keeping the screen awake while playing

pub mod engine;
pub mod output;
pub mod queue;
pub mod synth;
pub mod wake_lock;

#[cfg(test)]
pub mod testing;

pub use engine::{AudioQueueEngine, EngineParts, PlaybackOptions, PlaybackSnapshot, PlaybackState};
pub use queue::{build_queue, QueueItem};
