//! Flattening displayed prompts into a playable sequence.

use std::collections::HashMap;

use serde::Serialize;

use crate::prompts::{PrayerMode, Prompt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueItem {
    Speech { text: String },
    Pause { duration_ms: u64 },
}

impl QueueItem {
    pub fn speech(text: impl Into<String>) -> Self {
        Self::Speech { text: text.into() }
    }

    pub fn pause_secs(secs: u32) -> Self {
        Self::Pause {
            duration_ms: u64::from(secs) * 1000,
        }
    }
}

/// Build the queue for the active categories, in order. Each category with
/// a non-empty prompt contributes its announcement, the prompt text, the
/// mode's closing phrase if any, and one pause. Others are skipped.
pub fn build_queue(
    active: &[String],
    displayed: &HashMap<String, Option<Prompt>>,
    pause_secs: u32,
    mode: PrayerMode,
) -> Vec<QueueItem> {
    let mut queue = Vec::new();
    for category in active {
        let Some(Some(prompt)) = displayed.get(category) else {
            continue;
        };
        if prompt.text.trim().is_empty() {
            continue;
        }

        queue.push(QueueItem::speech(format!("{category}.")));
        queue.push(QueueItem::speech(prompt.text.clone()));
        if let Some(closing) = mode.closing_phrase(category) {
            queue.push(QueueItem::speech(closing));
        }
        queue.push(QueueItem::pause_secs(pause_secs));
    }
    queue
}
