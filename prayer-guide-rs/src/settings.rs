//! User preferences persisted in the local store.
//!
//! Each field is read and validated on its own; anything missing or
//! malformed falls back to that field's default without touching the rest.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LocalStoreError;
use crate::local_store::LocalStore;
use crate::prompts::{PrayerMode, METHOD_PRAYER_CATEGORIES};

const CATEGORY_ORDER_KEY: &str = "category_order_v1";
const PAUSE_DURATION_KEY: &str = "pause_duration_v1";
const PLAY_BELL_KEY: &str = "play_bell_sound_v1";
const PRAYER_MODE_KEY: &str = "prayer_mode_v1";
const THEME_KEY: &str = "theme_v1";
const KEEP_AWAKE_KEY: &str = "keep_screen_awake_v1";

pub const MAX_PAUSE_SECS: u32 = 60;
pub const DEFAULT_PAUSE_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Method-for-prayer category order. An empty list is a valid saved
    /// value and means "use the default order".
    pub category_order: Vec<String>,
    pub pause_secs: u32,
    pub play_bell: bool,
    pub mode: PrayerMode,
    pub theme: Theme,
    pub keep_awake: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            category_order: PrayerMode::MethodForPrayer.default_categories(),
            pause_secs: DEFAULT_PAUSE_SECS,
            play_bell: true,
            mode: PrayerMode::MethodForPrayer,
            theme: Theme::Light,
            keep_awake: false,
        }
    }
}

impl Settings {
    pub fn load(store: &LocalStore) -> Self {
        let defaults = Self::default();
        let settings = Self {
            category_order: load_category_order(store).unwrap_or(defaults.category_order),
            pause_secs: load_json::<u32>(store, PAUSE_DURATION_KEY)
                .filter(|secs| *secs <= MAX_PAUSE_SECS)
                .unwrap_or(defaults.pause_secs),
            play_bell: load_json(store, PLAY_BELL_KEY).unwrap_or(defaults.play_bell),
            mode: load_json::<String>(store, PRAYER_MODE_KEY)
                .and_then(|tag| PrayerMode::from_tag(&tag))
                .unwrap_or(defaults.mode),
            theme: load_theme(store).unwrap_or(defaults.theme),
            keep_awake: load_json(store, KEEP_AWAKE_KEY).unwrap_or(defaults.keep_awake),
        };
        debug!("Settings loaded: {settings:?}");
        settings
    }

    /// Persist every field. An empty method order is stored as the default.
    pub fn save(&mut self, store: &LocalStore) -> Result<(), LocalStoreError> {
        self.category_order = normalize_order(&self.category_order);
        self.pause_secs = self.pause_secs.min(MAX_PAUSE_SECS);

        store.set(
            CATEGORY_ORDER_KEY,
            serde_json::to_string(&self.category_order)?,
        )?;
        store.set(PAUSE_DURATION_KEY, self.pause_secs.to_string())?;
        store.set(PLAY_BELL_KEY, self.play_bell.to_string())?;
        store.set(PRAYER_MODE_KEY, serde_json::to_string(self.mode.tag())?)?;
        store.set(THEME_KEY, self.theme.tag())?;
        store.set(KEEP_AWAKE_KEY, self.keep_awake.to_string())?;
        Ok(())
    }

    /// Categories shown and played for the current mode. Never empty.
    pub fn active_categories(&self) -> Vec<String> {
        match self.mode {
            PrayerMode::MethodForPrayer if !self.category_order.is_empty() => {
                self.category_order.clone()
            }
            mode => mode.default_categories(),
        }
    }
}

/// Keep known method categories in their given order, dropping duplicates.
/// Empty or all-unknown input becomes the default order.
pub fn normalize_order(order: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for name in order {
        if METHOD_PRAYER_CATEGORIES.contains(&name.as_str()) && !kept.contains(name) {
            kept.push(name.clone());
        }
    }
    if kept.is_empty() {
        PrayerMode::MethodForPrayer.default_categories()
    } else {
        kept
    }
}

fn load_json<T: serde::de::DeserializeOwned>(store: &LocalStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring invalid stored value for {key}: {e}");
            None
        }
    }
}

fn load_category_order(store: &LocalStore) -> Option<Vec<String>> {
    let saved: Vec<String> = load_json(store, CATEGORY_ORDER_KEY)?;
    if saved.is_empty() {
        return Some(saved);
    }
    Some(normalize_order(&saved))
}

/// Themes are stored as a bare tag; a JSON-quoted tag is accepted too.
fn load_theme(store: &LocalStore) -> Option<Theme> {
    let raw = store.get(THEME_KEY)?;
    match raw.trim().trim_matches('"') {
        "light" => Some(Theme::Light),
        "dark" => Some(Theme::Dark),
        other => {
            warn!("Ignoring unknown theme '{other}'");
            None
        }
    }
}
