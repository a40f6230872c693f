//! Session orchestration: the displayed prayer, its reflections, playback,
//! saving and calendar recall.
//!
//! Every user action that changes what is shown stops playback first.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::crypto::cipher::ReflectionCipher;
use crate::error::{PromptLoadError, SaveError, ScriptureError, SettingsError, StoreError};
use crate::local_store::LocalStore;
use crate::notifier::Notifier;
use crate::playback::{build_queue, AudioQueueEngine, PlaybackOptions, PlaybackSnapshot, PlaybackState};
use crate::prompts::{CategoryPool, PrayerMode, Prompt, PromptLoader};
use crate::reflection::{ReflectionBoard, ReflectionDraft};
use crate::scripture::{ScriptureClient, ScripturePassage};
use crate::selector::PromptSelector;
use crate::settings::{Settings, Theme};
use crate::store::{
    SavedSession, SessionSegment, SessionStore, SortOrder, StoredReflection, TimeWindow,
};

const SUMMARY_WORDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecalledReflection {
    pub text: String,
    /// False for reflections saved before encryption existed.
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecalledSegment {
    pub category: String,
    pub text_with_scripture: String,
    pub reflection: Option<RecalledReflection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecalledSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub segments: Vec<RecalledSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub name: String,
    pub text: String,
    pub prompt: Option<Prompt>,
    pub can_go_back: bool,
    pub reflection: ReflectionDraft,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrayerView {
    pub mode: PrayerMode,
    pub subheader: &'static str,
    pub theme: Theme,
    pub user: Option<String>,
    pub categories: Vec<CategoryView>,
    pub playback: PlaybackSnapshot,
}

pub struct SessionParts {
    pub local: Arc<LocalStore>,
    pub cipher: ReflectionCipher,
    pub store: Arc<dyn SessionStore>,
    pub loader: PromptLoader,
    pub scripture: ScriptureClient,
    pub engine: AudioQueueEngine,
    pub notifier: Arc<Notifier>,
    pub user: Option<String>,
}

pub struct SessionOrchestrator {
    settings: Settings,
    selector: PromptSelector,
    reflections: ReflectionBoard,
    local: Arc<LocalStore>,
    cipher: ReflectionCipher,
    store: Arc<dyn SessionStore>,
    loader: PromptLoader,
    scripture: ScriptureClient,
    engine: AudioQueueEngine,
    notifier: Arc<Notifier>,
    user: Option<String>,
}

impl SessionOrchestrator {
    pub fn new(parts: SessionParts) -> Self {
        let settings = Settings::load(&parts.local);
        Self {
            settings,
            selector: PromptSelector::default(),
            reflections: ReflectionBoard::default(),
            local: parts.local,
            cipher: parts.cipher,
            store: parts.store,
            loader: parts.loader,
            scripture: parts.scripture,
            engine: parts.engine,
            notifier: parts.notifier,
            user: parts.user,
        }
    }

    pub fn engine(&self) -> &AudioQueueEngine {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn active_categories(&self) -> Vec<String> {
        self.settings.active_categories()
    }

    fn is_active(&self, category: &str) -> bool {
        self.active_categories().iter().any(|c| c == category)
    }

    pub fn view(&self) -> PrayerView {
        let categories = self
            .active_categories()
            .into_iter()
            .map(|name| CategoryView {
                text: self.selector.rendered(&name),
                prompt: self.selector.displayed(&name).cloned(),
                can_go_back: self.selector.can_go_back(&name),
                reflection: self.reflections.get(&name).cloned().unwrap_or_default(),
                name,
            })
            .collect();
        PrayerView {
            mode: self.settings.mode,
            subheader: self.settings.mode.subheader(),
            theme: self.settings.theme,
            user: self.user.clone(),
            categories,
            playback: self.engine.snapshot(),
        }
    }

    /// Fetch the prompt source for the current mode and rebuild the pool,
    /// history and displayed prompts. On failure the previous pool is
    /// kept.
    pub async fn reload(&mut self) -> Result<(), PromptLoadError> {
        self.engine.stop();
        match self.loader.load(self.settings.mode).await {
            Ok(prompts) => {
                let pool = CategoryPool::from_prompts(prompts);
                info!(
                    "Prompt pool rebuilt with {} categories",
                    pool.category_count()
                );
                self.rebuild(pool);
                Ok(())
            }
            Err(e) => {
                error!("Error loading prayer data: {e}");
                let previous = self.selector.pool().clone();
                self.rebuild(previous);
                Err(e)
            }
        }
    }

    fn rebuild(&mut self, pool: CategoryPool) {
        let active = self.active_categories();
        self.selector.reset(pool, &active);
        self.reflections.clear_all();
        self.selector.regenerate(&active);
    }

    /// New random prompt for every active category.
    pub fn regenerate(&mut self) {
        self.engine.stop();
        if self.selector.pool().is_empty() {
            warn!("No prayer prompts loaded");
        }
        let active = self.active_categories();
        self.selector.regenerate(&active);
        self.reflections.clear_all();
    }

    pub fn refresh(&mut self, category: &str) -> bool {
        self.engine.stop();
        if !self.is_active(category) {
            return false;
        }
        self.selector.refresh(category);
        self.reflections.clear(category);
        true
    }

    pub fn back(&mut self, category: &str) -> bool {
        self.engine.stop();
        if !self.selector.back(category) {
            return false;
        }
        self.reflections.clear(category);
        true
    }

    pub fn toggle_reflection(&mut self, category: &str) -> Option<ReflectionDraft> {
        if !self.is_active(category) {
            return None;
        }
        let draft = self.reflections.draft_mut(category);
        draft.toggle();
        Some(draft.clone())
    }

    pub fn edit_reflection(&mut self, category: &str, text: &str) -> Option<ReflectionDraft> {
        if !self.is_active(category) {
            return None;
        }
        let draft = self.reflections.draft_mut(category);
        if !draft.edit(text) {
            info!("Reflection for {category} is locked; edit ignored");
        }
        Some(draft.clone())
    }

    pub fn lock_reflection(&mut self, category: &str) -> Option<ReflectionDraft> {
        if !self.is_active(category) {
            return None;
        }
        let draft = self.reflections.draft_mut(category);
        draft.lock();
        Some(draft.clone())
    }

    fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions {
            play_bell: self.settings.play_bell,
            keep_awake: self.settings.keep_awake,
        }
    }

    /// Resume if paused, otherwise narrate the displayed prayer from the top.
    pub fn play(&mut self) -> bool {
        match self.engine.state() {
            PlaybackState::Paused => self.engine.resume(),
            PlaybackState::Idle => {
                let queue = build_queue(
                    &self.active_categories(),
                    self.selector.displayed_prompts(),
                    self.settings.pause_secs,
                    self.settings.mode,
                );
                self.engine.load(queue, self.playback_options());
                self.engine.start()
            }
            _ => false,
        }
    }

    pub fn pause_toggle(&self) -> bool {
        self.engine.toggle_pause()
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    /// Persist the displayed prayer. Reflections are stored only when
    /// encrypted; a reflection that cannot be encrypted is left out.
    pub async fn save(&mut self) -> Result<SavedSession, SaveError> {
        self.engine.stop();
        let user = self.user.clone().ok_or(SaveError::NotSignedIn)?;

        let segments = self.collect_segments();
        if segments.is_empty() {
            warn!("Nothing to save");
            return Err(SaveError::NothingToSave);
        }

        let saved = self.store.add(&user, segments).await?;
        info!("Prayer saved with {} segments", saved.segments.len());
        Ok(saved)
    }

    fn collect_segments(&self) -> Vec<SessionSegment> {
        self.active_categories()
            .into_iter()
            .filter_map(|category| {
                let prompt = self.selector.displayed(&category)?;
                let reflection = self.reflections.saveable(&category).and_then(|text| {
                    let envelope = self.cipher.encrypt(text);
                    if envelope.is_none() {
                        warn!("Reflection for {category} could not be encrypted and is not saved");
                        self.notifier.notify(
                            "Reflection not saved",
                            "Could not encrypt reflection. It will not be saved.",
                        );
                    }
                    envelope.map(StoredReflection::Encrypted)
                });
                Some(SessionSegment {
                    text_with_scripture: prompt.render(),
                    prompt_text: prompt.text.clone(),
                    category,
                    reflection,
                })
            })
            .collect()
    }

    /// Decrypt a saved session for display.
    pub fn recall(&self, session: &SavedSession) -> RecalledSession {
        self.engine.stop();
        let segments = session
            .segments
            .iter()
            .map(|segment| RecalledSegment {
                category: segment.category.clone(),
                text_with_scripture: segment.text_with_scripture.clone(),
                reflection: match &segment.reflection {
                    Some(StoredReflection::Encrypted(envelope)) => Some(RecalledReflection {
                        text: self.cipher.decrypt_envelope(envelope),
                        encrypted: true,
                    }),
                    Some(StoredReflection::Legacy(text)) if !text.trim().is_empty() => {
                        Some(RecalledReflection {
                            text: text.clone(),
                            encrypted: false,
                        })
                    }
                    _ => None,
                },
            })
            .collect();
        RecalledSession {
            id: session.id.clone(),
            created_at: session.created_at,
            segments,
        }
    }

    /// Days of a month (1-based month, local time) that have saved sessions.
    pub async fn month_days(&self, year: i32, month: u32) -> Result<Vec<u32>, StoreError> {
        let (Some(user), Some(window)) = (&self.user, TimeWindow::month(year, month)) else {
            return Ok(Vec::new());
        };
        let sessions = self.store.query(user, window, SortOrder::Descending).await?;
        let mut days: Vec<u32> = sessions
            .iter()
            .map(|s| s.created_at.with_timezone(&Local).day())
            .collect();
        days.sort_unstable();
        days.dedup();
        Ok(days)
    }

    /// Sessions saved on a local date, earliest first.
    pub async fn day_sessions(&self, date: NaiveDate) -> Result<Vec<SessionSummary>, StoreError> {
        self.engine.stop();
        Ok(self
            .sessions_on(date)
            .await?
            .iter()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                created_at: s.created_at,
                summary: session_summary(s),
            })
            .collect())
    }

    pub async fn open_session(
        &self,
        date: NaiveDate,
        id: &str,
    ) -> Result<Option<RecalledSession>, StoreError> {
        let found = self.sessions_on(date).await?.into_iter().find(|s| s.id == id);
        Ok(found.map(|s| self.recall(&s)))
    }

    async fn sessions_on(&self, date: NaiveDate) -> Result<Vec<SavedSession>, StoreError> {
        let (Some(user), Some(window)) = (&self.user, TimeWindow::day(date)) else {
            return Ok(Vec::new());
        };
        self.store.query(user, window, SortOrder::Ascending).await
    }

    pub async fn lookup_scripture(&self, reference: &str) -> Result<ScripturePassage, ScriptureError> {
        self.engine.stop();
        self.scripture.lookup(reference).await
    }

    /// Persist new settings, then reload prompts for the (possibly new)
    /// mode and start a fresh prayer.
    pub async fn apply_settings(&mut self, mut settings: Settings) -> Result<(), SettingsError> {
        self.engine.stop();
        settings.save(&self.local)?;
        info!(
            "Settings saved. Mode: {}, order: {:?}",
            settings.mode, settings.category_order
        );
        self.settings = settings;
        self.reload().await?;
        Ok(())
    }

    pub fn sign_in(&mut self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!("Signed in as {user_id}");
        self.user = Some(user_id);
    }

    pub fn sign_out(&mut self) {
        self.engine.stop();
        if self.user.take().is_some() {
            info!("Signed out");
        }
    }
}

/// First words of the first segment's prompt, else its category, else
/// "Prayer".
pub fn session_summary(session: &SavedSession) -> String {
    let Some(first) = session.segments.first() else {
        return "Prayer".to_string();
    };
    let words: Vec<&str> = first.prompt_text.split_whitespace().collect();
    if words.is_empty() {
        return if first.category.is_empty() {
            "Prayer".to_string()
        } else {
            first.category.clone()
        };
    }
    let mut summary = words[..words.len().min(SUMMARY_WORDS)].join(" ");
    if words.len() > SUMMARY_WORDS {
        summary.push_str("...");
    }
    summary
}
