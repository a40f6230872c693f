//! Saved prayer sessions.
//!
//! The store is per user, append-only, and queried by creation-time window.
//! `JsonlSessionStore` keeps one JSONL file per user per UTC day under
//! `<data_dir>/sessions/u_<base64url(user)>/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Local, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::crypto::cipher::EncryptedEnvelope;
use crate::error::StoreError;

const ID_LEN: usize = 20;

/// A stored reflection: an encrypted envelope, or a plain string written
/// before reflections were encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredReflection {
    Encrypted(EncryptedEnvelope),
    Legacy(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSegment {
    pub category: String,
    pub text_with_scripture: String,
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default)]
    pub reflection: Option<StoredReflection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub segments: Vec<SessionSegment>,
}

/// Creation-time window, start inclusive and end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// A calendar month in local time. `month` is 1-based.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start: local_midnight(first)?,
            end: local_midnight(next)?,
        })
    }

    /// A calendar day in local time.
    pub fn day(date: NaiveDate) -> Option<Self> {
        Some(Self {
            start: local_midnight(date)?,
            end: local_midnight(date.succ_opt()?)?,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn local_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append a session. The store assigns the id and creation time.
    async fn add(
        &self,
        user_id: &str,
        segments: Vec<SessionSegment>,
    ) -> Result<SavedSession, StoreError>;

    async fn query(
        &self,
        user_id: &str,
        window: TimeWindow,
        order: SortOrder,
    ) -> Result<Vec<SavedSession>, StoreError>;
}

pub struct JsonlSessionStore {
    root: PathBuf,
}

impl JsonlSessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("sessions"),
        }
    }

    /// One directory per distinct id; the encoding is path-safe and
    /// reversible.
    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root
            .join(format!("u_{}", URL_SAFE_NO_PAD.encode(user_id.as_bytes())))
    }

    async fn read_day(path: &Path) -> Result<Vec<SavedSession>, StoreError> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match serde_json::from_str::<SavedSession>(line) {
                Ok(session) => sessions.push(session),
                Err(e) => debug!("Skipping malformed session line in {}: {e}", path.display()),
            }
        }
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn add(
        &self,
        user_id: &str,
        segments: Vec<SessionSegment>,
    ) -> Result<SavedSession, StoreError> {
        let session = SavedSession {
            id: rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(ID_LEN)
                .map(char::from)
                .collect(),
            created_at: Utc::now(),
            segments,
        };
        let mut line = serde_json::to_string(&session)?;
        line.push('\n');

        let dir = self.user_dir(user_id);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.jsonl", session.created_at.format("%Y-%m-%d")));
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!("Saved session {} to {}", session.id, path.display());
        Ok(session)
    }

    async fn query(
        &self,
        user_id: &str,
        window: TimeWindow,
        order: SortOrder,
    ) -> Result<Vec<SavedSession>, StoreError> {
        let dir = self.user_dir(user_id);
        let mut sessions = Vec::new();

        let mut day = window.start.date_naive();
        let last = window.end.date_naive();
        while day <= last {
            let path = dir.join(format!("{}.jsonl", day.format("%Y-%m-%d")));
            sessions.extend(
                Self::read_day(&path)
                    .await?
                    .into_iter()
                    .filter(|s| window.contains(s.created_at)),
            );
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }

        sessions.sort_by_key(|s| s.created_at);
        if order == SortOrder::Descending {
            sessions.reverse();
        }
        debug!("Query for {user_id} returned {} sessions", sessions.len());
        Ok(sessions)
    }
}
