//! Prayer prompts, prayer modes and the per-category prompt pool.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PromptSourcesConfig;
use crate::error::PromptLoadError;

pub const UNCATEGORIZED: &str = "Uncategorized";

pub const METHOD_PRAYER_CATEGORIES: [&str; 5] = [
    "Adoration",
    "Thanksgiving",
    "Confession",
    "Petition",
    "Intercession",
];

pub const LORDS_PRAYER_CATEGORIES: [&str; 8] = [
    "Our Father in heaven",
    "Hallowed be your name",
    "Your kingdom come",
    "Your will be done on earth as it is in heaven",
    "Give us this day, our daily bread",
    "Forgive us our trespasses, as we forgive those who trespass against us",
    "Lead us not into temptation, but deliver us from evil",
    "For yours is the kingdom, and the power, and the glory, forever and ever",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrayerMode {
    #[default]
    MethodForPrayer,
    LordsPrayer,
}

impl PrayerMode {
    pub fn tag(self) -> &'static str {
        match self {
            Self::MethodForPrayer => "method_for_prayer",
            Self::LordsPrayer => "lords_prayer",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "method_for_prayer" => Some(Self::MethodForPrayer),
            "lords_prayer" => Some(Self::LordsPrayer),
            _ => None,
        }
    }

    pub fn default_categories(self) -> Vec<String> {
        let names: &[&str] = match self {
            Self::MethodForPrayer => &METHOD_PRAYER_CATEGORIES,
            Self::LordsPrayer => &LORDS_PRAYER_CATEGORIES,
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    pub fn subheader(self) -> &'static str {
        match self {
            Self::MethodForPrayer => "A Method for Prayer by Matthew Henry",
            Self::LordsPrayer => "The Lord's Prayer",
        }
    }

    /// Phrase spoken after a category's prompt. Only the method-for-prayer
    /// categories have one.
    pub fn closing_phrase(self, category: &str) -> Option<&'static str> {
        if self != Self::MethodForPrayer {
            return None;
        }
        match category {
            "Adoration" => Some("Let us adore him."),
            "Thanksgiving" => Some("Let us thank God."),
            "Confession" => Some("Let us confess our sins."),
            "Petition" => Some("Let us present our requests to God."),
            "Intercession" => Some("Let us pray for others."),
            _ => None,
        }
    }

    pub fn source(self, sources: &PromptSourcesConfig) -> &str {
        match self {
            Self::MethodForPrayer => &sources.method_for_prayer,
            Self::LordsPrayer => &sources.lords_prayer,
        }
    }
}

impl std::fmt::Display for PrayerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single piece of prayer guidance. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(rename = "prayer_category", default = "uncategorized")]
    pub category: String,
    #[serde(rename = "prompt", default)]
    pub text: String,
    #[serde(default)]
    pub scripture_references: Vec<String>,
}

fn uncategorized() -> String {
    UNCATEGORIZED.to_string()
}

impl Prompt {
    /// Display form: prompt text followed by its references, e.g.
    /// `Praise him (Psalm 150:1 • Psalm 150:6)`.
    pub fn render(&self) -> String {
        if self.scripture_references.is_empty() {
            self.text.clone()
        } else {
            format!("{} ({})", self.text, self.scripture_references.join(" • "))
        }
    }
}

/// Display text for a category with no prompt available.
pub fn missing_prompt_text(category: &str) -> String {
    format!("(No prompt available for {category})")
}

/// Prompts grouped by category, in load order.
#[derive(Debug, Clone, Default)]
pub struct CategoryPool {
    groups: HashMap<String, Vec<Prompt>>,
}

impl CategoryPool {
    pub fn from_prompts(prompts: Vec<Prompt>) -> Self {
        let mut groups: HashMap<String, Vec<Prompt>> = HashMap::new();
        for mut prompt in prompts {
            if prompt.category.trim().is_empty() {
                prompt.category = uncategorized();
            }
            groups.entry(prompt.category.clone()).or_default().push(prompt);
        }
        Self { groups }
    }

    pub fn prompts(&self, category: &str) -> &[Prompt] {
        self.groups.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn category_count(&self) -> usize {
        self.groups.len()
    }
}

/// Fetches the prompt data source for a mode: a JSON array of prompt
/// records, read from disk or over HTTP.
pub struct PromptLoader {
    sources: PromptSourcesConfig,
    client: Client,
}

impl PromptLoader {
    pub fn new(sources: PromptSourcesConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { sources, client }
    }

    pub async fn load(&self, mode: PrayerMode) -> Result<Vec<Prompt>, PromptLoadError> {
        let source = mode.source(&self.sources);
        debug!("Loading {mode} prompts from {source}");

        let body = if source.starts_with("http://") || source.starts_with("https://") {
            let resp = self.client.get(source).send().await?;
            if !resp.status().is_success() {
                return Err(PromptLoadError::Status(resp.status().as_u16()));
            }
            resp.text().await?
        } else {
            tokio::fs::read_to_string(source).await?
        };

        let prompts = parse_prompts(&body)?;
        info!("Loaded {} {mode} prompts from {source}", prompts.len());
        Ok(prompts)
    }
}

pub fn parse_prompts(json: &str) -> Result<Vec<Prompt>, PromptLoadError> {
    let prompts: Vec<Prompt> = serde_json::from_str(json)?;
    if prompts.is_empty() {
        return Err(PromptLoadError::Empty);
    }
    Ok(prompts)
}
