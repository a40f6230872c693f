//! Scripture passage lookup (ESV-style HTML API) and markup clean-up.

use std::time::Duration;

use regex::{Captures, Regex};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ScriptureConfig;
use crate::error::ScriptureError;

const CONTEXT_SITE: &str = "https://www.biblegateway.com/passage/";

#[derive(Debug, Deserialize)]
struct PassageReply {
    canonical: Option<String>,
    #[serde(default)]
    passages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScripturePassage {
    /// Canonical reference, or the queried one if the provider sent none.
    pub reference: String,
    pub html: String,
    pub text: String,
    /// "See in context" link to the whole chapter on an external site.
    pub context_url: String,
}

/// Strips provider markup that should not be shown: section headings,
/// chapter numbers, footnotes and repeated copyright lines.
pub struct PassageCleaner {
    drop: Vec<Regex>,
    paragraph: Regex,
    tag: Regex,
    numeric_entity: Regex,
    blank_lines: Regex,
    book_chapter: Regex,
}

impl PassageCleaner {
    pub fn new() -> Result<Self, regex::Error> {
        let drop = [
            r"(?is)<h2\b[^>]*>.*?</h2>",
            r#"(?is)<span\b[^>]*class="[^"]*\bchapter-num\b[^"]*"[^>]*>.*?</span>"#,
            r#"(?is)<b\b[^>]*class="[^"]*\bchapter-num\b[^"]*"[^>]*>.*?</b>"#,
            r#"(?is)<span\b[^>]*class="[^"]*\bfootnote\b[^"]*"[^>]*>.*?</span>"#,
            r#"(?is)<sup\b[^>]*class="[^"]*\bfootnote\b[^"]*"[^>]*>.*?</sup>"#,
            r#"(?is)<div\b[^>]*class="[^"]*\bfootnotes\b[^"]*"[^>]*>.*?</div>"#,
            r"(?is)<h3\b[^>]*>\s*footnotes\s*</h3>",
            r#"(?is)<p\b[^>]*class="[^"]*\bnote\b[^"]*"[^>]*>.*?</p>"#,
            r#"(?is)<div\b[^>]*class="[^"]*\bnote\b[^"]*"[^>]*>.*?</div>"#,
            r#"(?is)<li\b[^>]*class="[^"]*\bnote\b[^"]*"[^>]*>.*?</li>"#,
            r#"(?is)<span\b[^>]*class="[^"]*\bnote\b[^"]*"[^>]*>.*?</span>"#,
        ]
        .into_iter()
        .map(Regex::new)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            drop,
            paragraph: Regex::new(r"(?is)<p\b[^>]*>.*?</p>")?,
            tag: Regex::new(r"(?s)<[^>]+>")?,
            numeric_entity: Regex::new(r"&#(\d+);")?,
            blank_lines: Regex::new(r"\n\s*\n+")?,
            book_chapter: Regex::new(r"^([1-3]?\s?[a-zA-Z]+)\s*(\d+)")?,
        })
    }

    pub fn clean(&self, html: &str) -> String {
        let mut cleaned = html.to_string();
        for pattern in &self.drop {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        self.keep_last_copyright(&cleaned).trim().to_string()
    }

    /// Remove every paragraph carrying a copyright link except the last.
    fn keep_last_copyright(&self, html: &str) -> String {
        let copyright: Vec<(usize, usize)> = self
            .paragraph
            .find_iter(html)
            .filter(|m| m.as_str().contains("copyright"))
            .map(|m| (m.start(), m.end()))
            .collect();
        let Some((_, earlier)) = copyright.split_last() else {
            return html.to_string();
        };

        let mut kept = String::with_capacity(html.len());
        let mut cursor = 0;
        for &(start, end) in earlier {
            kept.push_str(&html[cursor..start]);
            cursor = end;
        }
        kept.push_str(&html[cursor..]);
        kept
    }

    pub fn to_plain_text(&self, html: &str) -> String {
        let with_breaks = html
            .replace("</p>", "</p>\n")
            .replace("<br>", "\n")
            .replace("<br/>", "\n")
            .replace("<br />", "\n");
        let stripped = self.tag.replace_all(&with_breaks, "");
        let decoded = self
            .numeric_entity
            .replace_all(&stripped, |caps: &Captures| {
                caps[1]
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            })
            .replace("&nbsp;", " ")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&");
        self.blank_lines
            .replace_all(decoded.trim(), "\n\n")
            .into_owned()
    }

    /// Link to the reference's whole chapter, e.g. "1 Samuel 2" for
    /// "1 Samuel 2:1-10". A bare book name is passed through.
    pub fn context_url(&self, reference: &str) -> String {
        let query = match self.book_chapter.captures(reference) {
            Some(caps) => format!("{} {}", caps[1].trim(), &caps[2]),
            None => reference
                .split(':')
                .next()
                .unwrap_or(reference)
                .trim()
                .to_string(),
        };
        match Url::parse_with_params(CONTEXT_SITE, &[("search", query.as_str()), ("version", "ESV")]) {
            Ok(url) => url.to_string(),
            Err(_) => CONTEXT_SITE.to_string(),
        }
    }
}

pub struct ScriptureClient {
    config: ScriptureConfig,
    client: Client,
    cleaner: PassageCleaner,
}

impl ScriptureClient {
    pub fn new(config: ScriptureConfig) -> Result<Self, ScriptureError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            config,
            client,
            cleaner: PassageCleaner::new()?,
        })
    }

    pub async fn lookup(&self, reference: &str) -> Result<ScripturePassage, ScriptureError> {
        if self.config.token.is_empty() {
            warn!("Scripture lookup requested but no API token is configured");
            return Err(ScriptureError::NotConfigured);
        }

        debug!("Looking up scripture: {reference}");
        let resp = self
            .client
            .get(&self.config.url)
            .header("Authorization", format!("Token {}", self.config.token))
            .query(&[
                ("q", reference.to_string()),
                (
                    "context-verses-before",
                    self.config.context_verses_before.to_string(),
                ),
                (
                    "context-verses-after",
                    self.config.context_verses_after.to_string(),
                ),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let mut detail = status
                .canonical_reason()
                .map(|r| format!(" {r}"))
                .unwrap_or_default();
            if let Ok(ApiError { detail: Some(d) }) = resp.json::<ApiError>().await {
                detail.push_str(&format!(" - {d}"));
            }
            warn!("Scripture lookup failed: {}{detail}", status.as_u16());
            return Err(ScriptureError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let reply: PassageReply = resp.json().await?;
        if reply.passages.is_empty() {
            return Err(ScriptureError::NotFound);
        }

        let reference = reply.canonical.unwrap_or_else(|| reference.to_string());
        let html = self.cleaner.clean(&reply.passages.concat());
        info!("Fetched scripture passage {reference}");
        Ok(ScripturePassage {
            text: self.cleaner.to_plain_text(&html),
            context_url: self.cleaner.context_url(&reference),
            reference,
            html,
        })
    }
}
