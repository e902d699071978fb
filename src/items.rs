use crate::eid::Eid;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The three independent collections of saved content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Links,
    Screenshots,
    Documents,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Links,
        Collection::Screenshots,
        Collection::Documents,
    ];

    /// Table name in the hosted store.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Links => "memories",
            Collection::Screenshots => "screenshots",
            Collection::Documents => "pdfs",
        }
    }

    /// Human label used in prompts and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Collection::Links => "bookmarks",
            Collection::Screenshots => "screenshots",
            Collection::Documents => "PDFs",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// One instant rendered both as epoch millis and ISO-8601, so the two never diverge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub timestamp: i64,
    pub created_at: String,
}

impl Stamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_millis(millis: i64) -> Self {
        Self::from_datetime(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }

    fn from_datetime(dt: DateTime<Utc>) -> Self {
        Stamp {
            timestamp: dt.timestamp_millis(),
            created_at: dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkItem {
    pub id: Eid,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub platform: String,
    pub timestamp: i64,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCaptureItem {
    pub id: Eid,
    pub url: String,
    pub title: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentItem {
    pub id: Eid,
    pub url: String,
    pub title: String,
    pub pdf_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    pub timestamp: i64,
    pub created_at: String,
}

/// What the relevance resolver needs to know about an item.
pub trait Searchable: Clone + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn tags(&self) -> &[String];

    /// Free text tokenized by the keyword fallback next to title and tags.
    fn keyword_text(&self) -> Option<&str>;

    /// Searchable text blob for the remote ranker, at most `budget` chars.
    fn search_content(&self, budget: usize) -> String;
}

impl Searchable for LinkItem {
    const COLLECTION: Collection = Collection::Links;

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn keyword_text(&self) -> Option<&str> {
        Some(self.note.as_str()).filter(|note| !note.is_empty())
    }

    fn search_content(&self, budget: usize) -> String {
        let content = [
            self.title.as_str(),
            self.note.as_str(),
            truncate_chars(self.full_text.as_deref().unwrap_or_default(), 1500),
            self.excerpt.as_deref().unwrap_or_default(),
            self.tags.join(" ").as_str(),
            self.category.as_str(),
            self.platform.as_str(),
        ]
        .join(" ");

        truncate_chars(&content, budget).to_string()
    }
}

impl Searchable for ImageCaptureItem {
    const COLLECTION: Collection = Collection::Screenshots;

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn keyword_text(&self) -> Option<&str> {
        self.extracted_text.as_deref()
    }

    fn search_content(&self, budget: usize) -> String {
        let content = [
            self.title.as_str(),
            truncate_chars(self.extracted_text.as_deref().unwrap_or_default(), 3000),
            self.tags.join(" ").as_str(),
        ]
        .join(" ");

        truncate_chars(&content, budget).to_string()
    }
}

impl Searchable for DocumentItem {
    const COLLECTION: Collection = Collection::Documents;

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn keyword_text(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    fn search_content(&self, budget: usize) -> String {
        let content = [
            self.title.as_str(),
            self.summary.as_deref().unwrap_or_default(),
            truncate_chars(self.full_text.as_deref().unwrap_or_default(), 3000),
            self.tags.join(" ").as_str(),
        ]
        .join(" ");

        truncate_chars(&content, budget).to_string()
    }
}

/// Cut `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Comma separated user input into a tag list. Kept verbatim, no dedup.
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(|tag| tag.to_string())
        .collect()
}

/// Platform label shown in the dashboard filters.
pub fn detect_platform(url: &str) -> String {
    let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    else {
        return "Website".to_string();
    };

    let host = host.strip_prefix("www.").unwrap_or(&host);

    let known = match host {
        h if h.contains("youtube.com") || h == "youtu.be" => Some("YouTube"),
        h if h.contains("twitter.com") || h == "x.com" => Some("Twitter"),
        "github.com" => Some("GitHub"),
        "stackoverflow.com" => Some("Stack Overflow"),
        "medium.com" => Some("Medium"),
        "dev.to" => Some("Dev.to"),
        "reddit.com" => Some("Reddit"),
        "linkedin.com" => Some("LinkedIn"),
        _ => None,
    };
    if let Some(name) = known {
        return name.to_string();
    }

    let main = host.split('.').next().unwrap_or_default();
    let mut chars = main.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Website".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Article,
    Video,
    Image,
    Pdf,
    Link,
    Code,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::Video => "video",
            ContentType::Image => "image",
            ContentType::Pdf => "pdf",
            ContentType::Link => "link",
            ContentType::Code => "code",
        }
    }
}

static IMAGE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg)$").expect("valid regex"));
static PDF_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf$").expect("valid regex"));

/// Words above which a link with extracted text counts as an article.
const ARTICLE_MIN_WORDS: u64 = 100;

pub fn detect_content_type(link: &LinkItem) -> ContentType {
    let url = link.url.as_str();

    if url.contains("youtube.com") || url.contains("youtu.be") || url.contains("vimeo.com") {
        return ContentType::Video;
    }
    if IMAGE_URL.is_match(url) {
        return ContentType::Image;
    }
    if PDF_URL.is_match(url) || url.contains("/pdf/") {
        return ContentType::Pdf;
    }
    if link.platform == "GitHub" || url.contains("github.com") {
        return ContentType::Code;
    }
    if link.full_text.is_some() && link.word_count.unwrap_or_default() > ARTICLE_MIN_WORDS {
        return ContentType::Article;
    }

    ContentType::Link
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str) -> LinkItem {
        let stamp = Stamp::from_millis(1_700_000_000_000);
        LinkItem {
            id: Eid::from("l1"),
            url: url.to_string(),
            title: "Title".to_string(),
            note: String::new(),
            tags: vec![],
            category: "Link".to_string(),
            platform: detect_platform(url),
            timestamp: stamp.timestamp,
            created_at: stamp.created_at,
            favicon: None,
            full_text: None,
            excerpt: None,
            word_count: None,
        }
    }

    #[test]
    fn test_stamp_fields_agree() {
        let stamp = Stamp::from_millis(1_700_000_000_123);
        assert_eq!(stamp.created_at, "2023-11-14T22:13:20.123Z");
        let parsed = DateTime::parse_from_rfc3339(&stamp.created_at).unwrap();
        assert_eq!(parsed.timestamp_millis(), stamp.timestamp);
    }

    #[test]
    fn test_parse_tags_keeps_duplicates_and_case() {
        assert_eq!(
            parse_tags(" Rust, web ,, rust ,"),
            vec!["Rust", "web", "rust"]
        );
        assert!(parse_tags("  ").is_empty());
    }

    #[test]
    fn test_detect_platform() {
        assert_eq!(detect_platform("https://www.youtube.com/watch?v=1"), "YouTube");
        assert_eq!(detect_platform("https://youtu.be/abc"), "YouTube");
        assert_eq!(detect_platform("https://x.com/someone"), "Twitter");
        assert_eq!(detect_platform("https://github.com/rust-lang/rust"), "GitHub");
        assert_eq!(detect_platform("https://stackoverflow.com/q/1"), "Stack Overflow");
        assert_eq!(detect_platform("https://en.wikipedia.org/wiki/Rust"), "En");
        assert_eq!(detect_platform("https://notion.so/page"), "Notion");
        assert_eq!(detect_platform("not a url"), "Website");
    }

    #[test]
    fn test_detect_content_type() {
        assert_eq!(detect_content_type(&link("https://youtu.be/x")), ContentType::Video);
        assert_eq!(detect_content_type(&link("https://a.com/cat.PNG")), ContentType::Image);
        assert_eq!(detect_content_type(&link("https://a.com/paper.pdf")), ContentType::Pdf);
        assert_eq!(detect_content_type(&link("https://github.com/a/b")), ContentType::Code);
        assert_eq!(detect_content_type(&link("https://a.com/post")), ContentType::Link);

        let mut article = link("https://a.com/post");
        article.full_text = Some("words".to_string());
        article.word_count = Some(250);
        assert_eq!(detect_content_type(&article), ContentType::Article);
    }

    #[test]
    fn test_truncate_chars_is_utf8_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_link_content_respects_budget() {
        let mut item = link("https://a.com");
        item.note = "y".repeat(1000);
        item.full_text = Some("x".repeat(5000));
        let content = item.search_content(2000);
        assert_eq!(content.chars().count(), 2000);
        assert!(content.starts_with("Title "));
    }

    #[test]
    fn test_optional_fields_absent_in_json() {
        let json = serde_json::to_value(link("https://a.com")).unwrap();
        assert!(json.get("favicon").is_none());
        assert!(json.get("full_text").is_none());
        assert_eq!(json["id"], "l1");
    }
}
