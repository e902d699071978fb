//! Save paths: links from the popup form and context menu, screenshots with
//! text extraction, PDFs with summaries.
//!
//! Every operation reports a [`CaptureOutcome`] instead of an error. An
//! upload failure aborts before anything is inserted; enrichment failures
//! only degrade the saved record.

pub mod page;
pub mod pdf;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    ai::{enrich, TextGenerator},
    eid::Eid,
    items::{detect_platform, parse_tags, DocumentItem, ImageCaptureItem, LinkItem, Stamp},
    storage::{self, KeyValueStore},
    store::{self, BlobStore, Store},
};

pub const SCREENSHOT_BUCKET: &str = "screenshots";
pub const DOCUMENT_BUCKET: &str = "pdfs";

const QUICK_SAVE_CATEGORY: &str = "Quick Save";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl CaptureOutcome {
    fn saved(id: &Eid, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            id: Some(id.to_string()),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            id: None,
        }
    }
}

/// The popup save form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkDraft {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub note: String,
    /// Comma separated, as typed.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub reader_mode: bool,
}

pub struct Capturer {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    generator: Arc<dyn TextGenerator>,
    cache: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
}

impl Capturer {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        generator: Arc<dyn TextGenerator>,
        cache: Arc<dyn KeyValueStore>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            blobs,
            generator,
            cache,
            http: page::http_client()?,
        })
    }

    fn new_link(url: &str, title: &str) -> LinkItem {
        let stamp = Stamp::now();
        LinkItem {
            id: Eid::at(stamp.timestamp),
            url: url.to_string(),
            title: title.to_string(),
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

    async fn persist_link(&self, link: LinkItem, message: &str) -> CaptureOutcome {
        if let Err(err) = store::insert_item(self.store.as_ref(), &link).await {
            log::error!("failed to save link {}: {err}", link.url);
            return CaptureOutcome::failed(format!("Failed to save: {err}"));
        }

        if let Err(err) = storage::prepend_link_snapshot(self.cache.as_ref(), &link) {
            log::warn!("couldn't update offline copy: {err:?}");
        }

        log::info!("saved link {} ({})", link.id, link.url);
        CaptureOutcome::saved(&link.id, message)
    }

    pub async fn save_link(&self, draft: LinkDraft) -> CaptureOutcome {
        let url = draft.url.trim();
        if url.is_empty() {
            return CaptureOutcome::failed("URL is required");
        }

        let mut link = Self::new_link(url, draft.title.trim());
        link.note = draft.note.trim().to_string();
        link.tags = parse_tags(&draft.tags);
        link.favicon = draft.favicon.filter(|f| !f.is_empty());
        if let Some(category) = draft.category.filter(|c| !c.trim().is_empty()) {
            link.category = category.trim().to_string();
        }
        if let Some(platform) = draft.platform.filter(|p| !p.trim().is_empty()) {
            link.platform = platform.trim().to_string();
        }

        if draft.reader_mode {
            let html = page::fetch_html(&self.http, url).await;
            match html.as_deref().and_then(page::extract_reader_text) {
                Some(reader) => {
                    log::info!("{url}: extracted {} words", reader.word_count);
                    if link.title.is_empty() {
                        link.title = reader.title.unwrap_or_default();
                    }
                    link.full_text = Some(reader.full_text);
                    link.excerpt = Some(reader.excerpt);
                    link.word_count = Some(reader.word_count);
                }
                None => log::warn!("{url}: reader mode extraction failed, saving without text"),
            }
        }

        if link.title.is_empty() {
            link.title = "Untitled".to_string();
        }

        self.persist_link(link, "Saved successfully!").await
    }

    /// Context-menu clip of selected text on a page.
    pub async fn clip_selection(&self, url: &str, title: &str, text: &str) -> CaptureOutcome {
        let title = if title.trim().is_empty() { "Selected Text" } else { title };
        let mut link = Self::new_link(url, title);
        link.note = text.to_string();
        link.tags = vec!["selection".to_string(), "quick-save".to_string()];
        link.category = QUICK_SAVE_CATEGORY.to_string();

        self.persist_link(link, "Saved successfully!").await
    }

    /// Context-menu save of a link found on a page.
    pub async fn save_link_target(&self, link_url: &str, page_title: &str) -> CaptureOutcome {
        let title = if link_url.is_empty() { "Saved Link" } else { link_url };
        let mut link = Self::new_link(link_url, title);
        link.note = format!("Saved from: {page_title}");
        link.tags = vec!["link".to_string(), "quick-save".to_string()];

        self.persist_link(link, "Saved successfully!").await
    }

    /// One-shot save of the current page.
    pub async fn quick_save(&self, url: &str, title: &str) -> CaptureOutcome {
        let title = if title.trim().is_empty() { "Untitled" } else { title };
        let mut link = Self::new_link(url, title);
        link.note = "Quick saved".to_string();
        link.tags = vec!["quick-save".to_string()];
        link.category = QUICK_SAVE_CATEGORY.to_string();

        self.persist_link(link, "Quick saved!").await
    }

    pub async fn save_screenshot(&self, url: &str, title: &str, png: Vec<u8>) -> CaptureOutcome {
        let stamp = Stamp::now();
        let id = Eid::at(stamp.timestamp);
        let filename = format!("screenshot_{id}.png");

        if let Err(err) = self
            .blobs
            .upload(SCREENSHOT_BUCKET, &filename, png.clone(), "image/png")
            .await
        {
            log::error!("screenshot upload failed: {err}");
            return CaptureOutcome::failed(format!("Upload failed: {err}"));
        }
        let image_url = self.blobs.public_url(SCREENSHOT_BUCKET, &filename);
        log::info!("screenshot uploaded to {image_url}");

        let extracted_text = enrich::extract_text_from_image(self.generator.as_ref(), &png).await;
        let tags =
            enrich::suggest_tags(self.generator.as_ref(), &extracted_text, "screenshot").await;

        let item = ImageCaptureItem {
            id,
            url: url.to_string(),
            title: title.to_string(),
            image_url,
            extracted_text: Some(extracted_text),
            tags,
            timestamp: stamp.timestamp,
            created_at: stamp.created_at,
        };

        if let Err(err) = store::insert_item(self.store.as_ref(), &item).await {
            log::error!("failed to save screenshot {}: {err}", item.id);
            return CaptureOutcome::failed(format!("Database error: {err}"));
        }

        CaptureOutcome::saved(&item.id, "Screenshot captured and text extracted successfully")
    }

    pub async fn save_document(&self, url: &str, title: &str, bytes: Vec<u8>) -> CaptureOutcome {
        let stamp = Stamp::now();
        let id = Eid::at(stamp.timestamp);
        let filename = format!("pdf_{id}.pdf");

        let file_size = bytes.len() as u64;
        let page_count = pdf::page_count(&bytes);
        let full_text = pdf::extract_text(bytes.clone())
            .await
            .unwrap_or_else(|| pdf::TEXT_FAILED.to_string());

        if let Err(err) = self
            .blobs
            .upload(DOCUMENT_BUCKET, &filename, bytes, "application/pdf")
            .await
        {
            log::error!("pdf upload failed: {err}");
            return CaptureOutcome::failed(format!("Upload failed: {err}"));
        }
        let pdf_url = self.blobs.public_url(DOCUMENT_BUCKET, &filename);
        log::info!("pdf uploaded to {pdf_url}");

        let summary = enrich::summarize_document(self.generator.as_ref(), &full_text, title).await;
        let tags = enrich::suggest_tags(
            self.generator.as_ref(),
            &format!("{full_text} {summary}"),
            "PDF document",
        )
        .await;

        let item = DocumentItem {
            id,
            url: url.to_string(),
            title: title.to_string(),
            pdf_url,
            summary: Some(summary),
            full_text: Some(full_text),
            tags,
            page_count: Some(page_count),
            file_size: Some(file_size),
            timestamp: stamp.timestamp,
            created_at: stamp.created_at,
        };

        if let Err(err) = store::insert_item(self.store.as_ref(), &item).await {
            log::error!("failed to save pdf {}: {err}", item.id);
            return CaptureOutcome::failed(format!("Database error: {err}"));
        }

        CaptureOutcome::saved(&item.id, format!("PDF saved ({page_count} pages)"))
    }
}
