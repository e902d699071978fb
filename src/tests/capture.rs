use std::sync::{atomic::Ordering, Arc};

use crate::{
    ai::{enrich, mock::ScriptedGenerator},
    capture::{pdf, Capturer, LinkDraft, DOCUMENT_BUCKET, SCREENSHOT_BUCKET},
    items::{Collection, DocumentItem, ImageCaptureItem, LinkItem},
    storage::{self, BackendLocal},
    store::memory::MemoryStore,
};

struct Harness {
    store: Arc<MemoryStore>,
    generator: Arc<ScriptedGenerator>,
    cache: Arc<BackendLocal>,
    capturer: Capturer,
    _tmp: tempfile::TempDir,
}

fn harness(generator: ScriptedGenerator) -> Harness {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(generator);
    let cache = Arc::new(BackendLocal::new(tmp.path()).expect("failed to create cache"));

    let capturer = Capturer::new(
        store.clone(),
        store.clone(),
        generator.clone(),
        cache.clone(),
    )
    .expect("failed to create capturer");

    Harness {
        store,
        generator,
        cache,
        capturer,
        _tmp: tmp,
    }
}

fn saved<T: serde::de::DeserializeOwned>(store: &MemoryStore, collection: Collection) -> Vec<T> {
    store
        .rows(collection)
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap())
        .collect()
}

#[tokio::test]
async fn test_save_link_from_form() {
    let h = harness(ScriptedGenerator::new());

    let outcome = h
        .capturer
        .save_link(LinkDraft {
            url: "https://github.com/tokio-rs/tokio".to_string(),
            title: "Tokio".to_string(),
            note: "  runtime to read about  ".to_string(),
            tags: "rust, async,, Rust ".to_string(),
            ..Default::default()
        })
        .await;
    assert!(outcome.success, "{}", outcome.message);

    let links: Vec<LinkItem> = saved(&h.store, Collection::Links);
    assert_eq!(links.len(), 1);
    let link = &links[0];
    assert_eq!(outcome.id.as_deref(), Some(link.id.as_str()));
    assert_eq!(link.note, "runtime to read about");
    assert_eq!(link.tags, vec!["rust", "async", "Rust"]);
    assert_eq!(link.platform, "GitHub");
    assert_eq!(link.category, "Link");
    assert!(link.full_text.is_none());

    // offline copy gets the new link first
    let snapshot = storage::load_link_snapshot(h.cache.as_ref()).unwrap();
    assert_eq!(snapshot, links);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn test_save_link_requires_url() {
    let h = harness(ScriptedGenerator::new());

    let outcome = h.capturer.save_link(LinkDraft::default()).await;
    assert!(!outcome.success);
    assert!(outcome.id.is_none());
    assert!(h.store.rows(Collection::Links).is_empty());
}

#[tokio::test]
async fn test_save_link_store_failure() {
    let h = harness(ScriptedGenerator::new());
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let outcome = h.capturer.quick_save("https://example.com", "Example").await;
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Failed to save"));
    assert!(storage::load_link_snapshot(h.cache.as_ref())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_quick_save_and_clip() {
    let h = harness(ScriptedGenerator::new());

    assert!(h.capturer.quick_save("https://example.com/a", "").await.success);
    assert!(
        h.capturer
            .clip_selection("https://example.com/b", "Page B", "the selected words")
            .await
            .success
    );
    assert!(
        h.capturer
            .save_link_target("https://example.com/c", "Page A")
            .await
            .success
    );

    let links: Vec<LinkItem> = saved(&h.store, Collection::Links);
    let quick = links.iter().find(|l| l.url.ends_with("/a")).unwrap();
    assert_eq!(quick.title, "Untitled");
    assert_eq!(quick.tags, vec!["quick-save"]);
    assert_eq!(quick.category, "Quick Save");

    let clip = links.iter().find(|l| l.url.ends_with("/b")).unwrap();
    assert_eq!(clip.note, "the selected words");
    assert_eq!(clip.tags, vec!["selection", "quick-save"]);
    assert_eq!(clip.category, "Quick Save");

    let target = links.iter().find(|l| l.url.ends_with("/c")).unwrap();
    assert_eq!(target.title, "https://example.com/c");
    assert_eq!(target.note, "Saved from: Page A");
    assert_eq!(target.tags, vec!["link", "quick-save"]);

    assert_eq!(
        storage::load_link_snapshot(h.cache.as_ref()).unwrap().len(),
        3
    );
}

#[tokio::test]
async fn test_save_screenshot() {
    let h = harness(
        ScriptedGenerator::new()
            .with_text("Build failed: missing semicolon")
            .with_text("Rust, Compiler Error"),
    );

    let outcome = h
        .capturer
        .save_screenshot("https://example.com", "Build log", b"png-bytes".to_vec())
        .await;
    assert!(outcome.success, "{}", outcome.message);

    let uploads = h.store.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let (bucket, filename, size, content_type) = &uploads[0];
    assert_eq!(bucket, SCREENSHOT_BUCKET);
    assert_eq!(*size, 9);
    assert_eq!(content_type, "image/png");

    let shots: Vec<ImageCaptureItem> = saved(&h.store, Collection::Screenshots);
    assert_eq!(shots.len(), 1);
    let shot = &shots[0];
    assert_eq!(filename, &format!("screenshot_{}.png", shot.id));
    assert_eq!(shot.image_url, format!("memory://screenshots/{filename}"));
    assert_eq!(
        shot.extracted_text.as_deref(),
        Some("Build failed: missing semicolon")
    );
    assert_eq!(shot.tags, vec!["rust", "compiler error"]);

    // tags are generated from the extracted text
    let prompts = h.generator.prompts.lock().unwrap().clone();
    assert!(prompts[1].contains("Build failed: missing semicolon"));
}

#[tokio::test]
async fn test_screenshot_upload_failure_inserts_nothing() {
    let h = harness(ScriptedGenerator::new().with_text("text"));
    h.store.fail_uploads.store(true, Ordering::SeqCst);

    let outcome = h
        .capturer
        .save_screenshot("https://example.com", "t", b"png".to_vec())
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Upload failed"));
    assert!(h.store.rows(Collection::Screenshots).is_empty());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn test_screenshot_enrichment_failure_still_saves() {
    let h = harness(ScriptedGenerator::new());

    let outcome = h
        .capturer
        .save_screenshot("https://example.com", "t", b"png".to_vec())
        .await;
    assert!(outcome.success);

    let shots: Vec<ImageCaptureItem> = saved(&h.store, Collection::Screenshots);
    assert_eq!(shots[0].extracted_text.as_deref(), Some(enrich::OCR_FAILED));
    assert!(shots[0].tags.is_empty());
}

#[tokio::test]
async fn test_save_document_degrades_without_text() {
    let h = harness(
        ScriptedGenerator::new()
            .with_text("A short summary.")
            .with_text("manual, hardware"),
    );
    let bytes = b"%PDF-1.4 not a real document".to_vec();

    let outcome = h
        .capturer
        .save_document("https://example.com/m.pdf", "Manual", bytes.clone())
        .await;
    assert!(outcome.success, "{}", outcome.message);

    let docs: Vec<DocumentItem> = saved(&h.store, Collection::Documents);
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.full_text.as_deref(), Some(pdf::TEXT_FAILED));
    assert_eq!(doc.summary.as_deref(), Some("A short summary."));
    assert_eq!(doc.tags, vec!["manual", "hardware"]);
    assert_eq!(doc.page_count, Some(1));
    assert_eq!(doc.file_size, Some(bytes.len() as u64));
    assert_eq!(doc.pdf_url, format!("memory://pdfs/pdf_{}.pdf", doc.id));

    let uploads = h.store.uploads.lock().unwrap().clone();
    assert_eq!(uploads[0].0, DOCUMENT_BUCKET);
    assert_eq!(uploads[0].3, "application/pdf");
}

#[tokio::test]
async fn test_document_upload_failure_inserts_nothing() {
    let h = harness(ScriptedGenerator::new());
    h.store.fail_uploads.store(true, Ordering::SeqCst);

    let outcome = h
        .capturer
        .save_document("", "Manual", b"%PDF-1.4".to_vec())
        .await;

    assert!(!outcome.success);
    assert!(h.store.rows(Collection::Documents).is_empty());
    assert_eq!(h.generator.calls(), 0);
}
