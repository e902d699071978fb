mod capture;

use std::sync::Arc;

use crate::{
    ai::mock::ScriptedGenerator,
    config::SearchConfig,
    eid::Eid,
    items::{DocumentItem, ImageCaptureItem, LinkItem, Stamp},
    library::Library,
    search::RelevanceResolver,
    storage::BackendLocal,
    store::memory::MemoryStore,
};

const BASE_MILLIS: i64 = 1_700_000_000_000;

/// Link number `n`; higher numbers are newer.
pub fn link(n: i64, title: &str, tags: &[&str]) -> LinkItem {
    let stamp = Stamp::from_millis(BASE_MILLIS + n * 1000);
    LinkItem {
        id: Eid::from(format!("link{n}")),
        url: format!("https://example.com/{n}"),
        title: title.to_string(),
        note: String::new(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        category: "Link".to_string(),
        platform: "Example".to_string(),
        timestamp: stamp.timestamp,
        created_at: stamp.created_at,
        favicon: None,
        full_text: None,
        excerpt: None,
        word_count: None,
    }
}

pub fn screenshot(n: i64, title: &str, text: &str) -> ImageCaptureItem {
    let stamp = Stamp::from_millis(BASE_MILLIS + n * 1000);
    ImageCaptureItem {
        id: Eid::from(format!("shot{n}")),
        url: format!("https://example.com/shot/{n}"),
        title: title.to_string(),
        image_url: format!("memory://screenshots/screenshot_shot{n}.png"),
        extracted_text: Some(text.to_string()),
        tags: vec![],
        timestamp: stamp.timestamp,
        created_at: stamp.created_at,
    }
}

pub fn document(n: i64, title: &str, summary: &str) -> DocumentItem {
    let stamp = Stamp::from_millis(BASE_MILLIS + n * 1000);
    DocumentItem {
        id: Eid::from(format!("doc{n}")),
        url: format!("https://example.com/doc/{n}.pdf"),
        title: title.to_string(),
        pdf_url: format!("memory://pdfs/pdf_doc{n}.pdf"),
        summary: Some(summary.to_string()),
        full_text: None,
        tags: vec![],
        page_count: Some(1),
        file_size: Some(1024),
        timestamp: stamp.timestamp,
        created_at: stamp.created_at,
    }
}

pub fn resolver(generator: Arc<ScriptedGenerator>) -> RelevanceResolver {
    RelevanceResolver::new(generator, SearchConfig::default())
}

/// Library over `store` with its offline cache in a fresh temp dir.
pub fn create_library(
    store: Arc<MemoryStore>,
    generator: Arc<ScriptedGenerator>,
) -> (Library, Arc<BackendLocal>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let cache = Arc::new(BackendLocal::new(tmp.path()).expect("failed to create cache"));
    let library = Library::new(store, cache.clone(), Arc::new(resolver(generator)));
    (library, cache, tmp)
}
