use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::items::truncate_chars;

pub const TEXT_FAILED: &str = "Error extracting text from PDF";

const MAX_TEXT_CHARS: usize = 50_000;

static PAGE_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/Type\s*/Page[^s]").expect("valid regex"));

/// Number of page objects in the file, at least 1.
pub fn page_count(pdf: &[u8]) -> u32 {
    let count = PAGE_OBJECT.find_iter(pdf).count();
    u32::try_from(count).unwrap_or(u32::MAX).max(1)
}

/// Plain text of the document, whitespace collapsed, capped in length.
/// Runs on the blocking pool; a parser panic counts as a failure.
pub async fn extract_text(pdf: Vec<u8>) -> Option<String> {
    let result =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf)).await;

    let text = match result {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            log::error!("pdf text extraction failed: {err:?}");
            return None;
        }
        Err(err) => {
            log::error!("pdf text extraction aborted: {err}");
            return None;
        }
    };

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    Some(truncate_chars(&text, MAX_TEXT_CHARS).to_string())
}
