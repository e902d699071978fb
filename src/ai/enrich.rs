//! Capture-time enrichment. Every helper is total: failures degrade to a
//! placeholder so a save is never aborted by the generation service.

use crate::items::truncate_chars;

use super::{GenerationParams, TextGenerator};

pub const OCR_FAILED: &str = "Error extracting text";
pub const OCR_EMPTY: &str = "No text extracted";
pub const SUMMARY_FAILED: &str = "Error generating summary. Please check the PDF content.";

const OCR_INSTRUCTION: &str = "Extract all visible text from this image. Return only the extracted text, without any additional commentary or formatting. If there is no text, return \"No text found\".";

const SUMMARY_INPUT_CHARS: usize = 30_000;
const TAGS_INPUT_CHARS: usize = 2000;
const MAX_TAGS: usize = 5;
const MAX_TAG_LEN: usize = 30;

pub async fn extract_text_from_image(generator: &dyn TextGenerator, png: &[u8]) -> String {
    match generator
        .describe_image(png, "image/png", OCR_INSTRUCTION)
        .await
    {
        Ok(text) if text.trim().is_empty() => OCR_EMPTY.to_string(),
        Ok(text) => {
            log::info!("extracted {} chars from image", text.chars().count());
            text
        }
        Err(err) => {
            log::error!("text extraction from image failed: {err}");
            OCR_FAILED.to_string()
        }
    }
}

pub async fn summarize_document(generator: &dyn TextGenerator, text: &str, title: &str) -> String {
    let prompt = format!(
        "You are a professional document summarizer. Create a concise, informative summary (2-3 paragraphs) of the following PDF document titled \"{title}\". Focus on key points, main ideas, and important takeaways.\n\nDocument content:\n{}",
        truncate_chars(text, SUMMARY_INPUT_CHARS)
    );

    match generator.generate(&prompt, GenerationParams::SUMMARY).await {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("document summary failed: {err}");
            SUMMARY_FAILED.to_string()
        }
    }
}

pub async fn suggest_tags(generator: &dyn TextGenerator, content: &str, kind: &str) -> Vec<String> {
    let prompt = format!(
        "Generate 3-5 relevant tags (keywords) for this {kind} content. Return ONLY comma-separated tags, nothing else.\n\nContent:\n{}",
        truncate_chars(content, TAGS_INPUT_CHARS)
    );

    match generator.generate(&prompt, GenerationParams::TAGS).await {
        Ok(answer) => parse_tag_answer(&answer),
        Err(err) => {
            log::warn!("tag suggestion failed: {err}");
            Vec::new()
        }
    }
}

fn parse_tag_answer(answer: &str) -> Vec<String> {
    answer
        .to_lowercase()
        .split(',')
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty() && tag.chars().count() < MAX_TAG_LEN)
        .take(MAX_TAGS)
        .map(|tag| tag.to_string())
        .collect()
}
