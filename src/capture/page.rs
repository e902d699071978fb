//! Reader-mode fetch and text extraction for saved links.

use std::{error::Error, time::Duration};

use scraper::{ElementRef, Html, Node, Selector};

const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

const EXCERPT_CHARS: usize = 500;

/// Elements whose text never belongs to the readable content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside",
];
const SKIPPED_CLASSES: &[&str] = &["ad", "ads", "advertisement"];

#[derive(Debug, Clone, PartialEq)]
pub struct ReaderText {
    pub title: Option<String>,
    pub full_text: String,
    pub excerpt: String,
    pub word_count: u64,
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT_DEFAULT)
        .timeout(Duration::from_secs(15))
        .build()
}

/// Downloads `url` as text. `None` on transport errors and non-2xx answers.
pub async fn fetch_html(client: &reqwest::Client, url: &str) -> Option<String> {
    let resp = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(err) => {
            log::error!("{url}: {err}: {:#?}", get_error(&err));
            return None;
        }
    };

    let status = resp.status();
    if !status.is_success() {
        log::warn!("{url}: {status}");
        return None;
    }

    match resp.bytes().await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).to_string()),
        Err(err) => {
            log::error!("{url}: {}", get_error(&err));
            None
        }
    }
}

fn is_skipped(element: &ElementRef) -> bool {
    let value = element.value();
    SKIPPED_TAGS.contains(&value.name()) || value.classes().any(|c| SKIPPED_CLASSES.contains(&c))
}

fn collect_text(root: ElementRef, out: &mut Vec<String>) {
    for child in root.children() {
        match child.value() {
            Node::Text(text) => out.push(text.to_string()),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    if !is_skipped(&element) {
                        collect_text(element, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn page_title(document: &Html) -> Option<String> {
    let og_title = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
    let title = Selector::parse("title").ok()?;

    let og = document
        .select(&og_title)
        .filter_map(|el| el.attr("content"))
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty());
    if og.is_some() {
        return og;
    }

    document
        .select(&title)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// Readable text of a page: `article`, else `main`, else `body`, with
/// navigation, scripts and ad blocks removed and whitespace collapsed.
pub fn extract_reader_text(html: &str) -> Option<ReaderText> {
    let document = Html::parse_document(html);

    let root = ["article", "main", "body"]
        .into_iter()
        .filter_map(|name| Selector::parse(name).ok())
        .find_map(|selector| document.select(&selector).next())?;

    let mut chunks = Vec::new();
    collect_text(root, &mut chunks);

    let full_text = chunks
        .iter()
        .flat_map(|chunk| chunk.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");

    if full_text.is_empty() {
        return None;
    }

    Some(ReaderText {
        title: page_title(&document),
        excerpt: crate::items::truncate_chars(&full_text, EXCERPT_CHARS).to_string(),
        word_count: full_text.split_whitespace().count() as u64,
        full_text,
    })
}
