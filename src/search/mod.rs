//! Relevance resolution over saved items.
//!
//! For a non-empty query each collection is ranked by the remote text
//! generator; when that call fails or its answer can't be used the
//! collection is ranked by keyword overlap instead. The two paths never mix.
//!
//! - `prompt`: item summaries and the ranking instruction
//! - `parse`: index-array extraction from the model's answer
//! - `fallback`: local keyword ranking

pub mod fallback;
pub mod parse;
pub mod prompt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    ai::{AiError, GenerationParams, TextGenerator},
    config::SearchConfig,
    items::{Collection, DocumentItem, ImageCaptureItem, LinkItem, Searchable},
};

use parse::IndexParse;

#[derive(thiserror::Error, Debug)]
enum RankError {
    #[error("generation failed: {0}")]
    Generation(#[from] AiError),

    #[error("answer contains no index array")]
    NoArray,

    #[error("answer contains a malformed index array {0:?}")]
    Malformed(String),

    #[error("answer selected no valid item")]
    NoMatches,
}

/// The three collections side by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryView {
    pub links: Vec<LinkItem>,
    pub screenshots: Vec<ImageCaptureItem>,
    pub documents: Vec<DocumentItem>,
}

impl SearchConfig {
    pub fn budget(&self, collection: Collection) -> usize {
        match collection {
            Collection::Links => self.link_budget,
            Collection::Screenshots => self.screenshot_budget,
            Collection::Documents => self.document_budget,
        }
    }
}

pub struct RelevanceResolver {
    generator: Arc<dyn TextGenerator>,
    config: SearchConfig,
}

impl RelevanceResolver {
    pub fn new(generator: Arc<dyn TextGenerator>, config: SearchConfig) -> Self {
        Self { generator, config }
    }

    /// Relevance-ordered subset of `items` for `query`.
    ///
    /// A blank query returns `items` untouched. Never fails: any problem with
    /// the remote ranker results in the keyword ranking.
    pub async fn resolve<'a, T: Searchable>(&self, items: &'a [T], query: &str) -> Vec<&'a T> {
        if query.trim().is_empty() {
            return items.iter().collect();
        }
        if items.is_empty() {
            return Vec::new();
        }

        let label = T::COLLECTION.label();
        match self.rank_remote(items, query).await {
            Ok(ranked) => {
                log::info!("remote ranker found {} related {label}", ranked.len());
                ranked
            }
            Err(err) => {
                log::warn!("remote ranking of {label} failed, using keyword fallback: {err}");
                let ranked = fallback::rank(items, query, &self.config.fallback);
                log::info!("keyword fallback found {} related {label}", ranked.len());
                ranked
            }
        }
    }

    async fn rank_remote<'a, T: Searchable>(
        &self,
        items: &'a [T],
        query: &str,
    ) -> Result<Vec<&'a T>, RankError> {
        let summaries = prompt::summarize(items, self.config.budget(T::COLLECTION));
        let prompt = prompt::build_prompt(T::COLLECTION.label(), query, &summaries);

        let answer = self
            .generator
            .generate(&prompt, GenerationParams::RANKING)
            .await?;
        log::debug!("ranker answer for {}: {answer}", T::COLLECTION);

        let indices = match parse::parse_index_array(&answer) {
            IndexParse::Indices(indices) => indices,
            IndexParse::NoArray => return Err(RankError::NoArray),
            IndexParse::Malformed(raw) => return Err(RankError::Malformed(raw)),
        };

        let selected = parse::select_indices(&indices, items.len());
        if selected.is_empty() {
            return Err(RankError::NoMatches);
        }

        Ok(selected.into_iter().map(|idx| &items[idx]).collect())
    }

    /// Resolves all three collections concurrently.
    pub async fn resolve_all(&self, view: &LibraryView, query: &str) -> LibraryView {
        let (links, screenshots, documents) = tokio::join!(
            self.resolve(&view.links, query),
            self.resolve(&view.screenshots, query),
            self.resolve(&view.documents, query),
        );

        LibraryView {
            links: links.into_iter().cloned().collect(),
            screenshots: screenshots.into_iter().cloned().collect(),
            documents: documents.into_iter().cloned().collect(),
        }
    }
}
