//! Dashboard state: the three collections as loaded from the store, the
//! currently displayed (searched and filtered) subset, and the actions a
//! user can take on them.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    errors::AppError,
    items::{
        detect_content_type, Collection, DocumentItem, ImageCaptureItem, LinkItem, Searchable,
    },
    search::{LibraryView, RelevanceResolver},
    storage::{self, KeyValueStore},
    store::{self, ChangeEvent, Store},
};

/// Dashboard filters. They narrow the link collection only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

impl Filters {
    fn keep(&self, link: &LinkItem) -> bool {
        self.category.as_ref().map_or(true, |c| &link.category == c)
            && self.platform.as_ref().map_or(true, |p| &link.platform == p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Store,
    /// The store was unreachable; only the offline link copy is shown.
    Cache,
}

/// A search detached from the library so it can run without holding it.
pub struct SearchTicket {
    id: u64,
    query: String,
    filters: Filters,
    snapshot: LibraryView,
}

pub struct SearchOutcome {
    id: u64,
    query: String,
    filters: Filters,
    view: LibraryView,
}

impl SearchTicket {
    pub async fn run(self, resolver: &RelevanceResolver) -> SearchOutcome {
        let mut view = resolver.resolve_all(&self.snapshot, &self.query).await;
        view.links.retain(|link| self.filters.keep(link));

        SearchOutcome {
            id: self.id,
            query: self.query,
            filters: self.filters,
            view,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReaderView {
    pub title: String,
    pub url: String,
    pub text: String,
    pub word_count: Option<u64>,
}

pub struct Library {
    store: Arc<dyn Store>,
    cache: Arc<dyn KeyValueStore>,
    resolver: Arc<RelevanceResolver>,

    all: LibraryView,
    filtered: LibraryView,

    query: String,
    filters: Filters,

    /// Query and filters of the newest search started, applied or not.
    requested_query: String,
    requested_filters: Filters,
    latest_search: u64,
}

/// All three collections from the store, newest first.
pub async fn fetch_all(store: &dyn Store) -> Result<LibraryView, AppError> {
    let (links, screenshots, documents) = tokio::try_join!(
        store::fetch_items::<LinkItem>(store),
        store::fetch_items::<ImageCaptureItem>(store),
        store::fetch_items::<DocumentItem>(store),
    )?;

    Ok(LibraryView {
        links,
        screenshots,
        documents,
    })
}

impl Library {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn KeyValueStore>,
        resolver: Arc<RelevanceResolver>,
    ) -> Self {
        Self {
            store,
            cache,
            resolver,
            all: LibraryView::default(),
            filtered: LibraryView::default(),
            query: String::new(),
            filters: Filters::default(),
            requested_query: String::new(),
            requested_filters: Filters::default(),
            latest_search: 0,
        }
    }

    pub fn all(&self) -> &LibraryView {
        &self.all
    }

    pub fn filtered(&self) -> &LibraryView {
        &self.filtered
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn resolver(&self) -> Arc<RelevanceResolver> {
        self.resolver.clone()
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Initial load. Falls back to the offline link copy when the store is
    /// unreachable.
    pub async fn load(&mut self) -> Result<LoadSource, AppError> {
        match fetch_all(self.store.as_ref()).await {
            Ok(view) => {
                log::info!(
                    "loaded {} links, {} screenshots, {} documents",
                    view.links.len(),
                    view.screenshots.len(),
                    view.documents.len()
                );

                if let Err(err) = storage::save_link_snapshot(self.cache.as_ref(), &view.links) {
                    log::warn!("couldn't refresh offline copy: {err:?}");
                }

                self.filtered = view.clone();
                self.all = view;
                Ok(LoadSource::Store)
            }
            Err(err) => {
                log::error!("loading from store failed, trying offline copy: {err}");
                let links = storage::load_link_snapshot(self.cache.as_ref())?;
                log::info!("loaded {} links from offline copy", links.len());

                self.all = LibraryView {
                    links,
                    ..Default::default()
                };
                self.filtered = self.all.clone();
                Ok(LoadSource::Cache)
            }
        }
    }

    /// Swaps in freshly fetched collections and re-issues the newest
    /// requested search over them. Any search still in flight is superseded
    /// by the returned ticket, which carries the same query.
    pub fn replace_all(&mut self, view: LibraryView) -> SearchTicket {
        if let Err(err) = storage::save_link_snapshot(self.cache.as_ref(), &view.links) {
            log::warn!("couldn't refresh offline copy: {err:?}");
        }
        self.all = view;
        self.begin_search(self.requested_query.clone(), self.requested_filters.clone())
    }

    pub async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>, AppError> {
        Ok(self.store.subscribe(&Collection::ALL).await?)
    }

    /// Starts a search; any earlier unfinished search becomes stale.
    pub fn begin_search(&mut self, query: String, filters: Filters) -> SearchTicket {
        self.latest_search += 1;
        self.requested_query = query.clone();
        self.requested_filters = filters.clone();
        SearchTicket {
            id: self.latest_search,
            query,
            filters,
            snapshot: self.all.clone(),
        }
    }

    /// Applies a finished search unless a newer one was started meanwhile.
    /// Items deleted while it ran are left out.
    pub fn finish_search(&mut self, mut outcome: SearchOutcome) -> bool {
        if outcome.id != self.latest_search {
            log::debug!(
                "dropping stale results for {:?} (search #{}, latest #{})",
                outcome.query,
                outcome.id,
                self.latest_search
            );
            return false;
        }

        retain_known(&mut outcome.view.links, &self.all.links);
        retain_known(&mut outcome.view.screenshots, &self.all.screenshots);
        retain_known(&mut outcome.view.documents, &self.all.documents);

        self.query = outcome.query;
        self.filters = outcome.filters;
        self.filtered = outcome.view;
        true
    }

    pub async fn search(&mut self, query: &str, filters: Filters) -> &LibraryView {
        let ticket = self.begin_search(query.to_string(), filters);
        let outcome = ticket.run(&self.resolver.clone()).await;
        self.finish_search(outcome);
        &self.filtered
    }

    /// Deletes one item in the store first; the in-memory lists change only
    /// if that succeeds.
    pub async fn delete(&mut self, collection: Collection, id: &str) -> Result<(), AppError> {
        if let Err(err) = self.store.delete_by_id(collection, id).await {
            log::error!("failed to delete {collection} {id}: {err}");
            return Err(err.into());
        }

        let removed = match collection {
            Collection::Links => {
                remove_by_id(&mut self.filtered.links, id);
                remove_by_id(&mut self.all.links, id)
            }
            Collection::Screenshots => {
                remove_by_id(&mut self.filtered.screenshots, id);
                remove_by_id(&mut self.all.screenshots, id)
            }
            Collection::Documents => {
                remove_by_id(&mut self.filtered.documents, id);
                remove_by_id(&mut self.all.documents, id)
            }
        };
        log::info!("deleted {collection} {id} ({removed} local entries)");

        Ok(())
    }

    /// Where the "open" action points: page url, image url or PDF url.
    pub fn open_target(&self, collection: Collection, id: &str) -> Result<String, AppError> {
        let target = match collection {
            Collection::Links => find(&self.all.links, id).map(|l| l.url.clone()),
            Collection::Screenshots => find(&self.all.screenshots, id).map(|s| s.image_url.clone()),
            Collection::Documents => find(&self.all.documents, id).map(|d| d.pdf_url.clone()),
        };

        target.filter(|url| !url.is_empty()).ok_or(AppError::NotFound)
    }

    /// Reader mode for a link saved with its full text.
    pub fn reader(&self, id: &str) -> Result<ReaderView, AppError> {
        let link = find(&self.all.links, id).ok_or(AppError::NotFound)?;
        let text = link.full_text.clone().ok_or(AppError::NotFound)?;

        Ok(ReaderView {
            title: link.title.clone(),
            url: link.url.clone(),
            text,
            word_count: link.word_count,
        })
    }

    pub fn export_links(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(&self.all.links)?)
    }

    /// Writes the link export into `dir` and returns the file path.
    pub fn export_links_to(&self, dir: &Path) -> Result<PathBuf, AppError> {
        let path = dir.join(format!(
            "second-memory-export-{}.json",
            chrono::Utc::now().timestamp_millis()
        ));
        std::fs::write(&path, self.export_links()?)?;
        log::info!("exported {} links to {}", self.all.links.len(), path.display());
        Ok(path)
    }

    pub fn categories_with_counts(&self) -> Vec<(String, usize)> {
        counts(self.all.links.iter().map(|l| l.category.as_str()))
    }

    pub fn platforms_with_counts(&self) -> Vec<(String, usize)> {
        counts(self.all.links.iter().map(|l| l.platform.as_str()))
    }

    pub fn content_types_with_counts(&self) -> Vec<(String, usize)> {
        counts(self.all.links.iter().map(|l| detect_content_type(l).as_str()))
    }

    pub fn all_tags(&self) -> Vec<String> {
        self.all
            .links
            .iter()
            .flat_map(|l| l.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub fn parse_export(json: &str) -> Result<Vec<LinkItem>, AppError> {
    Ok(serde_json::from_str(json)?)
}

fn find<'a, T: Searchable>(items: &'a [T], id: &str) -> Option<&'a T> {
    items.iter().find(|item| item.id() == id)
}

fn retain_known<T: Searchable>(items: &mut Vec<T>, known: &[T]) {
    let ids: HashSet<&str> = known.iter().map(|item| item.id()).collect();
    items.retain(|item| ids.contains(item.id()));
}

fn remove_by_id<T: Searchable>(items: &mut Vec<T>, id: &str) -> usize {
    let before = items.len();
    items.retain(|item| item.id() != id);
    before - items.len()
}

/// Value counts, most frequent first, ties by name.
fn counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut map: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *map.entry(value).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> =
        map.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
