use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

mod ai;
mod capture;
mod cli;
mod config;
mod eid;
mod errors;
mod items;
mod library;
mod search;
mod storage;
mod store;
#[cfg(test)]
mod tests;
mod web;

use ai::{GeminiClient, TextGenerator};
use capture::{Capturer, LinkDraft};
use cli::{Command, FilterArgs};
use config::Config;
use items::Collection;
use library::{Filters, Library, LoadSource};
use search::{LibraryView, RelevanceResolver};
use storage::BackendLocal;
use store::RestStore;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn base_path() -> anyhow::Result<String> {
    if let Ok(path) = std::env::var("SMEM_BASE_PATH") {
        return Ok(path);
    }

    let home = my_home()
        .context("could not determine home directory")?
        .context("home directory path is empty")?;
    Ok(format!("{}/.local/share/smem", home.to_string_lossy()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl From<FilterArgs> for Filters {
    fn from(args: FilterArgs) -> Self {
        Filters {
            category: args.category,
            platform: args.platform,
        }
    }
}

/// One collection of a view as JSON, or all three.
fn select_view(view: &LibraryView, kind: Option<Collection>) -> anyhow::Result<serde_json::Value> {
    Ok(match kind {
        None => serde_json::to_value(view)?,
        Some(Collection::Links) => serde_json::to_value(&view.links)?,
        Some(Collection::Screenshots) => serde_json::to_value(&view.screenshots)?,
        Some(Collection::Documents) => serde_json::to_value(&view.documents)?,
    })
}

fn view_len(view: &LibraryView, kind: Option<Collection>) -> usize {
    match kind {
        None => view.links.len() + view.screenshots.len() + view.documents.len(),
        Some(Collection::Links) => view.links.len(),
        Some(Collection::Screenshots) => view.screenshots.len(),
        Some(Collection::Documents) => view.documents.len(),
    }
}

struct Services {
    store: Arc<RestStore>,
    generator: Arc<dyn TextGenerator>,
    cache: Arc<BackendLocal>,
    config: Config,
}

impl Services {
    fn init(config: Config) -> anyhow::Result<Self> {
        let store = RestStore::new(&config.store).context(
            "set store.url and store.api_key in config.yaml or SMEM_STORE_URL/SMEM_STORE_KEY",
        )?;

        let generator: Arc<dyn TextGenerator> = match GeminiClient::new(&config.ai) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                log::warn!("{err}; keyword ranking only, no enrichment");
                Arc::new(ai::Unavailable)
            }
        };

        let cache = BackendLocal::new(config.base_path())?;

        Ok(Services {
            store: Arc::new(store),
            generator,
            cache: Arc::new(cache),
            config,
        })
    }

    async fn library(&self) -> anyhow::Result<Library> {
        let resolver = RelevanceResolver::new(self.generator.clone(), self.config.search.clone());
        let mut library = Library::new(self.store.clone(), self.cache.clone(), Arc::new(resolver));

        if library.load().await? == LoadSource::Cache {
            log::warn!("store unreachable, showing offline copy of links");
        }
        Ok(library)
    }

    fn capturer(&self) -> anyhow::Result<Capturer> {
        Capturer::new(
            self.store.clone(),
            self.store.clone(),
            self.generator.clone(),
            self.cache.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config = Config::load_with(&base_path()?)?;
    let services = Services::init(config)?;

    match args.command {
        Command::Daemon { addr } => {
            let addr = addr
                .or_else(|| std::env::var("SMEM_ADDR").ok())
                .unwrap_or_else(|| DEFAULT_ADDR.to_string());
            let state = web::SharedState::new(services.library().await?, services.capturer()?);
            web::serve(state, &addr).await?;
        }

        Command::Search {
            query,
            kind,
            filters,
            count,
        } => {
            let mut library = services.library().await?;
            let view = library.search(&query, filters.into()).await;

            if count {
                println!("{} items found", view_len(view, kind));
                return Ok(());
            }
            print_json(&select_view(view, kind)?)?;
        }

        Command::List {
            kind,
            filters,
            facets,
        } => {
            let mut library = services.library().await?;

            if facets {
                print_json(&serde_json::json!({
                    "categories": library.categories_with_counts(),
                    "platforms": library.platforms_with_counts(),
                    "content_types": library.content_types_with_counts(),
                    "tags": library.all_tags(),
                }))?;
                return Ok(());
            }

            let view = library.search("", filters.into()).await;
            print_json(&select_view(view, kind)?)?;
        }

        Command::Delete { kind, id } => {
            let mut library = services.library().await?;
            library.delete(kind, &id).await?;
            println!("deleted {kind} {id}");
        }

        Command::Open { kind, id } => {
            let library = services.library().await?;
            println!("{}", library.open_target(kind, &id)?);
        }

        Command::Read { id } => {
            let library = services.library().await?;
            let reader = library.reader(&id)?;
            println!("{}\n{}\n", reader.title, reader.url);
            println!("{}", reader.text);
        }

        Command::Export { dir } => {
            let library = services.library().await?;
            match dir {
                Some(dir) => println!("{}", library.export_links_to(&dir)?.display()),
                None => println!("{}", library.export_links()?),
            }
        }

        Command::Save {
            url,
            title,
            note,
            tags,
            category,
            platform,
            reader,
            quick,
            from_page,
        } => {
            let capturer = services.capturer()?;
            let outcome = if quick {
                capturer.quick_save(&url, &title).await
            } else if let Some(page_title) = from_page {
                capturer.save_link_target(&url, &page_title).await
            } else {
                capturer
                    .save_link(LinkDraft {
                        url,
                        title,
                        note,
                        tags,
                        category,
                        platform,
                        favicon: None,
                        reader_mode: reader,
                    })
                    .await
            };
            print_json(&outcome)?;
        }

        Command::Clip { url, text, title } => {
            let outcome = services.capturer()?.clip_selection(&url, &title, &text).await;
            print_json(&outcome)?;
        }

        Command::Screenshot { file, url, title } => {
            let png = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let outcome = services.capturer()?.save_screenshot(&url, &title, png).await;
            print_json(&outcome)?;
        }

        Command::Pdf { file, url, title } => {
            let pdf = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Untitled PDF".to_string())
            });
            let outcome = services.capturer()?.save_document(&url, &title, pdf).await;
            print_json(&outcome)?;
        }

        Command::Watch {} => {
            let mut changes =
                store::Store::subscribe(services.store.as_ref(), &Collection::ALL).await?;
            log::info!("watching for changes, ctrl-c to stop");
            loop {
                tokio::select! {
                    event = changes.recv() => match event {
                        Some(event) => println!("{} changed", event.collection),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}
