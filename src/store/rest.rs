use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{config::StoreConfig, items::Collection};

use super::{BlobStore, ChangeEvent, Store, StoreError};

const CHANGE_FEED_CAPACITY: usize = 16;

/// Client for a PostgREST table API with an attached object storage API.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

#[derive(Deserialize)]
struct IdRow {
    id: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<RestStore, StoreError> {
        if config.url.is_empty() || config.api_key.is_empty() {
            return Err(StoreError::NotConfigured);
        }

        let base_url = config.url.strip_suffix('/').unwrap_or(&config.url).to_string();

        Ok(RestStore {
            client: Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table())
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn ids(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let resp = self
            .authorized(self.client.get(self.table_url(collection)))
            .query(&[("select", "id"), ("order", "timestamp.desc")])
            .send()
            .await?;

        let rows: Vec<IdRow> = check_status(resp).await?.json().await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}

async fn check_status(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp.text().await.unwrap_or_default();
    log::error!("store request failed with {status}: {message}");
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Store for RestStore {
    async fn select_all(
        &self,
        collection: Collection,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        log::debug!("select_all: {collection}");
        let resp = self
            .authorized(self.client.get(self.table_url(collection)))
            .query(&[("select", "*"), ("order", "timestamp.desc")])
            .send()
            .await?;

        Ok(check_status(resp).await?.json().await?)
    }

    async fn insert(
        &self,
        collection: Collection,
        row: serde_json::Value,
    ) -> Result<(), StoreError> {
        log::debug!("insert: {collection}");
        let resp = self
            .authorized(self.client.post(self.table_url(collection)))
            .header("Prefer", "return=minimal")
            .json(&[row])
            .send()
            .await?;

        check_status(resp).await?;
        Ok(())
    }

    async fn delete_by_id(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        log::debug!("delete: {collection} {id}");
        let resp = self
            .authorized(self.client.delete(self.table_url(collection)))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;

        check_status(resp).await?;
        Ok(())
    }

    /// Polls the id listing of each collection and reports when it changes.
    async fn subscribe(
        &self,
        collections: &[Collection],
    ) -> Result<mpsc::Receiver<ChangeEvent>, StoreError> {
        let mut seen = HashMap::new();
        for collection in collections {
            seen.insert(*collection, self.ids(*collection).await?);
        }

        let (tx, rx) = mpsc::channel(CHANGE_FEED_CAPACITY);
        let store = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                for (collection, last) in seen.iter_mut() {
                    let ids = match store.ids(*collection).await {
                        Ok(ids) => ids,
                        Err(err) => {
                            log::warn!("change poll for {collection} failed: {err}");
                            continue;
                        }
                    };

                    if ids != *last {
                        *last = ids;
                        let event = ChangeEvent {
                            collection: *collection,
                        };
                        if tx.send(event).await.is_err() {
                            log::debug!("change feed closed");
                            return;
                        }
                    }
                }
            }
        });

        log::info!("watching {} collections for changes", collections.len());
        Ok(rx)
    }
}

#[async_trait]
impl BlobStore for RestStore {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        log::info!("uploading {filename} to {bucket} ({} bytes)", bytes.len());
        let url = format!("{}/storage/v1/object/{bucket}/{filename}", self.base_url);
        let resp = self
            .authorized(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .body(bytes)
            .send()
            .await?;

        check_status(resp).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{filename}",
            self.base_url
        )
    }
}
