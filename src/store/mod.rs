//! Hosted persistence: a keyed collection store plus an object store for
//! uploaded screenshots and PDFs.
//!
//! Rows travel as untyped JSON; `fetch_items` and `insert_item` bind them to
//! the item types of each collection.

#[cfg(test)]
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;

use crate::items::{Collection, Searchable};

pub use rest::RestStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("store responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed row: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store is not configured (missing url or api key)")]
    NotConfigured,
}

/// Something changed in a collection. Consumers re-fetch everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// All rows of a collection, newest `timestamp` first.
    async fn select_all(&self, collection: Collection)
        -> Result<Vec<serde_json::Value>, StoreError>;

    async fn insert(&self, collection: Collection, row: serde_json::Value)
        -> Result<(), StoreError>;

    async fn delete_by_id(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Change notifications for the given collections. The feed stops when
    /// the receiver is dropped.
    async fn subscribe(
        &self,
        collections: &[Collection],
    ) -> Result<mpsc::Receiver<ChangeEvent>, StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    fn public_url(&self, bucket: &str, filename: &str) -> String;
}

pub async fn fetch_items<T>(store: &dyn Store) -> Result<Vec<T>, StoreError>
where
    T: Searchable + DeserializeOwned,
{
    let rows = store.select_all(T::COLLECTION).await?;
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<T>(row) {
            Ok(item) => items.push(item),
            Err(err) => log::warn!("skipping malformed {} row: {err}", T::COLLECTION),
        }
    }
    Ok(items)
}

pub async fn insert_item<T>(store: &dyn Store, item: &T) -> Result<(), StoreError>
where
    T: Searchable + Serialize,
{
    store
        .insert(T::COLLECTION, serde_json::to_value(item)?)
        .await
}
