//! In-process store used by the tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::items::Collection;

use super::{BlobStore, ChangeEvent, Store, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Collection, Vec<serde_json::Value>>>,
    pub deletes: Mutex<Vec<(Collection, String)>>,
    pub uploads: Mutex<Vec<(String, String, usize, String)>>,
    subscribers: Mutex<Vec<(Vec<Collection>, mpsc::Sender<ChangeEvent>)>>,
    pub fail_selects: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_uploads: AtomicBool,
}

fn unavailable() -> StoreError {
    StoreError::Status {
        status: 503,
        message: "unavailable".to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, collection: Collection) -> Vec<serde_json::Value> {
        self.tables
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn notify(&self, collection: Collection) {
        let subscribers = self.subscribers.lock().unwrap();
        for (collections, tx) in subscribers.iter() {
            if collections.contains(&collection) {
                let _ = tx.try_send(ChangeEvent { collection });
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select_all(
        &self,
        collection: Collection,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        if self.fail_selects.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let mut rows = self.rows(collection);
        rows.sort_by_key(|row| std::cmp::Reverse(row["timestamp"].as_i64().unwrap_or_default()));
        Ok(rows)
    }

    async fn insert(
        &self,
        collection: Collection,
        row: serde_json::Value,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        self.tables
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .push(row);
        self.notify(collection);
        Ok(())
    }

    async fn delete_by_id(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.deletes
            .lock()
            .unwrap()
            .push((collection, id.to_string()));

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        if let Some(rows) = self.tables.lock().unwrap().get_mut(&collection) {
            rows.retain(|row| row["id"].as_str() != Some(id));
        }
        self.notify(collection);
        Ok(())
    }

    async fn subscribe(
        &self,
        collections: &[Collection],
    ) -> Result<mpsc::Receiver<ChangeEvent>, StoreError> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers
            .lock()
            .unwrap()
            .push((collections.to_vec(), tx));
        Ok(rx)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        self.uploads.lock().unwrap().push((
            bucket.to_string(),
            filename.to_string(),
            bytes.len(),
            content_type.to_string(),
        ));
        Ok(())
    }

    fn public_url(&self, bucket: &str, filename: &str) -> String {
        format!("memory://{bucket}/{filename}")
    }
}
