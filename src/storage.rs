use std::{io::ErrorKind, path::PathBuf};

use crate::{eid::Eid, items::LinkItem};

/// Key under which the offline copy of the link collection is kept.
pub const LINKS_SNAPSHOT_KEY: &str = "memories.json";

/// String key-value store on the host, used for config and the offline link snapshot.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> std::io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> std::io::Result<()>;
}

#[derive(Clone, Debug)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(BackendLocal { base_dir })
    }

    fn path(&self, key: &str) -> std::io::Result<PathBuf> {
        if key.is_empty() || key.contains(|c: char| c == '/' || c == '\\') || key.starts_with('.') {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid storage key {key:?}"),
            ));
        }
        Ok(self.base_dir.join(key))
    }
}

impl KeyValueStore for BackendLocal {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        let path = self.path(key)?;
        let temp_path = self.base_dir.join(format!(".{}-{key}", Eid::new()));

        std::fs::write(&temp_path, value)?;
        std::fs::rename(&temp_path, &path)
    }
}

/// Offline copy of the link collection, newest first.
pub fn load_link_snapshot(store: &dyn KeyValueStore) -> anyhow::Result<Vec<LinkItem>> {
    match store.get(LINKS_SNAPSHOT_KEY)? {
        Some(blob) => Ok(serde_json::from_str(&blob)?),
        None => Ok(Vec::new()),
    }
}

pub fn save_link_snapshot(store: &dyn KeyValueStore, links: &[LinkItem]) -> anyhow::Result<()> {
    store.set(LINKS_SNAPSHOT_KEY, &serde_json::to_string(links)?)?;
    Ok(())
}

/// Puts a freshly saved link at the front of the offline copy.
pub fn prepend_link_snapshot(store: &dyn KeyValueStore, link: &LinkItem) -> anyhow::Result<()> {
    let mut links = load_link_snapshot(store)?;
    links.insert(0, link.clone());
    save_link_snapshot(store, &links)
}
