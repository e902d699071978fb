use crate::storage::{BackendLocal, KeyValueStore};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

const CONFIG_KEY: &str = "config.yaml";

const DEFAULT_AI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_AI_MODEL: &str = "gemini-2.0-flash-exp";
const DEFAULT_VISION_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

const DEFAULT_LINK_BUDGET: usize = 2000;
const DEFAULT_SCREENSHOT_BUDGET: usize = 3000;
const DEFAULT_DOCUMENT_BUDGET: usize = 3000;

const DEFAULT_FALLBACK_THRESHOLD: f32 = 0.1;
const DEFAULT_TITLE_BOOST: f32 = 0.3;
const DEFAULT_TAG_BOOST: f32 = 0.2;

/// Hosted collection store (PostgREST + object storage).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project base url, e.g. https://<project>.supabase.co
    #[serde(default)]
    pub url: String,

    /// Anonymous API key. Overridden by SMEM_STORE_KEY.
    #[serde(default)]
    pub api_key: String,

    /// How often `watch` polls the collections for changes
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// Text generation service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// Overridden by SMEM_AI_KEY.
    #[serde(default)]
    pub api_key: String,

    /// Model for ranking, summaries and tags
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Model for text extraction from screenshots
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            api_key: String::new(),
            model: default_ai_model(),
            vision_model: default_vision_model(),
            timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
        }
    }
}

/// Keyword ranking used when the remote ranker is unavailable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FallbackConfig {
    /// Items must score strictly above this to be kept
    #[serde(default = "default_fallback_threshold")]
    pub threshold: f32,

    /// Added when the raw query appears in the title
    #[serde(default = "default_title_boost")]
    pub title_boost: f32,

    /// Added when the raw query appears in any tag
    #[serde(default = "default_tag_boost")]
    pub tag_boost: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FALLBACK_THRESHOLD,
            title_boost: DEFAULT_TITLE_BOOST,
            tag_boost: DEFAULT_TAG_BOOST,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Character budget of the text sent per link
    #[serde(default = "default_link_budget")]
    pub link_budget: usize,

    #[serde(default = "default_screenshot_budget")]
    pub screenshot_budget: usize,

    #[serde(default = "default_document_budget")]
    pub document_budget: usize,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            link_budget: DEFAULT_LINK_BUDGET,
            screenshot_budget: DEFAULT_SCREENSHOT_BUDGET,
            document_budget: DEFAULT_DOCUMENT_BUDGET,
            fallback: FallbackConfig::default(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_ai_endpoint() -> String {
    DEFAULT_AI_ENDPOINT.to_string()
}

fn default_ai_model() -> String {
    DEFAULT_AI_MODEL.to_string()
}

fn default_vision_model() -> String {
    DEFAULT_VISION_MODEL.to_string()
}

fn default_ai_timeout_secs() -> u64 {
    DEFAULT_AI_TIMEOUT_SECS
}

fn default_link_budget() -> usize {
    DEFAULT_LINK_BUDGET
}

fn default_screenshot_budget() -> usize {
    DEFAULT_SCREENSHOT_BUDGET
}

fn default_document_budget() -> usize {
    DEFAULT_DOCUMENT_BUDGET
}

fn default_fallback_threshold() -> f32 {
    DEFAULT_FALLBACK_THRESHOLD
}

fn default_title_boost() -> f32 {
    DEFAULT_TITLE_BOOST
}

fn default_tag_boost() -> f32 {
    DEFAULT_TAG_BOOST
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        let fallback = &self.search.fallback;
        if !(0.0..=1.0).contains(&fallback.threshold) {
            bail!(
                "search.fallback.threshold must be between 0.0 and 1.0, got {}",
                fallback.threshold
            );
        }
        if fallback.title_boost < 0.0 || fallback.tag_boost < 0.0 {
            bail!("search.fallback boosts must not be negative");
        }

        let search = &self.search;
        if search.link_budget == 0 || search.screenshot_budget == 0 || search.document_budget == 0
        {
            bail!("search budgets must be greater than 0");
        }

        if self.ai.timeout_secs == 0 {
            bail!("ai.timeout_secs must be greater than 0");
        }

        if self.store.poll_interval_secs == 0 {
            bail!("store.poll_interval_secs must be greater than 0");
        }

        Ok(())
    }

    /// Secrets and endpoints can come from the environment instead of the file.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SMEM_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(key) = std::env::var("SMEM_STORE_KEY") {
            self.store.api_key = key;
        }
        if let Ok(key) = std::env::var("SMEM_AI_KEY") {
            self.ai.api_key = key;
        }
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = BackendLocal::new(base_path)
            .with_context(|| format!("failed to open config dir {base_path}"))?;

        // create new if does not exist
        let config_str = match store.get(CONFIG_KEY)? {
            Some(config_str) => config_str,
            None => {
                let config_str = serde_yml::to_string(&Self::default())?;
                store.set(CONFIG_KEY, &config_str)?;
                config_str
            }
        };

        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;
        config.base_path = base_path.to_string();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        config.apply_env();

        Ok(config)
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = BackendLocal::new(&self.base_path)?;
        store.set(CONFIG_KEY, &serde_yml::to_string(&self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_str().unwrap();

        let config = Config::load_with(base).unwrap();
        assert_eq!(config.search, SearchConfig::default());
        assert_eq!(config.ai.model, DEFAULT_AI_MODEL);
        assert_eq!(config.store.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert!(tmp.path().join(CONFIG_KEY).exists());
    }

    #[test]
    fn test_fills_missing_sections() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_str().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_KEY),
            "search:\n  link_budget: 1500\n",
        )
        .unwrap();

        let config = Config::load_with(base).unwrap();
        assert_eq!(config.search.link_budget, 1500);
        assert_eq!(config.search.fallback.threshold, DEFAULT_FALLBACK_THRESHOLD);

        assert_eq!(config.store.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);

        let saved = std::fs::read_to_string(tmp.path().join(CONFIG_KEY)).unwrap();
        assert!(saved.contains("title_boost"));
        assert!(saved.contains("poll_interval_secs: 5"));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_str().unwrap();
        std::fs::write(tmp.path().join(CONFIG_KEY), "store:\n  poll_interval_secs: 0\n").unwrap();

        assert!(Config::load_with(base).is_err());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_str().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_KEY),
            "search:\n  fallback:\n    threshold: 1.5\n",
        )
        .unwrap();

        assert!(Config::load_with(base).is_err());
    }

    #[test]
    fn test_rejects_zero_budget() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_str().unwrap();
        std::fs::write(tmp.path().join(CONFIG_KEY), "search:\n  document_budget: 0\n").unwrap();

        assert!(Config::load_with(base).is_err());
    }
}
