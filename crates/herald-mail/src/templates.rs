//! HTML template store — remote fetch with a local disk cache.
//!
//! Lookup order: disk cache, then the remote store (caching the result),
//! then the bundled fallback directory. The remote store is optional; with
//! no base URL configured the store is local-only.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use herald_core::config::TemplateConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::TemplateStore;

/// The stage templates every deployment carries. Location-specific welcome
/// variants are fetched on demand and cached the same way.
pub const CORE_TEMPLATES: &[&str] = &[
    "welcome.html",
    "compliance_reminder.html",
    "password_setup_reminder.html",
    "hardware_followup.html",
];

/// Template store backed by an HTTP base URL plus disk cache and bundled
/// fallback directory.
pub struct HttpTemplateStore {
    base_url: String,
    cache_dir: PathBuf,
    local_dir: PathBuf,
    http: reqwest::Client,
}

impl HttpTemplateStore {
    pub fn from_config(config: &TemplateConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache_dir: expand_home(&config.cache_dir),
            local_dir: expand_home(&config.local_dir),
            http: reqwest::Client::new(),
        }
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    async fn fetch_remote(&self, name: &str) -> Result<String> {
        if self.base_url.is_empty() {
            return Err(HeraldError::Template("no remote store configured".into()));
        }
        let url = format!("{}/{}", self.base_url, name);
        let response = self
            .http
            .get(&url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| HeraldError::Template(format!("Fetch {name}: {e}")))?;
        if !response.status().is_success() {
            return Err(HeraldError::Template(format!(
                "Fetch {name}: {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| HeraldError::Template(format!("Read {name}: {e}")))
    }

    fn write_cache(&self, name: &str, html: &str) {
        if std::fs::create_dir_all(&self.cache_dir).is_err() {
            return;
        }
        // Best effort — a cold cache just means refetching next time.
        if std::fs::write(self.cache_path(name), html).is_ok() {
            tracing::debug!("💾 Cached template: {name}");
        }
    }

    /// Download every core template into the cache. Returns the names that
    /// synced.
    pub async fn sync_all(&self) -> Result<Vec<String>> {
        let mut synced = Vec::new();
        for name in CORE_TEMPLATES {
            match self.fetch_remote(name).await {
                Ok(html) => {
                    self.write_cache(name, &html);
                    synced.push(name.to_string());
                }
                Err(e) => tracing::warn!("⚠️ Template sync skipped {name}: {e}"),
            }
        }
        tracing::info!("✅ Template sync complete ({} of {})", synced.len(), CORE_TEMPLATES.len());
        Ok(synced)
    }

    /// Remove all cached templates.
    pub fn clear_cache(&self) -> Result<()> {
        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for HttpTemplateStore {
    async fn lookup(&self, name: &str) -> Result<String> {
        if !valid_name(name) {
            return Err(HeraldError::Template(format!("Invalid template name: {name}")));
        }

        if let Ok(html) = std::fs::read_to_string(self.cache_path(name)) {
            tracing::debug!("📄 Using cached template: {name}");
            return Ok(html);
        }

        match self.fetch_remote(name).await {
            Ok(html) => {
                self.write_cache(name, &html);
                return Ok(html);
            }
            Err(e) => tracing::debug!("Remote template miss for {name}: {e}"),
        }

        std::fs::read_to_string(self.local_dir.join(name))
            .map_err(|_| HeraldError::Template(format!("Template not found: {name}")))
    }
}

/// Template names are bare file names, never paths.
fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(tag: &str) -> (HttpTemplateStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("herald-tpl-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(dir.join("local")).unwrap();
        let config = TemplateConfig {
            base_url: String::new(),
            cache_dir: dir.join("cache").to_string_lossy().into_owned(),
            local_dir: dir.join("local").to_string_lossy().into_owned(),
        };
        (HttpTemplateStore::from_config(&config), dir)
    }

    #[tokio::test]
    async fn test_local_fallback() {
        let (store, dir) = store("local");
        std::fs::write(dir.join("local/welcome.html"), "<p>Hi {Candidate_Name}</p>").unwrap();

        let html = store.lookup("welcome.html").await.unwrap();
        assert_eq!(html, "<p>Hi {Candidate_Name}</p>");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_cache_wins_over_local() {
        let (store, dir) = store("cache");
        std::fs::write(dir.join("local/welcome.html"), "local").unwrap();
        std::fs::create_dir_all(dir.join("cache")).unwrap();
        std::fs::write(dir.join("cache/welcome.html"), "cached").unwrap();

        assert_eq!(store.lookup("welcome.html").await.unwrap(), "cached");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_template_is_error() {
        let (store, dir) = store("missing");
        assert!(store.lookup("nope.html").await.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (store, dir) = store("clear");
        std::fs::create_dir_all(dir.join("cache")).unwrap();
        std::fs::write(dir.join("cache/welcome.html"), "cached").unwrap();

        store.clear_cache().unwrap();
        assert!(!dir.join("cache").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_path_like_names_rejected() {
        let (store, dir) = store("names");
        assert!(store.lookup("../secrets.html").await.is_err());
        assert!(store.lookup("a/b.html").await.is_err());
        assert!(store.lookup("").await.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/x/y");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }
}
