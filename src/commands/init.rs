use crate::commands::Out;
use crate::config::DEFAULT_BASE_URL;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its `.secrets` subdirectory and an initial `config.json`.
///
/// # Arguments
/// - `expenses_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/expenses`
/// - `base_url` - The URL of the expense service, `http://localhost:8081` when `None`.
///
/// # Errors
/// - Returns an error if the URL is invalid or if any file operations fail.
pub async fn init(expenses_home: &Path, base_url: Option<&str>) -> Result<Out<()>> {
    let config = Config::create(expenses_home, base_url.unwrap_or(DEFAULT_BASE_URL))
        .await
        .context("Unable to create the data directory and config")?;
    Ok(format!(
        "Created {} for the expense service at {}",
        config.root().display(),
        config.base_url()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("expenses");
        let out = init(&home, Some("http://example.com/api")).await.unwrap();
        assert!(out.message().contains("http://example.com/api/"));

        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.base_url().as_str(), "http://example.com/api/");
        assert!(config.secrets().is_dir());
    }

    #[tokio::test]
    async fn test_init_default_url() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), None).await.unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.base_url().as_str(), "http://localhost:8081/");
    }
}
