//! Configuration file handling.
//!
//! The configuration file is stored at `$EXPENSES_HOME/config.json` and holds the base URL of the
//! expense service and the authorization redirect cool-down. The persisted session lives under
//! `$EXPENSES_HOME/.secrets`.

use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "expenses";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CONFIG_JSON: &str = "config.json";
const SESSION_JSON: &str = "session.json";
pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:8081";
pub(crate) const DEFAULT_REDIRECT_COOLDOWN_MS: u64 = 1000;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSES_HOME` and from there it loads `$EXPENSES_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    base_url: Url,
}

impl Config {
    /// Creates the data directory, its `.secrets` subdirectory and an initial `config.json`
    /// pointing at `base_url`.
    ///
    /// # Errors
    /// - Returns an error if `base_url` is not a valid URL or if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the expenses home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            base_url: base_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            base_url,
        })
    }

    /// This will
    /// - validate that `expenses_home` and its config file exist
    /// - load the config file
    /// - validate that the secrets directory exists
    pub async fn load(expenses_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = expenses_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Expenses home is missing, run 'expenses init' first")?;
        let _ = utils::read_dir(&root).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let base_url = parse_base_url(&config_file.base_url)?;

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            base_url,
        })
    }

    /// Replaces the base URL for this process only; `config.json` is not rewritten.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn session_path(&self) -> PathBuf {
        self.secrets.join(SESSION_JSON)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// How long a login redirect suppresses further redirects.
    pub fn redirect_cooldown(&self) -> Duration {
        Duration::from_millis(self.config_file.redirect_cooldown_ms)
    }
}

/// A base URL always gets a trailing slash so that endpoint paths join beneath it rather than
/// replacing its last segment.
fn parse_base_url(s: &str) -> Result<Url> {
    let trimmed = s.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url =
        Url::parse(&with_slash).with_context(|| format!("Invalid expense service URL '{s}'"))?;
    if url.cannot_be_a_base() {
        bail!("The expense service URL '{s}' cannot be used as a base URL");
    }
    Ok(url)
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expenses",
///   "config_version": 1,
///   "base_url": "http://localhost:8081/",
///   "redirect_cooldown_ms": 1000
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expenses"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Where the expense service lives
    base_url: String,

    /// Cool-down after a login redirect during which further authorization failures do not
    /// redirect again
    #[serde(default = "default_redirect_cooldown_ms")]
    redirect_cooldown_ms: u64,
}

fn default_redirect_cooldown_ms() -> u64 {
    DEFAULT_REDIRECT_COOLDOWN_MS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            redirect_cooldown_ms: DEFAULT_REDIRECT_COOLDOWN_MS,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names a different app
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {} in {}. Is a newer version of expenses available?",
            config.config_version,
            path.display()
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}
