//! Configuration management for whisper.
//!
//! Loads configuration from ${WHISPER_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::stub::DEFAULT_CSRF_PATH;

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments from the template are kept while user values win.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            _ => {
                target[key] = value.clone();
            }
        }
    }
}

pub mod paths {
    //! Path resolution for whisper configuration.
    //!
    //! WHISPER_HOME resolution order:
    //! 1. WHISPER_HOME environment variable (if set)
    //! 2. ~/.config/whisper (default)

    use std::path::PathBuf;

    /// Returns the whisper home directory.
    pub fn whisper_home() -> PathBuf {
        if let Ok(home) = std::env::var("WHISPER_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".whisper"),
            |h| h.join(".config").join("whisper"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        whisper_home().join("config.toml")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the protected site
    pub site_url: String,

    /// Prefix of the admin application on the site
    pub admin_path: String,

    /// Endpoint that issues the CSRF protection token
    pub csrf_path: String,

    /// Per-request timeout in seconds (0 disables)
    pub timeout_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: Self::DEFAULT_SITE_URL.to_string(),
            admin_path: Self::DEFAULT_ADMIN_PATH.to_string(),
            csrf_path: DEFAULT_CSRF_PATH.to_string(),
            timeout_secs: 0,
        }
    }
}

impl Config {
    const DEFAULT_SITE_URL: &str = "http://localhost:8000";
    const DEFAULT_ADMIN_PATH: &str = "/admin/";

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the site_url field to the default config file.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_site_url(site_url: &str) -> Result<()> {
        Self::save_site_url_to(&paths::config_path(), site_url)
    }

    /// Saves only the site_url field to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_site_url_to(path: &Path, site_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let site_url = site_url.trim();
        validate_url(site_url)?;

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["site_url"] = value(site_url);

        Self::write_config(path, &doc.to_string())
    }

    /// Resolves the site URL with precedence: override > config.
    ///
    /// The override comes from `--site` or `WHISPER_SITE_URL`.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is not a valid absolute URL.
    pub fn site_url(&self, site_override: Option<&str>) -> Result<Url> {
        let chosen = site_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.site_url.trim());
        validate_url(chosen)
    }

    /// Returns the URL of the admin application, against which admin API
    /// resources are resolved.
    ///
    /// # Errors
    /// Returns an error if the site URL or admin path is invalid.
    pub fn admin_url(&self, site_override: Option<&str>) -> Result<Url> {
        let site = self.site_url(site_override)?;
        let mut admin_path = self.admin_path.trim().to_string();
        if !admin_path.ends_with('/') {
            admin_path.push('/');
        }
        site.join(&admin_path)
            .with_context(|| format!("Invalid admin path: {}", self.admin_path))
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.timeout_secs)))
        }
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Validates that a site URL is absolute http(s).
fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid site URL: {url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Invalid site URL: {url} (expected http or https)");
    }
    Ok(parsed)
}
