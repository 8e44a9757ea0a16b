use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use termbase_git::GitOptions;
use termbase_sync::SyncOptions;
use termbase_types::Language;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub const DEFAULT_REMOTE_URL: &str = "https://github.com/geolexica/osgeo-glossary";
pub const CONFIG_FILE: &str = "termbase.toml";
pub const ENV_WORK_DIR: &str = "TERMBASE_WORK_DIR";
pub const ENV_REMOTE_URL: &str = "TERMBASE_REMOTE_URL";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "geolexica", "termbase")
}

/// Settings of one application instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Git working copy holding the object files.
    pub work_dir: PathBuf,
    /// Index caches and the instance lock. Kept outside the working copy.
    pub data_dir: PathBuf,
    pub remote_url: String,
    pub proxy_url: Option<String>,
    pub branch: String,
    pub remote_name: String,
    pub author_name: String,
    pub author_email: String,
    pub default_language: Language,
    pub push_after_sync: bool,
    /// Commit each write immediately, so unsynchronized work is never lost
    /// to a reset.
    pub commit_after_write: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".termbase"));
        Self {
            work_dir: data_dir.join("osgeo-glossary"),
            data_dir,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            proxy_url: None,
            branch: "main".to_string(),
            remote_name: "origin".to_string(),
            author_name: "termbase".to_string(),
            author_email: "termbase@localhost".to_string(),
            default_language: Language::DEFAULT,
            push_after_sync: true,
            commit_after_write: true,
        }
    }
}

impl AppConfig {
    /// Load from `explicit`, else from the platform config directory when
    /// a file exists there, else defaults; then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let config = Self::parse(&text).map_err(|source| AppError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> AppResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;
        }
        fs::write(path, self.to_toml()?).map_err(|e| AppError::io(path, e))
    }

    /// Override the working directory and remote from `lookup`, typically
    /// the process environment. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = set(ENV_WORK_DIR) {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(url) = set(ENV_REMOTE_URL) {
            self.remote_url = url;
        }
    }

    /// A configuration rooted entirely under `root`, for tests and
    /// throwaway instances.
    pub fn in_dir(root: &Path) -> Self {
        Self {
            work_dir: root.join("work"),
            data_dir: root.join("data"),
            ..Self::default()
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("termbase.lock")
    }

    pub fn git_options(&self) -> GitOptions {
        let mut options = GitOptions::new(&self.work_dir)
            .with_branch(&self.branch)
            .with_author(&self.author_name, &self.author_email);
        options.remote_name = self.remote_name.clone();
        if !self.remote_url.trim().is_empty() {
            options = options.with_remote(&self.remote_url);
        }
        if let Some(proxy) = &self.proxy_url {
            options = options.with_proxy(proxy);
        }
        options
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            push: self.push_after_sync,
            ..SyncOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::parse(
            r#"
            work_dir = "/srv/glossary"
            default_language = "fra"
            push_after_sync = false
            "#,
        )
        .unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/srv/glossary"));
        assert_eq!(config.default_language, Language::Fra);
        assert!(!config.push_after_sync);
        assert_eq!(config.remote_url, DEFAULT_REMOTE_URL);
        assert_eq!(config.branch, "main");
        assert!(config.commit_after_write);
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!(AppConfig::parse(r#"default_language = "xxx""#).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = AppConfig::default();
        let env = HashMap::from([
            (ENV_WORK_DIR, "/tmp/override"),
            (ENV_REMOTE_URL, "  "),
        ]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.work_dir, PathBuf::from("/tmp/override"));
        assert_eq!(config.remote_url, DEFAULT_REMOTE_URL);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join(CONFIG_FILE);
        let mut config = AppConfig::in_dir(dir.path());
        config.proxy_url = Some("http://proxy.local:3128".into());
        config.save(&path).unwrap();
        assert_eq!(AppConfig::from_file(&path).unwrap(), config);

        std::fs::write(&path, "branch = [").unwrap();
        assert!(matches!(AppConfig::from_file(&path), Err(AppError::Config { .. })));
    }

    #[test]
    fn derived_paths_and_options() {
        let config = AppConfig::in_dir(Path::new("/srv/tb"));
        assert_eq!(config.cache_dir(), PathBuf::from("/srv/tb/data/index"));
        assert_eq!(config.lock_path(), PathBuf::from("/srv/tb/data/termbase.lock"));
        let git = config.git_options();
        assert_eq!(git.work_dir, PathBuf::from("/srv/tb/work"));
        assert_eq!(git.remote_url.as_deref(), Some(DEFAULT_REMOTE_URL));
        assert!(config.sync_options().push);
    }
}
