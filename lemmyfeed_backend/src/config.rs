use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LemmyfeedConfig {
    pub instance_url: String,
    pub paths: LemmyfeedPaths,
    pub refresh: RefreshConfig,
}

impl LemmyfeedConfig {
    pub fn from_env() -> Result<Self> {
        let paths = LemmyfeedPaths::discover()?;
        let instance_url = env::var("LEMMYFEED_INSTANCE")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or_else(|| "https://lemmy.world".to_string());
        let refresh = RefreshConfig::from_env();
        Ok(Self {
            instance_url,
            paths,
            refresh,
        })
    }

    pub fn new(instance_url: impl Into<String>, paths: LemmyfeedPaths) -> Self {
        Self {
            instance_url: instance_url.into(),
            paths,
            refresh: RefreshConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between scheduled background refreshes.
    pub interval: Duration,
    /// Posts requested per feed page.
    pub page_limit: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            page_limit: 25,
        }
    }
}

impl RefreshConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env::var("LEMMYFEED_REFRESH_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
        {
            config.interval = Duration::from_secs(secs);
        }
        if let Some(limit) = env::var("LEMMYFEED_PAGE_LIMIT")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
        {
            config.page_limit = limit;
        }
        config
    }
}

#[derive(Debug, Clone, Default)]
pub struct LemmyfeedPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Shared app-group style directory; the widget snapshot lands here so a
    /// separate process can read it without opening the store.
    pub shared_dir: PathBuf,
    pub widget_snapshot_path: PathBuf,
}

impl LemmyfeedPaths {
    pub fn discover() -> Result<Self> {
        if let Some(base) = env::var_os("LEMMYFEED_BASE_DIR") {
            return Self::from_base_dir(PathBuf::from(base));
        }
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("lemmyfeed.db");
        let shared_dir = base.join("shared");
        let widget_snapshot_path = shared_dir.join("top_posts.json");

        Ok(Self {
            base,
            data_dir,
            db_path,
            shared_dir,
            widget_snapshot_path,
        })
    }
}
