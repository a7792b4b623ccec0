use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Push,
    Pull,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub workspace_dir: PathBuf,
    pub mode: DeliveryMode,
    // host:port of the display device; empty disables push
    pub target_address: String,
    pub listen_port: u16,
    pub min_send_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub tick_interval_ms: u64,
    pub status_refresh_secs: u64,
    pub clamp_progress: bool,
    #[serde(default)]
    pub ignore: HashMap<String, bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base_dir = dirs::home_dir()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let workspace_dir = base_dir.join(".xpbridge");

        Self {
            workspace_dir,
            mode: DeliveryMode::Push,
            target_address: String::new(),
            listen_port: 8080,
            min_send_interval_ms: 1000,
            request_timeout_secs: 5,
            tick_interval_ms: 600,
            status_refresh_secs: 2,
            clamp_progress: false,
            ignore: HashMap::new(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let workspace_dir = Self::default().workspace_dir;
        let config_path = crate::paths::config_file(&workspace_dir);

        let mut builder = Config::builder()
            .set_default("workspace_dir", workspace_dir.to_string_lossy().as_ref())?
            .set_default("mode", "push")?
            .set_default("target_address", "")?
            .set_default("listen_port", 8080)?
            .set_default("min_send_interval_ms", 1000)?
            .set_default("request_timeout_secs", 5)?
            .set_default("tick_interval_ms", 600)?
            .set_default("status_refresh_secs", 2)?
            .set_default("clamp_progress", false)?;

        if config_path.exists() {
            builder = builder.add_source(File::from(config_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("XPBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    /// Names of skills flagged `true` in the `[ignore]` table.
    pub fn ignored_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .ignore
            .iter()
            .filter(|(_, ignored)| **ignored)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
