// Static process settings. Loaded once from the environment at startup
// (see infra::env_settings) and shared read-only.

use std::path::PathBuf;
use std::time::Duration;

/// What the periodic tag sweep looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSweepConfig {
    pub guild_id: u64,
    /// Matched case-insensitively against member display names.
    pub tag: String,
    pub role_id: u64,
}

#[derive(Clone)]
#[cfg_attr(test, derive(Debug))]
pub struct BotSettings {
    pub token: String,
    pub owner_id: Option<u64>,
    pub primary_guild_id: Option<u64>,
    pub command_prefix: String,
    pub action_roots: Vec<PathBuf>,
    pub data_dir: PathBuf,
    pub image_service_url: Option<String>,
    pub ocr_service_url: String,
    pub ocr_api_key: Option<String>,
    pub tag_sweep: Option<TagSweepConfig>,
    pub tag_sweep_interval: Duration,
    /// How long a prompt waits for the actor's follow-up.
    pub prompt_timeout: Duration,
    /// Upper bound on a single OCR scan.
    pub ocr_timeout: Duration,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            owner_id: None,
            primary_guild_id: None,
            command_prefix: ".".to_string(),
            action_roots: vec![PathBuf::from("actions")],
            data_dir: PathBuf::from("data"),
            image_service_url: None,
            ocr_service_url: "https://api.ocr.space/parse/image".to_string(),
            ocr_api_key: None,
            tag_sweep: None,
            tag_sweep_interval: Duration::from_secs(60 * 30),
            prompt_timeout: Duration::from_secs(60),
            ocr_timeout: Duration::from_secs(30),
        }
    }
}
