// Environment-backed BotSettings. `.env` is loaded by main via dotenv before
// this runs.

use crate::core::settings::{BotSettings, TagSweepConfig};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

fn parse<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => Ok(Some(
            value
                .parse()
                .with_context(|| format!("{name} has an invalid value `{value}`"))?,
        )),
        None => Ok(None),
    }
}

impl BotSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .context("Missing DISCORD_TOKEN. Set it in your environment or .env file.")?;

        let owner_id = parse::<u64>("BOT_OWNER_ID", lookup("BOT_OWNER_ID"))?;
        let primary_guild_id = parse::<u64>("PRIMARY_GUILD_ID", lookup("PRIMARY_GUILD_ID"))?;

        let command_prefix = lookup("COMMAND_PREFIX")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.command_prefix);

        let action_roots = match lookup("ACTION_ROOTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(PathBuf::from)
                .collect(),
            None => defaults.action_roots,
        };

        let tag = lookup("TAG_SWEEP_TAG").filter(|t| !t.trim().is_empty());
        let role_id = parse::<u64>("TAG_SWEEP_ROLE_ID", lookup("TAG_SWEEP_ROLE_ID"))?;
        let tag_sweep = match (tag, role_id, primary_guild_id) {
            (Some(tag), Some(role_id), Some(guild_id)) => Some(TagSweepConfig {
                guild_id,
                tag: tag.trim().to_string(),
                role_id,
            }),
            (None, None, _) => None,
            (_, _, None) => bail!("The tag sweep needs PRIMARY_GUILD_ID to be set"),
            _ => bail!("TAG_SWEEP_TAG and TAG_SWEEP_ROLE_ID must be set together"),
        };

        // Tokio intervals panic on a zero period; prompts would expire at once.
        let secs = |name: &str, default: Duration| -> Result<Duration> {
            match parse::<u64>(name, lookup(name))? {
                Some(0) => bail!("{name} must be greater than 0"),
                Some(secs) => Ok(Duration::from_secs(secs)),
                None => Ok(default),
            }
        };

        Ok(Self {
            token,
            owner_id,
            primary_guild_id,
            command_prefix,
            action_roots,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            image_service_url: lookup("IMAGE_SERVICE_URL").filter(|u| !u.trim().is_empty()),
            ocr_service_url: lookup("OCR_SERVICE_URL")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.ocr_service_url),
            ocr_api_key: lookup("OCR_API_KEY").filter(|k| !k.trim().is_empty()),
            tag_sweep,
            tag_sweep_interval: secs("TAG_SWEEP_INTERVAL_SECS", defaults.tag_sweep_interval)?,
            prompt_timeout: secs("PROMPT_TIMEOUT_SECS", defaults.prompt_timeout)?,
            ocr_timeout: defaults.ocr_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<BotSettings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotSettings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(settings(&[]).is_err());
        assert!(settings(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn defaults_apply() {
        let s = settings(&[("DISCORD_TOKEN", "abc")]).unwrap();
        assert_eq!(s.command_prefix, ".");
        assert_eq!(s.action_roots, vec![PathBuf::from("actions")]);
        assert_eq!(s.owner_id, None);
        assert!(s.tag_sweep.is_none());
    }

    #[test]
    fn full_configuration() {
        let s = settings(&[
            ("DISCORD_TOKEN", "abc"),
            ("BOT_OWNER_ID", "42"),
            ("PRIMARY_GUILD_ID", "100"),
            ("COMMAND_PREFIX", "!"),
            ("ACTION_ROOTS", "actions, extra/actions,"),
            ("TAG_SWEEP_TAG", "[GK]"),
            ("TAG_SWEEP_ROLE_ID", "900"),
            ("TAG_SWEEP_INTERVAL_SECS", "600"),
        ])
        .unwrap();

        assert_eq!(s.owner_id, Some(42));
        assert_eq!(s.command_prefix, "!");
        assert_eq!(
            s.action_roots,
            vec![PathBuf::from("actions"), PathBuf::from("extra/actions")]
        );
        assert_eq!(
            s.tag_sweep,
            Some(TagSweepConfig {
                guild_id: 100,
                tag: "[GK]".into(),
                role_id: 900
            })
        );
        assert_eq!(s.tag_sweep_interval, Duration::from_secs(600));
    }

    #[test]
    fn bad_values_are_reported() {
        let err = settings(&[("DISCORD_TOKEN", "abc"), ("BOT_OWNER_ID", "me")]).unwrap_err();
        assert!(err.to_string().contains("BOT_OWNER_ID"));

        assert!(settings(&[("DISCORD_TOKEN", "abc"), ("TAG_SWEEP_TAG", "x")]).is_err());

        for name in ["TAG_SWEEP_INTERVAL_SECS", "PROMPT_TIMEOUT_SECS"] {
            let err = settings(&[("DISCORD_TOKEN", "abc"), (name, "0")]).unwrap_err();
            assert_eq!(err.to_string(), format!("{name} must be greater than 0"));
        }
    }
}
