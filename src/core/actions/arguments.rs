// Argument coercion helpers shared by text handlers.
//
// Text arguments arrive as raw tokens. Each helper accepts either a mention
// or a bare snowflake and fails with a corrective UserInput error.

use super::action_errors::ActionError;
use reqwest::Url;

fn parse_snowflake(raw: &str) -> Option<u64> {
    let id: u64 = raw.parse().ok()?;
    (id != 0).then_some(id)
}

fn strip_mention<'a>(raw: &'a str, openers: &[&str]) -> &'a str {
    let raw = raw.trim();
    for opener in openers {
        if let Some(inner) = raw
            .strip_prefix(opener)
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return inner;
        }
    }
    raw
}

/// `<@123>`, `<@!123>` or `123`.
pub fn parse_user_id(raw: &str) -> Result<u64, ActionError> {
    parse_snowflake(strip_mention(raw, &["<@!", "<@"]))
        .ok_or_else(|| ActionError::input(format!("`{raw}` is not a user mention or ID.")))
}

/// `<#123>` or `123`.
pub fn parse_channel_id(raw: &str) -> Result<u64, ActionError> {
    parse_snowflake(strip_mention(raw, &["<#"]))
        .ok_or_else(|| ActionError::input(format!("`{raw}` is not a channel mention or ID.")))
}

/// `<@&123>` or `123`.
pub fn parse_role_id(raw: &str) -> Result<u64, ActionError> {
    parse_snowflake(strip_mention(raw, &["<@&"]))
        .ok_or_else(|| ActionError::input(format!("`{raw}` is not a role mention or ID.")))
}

/// A raw message id, or the trailing id of a message link.
pub fn parse_message_id(raw: &str) -> Result<u64, ActionError> {
    let candidate = raw.trim().rsplit('/').next().unwrap_or("");
    parse_snowflake(candidate)
        .ok_or_else(|| ActionError::input(format!("`{raw}` is not a message ID or link.")))
}

/// Only absolute http(s) URLs.
pub fn parse_http_url(raw: &str) -> Result<Url, ActionError> {
    let invalid = || ActionError::input(format!("`{raw}` is not a valid http(s) URL."));
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(invalid()),
    }
}

/// `#5865F2`, `5865F2` or `0x5865F2`.
pub fn parse_color(raw: &str) -> Result<u32, ActionError> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .unwrap_or(trimmed);
    u32::from_str_radix(hex, 16)
        .ok()
        .filter(|value| hex.len() == 6 && *value <= 0xFF_FF_FF)
        .ok_or_else(|| ActionError::input(format!("`{raw}` is not a hex color like `#5865F2`.")))
}

/// Join the tokens from `start` on, or fail with `usage`.
pub fn rest_text(tokens: &[String], start: usize, usage: &str) -> Result<String, ActionError> {
    let text = tokens.get(start..).unwrap_or_default().join(" ");
    if text.trim().is_empty() {
        Err(ActionError::input(format!("Usage: {usage}")))
    } else {
        Ok(text)
    }
}

/// Token at `index`, or fail with `usage`.
pub fn required<'a>(tokens: &'a [String], index: usize, usage: &str) -> Result<&'a str, ActionError> {
    tokens
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ActionError::input(format!("Usage: {usage}")))
}
