// Screenshot verification: a member posts a screenshot, OCR reads it, and
// if the configured phrase appears the member gets the verified role.

use crate::core::actions::arguments::{parse_http_url, parse_role_id, required, rest_text};
use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::dispatch::InvocationContext;
use crate::core::media::OcrError;
use crate::core::platform::RoleMutation;
use crate::core::services::Services;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const CONFIG_KEY: &str = "verification";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub role_id: u64,
    /// OCR language code, e.g. `eng`.
    pub language: String,
    pub phrase: String,
}

/// Lowercase and collapse whitespace so line breaks in OCR output match.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn phrase_matches(recognized: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    !phrase.is_empty() && normalize(recognized).contains(&phrase)
}

#[derive(Default)]
pub struct VerifySetupHandler;

const SETUP_USAGE: &str = "verifysetup <role> <language> <phrase>";

#[async_trait]
impl ActionHandler for VerifySetupHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let tokens = ctx.arguments.tokens();

        let role_id = parse_role_id(required(tokens, 0, SETUP_USAGE)?)?;
        let language = required(tokens, 1, SETUP_USAGE)?.to_lowercase();
        if language.len() != 3 || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ActionError::input(format!(
                "`{language}` is not a three-letter OCR language code like `eng`."
            )));
        }
        let phrase = rest_text(tokens, 2, SETUP_USAGE)?;

        let record = VerificationRecord {
            role_id,
            language,
            phrase,
        };
        services.config.put(guild_id, CONFIG_KEY, &record).await?;

        tracing::info!(guild_id, role_id, "Verification configured");
        Ok(ActionReply::ephemeral(format!(
            "✅ Screenshots containing \"{}\" will grant <@&{}>.",
            record.phrase, record.role_id
        )))
    }
}

#[derive(Default)]
pub struct VerifyHandler;

#[async_trait]
impl ActionHandler for VerifyHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let Some(record) = services
            .config
            .get::<VerificationRecord>(guild_id, CONFIG_KEY)
            .await?
        else {
            return Err(ActionError::NotFound(
                "Verification isn't set up in this server.".into(),
            ));
        };

        let image_url = match ctx.attachment_urls.first() {
            Some(url) => url.clone(),
            None => match ctx.arguments.tokens().first() {
                Some(raw) => parse_http_url(raw)?.to_string(),
                None => {
                    return Err(ActionError::input(
                        "Attach a screenshot or give a link to one: `verify <image url>`",
                    ))
                }
            },
        };

        ctx.responder.provisional("🔍 Scanning your screenshot...").await?;

        let scan = tokio::time::timeout(
            services.settings.ocr_timeout,
            services.ocr.recognize_text(&image_url, &record.language),
        )
        .await
        .unwrap_or(Err(OcrError::TimedOut));

        let text = match scan {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(guild_id, actor_id = ctx.actor.id, "Verification scan failed: {}", e);
                return Ok(ActionReply::ephemeral(
                    "⚠️ The scan failed. Try again with a clearer screenshot in a moment.",
                ));
            }
        };

        if !phrase_matches(&text, &record.phrase) {
            return Ok(ActionReply::ephemeral(
                "❌ I couldn't find the verification text in that screenshot.",
            ));
        }

        services
            .platform
            .mutate_role(guild_id, ctx.actor.id, record.role_id, RoleMutation::Add)
            .await?;

        tracing::info!(guild_id, actor_id = ctx.actor.id, "Member verified");
        Ok(ActionReply::text(format!(
            "🎉 <@{}> is now verified!",
            ctx.actor.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::ErrorClass;
    use crate::core::permissions::ADMINISTRATOR;
    use crate::core::test_support::{actor, tokens, PlatformCall, TestBed};

    #[test]
    fn phrase_matching_ignores_case_and_line_breaks() {
        assert!(phrase_matches("Thanks for\nSUBSCRIBING  today", "thanks for subscribing"));
        assert!(!phrase_matches("thanks", "thanks for subscribing"));
        assert!(!phrase_matches("anything", "   "));
    }

    async fn configured(bed: &TestBed) {
        bed.invoke(
            &VerifySetupHandler,
            actor(1, &[ADMINISTRATOR]),
            tokens("<@&77> ENG I am subscribed"),
        )
        .await
        .0
        .unwrap();
    }

    #[tokio::test]
    async fn matching_screenshot_grants_the_role() {
        let bed = TestBed::builder().ocr_text("Channel\nI am SUBSCRIBED").build();
        configured(&bed).await;

        let (reply, responder) = bed
            .invoke(&VerifyHandler, actor(5, &[]), tokens("https://img.example/shot.png"))
            .await;

        assert!(reply.unwrap().content().unwrap().contains("verified"));
        assert_eq!(responder.provisional().len(), 1);
        assert_eq!(
            bed.platform.calls(),
            vec![PlatformCall::Role {
                guild_id: TestBed::GUILD_ID,
                user_id: 5,
                role_id: 77,
                mutation: RoleMutation::Add
            }]
        );
    }

    #[tokio::test]
    async fn ocr_failure_degrades_to_a_reply() {
        let bed = TestBed::builder().build();
        configured(&bed).await;

        let (reply, _) = bed
            .invoke(&VerifyHandler, actor(5, &[]), tokens("https://img.example/shot.png"))
            .await;

        assert!(reply.unwrap().content().unwrap().contains("scan failed"));
        assert!(bed.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn stalled_ocr_times_out_without_granting() {
        let bed = TestBed::builder()
            .ocr_text("I am subscribed")
            .hanging_ocr(std::time::Duration::from_millis(50))
            .build();
        configured(&bed).await;

        let (reply, responder) = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            bed.invoke(&VerifyHandler, actor(5, &[]), tokens("https://img.example/shot.png")),
        )
        .await
        .expect("verify should give up on a stalled scan");

        assert!(reply.unwrap().content().unwrap().contains("scan failed"));
        assert_eq!(responder.provisional().len(), 1);
        assert!(bed.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_guild_and_bad_input() {
        let bed = TestBed::builder().ocr_text("x").build();

        let (reply, _) = bed.invoke(&VerifyHandler, actor(5, &[]), tokens("")).await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::NotFound);

        configured(&bed).await;
        let (reply, _) = bed.invoke(&VerifyHandler, actor(5, &[]), tokens("")).await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::UserInput);

        let (reply, _) = bed
            .invoke(&VerifySetupHandler, actor(1, &[]), tokens("77 english hello"))
            .await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::UserInput);
    }
}
