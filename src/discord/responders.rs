// Responders answer the actor in the same place the invocation came from.
//
// A message command is answered with a reply in its channel; a provisional
// reply is posted once and then edited into the final answer. Interactions
// get an initial response and later edits or follow-ups.

use crate::core::actions::ActionReply;
use crate::core::dispatch::Responder;
use crate::core::platform::{OutgoingMessage, PlatformError};
use crate::discord::render::{
    create_message, edit_message, interaction_edit, interaction_followup, interaction_message,
    platform_error,
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct MessageResponder {
    http: Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
    message_id: serenity::MessageId,
    provisional: Mutex<Option<serenity::MessageId>>,
}

impl MessageResponder {
    pub fn new(http: Arc<serenity::Http>, channel_id: u64, message_id: u64) -> Self {
        Self {
            http,
            channel_id: serenity::ChannelId::new(channel_id),
            message_id: serenity::MessageId::new(message_id),
            provisional: Mutex::new(None),
        }
    }

    async fn reply(&self, payload: &OutgoingMessage) -> Result<serenity::MessageId, PlatformError> {
        let message = create_message(payload).reference_message((self.channel_id, self.message_id));
        let sent = self
            .channel_id
            .send_message(&self.http, message)
            .await
            .map_err(|e| platform_error("channel", e))?;
        Ok(sent.id)
    }
}

#[async_trait]
impl Responder for MessageResponder {
    async fn provisional(&self, text: &str) -> Result<(), PlatformError> {
        let mut slot = self.provisional.lock().await;
        let payload = OutgoingMessage::text(text);
        match *slot {
            Some(id) => {
                self.channel_id
                    .edit_message(&self.http, id, edit_message(&payload))
                    .await
                    .map_err(|e| platform_error("message", e))?;
            }
            None => *slot = Some(self.reply(&payload).await?),
        }
        Ok(())
    }

    async fn respond(&self, reply: ActionReply) -> Result<(), PlatformError> {
        let ActionReply::Message { payload, .. } = reply else {
            // Nothing to add; a lingering provisional message would be stale.
            if let Some(id) = self.provisional.lock().await.take() {
                self.channel_id
                    .delete_message(&self.http, id)
                    .await
                    .map_err(|e| platform_error("message", e))?;
            }
            return Ok(());
        };

        let mut slot = self.provisional.lock().await;
        match slot.take() {
            Some(id) => {
                self.channel_id
                    .edit_message(&self.http, id, edit_message(&payload))
                    .await
                    .map_err(|e| platform_error("message", e))?;
            }
            None => {
                self.reply(&payload).await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acknowledged {
    No,
    /// Initial response is a provisional note that later replies overwrite.
    Provisional,
    /// A real answer went out; anything further is a follow-up.
    Answered,
}

/// One Discord call made while answering an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Create { ephemeral: bool },
    EditOriginal,
    DeleteOriginal,
    FollowUp { ephemeral: bool },
}

/// Calls needed to deliver a final reply (`None` for silent) from `state`.
///
/// A public provisional note never outlives the interaction: a public reply
/// overwrites it, anything else removes it. The original response can't be
/// turned ephemeral by editing.
fn final_steps(state: Acknowledged, reply: Option<bool>) -> Vec<Step> {
    match (state, reply) {
        (Acknowledged::No, None) => vec![Step::Create { ephemeral: true }],
        (Acknowledged::No, Some(ephemeral)) => vec![Step::Create { ephemeral }],
        (Acknowledged::Provisional, None) => vec![Step::DeleteOriginal],
        (Acknowledged::Provisional, Some(false)) => vec![Step::EditOriginal],
        (Acknowledged::Provisional, Some(true)) => {
            vec![Step::DeleteOriginal, Step::FollowUp { ephemeral: true }]
        }
        (Acknowledged::Answered, None) => vec![],
        (Acknowledged::Answered, Some(ephemeral)) => vec![Step::FollowUp { ephemeral }],
    }
}

pub struct InteractionResponder {
    http: Arc<serenity::Http>,
    interaction: serenity::CommandInteraction,
    state: Mutex<Acknowledged>,
}

impl InteractionResponder {
    pub fn new(http: Arc<serenity::Http>, interaction: serenity::CommandInteraction) -> Self {
        Self {
            http,
            interaction,
            state: Mutex::new(Acknowledged::No),
        }
    }

    async fn perform(&self, step: Step, payload: &OutgoingMessage) -> Result<(), PlatformError> {
        let result = match step {
            Step::Create { ephemeral } => {
                self.interaction
                    .create_response(
                        &self.http,
                        serenity::CreateInteractionResponse::Message(interaction_message(
                            payload, ephemeral,
                        )),
                    )
                    .await
            }
            Step::EditOriginal => self
                .interaction
                .edit_response(&self.http, interaction_edit(payload))
                .await
                .map(|_| ()),
            Step::DeleteOriginal => self.interaction.delete_response(&self.http).await,
            Step::FollowUp { ephemeral } => self
                .interaction
                .create_followup(&self.http, interaction_followup(payload, ephemeral))
                .await
                .map(|_| ()),
        };
        result.map_err(|e| platform_error("interaction", e))
    }
}

#[async_trait]
impl Responder for InteractionResponder {
    async fn provisional(&self, text: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        let step = match *state {
            Acknowledged::No => Step::Create { ephemeral: false },
            Acknowledged::Provisional => Step::EditOriginal,
            Acknowledged::Answered => Step::FollowUp { ephemeral: false },
        };
        self.perform(step, &OutgoingMessage::text(text)).await?;
        if *state == Acknowledged::No {
            *state = Acknowledged::Provisional;
        }
        Ok(())
    }

    async fn respond(&self, reply: ActionReply) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        let (payload, ephemeral) = match reply {
            ActionReply::Message { payload, ephemeral } => (payload, Some(ephemeral)),
            // An interaction must be acknowledged or the client shows a failure.
            ActionReply::Silent => (OutgoingMessage::text("✅ Done."), None),
        };

        for step in final_steps(*state, ephemeral) {
            self.perform(step, &payload).await?;
        }
        *state = Acknowledged::Answered;
        Ok(())
    }
}
