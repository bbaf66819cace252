// Conversions between core payloads and serenity builders.

use crate::core::platform::{EmbedSpec, FileAttachment, OutgoingMessage, PlatformError, PlatformMessage};
use poise::serenity_prelude as serenity;

pub fn create_embed(spec: &EmbedSpec) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new();
    if let Some(title) = &spec.title {
        embed = embed.title(title);
    }
    if let Some(description) = &spec.description {
        embed = embed.description(description);
    }
    if let Some(color) = spec.color {
        embed = embed.colour(color);
    }
    if let Some(url) = &spec.image_url {
        embed = embed.image(url);
    }
    if let Some(footer) = &spec.footer {
        embed = embed.footer(serenity::CreateEmbedFooter::new(footer));
    }
    embed
}

pub fn create_attachment(file: &FileAttachment) -> serenity::CreateAttachment {
    serenity::CreateAttachment::bytes(file.bytes.clone(), file.filename.clone())
}

pub fn create_message(payload: &OutgoingMessage) -> serenity::CreateMessage {
    let mut message = serenity::CreateMessage::new();
    if let Some(content) = &payload.content {
        message = message.content(content);
    }
    if let Some(embed) = &payload.embed {
        message = message.embed(create_embed(embed));
    }
    if let Some(file) = &payload.attachment {
        message = message.add_file(create_attachment(file));
    }
    message
}

pub fn edit_message(payload: &OutgoingMessage) -> serenity::EditMessage {
    let mut message = serenity::EditMessage::new();
    if let Some(content) = &payload.content {
        message = message.content(content);
    }
    if let Some(embed) = &payload.embed {
        message = message.embed(create_embed(embed));
    }
    if let Some(file) = &payload.attachment {
        message = message.new_attachment(create_attachment(file));
    }
    message
}

pub fn interaction_message(
    payload: &OutgoingMessage,
    ephemeral: bool,
) -> serenity::CreateInteractionResponseMessage {
    let mut message = serenity::CreateInteractionResponseMessage::new().ephemeral(ephemeral);
    if let Some(content) = &payload.content {
        message = message.content(content);
    }
    if let Some(embed) = &payload.embed {
        message = message.embed(create_embed(embed));
    }
    if let Some(file) = &payload.attachment {
        message = message.add_file(create_attachment(file));
    }
    message
}

pub fn interaction_edit(payload: &OutgoingMessage) -> serenity::EditInteractionResponse {
    let mut edit = serenity::EditInteractionResponse::new();
    if let Some(content) = &payload.content {
        edit = edit.content(content);
    }
    if let Some(embed) = &payload.embed {
        edit = edit.embed(create_embed(embed));
    }
    if let Some(file) = &payload.attachment {
        edit = edit.new_attachment(create_attachment(file));
    }
    edit
}

pub fn interaction_followup(
    payload: &OutgoingMessage,
    ephemeral: bool,
) -> serenity::CreateInteractionResponseFollowup {
    let mut followup = serenity::CreateInteractionResponseFollowup::new().ephemeral(ephemeral);
    if let Some(content) = &payload.content {
        followup = followup.content(content);
    }
    if let Some(embed) = &payload.embed {
        followup = followup.embed(create_embed(embed));
    }
    if let Some(file) = &payload.attachment {
        followup = followup.add_file(create_attachment(file));
    }
    followup
}

pub fn platform_message(message: &serenity::Message) -> PlatformMessage {
    PlatformMessage {
        id: message.id.get(),
        channel_id: message.channel_id.get(),
        author_id: message.author.id.get(),
        author_name: message.author.name.clone(),
        content: message.content.clone(),
    }
}

/// Maps serenity failures onto the port's error kinds by HTTP status.
pub fn platform_error(what: &str, error: serenity::Error) -> PlatformError {
    let status = match &error {
        serenity::Error::Http(http_error) => http_error.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    classify_status(what, status, &error.to_string())
}

fn classify_status(what: &str, status: Option<u16>, detail: &str) -> PlatformError {
    match status {
        Some(404) => PlatformError::NotFound(what.to_string()),
        Some(403) => PlatformError::Forbidden(what.to_string()),
        _ => PlatformError::Unavailable(format!("{what}: {detail}")),
    }
}
