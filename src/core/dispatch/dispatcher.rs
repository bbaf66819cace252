// Dispatcher - takes one inbound event through
// Received -> Parsed -> Resolved -> Authorized -> Executing -> Completed | Rejected | Failed.
//
// The machine is linear: an event is resolved and authorized at most once.
// Events are not deduplicated here; at-most-once delivery is the platform's
// job, so replaying an event runs its handler again.

use super::dispatch_models::{
    DispatchOutcome, DispatchReport, DispatchState, InboundEvent, InteractionData,
    InvocationContext, RawArguments, RejectReason, Responder, SourceLocation, TargetRef, Actor,
};
use crate::core::actions::{ActionReply, ErrorClass};
use crate::core::permissions::{GateDecision, PermissionGate};
use crate::core::services::Services;
use std::sync::Arc;
use std::time::Instant;

struct ParsedEvent {
    name: String,
    arguments: RawArguments,
    actor: Actor,
    source: SourceLocation,
    message_id: Option<u64>,
    attachment_urls: Vec<String>,
    /// Interactions must always be answered; prefix messages may be ignored.
    interactive: bool,
}

enum Parse {
    NotACommand,
    NoCommand,
    Command(ParsedEvent),
}

pub struct Dispatcher {
    services: Arc<Services>,
    gate: PermissionGate,
    prefix: String,
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            gate: PermissionGate::new(services.settings.owner_id),
            prefix: services.settings.command_prefix.clone(),
            services,
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    fn parse(&self, event: InboundEvent) -> Parse {
        match event {
            InboundEvent::Message(message) => {
                if message.actor.is_bot {
                    return Parse::NotACommand;
                }
                // An answer to a pending prompt is never a new command.
                if self.services.follow_ups.offer(
                    message.source.channel_id,
                    message.actor.id,
                    &message.content,
                ) {
                    return Parse::NotACommand;
                }
                let Some(rest) = message.content.trim_start().strip_prefix(self.prefix.as_str())
                else {
                    return Parse::NotACommand;
                };

                let mut tokens = rest.split_whitespace().map(str::to_string);
                let Some(name) = tokens.next() else {
                    return Parse::NoCommand;
                };

                Parse::Command(ParsedEvent {
                    name,
                    arguments: RawArguments::Tokens(tokens.collect()),
                    actor: message.actor,
                    source: message.source,
                    message_id: Some(message.message_id),
                    attachment_urls: message.attachment_urls,
                    interactive: false,
                })
            }
            InboundEvent::Interaction(interaction) => {
                let arguments = match interaction.data {
                    InteractionData::Command { options } => RawArguments::Options(options),
                    InteractionData::UserTarget { user_id } => {
                        RawArguments::Target(TargetRef::User(user_id))
                    }
                    InteractionData::MessageTarget { message_id } => {
                        RawArguments::Target(TargetRef::Message(message_id))
                    }
                };

                Parse::Command(ParsedEvent {
                    name: interaction.name,
                    arguments,
                    actor: interaction.actor,
                    source: interaction.source,
                    message_id: None,
                    attachment_urls: Vec::new(),
                    interactive: true,
                })
            }
        }
    }

    async fn send(&self, responder: &Arc<dyn Responder>, reply: ActionReply) {
        if let Err(e) = responder.respond(reply).await {
            tracing::warn!("Failed to deliver response: {}", e);
        }
    }

    /// Run one event to a terminal state. Never panics and never returns an
    /// error: every failure ends up in the report and, where appropriate, in
    /// a reply to the actor.
    pub async fn dispatch(
        &self,
        event: InboundEvent,
        responder: Arc<dyn Responder>,
    ) -> DispatchReport {
        let mut trace = vec![DispatchState::Received];

        // Received -> Parsed
        let parsed = match self.parse(event) {
            Parse::NotACommand => {
                return DispatchReport {
                    trace,
                    outcome: DispatchOutcome::Ignored,
                }
            }
            Parse::NoCommand => {
                trace.push(DispatchState::Rejected);
                return DispatchReport {
                    trace,
                    outcome: DispatchOutcome::Rejected(RejectReason::NoCommand),
                };
            }
            Parse::Command(parsed) => parsed,
        };
        trace.push(DispatchState::Parsed);

        // Parsed -> Resolved, against one registry snapshot.
        let descriptor = {
            let registry = self.services.registry.snapshot();
            registry
                .resolve(&parsed.name)
                .filter(|descriptor| parsed.arguments.fits(descriptor.kind))
        };
        let Some(descriptor) = descriptor else {
            tracing::debug!(name = %parsed.name, "Unknown action");
            if parsed.interactive {
                self.send(
                    &responder,
                    ActionReply::ephemeral(format!("❓ Unknown action `{}`.", parsed.name)),
                )
                .await;
            }
            trace.push(DispatchState::Rejected);
            return DispatchReport {
                trace,
                outcome: DispatchOutcome::Rejected(RejectReason::UnknownAction(parsed.name)),
            };
        };
        trace.push(DispatchState::Resolved);
        let action = descriptor.primary_name.clone();

        // Resolved -> Authorized
        let decision = self.gate.authorize(
            descriptor.required_capability.as_ref(),
            parsed.actor.id,
            &parsed.actor.capabilities,
        );
        if decision == GateDecision::Deny {
            tracing::info!(
                action = %action,
                actor_id = parsed.actor.id,
                silent = descriptor.silent_deny,
                "Permission denied"
            );
            if !descriptor.silent_deny {
                let required = descriptor
                    .required_capability
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                self.send(
                    &responder,
                    ActionReply::ephemeral(format!(
                        "⛔ You need the `{required}` permission to use `{action}`."
                    )),
                )
                .await;
            }
            trace.push(DispatchState::Rejected);
            return DispatchReport {
                trace,
                outcome: DispatchOutcome::Rejected(RejectReason::PermissionDenied {
                    action,
                    silent: descriptor.silent_deny,
                }),
            };
        }
        trace.push(DispatchState::Authorized);

        // Authorized -> Executing
        let ctx = InvocationContext {
            is_owner: self.gate.is_owner(parsed.actor.id),
            actor: parsed.actor,
            action: action.clone(),
            arguments: parsed.arguments,
            source: parsed.source,
            message_id: parsed.message_id,
            attachment_urls: parsed.attachment_urls,
            responder: Arc::clone(&responder),
        };
        trace.push(DispatchState::Executing);

        let actor_id = ctx.actor.id;
        let handler = Arc::clone(&descriptor.handler);
        let services = Arc::clone(&self.services);
        let started = Instant::now();
        // A separate task so that a panicking handler is contained here.
        let joined = tokio::spawn(async move { handler.handle(&ctx, &services).await }).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // Executing -> Completed | Failed
        let outcome = match joined {
            Ok(Ok(reply)) => {
                tracing::info!(action = %action, actor_id, elapsed_ms, "Action completed");
                self.send(&responder, reply).await;
                trace.push(DispatchState::Completed);
                DispatchOutcome::Completed { action }
            }
            Ok(Err(err)) => {
                let class = err.class();
                match class {
                    ErrorClass::Collaborator => {
                        tracing::error!(action = %action, actor_id, elapsed_ms, "Action failed: {}", err)
                    }
                    ErrorClass::UserInput => {
                        tracing::debug!(action = %action, actor_id, "Rejected input: {}", err)
                    }
                    _ => tracing::info!(action = %action, actor_id, "Action failed: {}", err),
                }
                self.send(&responder, ActionReply::ephemeral(err.user_message()))
                    .await;
                trace.push(DispatchState::Failed);
                DispatchOutcome::Failed { action, class }
            }
            Err(join_error) => {
                tracing::error!(
                    action = %action,
                    actor_id,
                    panicked = join_error.is_panic(),
                    "Action handler crashed: {}",
                    join_error
                );
                self.send(
                    &responder,
                    ActionReply::ephemeral(ErrorClass::Internal.generic_message()),
                )
                .await;
                trace.push(DispatchState::Failed);
                DispatchOutcome::Failed {
                    action,
                    class: ErrorClass::Internal,
                }
            }
        };

        DispatchReport { trace, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::{
        ActionDescriptor, ActionError, ActionHandler, ActionKind, ActionRegistry, OptionValue,
    };
    use crate::core::dispatch::InboundInteraction;
    use crate::core::messaging::EmbedHandler;
    use crate::core::moderation::BanHandler;
    use crate::core::permissions::{ADMINISTRATOR, BAN_MEMBERS, OWNER};
    use crate::core::test_support::{
        actor, message_event, MockPlatform, PlatformCall, RecordingResponder, TestBed,
    };
    use crate::core::utility::PingHandler;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    const OWNER_ID: u64 = 1;

    #[derive(Default)]
    struct PanickingHandler;

    #[async_trait]
    impl ActionHandler for PanickingHandler {
        async fn handle(
            &self,
            _ctx: &InvocationContext,
            _services: &Services,
        ) -> Result<ActionReply, ActionError> {
            panic!("handler bug");
        }
    }

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry
            .register(
                ActionDescriptor::new("ban", ActionKind::TextCommand, Arc::new(BanHandler))
                    .with_aliases(["b"])
                    .requiring(BAN_MEMBERS),
            )
            .unwrap();
        registry
            .register(ActionDescriptor::new(
                "ping",
                ActionKind::TextCommand,
                Arc::new(PingHandler),
            ))
            .unwrap();
        registry
            .register(
                ActionDescriptor::new(
                    "embed",
                    ActionKind::StructuredCommand,
                    Arc::new(EmbedHandler),
                )
                .requiring(ADMINISTRATOR),
            )
            .unwrap();
        registry
            .register(
                ActionDescriptor::new("secret", ActionKind::TextCommand, Arc::new(PingHandler))
                    .requiring(OWNER)
                    .silent(),
            )
            .unwrap();
        registry
            .register(ActionDescriptor::new(
                "boom",
                ActionKind::TextCommand,
                Arc::new(PanickingHandler),
            ))
            .unwrap();
        registry
    }

    fn bed() -> TestBed {
        TestBed::builder()
            .owner(OWNER_ID)
            .registry(registry())
            .platform(MockPlatform::new().with_channel(10))
            .build()
    }

    async fn run(bed: &TestBed, event: InboundEvent) -> (DispatchReport, Arc<RecordingResponder>) {
        let responder = Arc::new(RecordingResponder::default());
        let report = bed.dispatcher.dispatch(event, responder.clone()).await;
        (report, responder)
    }

    #[tokio::test]
    async fn ban_without_capability_is_rejected_before_the_handler() {
        let bed = bed();
        let (report, responder) = run(&bed, message_event(actor(5, &[]), ".ban 12345 spam")).await;

        assert_eq!(report.final_state(), DispatchState::Rejected);
        assert!(!report.visited(DispatchState::Executing));
        assert_eq!(
            report.outcome,
            DispatchOutcome::Rejected(RejectReason::PermissionDenied {
                action: "ban".into(),
                silent: false
            })
        );
        assert!(bed.platform.calls().is_empty());
        assert!(responder.texts()[0].contains("ban-members"));
    }

    #[tokio::test]
    async fn ban_with_capability_completes() {
        let bed = bed();
        let (report, responder) =
            run(&bed, message_event(actor(5, &[BAN_MEMBERS]), ".B <@12345> spam bot")).await;

        assert_eq!(
            report.trace,
            vec![
                DispatchState::Received,
                DispatchState::Parsed,
                DispatchState::Resolved,
                DispatchState::Authorized,
                DispatchState::Executing,
                DispatchState::Completed,
            ]
        );
        assert_eq!(
            bed.platform.calls(),
            vec![PlatformCall::Ban {
                guild_id: TestBed::GUILD_ID,
                user_id: 12345,
                reason: "spam bot".into()
            }]
        );
        assert_eq!(responder.texts().len(), 1);
    }

    #[tokio::test]
    async fn owner_bypasses_the_gate() {
        let bed = bed();
        let (report, _) = run(&bed, message_event(actor(OWNER_ID, &[]), ".ban 99")).await;
        assert_eq!(report.final_state(), DispatchState::Completed);
    }

    #[tokio::test]
    async fn plain_chat_and_empty_prefix() {
        let bed = bed();

        let (report, responder) = run(&bed, message_event(actor(5, &[]), "hello there")).await;
        assert_eq!(report.outcome, DispatchOutcome::Ignored);
        assert_eq!(report.trace, vec![DispatchState::Received]);
        assert!(responder.texts().is_empty());

        let (report, responder) = run(&bed, message_event(actor(5, &[]), ".   ")).await;
        assert_eq!(
            report.outcome,
            DispatchOutcome::Rejected(RejectReason::NoCommand)
        );
        assert!(responder.texts().is_empty());
    }

    #[tokio::test]
    async fn unknown_text_command_is_silently_ignored() {
        let bed = bed();
        let (report, responder) = run(&bed, message_event(actor(5, &[]), ".dance now")).await;

        assert_eq!(
            report.outcome,
            DispatchOutcome::Rejected(RejectReason::UnknownAction("dance".into()))
        );
        assert!(!report.visited(DispatchState::Resolved));
        assert!(responder.texts().is_empty());
    }

    #[tokio::test]
    async fn structured_action_cannot_be_invoked_as_text() {
        let bed = bed();
        let (report, _) =
            run(&bed, message_event(actor(5, &[ADMINISTRATOR]), ".embed hi")).await;
        assert!(matches!(
            report.outcome,
            DispatchOutcome::Rejected(RejectReason::UnknownAction(_))
        ));
    }

    #[tokio::test]
    async fn silent_deny_produces_no_response() {
        let bed = bed();
        let (report, responder) = run(&bed, message_event(actor(5, &[ADMINISTRATOR]), ".secret")).await;

        assert_eq!(report.final_state(), DispatchState::Rejected);
        assert!(responder.texts().is_empty());
    }

    fn embed_event(channel_id: u64) -> InboundEvent {
        let mut options = BTreeMap::new();
        options.insert("channel".to_string(), OptionValue::Channel(channel_id));
        options.insert(
            "description".to_string(),
            OptionValue::String("Server rules".into()),
        );
        InboundEvent::Interaction(InboundInteraction {
            actor: actor(5, &[ADMINISTRATOR]),
            source: SourceLocation {
                guild_id: Some(TestBed::GUILD_ID),
                channel_id: 10,
            },
            name: "embed".into(),
            data: InteractionData::Command { options },
        })
    }

    #[tokio::test]
    async fn missing_channel_fails_as_not_found_and_dispatcher_keeps_serving() {
        let bed = bed();
        let (report, responder) = run(&bed, embed_event(404)).await;

        assert_eq!(
            report.outcome,
            DispatchOutcome::Failed {
                action: "embed".into(),
                class: ErrorClass::NotFound
            }
        );
        assert_eq!(responder.texts().len(), 1);

        let (report, _) = run(&bed, message_event(actor(5, &[]), ".ping")).await;
        assert_eq!(report.final_state(), DispatchState::Completed);
    }

    #[tokio::test]
    async fn embed_to_known_channel_completes() {
        let bed = bed();
        let (report, _) = run(&bed, embed_event(10)).await;
        assert_eq!(report.final_state(), DispatchState::Completed);
        assert!(matches!(
            bed.platform.calls().as_slice(),
            [PlatformCall::Send { channel_id: 10, .. }]
        ));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let bed = bed();
        let (report, responder) = run(&bed, message_event(actor(5, &[]), ".boom")).await;

        assert_eq!(
            report.outcome,
            DispatchOutcome::Failed {
                action: "boom".into(),
                class: ErrorClass::Internal
            }
        );
        assert_eq!(responder.texts().len(), 1);

        let (report, _) = run(&bed, message_event(actor(5, &[]), ".ping")).await;
        assert_eq!(report.final_state(), DispatchState::Completed);
    }

    #[tokio::test]
    async fn unknown_interaction_gets_an_answer() {
        let bed = bed();
        let event = InboundEvent::Interaction(InboundInteraction {
            actor: actor(5, &[]),
            source: SourceLocation {
                guild_id: Some(TestBed::GUILD_ID),
                channel_id: 10,
            },
            name: "gone".into(),
            data: InteractionData::Command {
                options: BTreeMap::new(),
            },
        });
        let (report, responder) = run(&bed, event).await;

        assert_eq!(report.final_state(), DispatchState::Rejected);
        assert_eq!(responder.texts().len(), 1);
    }

    #[tokio::test]
    async fn replayed_events_are_not_deduplicated() {
        let bed = bed();
        let event = message_event(actor(5, &[BAN_MEMBERS]), ".ban 77");

        run(&bed, event.clone()).await;
        run(&bed, event).await;

        assert_eq!(bed.platform.calls().len(), 2);
    }

    #[tokio::test]
    async fn bot_authors_are_ignored() {
        let bed = bed();
        let mut bot = actor(5, &[BAN_MEMBERS]);
        bot.is_bot = true;
        let (report, _) = run(&bed, message_event(bot, ".ban 77")).await;

        assert_eq!(report.outcome, DispatchOutcome::Ignored);
        assert!(bed.platform.calls().is_empty());
    }
}
