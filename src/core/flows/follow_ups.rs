// Follow-up prompts: an action asks a question and waits for the same actor
// to answer in the same channel.
//
// At most one prompt waits per (channel, actor). A newer prompt supersedes
// the older one, whose flow then ends without a reply.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Reply(String),
    TimedOut,
    /// Another prompt for the same actor and channel took over.
    Superseded,
}

struct Waiter {
    ticket: u64,
    sender: oneshot::Sender<String>,
}

pub struct FollowUps {
    pending: DashMap<(u64, u64), Waiter>,
    next_ticket: AtomicU64,
    timeout: Duration,
}

impl FollowUps {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            next_ticket: AtomicU64::new(0),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the actor's next message in the channel.
    pub async fn await_reply(&self, channel_id: u64, actor_id: u64) -> PromptOutcome {
        let key = (channel_id, actor_id);
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        // Dropping the replaced sender wakes the older prompt.
        self.pending.insert(key, Waiter { ticket, sender });

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(content)) => PromptOutcome::Reply(content),
            Ok(Err(_)) => PromptOutcome::Superseded,
            Err(_) => {
                self.pending.remove_if(&key, |_, waiter| waiter.ticket == ticket);
                tracing::debug!(channel_id, actor_id, "Follow-up prompt timed out");
                PromptOutcome::TimedOut
            }
        }
    }

    /// Hand a message to a waiting prompt. Returns `true` when it was consumed.
    pub fn offer(&self, channel_id: u64, actor_id: u64, content: &str) -> bool {
        match self.pending.remove(&(channel_id, actor_id)) {
            Some((_, waiter)) => waiter.sender.send(content.to_string()).is_ok(),
            None => false,
        }
    }

    pub fn waiting(&self) -> usize {
        self.pending.len()
    }
}
