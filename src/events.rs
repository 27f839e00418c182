//! In-process lifecycle notifications for user accounts.
//!
//! Every notification is published twice, once per [`Channel`], so listeners
//! can subscribe to all user events or only to account-level ones.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::users::repo_types::UserSnapshot;

/// Lifecycle step of a state-changing user operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Creating,
    Created,
    Updating,
    Updated,
    Saving,
    Saved,
    Deleting,
    Deleted,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Creating => "creating",
            Phase::Created => "created",
            Phase::Updating => "updating",
            Phase::Updated => "updated",
            Phase::Saving => "saving",
            Phase::Saved => "saved",
            Phase::Deleting => "deleting",
            Phase::Deleted => "deleted",
        }
    }
}

/// Scope a notification is broadcast under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    #[serde(rename = "users")]
    Users,
    #[serde(rename = "user.account")]
    UserAccount,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Users, Channel::UserAccount];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Users => "users",
            Channel::UserAccount => "user.account",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserEvent {
    pub phase: Phase,
    pub channel: Channel,
    pub user: UserSnapshot,
    /// Admin whose request triggered the event.
    pub actor_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl fmt::Display for UserEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.phase.as_str(), self.channel.as_str())
    }
}

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus for [`UserEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<UserEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `phase` for `user` on both channels, `users` first.
    pub fn notify(&self, phase: Phase, user: &UserSnapshot, actor_id: i64) {
        let timestamp = OffsetDateTime::now_utc();
        for channel in Channel::ALL {
            let event = UserEvent {
                phase,
                channel,
                user: user.clone(),
                actor_id,
                timestamp,
            };
            debug!(event = %event, user_id = ?user.id, "publishing");
            // Err only means nobody is listening.
            let _ = self.sender.send(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UserEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Log every notification until the bus is dropped.
pub fn spawn_logger(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(
                    event = %event,
                    user_id = ?event.user.id,
                    actor_id = event.actor_id,
                    "user lifecycle event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::UserStatus;

    fn snapshot() -> UserSnapshot {
        UserSnapshot {
            id: Some(7),
            fullname: "Ada".into(),
            email: "a@x.com".into(),
            status: UserStatus::Unverified,
        }
    }

    #[tokio::test]
    async fn notify_publishes_on_both_channels_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.notify(Phase::Saving, &snapshot(), 1);

        let first = rx.recv().await.expect("users event");
        let second = rx.recv().await.expect("user.account event");
        assert_eq!(first.channel, Channel::Users);
        assert_eq!(second.channel, Channel::UserAccount);
        assert_eq!(first.phase, Phase::Saving);
        assert_eq!(second.user.id, Some(7));
        assert_eq!(first.to_string(), "saving: users");
        assert_eq!(second.to_string(), "saving: user.account");
    }

    #[test]
    fn notify_without_subscribers_does_not_panic() {
        EventBus::default().notify(Phase::Deleted, &snapshot(), 1);
    }

    #[test]
    fn event_serializes_channel_names() {
        let event = UserEvent {
            phase: Phase::Created,
            channel: Channel::UserAccount,
            user: snapshot(),
            actor_id: 1,
            timestamp: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["channel"], "user.account");
        assert_eq!(json["phase"], "created");
        assert!(json["user"].get("password").is_none());
    }
}
