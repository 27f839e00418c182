//! Single-display flash messages and old form input, keyed by session.
//!
//! The session is the authenticated user's id: whatever one request puts in
//! the bag is handed to the next page that admin renders, then forgotten.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: Level,
    pub message: String,
}

/// Field name to error messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Everything flashed for one session since the last render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlashBag {
    pub messages: Vec<FlashMessage>,
    pub old_input: Option<serde_json::Value>,
    pub errors: FieldErrors,
}

impl FlashBag {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.old_input.is_none() && self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct FlashStore {
    bags: Mutex<HashMap<i64, FlashBag>>,
}

impl FlashStore {
    pub async fn add(&self, session: i64, level: Level, message: impl Into<String>) {
        let mut bags = self.bags.lock().await;
        bags.entry(session).or_default().messages.push(FlashMessage {
            level,
            message: message.into(),
        });
    }

    /// Keep a rejected submission so the form can be redisplayed with it.
    pub async fn with_input(&self, session: i64, input: serde_json::Value, errors: FieldErrors) {
        let mut bags = self.bags.lock().await;
        let bag = bags.entry(session).or_default();
        bag.old_input = Some(input);
        bag.errors = errors;
    }

    /// Remove and return the session's bag.
    pub async fn take(&self, session: i64) -> FlashBag {
        self.bags.lock().await.remove(&session).unwrap_or_default()
    }

    #[cfg(test)]
    pub async fn peek(&self, session: i64) -> FlashBag {
        self.bags
            .lock()
            .await
            .get(&session)
            .cloned()
            .unwrap_or_default()
    }
}
