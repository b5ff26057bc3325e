//! Per-user conversation state kept in memory.
//!
//! Nothing here is persisted: a restart drops onboarding progress, pending
//! prompts and chat history, which is acceptable for this bot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::config::limits::CHAT_HISTORY_TURNS;

/// Where the user is in the profile questionnaire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnboardingStep {
    #[default]
    None,
    Gender,
    Pregnant,
    Age,
    Height,
    Weight,
    Activity,
    Diet,
    Goal,
    Ready,
}

/// What the next photo is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    Analysis,
    Document,
}

/// What the next free-form input is expected to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Awaiting {
    #[default]
    Nothing,
    Image(ImageMode),
    Symptoms,
    Food,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub step: OnboardingStep,
    pub awaiting: Awaiting,
    pub history: Vec<ChatTurn>,
}

impl Session {
    /// Pushes the user's message and trims history to the last
    /// `CHAT_HISTORY_TURNS` turns. Returns the history to send to the model.
    pub fn push_user_turn(&mut self, content: impl Into<String>) -> Vec<ChatTurn> {
        self.history.push(ChatTurn {
            role: Role::User,
            content: content.into(),
        });
        if self.history.len() > CHAT_HISTORY_TURNS {
            let excess = self.history.len() - CHAT_HISTORY_TURNS;
            self.history.drain(..excess);
        }
        self.history.clone()
    }

    pub fn push_assistant_turn(&mut self, content: impl Into<String>) {
        self.history.push(ChatTurn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    /// Takes the pending input expectation, leaving `Nothing` behind.
    pub fn take_awaiting(&mut self) -> Awaiting {
        std::mem::take(&mut self.awaiting)
    }
}

/// Shared map of sessions keyed by Telegram user ID.
///
/// Locks are held only inside the closures passed to [`SessionStore::update`],
/// never across network calls.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<i64, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's session (default if none exists).
    pub async fn get(&self, user_id: i64) -> Session {
        let sessions = self.sessions.lock().await;
        sessions.get(&user_id).cloned().unwrap_or_default()
    }

    /// Mutates the user's session in place, creating it if needed.
    pub async fn update<R>(&self, user_id: i64, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock().await;
        f(sessions.entry(user_id).or_default())
    }

    pub async fn reset(&self, user_id: i64) {
        self.sessions.lock().await.remove(&user_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_trimmed_before_the_model_call() {
        let mut session = Session::default();
        for i in 0..5 {
            session.push_user_turn(format!("q{}", i));
            session.push_assistant_turn(format!("a{}", i));
        }

        let sent = session.push_user_turn("latest");
        assert_eq!(sent.len(), CHAT_HISTORY_TURNS);
        assert_eq!(sent.last().unwrap().content, "latest");
        assert_eq!(sent.first().unwrap().content, "a2");

        session.push_assistant_turn("reply");
        assert_eq!(session.history.len(), CHAT_HISTORY_TURNS + 1);
    }

    #[test]
    fn take_awaiting_clears_flag() {
        let mut session = Session {
            awaiting: Awaiting::Image(ImageMode::Document),
            ..Default::default()
        };
        assert_eq!(session.take_awaiting(), Awaiting::Image(ImageMode::Document));
        assert_eq!(session.awaiting, Awaiting::Nothing);
    }

    #[tokio::test]
    async fn store_update_and_reset() {
        let store = SessionStore::new();
        assert_eq!(store.get(1).await.step, OnboardingStep::None);

        store.update(1, |s| s.step = OnboardingStep::Age).await;
        assert_eq!(store.get(1).await.step, OnboardingStep::Age);

        let clone = store.clone();
        clone.update(1, |s| s.awaiting = Awaiting::Food).await;
        assert_eq!(store.get(1).await.awaiting, Awaiting::Food);

        store.reset(1).await;
        assert!(store.is_empty().await);
    }
}
