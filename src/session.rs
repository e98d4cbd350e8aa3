//! Injected session state.
//!
//! The identity provider owns sign-in; this module only holds the current
//! session and tells interested parties when it changes. A `SessionStore`
//! is created once and handed (as `Arc`) to the API client and to whatever
//! renders the UI. There is no process-wide singleton.
//!
//! Key properties:
//! - The access token is read on every request, so a refreshed token is
//!   picked up without rebuilding the client
//! - Subscribers are called after the state change is visible
//! - Dropping a `Subscription` unsubscribes

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

/// Identity-provider user attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A signed-in session as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<SessionUser>,
}

impl Session {
    /// Bare session from a bearer token (CLI, service accounts).
    pub fn from_token(token: &str) -> Self {
        Self {
            access_token: token.to_string(),
            refresh_token: None,
            expires_at: None,
            user: None,
        }
    }

    /// Whether the provider-declared expiry has passed. Informational only:
    /// the backend decides whether a token is still accepted.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Greeting name: full name, else the e-mail local part, else "User".
    pub fn display_name(&self) -> String {
        let Some(user) = &self.user else {
            return "User".to_string();
        };
        if let Some(name) = user.full_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        user.email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// Source of the bearer token for outbound requests.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

type Listener = Arc<dyn Fn(SessionEvent, Option<&Session>) + Send + Sync>;
type ListenerMap = Mutex<HashMap<u64, Listener>>;

// ═══════════════════════════════════════════════════════════
// SessionStore
// ═══════════════════════════════════════════════════════════

/// Holds the current session and fans out change notifications.
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    listeners: Arc<ListenerMap>,
    next_id: AtomicU64,
}

impl SessionStore {
    /// Create an empty (signed-out) store.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store pre-seeded with a session.
    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        if let Ok(mut current) = store.current.write() {
            *current = Some(session);
        }
        store
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Option<Session> {
        self.current.read().ok()?.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Replace the session. Emits `SignedIn` when there was none before,
    /// `TokenRefreshed` otherwise.
    pub fn set(&self, session: Session) {
        let event = {
            let Ok(mut current) = self.current.write() else {
                tracing::error!("Session lock poisoned; dropping session update");
                return;
            };
            let event = if current.is_some() {
                SessionEvent::TokenRefreshed
            } else {
                SessionEvent::SignedIn
            };
            *current = Some(session);
            event
        };
        tracing::debug!(?event, "Session updated");
        self.notify(event);
    }

    /// Sign out locally. No-op (and no event) when already signed out.
    pub fn clear(&self) {
        let had_session = match self.current.write() {
            Ok(mut current) => current.take().is_some(),
            Err(_) => false,
        };
        if had_session {
            tracing::debug!("Session cleared");
            self.notify(SessionEvent::SignedOut);
        }
    }

    /// Register a callback for session changes. The callback receives the
    /// new session (`None` after sign-out). Keep the returned guard alive
    /// for as long as notifications are wanted.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SessionEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, Arc::new(callback));
        }
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    // Listeners are called without holding any lock so they may read the store.
    fn notify(&self, event: SessionEvent) {
        let listeners: Vec<Listener> = match self.listeners.lock() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => return,
        };
        let snapshot = self.session();
        for listener in listeners {
            listener(event, snapshot.as_ref());
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenProvider for SessionStore {
    fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .ok()?
            .as_ref()
            .map(|s| s.access_token.clone())
            .filter(|t| !t.is_empty())
    }
}

/// Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerMap>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            if let Ok(mut map) = listeners.lock() {
                map.remove(&self.id);
            }
        }
    }
}
