//! Concurrent map of live chat sessions

use super::controller::{SessionController, SessionServices};
use super::error::SessionError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Shared handle to one session. The mutex serializes that session's events.
pub type SessionHandle = Arc<Mutex<SessionController>>;

struct SessionEntry {
    created_at: DateTime<Utc>,
    /// Unix millis of the last lookup
    last_active: AtomicI64,
    controller: SessionHandle,
}

/// Summary row for listing sessions
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Sessions keyed by id; each owns its own controller
pub struct SessionRegistry {
    services: SessionServices,
    sessions: DashMap<Uuid, SessionEntry>,
}

impl SessionRegistry {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            sessions: DashMap::new(),
        }
    }

    /// Register a fresh UNINITIALIZED session
    pub fn create(&self) -> (Uuid, SessionHandle) {
        let controller = SessionController::new(self.services.clone());
        let id = controller.id();
        let handle = Arc::new(Mutex::new(controller));

        self.sessions.insert(
            id,
            SessionEntry {
                created_at: Utc::now(),
                last_active: AtomicI64::new(Utc::now().timestamp_millis()),
                controller: handle.clone(),
            },
        );
        tracing::debug!("Registered session {}", id);
        (id, handle)
    }

    /// Look up a session and mark it active
    pub fn get(&self, id: Uuid) -> Result<SessionHandle, SessionError> {
        let entry = self
            .sessions
            .get(&id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.last_active.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        Ok(entry.controller.clone())
    }

    /// Unregister a session; the caller ends it
    pub fn remove(&self, id: Uuid) -> Result<SessionHandle, SessionError> {
        self.sessions
            .remove(&id)
            .map(|(_, entry)| entry.controller)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Unregister and end every session not looked up within `max_idle`.
    ///
    /// Returns how many sessions were ended.
    pub async fn end_idle(&self, max_idle: Duration) -> usize {
        let max_idle_ms = i64::try_from(max_idle.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(max_idle_ms);

        let mut expired = Vec::new();
        self.sessions.retain(|id, entry| {
            let idle = entry.last_active.load(Ordering::Relaxed) <= cutoff;
            if idle {
                expired.push((*id, entry.controller.clone()));
            }
            !idle
        });

        for (id, handle) in &expired {
            tracing::info!("Ending session {} after {}s idle", id, max_idle.as_secs());
            handle.lock().await.end().await;
        }
        expired.len()
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| SessionInfo {
                id: *entry.key(),
                created_at: entry.created_at,
            })
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
