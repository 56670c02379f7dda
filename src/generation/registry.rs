//! In-memory registry of live calendar sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::SessionError;
use crate::onboarding::Profile;

use super::session::{CalendarSession, SessionDeps};

/// Sessions live only as long as the process.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<CalendarSession>>>,
    deps: SessionDeps,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            deps,
        })
    }

    /// Start a fresh session for a completed profile.
    pub async fn create(&self, profile: Profile) -> Arc<CalendarSession> {
        let session = CalendarSession::new(Arc::new(profile), self.deps.clone());
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::clone(&session));
        info!(session_id = %session.id(), "Calendar session created");
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<CalendarSession>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound { id })
    }

    /// Drop a session. In-flight work finishes but is no longer reachable.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Calendar session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
