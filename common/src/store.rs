//! In-memory store (spec §4.7): sessions and their append-only event logs,
//! keyed by session name. All operations are guarded by a single lock;
//! returned session/event data is always a snapshot (`Clone`), so callers
//! cannot mutate store state through a returned reference.

use crate::{
    error::{DuplicateSessionSnafu, SchedulingError, UnknownSessionSnafu},
    types::{Event, Session, SessionName},
};
use parking_lot::RwLock;
use snafu::ensure;
use std::collections::HashMap;

struct Entry {
    session: Session,
    events: Vec<Event>,
}

/// Sessions + event logs, keyed by session name.
#[derive(Default)]
pub struct Store {
    inner: RwLock<HashMap<SessionName, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Fails with `DuplicateSession` if the name already exists.
    pub fn store_session(&self, session: Session) -> Result<(), SchedulingError> {
        let mut inner = self.inner.write();
        ensure!(
            !inner.contains_key(&session.name),
            DuplicateSessionSnafu {
                name: session.name.clone(),
            }
        );
        inner.insert(
            session.name.clone(),
            Entry {
                session,
                events: Vec::new(),
            },
        );
        Ok(())
    }

    /// Returns a snapshot of the session, or `None` if unknown.
    pub fn get_session(&self, name: &SessionName) -> Option<Session> {
        self.inner.read().get(name).map(|e| e.session.clone())
    }

    /// Appends an event; fails with `UnknownSession` if the session is
    /// absent. The event kind sequence per session is expected (not
    /// enforced here -- see `common::types::EventKind` ordering and the
    /// executor, which is the sole writer for any one session) to be a
    /// prefix of a legal lifecycle sequence.
    pub fn store_event(&self, name: &SessionName, event: Event) -> Result<(), SchedulingError> {
        let mut inner = self.inner.write();
        let entry = inner
            .get_mut(name)
            .ok_or_else(|| UnknownSessionSnafu { name: name.clone() }.build())?;
        entry.events.push(event);
        Ok(())
    }

    /// Returns the last event for a session, or `None` if none recorded yet.
    /// Fails with `UnknownSession` if the session itself is absent.
    pub fn get_latest_event(&self, name: &SessionName) -> Result<Option<Event>, SchedulingError> {
        let inner = self.inner.read();
        let entry = inner
            .get(name)
            .ok_or_else(|| UnknownSessionSnafu { name: name.clone() }.build())?;
        Ok(entry.events.last().cloned())
    }

    /// Returns the full event log for a session, oldest first.
    pub fn get_events(&self, name: &SessionName) -> Result<Vec<Event>, SchedulingError> {
        let inner = self.inner.read();
        let entry = inner
            .get(name)
            .ok_or_else(|| UnknownSessionSnafu { name: name.clone() }.build())?;
        Ok(entry.events.clone())
    }

    /// Removes a session and its event log. Idempotent.
    pub fn delete_session(&self, name: &SessionName) {
        self.inner.write().remove(name);
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        self.inner.read().values().map(|e| e.session.clone()).collect()
    }
}
