//! Bounded per-conversation history.
//!
//! A process-wide map from session identifier to an ordered list of
//! turns, capped at a fixed length (oldest dropped first). Sessions are
//! created on first use and garbage-collected only by process restart.
//!
//! Locking discipline: the outer `RwLock` guards only the map shape, and
//! each session holds its own `Mutex`. Requests on different session
//! identifiers never contend on the same lock; concurrent appends to the
//! same session serialize, so both exchanges are retained in arrival
//! order — last-writer-wins is not acceptable here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::models::Turn;

/// Process-wide store of bounded conversation histories.
pub struct SessionStore {
    max_turns: usize,
    sessions: RwLock<HashMap<String, Arc<Mutex<Vec<Turn>>>>>,
}

impl SessionStore {
    /// `max_turns` is the retention cap per session, counted in turns
    /// (a user/assistant exchange is two turns).
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of a session's history, most recent last. An unknown
    /// identifier yields an empty history without creating a session.
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        let sessions = self.sessions.read().unwrap();
        match sessions.get(session_id) {
            Some(turns) => turns.lock().unwrap().clone(),
            None => Vec::new(),
        }
    }

    /// Append a single turn, trimming to the retention cap.
    pub fn append(&self, session_id: &str, turn: Turn) {
        let session = self.get_or_create(session_id);
        let mut turns = session.lock().unwrap();
        turns.push(turn);
        Self::trim(&mut turns, self.max_turns);
    }

    /// Append a (user, assistant) exchange atomically under one lock, so
    /// interleaved requests on the same session cannot split an exchange.
    pub fn record_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let session = self.get_or_create(session_id);
        let mut turns = session.lock().unwrap();
        turns.push(Turn::user(question));
        turns.push(Turn::assistant(answer));
        Self::trim(&mut turns, self.max_turns);
    }

    fn get_or_create(&self, session_id: &str) -> Arc<Mutex<Vec<Turn>>> {
        if let Some(existing) = self.sessions.read().unwrap().get(session_id) {
            return existing.clone();
        }
        let mut sessions = self.sessions.write().unwrap();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    fn trim(turns: &mut Vec<Turn>, max_turns: usize) {
        if turns.len() > max_turns {
            let excess = turns.len() - max_turns;
            turns.drain(..excess);
        }
    }
}
