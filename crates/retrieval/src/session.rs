//! Per-session conversation memory.
//!
//! Each session keeps a bounded ring buffer of turns, oldest evicted first.
//! All sessions share one mutex, so readers never observe a half-applied
//! eviction. Nothing is persisted across process restarts.

use crate::text::truncate_with_ellipsis;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const TOPIC_CHARS: usize = 50;
const TOPIC_COUNT: usize = 5;
const ANSWER_CHARS: usize = 200;

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub query: String,
    pub answer: String,
    /// Clock reading when the turn was recorded.
    #[serde(skip)]
    pub at: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub exchanges: usize,
    /// Most recent queries, oldest first, shortened.
    pub topics: Vec<String>,
    /// Seconds since the last recorded turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_secs: Option<f64>,
}

pub struct SessionStore {
    capacity: usize,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<String, VecDeque<ConversationTurn>>>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<ConversationTurn>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a turn, evicting the oldest once the session is full.
    pub fn record(&self, session: &str, query: &str, answer: &str) {
        let turn = ConversationTurn {
            query: query.to_string(),
            answer: answer.to_string(),
            at: self.clock.now(),
        };

        let mut sessions = self.lock();
        let turns = sessions.entry(session.to_string()).or_default();
        while turns.len() >= self.capacity {
            turns.pop_front();
        }
        turns.push_back(turn);
        tracing::debug!(session, turns = turns.len(), "Recorded conversation turn");
    }

    /// All retained turns, oldest first.
    pub fn history(&self, session: &str) -> Vec<ConversationTurn> {
        self.lock()
            .get(session)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The last `turns` exchanges formatted for the prompt, or an empty
    /// string for an unknown or empty session.
    pub fn conversation_context(&self, session: &str, turns: usize) -> String {
        let sessions = self.lock();
        let Some(history) = sessions.get(session).filter(|h| !h.is_empty()) else {
            return String::new();
        };

        let mut parts = vec!["CONVERSATION HISTORY:".to_string()];
        for turn in history.iter().skip(history.len().saturating_sub(turns)) {
            parts.push(format!("Q: {}", turn.query));
            parts.push(format!("A: {}", truncate_with_ellipsis(&turn.answer, ANSWER_CHARS)));
        }
        parts.push(String::new());
        parts.join("\n")
    }

    pub fn summary(&self, session: &str) -> SessionSummary {
        let sessions = self.lock();
        let Some(history) = sessions.get(session) else {
            return SessionSummary {
                exchanges: 0,
                topics: Vec::new(),
                idle_secs: None,
            };
        };

        SessionSummary {
            exchanges: history.len(),
            topics: history
                .iter()
                .skip(history.len().saturating_sub(TOPIC_COUNT))
                .map(|turn| truncate_with_ellipsis(&turn.query, TOPIC_CHARS))
                .collect(),
            idle_secs: history
                .back()
                .map(|turn| self.clock.now().saturating_sub(turn.at).as_secs_f64()),
        }
    }

    pub fn clear(&self, session: &str) {
        self.lock().remove(session);
    }
}
