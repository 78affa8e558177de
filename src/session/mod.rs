//! Per-caller conversation context
//!
//! Short-term memory of recent turns, keyed by caller identity. The map is
//! sharded (dashmap), so unrelated callers never contend on one lock, and
//! history is always copied out before any network call is made. Expiry is
//! an explicit `sweep(now)` operation with an injectable clock; the
//! background sweeper is just a timer calling it.

use crate::config::SessionConfig;
use crate::query::{ContextProvider, EntitySet, Intent};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Injectable time source so expiry is testable without wall-clock timers
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// One recorded query turn
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub query_text: String,
    pub timestamp_ms: i64,
    pub intent: Intent,
    pub entities: EntitySet,
    pub result_count: usize,
}

/// A caller's short-term history, owned exclusively by the store
#[derive(Debug, Clone, Default)]
struct ConversationSession {
    history: VecDeque<ConversationTurn>,
    last_activity_ms: i64,
}

/// Concurrent, per-caller conversation store
pub struct ContextStore {
    sessions: DashMap<String, ConversationSession>,
    clock: Arc<dyn Clock>,
    cfg: SessionConfig,
}

impl ContextStore {
    pub fn new(cfg: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
            cfg,
        }
    }

    /// Append a turn, trim history to the configured cap, bump activity
    pub fn record(&self, caller_id: &str, turn: ConversationTurn) {
        let now = self.clock.now_ms();
        let mut session = self.sessions.entry(caller_id.to_string()).or_default();
        session.history.push_back(turn);
        while session.history.len() > self.cfg.max_turns {
            session.history.pop_front();
        }
        session.last_activity_ms = now;
    }

    /// Render the caller's history as plain text, oldest turn first.
    /// Returns an empty string for unknown or expired callers.
    pub fn render_context(&self, caller_id: &str) -> String {
        let now = self.clock.now_ms();
        let Some(session) = self.sessions.get(caller_id) else {
            return String::new();
        };
        if now - session.last_activity_ms > self.idle_ttl_ms() {
            // Stale session the sweeper has not reached yet
            return String::new();
        }

        session
            .history
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                format!(
                    "{}. \"{}\" ({}, {} results)",
                    i + 1,
                    turn.query_text,
                    relative_time(now, turn.timestamp_ms),
                    turn.result_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Remove sessions idle longer than the TTL; returns how many went
    pub fn sweep(&self, now_ms: i64) -> usize {
        let ttl = self.idle_ttl_ms();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now_ms - session.last_activity_ms <= ttl);
        before - self.sessions.len()
    }

    /// Periodic sweep driven by the runtime timer
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let period = Duration::from_secs(store.cfg.sweep_interval_mins * 60);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = store.sweep(store.clock.now_ms());
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle conversation sessions");
                }
            }
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn idle_ttl_ms(&self) -> i64 {
        self.cfg.idle_ttl_mins * 60_000
    }
}

impl ContextProvider for ContextStore {
    fn context_for(&self, caller_id: &str) -> String {
        self.render_context(caller_id)
    }
}

fn relative_time(now_ms: i64, then_ms: i64) -> String {
    let elapsed_secs = ((now_ms - then_ms).max(0)) / 1000;
    if elapsed_secs < 60 {
        "just now".to_string()
    } else if elapsed_secs < 3600 {
        format!("{}m ago", elapsed_secs / 60)
    } else if elapsed_secs < 86_400 {
        format!("{}h ago", elapsed_secs / 3600)
    } else {
        format!("{}d ago", elapsed_secs / 86_400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct ManualClock {
        now: AtomicI64,
    }

    impl ManualClock {
        fn new(start: i64) -> Self {
            Self {
                now: AtomicI64::new(start),
            }
        }

        fn advance_mins(&self, mins: i64) {
            self.now.fetch_add(mins * 60_000, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
    }

    fn turn(clock: &dyn Clock, text: &str, results: usize) -> ConversationTurn {
        ConversationTurn {
            query_text: text.to_string(),
            timestamp_ms: clock.now_ms(),
            intent: Intent::ListMembers,
            entities: EntitySet::default(),
            result_count: results,
        }
    }

    fn store_with_clock() -> (ContextStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000_000));
        let store = ContextStore::new(SessionConfig::default(), clock.clone());
        (store, clock)
    }

    #[test]
    fn test_unknown_caller_yields_empty_context() {
        let (store, _) = store_with_clock();
        assert_eq!(store.render_context("+910000000000"), "");
    }

    #[test]
    fn test_render_format() {
        let (store, clock) = store_with_clock();
        store.record("+91", turn(clock.as_ref(), "1995 batch", 4));
        clock.advance_mins(2);
        store.record("+91", turn(clock.as_ref(), "who are they?", 0));

        let context = store.render_context("+91");
        let lines: Vec<_> = context.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1. \"1995 batch\" (2m ago, 4 results)");
        assert_eq!(lines[1], "2. \"who are they?\" (just now, 0 results)");
    }

    #[test]
    fn test_history_capped_at_five() {
        let (store, clock) = store_with_clock();
        for i in 0..7 {
            store.record("+91", turn(clock.as_ref(), &format!("query {}", i), i));
        }

        let context = store.render_context("+91");
        let lines: Vec<_> = context.lines().collect();
        assert_eq!(lines.len(), 5);
        // The two oldest turns were evicted
        assert!(lines[0].contains("query 2"));
        assert!(lines[4].contains("query 6"));
    }

    #[test]
    fn test_sweep_removes_idle_sessions() {
        let (store, clock) = store_with_clock();
        store.record("idle", turn(clock.as_ref(), "old query", 1));
        clock.advance_mins(20);
        store.record("active", turn(clock.as_ref(), "new query", 1));
        clock.advance_mins(15);

        // "idle" is 35 minutes stale, "active" only 15
        let removed = store.sweep(clock.now_ms());
        assert_eq!(removed, 1);
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.render_context("idle"), "");
        assert!(!store.render_context("active").is_empty());
    }

    #[test]
    fn test_expired_session_absent_before_sweep() {
        let (store, clock) = store_with_clock();
        store.record("+91", turn(clock.as_ref(), "old query", 1));
        clock.advance_mins(31);

        // Sweeper has not run, but the context is already gone
        assert_eq!(store.render_context("+91"), "");
    }

    #[test]
    fn test_callers_are_isolated() {
        let (store, clock) = store_with_clock();
        store.record("alice", turn(clock.as_ref(), "alice query", 1));
        store.record("bob", turn(clock.as_ref(), "bob query", 2));

        assert!(store.render_context("alice").contains("alice query"));
        assert!(!store.render_context("alice").contains("bob query"));
    }

    #[test]
    fn test_concurrent_recording() {
        let (store, clock) = store_with_clock();
        let store = Arc::new(store);

        std::thread::scope(|scope| {
            for t in 0..4 {
                let store = Arc::clone(&store);
                let caller = format!("caller-{}", t);
                let ts = clock.now_ms();
                scope.spawn(move || {
                    for i in 0..50 {
                        store.record(
                            &caller,
                            ConversationTurn {
                                query_text: format!("q{}", i),
                                timestamp_ms: ts,
                                intent: Intent::ListMembers,
                                entities: EntitySet::default(),
                                result_count: i,
                            },
                        );
                    }
                });
            }
        });

        assert_eq!(store.session_count(), 4);
        for t in 0..4 {
            let context = store.render_context(&format!("caller-{}", t));
            assert_eq!(context.lines().count(), 5);
        }
    }
}
