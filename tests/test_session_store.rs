//! Integration tests for conversation session lifecycle

use sampark::config::SessionConfig;
use sampark::query::{EntitySet, Intent};
use sampark::session::{Clock, ContextStore, ConversationTurn};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: AtomicI64::new(1_700_000_000_000),
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
        intent: Intent::FindPeers,
        entities: EntitySet::default(),
        result_count: results,
    }
}

#[test]
fn test_sixth_query_evicts_oldest() {
    let clock = Arc::new(ManualClock::new());
    let store = ContextStore::new(SessionConfig::default(), clock.clone());

    for i in 1..=6 {
        store.record("+919876543210", turn(clock.as_ref(), &format!("query number {}", i), i));
        clock.advance_mins(1);
    }

    let context = store.render_context("+919876543210");
    let lines: Vec<_> = context.lines().collect();

    assert_eq!(lines.len(), 5);
    assert!(!context.contains("query number 1"));
    assert!(context.contains("query number 2"));
    assert!(context.contains("query number 6"));
}

#[test]
fn test_session_expires_after_idle_ttl() {
    let clock = Arc::new(ManualClock::new());
    let store = ContextStore::new(SessionConfig::default(), clock.clone());

    store.record("caller", turn(clock.as_ref(), "old query", 3));

    // Still fresh within the TTL
    clock.advance_mins(29);
    assert!(!store.render_context("caller").is_empty());

    // Past the 30 minute TTL: absent even before the sweeper runs
    clock.advance_mins(2);
    assert!(store.render_context("caller").is_empty());

    let removed = store.sweep(clock.now_ms());
    assert_eq!(removed, 1);
    assert_eq!(store.session_count(), 0);
}

#[test]
fn test_activity_extends_session_lifetime() {
    let clock = Arc::new(ManualClock::new());
    let store = ContextStore::new(SessionConfig::default(), clock.clone());

    store.record("caller", turn(clock.as_ref(), "first", 1));
    clock.advance_mins(20);
    store.record("caller", turn(clock.as_ref(), "second", 2));
    clock.advance_mins(20);

    // 40 minutes since the first turn, but only 20 since the last
    assert_eq!(store.sweep(clock.now_ms()), 0);
    let context = store.render_context("caller");
    assert!(context.contains("first"));
    assert!(context.contains("second"));
}

#[test]
fn test_sweep_spares_unrelated_callers() {
    let clock = Arc::new(ManualClock::new());
    let store = ContextStore::new(SessionConfig::default(), clock.clone());

    store.record("stale", turn(clock.as_ref(), "old", 0));
    clock.advance_mins(25);
    store.record("fresh", turn(clock.as_ref(), "new", 1));
    clock.advance_mins(10);

    assert_eq!(store.sweep(clock.now_ms()), 1);
    assert!(store.render_context("stale").is_empty());
    assert!(store.render_context("fresh").contains("new"));
}

#[test]
fn test_context_lines_numbered_oldest_first() {
    let clock = Arc::new(ManualClock::new());
    let store = ContextStore::new(SessionConfig::default(), clock.clone());

    store.record("caller", turn(clock.as_ref(), "1995 batch mechanical", 4));
    clock.advance_mins(3);
    store.record("caller", turn(clock.as_ref(), "who are they?", 4));

    let context = store.render_context("caller");
    let lines: Vec<_> = context.lines().collect();
    assert_eq!(lines[0], "1. \"1995 batch mechanical\" (3m ago, 4 results)");
    assert_eq!(lines[1], "2. \"who are they?\" (just now, 4 results)");
}
