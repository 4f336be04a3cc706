//! Tick History Buffer
//!
//! Append-and-lookup storage mapping a simulation tick to a value. Every
//! time-dependent record that must survive rollback (cooldown targets,
//! committed damage, NPC attack timers, recorded inputs) lives in one of these.
//!
//! ## Semantics
//!
//! - Entries are appended in non-decreasing tick order. Writing the newest
//!   tick again replaces its value; writing an older tick is rejected.
//! - `lookup(t)` returns the latest entry whose tick is at or before `t`
//!   ("most recent known value").
//! - The buffer keeps a bounded window of ticks behind its newest entry. The
//!   newest entry that falls out of the window is kept as the baseline so
//!   lookups at the edge of the window stay defined.

use std::collections::VecDeque;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::tick::SimulationTick;

/// Default number of ticks kept behind the newest entry.
pub const DEFAULT_HISTORY_WINDOW: u32 = 64;

/// Rejected history writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Tick is older than the newest recorded entry.
    #[error("out-of-order history write at tick {tick} (newest is {newest})")]
    OutOfOrder {
        /// Tick of the rejected write.
        tick: SimulationTick,
        /// Newest tick already recorded.
        newest: SimulationTick,
    },

    /// Attempted to record at [`SimulationTick::INVALID`].
    #[error("history write at an invalid tick")]
    InvalidTick,
}

/// Treat a rejected history write as a programming error.
///
/// Panics in debug builds; logs and drops the write in release builds.
pub fn expect_in_order(result: Result<(), HistoryError>) {
    if let Err(err) = result {
        if cfg!(debug_assertions) {
            panic!("{err}");
        }
        warn!(%err, "history write dropped");
    }
}

/// Tick-indexed history of values for one entity field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickHistory<T> {
    entries: VecDeque<(SimulationTick, T)>,
    window: u32,
}

impl<T> Default for TickHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl<T> TickHistory<T> {
    /// Create an empty history keeping `window` ticks.
    pub fn new(window: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            window: window.max(1),
        }
    }

    /// Append `value` at `tick`.
    ///
    /// Re-recording the newest tick replaces its value, which is what a
    /// resimulated first-pass write of the same tick produces.
    pub fn record(&mut self, tick: SimulationTick, value: T) -> Result<(), HistoryError> {
        if !tick.is_valid() {
            return Err(HistoryError::InvalidTick);
        }

        if let Some((newest, slot)) = self.entries.back_mut() {
            if newest.is_newer_than(tick) {
                return Err(HistoryError::OutOfOrder { tick, newest: *newest });
            }
            if *newest == tick {
                *slot = value;
                return Ok(());
            }
        }

        self.entries.push_back((tick, value));
        self.prune(tick);
        Ok(())
    }

    /// Latest entry at or before `tick`, with the tick it was recorded at.
    pub fn lookup_entry(&self, tick: SimulationTick) -> Option<(SimulationTick, &T)> {
        if !tick.is_valid() {
            return None;
        }
        self.entries
            .iter()
            .rev()
            .find(|(entry_tick, _)| !entry_tick.is_newer_than(tick))
            .map(|(entry_tick, value)| (*entry_tick, value))
    }

    /// Latest value at or before `tick`.
    pub fn lookup(&self, tick: SimulationTick) -> Option<&T> {
        self.lookup_entry(tick).map(|(_, value)| value)
    }

    /// Latest value at or before `tick`, or `default` when none is known.
    pub fn lookup_or(&self, tick: SimulationTick, default: T) -> T
    where
        T: Clone,
    {
        self.lookup(tick).cloned().unwrap_or(default)
    }

    /// Drop entries older than `horizon - window`, keeping the newest of
    /// them as the lookup baseline.
    pub fn prune(&mut self, horizon: SimulationTick) {
        if !horizon.is_valid() {
            return;
        }
        let cutoff = horizon.subtract(self.window);
        while self.entries.len() > 1 {
            let second_is_old = self
                .entries
                .get(1)
                .is_some_and(|(tick, _)| cutoff.is_newer_than(*tick));
            if !second_is_old {
                break;
            }
            self.entries.pop_front();
        }
    }

    /// Discard entries newer than `tick`.
    ///
    /// Rewinds a history that is rewritten on every pass so a rollback can
    /// record the same ticks again.
    pub fn truncate_after(&mut self, tick: SimulationTick) {
        while self
            .entries
            .back()
            .is_some_and(|(entry_tick, _)| entry_tick.is_newer_than(tick))
        {
            self.entries.pop_back();
        }
    }

    /// Newest recorded entry.
    pub fn latest(&self) -> Option<(SimulationTick, &T)> {
        self.entries.back().map(|(tick, value)| (*tick, value))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the history empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured window in ticks.
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (SimulationTick, &T)> {
        self.entries.iter().map(|(tick, value)| (*tick, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(index: u32) -> SimulationTick {
        SimulationTick::new(index)
    }

    #[test]
    fn test_lookup_latest_at_or_before() {
        let mut history = TickHistory::new(64);
        history.record(t(10), "a").unwrap();
        history.record(t(15), "b").unwrap();

        assert_eq!(history.lookup(t(9)), None);
        assert_eq!(history.lookup(t(10)), Some(&"a"));
        assert_eq!(history.lookup(t(14)), Some(&"a"));
        assert_eq!(history.lookup(t(15)), Some(&"b"));
        assert_eq!(history.lookup(t(400)), Some(&"b"));
        assert_eq!(history.lookup_entry(t(20)), Some((t(15), &"b")));
    }

    #[test]
    fn test_lookup_or_default() {
        let history: TickHistory<u32> = TickHistory::new(8);
        assert_eq!(history.lookup_or(t(5), 7), 7);
        assert_eq!(history.lookup(SimulationTick::INVALID), None);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut history = TickHistory::new(64);
        history.record(t(20), 1).unwrap();
        let err = history.record(t(19), 2).unwrap_err();
        assert_eq!(err, HistoryError::OutOfOrder { tick: t(19), newest: t(20) });
        assert_eq!(history.len(), 1);
        assert_eq!(history.lookup(t(20)), Some(&1));
    }

    #[test]
    fn test_same_tick_replaces() {
        let mut history = TickHistory::new(64);
        history.record(t(20), 1).unwrap();
        history.record(t(20), 5).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.lookup(t(20)), Some(&5));
    }

    #[test]
    fn test_invalid_tick_rejected() {
        let mut history = TickHistory::new(64);
        assert_eq!(
            history.record(SimulationTick::INVALID, 0),
            Err(HistoryError::InvalidTick)
        );
    }

    #[test]
    fn test_prune_keeps_baseline() {
        let mut history = TickHistory::new(10);
        for i in 0..50 {
            history.record(t(i), i).unwrap();
        }
        // Window of 10 behind tick 49 is 39..=49, plus the baseline at 38.
        assert_eq!(history.len(), 12);
        assert_eq!(history.iter().next().map(|(tick, _)| tick), Some(t(38)));
        assert_eq!(history.lookup(t(39)), Some(&39));
    }

    #[test]
    fn test_sparse_entry_survives_prune() {
        let mut history = TickHistory::new(4);
        history.record(t(1001), 1100u32).unwrap();
        history.prune(t(1099));
        assert_eq!(history.lookup(t(1099)), Some(&1100));
    }

    #[test]
    fn test_truncate_after_allows_rewrite() {
        let mut history = TickHistory::new(64);
        for i in 10..=15 {
            history.record(t(i), i).unwrap();
        }
        history.truncate_after(t(12));
        assert_eq!(history.latest(), Some((t(12), &12)));
        history.record(t(13), 99).unwrap();
        assert_eq!(history.lookup(t(20)), Some(&99));
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_expect_in_order_panics_in_debug() {
        let mut history = TickHistory::new(4);
        history.record(t(5), 0).unwrap();
        expect_in_order(history.record(t(4), 0));
    }

    proptest! {
        #[test]
        fn prop_lookup_returns_latest_not_newer(
            deltas in proptest::collection::vec(0u32..5, 1..40),
            query_offset in 0u32..250,
        ) {
            let window = 1_000;
            let mut history = TickHistory::new(window);
            let mut recorded = Vec::new();
            let mut index = 100u32;
            for (value, delta) in deltas.iter().enumerate() {
                index += delta;
                history.record(t(index), value).unwrap();
                // A repeated tick overwrites the previous value.
                if recorded.last().is_some_and(|(last, _)| *last == index) {
                    recorded.pop();
                }
                recorded.push((index, value));
            }

            let query = 90 + query_offset;
            let expected = recorded
                .iter()
                .rev()
                .find(|(tick, _)| *tick <= query)
                .map(|(_, value)| *value);
            prop_assert_eq!(history.lookup(t(query)).copied(), expected);
        }
    }
}
