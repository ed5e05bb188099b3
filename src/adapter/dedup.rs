//! Unique-key filter for cursor traversals
//!
//! Some backends invoke the success channel more than once for the same
//! key while walking a non-multi-entry index in a unique direction. The
//! filter remembers the keys it has forwarded during one traversal and
//! advances past repeats without bothering the caller.
//!
//! Keys compare structurally: two array keys are the same key when their
//! elements are pairwise equal.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use crate::handle::{CursorPosition, Key};

/// What the filter did with one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stepped {
    /// The caller's step ran and returned this flow
    Forwarded(ControlFlow<()>),
    /// The key was already visited; the cursor was continued instead
    Skipped,
}

/// Per-traversal state of the unique-key filter
#[derive(Debug, Default)]
pub struct UniqueIndexDeduplicator {
    seen: BTreeSet<Key>,
}

impl UniqueIndexDeduplicator {
    /// Fresh filter with no keys seen
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether positions like this one are subject to filtering
    pub fn applies_to<C: CursorPosition>(position: &C) -> bool {
        position.direction().is_unique() && !position.source_is_multi_entry()
    }

    /// Run `step` for `position` unless its key was already visited.
    ///
    /// Repeats are continued on the caller's behalf; a failing continuation
    /// is returned as the error.
    pub fn step<C, F>(&mut self, position: &C, step: &mut F) -> Result<Stepped, C::Error>
    where
        C: CursorPosition,
        F: FnMut(&C) -> ControlFlow<()>,
    {
        if !Self::applies_to(position) {
            return Ok(Stepped::Forwarded(step(position)));
        }

        if self.seen.insert(position.key().clone()) {
            return Ok(Stepped::Forwarded(step(position)));
        }

        position.continue_()?;
        Ok(Stepped::Skipped)
    }

    /// Number of distinct keys forwarded so far
    #[cfg(test)]
    pub(crate) fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::ScriptedCursor;
    use crate::handle::CursorDirection;

    fn keys(names: &[&str]) -> Vec<Key> {
        names.iter().map(|n| Key::from(*n)).collect()
    }

    /// Drive a script through the filter, continuing on every forwarded step.
    fn run(cursor: &ScriptedCursor) -> (Vec<Key>, usize) {
        let mut filter = UniqueIndexDeduplicator::new();
        let mut forwarded = Vec::new();
        let mut skipped = 0;

        let mut position = cursor.first();
        while let Some(current) = position {
            let mut step = |p: &crate::adapter::testing::FakePosition| {
                forwarded.push(p.key().clone());
                p.continue_().unwrap();
                ControlFlow::Continue(())
            };
            if filter.step(&current, &mut step).unwrap() == Stepped::Skipped {
                skipped += 1;
            }
            position = cursor.following(&current);
        }

        (forwarded, skipped)
    }

    #[test]
    fn test_repeated_keys_forwarded_once() {
        let cursor = ScriptedCursor::new(
            keys(&["k1", "k1", "k2", "k1"]),
            CursorDirection::NextUnique,
            false,
        );

        let (forwarded, skipped) = run(&cursor);

        assert_eq!(forwarded, keys(&["k1", "k2"]));
        assert_eq!(skipped, 2);
        // every raw entry was still advanced past
        assert_eq!(cursor.continues(), 4);
    }

    #[test]
    fn test_reverse_unique_is_filtered() {
        let cursor = ScriptedCursor::new(
            keys(&["k2", "k2", "k1"]),
            CursorDirection::PrevUnique,
            false,
        );

        let (forwarded, skipped) = run(&cursor);
        assert_eq!(forwarded, keys(&["k2", "k1"]));
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_non_unique_direction_passes_through() {
        let cursor = ScriptedCursor::new(keys(&["k1", "k1", "k2"]), CursorDirection::Next, false);

        let (forwarded, skipped) = run(&cursor);
        assert_eq!(forwarded, keys(&["k1", "k1", "k2"]));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_multi_entry_source_passes_through() {
        let cursor =
            ScriptedCursor::new(keys(&["k1", "k1", "k2"]), CursorDirection::NextUnique, true);

        let (forwarded, skipped) = run(&cursor);
        assert_eq!(forwarded, keys(&["k1", "k1", "k2"]));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_composite_keys_compare_structurally() {
        let composite = |a: &str, b: i32| Key::from(vec![Key::from(a), Key::from(b)]);
        let cursor = ScriptedCursor::new(
            vec![composite("Fred", 1), composite("Fred", 1), composite("Fred", 2)],
            CursorDirection::NextUnique,
            false,
        );

        let (forwarded, skipped) = run(&cursor);
        assert_eq!(forwarded, vec![composite("Fred", 1), composite("Fred", 2)]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_failed_continuation_is_returned() {
        let cursor = ScriptedCursor::new(keys(&["k1", "k1"]), CursorDirection::NextUnique, false);
        let mut filter = UniqueIndexDeduplicator::new();
        let mut step = |_: &crate::adapter::testing::FakePosition| ControlFlow::Continue(());

        let first = cursor.first().unwrap();
        filter.step(&first, &mut step).unwrap();

        let repeat = cursor.position_at(1);
        repeat.continue_().unwrap();
        // the position was already continued, so the filter's attempt fails
        assert!(filter.step(&repeat, &mut step).is_err());
        assert_eq!(filter.seen_count(), 1);
    }
}
