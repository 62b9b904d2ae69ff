//! Sort criteria for archive containers
//!
//! A sort criterion is a pure comparator: `sorts_before(a, b)` answers whether
//! `a` belongs in front of `b`. Every criterion carries an `ascending` flag;
//! flipping it reverses the comparator's sense without changing which field is
//! compared. Items that compare equal are never reordered relative to each
//! other, so inserts and re-sorts are stable.
//!
//! [`SortOrder`] is the built-in, serializable criterion used by directories.
//! Custom criteria implement [`SortCriterion`] directly and can be plugged into
//! a [`SortedContainer`](crate::container::SortedContainer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Anything a sorted container can hold
pub trait Sortable {
    /// Stable identifier used to report index moves
    fn id(&self) -> Uuid;
    /// Display name (may be the sort key)
    fn name(&self) -> &str;
    /// Rename in place; the container re-sorts afterwards
    fn set_name(&mut self, name: String);
    /// Immutable creation timestamp
    fn creation_date(&self) -> DateTime<Utc>;
}

/// Comparator strategy with a direction flag
pub trait SortCriterion<T: ?Sized> {
    /// Whether `a` sorts strictly before `b` under the current direction
    fn sorts_before(&self, a: &T, b: &T) -> bool;

    /// Current direction
    fn ascending(&self) -> bool;

    /// Change direction
    fn set_ascending(&mut self, ascending: bool);

    /// Total ordering derived from `sorts_before`; equal keys compare `Equal`
    fn ordering(&self, a: &T, b: &T) -> Ordering {
        if self.sorts_before(a, b) {
            Ordering::Less
        } else if self.sorts_before(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// Field a [`SortOrder`] compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    /// Case-insensitive name comparison
    Name,
    /// Creation timestamp comparison
    CreationDate,
}

/// Built-in criterion: a key plus a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    /// Compared field
    pub key: SortKey,
    /// Direction flag
    pub ascending: bool,
}

impl SortOrder {
    /// Name, ascending
    pub const fn by_name() -> Self {
        Self { key: SortKey::Name, ascending: true }
    }

    /// Creation date, ascending (oldest first)
    pub const fn by_creation_date() -> Self {
        Self { key: SortKey::CreationDate, ascending: true }
    }

    /// Same key, descending
    pub const fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    fn key_ordering<T: Sortable + ?Sized>(&self, a: &T, b: &T) -> Ordering {
        match self.key {
            SortKey::Name => compare_names(a.name(), b.name()),
            SortKey::CreationDate => a.creation_date().cmp(&b.creation_date()),
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::by_name()
    }
}

impl<T: Sortable + ?Sized> SortCriterion<T> for SortOrder {
    fn sorts_before(&self, a: &T, b: &T) -> bool {
        let ord = self.key_ordering(a, b);
        if self.ascending {
            ord == Ordering::Less
        } else {
            ord == Ordering::Greater
        }
    }

    fn ascending(&self) -> bool {
        self.ascending
    }

    fn set_ascending(&mut self, ascending: bool) {
        self.ascending = ascending;
    }
}

/// Case-insensitive name comparison
///
/// Names differing only in case compare equal, which keeps arrival order for
/// them. This ordering is the authority for every persisted order; stores are
/// never asked to collate names themselves.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// One element's position before and after a re-sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexMove {
    /// Position before the operation
    pub old_index: usize,
    /// Position after the operation
    pub new_index: usize,
}

impl IndexMove {
    /// Whether the element actually changed position
    pub fn is_move(&self) -> bool {
        self.old_index != self.new_index
    }
}

/// Apply index moves to a copy of the pre-operation sequence
///
/// Replaying the moves returned by a re-sort against the old order reproduces
/// the new order. Returns `None` if the moves do not form a permutation of
/// `before`.
pub fn replay_moves<T: Clone>(before: &[T], moves: &[IndexMove]) -> Option<Vec<T>> {
    if moves.len() != before.len() {
        return None;
    }
    let mut slots: Vec<Option<T>> = vec![None; before.len()];
    for mv in moves {
        let item = before.get(mv.old_index)?.clone();
        let slot = slots.get_mut(mv.new_index)?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(item);
    }
    slots.into_iter().collect()
}
