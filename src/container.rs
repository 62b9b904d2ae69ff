//! Sorted container
//!
//! [`SortedContainer`] keeps a list of identified, named entries ordered under
//! a runtime-swappable [`SortCriterion`]. Inserts land at the first position
//! where the new entry sorts before the current occupant, so entries with
//! equal keys keep their arrival order. Operations that re-sort the whole list
//! report `(old_index, new_index)` pairs, matched by identifier, so a UI can
//! animate moves instead of reloading.
//!
//! ## Examples
//!
//! ```rust
//! use folio::container::SortedContainer;
//! use folio::hierarchy::{ChildEntry, ItemKind};
//! use folio::sort::SortOrder;
//!
//! let mut children = SortedContainer::new(SortOrder::by_name());
//! children.insert(ChildEntry::new("B", ItemKind::Page));
//! children.insert(ChildEntry::new("A", ItemKind::Page));
//! let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
//! assert_eq!(names, ["A", "B"]);
//! ```

use crate::sort::{IndexMove, SortCriterion, Sortable};
use tracing::{debug, trace};
use uuid::Uuid;

/// Ordered collection of [`Sortable`] entries under a pluggable criterion
#[derive(Debug, Clone)]
pub struct SortedContainer<T, C> {
    items: Vec<T>,
    criterion: C,
}

impl<T, C> SortedContainer<T, C>
where
    T: Sortable,
    C: SortCriterion<T>,
{
    /// Create an empty container
    pub fn new(criterion: C) -> Self {
        Self {
            items: Vec::new(),
            criterion,
        }
    }

    /// Build a container from arbitrary items, sorting them once (stable)
    pub fn from_items(items: Vec<T>, criterion: C) -> Self {
        let mut container = Self { items, criterion };
        container.resort();
        container
    }

    /// Insert an item at its sorted position and return that position
    pub fn insert(&mut self, item: T) -> usize {
        let criterion = &self.criterion;
        let index = self
            .items
            .partition_point(|existing| !criterion.sorts_before(&item, existing));
        trace!("Inserting {} at index {}", item.id(), index);
        self.items.insert(index, item);
        index
    }

    /// Remove an item by id; `None` means it was already gone
    pub fn remove_by_id(&mut self, id: Uuid) -> Option<T> {
        let index = self.position_of(id)?;
        Some(self.items.remove(index))
    }

    /// Rename an item and re-sort; returns the item's new position
    pub fn rename_by_id(&mut self, id: Uuid, new_name: impl Into<String>) -> Option<usize> {
        let index = self.position_of(id)?;
        self.items[index].set_name(new_name.into());
        self.resort();
        self.position_of(id)
    }

    /// Replace the criterion and re-sort, reporting every item's move
    pub fn set_criterion(&mut self, criterion: C) -> Vec<IndexMove> {
        self.criterion = criterion;
        self.resort_with_moves()
    }

    /// Flip the direction of the current criterion and re-sort
    pub fn toggle_ascending(&mut self) -> Vec<IndexMove> {
        let ascending = self.criterion.ascending();
        self.criterion.set_ascending(!ascending);
        self.resort_with_moves()
    }

    /// Active criterion
    pub fn criterion(&self) -> &C {
        &self.criterion
    }

    /// Item at a position; out of range yields `None`
    pub fn find_by_index(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Item with the given id
    pub fn find_by_id(&self, id: Uuid) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Position of the item with the given id
    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Whether an item with this id is present
    pub fn contains(&self, id: Uuid) -> bool {
        self.position_of(id).is_some()
    }

    /// Iterate in sorted order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Sorted items as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Ids in sorted order
    pub fn ids(&self) -> Vec<Uuid> {
        self.items.iter().map(Sortable::id).collect()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the container is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn resort(&mut self) {
        let criterion = &self.criterion;
        self.items.sort_by(|a, b| criterion.ordering(a, b));
    }

    fn resort_with_moves(&mut self) -> Vec<IndexMove> {
        let before = self.ids();
        self.resort();

        let moves: Vec<IndexMove> = before
            .iter()
            .enumerate()
            .filter_map(|(old_index, id)| {
                self.position_of(*id).map(|new_index| IndexMove { old_index, new_index })
            })
            .collect();

        debug!(
            "Re-sorted {} items, {} moved",
            moves.len(),
            moves.iter().filter(|m| m.is_move()).count()
        );
        moves
    }
}

impl<'a, T, C> IntoIterator for &'a SortedContainer<T, C> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
