//! Property-based testing for Folio
//!
//! Uses proptest to verify ordering and history invariants across
//! randomly generated inputs and operation sequences.

use ::folio::hierarchy::ChildEntry;
use ::folio::*;
use proptest::prelude::*;
use uuid::Uuid;

/// Names drawn from a tiny alphabet so equal keys are common
fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof!["[a-c]{1,2}", "[A-C]{1,2}"]
}

fn sort_strategy() -> impl Strategy<Value = SortOrder> {
    (prop::bool::ANY, prop::bool::ANY).prop_map(|(by_name, ascending)| SortOrder {
        key: if by_name {
            SortKey::Name
        } else {
            SortKey::CreationDate
        },
        ascending,
    })
}

fn container_of(names: &[String], sort: SortOrder) -> (SortedContainer<ChildEntry, SortOrder>, Vec<ChildEntry>) {
    let mut container = SortedContainer::new(sort);
    let entries: Vec<ChildEntry> = names
        .iter()
        .map(|n| ChildEntry::new(n.clone(), ItemKind::Page))
        .collect();
    for entry in &entries {
        container.insert(entry.clone());
    }
    (container, entries)
}

/// Rebuild the post-operation order from the pre-operation ids and the moves
fn replay(before: &[Uuid], moves: &[IndexMove]) -> Vec<Option<Uuid>> {
    let mut rebuilt = vec![None; before.len()];
    for m in moves {
        rebuilt[m.new_index] = Some(before[m.old_index]);
    }
    rebuilt
}

/// Page operation for rendering-order checks
#[derive(Debug, Clone)]
pub enum PageOperation {
    Add,
    Remove(usize),
    Reorder(usize, usize),
}

fn page_operation_strategy() -> impl Strategy<Value = PageOperation> {
    prop_oneof![
        3 => Just(PageOperation::Add),
        1 => any::<usize>().prop_map(PageOperation::Remove),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(s, d)| PageOperation::Reorder(s, d)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_insert_is_stable(names in prop::collection::vec(name_strategy(), 0..40)) {
        let sort = SortOrder::by_name();
        let (container, mut entries) = container_of(&names, sort);

        // Vec::sort_by is stable, so it is the reference ordering
        entries.sort_by(|a, b| sort.ordering(a, b));
        let expected: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        prop_assert_eq!(container.ids(), expected);
    }

    #[test]
    fn prop_toggle_moves_replay(names in prop::collection::vec(name_strategy(), 0..40)) {
        let (mut container, _) = container_of(&names, SortOrder::by_name());
        let before = container.ids();
        let moves = container.toggle_ascending();
        let after = container.ids();

        prop_assert_eq!(moves.len(), before.len());
        let rebuilt = replay(&before, &moves);
        prop_assert_eq!(rebuilt, after.into_iter().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn prop_criterion_change_moves_replay(
        names in prop::collection::vec(name_strategy(), 0..40),
        sort in sort_strategy(),
    ) {
        let (mut container, _) = container_of(&names, SortOrder::by_name());
        let before = container.ids();
        let moves = container.set_criterion(sort);
        let after = container.ids();

        let rebuilt = replay(&before, &moves);
        prop_assert_eq!(rebuilt, after.into_iter().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn prop_rename_keeps_order(
        names in prop::collection::vec(name_strategy(), 1..30),
        pick in any::<usize>(),
        new_name in name_strategy(),
    ) {
        let sort = SortOrder::by_name();
        let (mut container, entries) = container_of(&names, sort);
        let target = entries[pick % entries.len()].id;

        let index = container.rename_by_id(target, new_name.clone());
        prop_assert_eq!(index, container.position_of(target));
        let items = container.as_slice();
        for pair in items.windows(2) {
            prop_assert!(!sort.sorts_before(&pair[1], &pair[0]));
        }
    }

    #[test]
    fn prop_rendering_order_is_contiguous(
        ops in prop::collection::vec(page_operation_strategy(), 0..60)
    ) {
        let mut page = Page::new("p", Uuid::new_v4(), false);
        for op in ops {
            let len = page.components().len();
            match op {
                PageOperation::Add => {
                    page.add_component(Component::empty("c", ComponentKind::Text)).unwrap();
                }
                PageOperation::Remove(i) if len > 0 => {
                    let id = page.components()[i % len].id;
                    page.remove_component(id).unwrap();
                }
                PageOperation::Reorder(s, d) if len > 0 => {
                    page.change_component_order(s % len, d % len).unwrap();
                }
                _ => {}
            }
            let orders: Vec<usize> = page.components().iter().map(|c| c.rendering_order).collect();
            let expected: Vec<usize> = (0..page.components().len()).collect();
            prop_assert_eq!(orders, expected);
        }
    }

    #[test]
    fn prop_snapshots_are_newest_first(texts in prop::collection::vec("[a-z]{1,8}", 1..12)) {
        let mut versioned = Versioned::new(TextContent::default());
        let mut ids = Vec::new();
        for text in &texts {
            versioned.modify(|c| c.set_text(text.clone()));
            ids.push(versioned.make_snapshot("", SaveMode::Automatic).id);
            prop_assert_eq!(versioned.snapshots()[0].id, *ids.last().unwrap());
        }
        prop_assert_eq!(versioned.snapshots().len(), texts.len());
        let newest_first: Vec<Uuid> = versioned.snapshots().iter().map(|s| s.id).collect();
        ids.reverse();
        prop_assert_eq!(newest_first, ids);
    }

    #[test]
    fn prop_remove_snapshot_retargets(count in 1usize..8, pick in any::<usize>()) {
        let mut versioned = Versioned::new(TextContent::default());
        for i in 0..count {
            versioned.modify(|c| c.set_text(format!("v{}", i)));
            versioned.make_snapshot("", SaveMode::Manual);
        }
        let index = pick % count;
        let id = versioned.snapshots()[index].id;
        let removal = versioned.remove_snapshot(id).unwrap();

        prop_assert_eq!(removal.removed_index, index);
        let remaining = versioned.snapshots().len();
        match removal.next_viewed_index {
            None => prop_assert_eq!(remaining, 0),
            Some(next) => {
                prop_assert!(next < remaining);
                prop_assert_eq!(next, index.min(remaining - 1));
            }
        }
    }

    #[test]
    fn prop_revert_round_trip(x in "[a-z]{1,10}", y in "[a-z]{1,10}") {
        let mut versioned = Versioned::new(TextContent::default());
        versioned.modify(|c| c.set_text(x.clone()));
        let s1 = versioned.make_snapshot("x", SaveMode::Manual).id;
        versioned.mark_captured();
        versioned.modify(|c| c.set_text(y.clone()));

        versioned.revert_to_snapshot(s1).unwrap();
        prop_assert_eq!(&versioned.content().text, &x);
        prop_assert_eq!(versioned.capture_state(), CaptureState::NeedsCapture);
        prop_assert_eq!(&versioned.snapshot(s1).unwrap().content.text, &x);
    }
}
