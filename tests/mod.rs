//! Main test module for Folio
//!
//! This module includes all test suites:
//! - Integration tests for complete archive workflows
//! - Chaos tests for store failures and retries
//! - Property-based tests for ordering and history invariants

pub mod chaos;
pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::folio::*;

    fn archive() -> Archive {
        Archive::new(SystemDirectories::default(), SortOrder::by_name())
    }

    #[test]
    fn test_empty_container_lookups() {
        let container: SortedContainer<hierarchy::ChildEntry, SortOrder> =
            SortedContainer::new(SortOrder::by_name());
        assert!(container.find_by_index(0).is_none());
        assert!(container.is_empty());
    }

    #[test]
    fn test_unicode_names_sort_case_insensitively() {
        let mut archive = archive();
        let main = archive.system().main;
        for name in ["émile", "Zoë", "alpha", "Ärger", "beta"] {
            archive.create_page(main, name, false).unwrap();
        }
        let names: Vec<String> = archive
            .directory(main)
            .unwrap()
            .children()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names.len(), 5);
        assert_eq!(&names[..2], ["alpha", "beta"]);
    }

    #[test]
    fn test_move_into_own_subtree_is_rejected() {
        let mut archive = archive();
        let main = archive.system().main;
        let (outer, _) = archive.create_directory(main, "outer").unwrap();
        let (inner, _) = archive.create_directory(outer, "inner").unwrap();

        assert!(matches!(
            archive.move_item(outer, inner),
            Err(ArchiveError::InvalidMove(_))
        ));
        assert!(matches!(
            archive.move_item(outer, outer),
            Err(ArchiveError::InvalidMove(_))
        ));
        assert_eq!(archive.path(inner).unwrap(), "Main/outer/inner");
    }

    #[test]
    fn test_missing_parent() {
        let mut archive = archive();
        let ghost = uuid::Uuid::new_v4();
        assert!(matches!(
            archive.create_page(ghost, "p", false),
            Err(ArchiveError::ParentNotFound(id)) if id == ghost
        ));
    }

    #[test]
    fn test_single_component_page() {
        let mut page = Page::new("solo", uuid::Uuid::new_v4(), true);
        page.add_component(Component::empty("a", ComponentKind::Text)).unwrap();
        assert!(matches!(
            page.add_component(Component::empty("b", ComponentKind::Table)),
            Err(ArchiveError::InvalidEdit(_))
        ));
        assert_eq!(page.components().len(), 1);
    }

    #[test]
    fn test_erasing_text_does_not_flag_capture() {
        let mut note = Component::new("n", TextContent::new("kept"));
        note.set_text("").unwrap();
        assert_eq!(note.capture_state(), Some(CaptureState::Captured));

        let mut table = Component::new("t", TableContent::with_columns(["a"]));
        table.append_row().unwrap();
        assert_eq!(table.capture_state(), Some(CaptureState::NeedsCapture));
    }

    #[test]
    fn test_removing_all_columns_clears_rows() {
        let mut table = TableContent::with_columns(["a", "b"]);
        table.append_row();
        table.append_row();
        let edit = table.edit_columns(Vec::new()).unwrap();
        assert!(table.columns().is_empty());
        assert!(table.rows().is_empty());
        assert_eq!(edit.removed.len(), 2);
    }
}
