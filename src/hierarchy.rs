//! Archive tree of directories and pages
//!
//! The tree lives in an arena: [`Archive`] owns every [`StorageItem`] in a
//! flat map keyed by id, and a parent link is just the parent's id. A
//! [`Directory`] keeps its children as [`ChildEntry`] values in a
//! [`SortedContainer`] under its own [`SortOrder`]; a [`Page`] keeps its
//! components in rendering order.
//!
//! Two root directories always exist, the main directory and the trash. Their
//! ids come from [`SystemDirectories`] and they can be neither moved nor
//! removed.

use crate::collections::{HashMap, HashMapExt};
use crate::component::Component;
use crate::config::SystemDirectories;
use crate::container::SortedContainer;
use crate::error::{ArchiveError, Result};
use crate::sort::{IndexMove, SortOrder, Sortable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Kind of storage item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Directory
    Directory,
    /// Page
    Page,
}

/// A directory's view of one child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Child id
    pub id: Uuid,
    /// Child name
    pub name: String,
    /// Directory or page
    pub kind: ItemKind,
    /// Child creation time
    pub creation_date: DateTime<Utc>,
}

impl ChildEntry {
    /// Entry for a new child with a fresh id stamped now
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            creation_date: Utc::now(),
        }
    }
}

impl Sortable for ChildEntry {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }
}

/// Directory: sorted children under its own criterion
#[derive(Debug, Clone)]
pub struct Directory {
    /// Directory id
    pub id: Uuid,
    /// Name
    pub name: String,
    /// Creation time
    pub creation_date: DateTime<Utc>,
    /// Parent directory; `None` for roots
    pub parent: Option<Uuid>,
    children: SortedContainer<ChildEntry, SortOrder>,
}

impl Directory {
    /// Empty directory
    pub fn new(name: impl Into<String>, parent: Option<Uuid>, sort: SortOrder) -> Self {
        Self::with_id(Uuid::new_v4(), name, Utc::now(), parent, sort)
    }

    /// Empty directory with known identity
    pub fn with_id(
        id: Uuid,
        name: impl Into<String>,
        creation_date: DateTime<Utc>,
        parent: Option<Uuid>,
        sort: SortOrder,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            creation_date,
            parent,
            children: SortedContainer::new(sort),
        }
    }

    /// Children in sorted order
    pub fn children(&self) -> &[ChildEntry] {
        self.children.as_slice()
    }

    /// Active sort criterion
    pub fn sort_order(&self) -> SortOrder {
        *self.children.criterion()
    }

    /// Child at a position
    pub fn child_at(&self, index: usize) -> Option<&ChildEntry> {
        self.children.find_by_index(index)
    }

    /// Position of a child
    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.children.position_of(id)
    }

    /// Child with the given name (case-sensitive)
    pub fn child_named(&self, name: &str) -> Option<&ChildEntry> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Page: components in rendering order
#[derive(Debug, Clone)]
pub struct Page {
    /// Page id
    pub id: Uuid,
    /// Name
    pub name: String,
    /// Creation time
    pub creation_date: DateTime<Utc>,
    /// Owning directory
    pub parent: Uuid,
    /// Page holds at most one component
    pub is_single_component_page: bool,
    components: Vec<Component>,
}

impl Page {
    /// Empty page
    pub fn new(name: impl Into<String>, parent: Uuid, is_single_component_page: bool) -> Self {
        Self::with_id(Uuid::new_v4(), name, Utc::now(), parent, is_single_component_page)
    }

    /// Empty page with known identity
    pub fn with_id(
        id: Uuid,
        name: impl Into<String>,
        creation_date: DateTime<Utc>,
        parent: Uuid,
        is_single_component_page: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            creation_date,
            parent,
            is_single_component_page,
            components: Vec::new(),
        }
    }

    /// Components in rendering order
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Components in rendering order, mutable
    pub fn components_mut(&mut self) -> std::slice::IterMut<'_, Component> {
        self.components.iter_mut()
    }

    /// Component by id
    pub fn component(&self, id: Uuid) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Component by id, mutable
    pub fn component_mut(&mut self, id: Uuid) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id == id)
    }

    /// Component with the given title
    pub fn component_titled(&self, title: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.title == title)
    }

    /// Append a component after the current last one
    ///
    /// Its rendering order is one past the current maximum.
    pub fn add_component(&mut self, mut component: Component) -> Result<usize> {
        if self.is_single_component_page && !self.components.is_empty() {
            return Err(ArchiveError::InvalidEdit(format!(
                "page '{}' holds a single component",
                self.name
            )));
        }
        component.rendering_order = self
            .components
            .iter()
            .map(|c| c.rendering_order + 1)
            .max()
            .unwrap_or(0);
        self.components.push(component);
        Ok(self.components.len() - 1)
    }

    /// Detach a component; the remaining ones are renumbered
    pub fn remove_component(&mut self, id: Uuid) -> Result<Component> {
        let index = self
            .components
            .iter()
            .position(|c| c.id == id)
            .ok_or(ArchiveError::ComponentNotFound(id))?;
        let component = self.components.remove(index);
        self.renumber();
        Ok(component)
    }

    /// Move a component and renumber everything to `0..n-1`
    pub fn change_component_order(&mut self, src: usize, dst: usize) -> Result<()> {
        let len = self.components.len();
        for index in [src, dst] {
            if index >= len {
                return Err(ArchiveError::IndexOutOfBounds { index, len });
            }
        }
        let component = self.components.remove(src);
        self.components.insert(dst, component);
        self.renumber();
        Ok(())
    }

    /// Install loaded components, ordering by rendering order
    ///
    /// Returns `true` if the stored orders had gaps or duplicates and were
    /// renumbered.
    pub fn load_components(&mut self, mut components: Vec<Component>) -> bool {
        components.sort_by_key(|c| c.rendering_order);
        let contiguous = components
            .iter()
            .enumerate()
            .all(|(i, c)| c.rendering_order == i);
        self.components = components;
        if !contiguous {
            self.renumber();
        }
        !contiguous
    }

    fn renumber(&mut self) {
        for (i, component) in self.components.iter_mut().enumerate() {
            component.rendering_order = i;
        }
    }
}

/// A node of the archive tree
#[derive(Debug, Clone)]
pub enum StorageItem {
    /// Directory node
    Directory(Directory),
    /// Page leaf
    Page(Page),
}

impl StorageItem {
    /// Item id
    pub fn id(&self) -> Uuid {
        match self {
            StorageItem::Directory(d) => d.id,
            StorageItem::Page(p) => p.id,
        }
    }

    /// Item name
    pub fn name(&self) -> &str {
        match self {
            StorageItem::Directory(d) => &d.name,
            StorageItem::Page(p) => &p.name,
        }
    }

    /// Item kind
    pub fn kind(&self) -> ItemKind {
        match self {
            StorageItem::Directory(_) => ItemKind::Directory,
            StorageItem::Page(_) => ItemKind::Page,
        }
    }

    /// Parent directory id
    pub fn parent(&self) -> Option<Uuid> {
        match self {
            StorageItem::Directory(d) => d.parent,
            StorageItem::Page(p) => Some(p.parent),
        }
    }

    /// Creation time
    pub fn creation_date(&self) -> DateTime<Utc> {
        match self {
            StorageItem::Directory(d) => d.creation_date,
            StorageItem::Page(p) => p.creation_date,
        }
    }

    fn entry(&self) -> ChildEntry {
        ChildEntry {
            id: self.id(),
            name: self.name().to_string(),
            kind: self.kind(),
            creation_date: self.creation_date(),
        }
    }

    fn set_name(&mut self, name: String) {
        match self {
            StorageItem::Directory(d) => d.name = name,
            StorageItem::Page(p) => p.name = name,
        }
    }

    fn set_parent(&mut self, parent: Uuid) {
        match self {
            StorageItem::Directory(d) => d.parent = Some(parent),
            StorageItem::Page(p) => p.parent = parent,
        }
    }
}

/// Everything a removal took out of the arena
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Removed items, descendants before ancestors
    pub items: Vec<(ItemKind, Uuid)>,
    /// Components of removed pages
    pub components: Vec<Uuid>,
}

/// Arena holding the whole tree
#[derive(Debug, Clone)]
pub struct Archive {
    items: HashMap<Uuid, StorageItem>,
    system: SystemDirectories,
    default_sort: SortOrder,
}

impl Archive {
    /// Archive with just the two system directories
    pub fn new(system: SystemDirectories, default_sort: SortOrder) -> Self {
        let mut archive = Self::empty(system, default_sort);
        for (id, name) in [
            (archive.system.main, archive.system.main_name.clone()),
            (archive.system.trash, archive.system.trash_name.clone()),
        ] {
            let root = Directory::with_id(id, name, Utc::now(), None, default_sort);
            archive.items.insert(id, StorageItem::Directory(root));
        }
        archive
    }

    /// Archive with nothing in it; items are added with [`Archive::attach`]
    pub fn empty(system: SystemDirectories, default_sort: SortOrder) -> Self {
        Self {
            items: HashMap::new(),
            system,
            default_sort,
        }
    }

    /// System directory ids
    pub fn system(&self) -> &SystemDirectories {
        &self.system
    }

    /// Criterion given to new directories
    pub fn default_sort(&self) -> SortOrder {
        self.default_sort
    }

    /// Whether `id` is a system directory
    pub fn is_system(&self, id: Uuid) -> bool {
        id == self.system.main || id == self.system.trash
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item by id
    pub fn get(&self, id: Uuid) -> Option<&StorageItem> {
        self.items.get(&id)
    }

    /// Directory by id
    pub fn directory(&self, id: Uuid) -> Result<&Directory> {
        match self.items.get(&id) {
            Some(StorageItem::Directory(d)) => Ok(d),
            Some(StorageItem::Page(_)) => Err(ArchiveError::KindMismatch {
                expected: "directory",
                actual: "page",
            }),
            None => Err(ArchiveError::ItemNotFound(id)),
        }
    }

    /// Page by id
    pub fn page(&self, id: Uuid) -> Result<&Page> {
        match self.items.get(&id) {
            Some(StorageItem::Page(p)) => Ok(p),
            Some(StorageItem::Directory(_)) => Err(ArchiveError::KindMismatch {
                expected: "page",
                actual: "directory",
            }),
            None => Err(ArchiveError::ItemNotFound(id)),
        }
    }

    /// Page by id, mutable
    pub fn page_mut(&mut self, id: Uuid) -> Result<&mut Page> {
        match self.items.get_mut(&id) {
            Some(StorageItem::Page(p)) => Ok(p),
            Some(StorageItem::Directory(_)) => Err(ArchiveError::KindMismatch {
                expected: "page",
                actual: "directory",
            }),
            None => Err(ArchiveError::ItemNotFound(id)),
        }
    }

    fn directory_mut(&mut self, id: Uuid) -> Result<&mut Directory> {
        match self.items.get_mut(&id) {
            Some(StorageItem::Directory(d)) => Ok(d),
            Some(StorageItem::Page(_)) => Err(ArchiveError::KindMismatch {
                expected: "directory",
                actual: "page",
            }),
            None => Err(ArchiveError::ItemNotFound(id)),
        }
    }

    fn parent_mut(&mut self, id: Uuid) -> Result<&mut Directory> {
        match self.items.get_mut(&id) {
            Some(StorageItem::Directory(d)) => Ok(d),
            _ => Err(ArchiveError::ParentNotFound(id)),
        }
    }

    /// Component on a page, mutable
    pub fn component_mut(&mut self, page_id: Uuid, component_id: Uuid) -> Result<&mut Component> {
        self.page_mut(page_id)?
            .component_mut(component_id)
            .ok_or(ArchiveError::ComponentNotFound(component_id))
    }

    /// Every component in the archive, mutable
    pub fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.items
            .values_mut()
            .filter_map(|item| match item {
                StorageItem::Page(p) => Some(p.components.iter_mut()),
                StorageItem::Directory(_) => None,
            })
            .flatten()
    }

    /// Every page id in the archive
    pub fn page_ids(&self) -> Vec<Uuid> {
        self.items
            .values()
            .filter(|item| item.kind() == ItemKind::Page)
            .map(StorageItem::id)
            .collect()
    }

    /// Add an item with known identity under its recorded parent
    ///
    /// Root directories (no parent) are accepted as-is. Returns the item's
    /// position in its parent, if it has one.
    pub fn attach(&mut self, item: StorageItem) -> Result<Option<usize>> {
        let index = match item.parent() {
            Some(parent) => Some(self.parent_mut(parent)?.children.insert(item.entry())),
            None => None,
        };
        self.items.insert(item.id(), item);
        Ok(index)
    }

    /// Create a directory; returns its id and position in the parent
    #[instrument(skip(self))]
    pub fn create_directory(&mut self, parent: Uuid, name: &str) -> Result<(Uuid, usize)> {
        self.parent_mut(parent)?;
        let directory = Directory::new(name, Some(parent), self.default_sort);
        let id = directory.id;
        let index = self.attach(StorageItem::Directory(directory))?.unwrap_or_default();
        debug!("Created directory {} at index {}", id, index);
        Ok((id, index))
    }

    /// Create a page; returns its id and position in the parent
    #[instrument(skip(self))]
    pub fn create_page(&mut self, parent: Uuid, name: &str, single_component: bool) -> Result<(Uuid, usize)> {
        self.parent_mut(parent)?;
        let page = Page::new(name, parent, single_component);
        let id = page.id;
        let index = self.attach(StorageItem::Page(page))?.unwrap_or_default();
        debug!("Created page {} at index {}", id, index);
        Ok((id, index))
    }

    /// Rename an item; returns its new position in the parent
    pub fn rename(&mut self, id: Uuid, name: &str) -> Result<Option<usize>> {
        let item = self.items.get_mut(&id).ok_or(ArchiveError::ItemNotFound(id))?;
        item.set_name(name.to_string());
        match item.parent() {
            Some(parent) => {
                let index = self
                    .parent_mut(parent)?
                    .children
                    .rename_by_id(id, name)
                    .ok_or_else(|| ArchiveError::internal(format!("{} missing from its parent", id)))?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Move an item under another directory; returns its new position
    #[instrument(skip(self))]
    pub fn move_item(&mut self, id: Uuid, new_parent: Uuid) -> Result<usize> {
        if self.is_system(id) {
            return Err(ArchiveError::InvalidMove("system directories cannot move".to_string()));
        }
        let item = self.items.get(&id).ok_or(ArchiveError::ItemNotFound(id))?;
        let old_parent = item.parent();
        let entry = item.entry();
        self.parent_mut(new_parent)?;
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(ArchiveError::InvalidMove(format!(
                "{} cannot move into its own subtree",
                id
            )));
        }

        if let Some(old_parent) = old_parent {
            if let Ok(dir) = self.parent_mut(old_parent) {
                dir.children.remove_by_id(id);
            }
        }
        let index = self.parent_mut(new_parent)?.children.insert(entry);
        if let Some(item) = self.items.get_mut(&id) {
            item.set_parent(new_parent);
        }
        debug!("Moved {} under {} at index {}", id, new_parent, index);
        Ok(index)
    }

    /// Move an item into the trash directory
    pub fn move_to_trash(&mut self, id: Uuid) -> Result<usize> {
        let trash = self.system.trash;
        self.move_item(id, trash)
    }

    /// Remove an item and everything below it
    ///
    /// Descendants go first (post-order), then the item detaches from its
    /// parent. The returned [`Removal`] lists them in that order.
    #[instrument(skip(self))]
    pub fn remove_item(&mut self, id: Uuid) -> Result<Removal> {
        if self.is_system(id) {
            return Err(ArchiveError::InvalidMove("system directories cannot be removed".to_string()));
        }
        let parent = self.items.get(&id).ok_or(ArchiveError::ItemNotFound(id))?.parent();

        let mut removal = Removal::default();
        self.collect_post_order(id, &mut removal);
        for (_, item_id) in &removal.items {
            self.items.remove(item_id);
        }
        if let Some(parent) = parent {
            if let Ok(dir) = self.parent_mut(parent) {
                dir.children.remove_by_id(id);
            }
        }
        info!(
            "Removed {} items and {} components under {}",
            removal.items.len(),
            removal.components.len(),
            id
        );
        Ok(removal)
    }

    fn collect_post_order(&self, id: Uuid, removal: &mut Removal) {
        match self.items.get(&id) {
            Some(StorageItem::Directory(d)) => {
                for child in d.children.iter() {
                    self.collect_post_order(child.id, removal);
                }
                removal.items.push((ItemKind::Directory, id));
            }
            Some(StorageItem::Page(p)) => {
                removal.components.extend(p.components.iter().map(|c| c.id));
                removal.items.push((ItemKind::Page, id));
            }
            None => {}
        }
    }

    /// Replace a directory's criterion; reports every child's move
    pub fn set_sort_criterion(&mut self, directory: Uuid, sort: SortOrder) -> Result<Vec<IndexMove>> {
        Ok(self.directory_mut(directory)?.children.set_criterion(sort))
    }

    /// Flip a directory's sort direction; reports every child's move
    pub fn toggle_ascending(&mut self, directory: Uuid) -> Result<Vec<IndexMove>> {
        Ok(self.directory_mut(directory)?.children.toggle_ascending())
    }

    /// Whether `ancestor` is `id` or lies on the parent chain of `id`
    pub fn is_ancestor_or_self(&self, ancestor: Uuid, id: Uuid) -> bool {
        let mut current = Some(id);
        while let Some(cursor) = current {
            if cursor == ancestor {
                return true;
            }
            current = self.items.get(&cursor).and_then(StorageItem::parent);
        }
        false
    }

    /// Slash-separated names from the root down to `id`
    pub fn path(&self, id: Uuid) -> Result<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cursor) = current {
            let item = self.items.get(&cursor).ok_or(ArchiveError::ItemNotFound(cursor))?;
            names.push(item.name().to_string());
            current = item.parent();
        }
        names.reverse();
        Ok(names.join("/"))
    }

    /// Find an item by a slash-separated path starting at a root name
    pub fn resolve_path(&self, path: &str) -> Option<Uuid> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let root_name = segments.next()?;
        let mut current = [self.system.main, self.system.trash]
            .into_iter()
            .find(|id| self.items.get(id).is_some_and(|r| r.name() == root_name))?;
        for segment in segments {
            current = self.directory(current).ok()?.child_named(segment)?.id;
        }
        Some(current)
    }
}
