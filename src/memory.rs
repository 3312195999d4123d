//! In-memory storage adapter
//!
//! Implements every repository trait over a set of tables guarded by one async
//! lock. Each mutation runs through [`MemoryStore::with_transaction`], which works
//! on a copy of the tables and commits only when the closure succeeds, so the
//! exclusivity transitions and batch deletes are never observed half-applied.
//!
//! The store can be backed by a JSON snapshot file. The host application owns the
//! lifecycle: [`MemoryStore::open`] to load, [`MemoryStore::save`] to persist.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CategoryId, Component, ComponentCategory, ComponentId, ComponentVersion, PageId, PageSection,
    SectionId, StoreId, StorePage, StoreTheme, ThemeId, VersionId,
};
use crate::repository::{
    CategoryRepository, ComponentRepository, PageRepository, SectionRepository, StoreDirectory,
    ThemeRepository, VersionRepository,
};

/// All tables of the store
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub stores: BTreeSet<StoreId>,
    pub categories: BTreeMap<CategoryId, ComponentCategory>,
    pub components: BTreeMap<ComponentId, Component>,
    pub versions: BTreeMap<VersionId, ComponentVersion>,
    pub sections: BTreeMap<SectionId, PageSection>,
    pub pages: BTreeMap<PageId, StorePage>,
    pub themes: BTreeMap<ThemeId, StoreTheme>,
}

/// On-disk form of [`Tables`]
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    stores: Vec<StoreId>,
    #[serde(default)]
    categories: Vec<ComponentCategory>,
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    versions: Vec<ComponentVersion>,
    #[serde(default)]
    sections: Vec<PageSection>,
    #[serde(default)]
    pages: Vec<StorePage>,
    #[serde(default)]
    themes: Vec<StoreTheme>,
}

impl From<&Tables> for Snapshot {
    fn from(tables: &Tables) -> Self {
        Self {
            stores: tables.stores.iter().copied().collect(),
            categories: tables.categories.values().cloned().collect(),
            components: tables.components.values().cloned().collect(),
            versions: tables.versions.values().cloned().collect(),
            sections: tables.sections.values().cloned().collect(),
            pages: tables.pages.values().cloned().collect(),
            themes: tables.themes.values().cloned().collect(),
        }
    }
}

impl From<Snapshot> for Tables {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            stores: snapshot.stores.into_iter().collect(),
            categories: snapshot.categories.into_iter().map(|c| (c.id, c)).collect(),
            components: snapshot.components.into_iter().map(|c| (c.id, c)).collect(),
            versions: snapshot.versions.into_iter().map(|v| (v.id, v)).collect(),
            sections: snapshot.sections.into_iter().map(|s| (s.id, s)).collect(),
            pages: snapshot.pages.into_iter().map(|p| (p.id, p)).collect(),
            themes: snapshot.themes.into_iter().map(|t| (t.id, t)).collect(),
        }
    }
}

/// Ascending by order; creation time breaks ties between equal ranks
fn sort_siblings(mut sections: Vec<PageSection>) -> Vec<PageSection> {
    sections.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    sections
}

impl Tables {
    fn check_section_parent(&self, section: &PageSection) -> StoreResult<()> {
        if let Some(parent_id) = section.parent_section_id {
            match self.sections.get(&parent_id) {
                Some(parent) if parent.page_id == section.page_id => {}
                Some(_) => {
                    return Err(StoreError::Constraint(format!(
                        "parent section {parent_id} belongs to another page"
                    )))
                }
                None => {
                    return Err(StoreError::Constraint(format!(
                        "parent section {parent_id} does not exist"
                    )))
                }
            }
        }
        Ok(())
    }

    fn check_page(&self, page: &StorePage) -> StoreResult<()> {
        let clash = self.pages.values().any(|p| {
            p.id != page.id && p.store_id == page.store_id && p.slug == page.slug
        });
        if clash {
            return Err(StoreError::Constraint(format!(
                "slug '{}' already used in store {}",
                page.slug, page.store_id
            )));
        }
        if page.is_homepage {
            let other = self
                .pages
                .values()
                .any(|p| p.id != page.id && p.store_id == page.store_id && p.is_homepage);
            if other {
                return Err(StoreError::Constraint(format!(
                    "store {} already has a homepage",
                    page.store_id
                )));
            }
        }
        Ok(())
    }

    fn check_theme(&self, theme: &StoreTheme) -> StoreResult<()> {
        let clash = self.themes.values().any(|t| {
            t.id != theme.id && t.store_id == theme.store_id && t.name == theme.name
        });
        if clash {
            return Err(StoreError::Constraint(format!(
                "theme '{}' already exists in store {}",
                theme.name, theme.store_id
            )));
        }
        if theme.is_default {
            let other = self
                .themes
                .values()
                .any(|t| t.id != theme.id && t.store_id == theme.store_id && t.is_default);
            if other {
                return Err(StoreError::Constraint(format!(
                    "store {} already has a default theme",
                    theme.store_id
                )));
            }
        }
        Ok(())
    }
}

/// Repository adapter holding every table in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// An empty store with no backing file
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot, starting empty if the file is absent
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            Tables::from(snapshot)
        } else {
            Tables::default()
        };
        tracing::debug!(path = %path.display(), pages = tables.pages.len(), "opened snapshot");
        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path),
        })
    }

    /// Persist the current tables to the backing snapshot, if any
    pub async fn save(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = {
            let tables = self.tables.read().await;
            serde_json::to_string_pretty(&Snapshot::from(&*tables))?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        tracing::debug!(path = %path.display(), "saved snapshot");
        Ok(())
    }

    /// Make a store known to the engine
    pub async fn register_store(&self, store_id: StoreId) -> StoreResult<()> {
        self.with_transaction(|tables| {
            tables.stores.insert(store_id);
            Ok(())
        })
        .await
    }

    /// Run `work` against a copy of the tables and commit it only on success.
    ///
    /// Every call clones all tables, so a write costs O(rows held). Bulk loads
    /// should go through one transaction rather than one per row.
    pub async fn with_transaction<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Tables) -> StoreResult<T> + Send,
        T: Send,
    {
        let mut guard = self.tables.write().await;
        let mut working = guard.clone();
        let out = work(&mut working)?;
        *guard = working;
        Ok(out)
    }

    async fn read<T, F>(&self, view: F) -> T
    where
        F: FnOnce(&Tables) -> T + Send,
    {
        let guard = self.tables.read().await;
        view(&guard)
    }
}

#[async_trait]
impl StoreDirectory for MemoryStore {
    async fn store_exists(&self, store_id: StoreId) -> StoreResult<bool> {
        Ok(self.read(|t| t.stores.contains(&store_id)).await)
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn get_by_id(&self, id: CategoryId) -> StoreResult<Option<ComponentCategory>> {
        Ok(self.read(|t| t.categories.get(&id).cloned()).await)
    }

    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<ComponentCategory>> {
        Ok(self
            .read(|t| t.categories.values().find(|c| c.slug == slug).cloned())
            .await)
    }

    async fn list(&self) -> StoreResult<Vec<ComponentCategory>> {
        Ok(self.read(|t| t.categories.values().cloned().collect()).await)
    }

    async fn create(&self, category: ComponentCategory) -> StoreResult<ComponentCategory> {
        self.with_transaction(|t| {
            if t.categories.values().any(|c| c.slug == category.slug) {
                return Err(StoreError::Constraint(format!(
                    "category slug '{}' already exists",
                    category.slug
                )));
            }
            t.categories.insert(category.id, category.clone());
            Ok(category)
        })
        .await
    }
}

#[async_trait]
impl ComponentRepository for MemoryStore {
    async fn get_by_id(&self, id: ComponentId) -> StoreResult<Option<Component>> {
        Ok(self.read(|t| t.components.get(&id).cloned()).await)
    }

    async fn list(&self, category_id: Option<CategoryId>) -> StoreResult<Vec<Component>> {
        Ok(self
            .read(|t| {
                t.components
                    .values()
                    .filter(|c| category_id.map_or(true, |id| c.category_id == id))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn create(&self, component: Component) -> StoreResult<Component> {
        self.with_transaction(|t| {
            if !t.categories.contains_key(&component.category_id) {
                return Err(StoreError::Constraint(format!(
                    "category {} does not exist",
                    component.category_id
                )));
            }
            t.components.insert(component.id, component.clone());
            Ok(component)
        })
        .await
    }

    async fn update(&self, component: Component) -> StoreResult<Component> {
        self.with_transaction(|t| {
            if !t.components.contains_key(&component.id) {
                return Err(StoreError::Constraint(format!(
                    "component {} does not exist",
                    component.id
                )));
            }
            if !t.categories.contains_key(&component.category_id) {
                return Err(StoreError::Constraint(format!(
                    "category {} does not exist",
                    component.category_id
                )));
            }
            t.components.insert(component.id, component.clone());
            Ok(component)
        })
        .await
    }

    async fn delete(&self, id: ComponentId) -> StoreResult<bool> {
        self.with_transaction(|t| {
            if t.components.remove(&id).is_none() {
                return Ok(false);
            }
            let owned: HashSet<VersionId> = t
                .versions
                .values()
                .filter(|v| v.component_id == id)
                .map(|v| v.id)
                .collect();
            if t.sections.values().any(|s| owned.contains(&s.component_version_id)) {
                return Err(StoreError::Constraint(format!(
                    "component {id} has versions pinned by sections"
                )));
            }
            t.versions.retain(|vid, _| !owned.contains(vid));
            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl VersionRepository for MemoryStore {
    async fn get_by_id(&self, id: VersionId) -> StoreResult<Option<ComponentVersion>> {
        Ok(self.read(|t| t.versions.get(&id).cloned()).await)
    }

    async fn get_by_component_id_and_version(
        &self,
        component_id: ComponentId,
        version: &str,
    ) -> StoreResult<Option<ComponentVersion>> {
        Ok(self
            .read(|t| {
                t.versions
                    .values()
                    .find(|v| v.component_id == component_id && v.version == version)
                    .cloned()
            })
            .await)
    }

    async fn list_by_component(&self, component_id: ComponentId) -> StoreResult<Vec<ComponentVersion>> {
        let mut versions: Vec<ComponentVersion> = self
            .read(|t| {
                t.versions
                    .values()
                    .filter(|v| v.component_id == component_id)
                    .cloned()
                    .collect()
            })
            .await;
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(versions)
    }

    async fn create(&self, version: ComponentVersion) -> StoreResult<ComponentVersion> {
        self.with_transaction(|t| {
            if !t.components.contains_key(&version.component_id) {
                return Err(StoreError::Constraint(format!(
                    "component {} does not exist",
                    version.component_id
                )));
            }
            let taken = t
                .versions
                .values()
                .any(|v| v.component_id == version.component_id && v.version == version.version);
            if taken {
                return Err(StoreError::Constraint(format!(
                    "version {} already exists for component {}",
                    version.version, version.component_id
                )));
            }
            t.versions.insert(version.id, version.clone());
            Ok(version)
        })
        .await
    }

    async fn update(&self, version: ComponentVersion) -> StoreResult<ComponentVersion> {
        self.with_transaction(|t| {
            let Some(current) = t.versions.get(&version.id) else {
                return Err(StoreError::Constraint(format!(
                    "version {} does not exist",
                    version.id
                )));
            };
            if current.component_id != version.component_id || current.version != version.version {
                return Err(StoreError::Constraint(format!(
                    "version {} cannot change its component or version number",
                    version.id
                )));
            }
            t.versions.insert(version.id, version.clone());
            Ok(version)
        })
        .await
    }
}

#[async_trait]
impl SectionRepository for MemoryStore {
    async fn get_by_id(&self, id: SectionId) -> StoreResult<Option<PageSection>> {
        Ok(self.read(|t| t.sections.get(&id).cloned()).await)
    }

    async fn list_by_page(&self, page_id: PageId) -> StoreResult<Vec<PageSection>> {
        Ok(self
            .read(|t| {
                t.sections
                    .values()
                    .filter(|s| s.page_id == page_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn get_root_sections(&self, page_id: PageId) -> StoreResult<Vec<PageSection>> {
        Ok(self
            .read(|t| {
                let roots = t
                    .sections
                    .values()
                    .filter(|s| s.page_id == page_id && s.parent_section_id.is_none())
                    .cloned()
                    .collect();
                sort_siblings(roots)
            })
            .await)
    }

    async fn get_child_sections(&self, parent_id: SectionId) -> StoreResult<Vec<PageSection>> {
        Ok(self
            .read(|t| {
                let children = t
                    .sections
                    .values()
                    .filter(|s| s.parent_section_id == Some(parent_id))
                    .cloned()
                    .collect();
                sort_siblings(children)
            })
            .await)
    }

    async fn count_by_versions(&self, version_ids: &[VersionId]) -> StoreResult<usize> {
        Ok(self
            .read(|t| {
                t.sections
                    .values()
                    .filter(|s| version_ids.contains(&s.component_version_id))
                    .count()
            })
            .await)
    }

    async fn create(&self, section: PageSection) -> StoreResult<PageSection> {
        self.with_transaction(|t| {
            if !t.pages.contains_key(&section.page_id) {
                return Err(StoreError::Constraint(format!(
                    "page {} does not exist",
                    section.page_id
                )));
            }
            t.check_section_parent(&section)?;
            t.sections.insert(section.id, section.clone());
            Ok(section)
        })
        .await
    }

    async fn update(&self, section: PageSection) -> StoreResult<PageSection> {
        self.with_transaction(|t| {
            let Some(current) = t.sections.get(&section.id) else {
                return Err(StoreError::Constraint(format!(
                    "section {} does not exist",
                    section.id
                )));
            };
            if current.page_id != section.page_id {
                return Err(StoreError::Constraint(format!(
                    "section {} cannot move to another page",
                    section.id
                )));
            }
            t.check_section_parent(&section)?;
            t.sections.insert(section.id, section.clone());
            Ok(section)
        })
        .await
    }

    async fn update_order(&self, ranks: &[(SectionId, i32)]) -> StoreResult<()> {
        self.with_transaction(|t| {
            let now = Utc::now();
            for (id, order) in ranks {
                let section = t.sections.get_mut(id).ok_or_else(|| {
                    StoreError::Constraint(format!("section {id} does not exist"))
                })?;
                section.order = *order;
                section.updated_at = now;
            }
            Ok(())
        })
        .await
    }

    async fn delete_many(&self, ids: &[SectionId]) -> StoreResult<usize> {
        self.with_transaction(|t| {
            let batch: HashSet<SectionId> = ids.iter().copied().collect();
            let orphaned = t.sections.values().find(|s| {
                !batch.contains(&s.id)
                    && s.parent_section_id.map_or(false, |p| batch.contains(&p))
            });
            if let Some(child) = orphaned {
                return Err(StoreError::Constraint(format!(
                    "section {} would be orphaned by the delete",
                    child.id
                )));
            }
            let mut removed = 0;
            for id in ids {
                if t.sections.remove(id).is_some() {
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await
    }
}

#[async_trait]
impl PageRepository for MemoryStore {
    async fn get_by_id(&self, id: PageId) -> StoreResult<Option<StorePage>> {
        Ok(self.read(|t| t.pages.get(&id).cloned()).await)
    }

    async fn get_by_store_id_and_slug(&self, store_id: StoreId, slug: &str) -> StoreResult<Option<StorePage>> {
        Ok(self
            .read(|t| {
                t.pages
                    .values()
                    .find(|p| p.store_id == store_id && p.slug == slug)
                    .cloned()
            })
            .await)
    }

    async fn get_homepage_by_store_id(&self, store_id: StoreId) -> StoreResult<Option<StorePage>> {
        Ok(self
            .read(|t| {
                t.pages
                    .values()
                    .find(|p| p.store_id == store_id && p.is_homepage)
                    .cloned()
            })
            .await)
    }

    async fn list_by_store(&self, store_id: StoreId) -> StoreResult<Vec<StorePage>> {
        let mut pages: Vec<StorePage> = self
            .read(|t| {
                t.pages
                    .values()
                    .filter(|p| p.store_id == store_id)
                    .cloned()
                    .collect()
            })
            .await;
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(pages)
    }

    async fn create(&self, page: StorePage) -> StoreResult<StorePage> {
        self.with_transaction(|t| {
            if !t.stores.contains(&page.store_id) {
                return Err(StoreError::Constraint(format!(
                    "store {} does not exist",
                    page.store_id
                )));
            }
            t.check_page(&page)?;
            t.pages.insert(page.id, page.clone());
            Ok(page)
        })
        .await
    }

    async fn update(&self, mut page: StorePage) -> StoreResult<StorePage> {
        self.with_transaction(|t| {
            match t.pages.get(&page.id) {
                // the flag only moves through set_homepage
                Some(current) if current.store_id == page.store_id => page.is_homepage = current.is_homepage,
                Some(_) => {
                    return Err(StoreError::Constraint(format!(
                        "page {} cannot move to another store",
                        page.id
                    )))
                }
                None => {
                    return Err(StoreError::Constraint(format!(
                        "page {} does not exist",
                        page.id
                    )))
                }
            }
            t.check_page(&page)?;
            t.pages.insert(page.id, page.clone());
            Ok(page)
        })
        .await
    }

    async fn delete(&self, id: PageId) -> StoreResult<bool> {
        self.with_transaction(|t| {
            match t.pages.get(&id) {
                None => return Ok(false),
                Some(page) if page.is_homepage => {
                    return Err(StoreError::Constraint(format!(
                        "page {id} is the store homepage"
                    )))
                }
                Some(_) => {}
            }
            t.sections.retain(|_, s| s.page_id != id);
            t.pages.remove(&id);
            Ok(true)
        })
        .await
    }

    async fn set_homepage(&self, store_id: StoreId, page_id: PageId) -> StoreResult<()> {
        self.with_transaction(|t| {
            match t.pages.get(&page_id) {
                Some(page) if page.store_id == store_id => {}
                _ => {
                    return Err(StoreError::Constraint(format!(
                        "page {page_id} is not a page of store {store_id}"
                    )))
                }
            }
            let now = Utc::now();
            for page in t.pages.values_mut().filter(|p| p.store_id == store_id) {
                let flag = page.id == page_id;
                if page.is_homepage != flag {
                    page.is_homepage = flag;
                    page.updated_at = now;
                }
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ThemeRepository for MemoryStore {
    async fn get_by_id(&self, id: ThemeId) -> StoreResult<Option<StoreTheme>> {
        Ok(self.read(|t| t.themes.get(&id).cloned()).await)
    }

    async fn get_by_store_id_and_name(&self, store_id: StoreId, name: &str) -> StoreResult<Option<StoreTheme>> {
        Ok(self
            .read(|t| {
                t.themes
                    .values()
                    .find(|th| th.store_id == store_id && th.name == name)
                    .cloned()
            })
            .await)
    }

    async fn get_default_by_store_id(&self, store_id: StoreId) -> StoreResult<Option<StoreTheme>> {
        Ok(self
            .read(|t| {
                t.themes
                    .values()
                    .find(|th| th.store_id == store_id && th.is_default)
                    .cloned()
            })
            .await)
    }

    async fn list_by_store(&self, store_id: StoreId) -> StoreResult<Vec<StoreTheme>> {
        let mut themes: Vec<StoreTheme> = self
            .read(|t| {
                t.themes
                    .values()
                    .filter(|th| th.store_id == store_id)
                    .cloned()
                    .collect()
            })
            .await;
        themes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(themes)
    }

    async fn create(&self, theme: StoreTheme) -> StoreResult<StoreTheme> {
        self.with_transaction(|t| {
            if !t.stores.contains(&theme.store_id) {
                return Err(StoreError::Constraint(format!(
                    "store {} does not exist",
                    theme.store_id
                )));
            }
            t.check_theme(&theme)?;
            t.themes.insert(theme.id, theme.clone());
            Ok(theme)
        })
        .await
    }

    async fn update(&self, mut theme: StoreTheme) -> StoreResult<StoreTheme> {
        self.with_transaction(|t| {
            match t.themes.get(&theme.id) {
                // the flag only moves through set_default_theme
                Some(current) if current.store_id == theme.store_id => theme.is_default = current.is_default,
                Some(_) => {
                    return Err(StoreError::Constraint(format!(
                        "theme {} cannot move to another store",
                        theme.id
                    )))
                }
                None => {
                    return Err(StoreError::Constraint(format!(
                        "theme {} does not exist",
                        theme.id
                    )))
                }
            }
            t.check_theme(&theme)?;
            t.themes.insert(theme.id, theme.clone());
            Ok(theme)
        })
        .await
    }

    async fn delete(&self, id: ThemeId) -> StoreResult<bool> {
        self.with_transaction(|t| {
            match t.themes.get(&id) {
                None => Ok(false),
                Some(theme) if theme.is_default => Err(StoreError::Constraint(format!(
                    "theme {id} is the store default"
                ))),
                Some(_) => {
                    t.themes.remove(&id);
                    Ok(true)
                }
            }
        })
        .await
    }

    async fn set_default_theme(&self, store_id: StoreId, theme_id: ThemeId) -> StoreResult<()> {
        self.with_transaction(|t| {
            match t.themes.get(&theme_id) {
                Some(theme) if theme.store_id == store_id => {}
                _ => {
                    return Err(StoreError::Constraint(format!(
                        "theme {theme_id} is not a theme of store {store_id}"
                    )))
                }
            }
            let now = Utc::now();
            for theme in t.themes.values_mut().filter(|th| th.store_id == store_id) {
                let flag = theme.id == theme_id;
                if theme.is_default != flag {
                    theme.is_default = flag;
                    theme.updated_at = now;
                }
            }
            Ok(())
        })
        .await
    }
}
