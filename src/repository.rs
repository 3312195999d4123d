//! Storage capabilities the engine depends on
//!
//! One trait per entity. Lookups return `Ok(None)` on a miss; errors are reserved
//! for genuine failures such as constraint violations or an unavailable backend.
//! Adapters must enforce the uniqueness rules documented on each `create`/`update`
//! at write time, raising [`StoreError::Constraint`](crate::error::StoreError).

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{
    CategoryId, Component, ComponentCategory, ComponentId, ComponentVersion, PageId, PageSection,
    SectionId, StoreId, StorePage, StoreTheme, ThemeId, VersionId,
};

/// Existence check for stores, which are owned outside the engine
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn store_exists(&self, store_id: StoreId) -> StoreResult<bool>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn get_by_id(&self, id: CategoryId) -> StoreResult<Option<ComponentCategory>>;
    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<ComponentCategory>>;
    async fn list(&self) -> StoreResult<Vec<ComponentCategory>>;
    /// Slug is unique
    async fn create(&self, category: ComponentCategory) -> StoreResult<ComponentCategory>;
}

#[async_trait]
pub trait ComponentRepository: Send + Sync {
    async fn get_by_id(&self, id: ComponentId) -> StoreResult<Option<Component>>;
    async fn list(&self, category_id: Option<CategoryId>) -> StoreResult<Vec<Component>>;
    async fn create(&self, component: Component) -> StoreResult<Component>;
    async fn update(&self, component: Component) -> StoreResult<Component>;
    /// Removes the component and all of its versions.
    ///
    /// Refused while any section pins one of its versions.
    async fn delete(&self, id: ComponentId) -> StoreResult<bool>;
}

#[async_trait]
pub trait VersionRepository: Send + Sync {
    async fn get_by_id(&self, id: VersionId) -> StoreResult<Option<ComponentVersion>>;
    async fn get_by_component_id_and_version(
        &self,
        component_id: ComponentId,
        version: &str,
    ) -> StoreResult<Option<ComponentVersion>>;
    /// Newest-created first
    async fn list_by_component(&self, component_id: ComponentId) -> StoreResult<Vec<ComponentVersion>>;
    /// `(component_id, version)` is unique
    async fn create(&self, version: ComponentVersion) -> StoreResult<ComponentVersion>;
    async fn update(&self, version: ComponentVersion) -> StoreResult<ComponentVersion>;
}

#[async_trait]
pub trait SectionRepository: Send + Sync {
    async fn get_by_id(&self, id: SectionId) -> StoreResult<Option<PageSection>>;
    /// Every section of a page, in no particular order
    async fn list_by_page(&self, page_id: PageId) -> StoreResult<Vec<PageSection>>;
    /// Sections without a parent, ascending by order
    async fn get_root_sections(&self, page_id: PageId) -> StoreResult<Vec<PageSection>>;
    /// Direct children only, ascending by order
    async fn get_child_sections(&self, parent_id: SectionId) -> StoreResult<Vec<PageSection>>;
    /// Number of sections pinned to any of the given versions
    async fn count_by_versions(&self, version_ids: &[VersionId]) -> StoreResult<usize>;
    /// A non-root section's parent must exist on the same page
    async fn create(&self, section: PageSection) -> StoreResult<PageSection>;
    async fn update(&self, section: PageSection) -> StoreResult<PageSection>;
    /// Rewrites ranks as one atomic unit
    async fn update_order(&self, ranks: &[(SectionId, i32)]) -> StoreResult<()>;
    /// Deletes a batch atomically.
    ///
    /// Fails closed if a section outside the batch still names a member as parent.
    async fn delete_many(&self, ids: &[SectionId]) -> StoreResult<usize>;
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn get_by_id(&self, id: PageId) -> StoreResult<Option<StorePage>>;
    async fn get_by_store_id_and_slug(&self, store_id: StoreId, slug: &str) -> StoreResult<Option<StorePage>>;
    async fn get_homepage_by_store_id(&self, store_id: StoreId) -> StoreResult<Option<StorePage>>;
    async fn list_by_store(&self, store_id: StoreId) -> StoreResult<Vec<StorePage>>;
    /// Slug unique per store; at most one homepage per store
    async fn create(&self, page: StorePage) -> StoreResult<StorePage>;
    /// Keeps the stored `is_homepage`; only `set_homepage` moves it
    async fn update(&self, page: StorePage) -> StoreResult<StorePage>;
    /// Removes the page together with its sections. Refused for the homepage.
    async fn delete(&self, id: PageId) -> StoreResult<bool>;
    /// Clears the flag on every page of the store and sets it on one, atomically
    async fn set_homepage(&self, store_id: StoreId, page_id: PageId) -> StoreResult<()>;
}

#[async_trait]
pub trait ThemeRepository: Send + Sync {
    async fn get_by_id(&self, id: ThemeId) -> StoreResult<Option<StoreTheme>>;
    async fn get_by_store_id_and_name(&self, store_id: StoreId, name: &str) -> StoreResult<Option<StoreTheme>>;
    async fn get_default_by_store_id(&self, store_id: StoreId) -> StoreResult<Option<StoreTheme>>;
    async fn list_by_store(&self, store_id: StoreId) -> StoreResult<Vec<StoreTheme>>;
    /// Name unique per store
    async fn create(&self, theme: StoreTheme) -> StoreResult<StoreTheme>;
    /// Keeps the stored `is_default`; only `set_default_theme` moves it
    async fn update(&self, theme: StoreTheme) -> StoreResult<StoreTheme>;
    /// Refused while the theme is the store default
    async fn delete(&self, id: ThemeId) -> StoreResult<bool>;
    /// Clears the flag on every theme of the store and sets it on one, atomically
    async fn set_default_theme(&self, store_id: StoreId, theme_id: ThemeId) -> StoreResult<()>;
}

/// Every capability the engine needs from one backend
pub trait Storage:
    StoreDirectory
    + CategoryRepository
    + ComponentRepository
    + VersionRepository
    + SectionRepository
    + PageRepository
    + ThemeRepository
{
}

impl<T> Storage for T where
    T: StoreDirectory
        + CategoryRepository
        + ComponentRepository
        + VersionRepository
        + SectionRepository
        + PageRepository
        + ThemeRepository
{
}
