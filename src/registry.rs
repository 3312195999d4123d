//! Component Registry
//!
//! Manages component categories, component definitions and their versioned
//! implementations. Versions are append-only: a section pins one specific version
//! and is never upgraded implicitly.

use std::sync::Arc;

use chrono::Utc;

use crate::checksum::Checksum;
use crate::config::VersionConfig;
use crate::error::{ComposerError, Result};
use crate::model::{
    CategoryId, Component, ComponentCategory, ComponentId, ComponentUpdate, ComponentVersion,
    NewCategory, NewComponent, NewVersion, VersionId,
};
use crate::outcome::DeleteOutcome;
use crate::repository::{CategoryRepository, ComponentRepository, SectionRepository, VersionRepository};
use crate::version::{self, BumpKind, SemVer};

/// The component registry
pub struct ComponentRegistry {
    categories: Arc<dyn CategoryRepository>,
    components: Arc<dyn ComponentRepository>,
    versions: Arc<dyn VersionRepository>,
    sections: Arc<dyn SectionRepository>,
    config: VersionConfig,
}

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ComposerError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl ComponentRegistry {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        components: Arc<dyn ComponentRepository>,
        versions: Arc<dyn VersionRepository>,
        sections: Arc<dyn SectionRepository>,
        config: VersionConfig,
    ) -> Self {
        Self {
            categories,
            components,
            versions,
            sections,
            config,
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(&self, input: NewCategory) -> Result<ComponentCategory> {
        required("category name", &input.name)?;
        required("category slug", &input.slug)?;

        if self.categories.get_by_slug(&input.slug).await?.is_some() {
            return Err(ComposerError::Conflict(format!(
                "category slug '{}' already exists",
                input.slug
            )));
        }

        let now = Utc::now();
        let category = self
            .categories
            .create(ComponentCategory {
                id: CategoryId::new(),
                name: input.name,
                description: input.description,
                icon: input.icon,
                slug: input.slug,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(category_id = %category.id, slug = %category.slug, "created category");
        Ok(category)
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Option<ComponentCategory>> {
        Ok(self.categories.get_by_slug(slug).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<ComponentCategory>> {
        let mut categories = self.categories.list().await?;
        categories.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(categories)
    }

    // =========================================================================
    // Components
    // =========================================================================

    pub async fn create_component(&self, input: NewComponent) -> Result<Component> {
        required("component name", &input.name)?;

        if self.categories.get_by_id(input.category_id).await?.is_none() {
            return Err(ComposerError::not_found("category", input.category_id));
        }

        let now = Utc::now();
        let component = self
            .components
            .create(Component {
                id: ComponentId::new(),
                name: input.name,
                description: input.description,
                category_id: input.category_id,
                component_type: input.component_type,
                thumbnail: input.thumbnail,
                schema: input.schema,
                default_props: input.default_props,
                restrictions: input.restrictions,
                is_global: input.is_global,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(component_id = %component.id, name = %component.name, "created component");
        Ok(component)
    }

    pub async fn get_component(&self, id: ComponentId) -> Result<Component> {
        self.components
            .get_by_id(id)
            .await?
            .ok_or_else(|| ComposerError::not_found("component", id))
    }

    pub async fn list_components(&self, category_id: Option<CategoryId>, active_only: bool) -> Result<Vec<Component>> {
        let mut components = self.components.list(category_id).await?;
        if active_only {
            components.retain(|c| c.is_active);
        }
        components.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(components)
    }

    pub async fn update_component(&self, id: ComponentId, update: ComponentUpdate) -> Result<Component> {
        let mut component = self.get_component(id).await?;

        if let Some(name) = update.name {
            required("component name", &name)?;
            component.name = name;
        }
        if let Some(category_id) = update.category_id {
            if self.categories.get_by_id(category_id).await?.is_none() {
                return Err(ComposerError::not_found("category", category_id));
            }
            component.category_id = category_id;
        }
        if let Some(description) = update.description {
            component.description = Some(description);
        }
        if let Some(component_type) = update.component_type {
            component.component_type = component_type;
        }
        if let Some(thumbnail) = update.thumbnail {
            component.thumbnail = Some(thumbnail);
        }
        if let Some(schema) = update.schema {
            component.schema = schema;
        }
        if let Some(default_props) = update.default_props {
            component.default_props = default_props;
        }
        if let Some(restrictions) = update.restrictions {
            component.restrictions = restrictions;
        }
        if let Some(is_global) = update.is_global {
            component.is_global = is_global;
        }
        component.updated_at = Utc::now();

        let component = self.components.update(component).await?;
        tracing::info!(component_id = %component.id, "updated component");
        Ok(component)
    }

    /// Soft-disable or re-enable a component. Sections already pinned to one of
    /// its versions are unaffected.
    pub async fn set_component_active(&self, id: ComponentId, active: bool) -> Result<Component> {
        let mut component = self.get_component(id).await?;
        component.is_active = active;
        component.updated_at = Utc::now();
        let component = self.components.update(component).await?;
        tracing::info!(component_id = %component.id, active, "changed component activity");
        Ok(component)
    }

    /// Hard-delete a component and its versions.
    ///
    /// Refused while any section pins one of its versions; deactivate instead.
    pub async fn delete_component(&self, id: ComponentId) -> DeleteOutcome {
        let result: Result<bool> = async {
            let version_ids: Vec<VersionId> = self
                .versions
                .list_by_component(id)
                .await?
                .into_iter()
                .map(|v| v.id)
                .collect();
            let pinned = self.sections.count_by_versions(&version_ids).await?;
            if pinned > 0 {
                return Err(ComposerError::Conflict(format!(
                    "component {id} is used by {pinned} section(s)"
                )));
            }
            Ok(self.components.delete(id).await?)
        }
        .await;

        DeleteOutcome::from_result("component", id, result)
    }

    // =========================================================================
    // Versions
    // =========================================================================

    fn normalize_version<'a>(&self, version: &'a str) -> &'a str {
        let trimmed = version.trim();
        if self.config.allow_v_prefix {
            trimmed.strip_prefix('v').unwrap_or(trimmed)
        } else {
            trimmed
        }
    }

    pub async fn create_version(&self, input: NewVersion) -> Result<ComponentVersion> {
        let version = SemVer::parse(self.normalize_version(&input.version))?.to_string();

        if self.components.get_by_id(input.component_id).await?.is_none() {
            return Err(ComposerError::not_found("component", input.component_id));
        }
        if self
            .versions
            .get_by_component_id_and_version(input.component_id, &version)
            .await?
            .is_some()
        {
            return Err(ComposerError::Conflict(format!(
                "version {version} already exists for component {}",
                input.component_id
            )));
        }

        let now = Utc::now();
        let checksum = Checksum::from_payload(&input.template, input.script.as_deref(), input.style.as_deref());
        let created = self
            .versions
            .create(ComponentVersion {
                id: VersionId::new(),
                component_id: input.component_id,
                version,
                template: input.template,
                script: input.script,
                style: input.style,
                checksum,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            component_id = %created.component_id,
            version_id = %created.id,
            version = %created.version,
            "created component version"
        );
        Ok(created)
    }

    pub async fn get_version(&self, id: VersionId) -> Result<ComponentVersion> {
        self.versions
            .get_by_id(id)
            .await?
            .ok_or_else(|| ComposerError::not_found("component version", id))
    }

    pub async fn find_version(&self, component_id: ComponentId, version: &str) -> Result<Option<ComponentVersion>> {
        let version = SemVer::parse(self.normalize_version(version))?.to_string();
        Ok(self
            .versions
            .get_by_component_id_and_version(component_id, &version)
            .await?)
    }

    /// Greatest version of a component, or `None` if it has no versions yet
    pub async fn get_latest_version(&self, component_id: ComponentId) -> Result<Option<ComponentVersion>> {
        if self.components.get_by_id(component_id).await?.is_none() {
            return Err(ComposerError::not_found("component", component_id));
        }
        let versions = self.versions.list_by_component(component_id).await?;
        Ok(version::latest_by(versions, |v| v.version.as_str()))
    }

    /// Active versions, newest-created first
    pub async fn get_active_versions(&self, component_id: ComponentId) -> Result<Vec<ComponentVersion>> {
        if self.components.get_by_id(component_id).await?.is_none() {
            return Err(ComposerError::not_found("component", component_id));
        }
        let mut versions = self.versions.list_by_component(component_id).await?;
        versions.retain(|v| v.is_active);
        Ok(versions)
    }

    pub async fn set_version_active(&self, id: VersionId, active: bool) -> Result<ComponentVersion> {
        let mut version = self.get_version(id).await?;
        version.is_active = active;
        version.updated_at = Utc::now();
        let version = self.versions.update(version).await?;
        tracing::info!(version_id = %version.id, active, "changed version activity");
        Ok(version)
    }

    /// The version number a new release of `kind` would get
    pub async fn next_version(&self, component_id: ComponentId, kind: BumpKind) -> Result<String> {
        match self.get_latest_version(component_id).await? {
            Some(latest) => version::increment(&latest.version, kind),
            None => Ok(SemVer::new(1, 0, 0).to_string()),
        }
    }

    /// Check a stored payload against the checksum taken at creation
    pub async fn verify_version(&self, id: VersionId) -> Result<bool> {
        let version = self.get_version(id).await?;
        let valid = version.verify_checksum();
        if !valid {
            tracing::warn!(version_id = %id, "component version payload does not match its checksum");
        }
        Ok(valid)
    }
}
