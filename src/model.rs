//! Entity types for the composition engine
//!
//! Registry entities (categories, components, versions) are tenant-agnostic.
//! Pages, sections and themes belong to a store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::checksum::Checksum;
use crate::error::ComposerError;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new time-ordered identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

entity_id!(
    /// A tenant store. Stores themselves live outside the engine.
    StoreId
);
entity_id!(CategoryId);
entity_id!(ComponentId);
entity_id!(VersionId);
entity_id!(SectionId);
entity_id!(PageId);
entity_id!(ThemeId);

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Groups components in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentCategory {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    /// Unique across the registry
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of building block a component is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    #[default]
    Basic,
    Layout,
    Container,
    Data,
    Interactive,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Basic => "basic",
            ComponentType::Layout => "layout",
            ComponentType::Container => "container",
            ComponentType::Data => "data",
            ComponentType::Interactive => "interactive",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(ComponentType::Basic),
            "layout" => Ok(ComponentType::Layout),
            "container" => Ok(ComponentType::Container),
            "data" => Ok(ComponentType::Data),
            "interactive" => Ok(ComponentType::Interactive),
            other => Err(ComposerError::Validation(format!(
                "unknown component type '{other}'"
            ))),
        }
    }
}

/// A reusable UI building block definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: CategoryId,
    pub component_type: ComponentType,
    pub thumbnail: Option<String>,
    /// JSON Schema for the configurable props
    pub schema: Value,
    pub default_props: Value,
    pub restrictions: Value,
    /// Usable across all themes
    pub is_global: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A semantically versioned implementation of a component.
///
/// The payload is opaque to the engine. `(component_id, version)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentVersion {
    pub id: VersionId,
    pub component_id: ComponentId,
    pub version: String,
    pub template: String,
    pub script: Option<String>,
    pub style: Option<String>,
    /// Computed over template, script and style at creation
    pub checksum: Checksum,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComponentVersion {
    pub fn verify_checksum(&self) -> bool {
        self.checksum
            .verify_payload(&self.template, self.script.as_deref(), self.style.as_deref())
    }
}

/// A placed instance of a component version on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSection {
    pub id: SectionId,
    pub page_id: PageId,
    pub component_version_id: VersionId,
    pub name: String,
    /// Overrides merged over the component's default props
    pub props: Value,
    /// Rank among siblings
    pub order: i32,
    /// `None` for a root section of the page
    pub parent_section_id: Option<SectionId>,
    pub container_settings: Value,
    pub style_overrides: Value,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PageSection {
    pub fn is_root(&self) -> bool {
        self.parent_section_id.is_none()
    }
}

/// A page of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePage {
    pub id: PageId,
    pub store_id: StoreId,
    pub title: String,
    /// Unique per store
    pub slug: String,
    pub content: Value,
    pub seo: Value,
    pub is_homepage: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named visual configuration of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreTheme {
    pub id: ThemeId,
    pub store_id: StoreId,
    /// Unique per store
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    /// Color and typography tokens
    pub variables: Value,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComponent {
    pub name: String,
    pub description: Option<String>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub component_type: ComponentType,
    pub thumbnail: Option<String>,
    #[serde(default = "empty_object")]
    pub schema: Value,
    #[serde(default = "empty_object")]
    pub default_props: Value,
    #[serde(default = "empty_object")]
    pub restrictions: Value,
    #[serde(default)]
    pub is_global: bool,
}

impl NewComponent {
    pub fn new(name: impl Into<String>, category_id: CategoryId) -> Self {
        Self {
            name: name.into(),
            description: None,
            category_id,
            component_type: ComponentType::default(),
            thumbnail: None,
            schema: empty_object(),
            default_props: empty_object(),
            restrictions: empty_object(),
            is_global: false,
        }
    }
}

/// Partial update of a component; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub component_type: Option<ComponentType>,
    pub thumbnail: Option<String>,
    pub schema: Option<Value>,
    pub default_props: Option<Value>,
    pub restrictions: Option<Value>,
    pub is_global: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersion {
    pub component_id: ComponentId,
    pub version: String,
    pub template: String,
    pub script: Option<String>,
    pub style: Option<String>,
}

impl NewVersion {
    pub fn new(component_id: ComponentId, version: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            component_id,
            version: version.into(),
            template: template.into(),
            script: None,
            style: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSection {
    pub page_id: PageId,
    pub component_version_id: VersionId,
    pub name: String,
    #[serde(default = "empty_object")]
    pub props: Value,
    #[serde(default)]
    pub order: i32,
    pub parent_section_id: Option<SectionId>,
    #[serde(default = "empty_object")]
    pub container_settings: Value,
    #[serde(default = "empty_object")]
    pub style_overrides: Value,
}

impl NewSection {
    pub fn new(page_id: PageId, component_version_id: VersionId, name: impl Into<String>) -> Self {
        Self {
            page_id,
            component_version_id,
            name: name.into(),
            props: empty_object(),
            order: 0,
            parent_section_id: None,
            container_settings: empty_object(),
            style_overrides: empty_object(),
        }
    }

    pub fn under(mut self, parent: SectionId) -> Self {
        self.parent_section_id = Some(parent);
        self
    }

    pub fn at(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }
}

/// Partial update of a section.
///
/// `parent_section_id: Some(None)` demotes the section to a root.
#[derive(Debug, Clone, Default)]
pub struct SectionUpdate {
    pub component_version_id: Option<VersionId>,
    pub name: Option<String>,
    pub props: Option<Value>,
    pub order: Option<i32>,
    pub parent_section_id: Option<Option<SectionId>>,
    pub container_settings: Option<Value>,
    pub style_overrides: Option<Value>,
    pub is_visible: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPage {
    pub store_id: StoreId,
    pub title: String,
    pub slug: String,
    #[serde(default = "empty_object")]
    pub content: Value,
    pub seo: Option<Value>,
    pub is_homepage: Option<bool>,
    pub is_published: Option<bool>,
}

impl NewPage {
    pub fn new(store_id: StoreId, title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            store_id,
            title: title.into(),
            slug: slug.into(),
            content: empty_object(),
            seo: None,
            is_homepage: None,
            is_published: None,
        }
    }

    pub fn homepage(mut self) -> Self {
        self.is_homepage = Some(true);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<Value>,
    pub seo: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTheme {
    pub store_id: StoreId,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "empty_object")]
    pub variables: Value,
    #[serde(default = "empty_object")]
    pub settings: Value,
}

impl NewTheme {
    pub fn new(store_id: StoreId, name: impl Into<String>) -> Self {
        Self {
            store_id,
            name: name.into(),
            description: None,
            is_default: false,
            variables: empty_object(),
            settings: empty_object(),
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(true)` runs the default-exclusivity transition. The current default
    /// cannot be cleared with `Some(false)`.
    pub is_default: Option<bool>,
    pub variables: Option<Value>,
    pub settings: Option<Value>,
}
