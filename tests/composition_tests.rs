//! End-to-end tests for page composition
//!
//! Every test runs the use-cases against a fresh in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use page_composer::repository::{PageRepository, SectionRepository};
use page_composer::{
    Component, ComponentVersion, Composer, ComposerConfig, ComposerError, MemoryStore, NewCategory,
    NewComponent, NewPage, NewSection, NewTheme, NewVersion, PageId, PagePublisher, PageSection,
    PageUpdate, ReorderPolicy, SectionId, SectionUpdate, StoreId, StorePage, StoreResult, ThemeUpdate,
};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Fixture {
    store: Arc<MemoryStore>,
    composer: Composer,
    store_id: StoreId,
}

async fn fixture_with(config: ComposerConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let store_id = StoreId::new();
    store.register_store(store_id).await.unwrap();
    let composer = Composer::new(store.clone(), &config);
    Fixture {
        store,
        composer,
        store_id,
    }
}

async fn fixture() -> Fixture {
    fixture_with(ComposerConfig::default()).await
}

impl Fixture {
    async fn component(&self, name: &str) -> Component {
        let slug = name.to_lowercase().replace(' ', "-");
        let category = self
            .composer
            .registry
            .create_category(NewCategory {
                name: name.to_string(),
                slug,
                ..Default::default()
            })
            .await
            .unwrap();
        self.composer
            .registry
            .create_component(NewComponent::new(name, category.id))
            .await
            .unwrap()
    }

    async fn version(&self, component: &Component, version: &str) -> ComponentVersion {
        self.composer
            .registry
            .create_version(NewVersion::new(component.id, version, "<section/>"))
            .await
            .unwrap()
    }

    async fn page(&self, slug: &str) -> StorePage {
        self.composer
            .pages
            .create_page(NewPage::new(self.store_id, slug, slug))
            .await
            .unwrap()
    }

    async fn section(&self, page: PageId, version: &ComponentVersion, name: &str, parent: Option<SectionId>) -> PageSection {
        let mut input = NewSection::new(page, version.id, name);
        input.parent_section_id = parent;
        self.composer.sections.create_section(input).await.unwrap()
    }

    async fn order_of(&self, id: SectionId) -> i32 {
        self.composer.sections.get_section(id).await.unwrap().order
    }
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn test_duplicate_category_slug_conflicts() {
    let fx = fixture().await;
    let input = NewCategory {
        name: "Hero".into(),
        slug: "hero".into(),
        ..Default::default()
    };
    fx.composer.registry.create_category(input.clone()).await.unwrap();
    let err = fx.composer.registry.create_category(input).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_component_requires_category() {
    let fx = fixture().await;
    let err = fx
        .composer
        .registry
        .create_component(NewComponent::new("Orphan", page_composer::CategoryId::new()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_duplicate_version_conflicts() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    fx.version(&hero, "1.0.0").await;

    let err = fx
        .composer
        .registry
        .create_version(NewVersion::new(hero.id, "1.0.0", "<other/>"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_version_for_missing_component_is_not_found() {
    let fx = fixture().await;
    let err = fx
        .composer
        .registry
        .create_version(NewVersion::new(page_composer::ComponentId::new(), "1.0.0", "<x/>"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_malformed_version_is_rejected() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    for bad in ["1.0", "1.0.0.0", "v1.0.0", "x.y.z"] {
        let err = fx
            .composer
            .registry
            .create_version(NewVersion::new(hero.id, bad, "<x/>"))
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{bad}: {err}");
    }
}

#[tokio::test]
async fn test_v_prefix_allowed_by_config() {
    let mut config = ComposerConfig::default();
    config.versions.allow_v_prefix = true;
    let fx = fixture_with(config).await;
    let hero = fx.component("Hero").await;

    let created = fx.version(&hero, "v2.1.0").await;
    assert_eq!(created.version, "2.1.0");
}

#[tokio::test]
async fn test_latest_is_numeric_not_lexicographic() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    assert!(fx.composer.registry.get_latest_version(hero.id).await.unwrap().is_none());

    for v in ["1.9.0", "1.10.0", "1.2.0"] {
        fx.version(&hero, v).await;
    }
    let latest = fx.composer.registry.get_latest_version(hero.id).await.unwrap().unwrap();
    assert_eq!(latest.version, "1.10.0");

    let missing = fx
        .composer
        .registry
        .get_latest_version(page_composer::ComponentId::new())
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn test_active_versions_newest_first() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v1 = fx.version(&hero, "1.0.0").await;
    let v2 = fx.version(&hero, "1.1.0").await;
    let v3 = fx.version(&hero, "2.0.0").await;
    fx.composer.registry.set_version_active(v2.id, false).await.unwrap();

    let active: Vec<_> = fx
        .composer
        .registry
        .get_active_versions(hero.id)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(active, vec![v3.id, v1.id]);
}

#[tokio::test]
async fn test_next_version() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let registry = &fx.composer.registry;
    assert_eq!(registry.next_version(hero.id, "minor".into()).await.unwrap(), "1.0.0");

    fx.version(&hero, "1.4.2").await;
    assert_eq!(registry.next_version(hero.id, "minor".into()).await.unwrap(), "1.5.0");
    assert_eq!(registry.next_version(hero.id, "major".into()).await.unwrap(), "2.0.0");
}

#[tokio::test]
async fn test_version_checksum_verifies() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    assert!(fx.composer.registry.verify_version(v.id).await.unwrap());
}

#[tokio::test]
async fn test_referenced_component_cannot_be_hard_deleted() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let section = fx.section(page.id, &v, "hero", None).await;

    let outcome = fx.composer.registry.delete_component(hero.id).await;
    assert!(!outcome.is_deleted());
    assert!(outcome.error().is_some_and(ComposerError::is_conflict));

    // Soft deactivation is always allowed and leaves the section alone.
    let disabled = fx.composer.registry.set_component_active(hero.id, false).await.unwrap();
    assert!(!disabled.is_active);
    let still = fx.composer.sections.get_section(section.id).await.unwrap();
    assert_eq!(still.component_version_id, v.id);

    assert!(fx.composer.sections.delete_section(section.id).await.is_deleted());
    assert!(fx.composer.registry.delete_component(hero.id).await.is_deleted());
    assert!(fx.composer.registry.get_version(v.id).await.unwrap_err().is_not_found());
}

// =============================================================================
// Sections
// =============================================================================

#[tokio::test]
async fn test_section_requires_page_and_version() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;

    let err = fx
        .composer
        .sections
        .create_section(NewSection::new(PageId::new(), v.id, "x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = fx
        .composer
        .sections
        .create_section(NewSection::new(page.id, page_composer::VersionId::new(), "x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = fx
        .composer
        .sections
        .create_section(NewSection::new(page.id, v.id, "x").under(SectionId::new()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_cross_page_parent_is_hierarchy_violation() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let home = fx.page("/").await;
    let about = fx.page("about").await;
    let parent = fx.section(home.id, &v, "container", None).await;

    let err = fx
        .composer
        .sections
        .create_section(NewSection::new(about.id, v.id, "child").under(parent.id))
        .await
        .unwrap_err();
    assert!(err.is_hierarchy_violation(), "{err}");

    // Re-parenting across pages is refused the same way.
    let other = fx.section(about.id, &v, "other", None).await;
    let err = fx
        .composer
        .sections
        .update_section(
            other.id,
            SectionUpdate {
                parent_section_id: Some(Some(parent.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_hierarchy_violation());
}

#[tokio::test]
async fn test_update_cannot_create_cycle() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let a = fx.section(page.id, &v, "a", None).await;
    let b = fx.section(page.id, &v, "b", Some(a.id)).await;
    let c = fx.section(page.id, &v, "c", Some(b.id)).await;

    for parent in [a.id, c.id] {
        let err = fx
            .composer
            .sections
            .update_section(
                a.id,
                SectionUpdate {
                    parent_section_id: Some(Some(parent)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_hierarchy_violation());
    }
}

#[tokio::test]
async fn test_clearing_parent_demotes_to_root() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let a = fx.section(page.id, &v, "a", None).await;
    let b = fx.section(page.id, &v, "b", Some(a.id)).await;

    let moved = fx
        .composer
        .sections
        .update_section(
            b.id,
            SectionUpdate {
                parent_section_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(moved.is_root());
    let roots = fx.composer.sections.get_root_sections(page.id).await.unwrap();
    assert_eq!(roots.len(), 2);
}

#[tokio::test]
async fn test_delete_removes_entire_subtree() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;

    let root = fx.section(page.id, &v, "root", None).await;
    let left = fx.section(page.id, &v, "left", Some(root.id)).await;
    let right = fx.section(page.id, &v, "right", Some(root.id)).await;
    let deep = fx.section(page.id, &v, "deep", Some(left.id)).await;
    fx.section(page.id, &v, "deeper", Some(deep.id)).await;
    let survivor = fx.section(page.id, &v, "survivor", None).await;

    let outcome = fx.composer.sections.delete_section(root.id).await;
    assert!(outcome.is_deleted());
    assert_eq!(outcome.removed(), 5);

    let remaining = fx.store.list_by_page(page.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, survivor.id);
    for id in [root.id, left.id, right.id, deep.id] {
        assert!(remaining.iter().all(|s| s.parent_section_id != Some(id)));
    }

    // Deleting again is a no-op reported as failure.
    let again = fx.composer.sections.delete_section(root.id).await;
    assert!(!again.is_deleted());
    assert!(again.error().is_none());
}

#[tokio::test]
async fn test_batch_delete_fails_closed_on_late_child() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let root = fx.section(page.id, &v, "root", None).await;
    let child = fx.section(page.id, &v, "child", Some(root.id)).await;

    // A worklist that misses a child must not leave it orphaned.
    let err = fx.store.delete_many(&[root.id]).await.unwrap_err();
    assert!(matches!(err, page_composer::StoreError::Constraint(_)));
    assert!(fx.composer.sections.get_section(child.id).await.is_ok());
    assert!(fx.composer.sections.get_section(root.id).await.is_ok());
}

#[tokio::test]
async fn test_reorder_assigns_list_positions() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let s1 = fx.section(page.id, &v, "s1", None).await;
    let s2 = fx.section(page.id, &v, "s2", None).await;
    let s3 = fx.section(page.id, &v, "s3", None).await;

    let ordered = fx
        .composer
        .sections
        .reorder(page.id, &[s3.id, s1.id, s2.id])
        .await
        .unwrap();
    assert_eq!(
        ordered.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![s3.id, s1.id, s2.id]
    );
    assert_eq!(fx.order_of(s3.id).await, 0);
    assert_eq!(fx.order_of(s1.id).await, 1);
    assert_eq!(fx.order_of(s2.id).await, 2);

    // Re-applying the same list changes nothing.
    fx.composer.sections.reorder(page.id, &[s3.id, s1.id, s2.id]).await.unwrap();
    assert_eq!(fx.order_of(s3.id).await, 0);
    assert_eq!(fx.order_of(s2.id).await, 2);
}

#[tokio::test]
async fn test_partial_reorder_renumbers_omitted_siblings() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let mut ids = Vec::new();
    for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
        let s = fx
            .composer
            .sections
            .create_section(NewSection::new(page.id, v.id, *name).at(i as i32))
            .await
            .unwrap();
        ids.push(s.id);
    }

    let ordered = fx.composer.sections.reorder(page.id, &[ids[3], ids[1]]).await.unwrap();
    let ranks: Vec<(SectionId, i32)> = ordered.iter().map(|s| (s.id, s.order)).collect();
    assert_eq!(ranks, vec![(ids[3], 0), (ids[1], 1), (ids[0], 2), (ids[2], 3)]);
}

#[tokio::test]
async fn test_strict_reorder_requires_full_sibling_set() {
    let mut config = ComposerConfig::default();
    config.sections.reorder_policy = ReorderPolicy::Strict;
    let fx = fixture_with(config).await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let a = fx.section(page.id, &v, "a", None).await;
    let b = fx.section(page.id, &v, "b", None).await;

    let err = fx.composer.sections.reorder(page.id, &[b.id]).await.unwrap_err();
    assert!(err.is_validation());
    fx.composer.sections.reorder(page.id, &[b.id, a.id]).await.unwrap();
    assert_eq!(fx.order_of(b.id).await, 0);
}

#[tokio::test]
async fn test_reorder_rejects_non_siblings() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let root = fx.section(page.id, &v, "root", None).await;
    let child = fx.section(page.id, &v, "child", Some(root.id)).await;

    let err = fx.composer.sections.reorder(page.id, &[root.id, child.id]).await.unwrap_err();
    assert!(err.is_validation());

    let err = fx.composer.sections.reorder(page.id, &[root.id, root.id]).await.unwrap_err();
    assert!(err.is_validation());

    let other = fx.page("other").await;
    let err = fx.composer.sections.reorder(other.id, &[root.id]).await.unwrap_err();
    assert!(err.is_hierarchy_violation());
}

#[tokio::test]
async fn test_page_tree_and_visibility() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let header = fx.section(page.id, &v, "header", None).await;
    let body = fx.section(page.id, &v, "body", None).await;
    fx.composer
        .sections
        .reorder(page.id, &[header.id, body.id])
        .await
        .unwrap();
    let col = fx.section(page.id, &v, "column", Some(body.id)).await;
    fx.section(page.id, &v, "card", Some(col.id)).await;

    let tree = fx.composer.sections.get_page_tree(page.id, false).await.unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].section.id, header.id);
    assert_eq!(tree[1].size(), 3);
    assert_eq!(tree[1].children[0].children[0].section.name, "card");

    fx.composer.sections.set_visibility(col.id, false).await.unwrap();
    let visible = fx.composer.sections.get_page_tree(page.id, false).await.unwrap();
    assert_eq!(visible[1].size(), 1);
    let everything = fx.composer.sections.get_page_tree(page.id, true).await.unwrap();
    assert_eq!(everything[1].size(), 3);
}

#[tokio::test]
async fn test_max_depth() {
    let mut config = ComposerConfig::default();
    config.sections.max_depth = Some(2);
    let fx = fixture_with(config).await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;
    let a = fx.section(page.id, &v, "a", None).await;
    let b = fx.section(page.id, &v, "b", Some(a.id)).await;

    let err = fx
        .composer
        .sections
        .create_section(NewSection::new(page.id, v.id, "c").under(b.id))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_props_merge_and_schema() {
    let fx = fixture().await;
    let category = fx
        .composer
        .registry
        .create_category(NewCategory {
            name: "Hero".into(),
            slug: "hero".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut input = NewComponent::new("Hero Banner", category.id);
    input.schema = json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "height": {"type": "integer", "minimum": 100}
        }
    });
    input.default_props = json!({"title": "Welcome", "height": 400});
    let hero = fx.composer.registry.create_component(input).await.unwrap();
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;

    let section = fx
        .composer
        .sections
        .create_section(NewSection::new(page.id, v.id, "hero").with_props(json!({"height": 600})))
        .await
        .unwrap();
    let resolved = fx.composer.sections.resolved_props(section.id).await.unwrap();
    assert_eq!(resolved, json!({"title": "Welcome", "height": 600}));

    let err = fx
        .composer
        .sections
        .create_section(NewSection::new(page.id, v.id, "bad").with_props(json!({"height": 10})))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_page_tree_handles_deep_nesting() {
    const DEPTH: usize = 20_000;
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("/").await;

    let (page_id, version_id) = (page.id, v.id);
    fx.store
        .with_transaction(move |t| {
            let now = Utc::now();
            let mut parent = None;
            for depth in 0..DEPTH {
                let id = SectionId::new();
                t.sections.insert(
                    id,
                    PageSection {
                        id,
                        page_id,
                        component_version_id: version_id,
                        name: format!("level-{depth}"),
                        props: json!({}),
                        order: 0,
                        parent_section_id: parent,
                        container_settings: json!({}),
                        style_overrides: json!({}),
                        is_visible: true,
                        created_at: now,
                        updated_at: now,
                    },
                );
                parent = Some(id);
            }
            Ok(())
        })
        .await
        .unwrap();

    let tree = fx.composer.sections.get_page_tree(page.id, false).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].size(), DEPTH);
    let walked = tree[0].walk();
    let (deepest, depth) = walked[DEPTH - 1];
    assert_eq!(depth, DEPTH - 1);
    assert_eq!(deepest.section.name, format!("level-{}", DEPTH - 1));
    assert!(deepest.children.is_empty());
}

// =============================================================================
// Themes
// =============================================================================

#[tokio::test]
async fn test_single_default_theme() {
    let fx = fixture().await;
    let themes = &fx.composer.themes;
    let light = themes
        .create_theme(NewTheme::new(fx.store_id, "Light").as_default())
        .await
        .unwrap();
    assert!(light.is_default);

    let dark = themes
        .create_theme(NewTheme::new(fx.store_id, "Dark").as_default())
        .await
        .unwrap();
    assert!(dark.is_default);

    let defaults: Vec<_> = themes
        .list_themes(fx.store_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.is_default)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, dark.id);

    themes.set_default(fx.store_id, light.id).await.unwrap();
    let current = themes.get_default_theme(fx.store_id).await.unwrap().unwrap();
    assert_eq!(current.id, light.id);
    assert!(!themes.get_theme(dark.id).await.unwrap().is_default);
}

#[tokio::test]
async fn test_theme_name_unique_and_store_required() {
    let fx = fixture().await;
    let themes = &fx.composer.themes;
    themes.create_theme(NewTheme::new(fx.store_id, "Light")).await.unwrap();
    let err = themes
        .create_theme(NewTheme::new(fx.store_id, "Light"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = themes
        .create_theme(NewTheme::new(StoreId::new(), "Light"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_default_theme_cannot_be_deleted() {
    let fx = fixture().await;
    let themes = &fx.composer.themes;
    let light = themes
        .create_theme(NewTheme::new(fx.store_id, "Light").as_default())
        .await
        .unwrap();
    let dark = themes.create_theme(NewTheme::new(fx.store_id, "Dark")).await.unwrap();

    let outcome = themes.delete_theme(light.id).await;
    assert!(!outcome.is_deleted());
    assert_eq!(themes.get_theme(light.id).await.unwrap(), light);
    assert_eq!(themes.list_themes(fx.store_id).await.unwrap().len(), 2);

    assert!(themes.delete_theme(dark.id).await.is_deleted());
}

#[tokio::test]
async fn test_update_theme() {
    let fx = fixture().await;
    let themes = &fx.composer.themes;
    let light = themes
        .create_theme(NewTheme::new(fx.store_id, "Light").as_default())
        .await
        .unwrap();
    let dark = themes.create_theme(NewTheme::new(fx.store_id, "Dark")).await.unwrap();

    let err = themes
        .update_theme(
            dark.id,
            ThemeUpdate {
                name: Some("Light".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let midnight = themes
        .update_theme(
            dark.id,
            ThemeUpdate {
                name: Some("Midnight".into()),
                is_default: Some(true),
                variables: Some(json!({"background": "#000"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(midnight.name, "Midnight");
    assert!(midnight.is_default);
    assert_eq!(midnight.variables, json!({"background": "#000"}));
    assert!(!themes.get_theme(light.id).await.unwrap().is_default);

    // the default can only be handed over, never cleared
    let err = themes
        .update_theme(
            dark.id,
            ThemeUpdate {
                is_default: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let current = themes.get_default_theme(fx.store_id).await.unwrap().unwrap();
    assert_eq!(current.id, dark.id);
    assert_eq!(current.name, "Midnight");
}

// =============================================================================
// Pages
// =============================================================================

#[tokio::test]
async fn test_page_defaults_and_slug_uniqueness() {
    let fx = fixture().await;
    let page = fx.page("about").await;
    assert!(page.is_published);
    assert!(!page.is_homepage);
    assert_eq!(page.seo, json!({}));

    let err = fx
        .composer
        .pages
        .create_page(NewPage::new(fx.store_id, "About again", "about"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = fx
        .composer
        .pages
        .create_page(NewPage::new(StoreId::new(), "Elsewhere", "about"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_second_homepage_conflicts_until_moved() {
    let fx = fixture().await;
    let pages = &fx.composer.pages;
    let home = pages
        .create_page(NewPage::new(fx.store_id, "Home", "/").homepage())
        .await
        .unwrap();
    let err = pages
        .create_page(NewPage::new(fx.store_id, "Landing", "landing").homepage())
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let landing = fx.page("landing").await;
    pages.set_homepage(fx.store_id, landing.id).await.unwrap();

    let homepages: Vec<_> = pages
        .list_pages(fx.store_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.is_homepage)
        .collect();
    assert_eq!(homepages.len(), 1);
    assert_eq!(homepages[0].id, landing.id);
    assert!(!pages.get_page(home.id).await.unwrap().is_homepage);
}

#[tokio::test]
async fn test_update_page() {
    let fx = fixture().await;
    fx.page("about").await;
    let faq = fx.page("faq").await;
    let pages = &fx.composer.pages;

    let err = pages
        .update_page(
            faq.id,
            PageUpdate {
                slug: Some("about".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = pages
        .update_page(
            faq.id,
            PageUpdate {
                slug: Some("Help Me".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let help = pages
        .update_page(
            faq.id,
            PageUpdate {
                title: Some("Help".into()),
                slug: Some("help".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(help.title, "Help");
    assert_eq!(help.slug, "help");
    assert!(pages.get_page_by_slug(fx.store_id, "faq").await.unwrap().is_none());
    let found = pages.get_page_by_slug(fx.store_id, "help").await.unwrap().unwrap();
    assert_eq!(found.id, faq.id);
}

/// Moves the homepage to `target` right after the first read of `target`
struct HomepageMovesAfterRead {
    inner: Arc<dyn PageRepository>,
    store_id: StoreId,
    target: PageId,
    fired: AtomicBool,
}

#[async_trait]
impl PageRepository for HomepageMovesAfterRead {
    async fn get_by_id(&self, id: PageId) -> StoreResult<Option<StorePage>> {
        let row = self.inner.get_by_id(id).await?;
        if id == self.target && !self.fired.swap(true, Ordering::SeqCst) {
            self.inner.set_homepage(self.store_id, self.target).await?;
        }
        Ok(row)
    }

    async fn get_by_store_id_and_slug(&self, store_id: StoreId, slug: &str) -> StoreResult<Option<StorePage>> {
        self.inner.get_by_store_id_and_slug(store_id, slug).await
    }

    async fn get_homepage_by_store_id(&self, store_id: StoreId) -> StoreResult<Option<StorePage>> {
        self.inner.get_homepage_by_store_id(store_id).await
    }

    async fn list_by_store(&self, store_id: StoreId) -> StoreResult<Vec<StorePage>> {
        self.inner.list_by_store(store_id).await
    }

    async fn create(&self, page: StorePage) -> StoreResult<StorePage> {
        self.inner.create(page).await
    }

    async fn update(&self, page: StorePage) -> StoreResult<StorePage> {
        self.inner.update(page).await
    }

    async fn delete(&self, id: PageId) -> StoreResult<bool> {
        self.inner.delete(id).await
    }

    async fn set_homepage(&self, store_id: StoreId, page_id: PageId) -> StoreResult<()> {
        self.inner.set_homepage(store_id, page_id).await
    }
}

#[tokio::test]
async fn test_edit_racing_homepage_move_keeps_one_homepage() {
    let fx = fixture().await;
    fx.composer
        .pages
        .create_page(NewPage::new(fx.store_id, "Home", "/").homepage())
        .await
        .unwrap();
    let landing = fx.page("landing").await;

    let pages = PagePublisher::new(
        fx.store.clone(),
        Arc::new(HomepageMovesAfterRead {
            inner: fx.store.clone(),
            store_id: fx.store_id,
            target: landing.id,
            fired: AtomicBool::new(false),
        }),
    );
    let edited = pages
        .update_page(
            landing.id,
            PageUpdate {
                title: Some("Landing".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(edited.is_homepage);

    let homepages: Vec<PageId> = fx
        .composer
        .pages
        .list_pages(fx.store_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.is_homepage)
        .map(|p| p.id)
        .collect();
    assert_eq!(homepages, vec![landing.id]);

    // publishing writes the whole row and leaves the flag alone
    let hidden = fx.composer.pages.publish(landing.id, &json!(false)).await.unwrap();
    assert!(hidden.is_homepage);
}

#[tokio::test]
async fn test_publish_requires_boolean() {
    let fx = fixture().await;
    let page = fx.page("about").await;
    let pages = &fx.composer.pages;

    let hidden = pages.publish(page.id, &json!(false)).await.unwrap();
    assert!(!hidden.is_published);

    for bad in [json!("true"), json!(1), json!(null)] {
        let err = pages.publish(page.id, &bad).await.unwrap_err();
        assert!(err.is_validation());
    }
    assert!(!pages.get_page(page.id).await.unwrap().is_published);
}

#[tokio::test]
async fn test_delete_page_cascades_sections() {
    let fx = fixture().await;
    let hero = fx.component("Hero").await;
    let v = fx.version(&hero, "1.0.0").await;
    let page = fx.page("sale").await;
    let root = fx.section(page.id, &v, "root", None).await;
    fx.section(page.id, &v, "child", Some(root.id)).await;

    assert!(fx.composer.pages.delete_page(page.id).await.is_deleted());
    assert!(fx.store.list_by_page(page.id).await.unwrap().is_empty());

    let home = fx
        .composer
        .pages
        .create_page(NewPage::new(fx.store_id, "Home", "/").homepage())
        .await
        .unwrap();
    assert!(!fx.composer.pages.delete_page(home.id).await.is_deleted());
}

// =============================================================================
// Scenario
// =============================================================================

#[tokio::test]
async fn test_pinned_section_survives_new_version() {
    let fx = fixture().await;
    let registry = &fx.composer.registry;

    let category = registry
        .create_category(NewCategory {
            name: "Hero".into(),
            slug: "hero".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let banner = registry
        .create_component(NewComponent::new("Hero Banner", category.id))
        .await
        .unwrap();
    let v1 = registry
        .create_version(NewVersion::new(banner.id, "1.0.0", "<h1>{{title}}</h1>"))
        .await
        .unwrap();
    let home = fx
        .composer
        .pages
        .create_page(NewPage::new(fx.store_id, "Home", "/").homepage())
        .await
        .unwrap();
    let section = fx
        .composer
        .sections
        .create_section(NewSection::new(home.id, v1.id, "Hero"))
        .await
        .unwrap();
    registry
        .create_version(NewVersion::new(banner.id, "1.1.0", "<h1 class=\"big\">{{title}}</h1>"))
        .await
        .unwrap();

    let latest = registry.get_latest_version(banner.id).await.unwrap().unwrap();
    assert_eq!(latest.version, "1.1.0");

    let pinned = fx.composer.sections.get_section(section.id).await.unwrap();
    assert_eq!(pinned, section);
    let pinned_version = registry.get_version(pinned.component_version_id).await.unwrap();
    assert_eq!(pinned_version.version, "1.0.0");
}
