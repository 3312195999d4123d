//! Section Tree Manager
//!
//! The sections of a page form a forest: any number of root sections, each with
//! descendants of unbounded depth. A child always lives on its parent's page.
//!
//! The store only answers one level of adjacency at a time (`get_root_sections`,
//! `get_child_sections`), so every traversal here is an explicit worklist of
//! lookups rather than recursion over the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ReorderPolicy, SectionConfig};
use crate::error::{ComposerError, Result};
use crate::model::{NewSection, PageId, PageSection, SectionId, SectionUpdate, VersionId};
use crate::outcome::DeleteOutcome;
use crate::props::{merge_props, validate_props};
use crate::repository::{ComponentRepository, PageRepository, SectionRepository, VersionRepository};

/// A section with its visible subtree, as materialized by [`SectionTreeManager::get_page_tree`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionNode {
    #[serde(flatten)]
    pub section: PageSection,
    pub children: Vec<SectionNode>,
}

impl SectionNode {
    /// Number of sections in this subtree, including this one
    pub fn size(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }

    /// Visit the subtree depth-first in sibling order, with each node's depth below this one
    pub fn walk(&self) -> Vec<(&SectionNode, usize)> {
        let mut out = Vec::new();
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            out.push((node, depth));
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        }
        out
    }
}

// Unbounded nesting would otherwise recurse once per level in drop glue.
impl Drop for SectionNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

pub struct SectionTreeManager {
    pages: Arc<dyn PageRepository>,
    sections: Arc<dyn SectionRepository>,
    versions: Arc<dyn VersionRepository>,
    components: Arc<dyn ComponentRepository>,
    config: SectionConfig,
}

impl SectionTreeManager {
    pub fn new(
        pages: Arc<dyn PageRepository>,
        sections: Arc<dyn SectionRepository>,
        versions: Arc<dyn VersionRepository>,
        components: Arc<dyn ComponentRepository>,
        config: SectionConfig,
    ) -> Self {
        Self {
            pages,
            sections,
            versions,
            components,
            config,
        }
    }

    async fn require_page(&self, page_id: PageId) -> Result<()> {
        match self.pages.get_by_id(page_id).await? {
            Some(_) => Ok(()),
            None => Err(ComposerError::not_found("page", page_id)),
        }
    }

    async fn require_section(&self, id: SectionId) -> Result<PageSection> {
        self.sections
            .get_by_id(id)
            .await?
            .ok_or_else(|| ComposerError::not_found("section", id))
    }

    /// Resolve a parent and check it sits on `page_id`
    async fn require_parent(&self, section: Option<SectionId>, page_id: PageId, parent_id: SectionId) -> Result<PageSection> {
        let parent = self.require_section(parent_id).await?;
        if parent.page_id != page_id {
            return Err(ComposerError::HierarchyViolation {
                section: section.map_or_else(|| "new section".to_string(), |id| id.to_string()),
                parent: parent_id.to_string(),
            });
        }
        Ok(parent)
    }

    /// Ancestors of a section, nearest first
    async fn ancestors(&self, section: &PageSection) -> Result<Vec<SectionId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([section.id]);
        let mut next = section.parent_section_id;
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(ComposerError::HierarchyViolation {
                    section: section.id.to_string(),
                    parent: id.to_string(),
                });
            }
            chain.push(id);
            next = match self.sections.get_by_id(id).await? {
                Some(ancestor) => ancestor.parent_section_id,
                None => None,
            };
        }
        Ok(chain)
    }

    /// Ids of a subtree in depth-first pre-order, with each id's depth below the root
    async fn collect_subtree(&self, root: SectionId) -> Result<Vec<(SectionId, usize)>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push((id, depth));
            let children = self.sections.get_child_sections(id).await?;
            // reversed so the lowest-ranked child is visited first
            for child in children.into_iter().rev() {
                stack.push((child.id, depth + 1));
            }
        }
        Ok(order)
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        match self.config.max_depth {
            Some(max) if depth > max => Err(ComposerError::Validation(format!(
                "sections may nest at most {max} level(s) deep"
            ))),
            _ => Ok(()),
        }
    }

    async fn check_props(&self, version_id: VersionId, props: &Value) -> Result<()> {
        if !self.config.validate_props {
            return Ok(());
        }
        let Some(version) = self.versions.get_by_id(version_id).await? else {
            return Err(ComposerError::not_found("component version", version_id));
        };
        if let Some(component) = self.components.get_by_id(version.component_id).await? {
            let merged = merge_props(&component.default_props, props);
            validate_props(&component.schema, &merged)?;
        }
        Ok(())
    }

    pub async fn create_section(&self, input: NewSection) -> Result<PageSection> {
        if input.name.trim().is_empty() {
            return Err(ComposerError::Validation("section name must not be empty".into()));
        }
        self.require_page(input.page_id).await?;
        if self.versions.get_by_id(input.component_version_id).await?.is_none() {
            return Err(ComposerError::not_found("component version", input.component_version_id));
        }
        if let Some(parent_id) = input.parent_section_id {
            let parent = self.require_parent(None, input.page_id, parent_id).await?;
            // parent depth is its ancestor count + 1, the new child sits one below
            let depth = self.ancestors(&parent).await?.len() + 2;
            self.check_depth(depth)?;
        }
        self.check_props(input.component_version_id, &input.props).await?;

        let now = Utc::now();
        let section = self
            .sections
            .create(PageSection {
                id: SectionId::new(),
                page_id: input.page_id,
                component_version_id: input.component_version_id,
                name: input.name,
                props: input.props,
                order: input.order,
                parent_section_id: input.parent_section_id,
                container_settings: input.container_settings,
                style_overrides: input.style_overrides,
                is_visible: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            section_id = %section.id,
            page_id = %section.page_id,
            parent = ?section.parent_section_id,
            "created section"
        );
        Ok(section)
    }

    pub async fn get_section(&self, id: SectionId) -> Result<PageSection> {
        self.require_section(id).await
    }

    pub async fn update_section(&self, id: SectionId, update: SectionUpdate) -> Result<PageSection> {
        let mut section = self.require_section(id).await?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(ComposerError::Validation("section name must not be empty".into()));
            }
            section.name = name;
        }
        if let Some(version_id) = update.component_version_id {
            if self.versions.get_by_id(version_id).await?.is_none() {
                return Err(ComposerError::not_found("component version", version_id));
            }
            section.component_version_id = version_id;
        }
        if let Some(parent) = update.parent_section_id {
            section.parent_section_id = parent;
        }

        // Re-checked on every update, whether or not the parent changed.
        if let Some(parent_id) = section.parent_section_id {
            if parent_id == section.id {
                return Err(ComposerError::HierarchyViolation {
                    section: section.id.to_string(),
                    parent: parent_id.to_string(),
                });
            }
            let parent = self.require_parent(Some(section.id), section.page_id, parent_id).await?;
            let mut lineage = self.ancestors(&parent).await?;
            lineage.push(parent.id);
            if lineage.contains(&section.id) {
                return Err(ComposerError::HierarchyViolation {
                    section: section.id.to_string(),
                    parent: parent_id.to_string(),
                });
            }
            if self.config.max_depth.is_some() {
                let height = self
                    .collect_subtree(section.id)
                    .await?
                    .iter()
                    .map(|(_, depth)| *depth)
                    .max()
                    .unwrap_or(0);
                self.check_depth(lineage.len() + 1 + height)?;
            }
        }

        if let Some(props) = update.props {
            section.props = props;
        }
        if let Some(order) = update.order {
            section.order = order;
        }
        if let Some(container_settings) = update.container_settings {
            section.container_settings = container_settings;
        }
        if let Some(style_overrides) = update.style_overrides {
            section.style_overrides = style_overrides;
        }
        if let Some(visible) = update.is_visible {
            section.is_visible = visible;
        }
        self.check_props(section.component_version_id, &section.props).await?;
        section.updated_at = Utc::now();

        let section = self.sections.update(section).await?;
        tracing::info!(section_id = %section.id, parent = ?section.parent_section_id, "updated section");
        Ok(section)
    }

    /// Hide or show a section
    pub async fn set_visibility(&self, id: SectionId, visible: bool) -> Result<PageSection> {
        let mut section = self.require_section(id).await?;
        if section.is_visible == visible {
            return Ok(section);
        }
        section.is_visible = visible;
        section.updated_at = Utc::now();
        let section = self.sections.update(section).await?;
        tracing::info!(section_id = %section.id, visible, "changed section visibility");
        Ok(section)
    }

    /// Delete a section and its whole subtree, descendants before ancestors.
    ///
    /// Returns a failed outcome for an unknown id, so repeating a delete is harmless.
    pub async fn delete_section(&self, id: SectionId) -> DeleteOutcome {
        let result: Result<usize> = async {
            if self.sections.get_by_id(id).await?.is_none() {
                return Ok(0);
            }
            let mut worklist: Vec<SectionId> = self
                .collect_subtree(id)
                .await?
                .into_iter()
                .map(|(section_id, _)| section_id)
                .collect();
            // Reversed pre-order puts every descendant before its ancestors.
            worklist.reverse();
            tracing::debug!(section_id = %id, subtree = worklist.len(), "deleting section subtree");
            Ok(self.sections.delete_many(&worklist).await?)
        }
        .await;

        DeleteOutcome::from_count("section", id, result)
    }

    /// Rank `ordered` siblings by their position in the list.
    ///
    /// Every id must belong to `page_id` and share one parent. Siblings missing
    /// from the list are handled by the configured [`ReorderPolicy`]. Returns the
    /// sibling set in its new order.
    pub async fn reorder(&self, page_id: PageId, ordered: &[SectionId]) -> Result<Vec<PageSection>> {
        self.require_page(page_id).await?;
        if ordered.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique = HashSet::new();
        if let Some(dup) = ordered.iter().find(|id| !unique.insert(**id)) {
            return Err(ComposerError::Validation(format!("section {dup} listed twice")));
        }

        let mut parent = None;
        for (index, id) in ordered.iter().enumerate() {
            let section = self.require_section(*id).await?;
            if section.page_id != page_id {
                return Err(ComposerError::HierarchyViolation {
                    section: id.to_string(),
                    parent: format!("page {page_id}"),
                });
            }
            if index == 0 {
                parent = section.parent_section_id;
            } else if section.parent_section_id != parent {
                return Err(ComposerError::Validation(format!(
                    "section {id} is not a sibling of {}",
                    ordered[0]
                )));
            }
        }

        let siblings = self.siblings(page_id, parent).await?;
        let omitted: Vec<SectionId> = siblings
            .iter()
            .map(|s| s.id)
            .filter(|id| !unique.contains(id))
            .collect();

        if self.config.reorder_policy == ReorderPolicy::Strict && !omitted.is_empty() {
            return Err(ComposerError::Validation(format!(
                "reorder must list every sibling; {} missing",
                omitted.len()
            )));
        }

        let ranks: Vec<(SectionId, i32)> = ordered
            .iter()
            .chain(omitted.iter())
            .enumerate()
            .map(|(rank, id)| (*id, rank as i32))
            .collect();
        self.sections.update_order(&ranks).await?;

        tracing::info!(page_id = %page_id, parent = ?parent, count = ranks.len(), "reordered sections");
        self.siblings(page_id, parent).await
    }

    async fn siblings(&self, page_id: PageId, parent: Option<SectionId>) -> Result<Vec<PageSection>> {
        Ok(match parent {
            Some(parent_id) => self.sections.get_child_sections(parent_id).await?,
            None => self.sections.get_root_sections(page_id).await?,
        })
    }

    /// Root sections of a page, ascending by order
    pub async fn get_root_sections(&self, page_id: PageId) -> Result<Vec<PageSection>> {
        self.require_page(page_id).await?;
        Ok(self.sections.get_root_sections(page_id).await?)
    }

    /// Direct children of a section, ascending by order
    pub async fn get_child_sections(&self, parent_id: SectionId) -> Result<Vec<PageSection>> {
        self.require_section(parent_id).await?;
        Ok(self.sections.get_child_sections(parent_id).await?)
    }

    /// Materialize a page's forest top-down.
    ///
    /// Hidden sections, and everything beneath them, are left out unless
    /// `include_hidden` is set.
    pub async fn get_page_tree(&self, page_id: PageId, include_hidden: bool) -> Result<Vec<SectionNode>> {
        self.require_page(page_id).await?;

        let keep = |s: &PageSection| include_hidden || s.is_visible;
        let roots: Vec<PageSection> = self
            .sections
            .get_root_sections(page_id)
            .await?
            .into_iter()
            .filter(|s| keep(s))
            .collect();

        let mut children: HashMap<SectionId, Vec<PageSection>> = HashMap::new();
        let mut queue: Vec<SectionId> = roots.iter().map(|s| s.id).collect();
        while let Some(id) = queue.pop() {
            if children.contains_key(&id) {
                continue;
            }
            let kids: Vec<PageSection> = self
                .sections
                .get_child_sections(id)
                .await?
                .into_iter()
                .filter(|s| keep(s))
                .collect();
            queue.extend(kids.iter().map(|s| s.id));
            children.insert(id, kids);
        }

        Ok(assemble(roots, children))
    }

    /// Effective props of a section: its overrides merged over the component defaults
    pub async fn resolved_props(&self, id: SectionId) -> Result<Value> {
        let section = self.require_section(id).await?;
        let Some(version) = self.versions.get_by_id(section.component_version_id).await? else {
            return Err(ComposerError::not_found("component version", section.component_version_id));
        };
        match self.components.get_by_id(version.component_id).await? {
            Some(component) => Ok(merge_props(&component.default_props, &section.props)),
            None => Ok(section.props),
        }
    }
}

/// Build the forest bottom-up: a node is finished once all of its children are.
fn assemble(roots: Vec<PageSection>, mut children: HashMap<SectionId, Vec<PageSection>>) -> Vec<SectionNode> {
    struct Frame {
        section: PageSection,
        pending: std::vec::IntoIter<PageSection>,
        built: Vec<SectionNode>,
    }

    let mut frame_for = |section: PageSection| Frame {
        pending: children.remove(&section.id).unwrap_or_default().into_iter(),
        built: Vec::new(),
        section,
    };

    let mut forest = Vec::new();
    for root in roots {
        let mut stack = vec![frame_for(root)];
        while let Some(top) = stack.last_mut() {
            if let Some(kid) = top.pending.next() {
                let frame = frame_for(kid);
                stack.push(frame);
                continue;
            }
            let Some(done) = stack.pop() else { break };
            let node = SectionNode {
                section: done.section,
                children: done.built,
            };
            match stack.last_mut() {
                Some(parent) => parent.built.push(node),
                None => forest.push(node),
            }
        }
    }
    forest
}
