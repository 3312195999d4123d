//! Page Publisher
//!
//! Pages belong to a store, are addressed by a slug unique within it, and at most
//! one of them is the homepage. Creating a page never steals the homepage flag;
//! it moves only through [`PagePublisher::set_homepage`].

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use serde_json::Value;

use crate::error::{ComposerError, Result};
use crate::model::{NewPage, PageId, PageUpdate, StoreId, StorePage};
use crate::outcome::DeleteOutcome;
use crate::repository::{PageRepository, StoreDirectory};

fn slug_shape() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| {
        Regex::new(r"^(/|/?[a-z0-9]+(?:[-/][a-z0-9]+)*/?)$").expect("slug regex")
    })
}

fn validate_slug(slug: &str) -> Result<()> {
    if slug_shape().is_match(slug) {
        Ok(())
    } else {
        Err(ComposerError::Validation(format!(
            "invalid slug '{slug}': use lowercase letters, digits, '-' and '/'"
        )))
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(ComposerError::Validation("page title must not be empty".into()));
    }
    Ok(())
}

pub struct PagePublisher {
    stores: Arc<dyn StoreDirectory>,
    pages: Arc<dyn PageRepository>,
}

impl PagePublisher {
    pub fn new(stores: Arc<dyn StoreDirectory>, pages: Arc<dyn PageRepository>) -> Self {
        Self { stores, pages }
    }

    async fn require_store(&self, store_id: StoreId) -> Result<()> {
        if self.stores.store_exists(store_id).await? {
            Ok(())
        } else {
            Err(ComposerError::not_found("store", store_id))
        }
    }

    async fn require_page(&self, id: PageId) -> Result<StorePage> {
        self.pages
            .get_by_id(id)
            .await?
            .ok_or_else(|| ComposerError::not_found("page", id))
    }

    pub async fn create_page(&self, input: NewPage) -> Result<StorePage> {
        validate_title(&input.title)?;
        validate_slug(&input.slug)?;
        self.require_store(input.store_id).await?;

        if self
            .pages
            .get_by_store_id_and_slug(input.store_id, &input.slug)
            .await?
            .is_some()
        {
            return Err(ComposerError::Conflict(format!(
                "slug '{}' already used in store {}",
                input.slug, input.store_id
            )));
        }

        let is_homepage = input.is_homepage.unwrap_or(false);
        if is_homepage {
            if let Some(current) = self.pages.get_homepage_by_store_id(input.store_id).await? {
                tracing::warn!(store_id = %input.store_id, homepage = %current.id, "refused second homepage");
                return Err(ComposerError::Conflict(format!(
                    "store {} already has a homepage ({}); move it with set_homepage",
                    input.store_id, current.slug
                )));
            }
        }

        let now = Utc::now();
        let page = self
            .pages
            .create(StorePage {
                id: PageId::new(),
                store_id: input.store_id,
                title: input.title,
                slug: input.slug,
                content: input.content,
                seo: input.seo.unwrap_or_else(|| Value::Object(Default::default())),
                is_homepage,
                is_published: input.is_published.unwrap_or(true),
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(page_id = %page.id, store_id = %page.store_id, slug = %page.slug, "created page");
        Ok(page)
    }

    pub async fn get_page(&self, id: PageId) -> Result<StorePage> {
        self.require_page(id).await
    }

    pub async fn get_page_by_slug(&self, store_id: StoreId, slug: &str) -> Result<Option<StorePage>> {
        Ok(self.pages.get_by_store_id_and_slug(store_id, slug).await?)
    }

    pub async fn get_homepage(&self, store_id: StoreId) -> Result<Option<StorePage>> {
        self.require_store(store_id).await?;
        Ok(self.pages.get_homepage_by_store_id(store_id).await?)
    }

    pub async fn list_pages(&self, store_id: StoreId) -> Result<Vec<StorePage>> {
        self.require_store(store_id).await?;
        Ok(self.pages.list_by_store(store_id).await?)
    }

    /// Edit content fields. Publish state and the homepage flag are untouched.
    pub async fn update_page(&self, id: PageId, update: PageUpdate) -> Result<StorePage> {
        let mut page = self.require_page(id).await?;

        if let Some(title) = update.title {
            validate_title(&title)?;
            page.title = title;
        }
        if let Some(slug) = update.slug {
            validate_slug(&slug)?;
            if slug != page.slug
                && self
                    .pages
                    .get_by_store_id_and_slug(page.store_id, &slug)
                    .await?
                    .is_some()
            {
                return Err(ComposerError::Conflict(format!(
                    "slug '{slug}' already used in store {}",
                    page.store_id
                )));
            }
            page.slug = slug;
        }
        if let Some(content) = update.content {
            page.content = content;
        }
        if let Some(seo) = update.seo {
            page.seo = seo;
        }
        page.updated_at = Utc::now();

        let page = self.pages.update(page).await?;
        tracing::info!(page_id = %page.id, "updated page");
        Ok(page)
    }

    /// Make `page_id` the only homepage of the store
    pub async fn set_homepage(&self, store_id: StoreId, page_id: PageId) -> Result<StorePage> {
        let page = self.require_page(page_id).await?;
        if page.store_id != store_id {
            return Err(ComposerError::not_found("page", format!("{page_id} in store {store_id}")));
        }
        self.pages.set_homepage(store_id, page_id).await?;
        tracing::info!(page_id = %page_id, store_id = %store_id, "set homepage");
        self.require_page(page_id).await
    }

    /// Set the publish flag. Anything but a JSON boolean is rejected.
    pub async fn publish(&self, id: PageId, is_published: &Value) -> Result<StorePage> {
        let Some(flag) = is_published.as_bool() else {
            return Err(ComposerError::Validation(format!(
                "publish flag must be a boolean, got {is_published}"
            )));
        };
        let mut page = self.require_page(id).await?;
        if page.is_published == flag {
            return Ok(page);
        }
        page.is_published = flag;
        page.updated_at = Utc::now();
        let page = self.pages.update(page).await?;
        tracing::info!(page_id = %page.id, published = flag, "changed publish state");
        Ok(page)
    }

    /// Delete a page and all of its sections. The homepage is protected.
    pub async fn delete_page(&self, id: PageId) -> DeleteOutcome {
        let result: Result<bool> = async {
            match self.pages.get_by_id(id).await? {
                None => Ok(false),
                Some(page) if page.is_homepage => Err(ComposerError::Conflict(format!(
                    "page {id} is the homepage of store {}; move the homepage first",
                    page.store_id
                ))),
                Some(_) => Ok(self.pages.delete(id).await?),
            }
        }
        .await;

        DeleteOutcome::from_result("page", id, result)
    }
}
