//! Theme Resolver
//!
//! A store has any number of named themes and at most one default. Moving the
//! default is a clear-all/set-one transition the repository applies atomically.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{ComposerError, Result};
use crate::model::{NewTheme, StoreId, StoreTheme, ThemeId, ThemeUpdate};
use crate::outcome::DeleteOutcome;
use crate::repository::{StoreDirectory, ThemeRepository};

pub struct ThemeResolver {
    stores: Arc<dyn StoreDirectory>,
    themes: Arc<dyn ThemeRepository>,
}

impl ThemeResolver {
    pub fn new(stores: Arc<dyn StoreDirectory>, themes: Arc<dyn ThemeRepository>) -> Self {
        Self { stores, themes }
    }

    async fn require_store(&self, store_id: StoreId) -> Result<()> {
        if self.stores.store_exists(store_id).await? {
            Ok(())
        } else {
            Err(ComposerError::not_found("store", store_id))
        }
    }

    async fn require_theme(&self, id: ThemeId) -> Result<StoreTheme> {
        self.themes
            .get_by_id(id)
            .await?
            .ok_or_else(|| ComposerError::not_found("theme", id))
    }

    /// Create a theme; a default theme takes the flag from any previous default
    pub async fn create_theme(&self, input: NewTheme) -> Result<StoreTheme> {
        if input.name.trim().is_empty() {
            return Err(ComposerError::Validation("theme name must not be empty".into()));
        }
        self.require_store(input.store_id).await?;
        if self
            .themes
            .get_by_store_id_and_name(input.store_id, &input.name)
            .await?
            .is_some()
        {
            return Err(ComposerError::Conflict(format!(
                "theme '{}' already exists in store {}",
                input.name, input.store_id
            )));
        }

        let now = Utc::now();
        let theme = self
            .themes
            .create(StoreTheme {
                id: ThemeId::new(),
                store_id: input.store_id,
                name: input.name,
                description: input.description,
                // the flag is only ever granted through the transition
                is_default: false,
                variables: input.variables,
                settings: input.settings,
                created_at: now,
                updated_at: now,
            })
            .await?;
        tracing::info!(theme_id = %theme.id, store_id = %theme.store_id, "created theme");

        if input.is_default {
            return self.set_default(theme.store_id, theme.id).await;
        }
        Ok(theme)
    }

    /// Make `theme_id` the only default theme of the store
    pub async fn set_default(&self, store_id: StoreId, theme_id: ThemeId) -> Result<StoreTheme> {
        let theme = self.require_theme(theme_id).await?;
        if theme.store_id != store_id {
            return Err(ComposerError::not_found("theme", format!("{theme_id} in store {store_id}")));
        }
        self.themes.set_default_theme(store_id, theme_id).await?;
        tracing::info!(theme_id = %theme_id, store_id = %store_id, "set default theme");
        self.require_theme(theme_id).await
    }

    pub async fn get_theme(&self, id: ThemeId) -> Result<StoreTheme> {
        self.require_theme(id).await
    }

    pub async fn get_default_theme(&self, store_id: StoreId) -> Result<Option<StoreTheme>> {
        self.require_store(store_id).await?;
        Ok(self.themes.get_default_by_store_id(store_id).await?)
    }

    pub async fn list_themes(&self, store_id: StoreId) -> Result<Vec<StoreTheme>> {
        self.require_store(store_id).await?;
        Ok(self.themes.list_by_store(store_id).await?)
    }

    /// Edit a theme. `is_default: Some(true)` runs the default transition;
    /// `Some(false)` is refused on the current default, which stays until another
    /// theme takes it.
    pub async fn update_theme(&self, id: ThemeId, update: ThemeUpdate) -> Result<StoreTheme> {
        let mut theme = self.require_theme(id).await?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(ComposerError::Validation("theme name must not be empty".into()));
            }
            if name != theme.name
                && self
                    .themes
                    .get_by_store_id_and_name(theme.store_id, &name)
                    .await?
                    .is_some()
            {
                return Err(ComposerError::Conflict(format!(
                    "theme '{name}' already exists in store {}",
                    theme.store_id
                )));
            }
            theme.name = name;
        }
        if let Some(description) = update.description {
            theme.description = Some(description);
        }
        if let Some(variables) = update.variables {
            theme.variables = variables;
        }
        if let Some(settings) = update.settings {
            theme.settings = settings;
        }
        if update.is_default == Some(false) && theme.is_default {
            return Err(ComposerError::Conflict(format!(
                "theme {id} is the default of store {}; choose another default instead",
                theme.store_id
            )));
        }
        theme.updated_at = Utc::now();

        let theme = self.themes.update(theme).await?;
        tracing::info!(theme_id = %theme.id, "updated theme");

        if update.is_default == Some(true) && !theme.is_default {
            return self.set_default(theme.store_id, theme.id).await;
        }
        Ok(theme)
    }

    /// Delete a theme. The current default is protected and reported as a failure.
    pub async fn delete_theme(&self, id: ThemeId) -> DeleteOutcome {
        let result: Result<bool> = async {
            match self.themes.get_by_id(id).await? {
                None => Ok(false),
                Some(theme) if theme.is_default => Err(ComposerError::Conflict(format!(
                    "theme {id} is the default of store {}; choose another default first",
                    theme.store_id
                ))),
                Some(_) => Ok(self.themes.delete(id).await?),
            }
        }
        .await;

        DeleteOutcome::from_result("theme", id, result)
    }
}
