//! Engine facade
//!
//! Wires every use-case to one storage backend supplied by the host. The
//! backend's lifecycle (open, save, close) stays with the host.

use std::sync::Arc;

use crate::config::ComposerConfig;
use crate::pages::PagePublisher;
use crate::registry::ComponentRegistry;
use crate::repository::Storage;
use crate::sections::SectionTreeManager;
use crate::themes::ThemeResolver;

pub struct Composer {
    pub registry: ComponentRegistry,
    pub sections: SectionTreeManager,
    pub themes: ThemeResolver,
    pub pages: PagePublisher,
}

impl Composer {
    pub fn new<S>(store: Arc<S>, config: &ComposerConfig) -> Self
    where
        S: Storage + 'static,
    {
        Self {
            registry: ComponentRegistry::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                config.versions.clone(),
            ),
            sections: SectionTreeManager::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                config.sections.clone(),
            ),
            themes: ThemeResolver::new(store.clone(), store.clone()),
            pages: PagePublisher::new(store.clone(), store),
        }
    }
}
