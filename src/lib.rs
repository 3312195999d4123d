//! Page Composition Engine
//!
//! Lets a store assemble pages out of reusable, versioned UI components.
//!
//! ## Features
//!
//! - **Component Registry**: categories, component definitions and append-only
//!   semantic versions with payload checksums
//! - **Section Trees**: per-page forests of component instances with same-page
//!   parenting, ordered siblings and subtree deletion
//! - **Themes**: named visual configurations with a single default per store
//! - **Pages**: per-store slugs with a single homepage and explicit publishing
//!
//! ## Architecture
//!
//! ```text
//! Composer
//! ├── ComponentRegistry ──┐
//! ├── SectionTreeManager ─┤
//! ├── ThemeResolver ──────┼── repository traits ── MemoryStore (or any adapter)
//! └── PagePublisher ──────┘
//! ```
//!
//! Use-cases depend only on the traits in [`repository`]; the backend is injected
//! at construction and owned by the host.

pub mod checksum;
pub mod composer;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod outcome;
pub mod pages;
pub mod props;
pub mod registry;
pub mod repository;
pub mod sections;
pub mod themes;
pub mod version;

pub use composer::Composer;
pub use config::{ComposerConfig, ReorderPolicy};
pub use error::{ComposerError, Result, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use model::*;
pub use outcome::DeleteOutcome;
pub use pages::PagePublisher;
pub use registry::ComponentRegistry;
pub use sections::{SectionNode, SectionTreeManager};
pub use themes::ThemeResolver;
pub use version::{BumpKind, SemVer};
