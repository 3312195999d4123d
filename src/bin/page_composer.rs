//! Page Composer CLI
//!
//! Inspects a composition snapshot: version arithmetic, latest component
//! versions, payload checksums and page section trees.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use page_composer::{
    version, BumpKind, ComponentId, Composer, ComposerConfig, MemoryStore, PageId, SectionNode, VersionId,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "page-composer")]
#[command(about = "Inspect component versions and page composition")]
struct Cli {
    /// Path to a config file (defaults to composer.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// JSON snapshot of the store (overrides storage.snapshot_path)
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a version string is well formed
    Check { version: String },

    /// Increment a version (major, minor or patch)
    Bump {
        version: String,
        #[arg(default_value = "patch")]
        kind: String,
    },

    /// Show the latest version of a component
    Latest { component: ComponentId },

    /// List the active versions of a component, newest first
    Versions { component: ComponentId },

    /// Verify a component version's payload checksum
    Verify { version: VersionId },

    /// Print the section tree of a page
    Tree {
        page: PageId,
        /// Include hidden sections
        #[arg(long)]
        all: bool,
        /// Print JSON instead of an outline
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Check { version } => {
            if version::is_valid(&version) {
                println!("✅ {version} is a valid version");
                return Ok(());
            }
            bail!("'{version}' is not of the form MAJOR.MINOR.PATCH");
        }
        Commands::Bump { version, kind } => {
            let kind = BumpKind::parse_lenient(&kind);
            println!("{}", version::increment(&version, kind)?);
            Ok(())
        }
        Commands::Latest { component } => {
            let composer = open_composer(cli.config.as_deref(), cli.snapshot).await?;
            let component_def = composer.registry.get_component(component).await?;
            match composer.registry.get_latest_version(component).await? {
                Some(latest) => println!("{} {} ({})", component_def.name, latest.version, latest.id),
                None => println!("{} has no versions", component_def.name),
            }
            Ok(())
        }
        Commands::Versions { component } => {
            let composer = open_composer(cli.config.as_deref(), cli.snapshot).await?;
            for v in composer.registry.get_active_versions(component).await? {
                println!("  {}  {}  {}", v.version, v.id, v.created_at.to_rfc3339());
            }
            Ok(())
        }
        Commands::Verify { version } => {
            let composer = open_composer(cli.config.as_deref(), cli.snapshot).await?;
            if !composer.registry.verify_version(version).await? {
                bail!("version {version} - checksum validation FAILED");
            }
            println!("✅ Version {version} - checksum valid");
            Ok(())
        }
        Commands::Tree { page, all, json } => {
            let composer = open_composer(cli.config.as_deref(), cli.snapshot).await?;
            let page_def = composer.pages.get_page(page).await?;
            let tree = composer.sections.get_page_tree(page, all).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                println!("📄 {} ({})", page_def.title, page_def.slug);
                for root in &tree {
                    print_outline(root);
                }
                let total: usize = tree.iter().map(SectionNode::size).sum();
                println!("\n{total} section(s)");
            }
            Ok(())
        }
    }
}

async fn open_composer(config_path: Option<&str>, snapshot: Option<PathBuf>) -> anyhow::Result<Composer> {
    let config = ComposerConfig::load_from(config_path).context("loading configuration")?;
    let Some(path) = snapshot.or_else(|| config.storage.snapshot_path.clone()) else {
        bail!("no snapshot given; pass --snapshot or set storage.snapshot_path");
    };
    let store = Arc::new(
        MemoryStore::open(&path)
            .await
            .with_context(|| format!("opening snapshot {}", path.display()))?,
    );
    Ok(Composer::new(store, &config))
}

fn print_outline(root: &SectionNode) {
    for (node, depth) in root.walk() {
        let hidden = if node.section.is_visible { "" } else { " [hidden]" };
        println!(
            "{}├── {} #{}{}",
            "│   ".repeat(depth),
            node.section.name,
            node.section.order,
            hidden
        );
    }
}
