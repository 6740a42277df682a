//! Command-line interface for notedeck.
//!
//! Each subcommand is a thin wrapper over one library operation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::assembly::{
    load_structure, write_versioned, Assembler, DocumentTemplate, ModuleDirSource,
    RegistrySource, UnitSource,
};
use crate::config;
use crate::library::LibraryStore;

pub mod block;
pub mod library;
pub mod unit;

/// notedeck - registry and assembler for reusable LaTeX content units
#[derive(Parser, Debug)]
#[command(name = "notedeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, update and query units
    Unit {
        #[command(subcommand)]
        command: unit::UnitCommands,
    },

    /// Manage the topic index
    Topic {
        #[command(subcommand)]
        command: unit::TopicCommands,
    },

    /// Locate and rewrite blocks in a document
    Block {
        #[command(subcommand)]
        command: block::BlockCommands,
    },

    /// Maintain the library document, modules and identifiers
    Library {
        #[command(subcommand)]
        command: library::LibraryCommands,
    },

    /// Assemble a document from Projects/<project>.json
    Assemble {
        /// Project name
        project: String,

        /// Where unit text comes from
        #[arg(long, value_enum, default_value = "registry")]
        from: SourceKind,

        /// Header template with a {{CONTENT}} marker
        #[arg(long)]
        template: Option<PathBuf>,

        /// Print to stdout instead of writing Scripts/<project>_v<N>.tex
        #[arg(long)]
        stdout: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Unit text source for assembly
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceKind {
    /// Stored bodies in Library.json
    Registry,

    /// Exported Module/<UnitID>.tex files
    Modules,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Unit { command } => unit::execute_unit(command).await,
            Commands::Topic { command } => unit::execute_topic(command).await,
            Commands::Block { command } => block::execute_block(command).await,
            Commands::Library { command } => library::execute_library(command).await,
            Commands::Assemble {
                project,
                from,
                template,
                stdout,
            } => assemble(&project, from, template, stdout).await,
            Commands::Config => show_config(),
        }
    }
}

/// Store for the configured library
pub(crate) fn open_store() -> Result<LibraryStore> {
    Ok(LibraryStore::from_config(config::config()?))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `@path` reads the file, anything else is taken literally
pub(crate) fn read_text_arg(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path)),
        None => Ok(arg.to_string()),
    }
}

/// Assemble a project's structure tree
async fn assemble(
    project: &str,
    from: SourceKind,
    template: Option<PathBuf>,
    stdout: bool,
) -> Result<()> {
    let cfg = config::config()?;

    let structure_path = cfg.projects_dir().join(format!("{}.json", project));
    let tree = load_structure(&structure_path)
        .await
        .with_context(|| format!("Failed to load project structure: {}", structure_path.display()))?;

    let template = match template.or_else(|| cfg.export_template.clone()) {
        Some(path) => DocumentTemplate::load(&path)
            .await
            .with_context(|| format!("Failed to load template: {}", path.display()))?,
        None => DocumentTemplate::default(),
    };

    let source: Box<dyn UnitSource> = match from {
        SourceKind::Registry => {
            let snapshot = open_store()?.load().await?;
            Box::new(RegistrySource::new(snapshot.registry))
        }
        SourceKind::Modules => Box::new(ModuleDirSource::new(cfg.modules_dir())),
    };

    let document = Assembler::new(template).assemble(&tree, source.as_ref()).await?;

    if stdout {
        print!("{}", document.text);
    } else {
        let path = write_versioned(&cfg.scripts_dir(), project, &document).await?;
        eprintln!("Export complete: {}", path.display());
    }

    if !document.missing.is_empty() {
        eprintln!("Missing units ({}):", document.missing.len());
        for reference in &document.missing {
            eprintln!("  - {}", reference);
        }
    }
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("notedeck configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:             {}", cfg.home.display());
    println!("  Library:          {}", cfg.library.display());
    println!("  Units:            {}", cfg.units_path().display());
    println!("  Topic index:      {}", cfg.topics_path().display());
    println!("  Library document: {}", cfg.library_document().display());
    println!("  Modules:          {}", cfg.modules_dir().display());
    println!("  Projects:         {}", cfg.projects_dir().display());
    println!("  Scripts:          {}", cfg.scripts_dir().display());
    println!();
    println!("Registry:");
    println!("  Auto-repair topics: {}", cfg.auto_repair);
    println!();
    println!("Blocks:");
    println!("  Generic kind: {}", cfg.generic_kind);
    if cfg.extra_kinds.is_empty() {
        println!("  Extra kinds:  (none)");
    } else {
        println!("  Extra kinds:  {}", cfg.extra_kinds.join(", "));
    }
    if let Some(template) = &cfg.export_template {
        println!();
        println!("Export template: {}", template.display());
    }

    Ok(())
}
