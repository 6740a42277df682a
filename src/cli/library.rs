//! Library maintenance subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{open_store, print_json};
use crate::blocks::extract_all;
use crate::config;
use crate::core::{duplicate_ids, realign_identifiers, relabel_source};
use crate::library::{
    export_modules, inject_from_sources, list_modules, load_sources, sync_library_document,
    DocumentStore,
};

/// Library subcommands
#[derive(Subcommand, Debug)]
pub enum LibraryCommands {
    /// Add placeholder blocks for registry units missing from Library.tex
    Sync,

    /// Copy bodies of generic blocks in source documents into Library.tex
    Inject {
        /// Directory of source documents (default: <library>/Sources)
        #[arg(long)]
        sources: Option<PathBuf>,
    },

    /// Export every block of Library.tex to Module/<UnitID>.tex
    Modules {
        /// Only list existing modules
        #[arg(long)]
        list: bool,
    },

    /// Rename a source literature code within a subject
    Relabel {
        subject: String,
        old_lit: String,
        new_lit: String,
    },

    /// Recompute composite identifiers from the topic index
    Realign,

    /// Report duplicate identifiers
    Check,
}

/// Execute a library subcommand
pub async fn execute_library(command: LibraryCommands) -> Result<()> {
    let cfg = config::config()?;
    let store = open_store()?;
    let locator = cfg.locator();
    let docs = DocumentStore::new(&cfg.library);
    let library_doc = cfg.library_document();

    match command {
        LibraryCommands::Sync => {
            let text = docs.read_or_empty(&library_doc).await?;
            let snapshot = store.load().await?;
            let outcome = sync_library_document(&text, snapshot.registry.units(), &locator)?;

            if outcome.text != text {
                docs.write(&library_doc, &outcome.text).await?;
            }
            if outcome.added > 0 {
                println!("Added {} unit block(s) to {}", outcome.added, library_doc.display());
            } else {
                println!("No missing units, {} unchanged", library_doc.display());
            }
            Ok(())
        }

        LibraryCommands::Inject { sources } => {
            let dir = sources.unwrap_or_else(|| cfg.library.join("Sources"));
            let sources = load_sources(&dir)
                .await
                .with_context(|| format!("Failed to read sources from {}", dir.display()))?;
            let text = docs
                .read(&library_doc)
                .await
                .with_context(|| format!("Failed to read {}", library_doc.display()))?;

            let (updated, report) =
                inject_from_sources(&text, &sources, &locator, &cfg.generic_kind);

            if !report.injected.is_empty() {
                docs.write(&library_doc, &updated).await?;

                // Mirror injected bodies into the registry
                let bodies: Vec<(String, String)> = extract_all(&locator, &updated)
                    .filter(|b| report.injected.iter().any(|id| id == b.identifier))
                    .map(|b| (b.identifier.to_string(), b.body().to_string()))
                    .collect();
                store
                    .transaction(|snap| {
                        for (identifier, body) in &bodies {
                            if let Some(uid) = snap.registry.resolve(identifier).map(|u| u.uid.clone()) {
                                snap.registry.update_body(&uid, body)?;
                            }
                        }
                        Ok(())
                    })
                    .await?;
            }

            print_json(&report)
        }

        LibraryCommands::Modules { list } => {
            let dir = cfg.modules_dir();
            if !list {
                let text = docs
                    .read(&library_doc)
                    .await
                    .with_context(|| format!("Failed to read {}", library_doc.display()))?;
                let export = export_modules(&text, &locator, &dir).await?;
                println!(
                    "Exported {} module(s) to {} ({} stale removed)",
                    export.written.len(),
                    dir.display(),
                    export.removed
                );
                return Ok(());
            }

            for name in list_modules(&dir)? {
                println!("{}", name);
            }
            Ok(())
        }

        LibraryCommands::Relabel {
            subject,
            old_lit,
            new_lit,
        } => {
            let count = store
                .transaction(|snap| {
                    relabel_source(&mut snap.registry, &mut snap.topics, &subject, &old_lit, &new_lit)
                })
                .await?;
            println!("Relabelled {} unit(s) from {} to {}", count, old_lit, new_lit);
            Ok(())
        }

        LibraryCommands::Realign => {
            let report = store
                .transaction(|snap| realign_identifiers(&mut snap.registry, &snap.topics))
                .await?;
            print_json(&report)
        }

        LibraryCommands::Check => {
            let snapshot = store.load().await?;
            let report = duplicate_ids(snapshot.registry.units());
            print_json(&report)?;
            if !report.is_clean() {
                anyhow::bail!("Duplicate identifiers found");
            }
            Ok(())
        }
    }
}
