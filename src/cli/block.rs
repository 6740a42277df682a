//! Block subcommands over a single document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use super::{print_json, read_text_arg};
use crate::blocks::{extract_all, locate, replace_body, wrap_selection, BlockDescriptor};
use crate::config;
use crate::error::DeckError;
use crate::library::DocumentStore;

/// Block subcommands
#[derive(Subcommand, Debug)]
pub enum BlockCommands {
    /// Print the span of a block
    Locate {
        document: PathBuf,

        #[arg(long)]
        kind: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        title: Option<String>,
    },

    /// Replace the body of a block, keeping kind, identifier and title
    Replace {
        document: PathBuf,

        #[arg(long)]
        kind: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        title: Option<String>,

        /// New body, or @file
        #[arg(long)]
        body: String,
    },

    /// Wrap an exact selection in a block
    Wrap {
        document: PathBuf,

        /// Exact selected text, or @file
        #[arg(long)]
        selection: String,

        #[arg(long)]
        id: String,

        /// Block kind (defaults to the configured generic kind)
        #[arg(long)]
        kind: Option<String>,
    },

    /// List all top-level blocks
    Extract {
        document: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Located<'a> {
    kind: &'a str,
    identifier: &'a str,
    title: Option<&'a str>,
    start: usize,
    end: usize,
    match_count: usize,
}

#[derive(Serialize)]
struct Extracted<'a> {
    kind: &'a str,
    identifier: &'a str,
    title: Option<&'a str>,
    body: &'a str,
}

fn descriptor(kind: String, id: String, title: Option<String>) -> BlockDescriptor {
    let desc = BlockDescriptor::new(kind, id);
    match title {
        Some(title) => desc.with_title(title),
        None => desc,
    }
}

/// Execute a block subcommand
pub async fn execute_block(command: BlockCommands) -> Result<()> {
    let cfg = config::config()?;
    let locator = cfg.locator();
    let docs = DocumentStore::new(&cfg.library);

    match command {
        BlockCommands::Locate {
            document,
            kind,
            id,
            title,
        } => {
            let text = docs
                .read(&document)
                .await
                .with_context(|| format!("Failed to read {}", document.display()))?;
            let desc = descriptor(kind, id, title);
            let found = locate(&locator, &text, &desc).ok_or_else(|| DeckError::BlockNotFound {
                kind: desc.kind.clone(),
                identifier: desc.identifier.clone(),
            })?;

            print_json(&Located {
                kind: found.block.kind,
                identifier: found.block.identifier,
                title: found.block.title,
                start: found.block.span.start,
                end: found.block.span.end,
                match_count: found.match_count,
            })
        }

        BlockCommands::Replace {
            document,
            kind,
            id,
            title,
            body,
        } => {
            let text = docs.read(&document).await?;
            let desc = descriptor(kind, id, title);
            let updated = replace_body(&locator, &text, &desc, &read_text_arg(&body)?)?;
            docs.write(&document, &updated).await?;
            println!("Replaced body of {}", desc.identifier);
            Ok(())
        }

        BlockCommands::Wrap {
            document,
            selection,
            id,
            kind,
        } => {
            let text = docs.read(&document).await?;
            let kind = kind.unwrap_or_else(|| cfg.generic_kind.clone());
            let updated = wrap_selection(&text, &read_text_arg(&selection)?, &id, &kind)?;
            docs.write(&document, &updated).await?;
            println!("Wrapped selection as {}", id);
            Ok(())
        }

        BlockCommands::Extract { document, json } => {
            let text = docs.read(&document).await?;
            let blocks: Vec<Extracted> = extract_all(&locator, &text)
                .map(|b| Extracted {
                    kind: b.kind,
                    identifier: b.identifier,
                    title: b.title,
                    body: b.body(),
                })
                .collect();

            if json {
                return print_json(&blocks);
            }
            for block in &blocks {
                println!(
                    "{:<6} {:<20} {}",
                    block.kind,
                    block.identifier,
                    block.title.unwrap_or("")
                );
            }
            println!("\n{} block(s)", blocks.len());
            Ok(())
        }
    }
}
