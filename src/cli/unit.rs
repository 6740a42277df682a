//! Unit and topic subcommands.
//!
//! Every mutation goes through one store transaction.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{open_store, print_json, read_text_arg};
use crate::config;
use crate::core::{TopicIndex, UnitFilter, UnitRegistry};
use crate::domain::{AnnotationField, ContentKind, NewUnit, UnitId, UnitRecord};
use crate::error::DeckError;
use crate::library::{snip, DocumentStore};

/// Unit subcommands
#[derive(Subcommand, Debug)]
pub enum UnitCommands {
    /// Create a unit and allocate its composite identifier
    Create {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        topic: String,

        /// Source literature code
        #[arg(long)]
        lit: String,

        /// Content kind (DEF, EXA, THEO, ...)
        #[arg(long, default_value = "REM")]
        kind: String,

        #[arg(long, default_value = "")]
        title: String,

        /// Parent topic
        #[arg(long)]
        parent: Option<String>,

        /// Body text, or @file to read it from a file
        #[arg(long)]
        body: Option<String>,
    },

    /// Create a unit from a selection in a document and wrap the selection
    Snip {
        /// Document path (relative to the library directory)
        document: PathBuf,

        /// Exact selected text, or @file
        #[arg(long)]
        selection: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        topic: String,

        #[arg(long)]
        lit: String,

        #[arg(long, default_value = "REM")]
        kind: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long)]
        parent: Option<String>,
    },

    /// Set or clear an annotation field (Layer, Comp, RelInt, RelId, Cont, Cint, CID)
    Annotate {
        /// UID or UnitID
        unit: String,

        field: String,

        /// New value; omit to clear
        value: Option<f64>,
    },

    /// Move a unit to another subject/topic
    Rename {
        unit: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        topic: String,

        #[arg(long)]
        parent: Option<String>,
    },

    /// Change title and/or content kind
    Meta {
        unit: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        kind: Option<String>,
    },

    /// List units matching all given filters
    List {
        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        topic: Option<String>,

        #[arg(long)]
        lit: Option<String>,

        #[arg(long)]
        kind: Option<String>,

        /// FIELD=VALUE annotation filter, repeatable
        #[arg(long = "where")]
        annotations: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one unit as JSON
    Show { unit: String },
}

/// Topic subcommands
#[derive(Subcommand, Debug)]
pub enum TopicCommands {
    /// Register a topic if it is not indexed yet
    Ensure {
        subject: String,

        topic: String,

        #[arg(long)]
        parent: Option<String>,
    },

    /// Regenerate the topic index from the registry
    Rebuild,

    /// Add topics and sub-identifiers missing from the index
    Backfill,

    /// List indexed topics
    List {
        #[arg(long)]
        json: bool,
    },
}

fn uid_of(registry: &UnitRegistry, reference: &str) -> Result<UnitId, DeckError> {
    registry
        .resolve(reference)
        .map(|u| u.uid.clone())
        .ok_or_else(|| DeckError::UnitNotFound(reference.to_string()))
}

fn parse_annotation_filter(raw: &str) -> Result<(AnnotationField, f64)> {
    let (field, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected FIELD=VALUE, got: {}", raw))?;
    let value = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid number in filter: {}", raw))?;
    Ok((field.parse()?, value))
}

fn print_table(units: &[&UnitRecord]) {
    if units.is_empty() {
        println!("No units found");
        return;
    }

    println!("{:<20} {:<6} {:<24} {}", "UNIT ID", "KIND", "TOPIC", "TITLE");
    println!("{}", "-".repeat(80));
    for unit in units {
        println!(
            "{:<20} {:<6} {:<24} {}",
            unit.unit_id,
            unit.kind.env_name(),
            unit.topic_path.as_deref().unwrap_or(&unit.topic),
            unit.title
        );
    }
    println!("\n{} unit(s)", units.len());
}

/// Execute a unit subcommand
pub async fn execute_unit(command: UnitCommands) -> Result<()> {
    let cfg = config::config()?;
    let store = open_store()?;
    let policy = cfg.policy();

    match command {
        UnitCommands::Create {
            subject,
            topic,
            lit,
            kind,
            title,
            parent,
            body,
        } => {
            let mut fields = NewUnit::new(subject, topic, lit, kind.parse()?, title);
            if let Some(parent) = parent {
                fields = fields.with_parent(parent);
            }
            if let Some(body) = body {
                fields = fields.with_body(read_text_arg(&body)?);
            }

            let record = store
                .transaction(|snap| snap.registry.create(&mut snap.topics, fields, policy).cloned())
                .await?;
            print_json(&record)
        }

        UnitCommands::Snip {
            document,
            selection,
            subject,
            topic,
            lit,
            kind,
            title,
            parent,
        } => {
            let selection = read_text_arg(&selection)?;
            let mut fields = NewUnit::new(subject, topic, lit, kind.parse()?, title);
            if let Some(parent) = parent {
                fields = fields.with_parent(parent);
            }

            let docs = DocumentStore::new(&cfg.library);
            let record = snip(&store, &docs, &document, &selection, fields, policy, &cfg.generic_kind)
                .await
                .with_context(|| format!("Failed to snip from {}", document.display()))?;
            print_json(&record)
        }

        UnitCommands::Annotate { unit, field, value } => {
            store
                .transaction(|snap| {
                    let uid = uid_of(&snap.registry, &unit)?;
                    snap.registry.update_annotation(&uid, &field, value)
                })
                .await?;
            println!("Updated {} on {}", field, unit);
            Ok(())
        }

        UnitCommands::Rename {
            unit,
            subject,
            topic,
            parent,
        } => {
            let new_id = store
                .transaction(|snap| {
                    let uid = uid_of(&snap.registry, &unit)?;
                    snap.registry
                        .rename(&mut snap.topics, &uid, &subject, &topic, parent.as_deref())
                })
                .await?;
            println!("{}", new_id);
            Ok(())
        }

        UnitCommands::Meta { unit, title, kind } => {
            let kind: Option<ContentKind> = kind.map(|k| k.parse()).transpose()?;
            store
                .transaction(|snap| {
                    let uid = uid_of(&snap.registry, &unit)?;
                    snap.registry.update_content_meta(&uid, title.as_deref(), kind)
                })
                .await?;
            println!("Updated {}", unit);
            Ok(())
        }

        UnitCommands::List {
            subject,
            topic,
            lit,
            kind,
            annotations,
            json,
        } => {
            let mut filter = UnitFilter::new();
            filter.subject = subject;
            filter.topic = topic;
            filter.lit_id = lit;
            if let Some(kind) = kind {
                filter = filter.kind(kind.parse()?);
            }
            for raw in &annotations {
                let (field, value) = parse_annotation_filter(raw)?;
                filter = filter.annotation(field, value);
            }

            let snapshot = store.load().await?;
            let units = snapshot.registry.query(&filter);
            if json {
                print_json(&units)
            } else {
                print_table(&units);
                Ok(())
            }
        }

        UnitCommands::Show { unit } => {
            let snapshot = store.load().await?;
            let record = snapshot
                .registry
                .resolve(&unit)
                .ok_or_else(|| DeckError::UnitNotFound(unit.clone()))?;
            print_json(record)
        }
    }
}

/// Execute a topic subcommand
pub async fn execute_topic(command: TopicCommands) -> Result<()> {
    let store = open_store()?;

    match command {
        TopicCommands::Ensure {
            subject,
            topic,
            parent,
        } => {
            let resolution = store
                .transaction(|snap| Ok(snap.topics.ensure_topic(&subject, &topic, parent.as_deref())))
                .await?;
            print_json(&resolution)
        }

        TopicCommands::Rebuild => {
            let rows = store
                .transaction(|snap| {
                    snap.topics = TopicIndex::rebuild_from_units(snap.registry.units());
                    Ok(snap.topics.rows().len())
                })
                .await?;
            println!("Rebuilt topic index: {} topic(s)", rows);
            Ok(())
        }

        TopicCommands::Backfill => {
            let (before, after) = store
                .transaction(|snap| {
                    let before = snap.topics.rows().len();
                    snap.topics.backfill(snap.registry.units());
                    Ok((before, snap.topics.rows().len()))
                })
                .await?;
            println!("Backfilled topic index: {} new topic(s)", after - before);
            Ok(())
        }

        TopicCommands::List { json } => {
            let snapshot = store.load().await?;
            let rows = snapshot.topics.rows();
            if json {
                return print_json(&rows);
            }

            println!("{:<10} {:<4} {:<24} {}", "SUBJECT", "#", "PARENT", "TOPIC");
            println!("{}", "-".repeat(70));
            for row in &rows {
                println!(
                    "{:<10} {:<4} {:<24} {}",
                    row.subject,
                    row.ordinal,
                    row.parent.as_deref().unwrap_or("-"),
                    row.topic
                );
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotation_filter() {
        let (field, value) = parse_annotation_filter("layer=2").unwrap();
        assert_eq!(field, AnnotationField::Layer);
        assert_eq!(value, 2.0);

        assert!(parse_annotation_filter("Layer").is_err());
        assert!(parse_annotation_filter("Subject=1").is_err());
        assert!(parse_annotation_filter("Layer=high").is_err());
    }
}
