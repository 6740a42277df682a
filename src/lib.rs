//! notedeck - registry and assembler for reusable LaTeX content units
//!
//! A unit is one fragment of course material (definition, theorem,
//! example, ...) with a stable opaque id and a composite id
//! `Subject-LitID-TopicOrdinal-Sequence` derived from where it lives.
//!
//! # Architecture
//!
//! - The unit registry and topic index are plain in-memory values. They are
//!   loaded from and saved to JSON by a `LibraryStore`, one transaction per
//!   mutation, and passed explicitly into every operation.
//! - Documents are raw text. Blocks (`\begin{KIND}{ID}{TITLE} ... \end{KIND}`)
//!   are found by span detection behind the `BlockLocator` trait.
//! - Assembly walks a structure tree and pulls unit text from a `UnitSource`.
//!   Missing units become visible markers; they never abort the output.
//!
//! # Modules
//!
//! - `domain`: Unit records, composite ids, structure trees
//! - `core`: Allocator, TopicIndex, UnitRegistry, bulk maintenance
//! - `blocks`: Block location and rewriting
//! - `assembly`: Document assembly
//! - `library`: Persistence, library document and module files
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a unit
//! notedeck unit create --subject EFT1 --topic Derivatives --lit K25 --kind DEF --title "Derivative"
//!
//! # Bring Library.tex in line with the registry
//! notedeck library sync
//!
//! # Assemble Projects/EFT1.json into Scripts/EFT1_v<N>.tex
//! notedeck assemble EFT1
//! ```

pub mod assembly;
pub mod blocks;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod library;

// Re-export main types at crate root for convenience
pub use assembly::{AssembledDocument, Assembler, UnitSource};
pub use blocks::{BlockDescriptor, BlockLocator, PatternLocator};
pub use crate::core::{RegistryPolicy, TopicIndex, UnitFilter, UnitRegistry};
pub use domain::{ContentKind, DocumentStructure, NewUnit, UnitId, UnitRecord};
pub use error::{DeckError, DeckResult};
pub use library::{LibrarySnapshot, LibraryStore};
