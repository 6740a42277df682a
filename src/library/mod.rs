//! The on-disk library: persisted registry, topic index and documents.
//!
//! # Storage Layout
//!
//! ```text
//! <library>/
//! ├── .notedeck.lock            # Exclusive lock held by store transactions
//! ├── Library.json              # Unit records, registry order
//! ├── SubjectsTopics.json       # Topic index
//! ├── Library.tex               # Library document with the auto-managed unit region
//! ├── Module/<UnitID>.tex       # One exported block per file
//! ├── Projects/<name>.json      # Document structure trees
//! └── Scripts/<name>_v<N>.tex   # Assembled documents
//! ```

pub mod documents;
pub mod modules;
pub mod store;

pub use documents::{
    inject_from_sources, load_sources, snip, sync_library_document, DocumentStore, InjectReport,
    SyncOutcome, AUTO_END, AUTO_START,
};
pub use modules::{export_modules, list_modules, render_module, ModuleExport};
pub use store::{LibrarySnapshot, LibraryStore};
