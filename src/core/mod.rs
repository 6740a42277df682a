//! Registry core.
//!
//! This module contains:
//! - Allocator: sequence numbers for composite identifiers
//! - TopicIndex: subject/topic ordinals and per-source sub-identifiers
//! - UnitRegistry: create, update, rename and query unit records
//! - Maintenance: bulk relabel, realign and duplicate checks

pub mod allocator;
pub mod maintenance;
pub mod registry;
pub mod topic_index;

// Re-export commonly used types
pub use allocator::{allocate, allocate_excluding};
pub use maintenance::{
    duplicate_ids, realign_identifiers, relabel_source, DuplicateReport, RealignReport,
};
pub use registry::{RegistryPolicy, UnitFilter, UnitRegistry};
pub use topic_index::{EnsureStatus, TopicEntry, TopicIndex, TopicResolution, TopicRow};
