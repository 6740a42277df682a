//! Domain types for the unit library.
//!
//! - Unit records and their annotations
//! - Composite identifiers
//! - Document structure trees (assembly input)

pub mod composite;
pub mod structure;
pub mod unit;

pub use composite::{source_sub_id, CompositeId};
pub use structure::{DocumentStructure, Section, Subsection};
pub use unit::{
    is_placeholder_body, topic_path, AnnotationField, Annotations, ContentKind, NewUnit,
    UnitId, UnitRecord, BODY_PLACEHOLDER,
};
