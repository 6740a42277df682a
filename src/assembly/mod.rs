//! Document assembly: structure tree in, complete document text out.

pub mod assembler;
pub mod source;

pub use assembler::{
    load_structure, next_version_path, write_versioned, AssembledDocument, Assembler,
    DocumentTemplate, CONTENT_MARKER,
};
pub use source::{ModuleDirSource, RegistrySource, UnitSource};
