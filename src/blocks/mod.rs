//! Locating and rewriting markup blocks inside free-form documents.
//!
//! This is not a markup parser. Blocks are found by their begin/end
//! delimiters and their interior is treated as opaque text.
//!
//! # Example
//!
//! ```ignore
//! use notedeck::blocks::{replace_body, BlockDescriptor, PatternLocator};
//!
//! let locator = PatternLocator::default();
//! let desc = BlockDescriptor::new("DEF", "EFT1-K25-01-01").with_title("Limit");
//! let text = replace_body(&locator, &text, &desc, "new body")?;
//! ```

pub mod locator;
pub mod rewrite;

pub use locator::{
    locate, Block, BlockDescriptor, BlockLocator, BlockMatch, Blocks, PatternLocator, GENERIC_KIND,
};
pub use rewrite::{extract_all, render_block, replace_body, wrap_selection};
