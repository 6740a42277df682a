//! Per-unit module files, `Module/<UnitID>.tex`, extracted from the
//! library document.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::blocks::{extract_all, render_block, Block, BlockLocator};
use crate::error::DeckResult;

/// What a module export did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleExport {
    pub written: Vec<String>,
    /// Stale module files removed before writing
    pub removed: usize,
}

fn tex_files(dir: &Path) -> DeckResult<Vec<PathBuf>> {
    let pattern = format!("{}/*.tex", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths = glob::glob(&pattern)
        .map_err(std::io::Error::other)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.into_error())?;
    paths.sort();
    Ok(paths)
}

/// Module file content for one block: comment header, then the block
pub fn render_module(block: &Block<'_>) -> String {
    let mut out = String::new();
    out.push_str("% Generated from Library.tex\n");
    out.push_str(&format!("% UnitID: {}\n", block.identifier));
    if let Some(title) = block.title {
        out.push_str(&format!("% Title: {}\n", title));
    }
    out.push_str(&format!("% Exported: {}\n\n", Utc::now().to_rfc3339()));
    out.push_str(&render_block(block.kind, block.identifier, block.title, block.body()));
    out.push('\n');
    out
}

/// Write every block of `library_text` to `<dir>/<identifier>.tex`.
///
/// This is a clean build: existing `*.tex` files in `dir` are removed first.
pub async fn export_modules(
    library_text: &str,
    locator: &dyn BlockLocator,
    dir: &Path,
) -> DeckResult<ModuleExport> {
    fs::create_dir_all(dir).await?;

    let mut export = ModuleExport::default();
    for stale in tex_files(dir)? {
        fs::remove_file(&stale).await?;
        export.removed += 1;
    }

    for block in extract_all(locator, library_text) {
        if block.identifier.is_empty() || block.identifier.contains(['/', '\\']) {
            warn!(identifier = block.identifier, "Skipping block with unusable identifier");
            continue;
        }
        let path = dir.join(format!("{}.tex", block.identifier));
        fs::write(&path, render_module(&block)).await?;
        debug!(path = %path.display(), "Wrote module");
        export.written.push(block.identifier.to_string());
    }

    info!(
        written = export.written.len(),
        removed = export.removed,
        dir = %dir.display(),
        "Exported modules"
    );
    Ok(export)
}

/// Sorted module names (file stems) in `dir`
pub fn list_modules(dir: &Path) -> DeckResult<Vec<String>> {
    Ok(tex_files(dir)?
        .iter()
        .filter_map(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .collect())
}
