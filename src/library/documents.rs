//! Text documents in the library: the library document itself and any
//! source documents units are snipped from.
//!
//! Documents are addressed by a path-like key. Relative keys resolve
//! against the library directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use super::store::LibraryStore;
use crate::blocks::{extract_all, render_block, wrap_selection, BlockLocator};
use crate::core::RegistryPolicy;
use crate::domain::{is_placeholder_body, CompositeId, NewUnit, UnitRecord, BODY_PLACEHOLDER};
use crate::error::{DeckError, DeckResult};

/// Opens the auto-managed unit region of the library document
pub const AUTO_START: &str = "%-- AUTO-UNITS-START --";
/// Closes the auto-managed unit region
pub const AUTO_END: &str = "\\pagebreak";

const SKELETON_HEAD: &str = "\\documentclass[10pt, letterpaper]{article}\n\\begin{document}\n";
const SKELETON_TAIL: &str = "\\end{document}\n";

/// Reads and writes whole text buffers
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, key: impl AsRef<Path>) -> PathBuf {
        let key = key.as_ref();
        if key.is_absolute() {
            key.to_path_buf()
        } else {
            self.root.join(key)
        }
    }

    pub async fn read(&self, key: impl AsRef<Path>) -> DeckResult<String> {
        Ok(fs::read_to_string(self.resolve(key)).await?)
    }

    /// Like [`read`](Self::read), but a missing document reads as empty
    pub async fn read_or_empty(&self, key: impl AsRef<Path>) -> DeckResult<String> {
        match fs::read_to_string(self.resolve(key)).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write(&self, key: impl AsRef<Path>, text: &str) -> DeckResult<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, text).await?;
        debug!(path = %path.display(), bytes = text.len(), "Wrote document");
        Ok(())
    }
}

/// Result of a library document sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub text: String,
    pub added: usize,
}

/// Byte range of the auto region plus where its start marker line begins.
fn auto_region(text: &str) -> DeckResult<Option<(usize, std::ops::Range<usize>)>> {
    let Some(marker_at) = text.find(AUTO_START) else {
        return Ok(None);
    };
    let region_start = text[marker_at..]
        .find('\n')
        .map(|nl| marker_at + nl + 1)
        .unwrap_or(text.len());
    let region_end = text[region_start..]
        .find(AUTO_END)
        .map(|off| region_start + off)
        .ok_or_else(|| DeckError::MarkerNotFound(AUTO_END.to_string()))?;

    Ok(Some((marker_at, region_start..region_end)))
}

/// Insert an empty auto region into a document that has none
fn with_auto_region(text: &str) -> String {
    let region = format!("{}\n{}\n", AUTO_START, AUTO_END);

    if text.trim().is_empty() {
        return format!("{}{}{}", SKELETON_HEAD, region, SKELETON_TAIL);
    }
    match text.rfind("\\end{document}") {
        Some(at) => format!("{}{}{}", &text[..at], region, &text[at..]),
        None => {
            let sep = if text.ends_with('\n') { "" } else { "\n" };
            format!("{}{}{}", text, sep, region)
        }
    }
}

/// Bring the auto region of the library document in line with the
/// registry. Existing blocks are kept verbatim, units without a block get
/// a placeholder block, and the region is ordered by registry order with
/// blocks unknown to the registry last.
pub fn sync_library_document(
    text: &str,
    units: &[UnitRecord],
    locator: &dyn BlockLocator,
) -> DeckResult<SyncOutcome> {
    let text = match auto_region(text)? {
        Some(_) => text.to_string(),
        None => {
            info!("Library document has no auto region, adding one");
            with_auto_region(text)
        }
    };
    let Some((_, region)) = auto_region(&text)? else {
        return Err(DeckError::MarkerNotFound(AUTO_START.to_string()));
    };
    let auto = &text[region.clone()];

    let existing: Vec<(&str, &str)> = extract_all(locator, auto)
        .map(|b| (b.identifier, &auto[b.span]))
        .collect();

    let mut emitted: HashSet<&str> = HashSet::new();
    let mut pieces: Vec<String> = Vec::with_capacity(units.len() + existing.len());
    let mut added = 0;

    for unit in units {
        if !emitted.insert(unit.unit_id.as_str()) {
            continue;
        }
        match existing.iter().find(|(id, _)| *id == unit.unit_id) {
            Some((_, block)) => pieces.push(block.to_string()),
            None => {
                pieces.push(render_block(
                    unit.kind.env_name(),
                    &unit.unit_id,
                    Some(unit.title.as_str()),
                    BODY_PLACEHOLDER,
                ));
                added += 1;
            }
        }
    }

    // First block per registry id is already placed; everything else follows
    let mut placed: HashSet<&str> = HashSet::new();
    for (id, block) in &existing {
        if emitted.contains(id) {
            if placed.insert(*id) {
                continue;
            }
            warn!(identifier = %id, "Duplicate block in library document kept at end");
        }
        pieces.push(block.to_string());
    }

    let mut out = String::with_capacity(text.len() + added * 64);
    out.push_str(&text[..region.start]);
    for piece in &pieces {
        out.push_str(piece);
        out.push_str("\n\n");
    }
    out.push_str(&text[region.end..]);

    info!(added, blocks = pieces.len(), "Synced library document");
    Ok(SyncOutcome { text: out, added })
}

/// Per-identifier outcome of a source injection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectReport {
    pub injected: Vec<String>,
    /// Library block already holds real content
    pub skipped: Vec<String>,
    /// No library block with this identifier
    pub missing: Vec<String>,
    pub malformed: Vec<String>,
}

/// Copy bodies of `generic_kind` blocks found in `sources` into library
/// blocks that still hold the placeholder. Source identifiers are
/// normalised first (`A-1-3-2` becomes `A-1-03-02`).
pub fn inject_from_sources(
    library_text: &str,
    sources: &[(PathBuf, String)],
    locator: &dyn BlockLocator,
    generic_kind: &str,
) -> (String, InjectReport) {
    let mut text = library_text.to_string();
    let mut report = InjectReport::default();

    for (path, source) in sources {
        debug!(source = %path.display(), "Scanning source document");

        for found in extract_all(locator, source).filter(|b| b.kind == generic_kind) {
            let identifier = match CompositeId::normalize(found.identifier) {
                Ok(id) => id,
                Err(_) => {
                    warn!(identifier = found.identifier, "Malformed identifier in source");
                    report.malformed.push(found.identifier.to_string());
                    continue;
                }
            };

            let Some(target) = extract_all(locator, &text).find(|b| b.identifier == identifier)
            else {
                report.missing.push(identifier);
                continue;
            };
            if !is_placeholder_body(target.body()) {
                report.skipped.push(identifier);
                continue;
            }

            let rendered = render_block(target.kind, &identifier, target.title, found.body());
            let span = target.span.clone();
            text.replace_range(span, &rendered);
            report.injected.push(identifier);
        }
    }

    info!(
        injected = report.injected.len(),
        skipped = report.skipped.len(),
        missing = report.missing.len(),
        "Injected source bodies"
    );
    (text, report)
}

/// Read every `*.tex` file directly inside `dir`, sorted by path
pub async fn load_sources(dir: &Path) -> DeckResult<Vec<(PathBuf, String)>> {
    let pattern = format!("{}/*.tex", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths = glob::glob(&pattern)
        .map_err(std::io::Error::other)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.into_error())?;
    paths.sort();

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path).await?;
        sources.push((path, text));
    }
    Ok(sources)
}

/// Create a unit from a selected range of a document and wrap that range
/// in a block carrying the new composite identifier. The document is only
/// written after the registry transaction has committed.
pub async fn snip(
    store: &LibraryStore,
    docs: &DocumentStore,
    key: impl AsRef<Path>,
    selection: &str,
    fields: NewUnit,
    policy: RegistryPolicy,
    generic_kind: &str,
) -> DeckResult<UnitRecord> {
    let key = key.as_ref();
    let text = docs.read(key).await?;
    if selection.is_empty() || !text.contains(selection) {
        return Err(DeckError::SelectionNotFound);
    }

    let fields = fields.with_body(selection.trim());
    let record = store
        .transaction(|snap| {
            snap.registry
                .create(&mut snap.topics, fields, policy)
                .cloned()
        })
        .await?;

    let wrapped = wrap_selection(&text, selection, &record.unit_id, generic_kind)?;
    docs.write(key, &wrapped).await?;

    info!(unit = %record.unit_id, document = %key.display(), "Snipped unit");
    Ok(record)
}
