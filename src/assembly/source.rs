//! Where assembled documents get their unit text from.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use crate::blocks::render_block;
use crate::core::UnitRegistry;
use crate::domain::is_placeholder_body;
use crate::error::DeckResult;

/// Resolves a unit reference to the text emitted for it
#[async_trait]
pub trait UnitSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Text for `reference`, or `None` when the unit or its stored body is
    /// missing. Placeholder bodies count as missing.
    async fn fetch(&self, reference: &str) -> DeckResult<Option<String>>;
}

/// Units straight from the registry, rendered as blocks
#[derive(Debug, Clone)]
pub struct RegistrySource {
    registry: UnitRegistry,
}

impl RegistrySource {
    pub fn new(registry: UnitRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl UnitSource for RegistrySource {
    fn name(&self) -> &str {
        "registry"
    }

    async fn fetch(&self, reference: &str) -> DeckResult<Option<String>> {
        let Some(unit) = self.registry.resolve(reference) else {
            return Ok(None);
        };
        if unit.has_placeholder_body() {
            return Ok(None);
        }
        Ok(Some(render_block(
            unit.kind.env_name(),
            &unit.unit_id,
            Some(unit.title.as_str()),
            &unit.body,
        )))
    }
}

/// Exported module files, `<dir>/<reference>.tex`
#[derive(Debug, Clone)]
pub struct ModuleDirSource {
    dir: PathBuf,
}

impl ModuleDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Drop the generated comment header of a module file
fn strip_header(content: &str) -> &str {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('%') {
            break;
        }
        offset += line.len();
    }
    content[offset..].trim()
}

#[async_trait]
impl UnitSource for ModuleDirSource {
    fn name(&self) -> &str {
        "modules"
    }

    async fn fetch(&self, reference: &str) -> DeckResult<Option<String>> {
        if reference.is_empty() || reference.contains(['/', '\\']) {
            warn!(reference, "Unit reference is not a module name");
            return Ok(None);
        }

        let path = self.dir.join(format!("{}.tex", reference));
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let text = strip_header(&content);
        if is_placeholder_body(text) {
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }
}
