//! Document assembly from a structure tree.
//!
//! Missing units never abort an assembly. Each one is replaced by a visible
//! `% --- MISSING: <ref> ---` marker and reported in the result.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use super::source::UnitSource;
use crate::domain::DocumentStructure;
use crate::error::{DeckError, DeckResult};

/// Splits a template file into preamble and postamble
pub const CONTENT_MARKER: &str = "{{CONTENT}}";

const DEFAULT_PREAMBLE: &str = r"\documentclass[10pt, letterpaper]{article}
\usepackage[margin=3cm]{geometry}
\usepackage[utf8]{inputenc}
\usepackage{amsmath,amssymb,amsthm}
\begin{document}
\tableofcontents
\newpage
";

const DEFAULT_POSTAMBLE: &str = "\\end{document}\n";

/// Fixed text around the assembled content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTemplate {
    pub preamble: String,
    pub postamble: String,
}

impl Default for DocumentTemplate {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
            postamble: DEFAULT_POSTAMBLE.to_string(),
        }
    }
}

impl DocumentTemplate {
    /// Split `template` at its `{{CONTENT}}` marker
    pub fn parse(template: &str) -> DeckResult<Self> {
        let (preamble, postamble) = template
            .split_once(CONTENT_MARKER)
            .ok_or_else(|| DeckError::MarkerNotFound(CONTENT_MARKER.to_string()))?;

        Ok(Self {
            preamble: preamble.to_string(),
            postamble: postamble.to_string(),
        })
    }

    pub async fn load(path: &Path) -> DeckResult<Self> {
        Self::parse(&fs::read_to_string(path).await?)
    }

    pub fn wrap(&self, content: &str) -> String {
        let mut out = String::with_capacity(self.preamble.len() + content.len() + self.postamble.len() + 4);
        out.push_str(&self.preamble);
        if !self.preamble.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out.push_str(content);
        out.push_str("\n\n");
        out.push_str(&self.postamble);
        out
    }
}

/// Assembled text plus what could and could not be resolved
#[derive(Debug, Clone, Serialize)]
pub struct AssembledDocument {
    pub text: String,
    pub resolved: usize,
    /// References with no stored body, in document order
    pub missing: Vec<String>,
}

impl AssembledDocument {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn start_marker(reference: &str) -> String {
    format!("% --- START: {} ---", reference)
}

pub fn end_marker(reference: &str) -> String {
    format!("% --- END: {} ---", reference)
}

pub fn missing_marker(reference: &str) -> String {
    format!("% --- MISSING: {} ---", reference)
}

#[derive(Debug, Clone, Default)]
pub struct Assembler {
    template: DocumentTemplate,
}

impl Assembler {
    pub fn new(template: DocumentTemplate) -> Self {
        Self { template }
    }

    /// Walk sections and subsections in order, emitting headings and one
    /// framed piece per unit reference.
    ///
    /// Errors from `source` itself (unreadable files) abort the assembly;
    /// a reference that simply does not resolve does not.
    pub async fn assemble(
        &self,
        tree: &DocumentStructure,
        source: &dyn UnitSource,
    ) -> DeckResult<AssembledDocument> {
        let mut pieces: Vec<String> = Vec::new();
        let mut resolved = 0;
        let mut missing = Vec::new();

        for section in &tree.structure {
            pieces.push(format!("\\section{{{}}}", section.name));

            for subsection in &section.subsections {
                pieces.push(format!("\\subsection{{{}}}", subsection.name));

                for reference in &subsection.unit_refs {
                    match source.fetch(reference).await? {
                        Some(text) => {
                            pieces.push(format!(
                                "{}\n{}\n{}",
                                start_marker(reference),
                                text.trim(),
                                end_marker(reference)
                            ));
                            resolved += 1;
                        }
                        None => {
                            warn!(reference = %reference, source = source.name(), "Unit missing from assembly");
                            pieces.push(missing_marker(reference));
                            missing.push(reference.clone());
                        }
                    }
                }
            }
        }

        debug!(pieces = pieces.len(), "Assembled pieces");
        Ok(AssembledDocument {
            text: self.template.wrap(&pieces.join("\n\n")),
            resolved,
            missing,
        })
    }
}

/// Read a structure tree from a project file
pub async fn load_structure(path: &Path) -> DeckResult<DocumentStructure> {
    let content = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// `<scripts_dir>/<project>_v<N>.tex` for the first N (from 1) not taken
pub async fn next_version_path(scripts_dir: &Path, project: &str) -> DeckResult<PathBuf> {
    let mut version = 1u32;
    loop {
        let candidate = scripts_dir.join(format!("{}_v{}.tex", project, version));
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        version += 1;
    }
}

/// Write an assembled document to the next free versioned path
pub async fn write_versioned(
    scripts_dir: &Path,
    project: &str,
    document: &AssembledDocument,
) -> DeckResult<PathBuf> {
    fs::create_dir_all(scripts_dir).await?;
    let path = next_version_path(scripts_dir, project).await?;
    fs::write(&path, &document.text).await?;

    info!(
        path = %path.display(),
        resolved = document.resolved,
        missing = document.missing.len(),
        "Wrote assembled document"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Section, Subsection};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct MapSource(HashMap<String, String>);

    #[async_trait]
    impl UnitSource for MapSource {
        fn name(&self) -> &str {
            "map"
        }

        async fn fetch(&self, reference: &str) -> DeckResult<Option<String>> {
            Ok(self.0.get(reference).cloned())
        }
    }

    fn tree() -> DocumentStructure {
        DocumentStructure::new().with_section(
            Section::new("Analysis")
                .with_subsection(Subsection::new("Limits").with_units(["A-1-01-01", "A-1-01-09"])),
        )
    }

    #[tokio::test]
    async fn test_missing_unit_degrades() {
        let source = MapSource(HashMap::from([(
            "A-1-01-01".to_string(),
            "\\begin{DEF}{A-1-01-01}{Limit}\nx\n\\end{DEF}".to_string(),
        )]));

        let doc = Assembler::default().assemble(&tree(), &source).await.unwrap();

        assert_eq!(doc.resolved, 1);
        assert_eq!(doc.missing, vec!["A-1-01-09"]);
        assert!(!doc.is_complete());
        assert!(doc.text.contains("% --- MISSING: A-1-01-09 ---"));
        assert!(doc.text.contains("% --- START: A-1-01-01 ---\n\\begin{DEF}"));

        let section = doc.text.find("\\section{Analysis}").unwrap();
        let subsection = doc.text.find("\\subsection{Limits}").unwrap();
        let unit = doc.text.find("% --- START: A-1-01-01 ---").unwrap();
        assert!(section < subsection && subsection < unit);
        assert!(doc.text.starts_with("\\documentclass"));
        assert!(doc.text.ends_with("\\end{document}\n"));
    }

    #[tokio::test]
    async fn test_custom_template() {
        let template = DocumentTemplate::parse("HEAD\n{{CONTENT}}\nFOOT\n").unwrap();
        let source = MapSource(HashMap::new());

        let doc = Assembler::new(template).assemble(&DocumentStructure::new(), &source).await.unwrap();
        assert!(doc.text.starts_with("HEAD\n"));
        assert!(doc.text.ends_with("\nFOOT\n"));
        assert!(doc.is_complete());

        assert!(matches!(
            DocumentTemplate::parse("no marker"),
            Err(DeckError::MarkerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_versioned_output() {
        let temp = TempDir::new().unwrap();
        let scripts = temp.path().join("Scripts");
        let doc = AssembledDocument {
            text: "x".to_string(),
            resolved: 0,
            missing: Vec::new(),
        };

        let first = write_versioned(&scripts, "EFT1", &doc).await.unwrap();
        let second = write_versioned(&scripts, "EFT1", &doc).await.unwrap();

        assert_eq!(first, scripts.join("EFT1_v1.tex"));
        assert_eq!(second, scripts.join("EFT1_v2.tex"));
        assert_eq!(next_version_path(&scripts, "EFT1").await.unwrap(), scripts.join("EFT1_v3.tex"));
    }
}
