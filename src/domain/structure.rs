//! Document structure trees: sections, subsections and unit references.
//!
//! A structure is a rendering instruction supplied per assembly request.

use serde::{Deserialize, Serialize};

/// Ordered sections of a document to assemble
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    #[serde(default)]
    pub structure: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,

    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsection {
    pub name: String,

    /// Opaque or composite unit identifiers, in output order
    #[serde(rename = "unitIDs", default)]
    pub unit_refs: Vec<String>,
}

impl DocumentStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.structure.push(section);
        self
    }
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subsections: Vec::new(),
        }
    }

    pub fn with_subsection(mut self, subsection: Subsection) -> Self {
        self.subsections.push(subsection);
        self
    }
}

impl Subsection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit_refs: Vec::new(),
        }
    }

    pub fn with_units(mut self, refs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.unit_refs.extend(refs.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_file() {
        let json = r#"{
            "structure": [
                {"name": "Analysis", "subsections": [
                    {"name": "Limits", "unitIDs": ["EFT1-K25-01-01", "EFT1-K25-01-02"]}
                ]},
                {"name": "Empty"}
            ]
        }"#;

        let tree: DocumentStructure = serde_json::from_str(json).unwrap();
        assert_eq!(tree.structure.len(), 2);
        assert!(tree.structure[1].subsections.is_empty());
        assert_eq!(
            tree.structure[0].subsections[0].unit_refs,
            vec!["EFT1-K25-01-01", "EFT1-K25-01-02"]
        );
    }
}
