//! Unit records: one reusable content fragment plus its metadata.
//!
//! Field names on disk keep the historical `Library.json` spelling so
//! existing collections load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeckError, DeckResult};

/// Body written for units whose content has not been filled in yet.
pub const BODY_PLACEHOLDER: &str = "% TODO: fill in content";

/// Returns true when a body carries no real content yet.
pub fn is_placeholder_body(body: &str) -> bool {
    let body = body.trim();
    body.is_empty() || body.contains(BODY_PLACEHOLDER)
}

/// Opaque unit identifier, assigned once at creation and never changed.
///
/// The default value is empty and marks a stored record that predates
/// opaque ids; the store assigns those on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_assigned(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of content a unit holds. Each kind doubles as a LaTeX environment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    #[serde(rename = "DEF")]
    Definition,
    #[serde(rename = "EXA")]
    Example,
    #[serde(rename = "PROP")]
    Proposition,
    #[serde(rename = "THEO")]
    Theorem,
    #[serde(rename = "KORO")]
    Corollary,
    #[serde(rename = "LEM")]
    Lemma,
    #[serde(rename = "REM")]
    Remark,
    #[serde(rename = "STUD")]
    Study,
    #[serde(rename = "PRF")]
    Proof,
    #[serde(rename = "CONC")]
    Concept,
}

impl ContentKind {
    pub const ALL: [ContentKind; 10] = [
        ContentKind::Definition,
        ContentKind::Example,
        ContentKind::Proposition,
        ContentKind::Theorem,
        ContentKind::Corollary,
        ContentKind::Lemma,
        ContentKind::Remark,
        ContentKind::Study,
        ContentKind::Proof,
        ContentKind::Concept,
    ];

    /// Environment name used in markup (`\begin{DEF}...`)
    pub fn env_name(&self) -> &'static str {
        match self {
            ContentKind::Definition => "DEF",
            ContentKind::Example => "EXA",
            ContentKind::Proposition => "PROP",
            ContentKind::Theorem => "THEO",
            ContentKind::Corollary => "KORO",
            ContentKind::Lemma => "LEM",
            ContentKind::Remark => "REM",
            ContentKind::Study => "STUD",
            ContentKind::Proof => "PRF",
            ContentKind::Concept => "CONC",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.env_name())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = DeckError;

    fn from_str(s: &str) -> DeckResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "def" | "definition" => Ok(ContentKind::Definition),
            "exa" | "example" => Ok(ContentKind::Example),
            "prop" | "proposition" => Ok(ContentKind::Proposition),
            "theo" | "theorem" => Ok(ContentKind::Theorem),
            "koro" | "corollary" => Ok(ContentKind::Corollary),
            "lem" | "lemma" => Ok(ContentKind::Lemma),
            "rem" | "remark" => Ok(ContentKind::Remark),
            "stud" | "study" => Ok(ContentKind::Study),
            "prf" | "proof" => Ok(ContentKind::Proof),
            "conc" | "concept" => Ok(ContentKind::Concept),
            _ => Err(DeckError::UnknownContentKind(s.to_string())),
        }
    }
}

/// Numeric annotation fields, the only fields open to per-field updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationField {
    Layer,
    Component,
    RelationIntensity,
    RelationId,
    Continuity,
    ContinuityScore,
    ConnectivityScore,
}

impl AnnotationField {
    pub const ALL: [AnnotationField; 7] = [
        AnnotationField::Layer,
        AnnotationField::Component,
        AnnotationField::RelationIntensity,
        AnnotationField::RelationId,
        AnnotationField::Continuity,
        AnnotationField::ContinuityScore,
        AnnotationField::ConnectivityScore,
    ];

    /// Persisted key name
    pub fn key(&self) -> &'static str {
        match self {
            AnnotationField::Layer => "Layer",
            AnnotationField::Component => "Comp",
            AnnotationField::RelationIntensity => "RelInt",
            AnnotationField::RelationId => "RelId",
            AnnotationField::Continuity => "Cont",
            AnnotationField::ContinuityScore => "Cint",
            AnnotationField::ConnectivityScore => "CID",
        }
    }
}

impl std::fmt::Display for AnnotationField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for AnnotationField {
    type Err = DeckError;

    /// Accepts persisted keys case-insensitively. Anything else, including
    /// identity fields like `Subject` or `UnitID`, is rejected.
    fn from_str(s: &str) -> DeckResult<Self> {
        AnnotationField::ALL
            .into_iter()
            .find(|field| field.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DeckError::FieldNotAllowed(s.to_string()))
    }
}

/// Optional numeric annotations. Absent values stay `null` on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(rename = "Layer", default)]
    pub layer: Option<f64>,
    #[serde(rename = "Comp", default)]
    pub component: Option<f64>,
    #[serde(rename = "RelInt", default)]
    pub relation_intensity: Option<f64>,
    #[serde(rename = "RelId", default)]
    pub relation_id: Option<f64>,
    #[serde(rename = "Cont", default)]
    pub continuity: Option<f64>,
    #[serde(rename = "Cint", default)]
    pub continuity_score: Option<f64>,
    #[serde(rename = "CID", default)]
    pub connectivity_score: Option<f64>,
}

impl Annotations {
    pub fn get(&self, field: AnnotationField) -> Option<f64> {
        *self.slot(field)
    }

    pub fn set(&mut self, field: AnnotationField, value: Option<f64>) {
        *self.slot_mut(field) = value;
    }

    fn slot(&self, field: AnnotationField) -> &Option<f64> {
        match field {
            AnnotationField::Layer => &self.layer,
            AnnotationField::Component => &self.component,
            AnnotationField::RelationIntensity => &self.relation_intensity,
            AnnotationField::RelationId => &self.relation_id,
            AnnotationField::Continuity => &self.continuity,
            AnnotationField::ContinuityScore => &self.continuity_score,
            AnnotationField::ConnectivityScore => &self.connectivity_score,
        }
    }

    fn slot_mut(&mut self, field: AnnotationField) -> &mut Option<f64> {
        match field {
            AnnotationField::Layer => &mut self.layer,
            AnnotationField::Component => &mut self.component,
            AnnotationField::RelationIntensity => &mut self.relation_intensity,
            AnnotationField::RelationId => &mut self.relation_id,
            AnnotationField::Continuity => &mut self.continuity,
            AnnotationField::ContinuityScore => &mut self.continuity_score,
            AnnotationField::ConnectivityScore => &mut self.connectivity_score,
        }
    }
}

fn default_body() -> String {
    BODY_PLACEHOLDER.to_string()
}

fn default_kind() -> ContentKind {
    ContentKind::Remark
}

/// One content fragment in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Stable opaque identifier
    #[serde(rename = "UID", default)]
    pub uid: UnitId,

    /// Derived `Subject-LitID-TopicOrdinal-Sequence`; recomputed on rename
    #[serde(rename = "UnitID")]
    pub unit_id: String,

    #[serde(rename = "Subject")]
    pub subject: String,

    #[serde(rename = "Topic")]
    pub topic: String,

    #[serde(rename = "ParentTopic", default)]
    pub parent_topic: Option<String>,

    /// `parent/topic`, or the bare topic when there is no parent
    #[serde(rename = "TopicPath", default)]
    pub topic_path: Option<String>,

    #[serde(rename = "LitID", default)]
    pub lit_id: String,

    #[serde(rename = "CTyp", default = "default_kind")]
    pub kind: ContentKind,

    /// Short title shown in the block header
    #[serde(rename = "Content", default)]
    pub title: String,

    #[serde(rename = "Body", default = "default_body")]
    pub body: String,

    #[serde(flatten)]
    pub annotations: Annotations,

    #[serde(rename = "CreatedAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UnitRecord {
    /// True when the body still holds the placeholder
    pub fn has_placeholder_body(&self) -> bool {
        is_placeholder_body(&self.body)
    }

    /// Matches either the opaque or the composite identifier
    pub fn is_referenced_by(&self, reference: &str) -> bool {
        self.uid.as_str() == reference || self.unit_id == reference
    }
}

/// Join a topic with its parent into a topic path
pub fn topic_path(parent: Option<&str>, topic: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}/{}", parent, topic),
        _ => topic.to_string(),
    }
}

/// Input to `UnitRegistry::create`
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub subject: String,
    pub topic: String,
    pub parent_topic: Option<String>,
    pub lit_id: String,
    pub kind: ContentKind,
    pub title: String,
    pub body: Option<String>,
    pub annotations: Annotations,
}

impl NewUnit {
    pub fn new(
        subject: impl Into<String>,
        topic: impl Into<String>,
        lit_id: impl Into<String>,
        kind: ContentKind,
        title: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            topic: topic.into(),
            parent_topic: None,
            lit_id: lit_id.into(),
            kind,
            title: title.into(),
            body: None,
            annotations: Annotations::default(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_topic = Some(parent.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_annotation(mut self, field: AnnotationField, value: f64) -> Self {
        self.annotations.set(field, Some(value));
        self
    }
}
