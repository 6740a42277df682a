//! Composite unit identifiers: `Subject-LitID-TopicOrdinal-Sequence`.

use crate::error::{DeckError, DeckResult};

/// Decoded composite identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId {
    pub subject: String,
    pub lit_id: String,
    pub topic_ordinal: u32,
    pub sequence: u32,
}

impl CompositeId {
    pub fn new(
        subject: impl Into<String>,
        lit_id: impl Into<String>,
        topic_ordinal: u32,
        sequence: u32,
    ) -> Self {
        Self {
            subject: subject.into(),
            lit_id: lit_id.into(),
            topic_ordinal,
            sequence,
        }
    }

    /// Parse a composite identifier. Exactly four dash-separated components
    /// are required and the last two must be numeric.
    pub fn parse(raw: &str) -> DeckResult<Self> {
        let malformed = || DeckError::MalformedIdentifier(raw.to_string());

        let parts: Vec<&str> = raw.trim().split('-').collect();
        let [subject, lit_id, topic, sequence] = parts.as_slice() else {
            return Err(malformed());
        };
        if subject.is_empty() || lit_id.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            subject: subject.to_string(),
            lit_id: lit_id.to_string(),
            topic_ordinal: topic.parse().map_err(|_| malformed())?,
            sequence: sequence.parse().map_err(|_| malformed())?,
        })
    }

    /// The per-source topic prefix, `Subject-LitID-OO`
    pub fn topic_prefix(&self) -> String {
        source_sub_id(&self.subject, &self.lit_id, self.topic_ordinal)
    }

    /// Rewrite with two-digit ordinal and sequence (`A-1-3-2` -> `A-1-03-02`)
    pub fn normalize(raw: &str) -> DeckResult<String> {
        Ok(Self::parse(raw)?.to_string())
    }
}

impl std::fmt::Display for CompositeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.topic_prefix(), self.sequence)
    }
}

/// Per-(topic, source) sub-identifier, ordinal zero-padded to 2 digits
pub fn source_sub_id(subject: &str, lit_id: &str, topic_ordinal: u32) -> String {
    format!("{}-{}-{:02}", subject, lit_id, topic_ordinal)
}
