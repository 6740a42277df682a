//! Per-subject topic index.
//!
//! Maps subject -> topic -> {ordinal, parent, per-source sub-identifiers}.
//! Ordinals are assigned in order of first appearance and never renumbered.
//! The index is derived from the unit registry but may also hold topics
//! that no unit references yet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{source_sub_id, topic_path, CompositeId, UnitRecord};
use crate::error::{DeckError, DeckResult};

/// Whole topic index, keyed by subject code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicIndex {
    subjects: BTreeMap<String, SubjectEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectEntry {
    /// Global subject ordinal
    pub index: u32,

    #[serde(default)]
    pub topics: BTreeMap<String, TopicEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicEntry {
    /// Per-subject topic ordinal, 1-based
    pub index: u32,

    /// Set once, never overwritten while non-null
    #[serde(default)]
    pub parent: Option<String>,

    /// Source-literature code -> `Subject-LitID-OO`
    #[serde(rename = "litIDs", default)]
    pub lit_ids: BTreeMap<String, String>,

    /// Source-literature code -> highest sequence ever issued in this topic
    #[serde(rename = "lastSeq", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub last_sequences: BTreeMap<String, u32>,
}

impl TopicEntry {
    pub fn path(&self, topic: &str) -> String {
        topic_path(self.parent.as_deref(), topic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureStatus {
    Created,
    Existing,
}

/// Outcome of [`TopicIndex::ensure_topic`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicResolution {
    pub status: EnsureStatus,
    pub ordinal: u32,
    pub topic_path: String,
}

/// Flat listing row, sorted by subject then ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicRow {
    pub subject: String,
    pub parent: Option<String>,
    pub topic: String,
    pub ordinal: u32,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subject(&self, subject: &str) -> Option<&SubjectEntry> {
        self.subjects.get(subject)
    }

    pub fn topic(&self, subject: &str, topic: &str) -> Option<&TopicEntry> {
        self.subjects.get(subject)?.topics.get(topic)
    }

    /// Topic ordinal, or `TopicNotIndexed`
    pub fn ordinal(&self, subject: &str, topic: &str) -> DeckResult<u32> {
        self.topic(subject, topic)
            .map(|entry| entry.index)
            .ok_or_else(|| DeckError::TopicNotIndexed {
                subject: subject.to_string(),
                topic: topic.to_string(),
            })
    }

    /// Register a topic (and its subject) if unseen; backfill a missing parent.
    pub fn ensure_topic(
        &mut self,
        subject: &str,
        topic: &str,
        parent: Option<&str>,
    ) -> TopicResolution {
        let parent = non_empty(parent);

        let next_subject = self.subjects.values().map(|s| s.index).max().unwrap_or(0) + 1;
        let subject_entry = self
            .subjects
            .entry(subject.to_string())
            .or_insert_with(|| {
                debug!(subject, index = next_subject, "Indexed new subject");
                SubjectEntry {
                    index: next_subject,
                    topics: BTreeMap::new(),
                }
            });

        let next_topic = subject_entry.topics.values().map(|t| t.index).max().unwrap_or(0) + 1;
        let mut status = EnsureStatus::Existing;
        let entry = subject_entry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| {
                status = EnsureStatus::Created;
                debug!(subject, topic, index = next_topic, "Indexed new topic");
                TopicEntry {
                    index: next_topic,
                    parent: parent.map(str::to_string),
                    lit_ids: BTreeMap::new(),
                    last_sequences: BTreeMap::new(),
                }
            });

        if entry.parent.is_none() {
            entry.parent = parent.map(str::to_string);
        }

        TopicResolution {
            status,
            ordinal: entry.index,
            topic_path: entry.path(topic),
        }
    }

    /// Assign the `Subject-LitID-OO` sub-identifier for a (topic, source) pair
    /// on first sight. Idempotent.
    pub fn ensure_source_sub_id(
        &mut self,
        subject: &str,
        topic: &str,
        lit_id: &str,
    ) -> DeckResult<String> {
        let entry = self
            .subjects
            .get_mut(subject)
            .and_then(|s| s.topics.get_mut(topic))
            .ok_or_else(|| DeckError::TopicNotIndexed {
                subject: subject.to_string(),
                topic: topic.to_string(),
            })?;

        let index = entry.index;
        Ok(entry
            .lit_ids
            .entry(lit_id.to_string())
            .or_insert_with(|| source_sub_id(subject, lit_id, index))
            .clone())
    }

    /// Highest sequence issued for `(subject, topic, lit_id)`, 0 if none
    pub fn last_sequence(&self, subject: &str, topic: &str, lit_id: &str) -> u32 {
        self.topic(subject, topic)
            .and_then(|t| t.last_sequences.get(lit_id).copied())
            .unwrap_or(0)
    }

    /// Raise the high-water mark of a (topic, source) group. Never lowers it.
    pub fn record_sequence(&mut self, subject: &str, topic: &str, lit_id: &str, sequence: u32) {
        if let Some(entry) = self
            .subjects
            .get_mut(subject)
            .and_then(|s| s.topics.get_mut(topic))
        {
            let last = entry.last_sequences.entry(lit_id.to_string()).or_default();
            *last = (*last).max(sequence);
        }
    }

    /// Apply `ensure_topic` + `ensure_source_sub_id` for every unit, in order,
    /// and record each parseable sequence. Units without subject or topic
    /// are skipped.
    pub fn backfill(&mut self, units: &[UnitRecord]) {
        for unit in units {
            let subject = unit.subject.trim();
            let topic = unit.topic.trim();
            if subject.is_empty() || topic.is_empty() {
                continue;
            }

            self.ensure_topic(subject, topic, unit.parent_topic.as_deref());

            let lit_id = unit.lit_id.trim();
            if !lit_id.is_empty() {
                // Topic was ensured on the line above
                let _ = self.ensure_source_sub_id(subject, topic, lit_id);
                if let Ok(id) = CompositeId::parse(&unit.unit_id) {
                    self.record_sequence(subject, topic, lit_id, id.sequence);
                }
            }
        }
    }

    /// Regenerate the index from scratch. Order of first appearance in
    /// `units` determines ordinals, so equal inputs give equal indices.
    pub fn rebuild_from_units(units: &[UnitRecord]) -> Self {
        let mut index = Self::new();
        index.backfill(units);
        index
    }

    /// Move a source code's sub-identifiers within one subject
    pub fn relabel_source(&mut self, subject: &str, old_lit: &str, new_lit: &str) -> usize {
        let Some(entry) = self.subjects.get_mut(subject) else {
            return 0;
        };

        let mut moved = 0;
        for topic in entry.topics.values_mut() {
            if let Some(last) = topic.last_sequences.remove(old_lit) {
                topic.last_sequences.insert(new_lit.to_string(), last);
            }
            if topic.lit_ids.remove(old_lit).is_some() {
                topic
                    .lit_ids
                    .insert(new_lit.to_string(), source_sub_id(subject, new_lit, topic.index));
                moved += 1;
            }
        }
        moved
    }

    /// All topics as flat rows
    pub fn rows(&self) -> Vec<TopicRow> {
        let mut rows: Vec<TopicRow> = self
            .subjects
            .iter()
            .flat_map(|(subject, entry)| {
                entry.topics.iter().map(move |(topic, t)| TopicRow {
                    subject: subject.clone(),
                    parent: t.parent.clone(),
                    topic: topic.clone(),
                    ordinal: t.index,
                })
            })
            .collect();

        rows.sort_by(|a, b| a.subject.cmp(&b.subject).then(a.ordinal.cmp(&b.ordinal)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_topic_created_then_existing() {
        let mut index = TopicIndex::new();

        let first = index.ensure_topic("EFT1", "Derivatives", None);
        assert_eq!(first.status, EnsureStatus::Created);
        assert_eq!(first.ordinal, 1);
        assert_eq!(first.topic_path, "Derivatives");

        let second = index.ensure_topic("EFT1", "Derivatives", None);
        assert_eq!(second.status, EnsureStatus::Existing);
        assert_eq!(second.ordinal, 1);
        assert_eq!(second.topic_path, "Derivatives");
    }

    #[test]
    fn test_ordinals_per_subject() {
        let mut index = TopicIndex::new();
        index.ensure_topic("EFT1", "Limits", None);
        index.ensure_topic("EFT1", "Derivatives", None);
        let qm = index.ensure_topic("QM", "Spin", None);

        assert_eq!(index.ordinal("EFT1", "Derivatives").unwrap(), 2);
        assert_eq!(qm.ordinal, 1);
        assert_eq!(index.subject("EFT1").unwrap().index, 1);
        assert_eq!(index.subject("QM").unwrap().index, 2);
    }

    #[test]
    fn test_parent_backfilled_but_never_overwritten() {
        let mut index = TopicIndex::new();
        index.ensure_topic("EFT1", "Limits", None);

        let resolved = index.ensure_topic("EFT1", "Limits", Some("Analysis"));
        assert_eq!(resolved.topic_path, "Analysis/Limits");

        let resolved = index.ensure_topic("EFT1", "Limits", Some("Calculus"));
        assert_eq!(resolved.topic_path, "Analysis/Limits");
        assert_eq!(
            index.topic("EFT1", "Limits").unwrap().parent.as_deref(),
            Some("Analysis")
        );
    }

    #[test]
    fn test_source_sub_id_is_idempotent() {
        let mut index = TopicIndex::new();
        index.ensure_topic("EFT1", "Limits", None);
        index.ensure_topic("EFT1", "Series", None);

        assert_eq!(index.ensure_source_sub_id("EFT1", "Series", "K25").unwrap(), "EFT1-K25-02");
        assert_eq!(index.ensure_source_sub_id("EFT1", "Series", "K25").unwrap(), "EFT1-K25-02");
        assert!(matches!(
            index.ensure_source_sub_id("EFT1", "Missing", "K25"),
            Err(DeckError::TopicNotIndexed { .. })
        ));
    }

    #[test]
    fn test_ordinals_survive_topic_removal_in_json() {
        let json = r#"{"EFT1": {"index": 1, "topics": {
            "Series": {"index": 3, "parent": null, "litIDs": {}}
        }}}"#;
        let mut index: TopicIndex = serde_json::from_str(json).unwrap();

        let resolved = index.ensure_topic("EFT1", "Integrals", None);
        assert_eq!(resolved.ordinal, 4);
    }

    #[test]
    fn test_sequence_high_water_mark() {
        let mut index = TopicIndex::new();
        index.ensure_topic("EFT1", "Limits", None);
        assert_eq!(index.last_sequence("EFT1", "Limits", "K25"), 0);

        index.record_sequence("EFT1", "Limits", "K25", 4);
        index.record_sequence("EFT1", "Limits", "K25", 2);
        assert_eq!(index.last_sequence("EFT1", "Limits", "K25"), 4);

        index.relabel_source("EFT1", "K25", "K26");
        assert_eq!(index.last_sequence("EFT1", "Limits", "K26"), 4);
        assert_eq!(index.last_sequence("EFT1", "Limits", "K25"), 0);

        // Older files without the field load with no marks
        let json = r#"{"EFT1": {"index": 1, "topics": {
            "Series": {"index": 1, "parent": null, "litIDs": {"K25": "EFT1-K25-01"}}
        }}}"#;
        let index: TopicIndex = serde_json::from_str(json).unwrap();
        assert_eq!(index.last_sequence("EFT1", "Series", "K25"), 0);
    }

    #[test]
    fn test_rows_sorted() {
        let mut index = TopicIndex::new();
        index.ensure_topic("QM", "Spin", None);
        index.ensure_topic("EFT1", "Series", Some("Analysis"));
        index.ensure_topic("EFT1", "Limits", None);

        let rows = index.rows();
        assert_eq!(rows[0].topic, "Series");
        assert_eq!(rows[0].parent.as_deref(), Some("Analysis"));
        assert_eq!(rows[1].topic, "Limits");
        assert_eq!(rows[2].subject, "QM");
    }
}
