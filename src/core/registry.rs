//! Unit registry: the authoritative, ordered collection of unit records.
//!
//! Every identifier-changing operation takes the topic index explicitly, so
//! the pair stays consistent inside a single store transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::allocator::{allocate, allocate_excluding};
use super::topic_index::TopicIndex;
use crate::domain::{
    AnnotationField, CompositeId, ContentKind, NewUnit, UnitId, UnitRecord, BODY_PLACEHOLDER,
};
use crate::error::{DeckError, DeckResult};

/// How the registry reacts to topics missing from the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryPolicy {
    /// Create missing topics on `create` instead of failing `TopicNotIndexed`
    pub auto_repair: bool,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self { auto_repair: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitRegistry {
    units: Vec<UnitRecord>,
}

fn required<'a>(value: &'a str, what: &str) -> DeckResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeckError::InvalidUnit(format!("{} must not be empty", what)));
    }
    Ok(value)
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: Vec<UnitRecord>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[UnitRecord] {
        &self.units
    }

    pub fn into_units(self) -> Vec<UnitRecord> {
        self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, uid: &UnitId) -> Option<&UnitRecord> {
        self.units.iter().find(|u| &u.uid == uid)
    }

    /// Look up by opaque or composite identifier
    pub fn resolve(&self, reference: &str) -> Option<&UnitRecord> {
        self.units.iter().find(|u| u.is_referenced_by(reference))
    }

    fn get_mut(&mut self, uid: &UnitId) -> DeckResult<&mut UnitRecord> {
        self.units
            .iter_mut()
            .find(|u| &u.uid == uid)
            .ok_or_else(|| DeckError::UnitNotFound(uid.to_string()))
    }

    /// Give every record without an opaque identifier a fresh one
    pub fn assign_missing_uids(&mut self) -> usize {
        let mut assigned = 0;
        for unit in self.units.iter_mut().filter(|u| !u.uid.is_assigned()) {
            unit.uid = UnitId::generate();
            assigned += 1;
        }
        if assigned > 0 {
            info!(count = assigned, "Assigned missing opaque identifiers");
        }
        assigned
    }

    pub(crate) fn units_mut(&mut self) -> &mut [UnitRecord] {
        &mut self.units
    }

    /// Create a unit, allocating its composite identifier.
    pub fn create(
        &mut self,
        topics: &mut TopicIndex,
        fields: NewUnit,
        policy: RegistryPolicy,
    ) -> DeckResult<&UnitRecord> {
        let subject = required(&fields.subject, "subject")?;
        let topic = required(&fields.topic, "topic")?;
        let lit_id = required(&fields.lit_id, "source literature code")?;

        if policy.auto_repair {
            topics.ensure_topic(subject, topic, fields.parent_topic.as_deref());
        }
        let ordinal = topics.ordinal(subject, topic)?;
        topics.ensure_source_sub_id(subject, topic, lit_id)?;
        let (parent_topic, path) = topics
            .topic(subject, topic)
            .map(|entry| (entry.parent.clone(), entry.path(topic)))
            .unwrap_or((None, topic.to_string()));

        let sequence = allocate(subject, lit_id, ordinal, &self.units)?
            .max(topics.last_sequence(subject, topic, lit_id) + 1);
        topics.record_sequence(subject, topic, lit_id, sequence);
        let unit_id = CompositeId::new(subject, lit_id, ordinal, sequence).to_string();

        let record = UnitRecord {
            uid: UnitId::generate(),
            unit_id,
            subject: subject.to_string(),
            topic: topic.to_string(),
            parent_topic,
            topic_path: Some(path),
            lit_id: lit_id.to_string(),
            kind: fields.kind,
            title: fields.title.trim().to_string(),
            body: fields.body.unwrap_or_else(|| BODY_PLACEHOLDER.to_string()),
            annotations: fields.annotations,
            created_at: Some(Utc::now()),
        };

        info!(uid = %record.uid, unit = %record.unit_id, "Created unit");
        self.units.push(record);
        Ok(&self.units[self.units.len() - 1])
    }

    /// Replace one annotation field. `field` must name an annotation.
    pub fn update_annotation(
        &mut self,
        uid: &UnitId,
        field: &str,
        value: Option<f64>,
    ) -> DeckResult<()> {
        let field: AnnotationField = field.parse()?;
        let unit = self.get_mut(uid)?;
        unit.annotations.set(field, value);

        debug!(uid = %uid, field = %field, ?value, "Updated annotation");
        Ok(())
    }

    /// Change title and/or kind without renumbering
    pub fn update_content_meta(
        &mut self,
        uid: &UnitId,
        title: Option<&str>,
        kind: Option<ContentKind>,
    ) -> DeckResult<()> {
        let unit = self.get_mut(uid)?;
        if let Some(title) = title {
            unit.title = title.trim().to_string();
        }
        if let Some(kind) = kind {
            unit.kind = kind;
        }

        debug!(uid = %uid, "Updated content metadata");
        Ok(())
    }

    /// Replace the stored body
    pub fn update_body(&mut self, uid: &UnitId, body: &str) -> DeckResult<()> {
        let unit = self.get_mut(uid)?;
        unit.body = body.trim().to_string();
        Ok(())
    }

    /// Move a unit to another subject/topic, recomputing its composite
    /// identifier. The opaque identifier is unchanged.
    pub fn rename(
        &mut self,
        topics: &mut TopicIndex,
        uid: &UnitId,
        new_subject: &str,
        new_topic: &str,
        new_parent: Option<&str>,
    ) -> DeckResult<String> {
        let subject = required(new_subject, "subject")?;
        let topic = required(new_topic, "topic")?;
        let current = self
            .get(uid)
            .ok_or_else(|| DeckError::UnitNotFound(uid.to_string()))?;
        let lit_id = current.lit_id.clone();
        let same_group = current.subject == subject && current.topic == topic;
        let current_id = current.unit_id.clone();

        let resolved = topics.ensure_topic(subject, topic, new_parent);
        topics.ensure_source_sub_id(subject, topic, &lit_id)?;
        let parent = topics.topic(subject, topic).and_then(|t| t.parent.clone());

        // Staying in the same group keeps the current slot
        let own_slot = CompositeId::parse(&current_id)
            .ok()
            .filter(|id| same_group && id.topic_ordinal == resolved.ordinal)
            .map(|id| id.sequence);
        let sequence = match own_slot {
            Some(sequence) => sequence,
            None => allocate_excluding(subject, &lit_id, resolved.ordinal, &self.units, Some(uid))?
                .max(topics.last_sequence(subject, topic, &lit_id) + 1),
        };
        topics.record_sequence(subject, topic, &lit_id, sequence);
        let unit_id = CompositeId::new(subject, &lit_id, resolved.ordinal, sequence).to_string();

        let unit = self.get_mut(uid)?;
        let previous = std::mem::replace(&mut unit.unit_id, unit_id.clone());
        unit.subject = subject.to_string();
        unit.topic = topic.to_string();
        unit.parent_topic = parent;
        unit.topic_path = Some(resolved.topic_path);

        info!(uid = %uid, from = %previous, to = %unit_id, "Renamed unit");
        Ok(unit_id)
    }

    /// All records matching `predicate`, in registry order
    pub fn find<F>(&self, predicate: F) -> Vec<&UnitRecord>
    where
        F: Fn(&UnitRecord) -> bool,
    {
        self.units.iter().filter(|u| predicate(u)).collect()
    }

    pub fn query(&self, filter: &UnitFilter) -> Vec<&UnitRecord> {
        self.find(|u| filter.matches(u))
    }
}

/// Equality filter over unit fields
#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub lit_id: Option<String>,
    pub kind: Option<ContentKind>,
    pub annotations: Vec<(AnnotationField, f64)>,
}

impl UnitFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn lit_id(mut self, lit_id: impl Into<String>) -> Self {
        self.lit_id = Some(lit_id.into());
        self
    }

    pub fn kind(mut self, kind: ContentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn annotation(mut self, field: AnnotationField, value: f64) -> Self {
        self.annotations.push((field, value));
        self
    }

    pub fn matches(&self, unit: &UnitRecord) -> bool {
        let eq = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);

        eq(&self.subject, &unit.subject)
            && eq(&self.topic, &unit.topic)
            && eq(&self.lit_id, &unit.lit_id)
            && self.kind.map_or(true, |k| k == unit.kind)
            && self
                .annotations
                .iter()
                .all(|(field, value)| unit.annotations.get(*field) == Some(*value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(subject: &str, topic: &str, title: &str) -> NewUnit {
        NewUnit::new(subject, topic, "K25", ContentKind::Definition, title)
    }

    #[test]
    fn test_create_assigns_sequences() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let policy = RegistryPolicy::default();

        let a = registry
            .create(&mut topics, def("EFT1", "Derivatives", "a"), policy)
            .unwrap()
            .unit_id
            .clone();
        let b = registry
            .create(&mut topics, def("EFT1", "Derivatives", "b"), policy)
            .unwrap()
            .unit_id
            .clone();
        let c = registry
            .create(&mut topics, def("EFT1", "Limits", "c"), policy)
            .unwrap()
            .unit_id
            .clone();

        assert_eq!(a, "EFT1-K25-01-01");
        assert_eq!(b, "EFT1-K25-01-02");
        assert_eq!(c, "EFT1-K25-02-01");
        assert_eq!(
            topics.topic("EFT1", "Derivatives").unwrap().lit_ids["K25"],
            "EFT1-K25-01"
        );
    }

    #[test]
    fn test_create_requires_subject_and_topic() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();

        let err = registry
            .create(&mut topics, def("  ", "Limits", "x"), RegistryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, DeckError::InvalidUnit(_)));

        let err = registry
            .create(&mut topics, def("EFT1", "", "x"), RegistryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, DeckError::InvalidUnit(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_create_without_auto_repair() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let strict = RegistryPolicy { auto_repair: false };

        let err = registry
            .create(&mut topics, def("EFT1", "Limits", "x"), strict)
            .unwrap_err();
        assert!(matches!(err, DeckError::TopicNotIndexed { .. }));

        topics.ensure_topic("EFT1", "Limits", Some("Analysis"));
        let unit = registry
            .create(&mut topics, def("EFT1", "Limits", "x"), strict)
            .unwrap();
        assert_eq!(unit.topic_path.as_deref(), Some("Analysis/Limits"));
        assert_eq!(unit.parent_topic.as_deref(), Some("Analysis"));
    }

    #[test]
    fn test_update_annotation() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let uid = registry
            .create(&mut topics, def("EFT1", "Limits", "x"), RegistryPolicy::default())
            .unwrap()
            .uid
            .clone();

        registry.update_annotation(&uid, "Layer", Some(3.0)).unwrap();
        assert_eq!(registry.get(&uid).unwrap().annotations.layer, Some(3.0));

        assert!(matches!(
            registry.update_annotation(&uid, "Subject", Some(1.0)),
            Err(DeckError::FieldNotAllowed(_))
        ));
        assert!(matches!(
            registry.update_annotation(&UnitId::from("nope"), "Layer", None),
            Err(DeckError::UnitNotFound(_))
        ));
    }

    #[test]
    fn test_update_content_meta_keeps_identifier() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let unit = registry
            .create(&mut topics, def("EFT1", "Limits", "old"), RegistryPolicy::default())
            .unwrap()
            .clone();

        registry
            .update_content_meta(&unit.uid, Some("new"), Some(ContentKind::Theorem))
            .unwrap();

        let updated = registry.get(&unit.uid).unwrap();
        assert_eq!(updated.title, "new");
        assert_eq!(updated.kind, ContentKind::Theorem);
        assert_eq!(updated.unit_id, unit.unit_id);
    }

    #[test]
    fn test_rename_moves_unit() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let policy = RegistryPolicy::default();
        registry.create(&mut topics, def("EFT1", "Limits", "a"), policy).unwrap();
        let moving = registry
            .create(&mut topics, def("EFT1", "Limits", "b"), policy)
            .unwrap()
            .clone();
        registry.create(&mut topics, def("EFT1", "Series", "c"), policy).unwrap();

        let new_id = registry
            .rename(&mut topics, &moving.uid, "EFT1", "Series", Some("Analysis"))
            .unwrap();

        assert_eq!(new_id, "EFT1-K25-02-02");
        let renamed = registry.get(&moving.uid).unwrap();
        assert_eq!(renamed.topic, "Series");
        assert_eq!(renamed.topic_path.as_deref(), Some("Analysis/Series"));
        assert!(registry.resolve(&moving.unit_id).is_none());
    }

    #[test]
    fn test_rename_within_same_topic_keeps_slot() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let unit = registry
            .create(&mut topics, def("EFT1", "Limits", "a"), RegistryPolicy::default())
            .unwrap()
            .clone();

        let new_id = registry
            .rename(&mut topics, &unit.uid, "EFT1", "Limits", None)
            .unwrap();
        assert_eq!(new_id, unit.unit_id);
    }

    #[test]
    fn test_vacated_top_slot_is_not_reissued() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let policy = RegistryPolicy::default();
        registry.create(&mut topics, def("EFT1", "Limits", "a"), policy).unwrap();
        let top = registry
            .create(&mut topics, def("EFT1", "Limits", "b"), policy)
            .unwrap()
            .clone();
        assert_eq!(top.unit_id, "EFT1-K25-01-02");

        registry
            .rename(&mut topics, &top.uid, "EFT1", "Series", None)
            .unwrap();
        let next = registry
            .create(&mut topics, def("EFT1", "Limits", "c"), policy)
            .unwrap();
        assert_eq!(next.unit_id, "EFT1-K25-01-03");

        // Moving back does not take the old slot either
        let back = registry
            .rename(&mut topics, &top.uid, "EFT1", "Limits", None)
            .unwrap();
        assert_eq!(back, "EFT1-K25-01-04");
    }

    #[test]
    fn test_query_filter() {
        let mut registry = UnitRegistry::new();
        let mut topics = TopicIndex::new();
        let policy = RegistryPolicy::default();
        registry
            .create(
                &mut topics,
                def("EFT1", "Limits", "a").with_annotation(AnnotationField::Layer, 1.0),
                policy,
            )
            .unwrap();
        registry
            .create(
                &mut topics,
                NewUnit::new("EFT1", "Limits", "S23", ContentKind::Theorem, "b"),
                policy,
            )
            .unwrap();
        registry.create(&mut topics, def("QM", "Spin", "c"), policy).unwrap();

        assert_eq!(registry.query(&UnitFilter::new().subject("EFT1")).len(), 2);
        assert_eq!(
            registry
                .query(&UnitFilter::new().annotation(AnnotationField::Layer, 1.0))
                .len(),
            1
        );
        assert_eq!(
            registry
                .query(&UnitFilter::new().subject("EFT1").kind(ContentKind::Theorem))[0]
                .unit_id,
            "EFT1-S23-01-01"
        );
        assert!(registry.query(&UnitFilter::new().topic("Nope")).is_empty());
    }
}
