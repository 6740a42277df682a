//! Bulk maintenance over the registry and topic index.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use super::registry::UnitRegistry;
use super::topic_index::TopicIndex;
use crate::domain::{CompositeId, UnitRecord};
use crate::error::{DeckError, DeckResult};

/// Rename a source-literature code within one subject.
///
/// Rewrites `LitID` and the LitID component of each affected composite
/// identifier. Nothing is changed if any new identifier would collide.
pub fn relabel_source(
    registry: &mut UnitRegistry,
    topics: &mut TopicIndex,
    subject: &str,
    old_lit: &str,
    new_lit: &str,
) -> DeckResult<usize> {
    let mut planned = Vec::new();
    for (pos, unit) in registry.units().iter().enumerate() {
        if unit.subject == subject && unit.lit_id == old_lit {
            let mut id = CompositeId::parse(&unit.unit_id)?;
            id.lit_id = new_lit.to_string();
            planned.push((pos, id.to_string()));
        }
    }

    let moving: HashSet<usize> = planned.iter().map(|(pos, _)| *pos).collect();
    let staying: HashSet<&str> = registry
        .units()
        .iter()
        .enumerate()
        .filter(|(pos, _)| !moving.contains(pos))
        .map(|(_, u)| u.unit_id.as_str())
        .collect();
    if let Some((_, clash)) = planned.iter().find(|(_, id)| staying.contains(id.as_str())) {
        return Err(DeckError::InvalidUnit(format!(
            "relabel would duplicate identifier {}",
            clash
        )));
    }

    let units = registry.units_mut();
    for (pos, unit_id) in &planned {
        units[*pos].lit_id = new_lit.to_string();
        units[*pos].unit_id = unit_id.clone();
    }
    topics.relabel_source(subject, old_lit, new_lit);

    info!(subject, old_lit, new_lit, count = planned.len(), "Relabelled source");
    Ok(planned.len())
}

/// Outcome of [`realign_identifiers`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct RealignReport {
    pub updated: usize,
    /// Composite ids of units whose topic or source is not indexed
    pub unindexed: Vec<String>,
}

/// Recompute every composite identifier prefix from the topic index,
/// keeping each unit's sequence. Parent and topic path are refreshed too.
///
/// All new identifiers are planned first. Nothing is changed if two units
/// would end up with the same identifier.
pub fn realign_identifiers(
    registry: &mut UnitRegistry,
    topics: &TopicIndex,
) -> DeckResult<RealignReport> {
    let mut report = RealignReport::default();
    let mut planned = Vec::new();

    for (pos, unit) in registry.units().iter().enumerate() {
        let entry = topics.topic(&unit.subject, &unit.topic);
        let Some((entry, sub_id)) =
            entry.and_then(|e| e.lit_ids.get(&unit.lit_id).map(|sub| (e, sub)))
        else {
            warn!(unit = %unit.unit_id, "Topic or source not indexed, skipping");
            report.unindexed.push(unit.unit_id.clone());
            continue;
        };

        let sequence = CompositeId::parse(&unit.unit_id)?.sequence;
        planned.push((
            pos,
            format!("{}-{:02}", sub_id, sequence),
            entry.parent.clone(),
            entry.path(&unit.topic),
        ));
    }

    let moving: HashSet<usize> = planned.iter().map(|(pos, ..)| *pos).collect();
    let mut taken: HashSet<&str> = registry
        .units()
        .iter()
        .enumerate()
        .filter(|(pos, _)| !moving.contains(pos))
        .map(|(_, u)| u.unit_id.as_str())
        .collect();
    for (pos, unit_id, ..) in &planned {
        if !taken.insert(unit_id.as_str()) {
            return Err(DeckError::InvalidUnit(format!(
                "realign would duplicate identifier {} (unit {})",
                unit_id,
                registry.units()[*pos].uid
            )));
        }
    }

    let units = registry.units_mut();
    for (pos, unit_id, parent, path) in planned {
        let unit = &mut units[pos];
        unit.parent_topic = parent;
        unit.topic_path = Some(path);
        if unit.unit_id != unit_id {
            unit.unit_id = unit_id;
            report.updated += 1;
        }
    }

    info!(updated = report.updated, "Realigned identifiers");
    Ok(report)
}

/// Identifiers that occur more than once
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateReport {
    pub uids: Vec<String>,
    pub unit_ids: Vec<String>,
}

impl DuplicateReport {
    pub fn is_clean(&self) -> bool {
        self.uids.is_empty() && self.unit_ids.is_empty()
    }
}

pub fn duplicate_ids(units: &[UnitRecord]) -> DuplicateReport {
    fn repeated<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in values {
            *counts.entry(value).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(v, _)| v.to_string())
            .collect()
    }

    DuplicateReport {
        uids: repeated(units.iter().map(|u| u.uid.as_str())),
        unit_ids: repeated(units.iter().map(|u| u.unit_id.as_str())),
    }
}
