//! Sequence allocation for composite identifiers.
//!
//! Sequences are `max(existing) + 1` within a (subject, source, topic)
//! group. Gaps below the current maximum are never refilled. The registry
//! also consults the topic index's high-water mark, so a slot vacated by a
//! rename is not reissued either.

use crate::domain::{CompositeId, UnitId, UnitRecord};
use crate::error::DeckResult;

/// Next free sequence number for `(subject, lit_id, topic_ordinal)`.
///
/// Every unit of the same subject and source must carry a parseable
/// composite identifier; the topic component selects the group.
pub fn allocate(
    subject: &str,
    lit_id: &str,
    topic_ordinal: u32,
    units: &[UnitRecord],
) -> DeckResult<u32> {
    allocate_excluding(subject, lit_id, topic_ordinal, units, None)
}

/// Same as [`allocate`], ignoring the unit `exclude` (the one being renamed).
pub fn allocate_excluding(
    subject: &str,
    lit_id: &str,
    topic_ordinal: u32,
    units: &[UnitRecord],
    exclude: Option<&UnitId>,
) -> DeckResult<u32> {
    let mut highest = 0;

    for unit in units {
        if unit.subject != subject || unit.lit_id != lit_id {
            continue;
        }
        if exclude.is_some_and(|uid| &unit.uid == uid) {
            continue;
        }

        let id = CompositeId::parse(&unit.unit_id)?;
        if id.topic_ordinal == topic_ordinal {
            highest = highest.max(id.sequence);
        }
    }

    Ok(highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Annotations, ContentKind, BODY_PLACEHOLDER};
    use crate::error::DeckError;

    fn unit(unit_id: &str, subject: &str, lit_id: &str) -> UnitRecord {
        UnitRecord {
            uid: UnitId::generate(),
            unit_id: unit_id.to_string(),
            subject: subject.to_string(),
            topic: "Derivatives".to_string(),
            parent_topic: None,
            topic_path: None,
            lit_id: lit_id.to_string(),
            kind: ContentKind::Definition,
            title: String::new(),
            body: BODY_PLACEHOLDER.to_string(),
            annotations: Annotations::default(),
            created_at: None,
        }
    }

    #[test]
    fn test_next_after_existing() {
        let units = vec![
            unit("EFT1-K25-01-01", "EFT1", "K25"),
            unit("EFT1-K25-01-02", "EFT1", "K25"),
        ];
        assert_eq!(allocate("EFT1", "K25", 1, &units).unwrap(), 3);
    }

    #[test]
    fn test_empty_group_starts_at_one() {
        let units = vec![unit("EFT1-K25-01-04", "EFT1", "K25")];
        assert_eq!(allocate("EFT1", "K25", 2, &units).unwrap(), 1);
        assert_eq!(allocate("EFT1", "S23", 1, &units).unwrap(), 1);
        assert_eq!(allocate("QM", "K25", 1, &[]).unwrap(), 1);
    }

    #[test]
    fn test_holes_are_not_refilled() {
        let units = vec![
            unit("EFT1-K25-01-01", "EFT1", "K25"),
            unit("EFT1-K25-01-05", "EFT1", "K25"),
        ];
        assert_eq!(allocate("EFT1", "K25", 1, &units).unwrap(), 6);
    }

    #[test]
    fn test_excluded_unit_is_ignored() {
        let units = vec![
            unit("EFT1-K25-01-01", "EFT1", "K25"),
            unit("EFT1-K25-01-02", "EFT1", "K25"),
        ];
        let moving = units[1].uid.clone();
        assert_eq!(
            allocate_excluding("EFT1", "K25", 1, &units, Some(&moving)).unwrap(),
            2
        );
    }

    #[test]
    fn test_malformed_matching_unit_fails() {
        let units = vec![unit("EFT1-K25-01", "EFT1", "K25")];
        assert!(matches!(
            allocate("EFT1", "K25", 1, &units),
            Err(DeckError::MalformedIdentifier(_))
        ));

        // Units of other groups are never parsed
        let units = vec![unit("garbage", "QM", "K25")];
        assert_eq!(allocate("EFT1", "K25", 1, &units).unwrap(), 1);
    }
}
