//! Registry Integration Tests
//!
//! Identifier allocation, topic index rebuilds and renames against a
//! file-backed store.

use notedeck::core::{allocate, EnsureStatus, RegistryPolicy, TopicIndex, UnitFilter};
use notedeck::domain::{CompositeId, ContentKind, NewUnit, UnitRecord};
use notedeck::{DeckError, LibraryStore};
use tempfile::TempDir;

fn create_test_store() -> (LibraryStore, TempDir) {
    let temp = TempDir::new().unwrap();
    let store = LibraryStore::new(
        temp.path().join("Library.json"),
        temp.path().join("SubjectsTopics.json"),
    );
    (store, temp)
}

async fn create(store: &LibraryStore, subject: &str, topic: &str, lit: &str) -> UnitRecord {
    store
        .transaction(|snap| {
            snap.registry
                .create(
                    &mut snap.topics,
                    NewUnit::new(subject, topic, lit, ContentKind::Definition, "t"),
                    RegistryPolicy::default(),
                )
                .cloned()
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_sequences_strictly_increase() {
    let (store, _temp) = create_test_store();

    let mut ids = Vec::new();
    for _ in 0..12 {
        ids.push(create(&store, "EFT1", "Derivatives", "K25").await.unit_id);
    }
    create(&store, "EFT1", "Derivatives", "S23").await;
    create(&store, "EFT1", "Limits", "K25").await;

    let sequences: Vec<u32> = ids
        .iter()
        .map(|id| CompositeId::parse(id).unwrap().sequence)
        .collect();
    assert_eq!(sequences, (1..=12).collect::<Vec<_>>());
    assert_eq!(ids[9], "EFT1-K25-01-10");

    let snapshot = store.load().await.unwrap();
    let mut all: Vec<&str> = snapshot.registry.units().iter().map(|u| u.unit_id.as_str()).collect();
    let before = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), before);
}

#[tokio::test]
async fn test_allocate_example() {
    let (store, _temp) = create_test_store();
    create(&store, "EFT1", "Derivatives", "K25").await;
    create(&store, "EFT1", "Derivatives", "K25").await;

    let snapshot = store.load().await.unwrap();
    let ids: Vec<&str> = snapshot.registry.units().iter().map(|u| u.unit_id.as_str()).collect();
    assert_eq!(ids, vec!["EFT1-K25-01-01", "EFT1-K25-01-02"]);
    assert_eq!(allocate("EFT1", "K25", 1, snapshot.registry.units()).unwrap(), 3);
}

#[tokio::test]
async fn test_malformed_identifier_blocks_allocation() {
    let (store, _temp) = create_test_store();
    let unit = create(&store, "EFT1", "Limits", "K25").await;

    // Corrupt the stored identifier by hand
    let raw = std::fs::read_to_string(store.units_path()).unwrap();
    std::fs::write(store.units_path(), raw.replace(&unit.unit_id, "EFT1-K25-broken")).unwrap();

    let err = store
        .transaction(|snap| {
            snap.registry
                .create(
                    &mut snap.topics,
                    NewUnit::new("EFT1", "Limits", "K25", ContentKind::Example, "x"),
                    RegistryPolicy::default(),
                )
                .map(|_| ())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DeckError::MalformedIdentifier(_)));
}

#[tokio::test]
async fn test_ensure_topic_example() {
    let mut topics = TopicIndex::new();

    let first = topics.ensure_topic("EFT1", "Derivatives", None);
    assert_eq!(first.status, EnsureStatus::Created);
    assert_eq!(first.ordinal, 1);
    assert_eq!(first.topic_path, "Derivatives");

    let second = topics.ensure_topic("EFT1", "Derivatives", None);
    assert_eq!(second.status, EnsureStatus::Existing);
    assert_eq!(second.ordinal, 1);
    assert_eq!(second.topic_path, "Derivatives");
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let (store, _temp) = create_test_store();
    create(&store, "EFT1", "Derivatives", "K25").await;
    create(&store, "QM", "Spin", "S23").await;
    create(&store, "EFT1", "Limits", "S23").await;
    create(&store, "EFT1", "Derivatives", "S23").await;

    let snapshot = store.load().await.unwrap();
    let once = TopicIndex::rebuild_from_units(snapshot.registry.units());
    let twice = TopicIndex::rebuild_from_units(snapshot.registry.units());

    assert_eq!(once, twice);
    assert_eq!(once, snapshot.topics);
    assert_eq!(once.ordinal("EFT1", "Limits").unwrap(), 2);
    assert_eq!(once.subject("QM").unwrap().index, 2);
}

#[tokio::test]
async fn test_rename_then_find() {
    let (store, _temp) = create_test_store();
    create(&store, "EFT1", "Limits", "K25").await;
    let unit = create(&store, "EFT1", "Limits", "K25").await;

    let new_id = store
        .transaction(|snap| snap.registry.rename(&mut snap.topics, &unit.uid, "EFT1", "Series", None))
        .await
        .unwrap();

    let snapshot = store.load().await.unwrap();
    let by_new = snapshot.registry.find(|u| u.unit_id == new_id);
    let by_old = snapshot.registry.find(|u| u.unit_id == unit.unit_id);

    assert_eq!(by_new.len(), 1);
    assert_eq!(by_new[0].uid, unit.uid);
    assert!(by_old.is_empty());
    assert_eq!(new_id, "EFT1-K25-02-01");
    assert_eq!(
        snapshot
            .registry
            .query(&UnitFilter::new().subject("EFT1").topic("Series"))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_strict_policy_rejects_unindexed_topic() {
    let (store, _temp) = create_test_store();

    let err = store
        .transaction(|snap| {
            snap.registry
                .create(
                    &mut snap.topics,
                    NewUnit::new("EFT1", "Limits", "K25", ContentKind::Lemma, "x"),
                    RegistryPolicy { auto_repair: false },
                )
                .map(|_| ())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DeckError::TopicNotIndexed { .. }));
    assert!(!store.units_path().exists());
}
