use std::io::Write;
use std::sync::Arc;
use std::thread;

use groupscope::{
    DetectionMode, EngineConfig, EntityRecord, GroupDefinition, GroupEngine, GroupRegistry,
    IdentifierCanonicalizer, InMemoryRecordStore, MatchEvidence,
};

fn registry_entries() -> Vec<GroupDefinition> {
    vec![
        GroupDefinition::identifiers_with_name_pattern(
            "Omega Pharma",
            ["11.111.111", "22.222.222"],
            r"(?i)\bomega\b",
        ),
        GroupDefinition::uniform_identifier("Acme", ["12.345.678"]),
        GroupDefinition::uniform_name("Delta Burger"),
        GroupDefinition::keyword("Rio Network", ["rionet", "rio network"]),
    ]
}

fn engine() -> GroupEngine {
    GroupEngine::new(
        Arc::new(InMemoryRecordStore::new()),
        registry_entries(),
        EngineConfig::default(),
    )
    .unwrap()
}

#[test]
fn each_structured_mode_classifies() {
    let engine = engine();

    let acme = engine.classify_entity(Some("12.345.678/0002-71"), Some("Whatever Ltda")).unwrap();
    assert_eq!(acme.group.name, "Acme");
    assert_eq!(acme.mode, DetectionMode::UniformIdentifier);

    let omega = engine.classify_entity(Some("22222222000150"), Some("Omega Drugstore 12")).unwrap();
    assert_eq!(omega.group.name, "Omega Pharma");

    let delta = engine.classify_entity(Some("77777777000100"), Some("DELTA BURGER Downtown")).unwrap();
    assert_eq!(delta.group.name, "Delta Burger");
    assert_eq!(delta.evidence, MatchEvidence::Name("Delta Burger".to_string()));
}

#[test]
fn root_match_with_failing_pattern_is_never_classified_there() {
    let engine = engine();
    assert!(engine.classify_entity(Some("11.111.111/0001-00"), Some("Corner Bakery")).is_none());
    assert!(engine.classify_entity(Some("11.111.111/0001-00"), None).is_none());

    // Later entries still get their turn.
    let hit = engine
        .classify_entity(Some("11.111.111/0001-00"), Some("Delta Burger Express"))
        .unwrap();
    assert_eq!(hit.group.name, "Delta Burger");
}

#[test]
fn absent_inputs_are_not_errors() {
    let engine = engine();
    assert!(engine.classify_entity(None, None).is_none());
    assert!(engine.classify_entity(Some("123"), Some("")).is_none());
}

#[test]
fn records_classify_through_their_raw_fields() {
    let engine = engine();
    let record = EntityRecord::new("r1", Some("12345678000100"), Some("Anything"));
    assert_eq!(engine.classify_record(&record).unwrap().group.name, "Acme");
}

#[test]
fn text_classification_uses_keywords_only() {
    let engine = engine();
    let hit = engine.classify_text("Orders from the Rio Network stores").unwrap().unwrap();
    assert_eq!(hit.group.name, "Rio Network");
    assert_eq!(hit.mode, DetectionMode::Keyword);
    assert!(!hit.provisional);

    // Names are not keywords.
    assert!(engine.classify_text("acme").unwrap().is_none());
}

#[test]
fn promotion_requires_reload_and_is_atomic_for_readers() {
    let engine = Arc::new(engine());
    assert!(engine.classify_entity(Some("44444444000100"), Some("Kappa One")).is_none());

    let snapshot = engine.registry();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    // Every observed registry is either the old one or the new one.
                    let len = engine.registry().len();
                    assert!(len == 4 || len == 5);
                }
            })
        })
        .collect();

    let mut promoted = registry_entries();
    promoted.push(GroupDefinition::uniform_identifier("Kappa", ["44444444"]));
    let report = engine.reload_registry(promoted);
    assert_eq!(report.accepted, 5);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(snapshot.len(), 4);
    assert_eq!(
        engine.classify_entity(Some("44444444000100"), Some("Kappa One")).unwrap().group.name,
        "Kappa"
    );
}

#[test]
fn malformed_entries_are_skipped_and_reported() {
    let mut entries = registry_entries();
    entries.insert(0, GroupDefinition::identifiers_with_name_pattern("Broken", ["12345678"], "(["));
    let (registry, report) = GroupRegistry::new(entries, IdentifierCanonicalizer::default());

    assert_eq!(report.accepted, 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].position, 0);
    let hit = registry.classify_entity(Some("12345678"), Some("Any")).unwrap();
    assert_eq!(hit.group.name, "Acme");
}

#[test]
fn registry_document_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("groups.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"[
            {{"name": "Acme", "detection": {{"mode": "uniform_identifier", "roots": ["12.345.678"]}}}},
            {{"name": "Missing Pattern", "detection": {{"mode": "identifiers_with_name_pattern", "roots": ["11111111"]}}}},
            {{"name": "Delta Burger", "detection": {{"mode": "uniform_name"}}, "business_type": "retail"}}
        ]"#
    )
    .unwrap();
    drop(file);

    let (registry, report) = GroupRegistry::from_json_file(&path, IdentifierCanonicalizer::default()).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].position, 1);
    assert_eq!(report.skipped[0].name.as_deref(), Some("Missing Pattern"));

    let missing = dir.path().join("absent.json");
    assert!(GroupRegistry::from_json_file(&missing, IdentifierCanonicalizer::default()).is_err());
}
