use anyhow::bail;
use bookrec_core::{
    open_data_dir, Book, DataPaths, JsonFileBackend, MirroredBackend, RecommendOptions, RecommendationMode, Recommender,
    RecommenderConfig, SaveStatus, SignalBackend, SignalError, SignalSnapshot, SignalStore, SledBackend, UserId,
};
use serde_json::json;
use tempfile::tempdir;

fn user() -> UserId {
    UserId::new("user_1700000000000_abc123")
}

/// Backend whose storage is unreachable.
struct Unreachable;

impl SignalBackend for Unreachable {
    fn name(&self) -> &'static str { "unreachable" }

    fn load(&self, _user_id: &str) -> anyhow::Result<Option<SignalSnapshot>> {
        bail!("storage offline")
    }

    fn save(&self, _user_id: &str, _snapshot: &SignalSnapshot) -> anyhow::Result<()> {
        bail!("storage offline")
    }

    fn remove(&self, _user_id: &str) -> anyhow::Result<()> {
        bail!("storage offline")
    }
}

#[test]
fn failing_backend_keeps_memory_authoritative() {
    let mut store = SignalStore::with_backend(user(), Box::new(Unreachable));
    assert!(matches!(store.load(), Err(SignalError::Persistence(_))));
    assert_eq!(store.stats().feedback_entries, 0);

    let mut rec = Recommender::new(RecommenderConfig::default(), store);
    let status = rec.submit_feedback("Dune Messiah", 0.8).unwrap();
    assert!(matches!(status, SaveStatus::Failed(ref msg) if msg.contains("storage offline")));
    assert!(status.warning().is_some());
    assert_eq!(rec.signals().feedback("Dune Messiah"), 0.8);

    let selected = Book::new("a", "Dune").with_author("Frank Herbert").with_tags(["sci-fi"]);
    let pool = [Book::new("b", "Dune Messiah").with_author("Frank Herbert").with_tags(["sci-fi"])];
    let options = RecommendOptions { mode: Some(RecommendationMode::Content), ..RecommendOptions::default() };
    let results = rec.recommend(&selected, &pool, &options);
    assert_eq!(results.len(), 1);
    assert_eq!(rec.signals().views("Dune"), 1);

    assert!(matches!(rec.reset(), SaveStatus::Failed(_)));
    assert_eq!(rec.signals().feedback("Dune Messiah"), 0.0);
}

#[test]
fn in_memory_store_reports_no_backend() {
    let mut store = SignalStore::new(user());
    assert_eq!(store.record_view("Dune"), SaveStatus::NoBackend);
    assert_eq!(store.load().unwrap(), false);
}

#[test]
fn json_file_backend_round_trips() {
    let dir = tempdir().unwrap();
    let mut store = SignalStore::with_backend(user(), Box::new(JsonFileBackend::new(dir.path())));
    assert_eq!(store.record_feedback("Dune", 0.8).unwrap(), SaveStatus::Saved);
    store.record_view("Dune");
    store.set_preference("theme", json!("dark")).unwrap();
    assert!(dir.path().join("user_1700000000000_abc123.json").exists());

    let mut reloaded = SignalStore::with_backend(user(), Box::new(JsonFileBackend::new(dir.path())));
    assert!(reloaded.load().unwrap());
    assert_eq!(reloaded.feedback("Dune"), 0.8);
    assert_eq!(reloaded.views("Dune"), 1);
    assert_eq!(reloaded.preference("theme"), Some(&json!("dark")));
}

#[test]
fn json_file_backend_rejects_path_like_ids() {
    let dir = tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path());
    assert!(backend.save("../escape", &SignalSnapshot::default()).is_err());
}

#[test]
fn sled_backend_round_trips() {
    let backend = SledBackend::temporary().unwrap();
    let mut snapshot = SignalSnapshot::default();
    snapshot.feedback.insert("Dune".into(), -0.5);
    snapshot.view_history.insert("Emma".into(), 3);
    backend.save("u1", &snapshot).unwrap();
    assert_eq!(backend.load("u1").unwrap(), Some(snapshot));
    assert_eq!(backend.load("u2").unwrap(), None);
    backend.remove("u1").unwrap();
    assert_eq!(backend.load("u1").unwrap(), None);
}

#[test]
fn mirrored_backend_reads_fallback_when_primary_is_empty() {
    let dir = tempdir().unwrap();
    let fallback = JsonFileBackend::new(dir.path());
    let mut snapshot = SignalSnapshot::default();
    snapshot.feedback.insert("Dune".into(), 1.0);
    fallback.save("u1", &snapshot).unwrap();

    let mirrored = MirroredBackend::new(SledBackend::temporary().unwrap(), JsonFileBackend::new(dir.path()));
    assert_eq!(mirrored.load("u1").unwrap().unwrap().feedback["Dune"], 1.0);
}

#[test]
fn mirrored_backend_survives_failing_fallback() {
    // a fallback user id that fails validation makes only the fallback fail
    let dir = tempdir().unwrap();
    let mirrored = MirroredBackend::new(SledBackend::temporary().unwrap(), JsonFileBackend::new(dir.path()));
    assert!(mirrored.save("user with spaces", &SignalSnapshot::default()).is_ok());
    assert!(mirrored.load("user with spaces").unwrap().is_some());
}

#[test]
fn data_dir_writes_both_copies() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::new(dir.path());
    let mut store = SignalStore::with_backend(user(), Box::new(open_data_dir(&paths).unwrap()));
    store.record_feedback("Dune", 1.0).unwrap();
    assert!(paths.signals_db().exists());

    let mirror = JsonFileBackend::new(paths.mirror_dir());
    let snapshot = mirror.load(user().as_str()).unwrap().unwrap();
    assert_eq!(snapshot.feedback["Dune"], 1.0);
    assert_eq!(snapshot.user_id.as_deref(), Some("user_1700000000000_abc123"));
}

#[test]
fn export_import_round_trip() {
    let mut store = SignalStore::new(user());
    store.record_feedback("Dune", 0.8).unwrap();
    store.record_view("Dune");
    store.set_preference("lang", json!("it")).unwrap();
    let exported = serde_json::to_string(&store.export_all()).unwrap();
    assert!(exported.contains("\"viewHistory\""));
    assert!(exported.contains("\"version\":\"2.1\""));

    let mut other = SignalStore::new(UserId::new("user_other"));
    other.import_json(&exported).unwrap();
    assert_eq!(other.feedback("Dune"), 0.8);
    assert_eq!(other.views("Dune"), 1);
    assert_eq!(other.preference("lang"), Some(&json!("it")));
}

#[test]
fn malformed_import_keeps_current_state() {
    let mut store = SignalStore::new(user());
    store.record_feedback("Dune", 0.5).unwrap();
    let err = store.import_json(r#"{"feedback": {"Dune": "lots"}}"#).unwrap_err();
    assert!(matches!(err, SignalError::MalformedSnapshot { .. }));
    assert!(store.import_json("not json").is_err());
    assert_eq!(store.feedback("Dune"), 0.5);
}

#[test]
fn partial_import_empties_missing_maps() {
    let mut store = SignalStore::new(user());
    store.record_view("Dune");
    store.import_json(r#"{"feedback": {"Emma": 3.5}}"#).unwrap();
    assert_eq!(store.views("Dune"), 0);
    // out-of-range imported values are clamped
    assert_eq!(store.feedback("Emma"), 2.0);
}

#[test]
fn null_maps_import_as_empty() {
    let mut store = SignalStore::new(user());
    store.record_feedback("Dune", 0.5).unwrap();
    store.set_preference("lang", json!("it")).unwrap();
    store.import_json(r#"{"feedback": null, "viewHistory": {"Dune": 2}, "preferences": null}"#).unwrap();
    assert_eq!(store.feedback("Dune"), 0.0);
    assert_eq!(store.views("Dune"), 2);
    assert!(store.preference("lang").is_none());
}

#[test]
fn reset_removes_persisted_copy() {
    let dir = tempdir().unwrap();
    let mut store = SignalStore::with_backend(user(), Box::new(JsonFileBackend::new(dir.path())));
    store.record_feedback("Dune", 0.8).unwrap();
    assert_eq!(store.reset(), SaveStatus::Saved);
    assert_eq!(store.stats().feedback_entries, 0);
    assert!(!dir.path().join("user_1700000000000_abc123.json").exists());

    let mut reloaded = SignalStore::with_backend(user(), Box::new(JsonFileBackend::new(dir.path())));
    assert!(!reloaded.load().unwrap());
}

#[test]
fn remove_preference_only_touches_existing_keys() {
    let mut store = SignalStore::new(user());
    store.set_preference("lang", json!("it")).unwrap();
    let revision = store.revision();
    store.remove_preference("missing");
    assert_eq!(store.revision(), revision);
    store.remove_preference("lang");
    assert!(store.preference("lang").is_none());
    assert_eq!(store.preference_or("lang", json!("en")), json!("en"));
}

#[test]
fn user_id_is_created_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("user_id");
    let first = UserId::load_or_create(&path).unwrap();
    let second = UserId::load_or_create(&path).unwrap();
    assert_eq!(first, second);
    assert!(first.as_str().starts_with("user_"));
}
