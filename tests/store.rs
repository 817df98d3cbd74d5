use std::collections::BTreeSet;
use std::fs;

use chrono::NaiveDate;
use tempfile::tempdir;
use teaching_catalog::{
    Catalog, CatalogError, Instructor, Module, Software, StoreOptions, YamlStore, validate,
};

const LEGACY_STORE: &str = r#"
email_config:
  smtp_server: smtp.example.edu
  smtp_port: 587
instructors:
  prof_001:
    name: Ada Lovelace
    email: ada@example.edu
    department: Computing
    modules:
      - web_dev
      - db
    last_review: '2024-01-15'
modules:
  web_dev:
    code: CS101
    name: Web Development
    description: Front-end basics
    year: 1
    semester: 2
    instructor_id: prof_001
    software:
      - name: VS Code
        version: '1.85'
        purpose: Editor
        critical: true
        notes: ''
        last_verified: ''
        verified_by: prof_001
        category: IDE
  db:
    code: CS201
    name: Databases
    year: 2
    semester: 1
    instructor_id: ''
    software: []
"#;

fn quiet_store(path: impl Into<std::path::PathBuf>) -> YamlStore {
    YamlStore::with_options(
        path,
        StoreOptions {
            timestamped_backups: false,
        },
    )
}

fn small_catalog(name: &str) -> Catalog {
    let mut catalog = Catalog::new();
    catalog.upsert_instructor(Instructor {
        name: name.to_string(),
        email: "ada@example.edu".into(),
        last_review: NaiveDate::from_ymd_opt(2024, 3, 1),
        ..Instructor::new("prof_001")
    });
    let mut module = Module::new("web_dev").with_instructor("prof_001");
    module.name = "Web Development".into();
    module.software.push(Software {
        purpose: "Editor".into(),
        critical: true,
        last_verified: NaiveDate::from_ymd_opt(2024, 2, 10),
        ..Software::new("VS Code")
    });
    catalog.upsert_module(module);
    catalog
}

#[test]
fn loads_existing_store_layout() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("teaching_software.yml");
    fs::write(&path, LEGACY_STORE).expect("store written");

    let catalog = quiet_store(&path).load().expect("store loaded");

    let instructor = catalog.get_instructor("prof_001").expect("instructor");
    assert_eq!(instructor.department, "Computing");
    assert_eq!(instructor.last_review, NaiveDate::from_ymd_opt(2024, 1, 15));
    assert_eq!(instructor.modules, BTreeSet::from(["web_dev".to_string()]));

    let web_dev = catalog.get_module("web_dev").expect("module");
    assert_eq!(web_dev.instructor.as_deref(), Some("prof_001"));
    assert_eq!(web_dev.semester, 2);
    let editor = web_dev.software("VS Code").expect("software");
    assert!(editor.critical);
    assert_eq!(editor.last_verified, None);

    assert_eq!(catalog.get_module("db").expect("module").instructor, None);
    assert!(validate(&catalog).is_empty());
}

#[test]
fn wrong_field_type_is_corrupt_store() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("store.yml");
    fs::write(
        &path,
        "instructors: {}\nmodules:\n  db:\n    name: Databases\n    year: second\n",
    )
    .expect("store written");

    let error = quiet_store(&path).load().expect_err("year is not a number");
    match error {
        CatalogError::CorruptStore { reason, .. } => assert!(reason.contains("db")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_sections_and_fields_are_corrupt_store() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("store.yml");

    for content in [
        "modules: {}\n",
        "- just\n- a list\n",
        "",
        "instructors:\n  prof_001:\n    name: Ada\nmodules: {}\n",
        "instructors: {}\nmodules:\n  db:\n    software:\n      - version: '1'\n",
    ] {
        fs::write(&path, content).expect("store written");
        let result = quiet_store(&path).load();
        assert!(
            matches!(result, Err(CatalogError::CorruptStore { .. })),
            "expected corrupt store for {content:?}"
        );
    }
}

#[test]
fn missing_store_is_io_error() {
    let temp_dir = tempdir().expect("temporary directory");
    let result = quiet_store(temp_dir.path().join("absent.yml")).load();
    assert!(matches!(result, Err(CatalogError::Io(_))));
}

#[test]
fn save_then_load_preserves_catalog() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let catalog = small_catalog("Ada Lovelace");

    let outcome = store.save(&catalog).expect("saved");
    assert_eq!(outcome.backup, None);

    assert_eq!(store.load().expect("reloaded"), catalog);
}

#[test]
fn backup_holds_previous_save() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));

    store.save(&small_catalog("First")).expect("first save");
    let first_contents = fs::read_to_string(store.path()).expect("first contents");

    let outcome = store.save(&small_catalog("Second")).expect("second save");

    assert_eq!(outcome.backup.as_deref(), Some(store.backup_path().as_path()));
    assert_eq!(
        fs::read_to_string(store.backup_path()).expect("backup contents"),
        first_contents
    );
    let reloaded = store.load().expect("reloaded");
    assert_eq!(
        reloaded.get_instructor("prof_001").expect("instructor").name,
        "Second"
    );
}

#[test]
fn failed_backup_aborts_save() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    store.save(&small_catalog("First")).expect("first save");
    let before = fs::read_to_string(store.path()).expect("contents");

    // A directory where the backup file should go makes the copy fail.
    fs::create_dir(store.backup_path()).expect("blocking directory");

    let error = store
        .save(&small_catalog("Second"))
        .expect_err("backup cannot be written");
    assert!(matches!(error, CatalogError::BackupFailed { .. }));
    assert_eq!(fs::read_to_string(store.path()).expect("contents"), before);
}

#[test]
fn timestamped_backup_is_written_when_enabled() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = YamlStore::new(temp_dir.path().join("teaching_software.yml"));
    store.save(&small_catalog("First")).expect("first save");
    store.save(&small_catalog("Second")).expect("second save");

    let stamped: Vec<String> = fs::read_dir(temp_dir.path())
        .expect("directory listing")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("teaching_software_") && name.ends_with(".yml.backup"))
        .collect();
    assert_eq!(stamped.len(), 1);
}

#[test]
fn save_keeps_foreign_sections() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("teaching_software.yml");
    fs::write(&path, LEGACY_STORE).expect("store written");
    let store = quiet_store(&path);

    let mut catalog = store.load().expect("loaded");
    catalog
        .remove_module("db", false)
        .expect("unassigned module");
    store.save(&catalog).expect("saved");

    let document: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(&path).expect("contents")).expect("yaml");
    assert_eq!(
        document["email_config"]["smtp_server"].as_str(),
        Some("smtp.example.edu")
    );
    assert_eq!(
        document["modules"]["web_dev"]["instructor_id"].as_str(),
        Some("prof_001")
    );
    assert!(document["modules"].get("db").is_none());
    assert_eq!(store.load().expect("reloaded"), catalog);
}

#[test]
fn duplicate_ids_cannot_be_saved() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let catalog = Catalog::from_parts(vec![], vec![Module::new("db"), Module::new("db")]);

    assert!(matches!(store.save(&catalog), Err(CatalogError::Conflict(_))));
    assert!(!store.path().exists());
}

#[test]
fn hand_edited_scalars_are_coerced() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("store.yml");
    fs::write(
        &path,
        r#"
instructors:
  prof_001:
    name: Ada Lovelace
    email: ada@example.edu
    modules:
    last_review:
modules:
  db:
    code: 201
    name: Databases
    year: '2'
    semester: '1'
    instructor_id: prof_001
    software:
      - name: Python
        version: 3.11
        critical: 'Yes'
        notes:
"#,
    )
    .expect("store written");

    let catalog = quiet_store(&path).load().expect("store loaded");

    let db = catalog.get_module("db").expect("module");
    assert_eq!(db.code, "201");
    assert_eq!((db.year, db.semester), (2, 1));
    let python = db.software("Python").expect("software");
    assert_eq!(python.version, "3.11");
    assert!(python.critical);
    assert_eq!(python.notes, "");
    let instructor = catalog.get_instructor("prof_001").expect("instructor");
    assert_eq!(instructor.last_review, None);
    assert_eq!(instructor.modules, BTreeSet::from(["db".to_string()]));
}

#[test]
fn unusable_term_number_is_corrupt_store() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("store.yml");

    for semester in ["0", "'first'", "[1, 2]"] {
        let content = format!(
            "instructors: {{}}\nmodules:\n  db:\n    name: Databases\n    semester: {semester}\n"
        );
        fs::write(&path, content).expect("store written");
        assert!(
            matches!(quiet_store(&path).load(), Err(CatalogError::CorruptStore { .. })),
            "expected corrupt store for semester {semester}"
        );
    }
}

#[test]
fn audit_log_is_read_and_malformed_entries_skipped() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("store.yml");
    fs::write(
        &path,
        r#"
instructors: {}
modules: {}
audit_log:
  - timestamp: '2024-03-01T10:00:00'
    module_id: web_dev
    software_name: VS Code
    action: updated
    actor: prof_001
    changes:
      - field: version
        old: 1.84
        new: '1.85'
      - field: critical
        old: false
        new: true
  - timestamp: '2024-03-02T09:00:00'
    module_id: web_dev
    software_name: Git
    action: added
    actor: prof_001
  - just a note
"#,
    )
    .expect("store written");

    let log = quiet_store(&path).audit_log().expect("audit log read");

    assert_eq!(log.len(), 2);
    assert_eq!(log[0].changes.len(), 2);
    assert_eq!(log[0].changes[0].old, "1.84");
    assert_eq!(log[0].changes[1].new, "true");
    assert_eq!(log[1].action, "added");
    assert!(log[1].changes.is_empty());
}

#[test]
fn store_without_audit_log_has_empty_log() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    store.save(&small_catalog("Ada")).expect("saved");

    assert!(store.audit_log().expect("audit log read").is_empty());
}
