use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use tempfile::tempdir;
use teaching_catalog::{
    Catalog, CatalogError, InstructorRow, IssueKind, LiveCatalog, ModuleRow, Reconciler,
    SoftwareRow, StoreOptions, YamlStore, export_rows,
};

fn quiet_store(path: impl Into<std::path::PathBuf>) -> YamlStore {
    YamlStore::with_options(
        path,
        StoreOptions {
            timestamped_backups: false,
        },
    )
}

fn instructor_row(id: &str, modules: &str) -> InstructorRow {
    InstructorRow {
        id: id.to_string(),
        name: format!("Instructor {id}"),
        email: format!("{id}@example.edu"),
        department: "Computing".to_string(),
        modules: modules.to_string(),
        last_review: "2024-01-15".to_string(),
    }
}

fn module_row(id: &str, instructor: &str) -> ModuleRow {
    ModuleRow {
        id: id.to_string(),
        code: id.to_uppercase(),
        name: format!("Module {id}"),
        description: String::new(),
        year: "1".to_string(),
        semester: "2".to_string(),
        instructor: instructor.to_string(),
    }
}

fn software_row(module_id: &str, name: &str) -> SoftwareRow {
    SoftwareRow {
        module_id: module_id.to_string(),
        name: name.to_string(),
        version: "latest".to_string(),
        purpose: "Coursework".to_string(),
        critical: "Yes".to_string(),
        notes: String::new(),
        last_verified: "2024-02-01".to_string(),
        verified_by: "prof_001".to_string(),
    }
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[test]
fn module_side_wins_over_instructor_sheet() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let live = LiveCatalog::default();

    Reconciler::new(&store, &live)
        .import_external(
            vec![instructor_row("prof_001", "web_dev,db")],
            vec![module_row("web_dev", "prof_001"), module_row("db", "")],
            vec![],
        )
        .expect("import committed");

    let catalog = live.snapshot();
    assert_eq!(
        catalog.get_instructor("prof_001").expect("instructor").modules,
        ids(&["web_dev"])
    );
    assert_eq!(catalog.get_module("db").expect("module").instructor, None);
}

#[test]
fn module_assignment_missing_from_instructor_sheet_is_added() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let live = LiveCatalog::default();

    Reconciler::new(&store, &live)
        .import_external(
            vec![instructor_row("prof_001", "")],
            vec![module_row("m1", "prof_001")],
            vec![],
        )
        .expect("import committed");

    let catalog = live.snapshot();
    assert!(
        catalog
            .get_instructor("prof_001")
            .expect("instructor")
            .modules
            .contains("m1")
    );
}

#[test]
fn committed_import_is_persisted_and_signalled() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    store.save(&Catalog::new()).expect("empty store");
    let live = LiveCatalog::new(store.load().expect("loaded"));

    let signal = Reconciler::new(&store, &live)
        .import_external(
            vec![instructor_row("prof_001", "web_dev")],
            vec![module_row("web_dev", "prof_001")],
            vec![software_row("web_dev", "VS Code"), software_row("web_dev", "Git")],
        )
        .expect("import committed");

    assert_eq!(signal.instructors, 1);
    assert_eq!(signal.modules, 1);
    assert_eq!(signal.software, 2);
    assert_eq!(signal.backup.as_deref(), Some(store.backup_path().as_path()));

    let reloaded = store.load().expect("store reloaded");
    assert_eq!(reloaded, *live.snapshot());
    let software = reloaded.get_software("web_dev", "VS Code").expect("software");
    assert!(software.critical);
}

#[test]
fn export_then_import_is_idempotent() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let seed = LiveCatalog::default();
    Reconciler::new(&store, &seed)
        .import_external(
            vec![
                instructor_row("prof_001", "web_dev"),
                instructor_row("prof_002", ""),
            ],
            vec![
                module_row("web_dev", "prof_001"),
                module_row("db", "prof_002"),
                module_row("networks", ""),
            ],
            vec![
                software_row("web_dev", "VS Code"),
                SoftwareRow {
                    critical: "No".to_string(),
                    last_verified: String::new(),
                    ..software_row("db", "PostgreSQL")
                },
            ],
        )
        .expect("seed import");

    let original = store.load().expect("loaded");
    let live = LiveCatalog::new(original.clone());
    let rows = export_rows(&original);

    Reconciler::new(&store, &live)
        .import_external(rows.instructors, rows.modules, rows.software)
        .expect("re-import committed");

    assert_eq!(*live.snapshot(), original);
    assert_eq!(store.load().expect("reloaded"), original);
}

#[test]
fn duplicate_module_id_rejects_whole_import() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let live = LiveCatalog::default();
    Reconciler::new(&store, &live)
        .import_external(
            vec![instructor_row("prof_001", "web_dev")],
            vec![module_row("web_dev", "prof_001")],
            vec![software_row("web_dev", "VS Code")],
        )
        .expect("seed import");
    let before_rows = export_rows(&live.snapshot());
    let before_store = fs::read_to_string(store.path()).expect("store contents");

    let error = Reconciler::new(&store, &live)
        .import_external(
            vec![
                instructor_row("prof_001", ""),
                instructor_row("prof_002", ""),
            ],
            vec![module_row("db", "prof_001"), module_row("db", "prof_002")],
            vec![],
        )
        .expect_err("duplicate module id");

    match &error {
        CatalogError::ReconciliationFailed(issues) => {
            assert!(issues.iter().any(|issue| issue.kind == IssueKind::DuplicateId));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(export_rows(&live.snapshot()), before_rows);
    assert_eq!(
        fs::read_to_string(store.path()).expect("store contents"),
        before_store
    );
    assert!(!store.backup_path().exists());
}

#[test]
fn field_and_reference_problems_are_reported_together() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let live = LiveCatalog::default();

    let error = Reconciler::new(&store, &live)
        .import_external(
            vec![InstructorRow {
                last_review: "15/01/2024".to_string(),
                ..instructor_row("prof_001", "")
            }],
            vec![
                ModuleRow {
                    year: "first".to_string(),
                    ..module_row("web_dev", "prof_404")
                },
            ],
            vec![
                software_row("missing", "Git"),
                software_row("web_dev", "VS Code"),
                software_row("web_dev", "VS Code"),
            ],
        )
        .expect_err("import rejected");

    let mut kinds: Vec<IssueKind> = error.issues().iter().map(|issue| issue.kind).collect();
    kinds.sort_by_key(|kind| format!("{kind:?}"));
    assert_eq!(
        kinds,
        vec![
            IssueKind::DanglingReference,
            IssueKind::DanglingReference,
            IssueKind::DuplicateSoftwareName,
            IssueKind::InvalidDate,
            IssueKind::InvalidNumericField,
        ]
    );
    assert_eq!(live.snapshot().module_count(), 0);
    assert!(!store.path().exists());
}

#[test]
fn readers_keep_their_snapshot_across_an_import() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = quiet_store(temp_dir.path().join("store.yml"));
    let live = LiveCatalog::default();
    let held: Arc<Catalog> = live.snapshot();

    Reconciler::new(&store, &live)
        .import_external(
            vec![instructor_row("prof_001", "")],
            vec![module_row("web_dev", "prof_001")],
            vec![],
        )
        .expect("import committed");

    assert_eq!(held.module_count(), 0);
    assert_eq!(live.snapshot().module_count(), 1);
}

#[test]
fn failed_edit_leaves_live_catalog_untouched() {
    let live = LiveCatalog::default();
    live.update(|catalog| {
        catalog.upsert_module(teaching_catalog::Module::new("web_dev"));
        Ok(())
    })
    .expect("edit applied");

    let result = live.update(|catalog| {
        catalog.upsert_module(teaching_catalog::Module::new("db"));
        catalog.remove_instructor("prof_404", false).map(|_| ())
    });

    assert!(matches!(result, Err(CatalogError::NotFound { .. })));
    let modules: Vec<String> = live.snapshot().list_modules().map(|m| m.id.clone()).collect();
    assert_eq!(modules, vec!["web_dev".to_string()]);
}
