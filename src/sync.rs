use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditEntry, changelog_rows};
use crate::error::{CatalogError, Result};
use crate::flatten::{build_changelog_table, build_workbook};
use crate::io::{excel_read, excel_write};
use crate::live::LiveCatalog;
use crate::model::Catalog;
use crate::reconcile::{Reconciler, ReloadSignal};
use crate::records::export_rows;
use crate::store::YamlStore;

/// Instructor and module counts seen on one side of the sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideCounts {
    pub instructors: usize,
    pub modules: usize,
}

/// Comparison between the store and the exchange workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub store: SideCounts,
    pub workbook: SideCounts,
    pub workbook_exists: bool,
    pub workbook_path: PathBuf,
    /// Why the workbook could not be read, when it exists but is unusable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbook_error: Option<String>,
}

impl SyncStatus {
    pub fn in_step(&self) -> bool {
        self.workbook_exists && self.workbook_error.is_none() && self.store == self.workbook
    }
}

/// Materialises the catalog as the exchange workbook, followed by a
/// `ChangeLog` sheet built from `audit`.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn export_to_excel(catalog: &Catalog, audit: &[AuditEntry], output: &Path) -> Result<()> {
    let rows = export_rows(catalog);
    let changes = changelog_rows(audit);
    info!(
        instructors = rows.instructors.len(),
        modules = rows.modules.len(),
        software = rows.software.len(),
        changes = changes.len(),
        "projected catalog into rows"
    );
    let mut workbook = build_workbook(&rows);
    workbook.tables.push(build_changelog_table(&changes));
    debug!(sheet_count = workbook.tables.len(), "workbook constructed");
    excel_write::write_workbook(output, &workbook)
}

/// Reads the exchange workbook and reconciles it into the store and the live
/// catalog.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn import_from_excel(
    store: &YamlStore,
    live: &LiveCatalog,
    input: &Path,
) -> Result<ReloadSignal> {
    if !input.exists() {
        return Err(CatalogError::MissingInput(input.to_path_buf()));
    }
    let rows = excel_read::read_rows(input)?;
    info!(
        instructors = rows.instructors.len(),
        modules = rows.modules.len(),
        software = rows.software.len(),
        "read rows from workbook"
    );
    Reconciler::new(store, live).import_rows(&rows)
}

/// Compares record counts between the catalog and the workbook. Failing to
/// read the workbook is reported in the status rather than as an error.
#[instrument(level = "debug", skip_all, fields(workbook = %workbook.display()))]
pub fn sync_status(catalog: &Catalog, workbook: &Path) -> SyncStatus {
    let store = SideCounts {
        instructors: catalog.instructor_count(),
        modules: catalog.module_count(),
    };
    let workbook_exists = workbook.exists();

    let (counts, workbook_error) = if workbook_exists {
        match excel_read::read_rows(workbook) {
            Ok(rows) => (
                SideCounts {
                    instructors: rows.instructors.len(),
                    modules: rows.modules.len(),
                },
                None,
            ),
            Err(err) => {
                warn!(error = %err, "could not read workbook");
                (SideCounts::default(), Some(err.to_string()))
            }
        }
    } else {
        (SideCounts::default(), None)
    };

    SyncStatus {
        store,
        workbook: counts,
        workbook_exists,
        workbook_path: workbook.to_path_buf(),
        workbook_error,
    }
}
