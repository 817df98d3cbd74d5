//! All-or-nothing replacement of the live catalog from external records.
//!
//! The external source always wins: a successful import replaces the whole
//! catalog. Partial imports are not supported, and two imports racing each
//! other are not detected; the second simply overwrites the first.

use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::error::{CatalogError, Result};
use crate::live::LiveCatalog;
use crate::records::{InstructorRow, ModuleRow, RowSet, SoftwareRow, build_candidate};
use crate::store::YamlStore;
use crate::validate::validate;

/// Returned by a committed import. The caller is expected to reload whatever
/// it derived from the previous catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSignal {
    pub instructors: usize,
    pub modules: usize,
    pub software: usize,
    /// Backup of the store contents the import replaced.
    pub backup: Option<PathBuf>,
}

/// Merges externally produced records into the store and the live catalog.
#[derive(Debug)]
pub struct Reconciler<'a> {
    store: &'a YamlStore,
    live: &'a LiveCatalog,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a YamlStore, live: &'a LiveCatalog) -> Self {
        Self { store, live }
    }

    /// Builds a candidate catalog from the three row sets, validates it, and
    /// commits it to the store and the live snapshot. On any issue nothing is
    /// written and the live catalog is left as it was.
    #[instrument(
        level = "info",
        skip_all,
        fields(
            instructors = instructor_rows.len(),
            modules = module_rows.len(),
            software = software_rows.len()
        )
    )]
    pub fn import_external(
        &self,
        instructor_rows: Vec<InstructorRow>,
        module_rows: Vec<ModuleRow>,
        software_rows: Vec<SoftwareRow>,
    ) -> Result<ReloadSignal> {
        self.import_rows(&RowSet {
            instructors: instructor_rows,
            modules: module_rows,
            software: software_rows,
        })
    }

    pub fn import_rows(&self, rows: &RowSet) -> Result<ReloadSignal> {
        let (mut candidate, mut issues) = build_candidate(rows);

        let rederived = candidate.derive_instructor_modules();
        if !rederived.is_empty() {
            debug!(
                instructors = ?rederived,
                "instructor module lists replaced by module assignments"
            );
        }

        issues.extend(validate(&candidate));
        if !issues.is_empty() {
            warn!(issue_count = issues.len(), "import rejected");
            return Err(CatalogError::ReconciliationFailed(issues));
        }

        let outcome = self.store.save(&candidate)?;
        let signal = ReloadSignal {
            instructors: candidate.instructor_count(),
            modules: candidate.module_count(),
            software: candidate.software_count(),
            backup: outcome.backup,
        };
        self.live.replace(candidate);

        info!(
            instructors = signal.instructors,
            modules = signal.modules,
            software = signal.software,
            "import committed"
        );
        Ok(signal)
    }
}
