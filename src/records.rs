//! Row-oriented records exchanged with the spreadsheet, and the coercions
//! that turn them into typed catalog entities.
//!
//! Rows are plain text on purpose: they mirror what a person can type into a
//! cell. Nothing untyped travels past [`build_candidate`].

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::{Catalog, EntityKind, Instructor, Module, Software, software_key};
use crate::validate::{EntityRef, IssueKind, ValidationIssue};

/// Date format used in the store and in the workbook.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstructorRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    /// Comma-separated module ids.
    pub modules: String,
    pub last_review: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub year: String,
    pub semester: String,
    /// Instructor id, or empty when the module is unassigned.
    pub instructor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SoftwareRow {
    pub module_id: String,
    pub name: String,
    pub version: String,
    pub purpose: String,
    /// `Yes` or `No`.
    pub critical: String,
    pub notes: String,
    pub last_verified: String,
    pub verified_by: String,
}

/// The three row collections that make up a full import or export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowSet {
    pub instructors: Vec<InstructorRow>,
    pub modules: Vec<ModuleRow>,
    pub software: Vec<SoftwareRow>,
}

/// Projects a catalog into row records. This is the inverse of
/// [`build_candidate`] for any catalog whose relation view is derived.
pub fn export_rows(catalog: &Catalog) -> RowSet {
    let instructors = catalog
        .list_instructors()
        .map(|instructor| InstructorRow {
            id: instructor.id.clone(),
            name: instructor.name.clone(),
            email: instructor.email.clone(),
            department: instructor.department.clone(),
            modules: join_module_ids(&instructor.modules),
            last_review: format_date(instructor.last_review),
        })
        .collect();

    let modules = catalog
        .list_modules()
        .map(|module| ModuleRow {
            id: module.id.clone(),
            code: module.code.clone(),
            name: module.name.clone(),
            description: module.description.clone(),
            year: module.year.to_string(),
            semester: module.semester.to_string(),
            instructor: module.instructor.clone().unwrap_or_default(),
        })
        .collect();

    let software = catalog
        .list_modules()
        .flat_map(|module| {
            module.software.iter().map(move |software| SoftwareRow {
                module_id: module.id.clone(),
                name: software.name.clone(),
                version: software.version.clone(),
                purpose: software.purpose.clone(),
                critical: if software.critical { "Yes" } else { "No" }.to_string(),
                notes: software.notes.clone(),
                last_verified: format_date(software.last_verified),
                verified_by: software.verified_by.clone(),
            })
        })
        .collect();

    RowSet {
        instructors,
        modules,
        software,
    }
}

/// Coerces a row set into a candidate catalog.
///
/// Every field that fails to coerce is reported, alongside software rows that
/// point at a module missing from the module rows. The returned catalog is
/// built from the rows verbatim: the instructor relation is not re-derived and
/// no structural validation is run.
pub fn build_candidate(rows: &RowSet) -> (Catalog, Vec<ValidationIssue>) {
    let mut issues = Vec::new();

    let instructors: Vec<Instructor> = rows
        .instructors
        .iter()
        .map(|row| {
            let entity = EntityRef::new(EntityKind::Instructor, row.id.trim());
            Instructor {
                id: row.id.trim().to_string(),
                name: row.name.clone(),
                email: row.email.clone(),
                department: row.department.clone(),
                modules: split_module_ids(&row.modules),
                last_review: coerce_date(&row.last_review, "last_review", &entity, &mut issues),
            }
        })
        .collect();

    let mut modules: Vec<Module> = rows
        .modules
        .iter()
        .map(|row| {
            let entity = EntityRef::new(EntityKind::Module, row.id.trim());
            let instructor = row.instructor.trim();
            Module {
                id: row.id.trim().to_string(),
                code: row.code.clone(),
                name: row.name.clone(),
                description: row.description.clone(),
                year: coerce_small_int(&row.year, "year", &entity, &mut issues),
                semester: coerce_small_int(&row.semester, "semester", &entity, &mut issues),
                instructor: (!instructor.is_empty()).then(|| instructor.to_string()),
                software: Vec::new(),
            }
        })
        .collect();

    for row in &rows.software {
        let module_id = row.module_id.trim();
        let entity = EntityRef::new(EntityKind::Software, software_key(module_id, &row.name));
        let software = Software {
            name: row.name.clone(),
            version: row.version.clone(),
            purpose: row.purpose.clone(),
            critical: parse_critical(&row.critical),
            notes: row.notes.clone(),
            last_verified: coerce_date(&row.last_verified, "last_verified", &entity, &mut issues),
            verified_by: row.verified_by.clone(),
        };

        match modules.iter_mut().find(|module| module.id == module_id) {
            Some(module) => module.software.push(software),
            None => issues.push(ValidationIssue::new(
                entity,
                IssueKind::DanglingReference,
                format!("module '{module_id}' does not exist"),
            )),
        }
    }

    (Catalog::from_parts(instructors, modules), issues)
}

/// Parses an ISO date, treating blank text as "no date". Date-time strings
/// as produced by spreadsheet tools are truncated to their date.
pub fn parse_date(text: &str) -> Result<Option<NaiveDate>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Ok(Some(date));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(moment) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Some(moment.date()));
        }
    }
    Err(format!("'{text}' is not an ISO date (YYYY-MM-DD)"))
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Parses a year or semester. Blank text defaults to 1.
pub fn parse_small_int(text: &str) -> Result<u8, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(1);
    }
    let value: u8 = text
        .parse()
        .map_err(|_| format!("'{text}' is not a small positive integer"))?;
    if value == 0 {
        return Err("must be at least 1".to_string());
    }
    Ok(value)
}

pub fn parse_critical(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

pub fn split_module_ids(text: &str) -> BTreeSet<String> {
    text.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_module_ids(ids: &BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn coerce_date(
    text: &str,
    field: &str,
    entity: &EntityRef,
    issues: &mut Vec<ValidationIssue>,
) -> Option<NaiveDate> {
    parse_date(text).unwrap_or_else(|reason| {
        issues.push(ValidationIssue::new(
            entity.clone(),
            IssueKind::InvalidDate,
            format!("{field}: {reason}"),
        ));
        None
    })
}

fn coerce_small_int(
    text: &str,
    field: &str,
    entity: &EntityRef,
    issues: &mut Vec<ValidationIssue>,
) -> u8 {
    parse_small_int(text).unwrap_or_else(|reason| {
        issues.push(ValidationIssue::new(
            entity.clone(),
            IssueKind::InvalidNumericField,
            format!("{field}: {reason}"),
        ));
        1
    })
}
