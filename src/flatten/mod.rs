use crate::audit::ChangeLogRow;
use crate::records::{InstructorRow, ModuleRow, RowSet, SoftwareRow};

/// Sheet holding one row per instructor.
pub const INSTRUCTORS_SHEET: &str = "Instructors";
/// Sheet holding one row per module.
pub const MODULES_SHEET: &str = "Modules";
/// Sheet holding one row per (module, software) pair.
pub const SOFTWARE_SHEET: &str = "Software";

/// Read-only history of software edits; ignored on import.
pub const CHANGELOG_SHEET: &str = "ChangeLog";

pub const INSTRUCTOR_COLUMNS: [&str; 6] = [
    "ID",
    "Name",
    "Email",
    "Department",
    "Modules",
    "Last Review",
];
pub const MODULE_COLUMNS: [&str; 7] = [
    "ID",
    "Code",
    "Name",
    "Description",
    "Year",
    "Semester",
    "Instructor",
];
pub const SOFTWARE_COLUMNS: [&str; 8] = [
    "Module ID",
    "Software Name",
    "Version",
    "Purpose",
    "Critical",
    "Notes",
    "Last Verified",
    "Verified By",
];
pub const CHANGELOG_COLUMNS: [&str; 8] = [
    "Timestamp",
    "Module ID",
    "Software Name",
    "Action",
    "Actor",
    "Field",
    "Old Value",
    "New Value",
];

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    /// Display width per column, in Excel character units.
    pub widths: Vec<f64>,
    pub rows: Vec<Vec<String>>,
}

/// Represents all tables required to materialise the Excel workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookData {
    pub tables: Vec<SheetTable>,
}

impl WorkbookData {
    pub fn table(&self, sheet_name: &str) -> Option<&SheetTable> {
        self.tables.iter().find(|table| table.sheet_name == sheet_name)
    }
}

/// Lays the row set out as the three sheets of the exchange workbook.
pub fn build_workbook(rows: &RowSet) -> WorkbookData {
    let instructors = SheetTable {
        sheet_name: INSTRUCTORS_SHEET.to_string(),
        columns: to_strings(&INSTRUCTOR_COLUMNS),
        widths: vec![15.0, 25.0, 30.0, 20.0, 40.0, 20.0],
        rows: rows.instructors.iter().map(instructor_cells).collect(),
    };

    let modules = SheetTable {
        sheet_name: MODULES_SHEET.to_string(),
        columns: to_strings(&MODULE_COLUMNS),
        widths: vec![20.0, 15.0, 25.0, 40.0, 8.0, 10.0, 20.0],
        rows: rows.modules.iter().map(module_cells).collect(),
    };

    let software = SheetTable {
        sheet_name: SOFTWARE_SHEET.to_string(),
        columns: to_strings(&SOFTWARE_COLUMNS),
        widths: vec![20.0, 25.0, 12.0, 30.0, 10.0, 30.0, 15.0, 20.0],
        rows: rows.software.iter().map(software_cells).collect(),
    };

    WorkbookData {
        tables: vec![instructors, modules, software],
    }
}

/// Lays the change-log rows out as the `ChangeLog` sheet.
pub fn build_changelog_table(rows: &[ChangeLogRow]) -> SheetTable {
    SheetTable {
        sheet_name: CHANGELOG_SHEET.to_string(),
        columns: to_strings(&CHANGELOG_COLUMNS),
        widths: vec![24.0, 20.0, 25.0, 12.0, 20.0, 16.0, 22.0, 22.0],
        rows: rows
            .iter()
            .map(|row| {
                vec![
                    row.timestamp.clone(),
                    row.module_id.clone(),
                    row.software_name.clone(),
                    row.action.clone(),
                    row.actor.clone(),
                    row.field.clone(),
                    row.old_value.clone(),
                    row.new_value.clone(),
                ]
            })
            .collect(),
    }
}

fn instructor_cells(row: &InstructorRow) -> Vec<String> {
    vec![
        row.id.clone(),
        row.name.clone(),
        row.email.clone(),
        row.department.clone(),
        row.modules.clone(),
        row.last_review.clone(),
    ]
}

fn module_cells(row: &ModuleRow) -> Vec<String> {
    vec![
        row.id.clone(),
        row.code.clone(),
        row.name.clone(),
        row.description.clone(),
        row.year.clone(),
        row.semester.clone(),
        row.instructor.clone(),
    ]
}

fn software_cells(row: &SoftwareRow) -> Vec<String> {
    vec![
        row.module_id.clone(),
        row.name.clone(),
        row.version.clone(),
        row.purpose.clone(),
        row.critical.clone(),
        row.notes.clone(),
        row.last_verified.clone(),
        row.verified_by.clone(),
    ]
}

fn to_strings(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|column| column.to_string()).collect()
}
