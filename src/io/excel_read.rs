use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use chrono::{Days, NaiveDate};

use crate::error::{CatalogError, Result};
use crate::flatten::{
    INSTRUCTOR_COLUMNS, INSTRUCTORS_SHEET, MODULE_COLUMNS, MODULES_SHEET, SOFTWARE_COLUMNS,
    SOFTWARE_SHEET,
};
use crate::records::{DATE_FORMAT, InstructorRow, ModuleRow, RowSet, SoftwareRow};

/// Reads the three exchange sheets following the conventions produced by the
/// [`excel_write`](crate::io::excel_write) module.
///
/// Columns are located by header, so people may reorder them or add their
/// own. Rows without an identifier are skipped.
pub fn read_rows(path: &Path) -> Result<RowSet> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let instructors_range = read_required_sheet(&mut workbook, INSTRUCTORS_SHEET)?;
    let modules_range = read_required_sheet(&mut workbook, MODULES_SHEET)?;
    let software_range = read_required_sheet(&mut workbook, SOFTWARE_SHEET)?;

    Ok(RowSet {
        instructors: read_instructors(&instructors_range)?,
        modules: read_modules(&modules_range)?,
        software: read_software(&software_range)?,
    })
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| CatalogError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(CatalogError::from)?;
    Ok(range)
}

fn read_instructors(range: &Range<DataType>) -> Result<Vec<InstructorRow>> {
    let columns = locate_columns(range, INSTRUCTORS_SHEET, &INSTRUCTOR_COLUMNS)?;
    let rows = range
        .rows()
        .skip(1)
        .map(|row| {
            let cell = |index: usize| cell_to_string(row.get(columns[index]));
            InstructorRow {
                id: cell(0).trim().to_string(),
                name: cell(1),
                email: cell(2),
                department: cell(3),
                modules: cell(4),
                last_review: cell(5),
            }
        })
        .filter(|row| !row.id.is_empty())
        .collect();
    Ok(rows)
}

fn read_modules(range: &Range<DataType>) -> Result<Vec<ModuleRow>> {
    let columns = locate_columns(range, MODULES_SHEET, &MODULE_COLUMNS)?;
    let rows = range
        .rows()
        .skip(1)
        .map(|row| {
            let cell = |index: usize| cell_to_string(row.get(columns[index]));
            ModuleRow {
                id: cell(0).trim().to_string(),
                code: cell(1),
                name: cell(2),
                description: cell(3),
                year: cell(4),
                semester: cell(5),
                instructor: cell(6),
            }
        })
        .filter(|row| !row.id.is_empty())
        .collect();
    Ok(rows)
}

fn read_software(range: &Range<DataType>) -> Result<Vec<SoftwareRow>> {
    let columns = locate_columns(range, SOFTWARE_SHEET, &SOFTWARE_COLUMNS)?;
    let rows = range
        .rows()
        .skip(1)
        .map(|row| {
            let cell = |index: usize| cell_to_string(row.get(columns[index]));
            SoftwareRow {
                module_id: cell(0).trim().to_string(),
                name: cell(1),
                version: cell(2),
                purpose: cell(3),
                critical: cell(4),
                notes: cell(5),
                last_verified: cell(6),
                verified_by: cell(7),
            }
        })
        .filter(|row| !row.module_id.is_empty() && !row.name.is_empty())
        .collect();
    Ok(rows)
}

/// Maps each expected header to its column index in the sheet.
fn locate_columns(range: &Range<DataType>, sheet: &str, expected: &[&str]) -> Result<Vec<usize>> {
    let headers: Vec<String> = match range.rows().next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)).trim().to_ascii_lowercase())
            .collect(),
        None => Vec::new(),
    };

    expected
        .iter()
        .map(|column| {
            let wanted = column.to_ascii_lowercase();
            headers
                .iter()
                .position(|header| *header == wanted)
                .ok_or_else(|| {
                    CatalogError::InvalidWorkbook(format!(
                        "sheet '{sheet}' is missing column '{column}'"
                    ))
                })
        })
        .collect()
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::DateTime(serial)) => {
            excel_serial_to_date(*serial).unwrap_or_else(|| serial.to_string())
        }
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Converts an Excel serial day number (1900 date system) into an ISO date.
fn excel_serial_to_date(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_days(Days::new(serial.trunc() as u64))?;
    Some(date.format(DATE_FORMAT).to_string())
}
