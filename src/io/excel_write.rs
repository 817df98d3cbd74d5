use std::path::Path;

use rust_xlsxwriter::{Format, Table, Workbook};

use crate::error::Result;
use crate::flatten::WorkbookData;

/// Writes the provided workbook data to the given path.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let header_format = Format::new().set_bold();

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col_idx as u16, header, &header_format)?;
        }
        for (col_idx, width) in table.widths.iter().enumerate() {
            worksheet.set_column_width(col_idx as u16, *width)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
            }
        }

        // Excel tables need at least one data row below the header.
        if !table.rows.is_empty() {
            let mut excel_table = Table::new();
            excel_table.set_autofilter(true);
            let col_end = (table.columns.len() as u16).saturating_sub(1);
            let row_end = table.rows.len() as u32;
            worksheet.add_table(0, 0, row_end, col_end, &excel_table)?;
        }
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    workbook_writer.save(path)?;
    Ok(())
}
