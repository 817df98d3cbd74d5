//! Spreadsheet adapters for the exchange workbook.

pub mod excel_read;
pub mod excel_write;
