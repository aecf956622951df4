use std::path::Path;

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::Result;
use crate::flatten::{Cell, SheetTable};

/// Excel caps worksheet names at 31 characters.
const MAX_SHEET_NAME_LEN: usize = 31;

/// File name of the local export for the given day, e.g. `git_2026-10-16.xlsx`.
pub fn dated_file_name(date: NaiveDate) -> String {
    format!("git_{}.xlsx", date.format("%Y-%m-%d"))
}

/// Writes the table to a single-sheet workbook at `path`.
pub fn write_table(path: &Path, table: &SheetTable) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sanitize_sheet_name(&table.sheet_name))?;

    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col_idx as u16, header, &header_format)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    worksheet.autofit();
    workbook.save(path)?;
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<()> {
    match cell {
        Cell::Empty => {}
        Cell::Text(text) if text.is_empty() => {}
        Cell::Text(text) => {
            worksheet.write_string(row, col, text)?;
        }
        Cell::Number(number) => {
            worksheet.write_number(row, col, *number)?;
        }
        Cell::Bool(flag) => {
            worksheet.write_boolean(row, col, *flag)?;
        }
    }
    Ok(())
}

fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\''];
    let mut sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    sanitized = sanitized.trim().to_string();
    if sanitized.is_empty() {
        sanitized = "Sheet1".to_string();
    }

    sanitized.chars().take(MAX_SHEET_NAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_carries_iso_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).expect("valid date");
        assert_eq!(dated_file_name(date), "git_2026-03-07.xlsx");
    }

    #[test]
    fn sheet_names_are_made_excel_safe() {
        assert_eq!(sanitize_sheet_name("Git_Raw"), "Git_Raw");
        assert_eq!(sanitize_sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   "), "Sheet1");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), 31);
    }
}
