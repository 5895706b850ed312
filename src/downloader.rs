use crate::error::WorkbookError;
use crate::habit::HabitWorkbook;
use base64::{Engine as _, engine::general_purpose};
use rust_xlsxwriter::{Workbook, Worksheet};

pub const HABITS_SHEET_NAME: &str = "habits";
pub const HISTORY_SHEET_NAME: &str = "history";
pub const VIEW_SHEET_NAME: &str = "view";

pub const HABITS_HEADERS: [&str; 8] = [
    "habit-id",
    "icon",
    "name",
    "description",
    "created_at",
    "category",
    "period",
    "deprecated_at",
];
pub const HISTORY_HEADERS: [&str; 4] = ["datetime", "habit-id", "status", "comment"];
pub const VIEW_HEADERS: [&str; 4] = ["habit-id", "order", "hidden", "color"];

/// Convert a habit workbook to XLSX format
///
/// Writes three sheets (`habits`, `history`, `view`), each with a header row
/// followed by one row per item. Absent optional values are written as empty
/// strings, `order` as a number and `hidden` as the literal `TRUE`/`FALSE`.
///
/// # Arguments
/// * `data` - Workbook to encode
///
/// # Returns
/// * `Result<Vec<u8>, WorkbookError>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use sheetlife::downloader::to_xlsx;
/// use sheetlife::habit::HabitWorkbook;
///
/// let bytes = to_xlsx(&HabitWorkbook::empty()).unwrap();
/// assert_eq!(&bytes[..2], b"PK");
/// ```
pub fn to_xlsx(data: &HabitWorkbook) -> Result<Vec<u8>, WorkbookError> {
    let mut workbook = Workbook::new();

    let mut habits = sheet_with_headers(HABITS_SHEET_NAME, &HABITS_HEADERS)?;
    for (index, habit) in data.habits.iter().enumerate() {
        let row = index as u32 + 1;
        let cells = [
            habit.id.as_str(),
            habit.icon.as_str(),
            habit.name.as_str(),
            habit.description.as_str(),
            habit.created_at.as_str(),
            habit.category.as_str(),
            habit.period.as_str(),
            habit.deprecated_at.as_deref().unwrap_or(""),
        ];
        write_text_row(&mut habits, row, &cells)?;
    }

    let mut history = sheet_with_headers(HISTORY_SHEET_NAME, &HISTORY_HEADERS)?;
    for (index, entry) in data.history.iter().enumerate() {
        let row = index as u32 + 1;
        let cells = [
            entry.datetime.as_str(),
            entry.habit_id.as_str(),
            entry.status.as_str(),
            entry.comment.as_str(),
        ];
        write_text_row(&mut history, row, &cells)?;
    }

    let mut view = sheet_with_headers(VIEW_SHEET_NAME, &VIEW_HEADERS)?;
    for (index, entry) in data.view.iter().enumerate() {
        let row = index as u32 + 1;
        view.write_string(row, 0, entry.habit_id.as_str())?;
        view.write_number(row, 1, entry.order as f64)?;
        view.write_string(row, 2, if entry.hidden { "TRUE" } else { "FALSE" })?;
        view.write_string(row, 3, entry.color.as_deref().unwrap_or(""))?;
    }

    workbook.push_worksheet(habits);
    workbook.push_worksheet(history);
    workbook.push_worksheet(view);

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

/// Encode a habit workbook as base64 text of its XLSX bytes.
pub fn write_habit_workbook(data: &HabitWorkbook) -> Result<String, WorkbookError> {
    let bytes = to_xlsx(data)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

fn sheet_with_headers(name: &str, headers: &[&str]) -> Result<Worksheet, WorkbookError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(name)?;
    write_text_row(&mut sheet, 0, headers)?;
    Ok(sheet)
}

fn write_text_row(sheet: &mut Worksheet, row: u32, cells: &[&str]) -> Result<(), WorkbookError> {
    for (col, value) in cells.iter().enumerate() {
        sheet.write_string(row, col as u16, *value)?;
    }
    Ok(())
}
