use crate::downloader::{HABITS_SHEET_NAME, HISTORY_SHEET_NAME, VIEW_SHEET_NAME};
use crate::error::WorkbookError;
use crate::habit::{Habit, HabitWorkbook, HistoryEntry, ViewSetting, reconcile_keyed_view};
use base64::{Engine as _, engine::general_purpose};
use calamine::{Data, Range, Reader, Xlsx, open_workbook_from_rs};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// Decode a persisted habit workbook from base64 text
///
/// This never fails: text that is not base64, bytes that are not an XLSX
/// container, and missing sheets all degrade to empty tables. The view list
/// is reconciled against the decoded habits before it is returned.
///
/// # Arguments
/// * `content_base64` - Base64 encoding of the XLSX bytes
///
/// # Returns
/// * `HabitWorkbook` - The decoded workbook, empty when nothing was readable
///
/// # Examples
/// ```
/// use sheetlife::loader::parse_habit_workbook;
///
/// let workbook = parse_habit_workbook("not base64 at all");
/// assert!(workbook.habits.is_empty());
/// ```
pub fn parse_habit_workbook(content_base64: &str) -> HabitWorkbook {
    let bytes = match general_purpose::STANDARD.decode(content_base64.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Stored workbook is not valid base64, using an empty workbook: {}", e);
            return HabitWorkbook::empty();
        }
    };

    match from_xlsx_bytes(&bytes) {
        Ok(workbook) => workbook,
        Err(e) => {
            warn!("Stored workbook could not be opened, using an empty workbook: {}", e);
            HabitWorkbook::empty()
        }
    }
}

/// Decode XLSX bytes. Fails only when the container itself cannot be opened.
pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<HabitWorkbook, WorkbookError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    Ok(read_workbook(&mut workbook))
}

/// Load a habit workbook from an Excel file on disk
///
/// # Arguments
/// * `filepath` - Path to the XLSX file to load
///
/// # Examples
/// ```no_run
/// use sheetlife::loader::from_excel;
///
/// match from_excel("habits.xlsx") {
///     Ok(workbook) => println!("Loaded {} habits", workbook.habits.len()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<HabitWorkbook, WorkbookError> {
    let bytes = fs::read(filepath)?;
    from_xlsx_bytes(&bytes)
}

fn read_workbook<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> HabitWorkbook {
    let habits = read_table(workbook, HABITS_SHEET_NAME)
        .iter()
        .filter_map(habit_from_row)
        .collect::<Vec<_>>();
    let history = read_table(workbook, HISTORY_SHEET_NAME)
        .iter()
        .filter_map(history_from_row)
        .collect::<Vec<_>>();
    let view = read_table(workbook, VIEW_SHEET_NAME)
        .iter()
        .filter_map(view_from_row)
        .collect::<Vec<_>>();

    let view = reconcile_keyed_view(&habits, view);
    HabitWorkbook {
        habits,
        history,
        view,
    }
}

/// One data row keyed by header text.
struct SheetRow<'a> {
    headers: &'a HashMap<String, usize>,
    cells: &'a [Data],
}

impl<'a> SheetRow<'a> {
    fn cell(&self, header: &str) -> Option<&'a Data> {
        self.headers
            .get(header)
            .and_then(|col| self.cells.get(*col))
    }

    fn text(&self, header: &str) -> String {
        self.cell(header).map(cell_text).unwrap_or_default()
    }
}

struct Table {
    headers: HashMap<String, usize>,
    rows: Vec<Vec<Data>>,
}

impl Table {
    fn empty() -> Self {
        Table {
            headers: HashMap::new(),
            rows: Vec::new(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = SheetRow<'_>> {
        self.rows.iter().map(|cells| SheetRow {
            headers: &self.headers,
            cells,
        })
    }
}

fn read_table<RS: Read + Seek>(workbook: &mut Xlsx<RS>, sheet_name: &str) -> Table {
    if !workbook.sheet_names().iter().any(|name| name == sheet_name) {
        debug!("Sheet '{}' is missing, treating it as empty", sheet_name);
        return Table::empty();
    }

    match workbook.worksheet_range(sheet_name) {
        Ok(range) => table_from_range(&range),
        Err(e) => {
            warn!("Sheet '{}' could not be read, treating it as empty: {}", sheet_name, e);
            Table::empty()
        }
    }
}

fn table_from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Table::empty();
    };

    let mut headers = HashMap::new();
    for (col, cell) in header_row.iter().enumerate() {
        let name = cell_text(cell).trim().to_string();
        if !name.is_empty() {
            headers.entry(name).or_insert(col);
        }
    }

    Table {
        headers,
        rows: rows.map(|row| row.to_vec()).collect(),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

fn habit_from_row(row: SheetRow<'_>) -> Option<Habit> {
    let id = row.text("habit-id").trim().to_string();
    if id.is_empty() {
        return None;
    }

    let deprecated_at = row.text("deprecated_at");
    Some(Habit {
        id,
        icon: row.text("icon"),
        name: row.text("name"),
        description: row.text("description"),
        created_at: row.text("created_at"),
        category: row.text("category"),
        period: row.text("period"),
        deprecated_at: (!deprecated_at.is_empty()).then_some(deprecated_at),
    })
}

fn history_from_row(row: SheetRow<'_>) -> Option<HistoryEntry> {
    let datetime = row.text("datetime");
    let habit_id = row.text("habit-id").trim().to_string();
    if datetime.is_empty() || habit_id.is_empty() {
        return None;
    }

    Some(HistoryEntry {
        datetime,
        habit_id,
        status: row.text("status"),
        comment: row.text("comment"),
    })
}

fn view_from_row(row: SheetRow<'_>) -> Option<(ViewSetting, f64)> {
    let habit_id = row.text("habit-id").trim().to_string();
    if habit_id.is_empty() {
        return None;
    }

    let order = row.cell("order").map(cell_order).unwrap_or(0.0);
    let color = row.text("color");
    let setting = ViewSetting {
        habit_id,
        order: order.trunc() as i64,
        hidden: row.cell("hidden").is_some_and(cell_hidden),
        color: (!color.is_empty()).then_some(color),
    };
    Some((setting, order))
}

fn cell_order(cell: &Data) -> f64 {
    let value = match cell {
        Data::Int(i) => *i as f64,
        Data::Float(f) => *f,
        Data::Empty => 0.0,
        other => cell_text(other).trim().parse::<f64>().unwrap_or(0.0),
    };
    if value.is_finite() { value } else { 0.0 }
}

fn cell_hidden(cell: &Data) -> bool {
    match cell {
        Data::Bool(b) => *b,
        other => {
            let text = cell_text(other);
            text == "TRUE" || text == "true"
        }
    }
}
