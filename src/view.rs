//! Habit view: one habit file presented as editable state.
//!
//! Every mutation goes through [`HabitView::update`] (or the free [`mutate`]),
//! which applies the reducer, re-encodes the workbook and writes it back
//! through the store before returning.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use log::{debug, info};

use crate::actions::{self, HabitAction};
use crate::config::{HABIT_VIEW_TYPE, HABITS_FILE_NAME, HABITS_MIME_TYPE};
use crate::downloader::write_habit_workbook;
use crate::error::WorkbookError;
use crate::habit::{Habit, HabitWorkbook, ViewSetting, iso_timestamp};
use crate::loader::{from_xlsx_bytes, parse_habit_workbook};
use crate::store::{LocalFileIndexEntry, LocalFileRecord, LocalFileStore};

/// Decode a file's workbook, or an empty one when the file is absent.
pub fn load(store: &LocalFileStore, file_id: &str) -> HabitWorkbook {
    match store.get_record(file_id) {
        Some(record) if !record.content_base64.is_empty() => {
            parse_habit_workbook(&record.content_base64)
        }
        _ => HabitWorkbook::empty(),
    }
}

/// Load, apply one action and persist
///
/// # Arguments
/// * `store` - Store of the calling context
/// * `file_id` - File to mutate; created when absent
/// * `action` - Action to dispatch
///
/// # Returns
/// * `Result<HabitWorkbook, WorkbookError>` - The persisted workbook, or an encoding error
pub fn mutate(
    store: &mut LocalFileStore,
    file_id: &str,
    action: HabitAction,
) -> Result<HabitWorkbook, WorkbookError> {
    let created_at = store.get_record(file_id).map(|record| record.created_at);
    let now = Utc::now();
    let next = actions::apply(load(store, file_id), action, now);
    persist(store, file_id, &next, created_at.as_deref(), now)?;
    Ok(next)
}

pub fn list(store: &LocalFileStore) -> Vec<LocalFileIndexEntry> {
    store.index().to_vec()
}

/// Store externally supplied XLSX bytes as a local habit file.
///
/// Unlike the load path this rejects bytes that are not a container at all.
/// The decoded workbook is written back re-encoded, so the persisted view is
/// always reconciled.
pub fn import_workbook(
    store: &mut LocalFileStore,
    file_id: &str,
    bytes: &[u8],
) -> Result<HabitWorkbook, WorkbookError> {
    let workbook = from_xlsx_bytes(bytes)?;
    let created_at = store.get_record(file_id).map(|record| record.created_at);
    persist(store, file_id, &workbook, created_at.as_deref(), Utc::now())?;
    info!(
        "Imported {} habits and {} history entries into '{}'",
        workbook.habits.len(),
        workbook.history.len(),
        file_id
    );
    Ok(workbook)
}

/// Encode and save a workbook. `Ok(false)` when the store dropped the write.
pub fn persist(
    store: &mut LocalFileStore,
    file_id: &str,
    workbook: &HabitWorkbook,
    created_at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool, WorkbookError> {
    let content_base64 = write_habit_workbook(workbook)?;
    let now = iso_timestamp(now);
    let record = LocalFileRecord {
        id: file_id.to_string(),
        name: HABITS_FILE_NAME.to_string(),
        view_type: HABIT_VIEW_TYPE.to_string(),
        mime_type: HABITS_MIME_TYPE.to_string(),
        created_at: created_at.map(str::to_string).unwrap_or_else(|| now.clone()),
        updated_at: now,
        content_base64,
    };
    Ok(store.save_record(&record))
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Midnight UTC of `date` as an ISO instant, the key used for toggling a day.
pub fn day_datetime(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

pub fn day_key_of(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// One habit row of the weekly grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeekRow {
    pub habit: Habit,
    pub view: ViewSetting,
    pub marks: [bool; 7],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeekGrid {
    pub days: [NaiveDate; 7],
    pub rows: Vec<WeekRow>,
}

/// Decoded state of one habit file plus the week being looked at.
pub struct HabitView {
    file_id: String,
    workbook: HabitWorkbook,
    created_at: Option<String>,
    version: u64,
    week_start: NaiveDate,
}

impl HabitView {
    pub fn open(store: &LocalFileStore, file_id: &str) -> Self {
        let record = store.get_record(file_id);
        let workbook = match &record {
            Some(record) if !record.content_base64.is_empty() => {
                parse_habit_workbook(&record.content_base64)
            }
            _ => HabitWorkbook::empty(),
        };

        HabitView {
            file_id: file_id.to_string(),
            workbook,
            created_at: record.map(|record| record.created_at),
            version: store.file_version(file_id),
            week_start: week_start(Local::now().date_naive()),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn workbook(&self) -> &HabitWorkbook {
        &self.workbook
    }

    /// Re-decode when the file changed since it was last read. Returns whether it did.
    pub fn refresh(&mut self, store: &LocalFileStore) -> bool {
        let version = store.file_version(&self.file_id);
        if version == self.version {
            return false;
        }

        debug!("'{}' moved to version {}, reloading", self.file_id, version);
        let week_start = self.week_start;
        let file_id = self.file_id.clone();
        *self = HabitView::open(store, &file_id);
        self.week_start = week_start;
        true
    }

    pub fn update(
        &mut self,
        store: &mut LocalFileStore,
        action: HabitAction,
    ) -> Result<bool, WorkbookError> {
        self.update_at(store, action, Utc::now())
    }

    /// Apply an action and persist the result
    ///
    /// The in-memory workbook only advances once encoding succeeded.
    ///
    /// # Returns
    /// * `Result<bool, WorkbookError>` - Whether the store accepted the write
    pub fn update_at(
        &mut self,
        store: &mut LocalFileStore,
        action: HabitAction,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkbookError> {
        let next = actions::apply(self.workbook.clone(), action, now);
        let saved = persist(store, &self.file_id, &next, self.created_at.as_deref(), now)?;

        if saved && self.created_at.is_none() {
            self.created_at = Some(iso_timestamp(now));
        }
        self.workbook = next;
        self.version = store.file_version(&self.file_id);
        Ok(saved)
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn show_week_of(&mut self, date: NaiveDate) {
        self.week_start = week_start(date);
    }

    pub fn next_week(&mut self) {
        self.week_start += Duration::days(7);
    }

    pub fn previous_week(&mut self) {
        self.week_start -= Duration::days(7);
    }

    pub fn week_days(&self) -> [NaiveDate; 7] {
        std::array::from_fn(|offset| self.week_start + Duration::days(offset as i64))
    }

    /// Visible habits in display order with their marks for the current week.
    pub fn week_grid(&self) -> WeekGrid {
        let days = self.week_days();
        let lookup = self.workbook.history_lookup();
        let keys = days.map(day_key_of);

        let rows = self
            .workbook
            .visible_habits()
            .into_iter()
            .map(|pair| WeekRow {
                habit: pair.habit.clone(),
                view: pair.view.clone(),
                marks: std::array::from_fn(|i| lookup.is_marked(&pair.habit.id, &keys[i])),
            })
            .collect();

        WeekGrid { days, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weeks_start_on_monday() {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(week_start(sunday), monday);
        assert_eq!(week_start(monday), monday);
    }

    #[test]
    fn day_datetime_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(day_datetime(date), "2024-01-01T00:00:00.000Z");
        assert_eq!(day_key_of(date), "2024-01-01");
    }
}
