//! Reducers over [`HabitWorkbook`].
//!
//! Every operation takes the workbook by value and returns the next one. An
//! operation naming a habit that does not exist returns its input untouched.
//! All of them leave a reconciled, densely ordered view behind.

use crate::error::InvalidInput;
use crate::habit::{Habit, HabitWorkbook, HistoryEntry, ViewSetting, iso_timestamp, reconcile_view};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

lazy_static! {
    static ref NON_ALNUM_REGEX: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

pub const DEFAULT_ICON: &str = "✅";
pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_PERIOD: &str = "day";
pub const DEFAULT_STATUS: &str = "OK";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct AddHabitInput {
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub period: Option<String>,
}

impl AddHabitInput {
    pub fn new(name: &str) -> Self {
        AddHabitInput {
            name: name.to_string(),
            ..AddHabitInput::default()
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct RecordHistoryInput {
    pub habit_id: String,
    pub datetime: String,
    pub status: Option<String>,
    pub comment: Option<String>,
}

impl RecordHistoryInput {
    pub fn new(habit_id: &str, datetime: &str) -> Self {
        RecordHistoryInput {
            habit_id: habit_id.to_string(),
            datetime: datetime.to_string(),
            status: None,
            comment: None,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(InvalidInput::UnknownDirection(other.to_string())),
        }
    }
}

/// A discrete user action on a habit workbook.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum HabitAction {
    Add(AddHabitInput),
    Record(RecordHistoryInput),
    Toggle(RecordHistoryInput),
    Reorder { habit_id: String, direction: Direction },
    SetHidden { habit_id: String, hidden: bool },
    Remove { habit_id: String },
    Restore { habit_id: String },
}

/// Result of [`add_habit`]: the next workbook and the habit it created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedHabit {
    pub workbook: HabitWorkbook,
    pub habit: Habit,
}

/// Check an add request before dispatching it.
///
/// The reducer itself accepts any name; an empty one would only produce a
/// habit called `habit`.
pub fn validate_add_habit(input: &AddHabitInput) -> Result<(), InvalidInput> {
    if input.name.trim().is_empty() {
        return Err(InvalidInput::EmptyName);
    }
    Ok(())
}

/// Apply one action, stamping time-dependent fields with `now`.
pub fn apply(workbook: HabitWorkbook, action: HabitAction, now: DateTime<Utc>) -> HabitWorkbook {
    match action {
        HabitAction::Add(input) => add_habit_at(workbook, input, now).workbook,
        HabitAction::Record(input) => record_habit_event(workbook, input),
        HabitAction::Toggle(input) => toggle_habit_event(workbook, input),
        HabitAction::Reorder {
            habit_id,
            direction,
        } => reorder_habit(workbook, &habit_id, direction),
        HabitAction::SetHidden { habit_id, hidden } => set_habit_hidden(workbook, &habit_id, hidden),
        HabitAction::Remove { habit_id } => remove_habit_from_view_at(workbook, &habit_id, now),
        HabitAction::Restore { habit_id } => restore_habit(workbook, &habit_id),
    }
}

pub fn add_habit(workbook: HabitWorkbook, input: AddHabitInput) -> AddedHabit {
    add_habit_at(workbook, input, Utc::now())
}

/// Append a new habit with a fresh slug id
///
/// The id is the slug of `name`, suffixed with `-1`, `-2`, ... while it
/// collides with any existing id, deprecated habits included.
///
/// # Arguments
/// * `workbook` - Current workbook
/// * `input` - Name plus optional presentation fields
/// * `now` - Creation timestamp
///
/// # Examples
/// ```
/// use sheetlife::actions::{add_habit, AddHabitInput};
/// use sheetlife::habit::HabitWorkbook;
///
/// let added = add_habit(HabitWorkbook::empty(), AddHabitInput::new("Daily stretch"));
/// assert_eq!(added.habit.id, "daily-stretch");
/// ```
pub fn add_habit_at(workbook: HabitWorkbook, input: AddHabitInput, now: DateTime<Utc>) -> AddedHabit {
    let HabitWorkbook {
        mut habits,
        history,
        mut view,
    } = workbook;

    let existing: HashSet<&str> = habits.iter().map(|habit| habit.id.as_str()).collect();
    let habit_id = generate_habit_id(&input.name, &existing);

    let habit = Habit {
        id: habit_id.clone(),
        icon: input.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
        name: input.name,
        description: input.description.unwrap_or_default(),
        created_at: iso_timestamp(now),
        category: input.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        period: input.period.unwrap_or_else(|| DEFAULT_PERIOD.to_string()),
        deprecated_at: None,
    };

    habits.push(habit.clone());
    view.push(ViewSetting::new(&habit_id, view.len() as i64));
    let view = reconcile_view(&habits, &view);

    AddedHabit {
        workbook: HabitWorkbook {
            habits,
            history,
            view,
        },
        habit,
    }
}

/// Append a history entry without checking for an existing one.
pub fn record_habit_event(mut workbook: HabitWorkbook, input: RecordHistoryInput) -> HabitWorkbook {
    if !workbook.contains_habit(&input.habit_id) {
        return workbook;
    }
    workbook.history.push(HistoryEntry {
        habit_id: input.habit_id,
        datetime: input.datetime,
        status: input.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        comment: input.comment.unwrap_or_default(),
    });
    workbook
}

/// Mark or unmark one occurrence.
///
/// When an entry with the same `(habit_id, datetime)` exists, the first such
/// entry is removed and any later duplicate is left alone.
pub fn toggle_habit_event(mut workbook: HabitWorkbook, input: RecordHistoryInput) -> HabitWorkbook {
    if !workbook.contains_habit(&input.habit_id) {
        return workbook;
    }
    let existing = workbook
        .history
        .iter()
        .position(|entry| entry.habit_id == input.habit_id && entry.datetime == input.datetime);

    match existing {
        Some(index) => {
            workbook.history.remove(index);
            workbook
        }
        None => record_habit_event(workbook, input),
    }
}

pub fn reorder_habit(workbook: HabitWorkbook, habit_id: &str, direction: Direction) -> HabitWorkbook {
    if !workbook.contains_habit(habit_id) {
        return workbook;
    }
    let mut sorted = reconcile_view(&workbook.habits, &workbook.view);
    let Some(index) = sorted.iter().position(|entry| entry.habit_id == habit_id) else {
        return workbook;
    };

    let target = match direction {
        Direction::Up => index.saturating_sub(1),
        Direction::Down => (index + 1).min(sorted.len() - 1),
    };
    if target == index {
        return workbook;
    }

    let moved = sorted.remove(index);
    sorted.insert(target, moved);
    for (order, entry) in sorted.iter_mut().enumerate() {
        entry.order = order as i64;
    }

    HabitWorkbook {
        view: sorted,
        ..workbook
    }
}

pub fn set_habit_hidden(workbook: HabitWorkbook, habit_id: &str, hidden: bool) -> HabitWorkbook {
    if !workbook.contains_habit(habit_id) {
        return workbook;
    }
    let view = with_view_hidden(reconcile_view(&workbook.habits, &workbook.view), habit_id, hidden);
    HabitWorkbook { view, ..workbook }
}

pub fn remove_habit_from_view(workbook: HabitWorkbook, habit_id: &str) -> HabitWorkbook {
    remove_habit_from_view_at(workbook, habit_id, Utc::now())
}

/// Soft-delete a habit: stamp `deprecated_at` and hide it. History is kept.
pub fn remove_habit_from_view_at(
    mut workbook: HabitWorkbook,
    habit_id: &str,
    now: DateTime<Utc>,
) -> HabitWorkbook {
    let Some(habit) = workbook.habits.iter_mut().find(|habit| habit.id == habit_id) else {
        return workbook;
    };
    habit.deprecated_at = Some(iso_timestamp(now));

    let view = with_view_hidden(reconcile_view(&workbook.habits, &workbook.view), habit_id, true);
    HabitWorkbook { view, ..workbook }
}

pub fn restore_habit(mut workbook: HabitWorkbook, habit_id: &str) -> HabitWorkbook {
    let Some(habit) = workbook.habits.iter_mut().find(|habit| habit.id == habit_id) else {
        return workbook;
    };
    habit.deprecated_at = None;

    let view = with_view_hidden(reconcile_view(&workbook.habits, &workbook.view), habit_id, false);
    HabitWorkbook { view, ..workbook }
}

fn with_view_hidden(mut view: Vec<ViewSetting>, habit_id: &str, hidden: bool) -> Vec<ViewSetting> {
    for entry in view.iter_mut().filter(|entry| entry.habit_id == habit_id) {
        entry.hidden = hidden;
    }
    view
}

pub fn generate_habit_id(name: &str, existing: &HashSet<&str>) -> String {
    let mut base = slugify(name);
    if base.is_empty() {
        base = "habit".to_string();
    }
    if !existing.contains(base.as_str()) {
        return base;
    }

    let mut suffix = 1;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !existing.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Lowercase `value`, collapse every non `[a-z0-9]` run into one hyphen and
/// trim hyphens from both ends.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    NON_ALNUM_REGEX
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("  Daily   Stretch!! "), "daily-stretch");
        assert_eq!(slugify("Read 20 pages"), "read-20-pages");
        assert_eq!(slugify("--Yoga--"), "yoga");
        assert_eq!(slugify("🧘"), "");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn generate_habit_id_falls_back_and_suffixes() {
        let existing: HashSet<&str> = ["habit", "habit-1", "walk"].into_iter().collect();
        assert_eq!(generate_habit_id("!!!", &existing), "habit-2");
        assert_eq!(generate_habit_id("Walk", &existing), "walk-1");
        assert_eq!(generate_habit_id("Run", &existing), "run");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("UP".parse::<Direction>(), Ok(Direction::Up));
        assert_eq!(" down".parse::<Direction>(), Ok(Direction::Down));
        assert!("left".parse::<Direction>().is_err());
    }

    #[test]
    fn validate_rejects_blank_names() {
        assert_eq!(validate_add_habit(&AddHabitInput::new("   ")), Err(InvalidInput::EmptyName));
        assert!(validate_add_habit(&AddHabitInput::new("Walk")).is_ok());
    }
}
