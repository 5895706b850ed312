use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One tracked activity.
///
/// `id` is a slug that is never reassigned once a habit exists, and stays
/// reserved after the habit is deprecated.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Habit {
    pub id: String,
    pub icon: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub category: String,
    /// Raw period tag as stored in the sheet, see [`Period`].
    pub period: String,
    /// Soft-delete marker.
    pub deprecated_at: Option<String>,
}

impl Habit {
    pub fn is_deprecated(&self) -> bool {
        self.deprecated_at.is_some()
    }

    pub fn period_kind(&self) -> Option<Period> {
        Period::parse(&self.period)
    }
}

/// Known period tags. Unknown tags are kept verbatim on the habit.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "day" | "daily" => Some(Period::Day),
            "week" | "weekly" => Some(Period::Week),
            "month" | "monthly" => Some(Period::Month),
            _ => None,
        }
    }
}

/// One occurrence of a habit.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub datetime: String,
    pub habit_id: String,
    pub status: String,
    pub comment: String,
}

impl HistoryEntry {
    pub fn day_key(&self) -> &str {
        day_key(&self.datetime)
    }
}

/// Presentation state of one habit.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ViewSetting {
    pub habit_id: String,
    pub order: i64,
    pub hidden: bool,
    pub color: Option<String>,
}

impl ViewSetting {
    pub fn new(habit_id: &str, order: i64) -> Self {
        ViewSetting {
            habit_id: habit_id.to_string(),
            order,
            hidden: false,
            color: None,
        }
    }
}

/// In-memory aggregate of one habit file.
///
/// This is a transient decoded view: only its container encoding is ever
/// persisted.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct HabitWorkbook {
    pub habits: Vec<Habit>,
    pub history: Vec<HistoryEntry>,
    pub view: Vec<ViewSetting>,
}

/// A habit joined with its view setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HabitWithView<'a> {
    pub habit: &'a Habit,
    pub view: &'a ViewSetting,
}

impl HabitWorkbook {
    pub fn empty() -> Self {
        HabitWorkbook::default()
    }

    pub fn find_habit(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == habit_id)
    }

    pub fn contains_habit(&self, habit_id: &str) -> bool {
        self.find_habit(habit_id).is_some()
    }

    pub fn view_for(&self, habit_id: &str) -> Option<&ViewSetting> {
        self.view.iter().find(|entry| entry.habit_id == habit_id)
    }

    /// Habits in display order. View entries without a habit are skipped.
    pub fn ordered_habits(&self) -> Vec<HabitWithView<'_>> {
        let habits: HashMap<&str, &Habit> = self
            .habits
            .iter()
            .map(|habit| (habit.id.as_str(), habit))
            .collect();

        let mut pairs: Vec<HabitWithView<'_>> = self
            .view
            .iter()
            .filter_map(|view| {
                habits
                    .get(view.habit_id.as_str())
                    .map(|habit| HabitWithView { habit, view })
            })
            .collect();
        pairs.sort_by_key(|pair| pair.view.order);
        pairs
    }

    /// Habits shown in the grid: neither hidden nor deprecated.
    pub fn visible_habits(&self) -> Vec<HabitWithView<'_>> {
        self.ordered_habits()
            .into_iter()
            .filter(|pair| !pair.view.hidden && !pair.habit.is_deprecated())
            .collect()
    }

    pub fn hidden_habits(&self) -> Vec<HabitWithView<'_>> {
        self.ordered_habits()
            .into_iter()
            .filter(|pair| pair.view.hidden)
            .collect()
    }

    pub fn history_lookup(&self) -> HistoryLookup<'_> {
        HistoryLookup::build(&self.history)
    }
}

/// History indexed by habit id and day key (`YYYY-MM-DD`).
///
/// When several entries share a day the last one wins.
#[derive(Debug, Default)]
pub struct HistoryLookup<'a> {
    by_habit: HashMap<&'a str, HashMap<&'a str, &'a HistoryEntry>>,
}

impl<'a> HistoryLookup<'a> {
    pub fn build(history: &'a [HistoryEntry]) -> Self {
        let mut by_habit: HashMap<&'a str, HashMap<&'a str, &'a HistoryEntry>> = HashMap::new();
        for entry in history {
            by_habit
                .entry(entry.habit_id.as_str())
                .or_default()
                .insert(entry.day_key(), entry);
        }
        HistoryLookup { by_habit }
    }

    pub fn get(&self, habit_id: &str, day_key: &str) -> Option<&'a HistoryEntry> {
        self.by_habit
            .get(habit_id)
            .and_then(|days| days.get(day_key))
            .copied()
    }

    pub fn is_marked(&self, habit_id: &str, day_key: &str) -> bool {
        self.get(habit_id, day_key).is_some()
    }
}

/// Reconcile a possibly stale view list against the habit list
///
/// Produces exactly one setting per habit (reusing an existing entry, else a
/// fresh one ordered by the habit's position), keeps orphan settings whose
/// habit is gone, sorts everything by `order` and renumbers it densely
/// from 0. Reconciling an already reconciled view returns it unchanged.
///
/// # Arguments
/// * `habits` - Canonical habit list
/// * `view` - Current view list, possibly stale or hand edited
///
/// # Returns
/// * `Vec<ViewSetting>` - Reconciled view list
///
/// # Examples
/// ```
/// use sheetlife::habit::{reconcile_view, ViewSetting};
///
/// let view = reconcile_view(&[], &[ViewSetting::new("gone", 7)]);
/// assert_eq!(view[0].order, 0);
/// ```
pub fn reconcile_view(habits: &[Habit], view: &[ViewSetting]) -> Vec<ViewSetting> {
    let keyed = view
        .iter()
        .map(|entry| (entry.clone(), entry.order as f64))
        .collect();
    reconcile_keyed_view(habits, keyed)
}

/// [`reconcile_view`] over settings carrying their own sort key.
///
/// Decoded sheets may hold fractional orders; they are compared by their real
/// value and only then renumbered.
pub fn reconcile_keyed_view(habits: &[Habit], view: Vec<(ViewSetting, f64)>) -> Vec<ViewSetting> {
    let habit_ids: HashSet<&str> = habits.iter().map(|habit| habit.id.as_str()).collect();

    let mut existing: HashMap<String, (ViewSetting, f64)> = HashMap::new();
    let mut orphans = Vec::new();
    for (entry, key) in view {
        if habit_ids.contains(entry.habit_id.as_str()) {
            existing.insert(entry.habit_id.clone(), (entry, key));
        } else {
            orphans.push((entry, key));
        }
    }

    let mut keyed: Vec<(ViewSetting, f64)> = habits
        .iter()
        .enumerate()
        .map(|(index, habit)| match existing.get(habit.id.as_str()) {
            Some(pair) => pair.clone(),
            None => (ViewSetting::new(&habit.id, index as i64), index as f64),
        })
        .collect();
    keyed.extend(orphans);

    keyed.sort_by(|a, b| a.1.total_cmp(&b.1));
    keyed
        .into_iter()
        .enumerate()
        .map(|(index, (entry, _))| ViewSetting {
            order: index as i64,
            ..entry
        })
        .collect()
}

/// ISO-8601 instant in UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Day granularity key of an ISO instant: its first ten characters.
pub fn day_key(datetime: &str) -> &str {
    match datetime.char_indices().nth(10) {
        Some((end, _)) => &datetime[..end],
        None => datetime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_use_millis_and_zulu() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(iso_timestamp(at), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn day_key_truncates_and_tolerates_short_input() {
        assert_eq!(day_key("2024-03-05T10:00:00.000Z"), "2024-03-05");
        assert_eq!(day_key("2024"), "2024");
        assert_eq!(day_key("ünïcödé-dätë-lönger"), "ünïcödé-dä");
    }

    #[test]
    fn period_parsing_is_lenient() {
        assert_eq!(Period::parse(" Weekly "), Some(Period::Week));
        assert_eq!(Period::parse("day"), Some(Period::Day));
        assert_eq!(Period::parse("fortnight"), None);
        assert_eq!(Period::Month.as_str(), "month");
    }
}
