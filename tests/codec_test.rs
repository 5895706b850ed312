use base64::{Engine as _, engine::general_purpose};
use rust_xlsxwriter::Workbook;
use sheetlife::actions::{AddHabitInput, RecordHistoryInput, add_habit_at, toggle_habit_event};
use sheetlife::downloader::{to_xlsx, write_habit_workbook};
use sheetlife::habit::{HabitWorkbook, ViewSetting, reconcile_view};
use sheetlife::loader::{from_excel, from_xlsx_bytes, parse_habit_workbook};
use chrono::{TimeZone, Utc};

#[derive(Clone, Copy)]
enum Cell {
    Text(&'static str),
    Number(f64),
    Flag(bool),
    Blank,
}

use Cell::*;

const HABITS_HEADER: [Cell; 8] = [
    Text("habit-id"),
    Text("icon"),
    Text("name"),
    Text("description"),
    Text("created_at"),
    Text("category"),
    Text("period"),
    Text("deprecated_at"),
];

const VIEW_HEADER: [Cell; 4] = [Text("habit-id"), Text("order"), Text("hidden"), Text("color")];

fn habit_row(id: &'static str, name: &'static str) -> Vec<Cell> {
    vec![
        Text(id),
        Text("✅"),
        Text(name),
        Blank,
        Text("2024-01-01T00:00:00.000Z"),
        Text("General"),
        Text("day"),
        Blank,
    ]
}

fn build(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (row, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                let (row, col) = (row as u32, col as u16);
                match *cell {
                    Text(value) => {
                        sheet.write_string(row, col, value).unwrap();
                    }
                    Number(value) => {
                        sheet.write_number(row, col, value).unwrap();
                    }
                    Flag(value) => {
                        sheet.write_boolean(row, col, value).unwrap();
                    }
                    Blank => {}
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn sample_workbook() -> HabitWorkbook {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let added = add_habit_at(HabitWorkbook::empty(), AddHabitInput::new("Daily stretch"), now);
    let input = AddHabitInput {
        name: "Méditation 🧘".to_string(),
        icon: Some("🧘".to_string()),
        description: Some("ten minutes, eyes closed".to_string()),
        category: Some("Mind".to_string()),
        period: Some("week".to_string()),
    };
    let added = add_habit_at(added.workbook, input, now);
    let mut workbook = toggle_habit_event(
        added.workbook,
        RecordHistoryInput::new("daily-stretch", "2024-01-01T00:00:00.000Z"),
    );
    workbook.view[1].hidden = true;
    workbook.view[1].color = Some("#336699".to_string());
    workbook
}

#[test]
fn encoded_workbook_decodes_to_the_same_value() {
    let workbook = sample_workbook();
    let bytes = to_xlsx(&workbook).unwrap();
    assert_eq!(from_xlsx_bytes(&bytes).unwrap(), workbook);

    let text = write_habit_workbook(&workbook).unwrap();
    assert_eq!(parse_habit_workbook(&text), workbook);
}

#[test]
fn stale_views_come_back_reconciled() {
    let mut workbook = sample_workbook();
    workbook.view = vec![
        ViewSetting::new("m-ditation", 40),
        ViewSetting::new("gone", 7),
    ];

    let decoded = from_xlsx_bytes(&to_xlsx(&workbook).unwrap()).unwrap();
    assert_eq!(decoded.habits, workbook.habits);
    assert_eq!(decoded.history, workbook.history);
    assert_eq!(decoded.view, reconcile_view(&workbook.habits, &workbook.view));
    assert_eq!(from_xlsx_bytes(&to_xlsx(&decoded).unwrap()).unwrap(), decoded);
}

#[test]
fn empty_workbook_survives_encoding() {
    let text = write_habit_workbook(&HabitWorkbook::empty()).unwrap();
    assert_eq!(parse_habit_workbook(&text), HabitWorkbook::empty());
}

#[test]
fn habits_only_container_gets_a_positional_view() {
    let bytes = build(&[(
        "habits",
        vec![HABITS_HEADER.to_vec(), habit_row("a", "A"), habit_row("b", "B")],
    )]);

    let workbook = from_xlsx_bytes(&bytes).unwrap();
    assert_eq!(workbook.habits.len(), 2);
    assert!(workbook.history.is_empty());
    assert_eq!(workbook.view, vec![ViewSetting::new("a", 0), ViewSetting::new("b", 1)]);
}

#[test]
fn rows_without_ids_are_dropped() {
    let bytes = build(&[
        (
            "habits",
            vec![HABITS_HEADER.to_vec(), habit_row("a", "A"), habit_row("   ", "Nameless")],
        ),
        (
            "history",
            vec![
                vec![Text("datetime"), Text("habit-id"), Text("status"), Text("comment")],
                vec![Text("2024-01-01T00:00:00.000Z"), Text("a"), Text("OK"), Blank],
                vec![Blank, Text("a"), Text("OK"), Blank],
                vec![Text("2024-01-02T00:00:00.000Z"), Blank, Text("OK"), Blank],
            ],
        ),
    ]);

    let workbook = from_xlsx_bytes(&bytes).unwrap();
    assert_eq!(workbook.habits.len(), 1);
    assert_eq!(workbook.habits[0].id, "a");
    assert_eq!(workbook.history.len(), 1);
    assert_eq!(workbook.history[0].comment, "");
}

#[test]
fn columns_are_matched_by_header_name() {
    let bytes = build(&[(
        "habits",
        vec![
            vec![Text("name"), Text("habit-id"), Text("extra")],
            vec![Text("Swim"), Text("swim"), Text("ignored")],
        ],
    )]);

    let workbook = from_xlsx_bytes(&bytes).unwrap();
    let habit = &workbook.habits[0];
    assert_eq!(habit.id, "swim");
    assert_eq!(habit.name, "Swim");
    assert_eq!(habit.icon, "");
    assert_eq!(habit.deprecated_at, None);
}

#[test]
fn order_accepts_numbers_and_numeric_text() {
    let bytes = build(&[
        (
            "habits",
            vec![
                HABITS_HEADER.to_vec(),
                habit_row("a", "A"),
                habit_row("b", "B"),
                habit_row("c", "C"),
            ],
        ),
        (
            "view",
            vec![
                VIEW_HEADER.to_vec(),
                vec![Text("a"), Text("5"), Text("FALSE"), Blank],
                vec![Text("b"), Number(2.7), Text("FALSE"), Blank],
                vec![Text("c"), Text("soon"), Text("FALSE"), Blank],
            ],
        ),
    ]);

    let workbook = from_xlsx_bytes(&bytes).unwrap();
    let ids: Vec<&str> = workbook.ordered_habits().iter().map(|pair| pair.habit.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
    let orders: Vec<i64> = workbook.view.iter().map(|entry| entry.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[test]
fn fractional_orders_sort_by_their_real_value() {
    let bytes = build(&[
        (
            "habits",
            vec![HABITS_HEADER.to_vec(), habit_row("a", "A"), habit_row("b", "B")],
        ),
        (
            "view",
            vec![
                VIEW_HEADER.to_vec(),
                vec![Text("a"), Number(1.5), Text("FALSE"), Blank],
                vec![Text("b"), Text("1"), Text("FALSE"), Blank],
            ],
        ),
    ]);

    let workbook = from_xlsx_bytes(&bytes).unwrap();
    let ids: Vec<&str> = workbook.view.iter().map(|entry| entry.habit_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(workbook.view_for("b").unwrap().order, 0);
    assert_eq!(workbook.view_for("a").unwrap().order, 1);
}

#[test]
fn hidden_accepts_only_true_literals() {
    let bytes = build(&[
        (
            "habits",
            vec![
                HABITS_HEADER.to_vec(),
                habit_row("upper", "Upper"),
                habit_row("lower", "Lower"),
                habit_row("title", "Title"),
                habit_row("flag", "Flag"),
                habit_row("blank", "Blank"),
            ],
        ),
        (
            "view",
            vec![
                VIEW_HEADER.to_vec(),
                vec![Text("upper"), Number(0.0), Text("TRUE"), Blank],
                vec![Text("lower"), Number(1.0), Text("true"), Blank],
                vec![Text("title"), Number(2.0), Text("True"), Blank],
                vec![Text("flag"), Number(3.0), Flag(true), Blank],
                vec![Text("blank"), Number(4.0), Blank, Blank],
            ],
        ),
    ]);

    let workbook = from_xlsx_bytes(&bytes).unwrap();
    let hidden = |id: &str| workbook.view_for(id).unwrap().hidden;
    assert!(hidden("upper"));
    assert!(hidden("lower"));
    assert!(!hidden("title"));
    assert!(hidden("flag"));
    assert!(!hidden("blank"));
}

#[test]
fn unicode_text_is_preserved() {
    let bytes = build(&[(
        "habits",
        vec![
            HABITS_HEADER.to_vec(),
            vec![
                Text("yoga"),
                Text("🧘‍♀️"),
                Text("Йога на рассвете"),
                Text("朝のストレッチ"),
                Text("2024-01-01T00:00:00.000Z"),
                Text("Santé"),
                Text("day"),
                Blank,
            ],
        ],
    )]);

    let habit = from_xlsx_bytes(&bytes).unwrap().habits.remove(0);
    assert_eq!(habit.icon, "🧘‍♀️");
    assert_eq!(habit.name, "Йога на рассвете");
    assert_eq!(habit.description, "朝のストレッチ");
    assert_eq!(habit.category, "Santé");
}

#[test]
fn unknown_view_entries_survive_as_orphans() {
    let bytes = build(&[
        ("habits", vec![HABITS_HEADER.to_vec(), habit_row("a", "A")]),
        (
            "view",
            vec![
                VIEW_HEADER.to_vec(),
                vec![Text("gone"), Number(0.0), Text("TRUE"), Text("#000000")],
                vec![Text("a"), Number(1.0), Text("FALSE"), Blank],
            ],
        ),
    ]);

    let workbook = from_xlsx_bytes(&bytes).unwrap();
    assert_eq!(workbook.view.len(), 2);
    assert_eq!(workbook.view[0].habit_id, "gone");
    assert_eq!(workbook.view[0].color.as_deref(), Some("#000000"));
    assert_eq!(workbook.ordered_habits().len(), 1);
}

#[test]
fn unreadable_text_decodes_as_empty() {
    assert_eq!(parse_habit_workbook(""), HabitWorkbook::empty());
    assert_eq!(parse_habit_workbook("%%% not base64 %%%"), HabitWorkbook::empty());

    let not_a_container = general_purpose::STANDARD.encode(b"just some plain text");
    assert_eq!(parse_habit_workbook(&not_a_container), HabitWorkbook::empty());
    assert!(from_xlsx_bytes(b"just some plain text").is_err());
}

#[test]
fn workbook_files_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habits.xlsx");
    let workbook = sample_workbook();
    std::fs::write(&path, to_xlsx(&workbook).unwrap()).unwrap();

    assert_eq!(from_excel(&path).unwrap(), workbook);
    assert!(from_excel(dir.path().join("missing.xlsx")).is_err());
}
