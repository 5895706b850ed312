#![cfg(not(tarpaulin_include))]

use chrono::{Local, NaiveDate};
use log::info;
use sheetlife::actions::{AddHabitInput, Direction, HabitAction, RecordHistoryInput, validate_add_habit};
use sheetlife::config::Config;
use sheetlife::namespace::SharedNamespace;
use sheetlife::store::LocalFileStore;
use sheetlife::view::{self, HabitView, day_datetime};
use std::env;
use std::io::{self, Write};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_args(env::args().skip(1));
    let namespace = SharedNamespace::open(&config.data_file)?;
    info!("Opened {}", config.data_file.display());

    let mut store = LocalFileStore::new(Box::new(namespace));
    let mut habits = HabitView::open(&store, &config.file_id);

    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    let mut show = true;
    loop {
        store.poll_events();
        habits.refresh(&store);

        if show {
            display(&habits);
        }

        print!("[{:.1}] ({}) > ", start_time.elapsed().as_secs_f64(), status);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();

        if command == "q" {
            break;
        }
        status = match run_command(command, &mut store, &mut habits, &mut show) {
            Ok(status) => status,
            Err(message) => message,
        };
    }

    Ok(())
}

fn run_command(
    command: &str,
    store: &mut LocalFileStore,
    habits: &mut HabitView,
    show: &mut bool,
) -> Result<String, String> {
    let (verb, rest) = match command.split_once(' ') {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (command, ""),
    };

    let action = match verb {
        "" => return Err("invalid command".to_string()),
        "help" => {
            print_help();
            return Ok("ok".to_string());
        }
        "w" => {
            habits.previous_week();
            return Ok("ok".to_string());
        }
        "s" => {
            habits.next_week();
            return Ok("ok".to_string());
        }
        "today" => {
            habits.show_week_of(Local::now().date_naive());
            return Ok("ok".to_string());
        }
        "disable_output" => {
            *show = false;
            return Ok("ok".to_string());
        }
        "enable_output" => {
            *show = true;
            return Ok("ok".to_string());
        }
        "hidden" => {
            for pair in habits.workbook().hidden_habits() {
                let icon = if pair.habit.icon.is_empty() { "•" } else { pair.habit.icon.as_str() };
                println!("  {} {} ({})", icon, pair.habit.name, pair.habit.id);
            }
            return Ok("ok".to_string());
        }
        "files" => {
            for entry in view::list(store) {
                println!("  {}\t{}\t{}\t{}", entry.id, entry.name, entry.view_type, entry.updated_at);
            }
            return Ok("ok".to_string());
        }
        "export" => {
            let dir = if rest.is_empty() { "." } else { rest };
            return if store.download_record_to(habits.file_id(), dir) {
                Ok("exported".to_string())
            } else {
                Err("nothing to export".to_string())
            };
        }
        "import" => {
            let bytes = std::fs::read(rest).map_err(|e| e.to_string())?;
            view::import_workbook(store, habits.file_id(), &bytes).map_err(|e| e.to_string())?;
            habits.refresh(store);
            return Ok("imported".to_string());
        }
        "add" => {
            let input = AddHabitInput::new(rest);
            validate_add_habit(&input).map_err(|e| e.to_string())?;
            HabitAction::Add(input)
        }
        "x" => {
            let (habit_id, column) = rest.split_once(' ').ok_or("usage: x <habit> <1-7>")?;
            let column: usize = column.trim().parse().map_err(|_| "invalid column")?;
            if !(1..=7).contains(&column) {
                return Err("invalid column".to_string());
            }
            let date = habits.week_days()[column - 1];
            HabitAction::Toggle(RecordHistoryInput::new(habit_id, &day_datetime(date)))
        }
        "toggle" => {
            let (habit_id, date) = rest.split_once(' ').ok_or("usage: toggle <habit> <YYYY-MM-DD>")?;
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| e.to_string())?;
            HabitAction::Toggle(RecordHistoryInput::new(habit_id, &day_datetime(date)))
        }
        "up" | "down" => HabitAction::Reorder {
            habit_id: rest.to_string(),
            direction: verb.parse::<Direction>().map_err(|e| e.to_string())?,
        },
        "hide" | "show" => HabitAction::SetHidden {
            habit_id: rest.to_string(),
            hidden: verb == "hide",
        },
        "remove" => HabitAction::Remove {
            habit_id: rest.to_string(),
        },
        "restore" => HabitAction::Restore {
            habit_id: rest.to_string(),
        },
        _ => return Err("invalid command".to_string()),
    };

    match habits.update(store, action) {
        Ok(true) => Ok("ok".to_string()),
        Ok(false) => Err("not saved".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn display(habits: &HabitView) {
    let grid = habits.week_grid();

    print!("{:<28}", "");
    for day in grid.days.iter() {
        print!("{:<8}", day.format("%a %d").to_string());
    }
    println!();

    if grid.rows.is_empty() {
        println!("No habits yet. Use `add <name>` to create one.");
    }
    for row in &grid.rows {
        let label = format!("{} {} ({})", row.habit.icon, row.habit.name, row.habit.id);
        print!("{:<28}", label);
        for marked in row.marks {
            print!("{:<8}", if marked { "[x]" } else { "[ ]" });
        }
        println!();
    }
}

fn print_help() {
    println!("Commands:");
    println!("  q: Quit");
    println!("  w / s: Previous / next week");
    println!("  today: Jump to the current week");
    println!("  add <name>: Add a habit");
    println!("  x <habit> <1-7>: Toggle a day of the shown week");
    println!("  toggle <habit> <YYYY-MM-DD>: Toggle a specific day");
    println!("  up|down <habit>: Move a habit");
    println!("  hide|show <habit>: Hide or show a habit");
    println!("  remove|restore <habit>: Retire or bring back a habit");
    println!("  hidden: List hidden habits");
    println!("  files: List local files");
    println!("  export [dir]: Write the workbook as an .xlsx file");
    println!("  import <path>: Replace the workbook with an .xlsx file");
    println!("  disable_output / enable_output: Toggle grid display");
}
