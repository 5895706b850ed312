use std::env;
use std::path::PathBuf;

/// Key of the JSON index (`{ "files": [...] }`) inside the shared namespace.
pub const LOCAL_FILE_INDEX_KEY: &str = "sheetlife:file-index";

/// Prefix of every record key; the file id is appended verbatim.
pub const LOCAL_FILE_PREFIX: &str = "sheetlife:file:";

/// View type tag of files holding a habit workbook.
pub const HABIT_VIEW_TYPE: &str = "habits";

/// Suggested name of a habit file when it is exported.
pub const HABITS_FILE_NAME: &str = "habits.xlsx";

pub const HABITS_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// File id opened by the terminal front end when none is given.
pub const DEFAULT_HABITS_FILE_ID: &str = "habits";

/// Environment variable naming the namespace snapshot file.
pub const DATA_ENV_VAR: &str = "SHEETLIFE_DATA";

const DEFAULT_DATA_FILE: &str = "sheetlife.bin.gz";

/// Runtime configuration of the terminal front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Snapshot file backing the shared namespace.
    pub data_file: PathBuf,
    /// Habit file opened at start-up.
    pub file_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            file_id: DEFAULT_HABITS_FILE_ID.to_string(),
        }
    }
}

impl Config {
    /// Build the configuration from command line arguments
    ///
    /// Positional arguments are `[data-file] [file-id]`. A missing data file
    /// falls back to `SHEETLIFE_DATA`, then to `sheetlife.bin.gz` in the
    /// working directory.
    ///
    /// # Arguments
    /// * `args` - Arguments without the program name
    ///
    /// # Examples
    /// ```
    /// use sheetlife::config::Config;
    ///
    /// let config = Config::from_args(vec!["data.bin.gz".to_string(), "work".to_string()]);
    /// assert_eq!(config.file_id, "work");
    /// ```
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config = Config::default();

        match args.next() {
            Some(path) if !path.trim().is_empty() => config.data_file = PathBuf::from(path),
            _ => {
                if let Ok(path) = env::var(DATA_ENV_VAR) {
                    if !path.trim().is_empty() {
                        config.data_file = PathBuf::from(path);
                    }
                }
            }
        }

        if let Some(file_id) = args.next() {
            let file_id = file_id.trim();
            if !file_id.is_empty() {
                config.file_id = file_id.to_string();
            }
        }

        config
    }
}
