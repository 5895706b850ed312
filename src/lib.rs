/*!
# Sheetlife

Personal habit tracking kept entirely on the user's device, stored as
multi-sheet spreadsheet workbooks inside a shared local key-value namespace.

## Overview

A habit file is an XLSX workbook with three sheets: `habits` (one row per
tracked activity), `history` (one row per occurrence) and `view` (order,
visibility and color of each habit). The workbook is decoded into a typed
model, mutated through pure reducers, and re-encoded and persisted after
every action. There is no explicit save step.

## Architecture

### Model Layer
- **habit**: Habit, HistoryEntry, ViewSetting and HabitWorkbook, plus view
  reconciliation (exactly one setting per habit, dense `order`)
- **actions**: Reducers (add, record, toggle, reorder, hide, remove, restore)
  behind a single `HabitAction` dispatch point

### Container Layer
- **downloader**: Workbook to XLSX bytes (rust_xlsxwriter), base64 text
- **loader**: Base64 text or XLSX bytes to workbook (calamine). Never fails on
  persisted data; broken input decodes as an empty workbook

### Data Persistence Layer
- **namespace**: Shared key-value namespace with change events delivered to
  every other attached context
- **saving**: Gzip-compressed bincode snapshot of a namespace on disk
- **store**: One JSON record per file plus a JSON index, with per-file
  version counters bumped on local and remote changes

### Presentation Layer
- **view**: Loads a file into editable state, persists every mutation, and
  projects the weekly grid

## Persisted Layout

- `sheetlife:file-index` - `{ "files": [LocalFileIndexEntry, ...] }`
- `sheetlife:file:<id>` - JSON `LocalFileRecord` holding the base64 workbook
*/

pub mod actions;
pub mod config;
pub mod downloader;
pub mod error;
pub mod habit;
pub mod loader;
pub mod namespace;
pub mod saving;
pub mod store;
pub mod view;

/// Re-export everything from these modules to make it easier to use
pub use actions::*;
pub use downloader::*;
pub use error::*;
pub use habit::*;
pub use loader::*;
pub use namespace::*;
pub use store::*;
pub use view::*;
