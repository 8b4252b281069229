//! Trace capture for solver runs.
//!
//! A `tracing` subscriber that turns every info-level event into one row of a
//! table named after the event's target (`normalize`, `relax`, `allocate`,
//! `swap`, `solve`). Columns appear the first time a field is seen and are
//! padded so every column of a table stays row-aligned.
//!
//! # Usage
//!
//! ```ignore
//! // In solver code:
//! tracing::info!(target: "swap", iteration, donor, recipient, implied_price);
//!
//! // In a test:
//! let recorder = instrument::capture(|| { balancer_core::solve(&request); });
//! let prices = recorder.table("swap").and_then(|t| t.f64s("implied_price"));
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

// === COLUMNS ===

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::U64(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill with type defaults up to `rows` entries.
    fn pad_to(&mut self, rows: usize) {
        match self {
            Column::U64(v) => v.resize(rows.max(v.len()), 0),
            Column::I64(v) => v.resize(rows.max(v.len()), 0),
            Column::F64(v) => v.resize(rows.max(v.len()), 0.0),
            Column::Bool(v) => v.resize(rows.max(v.len()), false),
            Column::Str(v) => v.resize(rows.max(v.len()), String::new()),
        }
    }
}

// === TABLES ===

/// Rows recorded under one event target.
#[derive(Debug, Clone, Default)]
pub struct TraceTable {
    columns: BTreeMap<String, Column>,
    rows: usize,
}

impl TraceTable {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn u64s(&self, name: &str) -> Option<&[u64]> {
        match self.columns.get(name)? {
            Column::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn i64s(&self, name: &str) -> Option<&[i64]> {
        match self.columns.get(name)? {
            Column::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn f64s(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name)? {
            Column::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn strs(&self, name: &str) -> Option<&[String]> {
        match self.columns.get(name)? {
            Column::Str(v) => Some(v),
            _ => None,
        }
    }

    fn align(&mut self) {
        let rows = self.rows;
        for column in self.columns.values_mut() {
            column.pad_to(rows);
        }
    }

    /// Column for `name`, created pre-padded to the current row when new.
    fn slot(&mut self, name: &str, make: fn(usize) -> Column) -> &mut Column {
        let rows = self.rows;
        self.columns
            .entry(name.to_string())
            .or_insert_with(|| make(rows))
    }
}

/// All tables captured on this thread, keyed by event target.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    tables: BTreeMap<String, TraceTable>,
}

impl Recorder {
    pub fn table(&self, target: &str) -> Option<&TraceTable> {
        self.tables.get(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Row count for `target`, zero when nothing was recorded.
    pub fn rows(&self, target: &str) -> usize {
        self.tables.get(target).map_or(0, TraceTable::rows)
    }
}

thread_local! {
    static RECORDER: RefCell<Recorder> = RefCell::default();
}

// === SUBSCRIBER ===

struct RowVisitor<'a> {
    table: &'a mut TraceTable,
}

macro_rules! push_value {
    ($table:expr, $field:expr, $variant:ident, $default:expr, $value:expr) => {
        if let Column::$variant(v) =
            $table.slot($field.name(), |rows| Column::$variant(vec![$default; rows]))
        {
            v.push($value);
        }
    };
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        push_value!(self.table, field, U64, 0, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        push_value!(self.table, field, I64, 0, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        push_value!(self.table, field, F64, 0.0, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        push_value!(self.table, field, Bool, false, value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        push_value!(self.table, field, Str, String::new(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

/// Subscriber that writes info-level events into the thread-local [`Recorder`].
pub struct TraceSubscriber;

impl Subscriber for TraceSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        // Spans are not recorded.
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let target = event.metadata().target().to_string();
        RECORDER.with(|r| {
            let mut recorder = r.borrow_mut();
            let table = recorder.tables.entry(target).or_default();
            table.align();
            event.record(&mut RowVisitor { table: &mut *table });
            table.rows += 1;
            table.align();
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Take everything recorded on this thread.
pub fn drain() -> Recorder {
    RECORDER.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

pub fn clear() {
    RECORDER.with(|r| *r.borrow_mut() = Recorder::default());
}

/// Run `f` with [`TraceSubscriber`] scoped to this thread and return what it recorded.
pub fn capture(f: impl FnOnce()) -> Recorder {
    clear();
    tracing::subscriber::with_default(TraceSubscriber, f);
    drain()
}

// === Polars Integration ===

use polars::prelude::*;
use std::path::{Path, PathBuf};

impl TraceTable {
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<polars::prelude::Column> = self
            .columns
            .iter()
            .map(|(name, col)| match col {
                Column::U64(v) => polars::prelude::Column::new(name.into(), v),
                Column::I64(v) => polars::prelude::Column::new(name.into(), v),
                Column::F64(v) => polars::prelude::Column::new(name.into(), v),
                Column::Bool(v) => polars::prelude::Column::new(name.into(), v),
                Column::Str(v) => polars::prelude::Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

impl Recorder {
    /// One DataFrame per target; tables that fail to convert are skipped.
    pub fn to_dataframes(&self) -> HashMap<String, DataFrame> {
        self.tables
            .iter()
            .filter_map(|(name, table)| table.to_dataframe().ok().map(|df| (name.clone(), df)))
            .collect()
    }

    /// Write every table to `{dir}/{target}.parquet` and return the paths written.
    pub fn save_parquet(&self, dir: &Path) -> PolarsResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(io_error)?;
        let mut written = Vec::with_capacity(self.tables.len());
        for (target, table) in &self.tables {
            let mut df = table.to_dataframe()?;
            let path = dir.join(format!("{}.parquet", sanitize(target)));
            let file = std::fs::File::create(&path).map_err(io_error)?;
            ParquetWriter::new(file).finish(&mut df)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn io_error(error: std::io::Error) -> PolarsError {
    PolarsError::IO {
        error: error.into(),
        msg: None,
    }
}

/// Replace anything but ASCII alphanumerics with `_`, capped at 60 chars.
fn sanitize(name: &str) -> String {
    name.chars()
        .take(60)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Records solver events on this thread for its lifetime and dumps them as
/// parquet under `{parent}/{name}/` on drop.
///
/// ```ignore
/// let dir = std::path::Path::new("target/traces");
/// {
///     let mut rec = instrument::ScopedRecorder::new(dir, "narrow range");
///     balancer_core::solve(&request)?;
///     assert!(rec.get().rows("swap") > 0);
/// }
/// // target/traces/narrow_range/{swap,solve,...}.parquet
/// ```
pub struct ScopedRecorder {
    run_dir: PathBuf,
    recorded: Option<Recorder>,
    _guard: tracing::subscriber::DefaultGuard,
}

impl ScopedRecorder {
    pub fn new(parent: impl AsRef<Path>, name: &str) -> Self {
        clear();
        Self {
            run_dir: parent.as_ref().join(sanitize(name)),
            recorded: None,
            _guard: tracing::subscriber::set_default(TraceSubscriber),
        }
    }

    /// Snapshot of what was recorded so far; the same snapshot is written on drop.
    pub fn get(&mut self) -> &Recorder {
        self.recorded.get_or_insert_with(drain)
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

impl Drop for ScopedRecorder {
    fn drop(&mut self) {
        let recorder = self.recorded.take().unwrap_or_else(drain);
        if recorder.is_empty() {
            return;
        }
        if let Err(e) = recorder.save_parquet(&self.run_dir) {
            eprintln!("ScopedRecorder: failed to write {}: {e}", self.run_dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_become_rows_per_target() {
        let recorder = capture(|| {
            tracing::info!(target: "swap", iteration = 0u64, donor = 0u64, implied_price = 368.2);
            tracing::info!(target: "swap", iteration = 1u64, donor = 4u64, implied_price = 344.4);
            tracing::info!(target: "solve", status = "Solved");
        });

        assert_eq!(recorder.rows("swap"), 2);
        assert_eq!(recorder.rows("solve"), 1);
        assert_eq!(recorder.rows("relax"), 0);
        let swaps = recorder.table("swap").unwrap();
        assert_eq!(swaps.u64s("donor"), Some(&[0, 4][..]));
        assert_eq!(swaps.f64s("implied_price"), Some(&[368.2, 344.4][..]));
        assert_eq!(
            recorder.table("solve").unwrap().strs("status"),
            Some(&["Solved".to_string()][..])
        );
    }

    #[test]
    fn late_and_missing_fields_are_padded() {
        let recorder = capture(|| {
            tracing::info!(target: "relax", round = 0u64, delta = -4i64);
            tracing::info!(target: "relax", round = 1u64, absorbers = 3u64);
            tracing::info!(target: "relax", round = 2u64, delta = 1i64, converged = true);
        });

        let table = recorder.table("relax").unwrap();
        assert_eq!(table.rows(), 3);
        assert!(table.column_names().all(|name| table.column(name).unwrap().len() == 3));
        assert_eq!(table.i64s("delta"), Some(&[-4, 0, 1][..]));
        assert_eq!(table.u64s("absorbers"), Some(&[0, 3, 0][..]));
        assert!(matches!(table.column("converged"), Some(Column::Bool(v)) if v == &[false, false, true]));
    }

    #[test]
    fn debug_fields_record_as_strings() {
        #[derive(Debug)]
        enum Status {
            Warning,
        }
        let recorder = capture(|| {
            tracing::info!(target: "solve", status = ?Status::Warning);
        });
        assert_eq!(
            recorder.table("solve").unwrap().strs("status"),
            Some(&["Warning".to_string()][..])
        );
    }

    #[test]
    fn debug_level_events_are_ignored() {
        let recorder = capture(|| {
            tracing::debug!(target: "swap", iteration = 0u64);
        });
        assert!(recorder.is_empty());
    }

    #[test]
    fn table_converts_to_dataframe() {
        let recorder = capture(|| {
            tracing::info!(target: "swap", iteration = 0u64, implied_price = 10.0);
            tracing::info!(target: "swap", iteration = 1u64, implied_price = 8.0);
        });
        let df = recorder.table("swap").unwrap().to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn scoped_recorder_writes_one_parquet_per_target() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = {
            let rec = ScopedRecorder::new(dir.path(), "narrow range");
            tracing::info!(target: "swap", iteration = 0u64, donor = 0u64, implied_price = 368.2);
            tracing::info!(target: "swap", iteration = 1u64, donor = 4u64, implied_price = 344.4);
            tracing::info!(target: "solve", status = "Warning");
            rec.run_dir().to_path_buf()
        };
        assert!(run_dir.ends_with("narrow_range"));

        let file = std::fs::File::open(run_dir.join("swap.parquet")).unwrap();
        let swaps = ParquetReader::new(file).finish().unwrap();
        assert_eq!(swaps.height(), 2);
        let mut names: Vec<_> = swaps.get_column_names().iter().map(|n| n.to_string()).collect();
        names.sort();
        assert_eq!(names, ["donor", "implied_price", "iteration"]);
        assert!(run_dir.join("solve.parquet").exists());
    }

    #[test]
    fn scoped_recorder_snapshot_is_what_gets_written() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut rec = ScopedRecorder::new(dir.path(), "snapshot");
            tracing::info!(target: "relax", round = 0u64, delta = -4i64);
            assert_eq!(rec.get().rows("relax"), 1);
            tracing::info!(target: "relax", round = 1u64, delta = 2i64);
        }
        let file = std::fs::File::open(dir.path().join("snapshot/relax.parquet")).unwrap();
        assert_eq!(ParquetReader::new(file).finish().unwrap().height(), 1);
    }

    #[test]
    fn empty_scope_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        drop(ScopedRecorder::new(dir.path(), "quiet"));
        assert!(!dir.path().join("quiet").exists());
    }

    #[test]
    fn save_parquet_reports_written_paths() {
        let recorder = capture(|| {
            tracing::info!(target: "allocate", rounds = 2u64, residual = 0i64);
        });
        let dir = tempfile::tempdir().unwrap();
        let written = recorder.save_parquet(dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("allocate.parquet")]);
        assert_eq!(recorder.to_dataframes()["allocate"].height(), 1);
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize("narrow range/v2"), "narrow_range_v2");
        assert_eq!(sanitize(&"x".repeat(80)).len(), 60);
    }
}
