//! Interfaces consumed from the storage engine (section 6.3).
//!
//! The physical table store is explicitly out of scope (section 1); this
//! module only states the abstract operations the compiler and mutation
//! executors are allowed to call. Grounded on the teacher's `Table`/`Row`
//! pair (`table.rs`) and `Database::get_table`/`publish_table` (`lib.rs`)
//! for the *shape* of a writer/row/table lookup, generalised to a trait
//! boundary because the real engine here is a separate, unwritten crate.
//!
//! A `mock` submodule (feature `mock-engine`, default-on) implements
//! these traits entirely in memory, standing in for the teacher's
//! in-process `Database` when exercising the compiler in tests.

use crate::error::Result;
use crate::types::ColumnType;
use crate::value::Value;

/// Result of `status()` (section 6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatusKind {
    DoesNotExist,
    Exists,
    Reserved,
}

/// Monotonically increasing counter incremented by any schema change
/// (GLOSSARY: "Structure version"). Used by `InsertStatement` to detect a
/// stale compilation (section 4.3).
pub type StructureVersion = u64;

/// Column shape the engine needs to materialise a new table (section 4.5
/// step 3: "the compiler exposes a `TableStructure` view over
/// `CreateTableModel` + cast map + inferred metadata").
pub trait TableStructure {
    fn column_count(&self) -> usize;
    fn column_name(&self, i: usize) -> &str;
    fn column_type(&self, i: usize) -> ColumnType;
    fn timestamp_index(&self) -> Option<usize>;
    fn symbol_capacity(&self, i: usize) -> Option<u32>;
    fn symbol_cache(&self, i: usize) -> Option<bool>;
    fn is_indexed(&self, i: usize) -> bool;
    fn index_value_block_capacity(&self, i: usize) -> Option<u32>;
}

/// Read-side column shape of a table or cursor factory (section 6.3:
/// `getMetadata()`).
pub trait RecordMetadata {
    fn column_count(&self) -> usize;
    fn column_name(&self, i: usize) -> &str;
    fn column_type(&self, i: usize) -> ColumnType;
    fn timestamp_index(&self) -> Option<usize>;

    fn column_index(&self, name: &str) -> Option<usize> {
        (0..self.column_count()).find(|&i| self.column_name(i).eq_ignore_ascii_case(name))
    }
}

/// A single row-shaped accessor exposing typed column readers indexed by
/// position (GLOSSARY: "Record"). One `get_*` per column type the
/// conversion table (section 4.2) reads from.
pub trait Record {
    fn get_boolean(&self, col: usize) -> bool;
    fn get_byte(&self, col: usize) -> i8;
    fn get_short(&self, col: usize) -> i16;
    fn get_char(&self, col: usize) -> char;
    fn get_int(&self, col: usize) -> i32;
    fn get_long(&self, col: usize) -> i64;
    fn get_float(&self, col: usize) -> f32;
    fn get_double(&self, col: usize) -> f64;
    fn get_date(&self, col: usize) -> i64;
    fn get_timestamp(&self, col: usize) -> i64;
    fn get_str(&self, col: usize) -> std::rc::Rc<str>;
    fn get_sym(&self, col: usize) -> std::rc::Rc<str>;
    fn get_bin(&self, col: usize) -> std::rc::Rc<Vec<u8>>;
    fn get_long256(&self, col: usize) -> [i64; 4];

    /// Read the designated timestamp at `col` (used by insert-as-select
    /// to drive `newRow(timestamp)`, section 4.4).
    fn timestamp(&self, col: usize) -> i64 {
        self.get_timestamp(col)
    }
}

/// A reusable producer of single-use record cursors (GLOSSARY: "Cursor
/// factory").
pub trait RecordCursorFactory {
    fn metadata(&self) -> &dyn RecordMetadata;
    fn cursor(&self) -> Result<Box<dyn RecordCursor>>;
}

/// Single-threaded, single-use stream of records (section 5 contracts).
pub trait RecordCursor {
    /// Advance to the next record and return a reference to it, or `None`
    /// at end of stream.
    fn next(&mut self) -> Option<&dyn Record>;
}

/// Writer-side accumulator with typed per-column setters and a final
/// `append` (GLOSSARY: "Row").
pub trait Row {
    fn put_boolean(&mut self, col: usize, v: bool);
    fn put_byte(&mut self, col: usize, v: i8);
    fn put_short(&mut self, col: usize, v: i16);
    fn put_char(&mut self, col: usize, v: char);
    fn put_int(&mut self, col: usize, v: i32);
    fn put_long(&mut self, col: usize, v: i64);
    fn put_float(&mut self, col: usize, v: f32);
    fn put_double(&mut self, col: usize, v: f64);
    fn put_date(&mut self, col: usize, v: i64);
    fn put_timestamp(&mut self, col: usize, v: i64);
    fn put_str(&mut self, col: usize, v: &str);
    fn put_sym(&mut self, col: usize, v: &str);
    fn put_bin(&mut self, col: usize, v: &[u8]);
    fn put_long256(&mut self, col: usize, v: [i64; 4]);

    fn append(self: Box<Self>);
}

/// Exclusive per-table writer (section 6.3).
pub trait Writer {
    fn metadata(&self) -> &dyn RecordMetadata;
    fn structure_version(&self) -> StructureVersion;

    /// Start a new row. `ts` is `Some` for tables with a designated
    /// timestamp column (GLOSSARY), `None` otherwise (section 4.3: "calls
    /// `newRow(timestampFn())` or `newRow()` depending on presence of a
    /// timestamp column").
    fn new_row(&mut self, ts: Option<i64>) -> Result<Box<dyn Row>>;

    fn add_column(
        &mut self,
        name: &str,
        col_type: ColumnType,
        symbol_capacity: Option<u32>,
        symbol_cache: Option<bool>,
        indexed: bool,
        index_value_block_capacity: Option<u32>,
    ) -> Result<()>;

    fn remove_column(&mut self, name: &str) -> Result<()>;
    fn truncate(&mut self) -> Result<()>;
    fn rollback(&mut self);
    fn commit(&mut self);
    fn close(self: Box<Self>);
}

/// A reader is used only for INSERT validation (section 5: "Reader: used
/// for INSERT validation; released before the writer is opened").
pub trait Reader {
    fn metadata(&self) -> &dyn RecordMetadata;
    fn structure_version(&self) -> StructureVersion;
}

/// What version of a table a reader is allowed to be: any committed
/// version, or an exact structure version (used by `InsertStatement`
/// recompilation checks, section 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderVersion {
    Any,
    Exact(StructureVersion),
}

/// The storage engine boundary itself (section 6.3).
pub trait StorageEngine {
    fn status(&self, name: &str) -> TableStatusKind;

    /// Acquire an exclusive name lock. Non-blocking try; failure is
    /// reported, never retried (section 5).
    fn lock(&self, name: &str) -> bool;

    /// Release a name lock. `writer`, when present, is adopted by the
    /// engine (section 4.5 step 6: "hand it to the engine's unlock call
    /// so the engine can adopt it").
    fn unlock(&self, name: &str, writer: Option<Box<dyn Writer>>);

    fn create_table(&self, path: &str, structure: &dyn TableStructure) -> Result<()>;

    fn get_reader(&self, name: &str, version: ReaderVersion) -> Result<Box<dyn Reader>>;

    /// Acquire the exclusive writer for a table. May block on an internal
    /// timeout before failing "busy" (section 5).
    fn get_writer(&self, name: &str) -> Result<Box<dyn Writer>>;

    fn lock_readers(&self, name: &str) -> bool;
    fn unlock_readers(&self, name: &str);

    fn remove(&self, name: &str) -> Result<()>;
    fn remove_directory(&self, path: &str) -> bool;

    /// Build a cursor factory over a base table, used by the code
    /// generator when a `QueryModel`'s FROM clause names a real table.
    fn table_cursor_factory(&self, name: &str) -> Result<Box<dyn RecordCursorFactory>>;
}

/// Owned snapshot of a `RecordMetadata`, for callers (the optimiser, the
/// compiler's table-name resolution) that need a table's shape without
/// holding a cursor factory alive for the lifetime of planning.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<(String, ColumnType)>,
    pub timestamp_index: Option<usize>,
}

impl TableSchema {
    pub fn from_metadata(m: &dyn RecordMetadata) -> Self {
        TableSchema {
            columns: (0..m.column_count())
                .map(|i| (m.column_name(i).to_string(), m.column_type(i)))
                .collect(),
            timestamp_index: m.timestamp_index(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn column_type(&self, i: usize) -> ColumnType {
        self.columns[i].1
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

impl RecordMetadata for TableSchema {
    fn column_count(&self) -> usize {
        self.columns.len()
    }
    fn column_name(&self, i: usize) -> &str {
        &self.columns[i].0
    }
    fn column_type(&self, i: usize) -> ColumnType {
        self.columns[i].1
    }
    fn timestamp_index(&self) -> Option<usize> {
        self.timestamp_index
    }
}

#[cfg(feature = "mock-engine")]
pub mod mock;
