//! In-memory storage engine implementing the section 6.3 traits.
//!
//! This stands in for the real (out-of-scope) page-file engine so the
//! compiler and mutation executors in this crate are fully testable.
//! Grounded on the teacher's in-process `Database`/`Table` pair
//! (`lib.rs`/`table.rs`): a map of named tables behind `Rc<RefCell<_>>`,
//! row storage as a plain `Vec` of typed values rather than an on-disk
//! page tree (the teacher's `SortedFile`), and a name-lock map mirroring
//! `Database::tables` plus the schema-name-lock semantics the teacher's
//! `CREATE TABLE` codepath uses.

use super::*;
use crate::error::SqlError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

struct ColumnDef {
    name: String,
    col_type: ColumnType,
    symbol_capacity: Option<u32>,
    symbol_cache: Option<bool>,
    indexed: bool,
    index_value_block_capacity: Option<u32>,
}

struct MockTable {
    columns: Vec<ColumnDef>,
    timestamp_index: Option<usize>,
    rows: Vec<Vec<Value>>,
    structure_version: StructureVersion,
}

/// Snapshot a table's current shape into the engine-agnostic `TableSchema`,
/// so writer/reader/cursor-factory handles can hand back a `&dyn
/// RecordMetadata` without borrowing from a `RefCell` still held elsewhere.
fn snapshot_metadata(t: &MockTable) -> TableSchema {
    TableSchema {
        columns: t.columns.iter().map(|c| (c.name.clone(), c.col_type)).collect(),
        timestamp_index: t.timestamp_index,
    }
}

struct MockRecord {
    values: Vec<Value>,
}

impl Record for MockRecord {
    fn get_boolean(&self, col: usize) -> bool {
        matches!(self.values[col], Value::Boolean(true))
    }
    fn get_byte(&self, col: usize) -> i8 {
        match self.values[col] {
            Value::Byte(v) => v,
            _ => 0,
        }
    }
    fn get_short(&self, col: usize) -> i16 {
        match self.values[col] {
            Value::Short(v) => v,
            _ => 0,
        }
    }
    fn get_char(&self, col: usize) -> char {
        match self.values[col] {
            Value::Char(v) => v,
            _ => '\0',
        }
    }
    fn get_int(&self, col: usize) -> i32 {
        match self.values[col] {
            Value::Int(v) => v,
            _ => crate::value::INT_NULL,
        }
    }
    fn get_long(&self, col: usize) -> i64 {
        match self.values[col] {
            Value::Long(v) => v,
            _ => crate::value::LONG_NULL,
        }
    }
    fn get_float(&self, col: usize) -> f32 {
        match self.values[col] {
            Value::Float(v) => v,
            _ => f32::NAN,
        }
    }
    fn get_double(&self, col: usize) -> f64 {
        match self.values[col] {
            Value::Double(v) => v,
            _ => f64::NAN,
        }
    }
    fn get_date(&self, col: usize) -> i64 {
        match self.values[col] {
            Value::Date(v) => v,
            _ => crate::value::LONG_NULL,
        }
    }
    fn get_timestamp(&self, col: usize) -> i64 {
        match self.values[col] {
            Value::Timestamp(v) => v,
            _ => crate::value::LONG_NULL,
        }
    }
    fn get_str(&self, col: usize) -> Rc<str> {
        match &self.values[col] {
            Value::String(v) => v.clone(),
            _ => Rc::from(""),
        }
    }
    fn get_sym(&self, col: usize) -> Rc<str> {
        match &self.values[col] {
            Value::Symbol(v) => v.clone(),
            _ => Rc::from(""),
        }
    }
    fn get_bin(&self, col: usize) -> Rc<Vec<u8>> {
        match &self.values[col] {
            Value::Binary(v) => v.clone(),
            _ => Rc::new(Vec::new()),
        }
    }
    fn get_long256(&self, col: usize) -> [i64; 4] {
        match self.values[col] {
            Value::Long256(v) => v,
            _ => [0; 4],
        }
    }
}

struct MockCursor {
    rows: std::vec::IntoIter<Vec<Value>>,
    current: Option<MockRecord>,
}

impl RecordCursor for MockCursor {
    fn next(&mut self) -> Option<&dyn Record> {
        self.current = self.rows.next().map(|values| MockRecord { values });
        self.current.as_ref().map(|r| r as &dyn Record)
    }
}

struct MockCursorFactory {
    metadata: TableSchema,
    rows: Vec<Vec<Value>>,
}

impl RecordCursorFactory for MockCursorFactory {
    fn metadata(&self) -> &dyn RecordMetadata {
        &self.metadata
    }
    fn cursor(&self) -> Result<Box<dyn RecordCursor>> {
        Ok(Box::new(MockCursor {
            rows: self.rows.clone().into_iter(),
            current: None,
        }))
    }
}

struct MockRow {
    table: Rc<RefCell<MockTable>>,
    values: Vec<Value>,
}

impl Row for MockRow {
    fn put_boolean(&mut self, col: usize, v: bool) {
        self.values[col] = Value::Boolean(v);
    }
    fn put_byte(&mut self, col: usize, v: i8) {
        self.values[col] = Value::Byte(v);
    }
    fn put_short(&mut self, col: usize, v: i16) {
        self.values[col] = Value::Short(v);
    }
    fn put_char(&mut self, col: usize, v: char) {
        self.values[col] = Value::Char(v);
    }
    fn put_int(&mut self, col: usize, v: i32) {
        self.values[col] = Value::Int(v);
    }
    fn put_long(&mut self, col: usize, v: i64) {
        self.values[col] = Value::Long(v);
    }
    fn put_float(&mut self, col: usize, v: f32) {
        self.values[col] = Value::Float(v);
    }
    fn put_double(&mut self, col: usize, v: f64) {
        self.values[col] = Value::Double(v);
    }
    fn put_date(&mut self, col: usize, v: i64) {
        self.values[col] = Value::Date(v);
    }
    fn put_timestamp(&mut self, col: usize, v: i64) {
        self.values[col] = Value::Timestamp(v);
    }
    fn put_str(&mut self, col: usize, v: &str) {
        self.values[col] = Value::String(Rc::from(v));
    }
    fn put_sym(&mut self, col: usize, v: &str) {
        self.values[col] = Value::Symbol(Rc::from(v));
    }
    fn put_bin(&mut self, col: usize, v: &[u8]) {
        self.values[col] = Value::Binary(Rc::new(v.to_vec()));
    }
    fn put_long256(&mut self, col: usize, v: [i64; 4]) {
        self.values[col] = Value::Long256(v);
    }

    fn append(self: Box<Self>) {
        self.table.borrow_mut().rows.push(self.values);
    }
}

struct MockWriter {
    name: String,
    table: Rc<RefCell<MockTable>>,
    metadata: TableSchema,
    rolled_back_rows: usize,
    engine: Rc<MockEngineInner>,
}

impl Writer for MockWriter {
    fn metadata(&self) -> &dyn RecordMetadata {
        &self.metadata
    }

    fn structure_version(&self) -> StructureVersion {
        self.table.borrow().structure_version
    }

    fn new_row(&mut self, _ts: Option<i64>) -> Result<Box<dyn Row>> {
        let n = self.table.borrow().columns.len();
        Ok(Box::new(MockRow {
            table: self.table.clone(),
            values: vec![Value::Null; n],
        }))
    }

    fn add_column(
        &mut self,
        name: &str,
        col_type: ColumnType,
        symbol_capacity: Option<u32>,
        symbol_cache: Option<bool>,
        indexed: bool,
        index_value_block_capacity: Option<u32>,
    ) -> Result<()> {
        let mut t = self.table.borrow_mut();
        if t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(SqlError::semantic(0, format!("duplicate column '{name}'")));
        }
        t.columns.push(ColumnDef {
            name: name.to_string(),
            col_type,
            symbol_capacity,
            symbol_cache,
            indexed,
            index_value_block_capacity,
        });
        let default = Value::default_for(col_type);
        for row in t.rows.iter_mut() {
            row.push(default.clone());
        }
        t.structure_version += 1;
        self.metadata = snapshot_metadata(&t);
        Ok(())
    }

    fn remove_column(&mut self, name: &str) -> Result<()> {
        let mut t = self.table.borrow_mut();
        let idx = t
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SqlError::semantic(0, format!("column '{name}' does not exist")))?;
        if t.timestamp_index == Some(idx) {
            return Err(SqlError::semantic(0, "cannot drop the designated timestamp column"));
        }
        t.columns.remove(idx);
        for row in t.rows.iter_mut() {
            row.remove(idx);
        }
        if let Some(ts) = t.timestamp_index {
            if ts > idx {
                t.timestamp_index = Some(ts - 1);
            }
        }
        t.structure_version += 1;
        self.metadata = snapshot_metadata(&t);
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        self.table.borrow_mut().rows.clear();
        Ok(())
    }

    fn rollback(&mut self) {
        let mut t = self.table.borrow_mut();
        t.rows.truncate(self.rolled_back_rows);
    }

    fn commit(&mut self) {
        self.rolled_back_rows = self.table.borrow().rows.len();
    }

    fn close(self: Box<Self>) {
        self.engine.locked_writers.borrow_mut().remove(&self.name);
    }
}

struct MockReader {
    metadata: TableSchema,
    structure_version: StructureVersion,
}

impl Reader for MockReader {
    fn metadata(&self) -> &dyn RecordMetadata {
        &self.metadata
    }
    fn structure_version(&self) -> StructureVersion {
        self.structure_version
    }
}

#[derive(Default)]
struct MockEngineInner {
    tables: RefCell<HashMap<String, Rc<RefCell<MockTable>>>>,
    name_locks: RefCell<std::collections::HashSet<String>>,
    locked_writers: RefCell<std::collections::HashSet<String>>,
    reader_locks: RefCell<HashMap<String, u32>>,
}

/// In-memory stand-in for the real storage engine. Cheaply cloneable
/// (`Rc`-backed) so a single instance can be shared between a `Compiler`
/// and its test harness.
#[derive(Clone, Default)]
pub struct MockEngine {
    inner: Rc<MockEngineInner>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/bootstrap helper: create a table directly, bypassing CREATE
    /// TABLE compilation, for scenarios that need a pre-existing table.
    pub fn create_table_direct(&self, name: &str, structure: &dyn TableStructure) {
        let columns = (0..structure.column_count())
            .map(|i| ColumnDef {
                name: structure.column_name(i).to_string(),
                col_type: structure.column_type(i),
                symbol_capacity: structure.symbol_capacity(i),
                symbol_cache: structure.symbol_cache(i),
                indexed: structure.is_indexed(i),
                index_value_block_capacity: structure.index_value_block_capacity(i),
            })
            .collect();
        let table = MockTable {
            columns,
            timestamp_index: structure.timestamp_index(),
            rows: Vec::new(),
            structure_version: 0,
        };
        self.inner
            .tables
            .borrow_mut()
            .insert(name.to_string(), Rc::new(RefCell::new(table)));
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.inner.tables.borrow()[name].borrow().rows.len()
    }
}

impl StorageEngine for MockEngine {
    fn status(&self, name: &str) -> TableStatusKind {
        if self.inner.tables.borrow().contains_key(name) {
            TableStatusKind::Exists
        } else if self.inner.name_locks.borrow().contains(name) {
            TableStatusKind::Reserved
        } else {
            TableStatusKind::DoesNotExist
        }
    }

    fn lock(&self, name: &str) -> bool {
        self.inner.name_locks.borrow_mut().insert(name.to_string())
    }

    fn unlock(&self, name: &str, writer: Option<Box<dyn Writer>>) {
        self.inner.name_locks.borrow_mut().remove(name);
        if let Some(w) = writer {
            w.close();
        }
    }

    fn create_table(&self, path: &str, structure: &dyn TableStructure) -> Result<()> {
        if self.inner.tables.borrow().contains_key(path) {
            return Err(SqlError::already_exists(0, format!("table '{path}' already exists")));
        }
        self.create_table_direct(path, structure);
        Ok(())
    }

    fn get_reader(&self, name: &str, version: ReaderVersion) -> Result<Box<dyn Reader>> {
        let tables = self.inner.tables.borrow();
        let t = tables
            .get(name)
            .ok_or_else(|| SqlError::semantic(0, format!("table '{name}' does not exist")))?
            .borrow();
        if let ReaderVersion::Exact(v) = version {
            if v != t.structure_version {
                return Err(SqlError::reader_out_of_date(0, "reader structure version mismatch"));
            }
        }
        Ok(Box::new(MockReader {
            metadata: snapshot_metadata(&t),
            structure_version: t.structure_version,
        }))
    }

    fn get_writer(&self, name: &str) -> Result<Box<dyn Writer>> {
        if !self.inner.tables.borrow().contains_key(name) {
            return Err(SqlError::semantic(0, format!("table '{name}' does not exist")));
        }
        if !self.inner.locked_writers.borrow_mut().insert(name.to_string()) {
            return Err(SqlError::busy(0, format!("table '{name}' is busy")));
        }
        let table = self.inner.tables.borrow()[name].clone();
        let metadata = snapshot_metadata(&table.borrow());
        let rows_len = table.borrow().rows.len();
        Ok(Box::new(MockWriter {
            name: name.to_string(),
            table,
            metadata,
            rolled_back_rows: rows_len,
            engine: self.inner.clone(),
        }))
    }

    fn lock_readers(&self, name: &str) -> bool {
        let mut locks = self.inner.reader_locks.borrow_mut();
        let count = locks.entry(name.to_string()).or_insert(0);
        if *count > 0 {
            false
        } else {
            *count += 1;
            true
        }
    }

    fn unlock_readers(&self, name: &str) {
        if let Some(count) = self.inner.reader_locks.borrow_mut().get_mut(name) {
            *count = count.saturating_sub(1);
        }
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.inner
            .tables
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SqlError::semantic(0, format!("table '{name}' does not exist")))
    }

    fn remove_directory(&self, _path: &str) -> bool {
        true
    }

    fn table_cursor_factory(&self, name: &str) -> Result<Box<dyn RecordCursorFactory>> {
        let tables = self.inner.tables.borrow();
        let t = tables
            .get(name)
            .ok_or_else(|| SqlError::semantic(0, format!("table '{name}' does not exist")))?
            .borrow();
        Ok(Box::new(MockCursorFactory {
            metadata: snapshot_metadata(&t),
            rows: t.rows.clone(),
        }))
    }
}

/// Mark a reader-lock as active for tests exercising the TRUNCATE "active
/// query" failure mode (section 8 scenario 5), without a real concurrent
/// thread.
impl MockEngine {
    pub fn simulate_active_reader(&self, name: &str) {
        self.inner.reader_locks.borrow_mut().insert(name.to_string(), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnSpec;

    struct Cols(Vec<ColumnSpec>, Option<usize>);
    impl TableStructure for Cols {
        fn column_count(&self) -> usize {
            self.0.len()
        }
        fn column_name(&self, i: usize) -> &str {
            &self.0[i].name
        }
        fn column_type(&self, i: usize) -> ColumnType {
            self.0[i].col_type
        }
        fn timestamp_index(&self) -> Option<usize> {
            self.1
        }
        fn symbol_capacity(&self, i: usize) -> Option<u32> {
            self.0[i].symbol_capacity
        }
        fn symbol_cache(&self, i: usize) -> Option<bool> {
            self.0[i].symbol_cache
        }
        fn is_indexed(&self, i: usize) -> bool {
            self.0[i].indexed
        }
        fn index_value_block_capacity(&self, i: usize) -> Option<u32> {
            self.0[i].index_value_block_capacity
        }
    }

    fn simple_column(name: &str, t: ColumnType) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            col_type: t,
            symbol_capacity: None,
            symbol_cache: None,
            indexed: false,
            index_value_block_capacity: None,
        }
    }

    #[test]
    fn create_insert_scan_round_trip() {
        let engine = MockEngine::new();
        let structure = Cols(
            vec![simple_column("x", ColumnType::Int), simple_column("ts", ColumnType::Timestamp)],
            Some(1),
        );
        engine.create_table("a", &structure).unwrap();
        assert_eq!(engine.status("a"), TableStatusKind::Exists);

        let mut writer = engine.get_writer("a").unwrap();
        {
            let mut row = writer.new_row(Some(1)).unwrap();
            row.put_int(0, 1);
            row.put_timestamp(1, 1);
            row.append();
        }
        writer.commit();
        writer.close();

        assert_eq!(engine.row_count("a"), 1);
        let factory = engine.table_cursor_factory("a").unwrap();
        let mut cursor = factory.cursor().unwrap();
        let rec = cursor.next().unwrap();
        assert_eq!(rec.get_int(0), 1);
        assert!(cursor.next().is_none());
    }

    #[test]
    fn get_writer_twice_is_busy() {
        let engine = MockEngine::new();
        let structure = Cols(vec![simple_column("x", ColumnType::Int)], None);
        engine.create_table("a", &structure).unwrap();
        let _w1 = engine.get_writer("a").unwrap();
        let err = engine.get_writer("a").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ResourceBusy);
    }

    #[test]
    fn create_existing_table_fails() {
        let engine = MockEngine::new();
        let structure = Cols(vec![simple_column("x", ColumnType::Int)], None);
        engine.create_table("a", &structure).unwrap();
        let err = engine.create_table("a", &structure).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::AlreadyExists);
    }
}
