//! Whole-pipeline tests against `MockEngine`, one per section 8 scenario:
//! compile SQL through `Compiler::compile` and check the resulting
//! `CompiledQuery` (or its error) the way a caller actually would, rather
//! than poking at individual compiler stages.

use qdb_sqlcore::compiler::{CompiledQuery, Compiler, ExecutionContext};
use qdb_sqlcore::config::CompilerConfig;
use qdb_sqlcore::engine::mock::MockEngine;
use qdb_sqlcore::error::ErrorKind;

fn compiler() -> Compiler {
    Compiler::new(CompilerConfig::default())
}

fn run(c: &mut Compiler, engine: &MockEngine, sql: &str) -> Result<CompiledQuery, qdb_sqlcore::error::SqlError> {
    c.compile(engine, &ExecutionContext::new(), sql)
}

fn select_ints(cq: CompiledQuery, col: usize) -> Vec<i32> {
    match cq {
        CompiledQuery::Select(factory) => {
            let mut cursor = factory.cursor().unwrap();
            let mut out = Vec::new();
            while let Some(rec) = cursor.next() {
                out.push(rec.get_int(col));
            }
            out
        }
        _ => panic!("expected a SELECT result"),
    }
}

/// Scenario 1: simple create-insert-select (section 8).
#[test]
fn simple_create_insert_select() {
    let engine = MockEngine::new();
    let mut c = compiler();

    run(&mut c, &engine, "CREATE TABLE a (x INT, ts TIMESTAMP) TIMESTAMP(ts) PARTITION BY DAY").unwrap();
    run(&mut c, &engine, "INSERT INTO a VALUES (1, 1577836800000000)").unwrap();
    run(&mut c, &engine, "INSERT INTO a VALUES (2, 1577836800000001)").unwrap();

    // Literal INSERT only validates and binds at compile time (section
    // 4.3); executing the statement is the caller's job.
    let engine2 = MockEngine::new();
    let mut c2 = compiler();
    run(&mut c2, &engine2, "CREATE TABLE a (x INT, ts TIMESTAMP) TIMESTAMP(ts) PARTITION BY DAY").unwrap();
    for sql in ["INSERT INTO a VALUES (1, 1577836800000000)", "INSERT INTO a VALUES (2, 1577836800000001)"] {
        match run(&mut c2, &engine2, sql).unwrap() {
            CompiledQuery::Insert(stmt) => stmt.execute(&engine2).unwrap(),
            _ => panic!("expected an Insert result"),
        }
    }

    let cq = run(&mut c2, &engine2, "SELECT x FROM a").unwrap();
    assert_eq!(select_ints(cq, 0), vec![1, 2]);
}

/// Scenario 2: assignment widening, INT literal into a DOUBLE column.
#[test]
fn assignment_widening_int_into_double() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE b (v DOUBLE)").unwrap();
    match run(&mut c, &engine, "INSERT INTO b VALUES (3)").unwrap() {
        CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
        _ => panic!("expected an Insert result"),
    }

    match run(&mut c, &engine, "SELECT v FROM b").unwrap() {
        CompiledQuery::Select(factory) => {
            let mut cursor = factory.cursor().unwrap();
            let rec = cursor.next().unwrap();
            assert_eq!(rec.get_double(0), 3.0);
        }
        _ => panic!("expected a SELECT result"),
    }
}

/// Scenario 3: DOUBLE literal into an INT column is rejected with a
/// message naming both types.
#[test]
fn assignment_rejected_double_into_int() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE c (v INT)").unwrap();
    let sql = "INSERT INTO c VALUES (3.5)";
    let err = run(&mut c, &engine, sql).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("DOUBLE"), "message was: {}", err.message);
    assert!(err.message.contains("INT"), "message was: {}", err.message);
    assert_eq!(err.position, sql.find("3.5").unwrap(), "error must point at the offending literal, not position 0");
}

/// Scenario 4: INSERT with an explicit column list that omits the
/// designated timestamp column fails to compile.
#[test]
fn missing_timestamp_column_rejected() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE d (x INT, ts TIMESTAMP) TIMESTAMP(ts) PARTITION BY DAY").unwrap();
    let err = run(&mut c, &engine, "INSERT INTO d (x) VALUES (1)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("timestamp"), "message was: {}", err.message);
}

/// Scenario 5: TRUNCATE against a table with an active reader lock fails
/// as "there is an active query", and leaves the table untouched.
#[test]
fn truncate_busy_with_active_reader() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE e (x INT)").unwrap();
    match run(&mut c, &engine, "INSERT INTO e VALUES (1)").unwrap() {
        CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
        _ => panic!("expected an Insert result"),
    }

    engine.simulate_active_reader("e");
    let err = run(&mut c, &engine, "TRUNCATE TABLE e").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResourceBusy);
    assert!(err.message.contains("active query"), "message was: {}", err.message);
    assert_eq!(engine.row_count("e"), 1);
}

/// Scenario 6: CREATE TABLE AS SELECT with a CAST widens a column and
/// copies every row from the source.
#[test]
fn create_as_select_with_cast() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE f (x INT)").unwrap();
    for v in [1, 2, 3] {
        match run(&mut c, &engine, &format!("INSERT INTO f VALUES ({v})")).unwrap() {
            CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
            _ => panic!("expected an Insert result"),
        }
    }

    run(&mut c, &engine, "CREATE TABLE g AS (SELECT * FROM f), CAST(x AS LONG)").unwrap();
    assert_eq!(engine.row_count("g"), 3);

    match run(&mut c, &engine, "SELECT x FROM g").unwrap() {
        CompiledQuery::Select(factory) => {
            assert_eq!(
                factory.metadata().column_type(0),
                qdb_sqlcore::types::ColumnType::Long
            );
        }
        _ => panic!("expected a SELECT result"),
    }
}

/// Scenario 7: ALTER TABLE ADD COLUMN followed by DROP COLUMN leaves the
/// schema as it was (column count and the surviving column's identity).
#[test]
fn alter_add_then_drop_restores_schema() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE a (x INT, ts TIMESTAMP) TIMESTAMP(ts) PARTITION BY DAY").unwrap();

    run(&mut c, &engine, "ALTER TABLE a ADD COLUMN y DOUBLE").unwrap();
    let reader = engine.get_reader("a", qdb_sqlcore::engine::ReaderVersion::Any).unwrap();
    assert_eq!(reader.metadata().column_count(), 3);
    drop(reader);

    run(&mut c, &engine, "ALTER TABLE a DROP COLUMN y").unwrap();
    let reader = engine.get_reader("a", qdb_sqlcore::engine::ReaderVersion::Any).unwrap();
    assert_eq!(reader.metadata().column_count(), 2);
    assert_eq!(reader.metadata().column_name(0), "x");
    assert_eq!(reader.metadata().column_name(1), "ts");
}

/// Idempotence: CREATE TABLE twice fails with AlreadyExists; dropping
/// then re-creating succeeds.
#[test]
fn create_twice_fails_drop_then_recreate_succeeds() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE h (x INT)").unwrap();
    let err = run(&mut c, &engine, "CREATE TABLE h (x INT)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyExists);

    run(&mut c, &engine, "DROP TABLE h").unwrap();
    run(&mut c, &engine, "CREATE TABLE h (x INT)").unwrap();
}

/// A compiler instance is reusable: re-issuing the same query after a
/// prior compile (which resets the pools) returns an equivalent result.
#[test]
fn compiler_is_reusable_across_calls() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE a (x INT)").unwrap();
    match run(&mut c, &engine, "INSERT INTO a VALUES (1)").unwrap() {
        CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
        _ => panic!("expected an Insert result"),
    }

    let first = select_ints(run(&mut c, &engine, "SELECT x FROM a").unwrap(), 0);
    let second = select_ints(run(&mut c, &engine, "SELECT x FROM a").unwrap(), 0);
    assert_eq!(first, second);
}

/// `SET` is accepted and ignored.
#[test]
fn set_is_a_noop() {
    let engine = MockEngine::new();
    let mut c = compiler();
    match run(&mut c, &engine, "SET x = 1").unwrap() {
        CompiledQuery::Set => {}
        _ => panic!("expected Set"),
    }
}

/// A literal INSERT with an explicit column list that is a non-prefix
/// subset of the table's columns must write each value to the column it
/// actually names, not to the column at its position in the VALUES list.
#[test]
fn insert_values_with_non_prefix_column_list_targets_correct_column() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE t (a INT, b INT, c INT)").unwrap();
    match run(&mut c, &engine, "INSERT INTO t (b) VALUES (5)").unwrap() {
        CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
        _ => panic!("expected an Insert result"),
    }

    match run(&mut c, &engine, "SELECT a, b, c FROM t").unwrap() {
        CompiledQuery::Select(factory) => {
            let mut cursor = factory.cursor().unwrap();
            let rec = cursor.next().unwrap();
            assert_eq!(rec.get_int(0), qdb_sqlcore::value::INT_NULL, "column a must stay NULL");
            assert_eq!(rec.get_int(1), 5, "column b must receive the named value");
            assert_eq!(rec.get_int(2), qdb_sqlcore::value::INT_NULL, "column c must stay NULL");
        }
        _ => panic!("expected a SELECT result"),
    }
}

/// `INSERT AS SELECT` with an explicit column list runs the same
/// assignability check the implicit (all-columns) branch runs: a
/// narrowing LONG -> BYTE pairing must be rejected, not silently
/// truncated by the copier.
#[test]
fn insert_as_select_explicit_columns_rejects_narrowing() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE src (long_col LONG)").unwrap();
    match run(&mut c, &engine, "INSERT INTO src VALUES (300)").unwrap() {
        CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
        _ => panic!("expected an Insert result"),
    }
    run(&mut c, &engine, "CREATE TABLE dst (byte_col BYTE)").unwrap();

    let err = run(&mut c, &engine, "INSERT INTO dst (byte_col) SELECT long_col FROM src").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(engine.row_count("dst"), 0, "the rejected insert must not have written any row");
}

/// `INSERT AS SELECT` with an explicit column list runs to completion and
/// copies every source row into the named destination column.
#[test]
fn insert_as_select_explicit_columns_completes() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE src (y INT)").unwrap();
    for v in [10, 20] {
        match run(&mut c, &engine, &format!("INSERT INTO src VALUES ({v})")).unwrap() {
            CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
            _ => panic!("expected an Insert result"),
        }
    }
    run(&mut c, &engine, "CREATE TABLE dst (x INT)").unwrap();

    match run(&mut c, &engine, "INSERT INTO dst (x) SELECT y FROM src").unwrap() {
        CompiledQuery::InsertAsSelect => {}
        _ => panic!("expected InsertAsSelect"),
    }
    assert_eq!(engine.row_count("dst"), 2);
    assert_eq!(select_ints(run(&mut c, &engine, "SELECT x FROM dst").unwrap(), 0), vec![10, 20]);
}

/// Round-trip property (section 8): `INSERT INTO t SELECT * FROM t`
/// duplicates every row's per-column values.
#[test]
fn insert_as_select_round_trip_duplicates_rows() {
    let engine = MockEngine::new();
    let mut c = compiler();
    run(&mut c, &engine, "CREATE TABLE t (x INT, ts TIMESTAMP) TIMESTAMP(ts) PARTITION BY DAY").unwrap();
    for sql in ["INSERT INTO t VALUES (1, 100)", "INSERT INTO t VALUES (2, 200)"] {
        match run(&mut c, &engine, sql).unwrap() {
            CompiledQuery::Insert(stmt) => stmt.execute(&engine).unwrap(),
            _ => panic!("expected an Insert result"),
        }
    }

    match run(&mut c, &engine, "INSERT INTO t SELECT * FROM t").unwrap() {
        CompiledQuery::InsertAsSelect => {}
        _ => panic!("expected InsertAsSelect"),
    }

    assert_eq!(engine.row_count("t"), 4);
    assert_eq!(select_ints(run(&mut c, &engine, "SELECT x FROM t").unwrap(), 0), vec![1, 2, 1, 2]);
}
