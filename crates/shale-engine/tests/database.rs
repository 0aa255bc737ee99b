//! End-to-end tests against the public `Database` surface.

use shale_engine::{Database, EngineError, IndexManager, StorageEngine, Value};

fn open_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    (dir, db)
}

fn setup_users(db: &Database) {
    db.execute(
        "CREATE TABLE users (\
           id INTEGER PRIMARY KEY, \
           name VARCHAR(100) NOT NULL, \
           age INTEGER, \
           active BOOLEAN DEFAULT TRUE)",
    )
    .unwrap();
    db.execute(
        "INSERT INTO users (id, name, age) VALUES \
         (1, 'Alice', 30), (2, 'Bob', 25), (3, 'Charlie', 35), (4, 'Diana', 25)",
    )
    .unwrap();
}

// ===================================================================
// Scenario suite
// ===================================================================

#[test]
fn crud_basics() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE u (id INTEGER PRIMARY KEY, name VARCHAR(100) NOT NULL)")
        .unwrap();

    let result = db
        .execute("INSERT INTO u VALUES (1, 'Alice'), (2, 'Bob')")
        .unwrap();
    assert_eq!(result.affected_rows, 2);

    let result = db
        .execute("UPDATE u SET name = 'Alicia' WHERE id = 1")
        .unwrap();
    assert_eq!(result.affected_rows, 1);

    let result = db.execute("SELECT name FROM u ORDER BY id").unwrap();
    assert_eq!(result.columns, vec!["name"]);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["name"], Value::Varchar("Alicia".into()));
    assert_eq!(result.rows[1]["name"], Value::Varchar("Bob".into()));
}

#[test]
fn aggregates_with_group_by() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE sales (product VARCHAR(50), quantity INTEGER)")
        .unwrap();
    db.execute(
        "INSERT INTO sales VALUES ('Widget', 10), ('Widget', 5), ('Gadget', 3), ('Gadget', 7)",
    )
    .unwrap();

    let result = db
        .execute(
            "SELECT product, SUM(quantity) AS total FROM sales \
             GROUP BY product ORDER BY total DESC",
        )
        .unwrap();
    assert_eq!(result.columns, vec!["product", "total"]);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["product"], Value::Varchar("Widget".into()));
    assert_eq!(result.rows[0]["total"], Value::Integer(15));
    assert_eq!(result.rows[1]["product"], Value::Varchar("Gadget".into()));
    assert_eq!(result.rows[1]["total"], Value::Integer(10));
}

#[test]
fn left_join_keeps_unmatched_left_rows() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE employees (id INTEGER PRIMARY KEY, name VARCHAR(100), dept_id INTEGER)")
        .unwrap();
    db.execute("CREATE TABLE departments (id INTEGER PRIMARY KEY, name VARCHAR(100))")
        .unwrap();
    db.execute(
        "INSERT INTO employees VALUES (1, 'Alice', 1), (2, 'Bob', 1), (3, 'Charlie', 2), (4, 'Diana', NULL)",
    )
    .unwrap();
    db.execute("INSERT INTO departments VALUES (1, 'Eng'), (2, 'Mkt'), (3, 'HR')")
        .unwrap();

    let result = db
        .execute(
            "SELECT e.name, d.name AS dept FROM employees e \
             LEFT JOIN departments d ON e.dept_id = d.id ORDER BY e.id",
        )
        .unwrap();

    // Invariant: a LEFT JOIN returns at least the left input's row count.
    assert_eq!(result.rows.len(), 4);
    assert_eq!(result.columns, vec!["name", "dept"]);
    assert_eq!(result.rows[0]["dept"], Value::Varchar("Eng".into()));
    assert_eq!(result.rows[3]["name"], Value::Varchar("Diana".into()));
    assert_eq!(result.rows[3]["dept"], Value::Null);
}

#[test]
fn unique_constraint_keeps_earlier_rows() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE x (id INTEGER PRIMARY KEY, email VARCHAR(255) UNIQUE)")
        .unwrap();
    db.execute("INSERT INTO x VALUES (1, 'a@b')").unwrap();

    let err = db.execute("INSERT INTO x VALUES (2, 'a@b')").unwrap_err();
    assert!(matches!(err, EngineError::UniqueViolation { .. }));

    assert_eq!(db.count("x").unwrap(), 1);
}

#[test]
fn like_and_between() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE products (name VARCHAR(50), price FLOAT)")
        .unwrap();
    db.execute(
        "INSERT INTO products VALUES \
         ('Apple', 1.50), ('Banana', 0.75), ('Milk', 3.00), ('Bread', 2.50), ('Cheese', 5.00)",
    )
    .unwrap();

    let result = db
        .execute(
            "SELECT name FROM products WHERE name LIKE 'B%' AND price BETWEEN 1.00 AND 3.00",
        )
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0]["name"], Value::Varchar("Bread".into()));
}

#[test]
fn reopening_preserves_data_and_results() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(dir.path()).unwrap();
        db.execute("CREATE TABLE u (id INTEGER PRIMARY KEY, name VARCHAR(100) NOT NULL)")
            .unwrap();
        db.execute("INSERT INTO u VALUES (1, 'Alice'), (2, 'Bob')")
            .unwrap();
        db.execute("UPDATE u SET name = 'Alicia' WHERE id = 1")
            .unwrap();
        db.close();
    }

    let db = Database::open(dir.path()).unwrap();
    let result = db.execute("SELECT COUNT(*) FROM u").unwrap();
    assert_eq!(result.rows[0]["COUNT(*)"], Value::Integer(2));

    let result = db.execute("SELECT name FROM u ORDER BY id").unwrap();
    assert_eq!(result.rows[0]["name"], Value::Varchar("Alicia".into()));
}

// ===================================================================
// SELECT pipeline
// ===================================================================

#[test]
fn select_star_projects_schema_order() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (b INTEGER, a INTEGER, c INTEGER)")
        .unwrap();
    db.execute("INSERT INTO t VALUES (1, 2, 3)").unwrap();

    let result = db.execute("SELECT * FROM t").unwrap();
    assert_eq!(result.columns, vec!["b", "a", "c"]);
}

#[test]
fn select_without_from_evaluates_expressions() {
    let (_dir, db) = open_db();
    let result = db.execute("SELECT 1 + 2 AS total, 'hi' AS greeting").unwrap();
    assert_eq!(result.columns, vec!["total", "greeting"]);
    assert_eq!(result.rows[0]["total"], Value::Integer(3));
    assert_eq!(result.rows[0]["greeting"], Value::Text("hi".into()));
}

#[test]
fn where_operators() {
    let (_dir, db) = open_db();
    setup_users(&db);

    let count = |sql: &str| db.execute(sql).unwrap().rows.len();
    assert_eq!(count("SELECT * FROM users WHERE age = 25"), 2);
    assert_eq!(count("SELECT * FROM users WHERE age != 25"), 2);
    assert_eq!(count("SELECT * FROM users WHERE age > 25"), 2);
    assert_eq!(count("SELECT * FROM users WHERE age >= 30"), 2);
    assert_eq!(count("SELECT * FROM users WHERE age < 30"), 2);
    assert_eq!(count("SELECT * FROM users WHERE age <= 25"), 2);
    assert_eq!(count("SELECT * FROM users WHERE age > 25 AND age < 35"), 1);
    assert_eq!(count("SELECT * FROM users WHERE age = 30 OR age = 35"), 2);
    assert_eq!(count("SELECT * FROM users WHERE NOT age = 25"), 2);
    assert_eq!(count("SELECT * FROM users WHERE name IN ('Alice', 'Bob')"), 2);
    assert_eq!(count("SELECT * FROM users WHERE name LIKE '%li%'"), 2);
    assert_eq!(count("SELECT * FROM users WHERE name LIKE '_ob'"), 1);
}

#[test]
fn null_semantics_in_predicates() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (x INTEGER)").unwrap();
    db.execute("INSERT INTO t VALUES (1), (NULL)").unwrap();

    // Comparisons involving NULL are false.
    assert_eq!(db.execute("SELECT * FROM t WHERE x = NULL").unwrap().rows.len(), 0);
    assert_eq!(db.execute("SELECT * FROM t WHERE x != 1").unwrap().rows.len(), 0);
    assert_eq!(db.execute("SELECT * FROM t WHERE x IS NULL").unwrap().rows.len(), 1);
    assert_eq!(
        db.execute("SELECT * FROM t WHERE x IS NOT NULL").unwrap().rows.len(),
        1
    );
}

#[test]
fn division_by_zero_yields_null() {
    let (_dir, db) = open_db();
    let result = db.execute("SELECT 1 / 0 AS q").unwrap();
    assert_eq!(result.rows[0]["q"], Value::Null);

    let result = db.execute("SELECT 7 / 2 AS q").unwrap();
    assert_eq!(result.rows[0]["q"], Value::Float(3.5));
}

#[test]
fn order_by_direction_and_null_placement() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (name VARCHAR(20), rank INTEGER)")
        .unwrap();
    db.execute("INSERT INTO t VALUES ('b', 2), ('a', 1), ('c', NULL)")
        .unwrap();

    let names = |sql: &str| {
        db.execute(sql)
            .unwrap()
            .rows
            .iter()
            .map(|row| row["name"].to_string())
            .collect::<Vec<_>>()
    };

    // Descending works for strings too.
    assert_eq!(names("SELECT name FROM t ORDER BY name DESC"), ["c", "b", "a"]);
    assert_eq!(names("SELECT name FROM t ORDER BY name ASC"), ["a", "b", "c"]);

    // NULLs sort before non-NULLs regardless of direction.
    assert_eq!(names("SELECT name FROM t ORDER BY rank ASC"), ["c", "a", "b"]);
    assert_eq!(names("SELECT name FROM t ORDER BY rank DESC"), ["c", "b", "a"]);
}

#[test]
fn order_by_is_stable() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (grp INTEGER, seq INTEGER)").unwrap();
    db.execute("INSERT INTO t VALUES (1, 1), (2, 2), (1, 3), (2, 4), (1, 5)")
        .unwrap();

    // Ties keep their prior (row-id) order.
    let result = db.execute("SELECT seq FROM t ORDER BY grp").unwrap();
    let seqs: Vec<_> = result.rows.iter().map(|row| row["seq"].clone()).collect();
    assert_eq!(
        seqs,
        [1, 3, 5, 2, 4].map(Value::Integer).to_vec()
    );
}

#[test]
fn limit_and_offset() {
    let (_dir, db) = open_db();
    setup_users(&db);

    let result = db.execute("SELECT id FROM users ORDER BY id LIMIT 2").unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["id"], Value::Integer(1));

    let result = db
        .execute("SELECT id FROM users ORDER BY id LIMIT 2 OFFSET 3")
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0]["id"], Value::Integer(4));

    let result = db.execute("SELECT id FROM users LIMIT 0").unwrap();
    assert!(result.rows.is_empty());
}

#[test]
fn distinct_deduplicates_projected_tuples() {
    let (_dir, db) = open_db();
    setup_users(&db);

    let result = db.execute("SELECT DISTINCT age FROM users ORDER BY age").unwrap();
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[0]["age"], Value::Integer(25));
}

#[test]
fn aggregate_functions() {
    let (_dir, db) = open_db();
    setup_users(&db);

    let one = |sql: &str, col: &str| db.execute(sql).unwrap().rows[0][col].clone();
    assert_eq!(one("SELECT COUNT(*) FROM users", "COUNT(*)"), Value::Integer(4));
    assert_eq!(one("SELECT COUNT(age) AS n FROM users", "n"), Value::Integer(4));
    assert_eq!(one("SELECT SUM(age) AS s FROM users", "s"), Value::Integer(115));
    assert_eq!(one("SELECT AVG(age) AS a FROM users", "a"), Value::Float(28.75));
    assert_eq!(one("SELECT MIN(age) AS m FROM users", "m"), Value::Integer(25));
    assert_eq!(one("SELECT MAX(age) AS m FROM users", "m"), Value::Integer(35));
    assert_eq!(
        one("SELECT COUNT(DISTINCT age) AS d FROM users", "d"),
        Value::Integer(3)
    );
}

#[test]
fn aggregates_over_empty_input() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (x INTEGER)").unwrap();

    let one = |sql: &str, col: &str| db.execute(sql).unwrap().rows[0][col].clone();
    assert_eq!(one("SELECT COUNT(*) AS c FROM t", "c"), Value::Integer(0));
    assert_eq!(one("SELECT SUM(x) AS s FROM t", "s"), Value::Integer(0));
    assert_eq!(one("SELECT AVG(x) AS a FROM t", "a"), Value::Null);
    assert_eq!(one("SELECT MIN(x) AS m FROM t", "m"), Value::Null);
    assert_eq!(one("SELECT MAX(x) AS m FROM t", "m"), Value::Null);
}

#[test]
fn count_ignores_nulls_and_group_by_groups_them() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (dept VARCHAR(10), x INTEGER)").unwrap();
    db.execute("INSERT INTO t VALUES ('a', 1), ('a', NULL), (NULL, 3), (NULL, NULL)")
        .unwrap();

    let result = db.execute("SELECT COUNT(x) AS n FROM t").unwrap();
    assert_eq!(result.rows[0]["n"], Value::Integer(2));

    // GROUP BY treats NULL keys as equal to each other.
    let result = db
        .execute("SELECT dept, COUNT(*) AS n FROM t GROUP BY dept")
        .unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[test]
fn having_filters_groups() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE sales (product VARCHAR(20), quantity INTEGER)")
        .unwrap();
    db.execute("INSERT INTO sales VALUES ('a', 10), ('a', 5), ('b', 1)")
        .unwrap();

    let result = db
        .execute(
            "SELECT product, SUM(quantity) AS total FROM sales \
             GROUP BY product HAVING total > 5",
        )
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0]["product"], Value::Varchar("a".into()));
}

#[test]
fn inner_right_and_cross_joins() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE l (id INTEGER PRIMARY KEY, r_id INTEGER)").unwrap();
    db.execute("CREATE TABLE r (id INTEGER PRIMARY KEY, tag VARCHAR(10))").unwrap();
    db.execute("INSERT INTO l VALUES (1, 10), (2, 20), (3, NULL)").unwrap();
    db.execute("INSERT INTO r VALUES (10, 'x'), (20, 'y'), (30, 'z')").unwrap();

    let result = db
        .execute("SELECT l.id, tag FROM l JOIN r ON l.r_id = r.id")
        .unwrap();
    assert_eq!(result.rows.len(), 2);

    let result = db
        .execute("SELECT l.id, tag FROM l RIGHT JOIN r ON l.r_id = r.id ORDER BY r.id")
        .unwrap();
    // Two matches plus the unmatched right row with NULL left columns.
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[2]["tag"], Value::Varchar("z".into()));
    assert_eq!(result.rows[2]["id"], Value::Null);

    let result = db.execute("SELECT * FROM l CROSS JOIN r").unwrap();
    assert_eq!(result.rows.len(), 9);
}

#[test]
fn right_join_with_empty_left_yields_nothing() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE l (id INTEGER)").unwrap();
    db.execute("CREATE TABLE r (id INTEGER)").unwrap();
    db.execute("INSERT INTO r VALUES (1), (2)").unwrap();

    let result = db
        .execute("SELECT * FROM l RIGHT JOIN r ON l.id = r.id")
        .unwrap();
    assert!(result.rows.is_empty());
}

// ===================================================================
// DML and constraints
// ===================================================================

#[test]
fn insert_count_mismatch_is_an_error() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (a INTEGER, b INTEGER)").unwrap();

    let err = db.execute("INSERT INTO t (a) VALUES (1, 2)").unwrap_err();
    assert!(matches!(err, EngineError::Execution(_)));
    let err = db.execute("INSERT INTO t VALUES (1)").unwrap_err();
    assert!(matches!(err, EngineError::Execution(_)));
}

#[test]
fn insert_fills_defaults_and_rejects_missing_not_null() {
    let (_dir, db) = open_db();
    setup_users(&db);

    db.execute("INSERT INTO users (id, name) VALUES (5, 'Eve')").unwrap();
    let result = db.execute("SELECT active FROM users WHERE id = 5").unwrap();
    assert_eq!(result.rows[0]["active"], Value::Boolean(true));

    let err = db.execute("INSERT INTO users (id, age) VALUES (6, 40)").unwrap_err();
    assert!(matches!(err, EngineError::NotNull(column) if column == "name"));
}

#[test]
fn type_validation_and_varchar_limit() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (n INTEGER, s VARCHAR(3))").unwrap();

    // Numeric strings coerce; junk does not.
    db.execute("INSERT INTO t VALUES ('42', 'ok')").unwrap();
    let err = db.execute("INSERT INTO t VALUES ('abc', 'ok')").unwrap_err();
    assert!(matches!(err, EngineError::Type(_)));

    let err = db.execute("INSERT INTO t VALUES (1, 'toolong')").unwrap_err();
    assert!(matches!(err, EngineError::Type(_)));
}

#[test]
fn date_and_timestamp_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let day = chrono::NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
    {
        let db = Database::open(dir.path()).unwrap();
        db.execute("CREATE TABLE events (day DATE, at TIMESTAMP)").unwrap();
        db.execute("INSERT INTO events VALUES ('2024-05-17', '2024-05-17 10:30:00')")
            .unwrap();
        db.execute("INSERT INTO events VALUES ('2024-06-01', '2024-06-01T08:00:00')")
            .unwrap();

        let result = db.execute("SELECT * FROM events ORDER BY day").unwrap();
        assert_eq!(result.rows[0]["day"], Value::Date(day));
        assert_eq!(
            result.rows[0]["at"],
            Value::Timestamp(day.and_hms_opt(10, 30, 0).unwrap())
        );
        db.close();
    }

    // Values survive a reopen through the tagged JSON encoding.
    let db = Database::open(dir.path()).unwrap();
    let result = db.execute("SELECT * FROM events ORDER BY day").unwrap();
    assert_eq!(result.rows[0]["day"], Value::Date(day));
    assert_eq!(
        result.rows[1]["at"],
        Value::Timestamp(
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
        )
    );
}

#[test]
fn update_sees_the_old_row_only() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (a INTEGER, b INTEGER)").unwrap();
    db.execute("INSERT INTO t VALUES (1, 10)").unwrap();

    // Both right-hand sides read the pre-statement values.
    db.execute("UPDATE t SET a = a + 1, b = a + 100").unwrap();
    let result = db.execute("SELECT * FROM t").unwrap();
    assert_eq!(result.rows[0]["a"], Value::Integer(2));
    assert_eq!(result.rows[0]["b"], Value::Integer(101));
}

#[test]
fn update_unique_violation_is_rejected() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, email VARCHAR(50) UNIQUE)")
        .unwrap();
    db.execute("INSERT INTO t VALUES (1, 'a@x'), (2, 'b@x')").unwrap();

    let err = db
        .execute("UPDATE t SET email = 'a@x' WHERE id = 2")
        .unwrap_err();
    assert!(matches!(err, EngineError::UniqueViolation { .. }));
}

#[test]
fn delete_with_and_without_where() {
    let (_dir, db) = open_db();
    setup_users(&db);

    let result = db.execute("DELETE FROM users WHERE age = 25").unwrap();
    assert_eq!(result.affected_rows, 2);
    assert_eq!(db.count("users").unwrap(), 2);

    let result = db.execute("DELETE FROM users").unwrap();
    assert_eq!(result.affected_rows, 2);
    assert_eq!(db.count("users").unwrap(), 0);
}

// ===================================================================
// DDL, catalog, and indexes
// ===================================================================

#[test]
fn create_table_conflicts_and_if_not_exists() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (id INTEGER)").unwrap();

    let err = db.execute("CREATE TABLE t (id INTEGER)").unwrap_err();
    assert!(matches!(err, EngineError::Schema(_)));

    let result = db.execute("CREATE TABLE IF NOT EXISTS t (id INTEGER)").unwrap();
    assert!(result.message.contains("already exists"));
}

#[test]
fn drop_table_and_if_exists() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (id INTEGER)").unwrap();
    db.execute("DROP TABLE t").unwrap();
    assert!(db.tables().is_empty());

    let err = db.execute("DROP TABLE t").unwrap_err();
    assert!(matches!(err, EngineError::Schema(_)));
    db.execute("DROP TABLE IF EXISTS t").unwrap();
}

#[test]
fn show_tables_and_describe() {
    let (_dir, db) = open_db();
    setup_users(&db);

    let result = db.execute("SHOW TABLES").unwrap();
    assert_eq!(result.columns, vec!["table_name"]);
    assert_eq!(result.rows[0]["table_name"], Value::Text("users".into()));

    let result = db.execute("DESCRIBE users").unwrap();
    assert_eq!(
        result.columns,
        vec!["column_name", "data_type", "nullable", "key", "default"]
    );
    assert_eq!(result.rows[0]["key"], Value::Text("PRI".into()));
    assert_eq!(result.rows[1]["nullable"], Value::Text("NO".into()));
    assert_eq!(result.rows[3]["default"], Value::Boolean(true));
}

#[test]
fn primary_key_and_unique_columns_get_indexes() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, email VARCHAR(50) UNIQUE)")
        .unwrap();

    let infos = db.indexes("t");
    let names: Vec<&str> = infos.iter().map(|info| info.name.as_str()).collect();
    assert!(names.contains(&"pk_t_id"));
    assert!(names.contains(&"unique_t_email"));
    assert!(infos.iter().all(|info| info.unique));
}

#[test]
fn create_index_populates_from_existing_rows() {
    let (_dir, db) = open_db();
    setup_users(&db);
    db.execute("CREATE INDEX idx_users_age ON users (age)").unwrap();

    let infos = db.indexes("users");
    assert!(infos.iter().any(|info| info.name == "idx_users_age" && !info.unique));

    db.execute("DROP INDEX idx_users_age ON users").unwrap();
    assert!(!db.indexes("users").iter().any(|info| info.name == "idx_users_age"));
}

#[test]
fn unique_index_rejects_duplicates_on_populate() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (x INTEGER)").unwrap();
    db.execute("INSERT INTO t VALUES (1), (1)").unwrap();

    let err = db
        .execute("CREATE UNIQUE INDEX idx_t_x ON t (x)")
        .unwrap_err();
    assert!(matches!(err, EngineError::UniqueIndex { .. }));
}

#[test]
fn truncate_resets_rows_and_rebuilds_indexes() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, email VARCHAR(50) UNIQUE)")
        .unwrap();
    db.execute("INSERT INTO t VALUES (1, 'a@x')").unwrap();

    db.execute("TRUNCATE TABLE t").unwrap();
    assert_eq!(db.count("t").unwrap(), 0);

    // Indexes are rebuilt empty with their uniqueness intact.
    db.execute("INSERT INTO t VALUES (1, 'a@x')").unwrap();
    let err = db.execute("INSERT INTO t VALUES (2, 'a@x')").unwrap_err();
    assert!(matches!(err, EngineError::UniqueViolation { .. }));
}

// ===================================================================
// Index/row synchronization
// ===================================================================

#[test]
fn indexes_track_every_mutation() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(dir.path()).unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, age INTEGER)").unwrap();
        db.execute("CREATE INDEX idx_t_age ON t (age)").unwrap();
        db.execute("INSERT INTO t VALUES (1, 30), (2, 30), (3, 40), (4, NULL)")
            .unwrap();
        db.execute("UPDATE t SET age = 31 WHERE id = 2").unwrap();
        db.execute("DELETE FROM t WHERE id = 3").unwrap();
        db.close();
    }

    // The multiset of (value, row_id) pairs in the index equals the
    // non-NULL column values in storage.
    let storage = StorageEngine::open(dir.path()).unwrap();
    let indexes = IndexManager::open(dir.path()).unwrap();
    let index = indexes.index("t", "age").unwrap();

    let mut from_rows: Vec<(String, u64)> = storage
        .table("t")
        .unwrap()
        .scan()
        .filter_map(|(row_id, row)| {
            let age = &row["age"];
            (!age.is_null()).then(|| (age.canonical_key(), row_id))
        })
        .collect();
    let mut from_index: Vec<(String, u64)> = index
        .range_search(None, None, true, true)
        .into_iter()
        .map(|(key, row_id)| (key.canonical_key(), row_id))
        .collect();
    from_rows.sort();
    from_index.sort();
    assert_eq!(from_rows, from_index);
}

// ===================================================================
// Façade
// ===================================================================

#[test]
fn execute_many_splits_on_semicolons() {
    let (_dir, db) = open_db();
    let results = db
        .execute_many(
            "CREATE TABLE t (x INTEGER); \
             INSERT INTO t VALUES (1); \
             INSERT INTO t VALUES (2); \
             SELECT COUNT(*) AS n FROM t;",
        )
        .unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[3].rows[0]["n"], Value::Integer(2));
}

#[test]
fn describe_and_count_errors_on_missing_table() {
    let (_dir, db) = open_db();
    assert!(db.describe("nope").is_err());
    assert!(db.count("nope").is_err());
    assert!(matches!(
        db.execute("SELECT * FROM nope").unwrap_err(),
        EngineError::Schema(_)
    ));
}

#[test]
fn parse_errors_carry_position() {
    let (_dir, db) = open_db();
    let err = db.execute("SELECT FROM t").unwrap_err();
    let EngineError::Parse(parse) = err else {
        panic!("expected parse error");
    };
    assert_eq!(parse.line, 1);
    assert_eq!(parse.column, 8);
}

#[test]
fn identifiers_are_case_insensitive() {
    let (_dir, db) = open_db();
    db.execute("CREATE TABLE Users (Id INTEGER PRIMARY KEY, Name VARCHAR(50))")
        .unwrap();
    db.execute("insert into USERS values (1, 'Alice')").unwrap();

    let result = db.execute("select NAME from users where ID = 1").unwrap();
    assert_eq!(result.rows.len(), 1);
    // Canonical (declared) casing is preserved in the stored schema.
    assert_eq!(db.describe("users").unwrap().columns[1].name, "Name");
}
