//! Statement-level parser tests: each statement kind parses, and the
//! rendered form re-parses to the same normalized text.

use shale_core::ast::Statement;
use shale_core::parser::parse;

/// Parses, renders, re-parses, and re-renders; both renderings must agree.
fn round_trip(sql: &str) -> Statement {
    let first = parse(sql).unwrap_or_else(|e| panic!("parse failed for {sql:?}: {e}"));
    let rendered = first.to_string();
    let second =
        parse(&rendered).unwrap_or_else(|e| panic!("re-parse failed for {rendered:?}: {e}"));
    assert_eq!(rendered, second.to_string(), "unstable rendering for {sql:?}");
    first
}

#[test]
fn select_round_trips() {
    round_trip("SELECT * FROM users");
    round_trip("SELECT id, name FROM users WHERE active = TRUE");
    round_trip("SELECT DISTINCT dept FROM employees");
    round_trip("SELECT name AS n, age FROM users u ORDER BY age DESC, name ASC");
    round_trip("SELECT dept, COUNT(*) FROM emp GROUP BY dept HAVING COUNT(*) > 2");
    round_trip("SELECT SUM(DISTINCT price) FROM products");
    round_trip("SELECT * FROM t WHERE a IS NULL OR b IS NOT NULL");
    round_trip("SELECT * FROM t WHERE x IN (1, 2, 3) AND name LIKE 'A%'");
    round_trip("SELECT * FROM t LIMIT 10 OFFSET 5");
    round_trip("SELECT 1 + 2 * 3 - 4 / 2");
    round_trip("SELECT -5 AS neg, NOT TRUE AS flag");
}

#[test]
fn join_round_trips() {
    round_trip("SELECT * FROM a INNER JOIN b ON a.id = b.id");
    round_trip("SELECT * FROM a LEFT JOIN b ON a.id = b.id RIGHT JOIN c ON b.id = c.id");
    round_trip("SELECT * FROM a CROSS JOIN b");
    round_trip("SELECT e.name, d.name FROM employees e LEFT JOIN departments d ON e.dept_id = d.id");
}

#[test]
fn dml_round_trips() {
    round_trip("INSERT INTO t VALUES (1, 'x', 2.5, TRUE, NULL)");
    round_trip("INSERT INTO t (a, b) VALUES (1, 2), (3, 4)");
    round_trip("UPDATE t SET a = a + 1, b = 'x' WHERE id = 3");
    round_trip("DELETE FROM t WHERE id = 3");
    round_trip("DELETE FROM t");
}

#[test]
fn ddl_round_trips() {
    round_trip(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(255) UNIQUE, \
         name VARCHAR(100) NOT NULL, active BOOLEAN DEFAULT TRUE, bio TEXT)",
    );
    round_trip("CREATE TABLE IF NOT EXISTS t (id INTEGER)");
    round_trip("DROP TABLE t");
    round_trip("DROP TABLE IF EXISTS t");
    round_trip("CREATE INDEX idx_users_age ON users (age)");
    round_trip("CREATE UNIQUE INDEX idx_users_email ON users (email)");
    round_trip("DROP INDEX idx_users_age ON users");
    round_trip("SHOW TABLES");
    round_trip("DESCRIBE users");
    round_trip("TRUNCATE TABLE users");
}

#[test]
fn between_renders_as_its_rewrite() {
    let statement = round_trip("SELECT * FROM t WHERE x BETWEEN 1 AND 5");
    assert_eq!(
        statement.to_string(),
        "SELECT * FROM t WHERE x >= 1 AND x <= 5"
    );
}

#[test]
fn comments_and_case_are_normalized() {
    let statement = round_trip(
        "select /* all columns */ * from users -- trailing comment\nwhere ID = 1;",
    );
    assert_eq!(statement.to_string(), "SELECT * FROM users WHERE ID = 1");
}
