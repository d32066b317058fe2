use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE_NAME: &str = "roster.sqlite3";

/// Opens (creating if needed) the workspace database and ensures the
/// `students` schema exists.
pub fn open_db(workspace: &Path) -> Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            dob TEXT NOT NULL,
            class_name TEXT NOT NULL,
            score INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_name ON students(class_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_score ON students(score)",
        [],
    )?;

    Ok(conn)
}

/// True when a record with this natural key is already stored.
pub fn student_exists(conn: &Connection, student_id: i64) -> Result<bool> {
    let found: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE student_id = ?1)",
        [student_id],
        |row| row.get(0),
    )?;
    Ok(found == 1)
}

pub fn student_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
    Ok(count)
}
