use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("timetable.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS periods(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            label TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'class',
            order_index INTEGER NOT NULL,
            updated_at TEXT,
            UNIQUE(school_id, order_index)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_periods_school ON periods(school_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_periods_school_order ON periods(school_id, order_index)",
        [],
    )?;

    // Class/subject/teacher/year/term ids are owned by the host application;
    // they are stored opaque here, so only period_id carries a foreign key.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_entries(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            academic_year_id TEXT NOT NULL,
            academic_term_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            day TEXT NOT NULL,
            period_id TEXT NOT NULL,
            room TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(period_id) REFERENCES periods(id),
            UNIQUE(class_id, day, period_id, academic_year_id, academic_term_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_scope
         ON schedule_entries(school_id, academic_year_id, academic_term_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_class ON schedule_entries(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_teacher ON schedule_entries(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_period ON schedule_entries(period_id)",
        [],
    )?;

    // Existing workspaces may predate the split start/end columns.
    ensure_periods_time_range(&conn)?;

    Ok(conn)
}

/// Early workspaces stored a period's range as one combined column
/// `time` ("HH:MM - HH:MM"). Split it into start_time/end_time if needed.
fn ensure_periods_time_range(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "periods", "time")? {
        return Ok(());
    }
    if !table_has_column(conn, "periods", "start_time")? {
        conn.execute(
            "ALTER TABLE periods ADD COLUMN start_time TEXT NOT NULL DEFAULT ''",
            [],
        )?;
        conn.execute(
            "ALTER TABLE periods ADD COLUMN end_time TEXT NOT NULL DEFAULT ''",
            [],
        )?;
    }

    let mut stmt =
        conn.prepare("SELECT id, time FROM periods WHERE start_time = '' AND time IS NOT NULL")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (id, combined) in rows {
        let (start, end) = match combined.split_once(" - ") {
            Some((s, e)) => (s.trim().to_string(), e.trim().to_string()),
            None => (combined.trim().to_string(), String::new()),
        };
        conn.execute(
            "UPDATE periods SET start_time = ?, end_time = ? WHERE id = ?",
            (&start, &end, &id),
        )?;
    }

    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
