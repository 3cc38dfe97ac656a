//! Dumb persistence layer over the workspace SQLite database. No invariant
//! enforcement happens here; the scheduling handlers run the conflict check
//! before calling any mutator.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::model::{Period, PeriodKind, ScheduleEntry};

/// The (school, academic year, academic term) triple that bounds which
/// entries are compared for conflicts.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub school_id: &'a str,
    pub academic_year_id: &'a str,
    pub academic_term_id: &'a str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilters<'a> {
    pub class_id: Option<&'a str>,
    pub teacher_id: Option<&'a str>,
}

fn period_from_row(row: &Row) -> rusqlite::Result<Period> {
    let kind_raw: String = row.get(5)?;
    Ok(Period {
        id: row.get(0)?,
        school_id: row.get(1)?,
        label: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        // Schema default is 'class'; tolerate rows written before the kind
        // column was constrained.
        kind: PeriodKind::parse(&kind_raw).unwrap_or(PeriodKind::Class),
        order_index: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const PERIOD_COLS: &str = "id, school_id, label, start_time, end_time, kind, order_index, updated_at";

pub fn list_periods(conn: &Connection, school_id: &str) -> rusqlite::Result<Vec<Period>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM periods WHERE school_id = ? ORDER BY order_index",
        PERIOD_COLS
    ))?;
    let rows = stmt.query_map([school_id], period_from_row)?.collect();
    rows
}

pub fn get_period(conn: &Connection, period_id: &str) -> rusqlite::Result<Option<Period>> {
    conn.query_row(
        &format!("SELECT {} FROM periods WHERE id = ?", PERIOD_COLS),
        [period_id],
        period_from_row,
    )
    .optional()
}

/// True when another period at the school already claims this order index.
/// `exclude_id` carries the period being edited so it does not collide with
/// itself.
pub fn period_order_taken(
    conn: &Connection,
    school_id: &str,
    order_index: i64,
    exclude_id: Option<&str>,
) -> rusqlite::Result<bool> {
    let hit: Option<i64> = match exclude_id {
        Some(id) => conn
            .query_row(
                "SELECT 1 FROM periods WHERE school_id = ? AND order_index = ? AND id != ?",
                params![school_id, order_index, id],
                |r| r.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT 1 FROM periods WHERE school_id = ? AND order_index = ?",
                params![school_id, order_index],
                |r| r.get(0),
            )
            .optional()?,
    };
    Ok(hit.is_some())
}

pub fn insert_period(conn: &Connection, period: &Period) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO periods(id, school_id, label, start_time, end_time, kind, order_index, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            period.id,
            period.school_id,
            period.label,
            period.start_time,
            period.end_time,
            period.kind.token(),
            period.order_index,
            period.updated_at,
        ],
    )?;
    Ok(())
}

pub fn update_period(conn: &Connection, period: &Period) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE periods
         SET label = ?, start_time = ?, end_time = ?, kind = ?, order_index = ?, updated_at = ?
         WHERE id = ?",
        params![
            period.label,
            period.start_time,
            period.end_time,
            period.kind.token(),
            period.order_index,
            period.updated_at,
            period.id,
        ],
    )
}

pub fn delete_period(conn: &Connection, period_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM periods WHERE id = ?", [period_id])
}

/// True while any schedule entry still references the period.
pub fn period_in_use(conn: &Connection, period_id: &str) -> rusqlite::Result<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM schedule_entries WHERE period_id = ? LIMIT 1",
            [period_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

fn entry_from_row(row: &Row) -> rusqlite::Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        id: row.get(0)?,
        school_id: row.get(1)?,
        academic_year_id: row.get(2)?,
        academic_term_id: row.get(3)?,
        class_id: row.get(4)?,
        subject_id: row.get(5)?,
        teacher_id: row.get(6)?,
        day: row.get(7)?,
        period_id: row.get(8)?,
        room: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const ENTRY_COLS: &str = "id, school_id, academic_year_id, academic_term_id, class_id, subject_id, teacher_id, day, period_id, room, updated_at";

pub fn find_entries(
    conn: &Connection,
    scope: Scope,
    filters: EntryFilters,
) -> rusqlite::Result<Vec<ScheduleEntry>> {
    let mut sql = format!(
        "SELECT {} FROM schedule_entries
         WHERE school_id = ? AND academic_year_id = ? AND academic_term_id = ?",
        ENTRY_COLS
    );
    let mut args: Vec<String> = vec![
        scope.school_id.to_string(),
        scope.academic_year_id.to_string(),
        scope.academic_term_id.to_string(),
    ];
    if let Some(class_id) = filters.class_id {
        sql.push_str(" AND class_id = ?");
        args.push(class_id.to_string());
    }
    if let Some(teacher_id) = filters.teacher_id {
        sql.push_str(" AND teacher_id = ?");
        args.push(teacher_id.to_string());
    }
    sql.push_str(" ORDER BY day, period_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), entry_from_row)?
        .collect();
    rows
}

pub fn get_entry(conn: &Connection, entry_id: &str) -> rusqlite::Result<Option<ScheduleEntry>> {
    conn.query_row(
        &format!("SELECT {} FROM schedule_entries WHERE id = ?", ENTRY_COLS),
        [entry_id],
        entry_from_row,
    )
    .optional()
}

pub fn insert_entry(conn: &Connection, entry: &ScheduleEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO schedule_entries(
            id, school_id, academic_year_id, academic_term_id,
            class_id, subject_id, teacher_id, day, period_id, room, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.id,
            entry.school_id,
            entry.academic_year_id,
            entry.academic_term_id,
            entry.class_id,
            entry.subject_id,
            entry.teacher_id,
            entry.day,
            entry.period_id,
            entry.room,
            entry.updated_at,
        ],
    )?;
    Ok(())
}

pub fn update_entry(conn: &Connection, entry: &ScheduleEntry) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE schedule_entries
         SET school_id = ?, academic_year_id = ?, academic_term_id = ?,
             class_id = ?, subject_id = ?, teacher_id = ?, day = ?, period_id = ?,
             room = ?, updated_at = ?
         WHERE id = ?",
        params![
            entry.school_id,
            entry.academic_year_id,
            entry.academic_term_id,
            entry.class_id,
            entry.subject_id,
            entry.teacher_id,
            entry.day,
            entry.period_id,
            entry.room,
            entry.updated_at,
            entry.id,
        ],
    )
}

pub fn delete_entry(conn: &Connection, entry_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM schedule_entries WHERE id = ?", [entry_id])
}
