use crate::conflict::{check_candidate, Candidate, Conflict};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Day, ScheduleEntry};
use crate::store::{self, EntryFilters, Scope};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn entry_json(e: &ScheduleEntry) -> serde_json::Value {
    json!({
        "id": e.id,
        "schoolId": e.school_id,
        "academicYearId": e.academic_year_id,
        "academicTermId": e.academic_term_id,
        "classId": e.class_id,
        "subjectId": e.subject_id,
        "teacherId": e.teacher_id,
        "day": e.day,
        "periodId": e.period_id,
        "room": e.room,
        "updatedAt": e.updated_at,
    })
}

struct EntryFields {
    school_id: String,
    academic_year_id: String,
    academic_term_id: String,
    class_id: String,
    subject_id: String,
    teacher_id: String,
    day: Day,
    period_id: String,
    room: String,
}

fn parse_entry_fields(req: &Request) -> Result<EntryFields, serde_json::Value> {
    let school_id = required_str(req, "schoolId")?;
    let academic_year_id = required_str(req, "academicYearId")?;
    let academic_term_id = required_str(req, "academicTermId")?;
    let class_id = required_str(req, "classId")?;
    let subject_id = required_str(req, "subjectId")?;
    let teacher_id = required_str(req, "teacherId")?;
    let period_id = required_str(req, "periodId")?;
    let room = required_str(req, "room")?;

    let day_raw = required_str(req, "day")?;
    let Some(day) = Day::parse(&day_raw) else {
        return Err(err(
            &req.id,
            "bad_params",
            "day must be one of monday..friday",
            None,
        ));
    };

    Ok(EntryFields {
        school_id,
        academic_year_id,
        academic_term_id,
        class_id,
        subject_id,
        teacher_id,
        day,
        period_id,
        room,
    })
}

/// Maps a checker verdict onto the wire error contract.
fn conflict_err(req: &Request, conflict: Conflict) -> serde_json::Value {
    match conflict {
        Conflict::ClassBusy { other_entry_id } => err(
            &req.id,
            "SCHEDULE_CONFLICT",
            "This time slot is already taken for this class",
            Some(json!({ "conflictingEntryId": other_entry_id })),
        ),
        Conflict::TeacherBusy { other_entry_id } => err(
            &req.id,
            "TEACHER_CONFLICT",
            "The selected teacher is already scheduled for this period",
            Some(json!({ "conflictingEntryId": other_entry_id })),
        ),
        Conflict::UnknownPeriod => err(&req.id, "bad_params", "unknown periodId", None),
        Conflict::NotTeachingPeriod => err(
            &req.id,
            "INVALID_PERIOD_TYPE",
            "breaks cannot be scheduled",
            None,
        ),
    }
}

fn handle_schedule_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let academic_year_id = match required_str(req, "academicYearId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let academic_term_id = match required_str(req, "academicTermId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = optional_str(req, "classId");
    let teacher_id = optional_str(req, "teacherId");

    let entries = match store::find_entries(
        conn,
        Scope {
            school_id: &school_id,
            academic_year_id: &academic_year_id,
            academic_term_id: &academic_term_id,
        },
        EntryFilters {
            class_id: class_id.as_deref(),
            teacher_id: teacher_id.as_deref(),
        },
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({ "entries": entries.iter().map(entry_json).collect::<Vec<_>>() }),
    )
}

fn handle_schedule_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let fields = match parse_entry_fields(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    // The conflict check and the insert must act on the same snapshot, so
    // both run inside one transaction; two concurrent creates cannot both
    // pass against stale state.
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let existing = match store::find_entries(
        &tx,
        Scope {
            school_id: &fields.school_id,
            academic_year_id: &fields.academic_year_id,
            academic_term_id: &fields.academic_term_id,
        },
        EntryFilters::default(),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let periods = match store::list_periods(&tx, &fields.school_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let candidate = Candidate {
        entry_id: None,
        school_id: &fields.school_id,
        academic_year_id: &fields.academic_year_id,
        academic_term_id: &fields.academic_term_id,
        class_id: &fields.class_id,
        teacher_id: &fields.teacher_id,
        day: fields.day.token(),
        period_id: &fields.period_id,
    };
    if let Err(conflict) = check_candidate(&candidate, &existing, &periods) {
        return conflict_err(req, conflict);
    }

    let entry = ScheduleEntry {
        id: Uuid::new_v4().to_string(),
        school_id: fields.school_id,
        academic_year_id: fields.academic_year_id,
        academic_term_id: fields.academic_term_id,
        class_id: fields.class_id,
        subject_id: fields.subject_id,
        teacher_id: fields.teacher_id,
        day: fields.day.token().to_string(),
        period_id: fields.period_id,
        room: fields.room,
        updated_at: Some(now_iso()),
    };

    if let Err(e) = store::insert_entry(&tx, &entry) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "schedule_entries" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, entry_json(&entry))
}

fn handle_schedule_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let entry_id = match required_str(req, "entryId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let fields = match parse_entry_fields(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    match store::get_entry(&tx, &entry_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "schedule entry not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let existing = match store::find_entries(
        &tx,
        Scope {
            school_id: &fields.school_id,
            academic_year_id: &fields.academic_year_id,
            academic_term_id: &fields.academic_term_id,
        },
        EntryFilters::default(),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let periods = match store::list_periods(&tx, &fields.school_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // The row being edited is excluded from comparison so an unchanged
    // re-save (or a room-only edit) never conflicts with itself.
    let candidate = Candidate {
        entry_id: Some(&entry_id),
        school_id: &fields.school_id,
        academic_year_id: &fields.academic_year_id,
        academic_term_id: &fields.academic_term_id,
        class_id: &fields.class_id,
        teacher_id: &fields.teacher_id,
        day: fields.day.token(),
        period_id: &fields.period_id,
    };
    if let Err(conflict) = check_candidate(&candidate, &existing, &periods) {
        return conflict_err(req, conflict);
    }

    let entry = ScheduleEntry {
        id: entry_id,
        school_id: fields.school_id,
        academic_year_id: fields.academic_year_id,
        academic_term_id: fields.academic_term_id,
        class_id: fields.class_id,
        subject_id: fields.subject_id,
        teacher_id: fields.teacher_id,
        day: fields.day.token().to_string(),
        period_id: fields.period_id,
        room: fields.room,
        updated_at: Some(now_iso()),
    };

    if let Err(e) = store::update_entry(&tx, &entry) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "schedule_entries" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, entry_json(&entry))
}

fn handle_schedule_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let entry_id = match required_str(req, "entryId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Removing an entry can never create a double-booking; no check needed.
    match store::delete_entry(conn, &entry_id) {
        Ok(0) => err(&req.id, "not_found", "schedule entry not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "schedule_entries" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.list" => Some(handle_schedule_list(state, req)),
        "schedule.create" => Some(handle_schedule_create(state, req)),
        "schedule.update" => Some(handle_schedule_update(state, req)),
        "schedule.delete" => Some(handle_schedule_delete(state, req)),
        _ => None,
    }
}
