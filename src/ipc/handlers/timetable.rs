use crate::grid::{render_grid, GridCell, RefNames};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Day;
use crate::store::{self, EntryFilters, Scope};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

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

/// Caller-supplied `[{ id, name }]` reference arrays; anything malformed is
/// skipped rather than rejected, names are display sugar only.
fn name_map(req: &Request, key: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Some(items) = req.params.get(key).and_then(|v| v.as_array()) else {
        return map;
    };
    for item in items {
        let id = item.get("id").and_then(|v| v.as_str());
        let name = item.get("name").and_then(|v| v.as_str());
        if let (Some(id), Some(name)) = (id, name) {
            map.insert(id.to_string(), name.to_string());
        }
    }
    map
}

fn cell_json(day: Day, cell: &GridCell) -> serde_json::Value {
    match cell {
        GridCell::Break => json!({ "day": day.token(), "kind": "break" }),
        GridCell::Empty => json!({ "day": day.token(), "kind": "empty" }),
        GridCell::Lesson {
            entry_id,
            subject,
            teacher,
            class,
            room,
        } => json!({
            "day": day.token(),
            "kind": "lesson",
            "entryId": entry_id,
            "subject": subject,
            "teacher": teacher,
            "class": class,
            "room": room,
        }),
    }
}

fn handle_timetable_grid(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let periods = match store::list_periods(conn, &school_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let names = RefNames {
        subjects: name_map(req, "subjects"),
        teachers: name_map(req, "teachers"),
        classes: name_map(req, "classes"),
    };

    let rows = render_grid(&entries, &periods, &Day::ALL, &names);
    let rows_json: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            let cells: Vec<serde_json::Value> = Day::ALL
                .iter()
                .zip(row.cells.iter())
                .map(|(day, cell)| cell_json(*day, cell))
                .collect();
            json!({
                "periodId": row.period_id,
                "label": row.label,
                "startTime": row.start_time,
                "endTime": row.end_time,
                "type": row.kind.token(),
                "cells": cells,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "days": Day::ALL.iter().map(|d| d.token()).collect::<Vec<_>>(),
            "rows": rows_json,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.grid" => Some(handle_timetable_grid(state, req)),
        _ => None,
    }
}
