use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{validate_time_range, Period, PeriodKind, TimeRangeError};
use crate::store;
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

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn period_json(p: &Period) -> serde_json::Value {
    json!({
        "id": p.id,
        "schoolId": p.school_id,
        "label": p.label,
        "startTime": p.start_time,
        "endTime": p.end_time,
        "type": p.kind.token(),
        "orderIndex": p.order_index,
        "updatedAt": p.updated_at,
    })
}

struct PeriodFields {
    label: String,
    start_time: String,
    end_time: String,
    kind: PeriodKind,
    order_index: i64,
}

fn parse_period_fields(req: &Request) -> Result<PeriodFields, serde_json::Value> {
    let label = required_str(req, "label")?;
    let start_time = required_str(req, "startTime")?;
    let end_time = required_str(req, "endTime")?;

    let kind_raw = required_str(req, "type")?;
    let Some(kind) = PeriodKind::parse(&kind_raw) else {
        return Err(err(
            &req.id,
            "bad_params",
            "type must be 'class' or 'break'",
            None,
        ));
    };

    let order_index = match req.params.get("orderIndex").and_then(|v| v.as_i64()) {
        Some(v) if v >= 0 => v,
        Some(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                "orderIndex must be non-negative",
                None,
            ))
        }
        None => return Err(err(&req.id, "bad_params", "missing orderIndex", None)),
    };

    if let Err(e) = validate_time_range(&start_time, &end_time) {
        let message = match e {
            TimeRangeError::MalformedStart => "startTime must be a HH:MM time",
            TimeRangeError::MalformedEnd => "endTime must be a HH:MM time",
            TimeRangeError::EmptyRange => "startTime must be earlier than endTime",
        };
        return Err(err(&req.id, "INVALID_TIME_FORMAT", message, None));
    }

    Ok(PeriodFields {
        label,
        start_time,
        end_time,
        kind,
        order_index,
    })
}

fn handle_periods_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match store::list_periods(conn, &school_id) {
        Ok(periods) => ok(
            &req.id,
            json!({ "periods": periods.iter().map(period_json).collect::<Vec<_>>() }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_periods_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let fields = match parse_period_fields(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Check-then-insert must see a consistent snapshot of the registry.
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    match store::period_order_taken(&tx, &school_id, fields.order_index, None) {
        Ok(true) => {
            return err(
                &req.id,
                "ORDER_CONFLICT",
                "A period with this order index already exists",
                Some(json!({ "orderIndex": fields.order_index })),
            )
        }
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let period = Period {
        id: Uuid::new_v4().to_string(),
        school_id,
        label: fields.label,
        start_time: fields.start_time,
        end_time: fields.end_time,
        kind: fields.kind,
        order_index: fields.order_index,
        updated_at: Some(now_iso()),
    };

    if let Err(e) = store::insert_period(&tx, &period) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "periods" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, period_json(&period))
}

fn handle_periods_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let period_id = match required_str(req, "periodId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let fields = match parse_period_fields(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let existing = match store::get_period(&tx, &period_id) {
        Ok(Some(p)) => p,
        Ok(None) => return err(&req.id, "not_found", "period not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Exclude the period being edited so re-saving its own index passes.
    match store::period_order_taken(&tx, &existing.school_id, fields.order_index, Some(&period_id))
    {
        Ok(true) => {
            return err(
                &req.id,
                "ORDER_CONFLICT",
                "A period with this order index already exists",
                Some(json!({ "orderIndex": fields.order_index })),
            )
        }
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let period = Period {
        id: period_id,
        school_id: existing.school_id,
        label: fields.label,
        start_time: fields.start_time,
        end_time: fields.end_time,
        kind: fields.kind,
        order_index: fields.order_index,
        updated_at: Some(now_iso()),
    };

    if let Err(e) = store::update_period(&tx, &period) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "periods" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, period_json(&period))
}

fn handle_periods_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let period_id = match required_str(req, "periodId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    match store::get_period(&tx, &period_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "period not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    // Deletion is blocked, never cascaded: a period that still backs schedule
    // entries stays until those entries are moved or removed.
    match store::period_in_use(&tx, &period_id) {
        Ok(true) => {
            return err(
                &req.id,
                "PERIOD_IN_USE",
                "schedule entries still reference this period",
                Some(json!({ "periodId": period_id })),
            )
        }
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    if let Err(e) = store::delete_period(&tx, &period_id) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "periods" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "periods.list" => Some(handle_periods_list(state, req)),
        "periods.create" => Some(handle_periods_create(state, req)),
        "periods.update" => Some(handle_periods_update(state, req)),
        "periods.delete" => Some(handle_periods_delete(state, req)),
        _ => None,
    }
}
