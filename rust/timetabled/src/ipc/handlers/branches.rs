use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn branches_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT
               b.id,
               b.name,
               b.is_branch,
               (SELECT COUNT(*) FROM schedule_events e WHERE e.branch_id = b.id) AS event_count
             FROM branches b
             ORDER BY b.name",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let branches = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let is_branch: i64 = row.get(2)?;
            let event_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "isBranch": is_branch != 0,
                "eventCount": event_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "branches": branches }))
}

fn branches_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }
    let is_branch = params
        .get("isBranch")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let branch_id = get_optional_str(params, "id").unwrap_or_else(|| Uuid::new_v4().to_string());

    conn.execute(
        "INSERT INTO branches(id, name, is_branch) VALUES(?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, is_branch = excluded.is_branch",
        (&branch_id, &name, is_branch as i64),
    )
    .map_err(|e| {
        HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "branches" }))
    })?;

    Ok(json!({ "branchId": branch_id, "name": name, "isBranch": is_branch }))
}

fn branches_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let branch_id = get_required_str(params, "branchId")?;
    let cascade = params
        .get("cascade")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM branches WHERE id = ?", [&branch_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    if exists.is_none() {
        return Err(HandlerErr::new("not_found", "branch not found"));
    }

    let event_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM schedule_events WHERE branch_id = ?",
            [&branch_id],
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    if event_count > 0 && !cascade {
        return Err(
            HandlerErr::new("bad_params", "branch still has schedule events")
                .with_details(json!({ "eventCount": event_count })),
        );
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute("DELETE FROM schedule_events WHERE branch_id = ?", [&branch_id])
        .map_err(|e| {
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "schedule_events" }))
        })?;
    tx.execute("DELETE FROM branches WHERE id = ?", [&branch_id])
        .map_err(|e| {
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "branches" }))
        })?;
    let revision = if event_count > 0 {
        db::bump_schedule_revision(&tx).map_err(|e| HandlerErr::db("db_update_failed", e))?
    } else {
        db::schedule_revision(&tx).map_err(|e| HandlerErr::db("db_query_failed", e))?
    };
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    Ok(json!({ "ok": true, "deletedEvents": event_count, "revision": revision }))
}

fn handle_branches_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "branches": [] }));
    };
    match branches_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_branches_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match branches_upsert(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_branches_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match branches_delete(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "branches.list" => Some(handle_branches_list(state, req)),
        "branches.upsert" => Some(handle_branches_upsert(state, req)),
        "branches.delete" => Some(handle_branches_delete(state, req)),
        _ => None,
    }
}
