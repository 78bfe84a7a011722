use crate::ipc::error::{err, ok};
use crate::ipc::helpers::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::settings::LayoutSettings;
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

fn settings_get(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let settings =
        LayoutSettings::load(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    serde_json::to_value(&settings).map_err(|e| HandlerErr::db("internal_error", e))
}

fn settings_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let patch = params
        .get("patch")
        .ok_or_else(|| HandlerErr::new("bad_params", "missing patch"))?;
    let current =
        LayoutSettings::load(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let next = current.patched(patch)?;
    next.save(conn).map_err(|e| {
        HandlerErr::db("db_update_failed", e).with_details(json!({ "table": "settings" }))
    })?;
    info!(
        pixels_per_minute = next.pixels_per_minute,
        palette = next.palette.len(),
        day_labels = next.day_labels.len(),
        "layout settings updated"
    );
    serde_json::to_value(&next).map_err(|e| HandlerErr::db("internal_error", e))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return match serde_json::to_value(LayoutSettings::default()) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        };
    };
    match settings_get(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match settings_update(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.settings.get" => Some(handle_settings_get(state, req)),
        "schedule.settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
