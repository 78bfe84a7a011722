use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{
    bucket_events, layout_week, parse_payload, reject_invalid_ranges, Event, Geometry,
    LayoutContext, LayoutFilter, RejectedEvent, ScheduleError, SourceEvent, UnknownDayPolicy,
};
use crate::settings::LayoutSettings;
use rusqlite::Connection;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

fn load_settings(conn: &Connection) -> Result<LayoutSettings, HandlerErr> {
    LayoutSettings::load(conn).map_err(|e| HandlerErr::db("db_query_failed", e))
}

fn revision(conn: &Connection) -> Result<i64, HandlerErr> {
    db::schedule_revision(conn).map_err(|e| HandlerErr::db("db_query_failed", e))
}

fn to_json<T: serde::Serialize>(v: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(v).map_err(|e| HandlerErr::db("internal_error", e))
}

/// Reads exactly one event through the payload boundary and validates its
/// day and time range.
fn single_event(
    value: &serde_json::Value,
    settings: &LayoutSettings,
) -> Result<Event, HandlerErr> {
    if !value.is_object() {
        return Err(HandlerErr::new("bad_params", "event must be an object"));
    }
    let parsed = parse_payload(&json!([value]))?;
    if let Some(rejected) = parsed.rejected.into_iter().next() {
        return Err(HandlerErr::new(rejected.code, rejected.message));
    }
    let buckets = bucket_events(
        parsed.events,
        &settings.label_table(),
        UnknownDayPolicy::Reject,
    )?;
    let event = buckets
        .into_days()
        .flat_map(|(_, events)| events)
        .next()
        .ok_or_else(|| HandlerErr::new("bad_params", "event is empty"))?;
    Geometry::of(&event)?;
    Ok(event)
}

/// `base`, or `base-2`, `base-3`.. when that is already taken.
fn free_id(used: &HashSet<String>, base: &str) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    let mut n = 2usize;
    while used.contains(&format!("{}-{}", base, n)) {
        n += 1;
    }
    format!("{}-{}", base, n)
}

fn schedule_import(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let payload = params
        .get("payload")
        .ok_or_else(|| HandlerErr::new("bad_params", "missing payload"))?;
    let replace = params
        .get("replace")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let settings = load_settings(conn)?;

    let parsed = parse_payload(payload)?;
    let mut rejected = parsed.rejected;
    let valid = reject_invalid_ranges(parsed.events, &mut rejected);
    let buckets = bucket_events(
        valid,
        &settings.label_table(),
        settings.unknown_day_policy,
    )?;
    debug!(
        bucketed = buckets.total_events(),
        dropped = buckets.dropped_count(),
        "schedule payload bucketed"
    );
    let dropped = buckets.dropped.clone();

    // Stored ids are unique per workspace; the bucketer only guarantees
    // uniqueness within a day.
    let mut used: HashSet<String> = HashSet::new();
    let mut accepted: Vec<Event> = Vec::new();
    for (day, events) in buckets.into_days() {
        for mut event in events {
            if used.contains(&event.id) {
                event.id = free_id(&used, &format!("{}@{}", event.id, day.name()));
            }
            used.insert(event.id.clone());
            accepted.push(event);
        }
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    if replace {
        tx.execute("DELETE FROM schedule_events", [])
            .map_err(|e| {
                HandlerErr::db("db_delete_failed", e)
                    .with_details(json!({ "table": "schedule_events" }))
            })?;
    } else {
        for event in &accepted {
            tx.execute("DELETE FROM schedule_events WHERE id = ?", [&event.id])
                .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
        }
    }
    let mut sort_order =
        db::next_event_sort_order(&tx).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    for event in &accepted {
        db::insert_event(&tx, event, sort_order).map_err(|e| {
            HandlerErr::db("db_insert_failed", e)
                .with_details(json!({ "table": "schedule_events", "eventId": event.id }))
        })?;
        sort_order += 1;
    }
    let revision =
        db::bump_schedule_revision(&tx).map_err(|e| HandlerErr::db("db_update_failed", e))?;
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    info!(
        imported = accepted.len(),
        dropped = dropped.len(),
        rejected = rejected.len(),
        revision,
        "schedule imported"
    );
    Ok(json!({
        "imported": accepted.len(),
        "dropped": to_json(&dropped)?,
        "rejected": to_json(&rejected)?,
        "revision": revision,
    }))
}

fn schedule_events_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = load_settings(conn)?;
    let day = match get_optional_str(params, "day") {
        Some(label) => Some(
            settings
                .label_table()
                .resolve(&label)
                .ok_or(ScheduleError::UnknownDay(label))?,
        ),
        None => None,
    };
    let branch_id = get_optional_str(params, "branchId");
    let events = db::list_events(conn, day, branch_id.as_deref())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({
        "events": to_json(&events)?,
        "revision": revision(conn)?,
    }))
}

fn schedule_events_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = load_settings(conn)?;
    let mut input = params
        .get("event")
        .cloned()
        .ok_or_else(|| HandlerErr::new("bad_params", "missing event"))?;
    if let Some(obj) = input.as_object_mut() {
        if obj.get("id").map(|v| v.is_null()).unwrap_or(true) {
            obj.insert("id".into(), json!(Uuid::new_v4().to_string()));
        }
    }
    let event = single_event(&input, &settings)?;

    if db::get_event(conn, &event.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .is_some()
    {
        return Err(HandlerErr::new("bad_params", "event id already exists")
            .with_details(json!({ "eventId": event.id })));
    }
    let sort_order =
        db::next_event_sort_order(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    db::insert_event(conn, &event, sort_order).map_err(|e| {
        HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "schedule_events" }))
    })?;
    let revision =
        db::bump_schedule_revision(conn).map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(json!({ "eventId": event.id, "event": to_json(&event)?, "revision": revision }))
}

fn schedule_events_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = load_settings(conn)?;
    let event_id = get_required_str(params, "eventId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::new("bad_params", "missing patch"));
    };
    let existing = db::get_event(conn, &event_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .ok_or_else(|| HandlerErr::new("not_found", "event not found"))?;

    let mut merged = to_json(&existing)?;
    if let Some(obj) = merged.as_object_mut() {
        for (k, v) in patch {
            if k != "id" {
                obj.insert(k.clone(), v.clone());
            }
        }
    }
    let event = single_event(&merged, &settings)?;
    db::update_event(conn, &event).map_err(|e| HandlerErr::db("db_update_failed", e))?;
    let revision =
        db::bump_schedule_revision(conn).map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(json!({ "event": to_json(&event)?, "revision": revision }))
}

fn schedule_events_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let event_id = get_required_str(params, "eventId")?;
    let n = conn
        .execute("DELETE FROM schedule_events WHERE id = ?", [&event_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if n == 0 {
        return Err(HandlerErr::new("not_found", "event not found"));
    }
    let revision =
        db::bump_schedule_revision(conn).map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(json!({ "ok": true, "revision": revision }))
}

fn schedule_layout(conn: Option<&Connection>, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter: LayoutFilter = match params.get("filter") {
        Some(v) if !v.is_null() => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("invalid filter: {}", e)))?,
        _ => LayoutFilter::default(),
    };
    let settings = match conn {
        Some(c) => load_settings(c)?,
        None => LayoutSettings::default(),
    };
    let branch_names = match conn {
        Some(c) => db::branch_names(c).map_err(|e| HandlerErr::db("db_query_failed", e))?,
        None => HashMap::new(),
    };

    let (events, mut wire_rejected): (Vec<SourceEvent>, Vec<RejectedEvent>) =
        match params.get("payload") {
            Some(payload) if !payload.is_null() => {
                let parsed = parse_payload(payload)?;
                (parsed.events, parsed.rejected)
            }
            _ => {
                let Some(c) = conn else {
                    return Err(HandlerErr::new(
                        "no_workspace",
                        "select a workspace or pass payload",
                    ));
                };
                let stored = db::list_events(c, None, None)
                    .map_err(|e| HandlerErr::db("db_query_failed", e))?;
                (stored.into_iter().map(SourceEvent::from).collect(), Vec::new())
            }
        };

    let labels = settings.label_table();
    let palette = settings.palette()?;
    let ctx = LayoutContext {
        labels: &labels,
        palette: &palette,
        pixels_per_minute: settings.pixels_per_minute,
        unknown_day_policy: settings.unknown_day_policy,
        day_start_hour: settings.day_start_hour,
        day_end_hour: settings.day_end_hour,
        branch_names: &branch_names,
    };
    let mut layout = layout_week(events, &filter, &ctx)?;
    debug!(
        blocks = layout.block_count(),
        dropped = layout.dropped.len(),
        rejected = layout.rejected.len(),
        "schedule layout computed"
    );
    wire_rejected.append(&mut layout.rejected);
    layout.rejected = wire_rejected;

    let mut result = to_json(&layout)?;
    result["revision"] = match conn {
        Some(c) => json!(revision(c)?),
        None => serde_json::Value::Null,
    };
    Ok(result)
}

fn schedule_color(conn: Option<&Connection>, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject = get_required_str(params, "subject")?;
    let settings = match conn {
        Some(c) => load_settings(c)?,
        None => LayoutSettings::default(),
    };
    let palette = settings.palette()?;
    let (index, color) = palette.color_of(&subject);
    Ok(json!({ "subject": subject, "index": index, "color": color }))
}

fn handle_schedule_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match schedule_import(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_schedule_events_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "events": [], "revision": null }));
    };
    match schedule_events_list(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_schedule_events_mutation(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let result = require_db(state).and_then(|conn| f(conn, &req.params));
    match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_schedule_layout(state: &mut AppState, req: &Request) -> serde_json::Value {
    match schedule_layout(state.db.as_ref(), &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_schedule_color(state: &mut AppState, req: &Request) -> serde_json::Value {
    match schedule_color(state.db.as_ref(), &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.import" => Some(handle_schedule_import(state, req)),
        "schedule.events.list" => Some(handle_schedule_events_list(state, req)),
        "schedule.events.create" => {
            Some(handle_schedule_events_mutation(state, req, schedule_events_create))
        }
        "schedule.events.update" => {
            Some(handle_schedule_events_mutation(state, req, schedule_events_update))
        }
        "schedule.events.delete" => {
            Some(handle_schedule_events_mutation(state, req, schedule_events_delete))
        }
        "schedule.layout" => Some(handle_schedule_layout(state, req)),
        "schedule.color" => Some(handle_schedule_color(state, req)),
        _ => None,
    }
}
