use anyhow::Context;
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::schedule::{ClockTime, Event, Weekday};

pub const DB_FILE: &str = "timetable.sqlite3";
const REVISION_KEY: &str = "schedule.revision";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS branches(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    // Older workspaces predate the explicit branch/cluster flag.
    ensure_branches_is_branch(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_events(
            id TEXT PRIMARY KEY,
            day TEXT NOT NULL,
            day_index INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            subject TEXT NOT NULL,
            branch_id TEXT NOT NULL DEFAULT '',
            direction TEXT NOT NULL DEFAULT '',
            teacher_names TEXT NOT NULL DEFAULT '[]',
            student_names TEXT NOT NULL DEFAULT '[]',
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_events_day ON schedule_events(day_index, start_time, sort_order)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_events_branch ON schedule_events(branch_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_branches_is_branch(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "branches", "is_branch")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE branches ADD COLUMN is_branch INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
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

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("setting {} is not valid JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Number of schedule mutations applied to this workspace so far.
pub fn schedule_revision(conn: &Connection) -> anyhow::Result<i64> {
    Ok(settings_get_json(conn, REVISION_KEY)?
        .and_then(|v| v.as_i64())
        .unwrap_or(0))
}

pub fn bump_schedule_revision(conn: &Connection) -> anyhow::Result<i64> {
    let next = schedule_revision(conn)? + 1;
    settings_set_json(conn, REVISION_KEY, &serde_json::json!(next))?;
    Ok(next)
}

pub fn next_event_sort_order(conn: &Connection) -> anyhow::Result<i64> {
    let max: Option<i64> =
        conn.query_row("SELECT MAX(sort_order) FROM schedule_events", [], |r| r.get(0))?;
    Ok(max.map(|m| m + 1).unwrap_or(0))
}

pub fn insert_event(conn: &Connection, ev: &Event, sort_order: i64) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO schedule_events(
            id, day, day_index, start_time, end_time, subject, branch_id, direction,
            teacher_names, student_names, sort_order
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            ev.id,
            ev.day.name(),
            ev.day.index() as i64,
            ev.start_time.to_string(),
            ev.end_time.to_string(),
            ev.subject,
            ev.branch_id,
            ev.direction,
            serde_json::to_string(&ev.teacher_names)?,
            serde_json::to_string(&ev.student_names)?,
            sort_order,
        ],
    )?;
    Ok(())
}

/// Rewrites every column except `id` and `sort_order`.
pub fn update_event(conn: &Connection, ev: &Event) -> anyhow::Result<bool> {
    let n = conn.execute(
        "UPDATE schedule_events
         SET day = ?, day_index = ?, start_time = ?, end_time = ?, subject = ?,
             branch_id = ?, direction = ?, teacher_names = ?, student_names = ?
         WHERE id = ?",
        rusqlite::params![
            ev.day.name(),
            ev.day.index() as i64,
            ev.start_time.to_string(),
            ev.end_time.to_string(),
            ev.subject,
            ev.branch_id,
            ev.direction,
            serde_json::to_string(&ev.teacher_names)?,
            serde_json::to_string(&ev.student_names)?,
            ev.id,
        ],
    )?;
    Ok(n > 0)
}

pub fn get_event(conn: &Connection, event_id: &str) -> anyhow::Result<Option<Event>> {
    let mut events = query_events(
        conn,
        "SELECT id, day, start_time, end_time, subject, branch_id, direction,
                teacher_names, student_names
         FROM schedule_events WHERE id = ?",
        vec![Value::from(event_id.to_string())],
    )?;
    Ok(events.pop())
}

/// Stored events ordered by day, start time, then insertion order.
pub fn list_events(
    conn: &Connection,
    day: Option<Weekday>,
    branch_id: Option<&str>,
) -> anyhow::Result<Vec<Event>> {
    let mut sql = String::from(
        "SELECT id, day, start_time, end_time, subject, branch_id, direction,
                teacher_names, student_names
         FROM schedule_events WHERE 1 = 1",
    );
    let mut binds: Vec<Value> = Vec::new();
    if let Some(d) = day {
        sql.push_str(" AND day_index = ?");
        binds.push(Value::from(d.index() as i64));
    }
    if let Some(b) = branch_id {
        sql.push_str(" AND branch_id = ?");
        binds.push(Value::from(b.to_string()));
    }
    sql.push_str(" ORDER BY day_index, start_time, sort_order");
    query_events(conn, &sql, binds)
}

fn query_events(conn: &Connection, sql: &str, binds: Vec<Value>) -> anyhow::Result<Vec<Event>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
                r.get::<_, String>(7)?,
                r.get::<_, String>(8)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, day, start, end, subject, branch_id, direction, teachers, students) in rows {
        let day = Weekday::from_name(&day)
            .with_context(|| format!("event {} has unknown stored day {}", id, day))?;
        out.push(Event {
            day,
            start_time: ClockTime::parse(&start)?,
            end_time: ClockTime::parse(&end)?,
            subject,
            branch_id,
            direction,
            teacher_names: serde_json::from_str(&teachers)
                .with_context(|| format!("event {} teacher_names", id))?,
            student_names: serde_json::from_str(&students)
                .with_context(|| format!("event {} student_names", id))?,
            id,
        });
    }
    Ok(out)
}

/// branch id -> display name, for every stored branch.
pub fn branch_names(conn: &Connection) -> anyhow::Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT id, name FROM branches")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_workspace(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("timetabled-db-{}-{}", tag, uuid::Uuid::new_v4()))
    }

    fn ev(id: &str, day: Weekday, start: &str, end: &str) -> Event {
        Event {
            id: id.to_string(),
            day,
            start_time: ClockTime::parse(start).expect("start"),
            end_time: ClockTime::parse(end).expect("end"),
            subject: "Math".to_string(),
            branch_id: "b1".to_string(),
            direction: String::new(),
            teacher_names: vec!["Karimov".to_string()],
            student_names: vec![],
        }
    }

    #[test]
    fn open_is_idempotent_and_migrates_branches() {
        let ws = temp_workspace("open");
        let conn = open_db(&ws).expect("open");
        assert!(table_has_column(&conn, "branches", "is_branch").expect("pragma"));
        drop(conn);
        let conn = open_db(&ws).expect("reopen");
        assert!(table_has_column(&conn, "schedule_events", "sort_order").expect("pragma"));
    }

    #[test]
    fn events_round_trip_in_day_then_time_order() {
        let ws = temp_workspace("events");
        let conn = open_db(&ws).expect("open");
        insert_event(&conn, &ev("c", Weekday::Tuesday, "08:00", "09:00"), 0).expect("insert");
        insert_event(&conn, &ev("b", Weekday::Monday, "10:00", "11:00"), 1).expect("insert");
        insert_event(&conn, &ev("a", Weekday::Monday, "09:00", "10:00"), 2).expect("insert");

        let all = list_events(&conn, None, None).expect("list");
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(all[0].teacher_names, vec!["Karimov"]);

        let tuesday = list_events(&conn, Some(Weekday::Tuesday), Some("b1")).expect("list");
        assert_eq!(tuesday.len(), 1);
        assert_eq!(next_event_sort_order(&conn).expect("sort"), 3);
    }

    #[test]
    fn revision_counts_up_from_zero() {
        let ws = temp_workspace("rev");
        let conn = open_db(&ws).expect("open");
        assert_eq!(schedule_revision(&conn).expect("rev"), 0);
        assert_eq!(bump_schedule_revision(&conn).expect("bump"), 1);
        assert_eq!(bump_schedule_revision(&conn).expect("bump"), 2);
        assert_eq!(schedule_revision(&conn).expect("rev"), 2);
    }
}
