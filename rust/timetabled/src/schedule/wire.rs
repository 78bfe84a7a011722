//! Typed parsing boundary for schedule payloads coming from the backend.
//!
//! The backend has answered with several shapes over time; all of them are
//! normalized here into a flat list of [`SourceEvent`]s. Records that cannot
//! be read are rejected one by one; only an unrecognizable envelope fails the
//! whole payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::error::ScheduleError;
use super::model::{ClockTime, SourceEvent};

/// A record excluded from processing, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEvent {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_label: Option<String>,
    pub code: &'static str,
    pub message: String,
}

impl RejectedEvent {
    pub fn new(id: &str, day_label: Option<&str>, error: &ScheduleError) -> Self {
        RejectedEvent {
            id: id.to_string(),
            day_label: day_label.map(|s| s.to_string()),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPayload {
    pub events: Vec<SourceEvent>,
    pub rejected: Vec<RejectedEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Schedule { schedule: BTreeMap<String, Vec<Value>> },
    Data { data: Box<Envelope> },
    ByDay(BTreeMap<String, Vec<Value>>),
    Flat(Vec<Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersonName {
    Plain(String),
    Named { name: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    day: Option<String>,
    #[serde(default, alias = "start")]
    start_time: Option<String>,
    #[serde(default, alias = "end")]
    end_time: Option<String>,
    #[serde(default, alias = "subjectName")]
    subject: Option<String>,
    #[serde(default, alias = "branch")]
    branch_id: Option<Value>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default, alias = "teachers")]
    teacher_names: Option<Vec<PersonName>>,
    #[serde(default, alias = "students")]
    student_names: Option<Vec<PersonName>>,
}

pub fn parse_payload(payload: &Value) -> Result<ParsedPayload, ScheduleError> {
    let envelope: Envelope = serde_json::from_value(payload.clone()).map_err(|_| {
        ScheduleError::InvalidPayload(
            "expected {schedule: {day: [..]}}, {data: ..}, a day map or an event array".into(),
        )
    })?;

    let mut labeled: Vec<(Option<String>, Value)> = Vec::new();
    collect(envelope, &mut labeled);

    let mut out = ParsedPayload::default();
    for (position, (map_label, value)) in labeled.into_iter().enumerate() {
        match read_event(position, map_label.as_deref(), value) {
            Ok(ev) => out.events.push(ev),
            Err(rejected) => out.rejected.push(rejected),
        }
    }
    Ok(out)
}

fn collect(envelope: Envelope, out: &mut Vec<(Option<String>, Value)>) {
    match envelope {
        Envelope::Schedule { schedule } | Envelope::ByDay(schedule) => {
            for (label, events) in schedule {
                out.extend(events.into_iter().map(|v| (Some(label.clone()), v)));
            }
        }
        Envelope::Data { data } => collect(*data, out),
        Envelope::Flat(events) => out.extend(events.into_iter().map(|v| (None, v))),
    }
}

fn read_event(
    position: usize,
    map_label: Option<&str>,
    value: Value,
) -> Result<SourceEvent, RejectedEvent> {
    let fallback_id = format!("evt-{}", position + 1);
    let raw: RawEvent = serde_json::from_value(value).map_err(|e| {
        RejectedEvent::new(
            &fallback_id,
            map_label,
            &ScheduleError::InvalidPayload(e.to_string()),
        )
    })?;

    let id = raw.id.as_ref().and_then(scalar_to_string).unwrap_or(fallback_id);
    let day_label = raw.day.or_else(|| map_label.map(|s| s.to_string()));
    let Some(day_label) = day_label else {
        return Err(RejectedEvent::new(
            &id,
            None,
            &ScheduleError::InvalidPayload("event has no day".into()),
        ));
    };

    let start_time = parse_time(&id, &day_label, raw.start_time.as_deref())?;
    let end_time = parse_time(&id, &day_label, raw.end_time.as_deref())?;

    Ok(SourceEvent {
        id,
        day_label,
        start_time,
        end_time,
        subject: raw.subject.unwrap_or_default(),
        branch_id: raw
            .branch_id
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_default(),
        direction: raw.direction.unwrap_or_default(),
        teacher_names: names(raw.teacher_names),
        student_names: names(raw.student_names),
    })
}

fn parse_time(id: &str, day_label: &str, raw: Option<&str>) -> Result<ClockTime, RejectedEvent> {
    ClockTime::parse(raw.unwrap_or(""))
        .map_err(|e| RejectedEvent::new(id, Some(day_label), &e))
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn names(list: Option<Vec<PersonName>>) -> Vec<String> {
    list.unwrap_or_default()
        .into_iter()
        .map(|p| match p {
            PersonName::Plain(s) => s,
            PersonName::Named { name } => name,
        })
        .collect()
}
