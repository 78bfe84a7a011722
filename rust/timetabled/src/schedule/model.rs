use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::error::ScheduleError;

/// Canonical weekday set. Source labels in other spellings or languages are
/// translated into these by the day bucketer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    /// Zero-based position, Monday first.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Exact canonical name lookup; label translation lives in the bucketer.
    pub fn from_name(name: &str) -> Option<Weekday> {
        Weekday::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<ClockTime> {
        if hour < 24 && minute < 60 {
            Some(ClockTime((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    /// Parses `HH:MM` or `HH:MM:SS`. Seconds are truncated.
    pub fn parse(raw: &str) -> Result<ClockTime, ScheduleError> {
        let t = raw.trim();
        let parsed = NaiveTime::parse_from_str(t, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
            .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))?;
        ClockTime::new(parsed.hour(), parsed.minute())
            .ok_or_else(|| ScheduleError::InvalidTime(raw.to_string()))
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0) / 60
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0) % 60
    }

    pub fn minutes_since_midnight(self) -> u32 {
        u32::from(self.0)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClockTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// One scheduled class occurrence on a canonical weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub day: Weekday,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub subject: String,
    #[serde(default)]
    pub branch_id: String,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub teacher_names: Vec<String>,
    #[serde(default)]
    pub student_names: Vec<String>,
}

/// Output of the run merger. Same shape as an input event; `end_time` covers
/// the whole run and the people lists are deduplicated unions.
pub type MergedEvent = Event;

impl Event {
    /// True when `next` starts exactly where this block ends and belongs to
    /// the same subject, branch and direction.
    pub fn continues_into(&self, next: &Event) -> bool {
        next.start_time == self.end_time
            && next.subject == self.subject
            && next.branch_id == self.branch_id
            && next.direction == self.direction
    }
}

/// An event as it arrives from the backend: the weekday is still a raw
/// source label that has not been translated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEvent {
    pub day_label: String,
    pub id: String,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub subject: String,
    pub branch_id: String,
    pub direction: String,
    pub teacher_names: Vec<String>,
    pub student_names: Vec<String>,
}

impl SourceEvent {
    pub fn into_event(self, day: Weekday) -> Event {
        Event {
            id: self.id,
            day,
            start_time: self.start_time,
            end_time: self.end_time,
            subject: self.subject,
            branch_id: self.branch_id,
            direction: self.direction,
            teacher_names: self.teacher_names,
            student_names: self.student_names,
        }
    }
}

impl From<Event> for SourceEvent {
    fn from(e: Event) -> Self {
        SourceEvent {
            day_label: e.day.name().to_string(),
            id: e.id,
            start_time: e.start_time,
            end_time: e.end_time,
            subject: e.subject,
            branch_id: e.branch_id,
            direction: e.direction,
            teacher_names: e.teacher_names,
            student_names: e.student_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_time_parses_minutes_and_truncates_seconds() {
        let t = ClockTime::parse("09:05").expect("parse");
        assert_eq!((t.hour(), t.minute()), (9, 5));
        let s = ClockTime::parse(" 13:45:59 ").expect("parse with seconds");
        assert_eq!(s.to_string(), "13:45");
    }

    #[test]
    fn clock_time_rejects_garbage() {
        assert_eq!(
            ClockTime::parse("25:00"),
            Err(ScheduleError::InvalidTime("25:00".to_string()))
        );
        assert!(ClockTime::parse("nine").is_err());
        assert!(ClockTime::parse("").is_err());
    }

    #[test]
    fn weekday_serializes_as_english_name() {
        let v = serde_json::to_value(Weekday::Thursday).expect("serialize");
        assert_eq!(v, serde_json::json!("Thursday"));
        assert_eq!(Weekday::from_name("Sunday"), Some(Weekday::Sunday));
        assert_eq!(Weekday::from_name("sunday"), None);
    }

    #[test]
    fn event_defaults_missing_people_lists() {
        let e: Event = serde_json::from_value(serde_json::json!({
            "id": "a",
            "day": "Monday",
            "startTime": "09:00",
            "endTime": "10:00",
            "subject": "Math"
        }))
        .expect("deserialize");
        assert!(e.teacher_names.is_empty());
        assert!(e.student_names.is_empty());
        assert_eq!(e.end_time.to_string(), "10:00");
    }
}
