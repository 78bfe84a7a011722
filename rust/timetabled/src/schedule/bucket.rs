use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::error::ScheduleError;
use super::model::{Event, SourceEvent, Weekday};

/// What to do with an event whose day label is not in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownDayPolicy {
    /// Drop the event and report it in `DayBuckets::dropped`.
    #[default]
    Drop,
    /// Fail the whole batch on the first unknown label.
    Reject,
}

/// Source label -> canonical weekday. Lookups ignore case and surrounding
/// whitespace.
#[derive(Debug, Clone)]
pub struct DayLabelTable {
    labels: HashMap<String, Weekday>,
}

impl Default for DayLabelTable {
    fn default() -> Self {
        let mut table = DayLabelTable {
            labels: HashMap::new(),
        };
        for day in Weekday::ALL {
            table.insert(day.name(), day);
            table.insert(&day.name()[..3], day);
        }
        table
    }
}

impl DayLabelTable {
    pub fn insert(&mut self, label: &str, day: Weekday) {
        self.labels.insert(normalize_label(label), day);
    }

    /// Built-in English labels plus the given extra entries. An extra entry
    /// never redefines a label that already resolves, so stored canonical
    /// day names always land on their own day.
    pub fn with_extra<'a, I>(extra: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Weekday)>,
    {
        let mut table = DayLabelTable::default();
        for (label, day) in extra {
            if table.resolve(label).is_none() {
                table.insert(label, *day);
            } else {
                debug!(label = %label, "ignoring extra day label that shadows a known one");
            }
        }
        table
    }

    pub fn is_builtin(label: &str) -> bool {
        DayLabelTable::default().resolve(label).is_some()
    }

    pub fn resolve(&self, label: &str) -> Option<Weekday> {
        self.labels.get(&normalize_label(label)).copied()
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedEvent {
    pub id: String,
    pub day_label: String,
}

/// One event list per canonical weekday, in input order, plus the events
/// that could not be placed.
#[derive(Debug, Clone, Default)]
pub struct DayBuckets {
    days: [Vec<Event>; 7],
    pub dropped: Vec<DroppedEvent>,
}

impl DayBuckets {
    pub fn into_days(self) -> impl Iterator<Item = (Weekday, Vec<Event>)> {
        Weekday::ALL.into_iter().zip(self.days)
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn total_events(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
impl DayBuckets {
    pub fn day(&self, day: Weekday) -> &[Event] {
        &self.days[day.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &[Event])> {
        Weekday::ALL
            .into_iter()
            .map(move |d| (d, self.days[d.index()].as_slice()))
    }
}

/// Partitions a flat event list into per-day lists. Ids that repeat within
/// one day get a numeric suffix so block ids stay unique per day.
pub fn bucket_events<I>(
    events: I,
    labels: &DayLabelTable,
    policy: UnknownDayPolicy,
) -> Result<DayBuckets, ScheduleError>
where
    I: IntoIterator<Item = SourceEvent>,
{
    let mut buckets = DayBuckets::default();
    let mut seen_ids: [HashSet<String>; 7] = Default::default();

    for source in events {
        let Some(day) = labels.resolve(&source.day_label) else {
            if policy == UnknownDayPolicy::Reject {
                return Err(ScheduleError::UnknownDay(source.day_label));
            }
            warn!(
                event_id = %source.id,
                day_label = %source.day_label,
                "dropping event with unknown day label"
            );
            buckets.dropped.push(DroppedEvent {
                id: source.id,
                day_label: source.day_label,
            });
            continue;
        };

        let mut event = source.into_event(day);
        let seen = &mut seen_ids[day.index()];
        if seen.contains(&event.id) {
            let base = event.id.clone();
            let mut n = 2usize;
            while seen.contains(&format!("{}-{}", base, n)) {
                n += 1;
            }
            event.id = format!("{}-{}", base, n);
            debug!(original = %base, renamed = %event.id, "duplicate event id within day");
        }
        seen.insert(event.id.clone());
        buckets.days[day.index()].push(event);
    }

    Ok(buckets)
}
