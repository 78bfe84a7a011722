use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::bucket::{bucket_events, DayLabelTable, DroppedEvent, UnknownDayPolicy};
use super::color::Palette;
use super::error::ScheduleError;
use super::geometry::{Geometry, PixelBox};
use super::merge::merge_day;
use super::model::{MergedEvent, SourceEvent, Weekday};
use super::wire::RejectedEvent;

/// Everything the layout needs besides the events themselves. Passed in
/// explicitly so the pipeline stays a pure function of its arguments.
#[derive(Debug, Clone)]
pub struct LayoutContext<'a> {
    pub labels: &'a DayLabelTable,
    pub palette: &'a Palette,
    pub pixels_per_minute: f64,
    pub unknown_day_policy: UnknownDayPolicy,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub branch_names: &'a HashMap<String, String>,
}

/// Current selection in the schedule view. Applied before merging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutFilter {
    pub branch_id: Option<String>,
    pub teacher_name: Option<String>,
    pub student_name: Option<String>,
}

impl LayoutFilter {
    pub fn matches(&self, ev: &SourceEvent) -> bool {
        if let Some(b) = self.branch_id.as_deref() {
            if ev.branch_id != b {
                return false;
            }
        }
        if let Some(t) = self.teacher_name.as_deref() {
            if !ev.teacher_names.iter().any(|n| n == t) {
                return false;
            }
        }
        if let Some(s) = self.student_name.as_deref() {
            if !ev.student_names.iter().any(|n| n == s) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedBlock {
    pub event: MergedEvent,
    pub geometry: Geometry,
    pub pixels: PixelBox,
    pub color_index: usize,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayColumn {
    pub day: Weekday,
    pub blocks: Vec<RenderedBlock>,
    /// "HH:00" -> indices into `blocks` of the blocks starting in that hour.
    pub slots: BTreeMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekLayout {
    pub pixels_per_minute: f64,
    pub hours: Vec<u32>,
    pub days: Vec<DayColumn>,
    pub dropped: Vec<DroppedEvent>,
    pub rejected: Vec<RejectedEvent>,
}

impl WeekLayout {
    #[cfg(test)]
    pub fn day(&self, day: Weekday) -> &DayColumn {
        &self.days[day.index()]
    }

    pub fn block_count(&self) -> usize {
        self.days.iter().map(|d| d.blocks.len()).sum()
    }
}

/// Splits off events whose end is not after their start. They are reported
/// under their source day label and never reach the bucketer, so they claim
/// no id and cannot stretch a neighbouring block.
pub fn reject_invalid_ranges<I>(events: I, rejected: &mut Vec<RejectedEvent>) -> Vec<SourceEvent>
where
    I: IntoIterator<Item = SourceEvent>,
{
    events
        .into_iter()
        .filter(|e| match Geometry::from_span(&e.id, e.start_time, e.end_time) {
            Ok(_) => true,
            Err(err) => {
                warn!(event_id = %e.id, day_label = %e.day_label, error = %err, "rejecting event");
                rejected.push(RejectedEvent::new(&e.id, Some(&e.day_label), &err));
                false
            }
        })
        .collect()
}

/// bucket -> sort -> merge -> geometry for one week of events.
pub fn layout_week<I>(
    events: I,
    filter: &LayoutFilter,
    ctx: &LayoutContext<'_>,
) -> Result<WeekLayout, ScheduleError>
where
    I: IntoIterator<Item = SourceEvent>,
{
    let mut rejected = Vec::new();
    let selected = reject_invalid_ranges(
        events.into_iter().filter(|e| filter.matches(e)),
        &mut rejected,
    );
    let buckets = bucket_events(selected, ctx.labels, ctx.unknown_day_policy)?;
    let dropped = buckets.dropped.clone();

    let mut first_hour = ctx.day_start_hour;
    let mut last_hour = ctx.day_end_hour.saturating_sub(1).max(first_hour);
    let mut days = Vec::with_capacity(7);

    for (day, day_events) in buckets.into_days() {
        let mut blocks = Vec::new();
        let mut slots: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for merged in merge_day(&day_events) {
            let geometry = match Geometry::of(&merged) {
                Ok(g) => g,
                Err(err) => {
                    rejected.push(RejectedEvent::new(&merged.id, Some(day.name()), &err));
                    continue;
                }
            };
            first_hour = first_hour.min(geometry.hour_row);
            last_hour = last_hour.max(geometry.last_hour_row());

            let (color_index, color) = ctx.palette.color_of(&merged.subject);
            slots
                .entry(format!("{:02}:00", geometry.hour_row))
                .or_default()
                .push(blocks.len());
            blocks.push(RenderedBlock {
                branch_name: ctx.branch_names.get(&merged.branch_id).cloned(),
                pixels: geometry.to_pixels(ctx.pixels_per_minute),
                color: color.to_string(),
                color_index,
                geometry,
                event: merged,
            });
        }

        days.push(DayColumn { day, blocks, slots });
    }

    Ok(WeekLayout {
        pixels_per_minute: ctx.pixels_per_minute,
        hours: (first_hour..=last_hour).collect(),
        days,
        dropped,
        rejected,
    })
}
