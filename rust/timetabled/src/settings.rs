use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db;
use crate::schedule::color::DEFAULT_PALETTE;
use crate::schedule::{DayLabelTable, Palette, ScheduleError, UnknownDayPolicy, Weekday};

const SETTINGS_KEY: &str = "schedule.layout";

/// Per-workspace rendering settings for the schedule view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutSettings {
    pub pixels_per_minute: f64,
    pub palette: Vec<String>,
    /// Extra source labels on top of the built-in English names.
    pub day_labels: BTreeMap<String, Weekday>,
    pub unknown_day_policy: UnknownDayPolicy,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            pixels_per_minute: 1.0,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            day_labels: BTreeMap::new(),
            unknown_day_policy: UnknownDayPolicy::Drop,
            day_start_hour: 8,
            day_end_hour: 18,
        }
    }
}

impl LayoutSettings {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !(self.pixels_per_minute.is_finite() && self.pixels_per_minute > 0.0) {
            return Err(ScheduleError::InvalidSettings(
                "pixelsPerMinute must be a positive number".into(),
            ));
        }
        if self.palette.is_empty() {
            return Err(ScheduleError::InvalidPalette);
        }
        if let Some(label) = self
            .day_labels
            .keys()
            .find(|l| DayLabelTable::is_builtin(l))
        {
            return Err(ScheduleError::InvalidSettings(format!(
                "dayLabels cannot redefine built-in day label {label:?}"
            )));
        }
        if self.day_start_hour >= self.day_end_hour || self.day_end_hour > 24 {
            return Err(ScheduleError::InvalidSettings(
                "dayStartHour must be before dayEndHour, both within 0..=24".into(),
            ));
        }
        Ok(())
    }

    /// Stored settings, or defaults when the workspace has none yet.
    pub fn load(conn: &Connection) -> anyhow::Result<LayoutSettings> {
        match db::settings_get_json(conn, SETTINGS_KEY)? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(LayoutSettings::default()),
        }
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        db::settings_set_json(conn, SETTINGS_KEY, &serde_json::to_value(self)?)
    }

    /// Applies a partial camelCase object on top of these settings.
    pub fn patched(&self, patch: &serde_json::Value) -> Result<LayoutSettings, ScheduleError> {
        let Some(patch) = patch.as_object() else {
            return Err(ScheduleError::InvalidSettings("patch must be an object".into()));
        };
        let mut merged = serde_json::to_value(self)
            .map_err(|e| ScheduleError::InvalidSettings(e.to_string()))?;
        if let Some(obj) = merged.as_object_mut() {
            for (k, v) in patch {
                obj.insert(k.clone(), v.clone());
            }
        }
        let next: LayoutSettings = serde_json::from_value(merged)
            .map_err(|e| ScheduleError::InvalidSettings(e.to_string()))?;
        next.validate()?;
        Ok(next)
    }

    pub fn label_table(&self) -> DayLabelTable {
        DayLabelTable::with_extra(&self.day_labels)
    }

    pub fn palette(&self) -> Result<Palette, ScheduleError> {
        Palette::new(self.palette.clone())
    }
}
