use serde::Serialize;

use super::error::ScheduleError;
use super::model::{ClockTime, Event};

/// Position of an event inside its starting hour row, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub hour_row: u32,
    pub top_offset_minutes: u32,
    pub height_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelBox {
    pub top: f64,
    pub height: f64,
}

impl Geometry {
    pub fn of(event: &Event) -> Result<Geometry, ScheduleError> {
        Geometry::from_span(&event.id, event.start_time, event.end_time)
    }

    /// Same-day spans only; `end` must be strictly after `start`.
    pub fn from_span(id: &str, start: ClockTime, end: ClockTime) -> Result<Geometry, ScheduleError> {
        let start_min = start.minutes_since_midnight();
        let end_min = end.minutes_since_midnight();
        if end_min <= start_min {
            return Err(ScheduleError::InvalidRange {
                id: id.to_string(),
                start,
                end,
            });
        }
        Ok(Geometry {
            hour_row: start.hour(),
            top_offset_minutes: start.minute(),
            height_minutes: end_min - start_min,
        })
    }

    pub fn to_pixels(&self, pixels_per_minute: f64) -> PixelBox {
        PixelBox {
            top: f64::from(self.top_offset_minutes) * pixels_per_minute,
            height: f64::from(self.height_minutes) * pixels_per_minute,
        }
    }

    /// Last hour row the event reaches into (exclusive end minute).
    pub fn last_hour_row(&self) -> u32 {
        (self.hour_row * 60 + self.top_offset_minutes + self.height_minutes - 1) / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> ClockTime {
        ClockTime::parse(s).expect("time")
    }

    #[test]
    fn offset_is_minute_within_hour_and_height_is_duration() {
        let g = Geometry::from_span("a", t("09:15"), t("10:45")).expect("geometry");
        assert_eq!(g.hour_row, 9);
        assert_eq!(g.top_offset_minutes, 15);
        assert_eq!(g.height_minutes, 90);
        assert_eq!(g.last_hour_row(), 10);
    }

    #[test]
    fn reversed_range_is_invalid() {
        let res = Geometry::from_span("late", t("10:00"), t("09:00"));
        assert_eq!(
            res,
            Err(ScheduleError::InvalidRange {
                id: "late".into(),
                start: t("10:00"),
                end: t("09:00"),
            })
        );
    }

    #[test]
    fn zero_length_range_is_invalid() {
        let err = Geometry::from_span("z", t("10:00"), t("10:00")).unwrap_err();
        assert_eq!(err.code(), "invalid_range");
    }

    #[test]
    fn pixels_scale_linearly() {
        let g = Geometry::from_span("a", t("08:30"), t("09:20")).expect("geometry");
        assert_eq!(g.to_pixels(1.0), PixelBox { top: 30.0, height: 50.0 });
        assert_eq!(g.to_pixels(2.0), PixelBox { top: 60.0, height: 100.0 });
    }

    #[test]
    fn event_ending_on_the_hour_stays_in_previous_row() {
        let g = Geometry::from_span("a", t("09:00"), t("10:00")).expect("geometry");
        assert_eq!(g.last_hour_row(), 9);
    }
}
