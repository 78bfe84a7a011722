//! Weekly schedule layout engine: day bucketing, consecutive-run merging,
//! hour-row geometry and subject colors.

pub mod bucket;
pub mod color;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod merge;
pub mod model;
pub mod wire;

pub use bucket::{bucket_events, DayLabelTable, UnknownDayPolicy};
pub use color::Palette;
pub use error::ScheduleError;
pub use geometry::Geometry;
pub use layout::{layout_week, reject_invalid_ranges, LayoutContext, LayoutFilter};
pub use model::{ClockTime, Event, SourceEvent, Weekday};
pub use wire::{parse_payload, RejectedEvent};
