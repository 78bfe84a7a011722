pub mod backup;
pub mod branches;
pub mod core;
pub mod schedule;
pub mod settings;
