pub mod core;
pub mod periods;
pub mod schedule;
pub mod timetable;
