pub mod absence;
pub mod core;
pub mod schedule;
pub mod settings;
pub mod teachers;
pub mod ticker;
