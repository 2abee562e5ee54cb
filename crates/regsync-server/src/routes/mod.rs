pub mod config;
pub mod jobs;
pub mod logs;
pub mod schedule;
