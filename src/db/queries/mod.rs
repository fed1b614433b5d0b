//! Database queries

pub mod accomplishment;
pub mod dashboard;
pub mod employee;
pub mod hours;
pub mod weekly_report;
pub mod workstream;
